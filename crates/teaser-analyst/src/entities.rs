//! Named-entity tagging of extracted teaser text.
//!
//! Entities are grouped by category (`COMPANY`, `MONEY`, ...). Offsets are in
//! characters, not bytes. Categories with no hits are left out.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    pub label: String,
    pub start_char: usize,
    pub end_char: usize,
}

pub type EntityMap = BTreeMap<String, Vec<Entity>>;

pub trait EntityExtractor: Send + Sync {
    fn extract_entities(&self, text: &str) -> EntityMap;
}

struct EntityPattern {
    category: &'static str,
    label: &'static str,
    regex: Regex,
}

/// (category, label, pattern). Earlier patterns win where matches overlap.
const PATTERNS: &[(&str, &str, &str)] = &[
    (
        "COMPANY",
        "ORG",
        r"\b(?:[A-Z][\w&'-]*\s+){0,3}?[A-Z][\w&'-]*\s+(?:Inc|Corp|Corporation|Ltd|LLC|GmbH|AG|SA|plc|PLC|Group|Company|Holding|Holdings)\b\.?",
    ),
    (
        "ORGANIZATION",
        "ORG",
        r"\b(?:[A-Z][\w&'-]*\s+){0,3}?[A-Z][\w&'-]*\s+(?:Partners|Capital|Ventures|Bank|Fund|Foundation|University|Association|Institute)\b",
    ),
    ("PERCENT", "PERCENT", r"\b\d+(?:[.,]\d+)?\s?(?:%|percent\b)"),
    (
        "MONEY",
        "MONEY",
        r"(?:[$€£]\s?\d[\d,]*(?:\.\d+)?(?:\s?(?:million|billion|thousand|mn|bn|m|k)\b)?|\b\d[\d,]*(?:\.\d+)?\s?(?:million|billion|mn|bn|m)?\s?(?:USD|EUR|GBP|CHF)\b)",
    ),
    (
        "DATE",
        "DATE",
        r"\b(?:(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Sept|Oct|Nov|Dec)[a-z]*\.?\s+(?:\d{1,2},\s+)?\d{4}|Q[1-4]\s+\d{4}|FY\s?\d{2,4}|(?:19|20)\d{2})\b",
    ),
    (
        "GPE",
        "GPE",
        r"\b(?:Germany|Switzerland|Austria|France|Italy|Spain|Netherlands|Belgium|Sweden|Norway|Denmark|Poland|United Kingdom|UK|United States|USA|US|Canada|China|Japan|India|Europe|DACH|North America|Asia)\b",
    ),
];

/// Pattern-based tagger for amounts, percentages, dates, places and
/// suffix-marked company names.
pub struct RegexEntityExtractor {
    patterns: Vec<EntityPattern>,
}

impl RegexEntityExtractor {
    pub fn new() -> Self {
        let patterns = PATTERNS
            .iter()
            .filter_map(|&(category, label, src)| match Regex::new(src) {
                Ok(regex) => Some(EntityPattern {
                    category,
                    label,
                    regex,
                }),
                Err(e) => {
                    warn!(category, error = %e, "Skipping invalid entity pattern");
                    None
                }
            })
            .collect();
        Self { patterns }
    }
}

impl Default for RegexEntityExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityExtractor for RegexEntityExtractor {
    fn extract_entities(&self, text: &str) -> EntityMap {
        let offsets = CharOffsets::new(text);
        let mut taken: Vec<(usize, usize)> = Vec::new();
        let mut found: Vec<(&'static str, Entity)> = Vec::new();

        for pattern in &self.patterns {
            for m in pattern.regex.find_iter(text) {
                let (start, end) = (m.start(), m.end());
                if taken.iter().any(|&(s, e)| start < e && s < end) {
                    continue;
                }
                taken.push((start, end));
                found.push((
                    pattern.category,
                    Entity {
                        text: m.as_str().to_string(),
                        label: pattern.label.to_string(),
                        start_char: offsets.char_at(start),
                        end_char: offsets.char_at(end),
                    },
                ));
            }
        }

        let mut entities = EntityMap::new();
        for (category, entity) in found {
            entities
                .entry(category.to_string())
                .or_default()
                .push(entity);
        }
        for list in entities.values_mut() {
            list.sort_by_key(|e| e.start_char);
        }
        entities
    }
}

/// Byte offset to character offset lookup.
struct CharOffsets {
    starts: Vec<usize>,
    len: usize,
}

impl CharOffsets {
    fn new(text: &str) -> Self {
        Self {
            starts: text.char_indices().map(|(i, _)| i).collect(),
            len: text.len(),
        }
    }

    fn char_at(&self, byte: usize) -> usize {
        if byte >= self.len {
            return self.starts.len();
        }
        self.starts.partition_point(|&b| b < byte)
    }
}
