//! Splits a free-text LLM response into named sections.
//!
//! A section is introduced by one of these markers, tried in order for each
//! requested name (case-insensitive, `#`/`*` decoration around the marker is
//! ignored):
//!
//! 1. `---SECTION: <name>---`
//! 2. `SECTION: <name>` at line start
//! 3. `<name>:` at line start
//! 4. `<index>. <name>` at line start, `index` being the 1-based request order
//!
//! The first occurrence of the first matching form wins. Canonical markers are
//! resolved first, and loose markers (forms 2 to 4) that fall inside the body
//! of a canonically marked section are ignored. A section's text runs from the
//! end of its marker to the start of the next marker found in the response, or
//! to the end of the text.

use std::collections::HashMap;

use regex::Regex;
use tracing::{debug, warn};

const DECORATION: &str = r"[ \t#*_]*";

/// Any `---SECTION: <header>---` line, used both as a boundary and for fuzzy
/// matching of headers that don't name a requested section exactly.
fn header_regex() -> Option<Regex> {
    Regex::new(r"(?im)-{3,}[ \t]*SECTION:[ \t]*([^\n]*?)[ \t]*-{3,}").ok()
}

#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    end: usize,
}

/// Compiled marker forms for one section name.
struct MarkerSet {
    forms: Vec<Regex>,
}

impl MarkerSet {
    /// With `at_start`, every form must match at the very beginning of the
    /// text; otherwise the canonical form may appear anywhere and the loose
    /// forms at any line start.
    fn new(name: &str, index: Option<usize>, at_start: bool) -> Self {
        let name = regex::escape(name.trim());
        let d = DECORATION;
        let (canonical, line) = if at_start { (r"\A", r"\A") } else { ("", "^") };
        let mut sources = vec![
            format!(r"(?i){canonical}{d}-{{3,}}[ \t]*SECTION:[ \t]*{name}[ \t]*-{{3,}}{d}"),
            format!(r"(?im){line}{d}SECTION:[ \t]*{name}{d}:?{d}"),
            format!(r"(?im){line}{d}{name}{d}:{d}"),
        ];
        if let Some(index) = index {
            sources.push(format!(r"(?im){line}{d}{index}\.[ \t]*{name}{d}:?{d}"));
        }

        let forms = sources
            .iter()
            .filter_map(|src| match Regex::new(src) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(error = %e, "Skipping unbuildable section marker");
                    None
                }
            })
            .collect();
        Self { forms }
    }

    /// First match of the first form that matches anywhere in `text`.
    fn locate(&self, text: &str) -> Option<Span> {
        self.forms.iter().find_map(|re| re.find(text).map(Span::from))
    }

    fn locate_canonical(&self, text: &str) -> Option<Span> {
        self.forms.first()?.find(text).map(Span::from)
    }

    /// First loose-form match that does not start inside one of `bodies`.
    fn locate_loose(&self, text: &str, bodies: &[Span]) -> Option<Span> {
        self.forms.iter().skip(1).find_map(|re| {
            re.find_iter(text)
                .map(Span::from)
                .find(|span| !bodies.iter().any(|b| b.start <= span.start && span.start < b.end))
        })
    }
}

impl From<regex::Match<'_>> for Span {
    fn from(m: regex::Match<'_>) -> Self {
        Span {
            start: m.start(),
            end: m.end(),
        }
    }
}

/// Extracts the requested sections from `text`.
///
/// `sections` holds `(block_id, section_name)` pairs in request order. The
/// result maps block ids to trimmed section text. Sections that cannot be
/// found, or that are empty, are left out of the map.
pub fn parse_sections(text: &str, sections: &[(&str, &str)]) -> HashMap<String, String> {
    let markers: Vec<MarkerSet> = sections
        .iter()
        .enumerate()
        .map(|(i, (_, name))| MarkerSet::new(name, Some(i + 1), false))
        .collect();

    let headers: Vec<(String, Span)> = header_regex()
        .map(|re| {
            re.captures_iter(text)
                .filter_map(|caps| {
                    let whole = caps.get(0)?;
                    let header = caps
                        .get(1)?
                        .as_str()
                        .trim_matches(|c: char| c == '*' || c.is_whitespace());
                    Some((
                        header.to_string(),
                        Span {
                            start: whole.start(),
                            end: whole.end(),
                        },
                    ))
                })
                .collect()
        })
        .unwrap_or_default();

    let mut located: Vec<(usize, Span)> = markers
        .iter()
        .enumerate()
        .filter_map(|(i, marker)| marker.locate_canonical(text).map(|span| (i, span)))
        .collect();

    // Bodies of canonically marked sections, closed by the next canonical
    // marker or header.
    let canonical_starts: Vec<usize> = located
        .iter()
        .map(|(_, span)| span.start)
        .chain(headers.iter().map(|(_, span)| span.start))
        .collect();
    let bodies: Vec<Span> = located
        .iter()
        .map(|(_, span)| Span {
            start: span.end,
            end: canonical_starts
                .iter()
                .copied()
                .filter(|&b| b >= span.end)
                .min()
                .unwrap_or(text.len()),
        })
        .collect();

    for (i, marker) in markers.iter().enumerate() {
        if located.iter().any(|(j, _)| *j == i) {
            continue;
        }
        if let Some(span) = marker.locate_loose(text, &bodies) {
            located.push((i, span));
        }
    }

    // Fuzzy fallback for names with no exact marker.
    let mut claimed: Vec<Span> = located.iter().map(|(_, span)| *span).collect();
    for (i, (block_id, name)) in sections.iter().enumerate() {
        if located.iter().any(|(j, _)| *j == i) {
            continue;
        }
        let wanted = name.to_lowercase();
        let candidate = headers.iter().find(|(header, span)| {
            let header = header.to_lowercase();
            !header.is_empty()
                && !claimed.iter().any(|c| c.start <= span.start && span.start < c.end)
                && (header.contains(&wanted) || wanted.contains(&header))
        });
        if let Some((header, span)) = candidate {
            debug!(block_id, header = %header, "Fuzzy matched section header");
            claimed.push(*span);
            located.push((i, *span));
        }
    }

    let mut boundaries: Vec<usize> = located
        .iter()
        .map(|(_, span)| span.start)
        .chain(headers.iter().map(|(_, span)| span.start))
        .collect();
    boundaries.sort_unstable();
    boundaries.dedup();

    let mut results = HashMap::new();
    for (i, span) in located {
        let end = boundaries
            .iter()
            .copied()
            .find(|&b| b >= span.end)
            .unwrap_or(text.len());
        let body = text[span.end..end].trim();
        let block_id = sections[i].0;
        if body.is_empty() {
            debug!(block_id, "Section marker found but body is empty");
            continue;
        }
        results.insert(block_id.to_string(), body.to_string());
    }
    results
}

/// Removes a marker for `section_name` at the very start of a single-section
/// response, then trims.
pub fn strip_leading_marker(text: &str, section_name: &str) -> String {
    let trimmed = text.trim_start();
    match MarkerSet::new(section_name, Some(1), true).locate(trimmed) {
        Some(span) => trimmed[span.end..].trim().to_string(),
        None => trimmed.trim_end().to_string(),
    }
}
