//! Catalog of analysis building blocks and their place in the MECE taxonomy.
//!
//! Each block is one independently requestable analysis topic. Its
//! `taxonomy_path` locates the block's result inside the nested
//! [`AnalysisTree`](crate::analysis::AnalysisTree).

use std::collections::HashSet;

use thiserror::Error;

/// Top-level taxonomy keys, in report order.
pub const TEASER_SUMMARY: &str = "Teaser Summary";
pub const OUTSIDE_IN_VIEW: &str = "Outside-In View";
pub const CONTEXT_BASIS: &str = "Context Basis";

/// Children of [`OUTSIDE_IN_VIEW`].
pub const CORE_STATUS_QUO: &str = "Core Status Quo";
pub const FUTURE: &str = "Future";
pub const SHAREHOLDER_FRIENDLINESS: &str = "Shareholder Friendliness";

/// A single analysis topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildingBlock {
    pub id: String,
    pub display_name: String,
    pub description: String,
    pub taxonomy_path: Vec<String>,
}

impl BuildingBlock {
    pub fn new(id: &str, display_name: &str, description: &str, taxonomy_path: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            description: description.to_string(),
            taxonomy_path: taxonomy_path.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// The leaf key this block writes to.
    pub fn leaf_key(&self) -> &str {
        self.taxonomy_path
            .last()
            .map(String::as_str)
            .unwrap_or(self.display_name.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Duplicate building block id '{0}'")]
    DuplicateId(String),

    #[error("Duplicate section name '{0}'")]
    DuplicateSectionName(String),

    #[error("Block '{id}' has a taxonomy path of length {len} (expected 1 to 3)")]
    InvalidPathLength { id: String, len: usize },

    #[error("Block '{id}' path {path:?} conflicts with block '{other}' path {other_path:?}")]
    PathConflict {
        id: String,
        path: Vec<String>,
        other: String,
        other_path: Vec<String>,
    },
}

/// (id, display name, description, taxonomy path)
type BlockSpec = (
    &'static str,
    &'static str,
    &'static str,
    &'static [&'static str],
);

const STANDARD_BLOCKS: &[BlockSpec] = &[
    (
        "teaser_summary",
        "Teaser Summary",
        "A concise, bias-conscious summary of the key points in the teaser document.",
        &[TEASER_SUMMARY, "Bias conscious"],
    ),
    (
        "company_profile",
        "Company Profile",
        "Products, business model, form, geography, status",
        &[OUTSIDE_IN_VIEW, CORE_STATUS_QUO, "Company Profile"],
    ),
    (
        "customer_demand",
        "Customer & Demand Analysis",
        "Target customers, market demand patterns",
        &[OUTSIDE_IN_VIEW, CORE_STATUS_QUO, "Customer & Demand Analysis"],
    ),
    (
        "industry_landscape",
        "Industry & Competitive Landscape",
        "Industry position, competitive analysis",
        &[OUTSIDE_IN_VIEW, CORE_STATUS_QUO, "Industry & Competitive Landscape"],
    ),
    (
        "commercial_strategy",
        "Commercial Strategy",
        "Go-to-market approach, revenue strategy",
        &[OUTSIDE_IN_VIEW, CORE_STATUS_QUO, "Commercial Strategy"],
    ),
    (
        "talent_development",
        "Talent Development",
        "Team structure, expertise, development plans",
        &[OUTSIDE_IN_VIEW, CORE_STATUS_QUO, "Talent Development"],
    ),
    (
        "market_growth",
        "Market Growth and Trends",
        "Analysis of market trajectory and trends",
        &[OUTSIDE_IN_VIEW, FUTURE, "Market Growth and Trends"],
    ),
    (
        "breadth_analysis",
        "Breadth Analysis",
        "Assessment of market breadth, expansion potential",
        &[OUTSIDE_IN_VIEW, FUTURE, "Breadth Analysis"],
    ),
    (
        "forces_analysis",
        "Forces Analysis",
        "External forces affecting the business",
        &[OUTSIDE_IN_VIEW, FUTURE, "Forces Analysis"],
    ),
    (
        "moat_identification",
        "Moat Identification",
        "Competitive advantages and barriers to entry",
        &[OUTSIDE_IN_VIEW, FUTURE, "Moat Identification"],
    ),
    (
        "value_creation",
        "Key Value Creation Drivers & Risks",
        "Factors driving value, associated risks",
        &[OUTSIDE_IN_VIEW, FUTURE, "Key Value Creation Drivers & Risks"],
    ),
    (
        "ownership_structure",
        "Compensation & Ownership Structure",
        "Executive compensation, ownership analysis",
        &[
            OUTSIDE_IN_VIEW,
            SHAREHOLDER_FRIENDLINESS,
            "Compensation & Ownership Structure",
        ],
    ),
    (
        "related_party",
        "Related-party transactions",
        "Assessment of related-party dealings",
        &[
            OUTSIDE_IN_VIEW,
            SHAREHOLDER_FRIENDLINESS,
            "Related-party transactions",
        ],
    ),
    (
        "share_repurchases",
        "Share repurchases",
        "History and strategy of share buybacks",
        &[OUTSIDE_IN_VIEW, SHAREHOLDER_FRIENDLINESS, "Share repurchases"],
    ),
    (
        "dividends",
        "Dividends",
        "Dividend history and policy",
        &[OUTSIDE_IN_VIEW, SHAREHOLDER_FRIENDLINESS, "Dividends"],
    ),
    (
        "risk",
        "Risk",
        "Risk assessment and mitigation strategies",
        &[CONTEXT_BASIS, "Risk"],
    ),
    (
        "synergies",
        "Synergies",
        "Potential revenue and cost synergies",
        &[CONTEXT_BASIS, "Synergies"],
    ),
    (
        "investment_criteria",
        "Investment Criteria",
        "Key criteria for investment decisions",
        &[CONTEXT_BASIS, "Investment Criteria"],
    ),
    (
        "exit_perspective",
        "Exit perspective",
        "Potential exit strategies and timelines",
        &[CONTEXT_BASIS, "Exit perspective"],
    ),
    (
        "graveyard",
        "Graveyard",
        "Failed competitors or previous attempts in this space",
        &[CONTEXT_BASIS, "Graveyard"],
    ),
];

/// Immutable set of building blocks, in catalog order.
#[derive(Debug, Clone)]
pub struct Registry {
    blocks: Vec<BuildingBlock>,
}

impl Registry {
    /// The built-in teaser taxonomy.
    pub fn standard() -> Self {
        let blocks = STANDARD_BLOCKS
            .iter()
            .map(|(id, name, description, path)| BuildingBlock::new(id, name, description, path))
            .collect();
        Self { blocks }
    }

    /// Builds a registry from a custom catalog, validating taxonomy shape.
    pub fn from_blocks(blocks: Vec<BuildingBlock>) -> Result<Self, RegistryError> {
        validate_blocks(&blocks)?;
        Ok(Self { blocks })
    }

    pub fn get(&self, block_id: &str) -> Option<&BuildingBlock> {
        self.blocks.iter().find(|b| b.id == block_id)
    }

    pub fn all_ids(&self) -> Vec<String> {
        self.blocks.iter().map(|b| b.id.clone()).collect()
    }

    pub fn blocks(&self) -> &[BuildingBlock] {
        &self.blocks
    }

    /// Resolves a caller selection into blocks.
    ///
    /// An absent or empty selection means every block. Otherwise requested
    /// ids keep the caller's order; unknown and repeated ids are dropped.
    pub fn resolve_selection(&self, requested: Option<&[String]>) -> Vec<&BuildingBlock> {
        let requested = match requested {
            Some(ids) if !ids.is_empty() => ids,
            _ => return self.blocks.iter().collect(),
        };

        let mut seen = HashSet::new();
        requested
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .filter_map(|id| self.get(id))
            .collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::standard()
    }
}

fn validate_blocks(blocks: &[BuildingBlock]) -> Result<(), RegistryError> {
    let mut ids = HashSet::new();
    let mut names = HashSet::new();

    for block in blocks {
        if !ids.insert(block.id.as_str()) {
            return Err(RegistryError::DuplicateId(block.id.clone()));
        }
        if !names.insert(block.display_name.to_lowercase()) {
            return Err(RegistryError::DuplicateSectionName(
                block.display_name.clone(),
            ));
        }
        let len = block.taxonomy_path.len();
        if !(1..=3).contains(&len) {
            return Err(RegistryError::InvalidPathLength {
                id: block.id.clone(),
                len,
            });
        }
    }

    // A path that is a prefix of (or equal to) another would need the same
    // key to be both a leaf and a branch.
    for (i, a) in blocks.iter().enumerate() {
        for b in &blocks[i + 1..] {
            let shorter = a.taxonomy_path.len().min(b.taxonomy_path.len());
            if a.taxonomy_path[..shorter] == b.taxonomy_path[..shorter] {
                return Err(RegistryError::PathConflict {
                    id: b.id.clone(),
                    path: b.taxonomy_path.clone(),
                    other: a.id.clone(),
                    other_path: a.taxonomy_path.clone(),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(blocks: &[&BuildingBlock]) -> Vec<String> {
        blocks.iter().map(|b| b.id.clone()).collect()
    }

    #[test]
    fn test_standard_catalog_is_valid() {
        let registry = Registry::standard();
        assert_eq!(registry.blocks().len(), 20);
        assert!(Registry::from_blocks(registry.blocks().to_vec()).is_ok());
    }

    #[test]
    fn test_get_known_and_unknown() {
        let registry = Registry::standard();
        let block = registry.get("moat_identification").unwrap();
        assert_eq!(block.display_name, "Moat Identification");
        assert_eq!(
            block.taxonomy_path,
            vec!["Outside-In View", "Future", "Moat Identification"]
        );
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn test_teaser_summary_leaf_is_bias_conscious() {
        let registry = Registry::standard();
        let block = registry.get("teaser_summary").unwrap();
        assert_eq!(block.leaf_key(), "Bias conscious");
    }

    #[test]
    fn test_resolve_selection_absent_means_all() {
        let registry = Registry::standard();
        assert_eq!(ids(&registry.resolve_selection(None)), registry.all_ids());
        let empty: Vec<String> = Vec::new();
        assert_eq!(
            ids(&registry.resolve_selection(Some(empty.as_slice()))),
            registry.all_ids()
        );
    }

    #[test]
    fn test_resolve_selection_drops_unknown_and_repeated_ids() {
        let registry = Registry::standard();
        let requested = vec![
            "risk".to_string(),
            "bogus".to_string(),
            "teaser_summary".to_string(),
            "risk".to_string(),
        ];
        let resolved = registry.resolve_selection(Some(requested.as_slice()));
        assert_eq!(ids(&resolved), vec!["risk", "teaser_summary"]);
    }

    #[test]
    fn test_resolve_selection_only_unknown_ids_is_empty() {
        let registry = Registry::standard();
        let requested = vec!["bogus".to_string()];
        assert!(registry.resolve_selection(Some(requested.as_slice())).is_empty());
    }

    #[test]
    fn test_from_blocks_rejects_duplicate_id() {
        let blocks = vec![
            BuildingBlock::new("a", "A", "", &["X", "A"]),
            BuildingBlock::new("a", "B", "", &["X", "B"]),
        ];
        assert_eq!(
            Registry::from_blocks(blocks).unwrap_err(),
            RegistryError::DuplicateId("a".to_string())
        );
    }

    #[test]
    fn test_from_blocks_rejects_long_path() {
        let blocks = vec![BuildingBlock::new("a", "A", "", &["1", "2", "3", "4"])];
        assert!(matches!(
            Registry::from_blocks(blocks),
            Err(RegistryError::InvalidPathLength { len: 4, .. })
        ));
    }

    #[test]
    fn test_from_blocks_rejects_leaf_branch_conflict() {
        let blocks = vec![
            BuildingBlock::new("a", "A", "", &["Context Basis"]),
            BuildingBlock::new("b", "B", "", &["Context Basis", "Risk"]),
        ];
        assert!(matches!(
            Registry::from_blocks(blocks),
            Err(RegistryError::PathConflict { .. })
        ));
    }
}
