//! Nested MECE analysis result.
//!
//! Serializes to plain JSON: leaves are strings, branches are objects.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blocks::BuildingBlock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisNode {
    Leaf(String),
    Branch(BTreeMap<String, AnalysisNode>),
}

impl AnalysisNode {
    pub fn as_leaf(&self) -> Option<&str> {
        match self {
            AnalysisNode::Leaf(text) => Some(text),
            AnalysisNode::Branch(_) => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AnalysisNode::Leaf(_) => "text",
            AnalysisNode::Branch(_) => "section",
        }
    }
}

/// The taxonomy already holds a value of the wrong shape at `path`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Taxonomy conflict for block '{block_id}' at {path:?}: expected {expected}, found {found}")]
pub struct TaxonomyConflict {
    pub block_id: String,
    pub path: Vec<String>,
    pub expected: &'static str,
    pub found: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisTree {
    root: BTreeMap<String, AnalysisNode>,
}

impl AnalysisTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Writes `text` at the block's taxonomy leaf, creating branches on the
    /// way down. An existing leaf is replaced.
    pub fn merge(&mut self, block: &BuildingBlock, text: &str) -> Result<(), TaxonomyConflict> {
        let conflict = |depth: usize, expected: &'static str, found: &AnalysisNode| {
            TaxonomyConflict {
                block_id: block.id.clone(),
                path: block.taxonomy_path[..=depth].to_vec(),
                expected,
                found: found.kind(),
            }
        };

        let Some((leaf_key, parents)) = block.taxonomy_path.split_last() else {
            return Err(TaxonomyConflict {
                block_id: block.id.clone(),
                path: Vec::new(),
                expected: "text",
                found: "empty path",
            });
        };

        let mut current = &mut self.root;
        for (depth, key) in parents.iter().enumerate() {
            let node = current
                .entry(key.clone())
                .or_insert_with(|| AnalysisNode::Branch(BTreeMap::new()));
            current = match node {
                AnalysisNode::Branch(children) => children,
                other => return Err(conflict(depth, "section", other)),
            };
        }

        if let Some(existing @ AnalysisNode::Branch(_)) = current.get(leaf_key) {
            return Err(conflict(parents.len(), "text", existing));
        }
        current.insert(leaf_key.clone(), AnalysisNode::Leaf(text.to_string()));
        Ok(())
    }

    /// Looks up a node by path.
    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<&AnalysisNode> {
        let (first, rest) = path.split_first()?;
        let mut node = self.root.get(first.as_ref())?;
        for key in rest {
            node = match node {
                AnalysisNode::Branch(children) => children.get(key.as_ref())?,
                AnalysisNode::Leaf(_) => return None,
            };
        }
        Some(node)
    }

    /// Text stored at a path, if the path ends in a leaf.
    pub fn leaf<S: AsRef<str>>(&self, path: &[S]) -> Option<&str> {
        self.get(path).and_then(AnalysisNode::as_leaf)
    }

    /// Text stored for a block, if populated.
    pub fn block_text(&self, block: &BuildingBlock) -> Option<&str> {
        self.leaf(&block.taxonomy_path)
    }

    /// Number of populated leaves.
    pub fn leaf_count(&self) -> usize {
        fn count(nodes: &BTreeMap<String, AnalysisNode>) -> usize {
            nodes
                .values()
                .map(|n| match n {
                    AnalysisNode::Leaf(_) => 1,
                    AnalysisNode::Branch(children) => count(children),
                })
                .sum()
        }
        count(&self.root)
    }
}
