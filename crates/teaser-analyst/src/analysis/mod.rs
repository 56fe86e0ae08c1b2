//! Analysis results: the typed taxonomy tree and the response section parser.

pub mod sections;
pub mod tree;

pub use sections::{parse_sections, strip_leading_marker};
pub use tree::{AnalysisNode, AnalysisTree, TaxonomyConflict};
