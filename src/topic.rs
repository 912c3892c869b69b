//! Topic handling module
//!
//! This module provides the topic tree: lazily created nodes addressed by
//! slash-delimited paths, `#` wildcard expansion and ancestor discovery.

// Submodules
pub mod error;
/// Tree vertices and their arena handles
pub mod topic_node;
/// The arena-backed topic hierarchy
pub mod topic_tree;


// Re-export commonly used types for convenience
pub use error::{TopicPathError, TopicResult, limits, validation};
pub use topic_node::{NodeId, TopicNode};
pub use topic_tree::{ResolvedPath, TopicTree, WildcardMatches};
