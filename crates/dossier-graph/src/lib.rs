//! Dossier Graph - Query graph over the relation ledger
//!
//! Rebuilds, on request, an undirected graph whose nodes are entity
//! identifiers and whose edges come from resolved relations, and answers
//! path, neighborhood and cluster queries over it.
//!
//! The graph is a throwaway view: it holds no state of its own beyond
//! the rebuild, so repository mutations simply mean building a fresh
//! graph.

mod cluster;
mod graph;
mod layout;
mod stats;

pub use cluster::{cluster, feature_vector, find_bridges, ClusterLabels};
pub use graph::{EdgeExport, GraphError, RelationGraph};
pub use layout::{strategy_for, CircularLayout, ForceDirectedLayout, LayoutStrategy};
pub use stats::{collect_statistics, Statistics};
