//! The relation graph and its path queries.

use dossier_core::{Details, EntityId, RelationTarget, Repository};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("entity not in graph: {0}")]
    NodeNotFound(EntityId),

    #[error("no path between the given entities")]
    NoPath,
}

/// Edge payload: relation kind plus its detail map.
#[derive(Debug, Clone)]
pub struct GraphEdge {
    pub kind: String,
    pub details: Details,
}

/// A flat edge for export to renderers.
#[derive(Debug, Clone, Serialize)]
pub struct EdgeExport {
    pub source: EntityId,
    pub target: EntityId,
    pub kind: String,
}

/// Undirected view of all resolved relations.
///
/// Every relation is mirrored on both entities, so the pair collapses to
/// one undirected edge; parallel relations between the same two people
/// collapse with it (last kind wins), which is all the queries need.
#[derive(Debug, Default)]
pub struct RelationGraph {
    graph: UnGraph<EntityId, GraphEdge>,
    index: HashMap<EntityId, NodeIndex>,
}

impl RelationGraph {
    /// Builds the graph from the current repository state.
    pub fn build(repo: &Repository) -> Self {
        let mut graph = UnGraph::new_undirected();
        let mut index = HashMap::new();

        for id in repo.sorted_ids() {
            let node = graph.add_node(id);
            index.insert(id, node);
        }

        for id in repo.sorted_ids() {
            let entity = match repo.get(id) {
                Some(e) => e,
                None => continue,
            };
            for rel in &entity.relations {
                let target = match &rel.target {
                    RelationTarget::Resolved(t) => *t,
                    RelationTarget::Unresolved(_) => continue,
                };
                if let (Some(&a), Some(&b)) = (index.get(&id), index.get(&target)) {
                    graph.update_edge(
                        a,
                        b,
                        GraphEdge {
                            kind: rel.kind.clone(),
                            details: rel.details.clone(),
                        },
                    );
                }
            }
        }

        Self { graph, index }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.index.contains_key(&id)
    }

    /// All node ids in the graph.
    pub fn nodes(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.graph.node_weights().copied()
    }

    /// All edges, flattened for export.
    pub fn export_edges(&self) -> Vec<EdgeExport> {
        self.graph
            .edge_references()
            .filter_map(|edge| {
                let source = *self.graph.node_weight(edge.source())?;
                let target = *self.graph.node_weight(edge.target())?;
                Some(EdgeExport {
                    source,
                    target,
                    kind: edge.weight().kind.clone(),
                })
            })
            .collect()
    }

    fn node(&self, id: EntityId) -> Result<NodeIndex, GraphError> {
        self.index
            .get(&id)
            .copied()
            .ok_or(GraphError::NodeNotFound(id))
    }

    /// Unweighted shortest path from `a` to `b`, both endpoints
    /// included. `NoPath` is a normal query outcome, never fatal.
    pub fn shortest_path(&self, a: EntityId, b: EntityId) -> Result<Vec<EntityId>, GraphError> {
        let from = self.node(a)?;
        let to = self.node(b)?;

        let (_, path) = petgraph::algo::astar(
            &self.graph,
            from,
            |finish| finish == to,
            |_| 1, // unit weights: BFS-equivalent
            |_| 0,
        )
        .ok_or(GraphError::NoPath)?;

        Ok(path
            .into_iter()
            .filter_map(|idx| self.graph.node_weight(idx).copied())
            .collect())
    }

    /// Enumerates all simple paths from `a` to `b` with at most
    /// `max_hops` edges.
    pub fn simple_paths(
        &self,
        a: EntityId,
        b: EntityId,
        max_hops: usize,
    ) -> Result<Vec<Vec<EntityId>>, GraphError> {
        let from = self.node(a)?;
        let to = self.node(b)?;

        let mut paths = Vec::new();
        let mut current = vec![from];
        let mut visited: HashSet<NodeIndex> = HashSet::from([from]);
        self.paths_dfs(from, to, max_hops, &mut current, &mut visited, &mut paths);

        Ok(paths
            .into_iter()
            .map(|path| {
                path.into_iter()
                    .filter_map(|idx| self.graph.node_weight(idx).copied())
                    .collect()
            })
            .collect())
    }

    fn paths_dfs(
        &self,
        current: NodeIndex,
        goal: NodeIndex,
        hops_left: usize,
        path: &mut Vec<NodeIndex>,
        visited: &mut HashSet<NodeIndex>,
        out: &mut Vec<Vec<NodeIndex>>,
    ) {
        if current == goal && path.len() > 1 {
            out.push(path.clone());
            return;
        }
        if hops_left == 0 {
            return;
        }
        for next in self.graph.neighbors(current) {
            if visited.contains(&next) {
                continue;
            }
            visited.insert(next);
            path.push(next);
            self.paths_dfs(next, goal, hops_left - 1, path, visited, out);
            path.pop();
            visited.remove(&next);
        }
    }

    /// The local neighborhood between two entities: every node on any
    /// simple path of at most `max_hops` edges between them.
    pub fn neighborhood(
        &self,
        a: EntityId,
        b: EntityId,
        max_hops: usize,
    ) -> Result<BTreeSet<EntityId>, GraphError> {
        let paths = self.simple_paths(a, b, max_hops)?;
        Ok(paths.into_iter().flatten().collect())
    }

    /// Restricts the graph to the given node set.
    pub fn subgraph(&self, keep: &BTreeSet<EntityId>) -> RelationGraph {
        let mut graph = UnGraph::new_undirected();
        let mut index = HashMap::new();

        for id in self.nodes() {
            if keep.contains(&id) {
                let node = graph.add_node(id);
                index.insert(id, node);
            }
        }
        for edge in self.graph.edge_references() {
            let (sa, sb) = (edge.source(), edge.target());
            let (ida, idb) = match (self.graph.node_weight(sa), self.graph.node_weight(sb)) {
                (Some(&x), Some(&y)) => (x, y),
                _ => continue,
            };
            if let (Some(&na), Some(&nb)) = (index.get(&ida), index.get(&idb)) {
                graph.update_edge(na, nb, edge.weight().clone());
            }
        }

        RelationGraph { graph, index }
    }
}
