//! Pluggable node layout strategies.
//!
//! Layout only matters for rendering; correctness lives in the graph
//! topology. Strategies are selected by name so the renderer can offer a
//! switch without knowing the implementations.

use crate::graph::RelationGraph;
use dossier_core::EntityId;
use std::collections::HashMap;
use std::f32::consts::TAU;

/// Positions in the unit square, one per node.
pub type Positions = HashMap<EntityId, (f32, f32)>;

pub trait LayoutStrategy {
    fn positions(&self, graph: &RelationGraph) -> Positions;
}

/// Nodes evenly spaced on a circle, in stable node order.
#[derive(Debug, Default)]
pub struct CircularLayout;

impl LayoutStrategy for CircularLayout {
    fn positions(&self, graph: &RelationGraph) -> Positions {
        let mut nodes: Vec<EntityId> = graph.nodes().collect();
        nodes.sort();
        let count = nodes.len().max(1) as f32;
        nodes
            .iter()
            .enumerate()
            .map(|(i, &id)| {
                let angle = TAU * i as f32 / count;
                (id, (0.5 + 0.5 * angle.cos(), 0.5 + 0.5 * angle.sin()))
            })
            .collect()
    }
}

/// A small force-directed (spring) layout: repulsion between all node
/// pairs, attraction along edges, fixed iteration count. Deterministic:
/// starts from the circular layout instead of random positions.
#[derive(Debug)]
pub struct ForceDirectedLayout {
    pub iterations: usize,
}

impl Default for ForceDirectedLayout {
    fn default() -> Self {
        Self { iterations: 50 }
    }
}

impl LayoutStrategy for ForceDirectedLayout {
    fn positions(&self, graph: &RelationGraph) -> Positions {
        let mut positions = CircularLayout.positions(graph);
        if positions.len() < 2 {
            return positions;
        }

        let nodes: Vec<EntityId> = {
            let mut v: Vec<EntityId> = positions.keys().copied().collect();
            v.sort();
            v
        };
        let edges = graph.export_edges();
        let k = (1.0 / positions.len() as f32).sqrt();

        for _ in 0..self.iterations {
            let mut forces: HashMap<EntityId, (f32, f32)> =
                nodes.iter().map(|&id| (id, (0.0, 0.0))).collect();

            for (i, &a) in nodes.iter().enumerate() {
                for &b in &nodes[i + 1..] {
                    let (ax, ay) = positions[&a];
                    let (bx, by) = positions[&b];
                    let (dx, dy) = (ax - bx, ay - by);
                    let dist = (dx * dx + dy * dy).sqrt().max(1e-4);
                    let repulse = k * k / dist;
                    let (fx, fy) = (dx / dist * repulse, dy / dist * repulse);
                    let fa = forces.entry(a).or_default();
                    fa.0 += fx;
                    fa.1 += fy;
                    let fb = forces.entry(b).or_default();
                    fb.0 -= fx;
                    fb.1 -= fy;
                }
            }

            for edge in &edges {
                let (ax, ay) = positions[&edge.source];
                let (bx, by) = positions[&edge.target];
                let (dx, dy) = (ax - bx, ay - by);
                let dist = (dx * dx + dy * dy).sqrt().max(1e-4);
                let attract = dist * dist / k;
                let (fx, fy) = (dx / dist * attract, dy / dist * attract);
                let fa = forces.entry(edge.source).or_default();
                fa.0 -= fx;
                fa.1 -= fy;
                let fb = forces.entry(edge.target).or_default();
                fb.0 += fx;
                fb.1 += fy;
            }

            let step = 0.01;
            for &id in &nodes {
                let (fx, fy) = forces[&id];
                let pos = positions.entry(id).or_default();
                pos.0 = (pos.0 + fx * step).clamp(0.0, 1.0);
                pos.1 = (pos.1 + fy * step).clamp(0.0, 1.0);
            }
        }

        positions
    }
}

/// Resolves a strategy by its configured name. Unknown names fall back
/// to the circular layout.
pub fn strategy_for(name: &str) -> Box<dyn LayoutStrategy> {
    match name {
        "force" | "spring" => Box::new(ForceDirectedLayout::default()),
        _ => Box::new(CircularLayout),
    }
}
