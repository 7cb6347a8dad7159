use std::collections::{BTreeMap, HashMap};
use std::f64::consts::TAU;

use fdg_sim::{
    force::fruchterman_reingold, glam::Vec3, ForceGraph, ForceGraphHelper, Simulation,
    SimulationParameters,
};
use pam_core::{KeyedGraph, NodeKey, Position};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Force-directed layout settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutParams {
    pub iterations: usize,
    /// Seeds the initial node placement; the simulation itself is deterministic.
    pub seed: u64,
    /// Fruchterman–Reingold scale.
    pub scale: f32,
    pub cooloff: f32,
    pub time_step: f32,
    /// Width of the square initial nodes are scattered in.
    pub start_spread: f32,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            iterations: 50,
            seed: 42,
            scale: 45.0,
            cooloff: 0.95,
            time_step: 0.02,
            start_spread: 200.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayoutError {
    /// The caller's stop check fired between iterations.
    Interrupted { completed: usize },
    /// The simulation produced NaN or infinite coordinates.
    NonFinite,
}

impl std::fmt::Display for LayoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayoutError::Interrupted { completed } => {
                write!(f, "layout interrupted after {completed} iteration(s)")
            }
            LayoutError::NonFinite => f.write_str("layout produced non-finite coordinates"),
        }
    }
}

impl std::error::Error for LayoutError {}

/// Runs a seeded force-directed layout over the undirected projection of
/// `graph`. Coordinates are local to the graph and not normalized.
///
/// `should_stop` is polled before every iteration so callers can enforce a
/// wall-clock budget.
pub fn spring_layout<K, F>(
    graph: &KeyedGraph<K>,
    params: &LayoutParams,
    mut should_stop: F,
) -> Result<BTreeMap<K, Position>, LayoutError>
where
    K: NodeKey,
    F: FnMut() -> bool,
{
    if graph.is_empty() {
        return Ok(BTreeMap::new());
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let half = params.start_spread.abs().max(1.0) / 2.0;

    let starts: Vec<Vec3> = (0..graph.node_count())
        .map(|_| Vec3::new(rng.gen_range(-half..half), rng.gen_range(-half..half), 0.0))
        .collect();

    let mut force_graph: ForceGraph<usize, ()> = ForceGraph::default();
    let mut index_map: HashMap<usize, _> = HashMap::with_capacity(graph.node_count());
    for (position, key) in graph.keys().enumerate() {
        let idx = force_graph.add_force_node_with_coords(key.to_string(), position, starts[position]);
        index_map.insert(position, idx);
    }

    let undirected = graph.undirected();
    for node in 0..undirected.node_count() {
        for &(neighbor, _) in undirected.neighbors(node) {
            if neighbor > node {
                force_graph.add_edge(index_map[&node], index_map[&neighbor], ());
            }
        }
    }

    let mut sim_params = SimulationParameters::default();
    sim_params.set_force(fruchterman_reingold(params.scale, params.cooloff));
    let mut simulation = Simulation::from_graph(force_graph, sim_params);
    // from_graph scatters nodes with a process-global RNG; put the seeded
    // starts back so the result depends only on `params.seed`
    for node in simulation.get_graph_mut().node_weights_mut() {
        let start = starts[node.data];
        node.location = start;
        node.old_location = start;
        node.velocity = Vec3::ZERO;
    }
    for completed in 0..params.iterations {
        if should_stop() {
            return Err(LayoutError::Interrupted { completed });
        }
        simulation.update(params.time_step);
    }

    let settled = simulation.get_graph();
    let mut layout = BTreeMap::new();
    for idx in settled.node_indices() {
        let node = &settled[idx];
        let pos = Position::new(node.location.x as f64, node.location.y as f64);
        if !pos.is_finite() {
            return Err(LayoutError::NonFinite);
        }
        let key = graph.key_of(pam_core::NodeIndex::new(node.data));
        layout.insert(key.clone(), pos);
    }
    Ok(layout)
}

/// Deterministic layout that needs no simulation: nodes sit on a circle in
/// insertion order, pulled toward the centre by their degree. Used when the
/// force-directed layout fails or runs out of time.
pub fn degree_layout<K: NodeKey>(graph: &KeyedGraph<K>) -> BTreeMap<K, Position> {
    let n = graph.node_count().max(1) as f64;
    graph
        .keys()
        .zip(graph.degrees())
        .enumerate()
        .map(|(i, (key, degree))| {
            let angle = TAU * i as f64 / n;
            let radius = 1.0 / (1.0 + degree as f64);
            (
                key.clone(),
                Position::new(radius * angle.cos(), radius * angle.sin()),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pam_core::EdgeAttrs;

    fn triangle_with_tail() -> KeyedGraph<u32> {
        let mut graph = KeyedGraph::new();
        graph.add_edge(0, 1, EdgeAttrs::default());
        graph.add_edge(1, 2, EdgeAttrs::default());
        graph.add_edge(2, 0, EdgeAttrs::default());
        graph.add_edge(2, 3, EdgeAttrs::default());
        graph
    }

    #[test]
    fn spring_layout_covers_every_node_and_is_seeded() {
        let graph = triangle_with_tail();
        let params = LayoutParams {
            iterations: 20,
            ..LayoutParams::default()
        };
        let first = spring_layout(&graph, &params, || false).unwrap();
        let second = spring_layout(&graph, &params, || false).unwrap();
        assert_eq!(first.len(), 4);
        assert!(first.values().all(Position::is_finite));
        assert_eq!(first, second);
    }

    #[test]
    fn start_positions_come_from_the_seed() {
        let graph = triangle_with_tail();
        let at_start = |seed| {
            let params = LayoutParams {
                iterations: 0,
                seed,
                ..LayoutParams::default()
            };
            spring_layout(&graph, &params, || false).unwrap()
        };
        let half = LayoutParams::default().start_spread as f64 / 2.0;
        let first = at_start(7);
        assert!(first
            .values()
            .all(|p| p.x.abs() <= half && p.y.abs() <= half));
        assert_eq!(first, at_start(7));
        assert_ne!(first, at_start(8));
    }

    #[test]
    fn concurrent_layouts_agree() {
        let graph = triangle_with_tail();
        let params = LayoutParams {
            iterations: 15,
            ..LayoutParams::default()
        };
        let expected = spring_layout(&graph, &params, || false).unwrap();
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| spring_layout(&graph, &params, || false).unwrap()))
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), expected);
            }
        });
    }

    #[test]
    fn spring_layout_stops_when_asked() {
        let graph = triangle_with_tail();
        let mut calls = 0;
        let err = spring_layout(&graph, &LayoutParams::default(), || {
            calls += 1;
            calls > 3
        })
        .unwrap_err();
        assert_eq!(err, LayoutError::Interrupted { completed: 3 });
    }

    #[test]
    fn empty_graph_has_empty_layout() {
        let graph: KeyedGraph<u32> = KeyedGraph::new();
        assert!(spring_layout(&graph, &LayoutParams::default(), || false)
            .unwrap()
            .is_empty());
        assert!(degree_layout(&graph).is_empty());
    }

    #[test]
    fn degree_layout_pulls_hubs_inward() {
        let graph = triangle_with_tail();
        let layout = degree_layout(&graph);
        let radius = |p: &Position| (p.x * p.x + p.y * p.y).sqrt();
        // node 2 has degree 3, node 3 has degree 1
        assert!(radius(&layout[&2]) < radius(&layout[&3]));
    }
}
