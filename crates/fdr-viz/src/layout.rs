use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use fdg_sim::{
    force::fruchterman_reingold, ForceGraph, ForceGraphHelper, Simulation, SimulationParameters,
};
use fdr_core::{Edge, FdrError, Network, Node};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutNode {
    pub id: usize,
    pub label: String,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutEdge {
    pub from: usize,
    pub to: usize,
    pub in_service: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayoutResult {
    pub nodes: Vec<LayoutNode>,
    pub edges: Vec<LayoutEdge>,
}

impl LayoutResult {
    pub fn node(&self, id: usize) -> Option<&LayoutNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// `(min_x, min_y, max_x, max_y)`, or `None` without nodes.
    pub fn bounds(&self) -> Option<(f32, f32, f32, f32)> {
        let first = self.nodes.first()?;
        Some(self.nodes.iter().fold(
            (first.x, first.y, first.x, first.y),
            |(x0, y0, x1, y1), n| (x0.min(n.x), y0.min(n.y), x1.max(n.x), y1.max(n.y)),
        ))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    /// Layered tree grown from the slack bus along in-service branches
    #[default]
    Radial,
    /// Fruchterman-Reingold force simulation
    Force,
}

impl LayoutKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LayoutKind::Radial => "radial",
            LayoutKind::Force => "force",
        }
    }
}

impl fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutKind {
    type Err = FdrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "radial" | "tree" => Ok(LayoutKind::Radial),
            "force" => Ok(LayoutKind::Force),
            other => Err(FdrError::Config(format!(
                "unknown layout '{}' (expected radial or force)",
                other
            ))),
        }
    }
}

const FORCE_ITERATIONS: usize = 150;

pub fn layout_network(network: &Network, kind: LayoutKind) -> LayoutResult {
    match kind {
        LayoutKind::Radial => radial_layout(network),
        LayoutKind::Force => force_layout(network, FORCE_ITERATIONS),
    }
}

fn bus_labels(network: &Network) -> BTreeMap<usize, String> {
    network
        .graph
        .node_indices()
        .filter_map(|idx| match &network.graph[idx] {
            Node::Bus(bus) => Some((bus.id.value(), bus.name.clone())),
            _ => None,
        })
        .collect()
}

fn branch_edges(network: &Network, labels: &BTreeMap<usize, String>) -> Vec<LayoutEdge> {
    network
        .graph
        .edge_references()
        .filter_map(|edge| match edge.weight() {
            Edge::Branch(branch) => Some(LayoutEdge {
                from: branch.from_bus.value(),
                to: branch.to_bus.value(),
                in_service: branch.status,
            }),
        })
        .filter(|e| labels.contains_key(&e.from) && labels.contains_key(&e.to))
        .collect()
}

/// Places each bus one row below its parent, leaves side by side and every
/// parent centred over its children.
///
/// The root is the first in-service generator's bus. Buses not reachable over
/// in-service branches go on an extra row at the bottom.
pub fn radial_layout(network: &Network) -> LayoutResult {
    let labels = bus_labels(network);
    if labels.is_empty() {
        return LayoutResult::default();
    }
    let edges = branch_edges(network, &labels);

    let mut adjacency: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
    for edge in edges.iter().filter(|e| e.in_service) {
        adjacency.entry(edge.from).or_default().insert(edge.to);
        adjacency.entry(edge.to).or_default().insert(edge.from);
    }

    let root = network
        .generators()
        .into_iter()
        .filter(|g| g.status)
        .map(|g| g.bus.value())
        .find(|b| labels.contains_key(b))
        .or_else(|| labels.keys().next().copied())
        .unwrap_or_default();

    let mut placed: HashMap<usize, (f32, f32)> = HashMap::new();
    let mut next_leaf = 0.0f32;
    place_subtree(root, 0, &adjacency, &mut placed, &mut next_leaf);

    let max_depth = placed.values().map(|&(_, y)| y).fold(0.0f32, f32::max);
    let mut stray_x = 0.0f32;
    for id in labels.keys() {
        if !placed.contains_key(id) {
            placed.insert(*id, (stray_x, max_depth + 1.0));
            stray_x += 1.0;
        }
    }
    if stray_x > 0.0 {
        tracing::debug!(count = stray_x as usize, "buses unreachable from the root");
    }

    let nodes = labels
        .into_iter()
        .map(|(id, label)| {
            let (x, y) = placed.get(&id).copied().unwrap_or_default();
            LayoutNode { id, label, x, y }
        })
        .collect();

    LayoutResult { nodes, edges }
}

// Returns the subtree's x position.
fn place_subtree(
    bus: usize,
    depth: usize,
    adjacency: &BTreeMap<usize, BTreeSet<usize>>,
    placed: &mut HashMap<usize, (f32, f32)>,
    next_leaf: &mut f32,
) -> f32 {
    // reserve before descending so cycles stop here
    placed.insert(bus, (0.0, depth as f32));

    let mut child_xs = Vec::new();
    if let Some(neighbours) = adjacency.get(&bus) {
        for &child in neighbours {
            if !placed.contains_key(&child) {
                child_xs.push(place_subtree(child, depth + 1, adjacency, placed, next_leaf));
            }
        }
    }

    let x = match (child_xs.first(), child_xs.last()) {
        (Some(first), Some(last)) => (first + last) / 2.0,
        _ => {
            let x = *next_leaf;
            *next_leaf += 1.0;
            x
        }
    };
    placed.insert(bus, (x, depth as f32));
    x
}

/// Runs a force-directed layout on the provided `Network`.
pub fn force_layout(network: &Network, iterations: usize) -> LayoutResult {
    let labels = bus_labels(network);
    if labels.is_empty() {
        return LayoutResult::default();
    }
    let edges = branch_edges(network, &labels);

    let mut graph: ForceGraph<usize, ()> = ForceGraph::default();
    let mut index_map = HashMap::new();
    for (&id, label) in &labels {
        let idx = graph.add_force_node(label.clone(), id);
        index_map.insert(id, idx);
    }
    for edge in &edges {
        if let (Some(&from), Some(&to)) = (index_map.get(&edge.from), index_map.get(&edge.to)) {
            graph.add_edge(from, to, ());
        }
    }

    let mut params = SimulationParameters::default();
    params.set_force(fruchterman_reingold(45.0, 0.95));
    let mut simulation = Simulation::from_graph(graph, params);
    for _ in 0..iterations {
        simulation.update(0.02);
    }

    let graph = simulation.get_graph();
    let mut nodes: Vec<LayoutNode> = graph
        .node_indices()
        .map(|idx| {
            let node = &graph[idx];
            LayoutNode {
                id: node.data,
                label: node.name.clone(),
                x: node.location.x,
                y: node.location.y,
            }
        })
        .collect();
    nodes.sort_by_key(|n| n.id);

    LayoutResult { nodes, edges }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feeder() -> Network {
        fdr_io::load_standard_feeder("case33bw").unwrap()
    }

    #[test]
    fn radial_layout_roots_at_the_substation() {
        let layout = radial_layout(&feeder());
        assert_eq!(layout.nodes.len(), 33);
        assert_eq!(layout.edges.len(), 37);
        assert_eq!(layout.edges.iter().filter(|e| !e.in_service).count(), 5);

        let root = layout.node(0).unwrap();
        assert_eq!(root.y, 0.0);
        assert!(layout.nodes.iter().filter(|n| n.id != 0).all(|n| n.y >= 1.0));

        // main trunk 0..=17 is one bus per row
        assert_eq!(layout.node(17).unwrap().y, 17.0);
        // laterals hang off bus 1, 2 and 5
        assert_eq!(layout.node(18).unwrap().y, 2.0);
        assert_eq!(layout.node(22).unwrap().y, 3.0);
        assert_eq!(layout.node(25).unwrap().y, 6.0);
    }

    #[test]
    fn radial_layout_gives_distinct_positions() {
        let layout = radial_layout(&feeder());
        let mut seen = BTreeSet::new();
        for n in &layout.nodes {
            assert!(seen.insert(((n.x * 100.0) as i64, (n.y * 100.0) as i64)));
        }
    }

    #[test]
    fn isolated_bus_goes_below_the_tree() {
        let mut network = feeder();
        network.add_bus(fdr_core::Bus {
            id: fdr_core::BusId::new(40),
            name: "Island".into(),
            ..fdr_core::Bus::default()
        });
        let layout = radial_layout(&network);
        assert_eq!(layout.node(40).unwrap().y, 18.0);
    }

    #[test]
    fn force_layout_covers_every_bus() {
        let layout = force_layout(&feeder(), 20);
        assert_eq!(layout.nodes.len(), 33);
        assert_eq!(layout.edges.len(), 37);
        assert!(layout.nodes.iter().all(|n| n.x.is_finite() && n.y.is_finite()));
    }

    #[test]
    fn empty_network_has_empty_layout() {
        let network = Network::new();
        assert_eq!(radial_layout(&network), LayoutResult::default());
        assert!(radial_layout(&network).bounds().is_none());
    }

    #[test]
    fn layout_kind_parses() {
        assert_eq!("Force".parse::<LayoutKind>().unwrap(), LayoutKind::Force);
        assert_eq!("radial".parse::<LayoutKind>().unwrap(), LayoutKind::Radial);
        assert!("spiral".parse::<LayoutKind>().is_err());
    }
}
