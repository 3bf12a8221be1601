//! # fdr-core: feeder network model
//!
//! Data structures shared by every crate in the workspace: the network graph,
//! its elements, typed IDs, unit newtypes, the error type and the dense
//! linear-system backends used by the power flow.
//!
//! ## Design
//!
//! A network is an **undirected multigraph**:
//! - **Nodes**: buses, generators and loads
//! - **Edges**: branches (lines, transformers, switches)
//!
//! Generators and loads are nodes of their own that reference a bus by
//! [`BusId`]. Topology is fixed once built; a time-series run only rewrites
//! load powers ([`Network::set_load_power`]) and bus voltage results
//! ([`Network::set_bus_voltage`]).
//!
//! ```rust
//! use fdr_core::*;
//!
//! let mut network = Network::new().with_base_mva(10.0);
//! network.add_bus(Bus {
//!     id: BusId::new(1),
//!     name: "Bus 1".to_string(),
//!     base_kv: Kilovolts(12.66),
//!     ..Bus::default()
//! });
//! network.add_bus(Bus {
//!     id: BusId::new(2),
//!     name: "Bus 2".to_string(),
//!     base_kv: Kilovolts(12.66),
//!     ..Bus::default()
//! });
//! network.add_gen(Gen::new(GenId::new(1), "Substation".to_string(), BusId::new(1)));
//! network.add_load(Load {
//!     id: LoadId::new(1),
//!     name: "Load 2".to_string(),
//!     bus: BusId::new(2),
//!     active_power: Megawatts(0.1),
//!     reactive_power: Megavars(0.06),
//! });
//! network
//!     .connect(Branch::new(
//!         BranchId::new(1),
//!         "Line 1-2".to_string(),
//!         BusId::new(1),
//!         BusId::new(2),
//!         0.0058,
//!         0.0029,
//!     ))
//!     .unwrap();
//!
//! assert_eq!(network.stats().num_buses, 2);
//! ```

use petgraph::graph::EdgeIndex;
use petgraph::{prelude::*, Undirected};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod diagnostics;
pub mod error;
pub mod solver;
pub mod units;

pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{FdrError, FdrResult};
pub use petgraph::graph::NodeIndex;
pub use solver::*;
pub use units::{Kilovolts, Megavars, Megawatts, PerUnit, Radians};

macro_rules! id_type {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(usize);

        impl $name {
            #[inline]
            pub fn new(value: usize) -> Self {
                $name(value)
            }
            #[inline]
            pub fn value(&self) -> usize {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(BusId);
id_type!(BranchId);
id_type!(GenId);
id_type!(LoadId);

#[derive(Debug, Clone)]
pub struct Bus {
    pub id: BusId,
    pub name: String,
    /// Base voltage in kilovolts (for per-unit conversions)
    pub base_kv: Kilovolts,
    /// Voltage magnitude in per-unit, overwritten by each power flow solve
    pub voltage_pu: PerUnit,
    /// Voltage angle in radians, overwritten by each power flow solve
    pub angle_rad: Radians,
    pub vmin_pu: Option<PerUnit>,
    pub vmax_pu: Option<PerUnit>,
}

impl Default for Bus {
    fn default() -> Self {
        Self {
            id: BusId(0),
            name: String::new(),
            base_kv: Kilovolts(0.0),
            voltage_pu: PerUnit(1.0),
            angle_rad: Radians(0.0),
            vmin_pu: None,
            vmax_pu: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
    pub from_bus: BusId,
    pub to_bus: BusId,
    /// Series resistance (per-unit)
    pub resistance: f64,
    /// Series reactance (per-unit)
    pub reactance: f64,
    /// Multiplicative tap magnitude applied from from_bus to to_bus
    pub tap_ratio: f64,
    /// Phase shift applied from from_bus to to_bus
    pub phase_shift: Radians,
    /// Total line charging susceptance (per-unit, split half/half)
    pub charging_b: PerUnit,
    /// In service; open tie switches are `false`
    pub status: bool,
}

impl Default for Branch {
    fn default() -> Self {
        Self {
            id: BranchId(0),
            name: String::new(),
            from_bus: BusId(0),
            to_bus: BusId(0),
            resistance: 0.0,
            reactance: 0.0,
            tap_ratio: 1.0,
            phase_shift: Radians(0.0),
            charging_b: PerUnit(0.0),
            status: true,
        }
    }
}

impl Branch {
    pub fn new(
        id: BranchId,
        name: String,
        from_bus: BusId,
        to_bus: BusId,
        resistance: f64,
        reactance: f64,
    ) -> Self {
        Self {
            id,
            name,
            from_bus,
            to_bus,
            resistance,
            reactance,
            ..Self::default()
        }
    }

    /// Mark the branch as an open switch (kept in the topology, carries no flow).
    pub fn open(mut self) -> Self {
        self.status = false;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Gen {
    pub id: GenId,
    pub name: String,
    pub bus: BusId,
    /// Scheduled active power output (MW)
    pub active_power: Megawatts,
    /// Scheduled reactive power output (Mvar)
    pub reactive_power: Megavars,
    pub status: bool,
    /// Voltage setpoint (per-unit); the slack generator holds its bus here
    pub voltage_setpoint: Option<PerUnit>,
}

impl Gen {
    pub fn new(id: GenId, name: String, bus: BusId) -> Self {
        Self {
            id,
            name,
            bus,
            active_power: Megawatts(0.0),
            reactive_power: Megavars(0.0),
            status: true,
            voltage_setpoint: None,
        }
    }

    pub fn with_voltage_setpoint(mut self, v_pu: f64) -> Self {
        self.voltage_setpoint = Some(PerUnit(v_pu));
        self
    }
}

#[derive(Debug, Clone)]
pub struct Load {
    pub id: LoadId,
    pub name: String,
    pub bus: BusId,
    /// Active power demand (MW)
    pub active_power: Megawatts,
    /// Reactive power demand (Mvar)
    pub reactive_power: Megavars,
}

#[derive(Debug, Clone)]
pub enum Node {
    Bus(Bus),
    Gen(Gen),
    Load(Load),
}

#[derive(Debug, Clone)]
pub enum Edge {
    Branch(Branch),
}

/// The feeder network graph
#[derive(Debug, Clone)]
pub struct Network {
    pub graph: Graph<Node, Edge, Undirected>,
    /// System MVA base for per-unit conversion
    pub base_mva: f64,
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl Network {
    pub fn new() -> Self {
        Self {
            graph: Graph::new_undirected(),
            base_mva: 100.0,
        }
    }

    pub fn with_base_mva(mut self, base_mva: f64) -> Self {
        self.base_mva = base_mva;
        self
    }

    pub fn add_bus(&mut self, bus: Bus) -> NodeIndex {
        self.graph.add_node(Node::Bus(bus))
    }

    pub fn add_gen(&mut self, gen: Gen) -> NodeIndex {
        self.graph.add_node(Node::Gen(gen))
    }

    pub fn add_load(&mut self, load: Load) -> NodeIndex {
        self.graph.add_node(Node::Load(load))
    }

    /// Add a branch between two buses that are already in the graph.
    pub fn connect(&mut self, branch: Branch) -> FdrResult<EdgeIndex> {
        let from = self.bus_node(branch.from_bus).ok_or_else(|| {
            FdrError::Network(format!(
                "branch '{}' references unknown bus {}",
                branch.name, branch.from_bus
            ))
        })?;
        let to = self.bus_node(branch.to_bus).ok_or_else(|| {
            FdrError::Network(format!(
                "branch '{}' references unknown bus {}",
                branch.name, branch.to_bus
            ))
        })?;
        Ok(self.graph.add_edge(from, to, Edge::Branch(branch)))
    }

    /// Graph index of the bus with the given id.
    pub fn bus_node(&self, bus_id: BusId) -> Option<NodeIndex> {
        self.graph.node_indices().find(|&idx| match &self.graph[idx] {
            Node::Bus(bus) => bus.id == bus_id,
            _ => false,
        })
    }

    /// Compute basic statistics about the network
    pub fn stats(&self) -> NetworkStats {
        let mut stats = NetworkStats::default();

        for node in self.graph.node_weights() {
            match node {
                Node::Bus(_) => stats.num_buses += 1,
                Node::Gen(_) => stats.num_gens += 1,
                Node::Load(l) => {
                    stats.num_loads += 1;
                    stats.total_load_mw += l.active_power.value();
                    stats.total_load_mvar += l.reactive_power.value();
                }
            }
        }

        for edge in self.graph.edge_weights() {
            let Edge::Branch(branch) = edge;
            if branch.status {
                stats.num_branches += 1;
            } else {
                stats.num_open_branches += 1;
            }
        }
        stats
    }

    /// Validate network data for common issues that cause solver failures.
    pub fn validate_into(&self, diag: &mut Diagnostics) {
        let stats = self.stats();

        if stats.num_buses == 0 {
            diag.add_error("structure", "Network has no buses");
            return;
        }

        if stats.num_loads == 0 {
            diag.add_warning("structure", "Network has no loads");
        }

        if stats.num_gens == 0 {
            diag.add_error("structure", "Network has no generators (no slack bus)");
        }

        if stats.num_branches == 0 && stats.num_buses > 1 {
            diag.add_error("structure", "Network has multiple buses but no branches");
        }

        if !(self.base_mva.is_finite() && self.base_mva > 0.0) {
            diag.add_error(
                "physical",
                &format!("Base MVA must be positive, got {}", self.base_mva),
            );
        }

        let bus_ids: Vec<BusId> = self.bus_ids();
        for node in self.graph.node_weights() {
            match node {
                Node::Load(l) if !bus_ids.contains(&l.bus) => diag.add_error_with_entity(
                    "reference",
                    &format!("Load references unknown bus {}", l.bus),
                    &l.name,
                ),
                Node::Gen(g) if !bus_ids.contains(&g.bus) => diag.add_error_with_entity(
                    "reference",
                    &format!("Generator references unknown bus {}", g.bus),
                    &g.name,
                ),
                _ => {}
            }
        }

        for branch in self.branches() {
            if branch.status && branch.resistance.abs() < 1e-12 && branch.reactance.abs() < 1e-12
            {
                diag.add_warning_with_entity(
                    "physical",
                    "Zero-impedance branch is skipped by the power flow",
                    &branch.name,
                );
            }
        }

        // A radial feeder has exactly one fewer closed branch than buses.
        if stats.num_branches + 1 != stats.num_buses {
            diag.add_warning(
                "structure",
                &format!(
                    "Network is not radial: {} buses, {} closed branches",
                    stats.num_buses, stats.num_branches
                ),
            );
        }
    }

    /// Get total active power load (MW)
    pub fn total_load_mw(&self) -> f64 {
        self.loads().iter().map(|l| l.active_power.value()).sum()
    }

    /// Get total reactive power load (Mvar)
    pub fn total_load_mvar(&self) -> f64 {
        self.loads().iter().map(|l| l.reactive_power.value()).sum()
    }

    /// Find loads at a specific bus
    pub fn loads_at_bus(&self, bus_id: BusId) -> Vec<&Load> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Load(l) if l.bus == bus_id => Some(l),
                _ => None,
            })
            .collect()
    }

    pub fn buses(&self) -> Vec<&Bus> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Bus(b) => Some(b),
                _ => None,
            })
            .collect()
    }

    /// Bus ids in ascending order.
    pub fn bus_ids(&self) -> Vec<BusId> {
        let mut ids: Vec<BusId> = self.buses().iter().map(|b| b.id).collect();
        ids.sort();
        ids
    }

    pub fn generators(&self) -> Vec<&Gen> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Gen(g) => Some(g),
                _ => None,
            })
            .collect()
    }

    pub fn loads(&self) -> Vec<&Load> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Load(l) => Some(l),
                _ => None,
            })
            .collect()
    }

    /// All branches, including open ones.
    pub fn branches(&self) -> Vec<&Branch> {
        self.graph
            .edge_weights()
            .map(|e| match e {
                Edge::Branch(b) => b,
            })
            .collect()
    }

    /// Overwrite the demand of one load.
    pub fn set_load_power(
        &mut self,
        load_id: LoadId,
        active_power: Megawatts,
        reactive_power: Megavars,
    ) -> FdrResult<()> {
        for node in self.graph.node_weights_mut() {
            if let Node::Load(load) = node {
                if load.id == load_id {
                    load.active_power = active_power;
                    load.reactive_power = reactive_power;
                    return Ok(());
                }
            }
        }
        Err(FdrError::Network(format!("unknown load {}", load_id)))
    }

    /// Overwrite the solved voltage of one bus.
    pub fn set_bus_voltage(
        &mut self,
        bus_id: BusId,
        voltage_pu: PerUnit,
        angle_rad: Radians,
    ) -> FdrResult<()> {
        for node in self.graph.node_weights_mut() {
            if let Node::Bus(bus) = node {
                if bus.id == bus_id {
                    bus.voltage_pu = voltage_pu;
                    bus.angle_rad = angle_rad;
                    return Ok(());
                }
            }
        }
        Err(FdrError::Network(format!("unknown bus {}", bus_id)))
    }

    /// Current voltage magnitude of every bus, keyed by bus id.
    pub fn bus_voltages(&self) -> BTreeMap<BusId, f64> {
        self.buses()
            .into_iter()
            .map(|b| (b.id, b.voltage_pu.value()))
            .collect()
    }
}

/// Statistics about a network's size and demand
#[derive(Debug, Clone, Default, Serialize)]
pub struct NetworkStats {
    pub num_buses: usize,
    pub num_gens: usize,
    pub num_loads: usize,
    /// Closed (in-service) branches
    pub num_branches: usize,
    pub num_open_branches: usize,
    pub total_load_mw: f64,
    pub total_load_mvar: f64,
}

impl std::fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} buses, {} branches ({} open), {} gens, {} loads ({:.3} MW, {:.3} Mvar)",
            self.num_buses,
            self.num_branches,
            self.num_open_branches,
            self.num_gens,
            self.num_loads,
            self.total_load_mw,
            self.total_load_mvar
        )
    }
}

impl Node {
    /// Returns a human-readable label for the node (bus/gen/load name).
    pub fn label(&self) -> &str {
        match self {
            Node::Bus(bus) => &bus.name,
            Node::Gen(gen) => &gen.name,
            Node::Load(load) => &load.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_bus_network() -> Network {
        let mut network = Network::new().with_base_mva(10.0);
        network.add_bus(Bus {
            id: BusId(1),
            name: "Bus 1".to_string(),
            base_kv: Kilovolts(12.66),
            ..Bus::default()
        });
        network.add_bus(Bus {
            id: BusId(2),
            name: "Bus 2".to_string(),
            base_kv: Kilovolts(12.66),
            ..Bus::default()
        });
        network.add_gen(Gen::new(GenId(1), "Gen 1".to_string(), BusId(1)));
        network.add_load(Load {
            id: LoadId(1),
            name: "Load 1".to_string(),
            bus: BusId(2),
            active_power: Megawatts(0.1),
            reactive_power: Megavars(0.06),
        });
        network
            .connect(Branch::new(
                BranchId(1),
                "Branch 1-2".to_string(),
                BusId(1),
                BusId(2),
                0.01,
                0.02,
            ))
            .unwrap();
        network
    }

    #[test]
    fn test_network_creation() {
        let network = two_bus_network();

        assert_eq!(network.graph.node_count(), 4);
        assert_eq!(network.graph.edge_count(), 1);
        assert_eq!(network.bus_ids(), vec![BusId(1), BusId(2)]);
    }

    #[test]
    fn test_connect_rejects_unknown_bus() {
        let mut network = two_bus_network();
        let err = network
            .connect(Branch::new(
                BranchId(2),
                "dangling".to_string(),
                BusId(2),
                BusId(9),
                0.01,
                0.01,
            ))
            .unwrap_err();
        assert!(matches!(err, FdrError::Network(_)));
    }

    #[test]
    fn test_network_validation_empty() {
        let network = Network::new();
        let mut diag = Diagnostics::new();
        network.validate_into(&mut diag);
        assert!(diag.has_errors());
        assert!(diag.errors().any(|i| i.message.contains("no buses")));
    }

    #[test]
    fn test_network_stats_and_validation() {
        let mut network = two_bus_network();
        network
            .connect(
                Branch::new(
                    BranchId(2),
                    "Tie".to_string(),
                    BusId(2),
                    BusId(1),
                    0.1,
                    0.1,
                )
                .open(),
            )
            .unwrap();

        let stats = network.stats();
        assert_eq!(stats.num_buses, 2);
        assert_eq!(stats.num_gens, 1);
        assert_eq!(stats.num_loads, 1);
        assert_eq!(stats.num_branches, 1);
        assert_eq!(stats.num_open_branches, 1);
        assert!((stats.total_load_mw - 0.1).abs() < 1e-12);

        let mut diag = Diagnostics::new();
        network.validate_into(&mut diag);
        assert!(!diag.has_errors(), "{}", diag);
        assert_eq!(diag.warning_count(), 0, "{}", diag);
    }

    #[test]
    fn test_validation_flags_missing_generator() {
        let mut network = Network::new();
        network.add_bus(Bus::default());
        let mut diag = Diagnostics::new();
        network.validate_into(&mut diag);
        assert!(diag.errors().any(|i| i.message.contains("no generators")));
    }

    #[test]
    fn test_set_load_power_overwrites_in_place() {
        let mut network = two_bus_network();
        network
            .set_load_power(LoadId(1), Megawatts(0.2), Megavars(0.1))
            .unwrap();

        let loads = network.loads_at_bus(BusId(2));
        assert_eq!(loads.len(), 1);
        assert_eq!(loads[0].active_power, Megawatts(0.2));
        assert_eq!(loads[0].reactive_power, Megavars(0.1));
        assert!(network
            .set_load_power(LoadId(7), Megawatts(0.0), Megavars(0.0))
            .is_err());
    }

    #[test]
    fn test_bus_voltages_follow_updates() {
        let mut network = two_bus_network();
        network
            .set_bus_voltage(BusId(2), PerUnit(0.97), Radians(-0.01))
            .unwrap();
        let voltages = network.bus_voltages();
        assert_eq!(voltages.len(), 2);
        assert_eq!(voltages[&BusId(1)], 1.0);
        assert_eq!(voltages[&BusId(2)], 0.97);
    }
}
