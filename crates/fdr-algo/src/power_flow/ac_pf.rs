//! # AC Power Flow with Newton-Raphson
//!
//! Polar-form Newton-Raphson on a dense admittance matrix. Each bus is
//! classified as:
//!
//! ```text
//! ┌────────────┬────────────────────┬────────────────────┐
//! │  BUS TYPE  │  SPECIFIED         │  CALCULATED        │
//! ├────────────┼────────────────────┼────────────────────┤
//! │  SLACK     │  V, θ (θ = 0)      │  P, Q              │
//! │  PV        │  P, |V|            │  Q, θ              │
//! │  PQ        │  P, Q              │  |V|, θ            │
//! └────────────┴────────────────────┴────────────────────┘
//! ```
//!
//! Per iteration the solver evaluates the mismatches
//! `ΔP = P_spec - P(V, θ)` and `ΔQ = Q_spec - Q(V, θ)`, stops when
//! `max(|ΔP|, |ΔQ|) < tolerance`, and otherwise solves
//!
//! ```text
//! [ ∂P/∂θ  ∂P/∂V ] [ Δθ ]   [ ΔP ]
//! [ ∂Q/∂θ  ∂Q/∂V ] [ ΔV ] = [ ΔQ ]
//! ```
//!
//! through the configured [`LinearSystemBackend`]. Radial feeders with an
//! R/X ratio near one converge in three to five updates from a flat start.
//!
//! Reference: Tinney & Hart (1967), "Power Flow Solution by Newton's Method",
//! IEEE Trans. PAS 86(11).

use super::{PowerFlowEngine, PowerFlowReport};
use fdr_core::{
    BusId, Edge, FdrError, FdrResult, LinearSystemBackend, Network, Node, PerUnit, Radians,
    SolverKind,
};
use num_complex::Complex64;
use std::collections::HashMap;
use std::sync::Arc;

/// Bus type classification for power flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusType {
    Slack,
    PV,
    PQ,
}

/// Newton-Raphson AC power flow solver
#[derive(Clone)]
pub struct AcPowerFlowSolver {
    /// Convergence tolerance on the largest P/Q mismatch (per-unit)
    pub tolerance: f64,
    /// Maximum Newton updates before giving up
    pub max_iterations: usize,
    /// Start from the voltages stored in the network instead of a flat start
    pub warm_start: bool,
    linear_solver: Arc<dyn LinearSystemBackend>,
}

impl std::fmt::Debug for AcPowerFlowSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcPowerFlowSolver")
            .field("tolerance", &self.tolerance)
            .field("max_iterations", &self.max_iterations)
            .field("warm_start", &self.warm_start)
            .finish_non_exhaustive()
    }
}

impl Default for AcPowerFlowSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl AcPowerFlowSolver {
    pub fn new() -> Self {
        Self {
            tolerance: 1e-8,
            max_iterations: 20,
            warm_start: false,
            linear_solver: SolverKind::default().build_solver(),
        }
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    pub fn with_max_iterations(mut self, max_iter: usize) -> Self {
        self.max_iterations = max_iter;
        self
    }

    pub fn with_warm_start(mut self, enable: bool) -> Self {
        self.warm_start = enable;
        self
    }

    /// Use a specific dense backend for the Jacobian solves.
    pub fn with_linear_solver(mut self, kind: SolverKind) -> Self {
        self.linear_solver = kind.build_solver();
        self
    }

    /// Solve without touching the network; returns per-bus `(|V|, θ)`.
    pub fn solve_voltages(
        &self,
        network: &Network,
    ) -> FdrResult<(HashMap<BusId, (f64, f64)>, PowerFlowReport)> {
        let (buses, bus_idx_map) = collect_buses(network);
        if buses.is_empty() {
            return Err(FdrError::Network("network has no buses".to_string()));
        }

        let generators = collect_generators(network);
        let loads = collect_loads(network);
        let branches = collect_branches(network);
        let bus_types = classify_buses(&buses, &generators)?;

        let n = buses.len();
        let mut v_mag = vec![1.0; n];
        let mut v_ang = vec![0.0; n];

        if self.warm_start {
            for node in network.graph.node_weights() {
                if let Node::Bus(bus) = node {
                    let i = bus_idx_map[&bus.id];
                    if bus.voltage_pu.is_finite() && bus.voltage_pu.value() > 0.0 {
                        v_mag[i] = bus.voltage_pu.value();
                        v_ang[i] = bus.angle_rad.value();
                    }
                }
            }
        }

        // Slack and PV buses hold their generator setpoint
        for gen in &generators {
            if let (Some(&i), Some(setpoint)) = (bus_idx_map.get(&gen.bus), gen.voltage_setpoint) {
                v_mag[i] = setpoint;
                if bus_types[&gen.bus] == BusType::Slack {
                    v_ang[i] = 0.0;
                }
            }
        }

        let y_bus = build_y_bus(n, &bus_idx_map, &branches);
        let (p_spec, q_spec) =
            compute_specified_power(n, &bus_idx_map, &generators, &loads, network.base_mva);

        let nr = self.newton_raphson(
            &buses,
            &bus_types,
            &y_bus,
            &p_spec,
            &q_spec,
            &mut v_mag,
            &mut v_ang,
        )?;

        if !nr.converged {
            return Err(FdrError::Convergence {
                iterations: nr.iterations,
                max_mismatch: nr.max_mismatch,
            });
        }

        let (p_calc, q_calc) = compute_power(&y_bus, &v_mag, &v_ang);
        let slack_idx = buses
            .iter()
            .position(|b| bus_types[b] == BusType::Slack)
            .unwrap_or(0);
        // Bus injection = generation - load, so add the slack's own load back
        let slack_load: (f64, f64) = loads
            .iter()
            .filter(|l| l.bus == buses[slack_idx])
            .fold((0.0, 0.0), |acc, l| (acc.0 + l.p_mw, acc.1 + l.q_mvar));
        let slack_p_mw = p_calc[slack_idx] * network.base_mva + slack_load.0;
        let slack_q_mvar = q_calc[slack_idx] * network.base_mva + slack_load.1;
        let total_gen_fixed: f64 = generators
            .iter()
            .filter(|g| g.bus != buses[slack_idx])
            .map(|g| g.p_mw)
            .sum();
        let total_load: f64 = loads.iter().map(|l| l.p_mw).sum();

        let (min_idx, min_v) = v_mag
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::INFINITY), |best, (i, v)| {
                if v < best.1 {
                    (i, v)
                } else {
                    best
                }
            });

        let report = PowerFlowReport {
            iterations: nr.iterations,
            max_mismatch: nr.max_mismatch,
            slack_p_mw,
            slack_q_mvar,
            losses_mw: slack_p_mw + total_gen_fixed - total_load,
            min_voltage_bus: buses[min_idx],
            min_voltage_pu: min_v,
        };

        let voltages = buses
            .iter()
            .enumerate()
            .map(|(i, &id)| (id, (v_mag[i], v_ang[i])))
            .collect();

        Ok((voltages, report))
    }

    #[allow(clippy::too_many_arguments)]
    fn newton_raphson(
        &self,
        buses: &[BusId],
        bus_types: &HashMap<BusId, BusType>,
        y_bus: &[Vec<Complex64>],
        p_spec: &[f64],
        q_spec: &[f64],
        v_mag: &mut [f64],
        v_ang: &mut [f64],
    ) -> FdrResult<NRResult> {
        let mut p_buses: Vec<usize> = Vec::new();
        let mut q_buses: Vec<usize> = Vec::new();

        for (i, bus_id) in buses.iter().enumerate() {
            let bus_type = bus_types.get(bus_id).copied().unwrap_or(BusType::PQ);
            if bus_type != BusType::Slack {
                p_buses.push(i);
            }
            if bus_type == BusType::PQ {
                q_buses.push(i);
            }
        }

        let n_p = p_buses.len();
        let n_vars = n_p + q_buses.len();
        if n_vars == 0 {
            return Ok(NRResult {
                converged: true,
                iterations: 0,
                max_mismatch: 0.0,
            });
        }

        let mut iteration = 0;
        loop {
            let (p_calc, q_calc) = compute_power(y_bus, v_mag, v_ang);

            let mut mismatch = vec![0.0; n_vars];
            for (k, &i) in p_buses.iter().enumerate() {
                mismatch[k] = p_spec[i] - p_calc[i];
            }
            for (k, &i) in q_buses.iter().enumerate() {
                mismatch[n_p + k] = q_spec[i] - q_calc[i];
            }
            let max_mismatch = mismatch.iter().fold(0.0_f64, |m, d| m.max(d.abs()));

            if !max_mismatch.is_finite() {
                tracing::debug!(iteration, "newton-raphson diverged");
                return Ok(NRResult {
                    converged: false,
                    iterations: iteration,
                    max_mismatch,
                });
            }
            if max_mismatch < self.tolerance {
                return Ok(NRResult {
                    converged: true,
                    iterations: iteration,
                    max_mismatch,
                });
            }
            if iteration >= self.max_iterations {
                return Ok(NRResult {
                    converged: false,
                    iterations: iteration,
                    max_mismatch,
                });
            }

            tracing::trace!(iteration, max_mismatch, "newton-raphson step");

            let jacobian = build_jacobian(y_bus, v_mag, v_ang, &p_buses, &q_buses);
            let delta = self.linear_solver.solve(&jacobian, &mismatch)?;

            for (k, &i) in p_buses.iter().enumerate() {
                v_ang[i] += delta[k];
            }
            for (k, &i) in q_buses.iter().enumerate() {
                v_mag[i] += delta[n_p + k];
            }
            iteration += 1;
        }
    }
}

impl PowerFlowEngine for AcPowerFlowSolver {
    fn solve(&self, network: &mut Network) -> FdrResult<PowerFlowReport> {
        let (voltages, report) = self.solve_voltages(network)?;

        for node in network.graph.node_weights_mut() {
            if let Node::Bus(bus) = node {
                if let Some(&(vm, va)) = voltages.get(&bus.id) {
                    bus.voltage_pu = PerUnit(vm);
                    bus.angle_rad = Radians(va);
                }
            }
        }

        tracing::debug!(
            iterations = report.iterations,
            losses_mw = report.losses_mw,
            min_v = report.min_voltage_pu,
            "ac power flow converged"
        );
        Ok(report)
    }
}

fn collect_buses(network: &Network) -> (Vec<BusId>, HashMap<BusId, usize>) {
    let buses = network.bus_ids();
    let bus_idx_map = buses.iter().enumerate().map(|(i, &id)| (id, i)).collect();
    (buses, bus_idx_map)
}

fn collect_generators(network: &Network) -> Vec<GeneratorData> {
    network
        .generators()
        .into_iter()
        .filter(|g| g.status)
        .map(|g| GeneratorData {
            bus: g.bus,
            p_mw: g.active_power.value(),
            q_mvar: g.reactive_power.value(),
            voltage_setpoint: g.voltage_setpoint.map(|v| v.value()),
        })
        .collect()
}

fn collect_loads(network: &Network) -> Vec<LoadData> {
    network
        .loads()
        .into_iter()
        .map(|l| LoadData {
            bus: l.bus,
            p_mw: l.active_power.value(),
            q_mvar: l.reactive_power.value(),
        })
        .collect()
}

fn collect_branches(network: &Network) -> Vec<BranchData> {
    network
        .graph
        .edge_weights()
        .filter_map(|edge| match edge {
            Edge::Branch(branch) if branch.status => Some(BranchData {
                from_bus: branch.from_bus,
                to_bus: branch.to_bus,
                r_pu: branch.resistance,
                x_pu: branch.reactance,
                b_pu: branch.charging_b.value(),
                tap: branch.tap_ratio,
                shift: branch.phase_shift.value(),
            }),
            _ => None,
        })
        .collect()
}

/// The first in-service generator's bus is the slack; other generator buses are PV.
fn classify_buses(
    buses: &[BusId],
    generators: &[GeneratorData],
) -> FdrResult<HashMap<BusId, BusType>> {
    let mut bus_types: HashMap<BusId, BusType> =
        buses.iter().map(|&id| (id, BusType::PQ)).collect();

    let mut slack = None;
    for gen in generators {
        if !bus_types.contains_key(&gen.bus) {
            continue;
        }
        match slack {
            None => {
                bus_types.insert(gen.bus, BusType::Slack);
                slack = Some(gen.bus);
            }
            Some(slack_bus) if slack_bus != gen.bus && gen.voltage_setpoint.is_some() => {
                bus_types.insert(gen.bus, BusType::PV);
            }
            _ => {}
        }
    }

    if slack.is_none() {
        return Err(FdrError::Network(
            "no in-service generator to act as slack bus".to_string(),
        ));
    }
    Ok(bus_types)
}

fn build_y_bus(
    n: usize,
    bus_idx_map: &HashMap<BusId, usize>,
    branches: &[BranchData],
) -> Vec<Vec<Complex64>> {
    let mut y_bus = vec![vec![Complex64::new(0.0, 0.0); n]; n];

    for branch in branches {
        let Some(&i) = bus_idx_map.get(&branch.from_bus) else {
            continue;
        };
        let Some(&j) = bus_idx_map.get(&branch.to_bus) else {
            continue;
        };

        let z = Complex64::new(branch.r_pu, branch.x_pu);
        if z.norm_sqr() < 1e-24 {
            continue;
        }
        let y_series = z.inv();
        let y_shunt = Complex64::new(0.0, branch.b_pu / 2.0);

        let tap_mag = if branch.tap > 0.0 { branch.tap } else { 1.0 };
        let tap = Complex64::from_polar(tap_mag, branch.shift);

        y_bus[i][j] -= y_series / tap.conj();
        y_bus[j][i] -= y_series / tap;
        y_bus[i][i] += y_series / (tap_mag * tap_mag) + y_shunt;
        y_bus[j][j] += y_series + y_shunt;
    }

    y_bus
}

fn compute_specified_power(
    n: usize,
    bus_idx_map: &HashMap<BusId, usize>,
    generators: &[GeneratorData],
    loads: &[LoadData],
    base_mva: f64,
) -> (Vec<f64>, Vec<f64>) {
    let mut p_spec = vec![0.0; n];
    let mut q_spec = vec![0.0; n];

    for gen in generators {
        if let Some(&idx) = bus_idx_map.get(&gen.bus) {
            p_spec[idx] += gen.p_mw;
            q_spec[idx] += gen.q_mvar;
        }
    }
    for load in loads {
        if let Some(&idx) = bus_idx_map.get(&load.bus) {
            p_spec[idx] -= load.p_mw;
            q_spec[idx] -= load.q_mvar;
        }
    }

    for value in p_spec.iter_mut().chain(q_spec.iter_mut()) {
        *value /= base_mva;
    }
    (p_spec, q_spec)
}

/// P and Q injections at every bus for the given voltage state.
fn compute_power(y_bus: &[Vec<Complex64>], v_mag: &[f64], v_ang: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let n = v_mag.len();
    let mut p = vec![0.0; n];
    let mut q = vec![0.0; n];

    for i in 0..n {
        for j in 0..n {
            let y = y_bus[i][j];
            if y.re == 0.0 && y.im == 0.0 {
                continue;
            }
            let (sin_t, cos_t) = (v_ang[i] - v_ang[j]).sin_cos();
            let vv = v_mag[i] * v_mag[j];
            p[i] += vv * (y.re * cos_t + y.im * sin_t);
            q[i] += vv * (y.re * sin_t - y.im * cos_t);
        }
    }

    (p, q)
}

fn build_jacobian(
    y_bus: &[Vec<Complex64>],
    v_mag: &[f64],
    v_ang: &[f64],
    p_buses: &[usize],
    q_buses: &[usize],
) -> Vec<Vec<f64>> {
    let n_p = p_buses.len();
    let n_vars = n_p + q_buses.len();
    let (p, q) = compute_power(y_bus, v_mag, v_ang);

    let mut jacobian = vec![vec![0.0; n_vars]; n_vars];

    // J11: ∂P/∂θ
    for (row, &i) in p_buses.iter().enumerate() {
        for (col, &j) in p_buses.iter().enumerate() {
            jacobian[row][col] = dp_dtheta(y_bus, v_mag, v_ang, &q, i, j);
        }
    }
    // J12: ∂P/∂V
    for (row, &i) in p_buses.iter().enumerate() {
        for (col, &j) in q_buses.iter().enumerate() {
            jacobian[row][n_p + col] = dp_dv(y_bus, v_mag, v_ang, &p, i, j);
        }
    }
    // J21: ∂Q/∂θ
    for (row, &i) in q_buses.iter().enumerate() {
        for (col, &j) in p_buses.iter().enumerate() {
            jacobian[n_p + row][col] = dq_dtheta(y_bus, v_mag, v_ang, &p, i, j);
        }
    }
    // J22: ∂Q/∂V
    for (row, &i) in q_buses.iter().enumerate() {
        for (col, &j) in q_buses.iter().enumerate() {
            jacobian[n_p + row][n_p + col] = dq_dv(y_bus, v_mag, v_ang, &q, i, j);
        }
    }

    jacobian
}

fn dp_dtheta(y: &[Vec<Complex64>], v: &[f64], a: &[f64], q: &[f64], i: usize, j: usize) -> f64 {
    let y_ij = y[i][j];
    if i == j {
        // -Q_i - B_ii V_i²
        -q[i] - y_ij.im * v[i] * v[i]
    } else {
        let (s, c) = (a[i] - a[j]).sin_cos();
        v[i] * v[j] * (y_ij.re * s - y_ij.im * c)
    }
}

fn dp_dv(y: &[Vec<Complex64>], v: &[f64], a: &[f64], p: &[f64], i: usize, j: usize) -> f64 {
    let y_ij = y[i][j];
    if i == j {
        // P_i / V_i + G_ii V_i
        p[i] / v[i] + y_ij.re * v[i]
    } else {
        let (s, c) = (a[i] - a[j]).sin_cos();
        v[i] * (y_ij.re * c + y_ij.im * s)
    }
}

fn dq_dtheta(y: &[Vec<Complex64>], v: &[f64], a: &[f64], p: &[f64], i: usize, j: usize) -> f64 {
    let y_ij = y[i][j];
    if i == j {
        // P_i - G_ii V_i²
        p[i] - y_ij.re * v[i] * v[i]
    } else {
        let (s, c) = (a[i] - a[j]).sin_cos();
        -v[i] * v[j] * (y_ij.re * c + y_ij.im * s)
    }
}

fn dq_dv(y: &[Vec<Complex64>], v: &[f64], a: &[f64], q: &[f64], i: usize, j: usize) -> f64 {
    let y_ij = y[i][j];
    if i == j {
        // Q_i / V_i - B_ii V_i
        q[i] / v[i] - y_ij.im * v[i]
    } else {
        let (s, c) = (a[i] - a[j]).sin_cos();
        v[i] * (y_ij.re * s - y_ij.im * c)
    }
}

struct NRResult {
    converged: bool,
    iterations: usize,
    max_mismatch: f64,
}

#[derive(Debug, Clone)]
struct GeneratorData {
    bus: BusId,
    p_mw: f64,
    q_mvar: f64,
    voltage_setpoint: Option<f64>,
}

#[derive(Debug, Clone)]
struct LoadData {
    bus: BusId,
    p_mw: f64,
    q_mvar: f64,
}

#[derive(Debug, Clone)]
struct BranchData {
    from_bus: BusId,
    to_bus: BusId,
    r_pu: f64,
    x_pu: f64,
    b_pu: f64,
    tap: f64,
    shift: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use fdr_core::{Branch, BranchId, Bus, Gen, GenId, Kilovolts, Load, LoadId, Megavars, Megawatts};

    fn two_bus(load_mw: f64, load_mvar: f64) -> Network {
        let mut network = Network::new();
        for i in 0..2 {
            network.add_bus(Bus {
                id: BusId::new(i),
                name: format!("bus{}", i),
                base_kv: Kilovolts(100.0),
                ..Bus::default()
            });
        }
        network
            .connect(Branch::new(
                BranchId::new(0),
                "line".to_string(),
                BusId::new(0),
                BusId::new(1),
                0.01,
                0.1,
            ))
            .unwrap();
        network.add_gen(Gen::new(GenId::new(0), "gen".to_string(), BusId::new(0)));
        network.add_load(Load {
            id: LoadId::new(0),
            name: "load".to_string(),
            bus: BusId::new(1),
            active_power: Megawatts(load_mw),
            reactive_power: Megavars(load_mvar),
        });
        network
    }

    #[test]
    fn two_bus_converges_and_writes_voltages() {
        let mut network = two_bus(50.0, 10.0);
        let report = AcPowerFlowSolver::new().solve(&mut network).unwrap();

        assert!(report.iterations <= 10);
        assert!(report.max_mismatch < 1e-8);
        assert_eq!(report.min_voltage_bus, BusId::new(1));

        let voltages = network.bus_voltages();
        assert_eq!(voltages[&BusId::new(0)], 1.0);
        let v1 = voltages[&BusId::new(1)];
        assert!(v1 < 1.0 && v1 > 0.9, "v1 = {v1}");
        // slack supplies the load plus I²R losses
        assert!(report.slack_p_mw > 50.0);
        assert!(report.losses_mw > 0.0 && report.losses_mw < 1.0);
    }

    #[test]
    fn no_load_gives_flat_profile() {
        let mut network = two_bus(0.0, 0.0);
        let report = AcPowerFlowSolver::new().solve(&mut network).unwrap();
        assert_eq!(report.iterations, 0);
        for v in network.bus_voltages().values() {
            assert!((v - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn iteration_cap_reports_convergence_failure() {
        let mut network = two_bus(50.0, 10.0);
        let before = network.bus_voltages();
        let err = AcPowerFlowSolver::new()
            .with_max_iterations(1)
            .solve(&mut network)
            .unwrap_err();

        match err {
            FdrError::Convergence {
                iterations,
                max_mismatch,
            } => {
                assert_eq!(iterations, 1);
                assert!(max_mismatch > 1e-8);
            }
            other => panic!("expected convergence failure, got {other:?}"),
        }
        // failed solves leave the stored voltages untouched
        assert_eq!(network.bus_voltages(), before);
    }

    #[test]
    fn missing_slack_is_a_network_error() {
        let mut network = Network::new();
        network.add_bus(Bus::default());
        let err = AcPowerFlowSolver::new().solve(&mut network).unwrap_err();
        assert!(matches!(err, FdrError::Network(_)));
    }

    #[test]
    fn backends_give_same_solution() {
        let network = two_bus(40.0, 20.0);
        let (faer, _) = AcPowerFlowSolver::new()
            .with_linear_solver(SolverKind::Faer)
            .solve_voltages(&network)
            .unwrap();
        let (gauss, _) = AcPowerFlowSolver::new()
            .with_linear_solver(SolverKind::Gauss)
            .solve_voltages(&network)
            .unwrap();
        for (bus, (vm, va)) in &faer {
            let (gm, ga) = gauss[bus];
            assert!((vm - gm).abs() < 1e-9);
            assert!((va - ga).abs() < 1e-9);
        }
    }

    #[test]
    fn jacobian_diagonal_matches_finite_difference() {
        let network = two_bus(30.0, 5.0);
        let (buses, idx) = collect_buses(&network);
        let y_bus = build_y_bus(buses.len(), &idx, &collect_branches(&network));
        let v_mag = vec![1.0, 0.97];
        let v_ang = vec![0.0, -0.03];

        let jac = build_jacobian(&y_bus, &v_mag, &v_ang, &[1], &[1]);

        let h = 1e-7;
        let (p0, q0) = compute_power(&y_bus, &v_mag, &v_ang);
        let (p1, q1) = compute_power(&y_bus, &v_mag, &[0.0, -0.03 + h]);
        let (p2, q2) = compute_power(&y_bus, &[1.0, 0.97 + h], &v_ang);

        assert!((jac[0][0] - (p1[1] - p0[1]) / h).abs() < 1e-4);
        assert!((jac[1][0] - (q1[1] - q0[1]) / h).abs() < 1e-4);
        assert!((jac[0][1] - (p2[1] - p0[1]) / h).abs() < 1e-4);
        assert!((jac[1][1] - (q2[1] - q0[1]) / h).abs() < 1e-4);
    }
}
