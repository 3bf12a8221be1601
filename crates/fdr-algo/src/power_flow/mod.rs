//! Power flow engines
//!
//! - [`ac_pf`]: Newton-Raphson AC power flow with a pluggable dense linear backend

use fdr_core::{BusId, FdrResult, Network};
use serde::Serialize;

pub mod ac_pf;

pub use ac_pf::{AcPowerFlowSolver, BusType};

/// A steady-state solver the simulation loop can drive.
///
/// `solve` reads the current load and generator setpoints from the network
/// and writes the solved voltage magnitude and angle back into every bus.
/// A failed solve returns an error and must leave no partial voltages behind.
pub trait PowerFlowEngine {
    fn solve(&self, network: &mut Network) -> FdrResult<PowerFlowReport>;
}

/// Summary of one converged solve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PowerFlowReport {
    /// Newton updates performed before the mismatch fell under tolerance
    pub iterations: usize,
    /// Largest remaining P/Q mismatch (per-unit)
    pub max_mismatch: f64,
    /// Active power drawn from the slack bus (MW)
    pub slack_p_mw: f64,
    /// Reactive power drawn from the slack bus (Mvar)
    pub slack_q_mvar: f64,
    /// Series losses: slack injection minus total demand (MW)
    pub losses_mw: f64,
    pub min_voltage_bus: BusId,
    pub min_voltage_pu: f64,
}
