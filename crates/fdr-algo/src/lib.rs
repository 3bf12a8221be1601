//! # fdr-algo: power flow for feeder simulations
//!
//! The time-series loop only depends on the [`PowerFlowEngine`] trait; the
//! shipped implementation is [`AcPowerFlowSolver`], a dense Newton-Raphson
//! solver sized for distribution feeders of a few dozen buses.
//!
//! ```rust
//! use fdr_algo::{AcPowerFlowSolver, PowerFlowEngine};
//!
//! let mut network = fdr_io::load_standard_feeder("case33bw").unwrap();
//! let report = AcPowerFlowSolver::new().solve(&mut network).unwrap();
//! assert!(report.min_voltage_pu > 0.9);
//! ```

pub mod power_flow;

pub use power_flow::{AcPowerFlowSolver, BusType, PowerFlowEngine, PowerFlowReport};
