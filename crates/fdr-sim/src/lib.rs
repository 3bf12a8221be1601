//! # fdr-sim: time-series power flow
//!
//! Drives a [`PowerFlowEngine`](fdr_algo::PowerFlowEngine) over a feeder for
//! a fixed number of steps, rescaling loads from a [`LoadProfile`](fdr_ts::LoadProfile)
//! and streaming each step to [`StepSink`]s.
//!
//! ```rust
//! use fdr_algo::AcPowerFlowSolver;
//! use fdr_sim::{Simulation, SimulationConfig, TimeSeriesExport};
//! use fdr_ts::{MemoryWriter, SimulationClock, SinusoidalProfile};
//!
//! let network = fdr_io::load_standard_feeder("case33bw").unwrap();
//! let mut sim = Simulation::new(
//!     network,
//!     AcPowerFlowSolver::new(),
//!     SinusoidalProfile::default(),
//!     SimulationConfig::default(),
//! )
//! .unwrap();
//!
//! let mut export = TimeSeriesExport::new(MemoryWriter::new(), SimulationClock::default());
//! let history = sim.run(&mut [&mut export as &mut dyn fdr_sim::StepSink]).unwrap();
//! assert_eq!(history.len(), 24);
//! assert_eq!(export.writer().len(), 24 * 33);
//! ```

pub mod export;
pub mod history;
pub mod loads;
pub mod simulation;

pub use export::{StepSink, TimeSeriesExport};
pub use history::{HistoryBuffer, HistorySummary, SimulationResult};
pub use loads::OriginalLoads;
pub use simulation::{Simulation, SimulationConfig};
