//! The time-series loop.
//!
//! Per step `t`:
//!
//! 1. `scale = profile.scale(t)`
//! 2. every load is set to `original × scale`
//! 3. the engine solves the network once
//! 4. the result is appended to the history, then handed to each sink in order
//!
//! The first failure stops the run with [`FdrError::Step`]; results recorded
//! before it stay readable through [`Simulation::history`].

use crate::export::StepSink;
use crate::history::{HistoryBuffer, SimulationResult};
use crate::loads::OriginalLoads;
use fdr_algo::PowerFlowEngine;
use fdr_core::{FdrError, FdrResult, Network};
use fdr_ts::LoadProfile;
use std::time::Duration;

/// Step count, pacing and voltage band for one time-series run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Number of steps to run
    pub steps: usize,
    /// Pause between steps; never changes results
    pub step_delay: Duration,
    /// Advisory voltage band; violations are logged, not enforced
    pub voltage_band: (f64, f64),
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            steps: 24,
            step_delay: Duration::ZERO,
            voltage_band: (0.9, 1.1),
        }
    }
}

/// Drives one network through a load profile, one power flow per step.
pub struct Simulation<E, P> {
    network: Network,
    original: OriginalLoads,
    history: HistoryBuffer,
    engine: E,
    profile: P,
    config: SimulationConfig,
}

impl<E: PowerFlowEngine, P: LoadProfile> Simulation<E, P> {
    /// Take ownership of the network and snapshot its loads.
    pub fn new(
        network: Network,
        engine: E,
        profile: P,
        config: SimulationConfig,
    ) -> FdrResult<Self> {
        if config.steps == 0 {
            return Err(FdrError::Config("simulation needs at least one step".into()));
        }
        let original = OriginalLoads::capture(&network);
        if original.is_empty() {
            tracing::warn!("network has no loads; every step will solve the same case");
        }
        Ok(Self {
            network,
            original,
            history: HistoryBuffer::new(),
            engine,
            profile,
            config,
        })
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn original_loads(&self) -> &OriginalLoads {
        &self.original
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Run every step, feeding each result to `sinks`.
    ///
    /// A previous run's history is discarded first.
    pub fn run(&mut self, sinks: &mut [&mut dyn StepSink]) -> FdrResult<&HistoryBuffer> {
        self.history = HistoryBuffer::new();
        tracing::info!(
            steps = self.config.steps,
            loads = self.original.len(),
            base_mw = self.original.total_mw(),
            "starting time-series run"
        );

        for step in 0..self.config.steps {
            if step > 0 && !self.config.step_delay.is_zero() {
                std::thread::sleep(self.config.step_delay);
            }

            let result = self.solve_step(step).map_err(|e| e.at_step(step))?;
            self.log_step(&result);
            self.history.push(result).map_err(|e| e.at_step(step))?;

            if let Some(recorded) = self.history.last() {
                for sink in sinks.iter_mut() {
                    sink.on_step(recorded).map_err(|e| e.at_step(step))?;
                }
            }
        }

        Ok(&self.history)
    }

    fn solve_step(&mut self, step: usize) -> FdrResult<SimulationResult> {
        let scale = self.profile.scale(step);
        if !scale.is_finite() || scale < 0.0 {
            return Err(FdrError::Config(format!(
                "load profile produced invalid scale {}",
                scale
            )));
        }

        self.original.apply(&mut self.network, scale)?;
        let report = self.engine.solve(&mut self.network)?;

        let voltages = self.network.bus_voltages();
        if let Some((bus, v)) = voltages.iter().find(|(_, v)| !v.is_finite()) {
            return Err(FdrError::Validation(format!(
                "solver returned non-finite voltage {} at bus {}",
                v, bus
            )));
        }

        Ok(SimulationResult {
            step,
            scale,
            voltages,
            iterations: report.iterations,
            losses_mw: report.losses_mw,
        })
    }

    fn log_step(&self, result: &SimulationResult) {
        let (lo, hi) = self.config.voltage_band;
        let min_v = result.min_voltage().map(|(_, v)| v).unwrap_or(f64::NAN);
        tracing::info!(
            "hour {:02}: scale={:.2} min V={:.4} ({} it)",
            result.step,
            result.scale,
            min_v,
            result.iterations
        );

        let violations = result.out_of_band(lo, hi);
        if !violations.is_empty() {
            let buses: Vec<String> = violations
                .iter()
                .map(|(b, v)| format!("{}={:.4}", b, v))
                .collect();
            tracing::warn!(
                step = result.step,
                "{} bus(es) outside [{}, {}] p.u.: {}",
                violations.len(),
                lo,
                hi,
                buses.join(", ")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fdr_algo::{AcPowerFlowSolver, PowerFlowReport};
    use fdr_core::{BusId, PerUnit, Radians};
    use fdr_ts::SinusoidalProfile;

    struct Recorder(Vec<usize>);

    impl StepSink for Recorder {
        fn on_step(&mut self, result: &SimulationResult) -> FdrResult<()> {
            self.0.push(result.step);
            Ok(())
        }
    }

    fn feeder() -> Network {
        fdr_io::load_standard_feeder("case33bw").unwrap()
    }

    #[test]
    fn zero_steps_is_rejected() {
        let config = SimulationConfig {
            steps: 0,
            ..SimulationConfig::default()
        };
        let result = Simulation::new(
            feeder(),
            AcPowerFlowSolver::new(),
            SinusoidalProfile::default(),
            config,
        );
        assert!(matches!(result, Err(FdrError::Config(_))));
    }

    #[test]
    fn negative_scale_names_the_step() {
        let profile = |step: usize| if step == 3 { -0.5 } else { 1.0 };
        let mut sim = Simulation::new(
            feeder(),
            AcPowerFlowSolver::new(),
            profile,
            SimulationConfig::default(),
        )
        .unwrap();

        let err = sim.run(&mut []).unwrap_err();
        assert_eq!(err.step(), Some(3));
        assert!(matches!(err.root(), FdrError::Config(_)));
        assert_eq!(sim.history().steps(), vec![0, 1, 2]);
    }

    #[test]
    fn sinks_see_every_step_in_order() {
        let mut sim = Simulation::new(
            feeder(),
            AcPowerFlowSolver::new(),
            SinusoidalProfile::default(),
            SimulationConfig {
                steps: 5,
                ..SimulationConfig::default()
            },
        )
        .unwrap();
        let mut first = Recorder(Vec::new());
        let mut second = Recorder(Vec::new());
        let mut sinks: [&mut dyn StepSink; 2] = [&mut first, &mut second];
        sim.run(&mut sinks).unwrap();

        assert_eq!(first.0, vec![0, 1, 2, 3, 4]);
        assert_eq!(second.0, first.0);
    }

    struct NanEngine;

    impl PowerFlowEngine for NanEngine {
        fn solve(&self, network: &mut Network) -> FdrResult<PowerFlowReport> {
            network.set_bus_voltage(BusId::new(4), PerUnit(f64::NAN), Radians::ZERO)?;
            Ok(PowerFlowReport {
                iterations: 1,
                max_mismatch: 0.0,
                slack_p_mw: 0.0,
                slack_q_mvar: 0.0,
                losses_mw: 0.0,
                min_voltage_bus: BusId::new(0),
                min_voltage_pu: 1.0,
            })
        }
    }

    #[test]
    fn non_finite_voltage_aborts() {
        let mut sim = Simulation::new(
            feeder(),
            NanEngine,
            SinusoidalProfile::default(),
            SimulationConfig::default(),
        )
        .unwrap();
        let err = sim.run(&mut []).unwrap_err();
        assert_eq!(err.step(), Some(0));
        assert!(sim.history().is_empty());
    }
}
