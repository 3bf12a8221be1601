use std::cell::Cell;

use fdr_algo::{AcPowerFlowSolver, PowerFlowEngine, PowerFlowReport};
use fdr_core::{FdrError, FdrResult, Network};
use fdr_sim::{Simulation, SimulationConfig, SimulationResult, StepSink, TimeSeriesExport};
use fdr_ts::{
    LoadProfile, MemoryWriter, PointWriter, ProfilePreset, SimulationClock, SinusoidalProfile,
    TimeSeriesPoint,
};

fn feeder() -> Network {
    fdr_io::load_standard_feeder("case33bw").unwrap()
}

fn simulation<P: LoadProfile>(profile: P) -> Simulation<AcPowerFlowSolver, P> {
    Simulation::new(
        feeder(),
        AcPowerFlowSolver::new(),
        profile,
        SimulationConfig::default(),
    )
    .unwrap()
}

/// Solves normally until `fail_at`, then reports non-convergence.
struct FailingEngine {
    inner: AcPowerFlowSolver,
    calls: Cell<usize>,
    fail_at: usize,
}

impl PowerFlowEngine for FailingEngine {
    fn solve(&self, network: &mut Network) -> FdrResult<PowerFlowReport> {
        let call = self.calls.get();
        self.calls.set(call + 1);
        if call == self.fail_at {
            return Err(FdrError::Convergence {
                iterations: 20,
                max_mismatch: 0.3,
            });
        }
        self.inner.solve(network)
    }
}

/// Records every step; fails on a chosen one.
struct FlakyWriter {
    written: MemoryWriter,
    fail_on_batch: usize,
    batches: usize,
}

impl PointWriter for FlakyWriter {
    fn write_points(&mut self, points: &[TimeSeriesPoint]) -> FdrResult<()> {
        let batch = self.batches;
        self.batches += 1;
        if batch == self.fail_on_batch {
            return Err(FdrError::SinkUnavailable("connection refused".into()));
        }
        self.written.write_points(points)
    }
}

#[test]
fn full_day_fills_history_in_step_order() {
    let mut sim = simulation(SinusoidalProfile::default());
    let history = sim.run(&mut []).unwrap();

    assert_eq!(history.len(), 24);
    assert_eq!(history.steps(), (0..24).collect::<Vec<_>>());
    for result in history.iter() {
        assert_eq!(result.voltages.len(), 33);
        assert!(result.voltages.values().all(|v| v.is_finite()));
    }

    // peak demand at hour 6 gives the deepest sag
    let summary = history.summary().unwrap();
    assert_eq!(summary.min.0, 6);
    assert_eq!(summary.min.1.value(), 17);
    assert!((summary.min.2 - 0.9036).abs() < 1e-3);
}

#[test]
fn loads_follow_original_times_scale() {
    let profile = SinusoidalProfile::default();
    let mut sim = Simulation::new(
        feeder(),
        AcPowerFlowSolver::new(),
        profile,
        SimulationConfig {
            steps: 7,
            ..SimulationConfig::default()
        },
    )
    .unwrap();
    sim.run(&mut []).unwrap();

    // after steps 5 and 6 the loads hold scale(6), not scale(5) * scale(6)
    let scale = profile.scale(6);
    for load in sim.network().loads() {
        let (p0, q0) = sim.original_loads().get(load.id).unwrap();
        assert_eq!(load.active_power, p0 * scale);
        assert_eq!(load.reactive_power, q0 * scale);
    }
}

#[test]
fn identical_runs_export_identical_points() {
    let run = || {
        let mut sim = simulation(ProfilePreset::Wide.profile());
        let mut export = TimeSeriesExport::new(MemoryWriter::new(), SimulationClock::default());
        let history = {
            let mut sinks: [&mut dyn StepSink; 1] = [&mut export];
            sim.run(&mut sinks).unwrap().clone()
        };
        (history.results().to_vec(), export.into_inner())
    };

    let (history_a, points_a) = run();
    let (history_b, points_b) = run();

    assert_eq!(history_a, history_b);
    assert_eq!(points_a.len(), 24 * 33);
    assert_eq!(
        points_a.points().collect::<Vec<_>>(),
        points_b.points().collect::<Vec<_>>()
    );
}

#[test]
fn solver_failure_at_step_ten_stops_the_run() {
    let engine = FailingEngine {
        inner: AcPowerFlowSolver::new(),
        calls: Cell::new(0),
        fail_at: 10,
    };
    let mut sim = Simulation::new(
        feeder(),
        engine,
        SinusoidalProfile::default(),
        SimulationConfig::default(),
    )
    .unwrap();
    let mut export = TimeSeriesExport::new(MemoryWriter::new(), SimulationClock::default());

    let err = {
        let mut sinks: [&mut dyn StepSink; 1] = [&mut export];
        sim.run(&mut sinks).unwrap_err()
    };

    assert_eq!(err.step(), Some(10));
    assert!(err.is_convergence_failure());
    assert!(err.to_string().contains("step 10"));

    assert_eq!(sim.history().steps(), (0..10).collect::<Vec<_>>());

    let writer = export.into_inner();
    assert_eq!(writer.batches().len(), 10);
    let clock = SimulationClock::default();
    assert!(writer.points().all(|p| p.time < clock.timestamp(10).unwrap()));
}

#[test]
fn sink_failure_aborts_with_step() {
    let writer = FlakyWriter {
        written: MemoryWriter::new(),
        fail_on_batch: 4,
        batches: 0,
    };
    let mut export = TimeSeriesExport::new(writer, SimulationClock::default());
    let mut sim = simulation(SinusoidalProfile::default());

    let err = {
        let mut sinks: [&mut dyn StepSink; 1] = [&mut export];
        sim.run(&mut sinks).unwrap_err()
    };
    assert_eq!(err.step(), Some(4));
    assert!(matches!(err.root(), FdrError::SinkUnavailable(_)));
    assert_eq!(export.writer().written.batches().len(), 4);
}

#[test]
fn export_of_three_bus_step() {
    let result = SimulationResult {
        step: 2,
        scale: 1.0,
        voltages: [(0, 1.0), (1, 0.99), (2, 0.985)]
            .into_iter()
            .map(|(b, v)| (fdr_core::BusId::new(b), v))
            .collect(),
        iterations: 2,
        losses_mw: 0.0,
    };
    let mut export = TimeSeriesExport::new(MemoryWriter::new(), SimulationClock::default());
    export.on_step(&result).unwrap();

    let lines: Vec<String> = export
        .writer()
        .points()
        .map(|p| p.to_line_protocol().unwrap())
        .collect();
    assert_eq!(
        lines,
        vec![
            "bus_voltage,bus=0 vm_pu=1 1704074400000000000",
            "bus_voltage,bus=1 vm_pu=0.99 1704074400000000000",
            "bus_voltage,bus=2 vm_pu=0.985 1704074400000000000",
        ]
    );
}

#[test]
fn history_csv_from_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.csv");
    let mut sim = simulation(SinusoidalProfile::default());
    sim.run(&mut []).unwrap().export_csv(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let mut rows = text.lines();
    let header = rows.next().unwrap();
    assert_eq!(header.split(',').count(), 4 + 33);
    assert_eq!(rows.count(), 24);
}

#[test]
fn history_serialises_to_json() {
    let mut sim = Simulation::new(
        feeder(),
        AcPowerFlowSolver::new(),
        SinusoidalProfile::default(),
        SimulationConfig {
            steps: 2,
            ..SimulationConfig::default()
        },
    )
    .unwrap();
    let history = sim.run(&mut []).unwrap();
    let json = serde_json::to_value(history).unwrap();
    assert_eq!(json["results"].as_array().unwrap().len(), 2);
    assert!(json["results"][1]["voltages"]["17"].as_f64().unwrap() < 1.0);
}
