use fdr_algo::{AcPowerFlowSolver, PowerFlowEngine};
use fdr_core::{BusId, FdrError, Megavars, Megawatts, SolverKind};
use fdr_io::load_standard_feeder;

#[test]
fn base_case_matches_published_results() {
    let mut network = load_standard_feeder("case33bw").unwrap();
    let report = AcPowerFlowSolver::new().solve(&mut network).unwrap();

    assert!(report.iterations <= 6, "{} iterations", report.iterations);
    assert_eq!(report.min_voltage_bus, BusId::new(17));
    assert!(
        (report.min_voltage_pu - 0.9131).abs() < 5e-4,
        "min V = {}",
        report.min_voltage_pu
    );
    assert!(
        (report.losses_mw - 0.2027).abs() < 2e-3,
        "losses = {}",
        report.losses_mw
    );

    let voltages = network.bus_voltages();
    assert_eq!(voltages.len(), 33);
    assert_eq!(voltages[&BusId::new(0)], 1.0);
    assert!(voltages.values().all(|v| v.is_finite() && *v <= 1.0));
}

#[test]
fn peak_load_pushes_minimum_towards_band_edge() {
    let mut network = load_standard_feeder("case33bw").unwrap();
    let loads: Vec<_> = network
        .loads()
        .iter()
        .map(|l| (l.id, l.active_power, l.reactive_power))
        .collect();
    for (id, p, q) in loads {
        network.set_load_power(id, p * 1.1, q * 1.1).unwrap();
    }

    let report = AcPowerFlowSolver::new()
        .with_linear_solver(SolverKind::Gauss)
        .solve(&mut network)
        .unwrap();
    assert!((report.min_voltage_pu - 0.9036).abs() < 5e-4);
}

#[test]
fn warm_start_needs_fewer_iterations() {
    let mut network = load_standard_feeder("case33bw").unwrap();
    let cold = AcPowerFlowSolver::new().solve(&mut network).unwrap();
    let warm = AcPowerFlowSolver::new()
        .with_warm_start(true)
        .solve(&mut network)
        .unwrap();
    assert!(warm.iterations < cold.iterations);
    assert!((warm.min_voltage_pu - cold.min_voltage_pu).abs() < 1e-8);
}

#[test]
fn absurd_load_fails_to_solve() {
    let mut network = load_standard_feeder("case33bw").unwrap();
    let ids: Vec<_> = network.loads().iter().map(|l| l.id).collect();
    for id in ids {
        network
            .set_load_power(id, Megawatts(50.0), Megavars(50.0))
            .unwrap();
    }

    let err = AcPowerFlowSolver::new().solve(&mut network).unwrap_err();
    assert!(
        matches!(err, FdrError::Convergence { .. } | FdrError::Solver(_)),
        "{err:?}"
    );
}
