use anyhow::{bail, Result};
use fdr_algo::PowerFlowEngine;
use fdr_cli::RunConfig;
use fdr_core::Diagnostics;
use fdr_io::StandardFeeder;
use tracing::info;

pub fn handle(config: &RunConfig, feeder: Option<&str>, solve: bool) -> Result<()> {
    let feeder: StandardFeeder = feeder.unwrap_or(&config.feeder.name).parse()?;
    let mut network = feeder.build()?;
    let stats = network.stats();

    println!("{} ({})", feeder.as_str(), feeder.title());
    println!("  Buses         : {}", stats.num_buses);
    println!(
        "  Branches      : {} in service, {} open",
        stats.num_branches, stats.num_open_branches
    );
    println!("  Generators    : {}", stats.num_gens);
    println!(
        "  Loads         : {} ({:.3} MW, {:.3} Mvar)",
        stats.num_loads, stats.total_load_mw, stats.total_load_mvar
    );
    println!("  Base MVA      : {}", network.base_mva);

    let mut diag = Diagnostics::new();
    network.validate_into(&mut diag);
    println!("Diagnostics: {}", diag.summary());
    for issue in diag.errors().chain(diag.warnings()) {
        println!("  {issue}");
    }
    if diag.has_errors() {
        bail!("feeder {} failed validation ({})", feeder.as_str(), diag.summary());
    }

    if solve {
        info!(feeder = feeder.as_str(), "solving base case");
        let report = config.solver.engine().solve(&mut network)?;
        println!(
            "Base case: min V {:.4} p.u. at bus {}, losses {:.4} MW, slack {:.4} MW / {:.4} Mvar ({} iterations)",
            report.min_voltage_pu,
            report.min_voltage_bus,
            report.losses_mw,
            report.slack_p_mw,
            report.slack_q_mvar,
            report.iterations
        );
    }
    Ok(())
}
