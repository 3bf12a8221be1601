use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use fdr_cli::{RunArgs, RunConfig};
use fdr_core::{Diagnostics, Network};
use fdr_io::StandardFeeder;
use fdr_sim::{HistoryBuffer, Simulation, StepSink, TimeSeriesExport};
use fdr_ts::{InfluxWriter, JsonLinesWriter, SinusoidalProfile};
use fdr_viz::{layout_network, save_timeseries, save_topology, PlotOptions};
use tracing::{info, warn};

pub fn handle(mut config: RunConfig, args: &RunArgs) -> Result<()> {
    args.apply_to(&mut config);
    config.validate()?;

    let feeder: StandardFeeder = config.feeder.name.parse()?;
    let network = feeder.build()?;
    check_network(feeder, &network)?;

    let profile = config.profile.build()?;
    let clock = config.simulation.clock()?;
    info!(
        feeder = feeder.as_str(),
        steps = config.simulation.steps,
        base = profile.base,
        amplitude = profile.amplitude,
        influx = config.influx.enabled,
        "configured run"
    );

    let mut influx = config.influx.enabled.then(|| {
        TimeSeriesExport::new(InfluxWriter::new(config.influx.connection.clone()), clock)
    });
    let mut jsonl = match &config.jsonl.path {
        Some(path) => Some(TimeSeriesExport::new(JsonLinesWriter::create(path)?, clock)),
        None => None,
    };

    let mut sim = Simulation::new(
        network,
        config.solver.engine(),
        profile,
        config.simulation.simulation_config(),
    )?;
    {
        let mut sinks: Vec<&mut dyn StepSink> = Vec::new();
        if let Some(export) = influx.as_mut() {
            sinks.push(export);
        }
        if let Some(export) = jsonl.as_mut() {
            sinks.push(export);
        }
        sim.run(&mut sinks)
            .with_context(|| format!("time-series run on {} aborted", feeder.as_str()))?;
    }

    let history = sim.history();
    let mut outputs = Vec::new();
    if config.plots.enabled {
        outputs.extend(write_plots(&config, feeder, sim.network(), history)?);
    }
    if let Some(path) = &config.csv.path {
        history
            .export_csv(path)
            .with_context(|| format!("writing history CSV to {}", path.display()))?;
        outputs.push(path.clone());
    }

    print_summary(&config, feeder, &profile, sim.network(), history, &outputs);
    Ok(())
}

fn check_network(feeder: StandardFeeder, network: &Network) -> Result<()> {
    let mut diag = Diagnostics::new();
    network.validate_into(&mut diag);
    for issue in diag.warnings() {
        warn!("{}", issue);
    }
    if diag.has_errors() {
        let issues: Vec<String> = diag.errors().map(|i| i.to_string()).collect();
        bail!(
            "feeder {} failed validation: {}",
            feeder.as_str(),
            issues.join("; ")
        );
    }
    Ok(())
}

fn write_plots(
    config: &RunConfig,
    feeder: StandardFeeder,
    network: &Network,
    history: &HistoryBuffer,
) -> Result<Vec<PathBuf>> {
    let plots = &config.plots;
    let last_step = history.last().map(|r| r.step).unwrap_or_default();

    let layout = layout_network(network, plots.layout);
    let topology = PlotOptions::topology()
        .with_format(plots.format)
        .with_dpi(plots.dpi)
        .with_title(format!(
            "{} Voltage Heat-Map (hour {})",
            feeder.title(),
            last_step
        ));
    let chart = PlotOptions::chart()
        .with_format(plots.format)
        .with_dpi(plots.dpi)
        .with_title(format!("Voltage profile – {} h", history.len()));

    let topology_path = plots.path_for(&plots.topology_file);
    let chart_path = plots.path_for(&plots.timeseries_file);
    Ok(vec![
        save_topology(&topology_path, network, &layout, &topology)
            .with_context(|| format!("writing {}", topology_path.display()))?,
        save_timeseries(&chart_path, history, &chart)
            .with_context(|| format!("writing {}", chart_path.display()))?,
    ])
}

fn print_summary(
    config: &RunConfig,
    feeder: StandardFeeder,
    profile: &SinusoidalProfile,
    network: &Network,
    history: &HistoryBuffer,
    outputs: &[PathBuf],
) {
    println!("Feeder      : {} ({})", feeder.as_str(), network.stats());
    println!(
        "Steps       : {} (base={:.2}, amplitude={:.2})",
        history.len(),
        profile.base,
        profile.amplitude
    );
    if let Some(summary) = history.summary() {
        let (step, bus, v) = summary.min;
        println!("Min voltage : {:.4} p.u. at bus {}, hour {}", v, bus, step);
        let (step, bus, v) = summary.max;
        println!("Max voltage : {:.4} p.u. at bus {}, hour {}", v, bus, step);
        println!("Peak losses : {:.4} MW", summary.peak_losses_mw);
        println!("Iterations  : {}", summary.total_iterations);
    }

    let points: usize = history.iter().map(|r| r.voltages.len()).sum();
    if config.influx.enabled {
        let conn = &config.influx.connection;
        println!(
            "InfluxDB    : {} points to {} (db {})",
            points,
            conn.write_url(),
            conn.database
        );
    }
    if let Some(path) = &config.jsonl.path {
        println!("JSON lines  : {} points to {}", points, path.display());
    }
    for path in outputs {
        println!("Wrote {}", path.display());
    }
}
