use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint};
use fdr_ts::ProfilePreset;
use fdr_viz::PlotFormat;

use crate::config::RunConfig;

#[derive(Parser, Debug)]
#[command(
    name = "fdr",
    author,
    version,
    about = "Time-series power flow on distribution feeders",
    long_about = None
)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info", global = true)]
    pub log_level: tracing::Level,

    /// TOML run configuration; flags override its values
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the time-series simulation and export results
    Run(RunArgs),
    /// Print the load scale for every step
    Profile(ProfileArgs),
    /// Show feeder statistics and validation diagnostics
    Case {
        /// Built-in feeder name
        #[arg(long)]
        feeder: Option<String>,
        /// Also solve the base case
        #[arg(long)]
        solve: bool,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ProfileArgs {
    /// Number of steps
    #[arg(long)]
    pub steps: Option<usize>,
    /// Mean load scale
    #[arg(long)]
    pub base: Option<f64>,
    /// Sine amplitude around the base
    #[arg(long)]
    pub amplitude: Option<f64>,
    /// Named base/amplitude pair (wide, mild)
    #[arg(long)]
    pub preset: Option<ProfilePreset>,
}

impl ProfileArgs {
    pub fn apply_to(&self, config: &mut RunConfig) {
        if let Some(steps) = self.steps {
            config.simulation.steps = steps;
        }
        if let Some(preset) = self.preset {
            config.profile.preset = Some(preset);
        }
        if self.base.is_some() || self.amplitude.is_some() {
            config.profile.materialize();
        }
        if let Some(base) = self.base {
            config.profile.base = base;
        }
        if let Some(amplitude) = self.amplitude {
            config.profile.amplitude = amplitude;
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub profile: ProfileArgs,

    /// Built-in feeder name
    #[arg(long)]
    pub feeder: Option<String>,

    /// RFC 3339 timestamp of step 0
    #[arg(long)]
    pub start: Option<String>,

    /// Stream voltages to InfluxDB
    #[arg(long, conflicts_with = "no_influx")]
    pub influx: bool,

    /// Skip the InfluxDB sink
    #[arg(long)]
    pub no_influx: bool,

    /// Also write every point to a JSON-lines file
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub jsonl: Option<PathBuf>,

    /// Directory for the topology and voltage plots
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub plots_dir: Option<PathBuf>,

    /// Plot output format (svg, png, html)
    #[arg(long)]
    pub plot_format: Option<PlotFormat>,

    /// Skip plot output
    #[arg(long)]
    pub no_plots: bool,

    /// Write the voltage history as CSV
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub csv: Option<PathBuf>,

    /// Pause between steps, in milliseconds
    #[arg(long)]
    pub step_delay_ms: Option<u64>,
}

impl RunArgs {
    pub fn apply_to(&self, config: &mut RunConfig) {
        self.profile.apply_to(config);
        if let Some(feeder) = &self.feeder {
            config.feeder.name = feeder.clone();
        }
        if let Some(start) = &self.start {
            config.simulation.start = start.clone();
        }
        if self.influx {
            config.influx.enabled = true;
        }
        if self.no_influx {
            config.influx.enabled = false;
        }
        if let Some(path) = &self.jsonl {
            config.jsonl.path = Some(path.clone());
        }
        if let Some(dir) = &self.plots_dir {
            config.plots.dir = dir.clone();
        }
        if let Some(format) = self.plot_format {
            config.plots.format = format;
        }
        if self.no_plots {
            config.plots.enabled = false;
        }
        if let Some(path) = &self.csv {
            config.csv.path = Some(path.clone());
        }
        if let Some(ms) = self.step_delay_ms {
            config.simulation.step_delay_ms = ms;
        }
    }
}
