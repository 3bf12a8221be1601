//! Run configuration for `fdr`.
//!
//! Stored as TOML. Every field has a default, so a file only needs the
//! values it changes; command-line flags are applied on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use fdr_algo::AcPowerFlowSolver;
use fdr_core::{FdrError, FdrResult, SolverKind};
use fdr_sim::SimulationConfig;
use fdr_ts::{InfluxConfig, ProfilePreset, SimulationClock, SinusoidalProfile};
use fdr_viz::{LayoutKind, PlotFormat};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub feeder: FeederConfig,
    pub profile: ProfileConfig,
    pub simulation: SimulationSection,
    pub solver: SolverConfig,
    pub influx: InfluxSection,
    pub jsonl: JsonlConfig,
    pub plots: PlotsConfig,
    pub csv: CsvConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeederConfig {
    /// Built-in feeder name
    pub name: String,
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self {
            name: "case33bw".to_string(),
        }
    }
}

/// Daily load curve. A `preset` takes precedence over `base`/`amplitude`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub preset: Option<ProfilePreset>,
    pub base: f64,
    pub amplitude: f64,
    /// Steps per sine cycle
    pub period: usize,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        let mild = ProfilePreset::Mild.profile();
        Self {
            preset: None,
            base: mild.base,
            amplitude: mild.amplitude,
            period: mild.period,
        }
    }
}

impl ProfileConfig {
    /// Replace a preset by its explicit `base`/`amplitude` values.
    pub fn materialize(&mut self) {
        if let Some(preset) = self.preset.take() {
            let profile = preset.profile();
            self.base = profile.base;
            self.amplitude = profile.amplitude;
        }
    }

    pub fn build(&self) -> FdrResult<SinusoidalProfile> {
        let profile = match self.preset {
            Some(preset) => preset.profile().with_period(self.period),
            None => SinusoidalProfile::new(self.base, self.amplitude, self.period),
        };
        profile.validate()?;
        Ok(profile)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSection {
    pub steps: usize,
    /// RFC 3339 timestamp of step 0
    pub start: String,
    pub step_seconds: i64,
    /// Pause between steps
    pub step_delay_ms: u64,
    pub voltage_min: f64,
    pub voltage_max: f64,
}

impl Default for SimulationSection {
    fn default() -> Self {
        let sim = SimulationConfig::default();
        Self {
            steps: sim.steps,
            start: "2024-01-01T00:00:00Z".to_string(),
            step_seconds: 3600,
            step_delay_ms: 0,
            voltage_min: sim.voltage_band.0,
            voltage_max: sim.voltage_band.1,
        }
    }
}

impl SimulationSection {
    pub fn clock(&self) -> FdrResult<SimulationClock> {
        SimulationClock::from_rfc3339(&self.start, self.step_seconds)
    }

    pub fn simulation_config(&self) -> SimulationConfig {
        SimulationConfig {
            steps: self.steps,
            step_delay: Duration::from_millis(self.step_delay_ms),
            voltage_band: (self.voltage_min, self.voltage_max),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub backend: SolverKind,
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Start each step from the previous step's voltages
    pub warm_start: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            backend: SolverKind::default(),
            tolerance: 1e-8,
            max_iterations: 20,
            warm_start: false,
        }
    }
}

impl SolverConfig {
    pub fn engine(&self) -> AcPowerFlowSolver {
        AcPowerFlowSolver::new()
            .with_tolerance(self.tolerance)
            .with_max_iterations(self.max_iterations)
            .with_warm_start(self.warm_start)
            .with_linear_solver(self.backend)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluxSection {
    pub enabled: bool,
    #[serde(flatten)]
    pub connection: InfluxConfig,
}

impl Default for InfluxSection {
    fn default() -> Self {
        Self {
            enabled: true,
            connection: InfluxConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonlConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotsConfig {
    pub enabled: bool,
    pub dir: PathBuf,
    pub format: PlotFormat,
    pub layout: LayoutKind,
    pub dpi: f64,
    /// File stems; the extension follows `format`
    pub topology_file: String,
    pub timeseries_file: String,
}

impl Default for PlotsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("plots"),
            format: PlotFormat::Svg,
            layout: LayoutKind::Radial,
            dpi: 100.0,
            topology_file: "ieee33_topology".to_string(),
            timeseries_file: "voltages_24h".to_string(),
        }
    }
}

impl PlotsConfig {
    pub fn path_for(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", stem, self.format.extension()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvConfig {
    pub path: Option<PathBuf>,
}

impl RunConfig {
    pub fn load(path: impl AsRef<Path>) -> FdrResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| FdrError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml(&contents)
            .map_err(|e| FdrError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(contents: &str) -> FdrResult<Self> {
        toml::from_str(contents).map_err(|e| FdrError::Parse(e.to_string()))
    }

    pub fn to_toml(&self) -> FdrResult<String> {
        toml::to_string_pretty(self).map_err(|e| FdrError::Other(e.to_string()))
    }

    /// Check every section before anything is built or written.
    pub fn validate(&self) -> FdrResult<()> {
        self.profile.build()?;

        let sim = &self.simulation;
        if sim.steps == 0 {
            return Err(FdrError::Config("simulation.steps must be at least 1".into()));
        }
        sim.clock()?.check_span(sim.steps)?;
        if !(sim.voltage_min < sim.voltage_max) {
            return Err(FdrError::Config(format!(
                "voltage band [{}, {}] is empty",
                sim.voltage_min, sim.voltage_max
            )));
        }
        if !(self.solver.tolerance > 0.0) || self.solver.max_iterations == 0 {
            return Err(FdrError::Config(format!(
                "solver needs a positive tolerance and iteration limit (got {}, {})",
                self.solver.tolerance, self.solver.max_iterations
            )));
        }
        if !self.plots.dpi.is_finite() || self.plots.dpi <= 0.0 {
            return Err(FdrError::Config(format!(
                "plots.dpi must be positive, got {}",
                self.plots.dpi
            )));
        }
        Ok(())
    }
}
