//! # fdr-viz
//!
//! Static and interactive plots of a feeder run:
//!
//! - [`render_topology`]: buses on a [`layout`], coloured by voltage on viridis
//! - [`render_timeseries`]: one voltage line per bus across the run
//!
//! SVG and PNG are drawn with `plotters`; HTML is a `plotly` page with hover
//! tooltips and a clickable legend. Renders return the file bytes and the
//! `save_*` helpers write them to disk.

pub mod layout;
mod render;
pub mod timeseries;
pub mod topology;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use fdr_core::{FdrError, FdrResult, Network};
use fdr_sim::HistoryBuffer;
use serde::{Deserialize, Serialize};

pub use layout::{layout_network, LayoutKind, LayoutResult};
pub use timeseries::render_timeseries;
pub use topology::render_topology;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotFormat {
    #[default]
    Svg,
    Png,
    Html,
}

impl PlotFormat {
    pub fn extension(self) -> &'static str {
        match self {
            PlotFormat::Svg => "svg",
            PlotFormat::Png => "png",
            PlotFormat::Html => "html",
        }
    }
}

impl fmt::Display for PlotFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for PlotFormat {
    type Err = FdrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "svg" => Ok(PlotFormat::Svg),
            "png" => Ok(PlotFormat::Png),
            "html" | "htm" => Ok(PlotFormat::Html),
            other => Err(FdrError::Config(format!(
                "unsupported plot format '{}' (expected svg, png or html)",
                other
            ))),
        }
    }
}

/// Figure size is given in inches and multiplied by `dpi` for pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotOptions {
    pub format: PlotFormat,
    pub width_in: f64,
    pub height_in: f64,
    pub dpi: f64,
    pub title: Option<String>,
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self::chart()
    }
}

impl PlotOptions {
    /// 10 × 4 in, for voltage charts.
    pub fn chart() -> Self {
        Self {
            format: PlotFormat::Svg,
            width_in: 10.0,
            height_in: 4.0,
            dpi: 100.0,
            title: None,
        }
    }

    /// 8 × 8 in, for topology snapshots.
    pub fn topology() -> Self {
        Self {
            width_in: 8.0,
            height_in: 8.0,
            ..Self::chart()
        }
    }

    pub fn with_format(mut self, format: PlotFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_dpi(mut self, dpi: f64) -> Self {
        self.dpi = dpi;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn pixel_size(&self) -> (u32, u32) {
        let px = |inches: f64| {
            let v = inches * self.dpi;
            if v.is_finite() && v >= 1.0 {
                v.round() as u32
            } else {
                1
            }
        };
        (px(self.width_in), px(self.height_in))
    }

    pub fn validate(&self) -> FdrResult<()> {
        for (name, value) in [
            ("width", self.width_in),
            ("height", self.height_in),
            ("dpi", self.dpi),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(FdrError::Config(format!(
                    "plot {} must be positive, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Write a rendered plot, creating parent directories.
pub fn save_plot(path: impl AsRef<Path>, contents: &[u8]) -> FdrResult<PathBuf> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            FdrError::SinkUnavailable(format!("cannot create {}: {}", parent.display(), e))
        })?;
    }
    std::fs::write(path, contents).map_err(|e| {
        FdrError::SinkUnavailable(format!("cannot write {}: {}", path.display(), e))
    })?;
    tracing::info!(path = %path.display(), bytes = contents.len(), "plot written");
    Ok(path.to_path_buf())
}

pub fn save_topology(
    path: impl AsRef<Path>,
    network: &Network,
    layout: &LayoutResult,
    options: &PlotOptions,
) -> FdrResult<PathBuf> {
    save_plot(path, &render_topology(network, layout, options)?)
}

pub fn save_timeseries(
    path: impl AsRef<Path>,
    history: &HistoryBuffer,
    options: &PlotOptions,
) -> FdrResult<PathBuf> {
    save_plot(path, &render_timeseries(history, options)?)
}
