//! Daily load profiles.
//!
//! A profile maps a step index to a dimensionless multiplier applied to every
//! load's original demand. The simulation only sees the [`LoadProfile`]
//! trait, so closures work too:
//!
//! ```
//! use fdr_ts::profile::{LoadProfile, SinusoidalProfile};
//!
//! let profile = SinusoidalProfile::default();
//! assert!((profile.scale(6) - 1.1).abs() < 1e-12);
//!
//! let flat = |_step: usize| 1.0;
//! assert_eq!(flat.scale(3), 1.0);
//! ```

use fdr_core::{FdrError, FdrResult};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::str::FromStr;

pub trait LoadProfile {
    /// Load multiplier for a step.
    fn scale(&self, step: usize) -> f64;
}

impl<F> LoadProfile for F
where
    F: Fn(usize) -> f64,
{
    fn scale(&self, step: usize) -> f64 {
        self(step)
    }
}

/// `scale(t) = base + amplitude * sin(2π t / period)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SinusoidalProfile {
    pub base: f64,
    pub amplitude: f64,
    /// Steps per cycle
    pub period: usize,
}

impl Default for SinusoidalProfile {
    fn default() -> Self {
        ProfilePreset::Mild.profile()
    }
}

impl SinusoidalProfile {
    pub fn new(base: f64, amplitude: f64, period: usize) -> Self {
        Self {
            base,
            amplitude,
            period,
        }
    }

    /// Reject parameters that could produce a non-finite or negative scale.
    pub fn validate(&self) -> FdrResult<()> {
        if !self.base.is_finite() || !self.amplitude.is_finite() {
            return Err(FdrError::Config(format!(
                "profile parameters must be finite (base={}, amplitude={})",
                self.base, self.amplitude
            )));
        }
        if self.period == 0 {
            return Err(FdrError::Config("profile period must be at least 1".into()));
        }
        if self.base < 0.0 || self.amplitude < 0.0 {
            return Err(FdrError::Config(format!(
                "profile base and amplitude must be non-negative (base={}, amplitude={})",
                self.base, self.amplitude
            )));
        }
        if self.amplitude > self.base {
            return Err(FdrError::Config(format!(
                "profile amplitude {} exceeds base {}; scale would go negative",
                self.amplitude, self.base
            )));
        }
        Ok(())
    }

    /// `(min, max)` of the scale over a full cycle.
    pub fn bounds(&self) -> (f64, f64) {
        (self.base - self.amplitude, self.base + self.amplitude)
    }

    pub fn with_period(mut self, period: usize) -> Self {
        self.period = period;
        self
    }
}

impl LoadProfile for SinusoidalProfile {
    fn scale(&self, step: usize) -> f64 {
        let phase = 2.0 * PI * step as f64 / self.period as f64;
        self.base + self.amplitude * phase.sin()
    }
}

/// Named parameter sets for the daily curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfilePreset {
    /// 0.3 – 1.1
    Wide,
    /// 0.7 – 1.1
    Mild,
}

impl ProfilePreset {
    pub fn profile(self) -> SinusoidalProfile {
        match self {
            ProfilePreset::Wide => SinusoidalProfile::new(0.7, 0.4, 24),
            ProfilePreset::Mild => SinusoidalProfile::new(0.9, 0.2, 24),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProfilePreset::Wide => "wide",
            ProfilePreset::Mild => "mild",
        }
    }
}

impl FromStr for ProfilePreset {
    type Err = FdrError;

    fn from_str(s: &str) -> FdrResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "wide" => Ok(ProfilePreset::Wide),
            "mild" => Ok(ProfilePreset::Mild),
            other => Err(FdrError::Config(format!(
                "unknown profile preset '{}'; expected wide or mild",
                other
            ))),
        }
    }
}
