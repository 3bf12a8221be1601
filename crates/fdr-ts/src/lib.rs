//! # fdr-ts: time-series plumbing
//!
//! - [`profile`]: load multipliers per step ([`LoadProfile`], [`SinusoidalProfile`])
//! - [`clock`]: deterministic step timestamps ([`SimulationClock`])
//! - [`point`]: [`TimeSeriesPoint`] and InfluxDB line protocol
//! - [`writer`]: [`PointWriter`] sinks for InfluxDB, JSON lines and memory

pub mod clock;
pub mod point;
pub mod profile;
pub mod writer;

pub use clock::SimulationClock;
pub use point::{encode_batch, TimeSeriesPoint, BUS_TAG, BUS_VOLTAGE_MEASUREMENT, VM_FIELD};
pub use profile::{LoadProfile, ProfilePreset, SinusoidalProfile};
pub use writer::{InfluxConfig, InfluxWriter, JsonLinesWriter, MemoryWriter, PointWriter};
