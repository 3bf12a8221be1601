//! Deterministic simulation clock.
//!
//! Step `k` is stamped `start + k × step`, so two runs with the same
//! configuration export identical timestamps.
//!
//! # Examples
//!
//! ```
//! use fdr_ts::clock::SimulationClock;
//!
//! let clock = SimulationClock::default();
//! assert_eq!(clock.timestamp(2)?.to_rfc3339(), "2024-01-01T02:00:00+00:00");
//! # Ok::<(), fdr_core::FdrError>(())
//! ```

use chrono::{DateTime, TimeDelta, Utc};
use fdr_core::{FdrError, FdrResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationClock {
    pub start: DateTime<Utc>,
    pub step: TimeDelta,
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self {
            // 2024-01-01T00:00:00Z
            start: DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(1_704_067_200),
            step: TimeDelta::hours(1),
        }
    }
}

impl SimulationClock {
    pub fn new(start: DateTime<Utc>, step: TimeDelta) -> FdrResult<Self> {
        if step <= TimeDelta::zero() {
            return Err(FdrError::Config(format!(
                "clock step must be positive, got {}",
                step
            )));
        }
        Ok(Self { start, step })
    }

    /// Clock with a start given as RFC 3339 and a step in seconds.
    pub fn from_rfc3339(start: &str, step_seconds: i64) -> FdrResult<Self> {
        let start = DateTime::parse_from_rfc3339(start)
            .map_err(|e| FdrError::Config(format!("invalid start time '{}': {}", start, e)))?
            .with_timezone(&Utc);
        let step = TimeDelta::try_seconds(step_seconds).ok_or_else(|| {
            FdrError::Config(format!("clock step of {} s is out of range", step_seconds))
        })?;
        Self::new(start, step)
    }

    pub fn timestamp(&self, step_index: usize) -> FdrResult<DateTime<Utc>> {
        i32::try_from(step_index)
            .ok()
            .and_then(|k| self.step.checked_mul(k))
            .and_then(|offset| self.start.checked_add_signed(offset))
            .ok_or_else(|| {
                FdrError::Config(format!(
                    "step {} of a {} clock starting {} is out of range",
                    step_index, self.step, self.start
                ))
            })
    }

    /// Check that all of the first `total` steps carry exportable timestamps.
    ///
    /// Line protocol stores nanoseconds since the epoch in an `i64`, so the
    /// last step must land between the years 1677 and 2262.
    pub fn check_span(&self, total: usize) -> FdrResult<()> {
        let Some(last) = total.checked_sub(1) else {
            return Ok(());
        };
        for time in [self.start, self.timestamp(last)?] {
            if time.timestamp_nanos_opt().is_none() {
                return Err(FdrError::Config(format!(
                    "timestamp {} of a {}-step run is outside the nanosecond range",
                    time, total
                )));
            }
        }
        Ok(())
    }

    /// `(step, timestamp)` pairs for the first `total` steps.
    pub fn ticks(&self, total: usize) -> FdrResult<Vec<(usize, DateTime<Utc>)>> {
        (0..total)
            .map(|k| Ok((k, self.timestamp(k)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_clock_is_hourly_from_new_year_2024() {
        let clock = SimulationClock::default();
        assert_eq!(clock.timestamp(0).unwrap().timestamp(), 1_704_067_200);
        assert_eq!(
            clock.timestamp(23).unwrap().timestamp(),
            1_704_067_200 + 23 * 3600
        );
    }

    #[test]
    fn ticks_are_evenly_spaced() {
        let clock = SimulationClock::from_rfc3339("2024-06-01T00:00:00Z", 900).unwrap();
        let stamps = clock.ticks(4).unwrap();
        assert_eq!(stamps.len(), 4);
        for pair in stamps.windows(2) {
            assert_eq!(pair[1].1 - pair[0].1, TimeDelta::minutes(15));
        }
    }

    #[test]
    fn rejects_bad_input() {
        assert!(SimulationClock::from_rfc3339("yesterday", 3600).is_err());
        assert!(SimulationClock::from_rfc3339("2024-01-01T00:00:00Z", 0).is_err());
    }

    #[test]
    fn oversized_steps_are_config_errors() {
        let err = SimulationClock::from_rfc3339("2024-01-01T00:00:00Z", i64::MAX / 10).unwrap_err();
        assert!(matches!(err, FdrError::Config(_)));

        let clock = SimulationClock::from_rfc3339("2024-01-01T00:00:00Z", 1_000_000_000_000).unwrap();
        assert!(matches!(clock.timestamp(9), Err(FdrError::Config(_))));
        assert!(matches!(clock.ticks(10), Err(FdrError::Config(_))));
        assert!(matches!(clock.timestamp(usize::MAX), Err(FdrError::Config(_))));
    }

    #[test]
    fn span_must_fit_line_protocol_nanoseconds() {
        let hourly = SimulationClock::default();
        assert!(hourly.check_span(24).is_ok());
        assert!(hourly.check_span(0).is_ok());

        // 24 steps of 30 years run past 2262
        let decades = SimulationClock::from_rfc3339("2024-01-01T00:00:00Z", 30 * 365 * 86_400).unwrap();
        assert!(decades.timestamp(23).is_ok());
        assert!(matches!(decades.check_span(24), Err(FdrError::Config(_))));
    }

    #[test]
    fn offsets_are_normalised_to_utc() {
        let clock = SimulationClock::from_rfc3339("2024-01-01T02:00:00+02:00", 3600).unwrap();
        assert_eq!(clock.start, SimulationClock::default().start);
    }
}
