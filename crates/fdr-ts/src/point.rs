//! Time-series points and InfluxDB line protocol encoding.

use chrono::{DateTime, Utc};
use fdr_core::{BusId, FdrError, FdrResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

pub const BUS_VOLTAGE_MEASUREMENT: &str = "bus_voltage";
pub const BUS_TAG: &str = "bus";
pub const VM_FIELD: &str = "vm_pu";

/// One record for a time-series database.
///
/// Tags and fields are kept in `BTreeMap`s so the encoded form is stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, f64>,
    pub time: DateTime<Utc>,
}

impl TimeSeriesPoint {
    pub fn new(measurement: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            time,
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.tags.insert(key.into(), value.to_string());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: f64) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// `bus_voltage,bus=<id> vm_pu=<v>`
    pub fn bus_voltage(bus: BusId, vm_pu: f64, time: DateTime<Utc>) -> Self {
        Self::new(BUS_VOLTAGE_MEASUREMENT, time)
            .tag(BUS_TAG, bus.value())
            .field(VM_FIELD, vm_pu)
    }

    pub fn timestamp_nanos(&self) -> FdrResult<i64> {
        self.time.timestamp_nanos_opt().ok_or_else(|| {
            FdrError::Validation(format!(
                "timestamp {} is outside the nanosecond range",
                self.time
            ))
        })
    }

    /// Encode as one line of InfluxDB line protocol with a nanosecond timestamp.
    pub fn to_line_protocol(&self) -> FdrResult<String> {
        if self.fields.is_empty() {
            return Err(FdrError::Validation(format!(
                "point '{}' has no fields",
                self.measurement
            )));
        }

        let mut line = escape_measurement(&self.measurement);
        for (key, value) in &self.tags {
            let _ = write!(line, ",{}={}", escape_key(key), escape_key(value));
        }

        let mut first = true;
        for (key, value) in &self.fields {
            if !value.is_finite() {
                return Err(FdrError::Validation(format!(
                    "field '{}' of '{}' is not finite",
                    key, self.measurement
                )));
            }
            let sep = if first { ' ' } else { ',' };
            let _ = write!(line, "{}{}={}", sep, escape_key(key), value);
            first = false;
        }

        let _ = write!(line, " {}", self.timestamp_nanos()?);
        Ok(line)
    }
}

/// Newline-separated body for a batch write.
pub fn encode_batch(points: &[TimeSeriesPoint]) -> FdrResult<String> {
    let lines = points
        .iter()
        .map(TimeSeriesPoint::to_line_protocol)
        .collect::<FdrResult<Vec<_>>>()?;
    Ok(lines.join("\n"))
}

// Measurements escape commas and spaces
fn escape_measurement(s: &str) -> String {
    escape(s, &[',', ' '])
}

// Tag keys, tag values and field keys also escape '='
fn escape_key(s: &str) -> String {
    escape(s, &[',', '=', ' '])
}

fn escape(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn bus_voltage_line() {
        let point = TimeSeriesPoint::bus_voltage(BusId::new(3), 0.97, t0());
        assert_eq!(
            point.to_line_protocol().unwrap(),
            "bus_voltage,bus=3 vm_pu=0.97 1704067200000000000"
        );
    }

    #[test]
    fn escapes_special_characters() {
        let point = TimeSeriesPoint::new("bus voltage,raw", t0())
            .tag("feeder name", "case=33,bw")
            .field("v m", 1.5);
        assert_eq!(
            point.to_line_protocol().unwrap(),
            r"bus\ voltage\,raw,feeder\ name=case\=33\,bw v\ m=1.5 1704067200000000000"
        );
    }

    #[test]
    fn multiple_fields_are_comma_separated_in_key_order() {
        let point = TimeSeriesPoint::new("m", t0())
            .field("vm_pu", 0.95)
            .field("va_deg", -1.25);
        let line = point.to_line_protocol().unwrap();
        assert!(line.starts_with("m va_deg=-1.25,vm_pu=0.95 "));
    }

    #[test]
    fn rejects_empty_and_non_finite_fields() {
        assert!(TimeSeriesPoint::new("m", t0()).to_line_protocol().is_err());
        let nan = TimeSeriesPoint::new("m", t0()).field("x", f64::NAN);
        assert!(matches!(
            nan.to_line_protocol(),
            Err(FdrError::Validation(_))
        ));
    }

    #[test]
    fn batch_is_newline_separated() {
        let points: Vec<_> = (0..3)
            .map(|b| TimeSeriesPoint::bus_voltage(BusId::new(b), 1.0, t0()))
            .collect();
        let body = encode_batch(&points).unwrap();
        assert_eq!(body.lines().count(), 3);
        assert!(body.lines().nth(2).unwrap().starts_with("bus_voltage,bus=2 vm_pu=1 "));
    }

    #[test]
    fn json_shape() {
        let point = TimeSeriesPoint::bus_voltage(BusId::new(7), 0.99, t0());
        let json: serde_json::Value = serde_json::to_value(&point).unwrap();
        assert_eq!(json["measurement"], "bus_voltage");
        assert_eq!(json["tags"]["bus"], "7");
        assert_eq!(json["fields"]["vm_pu"], 0.99);
        assert_eq!(json["time"], "2024-01-01T00:00:00Z");
    }
}
