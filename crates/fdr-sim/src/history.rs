//! Per-step results and the run history.

use fdr_core::{BusId, FdrError, FdrResult};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

/// Outcome of one solved step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub step: usize,
    pub scale: f64,
    /// Voltage magnitude per bus (p.u.)
    pub voltages: BTreeMap<BusId, f64>,
    pub iterations: usize,
    pub losses_mw: f64,
}

impl SimulationResult {
    pub fn min_voltage(&self) -> Option<(BusId, f64)> {
        self.voltages
            .iter()
            .map(|(&b, &v)| (b, v))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    pub fn max_voltage(&self) -> Option<(BusId, f64)> {
        self.voltages
            .iter()
            .map(|(&b, &v)| (b, v))
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Buses whose voltage lies outside `[lo, hi]`.
    pub fn out_of_band(&self, lo: f64, hi: f64) -> Vec<(BusId, f64)> {
        self.voltages
            .iter()
            .filter(|(_, v)| **v < lo || **v > hi)
            .map(|(&b, &v)| (b, v))
            .collect()
    }
}

/// Append-only, step-ordered record of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HistoryBuffer {
    results: Vec<SimulationResult>,
}

impl HistoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a result; steps must be strictly increasing.
    pub fn push(&mut self, result: SimulationResult) -> FdrResult<()> {
        if let Some(last) = self.results.last() {
            if result.step <= last.step {
                return Err(FdrError::Validation(format!(
                    "history step {} does not follow step {}",
                    result.step, last.step
                )));
            }
        }
        self.results.push(result);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn results(&self) -> &[SimulationResult] {
        &self.results
    }

    pub fn iter(&self) -> impl Iterator<Item = &SimulationResult> {
        self.results.iter()
    }

    pub fn last(&self) -> Option<&SimulationResult> {
        self.results.last()
    }

    pub fn steps(&self) -> Vec<usize> {
        self.results.iter().map(|r| r.step).collect()
    }

    /// Bus ids present in the recorded results, ascending.
    pub fn bus_ids(&self) -> Vec<BusId> {
        self.results
            .first()
            .map(|r| r.voltages.keys().copied().collect())
            .unwrap_or_default()
    }

    /// `(step, vm_pu)` for one bus across the run.
    pub fn series(&self, bus: BusId) -> Vec<(usize, f64)> {
        self.results
            .iter()
            .filter_map(|r| r.voltages.get(&bus).map(|&v| (r.step, v)))
            .collect()
    }

    pub fn summary(&self) -> Option<HistorySummary> {
        let first = self.results.first()?;
        let mut summary = HistorySummary {
            steps: self.results.len(),
            min: (first.step, BusId::new(0), f64::INFINITY),
            max: (first.step, BusId::new(0), f64::NEG_INFINITY),
            total_iterations: 0,
            peak_losses_mw: 0.0,
        };
        for r in &self.results {
            if let Some((bus, v)) = r.min_voltage() {
                if v < summary.min.2 {
                    summary.min = (r.step, bus, v);
                }
            }
            if let Some((bus, v)) = r.max_voltage() {
                if v > summary.max.2 {
                    summary.max = (r.step, bus, v);
                }
            }
            summary.total_iterations += r.iterations;
            summary.peak_losses_mw = summary.peak_losses_mw.max(r.losses_mw);
        }
        Some(summary)
    }

    /// Wide CSV: `step,scale,iterations,losses_mw,bus_0,bus_1,...`
    pub fn write_csv(&self, writer: impl Write) -> FdrResult<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        let buses = self.bus_ids();

        let mut header = vec![
            "step".to_string(),
            "scale".to_string(),
            "iterations".to_string(),
            "losses_mw".to_string(),
        ];
        header.extend(buses.iter().map(|b| format!("bus_{}", b)));
        wtr.write_record(&header).map_err(csv_error)?;

        for r in &self.results {
            let mut row = vec![
                r.step.to_string(),
                format!("{:.6}", r.scale),
                r.iterations.to_string(),
                format!("{:.6}", r.losses_mw),
            ];
            for bus in &buses {
                row.push(
                    r.voltages
                        .get(bus)
                        .map(|v| format!("{:.6}", v))
                        .unwrap_or_default(),
                );
            }
            wtr.write_record(&row).map_err(csv_error)?;
        }

        wtr.flush()
            .map_err(|e| FdrError::SinkUnavailable(format!("CSV flush failed: {}", e)))
    }

    pub fn export_csv(&self, path: impl AsRef<Path>) -> FdrResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                FdrError::SinkUnavailable(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        let file = std::fs::File::create(path).map_err(|e| {
            FdrError::SinkUnavailable(format!("cannot create {}: {}", path.display(), e))
        })?;
        self.write_csv(std::io::BufWriter::new(file))
    }
}

/// Extremes across a whole run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySummary {
    pub steps: usize,
    /// `(step, bus, vm_pu)` of the lowest voltage seen
    pub min: (usize, BusId, f64),
    pub max: (usize, BusId, f64),
    pub total_iterations: usize,
    pub peak_losses_mw: f64,
}

fn csv_error(err: csv::Error) -> FdrError {
    FdrError::SinkUnavailable(format!("CSV write failed: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(step: usize, voltages: &[f64]) -> SimulationResult {
        SimulationResult {
            step,
            scale: 1.0,
            voltages: voltages
                .iter()
                .enumerate()
                .map(|(i, &v)| (BusId::new(i), v))
                .collect(),
            iterations: 3,
            losses_mw: 0.1 * step as f64,
        }
    }

    #[test]
    fn push_rejects_out_of_order_steps() {
        let mut history = HistoryBuffer::new();
        history.push(result(0, &[1.0])).unwrap();
        history.push(result(2, &[1.0])).unwrap();
        assert!(history.push(result(2, &[1.0])).is_err());
        assert!(history.push(result(1, &[1.0])).is_err());
        assert_eq!(history.steps(), vec![0, 2]);
    }

    #[test]
    fn extremes_and_band() {
        let r = result(0, &[1.0, 0.95, 0.89, 1.12]);
        assert_eq!(r.min_voltage(), Some((BusId::new(2), 0.89)));
        assert_eq!(r.max_voltage(), Some((BusId::new(3), 1.12)));
        assert_eq!(
            r.out_of_band(0.9, 1.1),
            vec![(BusId::new(2), 0.89), (BusId::new(3), 1.12)]
        );
    }

    #[test]
    fn series_and_summary() {
        let mut history = HistoryBuffer::new();
        history.push(result(0, &[1.0, 0.97])).unwrap();
        history.push(result(1, &[1.0, 0.93])).unwrap();
        history.push(result(2, &[1.0, 0.95])).unwrap();

        assert_eq!(history.bus_ids(), vec![BusId::new(0), BusId::new(1)]);
        assert_eq!(history.series(BusId::new(1)), vec![(0, 0.97), (1, 0.93), (2, 0.95)]);

        let summary = history.summary().unwrap();
        assert_eq!(summary.steps, 3);
        assert_eq!(summary.min, (1, BusId::new(1), 0.93));
        assert_eq!(summary.max.2, 1.0);
        assert_eq!(summary.total_iterations, 9);
        assert!((summary.peak_losses_mw - 0.2).abs() < 1e-12);
        assert!(HistoryBuffer::new().summary().is_none());
    }

    #[test]
    fn csv_has_one_column_per_bus() {
        let mut history = HistoryBuffer::new();
        history.push(result(0, &[1.0, 0.97, 0.96])).unwrap();
        history.push(result(1, &[1.0, 0.95, 0.94])).unwrap();

        let mut buf = Vec::new();
        history.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "step,scale,iterations,losses_mw,bus_0,bus_1,bus_2"
        );
        assert_eq!(
            lines.next().unwrap(),
            "0,1.000000,3,0.000000,1.000000,0.970000,0.960000"
        );
        assert_eq!(lines.count(), 1);
    }

    #[test]
    fn export_csv_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/history.csv");
        let mut history = HistoryBuffer::new();
        history.push(result(0, &[1.0])).unwrap();
        history.export_csv(&path).unwrap();
        assert!(std::fs::read_to_string(path).unwrap().starts_with("step,"));
    }
}
