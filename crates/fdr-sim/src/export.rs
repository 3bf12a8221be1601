//! Per-step result sinks.

use crate::history::SimulationResult;
use fdr_core::FdrResult;
use fdr_ts::{PointWriter, SimulationClock, TimeSeriesPoint};

/// Receives each step's result right after it is recorded.
///
/// An error aborts the run at that step.
pub trait StepSink {
    fn on_step(&mut self, result: &SimulationResult) -> FdrResult<()>;
}

/// Streams every bus voltage of a step to a [`PointWriter`] as one batch.
pub struct TimeSeriesExport<W: PointWriter> {
    writer: W,
    clock: SimulationClock,
}

impl<W: PointWriter> TimeSeriesExport<W> {
    pub fn new(writer: W, clock: SimulationClock) -> Self {
        Self { writer, clock }
    }

    /// `bus_voltage` points for one step, ordered by bus id.
    pub fn points_for(&self, result: &SimulationResult) -> FdrResult<Vec<TimeSeriesPoint>> {
        let time = self.clock.timestamp(result.step)?;
        Ok(result
            .voltages
            .iter()
            .map(|(&bus, &vm)| TimeSeriesPoint::bus_voltage(bus, vm, time))
            .collect())
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: PointWriter> StepSink for TimeSeriesExport<W> {
    fn on_step(&mut self, result: &SimulationResult) -> FdrResult<()> {
        let points = self.points_for(result)?;
        self.writer.write_points(&points)
    }
}
