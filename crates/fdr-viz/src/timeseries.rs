//! Per-bus voltage lines across a run.

use fdr_core::FdrResult;
use fdr_sim::HistoryBuffer;
use plotly::common::{HoverInfo, Mode, Title};
use plotly::layout::{Axis, Layout};
use plotly::{Plot, Scatter};
use plotters::prelude::{
    ChartBuilder, Color, DrawingBackend, IntoFont, LineSeries, Palette, Palette99, PathElement,
    Text, WHITE,
};

use crate::render::{plot_error, render, Canvas, Figure};
use crate::PlotOptions;

const DEFAULT_TITLE: &str = "Voltage profile";
const X_LABEL: &str = "Hour of day";
const Y_LABEL: &str = "Voltage (p.u.)";
const LEGEND_ROW: i32 = 12;
const LEGEND_COLUMN: i32 = 58;

/// Render every bus's voltage across `history` as one line each.
pub fn render_timeseries(history: &HistoryBuffer, options: &PlotOptions) -> FdrResult<Vec<u8>> {
    let figure = VoltageChart {
        history,
        title: options.title.as_deref().unwrap_or(DEFAULT_TITLE),
    };
    let rendered = render(&figure, options)?;
    tracing::debug!(
        buses = history.bus_ids().len(),
        steps = history.len(),
        format = %options.format,
        "rendered voltage chart"
    );
    Ok(rendered)
}

struct VoltageChart<'a> {
    history: &'a HistoryBuffer,
    title: &'a str,
}

impl VoltageChart<'_> {
    /// Finite voltage range, padded so a flat run still has height.
    fn y_range(&self) -> Option<(f64, f64)> {
        let (lo, hi) = self
            .history
            .iter()
            .flat_map(|r| r.voltages.values().copied())
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
                None => Some((v, v)),
            })?;
        let pad = ((hi - lo) * 0.05).max(0.005);
        Some((lo - pad, hi + pad))
    }

    fn x_range(&self) -> Option<(f64, f64)> {
        let first = self.history.results().first()?.step as f64;
        let last = self.history.last()?.step as f64;
        Some((first, last.max(first + 1.0)))
    }
}

impl Figure for VoltageChart<'_> {
    fn draw<DB: DrawingBackend>(&self, root: &Canvas<DB>) -> FdrResult<()> {
        root.fill(&WHITE).map_err(plot_error)?;
        let (w, h) = root.dim_in_pixel();

        let (Some((x_lo, x_hi)), Some((y_lo, y_hi))) = (self.x_range(), self.y_range()) else {
            root.draw(&Text::new(
                "no results to plot",
                (w as i32 / 2 - 60, h as i32 / 2),
                ("sans-serif", 16).into_font(),
            ))
            .map_err(plot_error)?;
            return Ok(());
        };

        // legend columns on the right, as many rows as fit beside the plot
        let buses = self.history.bus_ids();
        let rows = ((h as i32 - 60) / LEGEND_ROW).max(1) as usize;
        let columns = buses.len().div_ceil(rows).max(1) as i32;
        let legend_width = columns * LEGEND_COLUMN + 12;
        let (plot_area, legend_area) = root.split_horizontally((w as i32 - legend_width).max(1));

        let mut chart = ChartBuilder::on(&plot_area)
            .caption(self.title, ("sans-serif", 18).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)
            .map_err(plot_error)?;
        chart
            .configure_mesh()
            .x_desc(X_LABEL)
            .y_desc(Y_LABEL)
            .x_label_formatter(&|v| format!("{:.0}", v))
            .y_label_formatter(&|v| format!("{:.3}", v))
            .draw()
            .map_err(plot_error)?;

        for (i, bus) in buses.iter().enumerate() {
            let color = Palette99::pick(i);
            let points = self
                .history
                .series(*bus)
                .into_iter()
                .filter(|(_, v)| v.is_finite())
                .map(|(step, v)| (step as f64, v));
            chart
                .draw_series(LineSeries::new(points, color.stroke_width(2)))
                .map_err(plot_error)?;

            let column = (i / rows) as i32;
            let row = (i % rows) as i32;
            let (x, y) = (8 + column * LEGEND_COLUMN, 34 + row * LEGEND_ROW);
            legend_area
                .draw(&PathElement::new(vec![(x, y), (x + 14, y)], color.stroke_width(2)))
                .map_err(plot_error)?;
            legend_area
                .draw(&Text::new(
                    format!("bus {}", bus),
                    (x + 18, y - 5),
                    ("sans-serif", 10).into_font(),
                ))
                .map_err(plot_error)?;
        }
        Ok(())
    }

    fn to_plotly(&self, width: u32, height: u32) -> Plot {
        let mut plot = Plot::new();
        for bus in self.history.bus_ids() {
            let (steps, vms): (Vec<usize>, Vec<f64>) =
                self.history.series(bus).into_iter().unzip();
            let hover: Vec<String> = steps
                .iter()
                .zip(&vms)
                .map(|(step, v)| format!("bus {}, hour {}: {:.4} p.u.", bus, step, v))
                .collect();
            plot.add_trace(
                Scatter::new(steps, vms)
                    .name(&format!("bus {}", bus))
                    .mode(Mode::LinesMarkers)
                    .hover_text_array(hover)
                    .hover_info(HoverInfo::Text),
            );
        }
        plot.set_layout(
            Layout::new()
                .title(Title::with_text(self.title))
                .width(width as usize)
                .height(height as usize)
                .x_axis(Axis::new().title(Title::with_text(X_LABEL)))
                .y_axis(Axis::new().title(Title::with_text(Y_LABEL))),
        );
        plot
    }
}
