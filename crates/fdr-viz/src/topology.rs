//! Network heat-map: buses coloured by their current voltage magnitude.

use std::collections::BTreeMap;

use fdr_core::{BusId, FdrResult, Network};
use plotly::common::{
    ColorBar, ColorScale, ColorScalePalette, DashType, HoverInfo, Line, Marker, Mode, Position,
    Title,
};
use plotly::layout::{Axis, Layout};
use plotly::{Plot, Scatter};
use plotters::element::DashedPathElement;
use plotters::prelude::{
    ChartBuilder, Circle, Color, DrawingBackend, EmptyElement, IntoFont, PathElement, RGBColor,
    Rectangle, Text, ViridisRGB, WHITE,
};

use crate::layout::LayoutResult;
use crate::render::{plot_error, render, Canvas, Figure};
use crate::PlotOptions;

const DEFAULT_TITLE: &str = "Voltage Heat-Map";
const COLORBAR_LABEL: &str = "Voltage (p.u.)";
const COLORBAR_WIDTH: i32 = 120;
const COLORBAR_SLICES: usize = 64;
const BRANCH: RGBColor = RGBColor(0x55, 0x55, 0x55);
const OPEN_TIE: RGBColor = RGBColor(0xbb, 0xbb, 0xbb);
const NO_VOLTAGE: RGBColor = RGBColor(0xcc, 0xcc, 0xcc);

/// Render `network` at the positions in `layout`.
///
/// Colours come from each bus's `voltage_pu`, i.e. the last solved state.
pub fn render_topology(
    network: &Network,
    layout: &LayoutResult,
    options: &PlotOptions,
) -> FdrResult<Vec<u8>> {
    let figure = TopologyFigure {
        layout,
        voltages: network.bus_voltages(),
        title: options.title.as_deref().unwrap_or(DEFAULT_TITLE),
    };
    let rendered = render(&figure, options)?;
    tracing::debug!(buses = layout.nodes.len(), format = %options.format, "rendered topology");
    Ok(rendered)
}

struct TopologyFigure<'a> {
    layout: &'a LayoutResult,
    voltages: BTreeMap<BusId, f64>,
    title: &'a str,
}

impl TopologyFigure<'_> {
    fn vm(&self, bus: usize) -> Option<f64> {
        self.voltages
            .get(&BusId::new(bus))
            .copied()
            .filter(|v| v.is_finite())
    }

    /// Voltage range over the drawn buses.
    fn range(&self) -> Option<(f64, f64)> {
        self.layout
            .nodes
            .iter()
            .filter_map(|n| self.vm(n.id))
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    fn position(&self, bus: usize) -> Option<(f64, f64)> {
        // tree depth grows downwards
        self.layout
            .node(bus)
            .map(|n| (n.x as f64, -(n.y as f64)))
    }

    fn branches(&self, in_service: bool) -> Vec<((f64, f64), (f64, f64))> {
        self.layout
            .edges
            .iter()
            .filter(|e| e.in_service == in_service)
            .filter_map(|e| Some((self.position(e.from)?, self.position(e.to)?)))
            .collect()
    }
}

impl Figure for TopologyFigure<'_> {
    fn draw<DB: DrawingBackend>(&self, root: &Canvas<DB>) -> FdrResult<()> {
        root.fill(&WHITE).map_err(plot_error)?;
        let area = root
            .titled(self.title, ("sans-serif", 20).into_font())
            .map_err(plot_error)?;

        let (Some((min_x, min_y, max_x, max_y)), Some((lo, hi))) =
            (self.layout.bounds(), self.range())
        else {
            let (w, h) = area.dim_in_pixel();
            area.draw(&Text::new(
                "no buses to draw",
                (w as i32 / 2 - 60, h as i32 / 2),
                ("sans-serif", 16).into_font(),
            ))
            .map_err(plot_error)?;
            return Ok(());
        };

        let (w, h) = area.dim_in_pixel();
        let (map_area, bar_area) =
            area.split_horizontally((w as i32 - COLORBAR_WIDTH).max(1));

        let pad = 0.6;
        let (min_x, min_y, max_x, max_y) = (min_x as f64, min_y as f64, max_x as f64, max_y as f64);
        let mut chart = ChartBuilder::on(&map_area)
            .margin(15)
            .build_cartesian_2d((min_x - pad)..(max_x + pad), -(max_y + pad)..(pad - min_y))
            .map_err(plot_error)?;

        chart
            .draw_series(
                self.branches(true)
                    .into_iter()
                    .map(|(a, b)| PathElement::new(vec![a, b], BRANCH.stroke_width(2))),
            )
            .map_err(plot_error)?;
        chart
            .draw_series(
                self.branches(false)
                    .into_iter()
                    .map(|(a, b)| DashedPathElement::new(vec![a, b], 5, 4, OPEN_TIE.stroke_width(1))),
            )
            .map_err(plot_error)?;

        let radius = (w.min(h) as f64 / (4.0 * (self.layout.nodes.len() as f64).sqrt()))
            .clamp(4.0, 10.0) as i32;
        chart
            .draw_series(self.layout.nodes.iter().map(|node| {
                let fill = self
                    .vm(node.id)
                    .map(|v| voltage_color(v, lo, hi))
                    .unwrap_or(NO_VOLTAGE);
                EmptyElement::at((node.x as f64, -(node.y as f64)))
                    + Circle::new((0, 0), radius, fill.filled())
                    + Text::new(
                        node.id.to_string(),
                        (radius + 2, -2 * radius),
                        ("sans-serif", 11).into_font(),
                    )
            }))
            .map_err(plot_error)?;

        draw_colorbar(&bar_area, lo, hi)
    }

    fn to_plotly(&self, width: u32, height: u32) -> Plot {
        let mut plot = Plot::new();

        for (in_service, name, line) in [
            (true, "branches", Line::new().color("#555555").width(2.0)),
            (
                false,
                "open ties",
                Line::new().color("#bbbbbb").width(1.0).dash(DashType::Dash),
            ),
        ] {
            let mut xs = Vec::new();
            let mut ys = Vec::new();
            for ((x1, y1), (x2, y2)) in self.branches(in_service) {
                xs.extend([Some(x1), Some(x2), None]);
                ys.extend([Some(y1), Some(y2), None]);
            }
            if xs.is_empty() {
                continue;
            }
            plot.add_trace(
                Scatter::new(xs, ys)
                    .name(name)
                    .mode(Mode::Lines)
                    .line(line)
                    .hover_info(HoverInfo::Skip),
            );
        }

        let nodes = &self.layout.nodes;
        if let Some((lo, hi)) = self.range() {
            let xs: Vec<f64> = nodes.iter().map(|n| n.x as f64).collect();
            let ys: Vec<f64> = nodes.iter().map(|n| -(n.y as f64)).collect();
            let vms: Vec<f64> = nodes
                .iter()
                .map(|n| self.vm(n.id).unwrap_or(f64::NAN))
                .collect();
            let labels: Vec<String> = nodes.iter().map(|n| n.id.to_string()).collect();
            let hover: Vec<String> = nodes
                .iter()
                .map(|n| match self.vm(n.id) {
                    Some(v) => format!("bus {} ({}): {:.4} p.u.", n.id, n.label, v),
                    None => format!("bus {} ({})", n.id, n.label),
                })
                .collect();

            plot.add_trace(
                Scatter::new(xs, ys)
                    .name("buses")
                    .mode(Mode::MarkersText)
                    .text_array(labels)
                    .text_position(Position::TopRight)
                    .hover_text_array(hover)
                    .hover_info(HoverInfo::Text)
                    .marker(
                        Marker::new()
                            .size(14)
                            .color_array(vms)
                            .color_scale(ColorScale::Palette(ColorScalePalette::Viridis))
                            .cmin(lo)
                            .cmax(hi)
                            .show_scale(true)
                            .color_bar(ColorBar::new().title(Title::with_text(COLORBAR_LABEL))),
                    ),
            );
        }

        let hidden = || {
            Axis::new()
                .show_grid(false)
                .zero_line(false)
                .show_tick_labels(false)
        };
        plot.set_layout(
            Layout::new()
                .title(Title::with_text(self.title))
                .width(width as usize)
                .height(height as usize)
                .show_legend(false)
                .x_axis(hidden())
                .y_axis(hidden()),
        );
        plot
    }
}

/// Viridis colour for `v` within `[lo, hi]`; a flat range maps to the middle.
fn voltage_color(v: f64, lo: f64, hi: f64) -> RGBColor {
    if hi - lo > f64::EPSILON {
        ViridisRGB::get_color_normalized(v.clamp(lo, hi), lo, hi)
    } else {
        ViridisRGB::get_color(0.5f64)
    }
}

fn draw_colorbar<DB: DrawingBackend>(area: &Canvas<DB>, lo: f64, hi: f64) -> FdrResult<()> {
    let (lo, hi) = if hi - lo > f64::EPSILON {
        (lo, hi)
    } else {
        (lo - 0.005, hi + 0.005)
    };
    let mut bar = ChartBuilder::on(area)
        .margin_top(20)
        .margin_bottom(30)
        .margin_right(30)
        .y_label_area_size(70)
        .build_cartesian_2d(0f64..1f64, lo..hi)
        .map_err(plot_error)?;
    bar.configure_mesh()
        .disable_mesh()
        .x_labels(0)
        .y_labels(5)
        .y_desc(COLORBAR_LABEL)
        .y_label_formatter(&|v| format!("{:.3}", v))
        .draw()
        .map_err(plot_error)?;

    let slice = (hi - lo) / COLORBAR_SLICES as f64;
    bar.draw_series((0..COLORBAR_SLICES).map(|i| {
        let y0 = lo + i as f64 * slice;
        Rectangle::new(
            [(0.0, y0), (1.0, y0 + slice)],
            voltage_color(y0 + slice / 2.0, lo, hi).filled(),
        )
    }))
    .map_err(plot_error)?;
    Ok(())
}
