//! Backend dispatch shared by the topology and time-series figures.

use std::fmt::Display;

use fdr_core::{FdrError, FdrResult};
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};
use plotters::coord::Shift;
use plotters::prelude::{BitMapBackend, DrawingArea, DrawingBackend, IntoDrawingArea, SVGBackend};

use crate::{PlotFormat, PlotOptions};

pub(crate) type Canvas<DB> = DrawingArea<DB, Shift>;

/// A figure that can be drawn by plotters (SVG, PNG) or built as a plotly plot (HTML).
pub(crate) trait Figure {
    fn draw<DB: DrawingBackend>(&self, root: &Canvas<DB>) -> FdrResult<()>;

    fn to_plotly(&self, width: u32, height: u32) -> plotly::Plot;
}

pub(crate) fn render(figure: &impl Figure, options: &PlotOptions) -> FdrResult<Vec<u8>> {
    options.validate()?;
    let (width, height) = options.pixel_size();
    match options.format {
        PlotFormat::Svg => {
            let mut svg = String::new();
            {
                let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
                figure.draw(&root)?;
                root.present().map_err(plot_error)?;
            }
            Ok(svg.into_bytes())
        }
        PlotFormat::Png => {
            let mut pixels = vec![0u8; width as usize * height as usize * 3];
            {
                let root = BitMapBackend::with_buffer(&mut pixels, (width, height))
                    .into_drawing_area();
                figure.draw(&root)?;
                root.present().map_err(plot_error)?;
            }
            encode_png(&pixels, width, height)
        }
        PlotFormat::Html => Ok(figure.to_plotly(width, height).to_html().into_bytes()),
    }
}

fn encode_png(pixels: &[u8], width: u32, height: u32) -> FdrResult<Vec<u8>> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(pixels, width, height, ColorType::Rgb8)
        .map_err(plot_error)?;
    Ok(out)
}

pub(crate) fn plot_error(err: impl Display) -> FdrError {
    FdrError::Other(format!("plot rendering failed: {err}"))
}
