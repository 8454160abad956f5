//! Figure rendering to PNG and SVG files.

use crate::figure::{Canvas, Figure, Legend, PlotMode, TextStyle as FigureText};
use crate::style::Rgb;
use anyhow::{Context, Result};
use clap::ValueEnum;
use image::RgbImage;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::FontStyle;
use serde::Serialize;
use std::path::Path;

/// Approximate glyph width relative to font size, used to size the legend box
const CHAR_WIDTH_RATIO: f64 = 0.6;
/// Legend row height relative to font size
const LEGEND_LINE_SPACING: f64 = 1.5;
/// Points used to approximate each rounded corner
const CORNER_STEPS: usize = 6;
const MARGIN_PT: f64 = 10.0;

const BACKGROUND: RGBColor = WHITE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Svg,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Svg => "svg",
        }
    }
}

/// File name for a variable's figure, e.g. `knee_r_normalized_graph.png`
pub fn output_file_name(variable: &str, mode: PlotMode, format: OutputFormat) -> String {
    let safe: String = variable
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect();
    format!("{}_{}.{}", safe, mode.file_suffix(), format.extension())
}

/// Render `figure` to `path` in the given format
pub fn render<P: AsRef<Path>>(figure: &Figure, path: P, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Png => render_png(figure, path),
        OutputFormat::Svg => render_svg(figure, path),
    }
}

/// Draw into an in-memory bitmap, crop to the drawn content plus padding, save as PNG
pub fn render_png<P: AsRef<Path>>(figure: &Figure, path: P) -> Result<()> {
    let path = path.as_ref();
    let (width, height) = figure.canvas.size_px();
    let mut buffer = vec![0u8; width as usize * height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        draw_figure(&root, figure)?;
        root.present()?;
    }

    let image = RgbImage::from_raw(width, height, buffer).context("Bitmap buffer does not match canvas size")?;
    let (x, y, w, h) = tight_bbox(&image, figure.canvas.pad_px());
    let cropped = image::imageops::crop_imm(&image, x, y, w, h).to_image();
    cropped
        .save(path)
        .with_context(|| format!("Failed to write PNG: {}", path.display()))?;
    Ok(())
}

pub fn render_svg<P: AsRef<Path>>(figure: &Figure, path: P) -> Result<()> {
    let root = SVGBackend::new(path.as_ref(), figure.canvas.size_px()).into_drawing_area();
    draw_figure(&root, figure)?;
    root.present()
        .with_context(|| format!("Failed to write SVG: {}", path.as_ref().display()))?;
    Ok(())
}

/// Bounding box `(x, y, width, height)` of all non-background pixels grown by `pad`.
///
/// A blank image keeps its full extent.
pub fn tight_bbox(image: &RgbImage, pad: u32) -> (u32, u32, u32, u32) {
    let background = image::Rgb([BACKGROUND.0, BACKGROUND.1, BACKGROUND.2]);
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in image.enumerate_pixels() {
        if *pixel == background {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }

    let Some((x0, y0, x1, y1)) = bounds else {
        return (0, 0, image.width(), image.height());
    };
    let left = x0.saturating_sub(pad);
    let top = y0.saturating_sub(pad);
    let right = x1.saturating_add(pad).min(image.width() - 1);
    let bottom = y1.saturating_add(pad).min(image.height() - 1);
    (left, top, right - left + 1, bottom - top + 1)
}

fn rgb(color: Rgb) -> RGBColor {
    RGBColor(color.0, color.1, color.2)
}

fn font<'a>(family: &'a str, text: &FigureText, canvas: &Canvas) -> FontDesc<'a> {
    let desc = (family, canvas.px(text.size_pt)).into_font();
    if text.bold {
        desc.style(FontStyle::Bold)
    } else {
        desc
    }
}

fn stroke(canvas: &Canvas, pt: f64) -> u32 {
    canvas.px(pt).round().max(1.0) as u32
}

/// Tick text: whole numbers without decimals, others to two places
fn format_tick(value: f64) -> String {
    if (value - value.round()).abs() < 1e-9 {
        format!("{:.0}", value.round() + 0.0)
    } else {
        format!("{:.2}", value)
    }
}

/// Draw a complete figure onto `root`
pub fn draw_figure<DB>(root: &DrawingArea<DB, Shift>, figure: &Figure) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let canvas = &figure.canvas;
    let typography = &figure.typography;
    let family = typography.family.as_str();
    let tick_px = canvas.px(typography.tick.size_pt);
    let axis_px = canvas.px(typography.axis_label.size_pt);

    root.fill(&BACKGROUND)?;

    let mut chart = ChartBuilder::on(root)
        .caption(&figure.title, font(family, &typography.title, canvas))
        .margin(canvas.px(MARGIN_PT).round() as u32)
        .x_label_area_size((tick_px * 1.6 + axis_px * 1.6).round() as u32)
        .y_label_area_size((tick_px * 4.0 + axis_px * 1.6).round() as u32)
        .build_cartesian_2d(figure.x_range.clone(), figure.y_range.clone())?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(figure.x_ticks)
        .y_labels(figure.y_ticks)
        .x_desc(&figure.x_title)
        .y_desc(&figure.y_title)
        .x_label_formatter(&|x| format_tick(*x))
        .y_label_formatter(&|y| format_tick(*y))
        .axis_desc_style(font(family, &typography.axis_label, canvas))
        .label_style(font(family, &typography.tick, canvas))
        .axis_style(BLACK.stroke_width(stroke(canvas, 1.0)))
        .draw()?;

    // Grid lines follow the tick positions chosen for the labels
    let grid = &figure.grid;
    let grid_style = BLACK.mix(grid.alpha).stroke_width(stroke(canvas, grid.width_pt));
    let (dash, gap) = if grid.dashed {
        (canvas.px(grid.dash_pt), canvas.px(grid.gap_pt))
    } else {
        (f64::INFINITY, 0.0)
    };
    let (x_px, y_px) = chart.plotting_area().get_pixel_range();
    for x in chart.as_coord_spec().x_spec().key_points(figure.x_ticks) {
        let (px, _) = chart.backend_coord(&(x, figure.y_range.start));
        for (from, to) in dash_spans(y_px.start, y_px.end, dash, gap) {
            root.draw(&PathElement::new(vec![(px, from), (px, to)], grid_style))?;
        }
    }
    for y in chart.as_coord_spec().y_spec().key_points(figure.y_ticks) {
        let (_, py) = chart.backend_coord(&(figure.x_range.start, y));
        for (from, to) in dash_spans(x_px.start, x_px.end, dash, gap) {
            root.draw(&PathElement::new(vec![(from, py), (to, py)], grid_style))?;
        }
    }

    // Bands first so every curve stays on top of every band
    for curve in &figure.curves {
        if let Some(band) = &curve.band {
            let outline = band.outline();
            if outline.len() >= 3 {
                chart.draw_series(std::iter::once(Polygon::new(
                    outline,
                    rgb(curve.color).mix(band.alpha).filled(),
                )))?;
            }
        }
    }
    for curve in &figure.curves {
        let style = rgb(curve.color).stroke_width(stroke(canvas, curve.line_width_pt));
        for segment in curve.segments() {
            chart.draw_series(LineSeries::new(segment, style))?;
        }
    }

    draw_legend(root, &figure.legend, family, canvas, (x_px, y_px))?;
    Ok(())
}

/// Rounded, shadowed legend box pinned inside the plot area's upper-right corner
fn draw_legend<DB>(
    root: &DrawingArea<DB, Shift>,
    legend: &Legend,
    family: &str,
    canvas: &Canvas,
    plot: (std::ops::Range<i32>, std::ops::Range<i32>),
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    if legend.entries.is_empty() {
        return Ok(());
    }

    let font_px = canvas.px(legend.font_pt);
    let pad = font_px * 0.6;
    let handle = canvas.px(legend.handle_pt);
    let gap = font_px * 0.5;
    let row = font_px * LEGEND_LINE_SPACING;
    let widest = legend.entries.iter().map(|e| e.label.chars().count()).max().unwrap_or(0);

    let width = (2.0 * pad + handle + gap + widest as f64 * font_px * CHAR_WIDTH_RATIO).round() as i32;
    let height = (2.0 * pad + legend.entries.len() as f64 * row).round() as i32;
    let inset = canvas.px(legend.inset_pt).round() as i32;
    let radius = canvas.px(legend.corner_radius_pt).round() as i32;

    let (x_px, y_px) = plot;
    let x1 = x_px.end - inset;
    let y0 = y_px.start + inset;
    let x0 = x1 - width;
    let y1 = y0 + height;

    if let Some(shadow) = legend.shadow {
        let offset = canvas.px(shadow.offset_pt).round() as i32;
        root.draw(&Polygon::new(
            rounded_rect(x0 + offset, y0 + offset, x1 + offset, y1 + offset, radius),
            BLACK.mix(shadow.alpha).filled(),
        ))?;
    }
    let frame = rounded_rect(x0, y0, x1, y1, radius);
    root.draw(&Polygon::new(frame.clone(), WHITE.mix(legend.frame_alpha).filled()))?;
    let mut border = frame;
    border.push(border[0]);
    root.draw(&PathElement::new(border, BLACK.mix(0.4).stroke_width(stroke(canvas, 0.8))))?;

    let text_style = (family, font_px)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Left, VPos::Center));
    let handle_x = x0 + pad.round() as i32;
    let text_x = handle_x + (handle + gap).round() as i32;
    for (i, entry) in legend.entries.iter().enumerate() {
        let cy = y0 + (pad + row * (i as f64 + 0.5)).round() as i32;
        let style = rgb(entry.color).stroke_width(stroke(canvas, entry.line_width_pt));
        root.draw(&PathElement::new(
            vec![(handle_x, cy), (handle_x + handle.round() as i32, cy)],
            style,
        ))?;
        root.draw(&Text::new(entry.label.as_str(), (text_x, cy), text_style.clone()))?;
    }
    Ok(())
}

/// Outline of a rectangle with quarter-circle corners, clockwise from the top edge
pub fn rounded_rect(x0: i32, y0: i32, x1: i32, y1: i32, radius: i32) -> Vec<(i32, i32)> {
    let r = radius.clamp(0, ((x1 - x0) / 2).min((y1 - y0) / 2));
    if r == 0 {
        return vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1)];
    }

    // (corner center, starting angle in quarter turns)
    let corners = [
        ((x1 - r, y0 + r), 3.0),
        ((x1 - r, y1 - r), 0.0),
        ((x0 + r, y1 - r), 1.0),
        ((x0 + r, y0 + r), 2.0),
    ];
    let mut points = Vec::with_capacity(corners.len() * (CORNER_STEPS + 1));
    for ((cx, cy), quarter) in corners {
        for step in 0..=CORNER_STEPS {
            let angle = (quarter + step as f64 / CORNER_STEPS as f64) * std::f64::consts::FRAC_PI_2;
            points.push((
                cx + (r as f64 * angle.cos()).round() as i32,
                cy + (r as f64 * angle.sin()).round() as i32,
            ));
        }
    }
    points
}

/// Split `[from, to]` into dashes of `dash` pixels separated by `gap` pixels
fn dash_spans(from: i32, to: i32, dash: f64, gap: f64) -> Vec<(i32, i32)> {
    let (from, to) = (from.min(to) as f64, from.max(to) as f64);
    if !dash.is_finite() || dash <= 0.0 {
        return vec![(from as i32, to as i32)];
    }
    let mut spans = Vec::new();
    let mut start = from;
    while start < to {
        let end = (start + dash).min(to);
        spans.push((start.round() as i32, end.round() as i32));
        start = end + gap.max(1.0);
    }
    spans
}
