//! Minimal PNG line plots of one table column over time

use crate::table::Table;
use crate::types::Result;
use image::{ImageFormat, Rgb, RgbImage};
use std::path::Path;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 400;
const MARGIN: u32 = 40;
const GRID_LINES: u32 = 4;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXES: Rgb<u8> = Rgb([0, 0, 0]);
const GRID: Rgb<u8> = Rgb([220, 220, 220]);
const LINE: Rgb<u8> = Rgb([31, 119, 180]);

/// Render `column` against the row index and save it as PNG
///
/// NaN samples break the line. A column without finite samples produces an
/// empty frame.
pub fn render_line_plot(table: &Table, column: &str, path: &Path) -> Result<()> {
    let values = table.numeric(column)?;
    let points: Vec<Option<(f64, f64)>> = table
        .index()
        .iter()
        .zip(values)
        .map(|(&x, &y)| y.is_finite().then_some((x, y)))
        .collect();

    let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);
    draw_frame(&mut img);

    if let Some(bounds) = Bounds::of(points.iter().flatten()) {
        let mut previous: Option<(i64, i64)> = None;
        for point in &points {
            match point {
                Some((x, y)) => {
                    let current = bounds.to_pixel(*x, *y);
                    match previous {
                        Some(from) => draw_line(&mut img, from, current, LINE),
                        None => put(&mut img, current.0, current.1, LINE),
                    }
                    previous = Some(current);
                }
                None => previous = None,
            }
        }
    } else {
        log::warn!("Column '{}' has no finite samples to plot", column);
    }

    img.save_with_format(path, ImageFormat::Png)?;
    log::info!("Plotted '{}' to {:?}", column, path);
    Ok(())
}

struct Bounds {
    x_min: f64,
    x_span: f64,
    y_min: f64,
    y_span: f64,
}

impl Bounds {
    fn of<'a>(points: impl Iterator<Item = &'a (f64, f64)>) -> Option<Self> {
        let mut found = false;
        let (mut x_min, mut x_max) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
        for &(x, y) in points {
            found = true;
            x_min = x_min.min(x);
            x_max = x_max.max(x);
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }
        if !found {
            return None;
        }
        // Flat series are centred
        if y_max == y_min {
            y_min -= 1.0;
            y_max += 1.0;
        }
        Some(Self {
            x_min,
            x_span: (x_max - x_min).max(f64::EPSILON),
            y_min,
            y_span: y_max - y_min,
        })
    }

    fn to_pixel(&self, x: f64, y: f64) -> (i64, i64) {
        let plot_w = (WIDTH - 2 * MARGIN) as f64;
        let plot_h = (HEIGHT - 2 * MARGIN) as f64;
        let px = MARGIN as f64 + (x - self.x_min) / self.x_span * plot_w;
        let py = (HEIGHT - MARGIN) as f64 - (y - self.y_min) / self.y_span * plot_h;
        (px.round() as i64, py.round() as i64)
    }
}

fn draw_frame(img: &mut RgbImage) {
    let (left, right) = (MARGIN as i64, (WIDTH - MARGIN) as i64);
    let (top, bottom) = (MARGIN as i64, (HEIGHT - MARGIN) as i64);

    for i in 1..GRID_LINES {
        let y = top + (bottom - top) * i as i64 / GRID_LINES as i64;
        draw_line(img, (left, y), (right, y), GRID);
        let x = left + (right - left) * i as i64 / GRID_LINES as i64;
        draw_line(img, (x, top), (x, bottom), GRID);
    }

    draw_line(img, (left, top), (right, top), AXES);
    draw_line(img, (left, bottom), (right, bottom), AXES);
    draw_line(img, (left, top), (left, bottom), AXES);
    draw_line(img, (right, top), (right, bottom), AXES);
}

/// Bresenham
fn draw_line(img: &mut RgbImage, from: (i64, i64), to: (i64, i64), color: Rgb<u8>) {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        put(img, x, y, color);
        if x == to.0 && y == to.1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

fn put(img: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}
