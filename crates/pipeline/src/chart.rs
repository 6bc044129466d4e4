//! Trend chart rendering
//!
//! Draws the prediction series as a PNG line chart over a fixed `[0, 1]`
//! y-axis with quarter gridlines, ticked quarters on the y-axis and one tick
//! per point on the x-axis. The image carries no text: `image` has no glyph
//! rendering, so titles and axis names belong to whoever displays the chart.

use image::{ImageFormat, Rgb, RgbImage};
use serde::Serialize;
use std::io::Cursor;
use thiserror::Error;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);
const AXIS: Rgb<u8> = Rgb([40, 40, 40]);
const SERIES: Rgb<u8> = Rgb([31, 90, 220]);

const MARGIN_LEFT: u32 = 60;
const MARGIN_RIGHT: u32 = 20;
const MARGIN_TOP: u32 = 20;
const MARGIN_BOTTOM: u32 = 40;
const TICK_LEN: i64 = 6;

/// One point of the chart; `y` is expected in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("nothing to render")]
    EmptySeries,
    #[error("failed to encode chart: {0}")]
    Encode(#[from] image::ImageError),
}

/// Renders a series into image bytes
pub trait ChartRenderer: Send + Sync {
    /// MIME type of the produced bytes
    fn content_type(&self) -> &'static str {
        "image/png"
    }

    fn render(&self, points: &[ChartPoint]) -> Result<Vec<u8>, RenderError>;
}

/// PNG line chart
#[derive(Debug, Clone)]
pub struct LineChartRenderer {
    width: u32,
    height: u32,
}

impl Default for LineChartRenderer {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

impl LineChartRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(MARGIN_LEFT + MARGIN_RIGHT + 10),
            height: height.max(MARGIN_TOP + MARGIN_BOTTOM + 10),
        }
    }

    fn plot_width(&self) -> u32 {
        self.width - MARGIN_LEFT - MARGIN_RIGHT
    }

    fn plot_height(&self) -> u32 {
        self.height - MARGIN_TOP - MARGIN_BOTTOM
    }

    fn to_pixel(&self, point: ChartPoint, x_min: f64, x_span: f64) -> (i64, i64) {
        let x_frac = if x_span > 0.0 {
            (point.x - x_min) / x_span
        } else {
            0.5
        };
        let y_frac = point.y.clamp(0.0, 1.0);
        let px = MARGIN_LEFT as f64 + x_frac * self.plot_width() as f64;
        let py = MARGIN_TOP as f64 + (1.0 - y_frac) * self.plot_height() as f64;
        (px.round() as i64, py.round() as i64)
    }

    fn draw_frame(&self, image: &mut RgbImage) {
        let left = MARGIN_LEFT as i64;
        let right = (MARGIN_LEFT + self.plot_width()) as i64;
        let bottom = (MARGIN_TOP + self.plot_height()) as i64;

        for quarter in 0..=4 {
            let y = MARGIN_TOP as f64 + (quarter as f64 / 4.0) * self.plot_height() as f64;
            let y = y.round() as i64;
            draw_line(image, (left, y), (right, y), GRID, 1);
        }

        draw_line(image, (left, MARGIN_TOP as i64), (left, bottom), AXIS, 1);
        draw_line(image, (left, bottom), (right, bottom), AXIS, 1);
    }

    fn draw_ticks(&self, image: &mut RgbImage, pixels: &[(i64, i64)]) {
        let left = MARGIN_LEFT as i64;
        let bottom = (MARGIN_TOP + self.plot_height()) as i64;

        for quarter in 0..=4 {
            let y = MARGIN_TOP as f64 + (quarter as f64 / 4.0) * self.plot_height() as f64;
            let y = y.round() as i64;
            draw_line(image, (left - TICK_LEN, y), (left, y), AXIS, 1);
        }
        for (x, _) in pixels {
            draw_line(image, (*x, bottom), (*x, bottom + TICK_LEN), AXIS, 1);
        }
    }
}

impl ChartRenderer for LineChartRenderer {
    fn render(&self, points: &[ChartPoint]) -> Result<Vec<u8>, RenderError> {
        let (first, last) = match (points.first(), points.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Err(RenderError::EmptySeries),
        };

        let mut image = RgbImage::from_pixel(self.width, self.height, BACKGROUND);
        self.draw_frame(&mut image);

        let x_min = first.x;
        let x_span = last.x - first.x;
        let pixels: Vec<(i64, i64)> = points
            .iter()
            .map(|p| self.to_pixel(*p, x_min, x_span))
            .collect();
        self.draw_ticks(&mut image, &pixels);

        for pair in pixels.windows(2) {
            draw_line(&mut image, pair[0], pair[1], SERIES, 2);
        }
        for pixel in &pixels {
            draw_marker(&mut image, *pixel, SERIES);
        }

        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }
}

fn put(image: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
        image.put_pixel(x as u32, y as u32, color);
    }
}

/// Bresenham line, `thickness` pixels square brush
fn draw_line(image: &mut RgbImage, from: (i64, i64), to: (i64, i64), color: Rgb<u8>, thickness: i64) {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        for ox in 0..thickness {
            for oy in 0..thickness {
                put(image, x + ox, y + oy, color);
            }
        }
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

fn draw_marker(image: &mut RgbImage, center: (i64, i64), color: Rgb<u8>) {
    for ox in -2..=2 {
        for oy in -2..=2 {
            put(image, center.0 + ox, center.1 + oy, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_render_produces_png() {
        let renderer = LineChartRenderer::default();
        let points = [
            ChartPoint { x: 0.0, y: 0.2 },
            ChartPoint { x: 1.0, y: 0.8 },
            ChartPoint { x: 2.0, y: 0.5 },
        ];

        let bytes = renderer.render(&points).unwrap();
        assert_eq!(&bytes[..8], &PNG_SIGNATURE);

        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Png).unwrap();
        assert_eq!(decoded.width(), 800);
        assert_eq!(decoded.height(), 600);
    }

    #[test]
    fn test_render_single_point() {
        let renderer = LineChartRenderer::new(200, 150);
        let bytes = renderer.render(&[ChartPoint { x: 0.0, y: 1.0 }]).unwrap();
        assert_eq!(&bytes[..8], &PNG_SIGNATURE);
    }

    #[test]
    fn test_render_empty_series_fails() {
        let renderer = LineChartRenderer::default();
        assert!(matches!(renderer.render(&[]), Err(RenderError::EmptySeries)));
    }

    #[test]
    fn test_series_pixels_drawn() {
        let renderer = LineChartRenderer::new(200, 150);
        let point = ChartPoint { x: 0.0, y: 0.5 };
        let (px, py) = renderer.to_pixel(point, 0.0, 0.0);

        let mut image = RgbImage::from_pixel(200, 150, BACKGROUND);
        draw_marker(&mut image, (px, py), SERIES);
        assert_eq!(*image.get_pixel(px as u32, py as u32), SERIES);
    }

    #[test]
    fn test_axis_ticks_drawn() {
        let renderer = LineChartRenderer::new(200, 150);
        let points = [ChartPoint { x: 0.0, y: 0.5 }, ChartPoint { x: 4.0, y: 0.5 }];
        let bytes = renderer.render(&points).unwrap();
        let image = image::load_from_memory_with_format(&bytes, ImageFormat::Png)
            .unwrap()
            .to_rgb8();

        let tick_x = MARGIN_LEFT - TICK_LEN as u32;
        assert_eq!(*image.get_pixel(tick_x, MARGIN_TOP), AXIS);
        assert_eq!(*image.get_pixel(tick_x, 150 - MARGIN_BOTTOM), AXIS);

        let (last_x, _) = renderer.to_pixel(points[1], 0.0, 4.0);
        let below_axis = 150 - MARGIN_BOTTOM + TICK_LEN as u32;
        assert_eq!(*image.get_pixel(last_x as u32, below_axis), AXIS);
        assert_eq!(*image.get_pixel(last_x as u32 + 3, below_axis), BACKGROUND);
    }

    #[test]
    fn test_out_of_range_values_stay_inside_plot() {
        let renderer = LineChartRenderer::new(200, 150);
        let (_, top) = renderer.to_pixel(ChartPoint { x: 0.0, y: 7.0 }, 0.0, 1.0);
        let (_, bottom) = renderer.to_pixel(ChartPoint { x: 0.0, y: -3.0 }, 0.0, 1.0);
        assert_eq!(top, MARGIN_TOP as i64);
        assert_eq!(bottom, (150 - MARGIN_BOTTOM) as i64);
    }
}
