//! Canonical shape references and a small stroke rasteriser.
//!
//! ```
//! use inkcheck::shape::{render, Shape};
//!
//! let image = render::canonical(Shape::Triangle);
//! assert_eq!(image.dimensions(), (256, 256));
//! ```

use std::f64::consts::{PI, TAU};
use std::fs;
use std::path::{Path, PathBuf};

use image::{GrayImage, Luma};
use log::info;

use super::Shape;
use crate::classifier::AssessmentError;

pub const CANONICAL_SIZE: u32 = 256;
pub const CANONICAL_STROKE: f64 = 6.0;

/// Black strokes on a white canvas.
#[derive(Debug, Clone)]
pub struct Sketch {
    image: GrayImage,
    stroke_width: f64,
}

impl Sketch {
    pub fn new(width: u32, height: u32) -> Self {
        Self { image: GrayImage::from_pixel(width, height, Luma([255])), stroke_width: CANONICAL_STROKE }
    }

    pub fn stroke_width(mut self, width: f64) -> Self {
        self.stroke_width = width.max(1.0);
        self
    }

    fn stamp(&mut self, cx: f64, cy: f64) {
        let r = self.stroke_width / 2.0;
        let (w, h) = self.image.dimensions();
        let x0 = (cx - r).floor().max(0.0) as u32;
        let y0 = (cy - r).floor().max(0.0) as u32;
        let x1 = ((cx + r).ceil() as i64).clamp(0, w as i64 - 1) as u32;
        let y1 = ((cy + r).ceil() as i64).clamp(0, h as i64 - 1) as u32;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let (dx, dy) = (x as f64 + 0.5 - cx, y as f64 + 0.5 - cy);
                if dx * dx + dy * dy <= r * r {
                    self.image.put_pixel(x, y, Luma([0]));
                }
            }
        }
    }

    fn segment(&mut self, a: (f64, f64), b: (f64, f64)) {
        let length = ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt();
        let steps = (length * 2.0).ceil().max(1.0) as usize;
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            self.stamp(a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t);
        }
    }

    pub fn polyline(mut self, points: &[(f64, f64)], closed: bool) -> Self {
        for pair in points.windows(2) {
            self.segment(pair[0], pair[1]);
        }
        if closed && points.len() > 2 {
            self.segment(points[points.len() - 1], points[0]);
        }
        self
    }

    /// Arc from `start` to `end` radians, clockwise on screen.
    pub fn arc(self, center: (f64, f64), radius: f64, start: f64, end: f64) -> Self {
        let steps = ((end - start).abs() * radius / 2.0).ceil().max(8.0) as usize;
        let points: Vec<(f64, f64)> = (0..=steps)
            .map(|i| {
                let t = start + (end - start) * i as f64 / steps as f64;
                (center.0 + radius * t.cos(), center.1 + radius * t.sin())
            })
            .collect();
        self.polyline(&points, false)
    }

    pub fn circle(self, center: (f64, f64), radius: f64) -> Self {
        self.arc(center, radius, 0.0, TAU)
    }

    pub fn into_image(self) -> GrayImage {
        self.image
    }
}

/// Draws `shape` on a `size × size` canvas.
pub fn render(shape: Shape, size: u32, stroke_width: f64) -> GrayImage {
    let s = size as f64;
    let sketch = Sketch::new(size, size).stroke_width(stroke_width);
    let sketch = match shape {
        Shape::Lines => sketch.polyline(&[(0.2 * s, 0.5 * s), (0.8 * s, 0.5 * s)], false),
        Shape::Curves => sketch.arc((0.5 * s, 0.7 * s), 0.35 * s, PI + 0.3, TAU - 0.3),
        Shape::Circles => sketch.circle((0.5 * s, 0.5 * s), 0.35 * s),
        Shape::Triangle => {
            sketch.polyline(&[(0.5 * s, 0.15 * s), (0.85 * s, 0.85 * s), (0.15 * s, 0.85 * s)], true)
        }
        Shape::Square => sketch.polyline(
            &[(0.2 * s, 0.2 * s), (0.8 * s, 0.2 * s), (0.8 * s, 0.8 * s), (0.2 * s, 0.8 * s)],
            true,
        ),
        Shape::Zigzag => {
            let points: Vec<(f64, f64)> = (0..=6)
                .map(|i| {
                    let x = 0.15 * s + 0.7 * s * i as f64 / 6.0;
                    let y = if i % 2 == 0 { 0.65 * s } else { 0.35 * s };
                    (x, y)
                })
                .collect();
            sketch.polyline(&points, false)
        }
    };
    sketch.into_image()
}

/// The canonical reference for `shape`.
pub fn canonical(shape: Shape) -> GrayImage {
    render(shape, CANONICAL_SIZE, CANONICAL_STROKE)
}

/// Writes `<shape>_canonical.png` for every shape into `dir`.
pub fn write_canonical_shapes<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>, AssessmentError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(Shape::ALL.len());
    for shape in Shape::ALL {
        let path = dir.join(shape.template_file_name());
        canonical(shape)
            .save(&path)
            .map_err(|e| AssessmentError::Input(format!("Failed to write {}: {}", path.display(), e)))?;
        info!("Wrote canonical {} to {:?}", shape, path);
        written.push(path);
    }
    Ok(written)
}
