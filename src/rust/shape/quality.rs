use image::GrayImage;

use super::contour::{ContourShape, NormalizedContour};
use super::raster;
use crate::classifier::QualityMetrics;

/// Polygon tolerance used for smoothness, as a fraction of the perimeter.
const SMOOTHNESS_EPSILON: f64 = 0.002;
const WIDTH_BINS: usize = 10;
/// Formation scores at or above this are labelled "Good".
pub const GOOD_FORMATION: f64 = 0.7;

/// Pressure proxy: ten times the percentage of dark pixels, capped at 100.
pub fn pressure_proxy(gray: &GrayImage) -> f32 {
    let percentage = raster::dark_fraction(gray) * 100.0;
    (percentage * 10.0).min(100.0).floor() as f32
}

fn ratio(a: f64, b: f64) -> f64 {
    let (low, high) = if a < b { (a, b) } else { (b, a) };
    if high <= 0.0 {
        return 0.0;
    }
    low / high
}

/// Mean of the area ratio and the perimeter ratio (smaller over larger) between a drawing
/// and its template, in [0, 1].
pub fn formation_score(user: &NormalizedContour, template: &NormalizedContour) -> f64 {
    let template_area = template.area();
    let template_perimeter = template.perimeter();
    if template_area <= 0.0 || template_perimeter <= 0.0 {
        return 0.0;
    }
    (ratio(user.area(), template_area) + ratio(user.perimeter(), template_perimeter)) / 2.0
}

pub fn formation_label(score: f64) -> &'static str {
    if score >= GOOD_FORMATION {
        "Good"
    } else {
        "Fair"
    }
}

/// Raw boundary points per simplified-polygon vertex. Wobbly strokes need many vertices
/// to approximate, so a higher ratio means a smoother hand.
fn smoothness(contour: &ContourShape) -> f32 {
    if contour.len() < 3 {
        return 30.0;
    }
    let vertices = contour.simplified_vertex_count(SMOOTHNESS_EPSILON).max(1);
    let curvature_ratio = contour.len() as f64 / vertices as f64;
    match curvature_ratio {
        r if r >= 4.0 => 95.0,
        r if r >= 3.0 => 85.0,
        r if r >= 2.0 => 70.0,
        r if r >= 1.5 => 55.0,
        _ => 40.0,
    }
}

fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return None;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some(variance.sqrt() / mean)
}

/// Stroke-width steadiness from the coefficient of variation of local widths.
fn size_consistency(widths: &[f64]) -> f32 {
    let Some(cv) = coefficient_of_variation(widths) else {
        return 35.0;
    };
    match cv {
        c if c <= 0.2 => 90.0,
        c if c <= 0.4 => 80.0,
        c if c <= 0.6 => 70.0,
        c if c <= 0.8 => 60.0,
        c if c <= 1.0 => 50.0,
        _ => 35.0,
    }
}

/// Share of width samples falling in the modal histogram bin or its two neighbours.
fn pressure_consistency(widths: &[f64]) -> f32 {
    let max = widths.iter().copied().fold(0.0f64, f64::max);
    if widths.is_empty() || max <= 0.0 {
        return 0.0;
    }
    let mut histogram = [0usize; WIDTH_BINS];
    for &w in widths {
        let bin = ((w / max) * WIDTH_BINS as f64) as usize;
        histogram[bin.min(WIDTH_BINS - 1)] += 1;
    }
    let modal = histogram
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let low = modal.saturating_sub(1);
    let high = (modal + 1).min(WIDTH_BINS - 1);
    let near: usize = histogram[low..=high].iter().sum();
    (100.0 * near as f64 / widths.len() as f64) as f32
}

/// Motor-skill metrics for an accepted drawing.
pub fn quality_metrics(contour: &ContourShape, mask: &GrayImage) -> QualityMetrics {
    let widths = raster::stroke_widths(mask);
    QualityMetrics::new(smoothness(contour), size_consistency(&widths), pressure_consistency(&widths))
}
