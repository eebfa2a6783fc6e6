use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use log::debug;

use super::contour::ContourShape;
use super::raster;
use crate::config::ShapeConfig;

/// An external contour and the largest hole it encloses.
#[derive(Debug, Clone, PartialEq)]
pub struct Outline {
    pub contour: ContourShape,
    /// Area of the largest hole border inside the contour, 0 for a solid or open stroke
    pub hole_area: f64,
}

impl Outline {
    /// Largest hole area over the outer area: near 1 for a thin closed loop, 0 for a
    /// stroke that encloses nothing.
    pub fn enclosure(&self) -> f64 {
        let area = self.contour.area();
        if area <= 0.0 {
            return 0.0;
        }
        (self.hole_area / area).min(1.0)
    }
}

/// Outer borders of every ink component not nested inside another component's hole,
/// with the holes they enclose.
pub fn extract_outlines(mask: &GrayImage) -> Vec<Outline> {
    let borders = find_contours::<i32>(mask);
    let mut outlines: Vec<(usize, Outline)> = borders
        .iter()
        .enumerate()
        .filter(|(_, b)| matches!(b.border_type, BorderType::Outer) && b.parent.is_none())
        .map(|(i, b)| (i, Outline { contour: ContourShape::from_border(&b.points), hole_area: 0.0 }))
        .collect();

    for border in borders.iter().filter(|b| matches!(b.border_type, BorderType::Hole)) {
        let Some(parent) = border.parent else { continue };
        if let Some((_, outline)) = outlines.iter_mut().find(|(i, _)| *i == parent) {
            let area = ContourShape::from_border(&border.points).area();
            outline.hole_area = outline.hole_area.max(area);
        }
    }
    outlines.into_iter().map(|(_, outline)| outline).collect()
}

/// Outer contours of every ink component not nested inside another component's hole.
pub fn extract_contours(mask: &GrayImage) -> Vec<ContourShape> {
    extract_outlines(mask).into_iter().map(|o| o.contour).collect()
}

/// The dominant contour of a canvas, plus what it took to find it.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub contour: ContourShape,
    /// See [`Outline::enclosure`]
    pub enclosure: f64,
    /// Binarised, smoothed canvas the contour was traced on
    pub mask: GrayImage,
    /// Number of external contours found before filtering
    pub candidates: usize,
    /// True when no contour fell inside the area band and the largest raw one was used
    pub used_fallback: bool,
}

/// Binarises a canvas and picks its dominant external contour.
#[derive(Debug, Clone)]
pub struct ContourExtractor {
    block: u32,
    offset: f32,
    floor: u8,
    min_area_ratio: f64,
    max_area_ratio: f64,
}

impl Default for ContourExtractor {
    fn default() -> Self {
        Self::from_config(&ShapeConfig::default())
    }
}

impl ContourExtractor {
    pub fn from_config(config: &ShapeConfig) -> Self {
        Self {
            block: config.adaptive_block,
            offset: config.adaptive_offset,
            floor: config.ink_floor,
            min_area_ratio: config.min_area_ratio,
            max_area_ratio: config.max_area_ratio,
        }
    }

    pub fn binarize(&self, gray: &GrayImage) -> GrayImage {
        raster::smooth(&raster::binarize(gray, self.block, self.offset, self.floor))
    }

    /// Returns `None` only when the canvas carries no ink at all.
    pub fn extract(&self, gray: &GrayImage) -> Option<Extraction> {
        let mask = self.binarize(gray);
        let outlines = extract_outlines(&mask);
        if outlines.is_empty() {
            return None;
        }

        let canvas_area = gray.width() as f64 * gray.height() as f64;
        let largest = |items: Vec<(f64, Outline)>| {
            items.into_iter().max_by(|a, b| a.0.total_cmp(&b.0)).map(|(_, o)| o)
        };

        let candidates = outlines.len();
        let with_area: Vec<(f64, Outline)> = outlines.into_iter().map(|o| (o.contour.area(), o)).collect();
        let in_band: Vec<(f64, Outline)> = with_area
            .iter()
            .filter(|(area, _)| {
                let ratio = area / canvas_area;
                ratio >= self.min_area_ratio && ratio <= self.max_area_ratio
            })
            .cloned()
            .collect();

        let used_fallback = in_band.is_empty();
        let outline = if used_fallback {
            debug!("No contour inside the area band; falling back to the largest of {}", candidates);
            largest(with_area)?
        } else {
            largest(in_band)?
        };

        let enclosure = outline.enclosure();
        Some(Extraction { contour: outline.contour, enclosure, mask, candidates, used_fallback })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::contour::Point;
    use image::Luma;

    fn mask_from(w: u32, h: u32, f: impl Fn(u32, u32) -> bool) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| Luma([if f(x, y) { raster::INK } else { 0 }]))
    }

    #[test]
    fn test_filled_rectangle_traces_four_corners() {
        let mask = mask_from(40, 40, |x, y| (10..30).contains(&x) && (5..25).contains(&y));
        let outlines = extract_outlines(&mask);
        assert_eq!(outlines.len(), 1);
        let c = &outlines[0].contour;
        // corners plus the last traced pixel
        assert!(c.len() <= 5);
        assert_eq!(c.simplified_vertex_count(0.02), 4);
        assert_eq!(c.bounding_rect(), (10, 5, 20, 20));
        assert_eq!(c.area(), 19.0 * 19.0);
        assert_eq!(outlines[0].enclosure(), 0.0);
    }

    #[test]
    fn test_single_pixel_component() {
        let mask = mask_from(5, 5, |x, y| x == 2 && y == 2);
        let contours = extract_contours(&mask);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].points(), &[Point::new(2, 2)]);
    }

    #[test]
    fn test_nested_component_is_not_external() {
        // ring with a dot inside its hole
        let mask = mask_from(50, 50, |x, y| {
            let ring = (5..45).contains(&x) && (5..45).contains(&y) && !((10..40).contains(&x) && (10..40).contains(&y));
            let dot = (22..28).contains(&x) && (22..28).contains(&y);
            ring || dot
        });
        let outlines = extract_outlines(&mask);
        assert_eq!(outlines.len(), 1);
        assert_eq!(outlines[0].contour.bounding_rect(), (5, 5, 40, 40));
        // hole border runs along the inner ink pixels, 9..=40
        assert!((950.0..=961.0).contains(&outlines[0].hole_area), "{}", outlines[0].hole_area);
        assert!(outlines[0].enclosure() > 0.6);
    }

    #[test]
    fn test_diagonal_pixels_are_one_component() {
        let mask = mask_from(10, 10, |x, y| x == y && x > 1 && x < 8);
        assert_eq!(extract_contours(&mask).len(), 1);
    }

    #[test]
    fn test_blank_canvas_yields_nothing() {
        let gray = GrayImage::from_pixel(100, 100, Luma([255]));
        assert!(ContourExtractor::default().extract(&gray).is_none());
    }

    #[test]
    fn test_oversized_contour_falls_back() {
        // ink everywhere except a thin margin: above the 90 % band
        let gray = GrayImage::from_fn(100, 100, |x, y| {
            if (1..99).contains(&x) && (1..99).contains(&y) {
                Luma([0])
            } else {
                Luma([255])
            }
        });
        let extraction = ContourExtractor::default().extract(&gray).unwrap();
        assert!(extraction.used_fallback);
        assert!(extraction.contour.area() / 10_000.0 > 0.9);
    }

    #[test]
    fn test_largest_in_band_contour_wins() {
        let gray = GrayImage::from_fn(200, 200, |x, y| {
            let big = (20..80).contains(&x) && (20..80).contains(&y);
            let small = (120..140).contains(&x) && (120..140).contains(&y);
            if big || small {
                Luma([0])
            } else {
                Luma([255])
            }
        });
        let extraction = ContourExtractor::default().extract(&gray).unwrap();
        assert!(!extraction.used_fallback);
        assert_eq!(extraction.candidates, 2);
        assert_eq!(extraction.contour.bounding_rect().0, 20);
    }
}
