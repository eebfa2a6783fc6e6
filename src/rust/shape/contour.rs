use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point as PixelPoint;
use serde::Serialize;

/// Smallest enclosed area for which moments are considered defined.
const AREA_EPSILON: f64 = f32::EPSILON as f64;

/// A pixel coordinate on a contour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    fn as_f64(self) -> (f64, f64) {
        (self.x as f64, self.y as f64)
    }
}

impl From<PixelPoint<i32>> for Point {
    fn from(p: PixelPoint<i32>) -> Self {
        Self::new(p.x, p.y)
    }
}

impl From<Point> for PixelPoint<i32> {
    fn from(p: Point) -> Self {
        PixelPoint::new(p.x, p.y)
    }
}

/// Spatial moments of a closed polygon, up to third order.
///
/// Computed with Green's theorem over the polygon edges, so the result depends only on the
/// boundary points and not on any rasterisation. Orientation is normalised so `m00` is
/// never negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Moments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
    pub m20: f64,
    pub m11: f64,
    pub m02: f64,
    pub m30: f64,
    pub m21: f64,
    pub m12: f64,
    pub m03: f64,
}

impl Moments {
    pub fn of_polygon(points: &[(f64, f64)]) -> Self {
        let n = points.len();
        if n < 3 {
            return Self::default();
        }

        let (mut a00, mut a10, mut a01, mut a20, mut a11, mut a02) = (0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        let (mut a30, mut a21, mut a12, mut a03) = (0.0, 0.0, 0.0, 0.0);

        let (mut xp, mut yp) = points[n - 1];
        for &(x, y) in points {
            let xp2 = xp * xp;
            let yp2 = yp * yp;
            let x2 = x * x;
            let y2 = y * y;
            let cross = xp * y - x * yp;
            let xs = xp + x;
            let ys = yp + y;

            a00 += cross;
            a10 += cross * xs;
            a01 += cross * ys;
            a20 += cross * (xp * xs + x2);
            a11 += cross * (xp * (ys + yp) + x * (ys + y));
            a02 += cross * (yp * ys + y2);
            a30 += cross * xs * (xp2 + x2);
            a03 += cross * ys * (yp2 + y2);
            a21 += cross * (xp2 * (3.0 * yp + y) + 2.0 * x * xp * ys + x2 * (yp + 3.0 * y));
            a12 += cross * (yp2 * (3.0 * xp + x) + 2.0 * y * yp * xs + y2 * (xp + 3.0 * x));

            xp = x;
            yp = y;
        }

        if a00.abs() <= AREA_EPSILON {
            return Self::default();
        }
        let sign = a00.signum();

        Self {
            m00: sign * a00 / 2.0,
            m10: sign * a10 / 6.0,
            m01: sign * a01 / 6.0,
            m20: sign * a20 / 12.0,
            m11: sign * a11 / 24.0,
            m02: sign * a02 / 12.0,
            m30: sign * a30 / 20.0,
            m21: sign * a21 / 60.0,
            m12: sign * a12 / 60.0,
            m03: sign * a03 / 20.0,
        }
    }

    /// Moments are undefined for polygons that enclose no area.
    pub fn is_degenerate(&self) -> bool {
        self.m00.abs() <= AREA_EPSILON
    }

    pub fn centroid(&self) -> Option<(f64, f64)> {
        if self.is_degenerate() {
            return None;
        }
        Some((self.m10 / self.m00, self.m01 / self.m00))
    }

    /// Ratio of the principal axes of the second central moments: 1 for a disc or a
    /// square, large for a thin stroke. `+∞` when the polygon encloses no area.
    pub fn elongation(&self) -> f64 {
        let Some((cx, cy)) = self.centroid() else {
            return f64::INFINITY;
        };
        let a = (self.m20 - self.m10 * cx) / self.m00;
        let b = (self.m11 - self.m10 * cy) / self.m00;
        let c = (self.m02 - self.m01 * cy) / self.m00;
        let mean = (a + c) / 2.0;
        let spread = (((a - c) / 2.0).powi(2) + b * b).sqrt();
        let (major, minor) = (mean + spread, mean - spread);
        if minor <= f64::EPSILON * major.abs().max(1.0) {
            return f64::INFINITY;
        }
        (major / minor).sqrt()
    }

    /// The seven Hu invariants, or `None` for a degenerate polygon.
    pub fn hu(&self) -> Option<[f64; 7]> {
        let (cx, cy) = self.centroid()?;

        let mu20 = self.m20 - self.m10 * cx;
        let mu11 = self.m11 - self.m10 * cy;
        let mu02 = self.m02 - self.m01 * cy;
        let mu30 = self.m30 - cx * (3.0 * mu20 + cx * self.m10);
        let mu21 = self.m21 - cx * (2.0 * mu11 + cx * self.m01) - cy * mu20;
        let mu12 = self.m12 - cy * (2.0 * mu11 + cy * self.m10) - cx * mu02;
        let mu03 = self.m03 - cy * (3.0 * mu02 + cy * self.m01);

        let inv_m00 = 1.0 / self.m00;
        let s2 = inv_m00 * inv_m00;
        let s3 = s2 * inv_m00.sqrt();

        let n20 = mu20 * s2;
        let n11 = mu11 * s2;
        let n02 = mu02 * s2;
        let n30 = mu30 * s3;
        let n21 = mu21 * s3;
        let n12 = mu12 * s3;
        let n03 = mu03 * s3;

        let mut hu = [0.0; 7];
        let mut t0 = n30 + n12;
        let mut t1 = n21 + n03;
        let q0 = t0 * t0;
        let q1 = t1 * t1;
        let n4 = 4.0 * n11;
        let s = n20 + n02;
        let d = n20 - n02;

        hu[0] = s;
        hu[1] = d * d + n4 * n11;
        hu[3] = q0 + q1;
        hu[5] = d * (q0 - q1) + n4 * t0 * t1;

        t0 *= q0 - 3.0 * q1;
        t1 *= 3.0 * q0 - q1;
        let p0 = n30 - 3.0 * n12;
        let p1 = 3.0 * n21 - n03;

        hu[2] = p0 * p0 + p1 * p1;
        hu[4] = p0 * t0 + p1 * t1;
        hu[6] = p1 * t0 - p0 * t1;

        Some(hu)
    }
}

/// One connected stroke boundary, as traced from a binarised canvas.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContourShape {
    points: Vec<Point>,
}

impl ContourShape {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// A traced pixel border, keeping its two ends and the points where it changes
    /// direction.
    pub fn from_border(border: &[PixelPoint<i32>]) -> Self {
        let n = border.len();
        if n < 3 {
            return Self::new(border.iter().map(|&p| p.into()).collect());
        }
        let step = |a: PixelPoint<i32>, b: PixelPoint<i32>| (b.x - a.x, b.y - a.y);
        let points = (0..n)
            .filter(|&i| {
                i == 0 || i == n - 1 || step(border[i - 1], border[i]) != step(border[i], border[i + 1])
            })
            .map(|i| border[i].into())
            .collect();
        Self::new(points)
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn float_points(&self) -> Vec<(f64, f64)> {
        self.points.iter().map(|p| p.as_f64()).collect()
    }

    fn pixel_points(&self) -> Vec<PixelPoint<i32>> {
        self.points.iter().map(|&p| p.into()).collect()
    }

    /// Enclosed area of the closed polygon.
    pub fn area(&self) -> f64 {
        self.moments().m00
    }

    /// Closed arc length.
    pub fn perimeter(&self) -> f64 {
        if self.points.len() < 2 {
            return 0.0;
        }
        arc_length(&self.pixel_points(), true)
    }

    /// `4π·area / perimeter²`: 1 for a circle, smaller for everything else.
    pub fn circularity(&self) -> f64 {
        let perimeter = self.perimeter();
        if perimeter <= 0.0 {
            return 0.0;
        }
        4.0 * std::f64::consts::PI * self.area() / (perimeter * perimeter)
    }

    /// Upright bounding rectangle as `(x, y, width, height)`.
    pub fn bounding_rect(&self) -> (i32, i32, i32, i32) {
        let Some(first) = self.points.first() else {
            return (0, 0, 0, 0);
        };
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &self.points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        (min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
    }

    /// Long side over short side of the bounding rectangle.
    pub fn aspect_ratio(&self) -> f64 {
        let (_, _, w, h) = self.bounding_rect();
        let (long, short) = (w.max(h), w.min(h));
        if short <= 0 {
            return 1.0;
        }
        long as f64 / short as f64
    }

    /// Closed Douglas-Peucker approximation with tolerance `epsilon_ratio · perimeter`.
    ///
    /// The chain is simplified open from its first point; a first or last vertex that
    /// lies on the closing edge within the tolerance is then dropped.
    pub fn simplified(&self, epsilon_ratio: f64) -> Vec<Point> {
        let epsilon = epsilon_ratio * self.perimeter();
        let first_is_last = self.points.first() == self.points.last();
        if self.points.len() < 3 || epsilon <= 0.0 || first_is_last {
            return self.points.clone();
        }

        let mut vertices: Vec<Point> =
            approximate_polygon_dp(&self.pixel_points(), epsilon, false).into_iter().map(Point::from).collect();
        if vertices.len() > 3 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        if vertices.len() > 3 {
            let n = vertices.len();
            if line_distance(vertices[n - 1], vertices[n - 2], vertices[0]) <= epsilon {
                vertices.pop();
            }
        }
        if vertices.len() > 3 {
            let n = vertices.len();
            if line_distance(vertices[0], vertices[n - 1], vertices[1]) <= epsilon {
                vertices.remove(0);
            }
        }
        vertices
    }

    pub fn simplified_vertex_count(&self, epsilon_ratio: f64) -> usize {
        self.simplified(epsilon_ratio).len()
    }

    /// Gap between the last point and the first, over the closed perimeter (which
    /// counts that gap as the closing edge). Near 0 for a traced border, large for an
    /// open path.
    pub fn closure(&self) -> f64 {
        let perimeter = self.perimeter();
        match (self.points.first(), self.points.last()) {
            (Some(a), Some(b)) if perimeter > 0.0 => distance(a.as_f64(), b.as_f64()) / perimeter,
            _ => 0.0,
        }
    }

    /// See [`Moments::elongation`].
    pub fn elongation(&self) -> f64 {
        self.moments().elongation()
    }

    pub fn moments(&self) -> Moments {
        Moments::of_polygon(&self.float_points())
    }

    /// Centres the contour on its centroid and scales it to unit L2 norm.
    ///
    /// The centroid comes from the polygon moments; contours enclosing no area fall
    /// back to the mean of their points.
    pub fn normalize(&self) -> NormalizedContour {
        let points = self.float_points();
        if points.is_empty() {
            return NormalizedContour { points, area: 0.0, perimeter: 0.0 };
        }

        let moments = Moments::of_polygon(&points);
        let (cx, cy) = moments.centroid().unwrap_or_else(|| {
            let n = points.len() as f64;
            let (sx, sy) = points.iter().fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x, sy + y));
            (sx / n, sy / n)
        });

        let centred: Vec<(f64, f64)> = points.iter().map(|&(x, y)| (x - cx, y - cy)).collect();
        let norm = centred.iter().map(|&(x, y)| x * x + y * y).sum::<f64>().sqrt();
        if norm <= 0.0 {
            return NormalizedContour { points: centred, area: 0.0, perimeter: 0.0 };
        }
        NormalizedContour {
            points: centred.into_iter().map(|(x, y)| (x / norm, y / norm)).collect(),
            area: moments.m00 / (norm * norm),
            perimeter: self.perimeter() / norm,
        }
    }
}

/// A contour centred on the origin with unit point-set L2 norm.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedContour {
    points: Vec<(f64, f64)>,
    area: f64,
    perimeter: f64,
}

impl NormalizedContour {
    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn perimeter(&self) -> f64 {
        self.perimeter
    }

    pub fn moments(&self) -> Moments {
        Moments::of_polygon(&self.points)
    }

    pub fn hu_moments(&self) -> Option<[f64; 7]> {
        self.moments().hu()
    }
}

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Distance from `p` to the line through `a` and `b`.
fn line_distance(p: Point, a: Point, b: Point) -> f64 {
    let (p, a, b) = (p.as_f64(), a.as_f64(), b.as_f64());
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let length = (dx * dx + dy * dy).sqrt();
    if length == 0.0 {
        return distance(p, a);
    }
    (dy * p.0 - dx * p.1 + b.0 * a.1 - b.1 * a.0).abs() / length
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(x: i32, y: i32, side: i32) -> ContourShape {
        ContourShape::new(vec![
            Point::new(x, y),
            Point::new(x, y + side),
            Point::new(x + side, y + side),
            Point::new(x + side, y),
        ])
    }

    fn circle(cx: f64, cy: f64, r: f64, n: usize) -> ContourShape {
        ContourShape::new(
            (0..n)
                .map(|i| {
                    let t = i as f64 / n as f64 * std::f64::consts::TAU;
                    Point::new((cx + r * t.cos()).round() as i32, (cy + r * t.sin()).round() as i32)
                })
                .collect(),
        )
    }

    #[test]
    fn test_square_metrics() {
        let s = square(10, 20, 40);
        assert_relative_eq!(s.area(), 1600.0);
        assert_relative_eq!(s.perimeter(), 160.0);
        assert_eq!(s.bounding_rect(), (10, 20, 41, 41));
        assert_relative_eq!(s.aspect_ratio(), 1.0);
        assert_eq!(s.simplified_vertex_count(0.01), 4);
        assert_relative_eq!(s.circularity(), std::f64::consts::PI / 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_moments_orientation_independent() {
        let s = square(0, 0, 10);
        let mut reversed = s.points().to_vec();
        reversed.reverse();
        let r = ContourShape::new(reversed);
        assert_relative_eq!(s.moments().m00, 100.0);
        assert_relative_eq!(r.moments().m00, 100.0);
        let (cx, cy) = s.moments().centroid().unwrap();
        assert_relative_eq!(cx, 5.0);
        assert_relative_eq!(cy, 5.0);
    }

    #[test]
    fn test_normalization_is_translation_and_scale_invariant() {
        let a = circle(100.0, 100.0, 40.0, 72);
        let shifted: Vec<Point> = a.points().iter().map(|p| Point::new(p.x * 3 + 17, p.y * 3 - 5)).collect();
        let b = ContourShape::new(shifted);

        let na = a.normalize();
        let nb = b.normalize();
        assert_eq!(na.len(), nb.len());
        for (p, q) in na.points().iter().zip(nb.points()) {
            assert_relative_eq!(p.0, q.0, epsilon = 1e-9);
            assert_relative_eq!(p.1, q.1, epsilon = 1e-9);
        }
        let norm: f64 = na.points().iter().map(|(x, y)| x * x + y * y).sum::<f64>().sqrt();
        assert_relative_eq!(norm, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_contour_has_no_hu_moments() {
        let line = ContourShape::new(vec![Point::new(0, 0), Point::new(5, 5), Point::new(10, 10)]);
        assert!(line.moments().is_degenerate());
        let normalized = line.normalize();
        assert!(normalized.hu_moments().is_none());
        // mean centring still applies
        let sum: f64 = normalized.points().iter().map(|p| p.0).sum();
        assert_relative_eq!(sum, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_circle_first_hu_invariant() {
        // For a disc, h1 = 1 / (2π)
        let c = circle(0.0, 0.0, 500.0, 720);
        let hu = c.normalize().hu_moments().unwrap();
        assert_relative_eq!(hu[0], 1.0 / std::f64::consts::TAU, epsilon = 1e-3);
        assert!(hu[1].abs() < 1e-5);
    }

    /// Clockwise pixel border of an axis-aligned square, starting at its top-left.
    fn traced_square(side: i32) -> Vec<PixelPoint<i32>> {
        let mut border = Vec::new();
        border.extend((0..side).map(|x| PixelPoint::new(x, 0)));
        border.extend((0..side).map(|y| PixelPoint::new(side, y)));
        border.extend((0..side).map(|x| PixelPoint::new(side - x, side)));
        border.extend((0..side).map(|y| PixelPoint::new(0, side - y)));
        border
    }

    #[test]
    fn test_traced_border_is_compressed_and_closed() {
        let s = ContourShape::from_border(&traced_square(40));
        // four corners plus the last traced pixel
        assert_eq!(s.len(), 5);
        assert_relative_eq!(s.area(), 1600.0);
        assert_relative_eq!(s.perimeter(), 160.0);
        assert!(s.closure() < 0.01, "{}", s.closure());
        assert_eq!(s.simplified_vertex_count(0.02), 4);
    }

    #[test]
    fn test_open_path_has_large_closure() {
        // a "C": three sides of a square, the fourth left open
        let c = ContourShape::new(vec![Point::new(40, 0), Point::new(0, 0), Point::new(0, 40), Point::new(40, 40)]);
        assert_relative_eq!(c.closure(), 0.25);
    }

    #[test]
    fn test_elongation() {
        assert_relative_eq!(square(0, 0, 10).elongation(), 1.0, epsilon = 1e-9);
        let bar = ContourShape::new(vec![Point::new(0, 0), Point::new(0, 4), Point::new(100, 4), Point::new(100, 0)]);
        assert_relative_eq!(bar.elongation(), 25.0, epsilon = 1e-9);
        let line = ContourShape::new(vec![Point::new(0, 0), Point::new(5, 5), Point::new(10, 10)]);
        assert!(line.elongation().is_infinite());
    }
}
