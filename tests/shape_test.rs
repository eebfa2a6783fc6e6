use image::{GrayImage, Luma};
use inkcheck::shape::render::{self, Sketch};
use inkcheck::shape::{accuracy_from_distance, extract_contours, ContourExtractor, ContourShape, Point, Shape};
use inkcheck::{AssessmentConfig, AssessmentEngine, Canvas, EmbedderKind, EvaluationMode, RuleId, ShapeConfig};
use tempfile::TempDir;

fn shape_engine() -> (TempDir, AssessmentEngine) {
    let root = tempfile::tempdir().unwrap();
    render::write_canonical_shapes(root.path().join("shapes")).unwrap();
    let config = AssessmentConfig::default()
        .with_template_root(root.path())
        .with_embedder(EmbedderKind::PixelGrid);
    let engine = AssessmentEngine::new(config);
    engine.warm_up().unwrap();
    (root, engine)
}

#[test]
fn test_near_perfect_circle() {
    let (_root, engine) = shape_engine();
    // off-centre, smaller and thicker than the canonical reference
    let drawing = Sketch::new(256, 256).stroke_width(9.0).circle((110.0, 140.0), 70.0).into_image();

    let result = engine.assess(&Canvas::from_gray(drawing), "CIRCLES", EvaluationMode::Shape).unwrap();
    assert!(result.is_correct, "{:?}", result);
    assert!(result.confidence >= 80.0);
    assert_eq!(result.predicted_label.as_deref(), Some("CIRCLES"));
    assert!(result.match_distance.is_some());

    let quality = result.quality.unwrap();
    for value in [quality.smoothness, quality.size_consistency, quality.pressure_consistency, quality.overall] {
        assert!((0.0..=100.0).contains(&value));
    }
    let sub_scores = result.sub_scores.unwrap();
    assert!(sub_scores.pressure.is_some());
    assert!(sub_scores.formation.unwrap() > 70.0);
    assert!(result.feedback.unwrap().contains("circle"));
}

#[test]
fn test_thin_strokes_are_still_drawings() {
    let (_root, engine) = shape_engine();
    for width in [1.0, 2.0] {
        let drawing = Sketch::new(256, 256).stroke_width(width).circle((128.0, 128.0), 80.0).into_image();
        let result = engine.assess(&Canvas::from_gray(drawing), "CIRCLES", EvaluationMode::Shape).unwrap();
        assert_ne!(result.rule(), RuleId::NoDrawingDetected, "width {}", width);
        assert!(result.is_correct, "width {}: {:?}", width, result);
    }
}

fn hand_drawn(shape: Shape) -> GrayImage {
    let sketch = Sketch::new(256, 256).stroke_width(7.0);
    match shape {
        Shape::Circles => sketch.circle((125.0, 132.0), 82.0),
        Shape::Square => sketch.polyline(&[(52.0, 48.0), (204.0, 54.0), (200.0, 206.0), (47.0, 201.0)], true),
        Shape::Triangle => sketch.polyline(&[(130.0, 40.0), (220.0, 210.0), (38.0, 205.0)], true),
        Shape::Curves => sketch.arc((128.0, 190.0), 95.0, std::f64::consts::PI + 0.35, std::f64::consts::TAU - 0.35),
        Shape::Lines => sketch.polyline(&[(40.0, 120.0), (215.0, 132.0)], false),
        Shape::Zigzag => sketch.polyline(
            &[(30.0, 170.0), (70.0, 90.0), (110.0, 168.0), (150.0, 92.0), (190.0, 171.0), (228.0, 88.0)],
            false,
        ),
    }
    .into_image()
}

#[test]
fn test_hand_drawn_shapes_are_accepted() {
    let (_root, engine) = shape_engine();
    for shape in [Shape::Circles, Shape::Square, Shape::Triangle, Shape::Lines] {
        let result = engine.assess(&Canvas::from_gray(hand_drawn(shape)), shape.key(), EvaluationMode::Shape).unwrap();
        assert!(result.is_correct, "{}: {:?}", shape, result);
        assert!(result.feedback.is_some());
    }
}

#[test]
fn test_wrong_shape_is_rejected_by_geometry() {
    let (_root, engine) = shape_engine();
    let confusions = [
        (Shape::Square, Shape::Circles),
        (Shape::Triangle, Shape::Circles),
        (Shape::Circles, Shape::Triangle),
        (Shape::Square, Shape::Triangle),
        (Shape::Circles, Shape::Square),
        (Shape::Triangle, Shape::Square),
        (Shape::Curves, Shape::Lines),
        (Shape::Circles, Shape::Curves),
        (Shape::Lines, Shape::Zigzag),
    ];
    for (drawn, expected) in confusions {
        let result =
            engine.assess(&Canvas::from_gray(hand_drawn(drawn)), expected.key(), EvaluationMode::Shape).unwrap();
        assert!(!result.is_correct, "{} accepted as {}", drawn, expected);
        assert_eq!(result.rule(), RuleId::GeometryMismatch, "{} as {}: {:?}", drawn, expected, result);
        assert!(result.predicted_label.is_none());
        assert!(result.quality.is_none());
        assert!(!result.feedback.unwrap_or_default().is_empty());
    }
}

#[test]
fn test_open_stroke_for_closed_shape() {
    let (_root, engine) = shape_engine();
    // three sides of a square, never joined
    let drawing = Sketch::new(256, 256)
        .stroke_width(7.0)
        .polyline(&[(200.0, 50.0), (50.0, 50.0), (50.0, 200.0), (200.0, 200.0)], false)
        .into_image();
    let result = engine.assess(&Canvas::from_gray(drawing), "SQUARE", EvaluationMode::Shape).unwrap();
    assert!(!result.is_correct);
    assert_eq!(result.rule(), RuleId::GeometryMismatch);
    assert!(result.feedback.unwrap().contains("closed"));
}

#[test]
fn test_empty_canvas_for_every_shape() {
    let (_root, engine) = shape_engine();
    let blank = Canvas::from_gray(GrayImage::from_pixel(200, 200, Luma([255])));

    for shape in Shape::ALL {
        let result = engine.assess(&blank, shape.key(), EvaluationMode::Shape).unwrap();
        assert!(!result.is_correct);
        assert_eq!(result.rule(), RuleId::NoDrawingDetected);
        assert!(result.quality.is_none());
        assert!(result.sub_scores.is_none());
        assert!(result.match_distance.is_none());
        assert!(result.feedback.is_some());
    }
}

#[test]
fn test_shape_names_are_forgiving() {
    let (_root, engine) = shape_engine();
    let drawing = Canvas::from_gray(render::canonical(Shape::Square));
    let result = engine.assess(&drawing, "square", EvaluationMode::Shape).unwrap();
    assert!(result.is_correct);
}

#[test]
fn test_png_round_trip_through_engine() {
    let (_root, engine) = shape_engine();
    let png = Canvas::from_gray(render::canonical(Shape::Triangle)).to_png().unwrap();

    let first = engine.assess_bytes(&png, "TRIANGLE", EvaluationMode::Shape).unwrap();
    let second = engine.assess_bytes(&png, "TRIANGLE", EvaluationMode::Shape).unwrap();
    assert!(first.is_correct);
    assert_eq!(first, second);
}

#[test]
fn test_oversized_contour_falls_back() {
    // a frame hugging the border covers nearly the whole canvas
    let mut image = GrayImage::from_pixel(100, 100, Luma([255]));
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        if x < 3 || y < 3 || x > 96 || y > 96 {
            *pixel = Luma([0]);
        }
    }
    let config = ShapeConfig { max_area_ratio: 0.5, ..ShapeConfig::default() };
    let extraction = ContourExtractor::from_config(&config).extract(&image).unwrap();
    assert!(extraction.used_fallback);
    assert!(extraction.contour.len() >= 4);
}

#[test]
fn test_normalization_invariance() {
    let base = vec![Point::new(0, 0), Point::new(0, 20), Point::new(30, 20), Point::new(30, 0)];
    let moved: Vec<Point> = base.iter().map(|p| Point::new(p.x * 3 + 17, p.y * 3 - 5)).collect();

    let a = ContourShape::new(base).normalize();
    let b = ContourShape::new(moved).normalize();
    for (p, q) in a.points().iter().zip(b.points()) {
        assert!((p.0 - q.0).abs() < 1e-9 && (p.1 - q.1).abs() < 1e-9);
    }
}

#[test]
fn test_accuracy_is_monotonic() {
    let distances = [0.0, 0.05, 0.1, 0.1001, 0.2, 0.25, 0.3, 0.4, 0.41, 1.0, 10.0, f64::INFINITY];
    for pair in distances.windows(2) {
        assert!(accuracy_from_distance(pair[0]) >= accuracy_from_distance(pair[1]));
    }
}

#[test]
fn test_extract_contours_from_mask() {
    let extractor = ContourExtractor::from_config(&ShapeConfig::default());
    let mask = extractor.binarize(&render::canonical(Shape::Lines));
    assert_eq!(mask.dimensions(), render::canonical(Shape::Lines).dimensions());
    let contours = extract_contours(&mask);
    assert_eq!(contours.len(), 1);
}

#[test]
fn test_ring_encloses_and_stroke_does_not() {
    let extractor = ContourExtractor::default();
    let ring = extractor.extract(&render::canonical(Shape::Circles)).unwrap();
    assert!(ring.enclosure > 0.5, "{}", ring.enclosure);
    let stroke = extractor.extract(&render::canonical(Shape::Zigzag)).unwrap();
    assert_eq!(stroke.enclosure, 0.0);
}
