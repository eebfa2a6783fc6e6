use std::fs;

use inkcheck::templates::{Domain, TemplateStore};
use inkcheck::{AssessmentConfig, AssessmentError, Canvas, EvaluationMode, Shape};
use ndarray::array;

#[test]
fn test_duplicate_category() {
    let result = TemplateStore::builder()
        .add_references(Domain::Letter, "Q", vec![array![1.0, 0.0]])
        .and_then(|builder| builder.add_references(Domain::Letter, "Q", vec![array![0.0, 1.0]]));

    assert!(result.is_err());
}

#[test]
fn test_many_categories() -> Result<(), AssessmentError> {
    let mut builder = TemplateStore::builder();
    for digit in 0..10 {
        let mut reference = ndarray::Array1::zeros(10);
        reference[digit] = 1.0;
        builder = builder.add_references(Domain::Digit, digit.to_string(), vec![reference])?;
    }
    let store = builder.build()?;
    assert_eq!(store.category_count(Domain::Digit), 10);
    assert_eq!(store.info().reference_count, 10);
    Ok(())
}

#[test]
fn test_invalid_keys() {
    for (domain, key) in [(Domain::Letter, ""), (Domain::Letter, "é"), (Domain::Digit, "10"), (Domain::Sentence, "  ")] {
        assert!(
            TemplateStore::builder().add_references(domain, key, vec![array![1.0]]).is_err(),
            "{} key {:?} should be rejected",
            domain,
            key
        );
    }
}

#[test]
fn test_mode_and_shape_parsing() {
    assert_eq!("digit-argmax".parse::<EvaluationMode>().unwrap(), EvaluationMode::DigitArgmax);
    assert!("cursive".parse::<EvaluationMode>().is_err());
    assert_eq!("circle".parse::<Shape>().unwrap(), Shape::Circles);
    assert_eq!("ZigZag".parse::<Shape>().unwrap(), Shape::Zigzag);
    assert!(matches!("oval".parse::<Shape>(), Err(AssessmentError::Input(_))));
}

#[test]
fn test_config_file_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("inkcheck.json");

    fs::write(&path, r#"{ "shape": { "adaptive_block": 24 } }"#).unwrap();
    assert!(matches!(AssessmentConfig::from_file(&path), Err(AssessmentError::Config(_))));

    fs::write(&path, r#"{ "shape": { "stroke_distance_limits": { "LINES": 0.5 } }, "embedder": "pixel-grid" }"#).unwrap();
    let config = AssessmentConfig::from_file(&path).unwrap();
    assert_eq!(config.shape.stroke_distance_limit(Shape::Lines), Some(0.5));
    assert_eq!(config.shape.stroke_distance_limit(Shape::Zigzag), None);

    assert!(matches!(
        AssessmentConfig::from_file(dir.path().join("missing.json")),
        Err(AssessmentError::Io(_))
    ));
}

#[test]
fn test_canvas_decoding() {
    assert!(matches!(Canvas::decode(b""), Err(AssessmentError::Input(_))));
    assert!(matches!(Canvas::decode_base64("%%%"), Err(AssessmentError::Input(_))));

    let canvas = Canvas::from_gray(image::GrayImage::from_pixel(8, 4, image::Luma([255])));
    assert!(canvas.is_blank());
    let decoded = Canvas::decode(&canvas.to_png().unwrap()).unwrap();
    assert_eq!(decoded.dimensions(), (8, 4));
}
