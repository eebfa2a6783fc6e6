use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use image::{GrayImage, Luma};
use inkcheck::templates::{Domain, TemplateStore};
use inkcheck::{
    AssessmentConfig, AssessmentEngine, AssessmentError, AssessmentResources, Canvas, ClassificationResult,
    EmbeddingProvider, EvaluationMode, RuleId, SessionSink,
};
use ndarray::{array, Array1};

/// Returns the same embedding for every canvas.
struct FixedEmbedder(Array1<f32>);

impl EmbeddingProvider for FixedEmbedder {
    fn embedding_size(&self) -> usize {
        self.0.len()
    }

    fn name(&self) -> &str {
        "fixed"
    }

    fn embed(&self, _canvas: &Canvas) -> Result<Array1<f32>, AssessmentError> {
        Ok(self.0.clone())
    }
}

struct FailingSink;

impl SessionSink for FailingSink {
    fn record(&self, _expected: &str, _result: &ClassificationResult) -> Result<(), AssessmentError> {
        Err(AssessmentError::Io(std::io::Error::new(std::io::ErrorKind::Other, "database down")))
    }
}

#[derive(Clone, Default)]
struct CountingSink(Arc<AtomicUsize>);

impl SessionSink for CountingSink {
    fn record(&self, _expected: &str, _result: &ClassificationResult) -> Result<(), AssessmentError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn resources() -> Result<AssessmentResources, AssessmentError> {
    let store = TemplateStore::builder()
        .add_references(Domain::Letter, "A", vec![array![0.85, 0.52678, 0.0]])?
        .add_references(Domain::Letter, "B", vec![array![0.3, 0.0, 0.95394]])?
        .build()?;
    Ok(AssessmentResources { provider: Box::new(FixedEmbedder(array![1.0, 0.0, 0.0])), store })
}

fn config() -> AssessmentConfig {
    AssessmentConfig { warmup_timeout_ms: 2_000, poll_interval_ms: 5, ..AssessmentConfig::default() }
}

fn drawing() -> Canvas {
    Canvas::from_gray(GrayImage::from_fn(32, 32, |x, _| if (10..14).contains(&x) { Luma([0]) } else { Luma([255]) }))
}

#[test]
fn test_assess_triggers_warm_up() {
    let engine = AssessmentEngine::with_resources(config(), resources);
    assert!(!engine.is_ready());

    let result = engine.assess(&drawing(), "A", EvaluationMode::Alphabet).unwrap();
    assert!(engine.is_ready());
    assert!(result.is_correct);
    assert!((result.confidence - 85.0).abs() < 0.5);
}

#[test]
fn test_warm_up_runs_once_under_contention() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let engine = Arc::new(AssessmentEngine::with_resources(config(), move || {
        counter.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        resources()
    }));

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.assess(&drawing(), "A", EvaluationMode::Alphabet).unwrap())
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(results.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn test_not_ready_timeout_is_an_error() {
    let slow = AssessmentConfig { warmup_timeout_ms: 20, ..config() };
    let engine = AssessmentEngine::with_resources(slow, || {
        thread::sleep(Duration::from_millis(500));
        resources()
    });

    match engine.assess(&drawing(), "A", EvaluationMode::Alphabet) {
        Err(e @ AssessmentError::NotReadyTimeout(_)) => assert!(e.is_retryable()),
        other => panic!("expected a timeout, got {:?}", other),
    }
}

#[test]
fn test_provider_failure_is_resurfaced() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let engine = AssessmentEngine::with_resources(config(), move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(AssessmentError::ProviderUnavailable("encoder missing".into()))
    });

    assert!(engine.warm_up().is_err());
    for _ in 0..3 {
        match engine.assess(&drawing(), "A", EvaluationMode::Alphabet) {
            Err(AssessmentError::ProviderUnavailable(reason)) => assert!(reason.contains("encoder missing")),
            other => panic!("expected unavailability, got {:?}", other),
        }
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_panicking_warm_up_is_resurfaced() {
    let engine = AssessmentEngine::with_resources(config(), || -> Result<AssessmentResources, AssessmentError> {
        panic!("template directory vanished")
    });

    for _ in 0..2 {
        match engine.assess(&drawing(), "A", EvaluationMode::Alphabet) {
            Err(e @ AssessmentError::ProviderUnavailable(_)) => {
                assert!(!e.is_retryable());
                assert!(e.to_string().contains("template directory vanished"));
            }
            other => panic!("expected unavailability, got {:?}", other),
        }
    }
    assert!(!engine.is_ready());
}

#[test]
fn test_input_problems_are_negative_results() {
    let engine = AssessmentEngine::with_resources(config(), resources);

    let garbage = engine.assess_bytes(b"definitely not a png", "A", EvaluationMode::Alphabet).unwrap();
    assert!(!garbage.is_correct);
    assert_eq!(garbage.rule(), RuleId::DecodeFailed);

    let blank = Canvas::from_gray(GrayImage::from_pixel(32, 32, Luma([255])));
    let result = engine.assess(&blank, "A", EvaluationMode::Alphabet).unwrap();
    assert_eq!(result.rule(), RuleId::NoDrawingDetected);

    let result = engine.assess(&drawing(), "AB", EvaluationMode::Alphabet).unwrap();
    assert_eq!(result.rule(), RuleId::InvalidExpectation);

    let result = engine.assess(&drawing(), "HEXAGON", EvaluationMode::Shape).unwrap();
    assert_eq!(result.rule(), RuleId::InvalidExpectation);

    let result = engine.assess(&drawing(), "CIRCLES", EvaluationMode::Shape).unwrap();
    assert_eq!(result.rule(), RuleId::ExpectedTemplateMissing);
}

#[test]
fn test_sink_failure_does_not_change_result() {
    let plain = AssessmentEngine::with_resources(config(), resources);
    let failing = AssessmentEngine::with_resources(config(), resources).with_sink(FailingSink);

    let expected = plain.assess(&drawing(), "A", EvaluationMode::Alphabet).unwrap();
    let actual = failing.assess(&drawing(), "A", EvaluationMode::Alphabet).unwrap();
    assert_eq!(expected, actual);
}

#[test]
fn test_every_result_reaches_the_sink() {
    let sink = CountingSink::default();
    let engine = AssessmentEngine::with_resources(config(), resources).with_sink(sink.clone());

    engine.assess(&drawing(), "A", EvaluationMode::Alphabet).unwrap();
    engine.assess(&drawing(), "B", EvaluationMode::Alphabet).unwrap();
    engine.assess_bytes(b"junk", "A", EvaluationMode::Alphabet).unwrap();
    assert_eq!(sink.0.load(Ordering::SeqCst), 3);
}

#[test]
fn test_base64_input() {
    let engine = AssessmentEngine::with_resources(config(), resources);
    let png = drawing().to_png().unwrap();
    let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, png);

    let result = engine
        .assess_base64(&format!("data:image/png;base64,{}", encoded), "A", EvaluationMode::Alphabet)
        .unwrap();
    assert!(result.is_correct);
}
