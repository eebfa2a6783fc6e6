use std::fmt;
use std::sync::Arc;

use lazy_static::lazy_static;
use log::{info, warn};

use crate::canvas::Canvas;
use crate::classifier::{AssessmentError, CharacterClassifier, ClassificationResult, EvaluationMode, RuleId};
use crate::config::{AssessmentConfig, EmbedderKind};
use crate::embedding::{EmbeddingProvider, OnnxImageEmbedder, PixelGridEmbedder};
use crate::model_manager::ModelManager;
use crate::models::BuiltinModel;
use crate::readiness::ReadinessCoordinator;
use crate::shape::{Shape, ShapeClassifier};
use crate::templates::{TemplateLoader, TemplateStore};

/// The heavyweight shared state built once during warm-up.
pub struct AssessmentResources {
    pub provider: Box<dyn EmbeddingProvider>,
    pub store: TemplateStore,
}

impl fmt::Debug for AssessmentResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssessmentResources")
            .field("provider", &self.provider.name())
            .field("store", &self.store.info())
            .finish()
    }
}

/// Receives every result the engine produces, for persistence or analytics.
///
/// Failures are logged and never change the result returned to the caller.
pub trait SessionSink: Send + Sync {
    fn record(&self, expected: &str, result: &ClassificationResult) -> Result<(), AssessmentError>;
}

/// Writes each result to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl SessionSink for LogSink {
    fn record(&self, expected: &str, result: &ClassificationResult) -> Result<(), AssessmentError> {
        info!(
            "session: mode={} expected={} predicted={:?} correct={} confidence={:.1}",
            result.decision_trace.mode, expected, result.predicted_label, result.is_correct, result.confidence
        );
        Ok(())
    }
}

/// Builds the embedding provider selected by the configuration.
pub fn build_provider(config: &AssessmentConfig) -> Result<Box<dyn EmbeddingProvider>, AssessmentError> {
    match config.embedder {
        EmbedderKind::PixelGrid => Ok(Box::new(PixelGridEmbedder::default())),
        EmbedderKind::Onnx => {
            let manager = match &config.model_dir {
                Some(dir) => ModelManager::new(dir)?,
                None => ModelManager::new_default()?,
            };
            let embedder = OnnxImageEmbedder::from_builtin(BuiltinModel::ClipVitB32, &manager, &config.runtime)?;
            Ok(Box::new(embedder))
        }
    }
}

/// Entry point for assessments: waits for warm-up, routes each request to the
/// character or shape classifier and hands the result to the session sink.
///
/// ```no_run
/// use inkcheck::{AssessmentConfig, AssessmentEngine, Canvas, EvaluationMode};
///
/// let engine = AssessmentEngine::new(AssessmentConfig::default().with_template_root("templates"));
/// engine.spawn_warm_up();
///
/// let bytes = std::fs::read("drawing.png")?;
/// let result = engine.assess_bytes(&bytes, "A", EvaluationMode::Alphabet)?;
/// println!("correct: {} ({:.0}%)", result.is_correct, result.confidence);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct AssessmentEngine {
    config: AssessmentConfig,
    readiness: Arc<ReadinessCoordinator<AssessmentResources>>,
    characters: CharacterClassifier,
    shapes: Arc<ShapeClassifier>,
    sink: Box<dyn SessionSink>,
}

impl fmt::Debug for AssessmentEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssessmentEngine")
            .field("config", &self.config)
            .field("readiness", &self.readiness)
            .finish()
    }
}

impl AssessmentEngine {
    /// An engine that loads its templates from `config.template_root` with the embedder
    /// the configuration selects. Nothing is loaded until warm-up.
    pub fn new(config: AssessmentConfig) -> Self {
        let loader_config = config.clone();
        Self::with_provider_factory(config, move || build_provider(&loader_config))
    }

    /// Like [`new`](Self::new) but with a caller-supplied embedding provider.
    pub fn with_provider_factory<F>(config: AssessmentConfig, provider: F) -> Self
    where
        F: Fn() -> Result<Box<dyn EmbeddingProvider>, AssessmentError> + Send + Sync + 'static,
    {
        let shapes = Arc::new(ShapeClassifier::new(config.shape.clone()));
        let loader_shapes = Arc::clone(&shapes);
        let root = config.template_root.clone();
        let thresholds = config.thresholds.clone();

        Self::build(config, shapes, move || {
            let provider = provider()?;
            let store = TemplateLoader::new(&root, provider.as_ref(), &loader_shapes)
                .with_thresholds(&thresholds)
                .load()?;
            if let (Some(stored), size) = (store.embedding_size(), provider.embedding_size()) {
                if stored != size {
                    return Err(AssessmentError::ProviderUnavailable(format!(
                        "Templates have {} dimensions but {} produces {}",
                        stored,
                        provider.name(),
                        size
                    )));
                }
            }
            Ok(AssessmentResources { provider, store })
        })
    }

    /// An engine whose resources come entirely from `factory`, e.g. an in-memory store.
    pub fn with_resources<F>(config: AssessmentConfig, factory: F) -> Self
    where
        F: Fn() -> Result<AssessmentResources, AssessmentError> + Send + Sync + 'static,
    {
        let shapes = Arc::new(ShapeClassifier::new(config.shape.clone()));
        Self::build(config, shapes, factory)
    }

    fn build<F>(config: AssessmentConfig, shapes: Arc<ShapeClassifier>, factory: F) -> Self
    where
        F: Fn() -> Result<AssessmentResources, AssessmentError> + Send + Sync + 'static,
    {
        let readiness = Arc::new(ReadinessCoordinator::new(factory).with_poll_interval(config.poll_interval()));
        Self {
            characters: CharacterClassifier::new(config.thresholds.clone()),
            config,
            readiness,
            shapes,
            sink: Box::new(LogSink),
        }
    }

    pub fn with_sink(mut self, sink: impl SessionSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn config(&self) -> &AssessmentConfig {
        &self.config
    }

    pub fn readiness(&self) -> &Arc<ReadinessCoordinator<AssessmentResources>> {
        &self.readiness
    }

    /// Builds the shared resources on the calling thread.
    pub fn warm_up(&self) -> Result<(), AssessmentError> {
        self.readiness.warm_up().map(|_| ())
    }

    /// Starts warm-up in the background; no-op if it has already started.
    pub fn spawn_warm_up(&self) {
        self.readiness.spawn_warm_up();
    }

    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    /// Judges one drawing. Waits up to the configured warm-up timeout for the shared
    /// resources.
    ///
    /// # Errors
    /// Only infrastructure failures: `NotReadyTimeout` and `ProviderUnavailable`. Every
    /// problem with the drawing or the expected label is a negative result instead.
    pub fn assess(
        &self,
        canvas: &Canvas,
        expected: &str,
        mode: EvaluationMode,
    ) -> Result<ClassificationResult, AssessmentError> {
        let resources = self.readiness.ensure_ready(self.config.warmup_timeout())?;
        let result = match mode {
            EvaluationMode::Shape => self.assess_shape(canvas, expected, &resources.store),
            _ => self.assess_character(canvas, expected, mode, &resources),
        };
        self.record(expected, &result);
        Ok(result)
    }

    /// Decodes a PNG or JPEG and judges it. Undecodable bytes give a negative result.
    pub fn assess_bytes(
        &self,
        bytes: &[u8],
        expected: &str,
        mode: EvaluationMode,
    ) -> Result<ClassificationResult, AssessmentError> {
        match Canvas::decode(bytes) {
            Ok(canvas) => self.assess(&canvas, expected, mode),
            Err(e) => Ok(self.decode_failed(expected, mode, e)),
        }
    }

    /// Same as [`assess_bytes`](Self::assess_bytes) for base64 text or a data URL.
    pub fn assess_base64(
        &self,
        text: &str,
        expected: &str,
        mode: EvaluationMode,
    ) -> Result<ClassificationResult, AssessmentError> {
        match Canvas::decode_base64(text) {
            Ok(canvas) => self.assess(&canvas, expected, mode),
            Err(e) => Ok(self.decode_failed(expected, mode, e)),
        }
    }

    fn decode_failed(&self, expected: &str, mode: EvaluationMode, error: AssessmentError) -> ClassificationResult {
        let result = ClassificationResult::rejected(mode, RuleId::DecodeFailed, error.to_string());
        self.record(expected, &result);
        result
    }

    fn assess_shape(&self, canvas: &Canvas, expected: &str, store: &TemplateStore) -> ClassificationResult {
        match expected.parse::<Shape>() {
            Ok(shape) => self.shapes.classify(canvas.gray(), shape, store.canonical_contour(shape)),
            Err(e) => ClassificationResult::rejected(EvaluationMode::Shape, RuleId::InvalidExpectation, e.to_string()),
        }
    }

    fn assess_character(
        &self,
        canvas: &Canvas,
        expected: &str,
        mode: EvaluationMode,
        resources: &AssessmentResources,
    ) -> ClassificationResult {
        if canvas.is_blank() {
            return ClassificationResult::rejected(mode, RuleId::NoDrawingDetected, "canvas has no ink");
        }
        match resources.provider.embed(canvas) {
            Ok(embedding) => self.characters.classify(&embedding, &resources.store, expected, mode),
            Err(e) => {
                warn!("Embedding failed for {} '{}': {}", mode, expected, e);
                ClassificationResult::rejected(mode, RuleId::EmbeddingFailed, e.to_string())
            }
        }
    }

    fn record(&self, expected: &str, result: &ClassificationResult) {
        if let Err(e) = self.sink.record(expected, result) {
            warn!("Session sink failed: {}", e);
        }
    }
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<AssessmentEngine>();
    }
};

lazy_static! {
    static ref SHARED_ENGINE: Result<Arc<AssessmentEngine>, String> = AssessmentConfig::from_env()
        .map(|config| Arc::new(AssessmentEngine::new(config)))
        .map_err(|e| e.to_string());
}

/// The process-wide engine, configured from the environment on first use.
pub fn shared_engine() -> Result<Arc<AssessmentEngine>, AssessmentError> {
    SHARED_ENGINE.clone().map_err(AssessmentError::Config)
}
