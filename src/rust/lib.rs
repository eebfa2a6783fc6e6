//! Assessment engine for children's handwriting and pre-writing drawings.
//!
//! Characters, digits and sentences are judged by comparing an image embedding with
//! reference embeddings of every category; pre-writing shapes (lines, curves, circles,
//! triangles, squares, zigzags) are judged by the geometry of their dominant contour.
//!
//! # Basic Usage
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use inkcheck::shape::{render, Shape};
//! use inkcheck::{AssessmentConfig, AssessmentEngine, Canvas, EmbedderKind, EvaluationMode};
//!
//! let root = std::env::temp_dir().join("inkcheck-doc-templates");
//! render::write_canonical_shapes(root.join("shapes"))?;
//!
//! let config = AssessmentConfig::default()
//!     .with_template_root(&root)
//!     .with_embedder(EmbedderKind::PixelGrid);
//! let engine = AssessmentEngine::new(config);
//! engine.warm_up()?;
//!
//! let drawing = Canvas::from_gray(render::canonical(Shape::Circles));
//! let result = engine.assess(&drawing, "CIRCLES", EvaluationMode::Shape)?;
//! assert!(result.is_correct);
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! [`AssessmentEngine`] is `Send + Sync`. Warm-up happens once, under a lock; after
//! that every request only reads the shared embedding provider and template store.
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::thread;
//! use inkcheck::{shared_engine, Canvas, EvaluationMode};
//!
//! let engine = shared_engine()?;
//! engine.spawn_warm_up();
//!
//! let handles: Vec<_> = ["A", "B", "C"]
//!     .into_iter()
//!     .map(|letter| {
//!         let engine = engine.clone();
//!         thread::spawn(move || {
//!             let bytes = std::fs::read(format!("{}.png", letter)).unwrap();
//!             engine.assess_bytes(&bytes, letter, EvaluationMode::Alphabet).unwrap()
//!         })
//!     })
//!     .collect();
//! for handle in handles {
//!     println!("{:?}", handle.join().unwrap());
//! }
//! # Ok(())
//! # }
//! ```

pub mod canvas;
pub mod classifier;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod model_manager;
pub mod models;
pub mod readiness;
mod runtime;
pub mod shape;
pub mod templates;

pub use canvas::Canvas;
pub use classifier::{AssessmentError, CharacterClassifier, ClassificationResult, EvaluationMode, QualityMetrics, RuleId, SubScores};
pub use config::{AssessmentConfig, EmbedderKind, ShapeConfig, Thresholds};
pub use embedding::{EmbeddingProvider, OnnxImageEmbedder, PixelGridEmbedder};
pub use engine::{shared_engine, AssessmentEngine, AssessmentResources, LogSink, SessionSink};
pub use model_manager::{ModelError, ModelManager};
pub use models::{BuiltinModel, ModelCharacteristics, ModelInfo};
pub use readiness::{Phase, ReadinessCoordinator};
pub use runtime::{create_session_builder, OptimizationLevel, RuntimeConfig};
pub use shape::{Shape, ShapeClassifier};
pub use templates::{Domain, TemplateStore};

pub fn init_logger() {
    env_logger::init();
}
