use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::classifier::AssessmentError;
use crate::runtime::RuntimeConfig;
use crate::shape::Shape;

/// Environment variable naming a JSON configuration file.
pub const CONFIG_ENV: &str = "INKCHECK_CONFIG";
/// Environment variable overriding the template root directory.
pub const TEMPLATES_ENV: &str = "INKCHECK_TEMPLATES";

/// Similarity thresholds used by the character classifier.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Argmax acceptance threshold for uppercase letters
    pub letter_upper: f32,
    /// Argmax acceptance threshold for lowercase letters (weaker template coverage)
    pub letter_lower: f32,
    /// Argmax acceptance threshold for digits
    pub digit_argmax: f32,
    /// Verification cascade: reject when the expected score is below this floor
    pub digit_floor: f32,
    /// Verification cascade: allowed gap when the expected digit is outside the top two
    pub top_two_margin: f32,
    /// Verification cascade: allowed gap when another digit ranks first
    pub outrank_margin: f32,
    /// Default acceptance threshold for sentences
    pub sentence: f32,
    /// Per-category overrides, keyed by category key
    pub category_overrides: BTreeMap<String, f32>,
}

impl Default for Thresholds {
    fn default() -> Self {
        let mut category_overrides = BTreeMap::new();
        category_overrides.insert("6".to_string(), 0.86);
        Self {
            letter_upper: 0.80,
            letter_lower: 0.70,
            digit_argmax: 0.80,
            digit_floor: 0.65,
            top_two_margin: 0.04,
            outrank_margin: 0.10,
            sentence: 0.85,
            category_overrides,
        }
    }
}

/// Tuning for the contour pipeline.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShapeConfig {
    /// Smallest contour area kept, as a fraction of the canvas
    pub min_area_ratio: f64,
    /// Largest contour area kept, as a fraction of the canvas
    pub max_area_ratio: f64,
    /// Side of the square window used for the local mean (odd)
    pub adaptive_block: u32,
    /// How much darker than its neighbourhood a pixel must be to count as ink
    pub adaptive_offset: f32,
    /// Pixels at or below this gray level always count as ink
    pub ink_floor: u8,
    /// Closed shapes are accepted at or above this accuracy
    pub closed_accuracy_threshold: f32,
    /// Maximum match distance for each open stroke shape
    pub stroke_distance_limits: BTreeMap<Shape, f64>,
    /// Reject drawings whose plain geometry cannot be the expected shape before matching
    pub geometry_gate: bool,
}

impl Default for ShapeConfig {
    fn default() -> Self {
        let mut stroke_distance_limits = BTreeMap::new();
        stroke_distance_limits.insert(Shape::Lines, 0.45);
        stroke_distance_limits.insert(Shape::Curves, 0.40);
        stroke_distance_limits.insert(Shape::Zigzag, 0.40);
        Self {
            min_area_ratio: 0.001,
            max_area_ratio: 0.90,
            adaptive_block: 25,
            adaptive_offset: 10.0,
            ink_floor: 64,
            closed_accuracy_threshold: 65.0,
            stroke_distance_limits,
            geometry_gate: true,
        }
    }
}

impl ShapeConfig {
    pub fn stroke_distance_limit(&self, shape: Shape) -> Option<f64> {
        self.stroke_distance_limits.get(&shape).copied()
    }
}

/// Which embedding provider backs the character classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbedderKind {
    /// CLIP image encoder run through ONNX Runtime
    #[default]
    Onnx,
    /// Ink density grid; needs no model download
    PixelGrid,
}

impl std::str::FromStr for EmbedderKind {
    type Err = AssessmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "onnx" | "clip" => Ok(Self::Onnx),
            "pixel-grid" | "pixel_grid" | "grid" => Ok(Self::PixelGrid),
            other => Err(AssessmentError::Config(format!("Unknown embedder '{}'", other))),
        }
    }
}

/// Top-level configuration of the assessment engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AssessmentConfig {
    /// Root of the on-disk template layout
    pub template_root: PathBuf,
    /// How long `ensure_ready` waits for warm-up
    pub warmup_timeout_ms: u64,
    /// Interval between readiness polls
    pub poll_interval_ms: u64,
    pub embedder: EmbedderKind,
    /// Directory for downloaded models; the platform cache directory when unset
    pub model_dir: Option<PathBuf>,
    pub runtime: RuntimeConfig,
    pub thresholds: Thresholds,
    pub shape: ShapeConfig,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            template_root: PathBuf::from("templates"),
            warmup_timeout_ms: 30_000,
            poll_interval_ms: 100,
            embedder: EmbedderKind::default(),
            model_dir: None,
            runtime: RuntimeConfig::default(),
            thresholds: Thresholds::default(),
            shape: ShapeConfig::default(),
        }
    }
}

impl AssessmentConfig {
    /// Reads a JSON configuration file. Missing fields keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AssessmentError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            AssessmentError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Builds the configuration from the environment:
    /// 1. `INKCHECK_CONFIG` names a JSON file (defaults otherwise)
    /// 2. `INKCHECK_TEMPLATES` overrides the template root
    pub fn from_env() -> Result<Self, AssessmentError> {
        let mut config = match env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        if let Ok(root) = env::var(TEMPLATES_ENV) {
            config.template_root = PathBuf::from(root);
        }
        Ok(config)
    }

    pub fn with_template_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.template_root = root.into();
        self
    }

    pub fn with_embedder(mut self, embedder: EmbedderKind) -> Self {
        self.embedder = embedder;
        self
    }

    pub fn warmup_timeout(&self) -> Duration {
        Duration::from_millis(self.warmup_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Rejects settings the classifiers cannot work with.
    pub fn validate(&self) -> Result<(), AssessmentError> {
        let shape = &self.shape;
        if !(0.0..=1.0).contains(&shape.min_area_ratio)
            || !(0.0..=1.0).contains(&shape.max_area_ratio)
            || shape.min_area_ratio >= shape.max_area_ratio
        {
            return Err(AssessmentError::Config(format!(
                "Contour area band [{}, {}] must be an increasing range within [0, 1]",
                shape.min_area_ratio, shape.max_area_ratio
            )));
        }
        if shape.adaptive_block < 3 || shape.adaptive_block % 2 == 0 {
            return Err(AssessmentError::Config(format!(
                "Adaptive threshold block must be odd and at least 3, got {}",
                shape.adaptive_block
            )));
        }
        if let Some(shape) = shape.stroke_distance_limits.keys().find(|s| s.is_closed()) {
            return Err(AssessmentError::Config(format!(
                "{} is a closed shape and is judged by accuracy, not distance",
                shape
            )));
        }
        Ok(())
    }
}
