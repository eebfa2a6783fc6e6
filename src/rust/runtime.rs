use std::sync::OnceLock;

use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use serde::Deserialize;

use crate::classifier::AssessmentError;

static INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Graph optimisation applied when a session is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationLevel {
    Disable,
    Basic,
    Extended,
    All,
}

impl OptimizationLevel {
    fn to_ort(self) -> GraphOptimizationLevel {
        match self {
            Self::Disable => GraphOptimizationLevel::Disable,
            Self::Basic => GraphOptimizationLevel::Level1,
            Self::Extended => GraphOptimizationLevel::Level2,
            Self::All => GraphOptimizationLevel::Level3,
        }
    }
}

/// ONNX Runtime tuning for the image encoder session.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub inter_threads: usize,
    pub intra_threads: usize,
    pub optimization_level: OptimizationLevel,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            inter_threads: 0, // Let ONNX Runtime decide
            intra_threads: 0, // Let ONNX Runtime decide
            optimization_level: OptimizationLevel::All,
        }
    }
}

fn init_onnx_environment() -> ort::Result<()> {
    ort::init().with_name("inkcheck").commit()?;
    Ok(())
}

/// Initialises the process-wide ONNX Runtime environment once. A failed initialisation
/// is remembered and reported to every later caller.
pub fn ensure_initialized() -> Result<(), AssessmentError> {
    INIT.get_or_init(|| init_onnx_environment().map_err(|e| e.to_string()))
        .clone()
        .map_err(|e| AssessmentError::ProviderUnavailable(format!("ONNX Runtime failed to initialise: {}", e)))
}

pub fn create_session_builder(config: &RuntimeConfig) -> Result<SessionBuilder, AssessmentError> {
    ensure_initialized()?;
    let mut builder = Session::builder()?;

    if config.inter_threads > 0 {
        builder = builder.with_inter_threads(config.inter_threads)?;
    }
    if config.intra_threads > 0 {
        builder = builder.with_intra_threads(config.intra_threads)?;
    }
    builder = builder.with_optimization_level(config.optimization_level.to_ort())?;

    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_initialization() {
        assert!(ensure_initialized().is_ok());
        assert!(ensure_initialized().is_ok()); // Second call should be fine
    }

    #[test]
    fn test_session_builder_config() {
        let config = RuntimeConfig {
            inter_threads: 2,
            intra_threads: 2,
            optimization_level: OptimizationLevel::Basic,
        };
        assert!(create_session_builder(&config).is_ok());
    }

    #[test]
    fn test_config_from_json() {
        let config: RuntimeConfig = serde_json::from_str(r#"{ "optimization_level": "extended" }"#).unwrap();
        assert_eq!(config.optimization_level, OptimizationLevel::Extended);
        assert_eq!(config.intra_threads, 0);
    }
}
