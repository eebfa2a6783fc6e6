use std::io;
use std::time::Duration;

use ort::Error as OrtError;

/// Represents the different types of errors that can occur while assessing a drawing.
///
/// Input and template problems are normally folded into a negative
/// [`ClassificationResult`](super::ClassificationResult) by the classifiers; only
/// infrastructure failures (`ProviderUnavailable`, `NotReadyTimeout`) reach callers
/// of [`AssessmentEngine::assess`](crate::AssessmentEngine::assess).
#[derive(Debug, thiserror::Error)]
pub enum AssessmentError {
    /// Bad or empty image, or an expected label that does not fit the evaluation mode
    #[error("Invalid input: {0}")]
    Input(String),
    /// The category has no entry in the template store
    #[error("No templates for category '{0}'")]
    TemplateMissing(String),
    /// The embedding provider or template store failed to initialize
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Warm-up did not finish within the allotted time
    #[error("Assessment engine not ready after {0:?}")]
    NotReadyTimeout(Duration),
    /// The embedding provider failed on a single image
    #[error("Embedding error: {0}")]
    Embedding(String),
    /// Error occurred while loading or running the ONNX model
    #[error("Model error: {0}")]
    Model(String),
    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl AssessmentError {
    /// Only a warm-up timeout is worth retrying; every other error is either
    /// permanent or already folded into a negative result.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotReadyTimeout(_))
    }
}

impl From<OrtError> for AssessmentError {
    fn from(err: OrtError) -> Self {
        AssessmentError::Model(err.to_string())
    }
}

impl From<image::ImageError> for AssessmentError {
    fn from(err: image::ImageError) -> Self {
        AssessmentError::Input(format!("Failed to decode image: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_timeout_is_retryable() {
        assert!(AssessmentError::NotReadyTimeout(Duration::from_secs(1)).is_retryable());
        assert!(!AssessmentError::ProviderUnavailable("boom".into()).is_retryable());
        assert!(!AssessmentError::Input("empty".into()).is_retryable());
    }

    #[test]
    fn test_display_messages() {
        let err = AssessmentError::TemplateMissing("Q".into());
        assert_eq!(err.to_string(), "No templates for category 'Q'");
    }
}
