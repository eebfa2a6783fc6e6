use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::error::AssessmentError;
use crate::templates::Domain;

/// How a drawing should be judged against its expected label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvaluationMode {
    /// Argmax over every letter category
    Alphabet,
    /// Argmax over every digit category
    DigitArgmax,
    /// Verification cascade over the digit ranking
    DigitVerify,
    /// Threshold against the expected sentence's own references
    Sentence,
    /// Contour geometry against the canonical shape
    Shape,
}

impl EvaluationMode {
    /// The template domain this mode draws its categories from.
    pub fn domain(self) -> Domain {
        match self {
            Self::Alphabet => Domain::Letter,
            Self::DigitArgmax | Self::DigitVerify => Domain::Digit,
            Self::Sentence => Domain::Sentence,
            Self::Shape => Domain::Shape,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alphabet => "alphabet",
            Self::DigitArgmax => "digit-argmax",
            Self::DigitVerify => "digit-verify",
            Self::Sentence => "sentence",
            Self::Shape => "shape",
        }
    }
}

impl fmt::Display for EvaluationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvaluationMode {
    type Err = AssessmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "alphabet" | "letter" => Ok(Self::Alphabet),
            "digit-argmax" | "number-argmax" => Ok(Self::DigitArgmax),
            "digit-verify" | "digit" | "number" => Ok(Self::DigitVerify),
            "sentence" => Ok(Self::Sentence),
            "shape" | "prewriting" => Ok(Self::Shape),
            other => Err(AssessmentError::Input(format!("Unknown evaluation mode '{}'", other))),
        }
    }
}

/// Identifies the rule that produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    DecodeFailed,
    InvalidExpectation,
    NoUsableTemplates,
    EmbeddingFailed,
    ExpectedTemplateMissing,
    // argmax
    ArgmaxAccepted,
    ArgmaxWrongCategory,
    ArgmaxBelowThreshold,
    // verification cascade
    ExpectedBelowFloor,
    NotInTopTwo,
    OutrankedByMargin,
    VerificationAccepted,
    // single template
    SentenceAccepted,
    SentenceBelowThreshold,
    // shape
    NoDrawingDetected,
    StrokeDistanceWithinLimit,
    StrokeDistanceExceeded,
    ClosedAccuracyAccepted,
    ClosedAccuracyRejected,
    GeometryMismatch,
}

/// Which rule fired and why. Kept for tests and logs; callers need not inspect it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionTrace {
    pub mode: EvaluationMode,
    pub rule: RuleId,
    pub detail: String,
}

/// Per-request feedback beyond the verdict itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubScores {
    /// Formation quality, 0-100
    pub formation: Option<f32>,
    /// Pressure proxy, 0-100
    pub pressure: Option<f32>,
    /// "Good" or "Fair"
    pub quality_label: Option<String>,
}

/// Motor-skill quality of an accepted shape drawing. All values are 0-100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct QualityMetrics {
    pub smoothness: f32,
    pub size_consistency: f32,
    pub pressure_consistency: f32,
    pub overall: f32,
}

impl QualityMetrics {
    pub fn new(smoothness: f32, size_consistency: f32, pressure_consistency: f32) -> Self {
        let overall = (smoothness + size_consistency + pressure_consistency) / 3.0;
        Self {
            smoothness: clamp_score(smoothness),
            size_consistency: clamp_score(size_consistency),
            pressure_consistency: clamp_score(pressure_consistency),
            overall: clamp_score(overall),
        }
    }
}

/// The outcome of one assessment. Built once and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub predicted_label: Option<String>,
    /// 0-100
    pub confidence: f32,
    pub is_correct: bool,
    pub sub_scores: Option<SubScores>,
    pub quality: Option<QualityMetrics>,
    /// Raw shape distance, present for shape assessments that reached matching
    pub match_distance: Option<f64>,
    /// Message for the child, set by shape assessments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    pub decision_trace: DecisionTrace,
}

impl ClassificationResult {
    /// A negative result carrying nothing but the reason.
    pub fn rejected(mode: EvaluationMode, rule: RuleId, detail: impl Into<String>) -> Self {
        Self {
            predicted_label: None,
            confidence: 0.0,
            is_correct: false,
            sub_scores: None,
            quality: None,
            match_distance: None,
            feedback: None,
            decision_trace: DecisionTrace { mode, rule, detail: detail.into() },
        }
    }

    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Some(feedback.into());
        self
    }

    pub fn rule(&self) -> RuleId {
        self.decision_trace.rule
    }
}

/// Converts a similarity in [-1, 1] into a 0-100 confidence.
pub(crate) fn similarity_to_confidence(similarity: f32) -> f32 {
    clamp_score(similarity * 100.0)
}

pub(crate) fn clamp_score(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("alphabet".parse::<EvaluationMode>().unwrap(), EvaluationMode::Alphabet);
        assert_eq!("Digit-Verify".parse::<EvaluationMode>().unwrap(), EvaluationMode::DigitVerify);
        assert_eq!("number".parse::<EvaluationMode>().unwrap(), EvaluationMode::DigitVerify);
        assert!("cursive".parse::<EvaluationMode>().is_err());
    }

    #[test]
    fn test_quality_overall_is_mean() {
        let q = QualityMetrics::new(90.0, 60.0, 30.0);
        assert_eq!(q.overall, 60.0);
    }

    #[test]
    fn test_confidence_clamped() {
        assert_eq!(similarity_to_confidence(1.2), 100.0);
        assert_eq!(similarity_to_confidence(-0.3), 0.0);
        assert_eq!(similarity_to_confidence(f32::NAN), 0.0);
    }
}
