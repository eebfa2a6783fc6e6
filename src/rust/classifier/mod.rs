mod character;
mod error;
mod result;
pub(crate) mod utils;

pub use character::{category_key, CascadeInput, CascadeRule, CharacterClassifier, RankedCategory, VERIFICATION_CASCADE};
pub use error::AssessmentError;
pub use result::{ClassificationResult, DecisionTrace, EvaluationMode, QualityMetrics, RuleId, SubScores};
