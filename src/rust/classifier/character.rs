use std::cmp::Ordering;
use std::collections::HashSet;

use log::{debug, info, warn};
use ndarray::Array1;

use super::error::AssessmentError;
use super::result::{similarity_to_confidence, ClassificationResult, DecisionTrace, EvaluationMode, RuleId, SubScores};
use super::utils::max_similarity;
use crate::config::Thresholds;
use crate::templates::{Domain, TemplateStore};

/// One category's score against a drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCategory {
    pub key: String,
    pub score: f32,
}

/// Inputs every verification rule sees.
#[derive(Debug, Clone, Copy)]
pub struct CascadeInput<'a> {
    pub top_key: &'a str,
    pub top_score: f32,
    pub expected_key: &'a str,
    pub expected_score: f32,
    /// 0-based position of the expected category in the ranking
    pub expected_rank: usize,
}

/// A named reject rule of the digit verification cascade.
pub struct CascadeRule {
    pub id: RuleId,
    pub name: &'static str,
    pub rejects: fn(&CascadeInput<'_>, &Thresholds) -> bool,
}

fn expected_below_floor(input: &CascadeInput<'_>, t: &Thresholds) -> bool {
    input.expected_score < t.digit_floor
}

fn not_in_top_two(input: &CascadeInput<'_>, t: &Thresholds) -> bool {
    input.expected_rank >= 2 && input.top_score - input.expected_score > t.top_two_margin
}

fn outranked_by_margin(input: &CascadeInput<'_>, t: &Thresholds) -> bool {
    input.top_key != input.expected_key && input.top_score - input.expected_score > t.outrank_margin
}

/// Tried in order; the first rule that rejects decides. If none rejects, the drawing
/// is accepted.
pub const VERIFICATION_CASCADE: [CascadeRule; 3] = [
    CascadeRule {
        id: RuleId::ExpectedBelowFloor,
        name: "expected score below absolute floor",
        rejects: expected_below_floor,
    },
    CascadeRule {
        id: RuleId::NotInTopTwo,
        name: "expected outside top two by more than the top-two margin",
        rejects: not_in_top_two,
    },
    CascadeRule {
        id: RuleId::OutrankedByMargin,
        name: "another category ranks first by more than the outrank margin",
        rejects: outranked_by_margin,
    },
];

/// Decides whether a drawing's embedding matches its expected character or sentence.
///
/// Pure: the verdict depends only on the embedding, the store, the expected label and
/// the mode.
#[derive(Debug, Clone, Default)]
pub struct CharacterClassifier {
    thresholds: Thresholds,
}

fn is_valid_expectation(domain: Domain, expected: &str) -> bool {
    let mut chars = expected.chars();
    let single = match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    };
    match domain {
        Domain::Letter => single.is_some_and(|c| c.is_ascii_alphabetic()),
        Domain::Digit => single.is_some_and(|c| c.is_ascii_digit()),
        Domain::Sentence => !expected.trim().is_empty(),
        Domain::Shape => false,
    }
}

/// Category a label is matched against. Lowercase and uppercase drawings of a letter
/// share the uppercase category.
pub fn category_key(domain: Domain, label: &str) -> String {
    match domain {
        Domain::Letter => label.to_ascii_uppercase(),
        _ => label.to_string(),
    }
}

impl CharacterClassifier {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Acceptance threshold for the expected label `key`.
    ///
    /// A lowercase letter uses its own configured override, else the lowercase letter
    /// threshold. Every other label uses its category's override, else the default of
    /// its domain.
    pub fn threshold_for(&self, store: &TemplateStore, domain: Domain, key: &str) -> f32 {
        if domain == Domain::Letter && key.chars().all(|c| c.is_ascii_lowercase()) {
            return self.thresholds.category_overrides.get(key).copied().unwrap_or(self.thresholds.letter_lower);
        }
        let category = category_key(domain, key);
        if let Some(threshold) = store.get(domain, &category).and_then(|e| e.per_category_threshold) {
            return threshold;
        }
        if let Some(&threshold) = self.thresholds.category_overrides.get(&category) {
            return threshold;
        }
        match domain {
            Domain::Letter => self.thresholds.letter_upper,
            Domain::Digit => self.thresholds.digit_argmax,
            Domain::Sentence | Domain::Shape => self.thresholds.sentence,
        }
    }

    /// Scores every category of `domain` (maximum similarity over its references) and
    /// sorts descending, ties broken by ascending key. Letter keys are folded to
    /// uppercase first, keeping the better score.
    pub fn rank(embedding: &Array1<f32>, store: &TemplateStore, domain: Domain) -> Vec<RankedCategory> {
        let mut ranking: Vec<RankedCategory> = store
            .entries(domain)
            .filter_map(|entry| match max_similarity(embedding, &entry.reference_embeddings) {
                Some(score) => Some(RankedCategory { key: category_key(domain, &entry.category_key), score }),
                None => {
                    warn!("{} '{}' has no comparable references; excluded from ranking", domain, entry.category_key);
                    None
                }
            })
            .collect();
        ranking.sort_by(|a, b| match b.score.total_cmp(&a.score) {
            Ordering::Equal => a.key.cmp(&b.key),
            other => other,
        });
        let mut seen = HashSet::new();
        ranking.retain(|r| seen.insert(r.key.clone()));
        ranking
    }

    pub fn classify(
        &self,
        embedding: &Array1<f32>,
        store: &TemplateStore,
        expected: &str,
        mode: EvaluationMode,
    ) -> ClassificationResult {
        let domain = mode.domain();
        if !is_valid_expectation(domain, expected) {
            return ClassificationResult::rejected(
                mode,
                RuleId::InvalidExpectation,
                format!("'{}' is not a valid {} label for {} mode", expected, domain, mode),
            );
        }

        let result = match mode {
            EvaluationMode::Alphabet | EvaluationMode::DigitArgmax => self.argmax(embedding, store, expected, mode),
            EvaluationMode::DigitVerify => self.verify(embedding, store, expected),
            EvaluationMode::Sentence => self.single_template(embedding, store, expected),
            EvaluationMode::Shape => ClassificationResult::rejected(
                mode,
                RuleId::InvalidExpectation,
                "shape drawings are judged by geometry, not embeddings",
            ),
        };
        info!(
            "{} '{}': {:?} -> correct={} ({})",
            mode, expected, result.decision_trace.rule, result.is_correct, result.decision_trace.detail
        );
        result
    }

    fn ranked_or_reject(
        embedding: &Array1<f32>,
        store: &TemplateStore,
        mode: EvaluationMode,
    ) -> Result<Vec<RankedCategory>, ClassificationResult> {
        let domain = mode.domain();
        let ranking = Self::rank(embedding, store, domain);
        if ranking.is_empty() {
            return Err(ClassificationResult::rejected(
                mode,
                RuleId::NoUsableTemplates,
                format!("no usable {} templates", domain),
            ));
        }
        debug!(
            "{} ranking: {}",
            mode,
            ranking.iter().map(|r| format!("{}={:.4}", r.key, r.score)).collect::<Vec<_>>().join(", ")
        );
        Ok(ranking)
    }

    fn argmax(&self, embedding: &Array1<f32>, store: &TemplateStore, expected: &str, mode: EvaluationMode) -> ClassificationResult {
        let ranking = match Self::ranked_or_reject(embedding, store, mode) {
            Ok(ranking) => ranking,
            Err(rejected) => return rejected,
        };
        let category = category_key(mode.domain(), expected);
        if !ranking.iter().any(|r| r.key == category) {
            warn!("No templates for expected {} '{}'", mode.domain(), category);
        }

        let top = &ranking[0];
        let threshold = self.threshold_for(store, mode.domain(), expected);
        let (is_correct, rule) = if top.key != category {
            (false, RuleId::ArgmaxWrongCategory)
        } else if top.score >= threshold {
            (true, RuleId::ArgmaxAccepted)
        } else {
            (false, RuleId::ArgmaxBelowThreshold)
        };

        ClassificationResult {
            predicted_label: Some(top.key.clone()),
            confidence: similarity_to_confidence(top.score),
            is_correct,
            sub_scores: None,
            quality: None,
            match_distance: None,
            feedback: None,
            decision_trace: DecisionTrace {
                mode,
                rule,
                detail: format!("top '{}' at {:.4}, threshold {:.2}", top.key, top.score, threshold),
            },
        }
    }

    fn verify(&self, embedding: &Array1<f32>, store: &TemplateStore, expected: &str) -> ClassificationResult {
        let mode = EvaluationMode::DigitVerify;
        let ranking = match Self::ranked_or_reject(embedding, store, mode) {
            Ok(ranking) => ranking,
            Err(rejected) => return rejected,
        };
        let Some(expected_rank) = ranking.iter().position(|r| r.key == expected) else {
            return ClassificationResult::rejected(
                mode,
                RuleId::ExpectedTemplateMissing,
                AssessmentError::TemplateMissing(expected.to_string()).to_string(),
            );
        };

        let top = &ranking[0];
        let input = CascadeInput {
            top_key: &top.key,
            top_score: top.score,
            expected_key: expected,
            expected_score: ranking[expected_rank].score,
            expected_rank,
        };
        let detail = format!(
            "expected '{}' at {:.4} (rank {}), top '{}' at {:.4}",
            expected,
            input.expected_score,
            expected_rank + 1,
            top.key,
            top.score
        );
        let confidence = similarity_to_confidence(input.expected_score);

        if let Some(rule) = VERIFICATION_CASCADE.iter().find(|rule| (rule.rejects)(&input, &self.thresholds)) {
            return ClassificationResult {
                predicted_label: Some(top.key.clone()),
                confidence,
                is_correct: false,
                sub_scores: None,
                quality: None,
                match_distance: None,
                feedback: None,
                decision_trace: DecisionTrace { mode, rule: rule.id, detail: format!("{}: {}", rule.name, detail) },
            };
        }

        ClassificationResult {
            predicted_label: Some(expected.to_string()),
            confidence,
            is_correct: true,
            sub_scores: Some(SubScores { formation: Some(confidence), ..SubScores::default() }),
            quality: None,
            match_distance: None,
            feedback: None,
            decision_trace: DecisionTrace { mode, rule: RuleId::VerificationAccepted, detail },
        }
    }

    fn single_template(&self, embedding: &Array1<f32>, store: &TemplateStore, expected: &str) -> ClassificationResult {
        let mode = EvaluationMode::Sentence;
        let Some(entry) = store.get(Domain::Sentence, expected) else {
            return ClassificationResult::rejected(
                mode,
                RuleId::ExpectedTemplateMissing,
                AssessmentError::TemplateMissing(expected.to_string()).to_string(),
            );
        };
        let Some(similarity) = max_similarity(embedding, &entry.reference_embeddings) else {
            return ClassificationResult::rejected(
                mode,
                RuleId::NoUsableTemplates,
                format!("no comparable references for sentence '{}'", expected),
            );
        };

        let threshold = entry.per_category_threshold.unwrap_or(self.thresholds.sentence);
        let is_correct = similarity >= threshold;
        ClassificationResult {
            predicted_label: is_correct.then(|| expected.to_string()),
            confidence: similarity_to_confidence(similarity),
            is_correct,
            sub_scores: None,
            quality: None,
            match_distance: None,
            feedback: None,
            decision_trace: DecisionTrace {
                mode,
                rule: if is_correct { RuleId::SentenceAccepted } else { RuleId::SentenceBelowThreshold },
                detail: format!("similarity {:.4}, threshold {:.2}", similarity, threshold),
            },
        }
    }
}
