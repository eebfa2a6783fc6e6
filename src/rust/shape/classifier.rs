use image::GrayImage;
use log::{debug, info};

use super::extract::ContourExtractor;
use super::feedback;
use super::geometry::GeometryFeatures;
use super::matching::{match_distance, CorrectnessRule, Evidence};
use super::quality::{formation_label, formation_score, pressure_proxy, quality_metrics};
use super::{NormalizedContour, Shape};
use crate::classifier::{ClassificationResult, DecisionTrace, EvaluationMode, RuleId, SubScores};
use crate::config::ShapeConfig;

/// Judges a drawing against the canonical contour of the expected shape.
///
/// Stateless apart from its configuration; share it freely between threads.
#[derive(Debug, Clone)]
pub struct ShapeClassifier {
    config: ShapeConfig,
    extractor: ContourExtractor,
}

impl Default for ShapeClassifier {
    fn default() -> Self {
        Self::new(ShapeConfig::default())
    }
}

impl ShapeClassifier {
    pub fn new(config: ShapeConfig) -> Self {
        let extractor = ContourExtractor::from_config(&config);
        Self { config, extractor }
    }

    pub fn config(&self) -> &ShapeConfig {
        &self.config
    }

    pub fn extractor(&self) -> &ContourExtractor {
        &self.extractor
    }

    /// Extracts and normalises the dominant contour of a reference image.
    pub fn canonical_contour(&self, gray: &GrayImage) -> Option<NormalizedContour> {
        self.extractor.extract(gray).map(|e| e.contour.normalize())
    }

    /// `template` must already be normalised; it is used as is.
    pub fn classify(&self, gray: &GrayImage, shape: Shape, template: Option<&NormalizedContour>) -> ClassificationResult {
        let mode = EvaluationMode::Shape;

        let Some(extraction) = self.extractor.extract(gray) else {
            info!("Shape {}: no drawing detected", shape);
            return ClassificationResult::rejected(mode, RuleId::NoDrawingDetected, "canvas has no ink")
                .with_feedback(feedback::no_drawing(shape));
        };
        let Some(template) = template else {
            info!("Shape {}: no canonical template", shape);
            return ClassificationResult::rejected(
                mode,
                RuleId::ExpectedTemplateMissing,
                format!("no canonical contour for {}", shape),
            );
        };

        let user = extraction.contour.normalize();
        let geometry = GeometryFeatures::measure(&extraction.contour, extraction.enclosure);
        let evidence = Evidence::new(match_distance(&user, template), Some(geometry));
        let (distance, accuracy) = (evidence.distance, evidence.accuracy);
        debug!(
            "Shape {}: {} candidate contours (fallback: {}), {} points, distance {:.4}, accuracy {}, {:?}",
            shape,
            extraction.candidates,
            extraction.used_fallback,
            extraction.contour.len(),
            distance,
            accuracy,
            geometry
        );

        let verdict = CorrectnessRule::judge(shape, &evidence, &self.config);
        info!("Shape {}: {:?} ({})", shape, verdict.rule, verdict.detail);
        let decision_trace = DecisionTrace { mode, rule: verdict.rule, detail: verdict.detail };
        let match_distance = distance.is_finite().then_some(distance);

        if !verdict.accepted {
            let message = match &verdict.mismatch {
                Some(reason) => feedback::mismatch(shape, reason),
                None => feedback::not_matched(shape),
            };
            return ClassificationResult {
                predicted_label: None,
                confidence: accuracy,
                is_correct: false,
                sub_scores: None,
                quality: None,
                match_distance,
                feedback: Some(message),
                decision_trace,
            };
        }

        let formation = formation_score(&user, template);
        let sub_scores = SubScores {
            formation: Some((formation * 100.0) as f32),
            pressure: Some(pressure_proxy(gray)),
            quality_label: Some(formation_label(formation).to_string()),
        };

        let quality = quality_metrics(&extraction.contour, &extraction.mask);
        ClassificationResult {
            predicted_label: Some(shape.key().to_string()),
            confidence: accuracy,
            is_correct: true,
            sub_scores: Some(sub_scores),
            quality: Some(quality),
            match_distance,
            feedback: Some(feedback::accepted(shape, quality.overall)),
            decision_trace,
        }
    }
}
