use super::contour::NormalizedContour;
use super::geometry::{GeometryFeatures, Mismatch};
use super::Shape;
use crate::classifier::RuleId;
use crate::config::ShapeConfig;

/// Hu invariants smaller than this are ignored by the distance.
const HU_EPSILON: f64 = 1e-5;

/// Log-scaled Hu-moment distance between two contours (sum over the invariants of
/// `|1/mA − 1/mB|`, with `m = sign(h)·log10|h|`).
///
/// Invariant to translation, scale and rotation. A contour that encloses no area has no
/// moments, so its distance to anything is `+∞`.
pub fn match_distance(a: &NormalizedContour, b: &NormalizedContour) -> f64 {
    let (Some(ha), Some(hb)) = (a.hu_moments(), b.hu_moments()) else {
        return f64::INFINITY;
    };

    let mut total = 0.0;
    for (&x, &y) in ha.iter().zip(hb.iter()) {
        let (ax, ay) = (x.abs(), y.abs());
        if ax > HU_EPSILON && ay > HU_EPSILON {
            let mx = x.signum() * ax.log10();
            let my = y.signum() * ay.log10();
            total += (1.0 / mx - 1.0 / my).abs();
        }
    }
    if total.is_nan() {
        return f64::INFINITY;
    }
    total
}

/// Step mapping from match distance to a 0-100 accuracy. Non-increasing in the distance.
pub fn accuracy_from_distance(distance: f64) -> f32 {
    const STEPS: [(f64, f32); 4] = [(0.10, 90.0), (0.20, 80.0), (0.30, 70.0), (0.40, 60.0)];
    STEPS
        .iter()
        .find(|(limit, _)| distance <= *limit)
        .map(|&(_, accuracy)| accuracy)
        .unwrap_or(40.0)
}

/// What the correctness rules see of one drawing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evidence {
    pub distance: f64,
    pub accuracy: f32,
    pub geometry: Option<GeometryFeatures>,
}

impl Evidence {
    pub fn new(distance: f64, geometry: Option<GeometryFeatures>) -> Self {
        Self { distance, accuracy: accuracy_from_distance(distance), geometry }
    }
}

/// Outcome of one correctness rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub accepted: bool,
    pub rule: RuleId,
    pub detail: String,
    /// Set when the geometry rule rejected the drawing
    pub mismatch: Option<Mismatch>,
}

impl Verdict {
    fn new(accepted: bool, rule: RuleId, detail: String) -> Self {
        Self { accepted, rule, detail, mismatch: None }
    }
}

/// Correctness rules for shapes, tried in order; the first that applies decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectnessRule {
    /// Rejects drawings whose plain geometry rules out the expected shape. Never accepts.
    Geometry,
    /// Open strokes with a tuned limit are judged on the raw distance.
    StrokeDistance,
    /// Everything else is judged on the mapped accuracy.
    Accuracy,
}

impl CorrectnessRule {
    pub const ORDER: [CorrectnessRule; 3] =
        [CorrectnessRule::Geometry, CorrectnessRule::StrokeDistance, CorrectnessRule::Accuracy];

    pub fn name(self) -> &'static str {
        match self {
            Self::Geometry => "geometry",
            Self::StrokeDistance => "stroke-distance",
            Self::Accuracy => "accuracy",
        }
    }

    /// Returns `None` when the rule does not apply to `shape`.
    pub fn evaluate(self, shape: Shape, evidence: &Evidence, config: &ShapeConfig) -> Option<Verdict> {
        match self {
            Self::Geometry => {
                if !config.geometry_gate {
                    return None;
                }
                let mismatch = evidence.geometry?.check(shape)?;
                Some(Verdict {
                    accepted: false,
                    rule: RuleId::GeometryMismatch,
                    detail: format!("not a plausible {}: {}", shape, mismatch),
                    mismatch: Some(mismatch),
                })
            }
            Self::StrokeDistance => {
                if shape.is_closed() {
                    return None;
                }
                let limit = config.stroke_distance_limit(shape)?;
                let accepted = evidence.distance <= limit;
                Some(Verdict::new(
                    accepted,
                    if accepted { RuleId::StrokeDistanceWithinLimit } else { RuleId::StrokeDistanceExceeded },
                    format!("{} distance {:.4} vs limit {:.2}", shape, evidence.distance, limit),
                ))
            }
            Self::Accuracy => {
                let threshold = config.closed_accuracy_threshold;
                let accepted = evidence.accuracy >= threshold;
                Some(Verdict::new(
                    accepted,
                    if accepted { RuleId::ClosedAccuracyAccepted } else { RuleId::ClosedAccuracyRejected },
                    format!("{} accuracy {:.0} vs threshold {:.0}", shape, evidence.accuracy, threshold),
                ))
            }
        }
    }

    pub fn judge(shape: Shape, evidence: &Evidence, config: &ShapeConfig) -> Verdict {
        Self::ORDER
            .iter()
            .find_map(|rule| rule.evaluate(shape, evidence, config))
            .unwrap_or_else(|| {
                Verdict::new(false, RuleId::ClosedAccuracyRejected, format!("no correctness rule applies to {}", shape))
            })
    }
}
