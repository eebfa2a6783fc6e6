//! Contour geometry: extraction from a canvas, a geometric plausibility gate,
//! shape-invariant matching against a canonical template and motor-skill quality scoring.

mod classifier;
mod contour;
mod extract;
pub mod feedback;
mod geometry;
mod matching;
mod quality;
mod raster;
pub mod render;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::classifier::AssessmentError;

pub use classifier::ShapeClassifier;
pub use contour::{ContourShape, Moments, NormalizedContour, Point};
pub use extract::{extract_contours, extract_outlines, ContourExtractor, Extraction, Outline};
pub use geometry::{GeometryFeatures, Mismatch};
pub use matching::{accuracy_from_distance, match_distance, CorrectnessRule, Evidence, Verdict};
pub use quality::{formation_score, pressure_proxy, quality_metrics};

/// The pre-writing shapes a child is asked to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Shape {
    Lines,
    Curves,
    Circles,
    Triangle,
    Square,
    Zigzag,
}

impl Shape {
    pub const ALL: [Shape; 6] = [
        Shape::Lines,
        Shape::Curves,
        Shape::Circles,
        Shape::Triangle,
        Shape::Square,
        Shape::Zigzag,
    ];

    /// The category key used by the template store.
    pub fn key(self) -> &'static str {
        match self {
            Shape::Lines => "LINES",
            Shape::Curves => "CURVES",
            Shape::Circles => "CIRCLES",
            Shape::Triangle => "TRIANGLE",
            Shape::Square => "SQUARE",
            Shape::Zigzag => "ZIGZAG",
        }
    }

    /// Closed shapes are judged by accuracy, open strokes by raw distance.
    pub fn is_closed(self) -> bool {
        matches!(self, Shape::Circles | Shape::Triangle | Shape::Square)
    }

    /// File name of the canonical reference inside `shapes/`.
    pub fn template_file_name(self) -> String {
        format!("{}_canonical.png", self.key().to_ascii_lowercase())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Shape {
    type Err = AssessmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        match upper.as_str() {
            "LINES" | "LINE" => Ok(Shape::Lines),
            "CURVES" | "CURVE" => Ok(Shape::Curves),
            "CIRCLES" | "CIRCLE" => Ok(Shape::Circles),
            "TRIANGLE" | "TRIANGLES" => Ok(Shape::Triangle),
            "SQUARE" | "SQUARES" => Ok(Shape::Square),
            "ZIGZAG" | "ZIGZAGS" => Ok(Shape::Zigzag),
            _ => Err(AssessmentError::Input(format!("Unknown shape '{}'", s))),
        }
    }
}
