use std::fmt;

use serde::Serialize;

use super::contour::ContourShape;
use super::Shape;

/// Polygon tolerance used to count corners, as a fraction of the perimeter.
pub const CORNER_EPSILON: f64 = 0.02;
/// Hole-to-outline area ratio above which a drawing counts as a closed loop.
pub const MIN_ENCLOSURE: f64 = 0.15;
/// Largest endpoint gap over perimeter for a closed outline.
pub const MAX_CLOSURE_GAP: f64 = 0.10;

const MIN_CIRCLE_CIRCULARITY: f64 = 0.80;
const MIN_CIRCLE_CORNERS: usize = 6;
const MAX_TRIANGLE_CIRCULARITY: f64 = 0.72;
const MIN_SQUARE_CIRCULARITY: f64 = 0.68;
const MAX_SQUARE_ASPECT: f64 = 1.5;
const MIN_LINE_ELONGATION: f64 = 5.0;
const MAX_CURVE_ELONGATION: f64 = 12.0;
const MIN_ZIGZAG_CORNERS: usize = 5;

/// Template-free measurements of the dominant contour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeometryFeatures {
    pub circularity: f64,
    /// Corners of the polygon approximation at [`CORNER_EPSILON`]
    pub corners: usize,
    pub aspect_ratio: f64,
    pub elongation: f64,
    /// Largest enclosed hole over the outline area
    pub enclosure: f64,
    pub closure: f64,
}

impl GeometryFeatures {
    pub fn measure(contour: &ContourShape, enclosure: f64) -> Self {
        Self {
            circularity: contour.circularity(),
            corners: contour.simplified_vertex_count(CORNER_EPSILON),
            aspect_ratio: contour.aspect_ratio(),
            elongation: contour.elongation(),
            enclosure,
            closure: contour.closure(),
        }
    }

    pub fn is_closed_loop(&self) -> bool {
        self.enclosure >= MIN_ENCLOSURE && self.closure <= MAX_CLOSURE_GAP
    }

    /// The first reason the drawing cannot be `shape`, if any.
    pub fn check(&self, shape: Shape) -> Option<Mismatch> {
        if shape.is_closed() && !self.is_closed_loop() {
            return Some(Mismatch::NotClosed);
        }
        match shape {
            Shape::Circles => {
                if self.corners < MIN_CIRCLE_CORNERS {
                    Some(Mismatch::HasCorners { found: self.corners })
                } else if self.circularity < MIN_CIRCLE_CIRCULARITY {
                    Some(Mismatch::NotRound { circularity: self.circularity })
                } else {
                    None
                }
            }
            Shape::Square => {
                if !(4..=5).contains(&self.corners) {
                    Some(Mismatch::CornerCount { expected: 4, found: self.corners })
                } else if self.circularity < MIN_SQUARE_CIRCULARITY {
                    Some(Mismatch::CornerAngles { expected: 4, circularity: self.circularity })
                } else if self.aspect_ratio > MAX_SQUARE_ASPECT {
                    Some(Mismatch::UnevenSides { aspect_ratio: self.aspect_ratio })
                } else {
                    None
                }
            }
            Shape::Triangle => {
                if !(3..=4).contains(&self.corners) {
                    Some(Mismatch::CornerCount { expected: 3, found: self.corners })
                } else if self.circularity > MAX_TRIANGLE_CIRCULARITY {
                    Some(Mismatch::CornerAngles { expected: 3, circularity: self.circularity })
                } else {
                    None
                }
            }
            Shape::Lines => {
                (self.elongation < MIN_LINE_ELONGATION).then_some(Mismatch::NotStraight { elongation: self.elongation })
            }
            Shape::Curves => {
                if self.enclosure >= MIN_ENCLOSURE {
                    Some(Mismatch::Enclosed)
                } else if self.elongation > MAX_CURVE_ELONGATION {
                    Some(Mismatch::TooStraight { elongation: self.elongation })
                } else {
                    None
                }
            }
            Shape::Zigzag => {
                if self.enclosure >= MIN_ENCLOSURE {
                    Some(Mismatch::Enclosed)
                } else if self.corners < MIN_ZIGZAG_CORNERS {
                    Some(Mismatch::TooFewTurns { found: self.corners })
                } else {
                    None
                }
            }
        }
    }
}

/// Why a drawing cannot be the expected shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mismatch {
    /// A closed shape drawn as an open stroke
    NotClosed,
    /// An open stroke drawn as a loop
    Enclosed,
    HasCorners { found: usize },
    NotRound { circularity: f64 },
    CornerCount { expected: usize, found: usize },
    /// Right number of corners, but too sharp or too blunt for the shape
    CornerAngles { expected: usize, circularity: f64 },
    UnevenSides { aspect_ratio: f64 },
    NotStraight { elongation: f64 },
    TooStraight { elongation: f64 },
    TooFewTurns { found: usize },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotClosed => write!(f, "outline does not enclose an area"),
            Self::Enclosed => write!(f, "stroke encloses an area"),
            Self::HasCorners { found } => write!(f, "{} corners, expected a smooth outline", found),
            Self::NotRound { circularity } => write!(f, "circularity {:.2}", circularity),
            Self::CornerCount { expected, found } => write!(f, "{} corners, expected {}", found, expected),
            Self::CornerAngles { expected, circularity } => {
                write!(f, "circularity {:.2} does not fit {} corners", circularity, expected)
            }
            Self::UnevenSides { aspect_ratio } => write!(f, "aspect ratio {:.2}", aspect_ratio),
            Self::NotStraight { elongation } => write!(f, "elongation {:.2}, too bent for a line", elongation),
            Self::TooStraight { elongation } => write!(f, "elongation {:.2}, too straight for a curve", elongation),
            Self::TooFewTurns { found } => write!(f, "{} corners, too few turns for a zigzag", found),
        }
    }
}
