//! Short encouraging messages shown to the child next to a shape verdict.

use super::geometry::Mismatch;
use super::Shape;

fn noun(shape: Shape) -> &'static str {
    match shape {
        Shape::Lines => "line",
        Shape::Curves => "curve",
        Shape::Circles => "circle",
        Shape::Triangle => "triangle",
        Shape::Square => "square",
        Shape::Zigzag => "zigzag",
    }
}

pub fn no_drawing(shape: Shape) -> String {
    format!("I can't see a drawing yet. Try drawing a {}!", noun(shape))
}

pub fn mismatch(shape: Shape, reason: &Mismatch) -> String {
    let name = noun(shape);
    match reason {
        Mismatch::NotClosed => format!("Almost! Join the ends so your {} is closed all the way around.", name),
        Mismatch::Enclosed => format!("A {} doesn't join up at the ends. Try leaving it open.", name),
        Mismatch::HasCorners { .. } | Mismatch::NotRound { .. } => {
            "Nice try! Make your circle nice and round, with no corners.".to_string()
        }
        Mismatch::CornerCount { expected, .. } | Mismatch::CornerAngles { expected, .. } => {
            format!("A {} has {} corners. Can you draw it with {} pointy corners?", name, expected, expected)
        }
        Mismatch::UnevenSides { .. } => "Good corners! Try to make all four sides the same length.".to_string(),
        Mismatch::NotStraight { .. } => "Try to keep your line nice and straight.".to_string(),
        Mismatch::TooStraight { .. } => "That looks very straight. Let your curve bend gently.".to_string(),
        Mismatch::TooFewTurns { .. } => "A zigzag goes up and down lots of times. Add more points!".to_string(),
    }
}

/// The drawing has the right geometry but does not match the template closely enough.
pub fn not_matched(shape: Shape) -> String {
    format!("That doesn't quite look like a {} yet. Have another go!", noun(shape))
}

/// Praise for an accepted drawing, graded by its overall quality score.
pub fn accepted(shape: Shape, overall_quality: f32) -> String {
    let name = noun(shape);
    if overall_quality >= 80.0 {
        format!("Great job! Your {} looks wonderful!", name)
    } else if overall_quality >= 60.0 {
        format!("Well done, that's a {}! Keep practising to make it even neater.", name)
    } else {
        format!("You drew a {}! Try drawing it slowly with a steady hand.", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_shape() {
        assert!(no_drawing(Shape::Zigzag).contains("zigzag"));
        assert!(not_matched(Shape::Curves).contains("curve"));
        assert!(mismatch(Shape::Square, &Mismatch::CornerCount { expected: 4, found: 8 }).contains("4 corners"));
    }

    #[test]
    fn test_praise_is_graded() {
        assert!(accepted(Shape::Circles, 90.0).starts_with("Great job"));
        assert!(accepted(Shape::Circles, 65.0).starts_with("Well done"));
        assert!(accepted(Shape::Circles, 30.0).starts_with("You drew"));
    }
}
