use crate::geometry::bearing::Bearing;
use crate::prelude::{DeviceId, GeometryConfig};
use serde::{Deserialize, Serialize};

/// Below this |cos θ| the bearing is treated as exactly perpendicular.
const VERTICAL_COSINE: f64 = 1e-12;
/// Tangents closer than this describe parallel lines of bearing.
const PARALLEL_TANGENT: f64 = 1e-9;

/// Source position in the units of the receiver square half-extents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

/// Why a round produced no coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum NoResultReason {
    IndeterminateBearing { pair: usize },
    MissingOffset { device_id: DeviceId },
    ParallelBearings,
    InsufficientPairs,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Position {
    Fix(Coordinate),
    NoResult(NoResultReason),
}

impl Position {
    pub fn coordinate(&self) -> Option<Coordinate> {
        match self {
            Position::Fix(coordinate) => Some(*coordinate),
            Position::NoResult(_) => None,
        }
    }
}

/// Intersects the bearings of two perpendicular receiver pairs mounted on a
/// square with half-extents `x`, `y`.
#[derive(Debug, Clone)]
pub struct PositionEstimator {
    half_extent_x: f64,
    half_extent_y: f64,
}

impl PositionEstimator {
    pub fn new(config: &GeometryConfig) -> Self {
        Self {
            half_extent_x: config.half_extent_x,
            half_extent_y: config.half_extent_y,
        }
    }

    pub fn estimate(&self, first: Bearing, second: Bearing) -> Position {
        let (Some(theta0), Some(theta1)) = (first.degrees(), second.degrees()) else {
            let pair = usize::from(!first.is_indeterminate());
            return Position::NoResult(NoResultReason::IndeterminateBearing { pair });
        };

        let (x, y) = match (tangent(theta0), tangent(theta1)) {
            (None, None) => return Position::NoResult(NoResultReason::ParallelBearings),
            // Limits of the closed form as one tangent grows without bound.
            (Some(tan0), None) => (0.0, -self.half_extent_y * tan0),
            (None, Some(tan1)) => (self.half_extent_x, self.half_extent_y * (1.0 + tan1)),
            (Some(tan0), Some(tan1)) => {
                let denominator = tan0 - tan1;
                if denominator.abs() < PARALLEL_TANGENT {
                    return Position::NoResult(NoResultReason::ParallelBearings);
                }
                (
                    self.half_extent_x * (tan0 + 1.0) / denominator,
                    self.half_extent_y * tan0 * (1.0 + tan1) / denominator,
                )
            }
        };

        if x.is_finite() && y.is_finite() {
            Position::Fix(Coordinate { x, y })
        } else {
            Position::NoResult(NoResultReason::ParallelBearings)
        }
    }
}

/// Tangent of an angle in degrees, `None` where it is undefined.
fn tangent(degrees: f64) -> Option<f64> {
    let radians = degrees.to_radians();
    if radians.cos().abs() < VERTICAL_COSINE {
        None
    } else {
        Some(radians.tan())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> PositionEstimator {
        PositionEstimator::new(&GeometryConfig::default())
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn indeterminate_bearing_yields_no_result() {
        assert_eq!(
            estimator().estimate(Bearing::Indeterminate, Bearing::Angle(45.0)),
            Position::NoResult(NoResultReason::IndeterminateBearing { pair: 0 })
        );
        assert_eq!(
            estimator().estimate(Bearing::Angle(45.0), Bearing::Indeterminate),
            Position::NoResult(NoResultReason::IndeterminateBearing { pair: 1 })
        );
    }

    #[test]
    fn equal_tangents_yield_no_result() {
        assert_eq!(
            estimator().estimate(Bearing::Angle(30.0), Bearing::Angle(30.0)),
            Position::NoResult(NoResultReason::ParallelBearings)
        );
        // tan repeats every 180 degrees
        assert_eq!(
            estimator().estimate(Bearing::Angle(10.0), Bearing::Angle(190.0)),
            Position::NoResult(NoResultReason::ParallelBearings)
        );
    }

    #[test]
    fn closed_form_matches_hand_computation() {
        let position = estimator().estimate(Bearing::Angle(45.0), Bearing::Angle(0.0));
        let coordinate = position.coordinate().unwrap();
        // tan0 = 1, tan1 = 0: x = 5 * 2 / 1, y = 5 * 1 * 1 / 1
        assert_close(coordinate.x, 10.0);
        assert_close(coordinate.y, 5.0);
    }

    #[test]
    fn perpendicular_second_bearing_uses_the_limit() {
        let position = estimator().estimate(Bearing::Angle(45.0), Bearing::Angle(90.0));
        let coordinate = position.coordinate().unwrap();
        assert_close(coordinate.x, 0.0);
        assert_close(coordinate.y, -5.0);
    }

    #[test]
    fn perpendicular_first_bearing_uses_the_limit() {
        let position = estimator().estimate(Bearing::Angle(90.0), Bearing::Angle(45.0));
        let coordinate = position.coordinate().unwrap();
        assert_close(coordinate.x, 5.0);
        assert_close(coordinate.y, 10.0);
    }

    #[test]
    fn both_perpendicular_is_parallel() {
        assert_eq!(
            estimator().estimate(Bearing::Angle(90.0), Bearing::Angle(90.0)),
            Position::NoResult(NoResultReason::ParallelBearings)
        );
    }

    #[test]
    fn outcome_serializes_with_tags() {
        let json = serde_json::to_value(Position::NoResult(NoResultReason::ParallelBearings))
            .unwrap();
        assert_eq!(json["outcome"], "no_result");
        assert_eq!(json["reason"], "parallel_bearings");
    }
}
