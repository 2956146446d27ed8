pub mod bearing;
pub mod position;

pub use bearing::{Bearing, BearingEstimator};
pub use position::{Coordinate, NoResultReason, Position, PositionEstimator};
