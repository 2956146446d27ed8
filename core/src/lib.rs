//! Synchronization and TDOA localization core for the acoustic source locator.
//!
//! Four time-skewed listening devices report the same pulse under a shared
//! sequence number. The core buffers each device's stream, releases a round
//! once every device has reported the same lowest sequence number, and turns
//! the round into one bearing per receiver pair and a 2-D source coordinate.

pub mod geometry;
pub mod locator;
pub mod offsets;
pub mod prelude;
pub mod sync;
pub mod telemetry;

pub use geometry::{Bearing, Coordinate, NoResultReason, Position};
pub use locator::{Locator, PairBearing, RoundOutcome};
pub use offsets::{ClockOffsetTable, OffsetLookup};
pub use prelude::{DetectionEvent, GeometryConfig, LocatorError, LocatorResult};
