use crate::offsets::OffsetLookup;
use crate::prelude::{DetectionEvent, GeometryConfig, LocatorError, LocatorResult, Ticks};
use serde::{Deserialize, Serialize};

/// Angle of arrival for one receiver pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "degrees", rename_all = "snake_case")]
pub enum Bearing {
    Angle(f64),
    /// Pair timing does not fit the receiver geometry.
    Indeterminate,
}

impl Bearing {
    pub fn degrees(&self) -> Option<f64> {
        match self {
            Bearing::Angle(degrees) => Some(*degrees),
            Bearing::Indeterminate => None,
        }
    }

    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Bearing::Indeterminate)
    }
}

/// TDOA bearing for a receiver pair.
#[derive(Debug, Clone)]
pub struct BearingEstimator {
    speed_of_sound: f64,
    receiver_spacing: f64,
    threshold: Ticks,
    ticks_per_second: f64,
}

impl BearingEstimator {
    pub fn new(config: &GeometryConfig) -> Self {
        Self {
            speed_of_sound: config.speed_of_sound,
            receiver_spacing: config.receiver_spacing,
            threshold: config.threshold,
            ticks_per_second: config.ticks_per_second,
        }
    }

    pub fn estimate(
        &self,
        first: &DetectionEvent,
        second: &DetectionEvent,
        offsets: &dyn OffsetLookup,
    ) -> LocatorResult<Bearing> {
        let corrected_first = Self::corrected(first, offsets)?;
        let corrected_second = Self::corrected(second, offsets)?;
        let diff = corrected_first.abs_diff(corrected_second);

        if diff > self.threshold.unsigned_abs() {
            return Ok(Bearing::Indeterminate);
        }

        let cosine =
            diff as f64 * self.speed_of_sound / (self.receiver_spacing * self.ticks_per_second);
        if !(-1.0..=1.0).contains(&cosine) {
            return Ok(Bearing::Indeterminate);
        }
        Ok(Bearing::Angle(cosine.acos().to_degrees()))
    }

    fn corrected(event: &DetectionEvent, offsets: &dyn OffsetLookup) -> LocatorResult<Ticks> {
        let offset = offsets
            .lookup(event.device_id)
            .ok_or(LocatorError::UnknownDeviceOffset {
                device_id: event.device_id,
            })?;
        Ok(event.timestamp.saturating_add(offset))
    }
}
