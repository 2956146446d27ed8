use crate::locator::RoundOutcome;
use crate::prelude::LocatorError;
use log::{debug, info, warn};

/// Writes one log line per released round.
pub struct RoundLog;

impl RoundLog {
    pub fn new() -> Self {
        Self
    }

    pub fn record(&self, outcome: &RoundOutcome) {
        for pair in &outcome.bearings {
            if let Err(LocatorError::UnknownDeviceOffset { device_id }) = &pair.bearing {
                warn!(
                    "round {} pair {}: no clock offset for device {}",
                    outcome.sequence_number, pair.pair, device_id
                );
            }
        }

        let line = serde_json::to_string(outcome).unwrap_or_else(|err| err.to_string());
        match outcome.position.coordinate() {
            Some(coordinate) => info!(
                "round {} fix x={:.3} y={:.3} {}",
                outcome.sequence_number, coordinate.x, coordinate.y, line
            ),
            None => debug!("round {} unresolved {}", outcome.sequence_number, line),
        }
    }
}

impl Default for RoundLog {
    fn default() -> Self {
        Self::new()
    }
}
