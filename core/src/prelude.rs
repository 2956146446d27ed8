use serde::{Deserialize, Serialize};

/// Identifier reported by a listening device. Ids start at 1; the device's
/// position in the barrier is `device_id - 1`.
pub type DeviceId = u32;

/// Shared logical clock: the same pulse carries the same sequence number on
/// every device.
pub type SequenceNumber = i64;

/// Raw device clock units. Clock offsets use the same unit.
pub type Ticks = i64;

/// A single detection reported by one listening device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub device_id: DeviceId,
    pub sequence_number: SequenceNumber,
    pub timestamp: Ticks,
}

impl DetectionEvent {
    pub fn new(device_id: DeviceId, sequence_number: SequenceNumber, timestamp: Ticks) -> Self {
        Self {
            device_id,
            sequence_number,
            timestamp,
        }
    }
}

/// Fixed physical constants of a deployed receiver square.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Number of listening devices. Devices 2k+1 and 2k+2 form receiver pair k.
    pub device_count: usize,
    /// Metres per second.
    pub speed_of_sound: f64,
    /// Distance between the two receivers of a pair, in metres.
    pub receiver_spacing: f64,
    /// Largest corrected timestamp difference, in ticks, still treated as the
    /// same wavefront.
    pub threshold: Ticks,
    /// Timestamp ticks per second (1000 for millisecond clocks).
    pub ticks_per_second: f64,
    pub half_extent_x: f64,
    pub half_extent_y: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            device_count: 4,
            speed_of_sound: 330.0,
            receiver_spacing: 1.0,
            threshold: 3,
            ticks_per_second: 1000.0,
            half_extent_x: 5.0,
            half_extent_y: 5.0,
        }
    }
}

impl GeometryConfig {
    pub fn pair_count(&self) -> usize {
        self.device_count / 2
    }

    pub fn validate(&self) -> LocatorResult<()> {
        if self.device_count < 2 || self.device_count % 2 != 0 {
            return Err(LocatorError::InvalidConfig(format!(
                "device count must be even and at least 2, got {}",
                self.device_count
            )));
        }
        if DeviceId::try_from(self.device_count).is_err() {
            return Err(LocatorError::InvalidConfig(format!(
                "device count {} does not fit a device id",
                self.device_count
            )));
        }
        if self.threshold < 0 {
            return Err(LocatorError::InvalidConfig(format!(
                "threshold must not be negative, got {}",
                self.threshold
            )));
        }

        let constants = [
            ("speed_of_sound", self.speed_of_sound),
            ("receiver_spacing", self.receiver_spacing),
            ("ticks_per_second", self.ticks_per_second),
            ("half_extent_x", self.half_extent_x),
            ("half_extent_y", self.half_extent_y),
        ];
        for (name, value) in constants {
            if !value.is_finite() || value <= 0.0 {
                return Err(LocatorError::InvalidConfig(format!(
                    "{} must be positive and finite, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Common error type for the locator core.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "error", content = "detail", rename_all = "snake_case")]
pub enum LocatorError {
    #[error("buffer for device {device_id} is empty")]
    EmptyBuffer { device_id: DeviceId },
    #[error("round released while device buffers are not aligned")]
    BarrierNotAligned,
    #[error("no clock offset known for device {device_id}")]
    UnknownDeviceOffset { device_id: DeviceId },
    #[error("device {device_id} is outside the configured range 1..={device_count}")]
    UnknownDevice {
        device_id: DeviceId,
        device_count: usize,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("internal failure: {0}")]
    Internal(String),
}

pub type LocatorResult<T> = Result<T, LocatorError>;
