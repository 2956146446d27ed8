use anyhow::{ensure, Context};
use locatorcore::prelude::{DetectionEvent, DeviceId, GeometryConfig, SequenceNumber, Ticks};
use locatorcore::OffsetLookup;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Synthetic pulse train heard by every device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub rounds: usize,
    /// True bearing of the source for each receiver pair, in degrees.
    pub bearings_deg: Vec<f64>,
    /// True emission time of the first pulse, in ticks.
    pub start: Ticks,
    /// Ticks between consecutive pulses.
    pub interval: Ticks,
    /// Uniform timestamp noise in ticks, applied to every detection.
    pub jitter: Ticks,
    pub seed: u64,
    /// Device that never reports.
    pub silent_device: Option<DeviceId>,
    /// Deliver each device's detections in random order.
    pub shuffle: bool,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            rounds: 16,
            bearings_deg: vec![60.0, 75.0],
            start: 1_000_000,
            interval: 500,
            jitter: 0,
            seed: 0,
            silent_device: None,
            shuffle: true,
        }
    }
}

/// Delay in ticks between the two receivers of a pair for a source at
/// `bearing_deg`.
fn pair_delay(geometry: &GeometryConfig, bearing_deg: f64) -> Ticks {
    let seconds = geometry.receiver_spacing * bearing_deg.to_radians().cos() / geometry.speed_of_sound;
    (seconds * geometry.ticks_per_second).round() as Ticks
}

/// Builds each device's detection stream in delivery order. Index `i` holds
/// device `i + 1`. Local timestamps carry the device's clock skew, so adding
/// the published offset recovers the true arrival time.
pub fn build_device_streams(
    geometry: &GeometryConfig,
    offsets: &dyn OffsetLookup,
    scenario: &ScenarioConfig,
) -> anyhow::Result<Vec<Vec<DetectionEvent>>> {
    geometry.validate().context("validating scenario geometry")?;
    ensure!(
        scenario.bearings_deg.len() >= geometry.pair_count(),
        "scenario lists {} bearings for {} receiver pairs",
        scenario.bearings_deg.len(),
        geometry.pair_count()
    );
    ensure!(scenario.jitter >= 0, "jitter must not be negative");

    let mut rng = StdRng::seed_from_u64(scenario.seed);
    let mut streams = Vec::with_capacity(geometry.device_count);

    for position in 0..geometry.device_count {
        let device_id = DeviceId::try_from(position + 1).context("device id overflow")?;
        if scenario.silent_device == Some(device_id) {
            streams.push(Vec::new());
            continue;
        }

        let skew = offsets.lookup(device_id).unwrap_or(0);
        let delay = if position % 2 == 1 {
            pair_delay(geometry, scenario.bearings_deg[position / 2])
        } else {
            0
        };

        let mut stream = Vec::with_capacity(scenario.rounds);
        for round in 0..scenario.rounds {
            let sequence_number =
                SequenceNumber::try_from(round + 1).context("sequence number overflow")?;
            let emitted = scenario.start + scenario.interval * (round as Ticks);
            let noise = if scenario.jitter > 0 {
                rng.gen_range(-scenario.jitter..=scenario.jitter)
            } else {
                0
            };
            let timestamp = emitted + delay + noise - skew;
            stream.push(DetectionEvent::new(device_id, sequence_number, timestamp));
        }
        if scenario.shuffle {
            stream.shuffle(&mut rng);
        }
        streams.push(stream);
    }

    Ok(streams)
}
