//! Ingestion entry point: buffers detections per device, releases aligned
//! rounds and turns each round into bearings and a position.

use crate::geometry::{Bearing, BearingEstimator, NoResultReason, Position, PositionEstimator};
use crate::offsets::OffsetLookup;
use crate::prelude::{
    DetectionEvent, DeviceId, GeometryConfig, LocatorError, LocatorResult, SequenceNumber, Ticks,
};
use crate::sync::SynchronizationBarrier;
use crate::telemetry::{LocatorMetrics, MetricsSnapshot, RoundLog};
use log::debug;
use serde::Serialize;
use std::sync::{Arc, Mutex};

type RoundCallback = Box<dyn Fn(&RoundOutcome) + Send + Sync>;

/// Bearing estimated for receiver pair `pair`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairBearing {
    pub pair: usize,
    pub devices: (DeviceId, DeviceId),
    pub bearing: Result<Bearing, LocatorError>,
}

/// Everything computed from one synchronized round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundOutcome {
    pub sequence_number: SequenceNumber,
    pub bearings: Vec<PairBearing>,
    pub position: Position,
}

pub struct Locator {
    barrier: Mutex<SynchronizationBarrier>,
    offsets: Arc<dyn OffsetLookup>,
    bearing: BearingEstimator,
    position: PositionEstimator,
    metrics: LocatorMetrics,
    round_log: RoundLog,
    on_round: Option<RoundCallback>,
}

impl Locator {
    pub fn new(config: &GeometryConfig, offsets: Arc<dyn OffsetLookup>) -> LocatorResult<Self> {
        config.validate()?;
        Ok(Self {
            barrier: Mutex::new(SynchronizationBarrier::new(config.device_count)?),
            offsets,
            bearing: BearingEstimator::new(config),
            position: PositionEstimator::new(config),
            metrics: LocatorMetrics::new(),
            round_log: RoundLog::new(),
            on_round: None,
        })
    }

    /// Registers a callback invoked once per released round, after the
    /// barrier lock has been dropped.
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&RoundOutcome) + Send + Sync + 'static,
    {
        self.on_round = Some(Box::new(callback));
        self
    }

    pub fn insert(
        &self,
        device_id: DeviceId,
        sequence_number: SequenceNumber,
        timestamp: Ticks,
    ) -> LocatorResult<Vec<RoundOutcome>> {
        self.insert_event(DetectionEvent::new(device_id, sequence_number, timestamp))
    }

    /// Buffers the event and resolves every round that became aligned.
    /// Returns an empty list while some device is still behind.
    pub fn insert_event(&self, event: DetectionEvent) -> LocatorResult<Vec<RoundOutcome>> {
        let rounds = {
            let mut barrier = self
                .barrier
                .lock()
                .map_err(|_| LocatorError::Internal("barrier lock poisoned".into()))?;
            barrier.insert(event)?;
            debug!(
                "device {} queued sequence {}",
                event.device_id, event.sequence_number
            );

            let mut rounds = Vec::new();
            while barrier.is_aligned() {
                rounds.push(barrier.release_round()?);
            }
            rounds
        };
        self.metrics.record_insert();

        let outcomes: Vec<RoundOutcome> = rounds
            .into_iter()
            .map(|round| self.resolve(&round))
            .collect();
        for outcome in &outcomes {
            self.round_log.record(outcome);
            if let Some(callback) = &self.on_round {
                callback(outcome);
            }
        }
        Ok(outcomes)
    }

    /// Splits a released round into receiver pairs and estimates the source.
    pub fn resolve(&self, round: &[DetectionEvent]) -> RoundOutcome {
        let sequence_number = round.first().map_or(0, |event| event.sequence_number);
        let bearings: Vec<PairBearing> = round
            .chunks_exact(2)
            .enumerate()
            .map(|(pair, events)| PairBearing {
                pair,
                devices: (events[0].device_id, events[1].device_id),
                bearing: self
                    .bearing
                    .estimate(&events[0], &events[1], self.offsets.as_ref()),
            })
            .collect();

        let position = match bearings.as_slice() {
            [first, second, ..] => match (&first.bearing, &second.bearing) {
                (Ok(theta0), Ok(theta1)) => self.position.estimate(*theta0, *theta1),
                (Err(err), _) => Position::NoResult(unusable(err, first.pair)),
                (_, Err(err)) => Position::NoResult(unusable(err, second.pair)),
            },
            _ => Position::NoResult(NoResultReason::InsufficientPairs),
        };

        let offset_misses = bearings
            .iter()
            .filter(|pair| matches!(pair.bearing, Err(LocatorError::UnknownDeviceOffset { .. })))
            .count();
        self.metrics
            .record_round(position.coordinate().is_some(), offset_misses);

        RoundOutcome {
            sequence_number,
            bearings,
            position,
        }
    }

    /// Pending event count per device position.
    pub fn pending_depths(&self) -> Vec<usize> {
        self.barrier
            .lock()
            .map(|barrier| barrier.depths())
            .unwrap_or_default()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

fn unusable(err: &LocatorError, pair: usize) -> NoResultReason {
    match err {
        LocatorError::UnknownDeviceOffset { device_id } => NoResultReason::MissingOffset {
            device_id: *device_id,
        },
        _ => NoResultReason::IndeterminateBearing { pair },
    }
}
