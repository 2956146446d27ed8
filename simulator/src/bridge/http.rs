use crate::bridge::model::PresentationModel;
use crate::workflow::config::WorkflowConfig;
use anyhow::{Context, Result};
use locatorcore::prelude::{DetectionEvent, DeviceId, LocatorResult, Ticks};
use locatorcore::{ClockOffsetTable, Locator, RoundOutcome};
use log::{info, warn};
use serde_json::json;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};
use warp::{http::StatusCode, Filter};

pub fn bridge_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9000))
}

/// HTTP ingestion layer: devices post detections, the clock synchronizer
/// publishes offsets, and the presentation side polls the latest round.
pub struct IngestBridge {
    locator: Locator,
    offsets: Arc<ClockOffsetTable>,
    latest: Arc<RwLock<Option<RoundOutcome>>>,
}

impl IngestBridge {
    pub fn new(config: &WorkflowConfig) -> Result<Self> {
        let offsets = Arc::new(config.offset_table()?);
        let latest = Arc::new(RwLock::new(None));
        let sink = latest.clone();
        let locator = Locator::new(&config.geometry, offsets.clone())
            .context("creating locator for bridge")?
            .with_callback(move |outcome: &RoundOutcome| keep_latest(&sink, outcome));

        Ok(Self {
            locator,
            offsets,
            latest,
        })
    }

    pub fn ingest(&self, event: DetectionEvent) -> LocatorResult<Vec<RoundOutcome>> {
        self.locator.insert_event(event)
    }

    pub fn update_offsets(&self, offsets: HashMap<DeviceId, Ticks>) {
        info!("clock offsets updated for {} devices", offsets.len());
        self.offsets.replace_all(offsets);
    }

    pub fn snapshot(&self) -> PresentationModel {
        PresentationModel {
            latest: self
                .latest
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            metrics: self.locator.metrics(),
            pending: self.locator.pending_depths(),
        }
    }

    pub fn routes(
        self: &Arc<Self>,
    ) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone + Send + Sync + 'static
    {
        let bridge = self.clone();
        let bridge_filter = warp::any().map(move || bridge.clone());

        let detection_route = warp::path("detection")
            .and(warp::path::end())
            .and(warp::post())
            .and(warp::body::json())
            .and(bridge_filter.clone())
            .map(|event: DetectionEvent, bridge: Arc<IngestBridge>| {
                match bridge.ingest(event) {
                    Ok(outcomes) => warp::reply::with_status(
                        warp::reply::json(&json!({"status": "ok", "rounds": outcomes})),
                        StatusCode::OK,
                    ),
                    Err(err) => {
                        warn!("rejected detection {:?}: {}", event, err);
                        warp::reply::with_status(
                            warp::reply::json(&json!({"status": "error", "error": err.to_string()})),
                            StatusCode::BAD_REQUEST,
                        )
                    }
                }
            });

        let offsets_route = warp::path("offsets")
            .and(warp::path::end())
            .and(warp::put())
            .and(warp::body::json())
            .and(bridge_filter.clone())
            .map(
                |offsets: HashMap<DeviceId, Ticks>, bridge: Arc<IngestBridge>| {
                    let devices = offsets.len();
                    bridge.update_offsets(offsets);
                    warp::reply::with_status(
                        warp::reply::json(&json!({"status": "ok", "devices": devices})),
                        StatusCode::OK,
                    )
                },
            );

        let position_route = warp::path("position")
            .and(warp::path::end())
            .and(warp::get())
            .and(bridge_filter)
            .map(|bridge: Arc<IngestBridge>| warp::reply::json(&bridge.snapshot()));

        detection_route.or(offsets_route).or(position_route)
    }

    /// Binds the routes and returns the server future, which resolves once
    /// `shutdown` completes. Must be called inside a tokio runtime.
    pub fn bind<S>(
        self: &Arc<Self>,
        address: SocketAddr,
        shutdown: S,
    ) -> Result<(SocketAddr, impl Future<Output = ()> + 'static)>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let (bound, server) = warp::serve(self.routes())
            .try_bind_with_graceful_shutdown(address, shutdown)
            .with_context(|| format!("binding ingest bridge to {}", address))?;
        info!("ingest bridge listening on {}", bound);
        Ok((bound, server))
    }
}

/// Round callbacks run outside the barrier lock, so concurrent producers can
/// deliver them out of order. Only a newer sequence replaces the stored one.
fn keep_latest(slot: &RwLock<Option<RoundOutcome>>, outcome: &RoundOutcome) {
    let mut latest = slot.write().unwrap_or_else(PoisonError::into_inner);
    let newer = latest
        .as_ref()
        .map_or(true, |stored| outcome.sequence_number > stored.sequence_number);
    if newer {
        *latest = Some(outcome.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locatorcore::{GeometryConfig, OffsetLookup};

    fn bridge() -> Arc<IngestBridge> {
        Arc::new(IngestBridge::new(&WorkflowConfig::default()).unwrap())
    }

    #[tokio::test]
    async fn posted_detections_release_a_round() {
        let bridge = bridge();
        let routes = bridge.routes();

        for device_id in 1..=3 {
            let response = warp::test::request()
                .method("POST")
                .path("/detection")
                .json(&DetectionEvent::new(device_id, 1, 1000))
                .reply(&routes)
                .await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = warp::test::request()
            .method("POST")
            .path("/detection")
            .json(&DetectionEvent::new(4, 1, 1001))
            .reply(&routes)
            .await;
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["rounds"][0]["sequence_number"], 1);

        let response = warp::test::request()
            .method("GET")
            .path("/position")
            .reply(&routes)
            .await;
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["latest"]["sequence_number"], 1);
        assert_eq!(body["metrics"]["rounds_released"], 1);
    }

    #[tokio::test]
    async fn unknown_device_is_a_bad_request() {
        let bridge = bridge();
        let response = warp::test::request()
            .method("POST")
            .path("/detection")
            .json(&DetectionEvent::new(12, 1, 1000))
            .reply(&bridge.routes())
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn offsets_can_be_replaced() {
        let bridge = bridge();
        let response = warp::test::request()
            .method("PUT")
            .path("/offsets")
            .json(&HashMap::from([(1u32, 4i64), (2, -4)]))
            .reply(&bridge.routes())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(bridge.offsets.lookup(1), Some(4));
        assert_eq!(bridge.offsets.lookup(3), None);
    }

    #[test]
    fn latest_round_never_moves_backwards() {
        let offsets = Arc::new(ClockOffsetTable::zeroed(4));
        let locator = Locator::new(&GeometryConfig::default(), offsets).unwrap();
        let mut outcomes = Vec::new();
        for seq in 1..=2 {
            for device_id in 1..=4 {
                outcomes.extend(locator.insert(device_id, seq, 1000).unwrap());
            }
        }
        assert_eq!(outcomes.len(), 2);

        let slot = RwLock::new(None);
        keep_latest(&slot, &outcomes[1]);
        keep_latest(&slot, &outcomes[0]);
        let stored = slot.read().unwrap().as_ref().map(|o| o.sequence_number);
        assert_eq!(stored, Some(2));
    }

    #[tokio::test]
    async fn bind_reports_an_address_in_use() {
        let bridge = bridge();
        let any_port = SocketAddr::from(([127, 0, 0, 1], 0));
        let (bound, _server) = bridge.bind(any_port, std::future::pending()).unwrap();

        let second = bridge.bind(bound, std::future::pending());
        assert!(second.is_err());
    }

    #[test]
    fn snapshot_is_empty_before_any_round() {
        let model = bridge().snapshot();
        assert!(model.latest.is_none());
        assert_eq!(model.pending, vec![0, 0, 0, 0]);
    }
}
