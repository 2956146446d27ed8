use locatorcore::telemetry::MetricsSnapshot;
use locatorcore::RoundOutcome;
use serde::Serialize;

/// What the presentation side sees on `GET /position`.
#[derive(Debug, Clone, Serialize, Default)]
pub struct PresentationModel {
    pub latest: Option<RoundOutcome>,
    pub metrics: MetricsSnapshot,
    pub pending: Vec<usize>,
}
