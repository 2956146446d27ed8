use crate::generator::scenario::build_device_streams;
use crate::workflow::config::WorkflowConfig;
use anyhow::{anyhow, Context};
use locatorcore::prelude::DetectionEvent;
use locatorcore::telemetry::MetricsSnapshot;
use locatorcore::{ClockOffsetTable, Locator, RoundOutcome};
use std::sync::{Arc, Mutex};
use std::thread;

pub struct WorkflowResult {
    pub rounds: Vec<RoundOutcome>,
    pub metrics: MetricsSnapshot,
    pub pending: Vec<usize>,
}

impl WorkflowResult {
    pub fn fix_count(&self) -> usize {
        self.rounds
            .iter()
            .filter(|round| round.position.coordinate().is_some())
            .count()
    }
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    /// Generates the configured scenario and replays it.
    pub fn run_scenario(&self) -> anyhow::Result<WorkflowResult> {
        let offsets = self.config.offset_table()?;
        let streams = build_device_streams(&self.config.geometry, &offsets, &self.config.scenario)
            .context("building device streams")?;
        self.execute(streams)
    }

    /// Feeds every device stream into one locator, one producer thread per
    /// device, and collects the released rounds in sequence order.
    pub fn execute(&self, streams: Vec<Vec<DetectionEvent>>) -> anyhow::Result<WorkflowResult> {
        let collected = Arc::new(Mutex::new(Vec::new()));
        let sink = collected.clone();
        let offsets: Arc<ClockOffsetTable> = Arc::new(self.config.offset_table()?);
        let locator = Locator::new(&self.config.geometry, offsets)
            .context("creating locator")?
            .with_callback(move |outcome| {
                if let Ok(mut rounds) = sink.lock() {
                    rounds.push(outcome.clone());
                }
            });

        thread::scope(|scope| {
            let producers: Vec<_> = streams
                .into_iter()
                .map(|stream| {
                    let locator = &locator;
                    scope.spawn(move || -> anyhow::Result<()> {
                        for event in stream {
                            locator.insert_event(event).with_context(|| {
                                format!(
                                    "inserting sequence {} from device {}",
                                    event.sequence_number, event.device_id
                                )
                            })?;
                        }
                        Ok(())
                    })
                })
                .collect();

            producers.into_iter().try_for_each(|producer| {
                producer
                    .join()
                    .map_err(|_| anyhow!("producer thread panicked"))?
            })
        })?;

        let mut rounds = collected
            .lock()
            .map_err(|_| anyhow!("round collector poisoned"))?
            .clone();
        rounds.sort_by_key(|round| round.sequence_number);

        Ok(WorkflowResult {
            rounds,
            metrics: locator.metrics(),
            pending: locator.pending_depths(),
        })
    }
}
