use crate::generator::scenario::ScenarioConfig;
use anyhow::Context;
use locatorcore::prelude::{DeviceId, GeometryConfig, Ticks};
use locatorcore::ClockOffsetTable;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub geometry: GeometryConfig,
    /// Clock corrections per device id, as published by the clock
    /// synchronizer. Devices left out are corrected by zero.
    pub offsets: HashMap<DeviceId, Ticks>,
    pub scenario: ScenarioConfig,
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        config
            .geometry
            .validate()
            .with_context(|| format!("validating geometry in {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(
        rounds: usize,
        seed: u64,
        jitter: Ticks,
        silent_device: Option<DeviceId>,
    ) -> Self {
        Self {
            scenario: ScenarioConfig {
                rounds,
                seed,
                jitter,
                silent_device,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Offset table covering every configured device.
    pub fn offset_table(&self) -> anyhow::Result<ClockOffsetTable> {
        let device_count = DeviceId::try_from(self.geometry.device_count).with_context(|| {
            format!(
                "device count {} does not fit a device id",
                self.geometry.device_count
            )
        })?;
        Ok((1..=device_count)
            .map(|id| (id, self.offsets.get(&id).copied().unwrap_or(0)))
            .collect())
    }
}
