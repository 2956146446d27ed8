use crate::prelude::{DeviceId, Ticks};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Source of per-device clock corrections, produced by an external clock
/// synchronization procedure.
pub trait OffsetLookup: Send + Sync {
    fn lookup(&self, device_id: DeviceId) -> Option<Ticks>;
}

/// Shared clock offset table. Readers see whichever offsets the external
/// synchronizer last published.
#[derive(Debug, Default)]
pub struct ClockOffsetTable {
    offsets: RwLock<HashMap<DeviceId, Ticks>>,
}

impl ClockOffsetTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(offsets: HashMap<DeviceId, Ticks>) -> Self {
        Self {
            offsets: RwLock::new(offsets),
        }
    }

    /// Every device in `1..=device_count` corrected by zero.
    pub fn zeroed(device_count: DeviceId) -> Self {
        (1..=device_count).map(|id| (id, 0)).collect()
    }

    // A writer that panicked mid-update leaves a whole map behind, so a
    // poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<DeviceId, Ticks>> {
        self.offsets.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<DeviceId, Ticks>> {
        self.offsets.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, device_id: DeviceId, offset: Ticks) {
        self.write().insert(device_id, offset);
    }

    pub fn remove(&self, device_id: DeviceId) -> Option<Ticks> {
        self.write().remove(&device_id)
    }

    pub fn replace_all(&self, replacement: HashMap<DeviceId, Ticks>) {
        *self.write() = replacement;
    }

    pub fn snapshot(&self) -> HashMap<DeviceId, Ticks> {
        self.read().clone()
    }
}

impl OffsetLookup for ClockOffsetTable {
    fn lookup(&self, device_id: DeviceId) -> Option<Ticks> {
        self.read().get(&device_id).copied()
    }
}

impl OffsetLookup for HashMap<DeviceId, Ticks> {
    fn lookup(&self, device_id: DeviceId) -> Option<Ticks> {
        self.get(&device_id).copied()
    }
}

impl FromIterator<(DeviceId, Ticks)> for ClockOffsetTable {
    fn from_iter<I: IntoIterator<Item = (DeviceId, Ticks)>>(iter: I) -> Self {
        Self::from_map(iter.into_iter().collect())
    }
}
