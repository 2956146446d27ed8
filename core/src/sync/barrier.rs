use crate::prelude::{DetectionEvent, DeviceId, LocatorError, LocatorResult, SequenceNumber};
use crate::sync::buffer::DeviceStreamBuffer;
use log::debug;

/// Holds one stream buffer per device and releases a round only when every
/// buffer's lowest pending sequence number is the same.
#[derive(Debug)]
pub struct SynchronizationBarrier {
    buffers: Vec<DeviceStreamBuffer>,
}

impl SynchronizationBarrier {
    pub fn new(device_count: usize) -> LocatorResult<Self> {
        if device_count < 2 || device_count % 2 != 0 {
            return Err(LocatorError::InvalidConfig(format!(
                "barrier needs an even number of devices, got {}",
                device_count
            )));
        }
        let last = DeviceId::try_from(device_count)
            .map_err(|_| LocatorError::InvalidConfig("device count overflow".into()))?;
        let buffers = (1..=last).map(DeviceStreamBuffer::new).collect();
        Ok(Self { buffers })
    }

    pub fn device_count(&self) -> usize {
        self.buffers.len()
    }

    /// Routes the event to its device's buffer.
    pub fn insert(&mut self, event: DetectionEvent) -> LocatorResult<()> {
        let device_count = self.buffers.len();
        let position = (event.device_id as usize)
            .checked_sub(1)
            .filter(|&position| position < device_count)
            .ok_or(LocatorError::UnknownDevice {
                device_id: event.device_id,
                device_count,
            })?;
        self.buffers[position].insert(event)
    }

    /// Sequence number shared by every buffer's earliest pending event, if
    /// all buffers are non-empty and agree.
    pub fn aligned_sequence(&self) -> Option<SequenceNumber> {
        let mut heads = self
            .buffers
            .iter()
            .map(|buffer| buffer.peek_min().map(|event| event.sequence_number));
        let first = heads.next()??;
        for head in heads {
            if head? != first {
                return None;
            }
        }
        Some(first)
    }

    pub fn is_aligned(&self) -> bool {
        self.aligned_sequence().is_some()
    }

    /// Pops one event from every buffer, ordered by device position.
    /// Positions 2k and 2k+1 form receiver pair k.
    pub fn release_round(&mut self) -> LocatorResult<Vec<DetectionEvent>> {
        let sequence = self
            .aligned_sequence()
            .ok_or(LocatorError::BarrierNotAligned)?;
        debug!("releasing round for sequence {}", sequence);
        self.buffers
            .iter_mut()
            .map(DeviceStreamBuffer::pop_min)
            .collect()
    }

    /// Pending event count per device position.
    pub fn depths(&self) -> Vec<usize> {
        self.buffers.iter().map(DeviceStreamBuffer::len).collect()
    }
}
