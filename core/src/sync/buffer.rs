use crate::prelude::{DetectionEvent, DeviceId, LocatorError, LocatorResult, SequenceNumber};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Heap entry ordered by sequence number, then by arrival so equal sequence
/// numbers come back first-in first-out.
#[derive(Debug)]
struct Pending {
    arrival: u64,
    event: DetectionEvent,
}

impl Pending {
    fn key(&self) -> (SequenceNumber, u64) {
        (self.event.sequence_number, self.arrival)
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Unconsumed detections of one device, retrievable lowest sequence number
/// first regardless of arrival order.
#[derive(Debug)]
pub struct DeviceStreamBuffer {
    device_id: DeviceId,
    pending: BinaryHeap<Reverse<Pending>>,
    arrivals: u64,
}

impl DeviceStreamBuffer {
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            pending: BinaryHeap::new(),
            arrivals: 0,
        }
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Queues an event reported by this buffer's device.
    pub fn insert(&mut self, event: DetectionEvent) -> LocatorResult<()> {
        if event.device_id != self.device_id {
            return Err(LocatorError::Internal(format!(
                "event from device {} routed to buffer of device {}",
                event.device_id, self.device_id
            )));
        }
        let arrival = self.arrivals;
        self.arrivals += 1;
        self.pending.push(Reverse(Pending { arrival, event }));
        Ok(())
    }

    pub fn peek_min(&self) -> Option<&DetectionEvent> {
        self.pending.peek().map(|Reverse(pending)| &pending.event)
    }

    pub fn pop_min(&mut self) -> LocatorResult<DetectionEvent> {
        self.pending
            .pop()
            .map(|Reverse(pending)| pending.event)
            .ok_or(LocatorError::EmptyBuffer {
                device_id: self.device_id,
            })
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_ascending_sequence_order() {
        let mut buffer = DeviceStreamBuffer::new(1);
        for seq in [5, 2, 9, 1, 3] {
            buffer.insert(DetectionEvent::new(1, seq, 100 + seq)).unwrap();
        }

        let popped: Vec<_> = (0..5)
            .map(|_| buffer.pop_min().unwrap().sequence_number)
            .collect();
        assert_eq!(popped, vec![1, 2, 3, 5, 9]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn peek_does_not_consume() {
        let mut buffer = DeviceStreamBuffer::new(2);
        assert!(buffer.peek_min().is_none());

        buffer.insert(DetectionEvent::new(2, 4, 10)).unwrap();
        buffer.insert(DetectionEvent::new(2, 3, 11)).unwrap();
        assert_eq!(buffer.peek_min().map(|e| e.sequence_number), Some(3));
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn pop_on_empty_buffer_fails() {
        let mut buffer = DeviceStreamBuffer::new(3);
        assert_eq!(
            buffer.pop_min(),
            Err(LocatorError::EmptyBuffer { device_id: 3 })
        );
    }

    #[test]
    fn rejects_events_from_other_devices() {
        let mut buffer = DeviceStreamBuffer::new(1);
        assert!(buffer.insert(DetectionEvent::new(2, 1, 0)).is_err());
        assert!(buffer.is_empty());
    }

    #[test]
    fn duplicate_sequence_numbers_pop_in_arrival_order() {
        let mut buffer = DeviceStreamBuffer::new(1);
        buffer.insert(DetectionEvent::new(1, 7, 300)).unwrap();
        buffer.insert(DetectionEvent::new(1, 7, 200)).unwrap();

        assert_eq!(buffer.pop_min().unwrap().timestamp, 300);
        assert_eq!(buffer.pop_min().unwrap().timestamp, 200);
    }
}
