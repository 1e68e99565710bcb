//! The driver's priority event queue.

use crate::events::{DriverEvent, NUM_PRIORITIES};
use std::collections::VecDeque;

/// A single-threaded priority queue of [DriverEvent]s: one FIFO lane per
/// priority class, drained highest-priority first.
#[derive(Debug, Default)]
pub struct EventQueue {
    lanes: [VecDeque<DriverEvent>; NUM_PRIORITIES],
}

impl EventQueue {
    /// Creates an empty [EventQueue].
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes an event into its priority lane.
    pub fn push(&mut self, event: DriverEvent) {
        self.lanes[event.priority() as usize].push_back(event);
    }

    /// Pops the next event: the oldest event of the highest non-empty
    /// priority class.
    pub fn pop(&mut self) -> Option<DriverEvent> {
        self.lanes.iter_mut().find_map(VecDeque::pop_front)
    }

    /// Returns the total number of queued events.
    pub fn len(&self) -> usize {
        self.lanes.iter().map(VecDeque::len).sum()
    }

    /// Returns whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.lanes.iter().all(VecDeque::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rift_derive::errors::PipelineError;

    #[test]
    fn test_priority_order_then_fifo() {
        let mut queue = EventQueue::new();
        queue.push(DriverEvent::Step);
        queue.push(DriverEvent::NewL1Head(Default::default()));
        queue.push(DriverEvent::Reset(PipelineError::Eof.temp()));
        queue.push(DriverEvent::ForkchoiceUpdated(Default::default()));

        assert!(matches!(queue.pop(), Some(DriverEvent::Reset(_))));
        assert!(matches!(queue.pop(), Some(DriverEvent::NewL1Head(_))));
        assert!(matches!(queue.pop(), Some(DriverEvent::ForkchoiceUpdated(_))));
        assert!(matches!(queue.pop(), Some(DriverEvent::Step)));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_len_and_empty() {
        let mut queue = EventQueue::new();
        assert!(queue.is_empty());
        queue.push(DriverEvent::Step);
        queue.push(DriverEvent::Step);
        assert_eq!(queue.len(), 2);
    }
}
