//! A tracing layer that collects emitted logs for assertions.

use alloc::{string::String, sync::Arc, vec::Vec};
use std::sync::Mutex;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{layer::Context, Layer};

/// The storage for collected traces, shared with the [CollectingLayer].
#[derive(Debug, Default, Clone)]
pub struct TraceStorage(pub Arc<Mutex<Vec<(Level, String)>>>);

impl TraceStorage {
    /// Returns the entries of the given level.
    pub fn get_by_level(&self, level: Level) -> Vec<String> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(l, message)| (*l == level).then(|| message.clone()))
            .collect()
    }

    /// Locks the storage for direct access.
    pub fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(Level, String)>> {
        self.0.lock().unwrap()
    }
}

/// A [Layer] that stores every emitted event in a [TraceStorage].
#[derive(Debug)]
pub struct CollectingLayer {
    /// The backing storage.
    pub storage: TraceStorage,
}

impl CollectingLayer {
    /// Creates a new [CollectingLayer] over the given storage.
    pub const fn new(storage: TraceStorage) -> Self {
        Self { storage }
    }
}

impl<S: Subscriber> Layer<S> for CollectingLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        let message = alloc::format!("{:?}", event);
        self.storage.0.lock().unwrap().push((level, message));
    }
}
