use std::fmt::Debug;

use tracing::{debug, trace};

/// A single named progress counter.
///
/// Counters are display resources owned by whoever created them; `close`
/// releases the display slot. Closing twice is fine.
pub trait ProgressCounter: Debug + Send {
    fn set_description(&mut self, description: &str);
    fn increment(&mut self, delta: u64);
    fn close(&mut self);
}

/// Creates progress counters on behalf of the engine.
///
/// This is the engine's entire coupling to progress display. `position` is a
/// display row, assigned sequentially so related counters stack under their
/// parent.
pub trait ProgressSink: Debug + Send + Sync {
    fn create_counter(&self, name: &str, total: u64, position: usize) -> Box<dyn ProgressCounter>;
}

/// Sink that drops all progress reporting.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopProgressSink;

impl ProgressSink for NopProgressSink {
    fn create_counter(&self, _name: &str, _total: u64, _position: usize) -> Box<dyn ProgressCounter> {
        Box::new(NopProgressCounter)
    }
}

#[derive(Debug)]
struct NopProgressCounter;

impl ProgressCounter for NopProgressCounter {
    fn set_description(&mut self, _description: &str) {}
    fn increment(&mut self, _delta: u64) {}
    fn close(&mut self) {}
}

/// Sink that reports progress as tracing events, for headless runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn create_counter(&self, name: &str, total: u64, position: usize) -> Box<dyn ProgressCounter> {
        debug!(name, total, position, "created progress counter");
        Box::new(TracingProgressCounter {
            name: name.to_string(),
            current: 0,
            total,
        })
    }
}

#[derive(Debug)]
struct TracingProgressCounter {
    name: String,
    current: u64,
    total: u64,
}

impl ProgressCounter for TracingProgressCounter {
    fn set_description(&mut self, description: &str) {
        trace!(name = %self.name, description, "progress description");
    }

    fn increment(&mut self, delta: u64) {
        self.current += delta;
        trace!(
            name = %self.name,
            current = self.current,
            total = self.total,
            "progress",
        );
    }

    fn close(&mut self) {
        debug!(name = %self.name, current = self.current, total = self.total, "closed progress counter");
    }
}
