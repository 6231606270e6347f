use std::sync::Arc;

use parking_lot::Mutex;

use crate::runtime::progress::{ProgressCounter, ProgressSink};

/// Everything that happened to one created counter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterRecord {
    pub name: String,
    pub total: u64,
    pub position: usize,
    pub description: Option<String>,
    pub increments: u64,
    pub closed: bool,
}

/// Progress sink that records counter creation and every call made on the
/// counters, in creation order.
#[derive(Debug, Clone, Default)]
pub struct RecordingProgressSink {
    records: Arc<Mutex<Vec<CounterRecord>>>,
}

impl RecordingProgressSink {
    pub fn new() -> Self {
        RecordingProgressSink::default()
    }

    pub fn records(&self) -> Vec<CounterRecord> {
        self.records.lock().clone()
    }
}

impl ProgressSink for RecordingProgressSink {
    fn create_counter(&self, name: &str, total: u64, position: usize) -> Box<dyn ProgressCounter> {
        let mut records = self.records.lock();
        let index = records.len();
        records.push(CounterRecord {
            name: name.to_string(),
            total,
            position,
            ..Default::default()
        });
        Box::new(RecordingProgressCounter {
            records: Arc::clone(&self.records),
            index,
        })
    }
}

#[derive(Debug)]
struct RecordingProgressCounter {
    records: Arc<Mutex<Vec<CounterRecord>>>,
    index: usize,
}

impl ProgressCounter for RecordingProgressCounter {
    fn set_description(&mut self, description: &str) {
        self.records.lock()[self.index].description = Some(description.to_string());
    }

    fn increment(&mut self, delta: u64) {
        self.records.lock()[self.index].increments += delta;
    }

    fn close(&mut self) {
        self.records.lock()[self.index].closed = true;
    }
}
