use std::collections::VecDeque;
use crate::drivers::{IndexedSample, RawSample};
/// Number of samples kept for display.
pub const MAX_POINTS: usize = 200;
/// Rolling window of the most recent samples.
///
/// Every appended sample gets the next value of a counter that lives as long
/// as the window does, so indices stay strictly increasing across reconnects
/// and eviction only ever removes the lowest ones.
pub struct SampleWindow {
    samples: VecDeque<IndexedSample>,
    capacity: usize,
    next_index: u64,
}
impl Default for SampleWindow {
    fn default() -> Self {
        Self::new()
    }
}
impl SampleWindow {
    pub fn new() -> Self {
        Self::with_capacity(MAX_POINTS)
    }
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity: capacity.max(1),
            next_index: 0,
        }
    }
    pub fn append(&mut self, raw: RawSample) -> IndexedSample {
        let sample = IndexedSample {
            index: self.next_index,
            touch_value: raw.touch_value,
            voltage: raw.voltage,
        };
        self.next_index += 1;
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
        sample
    }
    /// Samples in ascending index order.
    pub fn current(&self) -> impl Iterator<Item = &IndexedSample> + '_ {
        self.samples.iter()
    }
    pub fn to_vec(&self) -> Vec<IndexedSample> {
        self.samples.iter().copied().collect()
    }
    pub fn latest(&self) -> Option<&IndexedSample> {
        self.samples.back()
    }
    pub fn total_appended(&self) -> u64 {
        self.next_index
    }
    pub fn len(&self) -> usize {
        self.samples.len()
    }
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
