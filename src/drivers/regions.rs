use serde::Serialize;
use crate::drivers::classifier::is_touched;
use crate::drivers::IndexedSample;
/// Inclusive run of touched indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Region {
    pub start: u64,
    pub end: u64,
}
impl Region {
    pub fn contains(&self, index: u64) -> bool {
        self.start <= index && index <= self.end
    }
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}
/// Collapse a window into its maximal runs of touched samples.
///
/// `samples` must be in ascending index order. A run only continues when the
/// next touched sample's index directly follows the run's end.
pub fn segment<'a, I>(samples: I, threshold: f64) -> Vec<Region>
where
    I: IntoIterator<Item = &'a IndexedSample>,
{
    let mut regions: Vec<Region> = Vec::new();
    for sample in samples {
        push_sample(&mut regions, sample, threshold);
    }
    regions
}
fn push_sample(regions: &mut Vec<Region>, sample: &IndexedSample, threshold: f64) {
    if !is_touched(sample, threshold) {
        return;
    }
    match regions.last_mut() {
        Some(last) if last.end + 1 == sample.index => last.end = sample.index,
        _ => regions.push(Region {
            start: sample.index,
            end: sample.index,
        }),
    }
}
/// Region list that is extended in place while only appends happen.
///
/// Any other change (threshold edit, eviction cutting into a cached region,
/// more than one unseen sample) triggers a full `segment` pass.
#[derive(Debug, Default)]
pub struct RegionCache {
    regions: Vec<Region>,
    threshold: Option<f64>,
    last_index: Option<u64>,
}
impl RegionCache {
    pub fn new() -> Self {
        Self::default()
    }
    /// Bring the cache in line with `window` and return the regions.
    pub fn refresh(&mut self, window: &[IndexedSample], threshold: f64) -> &[Region] {
        if !self.try_extend(window, threshold) {
            self.regions = segment(window, threshold);
            self.threshold = Some(threshold);
            self.last_index = window.last().map(|s| s.index);
        }
        &self.regions
    }
    fn try_extend(&mut self, window: &[IndexedSample], threshold: f64) -> bool {
        if self.threshold != Some(threshold) {
            return false;
        }
        let (Some(cached_last), Some(newest)) = (self.last_index, window.last()) else {
            return false;
        };
        if newest.index == cached_last {
            self.trim_evicted(window);
            return true;
        }
        if newest.index != cached_last + 1 {
            return false;
        }
        self.trim_evicted(window);
        push_sample(&mut self.regions, newest, threshold);
        self.last_index = Some(newest.index);
        true
    }
    /// Clip cached regions to the window's left edge after eviction.
    fn trim_evicted(&mut self, window: &[IndexedSample]) {
        let Some(first) = window.first().map(|s| s.index) else {
            self.regions.clear();
            return;
        };
        self.regions.retain(|r| r.end >= first);
        if let Some(head) = self.regions.first_mut() {
            head.start = head.start.max(first);
        }
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{RawSample, SampleWindow};
    fn window_of(values: &[f64]) -> SampleWindow {
        let mut window = SampleWindow::new();
        for &touch_value in values {
            window.append(RawSample {
                touch_value,
                voltage: 1.0,
            });
        }
        window
    }
    fn check_partition(samples: &[IndexedSample], regions: &[Region], threshold: f64) {
        for pair in regions.windows(2) {
            assert!(pair[0].end + 1 < pair[1].start, "{pair:?} overlap or abut");
        }
        for r in regions {
            assert!(r.start <= r.end);
        }
        for s in samples {
            let hits = regions.iter().filter(|r| r.contains(s.index)).count();
            if is_touched(s, threshold) {
                assert_eq!(hits, 1, "touched sample {} in {hits} regions", s.index);
            } else {
                assert_eq!(hits, 0, "untouched sample {} covered", s.index);
            }
        }
    }
    #[test]
    fn mixed_sequence_yields_two_regions() {
        let window = window_of(&[25.0, 15.0, 14.0, 25.0, 10.0]);
        let regions = segment(window.current(), 20.0);
        assert_eq!(
            regions,
            vec![Region { start: 1, end: 2 }, Region { start: 4, end: 4 }]
        );
    }
    #[test]
    fn evicted_prefix_does_not_leak_into_regions() {
        let values: Vec<f64> = (0..205).map(|v| v as f64).collect();
        let window = window_of(&values);
        assert_eq!(window.len(), 200);
        assert_eq!(window.current().next().map(|s| s.index), Some(5));
        assert_eq!(window.latest().map(|s| s.index), Some(204));
        let regions = segment(window.current(), 20.0);
        assert_eq!(regions, vec![Region { start: 5, end: 19 }]);
    }
    #[test]
    fn index_gap_splits_a_run() {
        let samples = [
            IndexedSample { index: 3, touch_value: 1.0, voltage: 0.0 },
            IndexedSample { index: 4, touch_value: 1.0, voltage: 0.0 },
            IndexedSample { index: 6, touch_value: 1.0, voltage: 0.0 },
        ];
        let regions = segment(&samples, 20.0);
        assert_eq!(
            regions,
            vec![Region { start: 3, end: 4 }, Region { start: 6, end: 6 }]
        );
    }
    #[test]
    fn regions_partition_touched_samples() {
        let values: Vec<f64> = (0..500u32)
            .map(|i| ((i * 7919) % 41) as f64)
            .collect();
        let window = window_of(&values);
        let samples = window.to_vec();
        for threshold in [-1.0, 0.0, 5.0, 20.0, 40.0, 100.0] {
            let regions = segment(&samples, threshold);
            check_partition(&samples, &regions, threshold);
            assert_eq!(regions, segment(&samples, threshold));
        }
    }
    #[test]
    fn threshold_change_applies_retroactively() {
        let window = window_of(&[25.0, 15.0, 14.0, 25.0, 10.0]);
        assert_eq!(segment(window.current(), 12.0), vec![Region { start: 4, end: 4 }]);
        assert_eq!(segment(window.current(), 30.0), vec![Region { start: 0, end: 4 }]);
        assert!(segment(window.current(), 5.0).is_empty());
    }
    #[test]
    fn cache_matches_full_recompute() {
        let mut window = SampleWindow::with_capacity(16);
        let mut cache = RegionCache::new();
        let mut threshold = 20.0;
        for i in 0..300u32 {
            window.append(RawSample {
                touch_value: ((i * 37) % 29) as f64,
                voltage: 0.0,
            });
            if i % 50 == 49 {
                threshold += 3.0;
            }
            let samples = window.to_vec();
            let cached = cache.refresh(&samples, threshold).to_vec();
            assert_eq!(cached, segment(&samples, threshold), "step {i}");
        }
    }
    #[test]
    fn cache_recomputes_after_skipped_samples() {
        let mut window = window_of(&[10.0, 10.0]);
        let mut cache = RegionCache::new();
        cache.refresh(&window.to_vec(), 20.0);
        for v in [10.0, 30.0, 10.0] {
            window.append(RawSample { touch_value: v, voltage: 0.0 });
        }
        let samples = window.to_vec();
        assert_eq!(cache.refresh(&samples, 20.0), segment(&samples, 20.0).as_slice());
        assert!(cache.refresh(&[], 20.0).is_empty());
    }
}
