use crate::drivers::classifier::DEFAULT_THRESHOLD;
use crate::drivers::regions::{Region, RegionCache};
use crate::drivers::source::{IndexedSample, RawSample};
use crate::drivers::SampleWindow;
use crate::types::ConnectionState;
/// Everything the viewer needs for one frame, detached from the engine.
#[derive(Clone, Debug, Default)]
pub struct DashboardSnapshot {
    pub state: ConnectionState,
    pub latest: Option<IndexedSample>,
    pub samples: Vec<IndexedSample>,
    pub regions: Vec<Region>,
    pub threshold: f64,
}
/// Window, live threshold and derived regions, owned by the engine loop.
pub struct TelemetryPipeline {
    window: SampleWindow,
    threshold: f64,
    regions: RegionCache,
}
impl Default for TelemetryPipeline {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}
impl TelemetryPipeline {
    pub fn new(threshold: f64) -> Self {
        Self {
            window: SampleWindow::new(),
            threshold: if threshold.is_finite() {
                threshold
            } else {
                DEFAULT_THRESHOLD
            },
            regions: RegionCache::new(),
        }
    }
    pub fn ingest(&mut self, raw: RawSample) -> IndexedSample {
        let sample = self.window.append(raw);
        log::trace!(
            "sample #{} touch={} voltage={}",
            sample.index,
            sample.touch_value,
            sample.voltage
        );
        sample
    }
    pub fn threshold(&self) -> f64 {
        self.threshold
    }
    /// Non-finite values are ignored so classification never sees NaN.
    pub fn set_threshold(&mut self, threshold: f64) -> bool {
        if !threshold.is_finite() {
            log::warn!("ignoring non-finite threshold {threshold}");
            return false;
        }
        self.threshold = threshold;
        true
    }
    pub fn window(&self) -> &SampleWindow {
        &self.window
    }
    pub fn regions(&mut self) -> Vec<Region> {
        let samples = self.window.to_vec();
        self.regions.refresh(&samples, self.threshold).to_vec()
    }
    pub fn snapshot(&mut self, state: ConnectionState) -> DashboardSnapshot {
        let regions = self.regions();
        DashboardSnapshot {
            state,
            latest: self.window.latest().copied(),
            samples: self.window.to_vec(),
            regions,
            threshold: self.threshold,
        }
    }
}
