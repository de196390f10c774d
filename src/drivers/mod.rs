// src/drivers/mod.rs
// 数据管线：解码 -> 窗口 -> 分类 -> 区间分段 -> 快照/绘图
pub mod buffer;
pub mod classifier;
pub mod error;
pub mod pipeline;
pub mod plot;
pub mod regions;
pub mod source;
// 公开导出这些模块里的结构体，方便外部调用
pub use buffer::SampleWindow;
pub use classifier::{parse_threshold, try_parse_threshold, DEFAULT_THRESHOLD};
pub use error::TelemetryError;
pub use pipeline::{DashboardSnapshot, TelemetryPipeline};
pub use plot::{render_touch_png, PlotStyle};
pub use source::{IndexedSample, RawSample, WireFormat};
