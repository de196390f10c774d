// src/gui.rs
use eframe::egui;
use egui::Color32;
use egui_plot::{HLine, Legend, Line, Plot, PlotPoints, Polygon};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::JoinHandle;
use std::time::Duration;
use crate::config::ViewerConfig;
use crate::drivers::{render_touch_png, try_parse_threshold, DashboardSnapshot, PlotStyle};
use crate::engine;
use crate::types::*;

const LOG_LINES: usize = 8;
const REGION_FILL: Color32 = Color32::from_rgba_premultiplied(60, 16, 16, 60);

pub struct TouchScopeApp {
    // 系统状态
    connection_state: ConnectionState,
    snapshot: DashboardSnapshot,

    // 阈值输入 (文本框内容 + 当前生效值)
    threshold_input: String,
    threshold: f64,

    // 界面日志
    log_messages: Vec<String>,

    // 通讯管道
    rx: Receiver<EngineMessage>,
    tx_cmd: Sender<GuiCommand>,
    engine: Option<JoinHandle<()>>,
}

impl TouchScopeApp {
    pub fn new(config: ViewerConfig) -> Self {
        let (tx, rx) = channel();
        let (tx_cmd, rx_cmd) = channel();
        let threshold = config.threshold;

        // 启动后台引擎
        let engine = engine::spawn_thread(config, tx, rx_cmd);

        Self {
            connection_state: ConnectionState::Connecting,
            snapshot: DashboardSnapshot {
                threshold,
                ..DashboardSnapshot::default()
            },
            threshold_input: format!("{threshold}"),
            threshold,
            log_messages: vec!["TouchScope ready.".to_owned()],
            rx,
            tx_cmd,
            engine: Some(engine),
        }
    }

    fn log(&mut self, msg: &str) {
        self.log_messages.push(format!("> {}", msg));
        if self.log_messages.len() > LOG_LINES {
            self.log_messages.remove(0);
        }
    }

    fn apply_threshold_input(&mut self) {
        let Some(value) = try_parse_threshold(&self.threshold_input) else {
            self.log(&format!(
                "Invalid threshold {:?}, keeping {}",
                self.threshold_input, self.threshold
            ));
            self.threshold_input = format!("{}", self.threshold);
            return;
        };
        if value.to_bits() == self.threshold.to_bits() {
            return;
        }
        self.threshold = value;
        self.tx_cmd.send(GuiCommand::SetThreshold(value)).ok();
    }

    fn badge_color(state: ConnectionState) -> Color32 {
        match state {
            ConnectionState::Connected => Color32::from_rgb(0, 200, 120),
            ConnectionState::Connecting => Color32::YELLOW,
            ConnectionState::Disconnected => Color32::RED,
        }
    }

    fn export_png(&mut self) {
        let path = format!("touchscope_{}.png", self.snapshot.latest.map_or(0, |s| s.index));
        let result = render_touch_png(&self.snapshot, PlotStyle::default())
            .map_err(anyhow::Error::from)
            .and_then(|png| std::fs::write(&path, png).map_err(anyhow::Error::from));
        match result {
            Ok(()) => self.log(&format!("Saved {path}")),
            Err(e) => {
                log::error!("export failed: {e:#}");
                self.log(&format!("Export failed: {e}"));
            }
        }
    }

    fn draw_touch_plot(&self, ui: &mut egui::Ui) {
        let snapshot = &self.snapshot;
        let (y_min, y_max) = snapshot
            .samples
            .iter()
            .fold((snapshot.threshold, snapshot.threshold), |(lo, hi), s| {
                (lo.min(s.touch_value), hi.max(s.touch_value))
            });
        let pad = ((y_max - y_min) * 0.1).max(1.0);
        let (lo, hi) = (y_min - pad, y_max + pad);
        Plot::new("touch_plot")
            .legend(Legend::default())
            .height(ui.available_height() * 0.65)
            .include_y(lo)
            .include_y(hi)
            .auto_bounds_x()
            .show(ui, |plot_ui| {
                for region in &snapshot.regions {
                    let (x0, x1) = (region.start as f64 - 0.5, region.end as f64 + 0.5);
                    plot_ui.polygon(
                        Polygon::new(PlotPoints::new(vec![
                            [x0, lo],
                            [x1, lo],
                            [x1, hi],
                            [x0, hi],
                        ]))
                        .fill_color(REGION_FILL),
                    );
                }
                let points: Vec<[f64; 2]> = snapshot
                    .samples
                    .iter()
                    .map(|s| [s.index as f64, s.touch_value])
                    .collect();
                plot_ui.line(
                    Line::new(PlotPoints::new(points))
                        .name("touch_value")
                        .color(Color32::from_rgb(0, 255, 255)),
                );
                plot_ui.hline(
                    HLine::new(snapshot.threshold)
                        .name("threshold")
                        .color(Color32::YELLOW),
                );
            });
    }

    fn draw_voltage_plot(&self, ui: &mut egui::Ui) {
        let points: Vec<[f64; 2]> = self
            .snapshot
            .samples
            .iter()
            .map(|s| [s.index as f64, s.voltage])
            .collect();
        Plot::new("voltage_plot")
            .height(ui.available_height())
            .include_y(0.0)
            .include_y(3.3)
            .auto_bounds_x()
            .show(ui, |plot_ui| {
                plot_ui.line(
                    Line::new(PlotPoints::new(points))
                        .name("voltage")
                        .color(Color32::from_rgb(255, 0, 255)),
                );
            });
    }
}

impl eframe::App for TouchScopeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // 1. 消息处理
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                EngineMessage::Log(s) => self.log(&s),
                EngineMessage::Status(state) => {
                    self.connection_state = state;
                    self.snapshot.state = state;
                }
                // 断线期间保留旧数据，只替换为新快照
                EngineMessage::Snapshot(snapshot) => self.snapshot = snapshot,
            }
        }
        ctx.request_repaint_after(Duration::from_millis(50));

        let mut visuals = egui::Visuals::dark();
        visuals.widgets.noninteractive.bg_fill = Color32::from_rgb(10, 10, 15);
        ctx.set_visuals(visuals);

        egui::SidePanel::left("L").min_width(260.0).show(ctx, |ui| {
            ui.add_space(10.0);
            ui.heading("TouchScope");
            ui.label("Touch sensor monitor");
            ui.separator();

            ui.horizontal(|ui| {
                ui.label("Connection:");
                ui.label(
                    egui::RichText::new(format!("● {}", self.connection_state.label()))
                        .strong()
                        .color(Self::badge_color(self.connection_state)),
                );
            });

            ui.add_space(10.0);
            ui.horizontal(|ui| {
                ui.label("Threshold:");
                let response = ui.text_edit_singleline(&mut self.threshold_input);
                if response.lost_focus() {
                    self.apply_threshold_input();
                }
            });
            ui.label(
                egui::RichText::new(format!("active: {}", self.threshold))
                    .small()
                    .color(Color32::GRAY),
            );

            ui.add_space(20.0);
            ui.label("LATEST SAMPLE");
            match self.snapshot.latest {
                Some(sample) => {
                    let touched = self.snapshot.regions.iter().any(|r| r.contains(sample.index));
                    ui.monospace(format!("#{}", sample.index));
                    ui.monospace(format!("touch_value {:>8.1}", sample.touch_value));
                    ui.monospace(format!("voltage     {:>8.3} V", sample.voltage));
                    let (text, color) = if touched {
                        ("TOUCHED", Color32::from_rgb(255, 80, 80))
                    } else {
                        ("idle", Color32::GRAY)
                    };
                    ui.label(egui::RichText::new(text).strong().color(color));
                }
                None => {
                    ui.label("No data yet.");
                }
            }

            ui.add_space(10.0);
            let longest = self.snapshot.regions.iter().map(|r| r.len()).max().unwrap_or(0);
            ui.label(format!(
                "{} samples, {} touches (longest {longest})",
                self.snapshot.samples.len(),
                self.snapshot.regions.len()
            ));

            ui.add_space(10.0);
            if ui
                .add_enabled(!self.snapshot.samples.is_empty(), egui::Button::new("📷 EXPORT PNG"))
                .clicked()
            {
                self.export_png();
            }

            ui.add_space(20.0);
            ui.separator();
            egui::ScrollArea::vertical().max_height(140.0).show(ui, |ui| {
                for m in &self.log_messages {
                    ui.monospace(m);
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.snapshot.samples.is_empty() {
                ui.label("Waiting for samples...");
            }
            self.draw_touch_plot(ui);
            ui.separator();
            self.draw_voltage_plot(ui);
        });
    }
}

impl Drop for TouchScopeApp {
    fn drop(&mut self) {
        self.tx_cmd.send(GuiCommand::Shutdown).ok();
        if let Some(handle) = self.engine.take() {
            if handle.join().is_err() {
                log::error!("engine thread panicked");
            }
        }
    }
}
