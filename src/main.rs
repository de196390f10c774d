// src/main.rs
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]
mod config;
mod connection;
mod drivers;
mod engine;
mod gui;
mod transports;
mod types;
use config::ViewerConfig;
use eframe::egui;
// 入口函数
fn main() -> eframe::Result<()> {
    env_logger::init();
    let config = match ViewerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e:#}; falling back to defaults");
            ViewerConfig::default()
        }
    };
    log::info!("starting with {config:?}");
    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([1280.0, 800.0])
        .with_min_inner_size([900.0, 600.0])
        .with_title("TouchScope");
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    eframe::run_native(
        "TouchScope",
        options,
        Box::new(move |_cc| Box::new(gui::TouchScopeApp::new(config))),
    )
}
