// src/engine.rs
use crate::config::ViewerConfig;
use crate::connection::ConnectionManager;
use crate::drivers::TelemetryPipeline;
use crate::transports::build_transport;
use crate::types::*;
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

// 每轮最多处理的链路事件数，避免一直占着循环不处理 GUI 命令
const EVENTS_PER_TURN: usize = 64;
const IDLE_SLEEP: Duration = Duration::from_millis(5);

pub fn spawn_thread(
    config: ViewerConfig,
    tx: Sender<EngineMessage>,
    rx_cmd: Receiver<GuiCommand>,
) -> JoinHandle<()> {
    thread::spawn(move || run(config, tx, rx_cmd))
}

fn run(config: ViewerConfig, tx: Sender<EngineMessage>, rx_cmd: Receiver<GuiCommand>) {
    let mut pipeline = TelemetryPipeline::new(config.threshold);
    let mut manager =
        ConnectionManager::new(build_transport(&config.source), config.reconnect_delay());
    tx.send(EngineMessage::Log(format!("Source: {:?}", config.source)))
        .ok();
    manager.connect(Instant::now());

    loop {
        let mut dirty = false;

        // ============================================================
        // 1. GUI 命令
        // ============================================================
        loop {
            match rx_cmd.try_recv() {
                Ok(GuiCommand::SetThreshold(v)) => {
                    if pipeline.set_threshold(v) {
                        tx.send(EngineMessage::Log(format!(
                            "Threshold: {}",
                            pipeline.threshold()
                        )))
                        .ok();
                        dirty = true;
                    }
                }
                Ok(GuiCommand::Shutdown) | Err(TryRecvError::Disconnected) => {
                    manager.shutdown();
                    forward_transitions(&mut manager, &tx);
                    let window = pipeline.window();
                    if window.is_empty() {
                        log::info!("engine stopped, no samples received");
                    } else {
                        log::info!(
                            "engine stopped, {} samples received ({} in window)",
                            window.total_appended(),
                            window.len()
                        );
                    }
                    return;
                }
                Err(TryRecvError::Empty) => break,
            }
        }

        // ============================================================
        // 2. 链路事件
        // ============================================================
        for _ in 0..EVENTS_PER_TURN {
            let Some(event) = manager.poll_link() else {
                break;
            };
            if manager
                .dispatch(event, &mut pipeline, Instant::now())
                .is_some()
            {
                dirty = true;
            }
        }

        // ============================================================
        // 3. 重连定时器
        // ============================================================
        manager.poll_timer(Instant::now());
        if forward_transitions(&mut manager, &tx) {
            dirty = true;
        }

        // 4. 发送快照
        if dirty {
            let snapshot = pipeline.snapshot(manager.state());
            tx.send(EngineMessage::Snapshot(snapshot)).ok();
        } else {
            thread::sleep(IDLE_SLEEP);
        }
    }
}

fn forward_transitions(manager: &mut ConnectionManager, tx: &Sender<EngineMessage>) -> bool {
    let transitions = manager.take_transitions();
    for state in &transitions {
        tx.send(EngineMessage::Status(*state)).ok();
        if *state == ConnectionState::Disconnected {
            if let Some(deadline) = manager.reconnect_deadline() {
                let wait = deadline.saturating_duration_since(Instant::now());
                tx.send(EngineMessage::Log(format!(
                    "Disconnected, retrying in {:.1}s",
                    wait.as_secs_f32()
                )))
                .ok();
            }
        }
    }
    !transitions.is_empty()
}
