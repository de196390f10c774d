// src/types.rs
use crate::drivers::DashboardSnapshot;

// 连接状态
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionState {
    pub fn label(self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
        }
    }
}

// GUI 发给后台的命令
#[derive(Clone, Debug)]
pub enum GuiCommand {
    SetThreshold(f64),
    Shutdown,
}

// 后台发给 GUI 的消息
#[derive(Clone, Debug)]
pub enum EngineMessage {
    Log(String),
    Status(ConnectionState),
    Snapshot(DashboardSnapshot),
}
