// src/connection.rs
//! Lifecycle of the single streaming link.
//!
//! The manager is a plain state machine: the engine feeds it one `LinkEvent`
//! at a time plus the current `Instant`, and polls it for a due reconnect.
//! Nothing here sleeps or spawns, which keeps it testable with a scripted
//! transport.
use std::time::{Duration, Instant};

use crate::drivers::{IndexedSample, TelemetryError, TelemetryPipeline, WireFormat};
use crate::types::ConnectionState;

pub const RECONNECT_DELAY: Duration = Duration::from_millis(2000);

/// What a link can report back to the manager.
#[derive(Clone, Debug, PartialEq)]
pub enum LinkEvent {
    Opened,
    Message(String),
    Closed,
    Errored(String),
}

/// An open connection handle.
pub trait Link {
    /// Next pending event, or `None` if nothing arrived within the link's
    /// read timeout.
    fn poll_event(&mut self) -> Option<LinkEvent>;
    fn close(&mut self);
}

/// Factory for links to one fixed source.
pub trait Transport {
    fn open(&mut self) -> Result<Box<dyn Link>, TelemetryError>;
    fn wire_format(&self) -> WireFormat {
        WireFormat::Json
    }
    fn describe(&self) -> String;
}

/// Pending reconnect. Dropping it cancels it.
#[derive(Debug)]
pub struct ReconnectTimer {
    deadline: Instant,
}

impl ReconnectTimer {
    fn is_due(&self, now: Instant) -> bool {
        now >= self.deadline
    }
}

pub struct ConnectionManager {
    transport: Box<dyn Transport>,
    link: Option<Box<dyn Link>>,
    state: ConnectionState,
    reconnect: Option<ReconnectTimer>,
    reconnect_delay: Duration,
    transitions: Vec<ConnectionState>,
    announced: bool,
    shut_down: bool,
}

impl ConnectionManager {
    pub fn new(transport: Box<dyn Transport>, reconnect_delay: Duration) -> Self {
        Self {
            transport,
            link: None,
            state: ConnectionState::Connecting,
            reconnect: None,
            reconnect_delay,
            transitions: Vec::new(),
            announced: false,
            shut_down: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn reconnect_deadline(&self) -> Option<Instant> {
        self.reconnect.as_ref().map(|t| t.deadline)
    }

    /// State changes since the last call, oldest first.
    pub fn take_transitions(&mut self) -> Vec<ConnectionState> {
        std::mem::take(&mut self.transitions)
    }

    /// Start one connection attempt.
    pub fn connect(&mut self, now: Instant) {
        if self.shut_down {
            return;
        }
        self.set_state(ConnectionState::Connecting);
        log::info!("connecting to {}", self.transport.describe());
        match self.transport.open() {
            Ok(link) => self.link = Some(link),
            Err(e) => self.handle_error(&e.to_string(), now),
        }
    }

    pub fn poll_link(&mut self) -> Option<LinkEvent> {
        self.link.as_mut().and_then(|link| link.poll_event())
    }

    /// Apply one event. Returns the sample it produced, if any.
    pub fn dispatch(
        &mut self,
        event: LinkEvent,
        pipeline: &mut TelemetryPipeline,
        now: Instant,
    ) -> Option<IndexedSample> {
        match event {
            LinkEvent::Opened => {
                self.set_state(ConnectionState::Connected);
                None
            }
            LinkEvent::Message(payload) => {
                if self.state != ConnectionState::Connected {
                    log::debug!("message while {}; dropped", self.state.label());
                    return None;
                }
                match self.transport.wire_format().decode(&payload) {
                    Ok(raw) => Some(pipeline.ingest(raw)),
                    Err(e) => {
                        log::warn!("dropping payload {payload:?}: {e}");
                        None
                    }
                }
            }
            LinkEvent::Closed => {
                self.handle_close(now);
                None
            }
            LinkEvent::Errored(reason) => {
                self.handle_error(&reason, now);
                None
            }
        }
    }

    /// Fire the reconnect timer if it is due. Returns true if a new attempt
    /// was started.
    pub fn poll_timer(&mut self, now: Instant) -> bool {
        if !self.reconnect.as_ref().is_some_and(|t| t.is_due(now)) {
            return false;
        }
        self.reconnect = None;
        self.connect(now);
        true
    }

    /// Cancel any pending reconnect and close the link.
    pub fn shutdown(&mut self) {
        self.shut_down = true;
        if self.reconnect.take().is_some() {
            log::debug!("cancelled pending reconnect");
        }
        if let Some(mut link) = self.link.take() {
            link.close();
        }
        self.set_state(ConnectionState::Disconnected);
    }

    // An error always closes the handle so the close path (and the reconnect
    // it schedules) runs.
    fn handle_error(&mut self, reason: &str, now: Instant) {
        log::warn!("{} failed: {reason}", self.transport.describe());
        if let Some(mut link) = self.link.take() {
            link.close();
        }
        self.handle_close(now);
    }

    fn handle_close(&mut self, now: Instant) {
        self.link = None;
        self.set_state(ConnectionState::Disconnected);
        if self.shut_down || self.reconnect.is_some() {
            return;
        }
        log::info!(
            "reconnecting to {} in {:?}",
            self.transport.describe(),
            self.reconnect_delay
        );
        self.reconnect = Some(ReconnectTimer {
            deadline: now + self.reconnect_delay,
        });
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.announced && self.state == state {
            return;
        }
        if self.state != state {
            log::info!("connection {} -> {}", self.state.label(), state.label());
        }
        self.state = state;
        self.announced = true;
        self.transitions.push(state);
    }
}
