// src/transports.rs
// 三种数据源：WebSocket（默认）、串口直连 ESP32、模拟数据
use std::io::{BufRead, BufReader, ErrorKind};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tungstenite::handshake::HandshakeError;
use tungstenite::http::Uri;
use tungstenite::{Message, WebSocket};

use crate::config::SourceConfig;
use crate::connection::{Link, LinkEvent, Transport};
use crate::drivers::{RawSample, TelemetryError, WireFormat};

/// How long a link blocks waiting for data before handing control back to
/// the engine loop.
const READ_TIMEOUT: Duration = Duration::from_millis(20);
/// Upper bound for the TCP connect and, separately, for each read or write of
/// the upgrade handshake.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

pub fn build_transport(source: &SourceConfig) -> Box<dyn Transport> {
    match source {
        SourceConfig::WebSocket { url } => Box::new(WebSocketTransport::new(url.clone())),
        SourceConfig::Serial { port, baud_rate } => {
            Box::new(SerialTransport::new(port.clone(), *baud_rate))
        }
        SourceConfig::Simulation { interval_ms } => Box::new(SimulatedTransport::new(
            Duration::from_millis(*interval_ms),
        )),
    }
}

// ============================================================
// WebSocket
// ============================================================
pub struct WebSocketTransport {
    url: String,
}

impl WebSocketTransport {
    pub fn new(url: String) -> Self {
        Self { url }
    }
}

impl WebSocketTransport {
    fn connect_stream(&self) -> Result<TcpStream, TelemetryError> {
        let uri: Uri = self
            .url
            .parse()
            .map_err(|e| TelemetryError::Open(format!("{}: {e}", self.url)))?;
        if uri.scheme_str() != Some("ws") {
            return Err(TelemetryError::Open(format!(
                "{}: only ws:// URLs are supported",
                self.url
            )));
        }
        let host = uri
            .host()
            .ok_or_else(|| TelemetryError::Open(format!("{}: missing host", self.url)))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        let port = uri.port_u16().unwrap_or(80);
        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(|e| TelemetryError::Open(format!("{}: {e}", self.url)))?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    log::debug!("connect {addr}: {e}");
                    last_err = Some(e);
                }
            }
        }
        Err(TelemetryError::Open(match last_err {
            Some(e) => format!("{}: {e}", self.url),
            None => format!("{}: no address for {host}", self.url),
        }))
    }
}

impl Transport for WebSocketTransport {
    fn open(&mut self) -> Result<Box<dyn Link>, TelemetryError> {
        let stream = self.connect_stream()?;
        // 握手期间也要有超时，否则一个不回应的服务器会卡住引擎线程
        let timeouts = stream
            .set_read_timeout(Some(CONNECT_TIMEOUT))
            .and_then(|()| stream.set_write_timeout(Some(CONNECT_TIMEOUT)));
        timeouts.map_err(|e| TelemetryError::Open(e.to_string()))?;

        let (socket, _response) =
            tungstenite::client(self.url.as_str(), stream).map_err(|e| match e {
                HandshakeError::Interrupted(_) => {
                    TelemetryError::Open(format!("{}: handshake timed out", self.url))
                }
                HandshakeError::Failure(e) => TelemetryError::Open(format!("{}: {e}", self.url)),
            })?;
        socket
            .get_ref()
            .set_read_timeout(Some(READ_TIMEOUT))
            .map_err(|e| TelemetryError::Open(e.to_string()))?;
        log::info!("WebSocket connected: {}", self.url);
        Ok(Box::new(WebSocketLink {
            socket,
            pending_open: true,
        }))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

struct WebSocketLink {
    socket: WebSocket<TcpStream>,
    pending_open: bool,
}

impl Link for WebSocketLink {
    fn poll_event(&mut self) -> Option<LinkEvent> {
        if std::mem::take(&mut self.pending_open) {
            return Some(LinkEvent::Opened);
        }
        match self.socket.read() {
            Ok(Message::Text(text)) => Some(LinkEvent::Message(text)),
            Ok(Message::Binary(data)) => {
                log::warn!("ignoring {}-byte binary frame", data.len());
                None
            }
            Ok(Message::Close(frame)) => {
                log::info!("WebSocket closed by server: {frame:?}");
                Some(LinkEvent::Closed)
            }
            // ping/pong are answered by tungstenite on the next read
            Ok(_) => None,
            Err(tungstenite::Error::Io(e))
                if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                None
            }
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                Some(LinkEvent::Closed)
            }
            Err(e) => Some(LinkEvent::Errored(e.to_string())),
        }
    }

    fn close(&mut self) {
        if let Err(e) = self.socket.close(None) {
            log::debug!("close handshake: {e}");
        }
        if let Err(e) = self.socket.flush() {
            log::debug!("flush on close: {e}");
        }
    }
}

// ============================================================
// 串口 (ESP32, "touch,adc_raw\n")
// ============================================================
pub const DEFAULT_BAUD_RATE: u32 = 9600;

pub struct SerialTransport {
    port: String,
    baud_rate: u32,
}

impl SerialTransport {
    pub fn new(port: String, baud_rate: u32) -> Self {
        Self { port, baud_rate }
    }
}

impl Transport for SerialTransport {
    fn open(&mut self) -> Result<Box<dyn Link>, TelemetryError> {
        let port = serialport::new(&self.port, self.baud_rate)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| TelemetryError::Open(format!("{}: {e}", self.port)))?;
        log::info!("serial port {} opened at {} baud", self.port, self.baud_rate);
        Ok(Box::new(LineLink::new(BufReader::new(port))))
    }

    fn wire_format(&self) -> WireFormat {
        WireFormat::SerialCsv
    }

    fn describe(&self) -> String {
        format!("{}@{}", self.port, self.baud_rate)
    }
}

/// Newline-framed reader that survives read timeouts mid-line.
struct LineLink<R> {
    reader: R,
    pending: Vec<u8>,
    pending_open: bool,
}

impl<R: BufRead> LineLink<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            pending: Vec::new(),
            pending_open: true,
        }
    }
}

impl<R: BufRead> Link for LineLink<R> {
    fn poll_event(&mut self) -> Option<LinkEvent> {
        if std::mem::take(&mut self.pending_open) {
            return Some(LinkEvent::Opened);
        }
        match self.reader.read_until(b'\n', &mut self.pending) {
            Ok(0) => Some(LinkEvent::Closed),
            Ok(_) if !self.pending.ends_with(b"\n") => None,
            Ok(_) => {
                let line = String::from_utf8_lossy(&self.pending).trim().to_owned();
                self.pending.clear();
                if line.is_empty() {
                    None
                } else {
                    Some(LinkEvent::Message(line))
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => None,
            Err(e) => Some(LinkEvent::Errored(e.to_string())),
        }
    }

    fn close(&mut self) {
        self.pending.clear();
    }
}

// ============================================================
// 模拟数据源
// ============================================================
const IDLE_LEVEL: f64 = 45.0;
const TOUCH_LEVEL: f64 = 8.0;
const MID_RAIL_VOLTS: f64 = 1.65;

pub struct SimulatedTransport {
    interval: Duration,
    seed: Option<u64>,
}

impl SimulatedTransport {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            seed: None,
        }
    }

    #[cfg(test)]
    fn with_seed(interval: Duration, seed: u64) -> Self {
        Self {
            interval,
            seed: Some(seed),
        }
    }
}

impl Transport for SimulatedTransport {
    fn open(&mut self) -> Result<Box<dyn Link>, TelemetryError> {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Box::new(SimulatedLink {
            rng,
            interval: self.interval,
            next_due: Instant::now(),
            level: IDLE_LEVEL,
            touch_remaining: 0,
            pending_open: true,
        }))
    }

    fn describe(&self) -> String {
        format!("simulation every {:?}", self.interval)
    }
}

struct SimulatedLink {
    rng: StdRng,
    interval: Duration,
    next_due: Instant,
    level: f64,
    touch_remaining: u32,
    pending_open: bool,
}

impl SimulatedLink {
    fn next_sample(&mut self) -> RawSample {
        if self.touch_remaining == 0 && self.rng.gen_bool(0.02) {
            self.touch_remaining = self.rng.gen_range(5..30);
        }
        let target = if self.touch_remaining > 0 {
            self.touch_remaining -= 1;
            TOUCH_LEVEL
        } else {
            IDLE_LEVEL
        };
        self.level += (target - self.level) * 0.3 + self.rng.gen_range(-1.5..1.5);
        RawSample {
            touch_value: self.level.round().max(0.0),
            voltage: MID_RAIL_VOLTS + self.rng.gen_range(-0.05..0.05),
        }
    }
}

impl Link for SimulatedLink {
    fn poll_event(&mut self) -> Option<LinkEvent> {
        if std::mem::take(&mut self.pending_open) {
            return Some(LinkEvent::Opened);
        }
        let now = Instant::now();
        if now < self.next_due {
            return None;
        }
        self.next_due = now + self.interval;
        let sample = self.next_sample();
        match serde_json::to_string(&sample) {
            Ok(json) => Some(LinkEvent::Message(json)),
            Err(e) => Some(LinkEvent::Errored(e.to_string())),
        }
    }

    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::net::TcpListener;
    use std::sync::mpsc::channel;
    use std::thread;

    #[test]
    fn silent_server_fails_open_instead_of_hanging() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        // 接受连接但从不回应升级请求
        thread::spawn(move || {
            let held = listener.accept();
            thread::sleep(Duration::from_secs(15));
            drop(held);
        });

        let (tx, rx) = channel();
        thread::spawn(move || {
            let mut transport = WebSocketTransport::new(format!("ws://{addr}/ws"));
            tx.send(transport.open().is_err()).ok();
        });
        let failed = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("open() did not return");
        assert!(failed);
    }

    #[test]
    fn websocket_link_maps_frames_to_events() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
            let mut ws = tungstenite::accept(stream).unwrap();
            ws.send(Message::Text(r#"{"touch_value": 12, "voltage": 1.5}"#.into()))
                .unwrap();
            ws.send(Message::Binary(vec![1, 2, 3])).unwrap();
            ws.close(None).unwrap();
            // 读到客户端的关闭回应（或超时）为止
            while ws.read().is_ok() {}
        });

        let mut link = WebSocketTransport::new(format!("ws://{addr}/ws"))
            .open()
            .unwrap();
        let mut events = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Some(event) = link.poll_event() {
                let closed = event == LinkEvent::Closed;
                events.push(event);
                if closed {
                    break;
                }
            }
        }
        link.close();
        server.join().unwrap();

        assert_eq!(
            events,
            vec![
                LinkEvent::Opened,
                LinkEvent::Message(r#"{"touch_value": 12, "voltage": 1.5}"#.into()),
                LinkEvent::Closed,
            ]
        );
        let sample = match &events[1] {
            LinkEvent::Message(json) => WireFormat::Json.decode(json).unwrap(),
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(sample.touch_value, 12.0);
    }

    #[test]
    fn non_ws_urls_are_rejected_up_front() {
        assert!(WebSocketTransport::new("wss://localhost:8000/ws".into()).open().is_err());
        assert!(WebSocketTransport::new("not a url".into()).open().is_err());
    }

    #[test]
    fn line_link_frames_serial_output() {
        let mut link = LineLink::new(Cursor::new(b"12,2048\n\r\n40,4095\r\n".to_vec()));
        assert_eq!(link.poll_event(), Some(LinkEvent::Opened));
        assert_eq!(link.poll_event(), Some(LinkEvent::Message("12,2048".into())));
        assert_eq!(link.poll_event(), None);
        assert_eq!(link.poll_event(), Some(LinkEvent::Message("40,4095".into())));
        assert_eq!(link.poll_event(), Some(LinkEvent::Closed));
    }

    #[test]
    fn line_link_holds_partial_line() {
        let mut link = LineLink::new(Cursor::new(b"12,20".to_vec()));
        link.poll_event();
        assert_eq!(link.poll_event(), None);
        assert_eq!(link.pending, b"12,20".to_vec());
    }

    #[test]
    fn simulation_emits_decodable_json() {
        let mut transport = SimulatedTransport::with_seed(Duration::ZERO, 7);
        let mut link = transport.open().unwrap();
        assert_eq!(link.poll_event(), Some(LinkEvent::Opened));
        for _ in 0..500 {
            match link.poll_event() {
                Some(LinkEvent::Message(json)) => {
                    let sample = WireFormat::Json.decode(&json).unwrap();
                    assert!(sample.touch_value >= 0.0);
                    assert!((sample.voltage - MID_RAIL_VOLTS).abs() < 0.051);
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn build_transport_picks_wire_format() {
        let serial = build_transport(&SourceConfig::Serial {
            port: "/dev/ttyUSB0".into(),
            baud_rate: DEFAULT_BAUD_RATE,
        });
        assert_eq!(serial.wire_format(), WireFormat::SerialCsv);
        assert_eq!(serial.describe(), "/dev/ttyUSB0@9600");
        let ws = build_transport(&SourceConfig::WebSocket {
            url: "ws://localhost:8000/ws".into(),
        });
        assert_eq!(ws.wire_format(), WireFormat::Json);
    }
}
