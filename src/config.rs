// src/config.rs
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::connection::RECONNECT_DELAY;
use crate::drivers::{parse_threshold, DEFAULT_THRESHOLD};
use crate::transports::DEFAULT_BAUD_RATE;

pub const CONFIG_ENV: &str = "TOUCHSCOPE_CONFIG";
pub const URL_ENV: &str = "TOUCHSCOPE_URL";
pub const THRESHOLD_ENV: &str = "TOUCHSCOPE_THRESHOLD";
pub const DEFAULT_URL: &str = "ws://localhost:8000/ws";

/// Where samples come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    WebSocket {
        url: String,
    },
    /// ESP32 wired straight to this machine (e.g. /dev/ttyUSB0, COM3).
    Serial {
        port: String,
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
    },
    Simulation {
        #[serde(default = "default_interval_ms")]
        interval_ms: u64,
    },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::WebSocket {
            url: DEFAULT_URL.to_owned(),
        }
    }
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_interval_ms() -> u64 {
    50
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub source: SourceConfig,
    pub reconnect_delay_ms: u64,
    /// Initial threshold; the viewer can change it at runtime.
    pub threshold: f64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            reconnect_delay_ms: RECONNECT_DELAY.as_millis() as u64,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl ViewerConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: ViewerConfig =
            serde_json::from_str(text).context("invalid viewer config JSON")?;
        Ok(config)
    }

    /// Read the file named by `TOUCHSCOPE_CONFIG` (if set), then apply
    /// `TOUCHSCOPE_URL` and `TOUCHSCOPE_THRESHOLD`.
    pub fn load() -> Result<Self> {
        let config = match std::env::var(CONFIG_ENV) {
            Ok(path) => {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config file {path}"))?;
                Self::from_json(&text).with_context(|| format!("in {path}"))?
            }
            Err(_) => Self::default(),
        };
        Ok(config
            .with_url_override(std::env::var(URL_ENV).ok())
            .with_threshold_override(std::env::var(THRESHOLD_ENV).ok()))
    }

    pub fn with_url_override(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.source = SourceConfig::WebSocket { url };
        }
        self
    }

    /// Same fallback as the viewer's text box: unusable text keeps the
    /// configured threshold.
    pub fn with_threshold_override(mut self, text: Option<String>) -> Self {
        if let Some(text) = text {
            self.threshold = parse_threshold(&text, self.threshold);
        }
        self
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_sensor_backend() {
        let config = ViewerConfig::default();
        assert_eq!(config.source, SourceConfig::WebSocket { url: DEFAULT_URL.into() });
        assert_eq!(config.reconnect_delay(), Duration::from_millis(2000));
        assert_eq!(config.threshold, 20.0);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = ViewerConfig::from_json(
            r#"{"source": {"type": "serial", "port": "/dev/ttyUSB0"}, "threshold": 15}"#,
        )
        .unwrap();
        assert_eq!(
            config.source,
            SourceConfig::Serial {
                port: "/dev/ttyUSB0".into(),
                baud_rate: 9600
            }
        );
        assert_eq!(config.threshold, 15.0);
        assert_eq!(config.reconnect_delay_ms, 2000);
    }

    #[test]
    fn simulation_source_parses() {
        let config = ViewerConfig::from_json(r#"{"source": {"type": "simulation"}}"#).unwrap();
        assert_eq!(config.source, SourceConfig::Simulation { interval_ms: 50 });
    }

    #[test]
    fn bad_json_is_reported() {
        assert!(ViewerConfig::from_json(r#"{"source": {"type": "carrier-pigeon"}}"#).is_err());
    }

    #[test]
    fn url_override_switches_to_websocket() {
        let config = ViewerConfig {
            source: SourceConfig::Simulation { interval_ms: 10 },
            ..ViewerConfig::default()
        }
        .with_url_override(Some("ws://10.0.0.5:8000/ws".into()));
        assert_eq!(
            config.source,
            SourceConfig::WebSocket { url: "ws://10.0.0.5:8000/ws".into() }
        );
        let unchanged = ViewerConfig::default().with_url_override(Some("  ".into()));
        assert_eq!(unchanged.source, SourceConfig::default());
    }

    #[test]
    fn threshold_override_falls_back_on_bad_text() {
        let config = ViewerConfig::default().with_threshold_override(Some(" 12.5 ".into()));
        assert_eq!(config.threshold, 12.5);
        let kept = config.clone().with_threshold_override(Some("NaN".into()));
        assert_eq!(kept.threshold, 12.5);
        let kept = kept.with_threshold_override(Some("abc".into()));
        assert_eq!(kept.threshold, 12.5);
        assert_eq!(ViewerConfig::default().with_threshold_override(None).threshold, 20.0);
    }
}
