use serde::{Deserialize, Serialize};
use crate::drivers::TelemetryError;
/// Full-scale reading of the ESP32 ADC.
pub const ADC_FULL_SCALE: f64 = 4095.0;
/// Input range of the ADC at 11 dB attenuation (volts).
pub const ADC_REFERENCE_VOLTS: f64 = 3.3;
/// One reading as produced by the sensor feed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSample {
    pub touch_value: f64,
    pub voltage: f64,
}
/// A `RawSample` stamped with its ingestion sequence number.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct IndexedSample {
    pub index: u64,
    pub touch_value: f64,
    pub voltage: f64,
}
/// How a link frames its payloads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireFormat {
    /// `{"touch_value": .., "voltage": ..}` per message.
    Json,
    /// `"<touch>,<adc_raw>"` per line, straight off the sensor's UART.
    SerialCsv,
}
impl WireFormat {
    pub fn decode(self, payload: &str) -> Result<RawSample, TelemetryError> {
        match self {
            WireFormat::Json => decode_json(payload),
            WireFormat::SerialCsv => decode_serial_line(payload),
        }
    }
}
pub fn decode_json(payload: &str) -> Result<RawSample, TelemetryError> {
    Ok(serde_json::from_str(payload)?)
}
/// Parse one UART line. The sensor reports the raw ADC count, which is mapped
/// onto 0..3.3 V and rounded to millivolts.
pub fn decode_serial_line(line: &str) -> Result<RawSample, TelemetryError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(TelemetryError::MalformedPayload("empty line".into()));
    }
    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() != 2 {
        return Err(TelemetryError::MalformedPayload(format!(
            "expected 2 fields, got {}: {line:?}",
            parts.len()
        )));
    }
    let parse = |field: &str| {
        field
            .trim()
            .parse::<i64>()
            .map_err(|e| TelemetryError::MalformedPayload(format!("{field:?}: {e}")))
    };
    let touch_value = parse(parts[0])?;
    let adc_raw = parse(parts[1])?;
    Ok(RawSample {
        touch_value: touch_value as f64,
        voltage: adc_to_volts(adc_raw),
    })
}
pub fn adc_to_volts(adc_raw: i64) -> f64 {
    let volts = adc_raw as f64 / ADC_FULL_SCALE * ADC_REFERENCE_VOLTS;
    (volts * 1000.0).round() / 1000.0
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn json_payload_decodes() {
        let sample = decode_json(r#"{"touch_value": 18, "voltage": 1.234}"#).unwrap();
        assert_eq!(sample.touch_value, 18.0);
        assert_eq!(sample.voltage, 1.234);
    }
    #[test]
    fn json_payload_rejects_wrong_shapes() {
        assert!(decode_json("not json").is_err());
        assert!(decode_json(r#"{"touch_value": 18}"#).is_err());
        assert!(decode_json(r#"{"touch_value": "x", "voltage": 1.0}"#).is_err());
        assert!(decode_json(r#"{"touch_value": 1, "voltage": 1.0, "extra": 2}"#).is_err());
    }
    #[test]
    fn serial_line_maps_adc_to_volts() {
        let sample = decode_serial_line("12,4095\r\n").unwrap();
        assert_eq!(sample.touch_value, 12.0);
        assert_eq!(sample.voltage, 3.3);
        let half = decode_serial_line("40, 2048").unwrap();
        assert_eq!(half.voltage, 1.65);
        assert_eq!(adc_to_volts(0), 0.0);
    }
    #[test]
    fn serial_line_drops_noise() {
        assert!(decode_serial_line("").is_err());
        assert!(decode_serial_line("12").is_err());
        assert!(decode_serial_line("1,2,3").is_err());
        assert!(decode_serial_line("boot: ok,x").is_err());
    }
    #[test]
    fn wire_format_dispatches() {
        assert!(WireFormat::Json.decode("12,100").is_err());
        assert!(WireFormat::SerialCsv.decode("12,100").is_ok());
    }
}
