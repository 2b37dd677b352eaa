//! Inbound feed decoding.
//!
//! The realtime connection itself lives outside this crate; what arrives here
//! is one text frame (or line) at a time. Two framings are understood:
//!
//! - `packet`: the upstream socket's JSON arrays. `[5, {"cmd": 6005}]` asks
//!   for a prediction, `[5, {"cmd": 1015, "d": {"cmd": 6006, "d1": .., "d2": ..,
//!   "d3": ..}}]` carries a resolved round and `[1, false, 100]` reports an
//!   expired session token. Everything else is ignored.
//! - `json`: `{"type": "round", "d1": .., "d2": .., "d3": ..}` and
//!   `{"type": "predict"}`, one object per line.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::Dice;
use crate::error::{DpeError, Result};

const PACKET_MESSAGE: i64 = 5;
const PACKET_AUTH: i64 = 1;
const AUTH_REJECTED: i64 = 100;
const CMD_PREDICT: i64 = 6005;
const CMD_BROADCAST: i64 = 1015;
const CMD_ROUND_RESULT: i64 = 6006;

/// Something the engine has to react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedEvent {
    Round(Dice),
    Predict,
    /// The upstream session was rejected; reconnecting is the feed's job.
    SessionExpired,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedFormat {
    #[default]
    Packet,
    Json,
}

impl FeedFormat {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Packet => "packet",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for FeedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedFormat {
    type Err = DpeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "packet" | "packets" => Ok(Self::Packet),
            "json" | "jsonl" | "ndjson" => Ok(Self::Json),
            other => Err(DpeError::Config(format!(
                "invalid feed format {other} (expected packet|json)"
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum JsonLine {
    Round { d1: u8, d2: u8, d3: u8 },
    Predict,
}

/// Decode one frame. `Ok(None)` means the frame is valid but not for us.
pub fn decode(format: FeedFormat, line: &str) -> Result<Option<FeedEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    match format {
        FeedFormat::Packet => decode_packet(line),
        FeedFormat::Json => decode_json_line(line),
    }
}

fn decode_json_line(line: &str) -> Result<Option<FeedEvent>> {
    let parsed: JsonLine = serde_json::from_str(line)
        .map_err(|err| DpeError::Feed(format!("invalid feed line: {err}")))?;
    match parsed {
        JsonLine::Predict => Ok(Some(FeedEvent::Predict)),
        JsonLine::Round { d1, d2, d3 } => round_event(Dice::new(d1, d2, d3)).map(Some),
    }
}

fn decode_packet(line: &str) -> Result<Option<FeedEvent>> {
    let value: Value = serde_json::from_str(line)
        .map_err(|err| DpeError::Feed(format!("invalid packet: {err}")))?;
    let Some(frame) = value.as_array() else {
        return Ok(None);
    };

    if is_auth_rejection(frame) {
        return Ok(Some(FeedEvent::SessionExpired));
    }

    if frame.first().and_then(Value::as_i64) != Some(PACKET_MESSAGE) {
        return Ok(None);
    }
    let Some(payload) = frame.get(1) else {
        return Ok(None);
    };

    match payload.get("cmd").and_then(Value::as_i64) {
        Some(CMD_PREDICT) => Ok(Some(FeedEvent::Predict)),
        Some(CMD_BROADCAST) => {
            let Some(data) = payload.get("d") else {
                return Ok(None);
            };
            if data.get("cmd").and_then(Value::as_i64) != Some(CMD_ROUND_RESULT) {
                return Ok(None);
            }
            let dice = Dice::new(face(data, "d1")?, face(data, "d2")?, face(data, "d3")?);
            round_event(dice).map(Some)
        }
        _ => Ok(None),
    }
}

fn is_auth_rejection(frame: &[Value]) -> bool {
    frame.len() >= 3
        && frame[0].as_i64() == Some(PACKET_AUTH)
        && frame[1].as_bool() == Some(false)
        && frame[2].as_i64() == Some(AUTH_REJECTED)
}

fn face(data: &Value, field: &str) -> Result<u8> {
    data.get(field)
        .and_then(Value::as_u64)
        .and_then(|v| u8::try_from(v).ok())
        .ok_or_else(|| DpeError::Feed(format!("round result missing numeric {field}")))
}

fn round_event(dice: Dice) -> Result<FeedEvent> {
    if !dice.is_valid() {
        return Err(DpeError::Feed(format!(
            "die face out of range: {:?}",
            dice.0
        )));
    }
    Ok(FeedEvent::Round(dice))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_predict_request() {
        let event = decode(FeedFormat::Packet, r#"[5, {"cmd": 6005}]"#).unwrap();
        assert_eq!(event, Some(FeedEvent::Predict));
    }

    #[test]
    fn packet_round_result() {
        let line = r#"[5, {"cmd": 1015, "d": {"cmd": 6006, "d1": 3, "d2": 5, "d3": 6, "sid": 991}}]"#;
        let event = decode(FeedFormat::Packet, line).unwrap();
        assert_eq!(event, Some(FeedEvent::Round(Dice::new(3, 5, 6))));
    }

    #[test]
    fn packet_other_broadcasts_are_ignored() {
        let line = r#"[5, {"cmd": 1015, "d": {"cmd": 6001, "bs": []}}]"#;
        assert_eq!(decode(FeedFormat::Packet, line).unwrap(), None);
        assert_eq!(decode(FeedFormat::Packet, r#"[7, "ping"]"#).unwrap(), None);
        assert_eq!(decode(FeedFormat::Packet, r#"{"cmd": 6005}"#).unwrap(), None);
    }

    #[test]
    fn packet_auth_rejection() {
        let event = decode(FeedFormat::Packet, "[1, false, 100, \"token expired\"]").unwrap();
        assert_eq!(event, Some(FeedEvent::SessionExpired));
    }

    #[test]
    fn out_of_range_faces_are_rejected() {
        let line = r#"[5, {"cmd": 1015, "d": {"cmd": 6006, "d1": 0, "d2": 5, "d3": 6}}]"#;
        assert!(matches!(decode(FeedFormat::Packet, line), Err(DpeError::Feed(_))));
        let line = r#"{"type": "round", "d1": 7, "d2": 1, "d3": 1}"#;
        assert!(matches!(decode(FeedFormat::Json, line), Err(DpeError::Feed(_))));
    }

    #[test]
    fn json_lines() {
        assert_eq!(
            decode(FeedFormat::Json, r#"{"type": "round", "d1": 1, "d2": 1, "d3": 2}"#).unwrap(),
            Some(FeedEvent::Round(Dice::new(1, 1, 2)))
        );
        assert_eq!(
            decode(FeedFormat::Json, r#"{"type": "predict"}"#).unwrap(),
            Some(FeedEvent::Predict)
        );
        assert_eq!(decode(FeedFormat::Json, "   ").unwrap(), None);
        assert!(decode(FeedFormat::Json, "not json").is_err());
    }

    #[test]
    fn format_parsing() {
        assert_eq!("JSONL".parse::<FeedFormat>().unwrap(), FeedFormat::Json);
        assert_eq!("packet".parse::<FeedFormat>().unwrap(), FeedFormat::Packet);
        assert!("xml".parse::<FeedFormat>().is_err());
    }
}
