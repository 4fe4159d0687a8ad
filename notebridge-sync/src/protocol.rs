//! JSON wire protocol between the host and the remote input device.
//!
//! One text frame carries one object with a `type` discriminator:
//! ```text
//! {"type":"stroke_update","strokeId":"…","points":[{x,y,pressure,timestamp}…],
//!  "color":"#000000","width":2.0,"tool":"pen"}
//! {"type":"stroke_complete","strokeId":"…"}
//! {"type":"page_state","currentPage":0,"pageCount":3}
//! ```
//!
//! Decoding is two-stage: the `type` is read first so that frames from a
//! newer peer with unknown types can be skipped without being treated as
//! malformed.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use notebridge_core::{Point, StrokeId, Tool, DEFAULT_COLOR, DEFAULT_WIDTH};

/// Version string sent in `welcome`.
pub const PROTOCOL_VERSION: &str = "1.0.0";

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

fn default_width() -> f64 {
    DEFAULT_WIDTH
}

/// Wall-clock milliseconds since the Unix epoch, as carried in `timestamp` fields.
pub fn now_ms() -> f64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or_default()
}

/// Every message either side may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Message {
    /// Host → remote, first frame after accept.
    Welcome {
        device_name: String,
        protocol_version: String,
        timestamp: f64,
    },
    /// Remote → host heartbeat.
    Ping { timestamp: f64 },
    /// Host → remote, echoes the ping's timestamp.
    Pong { timestamp: f64 },
    /// A batch of new points for an open stroke.
    StrokeUpdate {
        stroke_id: StrokeId,
        points: Vec<Point>,
        #[serde(default = "default_color")]
        color: String,
        #[serde(default = "default_width")]
        width: f64,
        #[serde(default)]
        tool: Tool,
    },
    StrokeComplete { stroke_id: StrokeId },
    Undo,
    Redo,
    EraseAt { x: f64, y: f64 },
    PageSwitch { page: usize },
    PageAdd,
    /// Host → remote, after any navigation.
    PageState { current_page: usize, page_count: usize },
}

impl Message {
    /// Wire names of every known `type`.
    pub const TYPES: &'static [&'static str] = &[
        "welcome",
        "ping",
        "pong",
        "stroke_update",
        "stroke_complete",
        "undo",
        "redo",
        "erase_at",
        "page_switch",
        "page_add",
        "page_state",
    ];

    pub fn welcome(device_name: impl Into<String>) -> Self {
        Message::Welcome {
            device_name: device_name.into(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            timestamp: now_ms(),
        }
    }

    pub fn ping() -> Self {
        Message::Ping { timestamp: now_ms() }
    }

    pub fn page_state(current_page: usize, page_count: usize) -> Self {
        Message::PageState {
            current_page,
            page_count,
        }
    }

    /// The `type` string this message is sent under.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Welcome { .. } => "welcome",
            Message::Ping { .. } => "ping",
            Message::Pong { .. } => "pong",
            Message::StrokeUpdate { .. } => "stroke_update",
            Message::StrokeComplete { .. } => "stroke_complete",
            Message::Undo => "undo",
            Message::Redo => "redo",
            Message::EraseAt { .. } => "erase_at",
            Message::PageSwitch { .. } => "page_switch",
            Message::PageAdd => "page_add",
            Message::PageState { .. } => "page_state",
        }
    }

    /// Serialize to a text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::SerializationError(e.to_string()))
    }

    /// Reject values serde accepts but the document can't use.
    fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            Message::StrokeUpdate { points, width, .. } => {
                if points.is_empty() {
                    return Err(ProtocolError::InvalidPayload("empty point batch".into()));
                }
                if !points.iter().all(Point::is_finite) {
                    return Err(ProtocolError::InvalidPayload("non-finite point".into()));
                }
                if !(width.is_finite() && *width > 0.0) {
                    return Err(ProtocolError::InvalidPayload(format!("bad width {width}")));
                }
            }
            Message::EraseAt { x, y } => {
                if !(x.is_finite() && y.is_finite()) {
                    return Err(ProtocolError::InvalidPayload("non-finite erase point".into()));
                }
            }
            Message::Ping { timestamp } | Message::Pong { timestamp } => {
                if !timestamp.is_finite() {
                    return Err(ProtocolError::InvalidPayload("non-finite timestamp".into()));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// A decoded text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Message(Message),
    /// Well-formed frame with a `type` this build doesn't know.
    Unknown(String),
}

/// Decode one text frame.
pub fn decode(text: &str) -> Result<Frame, ProtocolError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::DeserializationError(e.to_string()))?;

    let kind = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or(ProtocolError::MissingType)?;
    if !Message::TYPES.contains(&kind) {
        return Ok(Frame::Unknown(kind.to_string()));
    }

    let message: Message = serde_json::from_value(value)
        .map_err(|e| ProtocolError::DeserializationError(e.to_string()))?;
    message.validate()?;
    Ok(Frame::Message(message))
}

/// Protocol errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolError {
    SerializationError(String),
    DeserializationError(String),
    /// Object without a string `type` field.
    MissingType,
    /// Parsed but semantically unusable.
    InvalidPayload(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SerializationError(e) => write!(f, "Serialization error: {e}"),
            Self::DeserializationError(e) => write!(f, "Deserialization error: {e}"),
            Self::MissingType => write!(f, "Frame has no type field"),
            Self::InvalidPayload(e) => write!(f, "Invalid payload: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode_msg(text: &str) -> Message {
        match decode(text).unwrap() {
            Frame::Message(m) => m,
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[test]
    fn test_stroke_update_wire_shape() {
        let msg = Message::StrokeUpdate {
            stroke_id: StrokeId::from("s1"),
            points: vec![Point::new(0.1, 0.2, 0.5, 1000.0)],
            color: "#e53935".into(),
            width: 3.0,
            tool: Tool::Pen,
        };
        let value: serde_json::Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "stroke_update",
                "strokeId": "s1",
                "points": [{"x": 0.1, "y": 0.2, "pressure": 0.5, "timestamp": 1000.0}],
                "color": "#e53935",
                "width": 3.0,
                "tool": "pen"
            })
        );
    }

    #[test]
    fn test_unit_messages() {
        assert_eq!(Message::Undo.encode().unwrap(), r#"{"type":"undo"}"#);
        assert_eq!(decode_msg(r#"{"type":"page_add"}"#), Message::PageAdd);
        assert_eq!(decode_msg(r#"{"type":"redo","extra":1}"#), Message::Redo);
    }

    #[test]
    fn test_page_state_field_names() {
        let text = Message::page_state(2, 5).encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"type": "page_state", "currentPage": 2, "pageCount": 5}));
    }

    #[test]
    fn test_welcome_carries_version() {
        let msg = decode_msg(&Message::welcome("Studio Mac").encode().unwrap());
        match msg {
            Message::Welcome {
                device_name,
                protocol_version,
                timestamp,
            } => {
                assert_eq!(device_name, "Studio Mac");
                assert_eq!(protocol_version, PROTOCOL_VERSION);
                assert!(timestamp > 0.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_stroke_update_defaults() {
        let msg = decode_msg(
            r#"{"type":"stroke_update","strokeId":"a","points":[{"x":0.5,"y":0.5,"pressure":1.0,"timestamp":0}]}"#,
        );
        match msg {
            Message::StrokeUpdate {
                color, width, tool, ..
            } => {
                assert_eq!(color, DEFAULT_COLOR);
                assert_eq!(width, DEFAULT_WIDTH);
                assert_eq!(tool, Tool::Pen);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_is_not_an_error() {
        assert_eq!(
            decode(r#"{"type":"laser_pointer","x":0.1}"#).unwrap(),
            Frame::Unknown("laser_pointer".into())
        );
    }

    #[test]
    fn test_missing_type_rejected() {
        assert_eq!(decode(r#"{"x":1}"#), Err(ProtocolError::MissingType));
        assert_eq!(decode(r#"{"type":7}"#), Err(ProtocolError::MissingType));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            decode("not json"),
            Err(ProtocolError::DeserializationError(_))
        ));
    }

    #[test]
    fn test_known_type_bad_fields_rejected() {
        assert!(matches!(
            decode(r#"{"type":"erase_at","x":"left"}"#),
            Err(ProtocolError::DeserializationError(_))
        ));
        assert!(matches!(
            decode(r#"{"type":"page_switch","page":-1}"#),
            Err(ProtocolError::DeserializationError(_))
        ));
    }

    #[test]
    fn test_empty_batch_rejected() {
        assert!(matches!(
            decode(r#"{"type":"stroke_update","strokeId":"a","points":[]}"#),
            Err(ProtocolError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_non_positive_width_rejected() {
        assert!(matches!(
            decode(
                r#"{"type":"stroke_update","strokeId":"a","width":0,
                    "points":[{"x":0,"y":0,"pressure":1,"timestamp":0}]}"#
            ),
            Err(ProtocolError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_kind_matches_wire_type() {
        let msgs = [
            Message::ping(),
            Message::Pong { timestamp: 1.0 },
            Message::StrokeComplete {
                stroke_id: StrokeId::from("x"),
            },
            Message::EraseAt { x: 0.1, y: 0.2 },
            Message::PageSwitch { page: 1 },
            Message::page_state(0, 1),
        ];
        for msg in msgs {
            let value: serde_json::Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
            assert_eq!(value["type"], msg.kind());
            assert!(Message::TYPES.contains(&msg.kind()));
        }
    }
}
