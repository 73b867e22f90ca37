use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

pub const MAX_STROKE_WIDTH: u32 = 100;
pub const MAX_COLOR_LEN: usize = 32;
pub const DEFAULT_COLOR: &str = "#000000";

// Upper bound on a decoded binary frame. A stroke is a few dozen bytes; the
// limit keeps declared lengths from driving allocation.
const MAX_BINARY_FRAME_LEN: usize = 4 * 1024;

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// One drawn line segment.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
pub struct Stroke {
    pub from: Point,
    pub to: Point,
    pub color: String,
    pub width: u32,
}

impl Stroke {
    /// Normalizes a stroke received from a client. Returns `None` when the
    /// segment cannot be drawn at all.
    pub fn sanitize(mut self) -> Option<Self> {
        if !self.from.is_finite() || !self.to.is_finite() {
            return None;
        }
        if self.width == 0 {
            return None;
        }
        self.width = self.width.min(MAX_STROKE_WIDTH);
        self.color = sanitize_color(self.color);
        Some(self)
    }
}

fn sanitize_color(mut color: String) -> String {
    if color.is_empty() {
        return DEFAULT_COLOR.to_string();
    }
    if color.len() > MAX_COLOR_LEN {
        let mut end = MAX_COLOR_LEN;
        while !color.is_char_boundary(end) {
            end -= 1;
        }
        color.truncate(end);
    }
    color
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "stroke")]
    Stroke { stroke: Stroke },
}

impl ClientMessage {
    /// Decodes a JSON text frame. Unknown message types, malformed payloads
    /// and undrawable strokes all come back as `None`.
    pub fn decode_text(text: &str) -> Option<Self> {
        serde_json::from_str::<ClientMessage>(text)
            .ok()
            .and_then(ClientMessage::sanitize)
    }

    /// Decodes a bincode binary frame.
    pub fn decode_binary(data: &[u8]) -> Option<Self> {
        if data.len() > MAX_BINARY_FRAME_LEN {
            return None;
        }
        let config = bincode::config::standard().with_limit::<MAX_BINARY_FRAME_LEN>();
        bincode::decode_from_slice::<ClientMessage, _>(data, config)
            .ok()
            .and_then(|(message, _)| message.sanitize())
    }

    pub fn encode_binary(&self) -> Result<Vec<u8>, bincode::error::EncodeError> {
        bincode::encode_to_vec(self, bincode::config::standard())
    }

    fn sanitize(self) -> Option<Self> {
        match self {
            ClientMessage::Stroke { stroke } => {
                stroke.sanitize().map(|stroke| ClientMessage::Stroke { stroke })
            }
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "stroke")]
    Stroke { stroke: Stroke },
}

impl ServerMessage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stroke(width: u32, color: &str) -> Stroke {
        Stroke {
            from: Point::new(0.0, 0.0),
            to: Point::new(10.0, 10.0),
            color: color.to_string(),
            width,
        }
    }

    #[test]
    fn decodes_stroke_envelope() {
        let text = r##"{"type":"stroke","stroke":{"from":{"x":0,"y":0},"to":{"x":10,"y":10},"color":"#000","width":2}}"##;
        let message = ClientMessage::decode_text(text).unwrap();
        assert_eq!(
            message,
            ClientMessage::Stroke {
                stroke: stroke(2, "#000")
            }
        );
    }

    #[test]
    fn ignores_unknown_type() {
        let text = r#"{"type":"clear"}"#;
        assert!(ClientMessage::decode_text(text).is_none());
    }

    #[test]
    fn ignores_malformed_json() {
        assert!(ClientMessage::decode_text("{not json").is_none());
        assert!(ClientMessage::decode_text(r#"{"type":"stroke"}"#).is_none());
        assert!(ClientMessage::decode_text(
            r#"{"type":"stroke","stroke":{"from":{"x":0,"y":0},"to":{"x":1,"y":1},"color":"red","width":-3}}"#
        )
        .is_none());
    }

    #[test]
    fn rejects_zero_width() {
        assert!(stroke(0, "red").sanitize().is_none());
    }

    #[test]
    fn rejects_non_finite_points() {
        let mut s = stroke(2, "red");
        s.to.x = f64::NAN;
        assert!(s.sanitize().is_none());
    }

    #[test]
    fn clamps_width_and_fills_color() {
        let s = stroke(5000, "").sanitize().unwrap();
        assert_eq!(s.width, MAX_STROKE_WIDTH);
        assert_eq!(s.color, DEFAULT_COLOR);
    }

    #[test]
    fn truncates_long_color_on_char_boundary() {
        let color = "é".repeat(40);
        let s = stroke(1, &color).sanitize().unwrap();
        assert!(s.color.len() <= MAX_COLOR_LEN);
        assert!(s.color.chars().all(|c| c == 'é'));
    }

    #[test]
    fn binary_frame_decodes() {
        let message = ClientMessage::Stroke {
            stroke: stroke(3, "#ff0000"),
        };
        let payload = message.encode_binary().unwrap();
        assert_eq!(ClientMessage::decode_binary(&payload), Some(message));
        assert!(ClientMessage::decode_binary(&[0xff, 0x00, 0x13]).is_none());
    }

    #[test]
    fn server_message_matches_wire_shape() {
        let json = ServerMessage::Stroke {
            stroke: stroke(2, "#000"),
        }
        .to_json()
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "stroke");
        assert_eq!(value["stroke"]["width"], 2);
        assert_eq!(value["stroke"]["to"]["x"], 10.0);
    }

    #[test]
    fn binary_frame_with_huge_declared_length_is_dropped() {
        // Variant 0, two points, then a color whose varint length claims 2^40 bytes.
        let mut frame = vec![0u8];
        frame.extend_from_slice(&[0u8; 32]);
        frame.push(253);
        frame.extend_from_slice(&(1u64 << 40).to_le_bytes());
        assert!(ClientMessage::decode_binary(&frame).is_none());
    }

    #[test]
    fn oversized_binary_frame_is_dropped() {
        let frame = vec![0u8; MAX_BINARY_FRAME_LEN + 1];
        assert!(ClientMessage::decode_binary(&frame).is_none());
    }
}
