//! Color payload and its wire mapping.

use serde::Serialize;
use serde_json::{Map, Value};

/// The mapping exchanged with the peer: named fields with JSON values.
pub type TransportMap = Map<String, Value>;

pub const COLOR_NAME_KEY: &str = "colorName";
pub const RED_KEY: &str = "red";
pub const GREEN_KEY: &str = "green";
pub const BLUE_KEY: &str = "blue";
pub const ALPHA_KEY: &str = "alpha";

/// A named RGBA color.
///
/// Channels are nominally in `[0, 1]` but are never clamped: whatever the
/// sender puts in is what the receiver gets. Use [`Self::is_in_unit_range`]
/// to check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorPayload {
    #[serde(rename = "colorName")]
    pub name: String,
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub alpha: f64,
}

impl ColorPayload {
    pub fn new(name: impl Into<String>, red: f64, green: f64, blue: f64, alpha: f64) -> Self {
        Self {
            name: name.into(),
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Opaque black named "default"; what a display shows before any color arrives.
    pub fn placeholder() -> Self {
        Self::new("default", 0.0, 0.0, 0.0, 1.0)
    }

    /// True when every channel lies in `[0, 1]`.
    pub fn is_in_unit_range(&self) -> bool {
        [self.red, self.green, self.blue, self.alpha]
            .iter()
            .all(|c| (0.0..=1.0).contains(c))
    }

    /// `#RRGGBBAA`, channels clamped and rounded for display only.
    pub fn to_hex(&self) -> String {
        let byte = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!(
            "#{:02X}{:02X}{:02X}{:02X}",
            byte(self.red),
            byte(self.green),
            byte(self.blue),
            byte(self.alpha)
        )
    }
}

/// Why a received map is not a color.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedPayload {
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' must be a number, found {found}")]
    NotANumber {
        field: &'static str,
        found: &'static str,
    },

    #[error("field '{field}' must be a string, found {found}")]
    NotAString {
        field: &'static str,
        found: &'static str,
    },
}

/// Build the wire mapping for `payload`.
///
/// Non-finite channels have no JSON representation and are written as
/// `null`, which [`decode`] rejects.
pub fn encode(payload: &ColorPayload) -> TransportMap {
    let mut map = TransportMap::new();
    map.insert(COLOR_NAME_KEY.to_string(), Value::from(payload.name.as_str()));
    map.insert(RED_KEY.to_string(), Value::from(payload.red));
    map.insert(GREEN_KEY.to_string(), Value::from(payload.green));
    map.insert(BLUE_KEY.to_string(), Value::from(payload.blue));
    map.insert(ALPHA_KEY.to_string(), Value::from(payload.alpha));
    map
}

/// Read a color out of a received mapping.
///
/// Integers are accepted as channels; numeric strings are not. Unknown keys
/// are ignored.
pub fn decode(map: &TransportMap) -> Result<ColorPayload, MalformedPayload> {
    let name = match map.get(COLOR_NAME_KEY) {
        Some(Value::String(name)) => name.clone(),
        Some(other) => {
            return Err(MalformedPayload::NotAString {
                field: COLOR_NAME_KEY,
                found: json_type(other),
            })
        }
        None => return Err(MalformedPayload::MissingField(COLOR_NAME_KEY)),
    };

    Ok(ColorPayload {
        name,
        red: channel(map, RED_KEY)?,
        green: channel(map, GREEN_KEY)?,
        blue: channel(map, BLUE_KEY)?,
        alpha: channel(map, ALPHA_KEY)?,
    })
}

fn channel(map: &TransportMap, field: &'static str) -> Result<f64, MalformedPayload> {
    let value = map
        .get(field)
        .ok_or(MalformedPayload::MissingField(field))?;
    value.as_f64().ok_or(MalformedPayload::NotANumber {
        field,
        found: json_type(value),
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn map(value: Value) -> TransportMap {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn encode_uses_wire_keys() {
        let encoded = encode(&ColorPayload::new("紅色", 1.0, 0.0, 0.0, 1.0));
        assert_eq!(
            Value::Object(encoded),
            json!({"colorName": "紅色", "red": 1.0, "green": 0.0, "blue": 0.0, "alpha": 1.0})
        );
    }

    #[test]
    fn decode_inverts_encode() {
        for payload in [
            ColorPayload::new("藍色", 0.0, 0.478, 1.0, 1.0),
            ColorPayload::new("", 0.25, 0.5, 0.75, 0.1),
            ColorPayload::placeholder(),
        ] {
            assert_eq!(decode(&encode(&payload)), Ok(payload));
        }
    }

    #[test]
    fn decode_accepts_integer_channels_and_ignores_extra_keys() {
        let decoded = decode(&map(json!({
            "colorName": "white", "red": 1, "green": 1, "blue": 1, "alpha": 1, "source": "phone"
        })))
        .unwrap();
        assert_eq!(decoded, ColorPayload::new("white", 1.0, 1.0, 1.0, 1.0));
    }

    #[test]
    fn decode_passes_out_of_range_values_through() {
        let decoded = decode(&map(json!({
            "colorName": "hot", "red": 1.5, "green": -0.2, "blue": 0.0, "alpha": 2.0
        })))
        .unwrap();
        assert_eq!(decoded.red, 1.5);
        assert_eq!(decoded.green, -0.2);
        assert!(!decoded.is_in_unit_range());
    }

    #[test]
    fn each_missing_field_is_reported() {
        for key in [COLOR_NAME_KEY, RED_KEY, GREEN_KEY, BLUE_KEY, ALPHA_KEY] {
            let mut incomplete = encode(&ColorPayload::new("x", 0.1, 0.2, 0.3, 0.4));
            incomplete.remove(key);
            assert_eq!(decode(&incomplete), Err(MalformedPayload::MissingField(key)));
        }
    }

    #[test]
    fn numeric_string_channel_is_rejected() {
        let result = decode(&map(json!({
            "colorName": "x", "red": "1.0", "green": 0, "blue": 0, "alpha": 1
        })));
        assert_eq!(
            result,
            Err(MalformedPayload::NotANumber {
                field: RED_KEY,
                found: "string"
            })
        );
    }

    #[test]
    fn non_string_name_is_rejected() {
        let result = decode(&map(json!({
            "colorName": 7, "red": 0, "green": 0, "blue": 0, "alpha": 1
        })));
        assert_eq!(
            result,
            Err(MalformedPayload::NotAString {
                field: COLOR_NAME_KEY,
                found: "number"
            })
        );
    }

    #[test]
    fn non_finite_channel_does_not_survive_the_wire() {
        let encoded = encode(&ColorPayload::new("nan", f64::NAN, 0.0, 0.0, 1.0));
        assert_eq!(encoded[RED_KEY], Value::Null);
        assert!(matches!(
            decode(&encoded),
            Err(MalformedPayload::NotANumber { found: "null", .. })
        ));
    }

    #[test]
    fn hex_rendering_clamps_for_display() {
        assert_eq!(ColorPayload::new("r", 1.0, 0.0, 0.0, 1.0).to_hex(), "#FF0000FF");
        assert_eq!(ColorPayload::new("o", 2.0, -1.0, 0.5, 1.0).to_hex(), "#FF0080FF");
    }
}
