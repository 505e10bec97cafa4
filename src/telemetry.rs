//! Telemetry Message Model
//!
//! A reading is an open record: a required `device_id` routing key, a
//! timestamp, and any subset of named scalar fields. The relay never
//! interprets fields beyond the routing key, so everything else lives in a
//! flattened map rather than a fixed struct.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Field names commonly sent by cot-side devices.
///
/// Purely advisory; the relay accepts any field name.
pub mod fields {
    pub const RESPIRATION_RATE: &str = "respiration_rate";
    pub const HEART_RATE: &str = "heart_rate";
    pub const SKIN_TEMP_C: &str = "skin_temp_c";
    pub const AMBIENT_TEMP_C: &str = "ambient_temp_c";
    pub const H2S_LEVEL: &str = "h2s_level";
    pub const NOISE_DB: &str = "noise_db";
    pub const PRESENCE: &str = "presence";
    pub const EVENT: &str = "event";
}

/// A single scalar field value.
///
/// The closed set of shapes a telemetry field may take on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Null,
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<Value> for FieldValue {
    /// Scalars map directly; arrays and objects are rendered as their JSON
    /// string form rather than rejected.
    fn from(v: Value) -> Self {
        match v {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => n
                .as_f64()
                .map(FieldValue::Number)
                .unwrap_or_else(|| FieldValue::Text(n.to_string())),
            Value::String(s) => FieldValue::Text(s),
            other => FieldValue::Text(other.to_string()),
        }
    }
}

/// One telemetry reading from a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// Routing key. A reading without one is unroutable and never reaches
    /// the hub.
    pub device_id: String,
    /// Reading time, UTC. Defaults to receipt time when the device omits it.
    #[serde(default = "Utc::now")]
    pub ts: DateTime<Utc>,
    /// All remaining fields of the reading.
    #[serde(flatten)]
    pub fields: HashMap<String, FieldValue>,
}

impl Telemetry {
    /// Create a reading stamped with the current time.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            ts: Utc::now(),
            fields: HashMap::new(),
        }
    }

    /// Builder-style field attachment.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Build a reading from a decoded JSON frame.
    ///
    /// `fallback_device` fills in a missing `device_id` (the device socket
    /// adapter passes its path segment). Returns `None` for non-object
    /// frames and for readings that end up without a routing key.
    pub fn from_frame(value: Value, fallback_device: Option<&str>) -> Option<Self> {
        let Value::Object(map) = value else {
            return None;
        };

        let mut device_id = None;
        let mut ts = None;
        let mut fields = HashMap::with_capacity(map.len());

        for (key, val) in map {
            match key.as_str() {
                "device_id" => {
                    if let Value::String(s) = val {
                        if !s.is_empty() {
                            device_id = Some(s);
                        }
                    }
                }
                "ts" => ts = parse_ts(&val),
                _ => {
                    fields.insert(key, FieldValue::from(val));
                }
            }
        }

        let device_id = device_id.or_else(|| fallback_device.map(str::to_string))?;

        Some(Self {
            device_id,
            ts: ts.unwrap_or_else(Utc::now),
            fields,
        })
    }
}

/// Accepts RFC 3339 strings or epoch milliseconds; anything else falls back
/// to receipt time.
fn parse_ts(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_full_reading() {
        let json = r#"{
            "device_id": "demo-1",
            "ts": "2024-05-01T12:00:00Z",
            "respiration_rate": 24.2,
            "presence": true,
            "event": "poop"
        }"#;
        let t: Telemetry = serde_json::from_str(json).unwrap();

        assert_eq!(t.device_id, "demo-1");
        assert_eq!(
            t.fields.get("respiration_rate"),
            Some(&FieldValue::Number(24.2))
        );
        assert_eq!(t.fields.get("presence"), Some(&FieldValue::Bool(true)));
        assert_eq!(
            t.fields.get("event"),
            Some(&FieldValue::Text("poop".to_string()))
        );
    }

    #[test]
    fn test_deserialize_defaults_timestamp() {
        let before = Utc::now();
        let t: Telemetry = serde_json::from_str(r#"{"device_id": "demo-1"}"#).unwrap();
        let after = Utc::now();

        assert!(t.ts >= before && t.ts <= after);
        assert!(t.fields.is_empty());
    }

    #[test]
    fn test_serialize_flattens_fields() {
        let t = Telemetry::new("demo-1")
            .field("heart_rate", 121.0)
            .field("presence", true);
        let json: Value = serde_json::to_value(&t).unwrap();

        assert_eq!(json["device_id"], "demo-1");
        assert_eq!(json["heart_rate"], 121.0);
        assert_eq!(json["presence"], true);
        assert!(json.get("fields").is_none());
    }

    #[test]
    fn test_from_frame_injects_fallback_device() {
        let frame = json!({"noise_db": 38.5});
        let t = Telemetry::from_frame(frame, Some("pico-7")).unwrap();

        assert_eq!(t.device_id, "pico-7");
        assert_eq!(t.fields.get("noise_db"), Some(&FieldValue::Number(38.5)));
    }

    #[test]
    fn test_from_frame_unroutable_without_device() {
        assert!(Telemetry::from_frame(json!({"heart_rate": 120}), None).is_none());
        assert!(Telemetry::from_frame(json!({"device_id": ""}), None).is_none());
        assert!(Telemetry::from_frame(json!([1, 2, 3]), Some("pico-7")).is_none());
    }

    #[test]
    fn test_from_frame_renders_non_scalars_as_text() {
        let frame = json!({"device_id": "demo-1", "accel": [0.1, 0.2]});
        let t = Telemetry::from_frame(frame, None).unwrap();

        assert_eq!(
            t.fields.get("accel"),
            Some(&FieldValue::Text("[0.1,0.2]".to_string()))
        );
    }

    #[test]
    fn test_from_frame_parses_epoch_millis() {
        let frame = json!({"device_id": "demo-1", "ts": 1699000000000_i64});
        let t = Telemetry::from_frame(frame, None).unwrap();

        assert_eq!(t.ts.timestamp_millis(), 1699000000000);
    }

    #[test]
    fn test_field_value_untagged_scalars() {
        assert_eq!(
            serde_json::from_str::<FieldValue>("true").unwrap(),
            FieldValue::Bool(true)
        );
        assert_eq!(
            serde_json::from_str::<FieldValue>("24").unwrap(),
            FieldValue::Number(24.0)
        );
        assert_eq!(
            serde_json::from_str::<FieldValue>("null").unwrap(),
            FieldValue::Null
        );
    }
}
