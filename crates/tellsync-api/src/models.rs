// Wire types for the Telldus Live JSON envelopes.
//
// The vendor API is loosely typed: numeric fields arrive as numbers or
// strings depending on endpoint and firmware, and the structureChanged
// flag has been observed as both bool and 0/1. The lenient deserializers
// below absorb that.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

// ── Devices ──────────────────────────────────────────────────────────

/// Response envelope of `/json/devices/list`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceListing {
    #[serde(default)]
    pub device: Vec<RemoteDevice>,
    /// Set when the remote listing is authoritative for membership;
    /// only then may absent devices be deleted locally.
    #[serde(rename = "structureChanged", default, deserialize_with = "de_flag")]
    pub structure_changed: bool,
    /// Membership list accompanying a structure change.
    #[serde(default)]
    pub devices: Vec<DeviceRef>,
}

/// Bare device reference in the membership list.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceRef {
    #[serde(deserialize_with = "de_i64")]
    pub id: i64,
}

/// One device entry from the listing.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteDevice {
    #[serde(deserialize_with = "de_i64")]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    /// State code: 1 = on, 2 = off, 16 = dimmed.
    #[serde(default, deserialize_with = "de_i64_or_zero")]
    pub state: i64,
    /// Dim level on the remote 0–255 scale; absent unless dimmed.
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub statevalue: Option<i64>,
    /// Supported-methods bitmask; 19 marks a dimmable device.
    #[serde(default, deserialize_with = "de_i64_or_zero")]
    pub methods: i64,
}

// ── Sensors ──────────────────────────────────────────────────────────

/// Response envelope of `/json/sensors/list`.
#[derive(Debug, Clone, Deserialize)]
pub struct SensorListing {
    #[serde(default)]
    pub sensor: Vec<RemoteSensor>,
    #[serde(rename = "structureChanged", default, deserialize_with = "de_flag")]
    pub structure_changed: bool,
}

/// One sensor entry; also the shape of a `/json/sensor/info` response.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSensor {
    #[serde(deserialize_with = "de_i64")]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub model: String,
    /// Ordered readings; a reading's position is its sub-index and is
    /// part of its local identity.
    #[serde(default)]
    pub data: Vec<SensorReading>,
    #[serde(rename = "lastUpdated", default, deserialize_with = "de_i64_or_zero")]
    pub last_updated: i64,
}

/// A single reading (e.g. `temp` or `humidity`) within a sensor.
#[derive(Debug, Clone, Deserialize)]
pub struct SensorReading {
    pub name: String,
    #[serde(deserialize_with = "de_f64")]
    pub value: f64,
    #[serde(rename = "lastUpdated", default, deserialize_with = "de_i64_or_zero")]
    pub last_updated: i64,
}

// ── Command / info responses ─────────────────────────────────────────

/// Response to a device command or sensor-info query.
///
/// `/json/device/command` acknowledges with `{status: "success"}`, but a
/// sensor-shaped payload can come back through the same code path (the
/// sensor-refresh pseudo-command). Classification happens by shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CommandResponse {
    Ack { status: String },
    Sensor(RemoteSensor),
    Other(Value),
}

// ── Lenient field deserializers ──────────────────────────────────────

fn parse_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}

/// Required integer, number or numeric string.
fn de_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    parse_i64(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected integer, got {value}")))
}

/// Integer that degrades to 0 when missing or malformed.
fn de_i64_or_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(parse_i64(&value).unwrap_or(0))
}

/// Optional integer; null and non-numeric strings both map to `None`.
fn de_opt_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(parse_i64(&value))
}

/// Float, number or numeric string.
fn de_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| serde::de::Error::custom(format!("expected number, got {value}")))
}

/// Truthy flag: bool, 0/1, or "true"/"1".
fn de_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
        Value::String(s) => matches!(s.as_str(), "1" | "true"),
        _ => false,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn device_listing_accepts_stringly_fields() {
        let listing: DeviceListing = serde_json::from_value(json!({
            "device": [
                {"id": "7", "name": "Hall", "state": "16", "statevalue": "128", "methods": 19},
                {"id": 8, "name": "Porch", "state": 2, "statevalue": null, "methods": 3}
            ],
            "structureChanged": 1,
            "devices": [{"id": 7}, {"id": "8"}]
        }))
        .unwrap();

        assert_eq!(listing.device[0].id, 7);
        assert_eq!(listing.device[0].state, 16);
        assert_eq!(listing.device[0].statevalue, Some(128));
        assert_eq!(listing.device[1].statevalue, None);
        assert!(listing.structure_changed);
        assert_eq!(listing.devices.len(), 2);
    }

    #[test]
    fn garbage_statevalue_maps_to_none() {
        let device: RemoteDevice = serde_json::from_value(json!({
            "id": 1, "name": "x", "state": 16, "statevalue": "unde", "methods": 19
        }))
        .unwrap();
        assert_eq!(device.statevalue, None);
    }

    #[test]
    fn sensor_reading_value_accepts_string() {
        let sensor: RemoteSensor = serde_json::from_value(json!({
            "id": 3,
            "name": "Greenhouse",
            "model": "mandolyn",
            "data": [
                {"name": "temp", "value": "21.5", "lastUpdated": 1000},
                {"name": "humidity", "value": 48, "lastUpdated": 1000}
            ],
            "lastUpdated": 1000
        }))
        .unwrap();
        assert!((sensor.data[0].value - 21.5).abs() < f64::EPSILON);
        assert!((sensor.data[1].value - 48.0).abs() < f64::EPSILON);
    }

    #[test]
    fn command_response_classifies_by_shape() {
        let ack: CommandResponse = serde_json::from_value(json!({"status": "success"})).unwrap();
        assert!(matches!(ack, CommandResponse::Ack { status } if status == "success"));

        let sensor: CommandResponse = serde_json::from_value(json!({
            "id": 3, "name": "Greenhouse", "model": "mandolyn",
            "data": [{"name": "temp", "value": "20.1", "lastUpdated": 7}]
        }))
        .unwrap();
        assert!(matches!(sensor, CommandResponse::Sensor(s) if s.id == 3));

        let other: CommandResponse =
            serde_json::from_value(json!({"error": "device not found"})).unwrap();
        assert!(matches!(other, CommandResponse::Other(_)));
    }
}
