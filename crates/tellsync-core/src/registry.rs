// ── Virtual-device registry port ──
//
// The registry is an external collaborator owned by the host automation
// controller: a flat namespace of virtual devices shared with other
// integrations. This module only ever touches ids inside its own
// namespace (see ids.rs). Commands are not stored as per-device
// closures; the host routes `(device_id, command, args)` back to
// `Importer::handle_command`.

use std::collections::BTreeMap;
use std::sync::{Mutex, RwLock};

use thiserror::Error;

/// Errors from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("device not found: {0}")]
    NotFound(String),

    #[error("device already exists: {0}")]
    AlreadyExists(String),

    #[error("registry rejected operation: {0}")]
    Rejected(String),
}

/// Presentation class of a virtual device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    SwitchBinary,
    SwitchMultilevel,
    SensorMultilevel,
}

impl DeviceClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SwitchBinary => "switchBinary",
            Self::SwitchMultilevel => "switchMultilevel",
            Self::SensorMultilevel => "sensorMultilevel",
        }
    }
}

/// The presentation value of a virtual device.
///
/// Switches carry `On`/`Off`, dimmers a 0–99 percentage, sensor
/// readings the raw reported value.
#[derive(Debug, Clone, PartialEq)]
pub enum Level {
    On,
    Off,
    Percent(u8),
    Reading(f64),
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::On => f.write_str("on"),
            Self::Off => f.write_str("off"),
            Self::Percent(p) => write!(f, "{p}"),
            Self::Reading(v) => write!(f, "{v}"),
        }
    }
}

/// Addressable attributes of a virtual device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Title,
    Level,
    Icon,
    ScaleTitle,
    ProbeTitle,
    UpdateTime,
}

/// Typed attribute values, comparable so writes can be equality-gated.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Text(String),
    Level(Level),
    Timestamp(i64),
}

impl MetricValue {
    pub fn as_level(&self) -> Option<&Level> {
        match self {
            Self::Level(level) => Some(level),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<i64> {
        match self {
            Self::Timestamp(t) => Some(*t),
            _ => None,
        }
    }
}

/// Creation payload for a virtual device.
#[derive(Debug, Clone)]
pub struct NewVirtualDevice {
    pub id: String,
    pub class: DeviceClass,
    pub title: String,
    pub probe_title: String,
    pub icon: String,
    pub scale_title: Option<String>,
    pub level: Level,
    pub update_time: Option<i64>,
}

/// The registry contract required from the host.
pub trait DeviceRegistry: Send + Sync {
    /// All ids currently in the registry (the caller filters by
    /// namespace; foreign ids are returned too).
    fn ids(&self) -> Vec<String>;

    fn contains(&self, id: &str) -> bool;

    /// The presentation class of a device, `None` if unknown.
    fn class(&self, id: &str) -> Option<DeviceClass>;

    fn create(&self, device: NewVirtualDevice) -> Result<(), RegistryError>;

    fn get(&self, id: &str, metric: Metric) -> Option<MetricValue>;

    fn set(&self, id: &str, metric: Metric, value: MetricValue) -> Result<(), RegistryError>;

    fn remove(&self, id: &str) -> Result<(), RegistryError>;
}

// ── In-memory implementation ─────────────────────────────────────────

#[derive(Debug, Clone)]
struct StoredDevice {
    class: DeviceClass,
    title: String,
    probe_title: String,
    icon: String,
    scale_title: Option<String>,
    level: Level,
    update_time: Option<i64>,
}

/// A simple registry backed by an in-process map.
///
/// Suitable for hosts without their own device store, and as the test
/// double throughout this workspace. `set` calls are journaled so tests
/// can assert on write behavior (idempotent polls must not write).
#[derive(Default)]
pub struct InMemoryRegistry {
    devices: RwLock<BTreeMap<String, StoredDevice>>,
    set_log: Mutex<Vec<(String, Metric)>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the journal of `set` calls since the last drain.
    pub fn take_set_log(&self) -> Vec<(String, Metric)> {
        std::mem::take(&mut self.set_log.lock().unwrap_or_else(std::sync::PoisonError::into_inner))
    }

    /// The stored class of a device, if present.
    pub fn class_of(&self, id: &str) -> Option<DeviceClass> {
        self.devices
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(id)
            .map(|d| d.class)
    }
}

impl DeviceRegistry for InMemoryRegistry {
    fn ids(&self) -> Vec<String> {
        self.devices
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    fn contains(&self, id: &str) -> bool {
        self.devices
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains_key(id)
    }

    fn class(&self, id: &str) -> Option<DeviceClass> {
        self.class_of(id)
    }

    fn create(&self, device: NewVirtualDevice) -> Result<(), RegistryError> {
        let mut devices = self.devices.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if devices.contains_key(&device.id) {
            return Err(RegistryError::AlreadyExists(device.id));
        }
        devices.insert(
            device.id,
            StoredDevice {
                class: device.class,
                title: device.title,
                probe_title: device.probe_title,
                icon: device.icon,
                scale_title: device.scale_title,
                level: device.level,
                update_time: device.update_time,
            },
        );
        Ok(())
    }

    fn get(&self, id: &str, metric: Metric) -> Option<MetricValue> {
        let devices = self.devices.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        let device = devices.get(id)?;
        match metric {
            Metric::Title => Some(MetricValue::Text(device.title.clone())),
            Metric::Level => Some(MetricValue::Level(device.level.clone())),
            Metric::Icon => Some(MetricValue::Text(device.icon.clone())),
            Metric::ScaleTitle => device.scale_title.clone().map(MetricValue::Text),
            Metric::ProbeTitle => Some(MetricValue::Text(device.probe_title.clone())),
            Metric::UpdateTime => device.update_time.map(MetricValue::Timestamp),
        }
    }

    fn set(&self, id: &str, metric: Metric, value: MetricValue) -> Result<(), RegistryError> {
        let mut devices = self.devices.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let device = devices
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_owned()))?;

        match (metric, value) {
            (Metric::Title, MetricValue::Text(v)) => device.title = v,
            (Metric::Level, MetricValue::Level(v)) => device.level = v,
            (Metric::Icon, MetricValue::Text(v)) => device.icon = v,
            (Metric::ScaleTitle, MetricValue::Text(v)) => device.scale_title = Some(v),
            (Metric::ProbeTitle, MetricValue::Text(v)) => device.probe_title = v,
            (Metric::UpdateTime, MetricValue::Timestamp(v)) => device.update_time = Some(v),
            (metric, value) => {
                return Err(RegistryError::Rejected(format!(
                    "type mismatch for {metric:?}: {value:?}"
                )));
            }
        }
        drop(devices);

        self.set_log
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((id.to_owned(), metric));
        Ok(())
    }

    fn remove(&self, id: &str) -> Result<(), RegistryError> {
        self.devices
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RegistryError::NotFound(id.to_owned()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn lamp(id: &str) -> NewVirtualDevice {
        NewVirtualDevice {
            id: id.to_owned(),
            class: DeviceClass::SwitchBinary,
            title: "TL Lamp".into(),
            probe_title: "Binary".into(),
            icon: "switch".into(),
            scale_title: None,
            level: Level::Off,
            update_time: None,
        }
    }

    #[test]
    fn create_then_get() {
        let registry = InMemoryRegistry::new();
        registry.create(lamp("TL_1_7")).unwrap();

        assert!(registry.contains("TL_1_7"));
        assert_eq!(
            registry.get("TL_1_7", Metric::Level),
            Some(MetricValue::Level(Level::Off))
        );
        assert_eq!(registry.get("TL_1_7", Metric::ScaleTitle), None);
    }

    #[test]
    fn duplicate_create_rejected() {
        let registry = InMemoryRegistry::new();
        registry.create(lamp("TL_1_7")).unwrap();
        assert!(matches!(
            registry.create(lamp("TL_1_7")),
            Err(RegistryError::AlreadyExists(_))
        ));
    }

    #[test]
    fn set_journals_writes() {
        let registry = InMemoryRegistry::new();
        registry.create(lamp("TL_1_7")).unwrap();
        registry
            .set("TL_1_7", Metric::Level, MetricValue::Level(Level::On))
            .unwrap();

        assert_eq!(registry.take_set_log(), vec![("TL_1_7".into(), Metric::Level)]);
        assert!(registry.take_set_log().is_empty());
    }

    #[test]
    fn set_rejects_type_mismatch() {
        let registry = InMemoryRegistry::new();
        registry.create(lamp("TL_1_7")).unwrap();
        assert!(matches!(
            registry.set("TL_1_7", Metric::Level, MetricValue::Timestamp(1)),
            Err(RegistryError::Rejected(_))
        ));
    }

    #[test]
    fn level_display() {
        assert_eq!(Level::On.to_string(), "on");
        assert_eq!(Level::Percent(42).to_string(), "42");
        assert_eq!(Level::Reading(21.5).to_string(), "21.5");
        assert_eq!(Level::Reading(48.0).to_string(), "48");
    }
}
