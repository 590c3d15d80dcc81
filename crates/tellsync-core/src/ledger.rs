// ── Render ledger ──
//
// Append-once record of every virtual device this module ever
// synthesized, keyed by local id. The ledger survives restarts so a
// UI can keep rendering devices that are currently absent from the
// remote listing. Persistence failures are logged and swallowed; the
// in-memory ledger stays authoritative for the session.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::registry::DeviceClass;

/// One ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderEntry {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    #[serde(rename = "deviceType")]
    pub device_type: String,
}

/// Persistence port for the ledger.
pub trait LedgerStore: Send + Sync {
    fn save(&self, entries: &[RenderEntry]) -> std::io::Result<()>;
}

/// In-memory ledger with write-through persistence.
pub struct RenderLedger {
    entries: Vec<RenderEntry>,
    seen: HashSet<String>,
    store: Option<Box<dyn LedgerStore>>,
}

impl RenderLedger {
    pub fn new(seed: Vec<RenderEntry>, store: Option<Box<dyn LedgerStore>>) -> Self {
        let seen = seed.iter().map(|e| e.device_id.clone()).collect();
        Self {
            entries: seed,
            seen,
            store,
        }
    }

    /// Record a newly synthesized device. Subsequent calls for the same
    /// local id are no-ops, so the first recorded class wins.
    pub fn record(&mut self, device_id: &str, class: DeviceClass) {
        if !self.seen.insert(device_id.to_owned()) {
            return;
        }
        self.entries.push(RenderEntry {
            device_id: device_id.to_owned(),
            device_type: class.as_str().to_owned(),
        });
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&self.entries) {
                warn!(device_id, error = %e, "failed to persist render ledger");
            }
        }
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.seen.contains(device_id)
    }

    pub fn entries(&self) -> &[RenderEntry] {
        &self.entries
    }
}

/// Ledger store writing the entry list as a JSON array.
pub struct JsonFileLedgerStore {
    path: PathBuf,
}

impl JsonFileLedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load a previously saved ledger. A missing file is an empty
    /// ledger, not an error.
    pub fn load(&self) -> std::io::Result<Vec<RenderEntry>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(std::io::Error::other),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

impl LedgerStore for JsonFileLedgerStore {
    fn save(&self, entries: &[RenderEntry]) -> std::io::Result<()> {
        let json = serde_json::to_vec_pretty(entries).map_err(std::io::Error::other)?;
        std::fs::write(&self.path, json)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn records_each_device_once() {
        let mut ledger = RenderLedger::new(vec![], None);
        ledger.record("TL_1_7", DeviceClass::SwitchBinary);
        ledger.record("TL_1_7", DeviceClass::SwitchMultilevel);
        ledger.record("TL_1_30", DeviceClass::SensorMultilevel);

        assert_eq!(ledger.entries().len(), 2);
        assert_eq!(ledger.entries()[0].device_type, "switchBinary");
        assert!(ledger.contains("TL_1_7"));
        assert!(!ledger.contains("TL_1_8"));
    }

    #[test]
    fn seed_entries_block_re_recording() {
        let seed = vec![RenderEntry {
            device_id: "TL_1_7".into(),
            device_type: "switchBinary".into(),
        }];
        let mut ledger = RenderLedger::new(seed, None);
        ledger.record("TL_1_7", DeviceClass::SwitchMultilevel);
        assert_eq!(ledger.entries().len(), 1);
        assert_eq!(ledger.entries()[0].device_type, "switchBinary");
    }

    #[test]
    fn json_store_round_trips_and_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileLedgerStore::new(dir.path().join("render.json"));
        assert!(store.load().unwrap().is_empty());

        let entries = vec![RenderEntry {
            device_id: "TL_1_30".into(),
            device_type: "sensorMultilevel".into(),
        }];
        store.save(&entries).unwrap();
        assert_eq!(store.load().unwrap(), entries);
    }

    #[test]
    fn persist_failure_does_not_poison_the_ledger() {
        struct FailingStore;
        impl LedgerStore for FailingStore {
            fn save(&self, _: &[RenderEntry]) -> std::io::Result<()> {
                Err(std::io::Error::other("disk full"))
            }
        }

        let mut ledger = RenderLedger::new(vec![], Some(Box::new(FailingStore)));
        ledger.record("TL_1_7", DeviceClass::SwitchBinary);
        assert!(ledger.contains("TL_1_7"));
    }
}
