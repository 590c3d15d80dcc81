// tellsync-core: keeps a local virtual-device registry synchronized with
// Telldus Live and translates local commands into signed remote calls.

pub mod command;
pub mod config;
pub mod error;
pub mod ids;
pub mod importer;
pub mod ledger;
pub mod metrics;
pub mod reconcile;
pub mod registry;

mod poll;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::DeviceCommand;
pub use config::{EmonCmsConfig, ImportConfig, ImportOptions};
pub use error::CoreError;
pub use ids::Namespace;
pub use importer::Importer;
pub use ledger::{JsonFileLedgerStore, LedgerStore, RenderEntry, RenderLedger};
pub use metrics::{MetricsForwarder, MetricsPush};
pub use registry::{
    DeviceClass, DeviceRegistry, InMemoryRegistry, Level, Metric, MetricValue, NewVirtualDevice,
    RegistryError,
};
