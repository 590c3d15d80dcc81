// tellsync-api: Async Rust client for the Telldus Live JSON API.

pub mod client;
pub mod emoncms;
pub mod error;
pub mod models;
pub mod oauth;
pub mod transport;

pub use client::TelldusClient;
pub use emoncms::EmonCmsClient;
pub use error::Error;
pub use models::{
    CommandResponse, DeviceListing, DeviceRef, RemoteDevice, RemoteSensor, SensorListing,
    SensorReading,
};
pub use oauth::Credentials;
pub use transport::{TlsMode, TransportConfig};
