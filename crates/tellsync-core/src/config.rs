// ── Module configuration ──
//
// `ImportOptions` is the host-facing schema (field names preserved from
// the module's historical config layout). `ImportConfig` is the
// validated runtime form: intervals clamped, credentials checked, the
// metrics sink collapsed to an on/off option. Validation failures are
// the only errors this module surfaces at startup.

use std::collections::HashSet;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

use tellsync_api::{Credentials, TransportConfig};

use crate::error::CoreError;
use crate::ledger::RenderEntry;

/// Floor for the device poll interval; protects the remote service.
pub const MIN_DEVICE_POLL: Duration = Duration::from_millis(500);
/// Floor for the sensor poll interval.
pub const MIN_SENSOR_POLL: Duration = Duration::from_millis(30_000);

/// Raw options as the host hands them over.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportOptions {
    /// Remote API base URL.
    pub url: String,
    /// Device poll interval in milliseconds.
    #[serde(rename = "dT")]
    pub device_poll_ms: u64,
    /// Sensor poll interval in milliseconds.
    #[serde(rename = "sT")]
    pub sensor_poll_ms: u64,
    /// Metrics sink URL prefix; empty disables the sink.
    #[serde(rename = "urlEmonCMS", default)]
    pub url_emoncms: String,
    /// Metrics sink API key; empty disables the sink.
    #[serde(rename = "apiKeyEmonCMS", default)]
    pub api_key_emoncms: String,
    /// OAuth consumer key.
    #[serde(rename = "publicKey")]
    pub public_key: String,
    /// OAuth consumer secret.
    #[serde(rename = "privateKey")]
    pub private_key: String,
    /// OAuth access token.
    pub token: String,
    /// OAuth access token secret.
    #[serde(rename = "tokenSecret")]
    pub token_secret: String,
    /// Local ids never to synthesize.
    #[serde(rename = "skipDevices", default)]
    pub skip_devices: Vec<String>,
    /// Persisted render ledger, restored at startup.
    #[serde(rename = "renderDevices", default)]
    pub render_devices: Vec<RenderEntry>,
    /// Refresh titles from the remote on every poll instead of fixing
    /// them at creation time.
    #[serde(rename = "alwaysSyncTitlesFromTelldus", default)]
    pub always_sync_titles: bool,
}

/// EmonCMS sink settings; present only when both pieces are configured.
#[derive(Debug, Clone)]
pub struct EmonCmsConfig {
    pub url: String,
    pub api_key: SecretString,
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Module instance id; part of every synthesized local id.
    pub instance: u32,
    pub url: String,
    pub device_poll_interval: Duration,
    pub sensor_poll_interval: Duration,
    pub emoncms: Option<EmonCmsConfig>,
    pub credentials: Credentials,
    pub skip_devices: HashSet<String>,
    pub render_devices: Vec<RenderEntry>,
    pub always_sync_titles: bool,
    pub transport: TransportConfig,
}

impl ImportConfig {
    /// Validate and normalize raw options.
    pub fn from_options(instance: u32, options: ImportOptions) -> Result<Self, CoreError> {
        Url::parse(&options.url).map_err(|e| CoreError::Config {
            message: format!("invalid remote API url {:?}: {e}", options.url),
        })?;

        for (field, value) in [
            ("publicKey", &options.public_key),
            ("privateKey", &options.private_key),
            ("token", &options.token),
            ("tokenSecret", &options.token_secret),
        ] {
            if value.trim().is_empty() {
                return Err(CoreError::Config {
                    message: format!("OAuth credential {field} is empty"),
                });
            }
        }

        let emoncms = if options.url_emoncms.is_empty() || options.api_key_emoncms.is_empty() {
            None
        } else {
            Url::parse(&options.url_emoncms).map_err(|e| CoreError::Config {
                message: format!("invalid EmonCMS url {:?}: {e}", options.url_emoncms),
            })?;
            Some(EmonCmsConfig {
                url: options.url_emoncms,
                api_key: SecretString::from(options.api_key_emoncms),
            })
        };

        Ok(Self {
            instance,
            url: options.url,
            device_poll_interval: Duration::from_millis(options.device_poll_ms)
                .max(MIN_DEVICE_POLL),
            sensor_poll_interval: Duration::from_millis(options.sensor_poll_ms)
                .max(MIN_SENSOR_POLL),
            emoncms,
            credentials: Credentials {
                consumer_key: options.public_key,
                consumer_secret: SecretString::from(options.private_key),
                token: options.token,
                token_secret: SecretString::from(options.token_secret),
            },
            skip_devices: options.skip_devices.into_iter().collect(),
            render_devices: options.render_devices,
            always_sync_titles: options.always_sync_titles,
            transport: TransportConfig::default(),
        })
    }
}
