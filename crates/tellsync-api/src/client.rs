// Hand-crafted async HTTP client for the Telldus Live JSON API.
//
// Base path: /json/
// Auth: per-request OAuth 1.0a Authorization header (see oauth.rs)

use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::models::{CommandResponse, DeviceListing, SensorListing};
use crate::oauth::{self, Credentials};
use crate::transport::TransportConfig;
use crate::Error;

/// Async client for the Telldus Live API.
///
/// Every call is a signed GET; responses are JSON envelopes decoded into
/// the types in [`crate::models`].
pub struct TelldusClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
}

impl TelldusClient {
    /// Build from a base URL (e.g. `https://pa-api.telldus.com`),
    /// OAuth credentials, and transport config.
    pub fn new(
        base_url: &str,
        credentials: Credentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        let base_url = Self::normalize_base_url(base_url)?;
        Ok(Self {
            http,
            base_url,
            credentials,
        })
    }

    /// Wrap an existing `reqwest::Client` (tests, custom transports).
    pub fn with_client(
        http: reqwest::Client,
        base_url: &str,
        credentials: Credentials,
    ) -> Result<Self, Error> {
        let base_url = Self::normalize_base_url(base_url)?;
        Ok(Self {
            http,
            base_url,
            credentials,
        })
    }

    /// Ensure the base URL ends with `/json/` so joining relative
    /// endpoint paths works uniformly.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        let path = url.path().trim_end_matches('/').to_owned();
        if path.ends_with("/json") {
            url.set_path(&format!("{path}/"));
        } else {
            url.set_path(&format!("{path}/json/"));
        }
        Ok(url)
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// Full device listing, dimmer support included.
    pub async fn list_devices(&self) -> Result<DeviceListing, Error> {
        self.signed_get(
            "devices/list",
            &[("supportedMethods", "19".into()), ("includeIgnored", "1".into())],
        )
        .await
    }

    /// Full sensor listing with current values.
    pub async fn list_sensors(&self) -> Result<SensorListing, Error> {
        self.signed_get(
            "sensors/list",
            &[
                ("includeValues", "1".into()),
                ("includeIgnored", "1".into()),
                ("includeScale", "1".into()),
            ],
        )
        .await
    }

    /// Issue a device command (method 1 = on, 2 = off, 16 = dim).
    pub async fn device_command(
        &self,
        id: &str,
        method: u8,
        value: i64,
    ) -> Result<CommandResponse, Error> {
        self.signed_get(
            "device/command",
            &[
                ("id", id.to_owned()),
                ("method", method.to_string()),
                ("value", value.to_string()),
            ],
        )
        .await
    }

    /// Fetch current info for a single sensor.
    pub async fn sensor_info(&self, id: &str) -> Result<CommandResponse, Error> {
        self.signed_get("sensor/info", &[("id", id.to_owned())]).await
    }

    // ── Request plumbing ─────────────────────────────────────────────

    async fn signed_get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, Error> {
        // base_url always ends with `/json/`, so joining relative paths works.
        let mut url = self.base_url.join(path)?;
        url.query_pairs_mut()
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));

        let auth = oauth::authorization_header("GET", &url, &self.credentials)?;
        debug!("GET {url}");

        let resp = self.http.get(url).header(AUTHORIZATION, auth).send().await?;
        self.handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body,
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn credentials() -> Credentials {
        Credentials {
            consumer_key: "ck".into(),
            consumer_secret: SecretString::from("cs"),
            token: "tk".into(),
            token_secret: SecretString::from("ts"),
        }
    }

    #[test]
    fn base_url_gains_json_path() {
        let client =
            TelldusClient::with_client(reqwest::Client::new(), "https://pa-api.telldus.com", credentials())
                .unwrap();
        assert_eq!(client.base_url.as_str(), "https://pa-api.telldus.com/json/");

        let client = TelldusClient::with_client(
            reqwest::Client::new(),
            "https://pa-api.telldus.com/json",
            credentials(),
        )
        .unwrap();
        assert_eq!(client.base_url.as_str(), "https://pa-api.telldus.com/json/");
    }
}
