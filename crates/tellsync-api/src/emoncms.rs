// Minimal EmonCMS input client for the metrics fan-out.
//
// One endpoint: GET /input/post.json with the reading packed into a
// single-key JSON object in the query string. The response body is
// ignored beyond the HTTP status.

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use url::Url;

use crate::transport::TransportConfig;
use crate::Error;

/// Best-effort client for an EmonCMS time-series sink.
#[derive(Clone)]
pub struct EmonCmsClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: SecretString,
}

impl EmonCmsClient {
    pub fn new(
        base_url: &str,
        api_key: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        let mut base_url = Url::parse(base_url)?;
        let path = base_url.path().trim_end_matches('/').to_owned();
        base_url.set_path(&format!("{path}/"));
        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    /// Push one reading: `json={"<icon>":"<value>"}` keyed by node id.
    pub async fn post_reading(
        &self,
        time: i64,
        node: &str,
        icon: &str,
        value: &str,
    ) -> Result<(), Error> {
        let url = self.base_url.join("input/post.json")?;
        let json = format!("{{\"{icon}\":\"{value}\"}}");
        debug!(node, icon, value, "posting reading to EmonCMS");

        let resp = self
            .http
            .get(url)
            .query(&[
                ("time", time.to_string().as_str()),
                ("node", node),
                ("json", &json),
                ("apikey", self.api_key.expose_secret()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}
