// ── Metrics fan-out ──
//
// Sensor readings are mirrored to an EmonCMS instance when one is
// configured. Pushes are fire-and-forget: they ride on spawned tasks
// so a slow sink never delays the poll loop, and failures are logged
// rather than surfaced.

use tellsync_api::EmonCmsClient;
use tracing::{debug, warn};

/// One reading bound for the metrics sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsPush {
    /// Reading timestamp, seconds since the epoch.
    pub time: i64,
    /// Remote device id, used as the EmonCMS node.
    pub node: String,
    /// The virtual device's icon, used as the feed key.
    pub icon: String,
    /// Reading value, already formatted.
    pub value: String,
}

#[derive(Clone)]
pub struct MetricsForwarder {
    client: Option<EmonCmsClient>,
}

impl MetricsForwarder {
    pub fn new(client: Option<EmonCmsClient>) -> Self {
        Self { client }
    }

    pub fn disabled() -> Self {
        Self { client: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Queue a push without awaiting it. No-op when the sink is off.
    pub fn dispatch(&self, push: MetricsPush) {
        let Some(client) = self.client.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = send(&client, &push).await {
                warn!(node = %push.node, icon = %push.icon, error = %e, "metrics push failed");
            }
        });
    }
}

/// Post one reading, retrying a single time on a transient failure.
async fn send(client: &EmonCmsClient, push: &MetricsPush) -> Result<(), tellsync_api::Error> {
    match client
        .post_reading(push.time, &push.node, &push.icon, &push.value)
        .await
    {
        Ok(()) => {
            debug!(node = %push.node, icon = %push.icon, "metrics push delivered");
            Ok(())
        }
        Err(e) if e.is_transient() => {
            debug!(node = %push.node, error = %e, "retrying metrics push");
            client
                .post_reading(push.time, &push.node, &push.icon, &push.value)
                .await
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn sink(server: &MockServer) -> EmonCmsClient {
        EmonCmsClient::new(
            &server.uri(),
            secrecy::SecretString::from("apikey"),
            &tellsync_api::TransportConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn send_posts_the_reading() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/input/post.json"))
            .and(query_param("node", "3"))
            .and(query_param("json", r#"{"temperature":"21.5"}"#))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let push = MetricsPush {
            time: 1_700_000_000,
            node: "3".into(),
            icon: "temperature".into(),
            value: "21.5".into(),
        };
        send(&sink(&server).await, &push).await.unwrap();
    }

    #[tokio::test]
    async fn disabled_forwarder_drops_pushes() {
        let forwarder = MetricsForwarder::disabled();
        assert!(!forwarder.is_enabled());
        forwarder.dispatch(MetricsPush {
            time: 0,
            node: "3".into(),
            icon: "temp".into(),
            value: "1".into(),
        });
    }
}
