// ── Importer lifecycle ──
//
// Owns the remote clients, the two poll tasks and the render ledger.
// `start` spawns the loops, `stop` cancels them, waits for them to
// finish and then clears every namespace-owned device out of the
// registry. Command handling is independent of the loops and may be
// called at any time between `new` and `stop`.

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tellsync_api::{CommandResponse, EmonCmsClient, RemoteSensor, SensorListing, TelldusClient};

use crate::command::DeviceCommand;
use crate::config::ImportConfig;
use crate::error::CoreError;
use crate::ids::Namespace;
use crate::ledger::{LedgerStore, RenderLedger};
use crate::metrics::MetricsForwarder;
use crate::poll::run_poll_loop;
use crate::reconcile::Reconciler;
use crate::registry::{DeviceRegistry, Metric, MetricValue};

pub struct Importer {
    inner: Arc<Inner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

struct Inner {
    config: ImportConfig,
    namespace: Namespace,
    client: TelldusClient,
    registry: Arc<dyn DeviceRegistry>,
    ledger: Mutex<RenderLedger>,
    forwarder: MetricsForwarder,
    cancel: CancellationToken,
}

impl Importer {
    /// Build the importer from validated configuration. Fails only on
    /// client construction; no network traffic happens here.
    pub fn new(
        config: ImportConfig,
        registry: Arc<dyn DeviceRegistry>,
        ledger_store: Option<Box<dyn LedgerStore>>,
    ) -> Result<Self, CoreError> {
        let client = TelldusClient::new(&config.url, config.credentials.clone(), &config.transport)?;

        let forwarder = match &config.emoncms {
            Some(sink) => MetricsForwarder::new(Some(EmonCmsClient::new(
                &sink.url,
                sink.api_key.clone(),
                &config.transport,
            )?)),
            None => MetricsForwarder::disabled(),
        };

        let namespace = Namespace::new(config.instance);
        let ledger = Mutex::new(RenderLedger::new(config.render_devices.clone(), ledger_store));

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                namespace,
                client,
                registry,
                ledger,
                forwarder,
                cancel: CancellationToken::new(),
            }),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Spawn the device and sensor poll loops.
    pub fn start(&self) {
        let mut tasks = self
            .tasks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if !tasks.is_empty() {
            debug!("importer already started");
            return;
        }
        info!(
            instance = self.inner.config.instance,
            url = %self.inner.config.url,
            metrics = self.inner.forwarder.is_enabled(),
            "starting importer"
        );

        let devices = Arc::clone(&self.inner);
        tasks.push(tokio::spawn(run_poll_loop(
            "devices",
            self.inner.config.device_poll_interval,
            self.inner.cancel.clone(),
            move || {
                let inner = Arc::clone(&devices);
                async move { inner.poll_devices_once().await }
            },
        )));

        let sensors = Arc::clone(&self.inner);
        tasks.push(tokio::spawn(run_poll_loop(
            "sensors",
            self.inner.config.sensor_poll_interval,
            self.inner.cancel.clone(),
            move || {
                let inner = Arc::clone(&sensors);
                async move { inner.poll_sensors_once().await }
            },
        )));
    }

    /// Stop the poll loops and remove every namespace-owned virtual
    /// device. Idempotent.
    pub async fn stop(&self) {
        self.inner.cancel.cancel();
        let tasks = std::mem::take(
            &mut *self
                .tasks
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        );
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "poll task ended abnormally");
            }
        }

        for id in self.inner.registry.ids() {
            if !self.inner.namespace.owns(&id) {
                continue;
            }
            if let Err(e) = self.inner.registry.remove(&id) {
                warn!(%id, error = %e, "failed to remove virtual device on stop");
            }
        }
        info!(instance = self.inner.config.instance, "importer stopped");
    }

    /// One device poll, exposed for on-demand refreshes.
    pub async fn poll_devices_once(&self) -> Result<(), CoreError> {
        self.inner.poll_devices_once().await
    }

    /// One sensor poll, exposed for on-demand refreshes.
    pub async fn poll_sensors_once(&self) -> Result<(), CoreError> {
        self.inner.poll_sensors_once().await
    }

    /// Handle a user action routed back from the host.
    pub async fn handle_command(
        &self,
        device_id: &str,
        command: &str,
        level: Option<f64>,
    ) -> Result<(), CoreError> {
        self.inner.handle_command(device_id, command, level).await
    }
}

impl Inner {
    fn reconciler(&self) -> Reconciler<'_> {
        Reconciler {
            namespace: &self.namespace,
            registry: self.registry.as_ref(),
            skip: &self.config.skip_devices,
            always_sync_titles: self.config.always_sync_titles,
        }
    }

    async fn poll_devices_once(&self) -> Result<(), CoreError> {
        let listing = self.client.list_devices().await?;
        debug!(
            count = listing.device.len(),
            structure_changed = listing.structure_changed,
            "device listing received"
        );
        let mut ledger = self
            .ledger
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        self.reconciler().apply_devices(&mut ledger, &listing);
        Ok(())
    }

    async fn poll_sensors_once(&self) -> Result<(), CoreError> {
        let listing = self.client.list_sensors().await?;
        debug!(
            count = listing.sensor.len(),
            structure_changed = listing.structure_changed,
            "sensor listing received"
        );
        let pushes = {
            let mut ledger = self
                .ledger
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            self.reconciler().apply_sensors(&mut ledger, &listing)
        };
        for push in pushes {
            self.forwarder.dispatch(push);
        }
        Ok(())
    }

    async fn handle_command(
        &self,
        device_id: &str,
        command: &str,
        level: Option<f64>,
    ) -> Result<(), CoreError> {
        if !self.namespace.owns(device_id) {
            return Err(CoreError::Internal(format!(
                "command for foreign device {device_id:?}"
            )));
        }
        let Some(remote) = self.namespace.remote_part(device_id) else {
            return Err(CoreError::Internal(format!(
                "command for foreign device {device_id:?}"
            )));
        };
        let Some(cmd) = DeviceCommand::parse(command, level) else {
            debug!(%device_id, command, "ignoring unsupported command");
            return Ok(());
        };

        match self.run_command(device_id, remote, cmd).await {
            Err(e) if e.is_transient() => {
                debug!(%device_id, error = %e, "transient command failure, retrying");
                self.run_command(device_id, remote, cmd).await
            }
            result => result,
        }
    }

    async fn run_command(
        &self,
        device_id: &str,
        remote: &str,
        cmd: DeviceCommand,
    ) -> Result<(), CoreError> {
        match cmd.wire() {
            Some((method, value)) => {
                let response = self.client.device_command(remote, method, value).await?;
                match response {
                    CommandResponse::Ack { status } if status == "success" => {
                        if let Some(level) = cmd.target_level() {
                            if let Err(e) = self.registry.set(
                                device_id,
                                Metric::Level,
                                MetricValue::Level(level),
                            ) {
                                warn!(%device_id, error = %e, "failed to echo command result");
                            }
                        }
                        Ok(())
                    }
                    CommandResponse::Ack { status } => {
                        warn!(%device_id, method, %status, "remote rejected command");
                        Ok(())
                    }
                    // A sensor payload can come back through the command
                    // path; when its id matches the addressed sensor it
                    // is fresh data, not a protocol error.
                    CommandResponse::Sensor(sensor)
                        if Namespace::strip_sub_index(remote)
                            .is_some_and(|sid| sensor.id.to_string() == sid) =>
                    {
                        self.reconcile_sensor_payload(sensor);
                        Ok(())
                    }
                    other => {
                        warn!(%device_id, method, response = ?other, "ignoring unrecognized command response");
                        Ok(())
                    }
                }
            }
            None => self.refresh_sensor(remote).await,
        }
    }

    /// On-demand sensor refresh. The local id encodes `<sensor><index>`,
    /// so the sensor's own remote id is the remote part minus its
    /// trailing index digit. The fetched sensor runs through the normal
    /// sensor reconciliation as a one-element listing, so every reading
    /// of the sensor refreshes, not just the commanded one.
    async fn refresh_sensor(&self, remote: &str) -> Result<(), CoreError> {
        let Some(sensor_id) = Namespace::strip_sub_index(remote) else {
            return Err(CoreError::Internal(format!(
                "reading id {remote:?} too short to split"
            )));
        };

        let response = self.client.sensor_info(sensor_id).await?;
        let CommandResponse::Sensor(sensor) = response else {
            return Err(CoreError::UnexpectedResponse {
                context: format!("sensor info returned {response:?}"),
            });
        };
        if sensor.id.to_string() != sensor_id {
            return Err(CoreError::UnexpectedResponse {
                context: format!("asked for sensor {sensor_id}, got {}", sensor.id),
            });
        }

        self.reconcile_sensor_payload(sensor);
        Ok(())
    }

    /// Run one fetched sensor through the normal sensor reconciliation
    /// as a one-element listing, pushes included.
    fn reconcile_sensor_payload(&self, sensor: RemoteSensor) {
        let listing = SensorListing {
            sensor: vec![sensor],
            structure_changed: false,
        };
        let pushes = {
            let mut ledger = self
                .ledger
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            self.reconciler().apply_sensors(&mut ledger, &listing)
        };
        for push in pushes {
            self.forwarder.dispatch(push);
        }
    }
}
