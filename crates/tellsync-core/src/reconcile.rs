// ── Reconciliation ──
//
// Projects one remote listing onto the local registry. All writes are
// equality-gated so an unchanged listing leaves the registry untouched,
// with one exception: a sensor's update time is stamped on every poll
// because it reports freshness, not state. Removal is scoped to ids in
// this module's namespace, to the class the pass owns, and to polls
// where the remote flagged a structural change.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use tellsync_api::{DeviceListing, SensorListing};

use crate::ids::Namespace;
use crate::ledger::RenderLedger;
use crate::metrics::MetricsPush;
use crate::registry::{DeviceClass, DeviceRegistry, Level, Metric, MetricValue, NewVirtualDevice};

/// Remote state code for "on".
const STATE_ON: i64 = 1;
/// Remote state code for "off".
const STATE_OFF: i64 = 2;
/// Remote state code for "dimmed"; the level rides in `statevalue`.
const STATE_DIM: i64 = 16;

/// Method bitmask of a dimmable device.
const METHODS_DIMMABLE: i64 = 19;

/// One reconciliation pass over the registry.
pub struct Reconciler<'a> {
    pub namespace: &'a Namespace,
    pub registry: &'a dyn DeviceRegistry,
    pub skip: &'a HashSet<String>,
    pub always_sync_titles: bool,
}

impl Reconciler<'_> {
    /// Apply a device listing: upsert switches, then prune on a
    /// structural change.
    pub fn apply_devices(&self, ledger: &mut RenderLedger, listing: &DeviceListing) {
        for remote in &listing.device {
            let id = self.namespace.device_id(remote.id);
            let class = device_class(remote.methods);
            let level = device_level(remote.state, remote.statevalue);
            let title = format!("TL {}", remote.name);

            if self.registry.contains(&id) {
                self.set_if_changed(&id, Metric::Level, MetricValue::Level(level));
                if self.always_sync_titles {
                    self.set_if_changed(&id, Metric::Title, MetricValue::Text(title));
                }
            } else if self.skip.contains(&id) {
                // The skip set blocks creation only; existing devices
                // keep getting updates.
                debug!(%id, "device is in the skip set");
            } else {
                let (probe_title, icon) = device_presentation(class);
                self.create(
                    ledger,
                    NewVirtualDevice {
                        id,
                        class,
                        title,
                        probe_title: probe_title.to_owned(),
                        icon: icon.to_owned(),
                        scale_title: None,
                        level,
                        update_time: None,
                    },
                );
            }
        }

        if listing.structure_changed {
            let present: HashSet<String> = listing
                .devices
                .iter()
                .map(|d| self.namespace.device_id(d.id))
                .collect();
            self.prune(
                &present,
                &[DeviceClass::SwitchBinary, DeviceClass::SwitchMultilevel],
            );
        }
    }

    /// Apply a sensor listing. Every reading becomes its own virtual
    /// device; the returned pushes mirror the readings to the metrics
    /// sink.
    pub fn apply_sensors(
        &self,
        ledger: &mut RenderLedger,
        listing: &SensorListing,
    ) -> Vec<MetricsPush> {
        let mut pushes = Vec::new();
        let mut present = HashSet::new();

        for sensor in &listing.sensor {
            for (index, reading) in sensor.data.iter().enumerate() {
                let id = self.namespace.reading_id(sensor.id, index);
                present.insert(id.clone());

                let (icon, scale) = reading_presentation(&reading.name);
                let title = format!("TL {} {}", sensor.name, reading.name);
                let level = Level::Reading(reading.value);

                if self.registry.contains(&id) {
                    self.set_if_changed(&id, Metric::Level, MetricValue::Level(level));
                    if let Err(e) = self.registry.set(
                        &id,
                        Metric::UpdateTime,
                        MetricValue::Timestamp(reading.last_updated),
                    ) {
                        warn!(%id, error = %e, "failed to stamp update time");
                    }
                    if self.always_sync_titles {
                        self.set_if_changed(&id, Metric::Title, MetricValue::Text(title));
                    }
                } else if self.skip.contains(&id) {
                    // Creation only; a skipped reading that was never
                    // created also produces no push.
                    debug!(%id, "reading is in the skip set");
                    continue;
                } else {
                    self.create(
                        ledger,
                        NewVirtualDevice {
                            id,
                            class: DeviceClass::SensorMultilevel,
                            title,
                            probe_title: reading.name.clone(),
                            icon: icon.to_owned(),
                            scale_title: Some(scale.to_owned()),
                            level,
                            update_time: Some(reading.last_updated),
                        },
                    );
                }

                pushes.push(MetricsPush {
                    time: reading.last_updated,
                    node: sensor.id.to_string(),
                    icon: icon.to_owned(),
                    value: reading.value.to_string(),
                });
            }
        }

        if listing.structure_changed {
            self.prune(&present, &[DeviceClass::SensorMultilevel]);
        }

        pushes
    }

    fn create(&self, ledger: &mut RenderLedger, device: NewVirtualDevice) {
        let id = device.id.clone();
        let class = device.class;
        match self.registry.create(device) {
            Ok(()) => {
                info!(%id, class = class.as_str(), "created virtual device");
                ledger.record(&id, class);
            }
            Err(e) => warn!(%id, error = %e, "failed to create virtual device"),
        }
    }

    fn set_if_changed(&self, id: &str, metric: Metric, value: MetricValue) {
        if self.registry.get(id, metric).as_ref() == Some(&value) {
            return;
        }
        if let Err(e) = self.registry.set(id, metric, value) {
            warn!(%id, ?metric, error = %e, "failed to update virtual device");
        }
    }

    /// Remove namespace-owned devices of the given classes that the
    /// remote no longer lists. Foreign ids and the other pass's class
    /// are never touched.
    fn prune(&self, present: &HashSet<String>, classes: &[DeviceClass]) {
        for id in self.registry.ids() {
            if !self.namespace.owns(&id) || present.contains(&id) {
                continue;
            }
            let Some(class) = self.registry.class(&id) else {
                continue;
            };
            if !classes.contains(&class) {
                continue;
            }
            match self.registry.remove(&id) {
                Ok(()) => info!(%id, "removed stale virtual device"),
                Err(e) => warn!(%id, error = %e, "failed to remove stale virtual device"),
            }
        }
    }
}

/// Map a remote state code to a presentation level.
pub fn device_level(state: i64, statevalue: Option<i64>) -> Level {
    match state {
        STATE_ON => Level::On,
        STATE_OFF => Level::Off,
        STATE_DIM => {
            let raw = statevalue.unwrap_or(0).clamp(0, 255);
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let percent = (raw as f64 / 255.0 * 99.0).round() as u8;
            Level::Percent(percent)
        }
        _ => Level::Off,
    }
}

/// A device advertising the dimmable method set gets a dimmer class.
pub fn device_class(methods: i64) -> DeviceClass {
    if methods == METHODS_DIMMABLE {
        DeviceClass::SwitchMultilevel
    } else {
        DeviceClass::SwitchBinary
    }
}

/// Probe title and icon for a switch class.
fn device_presentation(class: DeviceClass) -> (&'static str, &'static str) {
    match class {
        DeviceClass::SwitchMultilevel => ("Multilevel", "multilevel"),
        _ => ("Binary", "switch"),
    }
}

/// Icon and unit for a sensor reading, keyed on the reading name.
fn reading_presentation(name: &str) -> (&'static str, &'static str) {
    if name == "temp" {
        ("temperature", "°C")
    } else {
        ("humidity", "%")
    }
}
