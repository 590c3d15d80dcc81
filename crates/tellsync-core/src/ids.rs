// ── Local-id namespacing ──
//
// Every registry id this module creates is `TL_<instance>_<remoteId>`
// for devices and `TL_<instance>_<remoteId><subIndex>` for sensor
// readings (sub-index concatenated, no separator). The registry is
// shared with other integrations; ids outside this namespace must never
// be read, mutated, or deleted.

const ID_PREFIX: &str = "TL";

/// The id namespace owned by one module instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Namespace {
    instance: u32,
}

impl Namespace {
    pub fn new(instance: u32) -> Self {
        Self { instance }
    }

    /// The `TL_<instance>_` prefix all owned ids start with.
    pub fn prefix(&self) -> String {
        format!("{ID_PREFIX}_{}_", self.instance)
    }

    /// Local id for a switch-class device.
    pub fn device_id(&self, remote_id: i64) -> String {
        format!("{}{remote_id}", self.prefix())
    }

    /// Local id for one reading of a multi-value sensor. The sub-index
    /// is the reading's position in the sensor's ordered data list.
    pub fn reading_id(&self, remote_id: i64, sub_index: usize) -> String {
        format!("{}{remote_id}{sub_index}", self.prefix())
    }

    /// Strict ownership test (multi-tenant safety: `TL_1_` must not
    /// claim `TL_10_7`).
    pub fn owns(&self, id: &str) -> bool {
        id.starts_with(&self.prefix())
    }

    /// Recover the remote part of an owned id by stripping the prefix.
    pub fn remote_part<'a>(&self, id: &'a str) -> Option<&'a str> {
        id.strip_prefix(&self.prefix())
    }

    /// Drop the trailing sub-index digit of a sensor reading's remote
    /// part, yielding the sensor's own remote id. Sub-indices are
    /// single-digit by contract (position in a short readings list).
    pub fn strip_sub_index(remote_part: &str) -> Option<&str> {
        if remote_part.len() < 2 {
            return None;
        }
        remote_part.get(..remote_part.len() - 1)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn id_synthesis() {
        let ns = Namespace::new(4);
        assert_eq!(ns.device_id(7), "TL_4_7");
        assert_eq!(ns.reading_id(3, 0), "TL_4_30");
        assert_eq!(ns.reading_id(3, 1), "TL_4_31");
    }

    #[test]
    fn ownership_is_strict_prefix() {
        let ns = Namespace::new(1);
        assert!(ns.owns("TL_1_7"));
        assert!(ns.owns("TL_1_30"));
        assert!(!ns.owns("TL_10_7"), "instance 10 is not instance 1");
        assert!(!ns.owns("ZW_1_7"));
        assert!(!ns.owns("sensor_TL_1_7"), "prefix must be at the start");
    }

    #[test]
    fn remote_part_roundtrip() {
        let ns = Namespace::new(2);
        assert_eq!(ns.remote_part("TL_2_42"), Some("42"));
        assert_eq!(ns.remote_part("TL_3_42"), None);
    }

    #[test]
    fn sub_index_strip() {
        assert_eq!(Namespace::strip_sub_index("30"), Some("3"));
        assert_eq!(Namespace::strip_sub_index("451"), Some("45"));
        assert_eq!(Namespace::strip_sub_index("7"), None);
    }
}
