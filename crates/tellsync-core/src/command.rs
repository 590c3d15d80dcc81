// ── Command translation ──
//
// The host routes user actions on virtual devices back here as
// `(device_id, command, level)` triples. This module turns them into
// remote method codes; the importer owns the round trip and the
// local echo after a confirmed command.

use crate::registry::Level;

/// Remote method code for turning a device on.
pub const METHOD_ON: u8 = 1;
/// Remote method code for turning a device off.
pub const METHOD_OFF: u8 = 2;
/// Remote method code for dimming to an absolute value.
pub const METHOD_DIM: u8 = 16;

/// A user action on a virtual device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    On,
    Off,
    /// Dim to a 0–99 percentage.
    Exact { level: u8 },
    /// Refresh a sensor reading on demand.
    Update,
}

impl DeviceCommand {
    /// Parse the host's command verb. `level` is only meaningful for
    /// `exact`; out-of-range levels are clamped to 99.
    pub fn parse(command: &str, level: Option<f64>) -> Option<Self> {
        match command {
            "on" => Some(Self::On),
            "off" => Some(Self::Off),
            "exact" => {
                let level = level?;
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let level = level.clamp(0.0, 99.0).round() as u8;
                Some(Self::Exact { level })
            }
            "update" => Some(Self::Update),
            _ => None,
        }
    }

    /// Remote `(method, value)` pair, `None` for commands that do not
    /// map to a device command call.
    pub fn wire(self) -> Option<(u8, i64)> {
        match self {
            Self::On => Some((METHOD_ON, 0)),
            Self::Off => Some((METHOD_OFF, 0)),
            Self::Exact { level } => Some((METHOD_DIM, dim_value(level))),
            Self::Update => None,
        }
    }

    /// The level to echo into the registry once the remote confirms.
    pub fn target_level(self) -> Option<Level> {
        match self {
            Self::On => Some(Level::On),
            Self::Off => Some(Level::Off),
            Self::Exact { level } => Some(Level::Percent(level)),
            Self::Update => None,
        }
    }
}

/// Scale a 0–99 percentage to the remote's 0–255 range.
pub fn dim_value(level: u8) -> i64 {
    #[allow(clippy::cast_possible_truncation)]
    let value = (f64::from(level.min(99)) / 99.0 * 255.0).round() as i64;
    value
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn verbs_parse_to_commands() {
        assert_eq!(DeviceCommand::parse("on", None), Some(DeviceCommand::On));
        assert_eq!(DeviceCommand::parse("off", None), Some(DeviceCommand::Off));
        assert_eq!(
            DeviceCommand::parse("exact", Some(50.0)),
            Some(DeviceCommand::Exact { level: 50 })
        );
        assert_eq!(
            DeviceCommand::parse("update", None),
            Some(DeviceCommand::Update)
        );
        assert_eq!(DeviceCommand::parse("exact", None), None);
        assert_eq!(DeviceCommand::parse("toggle", None), None);
    }

    #[test]
    fn exact_levels_are_clamped() {
        assert_eq!(
            DeviceCommand::parse("exact", Some(250.0)),
            Some(DeviceCommand::Exact { level: 99 })
        );
        assert_eq!(
            DeviceCommand::parse("exact", Some(-3.0)),
            Some(DeviceCommand::Exact { level: 0 })
        );
    }

    #[test]
    fn dim_values_scale_and_round() {
        assert_eq!(dim_value(0), 0);
        assert_eq!(dim_value(1), 3);
        assert_eq!(dim_value(50), 129);
        assert_eq!(dim_value(99), 255);
    }

    #[test]
    fn wire_pairs_match_remote_method_codes() {
        assert_eq!(DeviceCommand::On.wire(), Some((METHOD_ON, 0)));
        assert_eq!(DeviceCommand::Off.wire(), Some((METHOD_OFF, 0)));
        assert_eq!(
            DeviceCommand::Exact { level: 99 }.wire(),
            Some((METHOD_DIM, 255))
        );
        assert_eq!(DeviceCommand::Update.wire(), None);
    }

    #[test]
    fn target_levels_echo_the_command() {
        assert_eq!(DeviceCommand::On.target_level(), Some(Level::On));
        assert_eq!(
            DeviceCommand::Exact { level: 42 }.target_level(),
            Some(Level::Percent(42))
        );
        assert_eq!(DeviceCommand::Update.target_level(), None);
    }
}
