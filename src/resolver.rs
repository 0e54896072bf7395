//! Pure intent-to-command mapping. No I/O, no side effects.

use crate::error::{BondError, Result};
use crate::types::{Command, Device};

/// Resolve a rotation-speed percentage to the device command for it.
///
/// Fan hardware in this domain supports three named speeds plus off, so
/// percentage inputs are matched exactly against the discrete tiers:
/// 33, 66 and 99 map to the first, second and third speed command. Every
/// other value, including 0, resolves to the power-off command.
pub fn resolve_speed<'a>(device: &'a Device, percent: u8) -> Result<&'a Command> {
    let speeds = device.speeds.as_ref().ok_or_else(|| BondError::UnknownCommand {
        device: device.id.clone(),
        name: format!("Speed {percent}"),
    })?;

    Ok(match percent {
        33 => speeds.tier(0),
        66 => speeds.tier(1),
        99 => speeds.tier(2),
        _ => speeds.off(),
    })
}

/// Look up a command by its human-readable action name (e.g. "Reverse",
/// "Light Toggle").
pub fn resolve_named<'a>(device: &'a Device, name: &str) -> Result<&'a Command> {
    device
        .commands
        .iter()
        .find(|cmd| cmd.name == name)
        .ok_or_else(|| BondError::UnknownCommand {
            device: device.id.clone(),
            name: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeviceKind, SpeedMapping};

    fn cmd(id: &str, name: &str) -> Command {
        Command {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    fn fan() -> Device {
        let commands = vec![
            cmd("11", "Speed 1"),
            cmd("12", "Speed 2"),
            cmd("13", "Speed 3"),
            cmd("10", "Power Off"),
            cmd("20", "Reverse"),
            cmd("30", "Light Toggle"),
        ];
        let speeds = SpeedMapping::from_commands(&commands);
        Device {
            id: "d1".to_string(),
            room: "Office".to_string(),
            kind: DeviceKind::Fan,
            bridge_id: "b1".to_string(),
            commands,
            speeds,
        }
    }

    #[test]
    fn speed_tiers_map_to_sorted_commands() {
        let device = fan();
        assert_eq!(resolve_speed(&device, 33).unwrap().id, "11");
        assert_eq!(resolve_speed(&device, 66).unwrap().id, "12");
        assert_eq!(resolve_speed(&device, 99).unwrap().id, "13");
    }

    #[test]
    fn other_values_resolve_to_power_off() {
        let device = fan();
        for percent in [0, 1, 32, 34, 50, 65, 98, 100] {
            assert_eq!(resolve_speed(&device, percent).unwrap().id, "10");
        }
    }

    #[test]
    fn missing_speed_mapping_is_unknown_command() {
        let mut device = fan();
        device.speeds = None;
        assert!(matches!(
            resolve_speed(&device, 33),
            Err(BondError::UnknownCommand { .. })
        ));
    }

    #[test]
    fn named_lookup_finds_command() {
        let device = fan();
        assert_eq!(resolve_named(&device, "Reverse").unwrap().id, "20");
        assert_eq!(resolve_named(&device, "Light Toggle").unwrap().id, "30");
    }

    #[test]
    fn named_lookup_miss_is_unknown_command() {
        let device = fan();
        assert!(matches!(
            resolve_named(&device, "Dim"),
            Err(BondError::UnknownCommand { .. })
        ));
    }
}
