use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Bridge identifier as assigned by the directory service
pub type BridgeId = String;

/// Device identifier
pub type DeviceId = String;

/// Credentials returned by the directory service login.
///
/// Immutable once obtained; replaced wholesale on re-login. The API key
/// authenticates directory reads, the bridge token authenticates local
/// command dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub api_key: String,
    pub bridge_token: String,
}

/// A bridge-specific action token.
///
/// Resolved from an intent by the command resolver and consumed by the
/// dispatcher. Value type; never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Bridge-assigned action id
    pub id: String,

    /// Human-readable action name (e.g. "Speed 2", "Light Toggle")
    pub name: String,
}

/// The discrete speed commands of a fan device.
///
/// Exactly three tiers, sorted by increasing physical speed as asserted
/// by the bridge, plus the distinguished power-off command. Built once
/// by the registry at fetch time; never re-sorted downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeedMapping {
    tiers: Vec<Command>,
    off: Command,
}

impl SpeedMapping {
    /// Build the mapping from a device's raw command list.
    ///
    /// Tiers are the commands named `Speed N`, sorted ascending by `N`;
    /// the off command is the one named "Power Off". Returns `None` when
    /// the device does not advertise exactly three speed tiers and an off
    /// command.
    pub fn from_commands(commands: &[Command]) -> Option<Self> {
        let mut tiers: Vec<(u8, Command)> = commands
            .iter()
            .filter_map(|cmd| {
                let n = cmd.name.strip_prefix("Speed ")?.trim().parse::<u8>().ok()?;
                Some((n, cmd.clone()))
            })
            .collect();
        tiers.sort_by_key(|(n, _)| *n);

        if tiers.len() != 3 {
            return None;
        }

        let off = commands
            .iter()
            .find(|cmd| cmd.name.eq_ignore_ascii_case("Power Off"))?
            .clone();

        Some(Self {
            tiers: tiers.into_iter().map(|(_, cmd)| cmd).collect(),
            off,
        })
    }

    /// Get the command for a speed tier (0 = slowest, 2 = fastest)
    pub fn tier(&self, index: usize) -> &Command {
        &self.tiers[index]
    }

    /// Get the power-off command
    pub fn off(&self) -> &Command {
        &self.off
    }
}

/// Kind of physical unit behind a bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceKind {
    /// Ceiling fan (fan + light + reset ensemble)
    Fan,

    /// Any other kind reported by the bridge; not exposed as an accessory
    Other(String),
}

impl DeviceKind {
    /// The label used in accessory display names
    pub fn label(&self) -> &str {
        match self {
            DeviceKind::Fan => "Fan",
            DeviceKind::Other(name) => name,
        }
    }
}

/// A single physical controllable unit behind a bridge. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub room: String,
    pub kind: DeviceKind,
    pub bridge_id: BridgeId,

    /// All actions the bridge advertises for this device
    pub commands: Vec<Command>,

    /// Speed tiers + power off, when the device advertises them
    pub speeds: Option<SpeedMapping>,
}

/// A bridge and its device inventory.
///
/// Created once per discovered bridge; the device list is fixed at fetch
/// time (no live re-sync).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bridge {
    pub id: BridgeId,
    pub address: String,
    pub devices: Vec<Device>,
}

/// A bridge advertisement seen on the local network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredBridge {
    /// The bridge's directory name (mDNS instance name)
    pub name: String,

    /// Local network addresses the bridge answers on
    pub addresses: Vec<SocketAddr>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(id: &str, name: &str) -> Command {
        Command {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn speed_mapping_sorts_tiers_ascending() {
        let commands = vec![
            cmd("12", "Speed 2"),
            cmd("10", "Power Off"),
            cmd("13", "Speed 3"),
            cmd("11", "Speed 1"),
        ];

        let mapping = SpeedMapping::from_commands(&commands).unwrap();
        assert_eq!(mapping.tier(0).name, "Speed 1");
        assert_eq!(mapping.tier(1).name, "Speed 2");
        assert_eq!(mapping.tier(2).name, "Speed 3");
        assert_eq!(mapping.off().id, "10");
    }

    #[test]
    fn speed_mapping_requires_three_tiers() {
        let commands = vec![cmd("11", "Speed 1"), cmd("12", "Speed 2"), cmd("10", "Power Off")];
        assert!(SpeedMapping::from_commands(&commands).is_none());
    }

    #[test]
    fn speed_mapping_requires_power_off() {
        let commands = vec![cmd("11", "Speed 1"), cmd("12", "Speed 2"), cmd("13", "Speed 3")];
        assert!(SpeedMapping::from_commands(&commands).is_none());
    }
}
