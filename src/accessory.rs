use crate::error::{BondError, Result};
use crate::types::{Device, DeviceId};
use tokio::sync::broadcast;
use uuid::Uuid;

/// A capability sub-service exposed by an accessory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    /// Fan power / direction / rotation speed
    Fan,

    /// The fan's light
    Light,

    /// Momentary reset switch
    ResetSwitch,

    /// Obsolete reverse switch from older releases; removed on upgrade
    ReverseSwitch,
}

/// Externally observable capability of an accessory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    FanPower,
    Direction,
    Speed,
    LightPower,
    Reset,
}

/// A capability value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Percent(u8),
}

/// Cached capability values for one accessory.
///
/// The reset indicator is momentary and never cached; it always reads
/// false.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessoryState {
    pub fan_on: bool,
    pub reversed: bool,
    pub speed: u8,
    pub light_on: bool,
}

/// The host-platform-facing representation of a device.
///
/// One accessory exists per supported device id at any time. Its identity
/// is a stable UUID derived from the device id so the host platform can
/// persist and restore it across restarts.
#[derive(Debug, Clone)]
pub struct Accessory {
    pub uuid: Uuid,
    pub device: Device,
    pub services: Vec<ServiceKind>,
    pub state: AccessoryState,

    /// Set once capability binding has run; set-requests on an unbound
    /// accessory are acknowledged without dispatch
    pub bound: bool,
}

impl Accessory {
    /// Create a freshly registered accessory with the full service set
    pub fn new(device: Device) -> Self {
        Self {
            uuid: Uuid::new_v5(&Uuid::NAMESPACE_OID, device.id.as_bytes()),
            device,
            services: vec![ServiceKind::Fan, ServiceKind::Light, ServiceKind::ResetSwitch],
            state: AccessoryState::default(),
            bound: false,
        }
    }

    /// Reconstruct an accessory restored by the host platform, with
    /// whatever service shape it was persisted with
    pub fn restored(device: Device, services: Vec<ServiceKind>) -> Self {
        Self {
            uuid: Uuid::new_v5(&Uuid::NAMESPACE_OID, device.id.as_bytes()),
            device,
            services,
            state: AccessoryState::default(),
            bound: false,
        }
    }

    /// Display name, e.g. "Office Fan"
    pub fn display_name(&self) -> String {
        format!("{} {}", self.device.room, self.device.kind.label())
    }

    /// Light sub-service name, e.g. "Office Fan Light"
    pub fn light_name(&self) -> String {
        format!("{} Light", self.display_name())
    }

    /// Reset sub-service name, e.g. "Reset Office Fan"
    pub fn reset_name(&self) -> String {
        format!("Reset {}", self.display_name())
    }

    pub fn has_service(&self, kind: ServiceKind) -> bool {
        self.services.contains(&kind)
    }
}

/// Out-of-band notification to the host platform
#[derive(Debug, Clone)]
pub enum AccessoryEvent {
    /// A new accessory was registered
    Registered { device_id: DeviceId, name: String },

    /// An accessory was unregistered and dropped
    Removed { device_id: DeviceId, name: String },

    /// A cached capability value changed; the platform should push the
    /// new value to observers
    ValueChanged {
        device_id: DeviceId,
        capability: Capability,
        value: Value,
    },
}

/// Receiver for accessory events
pub struct EventReceiver {
    rx: broadcast::Receiver<AccessoryEvent>,
}

impl EventReceiver {
    pub(crate) fn new(rx: broadcast::Receiver<AccessoryEvent>) -> Self {
        Self { rx }
    }

    /// Receive the next accessory event
    pub async fn recv(&mut self) -> Result<AccessoryEvent> {
        self.rx.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => BondError::ChannelClosed,
            broadcast::error::RecvError::Lagged(n) => BondError::Lagged(n),
        })
    }

    /// Try to receive an event without blocking
    ///
    /// Returns `None` if no event is pending.
    pub fn try_recv(&mut self) -> Result<Option<AccessoryEvent>> {
        match self.rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Closed) => Err(BondError::ChannelClosed),
            Err(broadcast::error::TryRecvError::Lagged(n)) => Err(BondError::Lagged(n)),
        }
    }
}
