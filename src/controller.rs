use crate::accessory::{Accessory, AccessoryEvent, AccessoryState, Capability, EventReceiver, ServiceKind, Value};
use crate::dispatch::CommandDispatcher;
use crate::error::Result;
use crate::registry::BridgeRegistry;
use crate::resolver;
use crate::session::{SessionManager, DIRECTORY_URL};
use crate::types::{Bridge, BridgeId, Device, DeviceId, DeviceKind, DiscoveredBridge, Session};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::sleep;

/// Delay before a failed speed dispatch rolls the cache back, and before
/// the reset indicator reverts
pub const ROLLBACK_DELAY: Duration = Duration::from_millis(250);

/// Interval at which a restored accessory polls for the first bridge
pub const ATTACH_POLL: Duration = Duration::from_millis(500);

/// Controller configuration
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Directory account email
    pub email: String,

    /// Directory account password
    pub password: String,

    /// Directory service base URL
    pub directory_url: String,
}

impl ControllerConfig {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            directory_url: DIRECTORY_URL.to_string(),
        }
    }

    /// Point the controller at a different directory service
    pub fn with_directory_url(mut self, url: impl Into<String>) -> Self {
        self.directory_url = url.into();
        self
    }
}

/// Orchestrator for Bond accessories.
///
/// Owns the accessory and bridge collections and the session, consumes
/// bridge advertisements, and binds each accessory's settable
/// capabilities to command resolution and dispatch. Set-requests always
/// complete: errors are logged and reconciled locally, never surfaced to
/// the host platform.
///
/// Cheaply cloneable; clones share the same state.
///
/// # Example
///
/// ```no_run
/// use bondhome::{BondController, ControllerConfig, Discovery};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut discovery = Discovery::new();
///     let bridges = discovery.subscribe();
///     discovery.start().await?;
///
///     let controller = BondController::new(
///         ControllerConfig::new("user@example.com", "hunter2"),
///     );
///     let mut events = controller.subscribe();
///
///     let runner = controller.clone();
///     tokio::spawn(async move { runner.run(bridges).await });
///
///     while let Ok(event) = events.recv().await {
///         println!("accessory event: {:?}", event);
///     }
///
///     discovery.stop().await;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct BondController {
    inner: Arc<Inner>,
}

struct Inner {
    config: ControllerConfig,
    sessions: SessionManager,
    registry: BridgeRegistry,
    dispatcher: CommandDispatcher,
    session: Mutex<Option<Session>>,
    bridges: Mutex<BTreeMap<BridgeId, Bridge>>,
    accessories: Mutex<BTreeMap<DeviceId, Accessory>>,
    event_tx: broadcast::Sender<AccessoryEvent>,
}

impl BondController {
    /// Create a new controller
    pub fn new(config: ControllerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        let inner = Inner {
            sessions: SessionManager::with_base_url(config.directory_url.clone()),
            registry: BridgeRegistry::with_base_url(config.directory_url.clone()),
            dispatcher: CommandDispatcher::new(),
            config,
            session: Mutex::new(None),
            bridges: Mutex::new(BTreeMap::new()),
            accessories: Mutex::new(BTreeMap::new()),
            event_tx,
        };
        Self { inner: Arc::new(inner) }
    }

    /// Subscribe to accessory events (registrations, removals, value
    /// pushes)
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver::new(self.inner.event_tx.subscribe())
    }

    /// Consume bridge advertisements until the sender is dropped.
    ///
    /// Every advertisement runs the discovery pipeline: login (once),
    /// inventory fetch, accessory registration. Pipeline errors are
    /// logged and the bridge stays unregistered until rediscovered.
    pub async fn run(&self, mut events: broadcast::Receiver<DiscoveredBridge>) {
        loop {
            match events.recv().await {
                Ok(found) => self.handle_discovered(found).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("discovery stream lagged by {} advertisements", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    async fn handle_discovered(&self, found: DiscoveredBridge) {
        tracing::info!("discovered bridge {}", found.name);

        if found.addresses.is_empty() {
            tracing::warn!("no addresses associated with bridge {}; skipping", found.name);
            return;
        }

        if let Err(e) = self.register_bridge(&found).await {
            tracing::error!("failed to register bridge {}: {}", found.name, e);
        }
    }

    async fn register_bridge(&self, found: &DiscoveredBridge) -> Result<()> {
        let session = self.ensure_session().await?;
        let address = found.addresses[0].to_string();

        let bridge = self
            .inner
            .registry
            .fetch_bridge(&found.name, &address, &session)
            .await?;

        tracing::info!(
            "registered bridge {} at {} with {} device(s)",
            bridge.id,
            bridge.address,
            bridge.devices.len()
        );

        let devices = bridge.devices.clone();
        self.inner
            .bridges
            .lock()
            .unwrap()
            .insert(bridge.id.clone(), bridge);

        for device in devices {
            if !self.device_added(&device.id) {
                self.add_accessory(device);
            }
        }

        Ok(())
    }

    /// Log in once; later calls reuse the held session
    async fn ensure_session(&self) -> Result<Session> {
        if let Some(session) = self.inner.session.lock().unwrap().clone() {
            return Ok(session);
        }

        let session = self
            .inner
            .sessions
            .login(&self.inner.config.email, &self.inner.config.password)
            .await?;

        *self.inner.session.lock().unwrap() = Some(session.clone());
        Ok(session)
    }

    // ========== Registration ==========

    /// Register an accessory for a device.
    ///
    /// Idempotent: a device that already has an accessory is logged and
    /// skipped, as is any device of an unsupported kind. New accessories
    /// expose fan, light and reset services and are bound immediately.
    pub fn add_accessory(&self, device: Device) {
        let event = {
            let mut accessories = self.inner.accessories.lock().unwrap();

            if accessories.contains_key(&device.id) {
                tracing::info!("{} has already been added", device.id);
                return;
            }
            if device.kind != DeviceKind::Fan {
                tracing::info!("{} has an unsupported device type", device.id);
                return;
            }

            let mut accessory = Accessory::new(device);
            accessory.bound = true;
            tracing::info!("adding accessory {}", accessory.display_name());

            let event = AccessoryEvent::Registered {
                device_id: accessory.device.id.clone(),
                name: accessory.display_name(),
            };
            accessories.insert(accessory.device.id.clone(), accessory);
            event
        };

        let _ = self.inner.event_tx.send(event);
    }

    /// Unregister the accessory for a device and drop it
    pub fn remove_accessory(&self, device_id: &str) {
        let removed = self.inner.accessories.lock().unwrap().remove(device_id);

        match removed {
            Some(accessory) => {
                tracing::info!("removing accessory {}", accessory.display_name());
                let _ = self.inner.event_tx.send(AccessoryEvent::Removed {
                    device_id: accessory.device.id.clone(),
                    name: accessory.display_name(),
                });
            }
            None => tracing::info!("no accessory registered for device {}", device_id),
        }
    }

    /// Accept an accessory restored by the host platform.
    ///
    /// If a bridge is already known the accessory is upgraded and bound
    /// immediately. Otherwise binding is deferred: a background task
    /// polls until the first bridge registers, then upgrades and binds
    /// exactly once. Discovery may race restoration, so a blocking wait
    /// is not an option here.
    pub fn configure_accessory(&self, accessory: Accessory) {
        let device_id = accessory.device.id.clone();
        self.inner
            .accessories
            .lock()
            .unwrap()
            .insert(device_id.clone(), accessory);

        if self.inner.bridges.lock().unwrap().is_empty() {
            let this = self.clone();
            tokio::spawn(async move {
                loop {
                    sleep(ATTACH_POLL).await;
                    if !this.inner.bridges.lock().unwrap().is_empty() {
                        this.upgrade_and_bind(&device_id);
                        break;
                    }
                }
            });
        } else {
            self.upgrade_and_bind(&device_id);
        }
    }

    /// One-time upgrade pass + capability binding for a restored accessory
    fn upgrade_and_bind(&self, device_id: &str) {
        let mut accessories = self.inner.accessories.lock().unwrap();
        let Some(accessory) = accessories.get_mut(device_id) else {
            return;
        };

        tracing::info!("configuring accessory {}", accessory.display_name());

        if !accessory.has_service(ServiceKind::ResetSwitch) {
            tracing::info!("upgrading accessory {}", accessory.display_name());
            accessory.services.push(ServiceKind::ResetSwitch);
        }
        if accessory.has_service(ServiceKind::ReverseSwitch) {
            tracing::info!("removing reverse switch");
            accessory.services.retain(|s| *s != ServiceKind::ReverseSwitch);
        }

        accessory.bound = true;
    }

    // ========== Capability set-requests ==========
    //
    // Each setter always completes: unresolved intents, missing context
    // and dispatch failures are logged and the request is still
    // acknowledged to the caller.

    /// Set fan power.
    ///
    /// Fan power is a toggle-style command on the bridge: a request that
    /// matches the cached value is acknowledged without dispatch so the
    /// hardware does not flip out of the requested state. Powering on
    /// re-applies the cached rotation speed; powering off dispatches the
    /// power-off command.
    pub async fn set_fan_power(&self, device_id: &str, on: bool) {
        let Some(cached) = self.cached_state(device_id) else {
            return;
        };

        // This arrives right after a rotation-speed set; skip if state
        // isn't changing.
        if cached.fan_on == on {
            return;
        }

        let Some((session, bridge, device)) = self.dispatch_context(device_id) else {
            return;
        };

        let target = if on { cached.speed } else { 0 };
        let command = match resolver::resolve_speed(&device, target) {
            Ok(cmd) => cmd.clone(),
            Err(e) => {
                tracing::warn!("{}", e);
                return;
            }
        };

        match self
            .inner
            .dispatcher
            .dispatch(&session, &bridge, &device, &command)
            .await
        {
            Ok(()) => self.store_value(device_id, Capability::FanPower, Value::Bool(on)),
            Err(e) => tracing::error!("{}", e),
        }
    }

    /// Set rotation direction by dispatching the device's "Reverse"
    /// command
    pub async fn set_direction(&self, device_id: &str, reversed: bool) {
        if self.cached_state(device_id).is_none() {
            return;
        }
        let Some((session, bridge, device)) = self.dispatch_context(device_id) else {
            return;
        };

        let command = match resolver::resolve_named(&device, "Reverse") {
            Ok(cmd) => cmd.clone(),
            Err(e) => {
                tracing::warn!("{}", e);
                return;
            }
        };

        match self
            .inner
            .dispatcher
            .dispatch(&session, &bridge, &device, &command)
            .await
        {
            Ok(()) => self.store_value(device_id, Capability::Direction, Value::Bool(reversed)),
            Err(e) => tracing::error!("{}", e),
        }
    }

    /// Set rotation speed.
    ///
    /// The new value goes into the cache before the dispatch completes,
    /// because the power-on notification follows almost immediately and
    /// must observe it. A failed dispatch rolls the cache back to the
    /// previous value after [`ROLLBACK_DELAY`]; the rollback timer is not
    /// cancelled by later sets.
    pub async fn set_speed(&self, device_id: &str, percent: u8) {
        let Some(cached) = self.cached_state(device_id) else {
            return;
        };
        let Some((session, bridge, device)) = self.dispatch_context(device_id) else {
            return;
        };

        let command = match resolver::resolve_speed(&device, percent) {
            Ok(cmd) => cmd.clone(),
            Err(e) => {
                tracing::warn!("{}", e);
                return;
            }
        };

        let previous = cached.speed;
        self.store_value(device_id, Capability::Speed, Value::Percent(percent));

        if let Err(e) = self
            .inner
            .dispatcher
            .dispatch(&session, &bridge, &device, &command)
            .await
        {
            tracing::error!("{}", e);

            let this = self.clone();
            let device_id = device_id.to_string();
            tokio::spawn(async move {
                // Delayed so the revert doesn't fight the in-flight UI
                // update.
                sleep(ROLLBACK_DELAY).await;
                this.store_value(&device_id, Capability::Speed, Value::Percent(previous));
            });
        }
    }

    /// Set the light.
    ///
    /// Light power is a toggle-style command on the bridge; a request
    /// matching the cached value is acknowledged without dispatch.
    pub async fn set_light(&self, device_id: &str, on: bool) {
        let Some(cached) = self.cached_state(device_id) else {
            return;
        };
        if cached.light_on == on {
            return;
        }

        let Some((session, bridge, device)) = self.dispatch_context(device_id) else {
            return;
        };

        let command = match resolver::resolve_named(&device, "Light Toggle") {
            Ok(cmd) => cmd.clone(),
            Err(e) => {
                tracing::warn!("{}", e);
                return;
            }
        };

        match self
            .inner
            .dispatcher
            .dispatch(&session, &bridge, &device, &command)
            .await
        {
            Ok(()) => self.store_value(device_id, Capability::LightPower, Value::Bool(on)),
            Err(e) => tracing::error!("{}", e),
        }
    }

    /// Press the momentary reset switch.
    ///
    /// Drives fan power, direction and light to off in the cache without
    /// dispatching, then reverts its own indicator after
    /// [`ROLLBACK_DELAY`].
    pub fn reset(&self, device_id: &str) {
        if self.cached_state(device_id).is_none() {
            return;
        }

        self.store_value(device_id, Capability::FanPower, Value::Bool(false));
        self.store_value(device_id, Capability::Direction, Value::Bool(false));
        self.store_value(device_id, Capability::LightPower, Value::Bool(false));

        let this = self.clone();
        let device_id = device_id.to_string();
        tokio::spawn(async move {
            sleep(ROLLBACK_DELAY).await;
            this.store_value(&device_id, Capability::Reset, Value::Bool(false));
        });
    }

    /// The reset switch is momentary; it always reads false
    pub fn reset_indicator(&self, _device_id: &str) -> bool {
        false
    }

    // ========== Accessors ==========

    /// Snapshot of the accessory for a device, if one is registered
    pub fn accessory(&self, device_id: &str) -> Option<Accessory> {
        self.inner.accessories.lock().unwrap().get(device_id).cloned()
    }

    /// Number of registered accessories
    pub fn accessory_count(&self) -> usize {
        self.inner.accessories.lock().unwrap().len()
    }

    /// Number of registered bridges
    pub fn bridge_count(&self) -> usize {
        self.inner.bridges.lock().unwrap().len()
    }

    /// The active session, once login has succeeded
    pub fn session(&self) -> Option<Session> {
        self.inner.session.lock().unwrap().clone()
    }

    // ========== Internals ==========

    fn device_added(&self, device_id: &str) -> bool {
        self.inner.accessories.lock().unwrap().contains_key(device_id)
    }

    /// Cached state for a bound accessory; logs and returns `None` for
    /// unknown or not-yet-bound devices
    fn cached_state(&self, device_id: &str) -> Option<AccessoryState> {
        let accessories = self.inner.accessories.lock().unwrap();
        match accessories.get(device_id) {
            Some(accessory) if accessory.bound => Some(accessory.state),
            Some(_) => {
                tracing::warn!("accessory for {} is not bound yet; ignoring set", device_id);
                None
            }
            None => {
                tracing::warn!("no accessory for device {}; ignoring set", device_id);
                None
            }
        }
    }

    /// Everything a dispatch needs, cloned out of the shared state.
    ///
    /// A command is never dispatched before a valid session exists.
    fn dispatch_context(&self, device_id: &str) -> Option<(Session, Bridge, Device)> {
        let session = self.inner.session.lock().unwrap().clone();
        let Some(session) = session else {
            tracing::warn!("no session yet; ignoring set for device {}", device_id);
            return None;
        };

        let device = self
            .inner
            .accessories
            .lock()
            .unwrap()
            .get(device_id)
            .map(|accessory| accessory.device.clone());
        let Some(device) = device else {
            tracing::warn!("no accessory for device {}; ignoring set", device_id);
            return None;
        };

        let bridge = self.inner.bridges.lock().unwrap().get(&device.bridge_id).cloned();
        let Some(bridge) = bridge else {
            tracing::warn!(
                "bridge {} for device {} is not registered; ignoring set",
                device.bridge_id,
                device_id
            );
            return None;
        };

        Some((session, bridge, device))
    }

    /// Write a capability value into the cache and push it to observers.
    ///
    /// The reset indicator is momentary and is pushed without being
    /// cached.
    fn store_value(&self, device_id: &str, capability: Capability, value: Value) {
        {
            let mut accessories = self.inner.accessories.lock().unwrap();
            let Some(accessory) = accessories.get_mut(device_id) else {
                return;
            };

            match (capability, value) {
                (Capability::FanPower, Value::Bool(v)) => accessory.state.fan_on = v,
                (Capability::Direction, Value::Bool(v)) => accessory.state.reversed = v,
                (Capability::Speed, Value::Percent(v)) => accessory.state.speed = v,
                (Capability::LightPower, Value::Bool(v)) => accessory.state.light_on = v,
                (Capability::Reset, _) => {}
                _ => return,
            }
        }

        let _ = self.inner.event_tx.send(AccessoryEvent::ValueChanged {
            device_id: device_id.to_string(),
            capability,
            value,
        });
    }
}
