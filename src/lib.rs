//! Rust library for controlling Bond ceiling fan and light bridges
//!
//! This library provides an async API for discovering Bond bridges on the
//! local network and exposing the fan/light units behind them as
//! controllable accessories. It supports:
//!
//! - Passive bridge discovery via mDNS
//! - Authenticated sessions against the Bond cloud directory
//! - Device inventory enumeration per bridge
//! - Fan power, rotation speed, rotation direction and light control
//! - Optimistic speed updates with delayed rollback on dispatch failure
//! - Accessory registration, restoration and in-place upgrade
//! - Out-of-band value pushes for the host accessory platform
//!
//! # Quick Start
//!
//! ```no_run
//! use bondhome::{BondController, ControllerConfig, Discovery};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Watch the local network for bridges
//!     let mut discovery = Discovery::new();
//!     let bridges = discovery.subscribe();
//!     discovery.start().await?;
//!
//!     // The controller logs in on the first advertisement, fetches the
//!     // bridge inventory and registers an accessory per fan device
//!     let controller = BondController::new(
//!         ControllerConfig::new("user@example.com", "hunter2"),
//!     );
//!     let mut events = controller.subscribe();
//!
//!     let runner = controller.clone();
//!     tokio::spawn(async move { runner.run(bridges).await });
//!
//!     // React to registrations and value pushes
//!     while let Ok(event) = events.recv().await {
//!         println!("accessory event: {:?}", event);
//!
//!         // Drive a capability; the call always acknowledges
//!         controller.set_speed("d1", 66).await;
//!         break;
//!     }
//!
//!     discovery.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! The library is organized into several layers:
//!
//! - **Discovery**: passive mDNS watcher yielding bridge advertisements
//! - **SessionManager**: credential exchange with the cloud directory
//! - **BridgeRegistry**: authenticated device inventory fetch per bridge
//! - **Command resolution**: pure intent-to-command mapping
//! - **CommandDispatcher**: bridge-local HTTP command send
//! - **BondController**: the orchestrator binding accessories to devices
//!   and reconciling cached state with dispatch outcomes

mod accessory;
mod controller;
mod discovery;
mod dispatch;
mod error;
mod registry;
mod resolver;
mod session;
mod types;

// Public exports
pub use accessory::{
    Accessory, AccessoryEvent, AccessoryState, Capability, EventReceiver, ServiceKind, Value,
};
pub use controller::{BondController, ControllerConfig, ATTACH_POLL, ROLLBACK_DELAY};
pub use discovery::{Discovery, SERVICE_TYPE};
pub use dispatch::CommandDispatcher;
pub use error::{BondError, Result};
pub use registry::BridgeRegistry;
pub use resolver::{resolve_named, resolve_speed};
pub use session::{SessionManager, DIRECTORY_URL};
pub use types::{
    Bridge, BridgeId, Command, Device, DeviceId, DeviceKind, DiscoveredBridge, Session,
    SpeedMapping,
};
