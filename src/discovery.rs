use crate::error::Result;
use crate::types::DiscoveredBridge;
use mdns_sd::{ServiceDaemon, ServiceEvent};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::sleep;

/// mDNS service type Bond bridges advertise under
pub const SERVICE_TYPE: &str = "_bond._tcp.local.";

const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Discovery manager for Bond bridges.
///
/// Passively watches the local network for bridge advertisements and
/// broadcasts a [`DiscoveredBridge`] for every resolved service. The
/// watcher runs in the background and restarts with backoff if the mDNS
/// daemon fails.
///
/// # Example
///
/// ```no_run
/// use bondhome::Discovery;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut discovery = Discovery::new();
///     let mut bridges = discovery.subscribe();
///     discovery.start().await?;
///
///     while let Ok(bridge) = bridges.recv().await {
///         println!("found bridge {} at {:?}", bridge.name, bridge.addresses);
///     }
///
///     discovery.stop().await;
///     Ok(())
/// }
/// ```
pub struct Discovery {
    found_tx: Arc<broadcast::Sender<DiscoveredBridge>>,
    stop_tx: Option<broadcast::Sender<()>>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl Discovery {
    /// Create a new Discovery manager
    pub fn new() -> Self {
        let (found_tx, _) = broadcast::channel(100);
        Self {
            found_tx: Arc::new(found_tx),
            stop_tx: None,
            task_handle: None,
        }
    }

    /// Subscribe to bridge advertisements.
    ///
    /// Returns a receiver yielding a [`DiscoveredBridge`] whenever a
    /// bridge service resolves on the local network.
    pub fn subscribe(&self) -> broadcast::Receiver<DiscoveredBridge> {
        self.found_tx.subscribe()
    }

    /// Start the background watcher.
    ///
    /// If discovery is already running, it is stopped and restarted.
    pub async fn start(&mut self) -> Result<()> {
        self.stop().await;

        let (stop_tx, _) = broadcast::channel(1);
        self.stop_tx = Some(stop_tx.clone());

        let found_tx = self.found_tx.clone();

        let handle = tokio::spawn(async move {
            let mut backoff = Duration::from_secs(0);
            let mut stop_rx = stop_tx.subscribe();

            loop {
                tokio::select! {
                    _ = stop_rx.recv() => {
                        tracing::info!("discovery stopped by user");
                        break;
                    }
                    _ = async {
                        if backoff > Duration::from_secs(0) {
                            tracing::info!("restarting mDNS watcher in {:?}", backoff);
                            sleep(backoff).await;
                        }

                        let mut stop_rx_inner = stop_tx.subscribe();
                        match browse_once(&found_tx, &mut stop_rx_inner).await {
                            Ok(_) => {
                                backoff = Duration::from_secs(0);
                            }
                            Err(e) => {
                                tracing::error!("mDNS watcher error: {}", e);
                                if backoff == Duration::from_secs(0) {
                                    backoff = Duration::from_secs(1);
                                } else {
                                    backoff = (backoff * 2).min(MAX_BACKOFF);
                                }
                            }
                        }
                    } => {}
                }
            }
        });

        self.task_handle = Some(handle);
        Ok(())
    }

    /// Stop the background watcher.
    ///
    /// Subscribers keep their receivers; no further advertisements are
    /// delivered until `start` is called again.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.task_handle.take() {
            // Give it a moment to stop gracefully
            let _ = tokio::time::timeout(Duration::from_millis(500), handle).await;
        }
    }
}

impl Default for Discovery {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one browse session until the daemon fails or a stop is requested
async fn browse_once(
    found_tx: &Arc<broadcast::Sender<DiscoveredBridge>>,
    stop_rx: &mut broadcast::Receiver<()>,
) -> Result<()> {
    let daemon = ServiceDaemon::new()?;
    let events = daemon.browse(SERVICE_TYPE)?;

    tracing::info!("browsing for {}", SERVICE_TYPE);

    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                let _ = daemon.shutdown();
                return Ok(());
            }
            event = events.recv_async() => {
                let event = match event {
                    Ok(event) => event,
                    Err(_) => {
                        // Daemon dropped its side of the channel
                        let _ = daemon.shutdown();
                        return Err(crate::error::BondError::ChannelClosed);
                    }
                };

                match event {
                    ServiceEvent::ServiceResolved(info) => {
                        let name = bridge_name(info.get_fullname());
                        let port = info.get_port();
                        let mut addresses: Vec<SocketAddr> = info
                            .get_addresses()
                            .iter()
                            .map(|addr| SocketAddr::new(*addr, port))
                            .collect();
                        addresses.sort();

                        tracing::info!(
                            "discovered bridge {} ({} address(es))",
                            name,
                            addresses.len()
                        );

                        let _ = found_tx.send(DiscoveredBridge { name, addresses });
                    }
                    ServiceEvent::ServiceRemoved(_, fullname) => {
                        tracing::debug!("bridge service removed: {}", fullname);
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Strip the service-type suffix from an mDNS fullname
fn bridge_name(fullname: &str) -> String {
    fullname
        .strip_suffix(&format!(".{SERVICE_TYPE}"))
        .unwrap_or(fullname)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridge_name_strips_service_suffix() {
        assert_eq!(bridge_name("ZZBL45678._bond._tcp.local."), "ZZBL45678");
        assert_eq!(bridge_name("plain-name"), "plain-name");
    }
}
