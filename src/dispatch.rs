use crate::error::{BondError, Result};
use crate::types::{Bridge, Command, Device, Session};

/// Sends resolved commands to a bridge over its local HTTP API.
///
/// One network call per dispatch, no retry or backoff: a failure is
/// surfaced to the caller, which owns recovery policy.
pub struct CommandDispatcher {
    http: reqwest::Client,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Send `command` to the bridge that owns `device`.
    ///
    /// Any transport failure or non-2xx response maps to
    /// [`BondError::Dispatch`].
    pub async fn dispatch(
        &self,
        session: &Session,
        bridge: &Bridge,
        device: &Device,
        command: &Command,
    ) -> Result<()> {
        let url = format!("http://{}/v1/commands/{}/tx", bridge.address, command.id);
        tracing::debug!("dispatching {:?} to device {} at {}", command.name, device.id, url);

        let response = self
            .http
            .post(&url)
            .header("Bond-Token", &session.bridge_token)
            .send()
            .await
            .map_err(|e| BondError::Dispatch {
                message: format!("bridge {} unreachable: {e}", bridge.id),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BondError::Dispatch {
                message: format!(
                    "bridge {} rejected {:?} for device {} (HTTP {status})",
                    bridge.id, command.name, device.id
                ),
            });
        }

        Ok(())
    }
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
