use crate::error::{BondError, Result};
use crate::session::DIRECTORY_URL;
use crate::types::{Bridge, Command, Device, DeviceKind, Session, SpeedMapping};
use serde::Deserialize;

/// Fetches a bridge's device inventory from the directory service.
///
/// No internal retries: the discovery pipeline decides whether a failed
/// fetch is worth retrying on the next advertisement.
pub struct BridgeRegistry {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct BridgePayload {
    id: String,
    #[serde(default)]
    devices: Vec<DevicePayload>,
}

#[derive(Deserialize)]
struct DevicePayload {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    room: String,
    #[serde(default)]
    commands: Vec<CommandPayload>,
}

#[derive(Deserialize)]
struct CommandPayload {
    id: String,
    name: String,
}

impl BridgeRegistry {
    /// Create a registry against the production directory service
    pub fn new() -> Self {
        Self::with_base_url(DIRECTORY_URL)
    }

    /// Create a registry against a custom directory base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Fetch the named bridge's inventory and construct a [`Bridge`].
    ///
    /// `address` is the local network address the bridge was discovered
    /// at; it is recorded on the bridge for later command dispatch.
    /// Fails with [`BondError::BridgeNotFound`] when the directory does
    /// not know the name, [`BondError::Auth`] when the session is invalid
    /// or expired, and [`BondError::Decode`] when the payload cannot be
    /// parsed into the device list shape.
    pub async fn fetch_bridge(
        &self,
        name: &str,
        address: &str,
        session: &Session,
    ) -> Result<Bridge> {
        let url = format!("{}/bonds/{}", self.base_url, name);
        tracing::debug!("fetching bridge inventory from {}", url);

        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Token {}", session.api_key))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(BondError::BridgeNotFound(name.to_string()));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(BondError::Auth {
                message: format!("bridge fetch rejected (HTTP {status})"),
            });
        }
        if !status.is_success() {
            return Err(BondError::Decode(format!(
                "unexpected response fetching bridge {name} (HTTP {status})"
            )));
        }

        let body = response.text().await?;
        parse_bridge(address, &body)
    }
}

impl Default for BridgeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse an inventory payload into a [`Bridge`] at the given address
fn parse_bridge(address: &str, body: &str) -> Result<Bridge> {
    let payload: BridgePayload = serde_json::from_str(body)
        .map_err(|e| BondError::Decode(format!("malformed bridge inventory: {e}")))?;

    let devices = payload
        .devices
        .into_iter()
        .map(|device| build_device(&payload.id, device))
        .collect();

    Ok(Bridge {
        id: payload.id,
        address: address.to_string(),
        devices,
    })
}

fn build_device(bridge_id: &str, payload: DevicePayload) -> Device {
    let commands: Vec<Command> = payload
        .commands
        .into_iter()
        .map(|cmd| Command {
            id: cmd.id,
            name: cmd.name,
        })
        .collect();

    let kind = match payload.kind.as_str() {
        "Fan" => DeviceKind::Fan,
        other => DeviceKind::Other(other.to_string()),
    };

    let speeds = SpeedMapping::from_commands(&commands);
    if kind == DeviceKind::Fan && speeds.is_none() {
        tracing::warn!(
            "device {} advertises no usable speed commands; speed intents will not resolve",
            payload.id
        );
    }

    Device {
        id: payload.id,
        room: payload.room,
        kind,
        bridge_id: bridge_id.to_string(),
        commands,
        speeds,
    }
}
