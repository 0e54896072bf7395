use thiserror::Error;

/// Result type for Bond operations
pub type Result<T> = std::result::Result<T, BondError>;

/// Errors that can occur when interacting with Bond bridges
#[derive(Error, Debug)]
pub enum BondError {
    /// Bad credentials or an invalid/expired session
    #[error("authentication failed: {message}")]
    Auth {
        /// Detail from the directory service
        message: String,
    },

    /// The named bridge is unknown to the directory service
    #[error("bridge not found: {0}")]
    BridgeNotFound(String),

    /// A payload could not be parsed into the expected shape
    #[error("invalid payload: {0}")]
    Decode(String),

    /// The resolver could not map an intent to a device command
    #[error("no command named {name:?} on device {device}")]
    UnknownCommand {
        /// Device the lookup ran against
        device: String,
        /// Requested action name
        name: String,
    },

    /// The bridge rejected a command or was unreachable
    #[error("dispatch failed: {message}")]
    Dispatch {
        /// Detail from the transport or the bridge
        message: String,
    },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// mDNS daemon error
    #[error("mDNS error: {0}")]
    Mdns(#[from] mdns_sd::Error),

    /// Event channel closed (all senders dropped)
    #[error("channel closed")]
    ChannelClosed,

    /// Event channel receiver fell behind
    #[error("event stream lagged by {0} messages")]
    Lagged(u64),
}
