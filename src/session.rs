use crate::error::{BondError, Result};
use crate::types::Session;
use serde::Deserialize;
use serde_json::json;

/// Base URL of the Bond cloud directory service
pub const DIRECTORY_URL: &str = "https://appbond.com/api/v1";

/// Exchanges account credentials for a session against the cloud
/// directory service.
///
/// Does not cache: callers hold the returned [`Session`] for the process
/// lifetime and re-login only happens on the first successful discovery.
pub struct SessionManager {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct LoginResponse {
    key: String,
    user: LoginUser,
}

#[derive(Deserialize)]
struct LoginUser {
    bond_token: String,
}

impl SessionManager {
    /// Create a session manager against the production directory service
    pub fn new() -> Self {
        Self::with_base_url(DIRECTORY_URL)
    }

    /// Create a session manager against a custom directory base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Exchange credentials for a `(api key, bridge token)` session.
    ///
    /// Fails with [`BondError::Auth`] on a non-2xx response or when the
    /// body does not carry the expected shape.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let url = format!("{}/auth/login/", self.base_url);
        tracing::debug!("logging in at {}", url);

        let response = self
            .http
            .post(&url)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BondError::Auth {
                message: format!("login failed (HTTP {status})"),
            });
        }

        let body: LoginResponse = response.json().await.map_err(|e| BondError::Auth {
            message: format!("malformed login response: {e}"),
        })?;

        tracing::info!("directory login successful");

        Ok(Session {
            api_key: body.key,
            bridge_token: body.user.bond_token,
        })
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
