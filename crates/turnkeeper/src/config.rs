//! Server configuration.

use serde::{Deserialize, Serialize};

use crate::TurnkeeperError;

/// Address used when neither `HOST` nor `PORT` is set.
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Port used when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 3000;
/// The only path WebSocket upgrades are accepted on, by default.
pub const DEFAULT_WS_PATH: &str = "/ws";

/// Where to listen and which path to serve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// `host:port` to bind.
    pub bind_addr: String,
    /// Upgrade path filter. `None` accepts every path.
    pub ws_path: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("{DEFAULT_HOST}:{DEFAULT_PORT}"),
            ws_path: Some(DEFAULT_WS_PATH.to_string()),
        }
    }
}

impl ServerConfig {
    /// Reads `HOST` and `PORT` from the environment, falling back to the
    /// defaults for whichever is unset.
    pub fn from_env() -> Result<Self, TurnkeeperError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, TurnkeeperError> {
        let host = lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| {
                TurnkeeperError::Config(format!("PORT={raw:?}: {e}"))
            })?,
            None => DEFAULT_PORT,
        };
        Ok(Self {
            bind_addr: format!("{host}:{port}"),
            ..Self::default()
        })
    }
}
