use std::net::SocketAddr;

use anyhow::{Context, Result};

pub const SERVER_ADDRESS: &str = "127.0.0.1";
pub const SERVER_PORT: u16 = 8765;
pub const WS_PATH: &str = "/";

pub const DECK_SIZE: usize = 52;
pub const HAND_SIZE: usize = DECK_SIZE / 2;
pub const LOBBY_CAPACITY: usize = 2;

/// Bound on queued lobby commands before senders wait.
pub const COMMAND_BUFFER: usize = 256;

/// Events a connection may have queued before its lobby is closed.
pub const OUTBOUND_BUFFER: usize = 128;

pub const ADDRESS_ENV: &str = "EGG_RAT_SLAP_ADDRESS";
pub const PORT_ENV: &str = "EGG_RAT_SLAP_PORT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: SERVER_ADDRESS.to_owned(),
            port: SERVER_PORT,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(address) = lookup(ADDRESS_ENV) {
            config.address = address;
        }
        if let Some(port) = lookup(PORT_ENV) {
            config.port = port
                .trim()
                .parse()
                .with_context(|| format!("{PORT_ENV} is not a valid port: {port:?}"))?;
        }
        Ok(config)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.address, self.port);
        addr.parse()
            .with_context(|| format!("invalid listen address {addr}"))
    }
}
