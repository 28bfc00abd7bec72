//! Server configuration.

use std::net::{IpAddr, SocketAddr};

use crate::error::{Error, Result};
use crate::DEFAULT_PORT;

/// Server configuration.
///
/// Only the listener surface is configurable; everything else about the
/// data plane (limits, migration constants) is part of the protocol.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address
    pub bind: String,
    /// Port number (0 lets the OS pick, useful in tests)
    pub port: u16,
    /// Listen backlog
    pub backlog: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            backlog: 1024,
        }
    }
}

impl Config {
    /// Resolve the listener socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.bind.parse()?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Reject configurations the listener cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.bind.is_empty() {
            return Err(Error::Config("bind address must not be empty".into()));
        }
        if self.backlog == 0 {
            return Err(Error::Config("backlog must be at least 1".into()));
        }
        self.socket_addr().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_listens_on_all_interfaces() {
        let config = Config::default();
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.port, 1234);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn bad_bind_address_is_rejected() {
        let config = Config {
            bind: "not-an-ip".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
