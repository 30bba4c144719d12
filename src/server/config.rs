//! Server configuration.
//!
//! # Example
//!
//! ```
//! use screenecho_server::ServerConfig;
//!
//! let config = ServerConfig::new()
//!     .with_port(9000)
//!     .with_room_id_attempts(20);
//!
//! assert!(config.validate().is_ok());
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::error::{Error, Result};
use crate::rooms::DEFAULT_ROOM_ID_ATTEMPTS;

// ============================================================================
// Constants
// ============================================================================

/// Default bind address (all interfaces).
pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8080;

// ============================================================================
// ServerConfig
// ============================================================================

/// Configuration for [`Server`](crate::Server).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: IpAddr,

    /// Port to bind; 0 picks a free port.
    pub port: u16,

    /// Attempts to find an unused room ID before giving up.
    pub room_id_attempts: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerConfig {
    /// Creates the default configuration: `0.0.0.0:8080`, 10 attempts.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            host: DEFAULT_HOST,
            port: DEFAULT_PORT,
            room_id_attempts: DEFAULT_ROOM_ID_ATTEMPTS,
        }
    }

    /// Sets the bind address.
    #[inline]
    #[must_use]
    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    /// Sets the port.
    #[inline]
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the number of room ID attempts.
    #[inline]
    #[must_use]
    pub fn with_room_id_attempts(mut self, attempts: usize) -> Self {
        self.room_id_attempts = attempts;
        self
    }

    /// Returns the socket address to bind.
    #[inline]
    #[must_use]
    pub const fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `room_id_attempts` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.room_id_attempts == 0 {
            return Err(Error::config("room_id_attempts must be greater than zero"));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr().to_string(), "0.0.0.0:8080");
        assert_eq!(config.room_id_attempts, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ServerConfig::new()
            .with_host(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .with_port(0)
            .with_room_id_attempts(3);

        assert_eq!(config.bind_addr().to_string(), "127.0.0.1:0");
        assert_eq!(config.room_id_attempts, 3);
    }

    #[test]
    fn test_zero_attempts_invalid() {
        let err = ServerConfig::new()
            .with_room_id_attempts(0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
