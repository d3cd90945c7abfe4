//! Session facts shared with authentication plugins.
//!
//! Plugins never touch the socket. They see a read-only [`AuthSession`]:
//! the authentication configuration, whether the channel is already
//! encrypted, and the negotiated server version (which gates the RSA
//! padding choice in caching_sha2_password).

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use wireauth_core::Error;

use crate::config::AuthConfig;

/// A parsed MySQL server version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ServerVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

impl ServerVersion {
    pub fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// True if this version is at least `major.minor.patch`.
    pub fn meets_minimum(&self, major: u16, minor: u16, patch: u16) -> bool {
        *self >= ServerVersion::new(major, minor, patch)
    }
}

impl FromStr for ServerVersion {
    type Err = Error;

    /// Parse a server version string such as `"8.0.33"` or
    /// `"8.0.33-0ubuntu0.22.04.2"` (suffix ignored).
    fn from_str(s: &str) -> Result<Self, Error> {
        let core = s.split(['-', '+']).next().unwrap_or(s);
        let mut parts = core.split('.');

        let mut next_number = |name: &str| {
            parts
                .next()
                .and_then(|p| p.parse::<u16>().ok())
                .ok_or_else(|| Error::protocol(format!("malformed server version '{s}': bad {name}")))
        };

        let major = next_number("major")?;
        let minor = next_number("minor")?;
        let patch = next_number("patch")?;
        Ok(Self::new(major, minor, patch))
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Read-only session state handed to every plugin at construction.
#[derive(Debug)]
pub struct AuthSession {
    /// Authentication configuration
    pub config: AuthConfig,
    /// Whether TLS (or an equivalent confidential channel) is established
    pub tls_established: bool,
    /// The server version from the initial handshake
    pub server_version: ServerVersion,
}

impl AuthSession {
    /// Create a shared session.
    pub fn new(config: AuthConfig, tls_established: bool, server_version: ServerVersion) -> Arc<Self> {
        Arc::new(Self {
            config,
            tls_established,
            server_version,
        })
    }
}
