//! Authentication configuration.
//!
//! Carries the per-connection properties the authentication plugins read:
//! RSA key material locations, the public-key-retrieval policy, and OCI
//! profile selection. Transport-level settings (hosts, timeouts, TLS
//! certificates) belong to the caller.

use std::path::PathBuf;

/// Authentication-related connection configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Path to a local copy of the server's RSA public key (PEM).
    ///
    /// When set, the SHA-256 family encrypts against this key instead of
    /// asking the server for one.
    pub server_rsa_public_key_file: Option<PathBuf>,
    /// Permit requesting the server's RSA public key over the wire.
    ///
    /// Disabled by default: an unauthenticated key exchange is open to
    /// man-in-the-middle substitution.
    pub allow_public_key_retrieval: bool,
    /// Path to the OCI CLI configuration file (default: `~/.oci/config`).
    pub oci_config_file: Option<PathBuf>,
    /// Profile to read from the OCI configuration file.
    pub oci_config_profile: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            server_rsa_public_key_file: None,
            allow_public_key_retrieval: false,
            oci_config_file: None,
            oci_config_profile: "DEFAULT".to_string(),
        }
    }
}

impl AuthConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the path to a local server RSA public key file.
    pub fn server_rsa_public_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.server_rsa_public_key_file = Some(path.into());
        self
    }

    /// Allow or forbid public key retrieval from the server.
    pub fn allow_public_key_retrieval(mut self, allowed: bool) -> Self {
        self.allow_public_key_retrieval = allowed;
        self
    }

    /// Set the OCI configuration file path.
    pub fn oci_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.oci_config_file = Some(path.into());
        self
    }

    /// Set the OCI configuration profile name.
    pub fn oci_config_profile(mut self, profile: impl Into<String>) -> Self {
        self.oci_config_profile = profile.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = AuthConfig::new()
            .server_rsa_public_key_file("/etc/mysql/server_key.pem")
            .allow_public_key_retrieval(true)
            .oci_config_file("/home/app/.oci/config")
            .oci_config_profile("PROD");

        assert_eq!(
            config.server_rsa_public_key_file,
            Some(PathBuf::from("/etc/mysql/server_key.pem"))
        );
        assert!(config.allow_public_key_retrieval);
        assert_eq!(config.oci_config_file, Some(PathBuf::from("/home/app/.oci/config")));
        assert_eq!(config.oci_config_profile, "PROD");
    }

    #[test]
    fn test_default_config() {
        let config = AuthConfig::default();

        assert!(config.server_rsa_public_key_file.is_none());
        assert!(!config.allow_public_key_retrieval);
        assert!(config.oci_config_file.is_none());
        assert_eq!(config.oci_config_profile, "DEFAULT");
    }
}
