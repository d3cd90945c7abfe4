//! authentication_oci_client: Oracle Cloud Infrastructure API keys.
//!
//! The one device-family plugin that signs locally: the API signing key
//! referenced by the OCI CLI configuration file is loaded and parsed once
//! at construction, the server nonce is signed with SHA256-RSA, and the
//! reply is a raw JSON envelope carrying the key fingerprint and the
//! base64 signature.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rsa::RsaPrivateKey;
use serde::Serialize;

use wireauth_core::{Error, Result};

use crate::crypto;
use crate::plugin::AuthenticationPlugin;
use crate::protocol::plugin_names;
use crate::session::AuthSession;

/// The JSON envelope the server expects in response to its nonce.
#[derive(Serialize)]
struct SignedNonce<'a> {
    fingerprint: &'a str,
    signature: String,
}

/// OCI API-key authentication.
#[derive(Debug)]
pub struct OciAuthPlugin {
    fingerprint: String,
    signing_key: Option<RsaPrivateKey>,
}

impl OciAuthPlugin {
    /// Load the profile, fingerprint and signing key up front; any missing
    /// piece is a configuration error before a single packet is exchanged.
    pub fn new(session: &Arc<AuthSession>) -> Result<Self> {
        let config_path = resolve_config_path(session)?;
        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            Error::config_with_source(
                format!("cannot read OCI config file '{}'", config_path.display()),
                e,
            )
        })?;

        let profile_name = &session.config.oci_config_profile;
        let profile = parse_profile(&contents, profile_name).ok_or_else(|| {
            Error::config(format!(
                "profile '{profile_name}' not found in OCI config file '{}'",
                config_path.display()
            ))
        })?;

        let missing_entry = |key: &str| {
            Error::config(format!(
                "OCI config profile '{profile_name}' is missing the '{key}' entry"
            ))
        };
        let fingerprint = profile
            .get("fingerprint")
            .ok_or_else(|| missing_entry("fingerprint"))?
            .clone();
        let key_file = profile.get("key_file").ok_or_else(|| missing_entry("key_file"))?;

        let pem = std::fs::read_to_string(key_file).map_err(|e| {
            Error::config_with_source(format!("cannot read OCI API key file '{key_file}'"), e)
        })?;
        let signing_key = crypto::parse_rsa_private_key(&pem)?;

        Ok(Self {
            fingerprint,
            signing_key: Some(signing_key),
        })
    }
}

fn resolve_config_path(session: &Arc<AuthSession>) -> Result<PathBuf> {
    if let Some(path) = &session.config.oci_config_file {
        return Ok(path.clone());
    }
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".oci").join("config"))
        .ok_or_else(|| Error::config("no OCI config file configured and no home directory found"))
}

/// Extract one `[profile]` section of an OCI CLI configuration file.
fn parse_profile(contents: &str, profile: &str) -> Option<HashMap<String, String>> {
    let mut in_profile = false;
    let mut found = false;
    let mut entries = HashMap::new();

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_profile = section.trim() == profile;
            found |= in_profile;
            continue;
        }
        if in_profile {
            if let Some((key, value)) = line.split_once('=') {
                entries.insert(key.trim().to_string(), value.trim().to_string());
            }
        }
    }

    found.then_some(entries)
}

impl AuthenticationPlugin for OciAuthPlugin {
    fn protocol_plugin_name(&self) -> &'static str {
        plugin_names::AUTHENTICATION_OCI
    }

    fn set_authentication_parameters(&mut self, _user: Option<&str>, _password: Option<&str>) {
        // Credentials are the API signing key
    }

    fn next_authentication_step(
        &mut self,
        from_server: &[u8],
        to_server: &mut Vec<Vec<u8>>,
    ) -> Result<bool> {
        to_server.clear();

        // Nothing to sign until the server sends its nonce
        if from_server.is_empty() {
            return Ok(true);
        }

        let signing_key = self
            .signing_key
            .as_ref()
            .ok_or_else(|| Error::protocol("authentication plugin was already destroyed"))?;
        let signature = crypto::sign_sha256_rsa(signing_key, from_server);
        let envelope = SignedNonce {
            fingerprint: &self.fingerprint,
            signature: BASE64.encode(signature),
        };
        let payload = serde_json::to_vec(&envelope)
            .map_err(|e| Error::Custom(format!("cannot serialize OCI response: {e}")))?;

        to_server.push(payload);
        Ok(true)
    }

    fn reset(&mut self) {}

    fn destroy(&mut self) {
        self.reset();
        self.signing_key = None;
    }
}
