//! sha256_password: RSA-based SHA256 authentication.
//!
//! Without TLS the password never crosses in the clear: it is XOR-folded
//! against the seed and RSA-encrypted, either with a locally configured
//! copy of the server's public key or with one retrieved over the wire
//! (when the configuration allows that).

use std::sync::Arc;

use wireauth_core::{AuthErrorKind, Error, Result};

use crate::crypto::{self, RsaPadding};
use crate::plugin::AuthenticationPlugin;
use crate::protocol::{PacketReader, SEED_LENGTH, plugin_names, sha256_password};
use crate::session::AuthSession;

/// Per-attempt state shared by the SHA-256 family full-auth path.
#[derive(Debug, Default)]
pub(crate) struct FullAuthState {
    /// Seed captured for password folding
    pub seed: Vec<u8>,
    /// A public key request is outstanding
    pub public_key_requested: bool,
    /// PEM key retrieved from the server, cached for the attempt
    pub public_key: Option<String>,
}

impl FullAuthState {
    pub fn reset(&mut self) {
        self.seed.clear();
        self.public_key_requested = false;
        self.public_key = None;
    }
}

/// One full-authentication round for the SHA-256 family.
///
/// `seed_in_payload` is true for sha256_password, where the server's
/// payload carries the seed each round; caching_sha2_password captured it
/// during the scramble stage and passes false.
pub(crate) fn full_auth_step(
    session: &AuthSession,
    password: &str,
    state: &mut FullAuthState,
    from_server: &[u8],
    seed_in_payload: bool,
    key_request_marker: u8,
    padding: RsaPadding,
    to_server: &mut Vec<Vec<u8>>,
) -> Result<()> {
    if session.tls_established {
        // Confidentiality is externally guaranteed; send plain, NUL-terminated
        let mut payload = password.as_bytes().to_vec();
        payload.push(0);
        to_server.push(payload);
        return Ok(());
    }

    if let Some(path) = &session.config.server_rsa_public_key_file {
        if seed_in_payload {
            let mut reader = PacketReader::new(from_server);
            state.seed = reader.read_null_bytes().to_vec();
        }
        let pem = std::fs::read_to_string(path).map_err(|e| {
            Error::config_with_source(
                format!("cannot read server RSA public key file '{}'", path.display()),
                e,
            )
        })?;
        to_server.push(crypto::encrypt_password_rsa(
            password,
            &state.seed,
            pem.as_bytes(),
            padding,
        )?);
        return Ok(());
    }

    if !session.config.allow_public_key_retrieval {
        return Err(Error::auth(
            AuthErrorKind::PublicKeyRetrieval,
            "unable to connect: public key retrieval is disabled and no server RSA public key file is configured",
        ));
    }

    if state.public_key_requested && from_server.len() > SEED_LENGTH + 1 {
        // Servers affected by Bug#70865 answer a public key request with an
        // auth-switch-shaped packet instead of the key; the payload length
        // relative to the seed tells the two apart.
        let mut reader = PacketReader::new(from_server);
        let pem = reader.read_null_bytes().to_vec();
        let pem = String::from_utf8_lossy(&pem).into_owned();
        tracing::debug!(bytes = pem.len(), "received server RSA public key");

        to_server.push(crypto::encrypt_password_rsa(
            password,
            &state.seed,
            pem.as_bytes(),
            padding,
        )?);
        state.public_key = Some(pem);
        state.public_key_requested = false;
    } else {
        if seed_in_payload {
            let mut reader = PacketReader::new(from_server);
            state.seed = reader.read_null_bytes().to_vec();
        }
        tracing::debug!("requesting RSA public key from server");
        to_server.push(vec![key_request_marker]);
        state.public_key_requested = true;
    }
    Ok(())
}

/// RSA-based SHA256 authentication (sha256_password).
#[derive(Debug)]
pub struct Sha256PasswordPlugin {
    session: Arc<AuthSession>,
    password: Option<String>,
    state: FullAuthState,
}

impl Sha256PasswordPlugin {
    pub fn new(session: Arc<AuthSession>) -> Self {
        Self {
            session,
            password: None,
            state: FullAuthState::default(),
        }
    }
}

impl AuthenticationPlugin for Sha256PasswordPlugin {
    fn protocol_plugin_name(&self) -> &'static str {
        plugin_names::SHA256_PASSWORD
    }

    fn is_reusable(&self) -> bool {
        true
    }

    fn set_authentication_parameters(&mut self, _user: Option<&str>, password: Option<&str>) {
        self.password = password.map(str::to_string);
    }

    fn next_authentication_step(
        &mut self,
        from_server: &[u8],
        to_server: &mut Vec<Vec<u8>>,
    ) -> Result<bool> {
        to_server.clear();

        let password = self.password.as_deref().unwrap_or("");
        if password.is_empty() || from_server.is_empty() {
            to_server.push(vec![0]);
            return Ok(true);
        }

        full_auth_step(
            &self.session,
            password,
            &mut self.state,
            from_server,
            true,
            sha256_password::REQUEST_PUBLIC_KEY,
            RsaPadding::Pkcs1,
            to_server,
        )?;
        Ok(true)
    }

    fn reset(&mut self) {
        self.state.reset();
    }

    fn destroy(&mut self) {
        self.reset();
        self.password = None;
    }
}
