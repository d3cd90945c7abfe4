//! caching_sha2_password: SHA256 scramble with a server-side cache.
//!
//! The fast path avoids RSA entirely: the client answers the scramble
//! with a caching-specific hash and the server replies with one status
//! byte, 3 for "cached, done" or 4 for "fall through to full auth". Full
//! auth reuses the sha256_password logic with a different key-request
//! marker and, against servers 8.0.5+, OAEP padding.

use std::sync::Arc;

use wireauth_core::{Error, Result};

use crate::crypto::{self, RsaPadding};
use crate::plugin::AuthenticationPlugin;
use crate::plugin::sha256::{FullAuthState, full_auth_step};
use crate::protocol::{PacketReader, caching_sha2, plugin_names};
use crate::session::AuthSession;

/// Stages of the caching_sha2_password exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthStage {
    FastAuthSendScramble,
    FastAuthReadResult,
    FastAuthComplete,
    FullAuth,
}

/// SHA256-based authentication with server-side caching (MySQL 8.0+
/// default).
#[derive(Debug)]
pub struct CachingSha2PasswordPlugin {
    session: Arc<AuthSession>,
    password: Option<String>,
    stage: AuthStage,
    state: FullAuthState,
}

impl CachingSha2PasswordPlugin {
    pub fn new(session: Arc<AuthSession>) -> Self {
        Self {
            session,
            password: None,
            stage: AuthStage::FastAuthSendScramble,
            state: FullAuthState::default(),
        }
    }

    fn rsa_padding(&self) -> RsaPadding {
        // MySQL 8.0.5+ switched the full-auth transformation to OAEP
        if self.session.server_version.meets_minimum(8, 0, 5) {
            RsaPadding::OaepSha1
        } else {
            RsaPadding::Pkcs1
        }
    }
}

impl AuthenticationPlugin for CachingSha2PasswordPlugin {
    fn protocol_plugin_name(&self) -> &'static str {
        plugin_names::CACHING_SHA2_PASSWORD
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

        let password = self.password.clone().unwrap_or_default();
        if password.is_empty() || from_server.is_empty() {
            to_server.push(vec![0]);
            return Ok(true);
        }

        match self.stage {
            AuthStage::FastAuthSendScramble => {
                let mut reader = PacketReader::new(from_server);
                self.state.seed = reader.read_null_bytes().to_vec();
                to_server.push(crypto::scramble_caching_sha2(&password, &self.state.seed));
                self.stage = AuthStage::FastAuthReadResult;
                return Ok(true);
            }
            AuthStage::FastAuthReadResult => {
                let flag = PacketReader::new(from_server)
                    .read_u8()
                    .ok_or_else(|| Error::protocol("missing fast auth result byte"))?;
                match flag {
                    caching_sha2::FAST_AUTH_SUCCESS => {
                        tracing::debug!("fast authentication succeeded");
                        self.stage = AuthStage::FastAuthComplete;
                        return Ok(true);
                    }
                    caching_sha2::PERFORM_FULL_AUTH => {
                        tracing::debug!("falling through to full authentication");
                        self.stage = AuthStage::FullAuth;
                        // continue into the full-auth exchange below
                    }
                    other => {
                        return Err(Error::protocol_with_data(
                            format!("unexpected server response after fast auth: 0x{other:02X}"),
                            from_server.to_vec(),
                        ));
                    }
                }
            }
            AuthStage::FullAuth => {}
            AuthStage::FastAuthComplete => {
                return Err(Error::protocol(
                    "authentication already finished; unexpected server packet",
                ));
            }
        }

        let rsa_padding = self.rsa_padding();
        full_auth_step(
            &self.session,
            &password,
            &mut self.state,
            from_server,
            false,
            caching_sha2::REQUEST_PUBLIC_KEY,
            rsa_padding,
            to_server,
        )?;
        Ok(true)
    }

    fn reset(&mut self) {
        self.stage = AuthStage::FastAuthSendScramble;
        self.state.reset();
    }

    fn destroy(&mut self) {
        self.reset();
        self.password = None;
    }
}
