//! authentication_webauthn_client: WebAuthn authenticator devices.
//!
//! Unlike FIDO, the exchange needs an extra round trip: after receiving
//! the challenge and relying party, the client asks the server for a
//! previously registered credential id before the assertion ceremony can
//! run. The three stages are tracked explicitly; a step after the final
//! stage is a protocol violation.

use std::sync::Arc;

use wireauth_core::{AuthErrorKind, Error, Result};

use crate::callback::{WebAuthnCallback, WebAuthnChallenge};
use crate::plugin::AuthenticationPlugin;
use crate::protocol::{PacketReader, PacketWriter, plugin_names};

/// Client-to-server stage tags for the WebAuthn exchange.
mod stage_tag {
    /// Request the registered credential id
    pub const REQUEST_CREDENTIAL_ID: u8 = 0x01;
    /// Assertion response follows
    pub const ASSERTION: u8 = 0x02;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthStage {
    InitialData,
    CredentialId,
    Finished,
}

/// WebAuthn device authentication.
pub struct WebAuthnAuthPlugin {
    callback: Arc<dyn WebAuthnCallback>,
    stage: AuthStage,
    challenge: Vec<u8>,
    relying_party_id: String,
}

impl std::fmt::Debug for WebAuthnAuthPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebAuthnAuthPlugin")
            .field("stage", &self.stage)
            .field("challenge", &self.challenge)
            .field("relying_party_id", &self.relying_party_id)
            .finish_non_exhaustive()
    }
}

impl WebAuthnAuthPlugin {
    /// Fails immediately when no WebAuthn callback was injected.
    pub fn new(callback: Option<Arc<dyn WebAuthnCallback>>) -> Result<Self> {
        let callback = callback.ok_or_else(|| {
            Error::config("WebAuthn authentication requires an authenticator callback")
        })?;
        Ok(Self {
            callback,
            stage: AuthStage::InitialData,
            challenge: Vec::new(),
            relying_party_id: String::new(),
        })
    }

    fn read_initial_data(&mut self, from_server: &[u8]) -> Result<()> {
        let malformed = |what: &str| Error::protocol(format!("malformed WebAuthn challenge: {what}"));

        let mut reader = PacketReader::new(from_server);
        // One reserved capability byte precedes the challenge
        reader.read_u8().ok_or_else(|| malformed("empty payload"))?;
        self.challenge = reader
            .read_lenenc_bytes()
            .ok_or_else(|| malformed("missing challenge"))?;
        self.relying_party_id = reader
            .read_lenenc_string()
            .ok_or_else(|| malformed("missing relying party id"))?;
        Ok(())
    }

    fn perform_assertion(&mut self, from_server: &[u8]) -> Result<Vec<u8>> {
        // A zero-length credential id means no prior credential, which the
        // ceremony treats as "discover one on the device"
        let credential_id = if from_server.is_empty() {
            Vec::new()
        } else {
            let mut reader = PacketReader::new(from_server);
            reader
                .read_lenenc_bytes()
                .ok_or_else(|| Error::protocol("malformed WebAuthn credential id payload"))?
        };

        let response = self.callback.perform_assertion(&WebAuthnChallenge {
            challenge: self.challenge.clone(),
            relying_party_id: self.relying_party_id.clone(),
            credential_id,
        })?;

        if response.assertions.is_empty() || response.client_data_json.is_empty() {
            return Err(Error::auth(
                AuthErrorKind::InvalidAuthData,
                "WebAuthn authenticator returned an empty response",
            ));
        }

        let mut writer = PacketWriter::new();
        writer.write_u8(stage_tag::ASSERTION);
        writer.write_lenenc_int(response.assertions.len() as u64);
        for assertion in &response.assertions {
            if assertion.authenticator_data.is_empty() || assertion.signature.is_empty() {
                return Err(Error::auth(
                    AuthErrorKind::InvalidAuthData,
                    "WebAuthn authenticator returned empty assertion data",
                ));
            }
            writer.write_lenenc_bytes(&assertion.authenticator_data);
            writer.write_lenenc_bytes(&assertion.signature);
        }
        writer.write_lenenc_bytes(&response.client_data_json);
        Ok(writer.into_bytes())
    }
}

impl AuthenticationPlugin for WebAuthnAuthPlugin {
    fn protocol_plugin_name(&self) -> &'static str {
        plugin_names::AUTHENTICATION_WEBAUTHN
    }

    fn set_authentication_parameters(&mut self, _user: Option<&str>, _password: Option<&str>) {
        // Credentials live on the authenticator device
    }

    fn next_authentication_step(
        &mut self,
        from_server: &[u8],
        to_server: &mut Vec<Vec<u8>>,
    ) -> Result<bool> {
        to_server.clear();

        match self.stage {
            AuthStage::InitialData => {
                if from_server.is_empty() {
                    return Err(Error::protocol("WebAuthn device registration is incomplete"));
                }
                self.read_initial_data(from_server)?;
                to_server.push(vec![stage_tag::REQUEST_CREDENTIAL_ID]);
                self.stage = AuthStage::CredentialId;
            }
            AuthStage::CredentialId => {
                let packet = self.perform_assertion(from_server)?;
                to_server.push(packet);
                self.stage = AuthStage::Finished;
            }
            AuthStage::Finished => {
                return Err(Error::protocol(
                    "authentication already finished; unexpected server packet",
                ));
            }
        }
        Ok(true)
    }

    fn reset(&mut self) {
        self.stage = AuthStage::InitialData;
        self.challenge.clear();
        self.relying_party_id.clear();
    }
}
