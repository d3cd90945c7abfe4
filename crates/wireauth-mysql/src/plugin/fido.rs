//! authentication_fido_client: FIDO authenticator devices.
//!
//! The plugin only frames: challenge material is parsed out of the server
//! payload, the assertion ceremony happens on the injected callback (a
//! hardware authenticator, typically, with a human in the loop), and the
//! result is framed back as length-encoded fields.

use std::sync::Arc;

use wireauth_core::{AuthErrorKind, Error, Result};

use crate::callback::{FidoCallback, FidoChallenge};
use crate::plugin::AuthenticationPlugin;
use crate::protocol::{PacketReader, PacketWriter, plugin_names};

/// FIDO device authentication.
pub struct FidoAuthPlugin {
    callback: Arc<dyn FidoCallback>,
    finished: bool,
}

impl std::fmt::Debug for FidoAuthPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FidoAuthPlugin")
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl FidoAuthPlugin {
    /// Fails immediately when no FIDO callback was injected.
    pub fn new(callback: Option<Arc<dyn FidoCallback>>) -> Result<Self> {
        let callback = callback.ok_or_else(|| {
            Error::config("FIDO authentication requires an authenticator callback")
        })?;
        Ok(Self {
            callback,
            finished: false,
        })
    }
}

impl AuthenticationPlugin for FidoAuthPlugin {
    fn protocol_plugin_name(&self) -> &'static str {
        plugin_names::AUTHENTICATION_FIDO
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

        if self.finished {
            return Err(Error::protocol(
                "authentication already finished; unexpected server packet",
            ));
        }
        if from_server.is_empty() {
            // The server sends no challenge when the device was never
            // registered for this account
            return Err(Error::protocol("FIDO device registration is incomplete"));
        }

        let mut reader = PacketReader::new(from_server);
        let scramble = reader
            .read_lenenc_bytes()
            .ok_or_else(|| Error::protocol("malformed FIDO challenge: missing scramble"))?;
        let relying_party_id = reader
            .read_lenenc_string()
            .ok_or_else(|| Error::protocol("malformed FIDO challenge: missing relying party id"))?;

        let assertion = self.callback.perform_assertion(&FidoChallenge {
            scramble,
            relying_party_id,
        })?;
        if assertion.authenticator_data.is_empty() || assertion.signature.is_empty() {
            return Err(Error::auth(
                AuthErrorKind::InvalidAuthData,
                "FIDO authenticator returned empty assertion data",
            ));
        }

        let mut writer = PacketWriter::new();
        writer.write_lenenc_bytes(&assertion.authenticator_data);
        writer.write_lenenc_bytes(&assertion.signature);
        to_server.push(writer.into_bytes());

        self.finished = true;
        Ok(true)
    }

    fn reset(&mut self) {
        self.finished = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::FidoAssertion;

    struct FakeAuthenticator {
        authenticator_data: Vec<u8>,
        signature: Vec<u8>,
    }

    impl FidoCallback for FakeAuthenticator {
        fn perform_assertion(&self, challenge: &FidoChallenge) -> Result<FidoAssertion> {
            assert_eq!(challenge.relying_party_id, "mysql.example.com");
            Ok(FidoAssertion {
                authenticator_data: self.authenticator_data.clone(),
                signature: self.signature.clone(),
            })
        }
    }

    fn challenge_payload() -> Vec<u8> {
        let mut writer = PacketWriter::new();
        writer.write_lenenc_bytes(&[0xAB; 32]);
        writer.write_lenenc_string("mysql.example.com");
        writer.into_bytes()
    }

    fn plugin(authenticator_data: &[u8], signature: &[u8]) -> FidoAuthPlugin {
        FidoAuthPlugin::new(Some(Arc::new(FakeAuthenticator {
            authenticator_data: authenticator_data.to_vec(),
            signature: signature.to_vec(),
        })))
        .unwrap()
    }

    #[test]
    fn test_missing_callback_is_config_error() {
        let err = FidoAuthPlugin::new(None).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_assertion_round() {
        let mut plugin = plugin(b"authdata", b"sig");

        let mut out = Vec::new();
        plugin.next_authentication_step(&challenge_payload(), &mut out).unwrap();

        let mut reader = PacketReader::new(&out[0]);
        assert_eq!(reader.read_lenenc_bytes().unwrap(), b"authdata");
        assert_eq!(reader.read_lenenc_bytes().unwrap(), b"sig");
        assert!(reader.is_empty());
    }

    #[test]
    fn test_step_after_finished_is_protocol_violation() {
        let mut plugin = plugin(b"authdata", b"sig");

        let mut out = Vec::new();
        plugin.next_authentication_step(&challenge_payload(), &mut out).unwrap();

        let err = plugin
            .next_authentication_step(&challenge_payload(), &mut out)
            .unwrap_err();
        assert!(err.is_protocol_error());
    }

    #[test]
    fn test_empty_payload_means_incomplete_registration() {
        let mut plugin = plugin(b"authdata", b"sig");

        let mut out = Vec::new();
        let err = plugin.next_authentication_step(&[], &mut out).unwrap_err();
        assert!(err.is_protocol_error());
    }

    #[test]
    fn test_empty_assertion_data_is_fatal() {
        let mut plugin = plugin(b"", b"sig");

        let mut out = Vec::new();
        let err = plugin
            .next_authentication_step(&challenge_payload(), &mut out)
            .unwrap_err();
        assert_eq!(err.auth_kind(), Some(AuthErrorKind::InvalidAuthData));

        let mut plugin = plugin_with_empty_signature();
        let err = plugin
            .next_authentication_step(&challenge_payload(), &mut out)
            .unwrap_err();
        assert_eq!(err.auth_kind(), Some(AuthErrorKind::InvalidAuthData));
    }

    fn plugin_with_empty_signature() -> FidoAuthPlugin {
        plugin(b"authdata", b"")
    }

    #[test]
    fn test_reset_allows_fresh_round() {
        let mut plugin = plugin(b"authdata", b"sig");

        let mut out = Vec::new();
        plugin.next_authentication_step(&challenge_payload(), &mut out).unwrap();
        plugin.reset();
        plugin.reset();
        plugin.next_authentication_step(&challenge_payload(), &mut out).unwrap();
        assert_eq!(out.len(), 1);
    }
}
