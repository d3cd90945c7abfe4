//! authentication_openid_connect_client: identity-token authentication.
//!
//! The token is a bearer credential, so the plugin requires an encrypted
//! channel; negotiation rejects it otherwise. The injected callback
//! supplies the identity token and the plugin frames it behind a one-byte
//! capability flag.

use std::sync::Arc;

use wireauth_core::{AuthErrorKind, Error, Result};

use crate::callback::OpenIdTokenCallback;
use crate::plugin::AuthenticationPlugin;
use crate::protocol::{PacketWriter, plugin_names};

/// Capability flag sent ahead of the token.
const CAPABILITY_FLAG: u8 = 0x01;

/// OpenID Connect identity-token authentication.
pub struct OpenIdConnectAuthPlugin {
    callback: Arc<dyn OpenIdTokenCallback>,
}

impl std::fmt::Debug for OpenIdConnectAuthPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenIdConnectAuthPlugin")
            .finish_non_exhaustive()
    }
}

impl OpenIdConnectAuthPlugin {
    /// Fails immediately when no token callback was injected.
    pub fn new(callback: Option<Arc<dyn OpenIdTokenCallback>>) -> Result<Self> {
        let callback = callback.ok_or_else(|| {
            Error::config("OpenID Connect authentication requires an identity token callback")
        })?;
        Ok(Self { callback })
    }
}

impl AuthenticationPlugin for OpenIdConnectAuthPlugin {
    fn protocol_plugin_name(&self) -> &'static str {
        plugin_names::AUTHENTICATION_OPENID_CONNECT
    }

    fn requires_confidentiality(&self) -> bool {
        true
    }

    fn set_authentication_parameters(&mut self, _user: Option<&str>, _password: Option<&str>) {
        // The identity token is the credential
    }

    fn next_authentication_step(
        &mut self,
        _from_server: &[u8],
        to_server: &mut Vec<Vec<u8>>,
    ) -> Result<bool> {
        to_server.clear();

        let token = self.callback.identity_token()?;
        if token.is_empty() {
            return Err(Error::auth(
                AuthErrorKind::InvalidAuthData,
                "identity token callback returned an empty token",
            ));
        }

        let mut writer = PacketWriter::with_capacity(token.len() + 10);
        writer.write_u8(CAPABILITY_FLAG);
        writer.write_lenenc_bytes(&token);
        to_server.push(writer.into_bytes());
        Ok(true)
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PacketReader;

    struct FixedToken(Vec<u8>);

    impl OpenIdTokenCallback for FixedToken {
        fn identity_token(&self) -> Result<Vec<u8>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_missing_callback_is_config_error() {
        let err = OpenIdConnectAuthPlugin::new(None).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_token_is_framed_behind_capability_flag() {
        let mut plugin =
            OpenIdConnectAuthPlugin::new(Some(Arc::new(FixedToken(b"header.payload.sig".to_vec()))))
                .unwrap();

        let mut out = Vec::new();
        plugin.next_authentication_step(&[], &mut out).unwrap();

        let mut reader = PacketReader::new(&out[0]);
        assert_eq!(reader.read_u8(), Some(CAPABILITY_FLAG));
        assert_eq!(reader.read_lenenc_bytes().unwrap(), b"header.payload.sig");
        assert!(reader.is_empty());
    }

    #[test]
    fn test_empty_token_is_fatal() {
        let mut plugin = OpenIdConnectAuthPlugin::new(Some(Arc::new(FixedToken(Vec::new())))).unwrap();

        let mut out = Vec::new();
        let err = plugin.next_authentication_step(&[], &mut out).unwrap_err();
        assert_eq!(err.auth_kind(), Some(AuthErrorKind::InvalidAuthData));
    }

    #[test]
    fn test_requires_confidentiality() {
        let plugin =
            OpenIdConnectAuthPlugin::new(Some(Arc::new(FixedToken(b"t".to_vec())))).unwrap();
        assert!(plugin.requires_confidentiality());
    }
}
