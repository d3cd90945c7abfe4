//! authentication_ldap_sasl_client: LDAP authentication bridged over SASL.
//!
//! The first server payload names the SASL mechanism; every later payload
//! is an opaque challenge for the engine. Only SCRAM-SHA-1 is accepted.
//! GSSAPI appears in the server's mechanism list but is routed to the
//! dedicated Kerberos plugin, so it is rejected here by name.

use std::sync::Arc;

use wireauth_core::{AuthErrorKind, Error, Result};

use crate::callback::UsernameCallback;
use crate::plugin::{AuthenticationPlugin, resolve_username};
use crate::protocol::plugin_names;
use crate::sasl::{SaslClient, ScramSha1Client, mechanisms};

/// SASL-bridged LDAP authentication.
pub struct LdapSaslAuthPlugin {
    user: Option<String>,
    password: Option<String>,
    username_callback: Option<Arc<dyn UsernameCallback>>,
    sasl: Option<Box<dyn SaslClient>>,
}

impl LdapSaslAuthPlugin {
    pub fn new(username_callback: Option<Arc<dyn UsernameCallback>>) -> Self {
        Self {
            user: None,
            password: None,
            username_callback,
            sasl: None,
        }
    }

    fn create_sasl_client(&mut self, mechanism: &str) -> Result<Box<dyn SaslClient>> {
        match mechanism {
            mechanisms::SCRAM_SHA_1 => {
                let user = resolve_username(self.user.as_deref(), self.username_callback.as_ref());
                let password = self.password.clone().unwrap_or_default();
                Ok(Box::new(ScramSha1Client::new(user, password)))
            }
            mechanisms::GSSAPI => Err(Error::auth(
                AuthErrorKind::UnsupportedMechanism,
                "GSSAPI is not supported by the LDAP SASL plugin; use the Kerberos plugin",
            )),
            other => Err(Error::auth(
                AuthErrorKind::UnsupportedMechanism,
                format!("unsupported SASL mechanism '{other}'"),
            )),
        }
    }
}

impl AuthenticationPlugin for LdapSaslAuthPlugin {
    fn protocol_plugin_name(&self) -> &'static str {
        plugin_names::AUTHENTICATION_LDAP_SASL
    }

    fn set_authentication_parameters(&mut self, user: Option<&str>, password: Option<&str>) {
        self.user = user.map(str::to_string);
        self.password = password.map(str::to_string);
    }

    fn next_authentication_step(
        &mut self,
        from_server: &[u8],
        to_server: &mut Vec<Vec<u8>>,
    ) -> Result<bool> {
        to_server.clear();

        // The plugin is not engaged until the server names a mechanism
        if from_server.is_empty() {
            return Ok(true);
        }

        if self.sasl.is_none() {
            let mechanism = String::from_utf8_lossy(from_server);
            let mechanism = mechanism.trim_end_matches('\0');
            tracing::debug!(mechanism, "creating SASL client");

            let mut sasl = self.create_sasl_client(mechanism)?;
            // SCRAM sends an initial response before any challenge
            if let Some(initial) = sasl.evaluate_challenge(&[])? {
                to_server.push(initial);
            }
            self.sasl = Some(sasl);
            return Ok(true);
        }

        if let Some(sasl) = self.sasl.as_mut() {
            match sasl.evaluate_challenge(from_server)? {
                // An empty response is valid: nothing to send this round
                Some(response) if !response.is_empty() => to_server.push(response),
                _ => {}
            }
        }
        Ok(true)
    }

    fn reset(&mut self) {
        self.sasl = None;
    }

    fn destroy(&mut self) {
        self.reset();
        self.user = None;
        self.password = None;
        self.username_callback = None;
    }
}
