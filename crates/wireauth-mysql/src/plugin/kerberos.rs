//! authentication_kerberos_client: GSSAPI authentication.
//!
//! The first server payload carries the service principal name and realm
//! as 2-byte-length-prefixed ASCII fields. The plugin derives the user
//! principal, runs the login ceremony through the injected provider, and
//! from then on forwards GSSAPI tokens between the server and the
//! established context. The login result is cached per principal and
//! rebuilt when the principal changes.

use std::sync::Arc;

use wireauth_core::{AuthErrorKind, Error, Result};

use crate::callback::{GssContextScope, KerberosLoginProvider, UsernameCallback};
use crate::plugin::{AuthenticationPlugin, resolve_username};
use crate::protocol::{PacketReader, plugin_names};

/// Kerberos authentication via an injected GSSAPI login provider.
pub struct KerberosAuthPlugin {
    user: Option<String>,
    username_callback: Option<Arc<dyn UsernameCallback>>,
    login_provider: Arc<dyn KerberosLoginProvider>,
    cached_principal: Option<String>,
    context: Option<GssContextScope>,
}

impl std::fmt::Debug for KerberosAuthPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KerberosAuthPlugin")
            .field("user", &self.user)
            .field("username_callback", &self.username_callback.is_some())
            .field("cached_principal", &self.cached_principal)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl KerberosAuthPlugin {
    /// Fails immediately when no login provider was injected; the plugin
    /// cannot proceed without one.
    pub fn new(
        username_callback: Option<Arc<dyn UsernameCallback>>,
        login_provider: Option<Arc<dyn KerberosLoginProvider>>,
    ) -> Result<Self> {
        let login_provider = login_provider.ok_or_else(|| {
            Error::config("Kerberos authentication requires a login provider callback")
        })?;
        Ok(Self {
            user: None,
            username_callback,
            login_provider,
            cached_principal: None,
            context: None,
        })
    }

    fn parse_principal(&self, from_server: &[u8]) -> Result<(String, String)> {
        let malformed = || Error::protocol("malformed Kerberos principal payload");

        let mut reader = PacketReader::new(from_server);
        let spn_len = reader.read_u16_le().ok_or_else(malformed)?;
        let spn = reader.read_string(spn_len as usize).ok_or_else(malformed)?;
        let realm_len = reader.read_u16_le().ok_or_else(malformed)?;
        let realm = reader.read_string(realm_len as usize).ok_or_else(malformed)?;

        if spn.is_empty() || realm.is_empty() {
            return Err(malformed());
        }
        Ok((spn, realm))
    }

    fn establish_context(&mut self, from_server: &[u8]) -> Result<()> {
        let (service_principal, realm) = self.parse_principal(from_server)?;
        let user = resolve_username(self.user.as_deref(), self.username_callback.as_ref());
        let user_principal = format!("{user}@{realm}");

        // Invalidate the cached login when the principal changes
        if self.cached_principal.as_deref() != Some(user_principal.as_str()) {
            self.context = None;
        }

        if self.context.is_none() {
            tracing::debug!(principal = %user_principal, spn = %service_principal, "performing Kerberos login");
            let context = self
                .login_provider
                .login(&user_principal, &service_principal)
                .map_err(|e| {
                    Error::auth_with_source(
                        AuthErrorKind::KerberosLogin,
                        format!("Kerberos login failed for '{user_principal}'"),
                        e,
                    )
                })?;
            self.context = Some(GssContextScope::new(context));
            self.cached_principal = Some(user_principal);
        }
        Ok(())
    }
}

impl AuthenticationPlugin for KerberosAuthPlugin {
    fn protocol_plugin_name(&self) -> &'static str {
        plugin_names::AUTHENTICATION_KERBEROS
    }

    fn set_authentication_parameters(&mut self, user: Option<&str>, _password: Option<&str>) {
        self.user = user.map(str::to_string);
    }

    fn next_authentication_step(
        &mut self,
        from_server: &[u8],
        to_server: &mut Vec<Vec<u8>>,
    ) -> Result<bool> {
        to_server.clear();

        if from_server.is_empty() {
            return Ok(true);
        }

        let challenge: &[u8] = if self.context.is_none() {
            self.establish_context(from_server)?;
            // The principal payload carries no challenge; ask the context
            // for its initial token
            &[]
        } else {
            from_server
        };

        if let Some(context) = self.context.as_mut() {
            match context.step(challenge)? {
                Some(token) if !token.is_empty() => to_server.push(token),
                _ => {}
            }
        }
        Ok(true)
    }

    fn reset(&mut self) {
        self.context = None;
        self.cached_principal = None;
    }

    fn destroy(&mut self) {
        self.reset();
        self.user = None;
        self.username_callback = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::GssContext;
    use std::sync::Mutex;

    fn principal_payload(spn: &str, realm: &str) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&(spn.len() as u16).to_le_bytes());
        payload.extend_from_slice(spn.as_bytes());
        payload.extend_from_slice(&(realm.len() as u16).to_le_bytes());
        payload.extend_from_slice(realm.as_bytes());
        payload
    }

    struct FakeContext {
        tokens: Vec<Vec<u8>>,
        disposed: Arc<Mutex<bool>>,
    }

    impl GssContext for FakeContext {
        fn step(&mut self, _challenge: &[u8]) -> Result<Option<Vec<u8>>> {
            if self.tokens.is_empty() {
                Ok(None)
            } else {
                Ok(Some(self.tokens.remove(0)))
            }
        }

        fn is_established(&self) -> bool {
            self.tokens.is_empty()
        }

        fn dispose(&mut self) {
            *self.disposed.lock().unwrap() = true;
        }
    }

    struct FakeProvider {
        logins: Arc<Mutex<Vec<(String, String)>>>,
        disposed: Arc<Mutex<bool>>,
        fail: bool,
    }

    impl KerberosLoginProvider for FakeProvider {
        fn login(&self, user_principal: &str, service_principal: &str) -> Result<Box<dyn GssContext>> {
            if self.fail {
                return Err(Error::Custom("no ticket-granting ticket".to_string()));
            }
            self.logins
                .lock()
                .unwrap()
                .push((user_principal.to_string(), service_principal.to_string()));
            Ok(Box::new(FakeContext {
                tokens: vec![b"tok1".to_vec(), b"tok2".to_vec()],
                disposed: self.disposed.clone(),
            }))
        }
    }

    fn provider(fail: bool) -> (Arc<FakeProvider>, Arc<Mutex<bool>>) {
        let disposed = Arc::new(Mutex::new(false));
        let provider = Arc::new(FakeProvider {
            logins: Arc::new(Mutex::new(Vec::new())),
            disposed: disposed.clone(),
            fail,
        });
        (provider, disposed)
    }

    #[test]
    fn test_missing_provider_is_config_error() {
        let err = KerberosAuthPlugin::new(None, None).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_login_and_token_exchange() {
        let (provider, _) = provider(false);
        let mut plugin = KerberosAuthPlugin::new(None, Some(provider.clone())).unwrap();
        plugin.set_authentication_parameters(Some("alice"), None);

        let mut out = Vec::new();
        plugin
            .next_authentication_step(&principal_payload("ldap/db.example.com", "EXAMPLE.COM"), &mut out)
            .unwrap();
        assert_eq!(out, vec![b"tok1".to_vec()]);
        assert_eq!(
            provider.logins.lock().unwrap().as_slice(),
            [("alice@EXAMPLE.COM".to_string(), "ldap/db.example.com".to_string())]
        );

        // Later rounds feed server challenges straight to the context
        plugin.next_authentication_step(b"server challenge", &mut out).unwrap();
        assert_eq!(out, vec![b"tok2".to_vec()]);

        // Context exhausted: nothing further to send
        plugin.next_authentication_step(b"final", &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_login_failure_is_wrapped() {
        let (provider, _) = provider(true);
        let mut plugin = KerberosAuthPlugin::new(None, Some(provider)).unwrap();
        plugin.set_authentication_parameters(Some("alice"), None);

        let mut out = Vec::new();
        let err = plugin
            .next_authentication_step(&principal_payload("svc/x", "REALM"), &mut out)
            .unwrap_err();
        assert_eq!(err.auth_kind(), Some(AuthErrorKind::KerberosLogin));
        // The provider's failure rides along as the cause
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_malformed_principal_payload() {
        let (provider, _) = provider(false);
        let mut plugin = KerberosAuthPlugin::new(None, Some(provider)).unwrap();
        plugin.set_authentication_parameters(Some("alice"), None);

        let mut out = Vec::new();
        // Length prefix longer than the payload
        let err = plugin
            .next_authentication_step(&[0xFF, 0x00, b'x'], &mut out)
            .unwrap_err();
        assert!(err.is_protocol_error());
    }

    #[test]
    fn test_reset_disposes_context() {
        let (provider, disposed) = provider(false);
        let mut plugin = KerberosAuthPlugin::new(None, Some(provider)).unwrap();
        plugin.set_authentication_parameters(Some("alice"), None);

        let mut out = Vec::new();
        plugin
            .next_authentication_step(&principal_payload("svc/x", "REALM"), &mut out)
            .unwrap();
        assert!(!*disposed.lock().unwrap());

        plugin.reset();
        assert!(*disposed.lock().unwrap());
        assert!(plugin.cached_principal.is_none());
    }
}
