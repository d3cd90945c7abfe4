//! Injected capabilities for plugins that delegate credential work.
//!
//! Device-based mechanisms (FIDO, WebAuthn) and external login systems
//! (Kerberos, OpenID Connect) never perform the cryptographic ceremony
//! inside the driver. Each plugin frames challenge material out of server
//! packets, hands it to one of these capabilities, and frames the result
//! back into protocol packets. The capabilities are trait objects supplied
//! by the caller; a plugin that needs one and does not get it fails at
//! construction time, before any network round.

use std::fmt;
use std::sync::Arc;

use wireauth_core::Result;

/// Observes the username an authentication attempt actually used.
///
/// When no username was configured, plugins derive one from the
/// environment and report it here so the caller can see which identity
/// went over the wire.
pub trait UsernameCallback: Send + Sync {
    fn username_used(&self, username: &str);
}

/// Challenge material for a FIDO authenticator assertion.
#[derive(Debug, Clone)]
pub struct FidoChallenge {
    /// Server-generated scramble to sign
    pub scramble: Vec<u8>,
    /// Relying party id the assertion is scoped to
    pub relying_party_id: String,
}

/// A completed FIDO assertion.
#[derive(Debug, Clone)]
pub struct FidoAssertion {
    pub authenticator_data: Vec<u8>,
    pub signature: Vec<u8>,
}

/// Performs the FIDO assertion ceremony on an authenticator device.
pub trait FidoCallback: Send + Sync {
    fn perform_assertion(&self, challenge: &FidoChallenge) -> Result<FidoAssertion>;
}

/// Challenge material for a WebAuthn assertion.
#[derive(Debug, Clone)]
pub struct WebAuthnChallenge {
    /// Server-generated challenge bytes
    pub challenge: Vec<u8>,
    /// Relying party id the assertion is scoped to
    pub relying_party_id: String,
    /// Previously registered credential id; empty when none is registered
    pub credential_id: Vec<u8>,
}

/// One assertion out of a possibly multi-assertion WebAuthn response.
#[derive(Debug, Clone)]
pub struct WebAuthnAssertion {
    pub authenticator_data: Vec<u8>,
    pub signature: Vec<u8>,
}

/// A completed WebAuthn ceremony.
#[derive(Debug, Clone)]
pub struct WebAuthnResponse {
    pub assertions: Vec<WebAuthnAssertion>,
    /// The client data JSON the authenticator signed over
    pub client_data_json: Vec<u8>,
}

/// Performs the WebAuthn assertion ceremony on an authenticator device.
pub trait WebAuthnCallback: Send + Sync {
    fn perform_assertion(&self, challenge: &WebAuthnChallenge) -> Result<WebAuthnResponse>;
}

/// Supplies the OpenID Connect identity token for the current user.
pub trait OpenIdTokenCallback: Send + Sync {
    fn identity_token(&self) -> Result<Vec<u8>>;
}

/// An established GSSAPI security context.
///
/// `step` feeds a server challenge in and returns the next token to send,
/// or `None` once the context has nothing further to say.
pub trait GssContext: Send {
    fn step(&mut self, challenge: &[u8]) -> Result<Option<Vec<u8>>>;
    fn is_established(&self) -> bool;
    /// Release credential material. Called once; further use is invalid.
    fn dispose(&mut self);
}

/// Performs the Kerberos login ceremony and yields a GSSAPI context bound
/// to the resulting credentials.
pub trait KerberosLoginProvider: Send + Sync {
    fn login(&self, user_principal: &str, service_principal: &str) -> Result<Box<dyn GssContext>>;
}

/// Scope guard around a [`GssContext`].
///
/// Guarantees `dispose` runs on every exit path, including unwinds, so
/// credential material never outlives the exchange that acquired it.
pub struct GssContextScope {
    context: Option<Box<dyn GssContext>>,
}

impl GssContextScope {
    pub fn new(context: Box<dyn GssContext>) -> Self {
        Self {
            context: Some(context),
        }
    }

    pub fn step(&mut self, challenge: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.context.as_mut() {
            Some(ctx) => ctx.step(challenge),
            None => Ok(None),
        }
    }

    pub fn is_established(&self) -> bool {
        self.context.as_ref().is_some_and(|ctx| ctx.is_established())
    }
}

impl Drop for GssContextScope {
    fn drop(&mut self) {
        if let Some(mut ctx) = self.context.take() {
            ctx.dispose();
        }
    }
}

impl fmt::Debug for GssContextScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GssContextScope")
            .field("established", &self.is_established())
            .finish()
    }
}

/// The bundle of optional callback handlers handed to the plugin registry.
#[derive(Default, Clone)]
pub struct CallbackHandlers {
    pub username: Option<Arc<dyn UsernameCallback>>,
    pub fido: Option<Arc<dyn FidoCallback>>,
    pub webauthn: Option<Arc<dyn WebAuthnCallback>>,
    pub openid_token: Option<Arc<dyn OpenIdTokenCallback>>,
    pub kerberos_login: Option<Arc<dyn KerberosLoginProvider>>,
}

impl CallbackHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn username(mut self, callback: Arc<dyn UsernameCallback>) -> Self {
        self.username = Some(callback);
        self
    }

    pub fn fido(mut self, callback: Arc<dyn FidoCallback>) -> Self {
        self.fido = Some(callback);
        self
    }

    pub fn webauthn(mut self, callback: Arc<dyn WebAuthnCallback>) -> Self {
        self.webauthn = Some(callback);
        self
    }

    pub fn openid_token(mut self, callback: Arc<dyn OpenIdTokenCallback>) -> Self {
        self.openid_token = Some(callback);
        self
    }

    pub fn kerberos_login(mut self, provider: Arc<dyn KerberosLoginProvider>) -> Self {
        self.kerberos_login = Some(provider);
        self
    }
}

impl fmt::Debug for CallbackHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackHandlers")
            .field("username", &self.username.is_some())
            .field("fido", &self.fido.is_some())
            .field("webauthn", &self.webauthn.is_some())
            .field("openid_token", &self.openid_token.is_some())
            .field("kerberos_login", &self.kerberos_login.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<String>>);

    impl GssContext for Recorder {
        fn step(&mut self, challenge: &[u8]) -> Result<Option<Vec<u8>>> {
            self.0
                .lock()
                .unwrap()
                .push(format!("step:{}", challenge.len()));
            Ok(Some(b"token".to_vec()))
        }

        fn is_established(&self) -> bool {
            false
        }

        fn dispose(&mut self) {
            self.0.lock().unwrap().push("dispose".to_string());
        }
    }

    #[test]
    fn test_scope_disposes_on_drop() {
        let log = Arc::new(Mutex::new(Vec::new()));

        struct Shared(Arc<Mutex<Vec<String>>>);
        impl GssContext for Shared {
            fn step(&mut self, _challenge: &[u8]) -> Result<Option<Vec<u8>>> {
                Ok(None)
            }
            fn is_established(&self) -> bool {
                true
            }
            fn dispose(&mut self) {
                self.0.lock().unwrap().push("dispose".to_string());
            }
        }

        {
            let mut scope = GssContextScope::new(Box::new(Shared(log.clone())));
            assert!(scope.is_established());
            assert_eq!(scope.step(b"x").unwrap(), None);
        }

        assert_eq!(log.lock().unwrap().as_slice(), ["dispose"]);
    }

    #[test]
    fn test_scope_step_forwards() {
        let mut scope = GssContextScope::new(Box::new(Recorder(Mutex::new(Vec::new()))));
        assert_eq!(scope.step(b"abc").unwrap(), Some(b"token".to_vec()));
    }

    #[test]
    fn test_handlers_debug_shows_presence() {
        let handlers = CallbackHandlers::new();
        let repr = format!("{handlers:?}");
        assert!(repr.contains("fido: false"));
    }
}
