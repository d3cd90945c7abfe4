//! Plugin negotiation: registry, auth switch, and multi-factor chaining.
//!
//! The [`Authenticator`] sits between the transport and the active plugin.
//! Per server payload it either terminates (OK/ERR), swaps the active
//! plugin (auth switch, next factor), or routes the payload into the
//! plugin's step function and returns the packets to send back. Plugins
//! that demand confidentiality are rejected at selection time, before
//! their step function could ever run on a plaintext channel.

use std::collections::HashMap;
use std::sync::Arc;

use wireauth_core::{AuthErrorKind, Error, Result};

use crate::callback::CallbackHandlers;
use crate::plugin::{
    AuthenticationPlugin, CachingSha2PasswordPlugin, ClearPasswordPlugin, FidoAuthPlugin,
    KerberosAuthPlugin, LdapSaslAuthPlugin, NativePasswordPlugin, OciAuthPlugin,
    OpenIdConnectAuthPlugin, Sha256PasswordPlugin, WebAuthnAuthPlugin,
};
use crate::protocol::{AuthSwitchRequest, OkPacket, PacketReader, auth_tag, plugin_names};
use crate::session::AuthSession;

/// Builds one plugin instance for a session.
pub type PluginConstructor =
    fn(&Arc<AuthSession>, &CallbackHandlers) -> Result<Box<dyn AuthenticationPlugin>>;

/// Maps server-advertised mechanism names to plugin constructors.
///
/// A statically registered table, keyed by the exact protocol identifier;
/// no name-based dynamic instantiation.
#[derive(Debug)]
pub struct PluginRegistry {
    constructors: HashMap<&'static str, PluginConstructor>,
}

impl PluginRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// A registry with every built-in mechanism.
    pub fn with_builtin_plugins() -> Self {
        let mut registry = Self::new();
        registry.register(plugin_names::MYSQL_NATIVE_PASSWORD, |_, _| {
            Ok(Box::new(NativePasswordPlugin::new()))
        });
        registry.register(plugin_names::MYSQL_CLEAR_PASSWORD, |_, _| {
            Ok(Box::new(ClearPasswordPlugin::new()))
        });
        registry.register(plugin_names::SHA256_PASSWORD, |session, _| {
            Ok(Box::new(Sha256PasswordPlugin::new(session.clone())))
        });
        registry.register(plugin_names::CACHING_SHA2_PASSWORD, |session, _| {
            Ok(Box::new(CachingSha2PasswordPlugin::new(session.clone())))
        });
        registry.register(plugin_names::AUTHENTICATION_LDAP_SASL, |_, callbacks| {
            Ok(Box::new(LdapSaslAuthPlugin::new(callbacks.username.clone())))
        });
        registry.register(plugin_names::AUTHENTICATION_KERBEROS, |_, callbacks| {
            Ok(Box::new(KerberosAuthPlugin::new(
                callbacks.username.clone(),
                callbacks.kerberos_login.clone(),
            )?))
        });
        registry.register(plugin_names::AUTHENTICATION_FIDO, |_, callbacks| {
            Ok(Box::new(FidoAuthPlugin::new(callbacks.fido.clone())?))
        });
        registry.register(plugin_names::AUTHENTICATION_WEBAUTHN, |_, callbacks| {
            Ok(Box::new(WebAuthnAuthPlugin::new(callbacks.webauthn.clone())?))
        });
        registry.register(plugin_names::AUTHENTICATION_OCI, |session, _| {
            Ok(Box::new(OciAuthPlugin::new(session)?))
        });
        registry.register(plugin_names::AUTHENTICATION_OPENID_CONNECT, |_, callbacks| {
            Ok(Box::new(OpenIdConnectAuthPlugin::new(
                callbacks.openid_token.clone(),
            )?))
        });
        registry
    }

    /// Register (or replace) a mechanism constructor.
    pub fn register(&mut self, name: &'static str, constructor: PluginConstructor) {
        self.constructors.insert(name, constructor);
    }

    /// Whether a mechanism name is known.
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Instantiate a plugin and enforce its confidentiality requirement
    /// against the session's channel.
    fn instantiate(
        &self,
        name: &str,
        session: &Arc<AuthSession>,
        callbacks: &CallbackHandlers,
    ) -> Result<Box<dyn AuthenticationPlugin>> {
        let constructor = self.constructors.get(name).ok_or_else(|| {
            Error::auth(
                AuthErrorKind::UnsupportedMechanism,
                format!("unknown authentication plugin '{name}'"),
            )
        })?;

        let plugin = constructor(session, callbacks)?;
        if plugin.requires_confidentiality() && !session.tls_established {
            return Err(Error::auth(
                AuthErrorKind::ConfidentialityRequired,
                format!("authentication plugin '{name}' requires a secure (TLS) connection"),
            ));
        }
        Ok(plugin)
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::with_builtin_plugins()
    }
}

/// Whose data the current payload carries: the named plugin's own bytes,
/// or a generic switch/next-factor envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthDataSource {
    Plugin,
    Envelope,
}

/// One step of progress through the handshake.
#[derive(Debug)]
pub enum AuthProgress {
    /// Send these payloads and keep reading
    Replies(Vec<Vec<u8>>),
    /// The server accepted the credentials
    Authenticated(OkPacket),
}

/// Drives one authentication handshake.
pub struct Authenticator {
    registry: PluginRegistry,
    session: Arc<AuthSession>,
    callbacks: CallbackHandlers,
    user: Option<String>,
    password: Option<String>,
    plugin: Box<dyn AuthenticationPlugin>,
    source: AuthDataSource,
    done: bool,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("registry", &self.registry)
            .field("session", &self.session)
            .field("callbacks", &self.callbacks)
            .field("user", &self.user)
            .field("password", &self.password.is_some())
            .field("plugin", &self.plugin.protocol_plugin_name())
            .field("source", &self.source)
            .field("done", &self.done)
            .finish()
    }
}

impl Authenticator {
    /// Start a handshake with the mechanism the server's greeting named.
    pub fn new(
        registry: PluginRegistry,
        session: Arc<AuthSession>,
        callbacks: CallbackHandlers,
        initial_plugin: &str,
        user: Option<&str>,
        password: Option<&str>,
    ) -> Result<Self> {
        let mut plugin = registry.instantiate(initial_plugin, &session, &callbacks)?;
        plugin.set_authentication_parameters(user, password);

        Ok(Self {
            registry,
            session,
            callbacks,
            user: user.map(str::to_string),
            password: password.map(str::to_string),
            plugin,
            source: AuthDataSource::Envelope,
            done: false,
        })
    }

    /// The mechanism currently driving the exchange.
    pub fn current_plugin_name(&self) -> &str {
        self.plugin.protocol_plugin_name()
    }

    /// True once the server sent its final OK.
    pub fn is_complete(&self) -> bool {
        self.done
    }

    /// Feed the handshake's initial auth data (the seed from the server
    /// greeting) to the starting plugin and collect its first replies.
    pub fn begin(&mut self, auth_data: &[u8]) -> Result<Vec<Vec<u8>>> {
        let mut replies = Vec::new();
        self.plugin.next_authentication_step(auth_data, &mut replies)?;
        Ok(replies)
    }

    /// Process one server payload.
    pub fn process_payload(&mut self, payload: &[u8]) -> Result<AuthProgress> {
        if self.done {
            return Err(Error::protocol("authentication already complete"));
        }
        if payload.is_empty() {
            return Err(Error::protocol("empty authentication packet"));
        }

        match payload[0] {
            auth_tag::OK => {
                let ok = PacketReader::new(payload)
                    .parse_ok_packet()
                    .ok_or_else(|| Error::protocol_with_data("malformed OK packet", payload.to_vec()))?;
                tracing::debug!(plugin = self.current_plugin_name(), "authentication succeeded");
                self.plugin.destroy();
                self.done = true;
                Ok(AuthProgress::Authenticated(ok))
            }
            auth_tag::ERROR => {
                let err = PacketReader::new(payload)
                    .parse_err_packet()
                    .ok_or_else(|| Error::protocol_with_data("malformed error packet", payload.to_vec()))?;
                self.plugin.destroy();
                self.done = true;
                Err(Error::auth(
                    AuthErrorKind::ServerDenied,
                    format!(
                        "authentication failed: {} (code {}, state {})",
                        err.error_message, err.error_code, err.sql_state
                    ),
                ))
            }
            auth_tag::SWITCH_REQUEST => {
                if payload.len() == 1 {
                    // Pre-4.1 servers used a bare 0xFE to demand the old
                    // password hash
                    return Err(Error::protocol(
                        "legacy old-password auth switch is not supported",
                    ));
                }
                let request = AuthSwitchRequest::parse(&payload[1..]).ok_or_else(|| {
                    Error::protocol_with_data("malformed auth switch request", payload.to_vec())
                })?;
                self.switch_to(&request.plugin_name)?;
                self.source = AuthDataSource::Envelope;
                self.step(&request.auth_data)
            }
            auth_tag::NEXT_FACTOR => {
                let request = AuthSwitchRequest::parse(&payload[1..]).ok_or_else(|| {
                    Error::protocol_with_data("malformed auth next factor packet", payload.to_vec())
                })?;
                tracing::debug!(plugin = %request.plugin_name, "advancing to next authentication factor");
                self.switch_to(&request.plugin_name)?;
                self.source = AuthDataSource::Envelope;
                self.step(&request.auth_data)
            }
            auth_tag::MORE_DATA => {
                self.source = AuthDataSource::Plugin;
                self.step(&payload[1..])
            }
            _ => {
                self.source = AuthDataSource::Plugin;
                self.step(payload)
            }
        }
    }

    /// Tear down the active plugin without finishing the handshake, e.g.
    /// when the surrounding session is closed mid-exchange.
    pub fn abort(&mut self) {
        if !self.done {
            self.plugin.destroy();
            self.done = true;
        }
    }

    fn step(&mut self, data: &[u8]) -> Result<AuthProgress> {
        tracing::trace!(
            plugin = self.current_plugin_name(),
            source = ?self.source,
            len = data.len(),
            "stepping authentication plugin"
        );
        let mut replies = Vec::new();
        self.plugin.next_authentication_step(data, &mut replies)?;
        Ok(AuthProgress::Replies(replies))
    }

    fn switch_to(&mut self, name: &str) -> Result<()> {
        if name == self.plugin.protocol_plugin_name() && self.plugin.is_reusable() {
            // Same mechanism again: restart the per-attempt state machine
            self.plugin.reset();
        } else {
            self.plugin.destroy();
            self.plugin = self
                .registry
                .instantiate(name, &self.session, &self.callbacks)?;
        }
        self.plugin
            .set_authentication_parameters(self.user.as_deref(), self.password.as_deref());
        tracing::debug!(plugin = name, "switched authentication plugin");
        Ok(())
    }
}

impl Drop for Authenticator {
    fn drop(&mut self) {
        self.abort();
    }
}
