//! Authentication plugin contract and mechanism implementations.
//!
//! Every mechanism is one state machine behind the same trait. The
//! negotiation layer ([`crate::negotiate`]) owns exactly one active plugin
//! per handshake, feeds it each server payload, and sends back whatever
//! packets the plugin produces. Plugins signal failure by raising; the
//! boolean returned from [`AuthenticationPlugin::next_authentication_step`]
//! only says "keep the exchange going".

pub mod caching_sha2;
pub mod clear;
pub mod fido;
pub mod kerberos;
pub mod ldap_sasl;
pub mod native;
pub mod oci;
pub mod openid;
pub mod sha256;
pub mod webauthn;

pub use caching_sha2::CachingSha2PasswordPlugin;
pub use clear::ClearPasswordPlugin;
pub use fido::FidoAuthPlugin;
pub use kerberos::KerberosAuthPlugin;
pub use ldap_sasl::LdapSaslAuthPlugin;
pub use native::NativePasswordPlugin;
pub use oci::OciAuthPlugin;
pub use openid::OpenIdConnectAuthPlugin;
pub use sha256::Sha256PasswordPlugin;
pub use webauthn::WebAuthnAuthPlugin;

use std::sync::Arc;

use wireauth_core::Result;

use crate::callback::UsernameCallback;

/// A pluggable authentication mechanism.
///
/// Lifecycle: constructed by the registry when the server names the
/// mechanism, given credentials via `set_authentication_parameters`, then
/// stepped once per server round. `reset` returns the per-attempt state to
/// its initial values without discarding injected configuration; `destroy`
/// additionally releases credentials and cached key material.
pub trait AuthenticationPlugin: Send {
    /// The exact server-side mechanism identifier.
    ///
    /// Negotiation matches this byte-for-byte against what the server
    /// advertises.
    fn protocol_plugin_name(&self) -> &'static str;

    /// True if this mechanism must refuse to run over an unencrypted
    /// channel. Enforced at negotiation time, never inside the step
    /// function.
    fn requires_confidentiality(&self) -> bool {
        false
    }

    /// True if one instance may serve a later authentication round (an
    /// auth switch back to the same mechanism, or a repeated factor)
    /// after a `reset`.
    fn is_reusable(&self) -> bool {
        false
    }

    /// Install the credentials for the coming attempt.
    fn set_authentication_parameters(&mut self, user: Option<&str>, password: Option<&str>);

    /// Advance the exchange by one server round.
    ///
    /// `from_server` may be zero-length, which means the server has said
    /// nothing for this plugin yet. `to_server` is cleared and repopulated
    /// with zero or more outgoing payloads. Returns `true` to continue the
    /// handshake; failures are raised, never encoded in the return value.
    fn next_authentication_step(
        &mut self,
        from_server: &[u8],
        to_server: &mut Vec<Vec<u8>>,
    ) -> Result<bool>;

    /// Return per-attempt state to initial values. Idempotent.
    fn reset(&mut self);

    /// `reset` plus release of credentials and injected references.
    fn destroy(&mut self) {
        self.reset();
    }
}

/// Resolve the username for an attempt.
///
/// Falls back to the process owner's name when none was configured, and
/// reports the derived identity through the username callback so the
/// caller can observe what actually went over the wire.
pub(crate) fn resolve_username(
    configured: Option<&str>,
    callback: Option<&Arc<dyn UsernameCallback>>,
) -> String {
    match configured {
        Some(user) if !user.is_empty() => user.to_string(),
        _ => {
            let derived = system_username();
            if let Some(cb) = callback {
                cb.username_used(&derived);
            }
            derived
        }
    }
}

/// The identity of the user running this process.
pub(crate) fn system_username() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default()
}
