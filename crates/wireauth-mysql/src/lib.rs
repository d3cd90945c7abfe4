//! MySQL authentication core for wireauth.
//!
//! This crate implements the pluggable-authentication half of the MySQL
//! client/server protocol from scratch: the packet payload codec and the
//! challenge/response state machines for every standard authentication
//! plugin. It provides:
//!
//! - Packet payload reading/writing (fixed-width integers, length-encoded
//!   integers, null-terminated and length-prefixed fields)
//! - The authentication plugin contract and nine mechanism implementations
//!   (native password, SHA-256 family, clear text, LDAP SASL, Kerberos,
//!   FIDO, WebAuthn, OCI, OpenID Connect)
//! - Plugin negotiation: auth switch, auth-more-data routing, and
//!   sequential multi-factor chaining
//! - A SCRAM-SHA-1 SASL client engine for the LDAP bridge
//!
//! # Scope
//!
//! The transport is external: callers hand in decoded packet payloads and
//! send back whatever payloads the active plugin produces. TLS, sockets,
//! connection strings and result sets live elsewhere; the session only
//! carries the facts plugins need (TLS established, server version,
//! auth-related configuration).
//!
//! # Example
//!
//! ```rust,ignore
//! use wireauth_mysql::{AuthConfig, AuthSession, Authenticator, PluginRegistry};
//!
//! let session = AuthSession::new(AuthConfig::new(), false, "8.0.33".parse()?);
//! let mut auth = Authenticator::new(
//!     PluginRegistry::with_builtin_plugins(),
//!     session,
//!     Default::default(),
//!     "caching_sha2_password",
//!     Some("app"),
//!     Some("secret"),
//! )?;
//! let replies = auth.begin(&handshake_seed)?;
//! ```

pub mod callback;
pub mod config;
pub mod crypto;
pub mod negotiate;
pub mod plugin;
pub mod protocol;
pub mod sasl;
pub mod session;

pub use callback::CallbackHandlers;
pub use config::AuthConfig;
pub use negotiate::{AuthProgress, Authenticator, PluginRegistry};
pub use plugin::AuthenticationPlugin;
pub use session::{AuthSession, ServerVersion};
