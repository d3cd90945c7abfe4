//! SASL client engine used by the LDAP bridge plugin.
//!
//! The LDAP plugin does no credential math itself; it feeds raw server
//! payloads into a [`SaslClient`] and forwards whatever the engine returns.
//! Only SCRAM-SHA-1 is implemented; GSSAPI is named by the protocol but
//! deliberately routed to the Kerberos plugin instead.

pub mod scram;

pub use scram::ScramSha1Client;

use wireauth_core::Result;

/// SASL mechanism names as they appear on the wire.
pub mod mechanisms {
    pub const SCRAM_SHA_1: &str = "SCRAM-SHA-1";
    pub const GSSAPI: &str = "GSSAPI";
}

/// A client-side SASL exchange.
pub trait SaslClient: Send {
    /// The mechanism this client implements.
    fn mechanism_name(&self) -> &'static str;

    /// Feed the server's challenge in; returns the response to send, or
    /// `None` when there is nothing left to send this round.
    ///
    /// The initial call uses an empty challenge to produce the
    /// client-first message.
    fn evaluate_challenge(&mut self, challenge: &[u8]) -> Result<Option<Vec<u8>>>;

    /// True once the exchange has verified the server and finished.
    fn is_complete(&self) -> bool;
}
