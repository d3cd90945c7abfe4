//! mysql_clear_password: the minimal pass-through mechanism.
//!
//! The password crosses the wire as-is, so negotiation refuses to select
//! this plugin unless the channel is already encrypted.

use wireauth_core::Result;

use crate::plugin::AuthenticationPlugin;
use crate::protocol::plugin_names;

/// Sends the password (or nothing) NUL-terminated in a single round.
#[derive(Debug, Default)]
pub struct ClearPasswordPlugin {
    password: Option<String>,
}

impl ClearPasswordPlugin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuthenticationPlugin for ClearPasswordPlugin {
    fn protocol_plugin_name(&self) -> &'static str {
        plugin_names::MYSQL_CLEAR_PASSWORD
    }

    fn requires_confidentiality(&self) -> bool {
        true
    }

    fn is_reusable(&self) -> bool {
        true
    }

    fn set_authentication_parameters(&mut self, _user: Option<&str>, password: Option<&str>) {
        self.password = password.map(str::to_string);
    }

    fn next_authentication_step(
        &mut self,
        _from_server: &[u8],
        to_server: &mut Vec<Vec<u8>>,
    ) -> Result<bool> {
        to_server.clear();

        let mut payload = self
            .password
            .as_deref()
            .unwrap_or("")
            .as_bytes()
            .to_vec();
        payload.push(0);
        to_server.push(payload);
        Ok(true)
    }

    fn reset(&mut self) {}

    fn destroy(&mut self) {
        self.reset();
        self.password = None;
    }
}
