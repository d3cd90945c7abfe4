//! mysql_native_password: the single-round SHA1 scramble exchange.

use wireauth_core::Result;

use crate::crypto;
use crate::plugin::AuthenticationPlugin;
use crate::protocol::{PacketReader, plugin_names};

/// Legacy scramble-based authentication (MySQL < 8.0 default).
///
/// One round, no stage tracking: the server's payload is the 20-byte
/// scramble (NUL-terminated), the reply is the scramble411 hash, or an
/// empty payload when no password is configured.
#[derive(Debug, Default)]
pub struct NativePasswordPlugin {
    password: Option<String>,
}

impl NativePasswordPlugin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuthenticationPlugin for NativePasswordPlugin {
    fn protocol_plugin_name(&self) -> &'static str {
        plugin_names::MYSQL_NATIVE_PASSWORD
    }

    fn is_reusable(&self) -> bool {
        true
    }

    fn set_authentication_parameters(&mut self, _user: Option<&str>, password: Option<&str>) {
        self.password = password.map(str::to_string);
    }

    fn next_authentication_step(
        &mut self,
        from_server: &[u8],
        to_server: &mut Vec<Vec<u8>>,
    ) -> Result<bool> {
        to_server.clear();

        match self.password.as_deref() {
            Some(password) if !password.is_empty() && !from_server.is_empty() => {
                let mut reader = PacketReader::new(from_server);
                let seed = reader.read_null_bytes();
                to_server.push(crypto::scramble411(password, seed));
            }
            // No password, or the server has not sent a scramble yet
            _ => to_server.push(Vec::new()),
        }
        Ok(true)
    }

    fn reset(&mut self) {}

    fn destroy(&mut self) {
        self.reset();
        self.password = None;
    }
}
