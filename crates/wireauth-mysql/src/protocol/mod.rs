//! MySQL authentication wire protocol pieces.
//!
//! The transport strips the 4-byte packet header before handing payloads to
//! this crate, so everything here operates on payload bytes only. During the
//! authentication phase the first payload byte routes the packet:
//!
//! - `0x00`: OK, authentication finished
//! - `0x01`: more authentication data for the active plugin
//! - `0x02`: advance a multi-factor chain to the named plugin
//! - `0xFE`: restart authentication with the named plugin
//! - `0xFF`: error

pub mod reader;
pub mod writer;

pub use reader::PacketReader;
pub use writer::PacketWriter;

/// Length of the scramble (seed) the server generates for password hashing.
pub const SEED_LENGTH: usize = 20;

/// Well-known authentication plugin names.
///
/// These strings are protocol identifiers; negotiation matches them
/// byte-for-byte against what the server advertises.
pub mod plugin_names {
    /// SHA1-based authentication (legacy default)
    pub const MYSQL_NATIVE_PASSWORD: &str = "mysql_native_password";
    /// SHA256-based authentication (MySQL 8.0+ default)
    pub const CACHING_SHA2_PASSWORD: &str = "caching_sha2_password";
    /// RSA-based SHA256 authentication
    pub const SHA256_PASSWORD: &str = "sha256_password";
    /// Clear password (requires an encrypted channel)
    pub const MYSQL_CLEAR_PASSWORD: &str = "mysql_clear_password";
    /// LDAP authentication bridged over SASL
    pub const AUTHENTICATION_LDAP_SASL: &str = "authentication_ldap_sasl_client";
    /// Kerberos authentication via GSSAPI
    pub const AUTHENTICATION_KERBEROS: &str = "authentication_kerberos_client";
    /// FIDO authenticator devices
    pub const AUTHENTICATION_FIDO: &str = "authentication_fido_client";
    /// WebAuthn authenticator devices
    pub const AUTHENTICATION_WEBAUTHN: &str = "authentication_webauthn_client";
    /// Oracle Cloud Infrastructure API-key authentication
    pub const AUTHENTICATION_OCI: &str = "authentication_oci_client";
    /// OpenID Connect identity tokens
    pub const AUTHENTICATION_OPENID_CONNECT: &str = "authentication_openid_connect_client";
}

/// First-byte tags of server packets seen during the authentication phase.
pub mod auth_tag {
    /// OK packet, authentication succeeded
    pub const OK: u8 = 0x00;
    /// AuthMoreData, payload for the active plugin follows
    pub const MORE_DATA: u8 = 0x01;
    /// AuthNextFactor, multi-factor chain advances to a new plugin
    pub const NEXT_FACTOR: u8 = 0x02;
    /// AuthSwitchRequest, restart with a different plugin
    pub const SWITCH_REQUEST: u8 = 0xFE;
    /// Error packet
    pub const ERROR: u8 = 0xFF;
}

/// Response codes for the caching_sha2_password exchange.
pub mod caching_sha2 {
    /// Request for public key (client sends 0x02)
    pub const REQUEST_PUBLIC_KEY: u8 = 0x02;
    /// Fast auth success
    pub const FAST_AUTH_SUCCESS: u8 = 0x03;
    /// Full auth needed (switch to secure channel or RSA)
    pub const PERFORM_FULL_AUTH: u8 = 0x04;
}

/// Response codes for the sha256_password exchange.
pub mod sha256_password {
    /// Request for public key (client sends 0x01)
    pub const REQUEST_PUBLIC_KEY: u8 = 0x01;
}

/// Parsed AuthSwitchRequest / AuthNextFactor body (the tag byte stripped).
///
/// Both packets share the same layout: a null-terminated mechanism name
/// followed by mechanism-specific initial data.
#[derive(Debug, Clone)]
pub struct AuthSwitchRequest {
    /// Mechanism name the server wants next
    pub plugin_name: String,
    /// Initial data for that mechanism (often a fresh seed)
    pub auth_data: Vec<u8>,
}

impl AuthSwitchRequest {
    /// Parse the body of an auth switch packet.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let mut reader = PacketReader::new(data);
        let plugin_name = reader.read_null_string()?;
        if plugin_name.is_empty() {
            return None;
        }
        let auth_data = reader.read_rest().to_vec();
        Some(Self {
            plugin_name,
            auth_data,
        })
    }
}

/// Parsed OK packet.
#[derive(Debug, Clone)]
pub struct OkPacket {
    /// Number of affected rows
    pub affected_rows: u64,
    /// Last insert ID
    pub last_insert_id: u64,
    /// Server status flags
    pub status_flags: u16,
    /// Number of warnings
    pub warnings: u16,
    /// Info string (if any)
    pub info: String,
}

/// Parsed Error packet.
#[derive(Debug, Clone)]
pub struct ErrPacket {
    /// Error code
    pub error_code: u16,
    /// SQL state (5 characters)
    pub sql_state: String,
    /// Error message
    pub error_message: String,
}

impl ErrPacket {
    /// Check if this is an access-denied error.
    pub fn is_access_denied(&self) -> bool {
        // MySQL error code 1045 = ER_ACCESS_DENIED_ERROR
        self.error_code == 1045
    }
}
