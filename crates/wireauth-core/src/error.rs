//! Error types for wireauth operations.

use std::fmt;

/// The primary error type for all wireauth operations.
#[derive(Debug)]
pub enum Error {
    /// Configuration errors (missing key file, missing callback handler)
    Config(ConfigError),
    /// Protocol errors (wire-level, malformed or unexpected packets)
    Protocol(ProtocolError),
    /// Authentication errors (server denial, mechanism failures)
    Auth(AuthError),
    /// I/O errors
    Io(std::io::Error),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug)]
pub struct ProtocolError {
    pub message: String,
    pub raw_data: Option<Vec<u8>>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug)]
pub struct AuthError {
    pub kind: AuthErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// The server rejected the credentials
    ServerDenied,
    /// The server offered a mechanism this client does not implement
    UnsupportedMechanism,
    /// The selected mechanism requires an encrypted channel
    ConfidentialityRequired,
    /// Public key retrieval is disabled and no local key is available
    PublicKeyRetrieval,
    /// RSA encryption or signing failed
    Encryption,
    /// A callback or device produced empty/invalid authentication data
    InvalidAuthData,
    /// The SASL engine failed mid-exchange
    Sasl,
    /// The Kerberos login ceremony failed
    KerberosLogin,
}

impl Error {
    /// Build a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(ConfigError {
            message: message.into(),
            source: None,
        })
    }

    /// Build a configuration error wrapping an underlying cause.
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::Config(ConfigError {
            message: message.into(),
            source: Some(Box::new(source)),
        })
    }

    /// Build a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol(ProtocolError {
            message: message.into(),
            raw_data: None,
            source: None,
        })
    }

    /// Build a protocol error keeping the offending payload bytes.
    pub fn protocol_with_data(message: impl Into<String>, raw_data: Vec<u8>) -> Self {
        Error::Protocol(ProtocolError {
            message: message.into(),
            raw_data: Some(raw_data),
            source: None,
        })
    }

    /// Build an authentication error.
    pub fn auth(kind: AuthErrorKind, message: impl Into<String>) -> Self {
        Error::Auth(AuthError {
            kind,
            message: message.into(),
            source: None,
        })
    }

    /// Build an authentication error wrapping an underlying cause.
    ///
    /// External-subsystem failures (SASL engines, Kerberos logins, RSA
    /// operations) are always re-wrapped through here so callers see the
    /// driver's own error type with the original attached as `source`.
    pub fn auth_with_source(
        kind: AuthErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::Auth(AuthError {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        })
    }

    /// The authentication error kind, if this is an authentication error.
    pub fn auth_kind(&self) -> Option<AuthErrorKind> {
        match self {
            Error::Auth(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Is this a configuration error (fatal before any network round)?
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// Is this a protocol violation (unexpected packet or state)?
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e.message),
            Error::Auth(e) => write!(f, "Authentication error: {}", e.message),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Protocol(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Auth(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Io(e) => Some(e),
            Error::Custom(_) => None,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<ProtocolError> for Error {
    fn from(err: ProtocolError) -> Self {
        Error::Protocol(err)
    }
}

impl From<AuthError> for Error {
    fn from(err: AuthError) -> Self {
        Error::Auth(err)
    }
}

/// Result type alias for wireauth operations.
pub type Result<T> = std::result::Result<T, Error>;
