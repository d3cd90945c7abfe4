//! Core error types shared by the wireauth crates.
//!
//! Authentication failures have a small, fixed taxonomy: configuration
//! errors (raised before any network round), protocol violations,
//! authentication errors proper (server denial, unusable mechanism,
//! cryptographic failure), and I/O. Everything a plugin raises is one of
//! these; external-subsystem failures are wrapped with their cause
//! attached rather than leaked as foreign error types.

pub mod error;

pub use error::{AuthError, AuthErrorKind, ConfigError, Error, ProtocolError, Result};
