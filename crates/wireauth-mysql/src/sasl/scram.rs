//! SCRAM-SHA-1 client (RFC 5802).
//!
//! Message flow:
//!
//! 1. client-first: `n,,n=<user>,r=<client-nonce>`
//! 2. server-first: `r=<combined-nonce>,s=<salt>,i=<iterations>`
//! 3. client-final: `c=biws,r=<combined-nonce>,p=<proof>`
//! 4. server-final: `v=<server-signature>`
//!
//! `Hi()` is PBKDF2-HMAC-SHA1. The client proof is
//! `ClientKey XOR HMAC(StoredKey, AuthMessage)`; the server-final
//! signature is verified before the exchange is considered complete.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha1::{Digest, Sha1};

use wireauth_core::{AuthErrorKind, Error, Result};

use crate::crypto::generate_nonce;
use crate::sasl::{SaslClient, mechanisms};

/// Internal state of the SCRAM exchange.
#[derive(Debug)]
enum ScramState {
    Initial,
    ClientFirstSent {
        client_first_bare: String,
    },
    ClientFinalSent {
        server_signature: [u8; 20],
    },
    Complete,
}

/// Client side of a SCRAM-SHA-1 exchange.
pub struct ScramSha1Client {
    username: String,
    password: String,
    client_nonce: String,
    state: ScramState,
}

impl ScramSha1Client {
    /// Create a new client with a random nonce.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        let nonce = BASE64.encode(generate_nonce(18));
        Self::with_nonce(username, password, nonce)
    }

    fn with_nonce(
        username: impl Into<String>,
        password: impl Into<String>,
        client_nonce: String,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            client_nonce,
            state: ScramState::Initial,
        }
    }

    fn client_first(&mut self) -> Vec<u8> {
        let bare = format!("n={},r={}", escape_username(&self.username), self.client_nonce);
        let full = format!("n,,{bare}");
        self.state = ScramState::ClientFirstSent {
            client_first_bare: bare,
        };
        full.into_bytes()
    }

    fn client_final(&mut self, client_first_bare: String, challenge: &[u8]) -> Result<Vec<u8>> {
        let server_first = std::str::from_utf8(challenge)
            .map_err(|e| Error::auth_with_source(AuthErrorKind::Sasl, "server-first message is not UTF-8", e))?;

        let attrs = parse_attributes(server_first);
        let server_nonce = attrs
            .iter()
            .find(|(k, _)| *k == "r")
            .map(|(_, v)| *v)
            .ok_or_else(|| sasl_error("server-first message is missing the nonce"))?;
        let salt_b64 = attrs
            .iter()
            .find(|(k, _)| *k == "s")
            .map(|(_, v)| *v)
            .ok_or_else(|| sasl_error("server-first message is missing the salt"))?;
        let iterations: u32 = attrs
            .iter()
            .find(|(k, _)| *k == "i")
            .and_then(|(_, v)| v.parse().ok())
            .ok_or_else(|| sasl_error("server-first message has a bad iteration count"))?;

        if !server_nonce.starts_with(self.client_nonce.as_str()) {
            return Err(sasl_error("server nonce does not extend the client nonce"));
        }
        if iterations == 0 {
            return Err(sasl_error("server-first message has a bad iteration count"));
        }

        let salt = BASE64
            .decode(salt_b64)
            .map_err(|e| Error::auth_with_source(AuthErrorKind::Sasl, "salt is not valid base64", e))?;

        let salted = hi(&self.password, &salt, iterations)?;
        let client_key = hmac_sha1(&salted, b"Client Key")?;
        let stored_key = sha1(&client_key);

        let client_final_bare = format!("c=biws,r={server_nonce}");
        let auth_message = format!("{client_first_bare},{server_first},{client_final_bare}");

        let client_signature = hmac_sha1(&stored_key, auth_message.as_bytes())?;
        let mut proof = client_key;
        for (p, s) in proof.iter_mut().zip(client_signature.iter()) {
            *p ^= s;
        }

        let server_key = hmac_sha1(&salted, b"Server Key")?;
        let server_signature = hmac_sha1(&server_key, auth_message.as_bytes())?;

        self.state = ScramState::ClientFinalSent { server_signature };
        Ok(format!("{client_final_bare},p={}", BASE64.encode(proof)).into_bytes())
    }

    fn verify_server_final(&mut self, expected: [u8; 20], challenge: &[u8]) -> Result<()> {
        let server_final = std::str::from_utf8(challenge)
            .map_err(|e| Error::auth_with_source(AuthErrorKind::Sasl, "server-final message is not UTF-8", e))?;

        let verifier = parse_attributes(server_final)
            .into_iter()
            .find(|(k, _)| *k == "v")
            .map(|(_, v)| v)
            .ok_or_else(|| sasl_error("server-final message is missing the verifier"))?;
        let verifier = BASE64
            .decode(verifier)
            .map_err(|e| Error::auth_with_source(AuthErrorKind::Sasl, "verifier is not valid base64", e))?;

        if verifier != expected {
            return Err(sasl_error("server signature verification failed"));
        }
        self.state = ScramState::Complete;
        Ok(())
    }
}

impl SaslClient for ScramSha1Client {
    fn mechanism_name(&self) -> &'static str {
        mechanisms::SCRAM_SHA_1
    }

    fn evaluate_challenge(&mut self, challenge: &[u8]) -> Result<Option<Vec<u8>>> {
        match std::mem::replace(&mut self.state, ScramState::Initial) {
            ScramState::Initial => Ok(Some(self.client_first())),
            ScramState::ClientFirstSent { client_first_bare } => {
                self.client_final(client_first_bare, challenge).map(Some)
            }
            ScramState::ClientFinalSent { server_signature } => {
                self.verify_server_final(server_signature, challenge)?;
                Ok(None)
            }
            ScramState::Complete => {
                self.state = ScramState::Complete;
                Err(Error::protocol("SCRAM exchange already complete"))
            }
        }
    }

    fn is_complete(&self) -> bool {
        matches!(self.state, ScramState::Complete)
    }
}

fn sasl_error(message: &str) -> Error {
    Error::auth(AuthErrorKind::Sasl, message)
}

/// `Hi()` from RFC 5802: PBKDF2-HMAC-SHA1.
fn hi(password: &str, salt: &[u8], iterations: u32) -> Result<[u8; 20]> {
    let mut output = [0u8; 20];
    pbkdf2::pbkdf2::<Hmac<Sha1>>(password.as_bytes(), salt, iterations, &mut output)
        .map_err(|_| sasl_error("PBKDF2 key derivation failed"))?;
    Ok(output)
}

fn hmac_sha1(key: &[u8], data: &[u8]) -> Result<[u8; 20]> {
    let mut mac = Hmac::<Sha1>::new_from_slice(key)
        .map_err(|_| sasl_error("HMAC initialization failed"))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

fn sha1(data: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Escape `=` and `,` in a SCRAM username (RFC 5802 saslname).
fn escape_username(username: &str) -> String {
    let mut out = String::with_capacity(username.len());
    for c in username.chars() {
        match c {
            '=' => out.push_str("=3D"),
            ',' => out.push_str("=2C"),
            _ => out.push(c),
        }
    }
    out
}

/// Split a SCRAM message into `key=value` attributes.
///
/// Values may themselves contain `=` (base64 padding), so only the first
/// `=` of each comma-separated field splits.
fn parse_attributes(message: &str) -> Vec<(&str, &str)> {
    message
        .split(',')
        .filter_map(|field| field.split_once('='))
        .collect()
}
