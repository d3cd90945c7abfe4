//! Password scrambles and RSA operations for MySQL authentication.
//!
//! # mysql_native_password
//!
//! Password scramble algorithm ("scramble411"):
//! ```text
//! SHA1(password) XOR SHA1(seed + SHA1(SHA1(password)))
//! ```
//!
//! # caching_sha2_password
//!
//! Fast auth (if cached on server):
//! ```text
//! XOR(SHA256(password), SHA256(SHA256(SHA256(password)) + seed))
//! ```
//!
//! Full auth requires TLS or RSA public key encryption. The exact byte
//! semantics of both scrambles are a compatibility requirement of the wire
//! protocol, not a design choice.

use sha1::Sha1;
use sha2::{Digest, Sha256};

use rand::rngs::OsRng;

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::signature::{SignatureEncoding, Signer};
use rsa::{RsaPrivateKey, RsaPublicKey};

use wireauth_core::{AuthErrorKind, Error, Result};

use crate::protocol::SEED_LENGTH;

/// RSA padding transformation for encrypted-password exchanges.
///
/// sha256_password always uses PKCS#1 v1.5; caching_sha2_password uses
/// OAEP against servers 8.0.5 and later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsaPadding {
    /// PKCS#1 v1.5 block padding
    Pkcs1,
    /// OAEP with SHA-1 and MGF1
    OaepSha1,
}

/// Compute the mysql_native_password scramble.
///
/// Returns the 20-byte authentication response, or an empty vec if the
/// password is empty.
pub fn scramble411(password: &str, seed: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return vec![];
    }

    // Only the first 20 bytes of the seed take part
    let seed = if seed.len() > SEED_LENGTH {
        &seed[..SEED_LENGTH]
    } else {
        seed
    };

    // Stage 1: SHA1(password)
    let mut hasher = Sha1::new();
    hasher.update(password.as_bytes());
    let stage1: [u8; 20] = hasher.finalize().into();

    // Stage 2: SHA1(SHA1(password))
    let mut hasher = Sha1::new();
    hasher.update(stage1);
    let stage2: [u8; 20] = hasher.finalize().into();

    // Stage 3: SHA1(seed + stage2)
    let mut hasher = Sha1::new();
    hasher.update(seed);
    hasher.update(stage2);
    let stage3: [u8; 20] = hasher.finalize().into();

    stage1
        .iter()
        .zip(stage3.iter())
        .map(|(a, b)| a ^ b)
        .collect()
}

/// Compute the caching_sha2_password fast-auth scramble.
///
/// Returns the 32-byte authentication response, or an empty vec if the
/// password is empty.
pub fn scramble_caching_sha2(password: &str, seed: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return vec![];
    }

    // Strip the trailing NUL if the server sent seed + NUL (21 bytes)
    let seed = if seed.len() == SEED_LENGTH + 1 && seed.last() == Some(&0) {
        &seed[..SEED_LENGTH]
    } else {
        seed
    };

    // SHA256(password)
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    let password_hash: [u8; 32] = hasher.finalize().into();

    // SHA256(SHA256(password))
    let mut hasher = Sha256::new();
    hasher.update(password_hash);
    let password_hash_hash: [u8; 32] = hasher.finalize().into();

    // SHA256(SHA256(SHA256(password)) + seed)
    let mut hasher = Sha256::new();
    hasher.update(password_hash_hash);
    hasher.update(seed);
    let scramble: [u8; 32] = hasher.finalize().into();

    password_hash
        .iter()
        .zip(scramble.iter())
        .map(|(a, b)| a ^ b)
        .collect()
}

/// XOR the NUL-terminated password against the rotating seed.
///
/// This is the obfuscation applied before RSA encryption in the SHA-256
/// family full-auth path.
pub fn xor_with_seed(password: &str, seed: &[u8]) -> Vec<u8> {
    let password_bytes = password.as_bytes();
    let mut result = Vec::with_capacity(password_bytes.len() + 1);
    result.extend_from_slice(password_bytes);
    result.push(0);

    if seed.is_empty() {
        return result;
    }
    for (i, b) in result.iter_mut().enumerate() {
        *b ^= seed[i % seed.len()];
    }
    result
}

/// Parse a PEM public key in either SPKI or PKCS#1 encoding.
pub fn parse_rsa_public_key(pem_bytes: &[u8]) -> Result<RsaPublicKey> {
    let pem = std::str::from_utf8(pem_bytes)
        .map_err(|e| Error::auth_with_source(AuthErrorKind::Encryption, "public key is not valid UTF-8 PEM", e))?;

    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| Error::auth_with_source(AuthErrorKind::Encryption, "failed to parse RSA public key PEM", e))
}

/// Parse a PEM private key in either PKCS#8 or PKCS#1 encoding.
pub fn parse_rsa_private_key(pem: &str) -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| Error::auth_with_source(AuthErrorKind::Encryption, "failed to parse RSA private key PEM", e))
}

/// Encrypt the seed-XORed password with the server's RSA public key.
///
/// This is the full-authentication path for `caching_sha2_password` and
/// `sha256_password` when the connection is not secured by TLS.
pub fn encrypt_password_rsa(
    password: &str,
    seed: &[u8],
    public_key_pem: &[u8],
    padding: RsaPadding,
) -> Result<Vec<u8>> {
    if seed.is_empty() {
        return Err(Error::auth(
            AuthErrorKind::Encryption,
            "no seed available for password encryption",
        ));
    }

    let obfuscated = xor_with_seed(password, seed);
    let public_key = parse_rsa_public_key(public_key_pem)?;

    match padding {
        RsaPadding::OaepSha1 => public_key
            .encrypt(&mut OsRng, rsa::Oaep::new::<Sha1>(), &obfuscated)
            .map_err(|e| {
                Error::auth_with_source(AuthErrorKind::Encryption, "RSA OAEP encryption failed", e)
            }),
        RsaPadding::Pkcs1 => public_key
            .encrypt(&mut OsRng, rsa::Pkcs1v15Encrypt, &obfuscated)
            .map_err(|e| {
                Error::auth_with_source(AuthErrorKind::Encryption, "RSA PKCS1v1.5 encryption failed", e)
            }),
    }
}

/// Sign `data` with SHA256-RSA (PKCS#1 v1.5), as the OCI plugin requires.
pub fn sign_sha256_rsa(key: &RsaPrivateKey, data: &[u8]) -> Vec<u8> {
    let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new(key.clone());
    signing_key.sign(data).to_vec()
}

/// Generate a random nonce using `OsRng`.
pub fn generate_nonce(length: usize) -> Vec<u8> {
    use rand::RngCore;
    let mut bytes = vec![0u8; length];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: [u8; 20] = [
        0x3d, 0x4c, 0x5e, 0x2f, 0x1a, 0x0b, 0x7c, 0x8d, 0x9e, 0xaf, 0x10, 0x21, 0x32, 0x43, 0x54,
        0x65, 0x76, 0x87, 0x98, 0xa9,
    ];

    const PUBLIC_KEY_PEM: &str =
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/rsa_public_key.pem"));
    const PRIVATE_KEY_PEM: &str =
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/rsa_private_key.pem"));

    #[test]
    fn test_scramble411_empty_password() {
        assert!(scramble411("", &[0; 20]).is_empty());
    }

    #[test]
    fn test_scramble411_known_vector() {
        // SHA1(pw) XOR SHA1(seed + SHA1(SHA1(pw))) for "secret" and SEED
        let expected = [
            182, 174, 103, 54, 63, 70, 160, 123, 138, 0, 173, 83, 111, 204, 150, 105, 2, 143, 33,
            231,
        ];
        assert_eq!(scramble411("secret", &SEED), expected);
        // Deterministic across calls
        assert_eq!(scramble411("secret", &SEED), expected);
    }

    #[test]
    fn test_scramble411_ignores_seed_terminator() {
        let mut long_seed = SEED.to_vec();
        long_seed.push(0);
        assert_eq!(scramble411("secret", &long_seed), scramble411("secret", &SEED));
    }

    #[test]
    fn test_scramble_caching_sha2_empty_password() {
        assert!(scramble_caching_sha2("", &[0; 20]).is_empty());
    }

    #[test]
    fn test_scramble_caching_sha2_known_vector() {
        let expected = [
            15, 33, 251, 166, 176, 234, 14, 171, 240, 228, 199, 218, 26, 166, 103, 121, 83, 116,
            172, 3, 214, 21, 223, 223, 6, 144, 41, 216, 33, 26, 31, 172,
        ];
        assert_eq!(scramble_caching_sha2("secret", &SEED), expected);
    }

    #[test]
    fn test_scramble_caching_sha2_strips_nul() {
        let mut seed_nul = SEED.to_vec();
        seed_nul.push(0);
        assert_eq!(
            scramble_caching_sha2("secret", &seed_nul),
            scramble_caching_sha2("secret", &SEED)
        );
    }

    #[test]
    fn test_xor_with_seed_roundtrip() {
        let result = xor_with_seed("test", &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(result.len(), 5);

        // XOR is reversible; last byte unmasks to NUL
        let recovered: Vec<u8> = result
            .iter()
            .enumerate()
            .map(|(i, &b)| b ^ [1u8, 2, 3, 4, 5, 6, 7, 8][i % 8])
            .collect();
        assert_eq!(&recovered[..4], b"test");
        assert_eq!(recovered[4], 0);
    }

    #[test]
    fn test_encrypt_password_rsa() {
        for padding in [RsaPadding::Pkcs1, RsaPadding::OaepSha1] {
            let ciphertext =
                encrypt_password_rsa("secret", &SEED, PUBLIC_KEY_PEM.as_bytes(), padding).unwrap();
            // 2048-bit modulus
            assert_eq!(ciphertext.len(), 256);
        }
    }

    #[test]
    fn test_encrypt_password_rsa_empty_seed() {
        let err = encrypt_password_rsa("secret", &[], PUBLIC_KEY_PEM.as_bytes(), RsaPadding::Pkcs1)
            .unwrap_err();
        assert_eq!(err.auth_kind(), Some(wireauth_core::AuthErrorKind::Encryption));
    }

    #[test]
    fn test_encrypt_password_rsa_bad_key() {
        let err = encrypt_password_rsa("secret", &SEED, b"not a key", RsaPadding::Pkcs1).unwrap_err();
        assert_eq!(err.auth_kind(), Some(wireauth_core::AuthErrorKind::Encryption));
    }

    #[test]
    fn test_sign_sha256_rsa() {
        let key = parse_rsa_private_key(PRIVATE_KEY_PEM).unwrap();
        let sig = sign_sha256_rsa(&key, b"server nonce");
        assert_eq!(sig.len(), 256);
        // Deterministic for PKCS#1 v1.5
        assert_eq!(sig, sign_sha256_rsa(&key, b"server nonce"));
    }

    #[test]
    fn test_generate_nonce() {
        let nonce1 = generate_nonce(20);
        let nonce2 = generate_nonce(20);
        assert_eq!(nonce1.len(), 20);
        assert_ne!(nonce1, nonce2);
    }
}
