//! End-to-end authentication exchanges against simulated server payloads.
//!
//! No sockets: the transport contract is payload-in/payload-out, so a test
//! can play the server side byte-for-byte.

use std::sync::Arc;

use wireauth_mysql::callback::{
    CallbackHandlers, WebAuthnAssertion, WebAuthnCallback, WebAuthnChallenge, WebAuthnResponse,
};
use wireauth_mysql::protocol::{PacketReader, PacketWriter, auth_tag, caching_sha2, plugin_names};
use wireauth_mysql::{AuthConfig, AuthProgress, AuthSession, Authenticator, PluginRegistry, ServerVersion};

const SEED: [u8; 20] = [0x3B; 20];

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn seed_payload() -> Vec<u8> {
    let mut payload = SEED.to_vec();
    payload.push(0);
    payload
}

fn ok_packet() -> Vec<u8> {
    vec![0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00]
}

fn session(tls: bool, config: AuthConfig) -> Arc<AuthSession> {
    AuthSession::new(config, tls, ServerVersion::new(8, 0, 33))
}

fn replies(progress: AuthProgress) -> Vec<Vec<u8>> {
    match progress {
        AuthProgress::Replies(replies) => replies,
        AuthProgress::Authenticated(_) => panic!("exchange finished early"),
    }
}

#[test]
fn caching_sha2_fast_auth_path() {
    let mut auth = Authenticator::new(
        PluginRegistry::with_builtin_plugins(),
        session(false, AuthConfig::new()),
        CallbackHandlers::new(),
        plugin_names::CACHING_SHA2_PASSWORD,
        Some("app"),
        Some("secret"),
    )
    .unwrap();

    let scramble = auth.begin(&seed_payload()).unwrap();
    assert_eq!(scramble.len(), 1);
    assert_eq!(scramble[0].len(), 32);

    // Server: fast auth success, then OK
    let out = replies(
        auth.process_payload(&[auth_tag::MORE_DATA, caching_sha2::FAST_AUTH_SUCCESS])
            .unwrap(),
    );
    assert!(out.is_empty());

    match auth.process_payload(&ok_packet()).unwrap() {
        AuthProgress::Authenticated(ok) => assert_eq!(ok.status_flags, 2),
        AuthProgress::Replies(_) => panic!("expected completion"),
    }
    assert!(auth.is_complete());
}

#[test]
fn caching_sha2_full_auth_with_key_retrieval() {
    let mut auth = Authenticator::new(
        PluginRegistry::with_builtin_plugins(),
        session(false, AuthConfig::new().allow_public_key_retrieval(true)),
        CallbackHandlers::new(),
        plugin_names::CACHING_SHA2_PASSWORD,
        Some("app"),
        Some("secret"),
    )
    .unwrap();

    auth.begin(&seed_payload()).unwrap();

    // Server: perform full auth; client asks for the public key
    let out = replies(
        auth.process_payload(&[auth_tag::MORE_DATA, caching_sha2::PERFORM_FULL_AUTH])
            .unwrap(),
    );
    assert_eq!(out, vec![vec![caching_sha2::REQUEST_PUBLIC_KEY]]);

    // Server: the PEM public key; client answers with RSA ciphertext
    let mut key_payload = vec![auth_tag::MORE_DATA];
    key_payload.extend_from_slice(&std::fs::read(fixture("rsa_public_key.pem")).unwrap());
    let out = replies(auth.process_payload(&key_payload).unwrap());
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].len(), 256);

    match auth.process_payload(&ok_packet()).unwrap() {
        AuthProgress::Authenticated(_) => {}
        AuthProgress::Replies(_) => panic!("expected completion"),
    }
}

#[test]
fn auth_switch_into_sha256_with_local_key_file() {
    let config = AuthConfig::new().server_rsa_public_key_file(fixture("rsa_public_key.pem"));
    let mut auth = Authenticator::new(
        PluginRegistry::with_builtin_plugins(),
        session(false, config),
        CallbackHandlers::new(),
        plugin_names::MYSQL_NATIVE_PASSWORD,
        Some("app"),
        Some("secret"),
    )
    .unwrap();

    auth.begin(&seed_payload()).unwrap();

    // Server switches mechanisms mid-handshake
    let mut switch = vec![auth_tag::SWITCH_REQUEST];
    switch.extend_from_slice(b"sha256_password\0");
    switch.extend_from_slice(&seed_payload());

    let out = replies(auth.process_payload(&switch).unwrap());
    assert_eq!(auth.current_plugin_name(), plugin_names::SHA256_PASSWORD);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].len(), 256);

    match auth.process_payload(&ok_packet()).unwrap() {
        AuthProgress::Authenticated(_) => {}
        AuthProgress::Replies(_) => panic!("expected completion"),
    }
}

struct StubAuthenticatorDevice;

impl WebAuthnCallback for StubAuthenticatorDevice {
    fn perform_assertion(
        &self,
        challenge: &WebAuthnChallenge,
    ) -> wireauth_core::Result<WebAuthnResponse> {
        assert_eq!(challenge.relying_party_id, "db.example.com");
        Ok(WebAuthnResponse {
            assertions: vec![WebAuthnAssertion {
                authenticator_data: vec![0xDA; 37],
                signature: vec![0x51; 64],
            }],
            client_data_json: br#"{"type":"webauthn.get"}"#.to_vec(),
        })
    }
}

#[test]
fn multi_factor_password_then_webauthn() {
    let callbacks = CallbackHandlers::new().webauthn(Arc::new(StubAuthenticatorDevice));
    let mut auth = Authenticator::new(
        PluginRegistry::with_builtin_plugins(),
        session(false, AuthConfig::new()),
        callbacks,
        plugin_names::CACHING_SHA2_PASSWORD,
        Some("app"),
        Some("secret"),
    )
    .unwrap();

    auth.begin(&seed_payload()).unwrap();
    replies(
        auth.process_payload(&[auth_tag::MORE_DATA, caching_sha2::FAST_AUTH_SUCCESS])
            .unwrap(),
    );

    // Factor 2: WebAuthn, with the challenge in the next-factor envelope
    let mut next_factor = vec![auth_tag::NEXT_FACTOR];
    next_factor.extend_from_slice(b"authentication_webauthn_client\0");
    let mut challenge = PacketWriter::new();
    challenge.write_u8(1); // reserved
    challenge.write_lenenc_bytes(&[0xC4; 32]);
    challenge.write_lenenc_string("db.example.com");
    next_factor.extend_from_slice(challenge.as_bytes());

    let out = replies(auth.process_payload(&next_factor).unwrap());
    assert_eq!(out, vec![vec![0x01]]); // credential id request
    assert_eq!(
        auth.current_plugin_name(),
        plugin_names::AUTHENTICATION_WEBAUTHN
    );

    // Server: no previously registered credential (zero-length id)
    let out = replies(auth.process_payload(&[auth_tag::MORE_DATA, 0x00]).unwrap());
    assert_eq!(out.len(), 1);

    let mut reader = PacketReader::new(&out[0]);
    assert_eq!(reader.read_u8(), Some(0x02)); // assertion tag
    assert_eq!(reader.read_lenenc_int(), Some(1)); // one assertion
    assert_eq!(reader.read_lenenc_bytes().unwrap(), vec![0xDA; 37]);
    assert_eq!(reader.read_lenenc_bytes().unwrap(), vec![0x51; 64]);
    assert_eq!(
        reader.read_lenenc_bytes().unwrap(),
        br#"{"type":"webauthn.get"}"#.to_vec()
    );

    match auth.process_payload(&ok_packet()).unwrap() {
        AuthProgress::Authenticated(_) => {}
        AuthProgress::Replies(_) => panic!("expected completion"),
    }
}

#[test]
fn denied_exchange_surfaces_server_message() {
    let mut auth = Authenticator::new(
        PluginRegistry::with_builtin_plugins(),
        session(false, AuthConfig::new()),
        CallbackHandlers::new(),
        plugin_names::MYSQL_NATIVE_PASSWORD,
        Some("app"),
        Some("wrong"),
    )
    .unwrap();

    auth.begin(&seed_payload()).unwrap();

    let mut err_packet = vec![auth_tag::ERROR, 0x15, 0x04, b'#'];
    err_packet.extend_from_slice(b"28000");
    err_packet.extend_from_slice(b"Access denied for user 'app'@'localhost'");

    let err = auth.process_payload(&err_packet).unwrap_err();
    assert!(err.to_string().contains("Access denied for user"));
    assert!(auth.is_complete());
}
