//! State-token codec properties exercised through the public API.

use std::time::Duration;

use mcpdock_gateway::{AuthorizationAttempt, ConnectError, PkceMaterial, StateTokenCodec};
use tests::TEST_STATE_KEY;
use uuid::Uuid;

fn codec() -> StateTokenCodec {
    StateTokenCodec::new(&TEST_STATE_KEY).unwrap()
}

fn attempt_for(user_id: Uuid, ttl: Duration) -> AuthorizationAttempt {
    AuthorizationAttempt::new(
        &PkceMaterial::generate(),
        Uuid::new_v4(),
        Uuid::new_v4(),
        user_id,
        "https://dock.test/oauth/callback",
        vec!["mcp".to_string(), "offline_access".to_string()],
        None,
        ttl,
    )
}

#[test]
fn test_round_trip_reproduces_payload_exactly() {
    let codec = codec();
    let user_id = Uuid::new_v4();
    let attempt = attempt_for(user_id, Duration::from_secs(600));

    let token = codec.encode(&attempt).unwrap();
    let decoded = codec.decode(&token, &user_id).unwrap();

    assert_eq!(decoded, attempt);
}

#[test]
fn test_integrated_flow_discriminator_survives_round_trip() {
    let codec = codec();
    let user_id = Uuid::new_v4();
    let composite_id = Uuid::new_v4();

    let mut attempt = attempt_for(user_id, Duration::from_secs(600));
    attempt.integrated_target = Some(composite_id);

    let token = codec.encode(&attempt).unwrap();
    let decoded = codec.decode(&token, &user_id).unwrap();

    assert_eq!(decoded.integrated_target, Some(composite_id));
}

#[test]
fn test_every_flipped_bit_is_rejected() {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    let codec = codec();
    let user_id = Uuid::new_v4();
    let token = codec
        .encode(&attempt_for(user_id, Duration::from_secs(600)))
        .unwrap();

    let mut sealed = URL_SAFE_NO_PAD.decode(&token).unwrap();
    for i in 0..sealed.len() {
        for bit in [0x01u8, 0x80u8] {
            sealed[i] ^= bit;
            let tampered = URL_SAFE_NO_PAD.encode(&sealed);
            assert!(
                matches!(
                    codec.decode(&tampered, &user_id),
                    Err(ConnectError::InvalidStateToken)
                ),
                "altered byte {} (bit {:#04x}) must be rejected",
                i,
                bit
            );
            sealed[i] ^= bit;
        }
    }
}

#[test]
fn test_expired_token_is_state_expired_even_if_well_formed() {
    let codec = codec();
    let user_id = Uuid::new_v4();

    let mut attempt = attempt_for(user_id, Duration::from_secs(600));
    attempt.expires_at = chrono::Utc::now() - chrono::Duration::seconds(5);

    let token = codec.encode(&attempt).unwrap();

    assert!(matches!(
        codec.decode(&token, &user_id),
        Err(ConnectError::StateExpired)
    ));
}

#[test]
fn test_different_user_is_user_mismatch() {
    let codec = codec();
    let token = codec
        .encode(&attempt_for(Uuid::new_v4(), Duration::from_secs(600)))
        .unwrap();

    assert!(matches!(
        codec.decode(&token, &Uuid::new_v4()),
        Err(ConnectError::UserMismatch)
    ));
}

#[test]
fn test_ten_minute_window_is_stamped() {
    let user_id = Uuid::new_v4();
    let attempt = attempt_for(user_id, Duration::from_secs(600));

    let window = attempt.expires_at - attempt.issued_at;
    assert_eq!(window.num_seconds(), 600);
}

#[test]
fn test_tokens_are_unique_per_attempt() {
    let codec = codec();
    let user_id = Uuid::new_v4();

    // Same payload sealed twice yields different tokens (random nonce)
    let attempt = attempt_for(user_id, Duration::from_secs(600));
    let a = codec.encode(&attempt).unwrap();
    let b = codec.encode(&attempt).unwrap();
    assert_ne!(a, b);

    // Both still decode to the same payload
    assert_eq!(
        codec.decode(&a, &user_id).unwrap(),
        codec.decode(&b, &user_id).unwrap()
    );
}
