use crate::state::{StateCodec, STATE_TTL_SECS};
use helios_common::SchedulingError;

fn codec() -> StateCodec {
    StateCodec::new("test-state-secret")
}

#[test]
fn round_trip_preserves_subject_and_config() {
    let codec = codec();
    let token = codec.encode("recruiter-42", "pool-a").unwrap();
    let state = codec.decode(&token).unwrap();
    assert_eq!(state.user_id, "recruiter-42");
    assert_eq!(state.config_name, "pool-a");
}

#[test]
fn decode_is_idempotent() {
    let codec = codec();
    let token = codec.encode("recruiter-42", "pool-a").unwrap();
    let first = codec.decode(&token).unwrap();
    let second = codec.decode(&token).unwrap();
    assert_eq!(first, second);
}

#[test]
fn nonce_makes_tokens_unique() {
    let codec = codec();
    let a = codec.encode("recruiter-42", "pool-a").unwrap();
    let b = codec.encode("recruiter-42", "pool-a").unwrap();
    assert_ne!(a, b);
}

#[test]
fn valid_just_inside_ttl_expired_just_outside() {
    let codec = codec();
    let issued_at_ms = 1_700_000_000_000;
    let token = codec.encode_at("recruiter-42", "pool-a", issued_at_ms).unwrap();

    // One second before the ten-minute cutoff.
    let just_inside = issued_at_ms + (STATE_TTL_SECS - 1) * 1000;
    assert!(codec.decode_at(&token, just_inside).is_ok());

    // One second after.
    let just_outside = issued_at_ms + (STATE_TTL_SECS + 1) * 1000;
    assert!(matches!(
        codec.decode_at(&token, just_outside),
        Err(SchedulingError::InvalidState(_))
    ));
}

#[test]
fn rejects_tampered_payload() {
    let codec = codec();
    let token = codec.encode("recruiter-42", "pool-a").unwrap();
    let (payload, tag) = token.split_once('.').unwrap();

    // Flip a payload character while keeping the original tag.
    let mut chars: Vec<char> = payload.chars().collect();
    chars[4] = if chars[4] == 'A' { 'B' } else { 'A' };
    let tampered: String = chars.into_iter().collect();

    assert!(matches!(
        codec.decode(&format!("{tampered}.{tag}")),
        Err(SchedulingError::InvalidState(_))
    ));
}

#[test]
fn rejects_wrong_secret() {
    let token = codec().encode("recruiter-42", "pool-a").unwrap();
    let other = StateCodec::new("a-different-secret");
    assert!(matches!(
        other.decode(&token),
        Err(SchedulingError::InvalidState(_))
    ));
}

#[test]
fn rejects_malformed_tokens() {
    let codec = codec();
    for garbage in ["", "no-dot-here", "a.b.c", "!!!.###", "onlypayload."] {
        assert!(
            matches!(codec.decode(garbage), Err(SchedulingError::InvalidState(_))),
            "expected InvalidState for {garbage:?}"
        );
    }
}
