//! Property-based tests for protocol invariants.
//!
//! - Sign/verify round trips for any request shape within the window
//! - Any change to a signed component is rejected
//! - Field encryption round trips for any UTF-8 plaintext
//! - Key derivation is deterministic and window-scoped
//! - Tokens round trip through issue and validate

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{Map, Value};

use crate::cipher::{decrypt_field, encrypt_field_with_iv};
use crate::config::ProtocolConfig;
use crate::derive::{time_window, KeyDeriver};
use crate::secret::BaseSecret;
use crate::signature::{SignatureEngine, SigningInput};
use crate::token::{InMemoryDenylist, TokenCodec};

const WINDOW: u64 = 180_000;
const TOLERANCE: u64 = 900_000;

fn secret() -> Arc<BaseSecret> {
    Arc::new(BaseSecret::new("proptest-secret").unwrap())
}

fn engine() -> SignatureEngine {
    SignatureEngine::new(secret(), &ProtocolConfig::default())
}

// ==================== Signature Property Tests ====================

proptest! {
    /// A signature verifies at any server time within tolerance of its timestamp.
    #[test]
    fn sign_then_verify(
        method in prop::sample::select(vec!["POST", "PUT", "PATCH"]),
        path in "/[a-z]{1,12}(/[a-z0-9]{1,8}){0,3}",
        name in "[a-z]{1,10}",
        value in "[ -~]{0,40}",
        ts in 1_000_000_000_000u64..2_000_000_000_000,
        skew in 0u64..=TOLERANCE,
        late in any::<bool>(),
        device in "[A-Za-z0-9-]{1,64}",
    ) {
        let engine = engine();
        let mut object = Map::new();
        object.insert(name, Value::String(value));
        let body = serde_json::to_vec(&object).unwrap();
        let input = SigningInput { method, path: &path, body: Some(&body), timestamp: ts, device: &device };
        let signature = engine.sign(&input);
        let now = if late { ts + skew } else { ts - skew };
        prop_assert!(engine.verify(&input, &signature, now));
    }

    /// Changing the device or timestamp invalidates the signature.
    #[test]
    fn tampering_rejected(
        ts in 1_000_000_000_000u64..2_000_000_000_000,
        shift in 1u64..1000,
        device in "[a-z0-9]{4,20}",
        other in "[a-z0-9]{4,20}",
    ) {
        prop_assume!(device != other);
        let engine = engine();
        let input = SigningInput {
            method: "POST",
            path: "/orders",
            body: Some(br#"{"qty":1}"#),
            timestamp: ts,
            device: &device,
        };
        let signature = engine.sign(&input);

        let moved = SigningInput { timestamp: ts + shift, ..input };
        let rebound = SigningInput { device: &other, ..input };
        prop_assert!(!engine.verify(&moved, &signature, ts));
        prop_assert!(!engine.verify(&rebound, &signature, ts));
    }

    /// Anything beyond the tolerance is rejected regardless of signature.
    #[test]
    fn stale_always_rejected(
        ts in 1_000_000_000_000u64..2_000_000_000_000,
        excess in 1u64..10_000_000,
    ) {
        let engine = engine();
        let input = SigningInput { method: "POST", path: "/", body: None, timestamp: ts, device: "d" };
        let signature = engine.sign(&input);
        prop_assert!(!engine.verify(&input, &signature, ts + TOLERANCE + excess));
    }
}

// ==================== Cipher Property Tests ====================

proptest! {
    /// Any UTF-8 plaintext survives encryption and decryption.
    #[test]
    fn field_round_trip(
        plaintext in "\\PC{0,200}",
        iv in any::<[u8; 16]>(),
        ts in 0u64..2_000_000_000_000,
        device in "[a-z0-9]{1,40}",
    ) {
        let key = KeyDeriver::new(secret(), WINDOW).derive_key(ts, &device);
        let field = encrypt_field_with_iv(&plaintext, &key, &iv);
        prop_assert_eq!(decrypt_field(&field.ciphertext, &field.iv, &key).unwrap(), plaintext);
    }
}

// ==================== Derivation Property Tests ====================

proptest! {
    /// Keys are equal exactly within one window for the same device.
    #[test]
    fn derivation_window_scoped(
        ts in 0u64..2_000_000_000_000,
        offset in 0u64..WINDOW,
        device in "[a-z0-9]{1,40}",
    ) {
        let deriver = KeyDeriver::new(secret(), WINDOW);
        let start = time_window(ts, WINDOW) * WINDOW;
        prop_assert!(deriver.derive_key(start, &device) == deriver.derive_key(start + offset, &device));
        prop_assert!(deriver.derive_key(start, &device) != deriver.derive_key(start + WINDOW, &device));
    }
}

// ==================== Token Property Tests ====================

proptest! {
    /// validate(issue(subject, device)) recovers the subject.
    #[test]
    fn token_round_trip(
        subject in "[a-zA-Z0-9_]{1,32}",
        device in proptest::option::of("[a-z0-9-]{1,40}"),
        now in 1_000_000_000i64..2_000_000_000,
        elapsed in 0i64..86_400,
    ) {
        let codec = TokenCodec::new(secret(), &ProtocolConfig::default());
        let denylist = InMemoryDenylist::new();
        let token = codec.issue_at(&subject, device.as_deref(), now);
        let claims = codec.validate_at(&token, device.as_deref(), &denylist, now + elapsed).unwrap();
        prop_assert_eq!(claims.sub, subject);
    }
}
