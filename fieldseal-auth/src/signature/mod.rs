//! Canonical request signing and verification.

mod canonical;
mod engine;
mod error;
mod headers;
mod mac;

pub use canonical::{
    build_signing_string, canonical_body, canonical_json, relative_path, SigningInput, DELIMITER,
};
pub use engine::{KeyStrategy, SignatureEngine};
pub use error::SignatureError;
pub use headers::{
    device_from_headers, SignedHeaders, CLIENT_TYPE_HEADER, DEVICE_HEADER, SIGNATURE_HEADER,
    TIMESTAMP_HEADER,
};
pub use mac::{decode_signature, mac_base64, verify_mac};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProtocolConfig;
    use crate::secret::BaseSecret;
    use std::sync::Arc;

    const T: u64 = 1_700_000_000_000;
    const WINDOW: u64 = 180_000;
    const TOLERANCE: u64 = 900_000;

    fn engine() -> SignatureEngine {
        let secret = Arc::new(BaseSecret::new("signature-test-secret").unwrap());
        SignatureEngine::new(secret, &ProtocolConfig::default())
    }

    fn login_input(timestamp: u64) -> SigningInput<'static> {
        SigningInput {
            method: "POST",
            path: "/users/login",
            body: Some(br#"{"username":"a"}"#),
            timestamp,
            device: "dev-123",
        }
    }

    #[test]
    fn test_sign_then_verify() {
        let engine = engine();
        let input = login_input(T);
        let signature = engine.sign(&input);
        assert!(engine.verify(&input, &signature, T));
        assert_eq!(engine.check(&input, &signature, T), Ok(KeyStrategy::OwnWindow));
    }

    #[test]
    fn test_signature_is_hmac_of_reference_string() {
        let engine = engine();
        let key = engine.deriver().derive_key(T, "dev-123");
        let expected = mac_base64(
            &key,
            br#"POST|/users/login|{"username":"a"}|1700000000000|dev-123"#,
        );
        assert_eq!(engine.sign(&login_input(T)), expected);
    }

    #[test]
    fn test_other_window_key_produces_different_mac() {
        let engine = engine();
        let message = engine.signing_string(&login_input(T));
        let own = mac_base64(&engine.deriver().derive_key(T, "dev-123"), message.as_bytes());
        let other = mac_base64(
            &engine.deriver().derive_key(T + 200_000, "dev-123"),
            message.as_bytes(),
        );
        assert_ne!(own, other);
    }

    #[test]
    fn test_tampered_method_path_body_rejected() {
        let engine = engine();
        let input = login_input(T);
        let signature = engine.sign(&input);

        let method = SigningInput { method: "PUT", ..input };
        let path = SigningInput { path: "/users/logout", ..input };
        let body = SigningInput { body: Some(br#"{"username":"b"}"#), ..input };
        let device = SigningInput { device: "dev-124", ..input };

        for tampered in [method, path, body, device] {
            assert_eq!(
                engine.check(&tampered, &signature, T),
                Err(SignatureError::InvalidSignature)
            );
        }
    }

    #[test]
    fn test_method_case_does_not_matter() {
        let engine = engine();
        let signature = engine.sign(&login_input(T));
        let lower = SigningInput { method: "post", ..login_input(T) };
        assert!(engine.verify(&lower, &signature, T));
    }

    #[test]
    fn test_reformatted_json_body_still_verifies() {
        let engine = engine();
        let signature = engine.sign(&login_input(T));
        let spaced = SigningInput {
            body: Some(b"{ \"username\" : \"a\" }"),
            ..login_input(T)
        };
        assert!(engine.verify(&spaced, &signature, T));
    }

    #[test]
    fn test_checked_late_within_window() {
        let engine = engine();
        let input = login_input(T);
        let signature = engine.sign(&input);
        assert!(engine.verify(&input, &signature, T + WINDOW - 1));
    }

    #[test]
    fn test_tolerance_boundaries() {
        let engine = engine();
        let input = login_input(T);
        let signature = engine.sign(&input);

        assert!(engine.verify(&input, &signature, T + TOLERANCE));
        assert!(engine.verify(&input, &signature, T - TOLERANCE));
        assert_eq!(
            engine.check(&input, &signature, T + TOLERANCE + 1),
            Err(SignatureError::StaleRequest)
        );
        assert_eq!(
            engine.check(&input, &signature, T - TOLERANCE - 1),
            Err(SignatureError::StaleRequest)
        );
    }

    #[test]
    fn test_previous_window_fallback() {
        // Client derived its key one window earlier than its own timestamp
        // suggests, e.g. it crossed a boundary between deriving and stamping.
        let engine = engine();
        let input = login_input(T);
        let message = engine.signing_string(&input);
        let early_key = engine.deriver().derive_key(T - WINDOW, "dev-123");
        let signature = mac_base64(&early_key, message.as_bytes());

        assert_eq!(engine.check(&input, &signature, T), Ok(KeyStrategy::PreviousWindow));
    }

    #[test]
    fn test_next_window_fallback() {
        let engine = engine();
        let input = login_input(T);
        let message = engine.signing_string(&input);
        let late_key = engine.deriver().derive_key(T + WINDOW, "dev-123");
        let signature = mac_base64(&late_key, message.as_bytes());

        assert_eq!(engine.check(&input, &signature, T), Ok(KeyStrategy::NextWindow));
    }

    #[test]
    fn test_adjacent_window_must_itself_be_within_tolerance() {
        let engine = engine();
        let input = login_input(T);
        let message = engine.signing_string(&input);
        let late_key = engine.deriver().derive_key(T + WINDOW, "dev-123");
        let signature = mac_base64(&late_key, message.as_bytes());

        // Checked from T + TOLERANCE: T + WINDOW is in tolerance, T - WINDOW is not.
        assert_eq!(
            engine.check(&input, &signature, T + TOLERANCE),
            Ok(KeyStrategy::NextWindow)
        );

        let early_key = engine.deriver().derive_key(T - WINDOW, "dev-123");
        let early_signature = mac_base64(&early_key, message.as_bytes());
        assert_eq!(
            engine.check(&input, &early_signature, T + TOLERANCE),
            Err(SignatureError::InvalidSignature)
        );
    }

    #[test]
    fn test_two_windows_away_rejected() {
        let engine = engine();
        let input = login_input(T);
        let message = engine.signing_string(&input);
        let far_key = engine.deriver().derive_key(T + 2 * WINDOW, "dev-123");
        let signature = mac_base64(&far_key, message.as_bytes());
        assert_eq!(
            engine.check(&input, &signature, T),
            Err(SignatureError::InvalidSignature)
        );
    }

    #[test]
    fn test_garbage_signature_rejected() {
        let engine = engine();
        let input = login_input(T);
        assert_eq!(
            engine.check(&input, "%%%not-base64%%%", T),
            Err(SignatureError::InvalidSignature)
        );
        assert_eq!(engine.check(&input, "AAAA", T), Err(SignatureError::InvalidSignature));
    }

    #[test]
    fn test_stale_checked_before_signature() {
        let engine = engine();
        let input = login_input(T);
        assert_eq!(
            engine.check(&input, "%%%", T + 10 * TOLERANCE),
            Err(SignatureError::StaleRequest)
        );
    }

    #[test]
    fn test_context_prefix_makes_signature_environment_agnostic() {
        let secret = Arc::new(BaseSecret::new("signature-test-secret").unwrap());
        let prefixed = SignatureEngine::new(
            secret,
            &ProtocolConfig {
                context_prefix: "/api".to_string(),
                ..ProtocolConfig::default()
            },
        );
        let plain = engine();

        let signature = plain.sign(&login_input(T));
        let behind_prefix = SigningInput {
            path: "/api/users/login",
            ..login_input(T)
        };
        assert!(prefixed.verify(&behind_prefix, &signature, T));
    }

    #[test]
    fn test_sign_headers() {
        let engine = engine();
        let headers = engine.sign_headers(&login_input(T));
        assert_eq!(headers.timestamp, T);
        assert_eq!(headers.device, "dev-123");
        assert_eq!(headers.signature, engine.sign(&login_input(T)));
    }
}
