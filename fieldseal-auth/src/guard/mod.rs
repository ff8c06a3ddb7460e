//! Request guard: signature verification and field decryption before dispatch.

mod envelope;
mod error;
mod pipeline;
mod request;

pub use envelope::{
    envelope_signing_string, has_envelope, open_fields, seal_fields, CryptoMeta, CRYPTO_KEY,
};
pub use error::{GuardError, Rejection};
pub use pipeline::RequestGuard;
pub use request::{GuardContext, GuardOutcome, Guarded, InboundRequest};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProtocolConfig;
    use crate::secret::BaseSecret;
    use crate::signature::{SigningInput, DEVICE_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER};
    use http::Method;
    use serde_json::{json, Value};
    use std::sync::Arc;

    const T: u64 = 1_700_000_000_000;

    fn guard() -> RequestGuard {
        let secret = Arc::new(BaseSecret::new("guard-test-secret").unwrap());
        RequestGuard::new(secret, &ProtocolConfig::default())
    }

    fn signed_request(guard: &RequestGuard, method: Method, path: &str, body: &[u8], device: &str) -> InboundRequest {
        let signature = guard.engine().sign(&SigningInput {
            method: method.as_str(),
            path,
            body: Some(body),
            timestamp: T,
            device,
        });
        InboundRequest::new(method, path)
            .with_json(body.to_vec())
            .with_header(TIMESTAMP_HEADER, &T.to_string())
            .with_header(SIGNATURE_HEADER, &signature)
            .with_header(DEVICE_HEADER, device)
    }

    #[test]
    fn test_get_passes_through() {
        let guard = guard();
        let req = InboundRequest::new(Method::GET, "/movies")
            .with_header(TIMESTAMP_HEADER, "garbage")
            .with_header(SIGNATURE_HEADER, "x")
            .with_header(DEVICE_HEADER, "d");
        let guarded = guard.process(GuardContext::fresh(), &req, T);
        assert_eq!(guarded.outcome, GuardOutcome::PassThrough);
        assert!(guarded.context.is_processed());
    }

    #[test]
    fn test_non_json_passes_through() {
        let guard = guard();
        let req = InboundRequest::new(Method::POST, "/upload")
            .with_header("content-type", "multipart/form-data")
            .with_header(SIGNATURE_HEADER, "bogus")
            .with_header(TIMESTAMP_HEADER, "1")
            .with_header(DEVICE_HEADER, "d")
            .with_body("--boundary--");
        assert_eq!(guard.process(GuardContext::fresh(), &req, T).outcome, GuardOutcome::PassThrough);
    }

    #[test]
    fn test_empty_body_passes_through() {
        let guard = guard();
        let req = InboundRequest::new(Method::POST, "/ping")
            .with_json(Vec::<u8>::new())
            .with_header(SIGNATURE_HEADER, "bogus")
            .with_header(TIMESTAMP_HEADER, "1")
            .with_header(DEVICE_HEADER, "d");
        assert_eq!(guard.process(GuardContext::fresh(), &req, T).outcome, GuardOutcome::PassThrough);
    }

    #[test]
    fn test_unsigned_request_passes_through() {
        let guard = guard();
        let req = InboundRequest::new(Method::POST, "/users/login").with_json(r#"{"username":"a"}"#);
        assert_eq!(guard.process(GuardContext::fresh(), &req, T).outcome, GuardOutcome::PassThrough);
    }

    #[test]
    fn test_valid_signature_without_envelope_passes_through() {
        let guard = guard();
        let req = signed_request(&guard, Method::POST, "/users/login", br#"{"username":"a"}"#, "dev-123");
        assert_eq!(guard.process(GuardContext::fresh(), &req, T).outcome, GuardOutcome::PassThrough);
    }

    #[test]
    fn test_invalid_signature_is_401() {
        let guard = guard();
        let req = signed_request(&guard, Method::POST, "/users/login", br#"{"username":"a"}"#, "dev-123")
            .with_header(SIGNATURE_HEADER, "AAAAAAAAAAAAAAAAAAAAAA==");
        match guard.process(GuardContext::fresh(), &req, T).outcome {
            GuardOutcome::Rejected(rejection) => assert_eq!(rejection.code, 401),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_stale_request_is_401() {
        let guard = guard();
        let req = signed_request(&guard, Method::PUT, "/orders/1", br#"{"qty":2}"#, "dev-123");
        match guard.process(GuardContext::fresh(), &req, T + 16 * 60 * 1000).outcome {
            GuardOutcome::Rejected(rejection) => assert_eq!(rejection.code, 401),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_timestamp_is_400() {
        let guard = guard();
        let req = signed_request(&guard, Method::PATCH, "/orders/1", br#"{"qty":2}"#, "dev-123")
            .with_header(TIMESTAMP_HEADER, "yesterday");
        match guard.process(GuardContext::fresh(), &req, T).outcome {
            GuardOutcome::Rejected(rejection) => {
                assert_eq!(rejection.code, 400);
                assert_eq!(rejection.message, "Invalid timestamp");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_sealed_body_is_decrypted() {
        let guard = guard();
        let body = seal_fields(
            guard.engine(),
            json!({ "username": "alice", "password": "hunter2" }),
            &["password"],
            T,
            "dev-123",
        )
        .unwrap();
        let raw = serde_json::to_vec(&body).unwrap();
        let req = signed_request(&guard, Method::POST, "/users/login", &raw, "dev-123");

        let forwarded = match guard.process(GuardContext::fresh(), &req, T).outcome {
            GuardOutcome::Decrypted(body) => body,
            other => panic!("expected decrypted body, got {other:?}"),
        };
        let forwarded: Value = serde_json::from_slice(&forwarded).unwrap();
        assert_eq!(forwarded, json!({ "username": "alice", "password": "hunter2" }));
    }

    #[test]
    fn test_sealed_body_with_bad_field_is_400() {
        let guard = guard();
        let mut body = seal_fields(guard.engine(), json!({ "password": "pw" }), &["password"], T, "dev-123").unwrap();
        body["password"]["iv"] = json!("AAAA");
        let raw = serde_json::to_vec(&body).unwrap();
        let req = signed_request(&guard, Method::POST, "/users/login", &raw, "dev-123");

        match guard.process(GuardContext::fresh(), &req, T).outcome {
            GuardOutcome::Rejected(rejection) => assert_eq!(rejection.code, 400),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_processed_context_short_circuits() {
        let guard = guard();
        let req = signed_request(&guard, Method::POST, "/users/login", br#"{"username":"a"}"#, "dev-123")
            .with_header(SIGNATURE_HEADER, "AAAA");
        let first = guard.process(GuardContext::fresh(), &req, T);
        assert!(first.outcome.is_rejected());

        let second = guard.process(first.context, &req, T);
        assert_eq!(second.outcome, GuardOutcome::PassThrough);
        assert!(second.context.is_processed());
    }

    #[test]
    fn test_context_prefix_request() {
        let secret = Arc::new(BaseSecret::new("guard-test-secret").unwrap());
        let config = ProtocolConfig {
            context_prefix: "/api".to_string(),
            ..ProtocolConfig::default()
        };
        let prefixed = RequestGuard::new(secret, &config);

        // Client signs the relative path; server sees the prefixed one.
        let signature = guard().engine().sign(&SigningInput {
            method: "POST",
            path: "/users/login",
            body: Some(br#"{"username":"a"}"#),
            timestamp: T,
            device: "dev-123",
        });
        let req = InboundRequest::new(Method::POST, "/api/users/login")
            .with_json(r#"{"username":"a"}"#)
            .with_header(TIMESTAMP_HEADER, &T.to_string())
            .with_header(SIGNATURE_HEADER, &signature)
            .with_header(DEVICE_HEADER, "dev-123");
        assert_eq!(prefixed.process(GuardContext::fresh(), &req, T).outcome, GuardOutcome::PassThrough);
    }
}
