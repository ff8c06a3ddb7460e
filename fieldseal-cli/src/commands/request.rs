//! Client-side signing and sealing, and server-side checking of requests.

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use clap::Args;
use fieldseal_auth::guard::seal_fields;
use fieldseal_auth::signature::{SigningInput, DEVICE_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use fieldseal_auth::{GuardContext, GuardOutcome, InboundRequest, RequestGuard, SignatureEngine};
use http::header::CONTENT_TYPE;
use http::Method;
use serde_json::Value;

use crate::utils::{format_timestamp_millis, now_millis, read_body};
use crate::Runtime;

/// Request components covered by the signature.
#[derive(Args)]
pub struct RequestArgs {
    /// HTTP method
    #[arg(long, default_value = "POST")]
    pub method: String,

    /// Request path as sent (context prefix and query allowed)
    #[arg(long)]
    pub path: String,

    /// Device fingerprint (X-Device-ID)
    #[arg(long)]
    pub device: String,

    /// Timestamp in milliseconds (default: now)
    #[arg(long)]
    pub timestamp: Option<u64>,

    /// Request body, or `-` to read stdin
    #[arg(long)]
    pub body: Option<String>,

    /// Content type of the body
    #[arg(long, default_value = "application/json")]
    pub content_type: String,
}

impl RequestArgs {
    fn body(&self) -> Result<Option<String>> {
        self.body.as_deref().map(read_body).transpose()
    }
}

pub fn cmd_sign(runtime: &Runtime, args: &RequestArgs) -> Result<()> {
    let engine = SignatureEngine::new(runtime.secret.clone(), &runtime.config);
    let body = args.body()?;
    let input = SigningInput {
        method: &args.method,
        path: &args.path,
        body: body.as_deref().map(str::as_bytes),
        timestamp: args.timestamp.unwrap_or_else(now_millis),
        device: &args.device,
    };
    let headers = engine.sign_headers(&input);

    if runtime.json {
        let out = serde_json::json!({
            "signing_string": engine.signing_string(&input),
            "headers": {
                TIMESTAMP_HEADER: headers.timestamp.to_string(),
                SIGNATURE_HEADER: headers.signature,
                DEVICE_HEADER: headers.device,
            },
        });
        println!("{}", serde_json::to_string(&out)?);
    } else {
        tracing::debug!(signing_string = %engine.signing_string(&input), "signed");
        for (name, value) in headers.to_pairs() {
            println!("{}: {}", name, value);
        }
    }
    Ok(())
}

pub fn cmd_seal(
    runtime: &Runtime,
    device: &str,
    timestamp: Option<u64>,
    fields: &[String],
    body: &str,
) -> Result<()> {
    let engine = SignatureEngine::new(runtime.secret.clone(), &runtime.config);
    let body: Value = serde_json::from_str(&read_body(body)?).context("body is not valid JSON")?;
    let timestamp = timestamp.unwrap_or_else(now_millis);
    let names: Vec<&str> = fields.iter().map(String::as_str).collect();

    let sealed = seal_fields(&engine, body, &names, timestamp, device)
        .context("body must be a JSON object")?;
    if runtime.json {
        println!("{}", serde_json::to_string(&sealed)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&sealed)?);
    }
    Ok(())
}

pub fn cmd_check(
    runtime: &Runtime,
    args: &RequestArgs,
    signature: &str,
    now: Option<u64>,
) -> Result<()> {
    let guard = RequestGuard::new(runtime.secret.clone(), &runtime.config);
    let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid method {:?}", args.method))?;
    let timestamp = args.timestamp.unwrap_or_else(now_millis);
    let now = now.unwrap_or_else(now_millis);

    let request = InboundRequest::new(method, args.path.clone())
        .with_header(CONTENT_TYPE.as_str(), &args.content_type)
        .with_header(TIMESTAMP_HEADER, &timestamp.to_string())
        .with_header(SIGNATURE_HEADER, signature)
        .with_header(DEVICE_HEADER, &args.device)
        .with_body(Bytes::from(args.body()?.unwrap_or_default()));

    let guarded = guard.process(GuardContext::fresh(), &request, now);
    match &guarded.outcome {
        GuardOutcome::PassThrough => {
            if runtime.json {
                println!("{}", serde_json::json!({ "outcome": "forward" }));
            } else {
                println!("Forward: body unchanged");
                println!("Checked at: {}", format_timestamp_millis(now));
            }
        }
        GuardOutcome::Decrypted(body) => {
            let body: Value = serde_json::from_slice(body).context("decrypted body is not JSON")?;
            if runtime.json {
                println!("{}", serde_json::json!({ "outcome": "forward", "body": body }));
            } else {
                println!("Forward: decrypted body");
                println!("{}", serde_json::to_string_pretty(&body)?);
            }
        }
        GuardOutcome::Rejected(rejection) => {
            println!("{}", rejection.to_json());
            bail!("request rejected with status {}", rejection.code);
        }
    }
    Ok(())
}
