//! Session token commands.
//!
//! The CLI has no denylist store, so validation here only sees revocations
//! made within the same invocation.

use anyhow::{bail, Result};
use fieldseal_auth::token::{bearer_token, denylist_key, TokenForm};
use fieldseal_auth::{InMemoryDenylist, TokenClaims, TokenCodec};

use crate::utils::format_timestamp_secs;
use crate::Runtime;

fn codec(runtime: &Runtime) -> TokenCodec {
    TokenCodec::new(runtime.secret.clone(), &runtime.config)
}

/// Accept either a bare token or a full `Bearer <token>` header value.
fn token_arg(raw: &str) -> &str {
    bearer_token(raw).unwrap_or(raw.trim())
}

fn print_claims(claims: &TokenClaims) {
    println!("Subject: {}", claims.sub);
    println!("Issued: {}", format_timestamp_secs(claims.iat));
    println!("Expires: {}", format_timestamp_secs(claims.exp));
    println!("Device: {}", claims.device.as_deref().unwrap_or("(unbound)"));
}

pub fn cmd_issue(runtime: &Runtime, subject: &str, device: Option<&str>) -> Result<()> {
    let token = codec(runtime).issue(subject, device);
    if runtime.json {
        let out = serde_json::json!({
            "token": token,
            "expires_in": runtime.config.token_ttl.as_secs(),
        });
        println!("{}", serde_json::to_string(&out)?);
    } else {
        println!("{}", token);
    }
    Ok(())
}

pub fn cmd_validate(runtime: &Runtime, raw: &str, device: Option<&str>) -> Result<()> {
    let token = token_arg(raw);
    let denylist = InMemoryDenylist::new();
    match codec(runtime).validate(token, device, &denylist) {
        Ok(claims) => {
            if runtime.json {
                println!("{}", serde_json::to_string(&claims)?);
            } else {
                println!("Valid");
                print_claims(&claims);
            }
            Ok(())
        }
        Err(err) => {
            tracing::debug!(reason = %err, "validation failed");
            bail!("{} ({})", err.public_message(), err)
        }
    }
}

pub fn cmd_inspect(runtime: &Runtime, raw: &str) -> Result<()> {
    let (claims, form) = codec(runtime).open(token_arg(raw))?;
    let form = match form {
        TokenForm::Wrapped => "wrapped",
        TokenForm::Plain => "plain",
    };
    if runtime.json {
        let out = serde_json::json!({ "form": form, "claims": claims });
        println!("{}", serde_json::to_string(&out)?);
    } else {
        println!("Form: {}", form);
        print_claims(&claims);
        println!("Type: {} v{}", claims.token_type, claims.version);
    }
    Ok(())
}

pub fn cmd_revoke(runtime: &Runtime, raw: &str) -> Result<()> {
    let token = token_arg(raw);
    let denylist = InMemoryDenylist::new();
    codec(runtime).revoke(token, &denylist)?;

    let Some(subject) = denylist.subject(token) else {
        println!("Token already expired; nothing to revoke");
        return Ok(());
    };
    let (claims, _) = codec(runtime).open(token)?;
    let ttl = claims.remaining_secs(chrono::Utc::now().timestamp());

    if runtime.json {
        let out = serde_json::json!({
            "key": denylist_key(token),
            "value": subject,
            "ttl_secs": ttl,
        });
        println!("{}", serde_json::to_string(&out)?);
    } else {
        println!("Key: {}", denylist_key(token));
        println!("Value: {}", subject);
        println!("TTL: {}s", ttl);
    }
    Ok(())
}
