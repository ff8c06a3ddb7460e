//! Opaque session tokens bound to a device fingerprint.

mod claims;
mod codec;
mod denylist;
mod error;
mod wrap;

pub use claims::{TokenClaims, ACCESS_TOKEN_TYPE, TOKEN_VERSION};
pub use codec::{bearer_from_headers, bearer_token, TokenCodec, TokenForm};
pub use denylist::{denylist_key, Denylist, InMemoryDenylist, DENYLIST_PREFIX};
pub use error::{TokenError, PUBLIC_TOKEN_ERROR};
