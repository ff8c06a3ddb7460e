//! CLI commands.

pub mod keys;
pub mod request;
pub mod token;
