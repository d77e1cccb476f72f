//! Cached bearer tokens and the redacting secret wrapper they carry.

pub mod cached;
pub mod secret;
