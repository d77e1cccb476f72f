//! Client credentials and bearer-token models.

pub mod credentials;
pub mod token;

pub use credentials::*;
pub use token::{cached::*, secret::*};
