//! SAML 2.0 types and data structures.
//!
//! This module contains the request the service provider sends, the
//! assertion values it hands back to callers, and the protocol constants
//! both sides share.

mod assertion;
mod authn_request;
mod constants;

pub use assertion::*;
pub use authn_request::*;
pub use constants::*;
