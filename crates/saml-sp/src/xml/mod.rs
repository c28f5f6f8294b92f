//! XML document handling.
//!
//! - [`Document`] parses a message into a namespace-aware tree
//! - [`c14n`] renders a subtree in exclusive canonical form for signing
//! - [`escape`] holds the escaping rules shared by rendering and canonicalization

pub mod c14n;
mod document;
pub mod escape;

pub use document::*;
