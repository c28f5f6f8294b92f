//! SAML 2.0 Service Provider core.
//!
//! This crate covers the two security-sensitive halves of an SP integration:
//!
//! - **AuthnRequest encoding** - build a request and encode it for the
//!   HTTP-Redirect binding (raw DEFLATE, Base64, percent-encoding)
//! - **Response validation** - parse an IdP Response, verify its ECDSA P-256
//!   signature over the exclusive-canonical Assertion, check the Conditions
//!   time window and audience, and extract a typed [`Assertion`]
//!
//! HTTP transport, metadata retrieval, and request ID persistence are left to
//! the caller.
//!
//! # Architecture
//!
//! - [`request`] - AuthnRequest construction and redirect URL building
//! - [`response`] - staged Response validation
//! - [`signature`] - signature location, verification, and signing
//! - [`bindings`] - HTTP-Redirect binding encode/decode
//! - [`xml`] - namespace-aware document tree and exclusive C14N
//! - [`types`] - assertion and request data model, SAML constants
//! - [`config`] - SP configuration
//! - [`error`] - error types for SAML operations
//!
//! # Example
//!
//! ```rust,ignore
//! use saml_sp::{RequestEncoder, ResponseValidator, SamlConfig};
//!
//! let config = SamlConfig::from_file("saml-sp.toml")?;
//! let redirect = RequestEncoder::build_authn_request(&config, Some("state"))?;
//! // remember redirect.request_id, send the browser to redirect.url
//!
//! let validator = ResponseValidator::new(idp_public_key_pem, "https://sp.example.com");
//! let assertion = validator.process_response(&response_xml)?;
//! println!("{} authenticated {}", assertion.issuer, assertion.subject.name_id);
//! ```
//!
//! # SAML Specifications
//!
//! - [SAML 2.0 Core](https://docs.oasis-open.org/security/saml/v2.0/saml-core-2.0-os.pdf)
//! - [SAML 2.0 Bindings](https://docs.oasis-open.org/security/saml/v2.0/saml-bindings-2.0-os.pdf)
//! - [Exclusive XML Canonicalization](https://www.w3.org/TR/xml-exc-c14n/)
//! - [XML Signature](https://www.w3.org/TR/xmldsig-core1/)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bindings;
pub mod config;
pub mod error;
pub mod request;
pub mod response;
pub mod signature;
pub mod types;
pub mod xml;

pub use config::{IdpMetadata, SamlConfig};
pub use error::{SamlError, SamlErrorKind, SamlResult};
pub use request::{EncodedAuthnRequest, RequestEncoder};
pub use response::{process_response, validate_conditions, ResponseValidator};
pub use signature::{validate_signature, ResponseSigner};
pub use types::*;
