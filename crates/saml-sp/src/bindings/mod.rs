//! SAML bindings implementation.
//!
//! Only the HTTP-Redirect binding is implemented: messages are raw-DEFLATE
//! compressed, Base64-encoded, and percent-encoded into a query parameter.
//!
//! # Usage
//!
//! ```rust,ignore
//! use saml_sp::bindings::HttpRedirectBinding;
//!
//! let url = HttpRedirectBinding::encode_request(&request_xml, "https://idp.example.com/sso", Some("relay_state"))?;
//! let decoded = HttpRedirectBinding::decode_url(url.as_str())?;
//! ```

mod redirect;

pub use redirect::*;

/// SAML message type for binding operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamlMessageType {
    /// AuthnRequest message.
    Request,
    /// Response message.
    Response,
}

impl SamlMessageType {
    /// Returns the query parameter name for this message type.
    #[must_use]
    pub const fn param_name(&self) -> &'static str {
        match self {
            Self::Request => "SAMLRequest",
            Self::Response => "SAMLResponse",
        }
    }
}

/// Decoded SAML binding message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    /// The decoded XML message.
    pub xml: String,
    /// The message type (request or response).
    pub message_type: SamlMessageType,
    /// The RelayState if present.
    pub relay_state: Option<String>,
}
