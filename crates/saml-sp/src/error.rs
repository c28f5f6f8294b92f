//! SAML error types.
//!
//! Every stage of request encoding and response validation fails with its own
//! variant so operators can tell which check rejected a message. At the SP
//! boundary all of them collapse into a single "authentication rejected"
//! outcome; see [`SamlError::is_authentication_rejection`].

use thiserror::Error;

/// Result type for SAML operations.
pub type SamlResult<T> = Result<T, SamlError>;

/// SAML service provider errors.
#[derive(Debug, Error)]
pub enum SamlError {
    /// The Response body is not well-formed XML.
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    /// The Response carries a non-success status code.
    #[error("response status is not success: {0}")]
    StatusNotSuccess(String),

    /// No usable Assertion element was found.
    #[error("missing assertion: {0}")]
    MissingAssertion(String),

    /// The signed content could not be brought into canonical form.
    #[error("canonicalization failed: {0}")]
    Canonicalization(String),

    /// No Signature/SignatureValue was found, or it is not valid Base64.
    #[error("signature not found: {0}")]
    SignatureLocation(String),

    /// Cryptographic verification failed, or the key or signature is malformed.
    #[error("signature verification failed")]
    SignatureVerification,

    /// A Conditions or SubjectConfirmationData timestamp is missing or unparseable.
    #[error("invalid conditions: {0}")]
    ConditionsParse(String),

    /// The current time lies outside `[NotBefore, NotOnOrAfter)`.
    #[error("assertion conditions not met: {0}")]
    ConditionsInvalid(String),

    /// The expected audience is absent from the AudienceRestriction set.
    #[error("audience mismatch: expected {expected}")]
    AudienceMismatch {
        /// The audience the caller expected.
        expected: String,
    },

    /// Issuer or NameID is empty after extraction.
    #[error("missing critical field: {0}")]
    CriticalFieldMissing(&'static str),

    /// Compression or URL construction failed while encoding a request.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The configured binding is not supported by the requested operation.
    #[error("unsupported binding: {0}")]
    UnsupportedBinding(String),

    /// Base64 decoding error.
    #[error("base64 decode error: {0}")]
    Base64Decode(String),

    /// Deflate decompression error.
    #[error("deflate error: {0}")]
    Deflate(String),

    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Fieldless discriminant of [`SamlError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamlErrorKind {
    /// See [`SamlError::XmlParse`].
    Parse,
    /// See [`SamlError::StatusNotSuccess`].
    StatusNotSuccess,
    /// See [`SamlError::MissingAssertion`].
    MissingAssertion,
    /// See [`SamlError::Canonicalization`].
    Canonicalization,
    /// See [`SamlError::SignatureLocation`].
    SignatureLocation,
    /// See [`SamlError::SignatureVerification`].
    SignatureVerification,
    /// See [`SamlError::ConditionsParse`].
    ConditionsParse,
    /// See [`SamlError::ConditionsInvalid`].
    ConditionsInvalid,
    /// See [`SamlError::AudienceMismatch`].
    AudienceMismatch,
    /// See [`SamlError::CriticalFieldMissing`].
    CriticalFieldMissing,
    /// See [`SamlError::Encoding`].
    Encoding,
    /// See [`SamlError::UnsupportedBinding`].
    UnsupportedBinding,
    /// See [`SamlError::Base64Decode`].
    Base64Decode,
    /// See [`SamlError::Deflate`].
    Deflate,
    /// See [`SamlError::Config`].
    Config,
}

impl SamlError {
    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> SamlErrorKind {
        match self {
            Self::XmlParse(_) => SamlErrorKind::Parse,
            Self::StatusNotSuccess(_) => SamlErrorKind::StatusNotSuccess,
            Self::MissingAssertion(_) => SamlErrorKind::MissingAssertion,
            Self::Canonicalization(_) => SamlErrorKind::Canonicalization,
            Self::SignatureLocation(_) => SamlErrorKind::SignatureLocation,
            Self::SignatureVerification => SamlErrorKind::SignatureVerification,
            Self::ConditionsParse(_) => SamlErrorKind::ConditionsParse,
            Self::ConditionsInvalid(_) => SamlErrorKind::ConditionsInvalid,
            Self::AudienceMismatch { .. } => SamlErrorKind::AudienceMismatch,
            Self::CriticalFieldMissing(_) => SamlErrorKind::CriticalFieldMissing,
            Self::Encoding(_) => SamlErrorKind::Encoding,
            Self::UnsupportedBinding(_) => SamlErrorKind::UnsupportedBinding,
            Self::Base64Decode(_) => SamlErrorKind::Base64Decode,
            Self::Deflate(_) => SamlErrorKind::Deflate,
            Self::Config(_) => SamlErrorKind::Config,
        }
    }

    /// Returns true if this error rejects an incoming Response.
    ///
    /// End users should only ever see "authentication rejected" for these;
    /// the specific kind is for operator diagnostics.
    #[must_use]
    pub const fn is_authentication_rejection(&self) -> bool {
        matches!(
            self,
            Self::XmlParse(_)
                | Self::StatusNotSuccess(_)
                | Self::MissingAssertion(_)
                | Self::Canonicalization(_)
                | Self::SignatureLocation(_)
                | Self::SignatureVerification
                | Self::ConditionsParse(_)
                | Self::ConditionsInvalid(_)
                | Self::AudienceMismatch { .. }
                | Self::CriticalFieldMissing(_)
        )
    }

    /// Returns the SAML status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> &'static str {
        match self {
            Self::XmlParse(_)
            | Self::MissingAssertion(_)
            | Self::Base64Decode(_)
            | Self::Deflate(_) => "urn:oasis:names:tc:SAML:2.0:status:Requester",
            Self::SignatureLocation(_)
            | Self::SignatureVerification
            | Self::ConditionsParse(_)
            | Self::ConditionsInvalid(_)
            | Self::AudienceMismatch { .. }
            | Self::CriticalFieldMissing(_)
            | Self::StatusNotSuccess(_) => "urn:oasis:names:tc:SAML:2.0:status:AuthnFailed",
            Self::UnsupportedBinding(_) => "urn:oasis:names:tc:SAML:2.0:status:UnsupportedBinding",
            Self::Canonicalization(_) | Self::Encoding(_) | Self::Config(_) => {
                "urn:oasis:names:tc:SAML:2.0:status:Responder"
            }
        }
    }
}

impl From<quick_xml::Error> for SamlError {
    fn from(err: quick_xml::Error) -> Self {
        Self::XmlParse(err.to_string())
    }
}

impl From<base64::DecodeError> for SamlError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Base64Decode(err.to_string())
    }
}

impl From<url::ParseError> for SamlError {
    fn from(err: url::ParseError) -> Self {
        Self::Encoding(format!("invalid URL: {err}"))
    }
}

impl From<std::io::Error> for SamlError {
    fn from(err: std::io::Error) -> Self {
        Self::Deflate(err.to_string())
    }
}
