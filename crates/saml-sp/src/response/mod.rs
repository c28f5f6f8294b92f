//! SAML Response validation.
//!
//! A Response passes through a fixed sequence of stages. The first failing
//! stage ends processing with its own error kind:
//!
//! 1. parse the document
//! 2. check the top-level `StatusCode`
//! 3. locate the single `saml:Assertion`
//! 4. canonicalize the assertion
//! 5. locate the signature (Response level first, then Assertion level)
//! 6. verify the signature against the trusted key
//! 7. extract and check `Conditions` (time window, then audience)
//! 8. extract the assertion fields and require `Issuer` and `NameID`
//!
//! The input is the Response XML text. Base64-decoding the POSTed
//! `SAMLResponse` form field is the caller's job.

mod conditions;
mod extract;

pub use conditions::validate_conditions;

use chrono::{DateTime, Duration, Utc};

use crate::error::{SamlError, SamlResult};
use crate::signature::{self, validate_signature};
use crate::types::{status_codes, Assertion, SAMLP_NS, SAML_NS};
use crate::xml::{Document, Element};

/// Validates IdP Responses against a trusted key and an expected audience.
///
/// Holds only immutable configuration, so one instance can serve
/// concurrent calls.
#[derive(Debug, Clone)]
pub struct ResponseValidator {
    public_key_pem: String,
    expected_audience: String,
    clock_skew: Duration,
}

impl ResponseValidator {
    /// Creates a validator.
    ///
    /// `public_key_pem` is the IdP's P-256 verification key as a
    /// SubjectPublicKeyInfo PEM; `expected_audience` is this SP's entity ID.
    pub fn new(public_key_pem: impl Into<String>, expected_audience: impl Into<String>) -> Self {
        Self {
            public_key_pem: public_key_pem.into(),
            expected_audience: expected_audience.into(),
            clock_skew: Duration::zero(),
        }
    }

    /// Allows `skew` of clock drift on both ends of the Conditions window.
    #[must_use]
    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew;
        self
    }

    /// Validates a Response at the current time.
    pub fn process_response(&self, xml: &str) -> SamlResult<Assertion> {
        self.process_response_at(xml, Utc::now())
    }

    /// Validates a Response as of `now`.
    pub fn process_response_at(&self, xml: &str, now: DateTime<Utc>) -> SamlResult<Assertion> {
        self.run(xml, now).map_err(|e| {
            tracing::warn!(kind = ?e.kind(), "SAML response rejected: {}", e);
            e
        })
    }

    fn run(&self, xml: &str, now: DateTime<Utc>) -> SamlResult<Assertion> {
        let doc = Document::parse(xml)?;
        let response = doc.root();

        check_status(response)?;

        let assertion = locate_assertion(response)?;

        let found = signature::find_signature(response, assertion);
        let payload = signature::signed_payload(assertion, found.map(|(_, element)| element))?;

        let (placement, signature_element) = found.ok_or_else(|| {
            SamlError::SignatureLocation("no Signature on the Response or the Assertion".to_string())
        })?;
        let signature_value = signature::signature_value(signature_element)?;
        tracing::debug!("Using {:?}-level signature", placement);

        if let Some(method) = signature::signature_method(signature_element) {
            if !signature::is_supported_signature_method(method) {
                tracing::warn!("Unsupported signature method: {}", method);
                return Err(SamlError::SignatureVerification);
            }
        }
        if !validate_signature(&payload, &signature_value, &self.public_key_pem) {
            return Err(SamlError::SignatureVerification);
        }

        let conditions = conditions::extract_conditions(assertion)?;
        if !conditions::is_within_validity(&conditions, now, self.clock_skew) {
            return Err(SamlError::ConditionsInvalid(format!(
                "now {} is outside [{}, {})",
                now.to_rfc3339(),
                conditions.not_before.to_rfc3339(),
                conditions.not_on_or_after.to_rfc3339()
            )));
        }
        if !conditions.allows_audience(&self.expected_audience) {
            return Err(SamlError::AudienceMismatch {
                expected: self.expected_audience.clone(),
            });
        }

        let assertion = extract::extract_assertion(assertion, conditions)?;
        tracing::debug!("Accepted assertion {} from {}", assertion.id, assertion.issuer);
        Ok(assertion)
    }
}

/// Validates a Response in one call at the current time.
pub fn process_response(xml: &str, public_key_pem: &str, expected_audience: &str) -> SamlResult<Assertion> {
    ResponseValidator::new(public_key_pem, expected_audience).process_response(xml)
}

/// Rejects a Response whose top-level status is present and not Success.
fn check_status(response: &Element) -> SamlResult<()> {
    let Some(status_code) = response.descendant(&[(SAMLP_NS, "Status"), (SAMLP_NS, "StatusCode")]) else {
        return Ok(());
    };
    let value = status_code.attribute("Value").unwrap_or_default();
    if value == status_codes::SUCCESS {
        return Ok(());
    }

    let detail = status_code
        .child(SAMLP_NS, "StatusCode")
        .and_then(|nested| nested.attribute("Value"))
        .map_or_else(|| value.to_string(), |nested| format!("{value} ({nested})"));
    Err(SamlError::StatusNotSuccess(detail))
}

fn locate_assertion(response: &Element) -> SamlResult<&Element> {
    if !response.is(SAMLP_NS, "Response") {
        return Err(SamlError::MissingAssertion(format!(
            "root element is {{{}}}{}, not samlp:Response",
            response.namespace().unwrap_or_default(),
            response.local_name()
        )));
    }

    let mut assertions = response.children_named(SAML_NS, "Assertion");
    match (assertions.next(), assertions.next()) {
        (Some(assertion), None) => Ok(assertion),
        (Some(_), Some(_)) => Err(SamlError::MissingAssertion(
            "more than one Assertion in Response".to_string(),
        )),
        (None, _) if response.child(SAML_NS, "EncryptedAssertion").is_some() => Err(
            SamlError::MissingAssertion("encrypted assertions are not supported".to_string()),
        ),
        (None, _) => Err(SamlError::MissingAssertion("no Assertion element".to_string())),
    }
}
