//! SAML Assertion types.
//!
//! The values produced by a successful response validation. They carry no
//! behavior beyond construction; session establishment is left to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A validated SAML assertion.
///
/// Only ever constructed after the signature, conditions, and critical
/// fields have all been checked; `issuer` and `subject.name_id` are never
/// empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    /// Unique identifier for this assertion.
    pub id: String,

    /// The entity ID of the identity provider that issued this assertion.
    pub issuer: String,

    /// Timestamp when this assertion was issued, as it appeared in the document.
    pub issue_instant: String,

    /// The subject of this assertion.
    pub subject: Subject,

    /// Conditions the assertion was validated against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Conditions>,

    /// Authentication statement describing how the subject authenticated.
    pub authn_statement: AuthnStatement,

    /// Attributes about the subject, one value per attribute name.
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl Assertion {
    /// Returns the value of the named attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Subject of an assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// The name identifier for the subject.
    pub name_id: String,

    /// Subject confirmation.
    pub confirmation: SubjectConfirmation,
}

/// Subject confirmation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectConfirmation {
    /// The confirmation method URI.
    pub method: String,

    /// Additional confirmation data.
    pub confirmation_data: SubjectConfirmationData,
}

impl SubjectConfirmation {
    /// Bearer confirmation method URI.
    pub const BEARER: &'static str = "urn:oasis:names:tc:SAML:2.0:cm:bearer";
}

/// Subject confirmation data.
///
/// Extracted as-is. Checking `recipient`, `in_response_to`, and the time
/// window against the original request is the caller's job; absent
/// timestamps stay `None` rather than being filled in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectConfirmationData {
    /// Time before which the subject cannot be confirmed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,

    /// Time at or after which the subject can no longer be confirmed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_on_or_after: Option<DateTime<Utc>>,

    /// The location to which the assertion can be presented.
    #[serde(default)]
    pub recipient: String,

    /// The request ID that this assertion responds to.
    #[serde(default)]
    pub in_response_to: String,
}

impl SubjectConfirmationData {
    /// Returns true if `now` lies within the confirmation window.
    ///
    /// A missing bound is treated as unbounded on that side.
    #[must_use]
    pub fn is_within_window(&self, now: DateTime<Utc>) -> bool {
        self.not_before.map_or(true, |nb| nb <= now)
            && self.not_on_or_after.map_or(true, |noa| now < noa)
    }
}

/// Conditions for assertion validity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conditions {
    /// Time before which the assertion is not valid.
    pub not_before: DateTime<Utc>,

    /// Time at or after which the assertion is not valid.
    pub not_on_or_after: DateTime<Utc>,

    /// Audience restrictions, in document order.
    #[serde(default)]
    pub audience_restrictions: Vec<AudienceRestriction>,
}

impl Conditions {
    /// Returns true if any audience restriction names `audience`.
    #[must_use]
    pub fn allows_audience(&self, audience: &str) -> bool {
        self.audience_restrictions
            .iter()
            .any(|restriction| restriction.audience == audience)
    }
}

/// Audience restriction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudienceRestriction {
    /// A relying party identifier allowed to accept the assertion.
    pub audience: String,
}

impl AudienceRestriction {
    /// Creates a new audience restriction.
    #[must_use]
    pub fn new(audience: impl Into<String>) -> Self {
        Self {
            audience: audience.into(),
        }
    }
}

/// Authentication statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthnStatement {
    /// The time of authentication, as it appeared in the document.
    pub authn_instant: String,

    /// The session index (for session management).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_index: Option<String>,

    /// The authentication context.
    pub authn_context: AuthnContext,

    /// Address of the subject at authentication time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_locality: Option<String>,
}

/// Authentication context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthnContext {
    /// The authenticating authority named in the context, if any.
    #[serde(default)]
    pub class_ref: String,

    /// Authentication context class reference.
    #[serde(default)]
    pub authn_context_class_ref: String,
}
