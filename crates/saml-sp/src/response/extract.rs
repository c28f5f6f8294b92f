//! Field extraction from a verified Assertion.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::{SamlError, SamlResult};
use crate::types::{
    Assertion, AuthnContext, AuthnStatement, Conditions, Subject, SubjectConfirmation,
    SubjectConfirmationData, SAML_NS,
};
use crate::xml::Element;

use super::conditions::parse_instant;

/// Builds an [`Assertion`] from the element.
///
/// Fails with [`SamlError::CriticalFieldMissing`] when `Issuer` or `NameID`
/// is empty, so a partially populated assertion never escapes.
pub(crate) fn extract_assertion(element: &Element, conditions: Conditions) -> SamlResult<Assertion> {
    let issuer = trimmed_child_text(element, "Issuer");

    let subject_element = element.child(SAML_NS, "Subject");
    let name_id = subject_element
        .map(|subject| trimmed_child_text(subject, "NameID"))
        .unwrap_or_default();

    if issuer.is_empty() {
        return Err(SamlError::CriticalFieldMissing("Issuer"));
    }
    if name_id.is_empty() {
        return Err(SamlError::CriticalFieldMissing("NameID"));
    }

    let confirmation = match subject_element.and_then(|s| s.child(SAML_NS, "SubjectConfirmation")) {
        Some(confirmation) => extract_confirmation(confirmation)?,
        None => SubjectConfirmation::default(),
    };

    Ok(Assertion {
        id: element.attribute("ID").unwrap_or_default().to_string(),
        issuer,
        issue_instant: element.attribute("IssueInstant").unwrap_or_default().to_string(),
        subject: Subject { name_id, confirmation },
        conditions: Some(conditions),
        authn_statement: element
            .child(SAML_NS, "AuthnStatement")
            .map(extract_authn_statement)
            .unwrap_or_default(),
        attributes: extract_attributes(element),
    })
}

fn extract_confirmation(confirmation: &Element) -> SamlResult<SubjectConfirmation> {
    let confirmation_data = match confirmation.child(SAML_NS, "SubjectConfirmationData") {
        Some(data) => SubjectConfirmationData {
            not_before: optional_instant(data, "NotBefore")?,
            not_on_or_after: optional_instant(data, "NotOnOrAfter")?,
            recipient: data.attribute("Recipient").unwrap_or_default().to_string(),
            in_response_to: data.attribute("InResponseTo").unwrap_or_default().to_string(),
        },
        None => SubjectConfirmationData::default(),
    };

    Ok(SubjectConfirmation {
        method: confirmation.attribute("Method").unwrap_or_default().to_string(),
        confirmation_data,
    })
}

/// An absent confirmation timestamp stays `None`; a malformed one is an error.
fn optional_instant(element: &Element, name: &'static str) -> SamlResult<Option<DateTime<Utc>>> {
    match element.attribute(name) {
        None => {
            tracing::debug!("SubjectConfirmationData has no {} attribute", name);
            Ok(None)
        }
        Some(value) => parse_instant(value).map(Some).ok_or_else(|| {
            SamlError::ConditionsParse(format!("SubjectConfirmationData {name} is not a valid timestamp"))
        }),
    }
}

fn extract_authn_statement(statement: &Element) -> AuthnStatement {
    let context = statement.child(SAML_NS, "AuthnContext");
    AuthnStatement {
        authn_instant: statement.attribute("AuthnInstant").unwrap_or_default().to_string(),
        session_index: statement.attribute("SessionIndex").map(str::to_string),
        authn_context: AuthnContext {
            class_ref: context
                .map(|c| trimmed_child_text(c, "AuthenticatingAuthority"))
                .unwrap_or_default(),
            authn_context_class_ref: context
                .map(|c| trimmed_child_text(c, "AuthnContextClassRef"))
                .unwrap_or_default(),
        },
        subject_locality: statement
            .child(SAML_NS, "SubjectLocality")
            .and_then(|locality| locality.attribute("Address"))
            .map(str::to_string),
    }
}

/// Maps each `Attribute/@Name` to the text of its first `AttributeValue`.
///
/// Later duplicates of a name overwrite earlier ones.
fn extract_attributes(assertion: &Element) -> HashMap<String, String> {
    assertion
        .children_named(SAML_NS, "AttributeStatement")
        .flat_map(|statement| statement.children_named(SAML_NS, "Attribute"))
        .filter_map(|attribute| {
            let name = attribute.attribute("Name")?;
            let value = attribute.child(SAML_NS, "AttributeValue")?;
            Some((name.to_string(), value.text().trim().to_string()))
        })
        .collect()
}

fn trimmed_child_text(element: &Element, local_name: &str) -> String {
    element
        .child_text(SAML_NS, local_name)
        .map(|text| text.trim().to_string())
        .unwrap_or_default()
}
