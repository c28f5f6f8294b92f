//! Assertion Conditions: extraction and time/audience checks.

use chrono::{DateTime, Duration, Utc};

use crate::error::{SamlError, SamlResult};
use crate::types::{AudienceRestriction, Conditions, SAML_NS};
use crate::xml::Element;

/// Returns true iff `not_before <= now < not_on_or_after` and
/// `expected_audience` is one of the audience restrictions.
///
/// `now` is always supplied by the caller, never sampled here.
#[must_use]
pub fn validate_conditions(conditions: &Conditions, expected_audience: &str, now: DateTime<Utc>) -> bool {
    is_within_validity(conditions, now, Duration::zero()) && conditions.allows_audience(expected_audience)
}

/// Time window check, widened by `skew` on both ends.
pub(crate) fn is_within_validity(conditions: &Conditions, now: DateTime<Utc>, skew: Duration) -> bool {
    conditions.not_before - skew <= now && now < conditions.not_on_or_after + skew
}

/// Reads `saml:Conditions` from an assertion.
///
/// Both bounds are required. A missing AudienceRestriction is only logged
/// here; the audience check later rejects it.
pub(crate) fn extract_conditions(assertion: &Element) -> SamlResult<Conditions> {
    let element = assertion
        .child(SAML_NS, "Conditions")
        .ok_or_else(|| SamlError::ConditionsParse("Conditions element not found".to_string()))?;

    let not_before = required_instant(element, "NotBefore")?;
    let not_on_or_after = required_instant(element, "NotOnOrAfter")?;

    let audience_restrictions: Vec<AudienceRestriction> = element
        .children_named(SAML_NS, "AudienceRestriction")
        .flat_map(|restriction| restriction.children_named(SAML_NS, "Audience"))
        .map(|audience| AudienceRestriction::new(audience.text().trim()))
        .collect();

    if audience_restrictions.is_empty() {
        tracing::warn!("Assertion carries no audience restrictions");
    }

    Ok(Conditions {
        not_before,
        not_on_or_after,
        audience_restrictions,
    })
}

fn required_instant(element: &Element, name: &'static str) -> SamlResult<DateTime<Utc>> {
    let value = element
        .attribute(name)
        .ok_or_else(|| SamlError::ConditionsParse(format!("{name} is missing")))?;
    parse_instant(value).ok_or_else(|| SamlError::ConditionsParse(format!("{name} is not a valid timestamp: {value}")))
}

/// Parses an ISO-8601 / RFC 3339 timestamp into UTC.
pub(crate) fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|instant| instant.with_timezone(&Utc))
}
