//! SAML AuthnRequest types.
//!
//! Authentication request message sent by this service provider to an identity provider.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::xml::escape::{escape_attr, escape_text};

use super::{name_id_formats, SamlBinding, SAMLP_NS, SAML_NS};

/// SAML Authentication Request.
#[derive(Debug, Clone)]
pub struct AuthnRequest {
    /// Unique identifier for this request.
    pub id: String,

    /// Timestamp when this request was issued.
    pub issue_instant: DateTime<Utc>,

    /// The entity ID placed in the `Issuer` element.
    pub issuer: String,

    /// The IdP SSO URL this request is addressed to.
    pub destination: String,

    /// The URL where the response should be sent.
    pub assertion_consumer_service_url: String,

    /// Binding advertised in `ProtocolBinding`.
    pub protocol_binding: SamlBinding,

    /// Name ID policy constraints.
    pub name_id_policy: NameIdPolicy,
}

impl AuthnRequest {
    /// Creates a new authentication request with a fresh ID and the current time.
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            id: format!("_id{}", uuid::Uuid::new_v4()),
            issue_instant: Utc::now(),
            issuer: issuer.into(),
            destination: String::new(),
            assertion_consumer_service_url: String::new(),
            protocol_binding: SamlBinding::Redirect,
            name_id_policy: NameIdPolicy::default(),
        }
    }

    /// Sets the assertion consumer service URL.
    #[must_use]
    pub fn with_acs_url(mut self, url: impl Into<String>) -> Self {
        self.assertion_consumer_service_url = url.into();
        self
    }

    /// Sets the destination URL.
    #[must_use]
    pub fn with_destination(mut self, url: impl Into<String>) -> Self {
        self.destination = url.into();
        self
    }

    /// Sets the protocol binding.
    #[must_use]
    pub const fn with_binding(mut self, binding: SamlBinding) -> Self {
        self.protocol_binding = binding;
        self
    }

    /// Renders the request document.
    ///
    /// The shape is fixed: a `samlp:AuthnRequest` root carrying the request
    /// attributes, followed by `saml:Issuer` and a `NameIDPolicy`.
    #[must_use]
    pub fn to_xml(&self) -> String {
        format!(
            concat!(
                r#"<samlp:AuthnRequest xmlns:samlp="{samlp}" xmlns:saml="{saml}""#,
                r#" ID="{id}" Version="2.0" IssueInstant="{instant}" Destination="{destination}""#,
                r#" ProtocolBinding="{binding}" AssertionConsumerServiceURL="{acs}">"#,
                r#"<saml:Issuer>{issuer}</saml:Issuer>"#,
                r#"<samlp:NameIDPolicy Format="{format}" AllowCreate="{allow_create}"/>"#,
                r#"</samlp:AuthnRequest>"#
            ),
            samlp = SAMLP_NS,
            saml = SAML_NS,
            id = escape_attr(&self.id),
            instant = self.issue_instant.to_rfc3339_opts(SecondsFormat::Secs, true),
            destination = escape_attr(&self.destination),
            binding = self.protocol_binding.uri(),
            acs = escape_attr(&self.assertion_consumer_service_url),
            issuer = escape_text(&self.issuer),
            format = self.name_id_policy.format,
            allow_create = self.name_id_policy.allow_create,
        )
    }
}

/// Name ID policy requested from the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameIdPolicy {
    /// Requested identifier format URI.
    pub format: &'static str,

    /// Whether the IdP may create a new identifier for the principal.
    pub allow_create: bool,
}

impl Default for NameIdPolicy {
    fn default() -> Self {
        Self {
            format: name_id_formats::EMAIL_ADDRESS,
            allow_create: true,
        }
    }
}
