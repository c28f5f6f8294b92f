//! Service provider configuration.
//!
//! Built once by the caller and passed explicitly to every operation. It can
//! be constructed in code or loaded from TOML:
//!
//! ```toml
//! assertion_consumer_service_url = "https://sp.example.com/saml/acs"
//! sp_entity_id = "https://sp.example.com"
//! binding = "redirect"
//!
//! [idp_metadata]
//! entity_id = "https://idp.example.com"
//! sso_url = "https://idp.example.com/sso"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

use crate::error::{SamlError, SamlResult};
use crate::types::SamlBinding;

/// Identity provider details the SP needs to build requests.
///
/// Obtaining these from an IdP metadata document is the caller's concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdpMetadata {
    /// The IdP's entity ID.
    pub entity_id: String,

    /// The IdP's single sign-on endpoint.
    pub sso_url: String,
}

/// Service provider configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamlConfig {
    /// Where the IdP sends its Response.
    pub assertion_consumer_service_url: String,

    /// Binding used to deliver the AuthnRequest.
    #[serde(default)]
    pub binding: SamlBinding,

    /// This SP's entity ID, placed in the request `Issuer`.
    ///
    /// Falls back to the IdP entity ID when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sp_entity_id: Option<String>,

    /// The identity provider to authenticate against.
    pub idp_metadata: IdpMetadata,
}

impl SamlConfig {
    /// Creates a configuration using the redirect binding.
    pub fn new(assertion_consumer_service_url: impl Into<String>, idp_metadata: IdpMetadata) -> Self {
        Self {
            assertion_consumer_service_url: assertion_consumer_service_url.into(),
            binding: SamlBinding::Redirect,
            sp_entity_id: None,
            idp_metadata,
        }
    }

    /// Sets the binding.
    #[must_use]
    pub fn with_binding(mut self, binding: SamlBinding) -> Self {
        self.binding = binding;
        self
    }

    /// Sets the SP entity ID.
    #[must_use]
    pub fn with_sp_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.sp_entity_id = Some(entity_id.into());
        self
    }

    /// Parses a configuration from TOML and validates it.
    pub fn from_toml_str(content: &str) -> SamlResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| SamlError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> SamlResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| SamlError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Checks that the URLs are absolute and the IdP entity ID is set.
    pub fn validate(&self) -> SamlResult<()> {
        if self.idp_metadata.entity_id.trim().is_empty() {
            return Err(SamlError::Config("idp_metadata.entity_id is empty".to_string()));
        }
        check_url("assertion_consumer_service_url", &self.assertion_consumer_service_url)?;
        check_url("idp_metadata.sso_url", &self.idp_metadata.sso_url)?;
        Ok(())
    }

    /// The identifier placed in the AuthnRequest `Issuer`.
    #[must_use]
    pub fn issuer(&self) -> &str {
        self.sp_entity_id
            .as_deref()
            .unwrap_or(&self.idp_metadata.entity_id)
    }
}

fn check_url(field: &str, value: &str) -> SamlResult<()> {
    let url = Url::parse(value).map_err(|e| SamlError::Config(format!("{field} is not a valid URL: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(SamlError::Config(format!("{field} is not a hierarchical URL: {value}")));
    }
    Ok(())
}
