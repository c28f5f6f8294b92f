//! AuthnRequest construction and redirect encoding.

use url::Url;

use crate::bindings::HttpRedirectBinding;
use crate::config::SamlConfig;
use crate::error::{SamlError, SamlResult};
use crate::types::{AuthnRequest, SamlBinding};

/// An encoded AuthnRequest ready to send to the IdP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAuthnRequest {
    /// The request `ID`. Record it to match the Response's `InResponseTo`.
    pub request_id: String,
    /// The redirect URL carrying the request.
    pub url: Url,
}

/// Builds AuthnRequests for the HTTP-Redirect binding.
///
/// Holds no state; every call renders a fresh request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestEncoder;

impl RequestEncoder {
    /// Builds an AuthnRequest and encodes it into a redirect URL.
    ///
    /// `relay_state`, when given, follows `SAMLRequest` in the query string.
    /// Fails with [`SamlError::UnsupportedBinding`] for a POST-configured SP.
    pub fn build_authn_request(
        config: &SamlConfig,
        relay_state: Option<&str>,
    ) -> SamlResult<EncodedAuthnRequest> {
        if config.binding != SamlBinding::Redirect {
            tracing::warn!("AuthnRequest not built: binding {:?} is not supported", config.binding);
            return Err(SamlError::UnsupportedBinding(config.binding.uri().to_string()));
        }

        let request = AuthnRequest::new(config.issuer())
            .with_destination(&config.idp_metadata.sso_url)
            .with_acs_url(&config.assertion_consumer_service_url)
            .with_binding(config.binding);

        let url = HttpRedirectBinding::encode_request(&request.to_xml(), &config.idp_metadata.sso_url, relay_state)
            .map_err(|e| {
                tracing::warn!("AuthnRequest encoding failed: {}", e);
                e
            })?;

        tracing::debug!("Built AuthnRequest {} for {}", request.id, config.idp_metadata.entity_id);

        Ok(EncodedAuthnRequest {
            request_id: request.id,
            url,
        })
    }

    /// Builds an AuthnRequest redirect URL without RelayState.
    pub fn build_authn_request_url(config: &SamlConfig) -> SamlResult<Url> {
        Self::build_authn_request(config, None).map(|encoded| encoded.url)
    }
}
