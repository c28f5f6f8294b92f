//! XML Signature creation.
//!
//! Signs the Assertion of a SAML Response and inserts the `ds:Signature`
//! element. Used by mock identity providers and tests.

use base64::Engine;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::pkcs8::DecodePrivateKey;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;

use crate::error::{SamlError, SamlResult};
use crate::types::{
    canonicalization_algorithms, signature_algorithms, transform_algorithms, SAMLP_NS, SAML_NS,
    XMLDSIG_NS,
};
use crate::xml::escape::{escape_attr, escape_text};
use crate::xml::Document;

use super::{signed_payload, SignaturePlacement};

/// Signs SAML Response assertions with an ECDSA P-256 key.
pub struct ResponseSigner {
    signing_key: SigningKey,
    placement: SignaturePlacement,
    inclusive_prefixes: Vec<String>,
}

impl ResponseSigner {
    /// Creates a signer from a signing key.
    #[must_use]
    pub fn new(signing_key: SigningKey) -> Self {
        Self {
            signing_key,
            placement: SignaturePlacement::Assertion,
            inclusive_prefixes: Vec::new(),
        }
    }

    /// Creates a signer from a PKCS#8 PEM-encoded private key.
    pub fn from_pkcs8_pem(private_key_pem: &str) -> SamlResult<Self> {
        let signing_key = SigningKey::from_pkcs8_pem(private_key_pem)
            .map_err(|e| SamlError::Config(format!("invalid P-256 private key: {e}")))?;
        Ok(Self::new(signing_key))
    }

    /// Sets where the `ds:Signature` element is inserted.
    #[must_use]
    pub const fn with_placement(mut self, placement: SignaturePlacement) -> Self {
        self.placement = placement;
        self
    }

    /// Sets the `InclusiveNamespaces` prefix list for the C14N transform.
    #[must_use]
    pub fn with_inclusive_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.inclusive_prefixes = prefixes;
        self
    }

    /// Signs the single Assertion inside `response_xml`.
    ///
    /// The signature goes after the `Issuer` of the chosen parent element, or
    /// first inside it when there is no `Issuer`.
    pub fn sign(&self, response_xml: &str) -> SamlResult<String> {
        let doc = Document::parse(response_xml)?;
        let response = doc.root();
        if !response.is(SAMLP_NS, "Response") {
            return Err(SamlError::MissingAssertion("root element is not a samlp:Response".to_string()));
        }
        let mut assertions = response.children_named(SAML_NS, "Assertion");
        let assertion = match (assertions.next(), assertions.next()) {
            (Some(assertion), None) => assertion,
            _ => {
                return Err(SamlError::MissingAssertion(
                    "expected exactly one Assertion to sign".to_string(),
                ))
            }
        };
        if assertion.child(XMLDSIG_NS, "Signature").is_some() {
            return Err(SamlError::Encoding("assertion is already signed".to_string()));
        }

        let reference_id = assertion.attribute("ID").unwrap_or_default();
        let mut signature_xml = self.signature_template(reference_id, "");
        let template = Document::parse(&signature_xml)?;
        let payload = signed_payload(assertion, Some(template.root()))?;

        let signature: Signature = self.signing_key.sign(&payload);
        let value = base64::engine::general_purpose::STANDARD.encode(signature.to_der().as_bytes());
        signature_xml = self.signature_template(reference_id, &value);

        let position = insertion_point(response_xml, self.placement)?;
        let mut signed = String::with_capacity(response_xml.len() + signature_xml.len());
        signed.push_str(&response_xml[..position]);
        signed.push_str(&signature_xml);
        signed.push_str(&response_xml[position..]);

        tracing::debug!("Signed assertion {}", reference_id);
        Ok(signed)
    }

    fn signature_template(&self, reference_id: &str, signature_value: &str) -> String {
        let inclusive = if self.inclusive_prefixes.is_empty() {
            String::new()
        } else {
            format!(
                r#"<ec:InclusiveNamespaces xmlns:ec="{}" PrefixList="{}"/>"#,
                canonicalization_algorithms::EXCLUSIVE_C14N,
                escape_attr(&self.inclusive_prefixes.join(" "))
            )
        };

        format!(
            concat!(
                r#"<ds:Signature xmlns:ds="{ds}"><ds:SignedInfo>"#,
                r#"<ds:CanonicalizationMethod Algorithm="{c14n}"/>"#,
                r#"<ds:SignatureMethod Algorithm="{method}"/>"#,
                r##"<ds:Reference URI="#{reference}"><ds:Transforms>"##,
                r#"<ds:Transform Algorithm="{enveloped}"/>"#,
                r#"<ds:Transform Algorithm="{c14n}">{inclusive}</ds:Transform>"#,
                r#"</ds:Transforms></ds:Reference></ds:SignedInfo>"#,
                r#"<ds:SignatureValue>{value}</ds:SignatureValue></ds:Signature>"#
            ),
            ds = XMLDSIG_NS,
            c14n = canonicalization_algorithms::EXCLUSIVE_C14N,
            method = signature_algorithms::ECDSA_SHA256,
            reference = escape_attr(reference_id),
            enveloped = transform_algorithms::ENVELOPED_SIGNATURE,
            inclusive = inclusive,
            value = escape_text(signature_value),
        )
    }
}

/// Finds the byte offset at which the signature element is inserted.
fn insertion_point(xml: &str, placement: SignaturePlacement) -> SamlResult<usize> {
    let (parent_ns, parent_local, parent_depth) = match placement {
        SignaturePlacement::Response => (SAMLP_NS, "Response", 1usize),
        SignaturePlacement::Assertion => (SAML_NS, "Assertion", 2usize),
    };

    let mut reader = NsReader::from_str(xml);
    let mut depth = 0usize;
    let mut parent_start: Option<usize> = None;

    loop {
        let (resolved, event) = reader.read_resolved_event()?;
        let in_parent_ns = is_bound_to(&resolved, parent_ns);
        let in_saml_ns = is_bound_to(&resolved, SAML_NS);
        match event {
            Event::Start(e) => {
                depth += 1;
                if parent_start.is_none()
                    && depth == parent_depth
                    && in_parent_ns
                    && e.local_name().as_ref() == parent_local.as_bytes()
                {
                    parent_start = Some(position(&reader)?);
                }
            }
            Event::End(e) => {
                if let Some(start) = parent_start {
                    if depth == parent_depth + 1 && in_saml_ns && e.local_name().as_ref() == b"Issuer" {
                        return position(&reader);
                    }
                    if depth == parent_depth {
                        return Ok(start);
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Empty(e) => {
                if parent_start.is_some()
                    && depth == parent_depth
                    && in_saml_ns
                    && e.local_name().as_ref() == b"Issuer"
                {
                    return position(&reader);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    parent_start.ok_or_else(|| SamlError::MissingAssertion(format!("no {parent_local} element to sign")))
}

fn is_bound_to(resolved: &ResolveResult<'_>, namespace: &str) -> bool {
    matches!(resolved, ResolveResult::Bound(Namespace(bound)) if *bound == namespace.as_bytes())
}

fn position(reader: &NsReader<&[u8]>) -> SamlResult<usize> {
    usize::try_from(reader.buffer_position())
        .map_err(|_| SamlError::Encoding("document too large".to_string()))
}
