//! XML Signature support for SAML.
//!
//! Responses are signed with ECDSA P-256 over SHA-256. The signed payload is
//! the Assertion subtree in exclusive canonical form with the assertion's own
//! enveloped `ds:Signature` left out.
//!
//! A `ds:Signature` may sit on the Response or on the Assertion. The
//! Response-level one is checked first; either way the payload is the
//! assertion.

mod signer;
mod validator;

pub use signer::*;
pub use validator::*;

use base64::Engine;

use crate::error::{SamlError, SamlResult};
use crate::types::{canonicalization_algorithms, signature_algorithms, transform_algorithms, XMLDSIG_NS};
use crate::xml::{c14n, Element};

/// Where a `ds:Signature` element was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignaturePlacement {
    /// Direct child of `samlp:Response`.
    Response,
    /// Direct child of `saml:Assertion` (enveloped).
    #[default]
    Assertion,
}

/// Returns the signature that covers `assertion`, Response-level first.
#[must_use]
pub fn find_signature<'a>(
    response: &'a Element,
    assertion: &'a Element,
) -> Option<(SignaturePlacement, &'a Element)> {
    response
        .child(XMLDSIG_NS, "Signature")
        .map(|sig| (SignaturePlacement::Response, sig))
        .or_else(|| {
            assertion
                .child(XMLDSIG_NS, "Signature")
                .map(|sig| (SignaturePlacement::Assertion, sig))
        })
}

/// Produces the bytes the signature is computed over.
///
/// The assertion's own `ds:Signature` child, if any, is excluded. When a
/// signature is given, its canonicalization method and transforms must all be
/// exclusive C14N (or the enveloped-signature transform), and its
/// `InclusiveNamespaces` prefix list is honoured.
pub fn signed_payload(assertion: &Element, signature: Option<&Element>) -> SamlResult<Vec<u8>> {
    let inclusive_prefixes = match signature {
        Some(signature) => inclusive_prefixes(signature)?,
        None => Vec::new(),
    };
    let enveloped = assertion.child(XMLDSIG_NS, "Signature");
    Ok(c14n::canonicalize_exclusive(assertion, enveloped, &inclusive_prefixes))
}

/// Reads and Base64-decodes `SignatureValue`.
///
/// Whitespace inside the value is ignored.
pub fn signature_value(signature: &Element) -> SamlResult<Vec<u8>> {
    let encoded: String = signature
        .child_text(XMLDSIG_NS, "SignatureValue")
        .ok_or_else(|| SamlError::SignatureLocation("SignatureValue element not found".to_string()))?
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    if encoded.is_empty() {
        return Err(SamlError::SignatureLocation("SignatureValue is empty".to_string()));
    }

    base64::engine::general_purpose::STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| SamlError::SignatureLocation(format!("SignatureValue is not valid Base64: {e}")))
}

/// Returns the `SignatureMethod` algorithm URI, if declared.
#[must_use]
pub fn signature_method(signature: &Element) -> Option<&str> {
    signature
        .descendant(&[(XMLDSIG_NS, "SignedInfo"), (XMLDSIG_NS, "SignatureMethod")])
        .and_then(|method| method.attribute("Algorithm"))
}

/// Returns true if `uri` names ECDSA with SHA-256, the only supported method.
#[must_use]
pub fn is_supported_signature_method(uri: &str) -> bool {
    uri == signature_algorithms::ECDSA_SHA256
}

fn inclusive_prefixes(signature: &Element) -> SamlResult<Vec<String>> {
    let Some(signed_info) = signature.child(XMLDSIG_NS, "SignedInfo") else {
        return Ok(Vec::new());
    };

    if let Some(method) = signed_info.child(XMLDSIG_NS, "CanonicalizationMethod") {
        let algorithm = method.attribute("Algorithm").unwrap_or_default();
        if algorithm != canonicalization_algorithms::EXCLUSIVE_C14N {
            return Err(SamlError::Canonicalization(format!(
                "unsupported canonicalization method: {algorithm}"
            )));
        }
    }

    let mut prefixes = Vec::new();
    let transforms = signed_info
        .children_named(XMLDSIG_NS, "Reference")
        .filter_map(|reference| reference.child(XMLDSIG_NS, "Transforms"))
        .flat_map(|transforms| transforms.children_named(XMLDSIG_NS, "Transform"));

    for transform in transforms {
        match transform.attribute("Algorithm").unwrap_or_default() {
            transform_algorithms::ENVELOPED_SIGNATURE => {}
            canonicalization_algorithms::EXCLUSIVE_C14N => {
                let list = transform
                    .child(canonicalization_algorithms::EXCLUSIVE_C14N, "InclusiveNamespaces")
                    .and_then(|ns| ns.attribute("PrefixList"));
                if let Some(list) = list {
                    prefixes.extend(list.split_whitespace().map(str::to_string));
                }
            }
            other => {
                return Err(SamlError::Canonicalization(format!("unsupported transform: {other}")));
            }
        }
    }

    Ok(prefixes)
}
