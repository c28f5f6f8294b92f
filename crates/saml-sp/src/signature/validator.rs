//! XML Signature validation.
//!
//! Verification is a pure function of the signed bytes, the signature, and
//! the trusted key. Any malformed input counts as a failed verification.

use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use p256::pkcs8::DecodePublicKey;

/// Verifies an ECDSA P-256 / SHA-256 signature over `signed_bytes`.
///
/// `signature` is accepted DER-encoded or as the fixed 64-byte `r || s`
/// form used by XML-DSig. `public_key_pem` is a SubjectPublicKeyInfo PEM.
#[must_use]
pub fn validate_signature(signed_bytes: &[u8], signature: &[u8], public_key_pem: &str) -> bool {
    let key = match VerifyingKey::from_public_key_pem(public_key_pem) {
        Ok(key) => key,
        Err(e) => {
            tracing::debug!("Failed to parse verification key: {}", e);
            return false;
        }
    };

    let Some(signature) = decode_signature(signature) else {
        tracing::debug!("Malformed ECDSA signature ({} bytes)", signature.len());
        return false;
    };

    key.verify(signed_bytes, &signature).is_ok()
}

fn decode_signature(bytes: &[u8]) -> Option<Signature> {
    Signature::from_der(bytes)
        .or_else(|_| Signature::from_slice(bytes))
        .ok()
}
