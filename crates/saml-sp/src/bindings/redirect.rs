//! HTTP-Redirect Binding implementation.
//!
//! Implements the SAML 2.0 HTTP-Redirect binding for sending SAML messages
//! via URL query parameters with DEFLATE compression.

use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use url::Url;

use crate::error::{SamlError, SamlResult};

use super::{DecodedMessage, SamlMessageType};

/// HTTP-Redirect binding encoder/decoder.
pub struct HttpRedirectBinding;

impl HttpRedirectBinding {
    /// Encodes a SAML request for HTTP-Redirect binding.
    ///
    /// Any query string already on `destination` is replaced, not merged.
    pub fn encode_request(xml: &str, destination: &str, relay_state: Option<&str>) -> SamlResult<Url> {
        Self::encode(xml, destination, relay_state, SamlMessageType::Request)
    }

    /// Encodes a SAML message for HTTP-Redirect binding.
    fn encode(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
    ) -> SamlResult<Url> {
        let encoded = encode_message(xml)?;

        let mut url = Url::parse(destination)?;
        if url.cannot_be_a_base() {
            return Err(SamlError::Encoding(format!(
                "destination cannot carry a query string: {destination}"
            )));
        }

        let mut query = format!("{}={}", message_type.param_name(), encoded);
        if let Some(rs) = relay_state {
            query.push_str(&format!("&RelayState={}", urlencoding::encode(rs)));
        }
        url.set_query(Some(&query));

        Ok(url)
    }

    /// Decodes a percent-encoded `SAMLRequest` or `SAMLResponse` value.
    pub fn decode(encoded: &str) -> SamlResult<String> {
        // URL decode (may already be done by the web framework)
        let url_decoded = urlencoding::decode(encoded)
            .map_err(|e| SamlError::Encoding(format!("URL decode error: {e}")))?;

        inflate_message(&url_decoded)
    }

    /// Decodes a message from a full redirect URL.
    pub fn decode_url(url: &str) -> SamlResult<DecodedMessage> {
        let parsed = Url::parse(url)?;

        let mut message = None;
        let mut relay_state = None;

        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "SAMLRequest" if message.is_none() => {
                    message = Some((value.into_owned(), SamlMessageType::Request));
                }
                "SAMLResponse" if message.is_none() => {
                    message = Some((value.into_owned(), SamlMessageType::Response));
                }
                "RelayState" => relay_state = Some(value.into_owned()),
                _ => {}
            }
        }

        let (encoded, message_type) = message.ok_or_else(|| {
            SamlError::Encoding("No SAMLRequest or SAMLResponse parameter".to_string())
        })?;
        let xml = inflate_message(&encoded)?;

        Ok(DecodedMessage {
            xml,
            message_type,
            relay_state,
        })
    }
}

/// Deflates, Base64-encodes and percent-encodes a message.
fn encode_message(xml: &str) -> SamlResult<String> {
    let compressed = deflate_compress(xml.as_bytes())?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(&compressed);
    Ok(urlencoding::encode(&encoded).into_owned())
}

/// Base64-decodes and inflates an already percent-decoded message.
fn inflate_message(encoded: &str) -> SamlResult<String> {
    let b64_decoded = base64::engine::general_purpose::STANDARD.decode(encoded.as_bytes())?;
    let xml_bytes = deflate_decompress(&b64_decoded)?;
    String::from_utf8(xml_bytes)
        .map_err(|e| SamlError::Encoding(format!("Invalid UTF-8 in message: {e}")))
}

/// Compresses data using DEFLATE (raw, no zlib header).
fn deflate_compress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| SamlError::Encoding(format!("Compression error: {e}")))?;
    encoder
        .finish()
        .map_err(|e| SamlError::Encoding(format!("Compression finish error: {e}")))
}

/// Decompresses DEFLATE data.
fn deflate_decompress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| SamlError::Deflate(format!("Decompression error: {e}")))?;
    Ok(decompressed)
}
