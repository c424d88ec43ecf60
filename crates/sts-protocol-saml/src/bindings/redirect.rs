//! HTTP-Redirect binding.

use std::io::{Read, Write};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;

use super::{
    DecodedMessage, RELAY_STATE_PARAM, SAML_REQUEST_PARAM, SAML_RESPONSE_PARAM, SIG_ALG_PARAM,
    SIGNATURE_PARAM, SamlMessageType, select_message,
};
use crate::error::{SamlError, SamlResult};

/// Encoder and decoder for the HTTP-Redirect binding.
pub struct HttpRedirectBinding;

impl HttpRedirectBinding {
    /// Builds the redirect location carrying a request.
    ///
    /// ## Errors
    ///
    /// Returns [`SamlError::Deflate`] if compression fails.
    pub fn encode_request(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
    ) -> SamlResult<String> {
        Self::encode(xml, destination, relay_state, SamlMessageType::Request)
    }

    /// Builds the redirect location carrying a status response.
    ///
    /// ## Errors
    ///
    /// Returns [`SamlError::Deflate`] if compression fails.
    pub fn encode_response(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
    ) -> SamlResult<String> {
        Self::encode(xml, destination, relay_state, SamlMessageType::Response)
    }

    /// Builds the redirect location for `message_type`.
    ///
    /// ## Errors
    ///
    /// Returns [`SamlError::Deflate`] if compression fails.
    pub fn encode(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
    ) -> SamlResult<String> {
        let query = Self::encode_query(xml, relay_state, message_type)?;
        Ok(Self::append_query(destination, &query))
    }

    /// Builds the query string (without `?`) carrying a message.
    ///
    /// The result is what a signing collaborator signs before adding
    /// `SigAlg` and `Signature`.
    ///
    /// ## Errors
    ///
    /// Returns [`SamlError::Deflate`] if compression fails.
    pub fn encode_query(
        xml: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
    ) -> SamlResult<String> {
        let compressed = deflate_compress(xml.as_bytes())?;
        let encoded = STANDARD.encode(compressed);
        let mut query = format!(
            "{}={}",
            message_type.form_param(),
            urlencoding::encode(&encoded)
        );
        if let Some(relay_state) = relay_state {
            query.push_str(&format!(
                "&{RELAY_STATE_PARAM}={}",
                urlencoding::encode(relay_state)
            ));
        }
        Ok(query)
    }

    /// Appends an already encoded query to `destination`.
    ///
    /// Used when the query string was signed by a separate collaborator.
    #[must_use]
    pub fn append_query(destination: &str, query: &str) -> String {
        let separator = if destination.contains('?') { '&' } else { '?' };
        format!("{destination}{separator}{query}")
    }

    /// Builds a signed redirect location for a request.
    ///
    /// The signature covers the query string, not the XML.
    ///
    /// ## Errors
    ///
    /// Returns [`SamlError::Deflate`] if compression fails.
    pub fn encode_signed_request(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
        sig_alg: &str,
        signature: &str,
    ) -> SamlResult<String> {
        let mut url = Self::encode_request(xml, destination, relay_state)?;
        url.push_str(&signature_params(sig_alg, signature));
        Ok(url)
    }

    /// Builds a signed redirect location for a status response.
    ///
    /// ## Errors
    ///
    /// Returns [`SamlError::Deflate`] if compression fails.
    pub fn encode_signed_response(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
        sig_alg: &str,
        signature: &str,
    ) -> SamlResult<String> {
        let mut url = Self::encode_response(xml, destination, relay_state)?;
        url.push_str(&signature_params(sig_alg, signature));
        Ok(url)
    }

    /// Decodes a message from redirect query parameters.
    ///
    /// Parameter values may still be URL-encoded; `SAMLRequest` wins when
    /// both message parameters are present.
    ///
    /// ## Errors
    ///
    /// Fails when no message parameter is present or the payload is not
    /// valid base64, deflate or UTF-8.
    pub fn decode(
        saml_request: Option<&str>,
        saml_response: Option<&str>,
        relay_state: Option<&str>,
        signature: Option<&str>,
        sig_alg: Option<&str>,
    ) -> SamlResult<DecodedMessage> {
        let (encoded, message_type) = select_message(saml_request, saml_response)?;
        let url_decoded = urlencoding::decode(encoded)
            .map_err(|err| SamlError::InvalidRequest(format!("URL decode error: {err}")))?;
        let compressed = STANDARD.decode(url_decoded.as_bytes())?;
        let xml = String::from_utf8(deflate_decompress(&compressed)?)
            .map_err(|err| SamlError::InvalidRequest(format!("invalid UTF-8 in message: {err}")))?;
        tracing::debug!(?message_type, signed = signature.is_some(), "decoded redirect binding message");

        Ok(DecodedMessage {
            xml,
            message_type,
            relay_state: relay_state.map(String::from),
            signature: signature.map(String::from),
            sig_alg: sig_alg.map(String::from),
        })
    }

    /// Decodes a message from a full redirect URL.
    ///
    /// ## Errors
    ///
    /// Fails on an unparseable URL or undecodable payload.
    pub fn decode_url(url: &str) -> SamlResult<DecodedMessage> {
        let parsed = url::Url::parse(url)
            .map_err(|err| SamlError::InvalidRequest(format!("invalid URL: {err}")))?;

        let mut saml_request = None;
        let mut saml_response = None;
        let mut relay_state = None;
        let mut signature = None;
        let mut sig_alg = None;
        for (key, value) in parsed.query_pairs() {
            let slot = match key.as_ref() {
                SAML_REQUEST_PARAM => &mut saml_request,
                SAML_RESPONSE_PARAM => &mut saml_response,
                RELAY_STATE_PARAM => &mut relay_state,
                SIGNATURE_PARAM => &mut signature,
                SIG_ALG_PARAM => &mut sig_alg,
                _ => continue,
            };
            *slot = Some(value.into_owned());
        }

        Self::decode(
            saml_request.as_deref(),
            saml_response.as_deref(),
            relay_state.as_deref(),
            signature.as_deref(),
            sig_alg.as_deref(),
        )
    }

    /// Extracts the signed portion of a redirect URL's query.
    ///
    /// Contains the message parameter, `RelayState` and `SigAlg` in the
    /// order they appear, without `Signature`.
    ///
    /// ## Errors
    ///
    /// Fails on an unparseable URL or a query without SAML parameters.
    pub fn extract_signed_query(url: &str) -> SamlResult<String> {
        let parsed = url::Url::parse(url)
            .map_err(|err| SamlError::InvalidRequest(format!("invalid URL: {err}")))?;

        let parts: Vec<String> = parsed
            .query_pairs()
            .filter(|(key, _)| {
                matches!(
                    key.as_ref(),
                    SAML_REQUEST_PARAM | SAML_RESPONSE_PARAM | RELAY_STATE_PARAM | SIG_ALG_PARAM
                )
            })
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(&value)))
            .collect();

        if parts.is_empty() {
            return Err(SamlError::InvalidRequest(
                "no SAML parameters found".to_string(),
            ));
        }
        Ok(parts.join("&"))
    }
}

fn signature_params(sig_alg: &str, signature: &str) -> String {
    format!(
        "&{SIG_ALG_PARAM}={}&{SIGNATURE_PARAM}={}",
        urlencoding::encode(sig_alg),
        urlencoding::encode(signature)
    )
}

/// Raw DEFLATE, no zlib header.
fn deflate_compress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|err| SamlError::Deflate(format!("compression error: {err}")))?;
    encoder
        .finish()
        .map_err(|err| SamlError::Deflate(format!("compression finish error: {err}")))
}

fn deflate_decompress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|err| SamlError::Deflate(format!("decompression error: {err}")))?;
    Ok(decompressed)
}
