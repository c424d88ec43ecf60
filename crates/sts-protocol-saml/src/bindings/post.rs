//! HTTP-POST binding.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use quick_xml::escape::escape;

use super::{DecodedMessage, RELAY_STATE_PARAM, SamlMessageType, select_message};
use crate::error::{SamlError, SamlResult};

/// Encoder and decoder for the HTTP-POST binding.
pub struct HttpPostBinding;

impl HttpPostBinding {
    /// Auto-submitting form carrying a request.
    #[must_use]
    pub fn encode_request(xml: &str, destination: &str, relay_state: Option<&str>) -> String {
        Self::encode(xml, destination, relay_state, SamlMessageType::Request)
    }

    /// Auto-submitting form carrying a status response.
    #[must_use]
    pub fn encode_response(xml: &str, destination: &str, relay_state: Option<&str>) -> String {
        Self::encode(xml, destination, relay_state, SamlMessageType::Response)
    }

    /// Auto-submitting form carrying `xml` as `message_type`.
    ///
    /// The payload is base64 only, never deflated.
    #[must_use]
    pub fn encode(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
    ) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>SAML HTTP Post Binding</title>
</head>
<body onload="document.forms[0].submit()">
    <noscript>
        <p>JavaScript is disabled. Press the button below to continue.</p>
    </noscript>
    <form method="post" action="{}">
        {}
        <noscript>
            <input type="submit" value="Continue"/>
        </noscript>
    </form>
</body>
</html>"#,
            escape(destination),
            hidden_inputs(xml, relay_state, message_type)
        )
    }

    /// Decodes a message from POST form fields.
    ///
    /// ## Errors
    ///
    /// Fails when no message field is present or the payload is not valid
    /// base64 or UTF-8.
    pub fn decode(
        saml_request: Option<&str>,
        saml_response: Option<&str>,
        relay_state: Option<&str>,
    ) -> SamlResult<DecodedMessage> {
        let (encoded, message_type) = select_message(saml_request, saml_response)?;
        // Form encoders may wrap long base64 lines.
        let compact: String = encoded.split_whitespace().collect();
        let xml = String::from_utf8(STANDARD.decode(compact)?)
            .map_err(|err| SamlError::InvalidRequest(format!("invalid UTF-8 in message: {err}")))?;
        tracing::debug!(?message_type, "decoded POST binding message");

        Ok(DecodedMessage {
            xml,
            message_type,
            relay_state: relay_state.map(String::from),
            signature: None,
            sig_alg: None,
        })
    }
}

fn hidden_inputs(xml: &str, relay_state: Option<&str>, message_type: SamlMessageType) -> String {
    let mut inputs = format!(
        r#"<input type="hidden" name="{}" value="{}"/>"#,
        message_type.form_param(),
        STANDARD.encode(xml)
    );
    if let Some(relay_state) = relay_state {
        inputs.push_str(&format!(
            r#"<input type="hidden" name="{RELAY_STATE_PARAM}" value="{}"/>"#,
            escape(relay_state)
        ));
    }
    inputs
}
