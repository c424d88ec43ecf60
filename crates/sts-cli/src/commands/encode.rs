//! `sts encode`.

use sts_protocol_saml::SamlMessage;
use sts_protocol_saml::bindings::{HttpPostBinding, HttpRedirectBinding, SamlMessageType};

use crate::CliResult;
use crate::cli::{Binding, EncodeArgs};

/// Runs `sts encode`, printing the redirect URL or the form page.
pub fn run_encode(args: &EncodeArgs) -> CliResult<()> {
    let xml = std::fs::read_to_string(&args.file)?;
    println!(
        "{}",
        encode(&xml, args.binding, &args.destination, args.relay_state.as_deref())?
    );
    Ok(())
}

/// Encodes `xml` for `binding`. The message kind decides between
/// `SAMLRequest` and `SAMLResponse`.
pub fn encode(
    xml: &str,
    binding: Binding,
    destination: &str,
    relay_state: Option<&str>,
) -> CliResult<String> {
    let message = SamlMessage::from_xml(xml)?;
    let message_type = if message.is_request() {
        SamlMessageType::Request
    } else {
        SamlMessageType::Response
    };
    tracing::debug!(kind = message.kind(), ?binding, destination, "encoding message");

    Ok(match binding {
        Binding::Redirect => HttpRedirectBinding::encode(xml, destination, relay_state, message_type)?,
        Binding::Post => HttpPostBinding::encode(xml, destination, relay_state, message_type),
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use sts_protocol_saml::{AuthnRequest, NameId, Response};

    use super::*;

    #[test]
    fn redirect_round_trips_request() {
        let xml = SamlMessage::from(AuthnRequest::new(
            NameId::entity("https://sp.example.com"),
            Utc::now().fixed_offset(),
        ))
        .to_xml();

        let url = encode(&xml, Binding::Redirect, "https://idp.example.com/sso", Some("s1")).unwrap();
        let decoded = HttpRedirectBinding::decode_url(&url).unwrap();
        assert_eq!(decoded.message_type, SamlMessageType::Request);
        assert_eq!(decoded.xml, xml);
        assert_eq!(decoded.relay_state.as_deref(), Some("s1"));
    }

    #[test]
    fn post_uses_response_field_for_responses() {
        let xml = SamlMessage::from(Response::success(
            NameId::entity("https://idp.example.com"),
            Utc::now().fixed_offset(),
        ))
        .to_xml();

        let html = encode(&xml, Binding::Post, "https://sp.example.com/acs", None).unwrap();
        assert!(html.contains(r#"name="SAMLResponse""#));
        assert!(html.contains(r#"action="https://sp.example.com/acs""#));
    }

    #[test]
    fn rejects_non_message() {
        assert!(encode("<Assertion/>", Binding::Post, "https://sp.example.com", None).is_err());
    }
}
