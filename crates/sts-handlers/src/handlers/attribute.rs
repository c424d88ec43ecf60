//! Attribute release and collection.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use sts_protocol_saml::{Assertion, SamlMessage, SamlResult};

use super::{flag, keys, list, reject_unknown};
use crate::handler::{HandlerOutcome, HandlerRole, SamlHandler};
use crate::request::{HandlerRequest, HandlerResponse};

/// Factory name of [`AttributeHandler`].
pub const ATTRIBUTE_HANDLER: &str = "attribute";

/// Source of principal attributes on the IDP.
pub trait AttributeManager: Send + Sync + Debug {
    /// Attributes of `principal`, restricted to `keys` unless `keys` is empty.
    fn attributes(&self, principal: &str, keys: &[String]) -> HashMap<String, Vec<String>>;
}

/// Options of [`AttributeHandler`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeOptions {
    /// Attribute names the IDP releases. Empty releases everything the manager returns.
    pub attribute_keys: Vec<String>,
    /// Key collected attributes by friendly name when the attribute has one.
    pub choose_friendly_name: bool,
}

impl AttributeOptions {
    /// Reads the options from a handler option map.
    ///
    /// ## Errors
    ///
    /// Returns a configuration error for unknown keys or a malformed flag.
    pub fn from_options(options: &HashMap<String, String>) -> SamlResult<Self> {
        reject_unknown(
            ATTRIBUTE_HANDLER,
            options,
            &[keys::ATTRIBUTE_KEYS, keys::ATTRIBUTE_CHOOSE_FRIENDLY_NAME],
        )?;
        Ok(Self {
            attribute_keys: list(options, keys::ATTRIBUTE_KEYS),
            choose_friendly_name: flag(options, keys::ATTRIBUTE_CHOOSE_FRIENDLY_NAME)?,
        })
    }
}

/// On the IDP, adds the principal's attributes to the request options so the
/// authentication handler puts them in the assertion. On the SP, collects the
/// attribute statements of the received assertion into the response.
#[derive(Debug)]
pub struct AttributeHandler {
    role: HandlerRole,
    options: AttributeOptions,
    manager: Option<Arc<dyn AttributeManager>>,
    collected: HashMap<String, Vec<String>>,
}

impl AttributeHandler {
    /// Creates a handler for `role`.
    #[must_use]
    pub fn new(role: HandlerRole, options: AttributeOptions) -> Self {
        Self {
            role,
            options,
            manager: None,
            collected: HashMap::new(),
        }
    }

    /// Attribute source used on the IDP.
    #[must_use]
    pub fn with_manager(mut self, manager: Arc<dyn AttributeManager>) -> Self {
        self.manager = Some(manager);
        self
    }

    /// Attributes collected since the last reset.
    #[must_use]
    pub const fn collected(&self) -> &HashMap<String, Vec<String>> {
        &self.collected
    }

    fn release(&self, request: &mut HandlerRequest) {
        let (Some(manager), Some(principal)) = (&self.manager, &request.principal) else {
            return;
        };
        let attributes = manager.attributes(principal, &self.options.attribute_keys);
        tracing::debug!(principal = %principal, count = attributes.len(), "releasing attributes");
        for (name, values) in attributes {
            request.options.attributes.entry(name).or_insert(values);
        }
    }

    fn collect(&mut self, assertion: &Assertion) {
        for attribute in assertion.attributes() {
            let key = match &attribute.friendly_name {
                Some(friendly) if self.options.choose_friendly_name => friendly.clone(),
                _ => attribute.name.clone(),
            };
            self.collected.insert(key, attribute.values.clone());
        }
    }
}

impl SamlHandler for AttributeHandler {
    fn name(&self) -> &str {
        ATTRIBUTE_HANDLER
    }

    fn role(&self) -> HandlerRole {
        self.role
    }

    fn handle_request_type(
        &mut self,
        request: &mut HandlerRequest,
        _response: &mut HandlerResponse,
    ) -> SamlResult<HandlerOutcome> {
        if self.role == HandlerRole::Idp
            && matches!(request.message, Some(SamlMessage::AuthnRequest(_)))
        {
            self.release(request);
        }
        Ok(HandlerOutcome::Continue)
    }

    fn handle_status_response_type(
        &mut self,
        request: &mut HandlerRequest,
        response: &mut HandlerResponse,
    ) -> SamlResult<HandlerOutcome> {
        if self.role != HandlerRole::Sp {
            return Ok(HandlerOutcome::Continue);
        }
        let assertion = response.assertion.clone().or_else(|| match &request.message {
            Some(SamlMessage::Response(answer)) => answer.first_assertion().cloned(),
            _ => None,
        });
        if let Some(assertion) = assertion {
            self.collect(&assertion);
            response.attributes.clone_from(&self.collected);
            tracing::debug!(count = self.collected.len(), "collected attributes");
        }
        Ok(HandlerOutcome::Continue)
    }

    fn reset(&mut self) {
        self.collected.clear();
    }
}
