//! Ordered execution of handlers.

use std::collections::HashMap;

use serde::Deserialize;
use sts_protocol_saml::{SamlError, SamlMessage, SamlResult};

use crate::factory::HandlerFactories;
use crate::handler::{ChainConfig, HandlerOutcome, HandlerRole, SamlHandler};
use crate::request::{HandlerRequest, HandlerResponse};

/// One entry of a configured chain.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HandlerSettings {
    /// Factory name of the handler.
    pub name: String,
    /// Handler options.
    #[serde(default)]
    pub options: HashMap<String, String>,
}

/// A chain as read from configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HandlerChainSettings {
    /// Settings shared by every handler.
    #[serde(flatten)]
    pub chain: ChainConfig,
    /// Handlers in execution order.
    #[serde(default)]
    pub handlers: Vec<HandlerSettings>,
}

/// Handlers run in order over one request/response pair.
///
/// Processing stops at the first handler that returns
/// [`HandlerOutcome::Stop`] or an error.
#[derive(Debug, Default)]
pub struct HandlerChain {
    handlers: Vec<Box<dyn SamlHandler>>,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Generate,
    Request,
    StatusResponse,
}

impl Phase {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Request => "request",
            Self::StatusResponse => "status-response",
        }
    }
}

impl HandlerChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds and initializes a chain from configuration.
    ///
    /// ## Errors
    ///
    /// Returns a configuration error for unknown handlers, rejected options,
    /// or a handler whose role differs from the chain's.
    pub fn from_settings(
        settings: &HandlerChainSettings,
        factories: &HandlerFactories,
    ) -> SamlResult<Self> {
        let mut chain = Self::new();
        for handler in &settings.handlers {
            chain.add(factories.create(&handler.name, settings.chain.role, &handler.options)?);
        }
        chain.initialize(&settings.chain)?;
        Ok(chain)
    }

    /// Appends a handler.
    pub fn add(&mut self, handler: Box<dyn SamlHandler>) {
        self.handlers.push(handler);
    }

    /// Appends several handlers, keeping their order.
    pub fn add_all(&mut self, handlers: impl IntoIterator<Item = Box<dyn SamlHandler>>) {
        self.handlers.extend(handlers);
    }

    /// Number of handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if the chain has no handlers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Handler names in execution order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.handlers.iter().map(|handler| handler.name()).collect()
    }

    /// Checks that every handler runs on `role`.
    ///
    /// ## Errors
    ///
    /// Returns [`SamlError::Configuration`] naming the first mismatch.
    pub fn validate_roles(&self, role: HandlerRole) -> SamlResult<()> {
        match self.handlers.iter().find(|handler| handler.role() != role) {
            Some(handler) => Err(SamlError::Configuration(format!(
                "handler {} has role {} in a {role} chain",
                handler.name(),
                handler.role()
            ))),
            None => Ok(()),
        }
    }

    /// Checks roles and hands `config` to every handler.
    ///
    /// ## Errors
    ///
    /// Returns an invalid chain setting, the first role mismatch or a
    /// handler initialization error.
    pub fn initialize(&mut self, config: &ChainConfig) -> SamlResult<()> {
        config.validate()?;
        self.validate_roles(config.role)?;
        for handler in &mut self.handlers {
            handler.initialize(config)?;
        }
        tracing::debug!(role = %config.role, handlers = ?self.names(), "initialized handler chain");
        Ok(())
    }

    /// Runs the generation pass.
    ///
    /// ## Errors
    ///
    /// Returns the first handler error.
    pub fn process_generate(
        &mut self,
        request: &mut HandlerRequest,
        response: &mut HandlerResponse,
    ) -> SamlResult<HandlerOutcome> {
        self.run(Phase::Generate, request, response)
    }

    /// Runs the request pass.
    ///
    /// ## Errors
    ///
    /// Returns the first handler error.
    pub fn process_request(
        &mut self,
        request: &mut HandlerRequest,
        response: &mut HandlerResponse,
    ) -> SamlResult<HandlerOutcome> {
        self.run(Phase::Request, request, response)
    }

    /// Runs the status response pass.
    ///
    /// ## Errors
    ///
    /// Returns the first handler error.
    pub fn process_status_response(
        &mut self,
        request: &mut HandlerRequest,
        response: &mut HandlerResponse,
    ) -> SamlResult<HandlerOutcome> {
        self.run(Phase::StatusResponse, request, response)
    }

    /// Runs the pass matching the request: generation when a mode is set,
    /// otherwise the request or status response pass for the inbound message.
    ///
    /// ## Errors
    ///
    /// Returns [`SamlError::InvalidRequest`] when the request carries neither a
    /// mode nor a message, or the first handler error.
    pub fn process(
        &mut self,
        request: &mut HandlerRequest,
        response: &mut HandlerResponse,
    ) -> SamlResult<HandlerOutcome> {
        if request.generation_mode.is_some() {
            return self.process_generate(request, response);
        }
        match request.message.as_ref().map(SamlMessage::is_request) {
            Some(true) => self.process_request(request, response),
            Some(false) => self.process_status_response(request, response),
            None => Err(SamlError::InvalidRequest(
                "nothing to process: no message and no generation mode".to_string(),
            )),
        }
    }

    /// Clears per-message state in every handler.
    pub fn reset(&mut self) {
        for handler in &mut self.handlers {
            handler.reset();
        }
    }

    fn run(
        &mut self,
        phase: Phase,
        request: &mut HandlerRequest,
        response: &mut HandlerResponse,
    ) -> SamlResult<HandlerOutcome> {
        for handler in &mut self.handlers {
            let outcome = match phase {
                Phase::Generate => handler.generate_saml_request(request, response),
                Phase::Request => handler.handle_request_type(request, response),
                Phase::StatusResponse => handler.handle_status_response_type(request, response),
            };
            match outcome {
                Ok(HandlerOutcome::Continue) => {}
                Ok(HandlerOutcome::Stop) => {
                    tracing::debug!(phase = phase.as_str(), handler = handler.name(), "handler stopped the chain");
                    return Ok(HandlerOutcome::Stop);
                }
                Err(err) => {
                    tracing::warn!(phase = phase.as_str(), handler = handler.name(), error = %err, "handler failed");
                    return Err(err);
                }
            }
        }
        Ok(HandlerOutcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use sts_protocol_saml::NameId;

    use super::*;
    use crate::request::GenerationMode;

    #[derive(Debug)]
    struct Step {
        name: &'static str,
        role: HandlerRole,
        outcome: Option<HandlerOutcome>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Step {
        fn boxed(
            name: &'static str,
            outcome: Option<HandlerOutcome>,
            log: &Arc<Mutex<Vec<String>>>,
        ) -> Box<dyn SamlHandler> {
            Box::new(Self {
                name,
                role: HandlerRole::Sp,
                outcome,
                log: Arc::clone(log),
            })
        }
    }

    impl SamlHandler for Step {
        fn name(&self) -> &str {
            self.name
        }

        fn role(&self) -> HandlerRole {
            self.role
        }

        fn generate_saml_request(
            &mut self,
            _request: &mut HandlerRequest,
            _response: &mut HandlerResponse,
        ) -> SamlResult<HandlerOutcome> {
            self.log.lock().push(self.name.to_string());
            self.outcome
                .ok_or_else(|| SamlError::InvalidRequest(format!("{} refused", self.name)))
        }

        fn reset(&mut self) {
            self.log.lock().push(format!("reset {}", self.name));
        }
    }

    fn generate_request() -> HandlerRequest {
        HandlerRequest::generate(NameId::entity("https://sp.example.com"), GenerationMode::Auth)
    }

    #[test]
    fn negative_chain_skew_is_rejected() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = HandlerChain::new();
        chain.add(Step::boxed("first", Some(HandlerOutcome::Continue), &log));

        let err = chain
            .initialize(&ChainConfig::new(HandlerRole::Sp).with_clock_skew_ms(-1))
            .unwrap_err();
        assert!(matches!(err, SamlError::Configuration(_)));
        assert!(err.to_string().contains("clock_skew_ms"));
    }

    #[test]
    fn runs_every_handler_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = HandlerChain::new();
        chain.add(Step::boxed("first", Some(HandlerOutcome::Continue), &log));
        chain.add(Step::boxed("second", Some(HandlerOutcome::Continue), &log));

        let outcome = chain
            .process(&mut generate_request(), &mut HandlerResponse::new())
            .unwrap();

        assert_eq!(outcome, HandlerOutcome::Continue);
        assert_eq!(*log.lock(), vec!["first", "second"]);
    }

    #[test]
    fn stop_skips_remaining_handlers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = HandlerChain::new();
        chain.add_all([
            Step::boxed("first", Some(HandlerOutcome::Stop), &log),
            Step::boxed("second", Some(HandlerOutcome::Continue), &log),
        ]);

        let outcome = chain
            .process_generate(&mut generate_request(), &mut HandlerResponse::new())
            .unwrap();

        assert!(outcome.is_stop());
        assert_eq!(*log.lock(), vec!["first"]);
    }

    #[test]
    fn error_aborts_the_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = HandlerChain::new();
        chain.add(Step::boxed("failing", None, &log));
        chain.add(Step::boxed("after", Some(HandlerOutcome::Continue), &log));

        let err = chain
            .process_generate(&mut generate_request(), &mut HandlerResponse::new())
            .unwrap_err();

        assert!(matches!(err, SamlError::InvalidRequest(_)));
        assert_eq!(*log.lock(), vec!["failing"]);
    }

    #[test]
    fn role_mismatch_is_rejected() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = HandlerChain::new();
        chain.add(Step::boxed("sp-only", Some(HandlerOutcome::Continue), &log));

        let err = chain
            .initialize(&ChainConfig::new(HandlerRole::Idp))
            .unwrap_err();
        assert!(matches!(err, SamlError::Configuration(_)));
        assert!(chain.initialize(&ChainConfig::new(HandlerRole::Sp)).is_ok());
    }

    #[test]
    fn reset_reaches_every_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = HandlerChain::new();
        chain.add(Step::boxed("a", Some(HandlerOutcome::Continue), &log));
        chain.add(Step::boxed("b", Some(HandlerOutcome::Continue), &log));

        chain.reset();
        assert_eq!(*log.lock(), vec!["reset a", "reset b"]);
        assert_eq!(chain.names(), vec!["a", "b"]);
    }

    #[test]
    fn nothing_to_process_is_an_error() {
        let mut chain = HandlerChain::new();
        let mut request = generate_request();
        request.generation_mode = None;
        assert!(chain.process(&mut request, &mut HandlerResponse::new()).is_err());
    }
}
