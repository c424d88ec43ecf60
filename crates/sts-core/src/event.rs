//! Security audit events for the token lifecycle.
//!
//! Every issue, renew, cancel and validate call produces a [`TokenEvent`]
//! recording who asked, which token was involved and whether it worked.
//! Events go to an injected [`EventSink`]; [`TracingEventSink`] writes them to
//! the log.

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Token lifecycle event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenEventType {
    /// Token issued.
    Issued,
    /// Token issuance failed.
    IssueError,
    /// Token renewed.
    Renewed,
    /// Token renewal failed.
    RenewError,
    /// Token cancelled.
    Cancelled,
    /// Token cancellation failed.
    CancelError,
    /// Token validated.
    Validated,
    /// Token failed validation.
    ValidationFailed,
    /// Token removed by an expiry sweep.
    Evicted,
    /// The caller was not allowed to use the STS.
    PermissionDenied,
}

/// Outcome of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOutcome {
    /// Operation succeeded.
    Success,
    /// Operation failed.
    Failure,
}

/// A security event for audit logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenEvent {
    /// Unique event identifier.
    pub id: Uuid,
    /// When the event happened.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: TokenEventType,
    /// Outcome of the event.
    pub outcome: EventOutcome,
    /// Token type URI or family involved.
    pub token_type: Option<String>,
    /// Assertion ID involved.
    pub token_id: Option<String>,
    /// Issuer of the token.
    pub issuer: Option<String>,
    /// Caller that requested the operation.
    pub principal: Option<String>,
    /// Error message, for failures.
    pub error: Option<String>,
    /// Additional details.
    pub details: Vec<(String, String)>,
}

impl TokenEvent {
    /// Creates a new event builder.
    #[must_use]
    pub const fn builder(event_type: TokenEventType) -> TokenEventBuilder {
        TokenEventBuilder::new(event_type)
    }
}

/// Builder for [`TokenEvent`].
#[derive(Debug)]
pub struct TokenEventBuilder {
    event_type: TokenEventType,
    outcome: EventOutcome,
    timestamp: Option<DateTime<Utc>>,
    token_type: Option<String>,
    token_id: Option<String>,
    issuer: Option<String>,
    principal: Option<String>,
    error: Option<String>,
    details: Vec<(String, String)>,
}

impl TokenEventBuilder {
    /// Creates a new event builder.
    #[must_use]
    pub const fn new(event_type: TokenEventType) -> Self {
        Self {
            event_type,
            outcome: EventOutcome::Success,
            timestamp: None,
            token_type: None,
            token_id: None,
            issuer: None,
            principal: None,
            error: None,
            details: Vec::new(),
        }
    }

    /// Marks the event as failed.
    #[must_use]
    pub fn failure(mut self, error: impl Into<String>) -> Self {
        self.outcome = EventOutcome::Failure;
        self.error = Some(error.into());
        self
    }

    /// Sets the event time. Defaults to the wall clock at [`build`](Self::build).
    #[must_use]
    pub const fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the token type.
    #[must_use]
    pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = Some(token_type.into());
        self
    }

    /// Sets the assertion ID.
    #[must_use]
    pub fn token_id(mut self, token_id: impl Into<String>) -> Self {
        self.token_id = Some(token_id.into());
        self
    }

    /// Sets the issuer.
    #[must_use]
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Sets the calling principal.
    #[must_use]
    pub fn principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    /// Adds a detail key-value pair.
    #[must_use]
    pub fn detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.push((key.into(), value.into()));
        self
    }

    /// Builds the event.
    #[must_use]
    pub fn build(self) -> TokenEvent {
        TokenEvent {
            id: Uuid::now_v7(),
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            event_type: self.event_type,
            outcome: self.outcome,
            token_type: self.token_type,
            token_id: self.token_id,
            issuer: self.issuer,
            principal: self.principal,
            error: self.error,
            details: self.details,
        }
    }
}

/// Receives audit events.
pub trait EventSink: Send + Sync + Debug {
    /// Records one event.
    fn emit(&self, event: &TokenEvent);
}

/// Writes events to the `tracing` log under the `sts::audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &TokenEvent) {
        match event.outcome {
            EventOutcome::Success => tracing::info!(
                target: "sts::audit",
                event_id = %event.id,
                event_type = ?event.event_type,
                token_type = event.token_type.as_deref(),
                token_id = event.token_id.as_deref(),
                issuer = event.issuer.as_deref(),
                principal = event.principal.as_deref(),
                "token event"
            ),
            EventOutcome::Failure => tracing::warn!(
                target: "sts::audit",
                event_id = %event.id,
                event_type = ?event.event_type,
                token_type = event.token_type.as_deref(),
                token_id = event.token_id.as_deref(),
                principal = event.principal.as_deref(),
                error = event.error.as_deref(),
                "token event failed"
            ),
        }
    }
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<TokenEvent>>,
}

impl RecordingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<TokenEvent> {
        self.events.lock().clone()
    }

    /// Returns the recorded event types in order.
    #[must_use]
    pub fn event_types(&self) -> Vec<TokenEventType> {
        self.events.lock().iter().map(|event| event.event_type).collect()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: &TokenEvent) {
        self.events.lock().push(event.clone());
    }
}
