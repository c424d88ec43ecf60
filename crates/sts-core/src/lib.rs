//! # sts-core
//!
//! Shared foundations for the security token service.
//!
//! - [`error`] - the error taxonomy every provider, registry and handler reports through
//! - [`config`] - typed configuration for providers and time handling
//! - [`time`] - clocks, XML-Schema `dateTime` handling and the validity-window predicate
//! - [`duration`] - XML-Schema durations and the legacy cache-duration parser
//! - [`event`] - security audit events for the token lifecycle

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod duration;
pub mod error;
pub mod event;
pub mod time;

pub use config::{ProviderConfig, RegistryKind, TimeConfig};
pub use duration::{XmlDuration, parse_as_duration};
pub use error::{ErrorKind, StsError, StsResult, ValidationFailure};
pub use event::{
    EventOutcome, EventSink, RecordingEventSink, TokenEvent, TokenEventType, TracingEventSink,
};
pub use time::{Clock, ManualClock, SystemClock, XmlDateTime, XmlTime, is_valid};
