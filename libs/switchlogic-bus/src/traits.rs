//! Trait definitions for the signal bus
//!
//! Rules read from a `SignalSource` and write to an `OutputSink`. The host
//! provides both; `MemoryBus` and `MemorySink` are the in-process
//! implementations.

use crate::error::Result;
use crate::observable::Observable;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Source of live signal values keyed by dotted path
pub trait SignalSource: Send + Sync + 'static {
    /// Stream of values at `path`
    ///
    /// Subscribers receive the current value (if any) on subscribe, then
    /// every subsequent update. Values are raw JSON; interpretation is up to
    /// the subscriber.
    fn stream(&self, path: &str) -> Observable<Value>;
}

impl<S: SignalSource + ?Sized> SignalSource for Arc<S> {
    fn stream(&self, path: &str) -> Observable<Value> {
        (**self).stream(path)
    }
}

/// Completion callback for a put request
pub type PutCallback = Box<dyn FnOnce(PutResponse) + Send>;

/// Destination for rule outputs
pub trait OutputSink: Send + Sync + 'static {
    /// Publish a value as a notification delta on behalf of `source`
    fn notify(&self, source: &str, path: &str, value: Value) -> Result<()>;

    /// Request that the device at `path` be set to `value`
    ///
    /// `ack` is invoked once with the outcome, possibly after this call
    /// returns.
    fn put(&self, path: &str, value: Value, ack: PutCallback) -> Result<()>;
}

impl<S: OutputSink + ?Sized> OutputSink for Arc<S> {
    fn notify(&self, source: &str, path: &str, value: Value) -> Result<()> {
        (**self).notify(source, path, value)
    }

    fn put(&self, path: &str, value: Value, ack: PutCallback) -> Result<()> {
        (**self).put(path, value, ack)
    }
}

/// How a rule output is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    Notify,
    Put,
}

impl std::fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryMode::Notify => write!(f, "notify"),
            DeliveryMode::Put => write!(f, "put"),
        }
    }
}

/// Put request state; sinks only ever report finished requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PutState {
    Completed,
}

/// Outcome of a put request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PutResponse {
    pub state: PutState,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PutResponse {
    pub fn completed() -> Self {
        Self {
            state: PutState::Completed,
            status_code: 200,
            message: None,
        }
    }

    pub fn failed(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            state: PutState::Completed,
            status_code,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}
