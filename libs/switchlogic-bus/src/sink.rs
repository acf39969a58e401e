//! In-memory output sink
//!
//! Records every delivery. With loopback enabled, delivered values are also
//! published back onto a `MemoryBus`, the way a device reports its new state
//! after a successful write.

use crate::error::Result;
use crate::memory_impl::MemoryBus;
use crate::traits::{DeliveryMode, OutputSink, PutCallback, PutResponse};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// A single recorded delivery
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delivery {
    pub mode: DeliveryMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub path: String,
    pub value: Value,
}

pub struct MemorySink {
    deliveries: Mutex<Vec<Delivery>>,
    put_response: Mutex<PutResponse>,
    loopback: Option<Arc<MemoryBus>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            deliveries: Mutex::new(Vec::new()),
            put_response: Mutex::new(PutResponse::completed()),
            loopback: None,
        }
    }

    /// Sink that republishes delivered values onto `bus`
    pub fn with_loopback(bus: Arc<MemoryBus>) -> Self {
        Self {
            loopback: Some(bus),
            ..Self::new()
        }
    }

    /// Response handed to subsequent put requests
    pub fn set_put_response(&self, response: PutResponse) {
        *self.put_response.lock() = response;
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().clone()
    }

    /// Remove and return all recorded deliveries
    pub fn take(&self) -> Vec<Delivery> {
        std::mem::take(&mut *self.deliveries.lock())
    }

    pub fn len(&self) -> usize {
        self.deliveries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.lock().is_empty()
    }

    fn record(&self, delivery: Delivery) {
        self.deliveries.lock().push(delivery);
    }

    fn echo(&self, path: &str, value: Value) {
        if let Some(bus) = &self.loopback {
            bus.publish(path, value);
        }
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputSink for MemorySink {
    fn notify(&self, source: &str, path: &str, value: Value) -> Result<()> {
        self.record(Delivery {
            mode: DeliveryMode::Notify,
            source: Some(source.to_string()),
            path: path.to_string(),
            value: value.clone(),
        });
        self.echo(path, value);
        Ok(())
    }

    fn put(&self, path: &str, value: Value, ack: PutCallback) -> Result<()> {
        self.record(Delivery {
            mode: DeliveryMode::Put,
            source: None,
            path: path.to_string(),
            value: value.clone(),
        });

        let response = self.put_response.lock().clone();
        let success = response.is_success();
        ack(response);
        if success {
            self.echo(path, value);
        }
        Ok(())
    }
}
