//! switchlogic-bus - Signal bus abstraction for switchlogic
//!
//! Provides push-based observable values and the two seams between the rule
//! engine and its host:
//!
//! - **SignalSource**: live values keyed by dotted path
//! - **OutputSink**: notification deltas and put requests
//!
//! `MemoryBus` and `MemorySink` are in-process implementations used by the
//! service host and by tests.

pub mod error;
pub mod memory_impl;
pub mod observable;
pub mod sink;
pub mod traits;

// Re-exports
pub use error::{BusError, Result};
pub use memory_impl::{BusStats, MemoryBus};
pub use observable::{Callback, Observable, Subject, Subscription};
pub use sink::{Delivery, MemorySink};
pub use traits::{DeliveryMode, OutputSink, PutCallback, PutResponse, PutState, SignalSource};
