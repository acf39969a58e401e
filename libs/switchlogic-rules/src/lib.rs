//! switchlogic-rules - Switch logic rule engine
//!
//! Applies boolean logic over live signal values and drives outputs when the
//! result changes:
//! - Term decoding from the compact operand grammar
//! - Rule compilation into observable boolean streams
//! - Edge-triggered transitions delivered by notify or put
//! - Optional per-rule transition logs
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────┐
//! │SignalSource │────▶│  RuleEngine  │────▶│ OutputSink  │
//! │  (streams)  │     │  (combine)   │     │(notify/put) │
//! └─────────────┘     └──────────────┘     └─────────────┘
//!                            │
//!                            ▼
//!                     ┌──────────────┐
//!                     │ RuleLogger   │
//!                     │ (per rule)   │
//!                     └──────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use switchlogic_bus::{MemoryBus, MemorySink};
//! use switchlogic_rules::{EngineConfig, RuleConfig, RuleEngine};
//!
//! let bus = Arc::new(MemoryBus::new());
//! let sink = Arc::new(MemorySink::new());
//! let engine = RuleEngine::new(bus.clone(), sink.clone());
//!
//! let config = EngineConfig::with_rules(vec![RuleConfig::new("[0,1] and [0,2]", "[0,3]")]);
//! engine.start(&config).unwrap();
//!
//! bus.publish("electrical.switches.bank.0.1.state", json!(1));
//! bus.publish("electrical.switches.bank.0.2.state", json!(1));
//! assert_eq!(sink.deliveries()[0].value, json!(1));
//! ```

mod engine;
mod error;
pub mod logger;
pub mod rule;
pub mod term;
pub mod types;
pub mod value;

// Re-export public API
pub use engine::{
    stream_table, DroppedRule, EngineStatus, RuleEngine, RuleStatus, StartReport, PLUGIN_ID,
};
pub use error::{Result, RuleError};
pub use logger::{RuleLogger, RuleLoggerManager};
pub use rule::{decide, output_value, Action, RuleState};
pub use term::{Comparator, PathTest, Term, TermKind};
pub use types::{EngineConfig, RuleConfig, DEFAULT_PUT_PREFIXES};
