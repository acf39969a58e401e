//! Integration tests for the rule engine
//!
//! Runs configured rules against the in-memory bus and sink.

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use serde_json::{json, Value};
use std::sync::Arc;
use switchlogic_bus::{DeliveryMode, MemoryBus, MemorySink, PutResponse, SignalSource};
use switchlogic_rules::{
    EngineConfig, RuleConfig, RuleEngine, RuleError, RuleLoggerManager, RuleState, PLUGIN_ID,
};

const IN: &str = "electrical.switches.bank.0.1.state";
const OUT: &str = "electrical.switches.bank.0.2.state";

struct Harness {
    bus: Arc<MemoryBus>,
    sink: Arc<MemorySink>,
    engine: RuleEngine,
}

impl Harness {
    fn new() -> Self {
        let bus = Arc::new(MemoryBus::new());
        let sink = Arc::new(MemorySink::new());
        let engine = RuleEngine::new(bus.clone(), sink.clone());
        Self { bus, sink, engine }
    }

    fn with_loopback() -> Self {
        let bus = Arc::new(MemoryBus::new());
        let sink = Arc::new(MemorySink::with_loopback(bus.clone()));
        let engine = RuleEngine::new(bus.clone(), sink.clone());
        Self { bus, sink, engine }
    }

    fn start(&self, rules: Vec<RuleConfig>) {
        self.engine.start(&EngineConfig::with_rules(rules)).unwrap();
    }

    fn values(&self) -> Vec<Value> {
        self.sink.take().into_iter().map(|d| d.value).collect()
    }
}

#[test]
fn test_turn_on_fires_once() {
    let h = Harness::new();
    h.bus.publish(IN, json!(0));
    h.bus.publish(OUT, json!(0));
    h.start(vec![RuleConfig::new("[0,1]", "[0,2]")]);
    assert!(h.sink.is_empty());

    h.bus.publish(IN, json!(1));
    h.bus.publish(IN, json!(1));

    let deliveries = h.sink.take();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].mode, DeliveryMode::Put);
    assert_eq!(deliveries[0].path, OUT);
    assert_eq!(deliveries[0].value, json!(1));

    let status = h.engine.status();
    assert_eq!(status.rules[0].state, RuleState::On);
    assert_eq!(status.rules[0].on_count, 1);
    assert_eq!(status.message.as_deref(), Some("switching [0,1] => [0,2] ON"));
}

#[test]
fn test_output_follows_input_with_loopback() {
    let h = Harness::with_loopback();
    h.start(vec![RuleConfig::new("[0,1]", "[0,2]")]);

    for v in [1, 1, 0, 0, 1] {
        h.bus.publish(IN, json!(v));
    }

    assert_eq!(h.values(), vec![json!(1), json!(0), json!(1)]);
    assert_eq!(h.bus.latest(OUT), Some(json!(1)));
}

#[test]
fn test_agreeing_output_is_left_alone() {
    let h = Harness::new();
    h.bus.publish(IN, json!(1));
    h.bus.publish(OUT, json!(1));
    h.start(vec![RuleConfig::new("[0,1]", "[0,2]")]);

    // Input on, output already on
    h.bus.publish(IN, json!(1));
    assert!(h.sink.is_empty());

    // Input off, output on
    h.bus.publish(IN, json!(0));
    assert_eq!(h.values(), vec![json!(0)]);
}

#[test]
fn test_turn_off_requires_output_on() {
    let h = Harness::new();
    h.start(vec![RuleConfig::new("[0,1]", "[0,2]")]);

    h.bus.publish(IN, json!(0));
    h.bus.publish(OUT, json!(0));
    assert!(h.sink.is_empty());
    assert_eq!(h.engine.status().rules[0].state, RuleState::Inactive);
}

#[test]
fn test_compound_expression() {
    let h = Harness::with_loopback();
    h.start(vec![RuleConfig::new(
        "tanks.fuel.0.currentLevel:lt:0.1 and not [pump]",
        "notifications.tanks.fuel.low:alert:normal:Fuel low",
    )]);

    h.bus.publish("electrical.switches.pump.state", json!(0));
    h.bus.publish("tanks.fuel.0.currentLevel", json!(0.5));
    assert!(h.sink.is_empty());

    h.bus.publish("tanks.fuel.0.currentLevel", json!(0.05));
    h.bus.publish("electrical.switches.pump.state", json!(1));

    let deliveries = h.sink.take();
    assert_eq!(deliveries.len(), 2);
    assert_eq!(deliveries[0].mode, DeliveryMode::Notify);
    assert_eq!(deliveries[0].source.as_deref(), Some(PLUGIN_ID));
    assert_eq!(deliveries[0].path, "notifications.tanks.fuel.low");
    assert_eq!(
        deliveries[0].value,
        json!({"message": "Fuel low (ON)", "state": "alert", "method": []})
    );
    assert_eq!(
        deliveries[1].value,
        json!({"message": "Fuel low (OFF)", "state": "normal", "method": []})
    );
}

#[test]
fn test_notification_without_offstate_is_not_cancelled() {
    let h = Harness::with_loopback();
    h.start(vec![RuleConfig::new("[0,1]", "notifications.bilge:alarm")]);

    h.bus.publish(IN, json!(1));
    h.bus.publish(IN, json!(0));

    let deliveries = h.sink.take();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].value["state"], json!("alarm"));
    assert_eq!(h.engine.status().rules[0].state, RuleState::Off);
}

#[test]
fn test_path_substitution_output() {
    let h = Harness::with_loopback();
    h.start(vec![RuleConfig::new("[0,1]", "steering.autopilot.state:auto:standby")]);

    h.bus.publish(IN, json!(1));
    h.bus.publish(IN, json!(0));

    assert_eq!(h.values(), vec![json!("auto"), json!("standby")]);
    assert_eq!(h.bus.latest("steering.autopilot.state"), Some(json!("standby")));
}

#[test]
fn test_delivery_mode_selection() {
    let h = Harness::new();
    h.start(vec![
        RuleConfig::new("[0,1]", "lights.anchor"),
        RuleConfig::new("[0,1]", "lights.deck").with_use_put(true),
    ]);
    h.bus.publish(IN, json!(1));

    let mut modes: Vec<(String, DeliveryMode)> =
        h.sink.take().into_iter().map(|d| (d.path, d.mode)).collect();
    modes.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        modes,
        vec![
            ("lights.anchor".to_string(), DeliveryMode::Notify),
            ("lights.deck".to_string(), DeliveryMode::Put),
        ]
    );
}

#[test]
fn test_constant_input_fires_at_start() {
    let h = Harness::new();
    h.start(vec![RuleConfig::new("on", "[0,2]")]);
    assert_eq!(h.values(), vec![json!(1)]);
}

#[test]
fn test_failed_put_does_not_stop_rule() {
    let h = Harness::with_loopback();
    h.sink.set_put_response(PutResponse::failed(502, "unreachable"));
    h.start(vec![RuleConfig::new("[0,1]", "[0,2]")]);

    h.bus.publish(IN, json!(1));
    assert_eq!(h.values(), vec![json!(1)]);
    assert_eq!(h.bus.latest(OUT), None);

    h.sink.set_put_response(PutResponse::completed());
    h.bus.publish(IN, json!(0));
    h.bus.publish(IN, json!(1));
    // Output never reported on, so only the second ON goes out
    assert_eq!(h.values(), vec![json!(1)]);
    assert_eq!(h.bus.latest(OUT), Some(json!(1)));
}

#[test]
fn test_bad_rules_are_dropped() {
    let h = Harness::new();
    let config = EngineConfig::with_rules(vec![
        RuleConfig::new("[0,1] [0,3]", "[0,2]"),
        RuleConfig::new("[0,1]", "a:b:c:d"),
        RuleConfig::new("(x or y", "[0,2]"),
        RuleConfig {
            input: Some("[0,1]".to_string()),
            ..RuleConfig::default()
        },
        RuleConfig::new("[0,1]", ""),
        RuleConfig::new("[0,1]", "[0,2]").with_description("good"),
    ]);

    let report = h.engine.start(&config).unwrap();

    assert_eq!(report.activated, vec!["good".to_string()]);
    assert_eq!(report.dropped.len(), 4);
    assert_eq!(report.dropped[0].reason, "missing 'output' property");
    assert!(report.dropped[1].reason.contains("Malformed expression '[0,1] [0,3]'"));
    assert!(report.dropped[2].reason.contains("Undefined term"));
    assert!(report.dropped[3].reason.contains("Unmatched '('"));
    assert_eq!(report.skipped, vec!["[0,1] => ".to_string()]);

    let status = h.engine.status();
    assert!(status.running);
    assert_eq!(status.rules.len(), 1);
    assert_eq!(status.message.as_deref(), Some("Operating 5 rules"));
    assert!(status
        .last_error
        .unwrap()
        .starts_with("ignoring badly formed rule '(x or y => [0,2]'"));
}

#[test]
fn test_dangling_operator_rule_still_runs() {
    let h = Harness::new();
    h.bus.publish(OUT, json!(0));
    let report = h
        .engine
        .start(&EngineConfig::with_rules(vec![RuleConfig::new("[0,1] and", "[0,2]")]))
        .unwrap();
    assert_eq!(report.activated.len(), 1);
    assert!(report.dropped.is_empty());

    h.bus.publish(IN, json!(1));
    assert_eq!(h.values(), vec![json!(1)]);
}

#[test]
fn test_constant_output_reports_internal_error() {
    let h = Harness::new();
    h.start(vec![RuleConfig::new("[0,1]", "on").with_description("forced")]);

    h.bus.publish(IN, json!(0));
    assert!(h.sink.is_empty());

    let status = h.engine.status();
    assert_eq!(
        status.last_error.as_deref(),
        Some("internal error - bad output type (on) on rule forced")
    );
    assert!(status.running);
    assert_eq!(status.rules[0].state, RuleState::Inactive);
}

#[test]
fn test_stop_is_idempotent_and_detaches() {
    let h = Harness::new();
    h.start(vec![RuleConfig::new("[0,1]", "[0,2]")]);
    assert!(h.bus.stats().subscriber_count > 0);

    h.engine.stop();
    h.engine.stop();

    assert!(!h.engine.is_running());
    assert_eq!(h.bus.stats().subscriber_count, 0);
    h.bus.publish(IN, json!(1));
    assert!(h.sink.is_empty());

    // Restart after stop
    h.start(vec![RuleConfig::new("[0,1]", "[0,2]")]);
    assert_eq!(h.values(), vec![json!(1)]);
}

#[test]
fn test_rules_are_independent() {
    let h = Harness::new();
    h.start(vec![
        RuleConfig::new("[0,1]", "[0,2]"),
        RuleConfig::new("not [0,1]", "[0,3]"),
    ]);

    let paths = |sink: &MemorySink| -> Vec<String> {
        sink.take().into_iter().map(|d| d.path).collect()
    };

    // The inverted rule turns its output on as soon as it starts
    assert_eq!(paths(&h.sink), vec!["electrical.switches.bank.0.3.state".to_string()]);

    h.bus.publish(IN, json!(1));
    assert_eq!(paths(&h.sink), vec![OUT.to_string()]);
}

#[test]
fn test_transition_log_files() {
    let dir = tempfile::tempdir().unwrap();
    let bus = Arc::new(MemoryBus::new());
    let sink = Arc::new(MemorySink::new());
    let loggers = Arc::new(RuleLoggerManager::new(dir.path().to_path_buf()));
    let engine = RuleEngine::new(bus.clone(), sink.clone()).with_rule_logs(loggers);

    let mut rule = RuleConfig::new("[0,1]", "[0,2]").with_description("bilge pump");
    rule.id = Some("bilge".to_string());
    engine.start(&EngineConfig::with_rules(vec![rule])).unwrap();
    bus.publish(IN, json!(1));

    let rule_dir = dir.path().join("rules").join("bilge");
    let entries: Vec<_> = std::fs::read_dir(&rule_dir).unwrap().collect();
    assert_eq!(entries.len(), 1);
    let content = std::fs::read_to_string(entries[0].as_ref().unwrap().path()).unwrap();
    assert!(content.contains("bilge pump | ON | put electrical.switches.bank.0.2.state <= 1"));
}

#[test]
fn test_start_with_no_rules() {
    let h = Harness::new();
    let config = EngineConfig::with_rules(vec![RuleConfig {
        output: Some("[0,2]".to_string()),
        ..RuleConfig::default()
    }]);
    assert!(matches!(h.engine.start(&config), Err(RuleError::NoRules)));
}

#[test]
fn test_engine_accepts_trait_objects() {
    let bus: Arc<dyn SignalSource> = Arc::new(MemoryBus::new());
    let engine = RuleEngine::new(bus, Arc::new(MemorySink::new()));
    assert!(engine.evaluate("1 or 0").is_some());
}
