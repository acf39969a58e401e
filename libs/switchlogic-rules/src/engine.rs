//! Rule engine
//!
//! Compiles configured rules into subscriptions over a signal source and
//! delivers their transitions to an output sink.
//!
//! ```text
//! input expression ──▶ ExpressionParser ──▶ Observable<bool> ─┐
//!                                                             ├─▶ decide ──▶ OutputSink
//! output term ───────▶ Term::stream ───────▶ Observable<bool> ─┘
//! ```
//!
//! Rules share no state with each other. Each rule keeps its own runtime
//! counters; the engine keeps only the subscription handles and a status
//! board.

use crate::error::{Result, RuleError};
use crate::logger::{RuleLogger, RuleLoggerManager};
use crate::rule::{decide, output_value, Action, RuleState};
use crate::term::Term;
use crate::types::{EngineConfig, RuleConfig};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use switchlogic_bus::{DeliveryMode, Observable, OutputSink, PutResponse, SignalSource, Subscription};
use switchlogic_expr::{ExpressionParser, OperatorTable};
use tracing::{debug, error, info, warn};

/// Identity attached to notification deltas
pub const PLUGIN_ID: &str = "switchlogic";

/// Operator table over term streams
///
/// Operands are decoded as terms and resolved to their streams; undefined
/// terms fail to resolve, which makes the whole expression malformed.
pub fn stream_table(source: Arc<dyn SignalSource>) -> OperatorTable<Observable<bool>> {
    OperatorTable::new(move |token: &str| match Term::parse(token) {
        Ok(term) => Some(term.stream(&*source)),
        Err(e) => {
            warn!("{}", e);
            None
        },
    })
    .unary("not", 3, |a: Observable<bool>| a.negate())
    .binary("and", 2, |a: Observable<bool>, b: Observable<bool>| {
        a.combine(&b, |x: &bool, y: &bool| {
            debug!("and-ing {} and {}", u8::from(*x), u8::from(*y));
            *x && *y
        })
    })
    .binary("or", 1, |a: Observable<bool>, b: Observable<bool>| {
        a.combine(&b, |x: &bool, y: &bool| {
            debug!("or-ing {} and {}", u8::from(*x), u8::from(*y));
            *x || *y
        })
    })
}

/// Rule that was not activated
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedRule {
    pub rule: String,
    pub reason: String,
}

/// Outcome of starting the engine
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StartReport {
    /// Descriptions of activated rules
    pub activated: Vec<String>,
    /// Rules rejected at registration
    pub dropped: Vec<DroppedRule>,
    /// Disabled rules and rules with an empty output
    pub skipped: Vec<String>,
}

/// Per-rule status snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleStatus {
    pub key: String,
    pub description: String,
    pub input: String,
    pub output: String,
    pub mode: DeliveryMode,
    pub state: RuleState,
    pub on_count: u64,
    pub off_count: u64,
}

/// Engine status snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatus {
    pub running: bool,
    pub message: Option<String>,
    pub last_error: Option<String>,
    pub rules: Vec<RuleStatus>,
}

/// Status and error lines, as shown to an operator
#[derive(Default)]
struct StatusBoard {
    message: Mutex<Option<String>>,
    last_error: Mutex<Option<String>>,
}

impl StatusBoard {
    fn set_message(&self, message: String) {
        info!("{}", message);
        *self.message.lock() = Some(message);
    }

    fn set_error(&self, message: String) {
        *self.last_error.lock() = Some(message);
    }
}

#[derive(Default)]
struct RuleRuntime {
    state: Mutex<RuleState>,
    on_count: AtomicU64,
    off_count: AtomicU64,
}

impl RuleRuntime {
    fn record(&self, action: Action) {
        *self.state.lock() = RuleState::from(action);
        let counter = match action {
            Action::TurnOn => &self.on_count,
            Action::TurnOff => &self.off_count,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Applies fired transitions to the output
struct TransitionHandler {
    description: String,
    output: Arc<Term>,
    mode: DeliveryMode,
    sink: Arc<dyn OutputSink>,
    runtime: Arc<RuleRuntime>,
    board: Arc<StatusBoard>,
    logger: Option<Arc<RuleLogger>>,
}

impl TransitionHandler {
    fn handle(&self, action: Action) {
        self.board
            .set_message(format!("switching {} {}", self.description, action));

        let value = match output_value(&self.output, action) {
            Ok(value) => value,
            Err(e) => {
                let message = format!("internal error - {} on rule {}", e, self.description);
                error!("{}", message);
                if let Some(logger) = &self.logger {
                    logger.log_error(&self.description, action, &message);
                }
                self.board.set_error(message);
                return;
            },
        };

        self.runtime.record(action);

        let path = self.output.path().unwrap_or_default();
        if let Some(logger) = &self.logger {
            logger.log_transition(
                &self.description,
                action,
                value.as_ref().map(|v| (self.mode, path, v)),
            );
        }

        match value {
            Some(value) => self.deliver(path, value),
            None => debug!("{} {}: nothing to deliver", self.description, action),
        }
    }

    fn deliver(&self, path: &str, value: Value) {
        match self.mode {
            DeliveryMode::Notify => {
                debug!("issuing delta update ({} <= {})", path, value);
                if let Err(e) = self.sink.notify(PLUGIN_ID, path, value) {
                    debug!("delta update to {} failed: {}", path, e);
                }
            },
            DeliveryMode::Put => {
                debug!("issuing put request ({} <= {})", path, value);
                let ack_path = path.to_string();
                let ack = Box::new(move |response: PutResponse| {
                    debug!(
                        "put response ({}): {}",
                        ack_path,
                        serde_json::to_string(&response).unwrap_or_default()
                    );
                });
                if let Err(e) = self.sink.put(path, value, ack) {
                    debug!("put request to {} failed: {}", path, e);
                }
            },
        }
    }
}

struct CompiledRule {
    key: String,
    description: String,
    input: String,
    output: String,
    output_term: Arc<Term>,
    mode: DeliveryMode,
    actions: Observable<Action>,
}

struct ActiveRule {
    key: String,
    description: String,
    input: String,
    output: String,
    mode: DeliveryMode,
    runtime: Arc<RuleRuntime>,
    subscription: Subscription,
}

/// Rule engine bound to a signal source and an output sink
pub struct RuleEngine {
    source: Arc<dyn SignalSource>,
    sink: Arc<dyn OutputSink>,
    parser: ExpressionParser<Observable<bool>>,
    loggers: Option<Arc<RuleLoggerManager>>,
    board: Arc<StatusBoard>,
    active: Mutex<Vec<ActiveRule>>,
    running: AtomicBool,
}

impl RuleEngine {
    pub fn new(source: Arc<dyn SignalSource>, sink: Arc<dyn OutputSink>) -> Self {
        let parser = ExpressionParser::new(stream_table(Arc::clone(&source)));
        Self {
            source,
            sink,
            parser,
            loggers: None,
            board: Arc::new(StatusBoard::default()),
            active: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
        }
    }

    /// Write every fired transition to a per-rule log file
    pub fn with_rule_logs(mut self, loggers: Arc<RuleLoggerManager>) -> Self {
        self.loggers = Some(loggers);
        self
    }

    /// Compile and evaluate an input expression against the signal source
    pub fn evaluate(&self, expression: &str) -> Option<Observable<bool>> {
        self.parser.parse_expression(expression)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Register and activate every configured rule
    ///
    /// Rules that fail to compile are dropped and reported; they never stop
    /// the remaining rules from starting. Fails only when the engine is
    /// already running or no usable rule is configured.
    pub fn start(&self, config: &EngineConfig) -> Result<StartReport> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(RuleError::AlreadyRunning);
        }

        let mut report = StartReport::default();
        let mut candidates: Vec<(usize, &RuleConfig)> = Vec::new();
        let mut valid = 0usize;

        for (index, rule) in config.rules.iter().enumerate() {
            if !rule.enabled {
                report.skipped.push(rule.display_name());
                continue;
            }
            if let Err(e) = validate(rule) {
                self.report_dropped(&mut report, rule.display_name(), &e, "Dropping rule");
                continue;
            }
            valid += 1;
            if rule.output.as_deref() == Some("") {
                report.skipped.push(rule.display_name());
                continue;
            }
            candidates.push((index, rule));
        }

        if valid == 0 {
            let e = RuleError::NoRules;
            error!("{}", e);
            self.board.set_error(e.to_string());
            self.running.store(false, Ordering::SeqCst);
            return Err(e);
        }

        self.board.set_message(format!(
            "Operating {} rule{}",
            valid,
            if valid == 1 { "" } else { "s" }
        ));

        let mut activated = Vec::with_capacity(candidates.len());
        for (index, rule) in candidates {
            let name = rule.display_name();
            debug!("enabling rule {}", name);

            match self.compile(index, rule, config) {
                Ok(compiled) => {
                    report.activated.push(compiled.description.clone());
                    activated.push(self.activate(compiled));
                },
                Err(e) => self.report_dropped(&mut report, name, &e, "ignoring badly formed rule"),
            }
        }

        info!(
            "Rule engine started: {} active, {} dropped, {} skipped",
            report.activated.len(),
            report.dropped.len(),
            report.skipped.len()
        );
        self.active.lock().extend(activated);
        Ok(report)
    }

    /// Unsubscribe every rule; calling again is a no-op
    pub fn stop(&self) {
        let rules = std::mem::take(&mut *self.active.lock());
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        for rule in &rules {
            rule.subscription.unsubscribe();
            if let Some(loggers) = &self.loggers {
                loggers.remove_logger(&rule.key);
            }
        }
        self.board.set_message(format!("Stopped ({} rules released)", rules.len()));
    }

    pub fn status(&self) -> EngineStatus {
        let rules = self
            .active
            .lock()
            .iter()
            .map(|rule| RuleStatus {
                key: rule.key.clone(),
                description: rule.description.clone(),
                input: rule.input.clone(),
                output: rule.output.clone(),
                mode: rule.mode,
                state: *rule.runtime.state.lock(),
                on_count: rule.runtime.on_count.load(Ordering::Relaxed),
                off_count: rule.runtime.off_count.load(Ordering::Relaxed),
            })
            .collect();

        EngineStatus {
            running: self.is_running(),
            message: self.board.message.lock().clone(),
            last_error: self.board.last_error.lock().clone(),
            rules,
        }
    }

    fn report_dropped(&self, report: &mut StartReport, rule: String, e: &RuleError, context: &str) {
        let message = format!("{} '{}' ({})", context, rule, e);
        warn!("{}", message);
        self.board.set_error(message);
        report.dropped.push(DroppedRule {
            rule,
            reason: e.to_string(),
        });
    }

    fn compile(&self, index: usize, rule: &RuleConfig, config: &EngineConfig) -> Result<CompiledRule> {
        let input = rule.input.clone().unwrap_or_default();
        let output = rule.output.clone().unwrap_or_default();

        let output_term = Arc::new(Term::parse(&output)?);
        let prefix = self
            .parser
            .infix_to_prefix(&input)
            .map_err(|e| RuleError::malformed(&input, e))?;
        let input_stream = self.parser.parse_prefix(&prefix).ok_or_else(|| {
            RuleError::malformed(&input, "expression does not reduce to a single value")
        })?;
        let output_stream = output_term.stream(&*self.source);

        let path = output_term.path().unwrap_or_default();
        let mode = if rule.use_put || config.puts_to(path) {
            DeliveryMode::Put
        } else {
            DeliveryMode::Notify
        };

        let actions = input_stream
            .skip_duplicates()
            .combine(&output_stream, |i: &bool, o: &bool| decide(*i, *o))
            .filter_map(|action: &Option<Action>| *action);

        Ok(CompiledRule {
            key: rule.id.clone().unwrap_or_else(|| (index + 1).to_string()),
            description: rule.display_name(),
            input,
            output,
            output_term,
            mode,
            actions,
        })
    }

    fn activate(&self, compiled: CompiledRule) -> ActiveRule {
        let runtime = Arc::new(RuleRuntime::default());
        let handler = TransitionHandler {
            description: compiled.description.clone(),
            output: compiled.output_term,
            mode: compiled.mode,
            sink: Arc::clone(&self.sink),
            runtime: Arc::clone(&runtime),
            board: Arc::clone(&self.board),
            logger: self.loggers.as_ref().map(|m| m.get_logger(&compiled.key)),
        };

        let subscription = compiled.actions.subscribe(move |action| handler.handle(*action));

        ActiveRule {
            key: compiled.key,
            description: compiled.description,
            input: compiled.input,
            output: compiled.output,
            mode: compiled.mode,
            runtime,
            subscription,
        }
    }
}

impl Drop for RuleEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn validate(rule: &RuleConfig) -> Result<()> {
    if rule.input.as_deref().is_none_or(str::is_empty) {
        return Err(RuleError::MissingProperty("input"));
    }
    if rule.output.is_none() {
        return Err(RuleError::MissingProperty("output"));
    }
    Ok(())
}
