//! Term decoder
//!
//! A term is one operand of a rule: a constant, a switch, a notification or a
//! signal path with an optional comparison or value substitution. Terms are
//! written in a compact string grammar, tried in order:
//!
//! | Form | Kind |
//! |------|------|
//! | `""`, `off`, `false`, `0` | off |
//! | `on`, `true`, `1` | on |
//! | `[instance,channel]` | switch at `electrical.switches.bank.<instance>.<channel>.state` |
//! | `[channel]` | switch at `electrical.switches.<channel>.state` |
//! | `notifications.<path>[:onstate[:offstate[:message[:methods]]]]` | notification |
//! | `path`, `path:value`, `path:cmp:value`, `path:onvalue:offvalue` | path |
//!
//! Every term yields a boolean stream, built once on first use.

use crate::error::{Result, RuleError};
use crate::value::{is_truthy, matches_literal, numeric, parse_number, signal_bit, text};
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::sync::{LazyLock, OnceLock};
use switchlogic_bus::{Observable, SignalSource};
use tracing::debug;

static BANK_SWITCH: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^\[(.+),(.+)\]$"));

static SWITCH: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^\[(.+)\]$"));

fn pattern(re: &'static LazyLock<std::result::Result<Regex, regex::Error>>) -> Result<&'static Regex> {
    re.as_ref()
        .map_err(|e| RuleError::internal(format!("Regex error: {}", e)))
}

/// Path comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparator {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "lt" => Some(Self::Lt),
            "le" => Some(Self::Le),
            "gt" => Some(Self::Gt),
            "ge" => Some(Self::Ge),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::Gt => "gt",
            Self::Ge => "ge",
        }
    }

    /// Compare a host value against a term operand
    ///
    /// The host value's type decides the ordering: numbers and booleans
    /// compare numerically against a numeric operand, everything else
    /// compares as text (so the string "10" sorts before "9"). A null value
    /// never satisfies any comparison.
    pub fn test(&self, actual: &Value, operand: &str) -> bool {
        let ordering = match actual {
            Value::Null => return false,
            Value::Number(_) | Value::Bool(_) => match (numeric(actual), parse_number(operand)) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => Some(text(actual).as_str().cmp(operand)),
            },
            Value::String(_) | Value::Array(_) | Value::Object(_) => {
                Some(text(actual).as_str().cmp(operand))
            },
        };
        match ordering {
            Some(o) => self.holds(o),
            None => false,
        }
    }

    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a path term reads its value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathTest {
    /// Value is used directly as a signal bit
    Present,
    /// Value is compared against an operand
    Compare { comparator: Comparator, value: String },
    /// Value maps to on/off by equality; on output these are written instead of 1/0
    Substitute { onvalue: String, offvalue: String },
}

/// Decoded term kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermKind {
    Off,
    On,
    Switch {
        instance: Option<String>,
        channel: String,
    },
    Notification {
        onstate: Option<String>,
        offstate: Option<String>,
        message: Option<String>,
        methods: Vec<String>,
    },
    Path(PathTest),
}

/// A decoded operand
#[derive(Debug)]
pub struct Term {
    path: Option<String>,
    kind: TermKind,
    stream: OnceLock<Observable<bool>>,
}

impl Term {
    fn new(path: Option<String>, kind: TermKind) -> Self {
        Self {
            path,
            kind,
            stream: OnceLock::new(),
        }
    }

    /// Decode a term string
    ///
    /// Fails with `RuleError::UndefinedTerm` when the string matches no form.
    pub fn parse(term: &str) -> Result<Self> {
        match term {
            "" | "off" | "false" | "0" => return Ok(Self::new(None, TermKind::Off)),
            "on" | "true" | "1" => return Ok(Self::new(None, TermKind::On)),
            _ => {},
        }

        if let Some(caps) = pattern(&BANK_SWITCH)?.captures(term) {
            let instance = caps[1].to_string();
            let channel = caps[2].to_string();
            let path = format!("electrical.switches.bank.{}.{}.state", instance, channel);
            return Ok(Self::new(
                Some(path),
                TermKind::Switch {
                    instance: Some(instance),
                    channel,
                },
            ));
        }

        if let Some(caps) = pattern(&SWITCH)?.captures(term) {
            let channel = caps[1].to_string();
            let path = format!("electrical.switches.{}.state", channel);
            return Ok(Self::new(
                Some(path),
                TermKind::Switch {
                    instance: None,
                    channel,
                },
            ));
        }

        if term.starts_with("notifications.") {
            return Self::parse_notification(term);
        }

        Self::parse_path(term)
    }

    fn parse_notification(term: &str) -> Result<Self> {
        let parts: Vec<&str> = term.split(':').collect();
        let segment = |i: usize| {
            parts
                .get(i)
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
        };

        let (onstate, offstate, message, methods) = match parts.len() {
            1 => (None, None, None, Vec::new()),
            2 => (segment(1), None, None, Vec::new()),
            3 => (segment(1), segment(2), None, Vec::new()),
            4 => (segment(1), segment(2), segment(3), Vec::new()),
            5 => (
                segment(1),
                segment(2),
                segment(3),
                parts[4]
                    .split(',')
                    .filter(|m| !m.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            _ => return Err(RuleError::undefined_term(term)),
        };

        Ok(Self::new(
            Some(parts[0].to_string()),
            TermKind::Notification {
                onstate,
                offstate,
                message,
                methods,
            },
        ))
    }

    fn parse_path(term: &str) -> Result<Self> {
        let parts: Vec<&str> = term.split(':').collect();
        if parts[0].is_empty() {
            return Err(RuleError::undefined_term(term));
        }

        let test = match parts.as_slice() {
            [_] => PathTest::Present,
            [_, value] => PathTest::Compare {
                comparator: Comparator::Eq,
                value: value.to_string(),
            },
            [_, middle, last] => match Comparator::parse(middle) {
                Some(comparator) => PathTest::Compare {
                    comparator,
                    value: last.to_string(),
                },
                None => PathTest::Substitute {
                    onvalue: middle.to_string(),
                    offvalue: last.to_string(),
                },
            },
            _ => return Err(RuleError::undefined_term(term)),
        };

        Ok(Self::new(Some(parts[0].to_string()), TermKind::Path(test)))
    }

    pub fn kind(&self) -> &TermKind {
        &self.kind
    }

    /// Signal path, absent for constants
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind {
            TermKind::Off => "off",
            TermKind::On => "on",
            TermKind::Switch { .. } => "switch",
            TermKind::Notification { .. } => "notification",
            TermKind::Path(_) => "path",
        }
    }

    /// Boolean stream for this term
    ///
    /// Built from `source` on the first call and reused afterwards. The
    /// stream only carries genuine changes: values that are not signal bits
    /// are dropped, as are consecutive repeats.
    pub fn stream(&self, source: &dyn SignalSource) -> Observable<bool> {
        self.stream.get_or_init(|| self.build_stream(source)).clone()
    }

    fn build_stream(&self, source: &dyn SignalSource) -> Observable<bool> {
        let path = self.path.clone().unwrap_or_default();
        let label = format!("{} stream {}", self.type_name(), path);

        let bits: Observable<bool> = match &self.kind {
            TermKind::Off => Observable::constant(false),
            TermKind::On => Observable::constant(true),
            TermKind::Switch { .. } | TermKind::Path(PathTest::Present) => source
                .stream(&path)
                .to_property(Value::from(0))
                .filter_map(signal_bit),
            TermKind::Notification { onstate, .. } => {
                let onstate = onstate.clone();
                source
                    .stream(&path)
                    .map(move |v| notification_active(v, onstate.as_deref()))
                    .to_property(false)
            },
            TermKind::Path(PathTest::Compare { comparator, value }) => {
                let comparator = *comparator;
                let value = value.clone();
                source.stream(&path).map(move |v| comparator.test(v, &value))
            },
            TermKind::Path(PathTest::Substitute { onvalue, offvalue }) => {
                let onvalue = onvalue.clone();
                let offvalue = offvalue.clone();
                source
                    .stream(&path)
                    .to_property(Value::from(0))
                    .filter_map(move |v| {
                        if matches_literal(v, &onvalue) {
                            Some(true)
                        } else if matches_literal(v, &offvalue) {
                            Some(false)
                        } else {
                            signal_bit(v)
                        }
                    })
            },
        };

        bits.skip_duplicates()
            .tap(move |bit| debug!("{} issuing {}", label, u8::from(*bit)))
    }
}

fn notification_active(value: &Value, onstate: Option<&str>) -> bool {
    if !is_truthy(value) {
        return false;
    }
    match onstate {
        Some(expected) => value.get("state").and_then(Value::as_str) == Some(expected),
        None => true,
    }
}

impl Clone for Term {
    fn clone(&self) -> Self {
        Self::new(self.path.clone(), self.kind.clone())
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.kind == other.kind
    }
}

impl Eq for Term {}
