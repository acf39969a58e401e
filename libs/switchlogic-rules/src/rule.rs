//! Rule combination state machine
//!
//! A rule drives its output toward agreement with its input. On every joint
//! update of (input, output) it decides whether to turn the output on, turn
//! it off, or leave it alone, then derives the concrete value to deliver from
//! the output term.

use crate::error::{Result, RuleError};
use crate::term::{PathTest, Term, TermKind};
use crate::value::parse_literal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Transition fired by a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    TurnOn,
    TurnOff,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::TurnOn => "ON",
            Action::TurnOff => "OFF",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Decide the action for a joint (input, output) state
///
/// Fires only when the two disagree: input on with output off turns the
/// output on, input off with output on turns it off.
pub fn decide(input: bool, output: bool) -> Option<Action> {
    match (input, output) {
        (true, false) => Some(Action::TurnOn),
        (false, true) => Some(Action::TurnOff),
        _ => None,
    }
}

/// Last action a rule fired
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleState {
    #[default]
    Inactive,
    Off,
    On,
}

impl From<Action> for RuleState {
    fn from(action: Action) -> Self {
        match action {
            Action::TurnOn => RuleState::On,
            Action::TurnOff => RuleState::Off,
        }
    }
}

/// Value to deliver to the output term for an action
///
/// `Ok(None)` means there is nothing to deliver: a notification without an
/// off state has nothing to cancel to. Constant outputs cannot be driven.
pub fn output_value(term: &Term, action: Action) -> Result<Option<Value>> {
    let on = action == Action::TurnOn;

    match term.kind() {
        TermKind::Switch { .. } => Ok(Some(json!(if on { 1 } else { 0 }))),
        TermKind::Notification {
            onstate,
            offstate,
            message,
            methods,
        } => {
            if !on && offstate.is_none() {
                return Ok(None);
            }
            let state = if on { onstate } else { offstate };
            let message = match message {
                Some(m) => format!("{} ({})", m, action.label()),
                None => format!("{} state", action.label()),
            };
            Ok(Some(json!({
                "message": message,
                "state": state.as_deref().unwrap_or("normal"),
                "method": methods,
            })))
        },
        TermKind::Path(PathTest::Substitute { onvalue, offvalue }) => {
            Ok(Some(parse_literal(if on { onvalue } else { offvalue })))
        },
        TermKind::Path(PathTest::Present | PathTest::Compare { .. }) => {
            Ok(Some(json!(if on { 1 } else { 0 })))
        },
        TermKind::Off | TermKind::On => Err(RuleError::BadOutputType(term.type_name())),
    }
}
