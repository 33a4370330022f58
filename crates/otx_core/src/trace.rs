use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// What caused a clause to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Trigger {
    Hook(String),
    Callback(String),
    Party(String),
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Hook(name) => write!(f, "hook {}", name),
            Trigger::Callback(name) => write!(f, "callback {}", name),
            Trigger::Party(name) => write!(f, "party {}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Activated {
        contract: String,
    },
    Deactivated {
        contract: String,
    },
    ClauseExecuted {
        bylaw: String,
        clause: String,
        trigger: Trigger,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
    },
    VariableChanged {
        bylaw: String,
        variable: String,
        from: Value,
        to: Value,
        important: bool,
    },
    FundsMoved {
        from: String,
        to: String,
        amount: i64,
    },
    FundsStashed {
        account: String,
        stash: String,
        instrument_definition_id: String,
        amount: i64,
    },
    FundsUnstashed {
        account: String,
        stash: String,
        instrument_definition_id: String,
        amount: i64,
    },
    NoticeSent {
        party: String,
        reason: String,
    },
    NativeCallFailed {
        function: String,
        reason: String,
    },
}

/// Ordered record of everything a contract operation did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    events: Vec<Event>,
}

impl ExecutionTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn extend(&mut self, other: ExecutionTrace) {
        self.events.extend(other.events);
    }
}
