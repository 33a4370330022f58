//! Smart-contract scripting core.
//!
//! A [`SmartContract`] carries parties, bylaws and stashes. Bylaws hold typed
//! variables and clauses; the engine binds them into a [`Script`] and runs
//! clauses when hooks fire, callbacks are asked, or parties trigger them.

mod agent;
mod bylaw;
mod clause;
mod contract;
mod error;
mod interpreter;
mod ledger;
mod limits;
pub mod names;
mod party;
mod party_account;
mod script;
mod stash;
mod trace;
mod value;
mod variable;

#[cfg(test)]
mod tests;

pub use agent::{Agent, AgentKind};
pub use bylaw::{Bylaw, DEFAULT_LANGUAGE};
pub use clause::Clause;
pub use contract::{ContractState, SmartContract, NATIVE_FUNCTIONS};
pub use error::{EngineError, Result};
pub use ledger::{AccountLedger, InMemoryLedger, LedgerAccount};
pub use limits::{ScriptLimits, DEFAULT_MAX_DEPTH, DEFAULT_MAX_STEPS};
pub use party::{Party, PartyOwner};
pub use party_account::PartyAccount;
pub use script::{NativeHost, NoNatives, Script, BUILTIN_FUNCTIONS};
pub use stash::{Stash, StashItem};
pub use trace::{Event, ExecutionTrace, Trigger};
pub use value::{Value, VariableAccess, VariableType};
pub use variable::Variable;
