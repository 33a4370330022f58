use otx_script::{ParseError, Span};

use crate::value::VariableType;

/// Errors raised while building or running a smart contract.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EngineError {
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("{kind} '{name}' already exists")]
    DuplicateName { kind: &'static str, name: String },

    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("type mismatch for '{name}': expected {expected}, found {found}")]
    TypeMismatch {
        name: String,
        expected: VariableType,
        found: VariableType,
    },

    #[error("constant '{name}' cannot be modified")]
    ConstantModified { name: String },

    #[error("'{name}' is a read-only binding")]
    ReadOnlyBinding { name: String },

    #[error("clause '{clause}' failed to parse: {}", join_parse_errors(.errors))]
    Parse {
        clause: String,
        errors: Vec<ParseError>,
    },

    #[error("{span}: {message}")]
    Runtime { message: String, span: Span },

    #[error("{function}: {message}")]
    NativeCall { function: String, message: String },

    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error("clause '{clause}' produced no return value")]
    MissingReturn { clause: String },

    #[error("step limit of {limit} exceeded")]
    StepLimitExceeded { limit: u64 },

    #[error("nesting depth limit of {limit} exceeded")]
    DepthLimitExceeded { limit: usize },

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("stash error: {0}")]
    Stash(String),

    #[error("contract state error: {0}")]
    ContractState(String),

    #[error("party '{party}' may not {action}")]
    NotPermitted { party: String, action: String },

    #[error("contract failed validation: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

fn join_parse_errors(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
