use crate::error::{EngineError, Result};

pub const HOOK_PREFIX: &str = "hook_";
pub const CRON_PREFIX: &str = "cron_";
pub const CALLBACK_PREFIX: &str = "callback_";

pub const HOOK_ON_ACTIVATE: &str = "cron_activate";
pub const HOOK_ON_PROCESS: &str = "cron_process";
pub const HOOK_ON_DEACTIVATE: &str = "hook_deactivate";

pub const CALLBACK_PARTY_MAY_CANCEL: &str = "callback_party_may_cancel_contract";
pub const CALLBACK_PARTY_MAY_EXECUTE: &str = "callback_party_may_execute_clause";

pub const PARAM_PARTY_NAME: &str = "param_party_name";
pub const PARAM_CLAUSE_NAME: &str = "param_clause_name";

const RESERVED_PREFIXES: [&str; 3] = [HOOK_PREFIX, CALLBACK_PREFIX, CRON_PREFIX];

fn invalid(name: &str, reason: impl Into<String>) -> EngineError {
    EngineError::InvalidName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Non-empty, ASCII alphanumeric or `_`, not starting with a digit.
pub fn validate_name(name: &str) -> Result<()> {
    let Some(first) = name.chars().next() else {
        return Err(invalid(name, "name is empty"));
    };
    if first.is_ascii_digit() {
        return Err(invalid(name, "name starts with a digit"));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
    {
        return Err(invalid(name, format!("illegal character '{}'", bad)));
    }
    Ok(())
}

fn reject_reserved(name: &str) -> Result<()> {
    if let Some(prefix) = RESERVED_PREFIXES.iter().find(|p| name.starts_with(**p)) {
        return Err(invalid(name, format!("reserved prefix '{}'", prefix)));
    }
    Ok(())
}

/// Entries stored in a map are keyed by their own name.
pub fn key_matches(key: &str, name: &str) -> Result<()> {
    if key == name {
        Ok(())
    } else {
        Err(invalid(name, format!("stored under mismatched key '{}'", key)))
    }
}

pub fn validate_variable_name(name: &str) -> Result<()> {
    validate_name(name)?;
    reject_reserved(name)
}

pub fn validate_clause_name(name: &str) -> Result<()> {
    validate_name(name)?;
    reject_reserved(name)
}

/// Hooks are fired by the engine, so their names carry `hook_` or `cron_`.
pub fn validate_hook_name(name: &str) -> Result<()> {
    validate_name(name)?;
    if name.starts_with(HOOK_PREFIX) || name.starts_with(CRON_PREFIX) {
        Ok(())
    } else {
        Err(invalid(name, "hook names must begin with 'hook_' or 'cron_'"))
    }
}

pub fn validate_callback_name(name: &str) -> Result<()> {
    validate_name(name)?;
    if name.starts_with(CALLBACK_PREFIX) {
        Ok(())
    } else {
        Err(invalid(name, "callback names must begin with 'callback_'"))
    }
}
