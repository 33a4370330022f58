use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::clause::Clause;
use crate::error::{EngineError, Result};
use crate::names::{
    key_matches, validate_callback_name, validate_clause_name, validate_hook_name, validate_name,
    validate_variable_name,
};
use crate::script::Script;
use crate::value::VariableAccess;
use crate::variable::Variable;

pub const DEFAULT_LANGUAGE: &str = "otx";

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

/// A named section of a smart contract: variables, clauses, and the hook
/// and callback tables that route engine events to clauses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bylaw {
    name: String,
    #[serde(default = "default_language")]
    language: String,
    #[serde(default)]
    variables: BTreeMap<String, Variable>,
    #[serde(default)]
    clauses: BTreeMap<String, Clause>,
    /// Hook name to clause names, in registration order.
    #[serde(default)]
    hooks: BTreeMap<String, Vec<String>>,
    /// Callback name to its single clause.
    #[serde(default)]
    callbacks: BTreeMap<String, String>,
}

impl Bylaw {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Bylaw {
            name,
            language: default_language(),
            variables: BTreeMap::new(),
            clauses: BTreeMap::new(),
            hooks: BTreeMap::new(),
            callbacks: BTreeMap::new(),
        })
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    // ---- variables ----

    pub fn add_variable(&mut self, variable: Variable) -> Result<()> {
        validate_variable_name(variable.name())?;
        if self.variables.contains_key(variable.name()) {
            return Err(EngineError::DuplicateName {
                kind: "variable",
                name: variable.name().to_string(),
            });
        }
        self.variables.insert(variable.name().to_string(), variable);
        Ok(())
    }

    pub fn add_string_variable(
        &mut self,
        name: &str,
        value: &str,
        access: VariableAccess,
    ) -> Result<()> {
        self.add_variable(Variable::string(name, value, access))
    }

    pub fn add_integer_variable(
        &mut self,
        name: &str,
        value: i64,
        access: VariableAccess,
    ) -> Result<()> {
        self.add_variable(Variable::integer(name, value, access))
    }

    pub fn add_bool_variable(
        &mut self,
        name: &str,
        value: bool,
        access: VariableAccess,
    ) -> Result<()> {
        self.add_variable(Variable::boolean(name, value, access))
    }

    pub fn remove_variable(&mut self, name: &str) -> Result<Variable> {
        self.variables
            .remove(name)
            .ok_or_else(|| EngineError::NotFound {
                kind: "variable",
                name: name.to_string(),
            })
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn variable_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.variables.get_mut(name)
    }

    /// Variables are ordered by name.
    pub fn variable_by_index(&self, index: usize) -> Option<&Variable> {
        self.variables.values().nth(index)
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    // ---- clauses ----

    pub fn add_clause(&mut self, name: &str, code: &str) -> Result<()> {
        validate_clause_name(name)?;
        if self.clauses.contains_key(name) {
            return Err(EngineError::DuplicateName {
                kind: "clause",
                name: name.to_string(),
            });
        }
        self.clauses
            .insert(name.to_string(), Clause::new(name, code));
        Ok(())
    }

    pub fn update_clause(&mut self, name: &str, code: &str) -> Result<()> {
        let clause = self
            .clauses
            .get_mut(name)
            .ok_or_else(|| EngineError::NotFound {
                kind: "clause",
                name: name.to_string(),
            })?;
        clause.set_code(code);
        Ok(())
    }

    /// Also drops every hook and callback entry that pointed at the clause.
    pub fn remove_clause(&mut self, name: &str) -> Result<Clause> {
        let clause = self
            .clauses
            .remove(name)
            .ok_or_else(|| EngineError::NotFound {
                kind: "clause",
                name: name.to_string(),
            })?;
        for clauses in self.hooks.values_mut() {
            clauses.retain(|c| c != name);
        }
        self.hooks.retain(|_, clauses| !clauses.is_empty());
        self.callbacks.retain(|_, c| c != name);
        Ok(clause)
    }

    pub fn clause(&self, name: &str) -> Option<&Clause> {
        self.clauses.get(name)
    }

    /// Clauses are ordered by name.
    pub fn clause_by_index(&self, index: usize) -> Option<&Clause> {
        self.clauses.values().nth(index)
    }

    pub fn clauses(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.values()
    }

    pub fn clause_count(&self) -> usize {
        self.clauses.len()
    }

    // ---- hooks ----

    pub fn add_hook(&mut self, hook: &str, clause: &str) -> Result<()> {
        validate_hook_name(hook)?;
        validate_clause_name(clause)?;
        let clauses = self.hooks.entry(hook.to_string()).or_default();
        if clauses.iter().any(|c| c == clause) {
            return Err(EngineError::DuplicateName {
                kind: "hook entry",
                name: format!("{} -> {}", hook, clause),
            });
        }
        clauses.push(clause.to_string());
        Ok(())
    }

    pub fn remove_hook(&mut self, hook: &str, clause: &str) -> Result<()> {
        let clauses = self.hooks.get_mut(hook).ok_or_else(|| EngineError::NotFound {
            kind: "hook",
            name: hook.to_string(),
        })?;
        let before = clauses.len();
        clauses.retain(|c| c != clause);
        if clauses.len() == before {
            return Err(EngineError::NotFound {
                kind: "hook entry",
                name: format!("{} -> {}", hook, clause),
            });
        }
        if clauses.is_empty() {
            self.hooks.remove(hook);
        }
        Ok(())
    }

    /// Clauses registered for `hook`, in registration order. Entries naming a
    /// clause that no longer exists are skipped.
    pub fn hooks(&self, hook: &str) -> Vec<&Clause> {
        let Some(names) = self.hooks.get(hook) else {
            return Vec::new();
        };
        names
            .iter()
            .filter_map(|name| {
                let clause = self.clauses.get(name);
                if clause.is_none() {
                    tracing::warn!(
                        bylaw = %self.name,
                        hook,
                        clause = %name,
                        "hook points at a missing clause"
                    );
                }
                clause
            })
            .collect()
    }

    pub fn hook_names(&self) -> impl Iterator<Item = &str> {
        self.hooks.keys().map(String::as_str)
    }

    pub fn hook_entries(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.hooks.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    // ---- callbacks ----

    pub fn add_callback(&mut self, callback: &str, clause: &str) -> Result<()> {
        validate_callback_name(callback)?;
        validate_clause_name(clause)?;
        if let Some(existing) = self.callbacks.get(callback) {
            return Err(EngineError::DuplicateName {
                kind: "callback",
                name: format!("{} (already routed to {})", callback, existing),
            });
        }
        self.callbacks
            .insert(callback.to_string(), clause.to_string());
        Ok(())
    }

    pub fn remove_callback(&mut self, callback: &str) -> Result<()> {
        self.callbacks
            .remove(callback)
            .map(|_| ())
            .ok_or_else(|| EngineError::NotFound {
                kind: "callback",
                name: callback.to_string(),
            })
    }

    pub fn callback(&self, callback: &str) -> Option<&Clause> {
        let name = self.callbacks.get(callback)?;
        self.clauses.get(name)
    }

    pub fn callback_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.callbacks.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    // ---- dirtiness ----

    pub fn is_dirty(&self) -> bool {
        self.dirty_variables().next().is_some()
    }

    pub fn is_dirty_important(&self) -> bool {
        self.dirty_variables().any(Variable::is_important)
    }

    /// Changed, non-constant variables. A constant that changed is logged and
    /// left out; [`Bylaw::set_as_clean`] puts its old value back.
    pub fn dirty_variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values().filter(move |v| {
            if !v.is_dirty() {
                return false;
            }
            if v.is_constant() {
                tracing::error!(
                    bylaw = %self.name,
                    variable = v.name(),
                    "constant variable changed during execution"
                );
                return false;
            }
            true
        })
    }

    pub fn set_as_clean(&mut self) {
        for variable in self.variables.values_mut() {
            if variable.is_constant() {
                variable.restore_clean();
            } else {
                variable.set_as_clean();
            }
        }
    }

    /// Rolls every variable back to its clean value.
    pub fn revert_to_clean(&mut self) {
        for variable in self.variables.values_mut() {
            variable.restore_clean();
        }
    }

    pub fn compare(&self, other: &Bylaw) -> bool {
        if self.name != other.name || self.language != other.language {
            return false;
        }
        if self.variables.len() != other.variables.len()
            || self.variables.iter().any(|(name, v)| {
                other
                    .variables
                    .get(name)
                    .map_or(true, |o| !v.compare(o))
            })
        {
            return false;
        }
        self.clauses == other.clauses
            && self.hooks == other.hooks
            && self.callbacks == other.callbacks
    }

    /// The naming rules `add_*` enforce, re-checked for bylaws read from JSON.
    pub fn name_problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let mut check = |what: String, outcome: Result<()>| {
            if let Err(err) = outcome {
                problems.push(format!("bylaw '{}': {}: {}", self.name, what, err));
            }
        };
        check("bylaw name".to_string(), validate_name(&self.name));
        for (key, variable) in &self.variables {
            check(
                format!("variable '{}'", variable.name()),
                validate_variable_name(variable.name()),
            );
            check(
                format!("variable '{}'", variable.name()),
                key_matches(key, variable.name()),
            );
        }
        for (key, clause) in &self.clauses {
            check(
                format!("clause '{}'", clause.name()),
                validate_clause_name(clause.name()),
            );
            check(
                format!("clause '{}'", clause.name()),
                key_matches(key, clause.name()),
            );
        }
        for (hook, clauses) in &self.hooks {
            check(format!("hook '{}'", hook), validate_hook_name(hook));
            for clause in clauses {
                check(
                    format!("hook '{}'", hook),
                    validate_clause_name(clause),
                );
            }
        }
        for (callback, clause) in &self.callbacks {
            check(
                format!("callback '{}'", callback),
                validate_callback_name(callback),
            );
            check(
                format!("callback '{}'", callback),
                validate_clause_name(clause),
            );
        }
        problems
    }

    pub fn register_variables_for_execution<'a>(&'a mut self, script: &mut Script<'a>) {
        for variable in self.variables.values_mut() {
            variable.register_for_execution(script);
        }
    }
}
