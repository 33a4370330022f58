use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::script::Script;
use crate::value::{Value, VariableAccess, VariableType};

/// A named, typed bylaw variable.
///
/// Every variable keeps a clean copy of its value. Clause runs write through
/// to `value`; the host compares against the clean copy afterwards to find
/// what changed, then calls [`Variable::set_as_clean`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "VariableRecord", into = "VariableRecord")]
pub struct Variable {
    name: String,
    var_type: VariableType,
    access: VariableAccess,
    value: Value,
    clean: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VariableRecord {
    name: String,
    #[serde(rename = "type")]
    var_type: VariableType,
    access: VariableAccess,
    value: Value,
}

impl TryFrom<VariableRecord> for Variable {
    type Error = String;

    fn try_from(record: VariableRecord) -> std::result::Result<Self, Self::Error> {
        if record.value.value_type() != record.var_type {
            return Err(format!(
                "variable '{}' declared {} but holds a {} value",
                record.name,
                record.var_type,
                record.value.value_type()
            ));
        }
        Ok(Variable::new(record.name, record.value, record.access))
    }
}

impl From<Variable> for VariableRecord {
    fn from(variable: Variable) -> Self {
        VariableRecord {
            name: variable.name,
            var_type: variable.var_type,
            access: variable.access,
            value: variable.value,
        }
    }
}

impl Variable {
    /// The declared type is taken from `value`.
    pub fn new(name: impl Into<String>, value: Value, access: VariableAccess) -> Self {
        Variable {
            name: name.into(),
            var_type: value.value_type(),
            access,
            clean: value.clone(),
            value,
        }
    }

    pub fn string(name: impl Into<String>, value: impl Into<String>, access: VariableAccess) -> Self {
        Self::new(name, Value::Str(value.into()), access)
    }

    pub fn integer(name: impl Into<String>, value: i64, access: VariableAccess) -> Self {
        Self::new(name, Value::Int(value), access)
    }

    pub fn boolean(name: impl Into<String>, value: bool, access: VariableAccess) -> Self {
        Self::new(name, Value::Bool(value), access)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn var_type(&self) -> VariableType {
        self.var_type
    }

    pub fn access(&self) -> VariableAccess {
        self.access
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Value as of the last [`Variable::set_as_clean`].
    pub fn clean_value(&self) -> &Value {
        &self.clean
    }

    pub fn set_value(&mut self, value: Value) -> Result<()> {
        if self.is_constant() {
            return Err(EngineError::ConstantModified {
                name: self.name.clone(),
            });
        }
        if value.value_type() != self.var_type {
            return Err(EngineError::TypeMismatch {
                name: self.name.clone(),
                expected: self.var_type,
                found: value.value_type(),
            });
        }
        self.value = value;
        Ok(())
    }

    pub fn is_constant(&self) -> bool {
        self.access == VariableAccess::Constant
    }

    /// Persistent or important.
    pub fn is_persistent(&self) -> bool {
        matches!(
            self.access,
            VariableAccess::Persistent | VariableAccess::Important
        )
    }

    pub fn is_important(&self) -> bool {
        self.access == VariableAccess::Important
    }

    pub fn is_dirty(&self) -> bool {
        self.value != self.clean
    }

    pub fn set_as_clean(&mut self) {
        self.clean = self.value.clone();
    }

    /// Puts the clean copy back. Used for constants found dirty and for
    /// rolling back a failed clause.
    pub fn restore_clean(&mut self) {
        self.value = self.clean.clone();
    }

    pub fn compare(&self, other: &Variable) -> bool {
        self.name == other.name
            && self.var_type == other.var_type
            && self.access == other.access
            && self.value == other.value
    }

    pub fn register_for_execution<'a>(&'a mut self, script: &mut Script<'a>) {
        script.add_variable(self);
    }
}
