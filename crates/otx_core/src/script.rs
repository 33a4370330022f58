use std::collections::{BTreeMap, BTreeSet};

use crate::error::{EngineError, Result};
use crate::interpreter::Machine;
use crate::limits::ScriptLimits;
use crate::value::{Value, VariableType};
use crate::variable::Variable;

/// Functions the host exposes to clause code.
pub trait NativeHost {
    /// Whether `name` is callable through [`NativeHost::call`].
    fn knows(&self, name: &str) -> bool;

    fn call(&mut self, name: &str, args: &[Value]) -> Result<Value>;
}

/// Host with no native functions; only the built-ins resolve.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoNatives;

impl NativeHost for NoNatives {
    fn knows(&self, _name: &str) -> bool {
        false
    }

    fn call(&mut self, name: &str, _args: &[Value]) -> Result<Value> {
        Err(EngineError::UnknownFunction {
            name: name.to_string(),
        })
    }
}

/// Functions available to every clause regardless of host.
pub const BUILTIN_FUNCTIONS: [&str; 3] = ["to_string", "to_int", "strlen"];

/// One clause body bound to the parties, accounts and variables it may see.
///
/// Variables are borrowed mutably: assignments inside the clause land
/// directly in the owning bylaw's variables. Constants are bound too but
/// reject writes.
pub struct Script<'a> {
    display_name: String,
    program: otx_script::Script,
    parties: BTreeSet<String>,
    accounts: BTreeSet<String>,
    variables: BTreeMap<String, &'a mut Variable>,
    limits: ScriptLimits,
}

impl<'a> Script<'a> {
    pub fn new(display_name: impl Into<String>, program: otx_script::Script) -> Self {
        Script {
            display_name: display_name.into(),
            program,
            parties: BTreeSet::new(),
            accounts: BTreeSet::new(),
            variables: BTreeMap::new(),
            limits: ScriptLimits::default(),
        }
    }

    pub fn from_source(display_name: &str, source: &str) -> Result<Self> {
        let program = otx_script::parse_script(source, display_name).map_err(|errors| {
            EngineError::Parse {
                clause: display_name.to_string(),
                errors,
            }
        })?;
        Ok(Self::new(display_name, program))
    }

    pub fn with_limits(mut self, limits: ScriptLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn add_party(&mut self, name: impl Into<String>) {
        self.parties.insert(name.into());
    }

    pub fn add_account(&mut self, name: impl Into<String>) {
        self.accounts.insert(name.into());
    }

    /// A later binding under the same name replaces the earlier one.
    pub fn add_variable(&mut self, variable: &'a mut Variable) {
        self.variables.insert(variable.name().to_string(), variable);
    }

    pub fn find_variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name).map(|v| &**v)
    }

    pub fn remove_variable(&mut self, name: &str) -> Option<&'a mut Variable> {
        self.variables.remove(name)
    }

    /// Runs the clause. The result is the value of an explicit `return`, or
    /// else of the last expression statement evaluated. With `expected`
    /// set, the result must exist and have that type.
    pub fn execute<H>(&mut self, host: &mut H, expected: Option<VariableType>) -> Result<Option<Value>>
    where
        H: NativeHost + ?Sized,
    {
        tracing::debug!(script = %self.display_name, "executing script");
        let mut machine = Machine::new(
            &mut self.variables,
            &self.parties,
            &self.accounts,
            host,
            &self.limits,
        );
        let result = machine.run(&self.program.statements)?;
        tracing::debug!(
            script = %self.display_name,
            steps = machine.steps(),
            "script finished"
        );

        match (expected, result) {
            (None, result) => Ok(result),
            (Some(_), None) => Err(EngineError::MissingReturn {
                clause: self.display_name.clone(),
            }),
            (Some(expected), Some(value)) if value.value_type() != expected => {
                Err(EngineError::TypeMismatch {
                    name: format!("{} (return value)", self.display_name),
                    expected,
                    found: value.value_type(),
                })
            }
            (Some(_), Some(value)) => Ok(Some(value)),
        }
    }
}
