use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::bylaw::Bylaw;
use crate::error::{EngineError, Result};
use crate::ledger::AccountLedger;
use crate::limits::ScriptLimits;
use crate::names::{
    key_matches, validate_name, CALLBACK_PARTY_MAY_CANCEL, CALLBACK_PARTY_MAY_EXECUTE, HOOK_ON_ACTIVATE,
    HOOK_ON_DEACTIVATE, HOOK_ON_PROCESS, PARAM_CLAUSE_NAME, PARAM_PARTY_NAME,
};
use crate::party::Party;
use crate::party_account::PartyAccount;
use crate::script::{NativeHost, Script, BUILTIN_FUNCTIONS};
use crate::stash::Stash;
use crate::trace::{Event, ExecutionTrace, Trigger};
use crate::value::{Value, VariableAccess, VariableType};
use crate::variable::Variable;

/// Functions a running clause can call on its contract.
pub const NATIVE_FUNCTIONS: [&str; 11] = [
    "move_funds",
    "stash_funds",
    "unstash_funds",
    "get_acct_balance",
    "get_acct_instrument_definition_id",
    "get_stash_balance",
    "send_notice",
    "send_notice_to_parties",
    "deactivate_contract",
    "get_remaining_timer",
    "set_remaining_timer",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractState {
    #[default]
    Draft,
    Active,
    Deactivated,
}

impl ContractState {
    pub fn as_str(self) -> &'static str {
        match self {
            ContractState::Draft => "draft",
            ContractState::Active => "active",
            ContractState::Deactivated => "deactivated",
        }
    }
}

/// Parties, bylaws and stashes, plus the engine that runs their clauses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartContract {
    name: String,
    #[serde(default)]
    state: ContractState,
    #[serde(default)]
    remaining_timer: i64,
    #[serde(default)]
    parties: BTreeMap<String, Party>,
    #[serde(default)]
    bylaws: BTreeMap<String, Bylaw>,
    #[serde(default)]
    stashes: BTreeMap<String, Stash>,
    #[serde(skip)]
    limits: ScriptLimits,
    #[serde(skip)]
    deactivation_requested: bool,
}

impl SmartContract {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(SmartContract {
            name,
            state: ContractState::Draft,
            remaining_timer: 0,
            parties: BTreeMap::new(),
            bylaws: BTreeMap::new(),
            stashes: BTreeMap::new(),
            limits: ScriptLimits::default(),
            deactivation_requested: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ContractState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ContractState::Active
    }

    pub fn remaining_timer(&self) -> i64 {
        self.remaining_timer
    }

    pub fn limits(&self) -> &ScriptLimits {
        &self.limits
    }

    pub fn set_limits(&mut self, limits: ScriptLimits) {
        self.limits = limits;
    }

    pub fn add_party(&mut self, party: Party) -> Result<()> {
        if self.parties.contains_key(party.name()) {
            return Err(EngineError::DuplicateName {
                kind: "party",
                name: party.name().to_string(),
            });
        }
        self.parties.insert(party.name().to_string(), party);
        Ok(())
    }

    pub fn add_bylaw(&mut self, bylaw: Bylaw) -> Result<()> {
        if self.bylaws.contains_key(bylaw.name()) {
            return Err(EngineError::DuplicateName {
                kind: "bylaw",
                name: bylaw.name().to_string(),
            });
        }
        self.bylaws.insert(bylaw.name().to_string(), bylaw);
        Ok(())
    }

    pub fn party(&self, name: &str) -> Option<&Party> {
        self.parties.get(name)
    }

    pub fn parties(&self) -> impl Iterator<Item = &Party> {
        self.parties.values()
    }

    pub fn bylaw(&self, name: &str) -> Option<&Bylaw> {
        self.bylaws.get(name)
    }

    pub fn bylaw_mut(&mut self, name: &str) -> Option<&mut Bylaw> {
        self.bylaws.get_mut(name)
    }

    pub fn bylaws(&self) -> impl Iterator<Item = &Bylaw> {
        self.bylaws.values()
    }

    pub fn stash(&self, name: &str) -> Option<&Stash> {
        self.stashes.get(name)
    }

    pub fn stashes(&self) -> impl Iterator<Item = &Stash> {
        self.stashes.values()
    }

    /// Account by its contract-level name, searched across every party.
    pub fn account(&self, name: &str) -> Option<(&Party, &PartyAccount)> {
        find_account(&self.parties, name)
    }

    /// Static checks run before activation. Collects every problem found.
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut problems = Vec::new();

        if let Err(err) = validate_name(&self.name) {
            problems.push(format!("contract name: {}", err));
        }
        for (key, party) in &self.parties {
            if let Err(err) = key_matches(key, party.name()) {
                problems.push(format!("party '{}': {}", party.name(), err));
            }
            problems.extend(party.name_problems());
        }
        for (key, bylaw) in &self.bylaws {
            if let Err(err) = key_matches(key, bylaw.name()) {
                problems.push(format!("bylaw '{}': {}", bylaw.name(), err));
            }
            problems.extend(bylaw.name_problems());
        }
        for (key, stash) in &self.stashes {
            let named = validate_name(stash.name()).and_then(|_| key_matches(key, stash.name()));
            if let Err(err) = named {
                problems.push(format!("stash '{}': {}", stash.name(), err));
            }
        }

        let mut bound: BTreeMap<String, String> = BTreeMap::new();
        let mut claim = |name: &str, what: String, problems: &mut Vec<String>| {
            if let Some(existing) = bound.get(name) {
                problems.push(format!(
                    "name '{}' is used by both {} and {}",
                    name, existing, what
                ));
            } else {
                bound.insert(name.to_string(), what);
            }
        };

        for party in self.parties.values() {
            claim(party.name(), format!("party '{}'", party.name()), &mut problems);
            if party.agent(party.authorizing_agent()).is_none() {
                problems.push(format!(
                    "party '{}': authorizing agent '{}' does not exist",
                    party.name(),
                    party.authorizing_agent()
                ));
            }
            for account in party.accounts() {
                claim(
                    account.name(),
                    format!("account '{}' of party '{}'", account.name(), party.name()),
                    &mut problems,
                );
                if party.agent(account.agent_name()).is_none() {
                    problems.push(format!(
                        "account '{}': agent '{}' does not exist on party '{}'",
                        account.name(),
                        account.agent_name(),
                        party.name()
                    ));
                }
            }
        }
        for stash in self.stashes.values() {
            claim(stash.name(), format!("stash '{}'", stash.name()), &mut problems);
        }

        let mut clause_owner: BTreeMap<&str, &str> = BTreeMap::new();
        for bylaw in self.bylaws.values() {
            for variable in bylaw.variables() {
                if let Some(existing) = bound.get(variable.name()) {
                    problems.push(format!(
                        "variable '{}' in bylaw '{}' collides with {}",
                        variable.name(),
                        bylaw.name(),
                        existing
                    ));
                }
            }
            for clause in bylaw.clauses() {
                if let Some(other) = clause_owner.insert(clause.name(), bylaw.name()) {
                    problems.push(format!(
                        "clause '{}' is defined in both bylaw '{}' and bylaw '{}'",
                        clause.name(),
                        other,
                        bylaw.name()
                    ));
                }
                match clause.compile() {
                    Ok(program) => {
                        for function in program.called_functions() {
                            if !is_callable(&function) {
                                problems.push(format!(
                                    "clause '{}' calls unknown function '{}'",
                                    clause.name(),
                                    function
                                ));
                            }
                        }
                    }
                    Err(err) => problems.push(err.to_string()),
                }
            }
            for (hook, clauses) in bylaw.hook_entries() {
                for clause in clauses {
                    if bylaw.clause(clause).is_none() {
                        problems.push(format!(
                            "bylaw '{}': hook '{}' targets missing clause '{}'",
                            bylaw.name(),
                            hook,
                            clause
                        ));
                    }
                }
            }
            for (callback, clause) in bylaw.callback_entries() {
                if bylaw.clause(clause).is_none() {
                    problems.push(format!(
                        "bylaw '{}': callback '{}' targets missing clause '{}'",
                        bylaw.name(),
                        callback,
                        clause
                    ));
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }

    /// Moves a draft contract to active and fires `cron_activate`.
    pub fn activate(&mut self, ledger: &mut dyn AccountLedger) -> Result<ExecutionTrace> {
        self.begin_operation(ContractState::Draft, "activate")?;
        self.validate().map_err(EngineError::Invalid)?;
        for party in self.parties.values() {
            if !party.verify_ownership_of_accounts(ledger) {
                return Err(EngineError::Ledger(format!(
                    "party '{}' failed account ownership verification",
                    party.name()
                )));
            }
        }

        let mut trace = ExecutionTrace::new();
        self.state = ContractState::Active;
        tracing::info!(contract = %self.name, "contract activated");
        trace.record(Event::Activated {
            contract: self.name.clone(),
        });
        self.fire_hook(HOOK_ON_ACTIVATE, ledger, &mut trace)?;
        self.finish_operation(ledger, &mut trace)?;
        Ok(trace)
    }

    /// One processing pass: fires `cron_process`. Check
    /// [`SmartContract::is_active`] afterwards; a clause may have
    /// deactivated the contract.
    pub fn process(&mut self, ledger: &mut dyn AccountLedger) -> Result<ExecutionTrace> {
        self.begin_operation(ContractState::Active, "process")?;
        let mut trace = ExecutionTrace::new();
        self.fire_hook(HOOK_ON_PROCESS, ledger, &mut trace)?;
        self.finish_operation(ledger, &mut trace)?;
        Ok(trace)
    }

    /// Runs `clause` on behalf of `party`.
    pub fn trigger_clause(
        &mut self,
        party: &str,
        clause: &str,
        ledger: &mut dyn AccountLedger,
    ) -> Result<ExecutionTrace> {
        self.begin_operation(ContractState::Active, "trigger a clause")?;
        let bylaw = self
            .bylaw_for_clause(clause)
            .ok_or_else(|| EngineError::NotFound {
                kind: "clause",
                name: clause.to_string(),
            })?;
        let mut trace = ExecutionTrace::new();
        if !self.may_execute_clause(party, clause, ledger, &mut trace)? {
            return Err(EngineError::NotPermitted {
                party: party.to_string(),
                action: format!("execute clause '{}'", clause),
            });
        }

        tracing::info!(contract = %self.name, party, clause, "party triggered clause");
        self.run_clause(
            &bylaw,
            clause,
            Trigger::Party(party.to_string()),
            &[],
            None,
            ledger,
            &mut trace,
        )?;
        self.finish_operation(ledger, &mut trace)?;
        Ok(trace)
    }

    /// Asks `callback_party_may_cancel_contract`; without one, any party of
    /// the contract may cancel. A `deactivate_contract()` from the callback
    /// is ignored when asking outside an operation.
    pub fn can_party_cancel(&mut self, party: &str, ledger: &mut dyn AccountLedger) -> Result<bool> {
        let pending = self.deactivation_requested;
        let answer = self.may_cancel(party, ledger, &mut ExecutionTrace::new());
        self.deactivation_requested = pending;
        answer
    }

    /// Asks `callback_party_may_execute_clause`; without one, any party of
    /// the contract may execute any clause. A `deactivate_contract()` from
    /// the callback is ignored when asking outside an operation.
    pub fn can_execute_clause(
        &mut self,
        party: &str,
        clause: &str,
        ledger: &mut dyn AccountLedger,
    ) -> Result<bool> {
        let pending = self.deactivation_requested;
        let answer = self.may_execute_clause(party, clause, ledger, &mut ExecutionTrace::new());
        self.deactivation_requested = pending;
        answer
    }

    /// Deactivates on behalf of `party`, if the cancel callback allows it.
    pub fn cancel(&mut self, party: &str, ledger: &mut dyn AccountLedger) -> Result<ExecutionTrace> {
        self.begin_operation(ContractState::Active, "cancel")?;
        let mut trace = ExecutionTrace::new();
        if !self.may_cancel(party, ledger, &mut trace)? {
            return Err(EngineError::NotPermitted {
                party: party.to_string(),
                action: "cancel the contract".to_string(),
            });
        }
        tracing::info!(contract = %self.name, party, "party cancelled contract");
        self.run_deactivation(ledger, &mut trace)?;
        Ok(trace)
    }

    /// Fires `hook_deactivate` and marks the contract deactivated.
    pub fn deactivate(&mut self, ledger: &mut dyn AccountLedger) -> Result<ExecutionTrace> {
        self.begin_operation(ContractState::Active, "deactivate")?;
        let mut trace = ExecutionTrace::new();
        self.run_deactivation(ledger, &mut trace)?;
        Ok(trace)
    }

    /// SHA-256 over the JSON encoding. Maps are ordered, so equal contracts
    /// hash equal.
    pub fn content_hash(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }

    /// Checks the state and drops any deactivation request left by an
    /// earlier operation that failed.
    fn begin_operation(&mut self, wanted: ContractState, action: &str) -> Result<()> {
        self.deactivation_requested = false;
        if self.state != wanted {
            return Err(EngineError::ContractState(format!(
                "cannot {} contract '{}' while it is {} (needs {})",
                action,
                self.name,
                self.state.as_str(),
                wanted.as_str()
            )));
        }
        Ok(())
    }

    fn bylaw_for_clause(&self, clause: &str) -> Option<String> {
        self.bylaws
            .values()
            .find(|b| b.clause(clause).is_some())
            .map(|b| b.name().to_string())
    }

    fn may_cancel(
        &mut self,
        party: &str,
        ledger: &mut dyn AccountLedger,
        trace: &mut ExecutionTrace,
    ) -> Result<bool> {
        if !self.parties.contains_key(party) {
            return Ok(false);
        }
        let params = [(PARAM_PARTY_NAME, Value::from(party))];
        self.ask_callback(CALLBACK_PARTY_MAY_CANCEL, &params, ledger, trace)
    }

    fn may_execute_clause(
        &mut self,
        party: &str,
        clause: &str,
        ledger: &mut dyn AccountLedger,
        trace: &mut ExecutionTrace,
    ) -> Result<bool> {
        if !self.parties.contains_key(party) {
            return Ok(false);
        }
        let params = [
            (PARAM_PARTY_NAME, Value::from(party)),
            (PARAM_CLAUSE_NAME, Value::from(clause)),
        ];
        self.ask_callback(CALLBACK_PARTY_MAY_EXECUTE, &params, ledger, trace)
    }

    fn ask_callback(
        &mut self,
        callback: &str,
        params: &[(&str, Value)],
        ledger: &mut dyn AccountLedger,
        trace: &mut ExecutionTrace,
    ) -> Result<bool> {
        let target = self.bylaws.values().find_map(|b| {
            b.callback(callback)
                .map(|c| (b.name().to_string(), c.name().to_string()))
        });
        let Some((bylaw, clause)) = target else {
            return Ok(true);
        };
        let answer = self.run_clause(
            &bylaw,
            &clause,
            Trigger::Callback(callback.to_string()),
            params,
            Some(VariableType::Bool),
            ledger,
            trace,
        )?;
        Ok(matches!(answer, Some(Value::Bool(true))))
    }

    fn fire_hook(
        &mut self,
        hook: &str,
        ledger: &mut dyn AccountLedger,
        trace: &mut ExecutionTrace,
    ) -> Result<()> {
        let targets: Vec<(String, String)> = self
            .bylaws
            .values()
            .flat_map(|b| {
                b.hooks(hook)
                    .into_iter()
                    .map(move |c| (b.name().to_string(), c.name().to_string()))
            })
            .collect();
        tracing::debug!(contract = %self.name, hook, clauses = targets.len(), "firing hook");
        for (bylaw, clause) in targets {
            self.run_clause(
                &bylaw,
                &clause,
                Trigger::Hook(hook.to_string()),
                &[],
                None,
                ledger,
                trace,
            )?;
        }
        Ok(())
    }

    /// A clause that called `deactivate_contract()` takes effect once the
    /// operation's own clauses have run.
    fn finish_operation(
        &mut self,
        ledger: &mut dyn AccountLedger,
        trace: &mut ExecutionTrace,
    ) -> Result<()> {
        if self.deactivation_requested && self.is_active() {
            self.run_deactivation(ledger, trace)?;
        }
        self.deactivation_requested = false;
        Ok(())
    }

    fn run_deactivation(
        &mut self,
        ledger: &mut dyn AccountLedger,
        trace: &mut ExecutionTrace,
    ) -> Result<()> {
        self.fire_hook(HOOK_ON_DEACTIVATE, ledger, trace)?;
        self.state = ContractState::Deactivated;
        self.deactivation_requested = false;
        tracing::info!(contract = %self.name, "contract deactivated");
        trace.record(Event::Deactivated {
            contract: self.name.clone(),
        });
        Ok(())
    }

    /// Binds the contract into a fresh script and runs one clause.
    ///
    /// On failure the bylaw's variables roll back to their clean values.
    /// On success every change is recorded, an important change notifies
    /// every party, and the bylaw is marked clean.
    #[allow(clippy::too_many_arguments)]
    fn run_clause(
        &mut self,
        bylaw_name: &str,
        clause_name: &str,
        trigger: Trigger,
        params: &[(&str, Value)],
        expected: Option<VariableType>,
        ledger: &mut dyn AccountLedger,
        trace: &mut ExecutionTrace,
    ) -> Result<Option<Value>> {
        let bound_variables: BTreeSet<String> = self
            .bylaws
            .values()
            .flat_map(|b| b.variables().map(|v| v.name().to_string()))
            .collect();
        let SmartContract {
            name,
            remaining_timer,
            parties,
            bylaws,
            stashes,
            limits,
            deactivation_requested,
            ..
        } = self;

        let bylaw = bylaws
            .get_mut(bylaw_name)
            .ok_or_else(|| EngineError::NotFound {
                kind: "bylaw",
                name: bylaw_name.to_string(),
            })?;
        let program = bylaw
            .clause(clause_name)
            .ok_or_else(|| EngineError::NotFound {
                kind: "clause",
                name: clause_name.to_string(),
            })?
            .compile()?;
        let display_name = format!("{}.{}", bylaw_name, clause_name);

        let mut param_vars: Vec<Variable> = params
            .iter()
            .map(|(param, value)| Variable::new(*param, value.clone(), VariableAccess::Constant))
            .collect();

        tracing::debug!(contract = %name, clause = %display_name, trigger = %trigger, "running clause");
        let result = {
            let mut script = Script::new(display_name.clone(), program).with_limits(limits.clone());
            for party in parties.values() {
                script.add_party(party.name());
                for account in party.accounts() {
                    script.add_account(account.name());
                }
            }
            bylaw.register_variables_for_execution(&mut script);
            for param in param_vars.iter_mut() {
                param.register_for_execution(&mut script);
            }
            let mut host = ContractHost {
                parties,
                bound_variables: &bound_variables,
                stashes,
                ledger,
                trace: &mut *trace,
                remaining_timer,
                deactivation_requested,
            };
            script.execute(&mut host, expected)
        };

        let value = match result {
            Ok(value) => value,
            Err(err) => {
                bylaw.revert_to_clean();
                tracing::warn!(contract = %name, clause = %display_name, error = %err, "clause failed");
                return Err(err);
            }
        };

        let changes: Vec<Event> = bylaw
            .dirty_variables()
            .map(|v| Event::VariableChanged {
                bylaw: bylaw_name.to_string(),
                variable: v.name().to_string(),
                from: v.clean_value().clone(),
                to: v.value().clone(),
                important: v.is_important(),
            })
            .collect();
        let important = bylaw.is_dirty_important();
        bylaw.set_as_clean();
        for change in changes {
            trace.record(change);
        }
        if important {
            for party in parties.keys() {
                tracing::info!(contract = %name, party = %party, "notifying party of important change");
                trace.record(Event::NoticeSent {
                    party: party.clone(),
                    reason: format!("important variable changed by {}", display_name),
                });
            }
        }
        trace.record(Event::ClauseExecuted {
            bylaw: bylaw_name.to_string(),
            clause: clause_name.to_string(),
            trigger,
            result: value.clone(),
        });
        Ok(value)
    }
}

fn is_callable(function: &str) -> bool {
    BUILTIN_FUNCTIONS.contains(&function) || NATIVE_FUNCTIONS.contains(&function)
}

fn find_account<'p>(
    parties: &'p BTreeMap<String, Party>,
    name: &str,
) -> Option<(&'p Party, &'p PartyAccount)> {
    parties
        .values()
        .find_map(|p| p.account(name).map(|a| (p, a)))
}

/// Native functions as seen from inside a running clause.
struct ContractHost<'h> {
    parties: &'h BTreeMap<String, Party>,
    /// Bylaw variable names, unavailable as stash names.
    bound_variables: &'h BTreeSet<String>,
    stashes: &'h mut BTreeMap<String, Stash>,
    ledger: &'h mut dyn AccountLedger,
    trace: &'h mut ExecutionTrace,
    remaining_timer: &'h mut i64,
    deactivation_requested: &'h mut bool,
}

fn arg_error(function: &str, message: impl Into<String>) -> EngineError {
    EngineError::NativeCall {
        function: function.to_string(),
        message: message.into(),
    }
}

fn expect_args<'v>(function: &str, args: &'v [Value], count: usize) -> Result<&'v [Value]> {
    if args.len() != count {
        return Err(arg_error(
            function,
            format!("expected {} argument(s), got {}", count, args.len()),
        ));
    }
    Ok(args)
}

fn str_arg<'v>(function: &str, args: &'v [Value], index: usize) -> Result<&'v str> {
    args.get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| arg_error(function, format!("argument {} must be a string", index + 1)))
}

fn amount_arg(function: &str, args: &[Value], index: usize) -> Result<i64> {
    args.get(index)
        .and_then(Value::to_amount)
        .ok_or_else(|| arg_error(function, format!("argument {} must be an amount", index + 1)))
}

impl<'h> ContractHost<'h> {
    fn account(&self, function: &str, name: &str) -> Result<&'h PartyAccount> {
        find_account(self.parties, name)
            .map(|(_, account)| account)
            .ok_or_else(|| arg_error(function, format!("'{}' is not an account of this contract", name)))
    }

    fn check_new_stash_name(&self, name: &str) -> Result<()> {
        let taken = if self.parties.contains_key(name) {
            Some("a party")
        } else if find_account(self.parties, name).is_some() {
            Some("an account")
        } else if self.bound_variables.contains(name) {
            Some("a bylaw variable")
        } else {
            None
        };
        match taken {
            Some(what) => Err(arg_error(
                "stash_funds",
                format!("stash name '{}' is already used by {}", name, what),
            )),
            None => Ok(()),
        }
    }

    /// Fund movements report failure as `false` instead of aborting the clause.
    fn movement(&mut self, function: &str, outcome: Result<Event>) -> Value {
        match outcome {
            Ok(event) => {
                tracing::info!(function, "funds movement succeeded");
                self.trace.record(event);
                Value::Bool(true)
            }
            Err(err) => {
                tracing::warn!(function, error = %err, "funds movement failed");
                self.trace.record(Event::NativeCallFailed {
                    function: function.to_string(),
                    reason: err.to_string(),
                });
                Value::Bool(false)
            }
        }
    }

    fn move_funds(&mut self, args: &[Value]) -> Result<Event> {
        const F: &str = "move_funds";
        let args = expect_args(F, args, 3)?;
        let from = self.account(F, str_arg(F, args, 0)?)?;
        let to = self.account(F, str_arg(F, args, 1)?)?;
        let amount = amount_arg(F, args, 2)?;
        self.ledger.transfer(from.acct_id(), to.acct_id(), amount)?;
        Ok(Event::FundsMoved {
            from: from.name().to_string(),
            to: to.name().to_string(),
            amount,
        })
    }

    fn stash_funds(&mut self, args: &[Value]) -> Result<Event> {
        const F: &str = "stash_funds";
        let args = expect_args(F, args, 3)?;
        let from = self.account(F, str_arg(F, args, 0)?)?;
        let stash_name = str_arg(F, args, 1)?;
        let amount = amount_arg(F, args, 2)?;
        if amount <= 0 {
            return Err(arg_error(F, format!("amount must be positive, got {}", amount)));
        }
        let mut stash = match self.stashes.get(stash_name) {
            Some(existing) => existing.clone(),
            None => {
                self.check_new_stash_name(stash_name)?;
                Stash::new(stash_name)?
            }
        };
        stash.credit(from.instrument_definition_id(), amount)?;
        self.ledger.debit(from.acct_id(), amount)?;
        self.stashes.insert(stash_name.to_string(), stash);
        Ok(Event::FundsStashed {
            account: from.name().to_string(),
            stash: stash_name.to_string(),
            instrument_definition_id: from.instrument_definition_id().to_string(),
            amount,
        })
    }

    fn unstash_funds(&mut self, args: &[Value]) -> Result<Event> {
        const F: &str = "unstash_funds";
        let args = expect_args(F, args, 3)?;
        let stash_name = str_arg(F, args, 0)?;
        let to = self.account(F, str_arg(F, args, 1)?)?;
        let amount = amount_arg(F, args, 2)?;
        let stash = self
            .stashes
            .get_mut(stash_name)
            .ok_or_else(|| arg_error(F, format!("no stash named '{}'", stash_name)))?;
        stash.debit(to.instrument_definition_id(), amount)?;
        if let Err(err) = self.ledger.credit(to.acct_id(), amount) {
            // Restore the stash.
            stash.credit(to.instrument_definition_id(), amount)?;
            return Err(err);
        }
        Ok(Event::FundsUnstashed {
            account: to.name().to_string(),
            stash: stash_name.to_string(),
            instrument_definition_id: to.instrument_definition_id().to_string(),
            amount,
        })
    }

    fn send_notice(&mut self, party: &str, reason: &str) -> bool {
        if !self.parties.contains_key(party) {
            tracing::warn!(party, "notice addressed to unknown party");
            return false;
        }
        tracing::info!(party, reason, "notice sent");
        self.trace.record(Event::NoticeSent {
            party: party.to_string(),
            reason: reason.to_string(),
        });
        true
    }
}

impl<'h> NativeHost for ContractHost<'h> {
    fn knows(&self, name: &str) -> bool {
        NATIVE_FUNCTIONS.contains(&name)
    }

    fn call(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        match name {
            "move_funds" => {
                let outcome = self.move_funds(args);
                Ok(self.movement(name, outcome))
            }
            "stash_funds" => {
                let outcome = self.stash_funds(args);
                Ok(self.movement(name, outcome))
            }
            "unstash_funds" => {
                let outcome = self.unstash_funds(args);
                Ok(self.movement(name, outcome))
            }
            "get_acct_balance" => {
                let args = expect_args(name, args, 1)?;
                let account = self.account(name, str_arg(name, args, 0)?)?;
                Ok(Value::Int(self.ledger.balance(account.acct_id())?))
            }
            "get_acct_instrument_definition_id" => {
                let args = expect_args(name, args, 1)?;
                let account = self.account(name, str_arg(name, args, 0)?)?;
                Ok(Value::from(account.instrument_definition_id()))
            }
            "get_stash_balance" => {
                let args = expect_args(name, args, 2)?;
                let stash = str_arg(name, args, 0)?;
                let instrument = str_arg(name, args, 1)?;
                Ok(Value::Int(
                    self.stashes.get(stash).map_or(0, |s| s.amount(instrument)),
                ))
            }
            "send_notice" => {
                let args = expect_args(name, args, 1)?;
                let party = str_arg(name, args, 0)?;
                Ok(Value::Bool(self.send_notice(party, "notice from clause")))
            }
            "send_notice_to_parties" => {
                expect_args(name, args, 0)?;
                let parties = self.parties;
                for party in parties.keys() {
                    self.send_notice(party, "notice from clause");
                }
                Ok(Value::Bool(true))
            }
            "deactivate_contract" => {
                expect_args(name, args, 0)?;
                *self.deactivation_requested = true;
                Ok(Value::Bool(true))
            }
            "get_remaining_timer" => {
                expect_args(name, args, 0)?;
                Ok(Value::Int(*self.remaining_timer))
            }
            "set_remaining_timer" => {
                let args = expect_args(name, args, 1)?;
                let seconds = amount_arg(name, args, 0)?;
                if seconds < 0 {
                    return Err(arg_error(name, "timer cannot be negative"));
                }
                *self.remaining_timer = seconds;
                Ok(Value::Bool(true))
            }
            _ => Err(EngineError::UnknownFunction {
                name: name.to_string(),
            }),
        }
    }
}
