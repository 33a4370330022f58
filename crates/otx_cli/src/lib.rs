//! File-level driver for the `otx` binary: loads a contract and ledger from
//! JSON, runs one operation, and optionally writes both back.

use std::path::{Path, PathBuf};

use otx_core::{ContractState, ExecutionTrace, InMemoryLedger, SmartContract};
use serde::Serialize;

pub mod config;

pub use config::{resolve_config, ResolvedConfig, CONFIG_FILE_NAME};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Activate,
    Process,
    Trigger { party: String, clause: String },
    Cancel { party: String },
    Deactivate,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Activate => "activate",
            Operation::Process => "process",
            Operation::Trigger { .. } => "trigger",
            Operation::Cancel { .. } => "cancel",
            Operation::Deactivate => "deactivate",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OperationInput {
    pub contract: PathBuf,
    pub ledger: PathBuf,
    pub config: Option<PathBuf>,
    pub operation: Operation,
    /// Persist the updated contract and ledger.
    pub write: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationOutcome {
    pub operation: &'static str,
    pub contract: String,
    pub state: ContractState,
    pub active: bool,
    pub content_hash: String,
    pub written: bool,
    pub trace: ExecutionTrace,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub contract: String,
    pub state: ContractState,
    pub parties: usize,
    pub bylaws: usize,
    pub clauses: usize,
    pub problems: Vec<String>,
}

impl CheckReport {
    pub fn is_valid(&self) -> bool {
        self.problems.is_empty()
    }
}

pub fn load_contract(path: &Path) -> Result<SmartContract, String> {
    let bytes = std::fs::read(path).map_err(|err| format!("read {}: {}", path.display(), err))?;
    serde_json::from_slice(&bytes).map_err(|err| format!("decode {}: {}", path.display(), err))
}

pub fn load_ledger(path: &Path) -> Result<InMemoryLedger, String> {
    let bytes = std::fs::read(path).map_err(|err| format!("read {}: {}", path.display(), err))?;
    serde_json::from_slice(&bytes).map_err(|err| format!("decode {}: {}", path.display(), err))
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), String> {
    let tmp_path = stage_json(path, value)?;
    commit(&tmp_path, path)
}

/// Writes `value` next to `path` under a `.tmp` name and returns that name.
fn stage_json<T: Serialize>(path: &Path, value: &T) -> Result<PathBuf, String> {
    let mut json =
        serde_json::to_string_pretty(value).map_err(|err| format!("json encode: {}", err))?;
    json.push('\n');
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, json)
        .map_err(|err| format!("write {}: {}", tmp_path.display(), err))?;
    Ok(tmp_path)
}

fn commit(tmp_path: &Path, path: &Path) -> Result<(), String> {
    std::fs::rename(tmp_path, path).map_err(|err| format!("write {}: {}", path.display(), err))
}

/// Stages both files before renaming either, so a failed write leaves
/// neither file changed.
fn persist(
    contract_path: &Path,
    contract: &SmartContract,
    ledger_path: &Path,
    ledger: &InMemoryLedger,
) -> Result<(), String> {
    let staged_contract = stage_json(contract_path, contract)?;
    let staged_ledger = match stage_json(ledger_path, ledger) {
        Ok(path) => path,
        Err(err) => {
            let _ = std::fs::remove_file(&staged_contract);
            return Err(err);
        }
    };
    commit(&staged_contract, contract_path)?;
    commit(&staged_ledger, ledger_path)
}

pub fn check_contract(path: &Path) -> Result<CheckReport, String> {
    let contract = load_contract(path)?;
    let problems = match contract.validate() {
        Ok(()) => Vec::new(),
        Err(problems) => problems,
    };
    Ok(CheckReport {
        contract: contract.name().to_string(),
        state: contract.state(),
        parties: contract.parties().count(),
        bylaws: contract.bylaws().count(),
        clauses: contract.bylaws().map(|b| b.clause_count()).sum(),
        problems,
    })
}

/// Nothing is written when the operation fails.
pub fn run_operation(input: OperationInput) -> Result<OperationOutcome, String> {
    let resolved = resolve_config(input.config.as_deref(), &input.contract)?;
    let mut contract = load_contract(&input.contract)?;
    let mut ledger = load_ledger(&input.ledger)?;
    contract.set_limits(resolved.limits);

    tracing::info!(
        operation = input.operation.name(),
        contract = contract.name(),
        config = ?resolved.source,
        "running operation"
    );
    let trace = match &input.operation {
        Operation::Activate => contract.activate(&mut ledger),
        Operation::Process => contract.process(&mut ledger),
        Operation::Trigger { party, clause } => contract.trigger_clause(party, clause, &mut ledger),
        Operation::Cancel { party } => contract.cancel(party, &mut ledger),
        Operation::Deactivate => contract.deactivate(&mut ledger),
    }
    .map_err(|err| format!("{} failed: {}", input.operation.name(), err))?;

    if input.write {
        persist(&input.contract, &contract, &input.ledger, &ledger)?;
    }

    Ok(OperationOutcome {
        operation: input.operation.name(),
        contract: contract.name().to_string(),
        state: contract.state(),
        active: contract.is_active(),
        content_hash: contract.content_hash().map_err(|err| err.to_string())?,
        written: input.write,
        trace,
    })
}

/// Runs the cancel callback without persisting anything it changes.
pub fn query_can_cancel(
    contract_path: &Path,
    ledger_path: &Path,
    config: Option<&Path>,
    party: &str,
) -> Result<bool, String> {
    let resolved = resolve_config(config, contract_path)?;
    let mut contract = load_contract(contract_path)?;
    let mut ledger = load_ledger(ledger_path)?;
    contract.set_limits(resolved.limits);
    contract
        .can_party_cancel(party, &mut ledger)
        .map_err(|err| err.to_string())
}

pub fn contract_hash(path: &Path) -> Result<String, String> {
    load_contract(path)?
        .content_hash()
        .map_err(|err| err.to_string())
}
