use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// An asset account as the contract sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerAccount {
    pub acct_id: String,
    pub owner_id: String,
    pub instrument_definition_id: String,
    pub balance: i64,
}

/// Account storage the contract moves funds through.
pub trait AccountLedger {
    fn account(&self, acct_id: &str) -> Option<&LedgerAccount>;

    fn credit(&mut self, acct_id: &str, amount: i64) -> Result<()>;

    fn debit(&mut self, acct_id: &str, amount: i64) -> Result<()>;

    fn balance(&self, acct_id: &str) -> Result<i64> {
        self.account(acct_id)
            .map(|a| a.balance)
            .ok_or_else(|| unknown_account(acct_id))
    }

    /// Moves `amount` between two accounts of the same instrument.
    fn transfer(&mut self, from: &str, to: &str, amount: i64) -> Result<()> {
        if amount <= 0 {
            return Err(EngineError::Ledger(format!(
                "transfer amount must be positive, got {}",
                amount
            )));
        }
        let source = self.account(from).ok_or_else(|| unknown_account(from))?;
        let target = self.account(to).ok_or_else(|| unknown_account(to))?;
        if source.instrument_definition_id != target.instrument_definition_id {
            return Err(EngineError::Ledger(format!(
                "instrument mismatch between '{}' and '{}'",
                from, to
            )));
        }
        if source.balance < amount {
            return Err(EngineError::Ledger(format!(
                "insufficient funds in '{}': balance {}, needed {}",
                from, source.balance, amount
            )));
        }
        self.debit(from, amount)?;
        self.credit(to, amount)
    }
}

fn unknown_account(acct_id: &str) -> EngineError {
    EngineError::Ledger(format!("unknown account '{}'", acct_id))
}

/// Ledger held in memory and persisted as JSON by the CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InMemoryLedger {
    #[serde(default)]
    accounts: BTreeMap<String, LedgerAccount>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_account(
        &mut self,
        acct_id: &str,
        owner_id: &str,
        instrument_definition_id: &str,
        balance: i64,
    ) -> Result<()> {
        if self.accounts.contains_key(acct_id) {
            return Err(EngineError::DuplicateName {
                kind: "ledger account",
                name: acct_id.to_string(),
            });
        }
        self.accounts.insert(
            acct_id.to_string(),
            LedgerAccount {
                acct_id: acct_id.to_string(),
                owner_id: owner_id.to_string(),
                instrument_definition_id: instrument_definition_id.to_string(),
                balance,
            },
        );
        Ok(())
    }

    pub fn accounts(&self) -> impl Iterator<Item = &LedgerAccount> {
        self.accounts.values()
    }
}

impl AccountLedger for InMemoryLedger {
    fn account(&self, acct_id: &str) -> Option<&LedgerAccount> {
        self.accounts.get(acct_id)
    }

    fn credit(&mut self, acct_id: &str, amount: i64) -> Result<()> {
        let account = self
            .accounts
            .get_mut(acct_id)
            .ok_or_else(|| unknown_account(acct_id))?;
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or_else(|| EngineError::Ledger(format!("balance overflow in '{}'", acct_id)))?;
        Ok(())
    }

    fn debit(&mut self, acct_id: &str, amount: i64) -> Result<()> {
        let account = self
            .accounts
            .get_mut(acct_id)
            .ok_or_else(|| unknown_account(acct_id))?;
        if account.balance < amount {
            return Err(EngineError::Ledger(format!(
                "insufficient funds in '{}': balance {}, needed {}",
                acct_id, account.balance, amount
            )));
        }
        account.balance -= amount;
        Ok(())
    }
}
