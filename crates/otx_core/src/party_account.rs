use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ledger::AccountLedger;
use crate::names::validate_name;
use crate::party::Party;

/// An asset account a party brings into the contract, operated by one of
/// the party's agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyAccount {
    name: String,
    acct_id: String,
    instrument_definition_id: String,
    agent_name: String,
    /// Transaction number reserved for the closing receipt; 0 until assigned.
    #[serde(default)]
    closing_trans_no: i64,
}

impl PartyAccount {
    pub fn new(
        name: impl Into<String>,
        acct_id: impl Into<String>,
        instrument_definition_id: impl Into<String>,
        agent_name: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(PartyAccount {
            name,
            acct_id: acct_id.into(),
            instrument_definition_id: instrument_definition_id.into(),
            agent_name: agent_name.into(),
            closing_trans_no: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn acct_id(&self) -> &str {
        &self.acct_id
    }

    pub fn instrument_definition_id(&self) -> &str {
        &self.instrument_definition_id
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn closing_trans_no(&self) -> i64 {
        self.closing_trans_no
    }

    pub fn set_closing_trans_no(&mut self, trans_no: i64) {
        self.closing_trans_no = trans_no;
    }

    pub fn is_account_by_id(&self, acct_id: &str) -> bool {
        self.acct_id == acct_id
    }

    /// The named agent must belong to `party` and be able to sign.
    pub fn verify_agency(&self, party: &Party) -> bool {
        party
            .agent(&self.agent_name)
            .map_or(false, |agent| agent.is_an_individual())
    }

    /// The ledger account must exist, be owned by the party, and hold the
    /// declared instrument.
    pub fn verify_ownership(&self, party: &Party, ledger: &dyn AccountLedger) -> bool {
        let Some(account) = ledger.account(&self.acct_id) else {
            tracing::warn!(account = %self.name, acct_id = %self.acct_id, "account missing from ledger");
            return false;
        };
        if account.owner_id != party.owner_id() {
            tracing::warn!(
                account = %self.name,
                owner = %account.owner_id,
                party = party.name(),
                "account not owned by party"
            );
            return false;
        }
        if account.instrument_definition_id != self.instrument_definition_id {
            tracing::warn!(
                account = %self.name,
                expected = %self.instrument_definition_id,
                found = %account.instrument_definition_id,
                "account instrument mismatch"
            );
            return false;
        }
        true
    }

    pub fn compare(&self, other: &PartyAccount) -> bool {
        self.name == other.name
            && self.acct_id == other.acct_id
            && self.instrument_definition_id == other.instrument_definition_id
            && self.agent_name == other.agent_name
    }
}
