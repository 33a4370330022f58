use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::error::{EngineError, Result};
use crate::ledger::AccountLedger;
use crate::names::{key_matches, validate_name};
use crate::party_account::PartyAccount;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum PartyOwner {
    Nym(String),
    Entity(String),
}

impl PartyOwner {
    pub fn id(&self) -> &str {
        match self {
            PartyOwner::Nym(id) | PartyOwner::Entity(id) => id,
        }
    }
}

/// A signer of the contract: its agents and the accounts it pledges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    name: String,
    owner: PartyOwner,
    authorizing_agent: String,
    #[serde(default)]
    agents: BTreeMap<String, Agent>,
    #[serde(default)]
    accounts: BTreeMap<String, PartyAccount>,
    #[serde(default)]
    opening_trans_no: i64,
}

impl Party {
    pub fn new(
        name: impl Into<String>,
        owner: PartyOwner,
        authorizing_agent: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Party {
            name,
            owner,
            authorizing_agent: authorizing_agent.into(),
            agents: BTreeMap::new(),
            accounts: BTreeMap::new(),
            opening_trans_no: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &PartyOwner {
        &self.owner
    }

    pub fn owner_id(&self) -> &str {
        self.owner.id()
    }

    pub fn authorizing_agent(&self) -> &str {
        &self.authorizing_agent
    }

    pub fn opening_trans_no(&self) -> i64 {
        self.opening_trans_no
    }

    pub fn set_opening_trans_no(&mut self, trans_no: i64) {
        self.opening_trans_no = trans_no;
    }

    pub fn add_agent(&mut self, agent: Agent) -> Result<()> {
        if self.agents.contains_key(agent.name()) {
            return Err(EngineError::DuplicateName {
                kind: "agent",
                name: agent.name().to_string(),
            });
        }
        self.agents.insert(agent.name().to_string(), agent);
        Ok(())
    }

    /// The account's agent must already be on the party.
    pub fn add_account(&mut self, account: PartyAccount) -> Result<()> {
        if !self.agents.contains_key(account.agent_name()) {
            return Err(EngineError::NotFound {
                kind: "agent",
                name: account.agent_name().to_string(),
            });
        }
        if self.accounts.contains_key(account.name()) {
            return Err(EngineError::DuplicateName {
                kind: "account",
                name: account.name().to_string(),
            });
        }
        self.accounts.insert(account.name().to_string(), account);
        Ok(())
    }

    pub fn agent(&self, name: &str) -> Option<&Agent> {
        self.agents.get(name)
    }

    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    pub fn account(&self, name: &str) -> Option<&PartyAccount> {
        self.accounts.get(name)
    }

    pub fn account_mut(&mut self, name: &str) -> Option<&mut PartyAccount> {
        self.accounts.get_mut(name)
    }

    pub fn accounts(&self) -> impl Iterator<Item = &PartyAccount> {
        self.accounts.values()
    }

    pub fn account_by_id(&self, acct_id: &str) -> Option<&PartyAccount> {
        self.accounts.values().find(|a| a.is_account_by_id(acct_id))
    }

    pub fn accounts_by_agent<'p>(
        &'p self,
        agent_name: &'p str,
    ) -> impl Iterator<Item = &'p PartyAccount> + 'p {
        self.accounts
            .values()
            .filter(move |a| a.agent_name() == agent_name)
    }

    pub fn has_agent_by_nym_id(&self, nym_id: &str) -> bool {
        self.agents.values().any(|a| a.nym_id() == Some(nym_id))
    }

    pub fn verify_ownership_of_account(&self, name: &str, ledger: &dyn AccountLedger) -> bool {
        self.accounts
            .get(name)
            .map_or(false, |a| a.verify_agency(self) && a.verify_ownership(self, ledger))
    }

    /// Every account must pass agency and ledger ownership checks.
    pub fn verify_ownership_of_accounts(&self, ledger: &dyn AccountLedger) -> bool {
        self.accounts
            .values()
            .all(|a| a.verify_agency(self) && a.verify_ownership(self, ledger))
    }

    /// The naming rules the constructors enforce, re-checked for parties
    /// read from JSON.
    pub fn name_problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let mut check = |what: String, outcome: Result<()>| {
            if let Err(err) = outcome {
                problems.push(format!("party '{}': {}: {}", self.name, what, err));
            }
        };
        check("party name".to_string(), validate_name(&self.name));
        for (key, agent) in &self.agents {
            check(format!("agent '{}'", agent.name()), validate_name(agent.name()));
            check(format!("agent '{}'", agent.name()), key_matches(key, agent.name()));
        }
        for (key, account) in &self.accounts {
            check(
                format!("account '{}'", account.name()),
                validate_name(account.name()),
            );
            check(
                format!("account '{}'", account.name()),
                key_matches(key, account.name()),
            );
        }
        problems
    }

    pub fn compare(&self, other: &Party) -> bool {
        self.name == other.name
            && self.owner == other.owner
            && self.authorizing_agent == other.authorizing_agent
            && self.agents.len() == other.agents.len()
            && self
                .agents
                .iter()
                .all(|(k, a)| other.agents.get(k).map_or(false, |o| a.compare(o)))
            && self.accounts.len() == other.accounts.len()
            && self
                .accounts
                .iter()
                .all(|(k, a)| other.accounts.get(k).map_or(false, |o| a.compare(o)))
    }
}
