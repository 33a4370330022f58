use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::names::validate_name;

/// How an agent holds its authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentKind {
    /// A nym acting in its own right.
    Individual { nym_id: String },
    /// A nym acting through a role it occupies.
    RoleHolder { role_id: String, nym_id: String },
    /// Voting group. Groups cannot sign.
    Group { group_name: String },
}

/// Someone authorized to act for a party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    name: String,
    #[serde(flatten)]
    kind: AgentKind,
}

impl Agent {
    pub fn new(name: impl Into<String>, kind: AgentKind) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Agent { name, kind })
    }

    pub fn individual(name: impl Into<String>, nym_id: impl Into<String>) -> Result<Self> {
        Self::new(
            name,
            AgentKind::Individual {
                nym_id: nym_id.into(),
            },
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &AgentKind {
        &self.kind
    }

    pub fn is_an_individual(&self) -> bool {
        matches!(
            self.kind,
            AgentKind::Individual { .. } | AgentKind::RoleHolder { .. }
        )
    }

    pub fn is_a_group(&self) -> bool {
        matches!(self.kind, AgentKind::Group { .. })
    }

    pub fn nym_id(&self) -> Option<&str> {
        match &self.kind {
            AgentKind::Individual { nym_id } | AgentKind::RoleHolder { nym_id, .. } => {
                Some(nym_id)
            }
            AgentKind::Group { .. } => None,
        }
    }

    pub fn role_id(&self) -> Option<&str> {
        match &self.kind {
            AgentKind::RoleHolder { role_id, .. } => Some(role_id),
            _ => None,
        }
    }

    /// True when the agent is the very nym that owns the party.
    pub fn does_represent_himself(&self, party_owner_id: &str) -> bool {
        matches!(&self.kind, AgentKind::Individual { nym_id } if nym_id == party_owner_id)
    }

    pub fn is_valid_signer(&self, nym_id: &str) -> bool {
        self.nym_id() == Some(nym_id)
    }

    pub fn compare(&self, other: &Agent) -> bool {
        self == other
    }
}
