use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::names::validate_name;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StashItem {
    pub instrument_definition_id: String,
    pub amount: i64,
}

/// Funds held by the contract itself, one balance per instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stash {
    name: String,
    #[serde(default)]
    items: BTreeMap<String, StashItem>,
}

impl Stash {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Stash {
            name,
            items: BTreeMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Zero for instruments never stashed.
    pub fn amount(&self, instrument_definition_id: &str) -> i64 {
        self.items
            .get(instrument_definition_id)
            .map_or(0, |item| item.amount)
    }

    pub fn items(&self) -> impl Iterator<Item = &StashItem> {
        self.items.values()
    }

    pub fn credit(&mut self, instrument_definition_id: &str, amount: i64) -> Result<()> {
        if amount <= 0 {
            return Err(EngineError::Stash(format!(
                "credit amount must be positive, got {}",
                amount
            )));
        }
        let item = self
            .items
            .entry(instrument_definition_id.to_string())
            .or_insert_with(|| StashItem {
                instrument_definition_id: instrument_definition_id.to_string(),
                amount: 0,
            });
        item.amount = item.amount.checked_add(amount).ok_or_else(|| {
            EngineError::Stash(format!("stash '{}' balance overflow", self.name))
        })?;
        Ok(())
    }

    pub fn debit(&mut self, instrument_definition_id: &str, amount: i64) -> Result<()> {
        if amount <= 0 {
            return Err(EngineError::Stash(format!(
                "debit amount must be positive, got {}",
                amount
            )));
        }
        let available = self.amount(instrument_definition_id);
        if available < amount {
            return Err(EngineError::Stash(format!(
                "stash '{}' holds {} of '{}', needed {}",
                self.name, available, instrument_definition_id, amount
            )));
        }
        if let Some(item) = self.items.get_mut(instrument_definition_id) {
            item.amount -= amount;
        }
        Ok(())
    }

    pub fn compare(&self, other: &Stash) -> bool {
        self == other
    }
}
