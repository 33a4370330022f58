use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// A named fragment of clause code inside a bylaw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    name: String,
    code: String,
}

impl Clause {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Clause {
            name: name.into(),
            code: code.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn set_code(&mut self, code: impl Into<String>) {
        self.code = code.into();
    }

    pub fn compile(&self) -> Result<otx_script::Script> {
        otx_script::parse_script(&self.code, &self.name).map_err(|errors| EngineError::Parse {
            clause: self.name.clone(),
            errors,
        })
    }
}
