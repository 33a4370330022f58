use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_STEPS: u64 = 100_000;
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Execution budget for a single clause run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptLimits {
    /// Statements plus expression nodes evaluated before the run is aborted.
    pub max_steps: u64,
    /// Nested blocks plus nested operands and call arguments. A flat chain
    /// such as `a + b + c` adds one level however long it is.
    pub max_depth: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}
