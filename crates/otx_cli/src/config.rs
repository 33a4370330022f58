use std::path::{Path, PathBuf};

use otx_core::ScriptLimits;
use serde::Deserialize;

pub const CONFIG_FILE_NAME: &str = "otx.toml";

#[derive(Debug, Default, Deserialize)]
struct OtxTomlConfig {
    limits: Option<ScriptLimits>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub limits: ScriptLimits,
    /// File the settings came from; `None` when defaults were used.
    pub source: Option<PathBuf>,
}

/// An explicit `--config` path must exist. Otherwise `otx.toml` next to the
/// contract is used when present, and defaults apply when it is not.
pub fn resolve_config(explicit: Option<&Path>, contract_path: &Path) -> Result<ResolvedConfig, String> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(format!("config file not found: {}", path.display()));
            }
            path.to_path_buf()
        }
        None => {
            let path = config_path_for_contract(contract_path);
            if !path.exists() {
                return Ok(ResolvedConfig {
                    limits: ScriptLimits::default(),
                    source: None,
                });
            }
            path
        }
    };

    let raw = std::fs::read_to_string(&path)
        .map_err(|err| format!("read {}: {}", path.display(), err))?;
    let parsed: OtxTomlConfig =
        toml::from_str(&raw).map_err(|err| format!("parse {}: {}", path.display(), err))?;
    let limits = parsed.limits.unwrap_or_default();
    if limits.max_steps == 0 || limits.max_depth == 0 {
        return Err(format!(
            "{}: limits.max_steps and limits.max_depth must be positive",
            path.display()
        ));
    }

    Ok(ResolvedConfig {
        limits,
        source: Some(path),
    })
}

fn config_path_for_contract(contract_path: &Path) -> PathBuf {
    let base = contract_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    base.join(CONFIG_FILE_NAME)
}
