//! Lowering configuration
//!
//! Every field has a default, so an empty TOML file (or none at all) gives
//! the standard runtime layout.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LowerConfig {
    /// Package qualifier of runtime symbols in emitted code
    pub runtime_package: String,
    /// Import path of the runtime package
    pub runtime_import: String,
    /// Prefix of synthesized temporaries
    pub temp_prefix: String,
    /// Deepest source nesting lowered before failing
    pub max_depth: usize,
    /// Allow the reflective unapply fallback for unsupported extractor signatures
    pub reflective_unapply: bool,
    pub min_tuple_arity: usize,
    pub max_tuple_arity: usize,
}

impl Default for LowerConfig {
    fn default() -> Self {
        Self {
            runtime_package: "std".to_string(),
            runtime_import: "valgo/std".to_string(),
            temp_prefix: "_tmp".to_string(),
            max_depth: 256,
            reflective_unapply: true,
            min_tuple_arity: crate::types::MIN_TUPLE_ARITY,
            max_tuple_arity: crate::types::MAX_TUPLE_ARITY,
        }
    }
}

impl LowerConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| CompileError::config_error(format!("invalid configuration: {e}")))?;
        config.check()?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CompileError::config_error(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    fn check(&self) -> Result<()> {
        if self.runtime_package.is_empty() {
            return Err(CompileError::config_error("runtime_package must not be empty"));
        }
        if self.min_tuple_arity < crate::types::MIN_TUPLE_ARITY
            || self.max_tuple_arity > crate::types::MAX_TUPLE_ARITY
            || self.min_tuple_arity > self.max_tuple_arity
        {
            return Err(CompileError::config_error(format!(
                "tuple arity range {}..={} is outside the runtime's {}..={}",
                self.min_tuple_arity,
                self.max_tuple_arity,
                crate::types::MIN_TUPLE_ARITY,
                crate::types::MAX_TUPLE_ARITY
            )));
        }
        if self.max_depth == 0 {
            return Err(CompileError::config_error("max_depth must be positive"));
        }
        Ok(())
    }
}
