//! Parser configuration.
//!
//! Limits bound how much work a single (possibly hostile) image can ask the
//! parser to do. They are checked against declared table sizes before any
//! table is walked.

use serde::{Deserialize, Serialize};

use crate::elf::types::{ElfError, Result};

/// Resource limits applied while building an [`crate::ElfImage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseConfig {
    /// Maximum number of section headers.
    pub max_sections: usize,
    /// Maximum number of program headers.
    pub max_segments: usize,
    /// Maximum number of entries in a single symbol table.
    pub max_symbols: usize,
    /// Maximum number of dynamic entries read before `DT_NULL`.
    pub max_dynamic_entries: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            max_sections: 65_535,
            max_segments: 65_535,
            max_symbols: 4_000_000,
            max_dynamic_entries: 65_536,
        }
    }
}

impl ParseConfig {
    /// Load a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub(crate) fn check(what: &'static str, found: usize, limit: usize) -> Result<()> {
        if found > limit {
            tracing::warn!(what, found, limit, "ELF table exceeds configured limit");
            return Err(ElfError::LimitExceeded { what, limit, found });
        }
        Ok(())
    }
}
