//! Key naming for durable element sets
//!
//! ```toml
//! prefix = "cities"
//! # optional, these are the defaults
//! additions_suffix = "_lww_additions"
//! removals_suffix = "_lww_removals"
//! ```

use lww_core::{Error, Result};
use serde::Deserialize;

pub const DEFAULT_ADDITIONS_SUFFIX: &str = "_lww_additions";
pub const DEFAULT_REMOVALS_SUFFIX: &str = "_lww_removals";

/// Where the two halves of one element set live in a store.
///
/// Every element set sharing a store needs its own prefix.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Keyspace {
    pub prefix: String,
    #[serde(default = "default_additions_suffix")]
    pub additions_suffix: String,
    #[serde(default = "default_removals_suffix")]
    pub removals_suffix: String,
}

fn default_additions_suffix() -> String {
    DEFAULT_ADDITIONS_SUFFIX.to_string()
}

fn default_removals_suffix() -> String {
    DEFAULT_REMOVALS_SUFFIX.to_string()
}

impl Keyspace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            additions_suffix: default_additions_suffix(),
            removals_suffix: default_removals_suffix(),
        }
    }

    /// Parse and validate a keyspace from TOML
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let keyspace: Keyspace =
            toml::from_str(source).map_err(|e| Error::Config(e.to_string()))?;
        keyspace.validate()?;
        Ok(keyspace)
    }

    pub fn validate(&self) -> Result<()> {
        if self.prefix.is_empty() {
            return Err(Error::Config("prefix cannot be empty".into()));
        }
        if self.additions_suffix == self.removals_suffix {
            return Err(Error::Config(format!(
                "additions and removals share the suffix {:?}",
                self.additions_suffix
            )));
        }
        Ok(())
    }

    pub fn additions_key(&self) -> String {
        format!("{}{}", self.prefix, self.additions_suffix)
    }

    pub fn removals_key(&self) -> String {
        format!("{}{}", self.prefix, self.removals_suffix)
    }
}

impl From<&str> for Keyspace {
    fn from(prefix: &str) -> Self {
        Self::new(prefix)
    }
}

impl From<String> for Keyspace {
    fn from(prefix: String) -> Self {
        Self::new(prefix)
    }
}
