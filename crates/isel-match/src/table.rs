//! Data-driven rule declaration.
//!
//! A rule table lists the node kinds with their capability flags and the
//! rules in declaration order:
//!
//! ```json
//! {
//!   "kinds": [
//!     { "name": "Const", "free": true },
//!     { "name": "Add", "arity": 2, "commutative": true }
//!   ],
//!   "rules": [
//!     { "action": "ADD_IMM", "patterns": ["(Add a Const=c)"] }
//!   ]
//! }
//! ```

use std::path::Path;

use isel_ir::{KindInfo, KindRegistry, NodeKind, RegistryError};
use serde::{Deserialize, Serialize};

use crate::compile::{ActionId, RuleCompiler, RuleDecl, RuleSet};
use crate::errors::{CompileResult, TableError};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleTable {
    /// Accept kinds that are not listed in `kinds`.
    #[serde(default)]
    pub open_kinds: bool,
    #[serde(default)]
    pub kinds: Vec<KindEntry>,
    pub rules: Vec<RuleEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KindEntry {
    pub name: String,
    #[serde(default)]
    pub free: bool,
    #[serde(default)]
    pub commutative: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arity: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleEntry {
    pub action: String,
    pub patterns: Vec<String>,
}

impl RuleTable {
    pub fn from_json(text: &str) -> Result<Self, TableError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, TableError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Kind registry described by the `kinds` section.
    pub fn registry(&self) -> Result<KindRegistry, RegistryError> {
        let mut registry = if self.open_kinds {
            KindRegistry::open()
        } else {
            KindRegistry::new()
        };
        for entry in &self.kinds {
            let info = KindInfo {
                free: entry.free,
                commutative: entry.commutative,
                arity: entry.arity,
            };
            registry.register(NodeKind::from_dynamic(&entry.name), info)?;
        }
        Ok(registry)
    }

    pub fn compile(&self) -> CompileResult<RuleSet> {
        let mut compiler = RuleCompiler::new(self.registry()?);
        for entry in &self.rules {
            compiler.add(RuleDecl {
                action: ActionId::from_dynamic(&entry.action),
                patterns: entry.patterns.clone(),
            });
        }
        let rules = compiler.compile()?;
        tracing::debug!(
            kinds = self.kinds.len(),
            rules = rules.len(),
            "rule table compiled"
        );
        Ok(rules)
    }
}
