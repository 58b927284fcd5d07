//! Node kinds and the registry of their capabilities.
//!
//! A [`NodeKind`] names an operation category. What the matcher may do with
//! a kind is not hardcoded: it is read from the [`KindInfo`] flags recorded
//! in a [`KindRegistry`], so a new free-standing kind only needs a
//! registration.

use std::collections::HashMap;

use derive_more::{Display, Error};

use crate::Symbol;

/// Operation category of a graph node (`Add`, `Const`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display("{_0}")]
pub struct NodeKind(Symbol);

impl NodeKind {
    pub fn new(text: &'static str) -> Self {
        debug_assert!(Self::is_valid_token(text), "invalid node kind `{text}`");
        NodeKind(Symbol::new(text))
    }

    pub fn from_dynamic(text: &str) -> Self {
        NodeKind(Symbol::from_dynamic(text))
    }

    pub fn symbol(self) -> Symbol {
        self.0
    }

    /// Whether `text` is a well-formed kind token: `[A-Z][a-zA-Z0-9]*`.
    pub fn is_valid_token(text: &str) -> bool {
        let mut chars = text.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_uppercase())
            && chars.all(|c| c.is_ascii_alphanumeric())
    }
}

/// Capability flags attached to a kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KindInfo {
    /// Exempt from the single-use and same-block constraints (constants).
    pub free: bool,
    /// Binary operands may be matched in either order.
    pub commutative: bool,
    /// Declared operand count, if the kind has a fixed one.
    pub arity: Option<usize>,
}

impl KindInfo {
    pub fn free() -> Self {
        KindInfo {
            free: true,
            ..KindInfo::default()
        }
    }

    pub fn with_arity(mut self, arity: usize) -> Self {
        self.arity = Some(arity);
        self
    }

    pub fn commutative(mut self) -> Self {
        self.commutative = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Display, Error)]
pub enum RegistryError {
    #[display("node kind `{_0}` is registered twice")]
    DuplicateKind(#[error(not(source))] NodeKind),

    #[display("`{_0}` is not a valid node kind (expected [A-Z][a-zA-Z0-9]*)")]
    InvalidKindName(#[error(not(source))] String),
}

/// The set of kinds known to the compiler.
///
/// A closed registry (the default) lets the rule compiler reject patterns
/// naming unknown kinds. An [`open`](KindRegistry::open) registry accepts any
/// kind and reports default flags for the ones it has not seen.
#[derive(Clone, Debug, Default)]
pub struct KindRegistry {
    kinds: Vec<(NodeKind, KindInfo)>,
    index: HashMap<NodeKind, usize>,
    open: bool,
}

impl KindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open() -> Self {
        KindRegistry {
            open: true,
            ..KindRegistry::default()
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Register a kind with its capabilities.
    pub fn register(&mut self, kind: NodeKind, info: KindInfo) -> Result<(), RegistryError> {
        if !kind.symbol().with_str(NodeKind::is_valid_token) {
            return Err(RegistryError::InvalidKindName(kind.to_string()));
        }
        if self.index.contains_key(&kind) {
            return Err(RegistryError::DuplicateKind(kind));
        }
        self.index.insert(kind, self.kinds.len());
        self.kinds.push((kind, info));
        Ok(())
    }

    /// Builder-style registration for statically known kinds.
    ///
    /// # Panics
    ///
    /// Panics if the kind is already registered.
    pub fn with(mut self, kind: &'static str, info: KindInfo) -> Self {
        if let Err(e) = self.register(NodeKind::new(kind), info) {
            panic!("KindRegistry::with: {e}");
        }
        self
    }

    pub fn get(&self, kind: NodeKind) -> Option<&KindInfo> {
        self.index.get(&kind).map(|&i| &self.kinds[i].1)
    }

    /// Capabilities of `kind`, defaulting to no flags when unregistered.
    pub fn info(&self, kind: NodeKind) -> KindInfo {
        self.get(kind).copied().unwrap_or_default()
    }

    /// Whether a pattern may mention `kind`.
    pub fn accepts(&self, kind: NodeKind) -> bool {
        self.open || self.contains(kind)
    }

    pub fn contains(&self, kind: NodeKind) -> bool {
        self.index.contains_key(&kind)
    }

    pub fn is_free(&self, kind: NodeKind) -> bool {
        self.info(kind).free
    }

    pub fn is_commutative(&self, kind: NodeKind) -> bool {
        self.info(kind).commutative
    }

    pub fn arity(&self, kind: NodeKind) -> Option<usize> {
        self.info(kind).arity
    }

    /// Registered kinds in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeKind, &KindInfo)> {
        self.kinds.iter().map(|(k, info)| (*k, info))
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_token_validity() {
        assert!(NodeKind::is_valid_token("Add"));
        assert!(NodeKind::is_valid_token("F2I"));
        assert!(!NodeKind::is_valid_token("add"));
        assert!(!NodeKind::is_valid_token("Add_x"));
        assert!(!NodeKind::is_valid_token(""));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut reg = KindRegistry::new();
        reg.register(NodeKind::new("Const"), KindInfo::free()).unwrap();
        let err = reg
            .register(NodeKind::new("Const"), KindInfo::default())
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateKind(NodeKind::new("Const")));
    }

    #[test]
    fn invalid_name_rejected() {
        let mut reg = KindRegistry::new();
        let err = reg
            .register(NodeKind::from_dynamic("lower"), KindInfo::default())
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidKindName(_)));
    }

    #[test]
    fn flags_are_looked_up_per_kind() {
        let reg = KindRegistry::new()
            .with("Const", KindInfo::free())
            .with("Add", KindInfo::default().with_arity(2).commutative());

        assert!(reg.is_free(NodeKind::new("Const")));
        assert!(!reg.is_free(NodeKind::new("Add")));
        assert!(reg.is_commutative(NodeKind::new("Add")));
        assert_eq!(reg.arity(NodeKind::new("Add")), Some(2));
        assert!(!reg.accepts(NodeKind::new("Mul")));
        assert!(KindRegistry::open().accepts(NodeKind::new("Mul")));

        let order: Vec<String> = reg.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(order, ["Const", "Add"]);
    }

    #[test]
    fn open_registry_accepts_without_registering() {
        let reg = KindRegistry::open().with("Const", KindInfo::free());
        assert!(reg.is_open());
        assert!(!KindRegistry::new().is_open());

        let shl = NodeKind::new("Shl");
        assert!(reg.accepts(shl));
        assert!(!reg.contains(shl));
        assert!(reg.contains(NodeKind::new("Const")));
        assert_eq!(reg.info(shl), KindInfo::default());
    }
}
