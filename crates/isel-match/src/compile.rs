//! Rule compilation.
//!
//! Declared rules (an action plus one or more alternative pattern strings)
//! are parsed, validated against a [`KindRegistry`] and grouped by the kind
//! of their root node. Within a group rules are ranked by specificity
//! (node-spec count, larger first), then declaration order, then the order
//! of alternatives inside one declaration. The resulting [`RuleSet`] is
//! immutable and can be shared between threads.

use std::collections::HashMap;

use derive_more::Display;
use isel_ir::{KindRegistry, NodeKind, Symbol};

use crate::errors::{CompileError, CompileErrorKind, CompileResult};
use crate::parser::parse_pattern;
use crate::pattern::{NodeName, Pattern, PatternArg};

/// Opaque identifier handed back to codegen when a rule wins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display("{_0}")]
pub struct ActionId(Symbol);

impl ActionId {
    pub fn new(text: &'static str) -> Self {
        ActionId(Symbol::new(text))
    }

    pub fn from_dynamic(text: &str) -> Self {
        ActionId(Symbol::from_dynamic(text))
    }

    pub fn symbol(self) -> Symbol {
        self.0
    }
}

/// One declared rule: an action and the alternative shapes that select it.
#[derive(Clone, Debug)]
pub struct RuleDecl {
    pub action: ActionId,
    pub patterns: Vec<String>,
}

/// A single pattern alternative ready for matching.
#[derive(Clone, Debug)]
pub struct CompiledRule {
    pub pattern: Pattern,
    pub action: ActionId,
    /// Node-spec count of the pattern.
    pub specificity: usize,
    /// Position of the owning declaration.
    pub declaration: usize,
    /// Position of this alternative within its declaration.
    pub alternative: usize,
    /// Pattern text as declared.
    pub source: String,
    root_kind: NodeKind,
}

impl CompiledRule {
    pub fn root_kind(&self) -> NodeKind {
        self.root_kind
    }

    fn rank_key(&self) -> (std::cmp::Reverse<usize>, usize, usize) {
        (
            std::cmp::Reverse(self.specificity),
            self.declaration,
            self.alternative,
        )
    }
}

/// Parse and validate one pattern alternative.
pub fn compile_rule(
    registry: &KindRegistry,
    action: ActionId,
    source: &str,
    declaration: usize,
    alternative: usize,
) -> CompileResult<CompiledRule> {
    let pattern =
        parse_pattern(source).map_err(|e| CompileError::grammar(action, source, e))?;

    let root = match pattern.root() {
        PatternArg::Node(p) => p,
        PatternArg::Name(name) => {
            return Err(CompileErrorKind::BareRoot {
                action,
                pattern: source.to_string(),
                name,
            }
            .into());
        }
    };

    let mut constraints: Vec<(NodeName, NodeKind)> = Vec::new();
    for p in pattern.preorder() {
        let data = pattern.node(p);
        if !registry.accepts(data.kind) {
            return Err(CompileErrorKind::UnknownKind {
                action,
                pattern: source.to_string(),
                kind: data.kind,
            }
            .into());
        }
        if let Some(declared) = registry.arity(data.kind)
            && data.is_rule()
            && declared != data.args.len()
        {
            return Err(CompileErrorKind::ArityMismatch {
                action,
                pattern: source.to_string(),
                kind: data.kind,
                declared,
                found: data.args.len(),
            }
            .into());
        }
        if let Some(name) = data.name {
            match constraints.iter().find(|(n, _)| *n == name) {
                Some(&(_, first)) if first != data.kind => {
                    return Err(CompileErrorKind::AmbiguousBinding {
                        action,
                        pattern: source.to_string(),
                        name,
                        first,
                        second: data.kind,
                    }
                    .into());
                }
                Some(_) => {}
                None => constraints.push((name, data.kind)),
            }
        }
    }

    let root_kind = pattern.node(root).kind;
    Ok(CompiledRule {
        specificity: pattern.node_count(),
        pattern,
        action,
        declaration,
        alternative,
        source: source.to_string(),
        root_kind,
    })
}

// ============================================================================
// RuleSet
// ============================================================================

/// Compiled rules indexed by root kind.
#[derive(Clone, Debug)]
pub struct RuleSet {
    by_kind: HashMap<NodeKind, Vec<CompiledRule>>,
    registry: KindRegistry,
    len: usize,
}

impl RuleSet {
    /// Ranked candidates for roots of `kind`; empty when no rule applies.
    pub fn rules_for(&self, kind: NodeKind) -> &[CompiledRule] {
        self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn registry(&self) -> &KindRegistry {
        &self.registry
    }

    /// Root kinds with at least one rule, sorted by name.
    pub fn kinds(&self) -> Vec<NodeKind> {
        let mut kinds: Vec<NodeKind> = self.by_kind.keys().copied().collect();
        kinds.sort_by_cached_key(|k| k.to_string());
        kinds
    }

    /// Total number of compiled alternatives.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

// ============================================================================
// RuleCompiler
// ============================================================================

/// Collects rule declarations and compiles them into a [`RuleSet`].
pub struct RuleCompiler {
    registry: KindRegistry,
    decls: Vec<RuleDecl>,
}

impl RuleCompiler {
    pub fn new(registry: KindRegistry) -> Self {
        Self {
            registry,
            decls: Vec::new(),
        }
    }

    /// Declare a rule. Declaration order is the order of calls.
    pub fn rule<I, S>(mut self, action: ActionId, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add(RuleDecl {
            action,
            patterns: patterns.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn add(&mut self, decl: RuleDecl) {
        self.decls.push(decl);
    }

    pub fn compile(self) -> CompileResult<RuleSet> {
        let mut by_kind: HashMap<NodeKind, Vec<CompiledRule>> = HashMap::new();
        let mut seen: Vec<ActionId> = Vec::with_capacity(self.decls.len());
        let mut len = 0;

        for (declaration, decl) in self.decls.iter().enumerate() {
            if seen.contains(&decl.action) {
                return Err(CompileErrorKind::DuplicateAction {
                    action: decl.action,
                }
                .into());
            }
            seen.push(decl.action);
            if decl.patterns.is_empty() {
                return Err(CompileErrorKind::EmptyRule {
                    action: decl.action,
                }
                .into());
            }
            for (alternative, source) in decl.patterns.iter().enumerate() {
                let rule =
                    compile_rule(&self.registry, decl.action, source, declaration, alternative)?;
                by_kind.entry(rule.root_kind).or_default().push(rule);
                len += 1;
            }
        }

        for (kind, rules) in by_kind.iter_mut() {
            rules.sort_by_key(CompiledRule::rank_key);
            tracing::debug!(
                kind = %kind,
                rules = rules.len(),
                "compiled rules for root kind"
            );
        }

        Ok(RuleSet {
            by_kind,
            registry: self.registry,
            len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isel_ir::KindInfo;

    fn registry() -> KindRegistry {
        KindRegistry::new()
            .with("Const", KindInfo::free())
            .with("Param", KindInfo::default())
            .with("Add", KindInfo::default().with_arity(2).commutative())
            .with("Mul", KindInfo::default().with_arity(2))
            .with("Neg", KindInfo::default().with_arity(1))
    }

    fn compile_one(src: &str) -> CompileResult<CompiledRule> {
        compile_rule(&registry(), ActionId::new("TEST"), src, 0, 0)
    }

    #[test]
    fn specificity_counts_node_specs() {
        assert_eq!(compile_one("Add").unwrap().specificity, 1);
        assert_eq!(compile_one("(Add a b)").unwrap().specificity, 1);
        assert_eq!(compile_one("(Add Const Const)").unwrap().specificity, 3);
        assert_eq!(
            compile_one("(Mul (Add a b) Const=c)").unwrap().specificity,
            3
        );
    }

    #[test]
    fn bare_root_rejected() {
        let err = compile_one("x").unwrap_err();
        assert!(matches!(err.kind(), CompileErrorKind::BareRoot { .. }), "{err}");
    }

    #[test]
    fn conflicting_kinds_for_one_name_rejected() {
        let err = compile_one("(Add Const=k Param=k)").unwrap_err();
        match err.kind() {
            CompileErrorKind::AmbiguousBinding {
                name,
                first,
                second,
                ..
            } => {
                assert_eq!(*name, NodeName::new("k"));
                assert_eq!(*first, NodeKind::new("Const"));
                assert_eq!(*second, NodeKind::new("Param"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn repeated_name_with_same_kind_accepted() {
        assert!(compile_one("(Add Neg=n Neg=n)").is_ok());
        // Bare uses carry no kind constraint.
        assert!(compile_one("(Add Neg=n n)").is_ok());
    }

    #[test]
    fn unknown_kind_rejected_by_closed_registry() {
        let err = compile_one("(Add Shl a)").unwrap_err();
        assert!(matches!(
            err.kind(),
            CompileErrorKind::UnknownKind { kind, .. } if *kind == NodeKind::new("Shl")
        ));

        let open = KindRegistry::open();
        assert!(compile_rule(&open, ActionId::new("TEST"), "(Shl a b)", 0, 0).is_ok());
    }

    #[test]
    fn arity_checked_only_for_match_rules() {
        let err = compile_one("(Neg a b)").unwrap_err();
        assert!(matches!(
            err.kind(),
            CompileErrorKind::ArityMismatch {
                declared: 1,
                found: 2,
                ..
            }
        ));
        assert!(compile_one("(Mul Neg a)").is_ok());
    }

    #[test]
    fn grammar_errors_carry_action_and_pattern() {
        let err = compile_one("(Add a").unwrap_err();
        assert!(matches!(err.kind(), CompileErrorKind::Grammar { .. }));
        assert!(err.to_string().starts_with("rule TEST: pattern `(Add a`: expected"));
    }

    #[test]
    fn rules_ranked_by_specificity_then_declaration() {
        let rules = RuleCompiler::new(registry())
            .rule(ActionId::new("ADD"), ["(Add a b)"])
            .rule(ActionId::new("ADD_IMM"), ["(Add a Const=c)"])
            .rule(ActionId::new("ADD_CC"), ["(Add Const Const)", "(Add Neg Const)"])
            .rule(ActionId::new("MADD"), ["(Add (Mul a b) c)"])
            .compile()
            .unwrap();

        let ranked: Vec<String> = rules
            .rules_for(NodeKind::new("Add"))
            .iter()
            .map(|r| format!("{}:{}", r.action, r.pattern))
            .collect();
        assert_eq!(
            ranked,
            [
                "ADD_CC:(Add Const Const)",
                "ADD_CC:(Add Neg Const)",
                "ADD_IMM:(Add a Const=c)",
                "MADD:(Add (Mul a b) c)",
                "ADD:(Add a b)",
            ]
        );
        assert_eq!(rules.len(), 5);
        assert!(rules.rules_for(NodeKind::new("Mul")).is_empty());
    }

    #[test]
    fn empty_and_duplicate_declarations_rejected() {
        let err = RuleCompiler::new(registry())
            .rule(ActionId::new("NOTHING"), Vec::<String>::new())
            .compile()
            .unwrap_err();
        assert!(matches!(err.kind(), CompileErrorKind::EmptyRule { .. }));

        let err = RuleCompiler::new(registry())
            .rule(ActionId::new("ADD"), ["(Add a b)"])
            .rule(ActionId::new("ADD"), ["(Add a Const)"])
            .compile()
            .unwrap_err();
        assert!(matches!(err.kind(), CompileErrorKind::DuplicateAction { .. }));
    }
}
