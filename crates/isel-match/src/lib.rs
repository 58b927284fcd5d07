//! Tree-pattern instruction selection.
//!
//! Rules are s-expression patterns over node kinds, each tied to an action
//! identifier:
//!
//! ```text
//! (Mul (Add a b) Const=c)   → FMA_LOWER
//! ```
//!
//! The pipeline is:
//! 1. [`parse_pattern`] turns pattern text into a [`Pattern`] tree.
//! 2. [`RuleCompiler`] (or a [`RuleTable`]) validates the patterns and ranks
//!    them per root kind into an immutable [`RuleSet`].
//! 3. [`Matcher`] finds the best rule for a candidate root in a graph seen
//!    through [`isel_ir::GraphView`].
//! 4. [`MatchSelector`] finalizes matches without fusing a node twice, and
//!    [`SelectionPass`] drives both over scheduled blocks.

pub mod bindings;
pub mod compile;
pub mod errors;
pub mod matcher;
pub mod parser;
pub mod pass;
pub mod pattern;
pub mod selector;
pub mod table;

pub use bindings::{BindingViolation, Bindings, check_bindings};
pub use compile::{ActionId, CompiledRule, RuleCompiler, RuleDecl, RuleSet, compile_rule};
pub use errors::{
    CompileError, CompileErrorKind, CompileResult, ConsumptionConflict, PatternError, TableError,
};
pub use matcher::{MatchResult, Matcher};
pub use parser::parse_pattern;
pub use pass::{BlockSelection, PassOptions, PassStats, Selection, SelectionPass};
pub use pattern::{NodeName, PatRef, Pattern, PatternArg, PatternBuilder, PatternNodeData};
pub use selector::MatchSelector;
pub use table::{KindEntry, RuleEntry, RuleTable};
