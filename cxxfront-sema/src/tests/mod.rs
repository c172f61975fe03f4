//! Integration tests for the semantic core
//!
//! Trees are built through the AST builder exactly the way the external
//! parser would hand them over, then run through the full analysis.

// Type model and persistence
mod test_type_marshal;


// Scope population and lookup
mod test_scope_lookup;

// Name resolution end to end
mod test_resolution;


// Ambiguity trial/rollback/commit
mod test_ambiguity;

use crate::context::AnalysisContext;
use cxxfront_ast::{NodeArena, NodeId, Span};

/// Build a translation unit with the supplied builder callback and run
/// the full analysis over it.
pub fn analyze_tu(build: impl FnOnce(&mut NodeArena, NodeId)) -> AnalysisContext {
    let mut arena = NodeArena::new();
    let root = arena.translation_unit(Span::new(0, 4096));
    build(&mut arena, root);
    crate::analyze_translation_unit(arena, root)
}

/// Shorthand span; tests use distinct offsets where ordering matters.
pub fn sp(start: usize, end: usize) -> Span {
    Span::new(start, end)
}
