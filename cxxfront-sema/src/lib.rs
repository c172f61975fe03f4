//! cxxfront semantic core
//!
//! Builds bindings and types over the AST shells the parser hands in:
//! name resolution, scope management, ambiguity resolution, template
//! instantiation, and the type model with its persistence contract.
//!
//! ## Architecture
//!
//! - **Type model** (`types`, `marshal`): structural value types with
//!   typedef-transparent equality and a tag-byte marshal contract for
//!   the index layer.
//! - **Binding model** (`bindings`): arena-allocated semantic entities;
//!   problem/unknown sentinels instead of nulls throughout.
//! - **Scope model** (`scope`): lazy, insertion-ordered name tables
//!   with reentrancy-guarded population and targeted invalidation.
//! - **Resolution** (`semantics`): declaration collection, two-phase
//!   lookup with a pending worklist, expression typing, overload
//!   selection.
//! - **Ambiguity** (`ambiguity`): trial/rollback/commit over
//!   alternative parses, per-kind scoring strategies.
//! - **Templates** (`templates`, `deduction`, `instantiation_graph`):
//!   argument deduction, partial specialization ranking, cached
//!   instantiation with depth and cycle guards.
//!
//! Analysis is single-threaded per translation unit; every entry point
//! threads the unit's `AnalysisContext` explicitly. Independent units
//! get independent contexts.

pub mod ambiguity;
pub mod bindings;
pub mod context;
pub mod deduction;
pub mod error;
pub mod instantiation_graph;
pub mod marshal;
pub mod scope;
pub mod semantics;
pub mod templates;
pub mod types;

#[cfg(test)]
#[path = "tests/mod.rs"]
mod tests;

// Re-export public API
pub use ambiguity::{resolve_ambiguities, strategy_for, AmbiguityStrategy};
pub use bindings::{
    argument_list_signature, Binding, BindingArena, BindingId, BindingKind, Linkage, ParameterMap,
    TemplateArgument, TemplateParamKind,
};
pub use context::{AnalysisContext, PendingLookup, SpeculativeDecl};
pub use deduction::{deduce_for_function_call, DeductionOutcome};
pub use error::{DiagnosticCode, SemanticError};
pub use instantiation_graph::InstantiationGraph;
pub use marshal::{marshal_type, marshal_type_to_bytes, unmarshal_type, MarshalWriter};
pub use scope::{Scope, ScopeArena, ScopeId, ScopeKind};
pub use semantics::{
    analyze, enclosing_scope, ensure_populated, evaluate_constant, expression_type,
    lookup_two_phase, resolve_in_scope, resolve_name_node, resolve_name_str, Resolution,
};
pub use templates::{
    instantiate_class_template, instantiate_function_template, instantiate_type,
    select_partial_specialization, specialize_member, InstanceCache, PartialSelection,
    MAX_INSTANTIATION_DEPTH,
};
pub use types::{
    cv_qualifiers_of, strip_nested, BasicKind, BasicModifiers, CxxType, ValueCategory,
    MAX_TYPE_NESTING,
};

/// Analyze one translation unit: takes ownership of the parsed tree and
/// returns the fully analyzed context, problem markers included. Never
/// fails; a unit with errors still yields a complete, navigable tree.
pub fn analyze_translation_unit(
    arena: cxxfront_ast::NodeArena,
    root: cxxfront_ast::NodeId,
) -> AnalysisContext {
    let mut ctx = AnalysisContext::new(arena, root);
    semantics::analyze(&mut ctx);
    ctx
}
