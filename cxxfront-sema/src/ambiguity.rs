//! Ambiguity resolution
//!
//! An ambiguous node carries two or more grammatically valid parses of
//! the same source range. Resolution runs a fixed-order trial over the
//! alternatives and commits exactly one by replacing the ambiguous node
//! in its parent; the losers, and every scope entry they registered
//! speculatively, are retracted so no phantom binding stays visible.
//!
//! The protocol per node:
//!
//! 1. `before_resolution`: the enclosing non-template scope is
//!    populated up front, fixing the visible-binding set before any
//!    alternative is speculatively evaluated;
//! 2. per candidate, in trial order: the previous candidate's
//!    speculative declarations are retracted, then the candidate is
//!    scored by the strategy for this ambiguity kind;
//! 3. the best-scoring candidate wins; on a total failure the first
//!    (syntactically preferred) alternative is kept and a diagnostic is
//!    recorded (analysis always produces some tree);
//! 4. `after_resolution`: the winner's declarations are re-applied and
//!    the winner replaces the ambiguous node in the parent.
//!
//! Scoring is a pluggable strategy selected by the ambiguity kind; the
//! framework provides only trial, rollback and commit.

use crate::bindings::BindingKind;
use crate::context::{AnalysisContext, SpeculativeDecl};
use crate::error::{to_source_span, SemanticError};
use crate::semantics::{
    collect_declaration, enclosing_non_template_scope, ensure_populated, expression_type,
    resolve_name_str, type_from_type_id,
};
use cxxfront_ast::{
    AmbiguityKind, ChildRole, DeclarationKind, ExpressionKind, NodeId, NodeKind, StatementKind,
};

/// Scores returned by strategies; anything below zero means "not
/// semantically valid".
pub type Score = i32;

/// Per-kind scoring policy. The framework never interprets a score
/// beyond "higher wins, negative is invalid".
pub trait AmbiguityStrategy {
    fn kind(&self) -> AmbiguityKind;

    /// Score one candidate. Runs with the speculation ledger active, so
    /// any scope entries made while scoring are retractable.
    fn score(&self, ctx: &mut AnalysisContext, alternative: NodeId) -> Score;
}

struct CastVsBinary;
struct DeclarationVsExpression;
struct TypeConstraintVsNonType;

/// Strategy lookup by ambiguity kind.
pub fn strategy_for(kind: AmbiguityKind) -> &'static dyn AmbiguityStrategy {
    match kind {
        AmbiguityKind::CastVsBinaryExpression => &CastVsBinary,
        AmbiguityKind::DeclarationVsExpression => &DeclarationVsExpression,
        AmbiguityKind::TypeConstraintVsNonTypeArgument => &TypeConstraintVsNonType,
    }
}

/// Resolve every ambiguous node in the tree. Nodes are processed in
/// depth-first source order and the tree is re-scanned after each
/// commit, so nested ambiguities inside a winning alternative are
/// resolved too. Deterministic: same tree and declarations, same
/// winners.
pub fn resolve_ambiguities(ctx: &mut AnalysisContext) {
    loop {
        let ambiguities = ctx.arena.collect_ambiguities(ctx.root());
        let Some((node, kind)) = ambiguities.into_iter().next() else {
            return;
        };
        resolve_one(ctx, node, kind);
    }
}

fn retract(ctx: &mut AnalysisContext, entries: &[SpeculativeDecl]) {
    for entry in entries {
        ctx.scopes.remove(entry.scope, &entry.name, entry.binding);
    }
}

fn resolve_one(ctx: &mut AnalysisContext, node: NodeId, kind: AmbiguityKind) {
    let parent = ctx
        .arena
        .parent(node)
        .expect("ambiguous node must be attached before resolution");
    let strategy = strategy_for(kind);

    // before_resolution: fix the visible set of the enclosing
    // non-template scope so one alternative's speculation cannot leak
    // into another's lookups
    let scope = enclosing_non_template_scope(ctx, node);
    ensure_populated(ctx, scope);

    let alternatives = ctx.arena.alternatives(node);
    let mut best: Option<(NodeId, Score)> = None;
    let mut previous: Vec<SpeculativeDecl> = Vec::new();
    for alternative in &alternatives {
        // before_alternative: the previous candidate's speculative
        // declarations must be gone before this one is tried
        retract(ctx, &previous);
        ctx.begin_speculation();
        let score = strategy.score(ctx, *alternative);
        previous = ctx.take_speculation();
        if score >= 0 && best.map(|(_, s)| score > s).unwrap_or(true) {
            best = Some((*alternative, score));
        }
    }
    // the last candidate's speculation is retracted as well; the
    // winner's declarations are re-applied below, cleanly
    retract(ctx, &previous);

    let winner = match best {
        Some((winner, _)) => winner,
        None => {
            // no alternative is valid: keep the syntactically preferred
            // one and say so, rather than failing the whole analysis
            let span = ctx.arena.span(node);
            ctx.report(SemanticError::UnresolvableAmbiguity {
                span: to_source_span(span),
            });
            alternatives[0]
        }
    };

    // commit: swap the winner into the parent; the ambiguous node and
    // the losing alternatives are discarded with it
    ctx.arena.detach(winner);
    ctx.arena.replace_child(parent, node, winner);
    // drop any resolutions cached against nodes inside the discarded
    // subtree; they refer to alternatives that no longer exist
    let stale: Vec<NodeId> = ctx
        .resolutions
        .keys()
        .copied()
        .filter(|n| ctx.arena.is_within(node, *n))
        .collect();
    for n in stale {
        ctx.resolutions.shift_remove(&n);
    }

    // after_resolution: apply the winner's declarations for real
    apply_winner_declarations(ctx, winner);
}

fn apply_winner_declarations(ctx: &mut AnalysisContext, winner: NodeId) {
    let scope = enclosing_non_template_scope(ctx, winner);
    match ctx.arena.kind(winner) {
        NodeKind::Declaration(_) | NodeKind::Statement(StatementKind::Declaration) => {
            collect_declaration(ctx, scope, winner, None);
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------
// strategies
// ---------------------------------------------------------------------

/// `(T)(x)`: cast wins when the parenthesized name denotes a valid
/// type-id in a context that needs a unary-expression operand.
impl AmbiguityStrategy for CastVsBinary {
    fn kind(&self) -> AmbiguityKind {
        AmbiguityKind::CastVsBinaryExpression
    }

    fn score(&self, ctx: &mut AnalysisContext, alternative: NodeId) -> Score {
        match ctx.arena.kind(alternative).clone() {
            NodeKind::Expression(ExpressionKind::Cast(_)) => {
                let Some(type_id) = ctx.arena.child(alternative, ChildRole::TypeId) else {
                    return -1;
                };
                let scope = enclosing_non_template_scope(ctx, alternative);
                let ty = type_from_type_id(ctx, scope, type_id);
                if ty.is_problem() {
                    -1
                } else {
                    // the cast interpretation is preferred when valid
                    100
                }
            }
            NodeKind::Expression(_) => {
                let ty = expression_type(ctx, alternative);
                if ty.is_problem() {
                    -1
                } else {
                    50
                }
            }
            _ => -1,
        }
    }
}

/// `T(x);`: prefer the declaration whenever the candidate declaration
/// is well formed (the standard's "it's a declaration if it can be").
impl AmbiguityStrategy for DeclarationVsExpression {
    fn kind(&self) -> AmbiguityKind {
        AmbiguityKind::DeclarationVsExpression
    }

    fn score(&self, ctx: &mut AnalysisContext, alternative: NodeId) -> Score {
        match ctx.arena.kind(alternative).clone() {
            NodeKind::Statement(StatementKind::Declaration)
            | NodeKind::Declaration(DeclarationKind::Simple) => {
                let scope = enclosing_non_template_scope(ctx, alternative);
                let introduced = collect_declaration(ctx, scope, alternative, None);
                let sound = !introduced.is_empty()
                    && introduced.iter().all(|b| {
                        !ctx.bindings.get(*b).is_problem()
                            && !ctx
                                .bindings
                                .type_of(*b)
                                .map(|t| t.is_problem())
                                .unwrap_or(false)
                    });
                if sound {
                    100
                } else {
                    -1
                }
            }
            NodeKind::Statement(StatementKind::Expression) => {
                let Some(expr) = ctx.arena.child(alternative, ChildRole::Operand) else {
                    return -1;
                };
                let ty = expression_type(ctx, expr);
                if ty.is_problem() {
                    -1
                } else {
                    50
                }
            }
            NodeKind::Expression(_) => {
                let ty = expression_type(ctx, alternative);
                if ty.is_problem() {
                    -1
                } else {
                    50
                }
            }
            _ => -1,
        }
    }
}

/// Template argument that is either a type constraint or a non-type
/// expression. Either candidate may register declarations while being
/// evaluated; the framework's ledger makes those retractable, which is
/// exactly what this kind needs.
impl AmbiguityStrategy for TypeConstraintVsNonType {
    fn kind(&self) -> AmbiguityKind {
        AmbiguityKind::TypeConstraintVsNonTypeArgument
    }

    fn score(&self, ctx: &mut AnalysisContext, alternative: NodeId) -> Score {
        match ctx.arena.kind(alternative).clone() {
            NodeKind::TypeIdNode => {
                let scope = enclosing_non_template_scope(ctx, alternative);
                let ty = type_from_type_id(ctx, scope, alternative);
                if ty.is_problem() {
                    -1
                } else {
                    100
                }
            }
            NodeKind::Expression(ExpressionKind::IdExpression) => {
                let Some(name_node) = ctx.arena.child(alternative, ChildRole::Name) else {
                    return -1;
                };
                let Some(text) = ctx.arena.name_text(name_node) else {
                    return -1;
                };
                let scope = enclosing_non_template_scope(ctx, alternative);
                match resolve_name_str(ctx, scope, &text) {
                    Some(binding) => {
                        // a value binding makes this a non-type argument
                        match ctx.bindings.get(binding).kind {
                            BindingKind::Variable { .. }
                            | BindingKind::Enumerator { .. }
                            | BindingKind::Field { .. } => 80,
                            _ => -1,
                        }
                    }
                    None => -1,
                }
            }
            NodeKind::Expression(_) => {
                let ty = expression_type(ctx, alternative);
                if ty.is_problem() {
                    -1
                } else {
                    40
                }
            }
            // a declaration-shaped candidate: trial-declare and judge
            NodeKind::Declaration(_) => {
                let scope = enclosing_non_template_scope(ctx, alternative);
                let introduced = collect_declaration(ctx, scope, alternative, None);
                if introduced.iter().any(|b| ctx.bindings.get(*b).is_problem()) {
                    -1
                } else {
                    60
                }
            }
            _ => -1,
        }
    }
}
