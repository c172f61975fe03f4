//! Visitor protocol for arena-based AST traversal
//!
//! Traversal is depth-first with an enter hook per node family and a
//! post-order leave hook. Enter hooks steer the walk: `Continue` descends
//! into children, `Skip` keeps the node but skips its subtree, `Abort`
//! stops the whole traversal immediately. Implementors override only the
//! hooks they care about; the `walk_*` free functions provide the default
//! structure.

use crate::arena::{NodeArena, NodeId};
use crate::ast::NodeKind;

/// Decision returned by enter hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitAction {
    /// Visit the node's children
    Continue,
    /// Keep the node, skip its children
    Skip,
    /// Stop the entire traversal
    Abort,
}

/// Visitor over an arena-stored tree
///
/// Each hook receives the arena and the node id so implementors can
/// query payloads and children as needed. Default implementations visit
/// everything.
pub trait Visitor {
    fn enter_node(&mut self, _arena: &NodeArena, _id: NodeId) -> VisitAction {
        VisitAction::Continue
    }

    fn leave_node(&mut self, _arena: &NodeArena, _id: NodeId) {}

    fn enter_declaration(&mut self, _arena: &NodeArena, _id: NodeId) -> VisitAction {
        VisitAction::Continue
    }

    fn enter_statement(&mut self, _arena: &NodeArena, _id: NodeId) -> VisitAction {
        VisitAction::Continue
    }

    fn enter_expression(&mut self, _arena: &NodeArena, _id: NodeId) -> VisitAction {
        VisitAction::Continue
    }

    fn enter_name(&mut self, _arena: &NodeArena, _id: NodeId) -> VisitAction {
        VisitAction::Continue
    }

    fn enter_declarator(&mut self, _arena: &NodeArena, _id: NodeId) -> VisitAction {
        VisitAction::Continue
    }

    fn enter_ambiguous(&mut self, _arena: &NodeArena, _id: NodeId) -> VisitAction {
        VisitAction::Continue
    }

    fn enter_problem(&mut self, _arena: &NodeArena, _id: NodeId) -> VisitAction {
        VisitAction::Continue
    }
}

/// Walk the subtree rooted at `id`, driving the visitor's hooks.
///
/// Returns `Abort` if the visitor aborted somewhere below, otherwise
/// `Continue`; callers composing larger walks propagate `Abort`.
pub fn walk<V: Visitor>(visitor: &mut V, arena: &NodeArena, id: NodeId) -> VisitAction {
    let generic = visitor.enter_node(arena, id);
    if generic == VisitAction::Abort {
        return VisitAction::Abort;
    }

    let family = match arena.kind(id) {
        NodeKind::Declaration(_) => visitor.enter_declaration(arena, id),
        NodeKind::Statement(_) => visitor.enter_statement(arena, id),
        NodeKind::Expression(_) => visitor.enter_expression(arena, id),
        NodeKind::Name(_) => visitor.enter_name(arena, id),
        NodeKind::Declarator(_) => visitor.enter_declarator(arena, id),
        NodeKind::Ambiguous(_) => visitor.enter_ambiguous(arena, id),
        NodeKind::Problem(_) => visitor.enter_problem(arena, id),
        _ => VisitAction::Continue,
    };
    match family {
        VisitAction::Abort => return VisitAction::Abort,
        VisitAction::Skip => {
            visitor.leave_node(arena, id);
            return VisitAction::Continue;
        }
        VisitAction::Continue => {}
    }
    if generic == VisitAction::Skip {
        visitor.leave_node(arena, id);
        return VisitAction::Continue;
    }

    for (_, child) in arena.children(id).iter() {
        if walk(visitor, arena, *child) == VisitAction::Abort {
            return VisitAction::Abort;
        }
    }
    visitor.leave_node(arena, id);
    VisitAction::Continue
}
