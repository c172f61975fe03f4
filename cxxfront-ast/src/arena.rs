//! Arena storage for AST nodes
//!
//! Nodes live in a flat arena and reference each other through stable
//! `NodeId` indices. Parent/child links are kept on both sides: every
//! node records its parent and its role within it, and the parent keeps
//! an ordered child-slot table. `replace_child` rewrites both sides in
//! one step, which is what ambiguity resolution relies on to swap the
//! winning alternative into the tree.

use crate::ast::{AmbiguityKind, ChildRole, NodeKind, Span};

/// Stable index of a node within its arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A single AST node
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    parent: Option<NodeId>,
    role: ChildRole,
    children: Vec<(ChildRole, NodeId)>,
    frozen: bool,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn role(&self) -> ChildRole {
        self.role
    }

    pub fn children(&self) -> &[(ChildRole, NodeId)] {
        &self.children
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}

/// How deep copies treat source locations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyStyle {
    WithLocations,
    WithoutLocations,
}

/// Flat node storage for one translation unit
#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: Vec<Node>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Create a detached node. The parser attaches it afterwards; until
    /// then the node is a root with no role.
    pub fn alloc(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            span,
            parent: None,
            role: ChildRole::None,
            children: Vec::new(),
            frozen: false,
        });
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.nodes[id.index()].span
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn role(&self, id: NodeId) -> ChildRole {
        self.nodes[id.index()].role
    }

    pub fn children(&self, id: NodeId) -> &[(ChildRole, NodeId)] {
        &self.nodes[id.index()].children
    }

    /// First child with the given role, if any
    pub fn child(&self, id: NodeId, role: ChildRole) -> Option<NodeId> {
        self.nodes[id.index()]
            .children
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, c)| *c)
    }

    /// All children with the given role, in attach order
    pub fn children_with_role(&self, id: NodeId, role: ChildRole) -> Vec<NodeId> {
        self.nodes[id.index()]
            .children
            .iter()
            .filter(|(r, _)| *r == role)
            .map(|(_, c)| *c)
            .collect()
    }

    /// Attach `child` to `parent` under `role`. Both sides of the
    /// parent/child bookkeeping are updated together.
    ///
    /// Panics if the child already has a parent or if either node is
    /// frozen: reattaching a live node is an implementer bug, not a
    /// recoverable input problem.
    pub fn attach(&mut self, parent: NodeId, role: ChildRole, child: NodeId) {
        assert!(
            !self.nodes[parent.index()].frozen,
            "attach to frozen node {parent:?}"
        );
        assert!(
            self.nodes[child.index()].parent.is_none(),
            "node {child:?} is already attached"
        );
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[child.index()].role = role;
        self.nodes[parent.index()].children.push((role, child));
    }

    /// Replace `old` with `new` in `parent`'s child slots, preserving the
    /// slot position and role. The old child is detached; the new child
    /// adopts the old child's role. This is the primitive that ambiguity
    /// resolution uses to commit a winning alternative.
    pub fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) {
        assert!(
            !self.nodes[parent.index()].frozen,
            "replace_child on frozen node {parent:?}"
        );
        assert!(
            self.nodes[new.index()].parent.is_none(),
            "replacement node {new:?} is already attached"
        );
        let slot = self.nodes[parent.index()]
            .children
            .iter()
            .position(|(_, c)| *c == old)
            .unwrap_or_else(|| panic!("{old:?} is not a child of {parent:?}"));
        let role = self.nodes[parent.index()].children[slot].0;
        self.nodes[parent.index()].children[slot] = (role, new);
        self.nodes[old.index()].parent = None;
        self.nodes[old.index()].role = ChildRole::None;
        self.nodes[new.index()].parent = Some(parent);
        self.nodes[new.index()].role = role;
    }

    /// Detach `child` from its parent, removing its slot.
    pub fn detach(&mut self, child: NodeId) {
        let Some(parent) = self.nodes[child.index()].parent else {
            return;
        };
        assert!(
            !self.nodes[parent.index()].frozen,
            "detach from frozen node {parent:?}"
        );
        self.nodes[parent.index()]
            .children
            .retain(|(_, c)| *c != child);
        self.nodes[child.index()].parent = None;
        self.nodes[child.index()].role = ChildRole::None;
    }

    /// Freeze the subtree rooted at `id`. Frozen nodes reject any
    /// structural mutation; queries remain available.
    pub fn freeze(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            self.nodes[n.index()].frozen = true;
            for (_, c) in &self.nodes[n.index()].children {
                stack.push(*c);
            }
        }
    }

    /// Deep-copy the subtree rooted at `id`. The copy is an unfrozen,
    /// detached root.
    ///
    /// Panics when the subtree contains an ambiguous node: ambiguous
    /// nodes exist only between parsing and resolution and are never a
    /// legitimate copy source.
    pub fn copy_subtree(&mut self, id: NodeId, style: CopyStyle) -> NodeId {
        if let NodeKind::Ambiguous(kind) = &self.nodes[id.index()].kind {
            panic!("cannot copy unresolved ambiguous node ({kind:?})");
        }
        let kind = self.nodes[id.index()].kind.clone();
        let span = match style {
            CopyStyle::WithLocations => self.nodes[id.index()].span,
            CopyStyle::WithoutLocations => Span::synthetic(),
        };
        let copy = self.alloc(kind, span);
        let child_slots = self.nodes[id.index()].children.clone();
        for (role, child) in child_slots {
            let child_copy = self.copy_subtree(child, style);
            self.attach(copy, role, child_copy);
        }
        copy
    }

    /// Walk up the parent chain from `id`, yielding ancestors nearest
    /// first.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            arena: self,
            next: self.parent(id),
        }
    }

    /// True when `descendant` is inside the subtree rooted at `root`
    /// (a node counts as inside its own subtree).
    pub fn is_within(&self, root: NodeId, descendant: NodeId) -> bool {
        let mut cur = Some(descendant);
        while let Some(n) = cur {
            if n == root {
                return true;
            }
            cur = self.parent(n);
        }
        false
    }

    /// The candidate alternatives of an ambiguous node, in trial order.
    pub fn alternatives(&self, id: NodeId) -> Vec<NodeId> {
        debug_assert!(matches!(self.kind(id), NodeKind::Ambiguous(_)));
        self.children_with_role(id, ChildRole::Alternative)
    }

    /// All unresolved ambiguous nodes inside `root`, in depth-first
    /// pre-order. The order is deterministic, which resolution depends
    /// on for reproducible diagnostics.
    pub fn collect_ambiguities(&self, root: NodeId) -> Vec<(NodeId, AmbiguityKind)> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(n) = stack.pop() {
            if let NodeKind::Ambiguous(kind) = self.kind(n) {
                out.push((n, *kind));
            }
            // push in reverse so that pop order is source order
            for (_, c) in self.children(n).iter().rev() {
                stack.push(*c);
            }
        }
        out
    }
}

/// Iterator over a node's ancestors, nearest first
pub struct Ancestors<'a> {
    arena: &'a NodeArena,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let cur = self.next?;
        self.next = self.arena.parent(cur);
        Some(cur)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ExpressionKind, LiteralExpr};

    fn literal(arena: &mut NodeArena, value: i64) -> NodeId {
        arena.alloc(
            NodeKind::Expression(ExpressionKind::Literal(LiteralExpr::Integer {
                value,
                text: value.to_string(),
            })),
            Span::new(0, 1),
        )
    }

    #[test]
    fn attach_sets_both_sides() {
        let mut arena = NodeArena::new();
        let root = arena.alloc(NodeKind::TranslationUnit, Span::new(0, 10));
        let child = literal(&mut arena, 1);
        arena.attach(root, ChildRole::Member, child);

        assert_eq!(arena.parent(child), Some(root));
        assert_eq!(arena.role(child), ChildRole::Member);
        assert_eq!(arena.children(root), &[(ChildRole::Member, child)]);
    }

    #[test]
    fn replace_child_updates_both_sides_atomically() {
        let mut arena = NodeArena::new();
        let root = arena.alloc(NodeKind::TranslationUnit, Span::new(0, 10));
        let old = literal(&mut arena, 1);
        let new = literal(&mut arena, 2);
        arena.attach(root, ChildRole::Member, old);
        arena.replace_child(root, old, new);

        assert_eq!(arena.parent(old), None);
        assert_eq!(arena.role(old), ChildRole::None);
        assert_eq!(arena.parent(new), Some(root));
        assert_eq!(arena.role(new), ChildRole::Member);
        assert_eq!(arena.children(root), &[(ChildRole::Member, new)]);
    }

    #[test]
    #[should_panic(expected = "already attached")]
    fn double_attach_is_an_invariant_violation() {
        let mut arena = NodeArena::new();
        let a = arena.alloc(NodeKind::TranslationUnit, Span::new(0, 10));
        let b = arena.alloc(NodeKind::TranslationUnit, Span::new(0, 10));
        let child = literal(&mut arena, 1);
        arena.attach(a, ChildRole::Member, child);
        arena.attach(b, ChildRole::Member, child);
    }

    #[test]
    #[should_panic(expected = "frozen")]
    fn frozen_tree_rejects_mutation() {
        let mut arena = NodeArena::new();
        let root = arena.alloc(NodeKind::TranslationUnit, Span::new(0, 10));
        let child = literal(&mut arena, 1);
        arena.freeze(root);
        arena.attach(root, ChildRole::Member, child);
    }

    #[test]
    fn copy_without_locations_clears_spans() {
        let mut arena = NodeArena::new();
        let root = arena.alloc(NodeKind::TranslationUnit, Span::new(5, 25));
        let child = literal(&mut arena, 7);
        arena.attach(root, ChildRole::Member, child);

        let copy = arena.copy_subtree(root, CopyStyle::WithoutLocations);
        assert_eq!(arena.span(copy), Span::synthetic());
        assert_eq!(arena.children(copy).len(), 1);
        assert!(arena.parent(copy).is_none());
        assert!(!arena.node(copy).is_frozen());

        let copy_with = arena.copy_subtree(root, CopyStyle::WithLocations);
        assert_eq!(arena.span(copy_with), Span::new(5, 25));
    }

    #[test]
    #[should_panic(expected = "ambiguous")]
    fn copying_an_ambiguous_node_fails_fast() {
        let mut arena = NodeArena::new();
        let amb = arena.alloc(
            NodeKind::Ambiguous(AmbiguityKind::CastVsBinaryExpression),
            Span::new(0, 4),
        );
        arena.copy_subtree(amb, CopyStyle::WithLocations);
    }
}
