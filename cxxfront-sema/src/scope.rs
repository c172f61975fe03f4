//! The lexical scope model
//!
//! Scopes form a parent chain and each carries an insertion-ordered
//! name table. Tables are populated lazily: the first lookup in an
//! ordinary scope walks the owning AST subtree once and caches every
//! declaration it finds. Unknown scopes (tied to template parameters)
//! are deliberately never populated from source; the resolver
//! synthesizes deferred bindings for them on demand.
//!
//! Population can recurse into the scope being populated (resolving a
//! default argument that refers to a sibling declaration); the
//! `populating` guard detects this and lets the lookup proceed against
//! the partial table instead of looping.

use crate::bindings::BindingId;
use cxxfront_ast::NodeId;
use indexmap::IndexMap;

/// Stable index of a scope within its arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

impl ScopeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Block,
    Namespace,
    Class,
    Template,
    Enumeration,
    /// Scope of a template-dependent entity; never populated from source
    Unknown,
}

/// One lexical scope
#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    /// The AST node that introduces this scope; weak by index, the
    /// scope does not own the tree
    pub owner_node: Option<NodeId>,
    names: IndexMap<String, Vec<BindingId>>,
    populated: bool,
    populating: bool,
}

impl Scope {
    pub fn is_populated(&self) -> bool {
        self.populated
    }

    pub fn is_populating(&self) -> bool {
        self.populating
    }
}

/// Arena of scopes for one translation unit
#[derive(Debug, Default)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn alloc(
        &mut self,
        kind: ScopeKind,
        parent: Option<ScopeId>,
        owner_node: Option<NodeId>,
    ) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            kind,
            parent,
            owner_node,
            names: IndexMap::new(),
            populated: kind == ScopeKind::Unknown,
            populating: false,
        });
        id
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn kind(&self, id: ScopeId) -> ScopeKind {
        self.scopes[id.index()].kind
    }

    pub fn parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.scopes[id.index()].parent
    }

    /// The parent used for ordinary name visibility. Template scopes are
    /// a lookup detour, not a real nesting level: their effective parent
    /// is the nearest non-template enclosing scope.
    pub fn effective_parent(&self, id: ScopeId) -> Option<ScopeId> {
        let mut parent = self.scopes[id.index()].parent;
        while let Some(p) = parent {
            if self.scopes[p.index()].kind != ScopeKind::Template {
                return Some(p);
            }
            parent = self.scopes[p.index()].parent;
        }
        None
    }

    pub fn owner_node(&self, id: ScopeId) -> Option<NodeId> {
        self.scopes[id.index()].owner_node
    }

    pub fn mark_populated(&mut self, id: ScopeId) {
        let scope = &mut self.scopes[id.index()];
        scope.populated = true;
        scope.populating = false;
    }

    /// Begin population; returns false when population is already in
    /// progress (reentrant lookup), in which case the caller must use
    /// the partial table rather than recurse.
    pub fn begin_population(&mut self, id: ScopeId) -> bool {
        let scope = &mut self.scopes[id.index()];
        if scope.populating {
            return false;
        }
        scope.populating = true;
        true
    }

    /// Drop the cached table so the next lookup repopulates.
    pub fn invalidate(&mut self, id: ScopeId) {
        let scope = &mut self.scopes[id.index()];
        if scope.kind == ScopeKind::Unknown {
            return;
        }
        scope.names.clear();
        scope.populated = false;
        scope.populating = false;
    }

    pub fn insert(&mut self, id: ScopeId, name: impl Into<String>, binding: BindingId) {
        self.scopes[id.index()]
            .names
            .entry(name.into())
            .or_default()
            .push(binding);
    }

    /// Remove one binding from a scope's table; used by targeted
    /// invalidation when an ambiguity discards the subtree that
    /// introduced it.
    pub fn remove(&mut self, id: ScopeId, name: &str, binding: BindingId) {
        let scope = &mut self.scopes[id.index()];
        if let Some(list) = scope.names.get_mut(name) {
            list.retain(|b| *b != binding);
            if list.is_empty() {
                scope.names.shift_remove(name);
            }
        }
    }

    /// Candidates for `name` in this scope level only, in insertion
    /// order. Assumes the scope is populated; the resolver enforces
    /// that.
    pub fn lookup_local(&self, id: ScopeId, name: &str) -> &[BindingId] {
        self.scopes[id.index()]
            .names
            .get(name)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// All bindings in this scope level, in insertion order.
    pub fn local_bindings(&self, id: ScopeId) -> Vec<BindingId> {
        self.scopes[id.index()]
            .names
            .values()
            .flatten()
            .copied()
            .collect()
    }

    /// All names in this scope level, in insertion order.
    pub fn local_names(&self, id: ScopeId) -> Vec<String> {
        self.scopes[id.index()].names.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_preserves_insertion_order() {
        let mut scopes = ScopeArena::new();
        let global = scopes.alloc(ScopeKind::Global, None, None);
        scopes.insert(global, "f", BindingId(3));
        scopes.insert(global, "f", BindingId(1));
        scopes.insert(global, "f", BindingId(2));
        assert_eq!(
            scopes.lookup_local(global, "f"),
            &[BindingId(3), BindingId(1), BindingId(2)]
        );
    }

    #[test]
    fn effective_parent_skips_template_scopes() {
        let mut scopes = ScopeArena::new();
        let global = scopes.alloc(ScopeKind::Global, None, None);
        let template = scopes.alloc(ScopeKind::Template, Some(global), None);
        let inner_template = scopes.alloc(ScopeKind::Template, Some(template), None);
        let class = scopes.alloc(ScopeKind::Class, Some(inner_template), None);
        assert_eq!(scopes.effective_parent(class), Some(global));
    }

    #[test]
    fn remove_drops_only_the_named_binding() {
        let mut scopes = ScopeArena::new();
        let global = scopes.alloc(ScopeKind::Global, None, None);
        scopes.insert(global, "x", BindingId(1));
        scopes.insert(global, "x", BindingId(2));
        scopes.insert(global, "y", BindingId(3));
        scopes.remove(global, "x", BindingId(1));
        assert_eq!(scopes.lookup_local(global, "x"), &[BindingId(2)]);
        assert_eq!(scopes.lookup_local(global, "y"), &[BindingId(3)]);
    }

    #[test]
    fn population_guard_detects_reentry() {
        let mut scopes = ScopeArena::new();
        let global = scopes.alloc(ScopeKind::Global, None, None);
        assert!(scopes.begin_population(global));
        // a recursive lookup during population must not start over
        assert!(!scopes.begin_population(global));
        scopes.mark_populated(global);
        assert!(scopes.get(global).is_populated());
    }

    #[test]
    fn unknown_scopes_are_born_populated() {
        let mut scopes = ScopeArena::new();
        let unknown = scopes.alloc(ScopeKind::Unknown, None, None);
        assert!(scopes.get(unknown).is_populated());
        // invalidation is a no-op for them
        scopes.invalidate(unknown);
        assert!(scopes.get(unknown).is_populated());
    }
}
