//! Per-translation-unit analysis state
//!
//! Everything mutable (node arena, binding arena, scope arena, the
//! template instance cache, the instantiation graph, collected
//! diagnostics) is owned by one `AnalysisContext` and passed by
//! reference through every entry point. Analyzing translation units in
//! parallel means one independent context per unit; nothing here is
//! shared or synchronized.

use crate::bindings::{BindingArena, BindingId, BindingKind};
use crate::error::SemanticError;
use crate::instantiation_graph::InstantiationGraph;
use crate::scope::{ScopeArena, ScopeId, ScopeKind};
use crate::templates::InstanceCache;
use crate::types::CxxType;
use cxxfront_ast::{NodeArena, NodeId};
use indexmap::IndexMap;

/// A name lookup waiting for a forward-referenced declaration
#[derive(Debug, Clone)]
pub struct PendingLookup {
    pub name: String,
    pub scope: ScopeId,
    /// The referencing name node; resolution is recorded against it
    pub node: NodeId,
    pub offset: usize,
}

/// Analysis state for one translation unit
pub struct AnalysisContext {
    pub arena: NodeArena,
    pub bindings: BindingArena,
    pub scopes: ScopeArena,
    pub instances: InstanceCache,
    pub graph: InstantiationGraph,
    pub diagnostics: Vec<SemanticError>,
    /// Name-node → resolved binding memo
    pub resolutions: IndexMap<NodeId, BindingId>,
    /// AST node → the scope it introduces
    pub node_scopes: IndexMap<NodeId, ScopeId>,
    /// Member scope → the binding it belongs to
    pub scope_owners: IndexMap<ScopeId, BindingId>,
    /// Lookups still waiting on a forward reference, in source order
    pub pending: Vec<PendingLookup>,
    /// Active ledger of speculative declarations, recorded while an
    /// ambiguity alternative is on trial so they can be retracted
    speculative: Option<Vec<SpeculativeDecl>>,
    /// Non-zero while a scope cache is being filled; cache fills are
    /// never speculative even when they happen during a trial
    populating_depth: usize,
    global_scope: ScopeId,
    root: NodeId,
}

/// One scope-table entry introduced while trialing an ambiguity
/// alternative
#[derive(Debug, Clone)]
pub struct SpeculativeDecl {
    pub scope: ScopeId,
    pub name: String,
    pub binding: BindingId,
}

impl AnalysisContext {
    /// Take ownership of a parsed tree. The root must be a translation
    /// unit whose children are already attached (the parser's side of
    /// the boundary contract).
    pub fn new(arena: NodeArena, root: NodeId) -> Self {
        let mut scopes = ScopeArena::new();
        let global_scope = scopes.alloc(ScopeKind::Global, None, Some(root));
        let mut node_scopes = IndexMap::new();
        node_scopes.insert(root, global_scope);
        Self {
            arena,
            bindings: BindingArena::new(),
            scopes,
            instances: InstanceCache::new(),
            graph: InstantiationGraph::new(),
            diagnostics: Vec::new(),
            resolutions: IndexMap::new(),
            node_scopes,
            scope_owners: IndexMap::new(),
            pending: Vec::new(),
            speculative: None,
            populating_depth: 0,
            global_scope,
            root,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn global_scope(&self) -> ScopeId {
        self.global_scope
    }

    /// The scope introduced by `node`, creating it on first request.
    pub fn scope_for(&mut self, node: NodeId, kind: ScopeKind, parent: ScopeId) -> ScopeId {
        if let Some(existing) = self.node_scopes.get(&node) {
            return *existing;
        }
        let scope = self.scopes.alloc(kind, Some(parent), Some(node));
        self.node_scopes.insert(node, scope);
        scope
    }

    /// The immediately enclosing named entity of a binding: the first
    /// scope up the chain that belongs to a class, namespace or
    /// enumeration binding.
    pub fn owner_of(&self, binding: BindingId) -> Option<BindingId> {
        let mut scope = self.bindings.get(binding).scope;
        while let Some(s) = scope {
            if let Some(owner) = self.scope_owner_binding(s) {
                if owner != binding {
                    return Some(owner);
                }
            }
            scope = self.scopes.parent(s);
        }
        None
    }

    /// The binding whose member scope `scope` is, if any.
    pub fn scope_owner_binding(&self, scope: ScopeId) -> Option<BindingId> {
        self.scope_owners.get(&scope).copied()
    }

    /// Record that `scope` is the member scope of `owner`. Called when a
    /// class/namespace/enumeration binding gets its scope assigned.
    pub fn set_scope_owner(&mut self, scope: ScopeId, owner: BindingId) {
        self.scope_owners.insert(scope, owner);
    }

    /// The lexical lookup scope of a binding. Unknown bindings compute
    /// it from their owner's scope-producing capability, recursively:
    /// the owner type's binding provides the scope when it has one,
    /// otherwise an unknown scope is synthesized.
    pub fn lookup_scope_of(&mut self, binding: BindingId) -> Option<ScopeId> {
        match &self.bindings.get(binding).kind {
            BindingKind::UnknownMember { owner } => {
                let owner = owner.clone();
                match owner {
                    CxxType::Named { binding: owner_binding } => {
                        self.bindings.member_scope(owner_binding)
                    }
                    CxxType::TemplateParam { binding: param, .. } => {
                        // a template parameter provides a deferred scope
                        let node = self.bindings.get(param).declarations().first().copied();
                        match node {
                            Some(n) => {
                                if let Some(existing) = self.node_scopes.get(&n) {
                                    return Some(*existing);
                                }
                                let scope = self.scopes.alloc(ScopeKind::Unknown, None, Some(n));
                                self.node_scopes.insert(n, scope);
                                Some(scope)
                            }
                            None => Some(self.scopes.alloc(ScopeKind::Unknown, None, None)),
                        }
                    }
                    CxxType::Unknown { .. } => {
                        Some(self.scopes.alloc(ScopeKind::Unknown, None, None))
                    }
                    _ => None,
                }
            }
            _ => self.bindings.get(binding).scope,
        }
    }

    /// Display name of a scope. Blocks have no name of their own: they
    /// answer with the name of the enclosing function's declarator.
    pub fn scope_display_name(&self, scope: ScopeId) -> String {
        match self.scopes.kind(scope) {
            ScopeKind::Global => "<global>".to_string(),
            ScopeKind::Block => {
                let mut cur = Some(scope);
                while let Some(s) = cur {
                    if let Some(node) = self.scopes.owner_node(s) {
                        if let Some(name) = self.enclosing_function_name(node) {
                            return name;
                        }
                    }
                    cur = self.scopes.parent(s);
                }
                "<block>".to_string()
            }
            _ => {
                if let Some(owner) = self.scopes.owner_node(scope) {
                    if let Some(name) = self
                        .arena
                        .child(owner, cxxfront_ast::ChildRole::Name)
                        .and_then(|n| self.arena.name_text(n))
                    {
                        return name;
                    }
                }
                "<anonymous>".to_string()
            }
        }
    }

    fn enclosing_function_name(&self, node: NodeId) -> Option<String> {
        use cxxfront_ast::{ChildRole, DeclarationKind, NodeKind};
        let mut cur = Some(node);
        while let Some(n) = cur {
            if matches!(
                self.arena.kind(n),
                NodeKind::Declaration(DeclarationKind::FunctionDefinition)
            ) {
                let declarator = self.arena.child(n, ChildRole::Declarator)?;
                let name = self.arena.child(declarator, ChildRole::Name)?;
                return self.arena.name_text(name);
            }
            cur = self.arena.parent(n);
        }
        None
    }

    pub fn report(&mut self, diagnostic: SemanticError) {
        // failures inside a speculative ambiguity trial are scoring
        // signals, not user-facing diagnostics
        if self.speculative.is_some() {
            return;
        }
        self.diagnostics.push(diagnostic);
    }

    /// Start recording scope-table insertions. Used by ambiguity
    /// resolution around each alternative trial.
    pub fn begin_speculation(&mut self) {
        self.speculative = Some(Vec::new());
    }

    /// Stop recording and hand back everything inserted since
    /// `begin_speculation`.
    pub fn take_speculation(&mut self) -> Vec<SpeculativeDecl> {
        self.speculative.take().unwrap_or_default()
    }

    pub fn record_speculative(&mut self, scope: ScopeId, name: &str, binding: BindingId) {
        if self.populating_depth > 0 {
            return;
        }
        if let Some(ledger) = &mut self.speculative {
            ledger.push(SpeculativeDecl {
                scope,
                name: name.to_string(),
                binding,
            });
        }
    }

    /// Bracket a scope-cache fill; insertions made inside the bracket
    /// are cache state, not speculation.
    pub fn enter_population(&mut self) {
        self.populating_depth += 1;
    }

    pub fn leave_population(&mut self) {
        self.populating_depth -= 1;
    }
}
