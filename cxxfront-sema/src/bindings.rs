//! The binding model
//!
//! A binding is the semantic entity a name resolves to. Bindings live in
//! an arena addressed by stable `BindingId`s; scopes hold ids in their
//! name tables, types refer to class/enum bindings by id, and nothing
//! ever holds a direct reference into the arena across mutations.
//!
//! Specializations are thin projections: any owner-dependent property
//! (visibility, staticness) delegates to the specialized binding; only
//! the substituted type/value is their own. Unknown bindings stand in
//! for names whose resolution depends on an uninstantiated template
//! parameter. Problem bindings stand in for names that cannot be
//! resolved at all; a lookup never yields "nothing" where a binding is
//! expected.

use crate::error::DiagnosticCode;
use crate::scope::ScopeId;
use crate::types::CxxType;
use cxxfront_ast::{ClassKey, NodeId, Visibility};
use indexmap::IndexMap;
use std::fmt;

/// Stable index of a binding within its arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(pub u32);

impl BindingId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// All bindings of this language carry C++ linkage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    Cxx,
}

/// A concrete template argument
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateArgument {
    Type(CxxType),
    NonType { value: i64, ty: CxxType },
    Pack(Vec<TemplateArgument>),
}

impl TemplateArgument {
    /// Structural equality, typedef-transparent through the type
    /// component.
    pub fn is_same_argument(&self, other: &TemplateArgument) -> bool {
        match (self, other) {
            (TemplateArgument::Type(t1), TemplateArgument::Type(t2)) => t1.is_same_type(t2),
            (
                TemplateArgument::NonType { value: v1, ty: t1 },
                TemplateArgument::NonType { value: v2, ty: t2 },
            ) => v1 == v2 && t1.is_same_type(t2),
            (TemplateArgument::Pack(p1), TemplateArgument::Pack(p2)) => {
                p1.len() == p2.len()
                    && p1.iter().zip(p2).all(|(a, b)| a.is_same_argument(b))
            }
            _ => false,
        }
    }

    /// Canonical textual encoding, the unit of the instance cache key.
    pub fn write_signature(&self, out: &mut String) {
        match self {
            TemplateArgument::Type(ty) => ty.write_signature(out),
            TemplateArgument::NonType { value, .. } => out.push_str(&value.to_string()),
            TemplateArgument::Pack(parts) => {
                out.push('{');
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    part.write_signature(out);
                }
                out.push('}');
            }
        }
    }
}

/// Canonical key for an argument list
pub fn argument_list_signature(args: &[TemplateArgument]) -> String {
    let mut out = String::new();
    out.push('<');
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        arg.write_signature(&mut out);
    }
    out.push('>');
    out
}

/// Template-parameter → argument map carried by specializations.
/// Iteration order is parameter position order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterMap {
    entries: IndexMap<BindingId, TemplateArgument>,
}

impl ParameterMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, parameter: BindingId, argument: TemplateArgument) {
        self.entries.insert(parameter, argument);
    }

    pub fn lookup(&self, parameter: BindingId) -> Option<&TemplateArgument> {
        self.entries.get(&parameter)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BindingId, &TemplateArgument)> {
        self.entries.iter()
    }

    /// Merge `other` into `self`; an entry already deduced must agree
    /// with the incoming one or the merge fails (conflicting deduction).
    pub fn merge(&mut self, other: &ParameterMap) -> bool {
        for (param, arg) in other.iter() {
            match self.entries.get(param) {
                Some(existing) if !existing.is_same_argument(arg) => return false,
                Some(_) => {}
                None => {
                    self.entries.insert(*param, arg.clone());
                }
            }
        }
        true
    }
}

/// What kind of template parameter a `TemplateParameter` binding is
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateParamKind {
    Type,
    NonType { ty: CxxType },
    Template,
}

/// Per-kind payload of a binding
#[derive(Debug, Clone, PartialEq)]
pub enum BindingKind {
    Variable {
        ty: CxxType,
        is_static: bool,
    },
    Field {
        ty: CxxType,
        is_static: bool,
    },
    Function {
        ty: CxxType,
    },
    Method {
        ty: CxxType,
        is_static: bool,
        is_virtual: bool,
    },
    Constructor {
        ty: CxxType,
    },
    Class {
        key: ClassKey,
        member_scope: Option<ScopeId>,
    },
    Enumeration {
        scoped: bool,
        member_scope: Option<ScopeId>,
    },
    Enumerator {
        value: Option<i64>,
    },
    Namespace {
        member_scope: Option<ScopeId>,
    },
    NamespaceAlias {
        target: BindingId,
    },
    Label,
    Typedef {
        ty: CxxType,
    },
    TemplateParameter {
        kind: TemplateParamKind,
        position: u32,
        is_pack: bool,
        default: Option<TemplateArgument>,
    },
    ClassTemplate {
        key: ClassKey,
        parameters: Vec<BindingId>,
        partial_specializations: Vec<BindingId>,
        member_scope: Option<ScopeId>,
    },
    FunctionTemplate {
        parameters: Vec<BindingId>,
        ty: CxxType,
    },
    VariableTemplate {
        parameters: Vec<BindingId>,
        ty: CxxType,
    },
    AliasTemplate {
        parameters: Vec<BindingId>,
        aliased: CxxType,
    },
    /// A partial specialization pattern of a class template
    PartialSpecialization {
        primary: BindingId,
        parameters: Vec<BindingId>,
        arguments: Vec<TemplateArgument>,
    },
    /// A member (or the template itself) projected into a specialization
    /// context; owner-dependent properties delegate to `specialized`
    Specialization {
        specialized: BindingId,
        map: ParameterMap,
        ty: Option<CxxType>,
    },
    /// A specialization for a fully concrete argument list
    Instance {
        specialized: BindingId,
        map: ParameterMap,
        arguments: Vec<TemplateArgument>,
        member_scope: Option<ScopeId>,
    },
    /// Member of a template-dependent owner; concretized at
    /// instantiation time
    UnknownMember {
        owner: CxxType,
    },
    /// Synthesized binding, reachable only by direct reference
    /// (`__func__` and friends); it opts out of declarations and
    /// definitions entirely
    Builtin {
        ty: CxxType,
    },
    Problem {
        code: DiagnosticCode,
        text: String,
    },
}

/// A named semantic entity
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub kind: BindingKind,
    /// Lexical scope this binding was declared in; `None` for
    /// synthesized bindings that are not reachable via lookup
    pub scope: Option<ScopeId>,
    /// Declarations in source-offset order; slot zero has the lowest
    /// offset, maintained by insertion discipline
    declarations: Vec<(usize, NodeId)>,
    pub definition: Option<NodeId>,
    pub visibility: Option<Visibility>,
}

impl Binding {
    pub fn linkage(&self) -> Linkage {
        Linkage::Cxx
    }

    pub fn is_problem(&self) -> bool {
        matches!(self.kind, BindingKind::Problem { .. })
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self.kind, BindingKind::Builtin { .. })
    }

    /// Declaration nodes, lowest source offset first.
    pub fn declarations(&self) -> Vec<NodeId> {
        self.declarations.iter().map(|(_, n)| *n).collect()
    }

    pub fn has_declarations(&self) -> bool {
        !self.declarations.is_empty()
    }
}

/// Arena of bindings for one translation unit
#[derive(Debug, Default)]
pub struct BindingArena {
    bindings: Vec<Binding>,
}

impl BindingArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn alloc(&mut self, name: impl Into<String>, kind: BindingKind) -> BindingId {
        let id = BindingId(self.bindings.len() as u32);
        self.bindings.push(Binding {
            name: name.into(),
            kind,
            scope: None,
            declarations: Vec::new(),
            definition: None,
            visibility: None,
        });
        id
    }

    /// Allocate the problem sentinel for an unresolvable name.
    pub fn problem(&mut self, code: DiagnosticCode, text: impl Into<String>) -> BindingId {
        let text = text.into();
        self.alloc(
            text.clone(),
            BindingKind::Problem { code, text },
        )
    }

    pub fn get(&self, id: BindingId) -> &Binding {
        &self.bindings[id.index()]
    }

    pub fn get_mut(&mut self, id: BindingId) -> &mut Binding {
        &mut self.bindings[id.index()]
    }

    pub fn name(&self, id: BindingId) -> &str {
        &self.bindings[id.index()].name
    }

    /// Attach a declaration node, keeping the list sorted by source
    /// offset regardless of attach order. Builtin bindings ignore the
    /// attach: they opt out of declarations by contract.
    pub fn add_declaration(&mut self, id: BindingId, node: NodeId, offset: usize) {
        let binding = &mut self.bindings[id.index()];
        if binding.is_builtin() {
            return;
        }
        let slot = binding
            .declarations
            .partition_point(|(existing, _)| *existing <= offset);
        binding.declarations.insert(slot, (offset, node));
    }

    pub fn set_definition(&mut self, id: BindingId, node: NodeId) {
        let binding = &mut self.bindings[id.index()];
        if binding.is_builtin() {
            return;
        }
        binding.definition = Some(node);
    }

    /// Visibility, delegating through specialization projections: a
    /// specialization recomputes owner-dependent properties from the
    /// binding it specializes.
    pub fn visibility_of(&self, id: BindingId) -> Option<Visibility> {
        match &self.bindings[id.index()].kind {
            BindingKind::Specialization { specialized, .. }
            | BindingKind::Instance { specialized, .. } => self.visibility_of(*specialized),
            _ => self.bindings[id.index()].visibility,
        }
    }

    /// Staticness, with the same delegation rule as `visibility_of`.
    pub fn is_static(&self, id: BindingId) -> bool {
        match &self.bindings[id.index()].kind {
            BindingKind::Variable { is_static, .. }
            | BindingKind::Field { is_static, .. }
            | BindingKind::Method { is_static, .. } => *is_static,
            BindingKind::Specialization { specialized, .. }
            | BindingKind::Instance { specialized, .. } => self.is_static(*specialized),
            _ => false,
        }
    }

    /// The declared type of a binding, where it has one. Specializations
    /// answer with their substituted type when present, otherwise with
    /// the original's.
    pub fn type_of(&self, id: BindingId) -> Option<CxxType> {
        match &self.bindings[id.index()].kind {
            BindingKind::Variable { ty, .. }
            | BindingKind::Field { ty, .. }
            | BindingKind::Function { ty }
            | BindingKind::Method { ty, .. }
            | BindingKind::Constructor { ty }
            | BindingKind::Typedef { ty }
            | BindingKind::Builtin { ty }
            | BindingKind::FunctionTemplate { ty, .. }
            | BindingKind::VariableTemplate { ty, .. } => Some(ty.clone()),
            BindingKind::Class { .. }
            | BindingKind::Enumeration { .. }
            | BindingKind::ClassTemplate { .. }
            | BindingKind::Instance { .. } => Some(CxxType::Named { binding: id }),
            BindingKind::TemplateParameter { kind, position, .. } => match kind {
                TemplateParamKind::Type | TemplateParamKind::Template => {
                    Some(CxxType::TemplateParam {
                        binding: id,
                        position: *position,
                    })
                }
                TemplateParamKind::NonType { ty } => Some(ty.clone()),
            },
            BindingKind::Enumerator { .. } => Some(CxxType::int()),
            BindingKind::Specialization {
                ty, specialized, ..
            } => match ty {
                Some(ty) => Some(ty.clone()),
                None => self.type_of(*specialized),
            },
            BindingKind::UnknownMember { owner } => Some(CxxType::Unknown {
                owner: Box::new(owner.clone()),
                name: self.bindings[id.index()].name.clone(),
            }),
            BindingKind::Problem { code, text } => Some(CxxType::Problem {
                code: *code,
                text: text.clone(),
            }),
            _ => None,
        }
    }

    /// Whether the binding names a type (usable in a decl-specifier).
    pub fn names_a_type(&self, id: BindingId) -> bool {
        matches!(
            self.bindings[id.index()].kind,
            BindingKind::Class { .. }
                | BindingKind::Enumeration { .. }
                | BindingKind::Typedef { .. }
                | BindingKind::ClassTemplate { .. }
                | BindingKind::AliasTemplate { .. }
                | BindingKind::Instance { .. }
                | BindingKind::TemplateParameter {
                    kind: TemplateParamKind::Type,
                    ..
                }
                | BindingKind::TemplateParameter {
                    kind: TemplateParamKind::Template,
                    ..
                }
        )
    }

    /// Equality for unknown (deferred) bindings: name and owner type
    /// must match. An unknown binding is never equal to a resolved one.
    pub fn unknowns_equal(&self, a: BindingId, b: BindingId) -> bool {
        if a == b {
            return true;
        }
        let (ba, bb) = (&self.bindings[a.index()], &self.bindings[b.index()]);
        match (&ba.kind, &bb.kind) {
            (
                BindingKind::UnknownMember { owner: o1 },
                BindingKind::UnknownMember { owner: o2 },
            ) => ba.name == bb.name && o1.is_same_type(o2),
            _ => false,
        }
    }

    /// The member scope a binding provides, when it provides one.
    pub fn member_scope(&self, id: BindingId) -> Option<ScopeId> {
        match &self.bindings[id.index()].kind {
            BindingKind::Class { member_scope, .. }
            | BindingKind::Enumeration { member_scope, .. }
            | BindingKind::Namespace { member_scope }
            | BindingKind::ClassTemplate { member_scope, .. }
            | BindingKind::Instance { member_scope, .. } => *member_scope,
            BindingKind::NamespaceAlias { target } => self.member_scope(*target),
            _ => None,
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
