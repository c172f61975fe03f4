//! Declaration analysis and name resolution
//!
//! The analysis runs in phases over one translation unit:
//!
//! 1. scope building: every scope-introducing node gets its scope
//!    object (tables stay empty);
//! 2. ambiguity resolution, see the `ambiguity` module;
//! 3. reference resolution: id-expressions and type names resolve to
//!    bindings, with failures recorded as pending lookups first;
//! 4. pending upgrade: the worklist re-resolves forward references in
//!    source order; what still fails becomes a problem binding.
//!
//! Scope name tables populate lazily on first lookup. A name that
//! cannot be resolved never comes back as "nothing": the caller gets a
//! problem binding carrying a diagnostic code and the offending text.

use crate::bindings::{BindingId, BindingKind, TemplateArgument, TemplateParamKind};
use crate::context::{AnalysisContext, PendingLookup};
use crate::error::{to_source_span, DiagnosticCode, SemanticError};
use crate::templates::{instantiate_class_template, instance_function_type, specialize_member};
use crate::types::{BasicKind, BasicModifiers, CxxType, ValueCategory};
use crate::{deduction, scope::ScopeId, scope::ScopeKind};
use cxxfront_ast::{
    BinaryOperator, ChildRole, ClassKey, CvQualifiers, DeclSpecifier, DeclSpecifierKind,
    DeclarationKind, DeclaratorInfo, DeclaratorKind, ExpressionKind, LiteralExpr, NameKind,
    NodeId, NodeKind, PointerOperator, SimpleTypeKeyword, StatementKind, StorageClass,
    TemplateParameterDecl, TemplateParameterDeclKind, TypeModifiers, UnaryOperator, Visibility,
};

/// A two-phase lookup result: either a final binding or an entry in the
/// pending worklist that a later pass upgrades.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Resolved(BindingId),
    Pending(usize),
}

/// Run the full semantic analysis over the context's tree.
pub fn analyze(ctx: &mut AnalysisContext) {
    build_scopes(ctx);
    crate::ambiguity::resolve_ambiguities(ctx);
    ensure_populated(ctx, ctx.global_scope());
    resolve_references(ctx, ctx.root(), true);
    upgrade_pending(ctx);
}

// ---------------------------------------------------------------------
// scope building
// ---------------------------------------------------------------------

/// Create scope objects for every scope-introducing node. Name tables
/// remain unpopulated; population happens on first lookup.
pub fn build_scopes(ctx: &mut AnalysisContext) {
    let root = ctx.root();
    let global = ctx.global_scope();
    build_scopes_rec(ctx, root, global);
}

fn build_scopes_rec(ctx: &mut AnalysisContext, node: NodeId, current: ScopeId) {
    let introduced_kind = match ctx.arena.kind(node) {
        NodeKind::Declaration(DeclarationKind::Namespace) => Some(ScopeKind::Namespace),
        NodeKind::Declaration(DeclarationKind::TemplateDeclaration) => Some(ScopeKind::Template),
        NodeKind::DeclSpecifier(spec) => match spec.kind {
            DeclSpecifierKind::Class { .. } => Some(ScopeKind::Class),
            DeclSpecifierKind::Enum { .. } => Some(ScopeKind::Enumeration),
            _ => None,
        },
        NodeKind::Statement(StatementKind::Compound) => Some(ScopeKind::Block),
        _ => None,
    };
    let next = match introduced_kind {
        Some(kind) => ctx.scope_for(node, kind, current),
        None => current,
    };
    let children: Vec<NodeId> = ctx.arena.children(node).iter().map(|(_, c)| *c).collect();
    for child in children {
        build_scopes_rec(ctx, child, next);
    }
}

/// The scope in effect at `node`: the scope introduced by the nearest
/// enclosing scope-introducing node (or the node itself).
pub fn enclosing_scope(ctx: &AnalysisContext, node: NodeId) -> ScopeId {
    let mut cur = Some(node);
    while let Some(n) = cur {
        if let Some(scope) = ctx.node_scopes.get(&n) {
            return *scope;
        }
        cur = ctx.arena.parent(n);
    }
    ctx.global_scope()
}

/// The nearest enclosing scope that is not a template scope; ambiguity
/// resolution fixes this scope's visible set before trials.
pub fn enclosing_non_template_scope(ctx: &AnalysisContext, node: NodeId) -> ScopeId {
    let mut scope = enclosing_scope(ctx, node);
    while ctx.scopes.kind(scope) == ScopeKind::Template {
        match ctx.scopes.parent(scope) {
            Some(parent) => scope = parent,
            None => break,
        }
    }
    scope
}

// ---------------------------------------------------------------------
// population
// ---------------------------------------------------------------------

/// Populate a scope's name table from its owning subtree, once. A
/// reentrant call during population short-circuits to the partial
/// table instead of recursing.
pub fn ensure_populated(ctx: &mut AnalysisContext, scope: ScopeId) {
    if ctx.scopes.get(scope).is_populated() {
        return;
    }
    if !ctx.scopes.begin_population(scope) {
        // population of this very scope triggered a lookup into it;
        // answer from what is already there
        return;
    }
    ctx.enter_population();
    populate_scope(ctx, scope);
    ctx.leave_population();
    ctx.scopes.mark_populated(scope);
}

fn populate_scope(ctx: &mut AnalysisContext, scope: ScopeId) {
    let Some(owner) = ctx.scopes.owner_node(scope) else {
        return;
    };
    match ctx.scopes.kind(scope) {
        ScopeKind::Global | ScopeKind::Namespace => {
            let members = ctx.arena.children_with_role(owner, ChildRole::Member);
            for member in members {
                collect_declaration(ctx, scope, member, None);
            }
        }
        ScopeKind::Class => {
            let key = match ctx.arena.kind(owner) {
                NodeKind::DeclSpecifier(DeclSpecifier {
                    kind: DeclSpecifierKind::Class { key },
                    ..
                }) => *key,
                _ => ClassKey::Class,
            };
            let mut visibility = match key {
                ClassKey::Class => Visibility::Private,
                ClassKey::Struct | ClassKey::Union => Visibility::Public,
            };
            let members = ctx.arena.children_with_role(owner, ChildRole::Member);
            for member in members {
                if let NodeKind::Declaration(DeclarationKind::VisibilityLabel { visibility: v }) =
                    ctx.arena.kind(member)
                {
                    visibility = *v;
                    continue;
                }
                collect_declaration(ctx, scope, member, Some(visibility));
            }
        }
        ScopeKind::Enumeration => {
            collect_enumerators(ctx, scope, owner, None);
        }
        ScopeKind::Block => {
            // parameters of the enclosing function land in its body's
            // block scope
            if let Some(parent) = ctx.arena.parent(owner) {
                if matches!(
                    ctx.arena.kind(parent),
                    NodeKind::Declaration(DeclarationKind::FunctionDefinition)
                ) {
                    if let Some(declarator) = ctx.arena.child(parent, ChildRole::Declarator) {
                        collect_parameters(ctx, scope, declarator);
                    }
                }
            }
            let statements = ctx.arena.children_with_role(owner, ChildRole::Statement);
            for statement in statements {
                if let NodeKind::Statement(StatementKind::Declaration) = ctx.arena.kind(statement) {
                    if let Some(inner) = ctx.arena.child(statement, ChildRole::InnerDeclaration) {
                        collect_declaration(ctx, scope, inner, None);
                    }
                }
            }
        }
        // template scopes are populated eagerly when the template
        // declaration is collected; unknown scopes never populate
        ScopeKind::Template | ScopeKind::Unknown => {}
    }
}

/// Insert a binding into a scope's table, routing through the
/// speculative ledger when one is active.
pub fn declare(ctx: &mut AnalysisContext, scope: ScopeId, name: &str, binding: BindingId) {
    ctx.scopes.insert(scope, name, binding);
    ctx.record_speculative(scope, name, binding);
    if ctx.bindings.get(binding).scope.is_none() {
        ctx.bindings.get_mut(binding).scope = Some(scope);
    }
}

/// Collect the bindings a declaration introduces into `scope`. Returns
/// the bindings created or extended, which the ambiguity machinery uses
/// as its retraction ledger.
pub fn collect_declaration(
    ctx: &mut AnalysisContext,
    scope: ScopeId,
    node: NodeId,
    visibility: Option<Visibility>,
) -> Vec<BindingId> {
    match ctx.arena.kind(node).clone() {
        NodeKind::Declaration(DeclarationKind::Simple) => {
            collect_simple_declaration(ctx, scope, node, visibility, false)
        }
        NodeKind::Declaration(DeclarationKind::FunctionDefinition) => {
            collect_simple_declaration(ctx, scope, node, visibility, true)
        }
        NodeKind::Declaration(DeclarationKind::Namespace) => {
            collect_namespace(ctx, scope, node)
        }
        NodeKind::Declaration(DeclarationKind::TemplateDeclaration)
        | NodeKind::Declaration(DeclarationKind::ExplicitSpecialization) => {
            collect_template_declaration(ctx, scope, node)
        }
        NodeKind::Declaration(DeclarationKind::UsingDeclaration) => {
            let Some(name_node) = ctx.arena.child(node, ChildRole::Name) else {
                return Vec::new();
            };
            let target = resolve_name_node(ctx, name_node, false);
            if ctx.bindings.get(target).is_problem() {
                return Vec::new();
            }
            let name = ctx.arena.name_text(name_node).unwrap_or_default();
            declare(ctx, scope, &name, target);
            vec![target]
        }
        NodeKind::Declaration(DeclarationKind::NamespaceAlias) => {
            let Some(name_node) = ctx.arena.child(node, ChildRole::Name) else {
                return Vec::new();
            };
            let Some(target_node) = ctx.arena.child(node, ChildRole::Target) else {
                return Vec::new();
            };
            let target = resolve_name_node(ctx, target_node, false);
            let name = ctx.arena.name_text(name_node).unwrap_or_default();
            let alias = ctx
                .bindings
                .alloc(name.clone(), BindingKind::NamespaceAlias { target });
            let offset = ctx.arena.span(node).start;
            ctx.bindings.add_declaration(alias, node, offset);
            declare(ctx, scope, &name, alias);
            vec![alias]
        }
        NodeKind::Declaration(DeclarationKind::LinkageSpec { .. }) => {
            let members = ctx.arena.children_with_role(node, ChildRole::Member);
            let mut introduced = Vec::new();
            for member in members {
                introduced.extend(collect_declaration(ctx, scope, member, visibility));
            }
            introduced
        }
        NodeKind::Statement(StatementKind::Declaration) => {
            match ctx.arena.child(node, ChildRole::InnerDeclaration) {
                Some(inner) => collect_declaration(ctx, scope, inner, visibility),
                None => Vec::new(),
            }
        }
        // unresolved ambiguities are not collected; resolution re-runs
        // collection on the winner
        NodeKind::Ambiguous(_) => Vec::new(),
        _ => Vec::new(),
    }
}

fn collect_simple_declaration(
    ctx: &mut AnalysisContext,
    scope: ScopeId,
    node: NodeId,
    visibility: Option<Visibility>,
    is_definition: bool,
) -> Vec<BindingId> {
    let mut introduced = Vec::new();
    let Some(spec_node) = ctx.arena.child(node, ChildRole::DeclSpecifier) else {
        return introduced;
    };
    let (base, mut type_bindings) = type_from_decl_specifier(ctx, scope, spec_node);
    introduced.append(&mut type_bindings);

    let spec = match ctx.arena.kind(spec_node) {
        NodeKind::DeclSpecifier(s) => s.clone(),
        _ => return introduced,
    };

    let declarators = ctx.arena.children_with_role(node, ChildRole::Declarator);
    for declarator in declarators {
        let Some((ty, Some(name_node))) = apply_declarator(ctx, scope, base.clone(), declarator)
        else {
            continue;
        };
        let Some(name) = ctx.arena.name_text(name_node) else {
            continue;
        };
        let offset = ctx.arena.span(declarator).start;
        let in_class = ctx.scopes.kind(scope) == ScopeKind::Class;
        let is_function = matches!(ty, CxxType::Function { .. });
        let is_static = spec.storage == StorageClass::Static;

        // redeclaration discipline: a matching prior binding in this
        // scope gains another declaration instead of a new binding
        let existing = ctx.scopes.lookup_local(scope, &name).to_vec();
        let mut redeclared = None;
        for candidate in existing {
            let candidate_ty = ctx.bindings.type_of(candidate);
            let compatible = match (&ctx.bindings.get(candidate).kind, is_function) {
                (BindingKind::Function { .. } | BindingKind::Method { .. }, true) => candidate_ty
                    .map(|t| t.is_same_type(&ty))
                    .unwrap_or(false),
                (BindingKind::Variable { .. } | BindingKind::Field { .. }, false) => true,
                (BindingKind::Typedef { .. }, false) if spec.is_typedef => true,
                _ => false,
            };
            if compatible {
                redeclared = Some(candidate);
                break;
            }
        }
        if let Some(binding) = redeclared {
            ctx.bindings.add_declaration(binding, declarator, offset);
            if is_definition {
                ctx.bindings.set_definition(binding, node);
            }
            introduced.push(binding);
            continue;
        }

        let kind = if spec.is_typedef {
            BindingKind::Typedef {
                ty: CxxType::Alias {
                    name: name.clone(),
                    aliased: Box::new(ty.clone()),
                },
            }
        } else if is_function && name == ctx.scope_display_name(scope) && in_class {
            BindingKind::Constructor { ty: ty.clone() }
        } else if is_function && in_class {
            BindingKind::Method {
                ty: ty.clone(),
                is_static,
                is_virtual: spec.is_virtual,
            }
        } else if is_function {
            BindingKind::Function { ty: ty.clone() }
        } else if in_class {
            BindingKind::Field {
                ty: ty.clone(),
                is_static,
            }
        } else {
            BindingKind::Variable {
                ty: ty.clone(),
                is_static,
            }
        };
        let binding = ctx.bindings.alloc(name.clone(), kind);
        ctx.bindings.get_mut(binding).visibility = visibility;
        ctx.bindings.add_declaration(binding, declarator, offset);
        if is_definition {
            ctx.bindings.set_definition(binding, node);
        }
        declare(ctx, scope, &name, binding);
        ctx.resolutions.insert(name_node, binding);
        introduced.push(binding);
    }
    introduced
}

fn collect_namespace(ctx: &mut AnalysisContext, scope: ScopeId, node: NodeId) -> Vec<BindingId> {
    let Some(name_node) = ctx.arena.child(node, ChildRole::Name) else {
        return Vec::new();
    };
    let Some(name) = ctx.arena.name_text(name_node) else {
        return Vec::new();
    };
    let offset = ctx.arena.span(node).start;
    // namespaces with the same name reopen the same binding
    let existing = ctx
        .scopes
        .lookup_local(scope, &name)
        .iter()
        .copied()
        .find(|b| matches!(ctx.bindings.get(*b).kind, BindingKind::Namespace { .. }));
    if let Some(binding) = existing {
        ctx.bindings.add_declaration(binding, node, offset);
        return vec![binding];
    }
    let member_scope = ctx.node_scopes.get(&node).copied();
    let binding = ctx
        .bindings
        .alloc(name.clone(), BindingKind::Namespace { member_scope });
    ctx.bindings.add_declaration(binding, node, offset);
    declare(ctx, scope, &name, binding);
    if let Some(ms) = member_scope {
        ctx.set_scope_owner(ms, binding);
    }
    vec![binding]
}

fn collect_enumerators(
    ctx: &mut AnalysisContext,
    enum_scope: ScopeId,
    enum_node: NodeId,
    inject_into: Option<ScopeId>,
) -> Vec<BindingId> {
    let mut introduced = Vec::new();
    let enumerators = ctx
        .arena
        .children_with_role(enum_node, ChildRole::Enumerator);
    let mut next_value: i64 = 0;
    for enumerator in enumerators {
        // an enumerator is a declarator with a name and an optional
        // initializer expression
        let Some(name_node) = ctx.arena.child(enumerator, ChildRole::Name) else {
            continue;
        };
        let Some(name) = ctx.arena.name_text(name_node) else {
            continue;
        };
        let value = match ctx.arena.child(enumerator, ChildRole::Initializer) {
            Some(init) => evaluate_constant(ctx, init).unwrap_or(next_value),
            None => next_value,
        };
        next_value = value + 1;
        let binding = ctx
            .bindings
            .alloc(name.clone(), BindingKind::Enumerator { value: Some(value) });
        let offset = ctx.arena.span(enumerator).start;
        ctx.bindings.add_declaration(binding, enumerator, offset);
        declare(ctx, enum_scope, &name, binding);
        if let Some(outer) = inject_into {
            declare(ctx, outer, &name, binding);
        }
        introduced.push(binding);
    }
    introduced
}

fn collect_parameters(ctx: &mut AnalysisContext, scope: ScopeId, declarator: NodeId) {
    let parameters = ctx
        .arena
        .children_with_role(declarator, ChildRole::Parameter);
    for parameter in parameters {
        let Some(spec_node) = ctx.arena.child(parameter, ChildRole::DeclSpecifier) else {
            continue;
        };
        let (base, _) = type_from_decl_specifier(ctx, scope, spec_node);
        let Some(param_declarator) = ctx.arena.child(parameter, ChildRole::Declarator) else {
            continue;
        };
        let Some((ty, Some(name_node))) = apply_declarator(ctx, scope, base, param_declarator)
        else {
            continue;
        };
        let Some(name) = ctx.arena.name_text(name_node) else {
            continue;
        };
        let binding = ctx.bindings.alloc(
            name.clone(),
            BindingKind::Variable {
                ty,
                is_static: false,
            },
        );
        let offset = ctx.arena.span(parameter).start;
        ctx.bindings.add_declaration(binding, parameter, offset);
        declare(ctx, scope, &name, binding);
        ctx.resolutions.insert(name_node, binding);
    }
}

fn collect_template_declaration(
    ctx: &mut AnalysisContext,
    scope: ScopeId,
    node: NodeId,
) -> Vec<BindingId> {
    let template_scope = ctx.scope_for(node, ScopeKind::Template, scope);
    let param_nodes = ctx
        .arena
        .children_with_role(node, ChildRole::TemplateParameter);
    let mut parameters = Vec::with_capacity(param_nodes.len());
    for (position, param_node) in param_nodes.iter().enumerate() {
        let decl = match ctx.arena.kind(*param_node) {
            NodeKind::TemplateParameterDecl(d) => d.clone(),
            _ => continue,
        };
        let Some(name_node) = ctx.arena.child(*param_node, ChildRole::Name) else {
            continue;
        };
        let Some(name) = ctx.arena.name_text(name_node) else {
            continue;
        };
        let kind = template_param_kind(ctx, template_scope, *param_node, &decl);
        let default = template_param_default(ctx, template_scope, *param_node, &decl);
        let binding = ctx.bindings.alloc(
            name.clone(),
            BindingKind::TemplateParameter {
                kind,
                position: position as u32,
                is_pack: decl.is_pack,
                default,
            },
        );
        let offset = ctx.arena.span(*param_node).start;
        ctx.bindings.add_declaration(binding, *param_node, offset);
        declare(ctx, template_scope, &name, binding);
        ctx.resolutions.insert(name_node, binding);
        parameters.push(binding);
    }
    ctx.scopes.mark_populated(template_scope);

    let Some(inner) = ctx.arena.child(node, ChildRole::InnerDeclaration) else {
        return Vec::new();
    };
    collect_templated_inner(ctx, scope, template_scope, node, inner, parameters)
}

fn template_param_kind(
    ctx: &mut AnalysisContext,
    template_scope: ScopeId,
    param_node: NodeId,
    decl: &TemplateParameterDecl,
) -> TemplateParamKind {
    match decl.kind {
        TemplateParameterDeclKind::Type => TemplateParamKind::Type,
        TemplateParameterDeclKind::Template => TemplateParamKind::Template,
        TemplateParameterDeclKind::NonType => {
            let ty = match ctx.arena.child(param_node, ChildRole::TypeId) {
                Some(type_id) => type_from_type_id(ctx, template_scope, type_id),
                None => CxxType::int(),
            };
            TemplateParamKind::NonType { ty }
        }
    }
}

fn template_param_default(
    ctx: &mut AnalysisContext,
    template_scope: ScopeId,
    param_node: NodeId,
    decl: &TemplateParameterDecl,
) -> Option<TemplateArgument> {
    let default_node = ctx.arena.child(param_node, ChildRole::DefaultArgument)?;
    match decl.kind {
        TemplateParameterDeclKind::Type | TemplateParameterDeclKind::Template => {
            // the default may reference earlier parameters; resolving
            // in the template scope keeps those dependent
            let ty = if matches!(ctx.arena.kind(default_node), NodeKind::TypeIdNode) {
                type_from_type_id(ctx, template_scope, default_node)
            } else {
                expression_type(ctx, default_node)
            };
            Some(TemplateArgument::Type(ty))
        }
        TemplateParameterDeclKind::NonType => {
            let value = evaluate_constant(ctx, default_node)?;
            Some(TemplateArgument::NonType {
                value,
                ty: CxxType::int(),
            })
        }
    }
}

fn collect_templated_inner(
    ctx: &mut AnalysisContext,
    scope: ScopeId,
    template_scope: ScopeId,
    template_node: NodeId,
    inner: NodeId,
    parameters: Vec<BindingId>,
) -> Vec<BindingId> {
    let offset = ctx.arena.span(template_node).start;
    match ctx.arena.kind(inner).clone() {
        NodeKind::Declaration(DeclarationKind::Simple)
        | NodeKind::Declaration(DeclarationKind::FunctionDefinition) => {
            let spec_node = ctx.arena.child(inner, ChildRole::DeclSpecifier);
            // class template, partial specialization, or templated
            // function/variable/alias
            if let Some(spec_node) = spec_node {
                if let NodeKind::DeclSpecifier(DeclSpecifier {
                    kind: DeclSpecifierKind::Class { key },
                    ..
                }) = ctx.arena.kind(spec_node).clone()
                {
                    return collect_class_template(
                        ctx,
                        scope,
                        template_scope,
                        template_node,
                        spec_node,
                        key,
                        parameters,
                        offset,
                    );
                }
            }
            collect_templated_value(ctx, scope, template_scope, inner, parameters, offset)
        }
        _ => Vec::new(),
    }
}

#[allow(clippy::too_many_arguments)]
fn collect_class_template(
    ctx: &mut AnalysisContext,
    scope: ScopeId,
    template_scope: ScopeId,
    template_node: NodeId,
    spec_node: NodeId,
    key: ClassKey,
    parameters: Vec<BindingId>,
    offset: usize,
) -> Vec<BindingId> {
    let Some(name_node) = ctx.arena.child(spec_node, ChildRole::Name) else {
        return Vec::new();
    };
    // a template-id head means this is a partial specialization
    if matches!(ctx.arena.kind(name_node), NodeKind::Name(NameKind::TemplateId)) {
        let Some(primary_name_node) = ctx.arena.child(name_node, ChildRole::Name) else {
            return Vec::new();
        };
        let Some(primary_name) = ctx.arena.name_text(primary_name_node) else {
            return Vec::new();
        };
        let Some(primary) = resolve_name_str(ctx, scope, &primary_name) else {
            return Vec::new();
        };
        let arguments = template_id_arguments(ctx, template_scope, name_node);
        let partial = ctx.bindings.alloc(
            primary_name,
            BindingKind::PartialSpecialization {
                primary,
                parameters,
                arguments,
            },
        );
        ctx.bindings.add_declaration(partial, template_node, offset);
        ctx.bindings.get_mut(partial).scope = Some(scope);
        if let BindingKind::ClassTemplate {
            partial_specializations,
            ..
        } = &mut ctx.bindings.get_mut(primary).kind
        {
            partial_specializations.push(partial);
        }
        return vec![partial];
    }

    let Some(name) = ctx.arena.name_text(name_node) else {
        return Vec::new();
    };
    let member_scope = ctx.node_scopes.get(&spec_node).copied();
    let binding = ctx.bindings.alloc(
        name.clone(),
        BindingKind::ClassTemplate {
            key,
            parameters,
            partial_specializations: Vec::new(),
            member_scope,
        },
    );
    ctx.bindings.add_declaration(binding, template_node, offset);
    declare(ctx, scope, &name, binding);
    ctx.resolutions.insert(name_node, binding);
    if let Some(ms) = member_scope {
        ctx.set_scope_owner(ms, binding);
    }
    vec![binding]
}

fn collect_templated_value(
    ctx: &mut AnalysisContext,
    scope: ScopeId,
    template_scope: ScopeId,
    inner: NodeId,
    parameters: Vec<BindingId>,
    offset: usize,
) -> Vec<BindingId> {
    let Some(spec_node) = ctx.arena.child(inner, ChildRole::DeclSpecifier) else {
        return Vec::new();
    };
    let spec = match ctx.arena.kind(spec_node) {
        NodeKind::DeclSpecifier(s) => s.clone(),
        _ => return Vec::new(),
    };
    // resolve the declared type inside the template scope so that
    // parameter references stay dependent
    let (base, _) = type_from_decl_specifier(ctx, template_scope, spec_node);
    let Some(declarator) = ctx.arena.child(inner, ChildRole::Declarator) else {
        return Vec::new();
    };
    let Some((ty, Some(name_node))) = apply_declarator(ctx, template_scope, base, declarator)
    else {
        return Vec::new();
    };
    let Some(name) = ctx.arena.name_text(name_node) else {
        return Vec::new();
    };
    let kind = if spec.is_typedef {
        BindingKind::AliasTemplate {
            parameters,
            aliased: ty,
        }
    } else if matches!(ty, CxxType::Function { .. }) {
        BindingKind::FunctionTemplate { parameters, ty }
    } else {
        BindingKind::VariableTemplate { parameters, ty }
    };
    let binding = ctx.bindings.alloc(name.clone(), kind);
    ctx.bindings.add_declaration(binding, inner, offset);
    declare(ctx, scope, &name, binding);
    ctx.resolutions.insert(name_node, binding);
    vec![binding]
}

// ---------------------------------------------------------------------
// types from syntax
// ---------------------------------------------------------------------

fn basic_modifiers(modifiers: &TypeModifiers) -> BasicModifiers {
    BasicModifiers {
        is_signed: modifiers.is_signed,
        is_unsigned: modifiers.is_unsigned,
        is_short: modifiers.is_short,
        is_long: modifiers.is_long,
        is_long_long: modifiers.is_long_long,
    }
}

/// The type a decl-specifier denotes, plus any bindings a class/enum
/// definition inside it introduced.
pub fn type_from_decl_specifier(
    ctx: &mut AnalysisContext,
    scope: ScopeId,
    spec_node: NodeId,
) -> (CxxType, Vec<BindingId>) {
    let spec = match ctx.arena.kind(spec_node) {
        NodeKind::DeclSpecifier(s) => s.clone(),
        _ => {
            return (
                CxxType::problem(DiagnosticCode::InvalidType, "not a decl-specifier"),
                Vec::new(),
            )
        }
    };
    let (base, introduced) = match &spec.kind {
        DeclSpecifierKind::Simple { keyword, modifiers } => {
            let kind = match keyword {
                SimpleTypeKeyword::Void => BasicKind::Void,
                SimpleTypeKeyword::Bool => BasicKind::Bool,
                SimpleTypeKeyword::Char => BasicKind::Char,
                SimpleTypeKeyword::WChar => BasicKind::WChar,
                SimpleTypeKeyword::Float => BasicKind::Float,
                SimpleTypeKeyword::Double => BasicKind::Double,
                SimpleTypeKeyword::Int | SimpleTypeKeyword::Unspecified => BasicKind::Int,
            };
            (
                CxxType::Basic {
                    kind,
                    modifiers: basic_modifiers(modifiers),
                },
                Vec::new(),
            )
        }
        DeclSpecifierKind::Placeholder { kind } => {
            (CxxType::Placeholder { kind: *kind }, Vec::new())
        }
        DeclSpecifierKind::Named | DeclSpecifierKind::Elaborated { .. } => {
            let ty = match ctx.arena.child(spec_node, ChildRole::Name) {
                Some(name_node) => {
                    let binding = resolve_name_node(ctx, name_node, false);
                    binding_as_type(ctx, binding, name_node)
                }
                None => CxxType::problem(DiagnosticCode::InvalidType, "unnamed type specifier"),
            };
            (ty, Vec::new())
        }
        DeclSpecifierKind::Class { key } => collect_class_definition(ctx, scope, spec_node, *key),
        DeclSpecifierKind::Enum { scoped } => {
            collect_enum_definition(ctx, scope, spec_node, *scoped)
        }
    };
    (CxxType::qualified(spec.qualifiers, base), introduced)
}

fn collect_class_definition(
    ctx: &mut AnalysisContext,
    scope: ScopeId,
    spec_node: NodeId,
    key: ClassKey,
) -> (CxxType, Vec<BindingId>) {
    let Some(name_node) = ctx.arena.child(spec_node, ChildRole::Name) else {
        return (
            CxxType::problem(DiagnosticCode::InvalidType, "anonymous class"),
            Vec::new(),
        );
    };
    let Some(name) = ctx.arena.name_text(name_node) else {
        return (
            CxxType::problem(DiagnosticCode::InvalidType, "unnameable class"),
            Vec::new(),
        );
    };
    // a prior declaration of the same class reopens it
    let existing = ctx
        .scopes
        .lookup_local(scope, &name)
        .iter()
        .copied()
        .find(|b| matches!(ctx.bindings.get(*b).kind, BindingKind::Class { .. }));
    let offset = ctx.arena.span(spec_node).start;
    if let Some(binding) = existing {
        ctx.bindings.add_declaration(binding, spec_node, offset);
        return (CxxType::Named { binding }, vec![binding]);
    }
    let member_scope = ctx.node_scopes.get(&spec_node).copied();
    let binding = ctx
        .bindings
        .alloc(name.clone(), BindingKind::Class { key, member_scope });
    ctx.bindings.add_declaration(binding, spec_node, offset);
    let has_members = !ctx
        .arena
        .children_with_role(spec_node, ChildRole::Member)
        .is_empty();
    if has_members {
        ctx.bindings.set_definition(binding, spec_node);
    }
    declare(ctx, scope, &name, binding);
    ctx.resolutions.insert(name_node, binding);
    if let Some(ms) = member_scope {
        ctx.set_scope_owner(ms, binding);
    }
    (CxxType::Named { binding }, vec![binding])
}

fn collect_enum_definition(
    ctx: &mut AnalysisContext,
    scope: ScopeId,
    spec_node: NodeId,
    scoped: bool,
) -> (CxxType, Vec<BindingId>) {
    let Some(name_node) = ctx.arena.child(spec_node, ChildRole::Name) else {
        return (
            CxxType::problem(DiagnosticCode::InvalidType, "anonymous enum"),
            Vec::new(),
        );
    };
    let Some(name) = ctx.arena.name_text(name_node) else {
        return (
            CxxType::problem(DiagnosticCode::InvalidType, "unnameable enum"),
            Vec::new(),
        );
    };
    let member_scope = ctx.node_scopes.get(&spec_node).copied();
    let binding = ctx.bindings.alloc(
        name.clone(),
        BindingKind::Enumeration {
            scoped,
            member_scope,
        },
    );
    let offset = ctx.arena.span(spec_node).start;
    ctx.bindings.add_declaration(binding, spec_node, offset);
    ctx.bindings.set_definition(binding, spec_node);
    declare(ctx, scope, &name, binding);
    ctx.resolutions.insert(name_node, binding);
    let mut introduced = vec![binding];
    if let Some(ms) = member_scope {
        ctx.set_scope_owner(ms, binding);
        // unscoped enumerators are visible in the surrounding scope too
        let inject = if scoped { None } else { Some(scope) };
        introduced.extend(collect_enumerators(ctx, ms, spec_node, inject));
        ctx.scopes.mark_populated(ms);
    }
    (CxxType::Named { binding }, introduced)
}

/// Fold a declarator's pointer operators and function/array shape onto
/// the base type; answers the declared type and the declared name node
/// (absent for abstract declarators and unnamed parameters).
pub fn apply_declarator(
    ctx: &mut AnalysisContext,
    scope: ScopeId,
    base: CxxType,
    declarator: NodeId,
) -> Option<(CxxType, Option<NodeId>)> {
    let info = match ctx.arena.kind(declarator) {
        NodeKind::Declarator(info) => info.clone(),
        _ => return None,
    };
    let mut ty = base;
    let operators = ctx
        .arena
        .children_with_role(declarator, ChildRole::PointerOperator);
    for operator in operators {
        ty = match ctx.arena.kind(operator).clone() {
            NodeKind::PointerOperator(PointerOperator::Pointer { qualifiers }) => {
                CxxType::qualified(qualifiers, CxxType::pointer_to(ty))
            }
            NodeKind::PointerOperator(PointerOperator::Reference { rvalue }) => {
                CxxType::reference_to(ty, rvalue)
            }
            NodeKind::PointerOperator(PointerOperator::PointerToMember { qualifiers }) => {
                let member_of = match ctx.arena.child(operator, ChildRole::Name) {
                    Some(class_name) => {
                        let binding = resolve_name_node(ctx, class_name, false);
                        binding_as_type(ctx, binding, class_name)
                    }
                    None => CxxType::problem(DiagnosticCode::InvalidType, "missing class name"),
                };
                CxxType::qualified(
                    qualifiers,
                    CxxType::PointerToMember {
                        inner: Box::new(ty),
                        member_of: Box::new(member_of),
                    },
                )
            }
            _ => ty,
        };
    }
    match info.kind {
        DeclaratorKind::Function { variadic } => {
            let mut parameters = Vec::new();
            let param_nodes = ctx
                .arena
                .children_with_role(declarator, ChildRole::Parameter);
            for parameter in param_nodes {
                let Some(spec_node) = ctx.arena.child(parameter, ChildRole::DeclSpecifier) else {
                    continue;
                };
                let (param_base, _) = type_from_decl_specifier(ctx, scope, spec_node);
                let param_ty = match ctx.arena.child(parameter, ChildRole::Declarator) {
                    Some(pd) => apply_declarator(ctx, scope, param_base, pd)
                        .map(|(t, _)| t)
                        .unwrap_or_else(|| {
                            CxxType::problem(DiagnosticCode::InvalidType, "bad parameter")
                        }),
                    None => param_base,
                };
                parameters.push(param_ty);
            }
            ty = CxxType::Function {
                returns: Box::new(ty),
                parameters,
                variadic,
                qualifiers: CvQualifiers::NONE,
            };
        }
        DeclaratorKind::Array => {
            let bound = ctx
                .arena
                .child(declarator, ChildRole::ArrayBound)
                .and_then(|b| evaluate_constant(ctx, b));
            ty = CxxType::array_of(ty, bound);
        }
        DeclaratorKind::Plain => {}
    }
    if info.declares_pack {
        ty = CxxType::pack_of(ty);
    }
    let name_node = ctx.arena.child(declarator, ChildRole::Name);
    Some((ty, name_node))
}

/// The type denoted by a type-id node.
pub fn type_from_type_id(ctx: &mut AnalysisContext, scope: ScopeId, type_id: NodeId) -> CxxType {
    let Some(spec_node) = ctx.arena.child(type_id, ChildRole::DeclSpecifier) else {
        return CxxType::problem(DiagnosticCode::InvalidType, "type-id without specifier");
    };
    let (base, _) = type_from_decl_specifier(ctx, scope, spec_node);
    match ctx.arena.child(type_id, ChildRole::AbstractDeclarator) {
        Some(declarator) => {
            // an abstract declarator has no name; fold its shape only
            let operators = ctx
                .arena
                .children_with_role(declarator, ChildRole::PointerOperator);
            let mut ty = base;
            for operator in operators {
                ty = match ctx.arena.kind(operator).clone() {
                    NodeKind::PointerOperator(PointerOperator::Pointer { qualifiers }) => {
                        CxxType::qualified(qualifiers, CxxType::pointer_to(ty))
                    }
                    NodeKind::PointerOperator(PointerOperator::Reference { rvalue }) => {
                        CxxType::reference_to(ty, rvalue)
                    }
                    _ => ty,
                };
            }
            if let NodeKind::Declarator(DeclaratorInfo {
                kind: DeclaratorKind::Array,
                ..
            }) = ctx.arena.kind(declarator)
            {
                let bound = ctx
                    .arena
                    .child(declarator, ChildRole::ArrayBound)
                    .and_then(|b| evaluate_constant(ctx, b));
                ty = CxxType::array_of(ty, bound);
            }
            if let NodeKind::Declarator(DeclaratorInfo { declares_pack: true, .. }) =
                ctx.arena.kind(declarator)
            {
                ty = CxxType::pack_of(ty);
            }
            ty
        }
        None => base,
    }
}

// ---------------------------------------------------------------------
// name resolution
// ---------------------------------------------------------------------

/// Candidates for `name` starting at `scope`, in insertion order within
/// the first scope level that has any. Population is triggered lazily
/// at each level.
pub fn resolve_in_scope(
    ctx: &mut AnalysisContext,
    scope: ScopeId,
    name: &str,
    scope_local_only: bool,
) -> Vec<BindingId> {
    let mut current = Some(scope);
    while let Some(s) = current {
        ensure_populated(ctx, s);
        let found = ctx.scopes.lookup_local(s, name);
        if !found.is_empty() {
            return found.to_vec();
        }
        if scope_local_only {
            break;
        }
        current = ctx.scopes.parent(s);
    }
    Vec::new()
}

/// First candidate for `name`, walking the scope chain.
pub fn resolve_name_str(ctx: &mut AnalysisContext, scope: ScopeId, name: &str) -> Option<BindingId> {
    resolve_in_scope(ctx, scope, name, false).first().copied()
}

/// Two-phase lookup: a hit is `Resolved`; a miss enters the pending
/// worklist (forward references get a second chance before becoming
/// problems).
pub fn lookup_two_phase(
    ctx: &mut AnalysisContext,
    scope: ScopeId,
    name: &str,
    node: NodeId,
) -> Resolution {
    if let Some(binding) = resolve_name_str(ctx, scope, name) {
        return Resolution::Resolved(binding);
    }
    let offset = ctx.arena.span(node).start;
    ctx.pending.push(PendingLookup {
        name: name.to_string(),
        scope,
        node,
        offset,
    });
    Resolution::Pending(ctx.pending.len() - 1)
}

/// Resolve a name node to a binding. Never returns "nothing": an
/// unresolvable name yields a problem binding (and a diagnostic when
/// `allow_pending` is off), a template-dependent name yields an
/// unknown binding.
pub fn resolve_name_node(ctx: &mut AnalysisContext, name_node: NodeId, allow_pending: bool) -> BindingId {
    if let Some(existing) = ctx.resolutions.get(&name_node) {
        return *existing;
    }
    let binding = resolve_name_node_uncached(ctx, name_node, allow_pending);
    ctx.resolutions.insert(name_node, binding);
    binding
}

fn resolve_name_node_uncached(
    ctx: &mut AnalysisContext,
    name_node: NodeId,
    allow_pending: bool,
) -> BindingId {
    let scope = enclosing_scope(ctx, name_node);
    match ctx.arena.kind(name_node).clone() {
        NodeKind::Name(NameKind::Identifier { text })
        | NodeKind::Name(NameKind::OperatorName { spelling: text }) => {
            match resolve_name_str(ctx, scope, &text) {
                Some(binding) => binding,
                None if allow_pending => {
                    let offset = ctx.arena.span(name_node).start;
                    ctx.pending.push(PendingLookup {
                        name: text,
                        scope,
                        node: name_node,
                        offset,
                    });
                    // stays unresolved for now; the upgrade pass will
                    // revisit. A problem binding stands in so callers
                    // always hold a binding.
                    ctx.bindings.problem(DiagnosticCode::NameNotFound, "")
                }
                None => {
                    let span = ctx.arena.span(name_node);
                    ctx.report(SemanticError::UndeclaredName {
                        name: text.clone(),
                        span: to_source_span(span),
                    });
                    ctx.bindings.problem(DiagnosticCode::NameNotFound, text)
                }
            }
        }
        NodeKind::Name(NameKind::Qualified { fully_qualified }) => {
            resolve_qualified_name(ctx, name_node, scope, fully_qualified)
        }
        NodeKind::Name(NameKind::TemplateId) => resolve_template_id(ctx, name_node, scope),
        _ => ctx
            .bindings
            .problem(DiagnosticCode::NameNotFound, "malformed name"),
    }
}

fn resolve_qualified_name(
    ctx: &mut AnalysisContext,
    name_node: NodeId,
    scope: ScopeId,
    fully_qualified: bool,
) -> BindingId {
    let segments = ctx.arena.children_with_role(name_node, ChildRole::Segment);
    let mut current: Option<BindingId> = None;
    let start_scope = if fully_qualified {
        ctx.global_scope()
    } else {
        scope
    };
    for segment in segments.iter() {
        let Some(text) = ctx.arena.name_text(*segment) else {
            return ctx
                .bindings
                .problem(DiagnosticCode::NameNotFound, "malformed segment");
        };
        let next = match current {
            None => resolve_name_str(ctx, start_scope, &text),
            Some(owner) => {
                // member lookup through the owner's scope; a dependent
                // owner defers the whole chain
                let owner_ty = ctx.bindings.type_of(owner);
                if let Some(ty) = &owner_ty {
                    if ty.is_dependent() {
                        let unknown = ctx.bindings.alloc(
                            text.clone(),
                            BindingKind::UnknownMember { owner: ty.clone() },
                        );
                        current = Some(unknown);
                        continue;
                    }
                }
                match ctx.bindings.member_scope(owner) {
                    Some(member_scope) => {
                        ensure_populated(ctx, member_scope);
                        ctx.scopes.lookup_local(member_scope, &text).first().copied()
                    }
                    None => None,
                }
            }
        };
        match next {
            Some(binding) => current = Some(binding),
            None => {
                let span = ctx.arena.span(*segment);
                ctx.report(SemanticError::UndeclaredName {
                    name: text.clone(),
                    span: to_source_span(span),
                });
                return ctx.bindings.problem(DiagnosticCode::NameNotFound, text);
            }
        }
    }
    current.unwrap_or_else(|| {
        ctx.bindings
            .problem(DiagnosticCode::NameNotFound, "empty qualified name")
    })
}

/// Collect the template arguments of a template-id, resolving type-id
/// arguments in `scope`.
pub fn template_id_arguments(
    ctx: &mut AnalysisContext,
    scope: ScopeId,
    template_id: NodeId,
) -> Vec<TemplateArgument> {
    let arg_nodes = ctx
        .arena
        .children_with_role(template_id, ChildRole::TemplateArgument);
    let mut arguments = Vec::with_capacity(arg_nodes.len());
    for arg_node in arg_nodes {
        let arg = if matches!(ctx.arena.kind(arg_node), NodeKind::TypeIdNode) {
            TemplateArgument::Type(type_from_type_id(ctx, scope, arg_node))
        } else {
            match evaluate_constant(ctx, arg_node) {
                Some(value) => TemplateArgument::NonType {
                    value,
                    ty: CxxType::int(),
                },
                None => TemplateArgument::Type(expression_type(ctx, arg_node)),
            }
        };
        arguments.push(arg);
    }
    arguments
}

fn resolve_template_id(
    ctx: &mut AnalysisContext,
    template_id: NodeId,
    scope: ScopeId,
) -> BindingId {
    let Some(head) = ctx.arena.child(template_id, ChildRole::Name) else {
        return ctx
            .bindings
            .problem(DiagnosticCode::NameNotFound, "template-id without name");
    };
    let template = resolve_name_node(ctx, head, false);
    if ctx.bindings.get(template).is_problem() {
        return template;
    }
    let arguments = template_id_arguments(ctx, scope, template_id);
    match &ctx.bindings.get(template).kind {
        BindingKind::ClassTemplate { .. } => {
            // dependent arguments stay a deferred reference; concrete
            // arguments instantiate through the cache
            let dependent = arguments.iter().any(|a| match a {
                TemplateArgument::Type(t) => t.is_dependent(),
                TemplateArgument::Pack(parts) => parts.iter().any(|p| match p {
                    TemplateArgument::Type(t) => t.is_dependent(),
                    _ => false,
                }),
                _ => false,
            });
            if dependent {
                let name = ctx.bindings.name(template).to_string();
                return ctx.bindings.alloc(
                    name,
                    BindingKind::UnknownMember {
                        owner: CxxType::Named { binding: template },
                    },
                );
            }
            instantiate_class_template(ctx, template, &arguments, 0)
        }
        BindingKind::AliasTemplate { parameters, .. } => {
            let parameters = parameters.clone();
            let normalized =
                match crate::templates::normalize_arguments(&ctx.bindings, &parameters, &arguments)
                {
                    Some(n) => n,
                    None => {
                        let name = ctx.bindings.name(template).to_string();
                        return ctx
                            .bindings
                            .problem(DiagnosticCode::BadTemplateArguments, name);
                    }
                };
            let mut map = crate::bindings::ParameterMap::new();
            for (param, arg) in parameters.iter().zip(&normalized) {
                map.insert(*param, arg.clone());
            }
            specialize_member(ctx, template, map)
        }
        _ => {
            let name = ctx.bindings.name(template).to_string();
            ctx.bindings
                .problem(DiagnosticCode::BadTemplateArguments, name)
        }
    }
}

/// The type a binding denotes when used as a type name.
fn binding_as_type(ctx: &mut AnalysisContext, binding: BindingId, name_node: NodeId) -> CxxType {
    if ctx.bindings.names_a_type(binding) || ctx.bindings.get(binding).is_problem() {
        ctx.bindings
            .type_of(binding)
            .unwrap_or_else(|| CxxType::problem(DiagnosticCode::InvalidType, "untyped binding"))
    } else if matches!(
        ctx.bindings.get(binding).kind,
        BindingKind::UnknownMember { .. } | BindingKind::Specialization { .. }
    ) {
        ctx.bindings
            .type_of(binding)
            .unwrap_or_else(|| CxxType::problem(DiagnosticCode::InvalidType, "untyped binding"))
    } else {
        // the name exists but does not denote a type; the problem type
        // carries the offending text, no separate diagnostic
        let name = ctx.arena.name_text(name_node).unwrap_or_default();
        CxxType::problem(DiagnosticCode::InvalidType, name)
    }
}

// ---------------------------------------------------------------------
// reference resolution pass
// ---------------------------------------------------------------------

fn resolve_references(ctx: &mut AnalysisContext, node: NodeId, allow_pending: bool) {
    if let NodeKind::Expression(ExpressionKind::IdExpression) = ctx.arena.kind(node) {
        if let Some(name_node) = ctx.arena.child(node, ChildRole::Name) {
            resolve_name_node(ctx, name_node, allow_pending);
        }
    }
    let children: Vec<NodeId> = ctx.arena.children(node).iter().map(|(_, c)| *c).collect();
    for child in children {
        resolve_references(ctx, child, allow_pending);
    }
}

/// Re-run pending lookups in source order; what still fails becomes a
/// problem binding with a diagnostic.
pub fn upgrade_pending(ctx: &mut AnalysisContext) {
    let mut pending = std::mem::take(&mut ctx.pending);
    pending.sort_by_key(|p| p.offset);
    for entry in pending {
        if let Some(binding) = resolve_name_str(ctx, entry.scope, &entry.name) {
            ctx.resolutions.insert(entry.node, binding);
        } else {
            let span = ctx.arena.span(entry.node);
            ctx.report(SemanticError::UndeclaredName {
                name: entry.name.clone(),
                span: to_source_span(span),
            });
            let problem = ctx
                .bindings
                .problem(DiagnosticCode::NameNotFound, entry.name);
            ctx.resolutions.insert(entry.node, problem);
        }
    }
}

// ---------------------------------------------------------------------
// expression types
// ---------------------------------------------------------------------

fn value_category(ctx: &AnalysisContext, node: NodeId) -> ValueCategory {
    match ctx.arena.kind(node) {
        NodeKind::Expression(ExpressionKind::IdExpression) => ValueCategory::LValue,
        NodeKind::Expression(ExpressionKind::Literal(LiteralExpr::String { .. })) => {
            ValueCategory::LValue
        }
        NodeKind::Expression(ExpressionKind::Unary(UnaryOperator::Dereference)) => {
            ValueCategory::LValue
        }
        NodeKind::Expression(ExpressionKind::FieldReference { .. }) => ValueCategory::LValue,
        _ => ValueCategory::RValue,
    }
}

/// The type of an expression. Problems propagate as problem types;
/// dependent expressions produce unknown types. Never panics for "not
/// yet resolvable".
pub fn expression_type(ctx: &mut AnalysisContext, node: NodeId) -> CxxType {
    match ctx.arena.kind(node).clone() {
        NodeKind::Expression(kind) => expression_type_of_kind(ctx, node, kind),
        NodeKind::TypeIdNode => {
            let scope = enclosing_scope(ctx, node);
            type_from_type_id(ctx, scope, node)
        }
        _ => CxxType::problem(DiagnosticCode::InvalidType, "not an expression"),
    }
}

fn expression_type_of_kind(
    ctx: &mut AnalysisContext,
    node: NodeId,
    kind: ExpressionKind,
) -> CxxType {
    match kind {
        ExpressionKind::Literal(literal) => literal_type(&literal),
        ExpressionKind::IdExpression => {
            let Some(name_node) = ctx.arena.child(node, ChildRole::Name) else {
                return CxxType::problem(DiagnosticCode::InvalidType, "nameless id-expression");
            };
            let binding = resolve_name_node(ctx, name_node, false);
            ctx.bindings
                .type_of(binding)
                .unwrap_or_else(|| CxxType::problem(DiagnosticCode::InvalidType, "untyped binding"))
        }
        ExpressionKind::Unary(op) => {
            let Some(operand) = ctx.arena.child(node, ChildRole::Operand) else {
                return CxxType::problem(DiagnosticCode::InvalidType, "missing operand");
            };
            let operand_ty = expression_type(ctx, operand);
            if operand_ty.is_problem() {
                return operand_ty;
            }
            unary_type(op, operand_ty)
        }
        ExpressionKind::Binary(op) => {
            let Some(left) = ctx.arena.child(node, ChildRole::LeftOperand) else {
                return CxxType::problem(DiagnosticCode::InvalidType, "missing operand");
            };
            let Some(right) = ctx.arena.child(node, ChildRole::RightOperand) else {
                return CxxType::problem(DiagnosticCode::InvalidType, "missing operand");
            };
            let left_ty = expression_type(ctx, left);
            let right_ty = expression_type(ctx, right);
            if left_ty.is_problem() {
                return left_ty;
            }
            if right_ty.is_problem() {
                return right_ty;
            }
            binary_type(op, left_ty, right_ty)
        }
        ExpressionKind::Cast(_) => {
            let Some(type_id) = ctx.arena.child(node, ChildRole::TypeId) else {
                return CxxType::problem(DiagnosticCode::InvalidType, "cast without type");
            };
            let scope = enclosing_scope(ctx, node);
            type_from_type_id(ctx, scope, type_id)
        }
        ExpressionKind::FunctionCall => resolve_call(ctx, node),
        ExpressionKind::FieldReference { is_arrow } => {
            field_reference_type(ctx, node, is_arrow)
        }
        ExpressionKind::Conditional => {
            let Some(positive) = ctx.arena.child(node, ChildRole::Positive) else {
                return CxxType::problem(DiagnosticCode::InvalidType, "missing branch");
            };
            expression_type(ctx, positive)
        }
        ExpressionKind::PackExpansion => {
            let Some(pattern) = ctx.arena.child(node, ChildRole::Pattern) else {
                return CxxType::problem(DiagnosticCode::InvalidType, "missing pattern");
            };
            CxxType::pack_of(expression_type(ctx, pattern))
        }
        ExpressionKind::TypeIdOperand(_) => CxxType::Basic {
            kind: BasicKind::Int,
            modifiers: BasicModifiers {
                is_unsigned: true,
                is_long: true,
                ..BasicModifiers::default()
            },
        },
        ExpressionKind::Problem => {
            CxxType::problem(DiagnosticCode::InvalidType, "problem expression")
        }
    }
}

fn literal_type(literal: &LiteralExpr) -> CxxType {
    match literal {
        LiteralExpr::Integer { .. } => CxxType::int(),
        LiteralExpr::Float { .. } => CxxType::double(),
        LiteralExpr::Char { .. } => CxxType::char_type(),
        LiteralExpr::Bool { .. } => CxxType::bool_type(),
        // string literals participate in deduction as `const char*`
        LiteralExpr::String { .. } => CxxType::pointer_to(CxxType::qualified(
            CvQualifiers::CONST,
            CxxType::char_type(),
        )),
        LiteralExpr::Nullptr => CxxType::pointer_to(CxxType::void()),
        LiteralExpr::This => CxxType::pointer_to(CxxType::void()),
    }
}

fn unary_type(op: UnaryOperator, operand: CxxType) -> CxxType {
    use crate::types::{strip, strip_nested};
    match op {
        UnaryOperator::Dereference => match strip_nested(&operand, strip::TDEF | strip::REF) {
            CxxType::Pointer { inner } => (**inner).clone(),
            other => CxxType::problem(
                DiagnosticCode::InvalidType,
                format!("cannot dereference {other}"),
            ),
        },
        UnaryOperator::AddressOf => CxxType::pointer_to(operand),
        UnaryOperator::Not => CxxType::bool_type(),
        UnaryOperator::SizeofExpr => CxxType::Basic {
            kind: BasicKind::Int,
            modifiers: BasicModifiers {
                is_unsigned: true,
                is_long: true,
                ..BasicModifiers::default()
            },
        },
        _ => operand,
    }
}

fn binary_type(op: BinaryOperator, left: CxxType, right: CxxType) -> CxxType {
    use BinaryOperator::*;
    match op {
        Less | Greater | LessEqual | GreaterEqual | Equal | NotEqual | LogicalAnd | LogicalOr => {
            CxxType::bool_type()
        }
        Assign => left,
        Comma => right,
        _ => {
            // usual arithmetic conversions, reduced to what the model
            // distinguishes
            let is_double = |t: &CxxType| {
                matches!(
                    t,
                    CxxType::Basic {
                        kind: BasicKind::Double | BasicKind::Float,
                        ..
                    }
                )
            };
            if is_double(&left) {
                left
            } else if is_double(&right) {
                right
            } else {
                left
            }
        }
    }
}

fn field_reference_type(ctx: &mut AnalysisContext, node: NodeId, is_arrow: bool) -> CxxType {
    let Some(owner_expr) = ctx.arena.child(node, ChildRole::Owner) else {
        return CxxType::problem(DiagnosticCode::InvalidType, "missing owner");
    };
    let Some(member_name) = ctx.arena.child(node, ChildRole::MemberName) else {
        return CxxType::problem(DiagnosticCode::InvalidType, "missing member name");
    };
    let mut owner_ty = expression_type(ctx, owner_expr);
    if is_arrow {
        owner_ty = match crate::types::strip_nested(
            &owner_ty,
            crate::types::strip::TDEF | crate::types::strip::REF | crate::types::strip::CV,
        ) {
            CxxType::Pointer { inner } => (**inner).clone(),
            other => other.clone(),
        };
    }
    let bare = crate::types::strip_nested(
        &owner_ty,
        crate::types::strip::TDEF | crate::types::strip::REF | crate::types::strip::CV,
    )
    .clone();
    let Some(name) = ctx.arena.name_text(member_name) else {
        return CxxType::problem(DiagnosticCode::InvalidType, "bad member name");
    };
    if bare.is_dependent() {
        // deferred member access: an unknown binding keeps the chain
        // alive until instantiation
        let unknown = ctx
            .bindings
            .alloc(name.clone(), BindingKind::UnknownMember { owner: bare });
        ctx.resolutions.insert(member_name, unknown);
        return ctx
            .bindings
            .type_of(unknown)
            .unwrap_or_else(|| CxxType::problem(DiagnosticCode::InvalidType, name));
    }
    match &bare {
        CxxType::Named { binding } => {
            let class_binding = *binding;
            match ctx.bindings.member_scope(class_binding) {
                Some(member_scope) => {
                    ensure_populated(ctx, member_scope);
                    match ctx.scopes.lookup_local(member_scope, &name).first().copied() {
                        Some(member) => {
                            ctx.resolutions.insert(member_name, member);
                            ctx.bindings.type_of(member).unwrap_or_else(|| {
                                CxxType::problem(DiagnosticCode::InvalidType, name)
                            })
                        }
                        None => {
                            let span = ctx.arena.span(member_name);
                            ctx.report(SemanticError::UndeclaredName {
                                name: name.clone(),
                                span: to_source_span(span),
                            });
                            let problem =
                                ctx.bindings.problem(DiagnosticCode::NameNotFound, name);
                            ctx.resolutions.insert(member_name, problem);
                            CxxType::problem(DiagnosticCode::NameNotFound, "no such member")
                        }
                    }
                }
                None => CxxType::problem(DiagnosticCode::MemberOfNonClass, name),
            }
        }
        _ => CxxType::problem(DiagnosticCode::MemberOfNonClass, name),
    }
}

/// Overload resolution for a call expression. Candidates are considered
/// in lookup (insertion) order; deduction failure disqualifies only the
/// candidate it failed for. Non-template functions win over template
/// instantiations.
fn resolve_call(ctx: &mut AnalysisContext, call: NodeId) -> CxxType {
    let Some(callee) = ctx.arena.child(call, ChildRole::FunctionName) else {
        return CxxType::problem(DiagnosticCode::InvalidOverload, "call without callee");
    };
    let arg_nodes = ctx.arena.children_with_role(call, ChildRole::Argument);
    let mut args = Vec::with_capacity(arg_nodes.len());
    for arg in &arg_nodes {
        let ty = expression_type(ctx, *arg);
        let category = value_category(ctx, *arg);
        args.push((ty, category));
    }

    // only id-expression callees participate in overload resolution;
    // anything else is called through its type
    let name_node = match ctx.arena.kind(callee) {
        NodeKind::Expression(ExpressionKind::IdExpression) => {
            ctx.arena.child(callee, ChildRole::Name)
        }
        _ => None,
    };
    let Some(name_node) = name_node else {
        let callee_ty = expression_type(ctx, callee);
        return match crate::types::strip_nested(
            &callee_ty,
            crate::types::strip::TDEF | crate::types::strip::PTR | crate::types::strip::REF,
        ) {
            CxxType::Function { returns, .. } => (**returns).clone(),
            _ => CxxType::problem(DiagnosticCode::InvalidOverload, "not callable"),
        };
    };
    let Some(name) = ctx.arena.name_text(name_node) else {
        return CxxType::problem(DiagnosticCode::InvalidOverload, "bad callee name");
    };
    let scope = enclosing_scope(ctx, call);
    let candidates = resolve_in_scope(ctx, scope, &name, false);
    if candidates.is_empty() {
        let span = ctx.arena.span(name_node);
        ctx.report(SemanticError::UndeclaredName {
            name: name.clone(),
            span: to_source_span(span),
        });
        let problem = ctx.bindings.problem(DiagnosticCode::NameNotFound, name);
        ctx.resolutions.insert(name_node, problem);
        return CxxType::problem(DiagnosticCode::NameNotFound, "unresolved callee");
    }

    // pass 1: non-template candidates with a usable arity
    for candidate in &candidates {
        if let BindingKind::Function { ty } | BindingKind::Method { ty, .. } =
            &ctx.bindings.get(*candidate).kind
        {
            if let CxxType::Function {
                parameters,
                variadic,
                returns,
                ..
            } = ty
            {
                if parameters.len() == args.len() || (*variadic && args.len() >= parameters.len())
                {
                    let returns = (**returns).clone();
                    ctx.resolutions.insert(name_node, *candidate);
                    return returns;
                }
            }
        }
    }
    // pass 2: function templates; failed deduction disqualifies the
    // candidate, nothing more
    for candidate in &candidates {
        if let BindingKind::FunctionTemplate { parameters, ty } =
            ctx.bindings.get(*candidate).kind.clone()
        {
            let function_params = match &ty {
                CxxType::Function { parameters, .. } => parameters.clone(),
                _ => continue,
            };
            let outcome = deduction::deduce_for_function_call(
                &ctx.bindings,
                &parameters,
                &[],
                &function_params,
                &args,
            );
            if let Some(outcome) = outcome {
                let instance = crate::templates::instantiate_function_template(
                    ctx,
                    *candidate,
                    outcome.arguments,
                    outcome.map,
                );
                ctx.resolutions.insert(name_node, instance);
                if let Some(CxxType::Function { returns, .. }) =
                    instance_function_type(&ctx.bindings, instance)
                {
                    return *returns;
                }
                return CxxType::problem(DiagnosticCode::InvalidOverload, name);
            }
        }
    }
    let span = ctx.arena.span(call);
    ctx.report(SemanticError::NoMatchingOverload {
        name: name.clone(),
        span: to_source_span(span),
    });
    CxxType::problem(DiagnosticCode::InvalidOverload, name)
}

// ---------------------------------------------------------------------
// constant evaluation (for array bounds and template arguments)
// ---------------------------------------------------------------------

/// Evaluate an integral constant expression, if it is one.
pub fn evaluate_constant(ctx: &mut AnalysisContext, node: NodeId) -> Option<i64> {
    match ctx.arena.kind(node).clone() {
        NodeKind::Expression(ExpressionKind::Literal(LiteralExpr::Integer { value, .. })) => {
            Some(value)
        }
        NodeKind::Expression(ExpressionKind::Literal(LiteralExpr::Bool { value })) => {
            Some(value as i64)
        }
        NodeKind::Expression(ExpressionKind::Literal(LiteralExpr::Char { value })) => {
            Some(value as i64)
        }
        NodeKind::Expression(ExpressionKind::Unary(op)) => {
            let operand = ctx.arena.child(node, ChildRole::Operand)?;
            let value = evaluate_constant(ctx, operand)?;
            match op {
                UnaryOperator::Minus => Some(-value),
                UnaryOperator::Plus => Some(value),
                UnaryOperator::Not => Some((value == 0) as i64),
                UnaryOperator::BitwiseNot => Some(!value),
                _ => None,
            }
        }
        NodeKind::Expression(ExpressionKind::Binary(op)) => {
            let left = ctx.arena.child(node, ChildRole::LeftOperand)?;
            let right = ctx.arena.child(node, ChildRole::RightOperand)?;
            let l = evaluate_constant(ctx, left)?;
            let r = evaluate_constant(ctx, right)?;
            use BinaryOperator::*;
            match op {
                Add => l.checked_add(r),
                Subtract => l.checked_sub(r),
                Multiply => l.checked_mul(r),
                Divide => l.checked_div(r),
                Modulo => l.checked_rem(r),
                ShiftLeft => Some(l << (r & 63)),
                ShiftRight => Some(l >> (r & 63)),
                Less => Some((l < r) as i64),
                Greater => Some((l > r) as i64),
                LessEqual => Some((l <= r) as i64),
                GreaterEqual => Some((l >= r) as i64),
                Equal => Some((l == r) as i64),
                NotEqual => Some((l != r) as i64),
                BitwiseAnd => Some(l & r),
                BitwiseOr => Some(l | r),
                BitwiseXor => Some(l ^ r),
                LogicalAnd => Some(((l != 0) && (r != 0)) as i64),
                LogicalOr => Some(((l != 0) || (r != 0)) as i64),
                Assign | Comma => None,
            }
        }
        NodeKind::Expression(ExpressionKind::Conditional) => {
            let condition = ctx.arena.child(node, ChildRole::Condition)?;
            let value = evaluate_constant(ctx, condition)?;
            let branch = if value != 0 {
                ctx.arena.child(node, ChildRole::Positive)?
            } else {
                ctx.arena.child(node, ChildRole::Negative)?
            };
            evaluate_constant(ctx, branch)
        }
        NodeKind::Expression(ExpressionKind::IdExpression) => {
            let name_node = ctx.arena.child(node, ChildRole::Name)?;
            let binding = resolve_name_node(ctx, name_node, false);
            match &ctx.bindings.get(binding).kind {
                BindingKind::Enumerator { value } => *value,
                _ => None,
            }
        }
        _ => None,
    }
}
