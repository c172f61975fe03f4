//! Template specialization and instantiation
//!
//! Instantiation is cached: structurally equal argument lists map to the
//! same instance binding, which makes instance identity usable as type
//! identity. Partial specializations are ranked by cross-deduction of
//! their patterns; when two applicable partials are incomparable the
//! instantiation is ambiguous and degrades to a problem binding with a
//! diagnostic, never a silent pick. A depth guard and the instantiation
//! dependency graph bound runaway recursive templates.

use crate::bindings::{
    argument_list_signature, BindingArena, BindingId, BindingKind, ParameterMap, TemplateArgument,
};
use crate::context::AnalysisContext;
use crate::deduction::{deduce_argument, substitute_argument, substitute_into_type};
use crate::error::{DiagnosticCode, SemanticError};
use crate::types::CxxType;
use indexmap::IndexMap;

/// Ceiling on recursive instantiation depth. Exceeding it yields a
/// problem binding, never a stack overflow.
pub const MAX_INSTANTIATION_DEPTH: usize = 128;

/// Cache of template instances keyed by template identity plus the
/// canonical signature of the argument list.
///
/// Not synchronized: semantic analysis is single-threaded per
/// translation unit, and each unit owns its own cache.
#[derive(Debug, Default)]
pub struct InstanceCache {
    map: IndexMap<String, BindingId>,
}

impl InstanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(template: BindingId, args: &[TemplateArgument]) -> String {
        format!("{}{}", template.0, argument_list_signature(args))
    }

    pub fn get_instance(&self, template: BindingId, args: &[TemplateArgument]) -> Option<BindingId> {
        self.map.get(&Self::key(template, args)).copied()
    }

    pub fn add_instance(
        &mut self,
        template: BindingId,
        args: &[TemplateArgument],
        instance: BindingId,
    ) {
        self.map.insert(Self::key(template, args), instance);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Bring a caller-supplied argument list up to the template's parameter
/// list: check arity, fold surplus arguments into a trailing pack, and
/// substitute defaults left to right. `None` means the arguments do not
/// fit the template at all.
pub fn normalize_arguments(
    bindings: &BindingArena,
    parameters: &[BindingId],
    args: &[TemplateArgument],
) -> Option<Vec<TemplateArgument>> {
    let mut normalized = Vec::with_capacity(parameters.len());
    let mut map = ParameterMap::new();
    let mut consumed = 0usize;

    for (i, param) in parameters.iter().enumerate() {
        let is_pack = matches!(
            bindings.get(*param).kind,
            BindingKind::TemplateParameter { is_pack: true, .. }
        );
        if is_pack && i == parameters.len() - 1 {
            let rest: Vec<TemplateArgument> = args[consumed.min(args.len())..].to_vec();
            consumed = args.len();
            let pack = TemplateArgument::Pack(rest);
            map.insert(*param, pack.clone());
            normalized.push(pack);
        } else if consumed < args.len() {
            let arg = args[consumed].clone();
            consumed += 1;
            map.insert(*param, arg.clone());
            normalized.push(arg);
        } else {
            // positional arguments exhausted: defaults, left to right,
            // with earlier substitutions visible
            let default = match &bindings.get(*param).kind {
                BindingKind::TemplateParameter { default: Some(d), .. } => d.clone(),
                _ => return None,
            };
            let substituted = substitute_argument(bindings, &default, &map);
            map.insert(*param, substituted.clone());
            normalized.push(substituted);
        }
    }

    if consumed < args.len() {
        return None;
    }
    Some(normalized)
}

/// Match one partial specialization's pattern against concrete
/// arguments; success yields the parameter map for the partial's own
/// parameters.
pub fn match_partial_specialization(
    bindings: &BindingArena,
    partial: BindingId,
    args: &[TemplateArgument],
) -> Option<ParameterMap> {
    let (parameters, patterns) = match &bindings.get(partial).kind {
        BindingKind::PartialSpecialization {
            parameters,
            arguments,
            ..
        } => (parameters.clone(), arguments.clone()),
        _ => return None,
    };
    if patterns.len() != args.len() {
        return None;
    }
    let mut map = ParameterMap::new();
    for (pattern, arg) in patterns.iter().zip(args) {
        if !deduce_argument(bindings, pattern, arg, &mut map) {
            return None;
        }
    }
    // every parameter of the partial must be deduced by the match
    if parameters.iter().any(|p| map.lookup(*p).is_none()) {
        return None;
    }
    Some(map)
}

/// Partial ordering of partial specializations: `a` is at least as
/// specialized as `b` when `b`'s pattern can deduce from `a`'s pattern
/// used as an argument list.
pub fn at_least_as_specialized(bindings: &BindingArena, a: BindingId, b: BindingId) -> bool {
    let a_args = match &bindings.get(a).kind {
        BindingKind::PartialSpecialization { arguments, .. } => arguments.clone(),
        _ => return false,
    };
    let b_patterns = match &bindings.get(b).kind {
        BindingKind::PartialSpecialization { arguments, .. } => arguments.clone(),
        _ => return false,
    };
    if a_args.len() != b_patterns.len() {
        return false;
    }
    let mut map = ParameterMap::new();
    b_patterns
        .iter()
        .zip(&a_args)
        .all(|(pattern, arg)| deduce_argument(bindings, pattern, arg, &mut map))
}

/// What the partial-specialization selection decided
pub enum PartialSelection {
    /// No partial matches; instantiate the primary
    Primary,
    /// The single most specialized matching partial, with its map
    Partial(BindingId, ParameterMap),
    /// More than one incomparable maximal match
    Ambiguous(Vec<BindingId>),
}

/// Select the most specialized partial specialization matching `args`,
/// if any.
pub fn select_partial_specialization(
    bindings: &BindingArena,
    partials: &[BindingId],
    args: &[TemplateArgument],
) -> PartialSelection {
    let mut matching: Vec<(BindingId, ParameterMap)> = Vec::new();
    for partial in partials {
        if let Some(map) = match_partial_specialization(bindings, *partial, args) {
            matching.push((*partial, map));
        }
    }
    if matching.is_empty() {
        return PartialSelection::Primary;
    }
    // maximal elements of the "at least as specialized" partial order
    let mut maximal: Vec<(BindingId, ParameterMap)> = Vec::new();
    'outer: for (candidate, map) in &matching {
        for (other, _) in &matching {
            if candidate == other {
                continue;
            }
            let other_beats = at_least_as_specialized(bindings, *other, *candidate);
            let candidate_beats = at_least_as_specialized(bindings, *candidate, *other);
            if other_beats && !candidate_beats {
                continue 'outer;
            }
        }
        maximal.push((*candidate, map.clone()));
    }
    match maximal.len() {
        0 => PartialSelection::Primary,
        1 => {
            let (partial, map) = maximal.into_iter().next().expect("one maximal element");
            PartialSelection::Partial(partial, map)
        }
        _ => PartialSelection::Ambiguous(maximal.into_iter().map(|(p, _)| p).collect()),
    }
}

/// Instantiate a class template for a concrete argument list.
///
/// Structurally equal argument lists return the identical instance
/// binding (at-most-one invariant, enforced by the cache). Failures,
/// meaning bad arguments, ambiguous partial selection or depth overflow, return
/// a problem binding and record a diagnostic; the caller always gets a
/// binding.
pub fn instantiate_class_template(
    ctx: &mut AnalysisContext,
    template: BindingId,
    args: &[TemplateArgument],
    depth: usize,
) -> BindingId {
    let template_name = ctx.bindings.name(template).to_string();
    if depth > MAX_INSTANTIATION_DEPTH {
        ctx.report(SemanticError::InstantiationDepthExceeded {
            max_depth: MAX_INSTANTIATION_DEPTH,
            span: None,
        });
        return ctx.bindings.problem(
            DiagnosticCode::InstantiationDepthExceeded,
            template_name,
        );
    }

    let (parameters, partials) = match &ctx.bindings.get(template).kind {
        BindingKind::ClassTemplate {
            parameters,
            partial_specializations,
            ..
        } => (parameters.clone(), partial_specializations.clone()),
        _ => {
            return ctx
                .bindings
                .problem(DiagnosticCode::BadTemplateArguments, template_name)
        }
    };

    let normalized = match normalize_arguments(&ctx.bindings, &parameters, args) {
        Some(n) => n,
        None => {
            return ctx
                .bindings
                .problem(DiagnosticCode::BadTemplateArguments, template_name)
        }
    };

    if let Some(existing) = ctx.instances.get_instance(template, &normalized) {
        return existing;
    }

    let (specialized, map) = match select_partial_specialization(&ctx.bindings, &partials, &normalized)
    {
        PartialSelection::Primary => {
            let mut map = ParameterMap::new();
            for (param, arg) in parameters.iter().zip(&normalized) {
                map.insert(*param, arg.clone());
            }
            (template, map)
        }
        PartialSelection::Partial(partial, map) => (partial, map),
        PartialSelection::Ambiguous(_) => {
            ctx.report(SemanticError::AmbiguousInstantiation {
                template_name: template_name.clone(),
                span: None,
            });
            return ctx
                .bindings
                .problem(DiagnosticCode::AmbiguousInstantiation, template_name);
        }
    };

    // record dependencies on every template instance mentioned in the
    // arguments, so recursive chains are visible as graph cycles
    for arg in &normalized {
        record_argument_dependencies(ctx, template, arg);
    }

    let instance = ctx.bindings.alloc(
        template_name,
        BindingKind::Instance {
            specialized,
            map,
            arguments: normalized.clone(),
            member_scope: None,
        },
    );
    let template_scope = ctx.bindings.get(template).scope;
    ctx.bindings.get_mut(instance).scope = template_scope;
    ctx.instances.add_instance(template, &normalized, instance);
    instance
}

fn record_argument_dependencies(
    ctx: &mut AnalysisContext,
    template: BindingId,
    arg: &TemplateArgument,
) {
    match arg {
        TemplateArgument::Type(ty) => record_type_dependencies(ctx, template, ty),
        TemplateArgument::Pack(parts) => {
            for part in parts {
                record_argument_dependencies(ctx, template, part);
            }
        }
        TemplateArgument::NonType { .. } => {}
    }
}

fn record_type_dependencies(ctx: &mut AnalysisContext, template: BindingId, ty: &CxxType) {
    if let CxxType::Named { binding } = ty {
        if let BindingKind::Instance { specialized, .. } = &ctx.bindings.get(*binding).kind {
            let target = *specialized;
            ctx.graph.add_dependency(template, target);
        }
    }
}

/// Instantiate a function template against a deduced parameter map,
/// producing (and caching) the instance binding with the substituted
/// function type.
pub fn instantiate_function_template(
    ctx: &mut AnalysisContext,
    template: BindingId,
    arguments: Vec<TemplateArgument>,
    map: ParameterMap,
) -> BindingId {
    if let Some(existing) = ctx.instances.get_instance(template, &arguments) {
        return existing;
    }
    let name = ctx.bindings.name(template).to_string();
    if !matches!(
        ctx.bindings.get(template).kind,
        BindingKind::FunctionTemplate { .. }
    ) {
        return ctx
            .bindings
            .problem(DiagnosticCode::BadTemplateArguments, name);
    }
    let instance = ctx.bindings.alloc(
        name,
        BindingKind::Instance {
            specialized: template,
            map,
            arguments: arguments.clone(),
            member_scope: None,
        },
    );
    let template_scope = ctx.bindings.get(template).scope;
    ctx.bindings.get_mut(instance).scope = template_scope;
    ctx.instances.add_instance(template, &arguments, instance);
    instance
}

/// The substituted function type of a function-template instance.
pub fn instance_function_type(bindings: &BindingArena, instance: BindingId) -> Option<CxxType> {
    match &bindings.get(instance).kind {
        BindingKind::Instance {
            specialized, map, ..
        } => {
            let ty = match &bindings.get(*specialized).kind {
                BindingKind::FunctionTemplate { ty, .. } => ty.clone(),
                BindingKind::VariableTemplate { ty, .. } => ty.clone(),
                _ => return None,
            };
            Some(substitute_into_type(bindings, &ty, map))
        }
        _ => None,
    }
}

/// Substitute a parameter map throughout `ty` in context: template
/// parameters are replaced, and unknown members whose owner becomes a
/// concrete class are resolved against that class's member scope.
pub fn instantiate_type(
    ctx: &mut AnalysisContext,
    ty: &CxxType,
    map: &ParameterMap,
    depth: usize,
) -> CxxType {
    if depth > MAX_INSTANTIATION_DEPTH {
        return CxxType::problem(
            DiagnosticCode::InstantiationDepthExceeded,
            "type substitution too deep",
        );
    }
    let substituted = substitute_into_type(&ctx.bindings, ty, map);
    resolve_unknowns(ctx, substituted, depth)
}

fn resolve_unknowns(ctx: &mut AnalysisContext, ty: CxxType, depth: usize) -> CxxType {
    match ty {
        CxxType::Unknown { owner, name } => {
            let owner = resolve_unknowns(ctx, *owner, depth + 1);
            if let CxxType::Named { binding } = &owner {
                if let Some(scope) = ctx.bindings.member_scope(*binding) {
                    let candidates = ctx.scopes.lookup_local(scope, &name);
                    if let Some(first) = candidates.first() {
                        if let Some(resolved) = ctx.bindings.type_of(*first) {
                            return resolved;
                        }
                    }
                }
            }
            CxxType::Unknown {
                owner: Box::new(owner),
                name,
            }
        }
        other => other,
    }
}

/// Create a member specialization: a thin projection of `member` into
/// the context of `owner_instance`, with the substituted type supplied
/// directly and every owner-dependent property delegated to the
/// original.
pub fn specialize_member(
    ctx: &mut AnalysisContext,
    member: BindingId,
    map: ParameterMap,
) -> BindingId {
    let name = ctx.bindings.name(member).to_string();
    let ty = ctx
        .bindings
        .type_of(member)
        .map(|ty| substitute_into_type(&ctx.bindings, &ty, &map));
    let specialization = ctx.bindings.alloc(
        name,
        BindingKind::Specialization {
            specialized: member,
            map,
            ty,
        },
    );
    let member_scope = ctx.bindings.get(member).scope;
    ctx.bindings.get_mut(specialization).scope = member_scope;
    specialization
}
