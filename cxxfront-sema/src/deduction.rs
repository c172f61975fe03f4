//! Template argument deduction
//!
//! Greedy left-to-right unification of parameter patterns against
//! argument types. The rules that matter most in practice:
//!
//! - a trailing function parameter pack consumes every remaining call
//!   argument, binding them as one pack-typed argument; a non-trailing
//!   pack is a non-deduced context and is skipped;
//! - failure never escalates: a candidate that fails deduction is simply
//!   disqualified from its overload set;
//! - default template arguments are substituted only after positional
//!   deduction is exhausted, strictly left to right, each substituted
//!   parameter visible to the defaults after it.
//!
//! Reference and cv handling follows the function-call deduction rules:
//! an rvalue reference to a bare template parameter bound to an lvalue
//! deduces against "lvalue reference to A", otherwise references are
//! stripped from the argument, and a parameter at least as cv-qualified
//! as its argument deduces with the shared qualification removed.

use crate::bindings::{BindingArena, BindingId, BindingKind, ParameterMap, TemplateArgument};
use crate::types::{cv_qualifiers_of, strip, strip_nested, CxxType, ValueCategory};
use cxxfront_ast::CvQualifiers;
use indexmap::IndexMap;

/// The result of a successful deduction
#[derive(Debug, Clone)]
pub struct DeductionOutcome {
    /// One argument per template parameter, in parameter order
    pub arguments: Vec<TemplateArgument>,
    pub map: ParameterMap,
}

/// Deduce arguments for a function template call.
///
/// Returns `None` when deduction fails; the caller treats that as "this
/// candidate is not viable", nothing more.
pub fn deduce_for_function_call(
    bindings: &BindingArena,
    template_params: &[BindingId],
    explicit_args: &[TemplateArgument],
    function_params: &[CxxType],
    call_args: &[(CxxType, ValueCategory)],
) -> Option<DeductionOutcome> {
    let mut map = ParameterMap::new();
    if !add_explicit_arguments(bindings, template_params, explicit_args, &mut map) {
        return None;
    }
    if !deduce_from_function_args(bindings, template_params, function_params, call_args, &mut map)
    {
        return None;
    }
    finish(bindings, template_params, map)
}

/// Install explicitly given arguments positionally; surplus explicit
/// arguments flow into a trailing parameter pack.
fn add_explicit_arguments(
    bindings: &BindingArena,
    template_params: &[BindingId],
    explicit_args: &[TemplateArgument],
    map: &mut ParameterMap,
) -> bool {
    let mut pack_overflow: Vec<TemplateArgument> = Vec::new();
    for (i, arg) in explicit_args.iter().enumerate() {
        if i < template_params.len() {
            let param = template_params[i];
            if param_is_pack(bindings, param) && i == template_params.len() - 1 {
                pack_overflow.push(arg.clone());
            } else {
                map.insert(param, arg.clone());
            }
        } else {
            match template_params.last() {
                Some(last) if param_is_pack(bindings, *last) => pack_overflow.push(arg.clone()),
                _ => return false,
            }
        }
    }
    if !pack_overflow.is_empty() {
        let last = *template_params.last().expect("pack overflow implies a parameter");
        map.insert(last, TemplateArgument::Pack(pack_overflow));
    }
    true
}

fn deduce_from_function_args(
    bindings: &BindingArena,
    template_params: &[BindingId],
    function_params: &[CxxType],
    call_args: &[(CxxType, ValueCategory)],
    map: &mut ParameterMap,
) -> bool {
    let param_count = function_params.len();
    let mut pack_pattern: Option<&CxxType> = None;
    // per-parameter accumulators while a pack is being consumed
    let mut pack_parts: IndexMap<BindingId, Vec<TemplateArgument>> = IndexMap::new();

    for (j, (arg, category)) in call_args.iter().enumerate() {
        let par = if let Some(pattern) = pack_pattern {
            pattern
        } else if j < param_count {
            match &function_params[j] {
                CxxType::Pack { pattern } => {
                    if j != param_count - 1 {
                        // non-trailing pack: non-deduced context
                        continue;
                    }
                    let pattern: &CxxType = pattern;
                    pack_pattern = Some(pattern);
                    pattern
                }
                other => other,
            }
        } else {
            break;
        };

        if !par.is_dependent() {
            continue;
        }

        if pack_pattern.is_some() {
            // deduce into a fresh map, then fold into the accumulators
            let mut per_arg = map.clone();
            if !deduce_from_function_arg(bindings, par, arg, *category, &mut per_arg) {
                return false;
            }
            for (param, deduced) in per_arg.iter() {
                if map.lookup(*param).is_some() {
                    continue;
                }
                pack_parts.entry(*param).or_default().push(deduced.clone());
            }
        } else if !deduce_from_function_arg(bindings, par, arg, *category, map) {
            return false;
        }
    }

    for (param, parts) in pack_parts {
        map.insert(param, TemplateArgument::Pack(parts));
    }
    // a trailing pack that consumed nothing still deduces, as empty
    if let Some(last) = template_params.last() {
        if param_is_pack(bindings, *last) && map.lookup(*last).is_none() {
            let uses_pack = matches!(function_params.last(), Some(CxxType::Pack { .. }));
            if uses_pack {
                map.insert(*last, TemplateArgument::Pack(Vec::new()));
            }
        }
    }
    true
}

fn deduce_from_function_arg(
    bindings: &BindingArena,
    par: &CxxType,
    arg: &CxxType,
    category: ValueCategory,
    map: &mut ParameterMap,
) -> bool {
    let mut par = strip_nested(par, strip::TDEF).clone();
    let mut arg = strip_nested(arg, strip::TDEF).clone();

    if let CxxType::Reference { inner, rvalue } = &par {
        // forwarding reference bound to an lvalue deduces T as an
        // lvalue reference
        let inner_is_bare_param =
            matches!(strip_nested(inner, strip::TDEF), CxxType::TemplateParam { .. });
        if *rvalue && inner_is_bare_param && category == ValueCategory::LValue {
            let stripped = strip_nested(&arg, strip::REF | strip::TDEF).clone();
            arg = CxxType::reference_to(stripped, false);
        } else {
            arg = strip_nested(&arg, strip::REF | strip::TDEF).clone();
        }
        par = strip_nested(inner, strip::TDEF).clone();
    } else {
        // by-value parameter: the argument decays
        arg = strip_nested(&arg, strip::REF | strip::TDEF).clone();
        arg = strip_cv_for_value(&arg);
    }

    from_type(bindings, &par, &arg, map)
}

fn strip_cv_for_value(ty: &CxxType) -> CxxType {
    match ty {
        CxxType::Qualifier { inner, .. } => (**inner).clone(),
        _ => ty.clone(),
    }
}

fn subtract_cv(arg_q: &CvQualifiers, par_q: &CvQualifiers) -> CvQualifiers {
    CvQualifiers {
        is_const: arg_q.is_const && !par_q.is_const,
        is_volatile: arg_q.is_volatile && !par_q.is_volatile,
    }
}

/// Unify a dependent parameter pattern against an argument type,
/// recording deduced template parameters in `map`. A parameter already
/// deduced must agree with the new deduction.
pub fn from_type(
    bindings: &BindingArena,
    par: &CxxType,
    arg: &CxxType,
    map: &mut ParameterMap,
) -> bool {
    let par = strip_nested(par, strip::TDEF);
    let arg = strip_nested(arg, strip::TDEF);

    match par {
        CxxType::TemplateParam { binding, .. } => {
            let deduced = TemplateArgument::Type(arg.clone());
            match map.lookup(*binding) {
                Some(existing) => existing.is_same_argument(&deduced),
                None => {
                    map.insert(*binding, deduced);
                    true
                }
            }
        }
        CxxType::Qualifier { qualifiers, inner } => {
            let arg_q = cv_qualifiers_of(arg);
            if !arg_q.is_at_least_as_qualified_as(qualifiers) {
                return false;
            }
            let remaining = subtract_cv(&arg_q, qualifiers);
            let bare = strip_nested(arg, strip::CV | strip::TDEF).clone();
            let arg_rest = CxxType::qualified(remaining, bare);
            from_type(bindings, inner, &arg_rest, map)
        }
        CxxType::Pointer { inner } => match arg {
            CxxType::Pointer { inner: arg_inner } => from_type(bindings, inner, arg_inner, map),
            _ => false,
        },
        CxxType::Reference { inner, rvalue } => match arg {
            CxxType::Reference {
                inner: arg_inner,
                rvalue: arg_rvalue,
            } => rvalue == arg_rvalue && from_type(bindings, inner, arg_inner, map),
            _ => false,
        },
        CxxType::PointerToMember { inner, member_of } => match arg {
            CxxType::PointerToMember {
                inner: arg_inner,
                member_of: arg_class,
            } => {
                from_type(bindings, inner, arg_inner, map)
                    && from_type(bindings, member_of, arg_class, map)
            }
            _ => false,
        },
        CxxType::Array { element, bound } => match arg {
            CxxType::Array {
                element: arg_element,
                bound: arg_bound,
            } => {
                if let (Some(b1), Some(b2)) = (bound, arg_bound) {
                    if b1 != b2 {
                        return false;
                    }
                }
                from_type(bindings, element, arg_element, map)
            }
            _ => false,
        },
        CxxType::Function {
            returns,
            parameters,
            variadic,
            ..
        } => match arg {
            CxxType::Function {
                returns: arg_returns,
                parameters: arg_parameters,
                variadic: arg_variadic,
                ..
            } => {
                variadic == arg_variadic
                    && parameters.len() == arg_parameters.len()
                    && from_type(bindings, returns, arg_returns, map)
                    && parameters
                        .iter()
                        .zip(arg_parameters)
                        .all(|(p, a)| from_type(bindings, p, a, map))
            }
            _ => false,
        },
        CxxType::Pack { pattern } => match arg {
            CxxType::Pack { pattern: arg_pattern } => {
                from_type(bindings, pattern, arg_pattern, map)
            }
            _ => from_type(bindings, pattern, arg, map),
        },
        CxxType::Named { binding } => {
            deduce_named(bindings, *binding, arg, map)
        }
        _ => par.is_same_type(arg),
    }
}

/// Deduce through class template instances: a pattern `S<T>` matches an
/// argument `S<int>` when both are instances of the same primary and
/// the argument lists deduce pairwise.
fn deduce_named(
    bindings: &BindingArena,
    par_binding: BindingId,
    arg: &CxxType,
    map: &mut ParameterMap,
) -> bool {
    let arg_binding = match arg {
        CxxType::Named { binding } => *binding,
        _ => return false,
    };
    if par_binding == arg_binding {
        return true;
    }
    let par_kind = &bindings.get(par_binding).kind;
    let arg_kind = &bindings.get(arg_binding).kind;
    if let (
        BindingKind::Instance {
            specialized: par_primary,
            arguments: par_args,
            ..
        },
        BindingKind::Instance {
            specialized: arg_primary,
            arguments: arg_args,
            ..
        },
    ) = (par_kind, arg_kind)
    {
        if par_primary != arg_primary || par_args.len() != arg_args.len() {
            return false;
        }
        return par_args
            .iter()
            .zip(arg_args)
            .all(|(p, a)| deduce_argument(bindings, p, a, map));
    }
    false
}

/// Deduce one template argument pattern against a concrete argument.
/// Used pairwise when matching partial specialization patterns.
pub fn deduce_argument(
    bindings: &BindingArena,
    pattern: &TemplateArgument,
    arg: &TemplateArgument,
    map: &mut ParameterMap,
) -> bool {
    match (pattern, arg) {
        (TemplateArgument::Type(p), TemplateArgument::Type(a)) => from_type(bindings, p, a, map),
        (TemplateArgument::NonType { value: v1, .. }, TemplateArgument::NonType { value: v2, .. }) => {
            v1 == v2
        }
        (TemplateArgument::Pack(ps), TemplateArgument::Pack(args)) => {
            ps.len() == args.len()
                && ps
                    .iter()
                    .zip(args)
                    .all(|(p, a)| deduce_argument(bindings, p, a, map))
        }
        _ => false,
    }
}

/// After positional deduction: substitute defaults left to right, check
/// that every parameter has an argument, and produce the final ordered
/// argument list.
fn finish(
    bindings: &BindingArena,
    template_params: &[BindingId],
    mut map: ParameterMap,
) -> Option<DeductionOutcome> {
    let mut arguments = Vec::with_capacity(template_params.len());
    for param in template_params {
        let deduced = map.lookup(*param).cloned();
        let arg = match deduced {
            Some(arg) => arg,
            None => {
                let default = default_of(bindings, *param)?;
                // defaults may reference earlier parameters; everything
                // deduced so far is visible
                let substituted = substitute_argument(bindings, &default, &map);
                map.insert(*param, substituted.clone());
                substituted
            }
        };
        arguments.push(arg);
    }
    Some(DeductionOutcome { arguments, map })
}

fn default_of(bindings: &BindingArena, param: BindingId) -> Option<TemplateArgument> {
    match &bindings.get(param).kind {
        BindingKind::TemplateParameter { default, is_pack, .. } => match default {
            Some(d) => Some(d.clone()),
            // an empty pack needs no default
            None if *is_pack => Some(TemplateArgument::Pack(Vec::new())),
            None => None,
        },
        _ => None,
    }
}

fn param_is_pack(bindings: &BindingArena, param: BindingId) -> bool {
    matches!(
        bindings.get(param).kind,
        BindingKind::TemplateParameter { is_pack: true, .. }
    )
}

/// Substitute already-bound parameters into an argument pattern.
pub fn substitute_argument(
    bindings: &BindingArena,
    pattern: &TemplateArgument,
    map: &ParameterMap,
) -> TemplateArgument {
    match pattern {
        TemplateArgument::Type(ty) => TemplateArgument::Type(substitute_into_type(bindings, ty, map)),
        TemplateArgument::NonType { .. } => pattern.clone(),
        TemplateArgument::Pack(parts) => TemplateArgument::Pack(
            parts
                .iter()
                .map(|p| substitute_argument(bindings, p, map))
                .collect(),
        ),
    }
}

/// Type-level substitution of bound parameters; parameters not in the
/// map stay dependent (partial substitution is legitimate).
pub fn substitute_into_type(
    bindings: &BindingArena,
    ty: &CxxType,
    map: &ParameterMap,
) -> CxxType {
    match ty {
        CxxType::TemplateParam { binding, .. } => match map.lookup(*binding) {
            Some(TemplateArgument::Type(t)) => t.clone(),
            Some(TemplateArgument::NonType { ty, .. }) => ty.clone(),
            Some(TemplateArgument::Pack(parts)) => {
                // a bare pack parameter in type position becomes a pack
                // of the substituted part types
                let mut first = None;
                for part in parts {
                    if let TemplateArgument::Type(t) = part {
                        first = Some(t.clone());
                        break;
                    }
                }
                match first {
                    Some(t) => CxxType::pack_of(t),
                    None => ty.clone(),
                }
            }
            None => ty.clone(),
        },
        CxxType::Qualifier { qualifiers, inner } => CxxType::qualified(
            *qualifiers,
            substitute_into_type(bindings, inner, map),
        ),
        CxxType::Pointer { inner } => {
            CxxType::pointer_to(substitute_into_type(bindings, inner, map))
        }
        CxxType::Reference { inner, rvalue } => {
            CxxType::reference_to(substitute_into_type(bindings, inner, map), *rvalue)
        }
        CxxType::PointerToMember { inner, member_of } => CxxType::PointerToMember {
            inner: Box::new(substitute_into_type(bindings, inner, map)),
            member_of: Box::new(substitute_into_type(bindings, member_of, map)),
        },
        CxxType::Array { element, bound } => {
            CxxType::array_of(substitute_into_type(bindings, element, map), *bound)
        }
        CxxType::Pack { pattern } => {
            CxxType::pack_of(substitute_into_type(bindings, pattern, map))
        }
        CxxType::Function {
            returns,
            parameters,
            variadic,
            qualifiers,
        } => CxxType::Function {
            returns: Box::new(substitute_into_type(bindings, returns, map)),
            parameters: parameters
                .iter()
                .map(|p| substitute_into_type(bindings, p, map))
                .collect(),
            variadic: *variadic,
            qualifiers: *qualifiers,
        },
        CxxType::Alias { name, aliased } => CxxType::Alias {
            name: name.clone(),
            aliased: Box::new(substitute_into_type(bindings, aliased, map)),
        },
        CxxType::Unknown { owner, name } => {
            let owner = substitute_into_type(bindings, owner, map);
            CxxType::Unknown {
                owner: Box::new(owner),
                name: name.clone(),
            }
        }
        CxxType::TypeTrait { op, operands } => CxxType::TypeTrait {
            op: *op,
            operands: operands
                .iter()
                .map(|t| substitute_into_type(bindings, t, map))
                .collect(),
        },
        CxxType::UnaryTransformation { operator, operand } => CxxType::UnaryTransformation {
            operator: *operator,
            operand: Box::new(substitute_into_type(bindings, operand, map)),
        },
        _ => ty.clone(),
    }
}
