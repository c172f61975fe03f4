//! End-to-end name resolution: problem sentinels, typedef
//! transparency, pending upgrades, member access

use super::{analyze_tu, sp};
use crate::bindings::{BindingKind, BindingId};
use crate::error::DiagnosticCode;
use crate::semantics::{
    expression_type, lookup_two_phase, resolve_name_str, upgrade_pending, Resolution,
};
use crate::types::CxxType;
use cxxfront_ast::{ChildRole, SimpleTypeKeyword};
use pretty_assertions::assert_eq;

#[test]
fn undeclared_identifier_yields_problem_binding_and_problem_type() {
    let mut expr_node = None;
    let mut ctx = analyze_tu(|arena, root| {
        let name = arena.identifier("undeclared_name", sp(0, 15));
        let expr = arena.id_expression(name, sp(0, 15));
        let stmt = arena.expression_statement(expr, sp(0, 16));
        let body = arena.compound_statement(vec![stmt], sp(0, 20));
        let ret = arena.simple_decl_specifier(SimpleTypeKeyword::Void, sp(0, 4));
        let fname = arena.identifier("f", sp(0, 1));
        let declarator =
            arena.declarator_with(cxxfront_ast::DeclaratorInfo::function(false), fname, sp(0, 2));
        let def = arena.function_definition(ret, declarator, body, sp(0, 20));
        arena.attach(root, ChildRole::Member, def);
        expr_node = Some(expr);
    });
    let expr = expr_node.unwrap();
    // the name resolved to a problem binding during analysis
    let name_node = ctx.arena.child(expr, ChildRole::Name).unwrap();
    let binding = ctx.resolutions.get(&name_node).copied().expect("a binding, never null");
    match &ctx.bindings.get(binding).kind {
        BindingKind::Problem { code, text } => {
            assert_eq!(*code, DiagnosticCode::NameNotFound);
            assert_eq!(text, "undeclared_name");
        }
        other => panic!("expected problem binding, got {other:?}"),
    }
    // and the expression's type query answers with a problem type
    let ty = expression_type(&mut ctx, expr);
    assert!(ty.is_problem());
    // a diagnostic was recorded; analysis of the rest continued
    assert!(!ctx.diagnostics.is_empty());
}

#[test]
fn variable_reference_resolves_to_its_declared_type() {
    let mut expr_node = None;
    let mut ctx = analyze_tu(|arena, root| {
        let spec = arena.simple_decl_specifier(SimpleTypeKeyword::Double, sp(0, 6));
        let name = arena.identifier("d", sp(7, 8));
        let declarator = arena.declarator(name, sp(7, 8));
        let decl = arena.simple_declaration(spec, vec![declarator], sp(0, 9));
        arena.attach(root, ChildRole::Member, decl);

        let use_name = arena.identifier("d", sp(20, 21));
        let expr = arena.id_expression(use_name, sp(20, 21));
        let stmt = arena.expression_statement(expr, sp(20, 22));
        let body = arena.compound_statement(vec![stmt], sp(15, 25));
        let ret = arena.simple_decl_specifier(SimpleTypeKeyword::Void, sp(10, 14));
        let fname = arena.identifier("f", sp(15, 16));
        let fdeclarator =
            arena.declarator_with(cxxfront_ast::DeclaratorInfo::function(false), fname, sp(15, 17));
        let def = arena.function_definition(ret, fdeclarator, body, sp(10, 25));
        arena.attach(root, ChildRole::Member, def);
        expr_node = Some(expr);
    });
    let ty = expression_type(&mut ctx, expr_node.unwrap());
    assert!(ty.is_same_type(&CxxType::double()));
}

#[test]
fn typedef_is_transparent_to_structural_equality() {
    let mut ctx = analyze_tu(|arena, root| {
        // typedef int word; word w;
        let mut spec_payload = cxxfront_ast::DeclSpecifier::simple(SimpleTypeKeyword::Int);
        spec_payload.is_typedef = true;
        let spec = arena.decl_specifier(spec_payload, sp(0, 11));
        let name = arena.identifier("word", sp(12, 16));
        let declarator = arena.declarator(name, sp(12, 16));
        let typedef_decl = arena.simple_declaration(spec, vec![declarator], sp(0, 17));
        arena.attach(root, ChildRole::Member, typedef_decl);

        let use_name = arena.identifier("word", sp(20, 24));
        let use_spec = arena.named_decl_specifier(use_name, sp(20, 24));
        let w = arena.identifier("w", sp(25, 26));
        let w_declarator = arena.declarator(w, sp(25, 26));
        let var_decl = arena.simple_declaration(use_spec, vec![w_declarator], sp(20, 27));
        arena.attach(root, ChildRole::Member, var_decl);
    });
    let global = ctx.global_scope();
    let w = resolve_name_str(&mut ctx, global, "w").expect("w resolves");
    let ty = ctx.bindings.type_of(w).expect("declared type");
    // alias-transparent in both directions
    assert!(ty.is_same_type(&CxxType::int()));
    assert!(CxxType::int().is_same_type(&ty));
}

#[test]
fn two_phase_lookup_upgrades_through_the_worklist() {
    let mut ctx = analyze_tu(|_, _| {});
    let global = ctx.global_scope();
    let probe = ctx.arena.identifier("later", sp(5, 10));

    // phase one: the name is not there yet
    let resolution = lookup_two_phase(&mut ctx, global, "later", probe);
    let pending_index = match resolution {
        Resolution::Pending(index) => index,
        Resolution::Resolved(_) => panic!("nothing should resolve yet"),
    };
    assert_eq!(pending_index, 0);

    // the declaration shows up (forward reference scenario)
    let binding = ctx.bindings.alloc(
        "later",
        BindingKind::Variable {
            ty: CxxType::int(),
            is_static: false,
        },
    );
    crate::semantics::declare(&mut ctx, global, "later", binding);

    // phase two: the worklist upgrades the pending entry
    upgrade_pending(&mut ctx);
    assert_eq!(ctx.resolutions.get(&probe).copied(), Some(binding));
    assert!(ctx.pending.is_empty());
}

#[test]
fn pending_entries_that_never_resolve_become_problems() {
    let mut ctx = analyze_tu(|_, _| {});
    let global = ctx.global_scope();
    let probe = ctx.arena.identifier("never", sp(0, 5));
    lookup_two_phase(&mut ctx, global, "never", probe);
    upgrade_pending(&mut ctx);
    let binding = ctx.resolutions.get(&probe).copied().expect("problem stand-in");
    assert!(ctx.bindings.get(binding).is_problem());
    assert!(!ctx.diagnostics.is_empty());
}

#[test]
fn field_reference_resolves_through_the_class_scope() {
    let mut expr_node = None;
    let mut ctx = analyze_tu(|arena, root| {
        // struct S { int field; }; S s; (use) s.field
        let sname = arena.identifier("S", sp(7, 8));
        let class_spec = arena.class_specifier(cxxfront_ast::ClassKey::Struct, sname, sp(0, 30));
        let fspec = arena.simple_decl_specifier(SimpleTypeKeyword::Int, sp(11, 14));
        let fname = arena.identifier("field", sp(15, 20));
        let fdeclarator = arena.declarator(fname, sp(15, 20));
        let fdecl = arena.simple_declaration(fspec, vec![fdeclarator], sp(11, 21));
        arena.attach(class_spec, ChildRole::Member, fdecl);
        let class_decl = arena.simple_declaration(class_spec, vec![], sp(0, 31));
        arena.attach(root, ChildRole::Member, class_decl);

        let use_s = arena.identifier("S", sp(40, 41));
        let s_spec = arena.named_decl_specifier(use_s, sp(40, 41));
        let s = arena.identifier("s", sp(42, 43));
        let s_declarator = arena.declarator(s, sp(42, 43));
        let s_decl = arena.simple_declaration(s_spec, vec![s_declarator], sp(40, 44));
        arena.attach(root, ChildRole::Member, s_decl);

        let owner_name = arena.identifier("s", sp(50, 51));
        let owner = arena.id_expression(owner_name, sp(50, 51));
        let member = arena.identifier("field", sp(52, 57));
        let access = arena.alloc(
            cxxfront_ast::NodeKind::Expression(cxxfront_ast::ExpressionKind::FieldReference {
                is_arrow: false,
            }),
            sp(50, 57),
        );
        arena.attach(access, ChildRole::Owner, owner);
        arena.attach(access, ChildRole::MemberName, member);
        let stmt = arena.expression_statement(access, sp(50, 58));
        let body = arena.compound_statement(vec![stmt], sp(45, 60));
        let ret = arena.simple_decl_specifier(SimpleTypeKeyword::Void, sp(45, 49));
        let gname = arena.identifier("g", sp(45, 46));
        let gdeclarator =
            arena.declarator_with(cxxfront_ast::DeclaratorInfo::function(false), gname, sp(45, 47));
        let def = arena.function_definition(ret, gdeclarator, body, sp(45, 60));
        arena.attach(root, ChildRole::Member, def);
        expr_node = Some(access);
    });
    let ty = expression_type(&mut ctx, expr_node.unwrap());
    assert!(ty.is_same_type(&CxxType::int()));
}

#[test]
fn owner_walks_the_scope_chain_to_the_enclosing_entity() {
    let mut ctx = analyze_tu(|arena, root| {
        // struct Owner { int member; };
        let name = arena.identifier("Owner", sp(7, 12));
        let class_spec = arena.class_specifier(cxxfront_ast::ClassKey::Struct, name, sp(0, 30));
        let mspec = arena.simple_decl_specifier(cxxfront_ast::SimpleTypeKeyword::Int, sp(15, 18));
        let mname = arena.identifier("member", sp(19, 25));
        let mdeclarator = arena.declarator(mname, sp(19, 25));
        let mdecl = arena.simple_declaration(mspec, vec![mdeclarator], sp(15, 26));
        arena.attach(class_spec, ChildRole::Member, mdecl);
        let decl = arena.simple_declaration(class_spec, vec![], sp(0, 31));
        arena.attach(root, ChildRole::Member, decl);
    });
    let global = ctx.global_scope();
    let class = resolve_name_str(&mut ctx, global, "Owner").expect("class resolves");
    let member_scope = ctx.bindings.member_scope(class).expect("class has a scope");
    crate::semantics::ensure_populated(&mut ctx, member_scope);
    let member = ctx.scopes.lookup_local(member_scope, "member")[0];
    assert_eq!(ctx.owner_of(member), Some(class));
    // the member's lookup scope is its lexical (class) scope
    assert_eq!(ctx.lookup_scope_of(member), Some(member_scope));
}

#[test]
fn unknown_bindings_synthesize_a_deferred_lookup_scope() {
    let mut ctx = analyze_tu(|_, _| {});
    let param = ctx.bindings.alloc(
        "T",
        BindingKind::TemplateParameter {
            kind: crate::bindings::TemplateParamKind::Type,
            position: 0,
            is_pack: false,
            default: None,
        },
    );
    let owner = crate::types::CxxType::TemplateParam {
        binding: param,
        position: 0,
    };
    let unknown = ctx
        .bindings
        .alloc("value_type", BindingKind::UnknownMember { owner });
    let scope = ctx
        .lookup_scope_of(unknown)
        .expect("deferred member chains need a scope to hang lookups on");
    assert_eq!(ctx.scopes.kind(scope), crate::scope::ScopeKind::Unknown);
    // unknown scopes never populate from source, so further member
    // lookups simply find nothing rather than running a populate pass
    assert!(ctx.scopes.get(scope).is_populated());
}

#[test]
fn every_binding_is_reachable_or_synthesized_never_dangling() {
    let ctx = analyze_tu(|arena, root| {
        let spec = arena.simple_decl_specifier(SimpleTypeKeyword::Int, sp(0, 3));
        let name = arena.identifier("x", sp(4, 5));
        let declarator = arena.declarator(name, sp(4, 5));
        let decl = arena.simple_declaration(spec, vec![declarator], sp(0, 6));
        arena.attach(root, ChildRole::Member, decl);
    });
    for index in 0..ctx.bindings.len() as u32 {
        let binding = ctx.bindings.get(BindingId(index));
        // declared bindings know their scope; synthesized ones opt out
        if binding.has_declarations() {
            assert!(binding.scope.is_some(), "{} has no scope", binding.name);
        }
    }
}
