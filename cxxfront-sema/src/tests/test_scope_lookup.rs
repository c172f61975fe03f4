//! Scope population and lookup behavior over real trees

use super::{analyze_tu, sp};
use crate::bindings::BindingKind;
use crate::scope::ScopeKind;
use crate::semantics::{ensure_populated, resolve_in_scope, resolve_name_str};
use cxxfront_ast::{ChildRole, NodeKind, SimpleTypeKeyword, StatementKind};
use pretty_assertions::assert_eq;

#[test]
fn global_declarations_are_visible_in_insertion_order() {
    let mut ctx = analyze_tu(|arena, root| {
        for (i, name) in ["a", "b"].iter().enumerate() {
            let spec = arena.simple_decl_specifier(SimpleTypeKeyword::Int, sp(i * 10, i * 10 + 3));
            let id = arena.identifier(name, sp(i * 10 + 4, i * 10 + 5));
            let declarator = arena.declarator(id, sp(i * 10 + 4, i * 10 + 5));
            let decl = arena.simple_declaration(spec, vec![declarator], sp(i * 10, i * 10 + 6));
            arena.attach(root, ChildRole::Member, decl);
        }
    });
    let global = ctx.global_scope();
    let a = resolve_name_str(&mut ctx, global, "a").expect("a resolves");
    let b = resolve_name_str(&mut ctx, global, "b").expect("b resolves");
    assert!(matches!(
        ctx.bindings.get(a).kind,
        BindingKind::Variable { .. }
    ));
    assert!(a < b, "bindings are created in source order");
}

#[test]
fn function_overloads_keep_insertion_order() {
    let mut ctx = analyze_tu(|arena, root| {
        // void f(int); void f(double);
        for (i, keyword) in [SimpleTypeKeyword::Int, SimpleTypeKeyword::Double]
            .iter()
            .enumerate()
        {
            let span = sp(i * 20, i * 20 + 15);
            let ret = arena.simple_decl_specifier(SimpleTypeKeyword::Void, span);
            let name = arena.identifier("f", span);
            let declarator = arena.declarator_with(
                cxxfront_ast::DeclaratorInfo::function(false),
                name,
                span,
            );
            let param_spec = arena.simple_decl_specifier(*keyword, span);
            let param_name = arena.identifier("x", span);
            let param_declarator = arena.declarator(param_name, span);
            let parameter = arena.parameter_declaration(param_spec, param_declarator, span);
            arena.attach(declarator, ChildRole::Parameter, parameter);
            let decl = arena.simple_declaration(ret, vec![declarator], span);
            arena.attach(root, ChildRole::Member, decl);
        }
    });
    let global = ctx.global_scope();
    let candidates = resolve_in_scope(&mut ctx, global, "f", false);
    assert_eq!(candidates.len(), 2);
    assert!(candidates[0] < candidates[1]);
}

#[test]
fn block_scope_takes_its_display_name_from_the_function() {
    let mut ctx = analyze_tu(|arena, root| {
        let ret = arena.simple_decl_specifier(SimpleTypeKeyword::Int, sp(0, 3));
        let name = arena.identifier("main", sp(4, 8));
        let declarator =
            arena.declarator_with(cxxfront_ast::DeclaratorInfo::function(false), name, sp(4, 10));
        let body = arena.compound_statement(vec![], sp(11, 20));
        let def = arena.function_definition(ret, declarator, body, sp(0, 20));
        arena.attach(root, ChildRole::Member, def);
    });
    // find the block scope built for the body
    let block = (0..ctx.scopes.len() as u32)
        .map(crate::scope::ScopeId)
        .find(|s| ctx.scopes.kind(*s) == ScopeKind::Block)
        .expect("body introduces a block scope");
    assert_eq!(ctx.scope_display_name(block), "main");
}

#[test]
fn lookup_walks_the_parent_chain_but_not_when_local_only() {
    let mut ctx = analyze_tu(|arena, root| {
        let spec = arena.simple_decl_specifier(SimpleTypeKeyword::Int, sp(0, 3));
        let id = arena.identifier("g", sp(4, 5));
        let declarator = arena.declarator(id, sp(4, 5));
        let decl = arena.simple_declaration(spec, vec![declarator], sp(0, 6));
        arena.attach(root, ChildRole::Member, decl);

        let ret = arena.simple_decl_specifier(SimpleTypeKeyword::Void, sp(10, 14));
        let name = arena.identifier("f", sp(15, 16));
        let declarator =
            arena.declarator_with(cxxfront_ast::DeclaratorInfo::function(false), name, sp(15, 18));
        let body = arena.compound_statement(vec![], sp(19, 30));
        let def = arena.function_definition(ret, declarator, body, sp(10, 30));
        arena.attach(root, ChildRole::Member, def);
    });
    let block = (0..ctx.scopes.len() as u32)
        .map(crate::scope::ScopeId)
        .find(|s| ctx.scopes.kind(*s) == ScopeKind::Block)
        .expect("block scope");
    assert_eq!(resolve_in_scope(&mut ctx, block, "g", false).len(), 1);
    assert!(resolve_in_scope(&mut ctx, block, "g", true).is_empty());
}

#[test]
fn population_happens_once_and_lazily() {
    let mut ctx = analyze_tu(|arena, root| {
        // struct S { int field; };
        let name = arena.identifier("S", sp(7, 8));
        let class_spec = arena.class_specifier(cxxfront_ast::ClassKey::Struct, name, sp(0, 30));
        let field_spec = arena.simple_decl_specifier(SimpleTypeKeyword::Int, sp(11, 14));
        let field_name = arena.identifier("field", sp(15, 20));
        let field_declarator = arena.declarator(field_name, sp(15, 20));
        let field = arena.simple_declaration(field_spec, vec![field_declarator], sp(11, 21));
        arena.attach(class_spec, ChildRole::Member, field);
        let decl = arena.simple_declaration(class_spec, vec![], sp(0, 31));
        arena.attach(root, ChildRole::Member, decl);
    });
    let class_scope = (0..ctx.scopes.len() as u32)
        .map(crate::scope::ScopeId)
        .find(|s| ctx.scopes.kind(*s) == ScopeKind::Class)
        .expect("class scope");
    // the analysis itself does not force member population
    ensure_populated(&mut ctx, class_scope);
    assert!(ctx.scopes.get(class_scope).is_populated());
    let members = resolve_in_scope(&mut ctx, class_scope, "field", true);
    assert_eq!(members.len(), 1);
    assert!(matches!(
        ctx.bindings.get(members[0]).kind,
        BindingKind::Field { .. }
    ));
}

#[test]
fn unscoped_enumerators_are_visible_in_the_enclosing_scope() {
    let mut ctx = analyze_tu(|arena, root| {
        // enum Color { Red, Green = 5, Blue };
        let name = arena.identifier("Color", sp(5, 10));
        let enum_spec = arena.enum_specifier(false, name, sp(0, 40));
        let red = arena.identifier("Red", sp(13, 16));
        let red_enumerator = arena.enumerator(red, None, sp(13, 16));
        arena.attach(enum_spec, ChildRole::Enumerator, red_enumerator);
        let green = arena.identifier("Green", sp(18, 23));
        let five = arena.int_literal(5, sp(26, 27));
        let green_enumerator = arena.enumerator(green, Some(five), sp(18, 27));
        arena.attach(enum_spec, ChildRole::Enumerator, green_enumerator);
        let blue = arena.identifier("Blue", sp(29, 33));
        let blue_enumerator = arena.enumerator(blue, None, sp(29, 33));
        arena.attach(enum_spec, ChildRole::Enumerator, blue_enumerator);
        let decl = arena.simple_declaration(enum_spec, vec![], sp(0, 41));
        arena.attach(root, ChildRole::Member, decl);
    });
    let global = ctx.global_scope();
    let green = resolve_name_str(&mut ctx, global, "Green").expect("injected enumerator");
    match &ctx.bindings.get(green).kind {
        BindingKind::Enumerator { value } => assert_eq!(*value, Some(5)),
        other => panic!("expected enumerator, got {other:?}"),
    }
    let blue = resolve_name_str(&mut ctx, global, "Blue").expect("injected enumerator");
    match &ctx.bindings.get(blue).kind {
        BindingKind::Enumerator { value } => assert_eq!(*value, Some(6)),
        other => panic!("expected enumerator, got {other:?}"),
    }
}

#[test]
fn statements_inside_blocks_declare_into_the_block_scope() {
    let mut ctx = analyze_tu(|arena, root| {
        let ret = arena.simple_decl_specifier(SimpleTypeKeyword::Void, sp(0, 4));
        let fname = arena.identifier("f", sp(5, 6));
        let declarator =
            arena.declarator_with(cxxfront_ast::DeclaratorInfo::function(false), fname, sp(5, 8));
        let spec = arena.simple_decl_specifier(SimpleTypeKeyword::Int, sp(12, 15));
        let local_name = arena.identifier("local", sp(16, 21));
        let local_declarator = arena.declarator(local_name, sp(16, 21));
        let local_decl = arena.simple_declaration(spec, vec![local_declarator], sp(12, 22));
        let stmt = arena.declaration_statement(local_decl, sp(12, 22));
        let body = arena.compound_statement(vec![stmt], sp(10, 30));
        let def = arena.function_definition(ret, declarator, body, sp(0, 30));
        arena.attach(root, ChildRole::Member, def);
    });
    let block = (0..ctx.scopes.len() as u32)
        .map(crate::scope::ScopeId)
        .find(|s| {
            ctx.scopes.kind(*s) == ScopeKind::Block
                && matches!(
                    ctx.scopes
                        .owner_node(*s)
                        .map(|n| ctx.arena.kind(n).clone()),
                    Some(NodeKind::Statement(StatementKind::Compound))
                )
        })
        .expect("block scope");
    let local = resolve_in_scope(&mut ctx, block, "local", true);
    assert_eq!(local.len(), 1);
    // and it is not visible outside
    let global = ctx.global_scope();
    assert!(resolve_in_scope(&mut ctx, global, "local", true).is_empty());
}
