//! Ambiguity trials: determinism, retraction, fallback

use super::{analyze_tu, sp};
use crate::error::SemanticError;
use crate::scope::ScopeKind;
use crate::semantics::resolve_in_scope;
use cxxfront_ast::{
    AmbiguityKind, BinaryOperator, CastStyle, ChildRole, ExpressionKind, NodeArena, NodeId,
    NodeKind, SimpleTypeKeyword, StatementKind,
};
use pretty_assertions::assert_eq;

/// `(T)(x)` inside a function body: one cast alternative, one binary
/// alternative. `t_is_typedef` controls whether `T` is a typedef or a
/// plain variable at global scope.
fn cast_vs_binary_tu(arena: &mut NodeArena, root: NodeId, t_is_typedef: bool) -> NodeId {
    // T's declaration
    let mut spec_payload = cxxfront_ast::DeclSpecifier::simple(SimpleTypeKeyword::Int);
    spec_payload.is_typedef = t_is_typedef;
    let spec = arena.decl_specifier(spec_payload, sp(0, 3));
    let t_name = arena.identifier("T", sp(4, 5));
    let t_declarator = arena.declarator(t_name, sp(4, 5));
    let t_decl = arena.simple_declaration(spec, vec![t_declarator], sp(0, 6));
    arena.attach(root, ChildRole::Member, t_decl);

    // int x;
    let x_spec = arena.simple_decl_specifier(SimpleTypeKeyword::Int, sp(10, 13));
    let x_name = arena.identifier("x", sp(14, 15));
    let x_declarator = arena.declarator(x_name, sp(14, 15));
    let x_decl = arena.simple_declaration(x_spec, vec![x_declarator], sp(10, 16));
    arena.attach(root, ChildRole::Member, x_decl);

    // cast alternative: (T)(x)
    let cast_t = arena.identifier("T", sp(21, 22));
    let cast_spec = arena.named_decl_specifier(cast_t, sp(21, 22));
    let type_id = arena.type_id(cast_spec, None, sp(21, 22));
    let cast_x_name = arena.identifier("x", sp(24, 25));
    let cast_x = arena.id_expression(cast_x_name, sp(24, 25));
    let cast = arena.cast(CastStyle::CStyle, type_id, cast_x, sp(20, 26));

    // binary alternative: T * x
    let bin_t_name = arena.identifier("T", sp(21, 22));
    let bin_t = arena.id_expression(bin_t_name, sp(21, 22));
    let bin_x_name = arena.identifier("x", sp(24, 25));
    let bin_x = arena.id_expression(bin_x_name, sp(24, 25));
    let binary = arena.binary(BinaryOperator::Multiply, bin_t, bin_x, sp(20, 26));

    let ambiguous = arena.ambiguous(
        AmbiguityKind::CastVsBinaryExpression,
        vec![cast, binary],
        sp(20, 26),
    );
    let stmt = arena.expression_statement(ambiguous, sp(20, 27));
    let body = arena.compound_statement(vec![stmt], sp(19, 30));
    let ret = arena.simple_decl_specifier(SimpleTypeKeyword::Void, sp(17, 18));
    let fname = arena.identifier("f", sp(18, 19));
    let fdeclarator =
        arena.declarator_with(cxxfront_ast::DeclaratorInfo::function(false), fname, sp(18, 19));
    let def = arena.function_definition(ret, fdeclarator, body, sp(17, 30));
    arena.attach(root, ChildRole::Member, def);
    stmt
}

fn committed_child(ctx: &crate::context::AnalysisContext, stmt: NodeId) -> NodeId {
    ctx.arena
        .child(stmt, ChildRole::Operand)
        .expect("statement keeps its operand slot")
}

#[test]
fn cast_wins_when_the_name_is_a_type() {
    let mut stmt = None;
    let ctx = analyze_tu(|arena, root| {
        stmt = Some(cast_vs_binary_tu(arena, root, true));
    });
    let committed = committed_child(&ctx, stmt.unwrap());
    assert!(matches!(
        ctx.arena.kind(committed),
        NodeKind::Expression(ExpressionKind::Cast(_))
    ));
    // the ambiguous node is gone from the tree
    assert!(ctx.arena.collect_ambiguities(ctx.root()).is_empty());
}

#[test]
fn binary_wins_when_the_name_is_a_variable() {
    let mut stmt = None;
    let ctx = analyze_tu(|arena, root| {
        stmt = Some(cast_vs_binary_tu(arena, root, false));
    });
    let committed = committed_child(&ctx, stmt.unwrap());
    assert!(matches!(
        ctx.arena.kind(committed),
        NodeKind::Expression(ExpressionKind::Binary(BinaryOperator::Multiply))
    ));
}

#[test]
fn resolution_is_deterministic_across_runs() {
    for _ in 0..3 {
        let mut stmt = None;
        let ctx = analyze_tu(|arena, root| {
            stmt = Some(cast_vs_binary_tu(arena, root, true));
        });
        let committed = committed_child(&ctx, stmt.unwrap());
        assert!(matches!(
            ctx.arena.kind(committed),
            NodeKind::Expression(ExpressionKind::Cast(_))
        ));
    }
}

/// Declaration-vs-expression where the declaration alternative declares
/// `temp` but loses: no residue of `temp` may stay visible.
#[test]
fn losing_alternative_leaves_no_phantom_bindings() {
    let mut stmt = None;
    let mut ctx = analyze_tu(|arena, root| {
        // int z;  (makes the expression alternative valid)
        let z_spec = arena.simple_decl_specifier(SimpleTypeKeyword::Int, sp(0, 3));
        let z_name = arena.identifier("z", sp(4, 5));
        let z_declarator = arena.declarator(z_name, sp(4, 5));
        let z_decl = arena.simple_declaration(z_spec, vec![z_declarator], sp(0, 6));
        arena.attach(root, ChildRole::Member, z_decl);

        // declaration alternative: `Undeclared temp;` (invalid type)
        let u_name = arena.identifier("Undeclared", sp(20, 30));
        let u_spec = arena.named_decl_specifier(u_name, sp(20, 30));
        let temp_name = arena.identifier("temp", sp(31, 35));
        let temp_declarator = arena.declarator(temp_name, sp(31, 35));
        let decl = arena.simple_declaration(u_spec, vec![temp_declarator], sp(20, 36));
        let decl_stmt = arena.declaration_statement(decl, sp(20, 36));

        // expression alternative: `z`
        let use_z = arena.identifier("z", sp(20, 21));
        let z_expr = arena.id_expression(use_z, sp(20, 21));
        let expr_stmt = arena.expression_statement(z_expr, sp(20, 36));

        let ambiguous = arena.ambiguous(
            AmbiguityKind::DeclarationVsExpression,
            vec![decl_stmt, expr_stmt],
            sp(20, 36),
        );
        let body = arena.compound_statement(vec![ambiguous], sp(15, 40));
        let ret = arena.simple_decl_specifier(SimpleTypeKeyword::Void, sp(10, 14));
        let fname = arena.identifier("g", sp(15, 16));
        let fdeclarator = arena.declarator_with(
            cxxfront_ast::DeclaratorInfo::function(false),
            fname,
            sp(15, 16),
        );
        let def = arena.function_definition(ret, fdeclarator, body, sp(10, 40));
        arena.attach(root, ChildRole::Member, def);
        stmt = Some(ambiguous);
    });
    // the expression statement won
    let block = (0..ctx.scopes.len() as u32)
        .map(crate::scope::ScopeId)
        .find(|s| ctx.scopes.kind(*s) == ScopeKind::Block)
        .expect("block scope");
    let committed: Vec<NodeId> = ctx
        .arena
        .children_with_role(
            ctx.scopes.owner_node(block).unwrap(),
            ChildRole::Statement,
        );
    assert_eq!(committed.len(), 1);
    assert!(matches!(
        ctx.arena.kind(committed[0]),
        NodeKind::Statement(StatementKind::Expression)
    ));
    // no phantom `temp` anywhere up the chain
    assert!(resolve_in_scope(&mut ctx, block, "temp", false).is_empty());
}

/// The winning declaration's names are applied, and only they are.
#[test]
fn winning_declaration_is_applied_for_real() {
    let mut ctx = analyze_tu(|arena, root| {
        // typedef int T; then ambiguous `T y;` vs expression `T * y`
        // (y undeclared, so the expression is invalid)
        let mut spec_payload = cxxfront_ast::DeclSpecifier::simple(SimpleTypeKeyword::Int);
        spec_payload.is_typedef = true;
        let spec = arena.decl_specifier(spec_payload, sp(0, 3));
        let t_name = arena.identifier("T", sp(4, 5));
        let t_declarator = arena.declarator(t_name, sp(4, 5));
        let t_decl = arena.simple_declaration(spec, vec![t_declarator], sp(0, 6));
        arena.attach(root, ChildRole::Member, t_decl);

        let use_t = arena.identifier("T", sp(20, 21));
        let y_spec = arena.named_decl_specifier(use_t, sp(20, 21));
        let y_name = arena.identifier("y", sp(22, 23));
        let y_declarator = arena.declarator(y_name, sp(22, 23));
        let y_decl = arena.simple_declaration(y_spec, vec![y_declarator], sp(20, 24));
        let decl_stmt = arena.declaration_statement(y_decl, sp(20, 24));

        let bin_t_name = arena.identifier("T", sp(20, 21));
        let bin_t = arena.id_expression(bin_t_name, sp(20, 21));
        let bin_y_name = arena.identifier("y", sp(22, 23));
        let bin_y = arena.id_expression(bin_y_name, sp(22, 23));
        let binary = arena.binary(BinaryOperator::Multiply, bin_t, bin_y, sp(20, 24));
        let expr_stmt = arena.expression_statement(binary, sp(20, 24));

        let ambiguous = arena.ambiguous(
            AmbiguityKind::DeclarationVsExpression,
            vec![decl_stmt, expr_stmt],
            sp(20, 24),
        );
        let body = arena.compound_statement(vec![ambiguous], sp(15, 30));
        let ret = arena.simple_decl_specifier(SimpleTypeKeyword::Void, sp(10, 14));
        let fname = arena.identifier("h", sp(15, 16));
        let fdeclarator = arena.declarator_with(
            cxxfront_ast::DeclaratorInfo::function(false),
            fname,
            sp(15, 16),
        );
        let def = arena.function_definition(ret, fdeclarator, body, sp(10, 30));
        arena.attach(root, ChildRole::Member, def);
    });
    let block = (0..ctx.scopes.len() as u32)
        .map(crate::scope::ScopeId)
        .find(|s| ctx.scopes.kind(*s) == ScopeKind::Block)
        .expect("block scope");
    assert_eq!(resolve_in_scope(&mut ctx, block, "y", false).len(), 1);
}

#[test]
fn all_invalid_falls_back_to_first_with_a_diagnostic() {
    let mut ctx = analyze_tu(|arena, root| {
        // both alternatives reference undeclared names
        let u_name = arena.identifier("Nope", sp(20, 24));
        let u_spec = arena.named_decl_specifier(u_name, sp(20, 24));
        let d_name = arena.identifier("d", sp(25, 26));
        let d_declarator = arena.declarator(d_name, sp(25, 26));
        let decl = arena.simple_declaration(u_spec, vec![d_declarator], sp(20, 27));
        let decl_stmt = arena.declaration_statement(decl, sp(20, 27));

        let missing = arena.identifier("missing", sp(20, 27));
        let missing_expr = arena.id_expression(missing, sp(20, 27));
        let expr_stmt = arena.expression_statement(missing_expr, sp(20, 27));

        let ambiguous = arena.ambiguous(
            AmbiguityKind::DeclarationVsExpression,
            vec![decl_stmt, expr_stmt],
            sp(20, 27),
        );
        let body = arena.compound_statement(vec![ambiguous], sp(15, 30));
        let ret = arena.simple_decl_specifier(SimpleTypeKeyword::Void, sp(10, 14));
        let fname = arena.identifier("k", sp(15, 16));
        let fdeclarator = arena.declarator_with(
            cxxfront_ast::DeclaratorInfo::function(false),
            fname,
            sp(15, 16),
        );
        let def = arena.function_definition(ret, fdeclarator, body, sp(10, 30));
        arena.attach(root, ChildRole::Member, def);
    });
    // the syntactically preferred (first) alternative was kept
    let block = (0..ctx.scopes.len() as u32)
        .map(crate::scope::ScopeId)
        .find(|s| ctx.scopes.kind(*s) == ScopeKind::Block)
        .expect("block scope");
    let committed = ctx
        .arena
        .children_with_role(ctx.scopes.owner_node(block).unwrap(), ChildRole::Statement);
    assert!(matches!(
        ctx.arena.kind(committed[0]),
        NodeKind::Statement(StatementKind::Declaration)
    ));
    // and the failure is a diagnostic, not an abort
    assert!(ctx
        .diagnostics
        .iter()
        .any(|d| matches!(d, SemanticError::UnresolvableAmbiguity { .. })));
}

/// The delicate retraction case: a sibling binding declared before the
/// ambiguity must survive every trial untouched.
#[test]
fn retraction_leaves_siblings_intact() {
    let mut ctx = analyze_tu(|arena, root| {
        // int keep;
        let keep_spec = arena.simple_decl_specifier(SimpleTypeKeyword::Int, sp(0, 3));
        let keep_name = arena.identifier("keep", sp(4, 8));
        let keep_declarator = arena.declarator(keep_name, sp(4, 8));
        let keep_decl = arena.simple_declaration(keep_spec, vec![keep_declarator], sp(0, 9));
        arena.attach(root, ChildRole::Member, keep_decl);

        // type-constraint vs non-type argument, where the type-id
        // alternative is valid (int) and wins
        let int_spec = arena.simple_decl_specifier(SimpleTypeKeyword::Int, sp(20, 23));
        let type_alt = arena.type_id(int_spec, None, sp(20, 23));
        let keep_ref = arena.identifier("keep", sp(20, 24));
        let expr_alt = arena.id_expression(keep_ref, sp(20, 24));
        let ambiguous = arena.ambiguous(
            AmbiguityKind::TypeConstraintVsNonTypeArgument,
            vec![type_alt, expr_alt],
            sp(20, 24),
        );
        // park the ambiguous node in an expression statement at global
        // scope via a function body
        let stmt = arena.expression_statement(ambiguous, sp(20, 25));
        let body = arena.compound_statement(vec![stmt], sp(15, 30));
        let ret = arena.simple_decl_specifier(SimpleTypeKeyword::Void, sp(10, 14));
        let fname = arena.identifier("m", sp(15, 16));
        let fdeclarator = arena.declarator_with(
            cxxfront_ast::DeclaratorInfo::function(false),
            fname,
            sp(15, 16),
        );
        let def = arena.function_definition(ret, fdeclarator, body, sp(10, 30));
        arena.attach(root, ChildRole::Member, def);
    });
    let global = ctx.global_scope();
    assert_eq!(resolve_in_scope(&mut ctx, global, "keep", true).len(), 1);
    assert!(ctx.arena.collect_ambiguities(ctx.root()).is_empty());
}
