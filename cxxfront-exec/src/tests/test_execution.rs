//! Instantiation and evaluation of captured control-flow fragments

use crate::activation::ActivationRecord;
use crate::execution::{instantiate_for_instance, ConstexprExpr, Execution, MAX_EXECUTION_DEPTH};
use crate::value::Value;
use cxxfront_ast::BinaryOperator;
use cxxfront_sema::bindings::{BindingArena, BindingKind, ParameterMap, TemplateArgument, TemplateParamKind};
use cxxfront_sema::CxxType;
use pretty_assertions::assert_eq;
use std::collections::HashMap;

fn record_with(values: &[(&str, Value)]) -> ActivationRecord {
    let mut parameters = HashMap::new();
    for (name, value) in values {
        parameters.insert((*name).to_string(), value.clone());
    }
    ActivationRecord::new(parameters)
}

fn add(left: ConstexprExpr, right: ConstexprExpr) -> ConstexprExpr {
    ConstexprExpr::Binary {
        op: BinaryOperator::Add,
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[test]
fn return_evaluates_against_the_activation_record() {
    // return n + 1;
    let body = Execution::Return {
        value: Some(add(
            ConstexprExpr::ParameterRef("n".to_string()),
            ConstexprExpr::Literal(Value::Integer(1)),
        )),
    };
    let mut record = record_with(&[("n", Value::Integer(41))]);
    assert_eq!(
        body.execute_for_call(&mut record),
        Execution::fixed(Value::Integer(42))
    );
}

#[test]
fn evaluation_is_repeatable_and_side_effect_free() {
    // { int doubled = n + n; return doubled; }
    let body = Execution::Compound {
        statements: vec![
            Execution::Declarator {
                name: "doubled".to_string(),
                initializer: add(
                    ConstexprExpr::ParameterRef("n".to_string()),
                    ConstexprExpr::ParameterRef("n".to_string()),
                ),
            },
            Execution::Return {
                value: Some(ConstexprExpr::ParameterRef("doubled".to_string())),
            },
        ],
    };
    let mut record = record_with(&[("n", Value::Integer(10))]);
    let first = body.execute_for_call(&mut record);
    record.reset_locals();
    let second = body.execute_for_call(&mut record);
    assert_eq!(first, Execution::fixed(Value::Integer(20)));
    // speculative re-evaluation sees the identical result
    assert_eq!(first, second);
}

#[test]
fn constructor_chain_produces_an_aggregate() {
    let chain = Execution::ConstructorChain {
        initializers: vec![
            (
                "x".to_string(),
                Execution::Return {
                    value: Some(ConstexprExpr::ParameterRef("a".to_string())),
                },
            ),
            (
                "y".to_string(),
                Execution::Return {
                    value: Some(ConstexprExpr::Literal(Value::Integer(2))),
                },
            ),
        ],
    };
    let mut record = record_with(&[("a", Value::Integer(1))]);
    match chain.execute_for_call(&mut record) {
        Execution::Fixed { value } => {
            assert_eq!(value.member("x"), Some(&Value::Integer(1)));
            assert_eq!(value.member("y"), Some(&Value::Integer(2)));
        }
        other => panic!("expected aggregate, got {other:?}"),
    }
}

#[test]
fn loop_control_fragments_pass_through() {
    let mut record = record_with(&[]);
    assert_eq!(Execution::Break.execute_for_call(&mut record), Execution::Break);
    assert_eq!(
        Execution::Continue.execute_for_call(&mut record),
        Execution::Continue
    );
    assert_eq!(
        Execution::Default.execute_for_call(&mut record),
        Execution::Default
    );
}

#[test]
fn compound_stops_at_the_first_break() {
    let body = Execution::Compound {
        statements: vec![
            Execution::Break,
            Execution::Return {
                value: Some(ConstexprExpr::Literal(Value::Integer(9))),
            },
        ],
    };
    let mut record = record_with(&[]);
    assert_eq!(body.execute_for_call(&mut record), Execution::Break);
}

#[test]
fn instantiate_substitutes_non_type_template_parameters() {
    let mut bindings = BindingArena::new();
    let n = bindings.alloc(
        "N",
        BindingKind::TemplateParameter {
            kind: TemplateParamKind::NonType { ty: CxxType::int() },
            position: 0,
            is_pack: false,
            default: None,
        },
    );
    let mut map = ParameterMap::new();
    map.insert(
        n,
        TemplateArgument::NonType {
            value: 7,
            ty: CxxType::int(),
        },
    );

    // return N * 2;
    let generic = Execution::Return {
        value: Some(ConstexprExpr::Binary {
            op: BinaryOperator::Multiply,
            left: Box::new(ConstexprExpr::TemplateParamRef(n)),
            right: Box::new(ConstexprExpr::Literal(Value::Integer(2))),
        }),
    };
    let concrete = generic.instantiate(&bindings, &map, MAX_EXECUTION_DEPTH);
    let mut record = record_with(&[]);
    assert_eq!(
        concrete.execute_for_call(&mut record),
        Execution::fixed(Value::Integer(14))
    );

    // the generic fragment itself cannot evaluate: the parameter is
    // still symbolic
    let result = generic.execute_for_call(&mut record);
    assert!(matches!(result, Execution::Problem { .. }));
}

#[test]
fn exceeding_max_depth_yields_incomplete_not_recursion() {
    let bindings = BindingArena::new();
    let map = ParameterMap::new();
    // build a deeply nested expression fragment
    let mut expr = ConstexprExpr::Literal(Value::Integer(1));
    for _ in 0..64 {
        expr = ConstexprExpr::Negate(Box::new(expr));
    }
    let fragment = Execution::Return { value: Some(expr) };
    let shallow = fragment.instantiate(&bindings, &map, 8);
    assert!(shallow.is_incomplete());

    // with the real bound it goes through
    let deep = fragment.instantiate(&bindings, &map, MAX_EXECUTION_DEPTH);
    assert!(!deep.is_incomplete());
}

#[test]
fn instance_execution_goes_through_the_template_engine_map() {
    let mut bindings = BindingArena::new();
    let n = bindings.alloc(
        "N",
        BindingKind::TemplateParameter {
            kind: TemplateParamKind::NonType { ty: CxxType::int() },
            position: 0,
            is_pack: false,
            default: None,
        },
    );
    let template = bindings.alloc(
        "S",
        BindingKind::ClassTemplate {
            key: cxxfront_ast::ClassKey::Struct,
            parameters: vec![n],
            partial_specializations: vec![],
            member_scope: None,
        },
    );
    let mut map = ParameterMap::new();
    map.insert(
        n,
        TemplateArgument::NonType {
            value: 3,
            ty: CxxType::int(),
        },
    );
    let instance = bindings.alloc(
        "S",
        BindingKind::Instance {
            specialized: template,
            map,
            arguments: vec![TemplateArgument::NonType {
                value: 3,
                ty: CxxType::int(),
            }],
            member_scope: None,
        },
    );

    let generic = Execution::Return {
        value: Some(ConstexprExpr::TemplateParamRef(n)),
    };
    let concrete = instantiate_for_instance(&generic, &bindings, instance);
    let mut record = record_with(&[]);
    assert_eq!(
        concrete.execute_for_call(&mut record),
        Execution::fixed(Value::Integer(3))
    );
}
