//! Round-trip and failure coverage for the type marshal contract

use crate::bindings::BindingId;
use crate::error::DiagnosticCode;
use crate::marshal::{marshal_type_to_bytes, unmarshal_type, TAG_REGISTRY};
use crate::types::{CxxType, TransformOperator, TypeTraitOp};
use cxxfront_ast::{CvQualifiers, PlaceholderKind};
use pretty_assertions::assert_eq;

fn round_trip(ty: &CxxType) {
    let bytes = marshal_type_to_bytes(ty);
    let back = unmarshal_type(&bytes);
    assert!(
        ty.is_same_type(&back),
        "round trip changed {ty} into {back}"
    );
}

#[test]
fn every_composite_variant_round_trips() {
    round_trip(&CxxType::int());
    round_trip(&CxxType::qualified(CvQualifiers::CONST, CxxType::int()));
    round_trip(&CxxType::pointer_to(CxxType::double()));
    round_trip(&CxxType::reference_to(CxxType::int(), true));
    round_trip(&CxxType::PointerToMember {
        inner: Box::new(CxxType::int()),
        member_of: Box::new(CxxType::Named {
            binding: BindingId(3),
        }),
    });
    round_trip(&CxxType::array_of(CxxType::char_type(), Some(16)));
    round_trip(&CxxType::array_of(CxxType::char_type(), None));
    round_trip(&CxxType::pack_of(CxxType::pointer_to(CxxType::int())));
    round_trip(&CxxType::Placeholder {
        kind: PlaceholderKind::DecltypeAuto,
    });
    round_trip(&CxxType::TypeTrait {
        op: TypeTraitOp::IsSame,
        operands: vec![CxxType::int(), CxxType::double()],
    });
    round_trip(&CxxType::UnaryTransformation {
        operator: TransformOperator::UnderlyingType,
        operand: Box::new(CxxType::Named {
            binding: BindingId(9),
        }),
    });
    round_trip(&CxxType::Function {
        returns: Box::new(CxxType::void()),
        parameters: vec![CxxType::int(), CxxType::pointer_to(CxxType::char_type())],
        variadic: true,
        qualifiers: CvQualifiers::CONST,
    });
    round_trip(&CxxType::Named {
        binding: BindingId(42),
    });
    round_trip(&CxxType::TemplateParam {
        binding: BindingId(7),
        position: 1,
    });
    round_trip(&CxxType::Unknown {
        owner: Box::new(CxxType::TemplateParam {
            binding: BindingId(7),
            position: 0,
        }),
        name: "value_type".to_string(),
    });
}

#[test]
fn alias_round_trips_and_stays_transparent() {
    let alias = CxxType::Alias {
        name: "word".to_string(),
        aliased: Box::new(CxxType::int()),
    };
    let bytes = marshal_type_to_bytes(&alias);
    let back = unmarshal_type(&bytes);
    // the reconstructed alias still compares equal to its target
    assert!(back.is_same_type(&CxxType::int()));
    assert!(CxxType::int().is_same_type(&back));
}

#[test]
fn deep_nesting_round_trips() {
    let mut ty = CxxType::int();
    for _ in 0..40 {
        ty = CxxType::pointer_to(ty);
    }
    round_trip(&ty);
}

#[test]
fn tag_registry_has_no_collisions() {
    let mut seen = std::collections::HashSet::new();
    for (tag, name) in TAG_REGISTRY.iter() {
        assert!(
            seen.insert(*tag),
            "tag {tag:#04x} is used by more than one variant (second: {name})"
        );
    }
    assert_eq!(seen.len(), TAG_REGISTRY.len());
}

#[test]
fn malformed_data_yields_problem_type_not_panic() {
    let garbage = [0xffu8, 0x00, 0x13, 0x37];
    let ty = unmarshal_type(&garbage);
    match ty {
        CxxType::Problem { code, .. } => assert_eq!(code, DiagnosticCode::BadMarshalData),
        other => panic!("expected a problem type, got {other:?}"),
    }
}

#[test]
fn truncated_data_yields_problem_type() {
    let full = marshal_type_to_bytes(&CxxType::pointer_to(CxxType::int()));
    let truncated = &full[..full.len() - 1];
    let ty = unmarshal_type(truncated);
    assert!(ty.is_problem());
}

#[test]
fn empty_input_yields_problem_type() {
    assert!(unmarshal_type(&[]).is_problem());
}
