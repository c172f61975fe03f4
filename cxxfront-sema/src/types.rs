//! The C++ type model
//!
//! Types are tagged-variant values. Composite variants exclusively own
//! their nested type through a `Box`; new composites are produced during
//! declaration analysis and template substitution, and cloned when
//! propagated into a specialization context. After publication a type is
//! never mutated.
//!
//! Structural equality (`is_same_type`) treats named aliases (typedefs)
//! transparently: either side being an `Alias` delegates to the
//! underlying type. Every comparison short-circuits on identity and
//! fast-fails on kind mismatch.

use crate::bindings::BindingId;
use crate::error::DiagnosticCode;
use cxxfront_ast::{CvQualifiers, PlaceholderKind};
use std::fmt;

/// Ceiling on qualifier/pointer/array nesting. Construction beyond this
/// depth degrades to a problem type instead of risking unbounded
/// recursion in comparison, marshaling and substitution.
pub const MAX_TYPE_NESTING: usize = 100;

/// Built-in (fundamental) type kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicKind {
    Void,
    Bool,
    Char,
    WChar,
    Int,
    Float,
    Double,
}

/// signed/unsigned/short/long/long long modifier bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct BasicModifiers {
    pub is_signed: bool,
    pub is_unsigned: bool,
    pub is_short: bool,
    pub is_long: bool,
    pub is_long_long: bool,
}

/// Type traits usable as pseudo-types in dependent contexts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTraitOp {
    IsSame,
    IsBaseOf,
    IsConvertible,
}

/// Unary type transformations (`__underlying_type(E)`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformOperator {
    UnderlyingType,
}

/// Value category of an expression, needed by deduction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueCategory {
    LValue,
    RValue,
}

/// The C++ type representation
#[derive(Debug, Clone, PartialEq)]
pub enum CxxType {
    Basic {
        kind: BasicKind,
        modifiers: BasicModifiers,
    },
    /// const/volatile wrapper; owns its nested type
    Qualifier {
        qualifiers: CvQualifiers,
        inner: Box<CxxType>,
    },
    Pointer {
        inner: Box<CxxType>,
    },
    Reference {
        inner: Box<CxxType>,
        rvalue: bool,
    },
    /// Pointer to member; compares the member-of class as well
    PointerToMember {
        inner: Box<CxxType>,
        member_of: Box<CxxType>,
    },
    Array {
        element: Box<CxxType>,
        bound: Option<i64>,
    },
    /// Parameter pack; compares its pattern
    Pack {
        pattern: Box<CxxType>,
    },
    /// `auto` / `decltype(auto)`. Carries no resolved type: a parameter
    /// whose defining context is unavailable legitimately stays this way
    /// forever.
    Placeholder {
        kind: PlaceholderKind,
    },
    /// A type trait applied to type operands in a dependent context
    TypeTrait {
        op: TypeTraitOp,
        operands: Vec<CxxType>,
    },
    UnaryTransformation {
        operator: TransformOperator,
        operand: Box<CxxType>,
    },
    Function {
        returns: Box<CxxType>,
        parameters: Vec<CxxType>,
        variadic: bool,
        qualifiers: CvQualifiers,
    },
    /// Typedef wrapper, transparent to structural equality
    Alias {
        name: String,
        aliased: Box<CxxType>,
    },
    /// A class, enumeration or template instance, identified by its
    /// binding. The instance cache guarantees at most one instance
    /// binding per argument list, so id equality is type identity.
    Named {
        binding: BindingId,
    },
    /// A template parameter used as a type
    TemplateParam {
        binding: BindingId,
        position: u32,
    },
    /// Member of a template-dependent type; resolution is deferred until
    /// instantiation
    Unknown {
        owner: Box<CxxType>,
        name: String,
    },
    /// Failure sentinel; flows by value, never thrown
    Problem {
        code: DiagnosticCode,
        text: String,
    },
}

impl CxxType {
    pub fn int() -> Self {
        CxxType::Basic {
            kind: BasicKind::Int,
            modifiers: BasicModifiers::default(),
        }
    }

    pub fn double() -> Self {
        CxxType::Basic {
            kind: BasicKind::Double,
            modifiers: BasicModifiers::default(),
        }
    }

    pub fn bool_type() -> Self {
        CxxType::Basic {
            kind: BasicKind::Bool,
            modifiers: BasicModifiers::default(),
        }
    }

    pub fn char_type() -> Self {
        CxxType::Basic {
            kind: BasicKind::Char,
            modifiers: BasicModifiers::default(),
        }
    }

    pub fn void() -> Self {
        CxxType::Basic {
            kind: BasicKind::Void,
            modifiers: BasicModifiers::default(),
        }
    }

    pub fn problem(code: DiagnosticCode, text: impl Into<String>) -> Self {
        CxxType::Problem {
            code,
            text: text.into(),
        }
    }

    /// Pointer to `inner`, degrading to a problem type past the nesting
    /// ceiling.
    pub fn pointer_to(inner: CxxType) -> Self {
        Self::guarded(inner, |inner| CxxType::Pointer { inner })
    }

    pub fn reference_to(inner: CxxType, rvalue: bool) -> Self {
        Self::guarded(inner, |inner| CxxType::Reference { inner, rvalue })
    }

    /// cv-qualified `inner`. Qualifying with no qualifiers is the
    /// identity; qualifying a qualifier merges the two layers.
    pub fn qualified(qualifiers: CvQualifiers, inner: CxxType) -> Self {
        if !qualifiers.any() {
            return inner;
        }
        if let CxxType::Qualifier {
            qualifiers: existing,
            inner: nested,
        } = inner
        {
            return CxxType::Qualifier {
                qualifiers: qualifiers.union(&existing),
                inner: nested,
            };
        }
        Self::guarded(inner, |inner| CxxType::Qualifier { qualifiers, inner })
    }

    pub fn array_of(element: CxxType, bound: Option<i64>) -> Self {
        Self::guarded(element, |element| CxxType::Array { element, bound })
    }

    pub fn pack_of(pattern: CxxType) -> Self {
        Self::guarded(pattern, |pattern| CxxType::Pack { pattern })
    }

    fn guarded(inner: CxxType, build: impl FnOnce(Box<CxxType>) -> CxxType) -> CxxType {
        if inner.nesting_depth() >= MAX_TYPE_NESTING {
            return CxxType::problem(
                DiagnosticCode::TypeNestingExceeded,
                "type nesting limit reached",
            );
        }
        build(Box::new(inner))
    }

    pub fn is_problem(&self) -> bool {
        matches!(self, CxxType::Problem { .. })
    }

    /// Whether this type still mentions a template parameter (directly
    /// or through an unknown member) and therefore cannot be fully
    /// resolved before instantiation.
    pub fn is_dependent(&self) -> bool {
        match self {
            CxxType::TemplateParam { .. } | CxxType::Unknown { .. } => true,
            CxxType::Qualifier { inner, .. }
            | CxxType::Pointer { inner }
            | CxxType::Reference { inner, .. } => inner.is_dependent(),
            CxxType::PointerToMember { inner, member_of } => {
                inner.is_dependent() || member_of.is_dependent()
            }
            CxxType::Array { element, .. } => element.is_dependent(),
            CxxType::Pack { pattern } => pattern.is_dependent(),
            CxxType::TypeTrait { operands, .. } => operands.iter().any(|t| t.is_dependent()),
            CxxType::UnaryTransformation { operand, .. } => operand.is_dependent(),
            CxxType::Function {
                returns, parameters, ..
            } => returns.is_dependent() || parameters.iter().any(|t| t.is_dependent()),
            CxxType::Alias { aliased, .. } => aliased.is_dependent(),
            _ => false,
        }
    }

    /// Depth of the composite wrapper chain under this type.
    pub fn nesting_depth(&self) -> usize {
        match self {
            CxxType::Qualifier { inner, .. }
            | CxxType::Pointer { inner }
            | CxxType::Reference { inner, .. }
            | CxxType::PointerToMember { inner, .. } => 1 + inner.nesting_depth(),
            CxxType::Array { element, .. } => 1 + element.nesting_depth(),
            CxxType::Pack { pattern } => 1 + pattern.nesting_depth(),
            CxxType::Alias { aliased, .. } => 1 + aliased.nesting_depth(),
            CxxType::Unknown { owner, .. } => 1 + owner.nesting_depth(),
            _ => 0,
        }
    }

    /// Structural equality, transparent to typedefs.
    pub fn is_same_type(&self, other: &CxxType) -> bool {
        // identity
        if std::ptr::eq(self, other) {
            return true;
        }
        // a named alias on either side delegates to the underlying type
        if let CxxType::Alias { aliased, .. } = self {
            return aliased.is_same_type(other);
        }
        if let CxxType::Alias { aliased, .. } = other {
            return self.is_same_type(aliased);
        }
        match (self, other) {
            (
                CxxType::Basic { kind: k1, modifiers: m1 },
                CxxType::Basic { kind: k2, modifiers: m2 },
            ) => k1 == k2 && m1 == m2,
            (
                CxxType::Qualifier { qualifiers: q1, inner: i1 },
                CxxType::Qualifier { qualifiers: q2, inner: i2 },
            ) => q1 == q2 && i1.is_same_type(i2),
            (CxxType::Pointer { inner: i1 }, CxxType::Pointer { inner: i2 }) => {
                i1.is_same_type(i2)
            }
            (
                CxxType::Reference { inner: i1, rvalue: r1 },
                CxxType::Reference { inner: i2, rvalue: r2 },
            ) => r1 == r2 && i1.is_same_type(i2),
            (
                CxxType::PointerToMember { inner: i1, member_of: c1 },
                CxxType::PointerToMember { inner: i2, member_of: c2 },
            ) => i1.is_same_type(i2) && c1.is_same_type(c2),
            (
                CxxType::Array { element: e1, bound: b1 },
                CxxType::Array { element: e2, bound: b2 },
            ) => b1 == b2 && e1.is_same_type(e2),
            (CxxType::Pack { pattern: p1 }, CxxType::Pack { pattern: p2 }) => {
                p1.is_same_type(p2)
            }
            // placeholders compare only their kind; they carry no
            // resolved type
            (CxxType::Placeholder { kind: k1 }, CxxType::Placeholder { kind: k2 }) => k1 == k2,
            (
                CxxType::TypeTrait { op: o1, operands: a1 },
                CxxType::TypeTrait { op: o2, operands: a2 },
            ) => {
                o1 == o2
                    && a1.len() == a2.len()
                    && a1.iter().zip(a2).all(|(x, y)| x.is_same_type(y))
            }
            (
                CxxType::UnaryTransformation { operator: o1, operand: t1 },
                CxxType::UnaryTransformation { operator: o2, operand: t2 },
            ) => o1 == o2 && t1.is_same_type(t2),
            (
                CxxType::Function {
                    returns: r1,
                    parameters: p1,
                    variadic: v1,
                    qualifiers: q1,
                },
                CxxType::Function {
                    returns: r2,
                    parameters: p2,
                    variadic: v2,
                    qualifiers: q2,
                },
            ) => {
                v1 == v2
                    && q1 == q2
                    && r1.is_same_type(r2)
                    && p1.len() == p2.len()
                    && p1.iter().zip(p2).all(|(x, y)| x.is_same_type(y))
            }
            (CxxType::Named { binding: b1 }, CxxType::Named { binding: b2 }) => b1 == b2,
            (
                CxxType::TemplateParam { binding: b1, .. },
                CxxType::TemplateParam { binding: b2, .. },
            ) => b1 == b2,
            // an unknown type equals another unknown only on name and
            // owner type, and never equals a resolved type
            (
                CxxType::Unknown { owner: o1, name: n1 },
                CxxType::Unknown { owner: o2, name: n2 },
            ) => n1 == n2 && o1.is_same_type(o2),
            // problem types are never the same as anything, themselves
            // included: equality of failures is meaningless
            (CxxType::Problem { .. }, _) | (_, CxxType::Problem { .. }) => false,
            // kind mismatch
            _ => false,
        }
    }

    /// Append a canonical, deterministic encoding of this type. Used as
    /// the instance cache key: structurally equal types produce equal
    /// signatures.
    pub fn write_signature(&self, out: &mut String) {
        match self {
            CxxType::Basic { kind, modifiers } => {
                if modifiers.is_unsigned {
                    out.push('u');
                }
                if modifiers.is_signed {
                    out.push('s');
                }
                if modifiers.is_short {
                    out.push('h');
                }
                if modifiers.is_long_long {
                    out.push_str("ll");
                } else if modifiers.is_long {
                    out.push('l');
                }
                out.push_str(match kind {
                    BasicKind::Void => "void",
                    BasicKind::Bool => "bool",
                    BasicKind::Char => "char",
                    BasicKind::WChar => "wchar_t",
                    BasicKind::Int => "int",
                    BasicKind::Float => "float",
                    BasicKind::Double => "double",
                });
            }
            CxxType::Qualifier { qualifiers, inner } => {
                if qualifiers.is_const {
                    out.push_str("const ");
                }
                if qualifiers.is_volatile {
                    out.push_str("volatile ");
                }
                inner.write_signature(out);
            }
            CxxType::Pointer { inner } => {
                inner.write_signature(out);
                out.push('*');
            }
            CxxType::Reference { inner, rvalue } => {
                inner.write_signature(out);
                out.push_str(if *rvalue { "&&" } else { "&" });
            }
            CxxType::PointerToMember { inner, member_of } => {
                inner.write_signature(out);
                out.push(' ');
                member_of.write_signature(out);
                out.push_str("::*");
            }
            CxxType::Array { element, bound } => {
                element.write_signature(out);
                match bound {
                    Some(n) => out.push_str(&format!("[{n}]")),
                    None => out.push_str("[]"),
                }
            }
            CxxType::Pack { pattern } => {
                pattern.write_signature(out);
                out.push_str("...");
            }
            CxxType::Placeholder { kind } => out.push_str(match kind {
                PlaceholderKind::Auto => "auto",
                PlaceholderKind::DecltypeAuto => "decltype(auto)",
            }),
            CxxType::TypeTrait { op, operands } => {
                out.push_str(match op {
                    TypeTraitOp::IsSame => "__is_same(",
                    TypeTraitOp::IsBaseOf => "__is_base_of(",
                    TypeTraitOp::IsConvertible => "__is_convertible(",
                });
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    operand.write_signature(out);
                }
                out.push(')');
            }
            CxxType::UnaryTransformation { operator, operand } => {
                out.push_str(match operator {
                    TransformOperator::UnderlyingType => "__underlying_type(",
                });
                operand.write_signature(out);
                out.push(')');
            }
            CxxType::Function {
                returns,
                parameters,
                variadic,
                qualifiers,
            } => {
                returns.write_signature(out);
                out.push('(');
                for (i, parameter) in parameters.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    parameter.write_signature(out);
                }
                if *variadic {
                    out.push_str(",...");
                }
                out.push(')');
                if qualifiers.is_const {
                    out.push_str(" const");
                }
                if qualifiers.is_volatile {
                    out.push_str(" volatile");
                }
            }
            // the alias name is deliberately not part of the signature:
            // a typedef and its target must key identically
            CxxType::Alias { aliased, .. } => aliased.write_signature(out),
            CxxType::Named { binding } => {
                out.push_str(&format!("#{}", binding.0));
            }
            CxxType::TemplateParam { position, .. } => {
                out.push_str(&format!("${position}"));
            }
            CxxType::Unknown { owner, name } => {
                owner.write_signature(out);
                out.push_str("::");
                out.push_str(name);
            }
            CxxType::Problem { code, .. } => {
                out.push_str(&format!("<problem:{code}>"));
            }
        }
    }

    pub fn signature(&self) -> String {
        let mut out = String::new();
        self.write_signature(&mut out);
        out
    }
}

impl fmt::Display for CxxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature())
    }
}

/// Layers `strip_nested` may peel off
pub mod strip {
    pub const TDEF: u8 = 1;
    pub const REF: u8 = 1 << 1;
    pub const CV: u8 = 1 << 2;
    pub const PTR: u8 = 1 << 3;
    pub const ARRAY: u8 = 1 << 4;
    pub const ALL: u8 = TDEF | REF | CV | PTR | ARRAY;
}

/// Peel the requested wrapper layers off `ty`, outermost first, until a
/// layer not covered by `flags` is reached.
pub fn strip_nested(mut ty: &CxxType, flags: u8) -> &CxxType {
    loop {
        match ty {
            CxxType::Alias { aliased, .. } if flags & strip::TDEF != 0 => ty = aliased,
            CxxType::Reference { inner, .. } if flags & strip::REF != 0 => ty = inner,
            CxxType::Qualifier { inner, .. } if flags & strip::CV != 0 => ty = inner,
            CxxType::Pointer { inner } if flags & strip::PTR != 0 => ty = inner,
            CxxType::Array { element, .. } if flags & strip::ARRAY != 0 => ty = element,
            _ => return ty,
        }
    }
}

/// The cv-qualification of the outermost layer of `ty`, looking through
/// typedefs.
pub fn cv_qualifiers_of(ty: &CxxType) -> CvQualifiers {
    match ty {
        CxxType::Qualifier { qualifiers, .. } => *qualifiers,
        CxxType::Alias { aliased, .. } => cv_qualifiers_of(aliased),
        _ => CvQualifiers::NONE,
    }
}
