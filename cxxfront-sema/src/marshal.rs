//! Binary marshaling of the type model
//!
//! The persistence boundary: every composite type writes one tag byte,
//! flag bits, then recursively marshaled nested types. The tag space is
//! a single shared registry across all type kinds; a collision would
//! corrupt persisted data, so the registry is asserted collision-free by
//! test. Malformed or truncated input yields a problem type from the
//! public entry point; no error ever escapes the unmarshal boundary.

use crate::error::DiagnosticCode;
use crate::types::{
    BasicKind, BasicModifiers, CxxType, TransformOperator, TypeTraitOp, MAX_TYPE_NESTING,
};
use cxxfront_ast::{CvQualifiers, PlaceholderKind};
use lazy_static::lazy_static;
use thiserror::Error;

pub const TAG_BASIC: u8 = 0x01;
pub const TAG_QUALIFIER: u8 = 0x02;
pub const TAG_POINTER: u8 = 0x03;
pub const TAG_REFERENCE: u8 = 0x04;
pub const TAG_POINTER_TO_MEMBER: u8 = 0x05;
pub const TAG_ARRAY: u8 = 0x06;
pub const TAG_PACK: u8 = 0x07;
pub const TAG_PLACEHOLDER: u8 = 0x08;
pub const TAG_TYPE_TRAIT: u8 = 0x09;
pub const TAG_UNARY_TRANSFORMATION: u8 = 0x0a;
pub const TAG_FUNCTION: u8 = 0x0b;
pub const TAG_ALIAS: u8 = 0x0c;
pub const TAG_NAMED: u8 = 0x0d;
pub const TAG_TEMPLATE_PARAM: u8 = 0x0e;
pub const TAG_UNKNOWN: u8 = 0x0f;
pub const TAG_PROBLEM: u8 = 0x10;

lazy_static! {
    /// Every tag in use, with the variant it encodes. Shared across all
    /// type kinds; see `tag_registry_has_no_collisions`.
    pub static ref TAG_REGISTRY: Vec<(u8, &'static str)> = vec![
        (TAG_BASIC, "basic"),
        (TAG_QUALIFIER, "qualifier"),
        (TAG_POINTER, "pointer"),
        (TAG_REFERENCE, "reference"),
        (TAG_POINTER_TO_MEMBER, "pointer-to-member"),
        (TAG_ARRAY, "array"),
        (TAG_PACK, "pack"),
        (TAG_PLACEHOLDER, "placeholder"),
        (TAG_TYPE_TRAIT, "type-trait"),
        (TAG_UNARY_TRANSFORMATION, "unary-transformation"),
        (TAG_FUNCTION, "function"),
        (TAG_ALIAS, "alias"),
        (TAG_NAMED, "named"),
        (TAG_TEMPLATE_PARAM, "template-param"),
        (TAG_UNKNOWN, "unknown"),
        (TAG_PROBLEM, "problem"),
    ];
}

/// Internal unmarshal failures; the public entry point converts these to
/// a problem type
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MarshalError {
    #[error("unexpected end of marshaled data at offset {offset}")]
    Truncated { offset: usize },
    #[error("unknown tag byte {tag:#04x} at offset {offset}")]
    UnknownTag { tag: u8, offset: usize },
    #[error("invalid payload for {what} at offset {offset}")]
    InvalidPayload { what: &'static str, offset: usize },
    #[error("marshaled type nests deeper than {MAX_TYPE_NESTING}")]
    TooDeep,
}

/// Append-only output buffer
#[derive(Debug, Default)]
pub struct MarshalWriter {
    buf: Vec<u8>,
}

impl MarshalWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn put_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn put_str(&mut self, s: &str) {
        let bytes = s.as_bytes();
        self.put_u16(bytes.len().min(u16::MAX as usize) as u16);
        self.buf
            .extend_from_slice(&bytes[..bytes.len().min(u16::MAX as usize)]);
    }
}

struct MarshalReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> MarshalReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn get_u8(&mut self) -> Result<u8, MarshalError> {
        let v = *self
            .data
            .get(self.pos)
            .ok_or(MarshalError::Truncated { offset: self.pos })?;
        self.pos += 1;
        Ok(v)
    }

    fn get_u16(&mut self) -> Result<u16, MarshalError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn get_u32(&mut self) -> Result<u32, MarshalError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn get_i64(&mut self) -> Result<i64, MarshalError> {
        let bytes = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(bytes);
        Ok(i64::from_le_bytes(arr))
    }

    fn get_str(&mut self) -> Result<String, MarshalError> {
        let len = self.get_u16()? as usize;
        let offset = self.pos;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| MarshalError::InvalidPayload { what: "string", offset })
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], MarshalError> {
        if self.pos + n > self.data.len() {
            return Err(MarshalError::Truncated { offset: self.pos });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }
}

const FLAG_CONST: u8 = 1;
const FLAG_VOLATILE: u8 = 1 << 1;
const FLAG_RVALUE: u8 = 1 << 2;
const FLAG_VARIADIC: u8 = 1 << 2;
const FLAG_HAS_BOUND: u8 = 1;

fn cv_flags(q: &CvQualifiers) -> u8 {
    let mut f = 0;
    if q.is_const {
        f |= FLAG_CONST;
    }
    if q.is_volatile {
        f |= FLAG_VOLATILE;
    }
    f
}

fn cv_from_flags(f: u8) -> CvQualifiers {
    CvQualifiers {
        is_const: f & FLAG_CONST != 0,
        is_volatile: f & FLAG_VOLATILE != 0,
    }
}

fn basic_kind_byte(kind: BasicKind) -> u8 {
    match kind {
        BasicKind::Void => 0,
        BasicKind::Bool => 1,
        BasicKind::Char => 2,
        BasicKind::WChar => 3,
        BasicKind::Int => 4,
        BasicKind::Float => 5,
        BasicKind::Double => 6,
    }
}

fn basic_kind_from_byte(b: u8, offset: usize) -> Result<BasicKind, MarshalError> {
    Ok(match b {
        0 => BasicKind::Void,
        1 => BasicKind::Bool,
        2 => BasicKind::Char,
        3 => BasicKind::WChar,
        4 => BasicKind::Int,
        5 => BasicKind::Float,
        6 => BasicKind::Double,
        _ => return Err(MarshalError::InvalidPayload { what: "basic kind", offset }),
    })
}

fn modifier_flags(m: &BasicModifiers) -> u8 {
    let mut f = 0;
    if m.is_signed {
        f |= 1;
    }
    if m.is_unsigned {
        f |= 1 << 1;
    }
    if m.is_short {
        f |= 1 << 2;
    }
    if m.is_long {
        f |= 1 << 3;
    }
    if m.is_long_long {
        f |= 1 << 4;
    }
    f
}

fn modifiers_from_flags(f: u8) -> BasicModifiers {
    BasicModifiers {
        is_signed: f & 1 != 0,
        is_unsigned: f & (1 << 1) != 0,
        is_short: f & (1 << 2) != 0,
        is_long: f & (1 << 3) != 0,
        is_long_long: f & (1 << 4) != 0,
    }
}

fn diagnostic_code_byte(code: DiagnosticCode) -> u8 {
    match code {
        DiagnosticCode::NameNotFound => 0,
        DiagnosticCode::AmbiguousLookup => 1,
        DiagnosticCode::InvalidType => 2,
        DiagnosticCode::InvalidOverload => 3,
        DiagnosticCode::BadTemplateArguments => 4,
        DiagnosticCode::AmbiguousInstantiation => 5,
        DiagnosticCode::InstantiationDepthExceeded => 6,
        DiagnosticCode::TypeNestingExceeded => 7,
        DiagnosticCode::BadMarshalData => 8,
        DiagnosticCode::InvalidRedeclaration => 9,
        DiagnosticCode::MemberOfNonClass => 10,
        DiagnosticCode::NoAlternativeValid => 11,
        DiagnosticCode::NotConstexpr => 12,
        DiagnosticCode::ExecutionDepthExceeded => 13,
    }
}

fn diagnostic_code_from_byte(b: u8, offset: usize) -> Result<DiagnosticCode, MarshalError> {
    Ok(match b {
        0 => DiagnosticCode::NameNotFound,
        1 => DiagnosticCode::AmbiguousLookup,
        2 => DiagnosticCode::InvalidType,
        3 => DiagnosticCode::InvalidOverload,
        4 => DiagnosticCode::BadTemplateArguments,
        5 => DiagnosticCode::AmbiguousInstantiation,
        6 => DiagnosticCode::InstantiationDepthExceeded,
        7 => DiagnosticCode::TypeNestingExceeded,
        8 => DiagnosticCode::BadMarshalData,
        9 => DiagnosticCode::InvalidRedeclaration,
        10 => DiagnosticCode::MemberOfNonClass,
        11 => DiagnosticCode::NoAlternativeValid,
        12 => DiagnosticCode::NotConstexpr,
        13 => DiagnosticCode::ExecutionDepthExceeded,
        _ => return Err(MarshalError::InvalidPayload { what: "diagnostic code", offset }),
    })
}

/// Serialize `ty` into `writer`.
pub fn marshal_type(ty: &CxxType, writer: &mut MarshalWriter) {
    match ty {
        CxxType::Basic { kind, modifiers } => {
            writer.put_u8(TAG_BASIC);
            writer.put_u8(basic_kind_byte(*kind));
            writer.put_u8(modifier_flags(modifiers));
        }
        CxxType::Qualifier { qualifiers, inner } => {
            writer.put_u8(TAG_QUALIFIER);
            writer.put_u8(cv_flags(qualifiers));
            marshal_type(inner, writer);
        }
        CxxType::Pointer { inner } => {
            writer.put_u8(TAG_POINTER);
            marshal_type(inner, writer);
        }
        CxxType::Reference { inner, rvalue } => {
            writer.put_u8(TAG_REFERENCE);
            writer.put_u8(if *rvalue { FLAG_RVALUE } else { 0 });
            marshal_type(inner, writer);
        }
        CxxType::PointerToMember { inner, member_of } => {
            writer.put_u8(TAG_POINTER_TO_MEMBER);
            marshal_type(inner, writer);
            marshal_type(member_of, writer);
        }
        CxxType::Array { element, bound } => {
            writer.put_u8(TAG_ARRAY);
            match bound {
                Some(n) => {
                    writer.put_u8(FLAG_HAS_BOUND);
                    writer.put_i64(*n);
                }
                None => writer.put_u8(0),
            }
            marshal_type(element, writer);
        }
        CxxType::Pack { pattern } => {
            writer.put_u8(TAG_PACK);
            marshal_type(pattern, writer);
        }
        CxxType::Placeholder { kind } => {
            writer.put_u8(TAG_PLACEHOLDER);
            writer.put_u8(match kind {
                PlaceholderKind::Auto => 0,
                PlaceholderKind::DecltypeAuto => 1,
            });
        }
        CxxType::TypeTrait { op, operands } => {
            writer.put_u8(TAG_TYPE_TRAIT);
            writer.put_u8(match op {
                TypeTraitOp::IsSame => 0,
                TypeTraitOp::IsBaseOf => 1,
                TypeTraitOp::IsConvertible => 2,
            });
            writer.put_u16(operands.len() as u16);
            for operand in operands {
                marshal_type(operand, writer);
            }
        }
        CxxType::UnaryTransformation { operator, operand } => {
            writer.put_u8(TAG_UNARY_TRANSFORMATION);
            writer.put_u8(match operator {
                TransformOperator::UnderlyingType => 0,
            });
            marshal_type(operand, writer);
        }
        CxxType::Function {
            returns,
            parameters,
            variadic,
            qualifiers,
        } => {
            writer.put_u8(TAG_FUNCTION);
            let mut flags = cv_flags(qualifiers);
            if *variadic {
                flags |= FLAG_VARIADIC;
            }
            writer.put_u8(flags);
            writer.put_u16(parameters.len() as u16);
            marshal_type(returns, writer);
            for parameter in parameters {
                marshal_type(parameter, writer);
            }
        }
        CxxType::Alias { name, aliased } => {
            writer.put_u8(TAG_ALIAS);
            writer.put_str(name);
            marshal_type(aliased, writer);
        }
        CxxType::Named { binding } => {
            writer.put_u8(TAG_NAMED);
            writer.put_u32(binding.0);
        }
        CxxType::TemplateParam { binding, position } => {
            writer.put_u8(TAG_TEMPLATE_PARAM);
            writer.put_u32(binding.0);
            writer.put_u32(*position);
        }
        CxxType::Unknown { owner, name } => {
            writer.put_u8(TAG_UNKNOWN);
            writer.put_str(name);
            marshal_type(owner, writer);
        }
        CxxType::Problem { code, text } => {
            writer.put_u8(TAG_PROBLEM);
            writer.put_u8(diagnostic_code_byte(*code));
            writer.put_str(text);
        }
    }
}

/// Serialize a type to a fresh byte vector.
pub fn marshal_type_to_bytes(ty: &CxxType) -> Vec<u8> {
    let mut writer = MarshalWriter::new();
    marshal_type(ty, &mut writer);
    writer.into_bytes()
}

/// Reconstruct a type from marshaled data. Malformed or truncated input
/// produces a problem type; this function never fails.
pub fn unmarshal_type(data: &[u8]) -> CxxType {
    let mut reader = MarshalReader::new(data);
    match read_type(&mut reader, 0) {
        Ok(ty) => ty,
        Err(e) => CxxType::problem(DiagnosticCode::BadMarshalData, e.to_string()),
    }
}

fn read_type(reader: &mut MarshalReader<'_>, depth: usize) -> Result<CxxType, MarshalError> {
    if depth > MAX_TYPE_NESTING {
        return Err(MarshalError::TooDeep);
    }
    let offset = reader.pos;
    let tag = reader.get_u8()?;
    match tag {
        TAG_BASIC => {
            let kind = basic_kind_from_byte(reader.get_u8()?, offset)?;
            let modifiers = modifiers_from_flags(reader.get_u8()?);
            Ok(CxxType::Basic { kind, modifiers })
        }
        TAG_QUALIFIER => {
            let qualifiers = cv_from_flags(reader.get_u8()?);
            let inner = read_type(reader, depth + 1)?;
            Ok(CxxType::Qualifier {
                qualifiers,
                inner: Box::new(inner),
            })
        }
        TAG_POINTER => {
            let inner = read_type(reader, depth + 1)?;
            Ok(CxxType::Pointer {
                inner: Box::new(inner),
            })
        }
        TAG_REFERENCE => {
            let flags = reader.get_u8()?;
            let inner = read_type(reader, depth + 1)?;
            Ok(CxxType::Reference {
                inner: Box::new(inner),
                rvalue: flags & FLAG_RVALUE != 0,
            })
        }
        TAG_POINTER_TO_MEMBER => {
            let inner = read_type(reader, depth + 1)?;
            let member_of = read_type(reader, depth + 1)?;
            Ok(CxxType::PointerToMember {
                inner: Box::new(inner),
                member_of: Box::new(member_of),
            })
        }
        TAG_ARRAY => {
            let flags = reader.get_u8()?;
            let bound = if flags & FLAG_HAS_BOUND != 0 {
                Some(reader.get_i64()?)
            } else {
                None
            };
            let element = read_type(reader, depth + 1)?;
            Ok(CxxType::Array {
                element: Box::new(element),
                bound,
            })
        }
        TAG_PACK => {
            let pattern = read_type(reader, depth + 1)?;
            Ok(CxxType::Pack {
                pattern: Box::new(pattern),
            })
        }
        TAG_PLACEHOLDER => {
            let kind = match reader.get_u8()? {
                0 => PlaceholderKind::Auto,
                1 => PlaceholderKind::DecltypeAuto,
                _ => {
                    return Err(MarshalError::InvalidPayload {
                        what: "placeholder kind",
                        offset,
                    })
                }
            };
            Ok(CxxType::Placeholder { kind })
        }
        TAG_TYPE_TRAIT => {
            let op = match reader.get_u8()? {
                0 => TypeTraitOp::IsSame,
                1 => TypeTraitOp::IsBaseOf,
                2 => TypeTraitOp::IsConvertible,
                _ => {
                    return Err(MarshalError::InvalidPayload {
                        what: "type trait",
                        offset,
                    })
                }
            };
            let count = reader.get_u16()? as usize;
            let mut operands = Vec::with_capacity(count.min(16));
            for _ in 0..count {
                operands.push(read_type(reader, depth + 1)?);
            }
            Ok(CxxType::TypeTrait { op, operands })
        }
        TAG_UNARY_TRANSFORMATION => {
            let operator = match reader.get_u8()? {
                0 => TransformOperator::UnderlyingType,
                _ => {
                    return Err(MarshalError::InvalidPayload {
                        what: "transformation",
                        offset,
                    })
                }
            };
            let operand = read_type(reader, depth + 1)?;
            Ok(CxxType::UnaryTransformation {
                operator,
                operand: Box::new(operand),
            })
        }
        TAG_FUNCTION => {
            let flags = reader.get_u8()?;
            let count = reader.get_u16()? as usize;
            let returns = read_type(reader, depth + 1)?;
            let mut parameters = Vec::with_capacity(count.min(16));
            for _ in 0..count {
                parameters.push(read_type(reader, depth + 1)?);
            }
            Ok(CxxType::Function {
                returns: Box::new(returns),
                parameters,
                variadic: flags & FLAG_VARIADIC != 0,
                qualifiers: cv_from_flags(flags),
            })
        }
        TAG_ALIAS => {
            let name = reader.get_str()?;
            let aliased = read_type(reader, depth + 1)?;
            Ok(CxxType::Alias {
                name,
                aliased: Box::new(aliased),
            })
        }
        TAG_NAMED => {
            let binding = crate::bindings::BindingId(reader.get_u32()?);
            Ok(CxxType::Named { binding })
        }
        TAG_TEMPLATE_PARAM => {
            let binding = crate::bindings::BindingId(reader.get_u32()?);
            let position = reader.get_u32()?;
            Ok(CxxType::TemplateParam { binding, position })
        }
        TAG_UNKNOWN => {
            let name = reader.get_str()?;
            let owner = read_type(reader, depth + 1)?;
            Ok(CxxType::Unknown {
                owner: Box::new(owner),
                name,
            })
        }
        TAG_PROBLEM => {
            let code = diagnostic_code_from_byte(reader.get_u8()?, offset)?;
            let text = reader.get_str()?;
            Ok(CxxType::Problem { code, text })
        }
        _ => Err(MarshalError::UnknownTag { tag, offset }),
    }
}
