//! Constexpr execution fragments
//!
//! An `Execution` is the captured control-flow fragment of a constexpr
//! construct: return statements, loop control, constructor initializer
//! chains. Fragments captured inside a template still reference
//! template parameters; `instantiate` substitutes a parameter map
//! through the fragment (with a recursion guard that degrades to the
//! `Incomplete` sentinel), and `execute_for_call` evaluates the
//! instantiated fragment against an activation record.
//!
//! Evaluation is side-effect-free beyond the record's own locals.
//! Overload resolution evaluates speculatively and may repeat a call;
//! both are safe here because nothing outside the record is touched.

use crate::activation::ActivationRecord;
use crate::value::Value;
use cxxfront_ast::BinaryOperator;
use cxxfront_sema::bindings::{BindingArena, BindingId, TemplateArgument};
use cxxfront_sema::{DiagnosticCode, ParameterMap};

/// Default substitution depth guard
pub const MAX_EXECUTION_DEPTH: usize = 128;

/// A constant expression captured for later evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum ConstexprExpr {
    Literal(Value),
    /// Reference to a function parameter or local, by name
    ParameterRef(String),
    /// Reference to a non-type template parameter; substituted away by
    /// `instantiate`
    TemplateParamRef(BindingId),
    Negate(Box<ConstexprExpr>),
    Binary {
        op: BinaryOperator,
        left: Box<ConstexprExpr>,
        right: Box<ConstexprExpr>,
    },
    Conditional {
        condition: Box<ConstexprExpr>,
        positive: Box<ConstexprExpr>,
        negative: Box<ConstexprExpr>,
    },
}

/// A captured control-flow fragment
#[derive(Debug, Clone, PartialEq)]
pub enum Execution {
    /// `return expr;` / `return;`
    Return { value: Option<ConstexprExpr> },
    Break,
    Continue,
    /// `default:` label in a switch
    Default,
    /// A local declaration with a constant initializer
    Declarator {
        name: String,
        initializer: ConstexprExpr,
    },
    /// Constructor member-initializer chain, in declaration order
    ConstructorChain {
        initializers: Vec<(String, Execution)>,
    },
    /// A sequence of fragments (compound statement body)
    Compound { statements: Vec<Execution> },
    /// A finished evaluation wrapping its value
    Fixed { value: Value },
    /// Depth guard sentinel: substitution or evaluation gave up
    Incomplete,
    Problem { code: DiagnosticCode },
}

impl Execution {
    pub fn fixed(value: Value) -> Self {
        Execution::Fixed { value }
    }

    pub fn is_incomplete(&self) -> bool {
        matches!(self, Execution::Incomplete)
    }

    /// Substitute template parameters throughout the fragment.
    ///
    /// `max_depth` bounds the recursion over nested fragments; hitting
    /// the bound produces `Incomplete`, never unbounded recursion.
    pub fn instantiate(
        &self,
        bindings: &BindingArena,
        map: &ParameterMap,
        max_depth: usize,
    ) -> Execution {
        if max_depth == 0 {
            return Execution::Incomplete;
        }
        match self {
            Execution::Return { value } => {
                let value = match value {
                    Some(v) => match instantiate_expr(v, map, max_depth) {
                        Some(v) => Some(v),
                        None => return Execution::Incomplete,
                    },
                    None => None,
                };
                Execution::Return { value }
            }
            Execution::Declarator { name, initializer } => {
                match instantiate_expr(initializer, map, max_depth) {
                    Some(initializer) => Execution::Declarator {
                        name: name.clone(),
                        initializer,
                    },
                    None => Execution::Incomplete,
                }
            }
            Execution::ConstructorChain { initializers } => Execution::ConstructorChain {
                initializers: initializers
                    .iter()
                    .map(|(name, exec)| {
                        (name.clone(), exec.instantiate(bindings, map, max_depth - 1))
                    })
                    .collect(),
            },
            Execution::Compound { statements } => Execution::Compound {
                statements: statements
                    .iter()
                    .map(|s| s.instantiate(bindings, map, max_depth - 1))
                    .collect(),
            },
            Execution::Break
            | Execution::Continue
            | Execution::Default
            | Execution::Fixed { .. }
            | Execution::Incomplete
            | Execution::Problem { .. } => self.clone(),
        }
    }

    /// Evaluate the fragment against an activation record, producing a
    /// result execution. Mutates only the record's locals; enclosing
    /// scope state is untouched, so evaluation can be repeated and
    /// attempted speculatively.
    pub fn execute_for_call(&self, record: &mut ActivationRecord) -> Execution {
        match self {
            Execution::Return { value } => match value {
                Some(expr) => match evaluate_expr(expr, record) {
                    Ok(value) => Execution::fixed(value),
                    Err(code) => Execution::Problem { code },
                },
                None => Execution::fixed(Value::Integer(0)),
            },
            Execution::Declarator { name, initializer } => {
                match evaluate_expr(initializer, record) {
                    Ok(value) => {
                        record.set_local(name.clone(), value);
                        // a declaration completes without producing a
                        // result; the enclosing compound carries on
                        Execution::Compound { statements: vec![] }
                    }
                    Err(code) => Execution::Problem { code },
                }
            }
            Execution::Compound { statements } => {
                for statement in statements {
                    let result = statement.execute_for_call(record);
                    match result {
                        Execution::Fixed { .. }
                        | Execution::Break
                        | Execution::Continue
                        | Execution::Problem { .. }
                        | Execution::Incomplete => return result,
                        _ => continue,
                    }
                }
                Execution::Compound { statements: vec![] }
            }
            Execution::ConstructorChain { initializers } => {
                let mut members = Vec::with_capacity(initializers.len());
                for (name, exec) in initializers {
                    match exec.execute_for_call(record) {
                        Execution::Fixed { value } => members.push((name.clone(), value)),
                        Execution::Problem { code } => return Execution::Problem { code },
                        Execution::Incomplete => return Execution::Incomplete,
                        _ => {
                            return Execution::Problem {
                                code: DiagnosticCode::NotConstexpr,
                            }
                        }
                    }
                }
                Execution::fixed(Value::Aggregate(members))
            }
            Execution::Break | Execution::Continue | Execution::Default => self.clone(),
            Execution::Fixed { .. } => self.clone(),
            Execution::Incomplete => Execution::Incomplete,
            Execution::Problem { .. } => self.clone(),
        }
    }
}

/// `None` means the depth guard fired; the enclosing fragment becomes
/// `Incomplete`.
fn instantiate_expr(
    expr: &ConstexprExpr,
    map: &ParameterMap,
    max_depth: usize,
) -> Option<ConstexprExpr> {
    if max_depth == 0 {
        return None;
    }
    Some(match expr {
        ConstexprExpr::TemplateParamRef(param) => match map.lookup(*param) {
            Some(TemplateArgument::NonType { value, .. }) => {
                ConstexprExpr::Literal(Value::Integer(*value))
            }
            // a type argument in value position, or no substitution
            // yet: stays dependent
            _ => expr.clone(),
        },
        ConstexprExpr::Negate(inner) => {
            ConstexprExpr::Negate(Box::new(instantiate_expr(inner, map, max_depth - 1)?))
        }
        ConstexprExpr::Binary { op, left, right } => ConstexprExpr::Binary {
            op: *op,
            left: Box::new(instantiate_expr(left, map, max_depth - 1)?),
            right: Box::new(instantiate_expr(right, map, max_depth - 1)?),
        },
        ConstexprExpr::Conditional {
            condition,
            positive,
            negative,
        } => ConstexprExpr::Conditional {
            condition: Box::new(instantiate_expr(condition, map, max_depth - 1)?),
            positive: Box::new(instantiate_expr(positive, map, max_depth - 1)?),
            negative: Box::new(instantiate_expr(negative, map, max_depth - 1)?),
        },
        ConstexprExpr::Literal(_) | ConstexprExpr::ParameterRef(_) => expr.clone(),
    })
}

fn evaluate_expr(
    expr: &ConstexprExpr,
    record: &ActivationRecord,
) -> Result<Value, DiagnosticCode> {
    match expr {
        ConstexprExpr::Literal(value) => Ok(value.clone()),
        ConstexprExpr::ParameterRef(name) => record
            .lookup(name)
            .cloned()
            .ok_or(DiagnosticCode::NotConstexpr),
        ConstexprExpr::TemplateParamRef(_) => Err(DiagnosticCode::NotConstexpr),
        ConstexprExpr::Negate(inner) => {
            let value = evaluate_expr(inner, record)?;
            match value {
                Value::Integer(v) => Ok(Value::Integer(-v)),
                Value::Float(v) => Ok(Value::Float(-v)),
                _ => Err(DiagnosticCode::NotConstexpr),
            }
        }
        ConstexprExpr::Binary { op, left, right } => {
            let l = evaluate_expr(left, record)?;
            let r = evaluate_expr(right, record)?;
            evaluate_binary(*op, l, r)
        }
        ConstexprExpr::Conditional {
            condition,
            positive,
            negative,
        } => {
            let c = evaluate_expr(condition, record)?;
            if c.is_truthy() {
                evaluate_expr(positive, record)
            } else {
                evaluate_expr(negative, record)
            }
        }
    }
}

fn evaluate_binary(op: BinaryOperator, l: Value, r: Value) -> Result<Value, DiagnosticCode> {
    use BinaryOperator::*;
    if let (Some(l), Some(r)) = (l.as_integer(), r.as_integer()) {
        let result = match op {
            Add => l.checked_add(r).map(Value::Integer),
            Subtract => l.checked_sub(r).map(Value::Integer),
            Multiply => l.checked_mul(r).map(Value::Integer),
            Divide => l.checked_div(r).map(Value::Integer),
            Modulo => l.checked_rem(r).map(Value::Integer),
            ShiftLeft => Some(Value::Integer(l << (r & 63))),
            ShiftRight => Some(Value::Integer(l >> (r & 63))),
            Less => Some(Value::Boolean(l < r)),
            Greater => Some(Value::Boolean(l > r)),
            LessEqual => Some(Value::Boolean(l <= r)),
            GreaterEqual => Some(Value::Boolean(l >= r)),
            Equal => Some(Value::Boolean(l == r)),
            NotEqual => Some(Value::Boolean(l != r)),
            BitwiseAnd => Some(Value::Integer(l & r)),
            BitwiseOr => Some(Value::Integer(l | r)),
            BitwiseXor => Some(Value::Integer(l ^ r)),
            LogicalAnd => Some(Value::Boolean(l != 0 && r != 0)),
            LogicalOr => Some(Value::Boolean(l != 0 || r != 0)),
            Assign | Comma => None,
        };
        return result.ok_or(DiagnosticCode::NotConstexpr);
    }
    if let (Value::Float(l), Value::Float(r)) = (&l, &r) {
        let result = match op {
            Add => Some(Value::Float(l + r)),
            Subtract => Some(Value::Float(l - r)),
            Multiply => Some(Value::Float(l * r)),
            Divide => Some(Value::Float(l / r)),
            Less => Some(Value::Boolean(l < r)),
            Greater => Some(Value::Boolean(l > r)),
            Equal => Some(Value::Boolean(l == r)),
            NotEqual => Some(Value::Boolean(l != r)),
            _ => None,
        };
        return result.ok_or(DiagnosticCode::NotConstexpr);
    }
    Err(DiagnosticCode::NotConstexpr)
}

/// Instantiate the execution of a template member for a cached
/// instance: the parameter map comes from the template engine's
/// instance record, never from direct evaluation of the generic
/// fragment.
pub fn instantiate_for_instance(
    execution: &Execution,
    bindings: &BindingArena,
    instance: BindingId,
) -> Execution {
    match &bindings.get(instance).kind {
        cxxfront_sema::BindingKind::Instance { map, .. }
        | cxxfront_sema::BindingKind::Specialization { map, .. } => {
            execution.instantiate(bindings, map, MAX_EXECUTION_DEPTH)
        }
        _ => Execution::Problem {
            code: DiagnosticCode::NotConstexpr,
        },
    }
}
