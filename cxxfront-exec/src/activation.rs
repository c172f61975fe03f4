//! Activation records for constexpr calls
//!
//! Each constexpr function call evaluates against one activation
//! record holding its parameter bindings and the locals it introduces.
//! Records stack up for nested calls; the stack depth is capped and
//! overflow surfaces as a sentinel, never as a crash.

use crate::value::Value;
use miette::Diagnostic;
use std::collections::HashMap;
use thiserror::Error;

/// Maximum constexpr call nesting before evaluation gives up
pub const MAX_ACTIVATION_DEPTH: usize = 512;

/// Errors from activation stack operations
#[derive(Debug, Error, Diagnostic, PartialEq)]
pub enum ActivationError {
    #[error("constexpr call depth exceeded {max_depth}")]
    #[diagnostic(
        code(cxxfront::exec::depth_exceeded),
        help("a constexpr function that recurses this deep cannot be evaluated; the result degrades to an incomplete sentinel")
    )]
    DepthExceeded { max_depth: usize },

    #[error("no active record to pop")]
    #[diagnostic(code(cxxfront::exec::underflow))]
    Underflow,
}

/// One constexpr call frame
#[derive(Debug, Clone, Default)]
pub struct ActivationRecord {
    /// Parameter bindings, fixed at call time
    parameters: HashMap<String, Value>,
    /// Locals introduced while the body executes
    locals: HashMap<String, Value>,
}

impl ActivationRecord {
    pub fn new(parameters: HashMap<String, Value>) -> Self {
        Self {
            parameters,
            locals: HashMap::new(),
        }
    }

    /// Locals shadow parameters, as in the source.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.locals.get(name).or_else(|| self.parameters.get(name))
    }

    pub fn set_local(&mut self, name: impl Into<String>, value: Value) {
        self.locals.insert(name.into(), value);
    }

    /// Forget everything the body introduced, keeping the call's
    /// parameters. Re-execution starts from a clean record, which is
    /// what makes speculative evaluation repeatable.
    pub fn reset_locals(&mut self) {
        self.locals.clear();
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }
}

/// Stack of activation records for nested constexpr calls
#[derive(Debug, Default)]
pub struct ActivationStack {
    records: Vec<ActivationRecord>,
    max_depth: usize,
}

impl ActivationStack {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            max_depth: MAX_ACTIVATION_DEPTH,
        }
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            records: Vec::new(),
            max_depth,
        }
    }

    pub fn push(&mut self, record: ActivationRecord) -> Result<(), ActivationError> {
        if self.records.len() >= self.max_depth {
            return Err(ActivationError::DepthExceeded {
                max_depth: self.max_depth,
            });
        }
        self.records.push(record);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<ActivationRecord, ActivationError> {
        self.records.pop().ok_or(ActivationError::Underflow)
    }

    pub fn top(&mut self) -> Option<&mut ActivationRecord> {
        self.records.last_mut()
    }

    pub fn depth(&self) -> usize {
        self.records.len()
    }
}
