//! cxxfront constexpr execution
//!
//! Models the control-flow fragments the semantic core captures for
//! constant evaluation (return/break/continue/default, declarators,
//! constructor initializer chains) and evaluates them against
//! activation records. Template-captured fragments are instantiated
//! (parameter substitution with a depth guard) before evaluation; a
//! fragment of a cached template instance is instantiated through the
//! instance's parameter map, never evaluated generically.

pub mod activation;
pub mod execution;
pub mod value;

// Include tests directory with all test modules
#[cfg(test)]
#[path = "tests/mod.rs"]
mod tests;

// Re-export public API
pub use activation::{
    ActivationError, ActivationRecord, ActivationStack, MAX_ACTIVATION_DEPTH,
};
pub use execution::{
    instantiate_for_instance, ConstexprExpr, Execution, MAX_EXECUTION_DEPTH,
};
pub use value::Value;
