//! Data model of the compiler IR consumed by the analysis.
//!
//! The real bitcode parser and the C++ demangler live in the host
//! compiler; this crate defines the shape of the data they deliver.
//! Every symbol carries both its mangled and demangled spelling, filled
//! in at the parser boundary, so nothing downstream ever demangles.
//!
//! The [`builder`] module provides the construction API used by tests and
//! by host shims that translate parser output into this model.

pub mod builder;
pub mod constant;
pub mod function;
pub mod inst;
pub mod module;

// Re-export commonly used types
pub use builder::{FunctionBuilder, ModuleBuilder};
pub use constant::Constant;
pub use function::{BasicBlock, Function};
pub use inst::{CallTarget, CalledValue, GepIndex, Instruction, Opcode, Operand};
pub use module::{GlobalVariable, Module};
