// This module defines error types for the qpuc backend using the thiserror crate for idiomatic
// Rust error handling. CompileError is the single error enum covering every way lowering or
// encoding can fail: call sites whose argument count disagrees with the callee, lifetime
// markers on objects that are not stack allocations, container insertion/extraction into
// arrays, intrinsics missing a required literal operand, byte swaps of unsupported widths,
// unknown comparison predicates, and instruction-word fields that overflow their bit width.
// Every variant reports the compilation step it belongs to (parser, LLVM-to-IR lowering,
// encoding) and its Display output starts with that step tag, followed by the offending
// operand's textual form. None of these errors are recoverable: the lowering driver aborts
// the whole compilation unit on the first one.

//! Error types for the qpuc backend.
//!
//! Using thiserror for idiomatic error handling.

use std::fmt;
use thiserror::Error;

/// The stage of compilation an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompilationStep {
    General,
    Parser,
    LlvmToIr,
    Encoding,
}

impl fmt::Display for CompilationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompilationStep::General => "General",
            CompilationStep::Parser => "Parser",
            CompilationStep::LlvmToIr => "LLVM-IR Lowering",
            CompilationStep::Encoding => "Instruction Encoding",
        };
        f.write_str(name)
    }
}

/// Main error type for lowering and encoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("{}: Invalid numbers of method arguments for '{name}': Got {actual}, expected {expected}", CompilationStep::Parser)]
    ArgumentCountMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("{}: Cannot start life-time of object not located on stack: {operand}", CompilationStep::LlvmToIr)]
    NonStackLifetime { operand: String },

    #[error("{}: Container {operation} into arrays is not yet implemented: {container}", CompilationStep::LlvmToIr)]
    UnsupportedContainerAccess {
        operation: &'static str,
        container: String,
    },

    #[error("{}: Intrinsic '{intrinsic}' requires a literal operand, got: {operand}", CompilationStep::LlvmToIr)]
    MissingLiteral { intrinsic: String, operand: String },

    #[error("{}: Call to '{name}' has no operand {index} (only {count} given)", CompilationStep::LlvmToIr)]
    MissingOperand {
        name: String,
        index: usize,
        count: usize,
    },

    #[error("{}: Unsupported {width}-bit {operation}", CompilationStep::LlvmToIr)]
    UnsupportedWidth { operation: &'static str, width: u32 },

    #[error("{}: Unknown {family} comparison predicate '{predicate}'", CompilationStep::LlvmToIr)]
    UnknownPredicate {
        predicate: String,
        family: &'static str,
    },

    #[error("{}: Invalid value: {reason}", CompilationStep::LlvmToIr)]
    InvalidValue { reason: String },

    #[error("{}: Value {value:#x} does not fit into the {width}-bit field '{field}'", CompilationStep::Encoding)]
    FieldOverflow {
        field: &'static str,
        value: u64,
        width: u8,
    },

    #[error("{}: Word {word:#018x} is not a valid {kind} instruction", CompilationStep::Encoding)]
    InvalidInstruction { kind: &'static str, word: u64 },
}

impl CompileError {
    /// The compilation step this error aborts.
    pub fn step(&self) -> CompilationStep {
        match self {
            CompileError::ArgumentCountMismatch { .. } => CompilationStep::Parser,
            CompileError::FieldOverflow { .. } | CompileError::InvalidInstruction { .. } => {
                CompilationStep::Encoding
            }
            _ => CompilationStep::LlvmToIr,
        }
    }
}

/// Result type alias for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;
