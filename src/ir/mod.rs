// This module groups the backend intermediate representation the lowering pass targets. Types
// and values describe operands, locals are the per-method named storage (parameters, stack
// allocations, labels, temporaries), instructions are the canonical QPU-oriented operations and
// Method and Module own them. The helpers submodule holds the multi-instruction expansions
// (bit-casts, index calculations, vector lane access, shuffles, byte swaps) several lowering
// requests share.

//! Backend intermediate representation.
//!
//! # Key Components
//!
//! - [`DataType`] and [`Value`]: typed operands
//! - [`Local`]: named per-method storage with provenance links
//! - [`Instruction`]: canonical instructions with condition codes and flag behaviour
//! - [`Method`] and [`Module`]: owners of instruction streams and global data

pub mod helpers;
pub mod instruction;
pub mod local;
pub mod method;
pub mod module;
pub mod opcodes;
pub mod types;
pub mod value;

pub use instruction::{
    ConditionCode, Instruction, InstructionDecorations, InstructionKind, MemoryOperation, MemoryScope,
    MemorySemantics, SetFlag,
};
pub use local::{Local, LocalKind, LocalReference, ParameterDecorations};
pub use method::Method;
pub use module::{Global, Module};
pub use opcodes::{ComparisonPredicate, FloatPredicate, IntPredicate, OpCode};
pub use types::{DataType, NATIVE_VECTOR_SIZE};
pub use value::{GlobalId, GlobalRef, Literal, LocalId, LocalRef, ModuleId, Register, Value, ValueKind};
