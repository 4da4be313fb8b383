//! qpuc - instruction lowering and encoding for the VideoCore IV QPU.
//!
//! qpuc lowers the requests an LLVM IR front end produces (calls, copies, operators,
//! address calculations, vector shuffles, branches, switches, ...) into a canonical backend
//! instruction stream per function, and packs machine instructions into 64-bit words.
//!
//! # Primary Usage
//!
//! ```ignore
//! use qpuc::core::CompilationSession;
//! use qpuc::ir::{DataType, Method, ParameterDecorations, Value};
//! use qpuc::llvm::{lower_method, CallSite, LlvmInstruction};
//! use bumpalo::Bump;
//!
//! // Create compilation session with arena allocation
//! let arena = Bump::new();
//! let session = CompilationSession::new(&arena);
//!
//! let mut method = Method::new(&session, "kernel", DataType::VOID);
//! let dst = method.add_parameter("%dst", DataType::pointer_to(DataType::INT8), ParameterDecorations::NONE);
//! let src = method.add_parameter("%src", DataType::pointer_to(DataType::INT8), ParameterDecorations::NONE);
//! let copy = CallSite::void("llvm.memcpy.p0i8.p0i8.i32", DataType::VOID, vec![dst, src, Value::int(64)]);
//! lower_method(&session, &mut method, vec![LlvmInstruction::from(copy)])?;
//! ```
//!
//! # Architecture
//!
//! - [`core`] - Shared infrastructure (session, errors, configuration)
//! - [`ir`] - Canonical backend IR (values, locals, instructions, methods, modules)
//! - [`llvm`] - Lowering requests and intrinsic recognition
//! - [`qpu`] - 64-bit instruction-word encoding

pub mod core;
pub mod ir;
pub mod llvm;
pub mod qpu;

pub use crate::core::{CompilationSession, CompilationStep, CompileError, CompileResult, Configuration};
pub use crate::ir::{Method, Module};
pub use crate::llvm::{lower_method, lower_module, LlvmInstruction};
