// This module is the LLVM-IR-to-backend lowering stage. The front end hands over, per function,
// an ordered stream of lowering requests (LlvmInstruction); lower_method consumes them strictly
// in that order, appending the canonical instructions each one expands into to the method, and
// records per-request and per-function statistics in the compilation session. The first error
// aborts the whole compilation unit: nothing is rolled back and no further request is lowered.
// lower_module applies the same driver to several methods of a module, one after the other.

//! LLVM IR lowering.
//!
//! # Example
//! ```ignore
//! use qpuc::core::CompilationSession;
//! use qpuc::ir::{DataType, Method};
//! use qpuc::llvm::{lower_method, LlvmInstruction, ValueReturn};
//! use bumpalo::Bump;
//!
//! let arena = Bump::new();
//! let session = CompilationSession::new(&arena);
//! let mut method = Method::new(&session, "kernel", DataType::VOID);
//! lower_method(&session, &mut method, vec![LlvmInstruction::from(ValueReturn::new(None))])?;
//! ```

pub mod instruction;
pub mod intrinsics;

pub use instruction::{
    BinaryOperator, BlockLabel, Branch, CallSite, Comparison, ContainerExtraction, ContainerInsertion, CopyMode,
    CopyValue, IndexOf, LlvmInstruction, PhiNode, Selection, ShuffleVector, Switch, UnaryOperator, ValueReturn,
};
pub use intrinsics::{classify, Intrinsic};

use crate::core::error::{CompileError, CompileResult};
use crate::core::session::CompilationSession;
use crate::ir::{Method, Module};

/// Lower `requests` into `method`, in order.
pub fn lower_method(
    session: &CompilationSession<'_>,
    method: &mut Method<'_>,
    requests: impl IntoIterator<Item = LlvmInstruction>,
) -> CompileResult<()> {
    log::debug!("Lowering method {}", method.name);
    for request in requests {
        let kind = request.kind_name();
        if let LlvmInstruction::Call(call) = &request {
            if classify(call.method_name()).is_some() {
                session.record_intrinsic(call.method_name());
            }
        }
        let before = method.instruction_count();
        if let Err(err) = request.map_instruction(method) {
            log::debug!("Lowering of {} aborted: {err}", method.name);
            return Err(err);
        }
        session.record_request_lowered(kind, method.instruction_count() - before);
    }
    log::debug!(
        "Lowered method {} into {} instructions",
        method.name,
        method.instruction_count()
    );
    session.record_function_lowered(&method.name, method.instruction_count());
    Ok(())
}

/// Lower the request streams of several methods of `module`, each looked up by name.
pub fn lower_module<'arena, I>(
    session: &CompilationSession<'arena>,
    module: &mut Module<'arena>,
    functions: impl IntoIterator<Item = (String, I)>,
) -> CompileResult<()>
where
    I: IntoIterator<Item = LlvmInstruction>,
{
    for (name, requests) in functions {
        let method = module.method_mut(&name).ok_or_else(|| CompileError::InvalidValue {
            reason: format!("no method named '{name}' in module"),
        })?;
        lower_method(session, method, requests)?;
    }
    Ok(())
}
