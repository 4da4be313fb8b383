// This module recognises calls the backend implements with dedicated instructions instead of a
// real method call. Classification is data driven: INTRINSICS is an ordered table of name
// patterns (prefix, exact name, or Itanium-mangled identifier) and the first matching entry
// wins. Handlers then expand the call: lifetime markers become lifetime boundaries on the
// underlying stack allocation (traced through a single move or a direct provenance link),
// fused multiply-add becomes fmul + fadd, memcpy and memset become memory copy and fill
// instructions (a volatile memset through a parameter marks that parameter volatile), bswap
// expands into shifts and masks, OpenCL shuffle2 reuses the vector-shuffle expansion, and the
// mem_fence family becomes one acquire-release memory barrier. Operands a handler requires to
// be literal are checked and reported as errors, never silently ignored.

//! Intrinsic recognition for call lowering.

use super::instruction::CallSite;
use crate::core::error::{CompileError, CompileResult};
use crate::ir::helpers;
use crate::ir::opcodes::{OP_FADD, OP_FMUL};
use crate::ir::{
    Instruction, InstructionKind, Literal, MemoryOperation, MemoryScope, MemorySemantics, Method,
    ParameterDecorations, Value,
};
use lazy_static::lazy_static;
use regex::Regex;

/// Calls lowered to dedicated instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    LifetimeStart,
    LifetimeEnd,
    FusedMultiplyAdd,
    MemoryCopy,
    MemorySet,
    ByteSwap,
    Shuffle2,
    MemoryFence,
}

#[derive(Debug, Clone, Copy)]
enum NamePattern {
    Prefix(&'static str),
    Exact(&'static str),
    /// A free function with this identifier, mangled for any parameter types.
    Mangled(&'static str),
}

lazy_static! {
    /// `_Z<length><identifier><parameter types>`
    static ref MANGLED_NAME: Regex = Regex::new(r"^_Z(\d+)(\w+)$").unwrap();
}

impl NamePattern {
    fn matches(self, name: &str) -> bool {
        match self {
            NamePattern::Prefix(prefix) => name.starts_with(prefix),
            NamePattern::Exact(exact) => name == exact,
            NamePattern::Mangled(identifier) => demangled_identifier(name) == Some(identifier),
        }
    }
}

fn demangled_identifier(name: &str) -> Option<&str> {
    let captures = MANGLED_NAME.captures(name)?;
    let length: usize = captures.get(1)?.as_str().parse().ok()?;
    captures.get(2)?.as_str().get(..length)
}

/// Ordered by priority, the first match wins.
const INTRINSICS: &[(NamePattern, Intrinsic)] = &[
    (NamePattern::Prefix("llvm.lifetime.start"), Intrinsic::LifetimeStart),
    (NamePattern::Prefix("llvm.lifetime.end"), Intrinsic::LifetimeEnd),
    (NamePattern::Prefix("llvm.fmuladd"), Intrinsic::FusedMultiplyAdd),
    (NamePattern::Prefix("llvm.memcpy"), Intrinsic::MemoryCopy),
    (NamePattern::Prefix("llvm.memset"), Intrinsic::MemorySet),
    (NamePattern::Prefix("llvm.bswap"), Intrinsic::ByteSwap),
    (NamePattern::Prefix("shuffle2"), Intrinsic::Shuffle2),
    (NamePattern::Mangled("shuffle2"), Intrinsic::Shuffle2),
    // the OpenCL runtime routes read and write fences through mem_fence, so they share one barrier
    (NamePattern::Exact("mem_fence"), Intrinsic::MemoryFence),
    (NamePattern::Exact("read_mem_fence"), Intrinsic::MemoryFence),
    (NamePattern::Exact("write_mem_fence"), Intrinsic::MemoryFence),
    (NamePattern::Mangled("mem_fence"), Intrinsic::MemoryFence),
    (NamePattern::Mangled("read_mem_fence"), Intrinsic::MemoryFence),
    (NamePattern::Mangled("write_mem_fence"), Intrinsic::MemoryFence),
];

/// The intrinsic a call to `name` is lowered as, if any.
pub fn classify(name: &str) -> Option<Intrinsic> {
    INTRINSICS
        .iter()
        .find(|(pattern, _)| pattern.matches(name))
        .map(|(_, intrinsic)| *intrinsic)
}

fn require_literal(call: &CallSite, operand: &Value) -> CompileResult<Literal> {
    operand.literal_value().ok_or_else(|| CompileError::MissingLiteral {
        intrinsic: call.method_name().to_string(),
        operand: operand.to_string(),
    })
}

/// Append the instructions implementing `call` as `intrinsic`.
pub(crate) fn lower_intrinsic(method: &mut Method<'_>, call: &CallSite, intrinsic: Intrinsic) -> CompileResult<()> {
    match intrinsic {
        Intrinsic::LifetimeStart | Intrinsic::LifetimeEnd => {
            lower_lifetime(method, call, intrinsic == Intrinsic::LifetimeEnd)
        }
        Intrinsic::FusedMultiplyAdd => {
            log::debug!("Converting intrinsic method call '{}' to operations", call.method_name());
            let tmp = method.add_new_local(call.dest().ty.clone(), "%fmuladd");
            method.append_to_end(Instruction::operation(
                OP_FMUL,
                tmp.clone(),
                call.argument(0)?.clone(),
                Some(call.argument(1)?.clone()),
            ));
            method.append_to_end(Instruction::operation(
                OP_FADD,
                call.output(),
                tmp,
                Some(call.argument(2)?.clone()),
            ));
            Ok(())
        }
        Intrinsic::MemoryCopy => {
            log::debug!("Intrinsifying llvm.memcpy function-call");
            // the operands are i8 pointers, so the byte length is the element count
            method.append_to_end(Instruction::memory(
                MemoryOperation::Copy,
                call.argument(0)?.clone(),
                call.argument(1)?.clone(),
                call.argument(2)?.clone(),
            ));
            Ok(())
        }
        Intrinsic::MemorySet => lower_memset(method, call),
        Intrinsic::ByteSwap => {
            log::debug!("Intrinsifying llvm.bswap with manual byte-swapping");
            helpers::insert_byte_swap(method, call.argument(0)?, &call.output())
        }
        Intrinsic::Shuffle2 => {
            let (first, second, mask) = (call.argument(0)?, call.argument(1)?, call.argument(2)?);
            log::debug!("Intrinsifying OpenCL shuffle2 function with {first}, {second} and mask {mask}");
            helpers::insert_vector_shuffle(method, &call.output(), first, second, mask)
        }
        Intrinsic::MemoryFence => {
            log::debug!("Intrinsifying '{}' with memory barrier", call.method_name());
            let flags = call.argument(0)?;
            let raw = require_literal(call, flags)?.unsigned_int();
            let scope = MemoryScope::try_from(raw).map_err(|raw| CompileError::InvalidValue {
                reason: format!("memory scope {raw} of '{}' out of range", call.method_name()),
            })?;
            method.append_to_end(Instruction::new(InstructionKind::MemoryBarrier {
                scope,
                semantics: MemorySemantics::AcquireRelease,
            }));
            Ok(())
        }
    }
}

/// `llvm.lifetime.{start,end}(i64 size, i8* pointer)`
fn lower_lifetime(method: &mut Method<'_>, call: &CallSite, is_end: bool) -> CompileResult<()> {
    let size = require_literal(call, call.argument(0)?)?;
    let mut pointer = call.argument(1)?.clone();
    if let Some(id) = pointer.local_id() {
        if !method.local(id).is_stack_allocation() {
            // the marker usually refers to a bit-cast or a zero-index address of the allocation
            let moved = match method.single_writer(id).map(|inst| &inst.kind) {
                Some(InstructionKind::Move { source, .. }) => Some(source.clone()),
                _ => None,
            };
            if let Some(source) = moved {
                pointer = source;
            } else if let Some(base) = method
                .local(id)
                .referenced()
                .filter(|base| method.local(*base).is_stack_allocation())
            {
                pointer = method.value_of(base);
            }
        }
    }
    log::debug!("Converting life-time intrinsic to life-time instruction");
    // a size of -1 marks a variable-sized object
    let is_stack = pointer
        .local_id()
        .is_some_and(|id| method.local(id).is_stack_allocation());
    if size.signed_int() > 0 && !is_stack {
        return Err(CompileError::NonStackLifetime {
            operand: pointer.to_string(),
        });
    }
    method.append_to_end(Instruction::new(InstructionKind::LifetimeBoundary {
        allocation: pointer,
        is_end,
    }));
    Ok(())
}

/// `llvm.memset(i8* dest, i8 value, i32 length, [i32 align,] i1 volatile)`
fn lower_memset(method: &mut Method<'_>, call: &CallSite) -> CompileResult<()> {
    log::debug!("Intrinsifying llvm.memset with DMA writes");
    let (dest, fill, length) = (call.argument(0)?, call.argument(1)?, call.argument(2)?);
    let volatile = call.arguments().last().ok_or_else(|| CompileError::MissingOperand {
        name: call.method_name().to_string(),
        index: 3,
        count: 0,
    })?;
    if require_literal(call, volatile)?.is_true() {
        if let Some(id) = dest.local_id() {
            let base = method.base_of(id);
            if method.add_parameter_decoration(base, ParameterDecorations::VOLATILE) {
                log::debug!("Marking parameter {} as volatile", method.local(base).name);
            }
        }
    }
    method.append_to_end(Instruction::memory(
        MemoryOperation::Fill,
        dest.clone(),
        fill.clone(),
        length.clone(),
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_prefixes() {
        assert_eq!(classify("llvm.lifetime.start.p0i8"), Some(Intrinsic::LifetimeStart));
        assert_eq!(classify("llvm.lifetime.end"), Some(Intrinsic::LifetimeEnd));
        assert_eq!(classify("llvm.memcpy.p0i8.p0i8.i32"), Some(Intrinsic::MemoryCopy));
        assert_eq!(classify("llvm.memset.p0i8.i64"), Some(Intrinsic::MemorySet));
        assert_eq!(classify("llvm.fmuladd.f32"), Some(Intrinsic::FusedMultiplyAdd));
        assert_eq!(classify("llvm.bswap.i16"), Some(Intrinsic::ByteSwap));
        assert_eq!(classify("llvm.memmove.p0i8.p0i8.i32"), None);
    }

    #[test]
    fn test_classify_fences() {
        assert_eq!(classify("mem_fence"), Some(Intrinsic::MemoryFence));
        assert_eq!(classify("read_mem_fence"), Some(Intrinsic::MemoryFence));
        assert_eq!(classify("_Z9mem_fencej"), Some(Intrinsic::MemoryFence));
        assert_eq!(classify("_Z15write_mem_fencej"), Some(Intrinsic::MemoryFence));
        // exact names only, and the mangled length must cover the identifier
        assert_eq!(classify("mem_fence_impl"), None);
        assert_eq!(classify("_Z14mem_fence_implj"), None);
        assert_eq!(classify("_Z8shuffle2Dv4_fS_Dv4_j"), Some(Intrinsic::Shuffle2));
    }

    #[test]
    fn test_demangled_identifier() {
        assert_eq!(demangled_identifier("_Z9mem_fencej"), Some("mem_fence"));
        assert_eq!(demangled_identifier("_Z99abc"), None);
        assert_eq!(demangled_identifier("mem_fence"), None);
    }
}
