//! Test intrinsic recognition in call lowering.
//!
//! memcpy, memset, fmuladd, bswap, shuffle2 and the memory fences must be replaced by
//! dedicated instructions instead of a method call.

use bumpalo::Bump;
use qpuc::core::{CompilationSession, CompileError};
use qpuc::ir::opcodes::{OP_FADD, OP_FMUL};
use qpuc::ir::{
    DataType, Instruction, InstructionKind, Literal, LocalReference, MemoryOperation, MemoryScope, MemorySemantics,
    Method, ParameterDecorations, Value,
};
use qpuc::llvm::{lower_method, CallSite, LlvmInstruction};

fn byte_pointer() -> DataType {
    DataType::pointer_to(DataType::INT8)
}

#[test]
fn test_memcpy_ignores_trailing_arguments() {
    let _ = env_logger::builder().is_test(true).try_init();

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut method = Method::new(&session, "kernel", DataType::VOID);
    let dst = method.add_parameter("%dst", byte_pointer(), ParameterDecorations::NONE);
    let src = method.add_parameter("%src", byte_pointer(), ParameterDecorations::NONE);

    let call = CallSite::void(
        "llvm.memcpy.p0i8.p0i8.i32",
        DataType::VOID,
        vec![dst.clone(), src.clone(), Value::int(64), Value::int(4), Value::bool(false)],
    );
    lower_method(&session, &mut method, vec![LlvmInstruction::from(call)]).unwrap();

    assert_eq!(
        method.instructions(),
        &[Instruction::memory(MemoryOperation::Copy, dst, src, Value::int(64))]
    );
    assert_eq!(session.stats().intrinsics_recognized, 1);
}

#[test]
fn test_volatile_memset_marks_parameter() {
    let _ = env_logger::builder().is_test(true).try_init();

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut method = Method::new(&session, "kernel", DataType::VOID);
    let param = method.add_parameter("%out", DataType::pointer_to(DataType::INT32), ParameterDecorations::NONE);
    let other = method.add_parameter("%other", byte_pointer(), ParameterDecorations::NONE);
    // %cast = bitcast i32* %out to i8*
    let cast = method.find_or_create_local(byte_pointer(), "%cast");
    method.set_reference(
        cast.local_id().unwrap(),
        LocalReference {
            base: param.local_id().unwrap(),
            offset: Some(0),
        },
    );

    let fill = Value::literal(Literal::Int(0), DataType::INT8);
    let requests = vec![
        LlvmInstruction::from(CallSite::void(
            "llvm.memset.p0i8.i32",
            DataType::VOID,
            vec![cast.clone(), fill.clone(), Value::int(16), Value::bool(true)],
        )),
        LlvmInstruction::from(CallSite::void(
            "llvm.memset.p0i8.i32",
            DataType::VOID,
            vec![other.clone(), fill.clone(), Value::int(16), Value::bool(false)],
        )),
    ];
    lower_method(&session, &mut method, requests).unwrap();

    let decorations: Vec<_> = method.parameters().map(|p| p.parameter_decorations()).collect();
    assert_eq!(
        decorations,
        vec![Some(ParameterDecorations::VOLATILE), Some(ParameterDecorations::NONE)]
    );
    assert_eq!(
        method.instructions()[0],
        Instruction::memory(MemoryOperation::Fill, cast, fill, Value::int(16))
    );
    assert_eq!(method.instruction_count(), 2);
}

#[test]
fn test_memset_requires_literal_volatile_flag() {
    let _ = env_logger::builder().is_test(true).try_init();

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut method = Method::new(&session, "kernel", DataType::VOID);
    let dst = method.add_parameter("%dst", byte_pointer(), ParameterDecorations::NONE);
    let flag = method.add_parameter("%flag", DataType::BOOL, ParameterDecorations::NONE);

    let call = CallSite::void(
        "llvm.memset.p0i8.i32",
        DataType::VOID,
        vec![dst, Value::int(0), Value::int(4), flag],
    );
    let err = lower_method(&session, &mut method, vec![LlvmInstruction::from(call)]).unwrap_err();
    assert!(matches!(err, CompileError::MissingLiteral { ref operand, .. } if operand.contains("%flag")));
}

#[test]
fn test_fmuladd_expands_to_multiply_and_add() {
    let _ = env_logger::builder().is_test(true).try_init();

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut method = Method::new(&session, "kernel", DataType::VOID);
    let a = method.add_parameter("%a", DataType::FLOAT, ParameterDecorations::NONE);
    let b = method.add_parameter("%b", DataType::FLOAT, ParameterDecorations::NONE);
    let c = method.add_parameter("%c", DataType::FLOAT, ParameterDecorations::NONE);
    let out = method.find_or_create_local(DataType::FLOAT, "%out");

    let call = CallSite::new(out.clone(), "llvm.fmuladd.f32", vec![a.clone(), b.clone(), c.clone()]);
    lower_method(&session, &mut method, vec![LlvmInstruction::from(call)]).unwrap();

    let insts = method.instructions();
    assert_eq!(insts.len(), 2);
    let tmp = match &insts[0].kind {
        InstructionKind::Operation { op, dest, first, second } => {
            assert_eq!(*op, OP_FMUL);
            assert_eq!((first, second), (&a, &Some(b)));
            dest.clone()
        }
        other => panic!("expected fmul, got {other:?}"),
    };
    assert!(tmp.local().is_some_and(|local| local.name.starts_with("%fmuladd")));
    assert_eq!(insts[1], Instruction::operation(OP_FADD, out, tmp, Some(c)));
}

#[test]
fn test_bswap_writes_to_discard_register_when_unused() {
    let _ = env_logger::builder().is_test(true).try_init();

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut method = Method::new(&session, "kernel", DataType::VOID);
    let x = method.add_parameter("%x", DataType::INT16, ParameterDecorations::NONE);

    let call = CallSite::void("llvm.bswap.i16", DataType::INT16, vec![x]);
    lower_method(&session, &mut method, vec![LlvmInstruction::from(call)]).unwrap();

    assert_eq!(method.instruction_count(), 5);
    assert_eq!(
        method.instructions().last().and_then(Instruction::output),
        Some(&Value::nop(DataType::INT16))
    );
}

#[test]
fn test_fences_become_barriers() {
    let _ = env_logger::builder().is_test(true).try_init();

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut method = Method::new(&session, "kernel", DataType::VOID);

    let names = ["mem_fence", "read_mem_fence", "_Z15write_mem_fencej"];
    let requests = names
        .iter()
        .map(|name| LlvmInstruction::from(CallSite::void(*name, DataType::VOID, vec![Value::int(2)])));
    lower_method(&session, &mut method, requests).unwrap();

    assert_eq!(method.instruction_count(), 3);
    for inst in method.instructions() {
        assert_eq!(
            inst.kind,
            InstructionKind::MemoryBarrier {
                scope: MemoryScope::WorkGroup,
                semantics: MemorySemantics::AcquireRelease,
            }
        );
    }
    assert_eq!(session.stats().intrinsics_recognized, 3);
}

#[test]
fn test_fence_scope_out_of_range() {
    let _ = env_logger::builder().is_test(true).try_init();

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut method = Method::new(&session, "kernel", DataType::VOID);

    let call = CallSite::void("mem_fence", DataType::VOID, vec![Value::int(17)]);
    let err = lower_method(&session, &mut method, vec![LlvmInstruction::from(call)]).unwrap_err();
    assert!(matches!(err, CompileError::InvalidValue { .. }));
}

#[test]
fn test_shuffle2_uses_vector_shuffle() {
    let _ = env_logger::builder().is_test(true).try_init();

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut method = Method::new(&session, "kernel", DataType::VOID);
    let ty = DataType::FLOAT.to_vector(4);
    let a = method.add_parameter("%a", ty.clone(), ParameterDecorations::NONE);
    let b = method.add_parameter("%b", ty.clone(), ParameterDecorations::NONE);
    let out = method.find_or_create_local(ty, "%out");
    let mask = Value::container(
        (0..4).map(Value::int).collect(),
        DataType::INT32.to_vector(4),
    );

    let call = CallSite::new(out.clone(), "_Z8shuffle2Dv4_fS_Dv4_j", vec![a.clone(), b, mask]);
    lower_method(&session, &mut method, vec![LlvmInstruction::from(call)]).unwrap();

    // the identity mask over the first vector is a plain move
    assert_eq!(method.instructions(), &[Instruction::mov(out, a)]);
}

#[test]
fn test_missing_operand_is_reported() {
    let _ = env_logger::builder().is_test(true).try_init();

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut method = Method::new(&session, "kernel", DataType::VOID);

    let call = CallSite::void("llvm.memcpy.p0i8.p0i8.i32", DataType::VOID, vec![Value::int(0)]);
    let err = lower_method(&session, &mut method, vec![LlvmInstruction::from(call)]).unwrap_err();
    assert_eq!(
        err,
        CompileError::MissingOperand {
            name: "llvm.memcpy.p0i8.p0i8.i32".to_string(),
            index: 1,
            count: 1
        }
    );
}
