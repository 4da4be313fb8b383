//! Test lowering of llvm.lifetime.start / llvm.lifetime.end.
//!
//! The marker must end up on the stack allocation it refers to, whether the pointer is the
//! allocation itself, a move (bit-cast) of it, or an address derived from it.

use bumpalo::Bump;
use qpuc::core::{CompilationSession, CompileError};
use qpuc::ir::{DataType, Instruction, InstructionKind, LocalReference, Method, ParameterDecorations, Value};
use qpuc::llvm::{lower_method, CallSite, LlvmInstruction};

fn lifetime(name: &str, size: i32, pointer: Value) -> LlvmInstruction {
    LlvmInstruction::from(CallSite::void(
        name,
        DataType::VOID,
        vec![Value::int(size), pointer],
    ))
}

fn boundary(method: &Method<'_>, index: usize) -> (Value, bool) {
    match &method.instructions()[index].kind {
        InstructionKind::LifetimeBoundary { allocation, is_end } => (allocation.clone(), *is_end),
        other => panic!("expected lifetime boundary, got {other:?}"),
    }
}

#[test]
fn test_stack_allocation_is_used_directly() {
    let _ = env_logger::builder().is_test(true).try_init();

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut method = Method::new(&session, "kernel", DataType::VOID);
    let buffer = method.add_stack_allocation("%buffer", DataType::array_of(DataType::INT8, 16));

    let requests = vec![
        lifetime("llvm.lifetime.start.p0i8", 16, buffer.clone()),
        lifetime("llvm.lifetime.end.p0i8", 16, buffer.clone()),
    ];
    lower_method(&session, &mut method, requests).unwrap();

    assert_eq!(boundary(&method, 0), (buffer.clone(), false));
    assert_eq!(boundary(&method, 1), (buffer, true));
}

#[test]
fn test_trace_through_single_move() {
    let _ = env_logger::builder().is_test(true).try_init();

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut method = Method::new(&session, "kernel", DataType::VOID);
    let buffer = method.add_stack_allocation("%buffer", DataType::array_of(DataType::INT32, 4));
    let cast = method.find_or_create_local(DataType::pointer_to(DataType::INT8), "%cast");
    method.append_to_end(Instruction::mov(cast.clone(), buffer.clone()));

    lower_method(
        &session,
        &mut method,
        vec![lifetime("llvm.lifetime.start.p0i8", 16, cast)],
    )
    .unwrap();

    assert_eq!(boundary(&method, 1), (buffer, false));
}

#[test]
fn test_trace_through_reference() {
    let _ = env_logger::builder().is_test(true).try_init();

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut method = Method::new(&session, "kernel", DataType::VOID);
    let buffer = method.add_stack_allocation("%buffer", DataType::array_of(DataType::INT32, 4));
    let element = method.find_or_create_local(DataType::pointer_to(DataType::INT32), "%element");
    method.set_reference(
        element.local_id().unwrap(),
        LocalReference {
            base: buffer.local_id().unwrap(),
            offset: Some(0),
        },
    );

    lower_method(
        &session,
        &mut method,
        vec![lifetime("llvm.lifetime.end.p0i8", 16, element)],
    )
    .unwrap();

    assert_eq!(boundary(&method, 0), (buffer, true));
}

#[test]
fn test_parameter_with_positive_size_fails() {
    let _ = env_logger::builder().is_test(true).try_init();

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut method = Method::new(&session, "kernel", DataType::VOID);
    let param = method.add_parameter("%arg", DataType::pointer_to(DataType::INT8), ParameterDecorations::NONE);

    let err = lower_method(
        &session,
        &mut method,
        vec![lifetime("llvm.lifetime.start.p0i8", 8, param.clone())],
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::NonStackLifetime { ref operand } if operand.contains("%arg")));
    assert!(err.to_string().contains("not located on stack"));

    // a variable-sized object (-1) is not checked
    lower_method(
        &session,
        &mut method,
        vec![lifetime("llvm.lifetime.start.p0i8", -1, param.clone())],
    )
    .unwrap();
    assert_eq!(boundary(&method, 0), (param, false));
}

#[test]
fn test_size_must_be_literal() {
    let _ = env_logger::builder().is_test(true).try_init();

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut method = Method::new(&session, "kernel", DataType::VOID);
    let buffer = method.add_stack_allocation("%buffer", DataType::INT32);
    let size = method.add_parameter("%size", DataType::INT32, ParameterDecorations::NONE);

    let call = CallSite::void("llvm.lifetime.start.p0i8", DataType::VOID, vec![size, buffer]);
    let err = lower_method(&session, &mut method, vec![LlvmInstruction::from(call)]).unwrap_err();
    assert!(matches!(err, CompileError::MissingLiteral { .. }));
}
