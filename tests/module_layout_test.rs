//! Test the global-data segment layout and module-level lowering.

use bumpalo::Bump;
use qpuc::core::{CompilationSession, CompileError, Configuration};
use qpuc::ir::{DataType, Literal, Method, Module, Value};
use qpuc::llvm::{lower_module, LlvmInstruction, ValueReturn};

fn scalar(literal: i32, ty: DataType) -> Value {
    Value::literal(Literal::Int(literal), ty)
}

#[test]
fn test_global_offsets_are_aligned() {
    let _ = env_logger::builder().is_test(true).try_init();

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut module = Module::new(&session);
    let a = module.add_global("@a", scalar(1, DataType::INT8), true);
    let b = module.add_global("@b", scalar(2, DataType::INT32), false);
    let c = module.add_global("@c", scalar(3, DataType::INT16), false);

    assert_eq!(module.global_data_offset(Some(&a)), Some(0));
    // padded up to the alignment of i32
    assert_eq!(module.global_data_offset(Some(&b)), Some(4));
    assert_eq!(module.global_data_offset(Some(&c)), Some(8));
    // 10 bytes of data, aligned to 8
    assert_eq!(module.global_data_offset(None), Some(16));
    assert_eq!(module.global_data_offset(Some(&Value::int(0))), Some(16));
    assert_eq!(module.globals().len(), 3);
}

#[test]
fn test_vector_global_alignment() {
    let _ = env_logger::builder().is_test(true).try_init();

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut module = Module::new(&session);
    module.add_global("@flag", scalar(1, DataType::INT8), true);
    let ty = DataType::FLOAT.to_vector(4);
    let vector = module.add_global(
        "@vector",
        Value::container(vec![Value::literal(Literal::Real(1.0), DataType::FLOAT); 4], ty),
        true,
    );

    assert_eq!(module.global_data_offset(Some(&vector)), Some(16));
    assert_eq!(module.global_data_offset(None), Some(32));
}

#[test]
fn test_foreign_global_has_no_offset() {
    let _ = env_logger::builder().is_test(true).try_init();

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut module = Module::new(&session);
    module.add_global("@only", scalar(0, DataType::INT32), true);

    let mut other = Module::new(&session);
    other.add_global("@x", scalar(0, DataType::INT32), true);
    let foreign = other.add_global("@y", scalar(0, DataType::INT32), true);

    assert_eq!(module.global_data_offset(Some(&foreign)), None);
}

#[test]
fn test_foreign_global_with_colliding_index() {
    let _ = env_logger::builder().is_test(true).try_init();

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut module = Module::new(&session);
    let first = module.add_global("@first", scalar(0, DataType::INT32), true);
    module.add_global("@second", scalar(0, DataType::INT32), true);

    let mut other = Module::new(&session);
    // same index as @first, but declared by another module
    let foreign = other.add_global("@other", scalar(0, DataType::INT32), true);

    assert_ne!(module.id(), other.id());
    assert_ne!(foreign, first);
    assert_eq!(module.global_data_offset(Some(&foreign)), None);
    assert!(module.global(foreign.global().unwrap()).is_none());
    assert_eq!(module.global_data_offset(Some(&first)), Some(0));
    assert_eq!(other.global_data_offset(Some(&foreign)), Some(0));
}

#[test]
fn test_three_element_vector_global_is_padded() {
    let _ = env_logger::builder().is_test(true).try_init();

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut module = Module::new(&session);
    let ty = DataType::FLOAT.to_vector(3);
    module.add_global(
        "@position",
        Value::container(vec![Value::literal(Literal::Real(0.0), DataType::FLOAT); 3], ty),
        true,
    );
    let after = module.add_global("@after", scalar(1, DataType::INT32), true);

    assert_eq!(module.global_data_offset(Some(&after)), Some(16));
    assert_eq!(module.global_data_offset(None), Some(24));
}

#[test]
fn test_segment_alignment_is_configurable() {
    let _ = env_logger::builder().is_test(true).try_init();

    let arena = Bump::new();
    let config = Configuration {
        global_segment_alignment: 64,
        ..Configuration::default()
    };
    let session = CompilationSession::with_config(&arena, config);
    let mut module = Module::new(&session);
    module.add_global("@a", scalar(1, DataType::INT32), true);

    assert_eq!(module.global_data_offset(None), Some(64));
}

#[test]
fn test_lower_module_by_method_name() {
    let _ = env_logger::builder().is_test(true).try_init();

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut module = Module::new(&session);
    module.add_method(Method::new(&session, "first", DataType::VOID));
    module.add_method(Method::new(&session, "second", DataType::VOID));

    let ret = || vec![LlvmInstruction::from(ValueReturn::new(None))];
    lower_module(
        &session,
        &mut module,
        vec![("second".to_string(), ret()), ("first".to_string(), ret())],
    )
    .unwrap();

    assert_eq!(module.method("first").map(Method::instruction_count), Some(1));
    assert_eq!(module.method("second").map(Method::instruction_count), Some(1));
    assert_eq!(session.stats().functions_lowered, 2);

    let err = lower_module(&session, &mut module, vec![("missing".to_string(), ret())]).unwrap_err();
    assert!(matches!(err, CompileError::InvalidValue { ref reason } if reason.contains("missing")));
}
