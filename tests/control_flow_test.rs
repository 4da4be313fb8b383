//! Test lowering of control flow: labels, branches, switches, selections, phi nodes and returns.

use bumpalo::Bump;
use qpuc::core::CompilationSession;
use qpuc::ir::{
    ComparisonPredicate, ConditionCode, DataType, Instruction, InstructionKind, Literal, LocalRef, Method,
    ParameterDecorations, Register, SetFlag, Value,
};
use qpuc::llvm::{
    lower_method, BlockLabel, Branch, LlvmInstruction, PhiNode, Selection, Switch, ValueReturn,
};
use std::collections::BTreeMap;

fn label(method: &mut Method<'_>, name: &str) -> LocalRef {
    method.add_label(name).local().cloned().unwrap()
}

fn branch_targets(method: &Method<'_>) -> Vec<(String, ConditionCode)> {
    method
        .instructions()
        .iter()
        .filter_map(|inst| match &inst.kind {
            InstructionKind::Branch { target, .. } => Some((target.name.to_string(), inst.condition)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_unconditional_branch() {
    let _ = env_logger::builder().is_test(true).try_init();

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut method = Method::new(&session, "kernel", DataType::VOID);
    let exit = label(&mut method, "%exit");

    lower_method(&session, &mut method, vec![LlvmInstruction::from(Branch::to(exit))]).unwrap();

    assert_eq!(method.instruction_count(), 1);
    assert_eq!(branch_targets(&method), vec![("%exit".to_string(), ConditionCode::Always)]);
}

#[test]
fn test_conditional_branch_uses_complementary_conditions() {
    let _ = env_logger::builder().is_test(true).try_init();

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut method = Method::new(&session, "kernel", DataType::VOID);
    let cond = method.add_parameter("%cond", DataType::BOOL, ParameterDecorations::NONE);
    let then_label = label(&mut method, "%then");
    let else_label = label(&mut method, "%else");

    let branch = Branch::conditional(cond.clone(), then_label, else_label);
    lower_method(&session, &mut method, vec![LlvmInstruction::from(branch)]).unwrap();

    assert_eq!(method.instruction_count(), 2);
    let targets = branch_targets(&method);
    assert_eq!(
        targets,
        vec![
            ("%then".to_string(), ConditionCode::ZeroClear),
            ("%else".to_string(), ConditionCode::ZeroSet),
        ]
    );
    assert!(targets[0].1.is_inversion_of(targets[1].1));
    for inst in method.instructions() {
        assert!(matches!(&inst.kind, InstructionKind::Branch { flag_source, .. } if *flag_source == cond));
    }
}

#[test]
fn test_switch_emits_case_branches_and_default() {
    let _ = env_logger::builder().is_test(true).try_init();

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut method = Method::new(&session, "kernel", DataType::VOID);
    let value = method.add_parameter("%value", DataType::INT32, ParameterDecorations::NONE);
    let default = label(&mut method, "%default");

    let mut cases = BTreeMap::new();
    for case in [7, -3, 0] {
        let target = label(&mut method, &format!("%case{case}"));
        cases.insert(case, target);
    }
    let switch = Switch::new(value.clone(), default, cases);
    lower_method(&session, &mut method, vec![LlvmInstruction::from(switch)]).unwrap();

    // N comparisons with N guarded branches, plus the default
    assert_eq!(method.instruction_count(), 3 * 2 + 1);
    let targets = branch_targets(&method);
    assert_eq!(targets.len(), 3 + 1);
    // cases in ascending order
    let names: Vec<&str> = targets.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["%case-3", "%case0", "%case7", "%default"]);
    assert_eq!(targets[3].1, ConditionCode::Always);

    match &method.instructions()[0].kind {
        InstructionKind::Comparison { predicate, first, second, .. } => {
            assert_eq!(*predicate, ComparisonPredicate::EQ);
            assert_eq!(first, &value);
            assert!(second.has_literal(Literal::Int(-3)));
        }
        other => panic!("expected comparison, got {other:?}"),
    }
    assert_eq!(session.stats().request_counts["switch"], 1);
}

#[test]
fn test_scalar_selection_sets_flags_directly() {
    let _ = env_logger::builder().is_test(true).try_init();

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut method = Method::new(&session, "kernel", DataType::VOID);
    let cond = method.add_parameter("%cond", DataType::BOOL, ParameterDecorations::NONE);
    let a = method.add_parameter("%a", DataType::INT32, ParameterDecorations::NONE);
    let b = method.add_parameter("%b", DataType::INT32, ParameterDecorations::NONE);
    let out = method.find_or_create_local(DataType::INT32, "%out");

    let selection = Selection::new(out.clone(), cond.clone(), a.clone(), b.clone());
    lower_method(&session, &mut method, vec![LlvmInstruction::from(selection)]).unwrap();

    assert_eq!(
        method.instructions(),
        &[
            Instruction::mov(Value::nop(DataType::BOOL), cond).with_set_flags(),
            Instruction::mov(out.clone(), a).with_condition(ConditionCode::ZeroClear),
            Instruction::mov(out, b).with_condition(ConditionCode::ZeroSet),
        ]
    );
}

#[test]
fn test_vector_selection_replicates_scalar_condition() {
    let _ = env_logger::builder().is_test(true).try_init();

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut method = Method::new(&session, "kernel", DataType::VOID);
    let ty = DataType::FLOAT.to_vector(16);
    let cond = method.add_parameter("%cond", DataType::BOOL, ParameterDecorations::NONE);
    let a = method.add_parameter("%a", ty.clone(), ParameterDecorations::NONE);
    let b = method.add_parameter("%b", ty.clone(), ParameterDecorations::NONE);
    let out = method.find_or_create_local(ty, "%out");

    let selection = Selection::new(out, cond.clone(), a, b);
    lower_method(&session, &mut method, vec![LlvmInstruction::from(selection)]).unwrap();

    let insts = method.instructions();
    assert_eq!(insts.len(), 4);
    // replicate first, then set the flags from the replicated value
    match &insts[0].kind {
        InstructionKind::Move { dest, source } => {
            assert!(dest.has_register(Register::ReplicateAll));
            assert_eq!(source, &cond);
        }
        other => panic!("expected replication, got {other:?}"),
    }
    assert_eq!(insts[0].set_flags, SetFlag::DontSet);
    assert!(matches!(&insts[1].kind, InstructionKind::Move { source, .. } if source.has_register(Register::ReplicateAll)));
    assert_eq!(insts[1].set_flags, SetFlag::SetFlags);
    assert_eq!(insts[2].condition, ConditionCode::ZeroClear);
    assert_eq!(insts[3].condition, ConditionCode::ZeroSet);
}

#[test]
fn test_labels_phi_and_return() {
    let _ = env_logger::builder().is_test(true).try_init();

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut method = Method::new(&session, "kernel", DataType::INT32);
    let entry = label(&mut method, "%entry");
    let left = label(&mut method, "%left");
    let right = label(&mut method, "%right");
    let out = method.find_or_create_local(DataType::INT32, "%out");

    let incoming = vec![(Value::int(1), left.clone()), (Value::int(2), right.clone())];
    let requests = vec![
        LlvmInstruction::from(BlockLabel::new(entry.clone())),
        LlvmInstruction::from(PhiNode::new(out.clone(), incoming.clone())),
        LlvmInstruction::from(ValueReturn::new(Some(out.clone()))),
        LlvmInstruction::from(ValueReturn::new(None)),
    ];
    lower_method(&session, &mut method, requests).unwrap();

    let insts = method.instructions();
    assert_eq!(insts[0].kind, InstructionKind::Label { label: entry });
    assert_eq!(insts[1].kind, InstructionKind::Phi { dest: out.clone(), incoming });
    assert_eq!(insts[2].kind, InstructionKind::Return { value: Some(out) });
    assert_eq!(insts[3].kind, InstructionKind::Return { value: None });

    let stats = session.stats();
    assert_eq!(stats.functions_lowered, 1);
    assert_eq!(stats.instructions_emitted, 4);
    assert_eq!(stats.largest_function_name, "kernel");
}
