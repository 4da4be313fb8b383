// This module defines the lowering requests the LLVM IR front end produces, one per source
// construct: calls, copies (moves, bit-casts, loads and stores), unary and binary operators,
// address calculations, comparisons, container insertion and extraction, returns, vector
// shuffles, labels, phi nodes, selections, branches and switches. LlvmInstruction is a closed
// sum type; each request is consumed exactly once by map_instruction, which appends the
// canonical instructions implementing it to the method's stream. Calls are first offered to
// the intrinsic recognizer and only become a generic method call if no intrinsic matches.
// Requests carry exactly the operands their expansion needs plus the decoration set the front
// end attached; the only state they touch besides the appended instructions is the parameter
// decoration set memset lowering may amend.

//! Lowering requests and their expansion into canonical instructions.

use super::intrinsics;
use crate::core::error::{CompileError, CompileResult};
use crate::ir::helpers;
use crate::ir::{
    ComparisonPredicate, ConditionCode, Instruction, InstructionDecorations, InstructionKind, Literal,
    LocalRef, MemoryOperation, Method, OpCode, Value,
};
use std::collections::BTreeMap;

/// A call site, either to an intrinsic or to another method.
#[derive(Debug, Clone)]
pub struct CallSite {
    /// Result of the call. A non-local value means the result is discarded.
    dest: Value,
    method_name: String,
    arguments: Vec<Value>,
    decorations: InstructionDecorations,
}

impl CallSite {
    /// A call to `method_name` whose result is written into `dest`.
    pub fn new(dest: Value, method_name: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            dest,
            method_name: method_name.into(),
            arguments,
            decorations: InstructionDecorations::NONE,
        }
    }

    /// A call to `method_name` whose result (of `return_type`) is not used.
    pub fn void(method_name: impl Into<String>, return_type: crate::ir::DataType, arguments: Vec<Value>) -> Self {
        Self::new(Value::nop(return_type), method_name, arguments)
    }

    /// A call to a known `method`, checked against its signature.
    ///
    /// Without a `dest` the result is discarded.
    pub fn to_method(dest: Option<Value>, method: &Method<'_>, arguments: Vec<Value>) -> CompileResult<Self> {
        let expected = method.parameter_ids().len();
        if expected != arguments.len() {
            return Err(CompileError::ArgumentCountMismatch {
                name: method.name.clone(),
                expected,
                actual: arguments.len(),
            });
        }
        let dest = dest.unwrap_or_else(|| Value::nop(method.return_type.clone()));
        Ok(Self::new(dest, method.name.clone(), arguments))
    }

    #[must_use]
    pub fn with_decorations(mut self, decorations: InstructionDecorations) -> Self {
        self.decorations = decorations;
        self
    }

    pub fn dest(&self) -> &Value {
        &self.dest
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    /// The value the call writes: the destination if it is a local, the discard register otherwise.
    pub(crate) fn output(&self) -> Value {
        if self.dest.check_local() {
            self.dest.clone()
        } else {
            Value::nop(self.dest.ty.clone())
        }
    }

    /// Argument `index`, or an error naming the call if there are fewer arguments.
    pub(crate) fn argument(&self, index: usize) -> CompileResult<&Value> {
        self.arguments.get(index).ok_or_else(|| CompileError::MissingOperand {
            name: self.method_name.clone(),
            index,
            count: self.arguments.len(),
        })
    }

    fn map_instruction(self, method: &mut Method<'_>) -> CompileResult<()> {
        if let Some(intrinsic) = intrinsics::classify(&self.method_name) {
            return intrinsics::lower_intrinsic(method, &self, intrinsic);
        }
        log::debug!(
            "Generating immediate call to {} -> {}",
            self.method_name,
            self.dest.ty
        );
        let dest = self.dest.check_local().then_some(self.dest);
        method.append_to_end(
            Instruction::new(InstructionKind::MethodCall {
                dest,
                name: self.method_name,
                arguments: self.arguments,
            })
            .add_decorations(self.decorations),
        );
        Ok(())
    }
}

/// How a [`CopyValue`] transfers its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMode {
    /// Register-to-register move.
    Move,
    /// Reinterpret the bits as the destination type.
    Bitcast,
    /// `dest = *source`
    Load,
    /// `*dest = source`
    Store,
}

#[derive(Debug, Clone)]
pub struct CopyValue {
    pub dest: Value,
    pub source: Value,
    pub mode: CopyMode,
}

impl CopyValue {
    pub fn new(dest: Value, source: Value, mode: CopyMode) -> Self {
        Self { dest, source, mode }
    }

    fn map_instruction(self, method: &mut Method<'_>) -> CompileResult<()> {
        match self.mode {
            CopyMode::Bitcast => {
                log::debug!("Generating bit-cast from {} into {}", self.source, self.dest);
                helpers::insert_bitcast(method, &self.source, &self.dest)?;
            }
            CopyMode::Load => {
                log::debug!("Generating reading from {} into {}", self.source, self.dest);
                method.append_to_end(Instruction::memory(
                    MemoryOperation::Read,
                    self.dest,
                    self.source,
                    Value::int(1),
                ));
            }
            CopyMode::Store => {
                log::debug!("Generating writing of {} into {}", self.source, self.dest);
                method.append_to_end(Instruction::memory(
                    MemoryOperation::Write,
                    self.dest,
                    self.source,
                    Value::int(1),
                ));
            }
            CopyMode::Move => {
                log::debug!("Generating copy of {} into {}", self.source, self.dest);
                method.append_to_end(Instruction::mov(self.dest, self.source));
            }
        }
        Ok(())
    }
}

/// Emit `dest = opcode first[, second]`, deferring unknown opcodes to a later pass.
fn append_operation(
    method: &mut Method<'_>,
    opcode: String,
    dest: Value,
    first: Value,
    second: Option<Value>,
    decorations: InstructionDecorations,
) {
    let inst = match OpCode::find(&opcode) {
        Some(op) => Instruction::operation(op, dest, first, second),
        None => Instruction::new(InstructionKind::IntrinsicOperation {
            name: opcode,
            dest,
            first,
            second,
        }),
    };
    method.append_to_end(inst.add_decorations(decorations));
}

#[derive(Debug, Clone)]
pub struct UnaryOperator {
    pub opcode: String,
    pub dest: Value,
    pub arg: Value,
    pub decorations: InstructionDecorations,
}

impl UnaryOperator {
    pub fn new(opcode: impl Into<String>, dest: Value, arg: Value) -> Self {
        Self {
            opcode: opcode.into(),
            dest,
            arg,
            decorations: InstructionDecorations::NONE,
        }
    }

    fn map_instruction(self, method: &mut Method<'_>) -> CompileResult<()> {
        log::debug!(
            "Generating unary operation {} with {} into {}",
            self.opcode,
            self.arg,
            self.dest
        );
        append_operation(method, self.opcode, self.dest, self.arg, None, self.decorations);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct BinaryOperator {
    pub opcode: String,
    pub dest: Value,
    pub first: Value,
    pub second: Value,
    pub decorations: InstructionDecorations,
}

impl BinaryOperator {
    pub fn new(opcode: impl Into<String>, dest: Value, first: Value, second: Value) -> Self {
        Self {
            opcode: opcode.into(),
            dest,
            first,
            second,
            decorations: InstructionDecorations::NONE,
        }
    }

    fn map_instruction(self, method: &mut Method<'_>) -> CompileResult<()> {
        log::debug!(
            "Generating binary operation {} with {} and {} into {}",
            self.opcode,
            self.first,
            self.second,
            self.dest
        );
        append_operation(
            method,
            self.opcode,
            self.dest,
            self.first,
            Some(self.second),
            self.decorations,
        );
        Ok(())
    }
}

/// Address calculation (`getelementptr`).
#[derive(Debug, Clone)]
pub struct IndexOf {
    pub dest: Value,
    pub container: Value,
    /// The first index indexes the pointer itself, every further one the aggregate reached so far.
    pub indices: Vec<Value>,
}

impl IndexOf {
    pub fn new(dest: Value, container: Value, indices: Vec<Value>) -> Self {
        Self {
            dest,
            container,
            indices,
        }
    }

    fn map_instruction(self, method: &mut Method<'_>) -> CompileResult<()> {
        log::debug!(
            "Generating calculating index of {} ({} indices) into {}",
            self.container,
            self.indices.len(),
            self.dest
        );
        helpers::insert_calculate_indices(method, &self.container, &self.dest, &self.indices)
    }
}

#[derive(Debug, Clone)]
pub struct Comparison {
    pub dest: Value,
    /// LLVM predicate name, e.g. `slt` or `oeq`.
    pub predicate: String,
    pub is_float: bool,
    pub first: Value,
    pub second: Value,
    pub decorations: InstructionDecorations,
}

impl Comparison {
    pub fn new(dest: Value, predicate: impl Into<String>, first: Value, second: Value, is_float: bool) -> Self {
        Self {
            dest,
            predicate: predicate.into(),
            is_float,
            first,
            second,
            decorations: InstructionDecorations::NONE,
        }
    }

    fn map_instruction(self, method: &mut Method<'_>) -> CompileResult<()> {
        log::debug!(
            "Generating comparison {} with {} and {} into {}",
            self.predicate,
            self.first,
            self.second,
            self.dest
        );
        let predicate = ComparisonPredicate::parse(&self.predicate, self.is_float)?;
        method.append_to_end(
            Instruction::comparison(predicate, self.dest, self.first, self.second).add_decorations(self.decorations),
        );
        Ok(())
    }
}

/// Only vectors support lane access; scalars are treated as one-lane vectors at index 0.
fn check_container_access(operation: &'static str, container: &Value, index: &Value) -> CompileResult<()> {
    if container.ty.is_vector() || index.has_literal(Literal::Uint(0)) {
        Ok(())
    } else {
        Err(CompileError::UnsupportedContainerAccess {
            operation,
            container: container.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ContainerInsertion {
    pub dest: Value,
    pub container: Value,
    pub new_value: Value,
    pub index: Value,
}

impl ContainerInsertion {
    pub fn new(dest: Value, container: Value, new_value: Value, index: Value) -> Self {
        Self {
            dest,
            container,
            new_value,
            index,
        }
    }

    fn map_instruction(self, method: &mut Method<'_>) -> CompileResult<()> {
        log::debug!(
            "Generating insertion of {} at {} into {} into {}",
            self.new_value,
            self.index,
            self.container,
            self.dest
        );
        check_container_access("insertion", &self.container, &self.index)?;
        method.append_to_end(Instruction::mov(self.dest.clone(), self.container));
        helpers::insert_vector_insertion(method, &self.dest, &self.index, &self.new_value)
    }
}

#[derive(Debug, Clone)]
pub struct ContainerExtraction {
    pub dest: Value,
    pub container: Value,
    pub index: Value,
}

impl ContainerExtraction {
    pub fn new(dest: Value, container: Value, index: Value) -> Self {
        Self { dest, container, index }
    }

    fn map_instruction(self, method: &mut Method<'_>) -> CompileResult<()> {
        log::debug!(
            "Generating extraction of {} at {} from {} into {}",
            self.container.ty.element_type(),
            self.index,
            self.container,
            self.dest
        );
        check_container_access("extraction", &self.container, &self.index)?;
        helpers::insert_vector_extraction(method, &self.container, &self.index, &self.dest)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValueReturn {
    pub value: Option<Value>,
}

impl ValueReturn {
    pub fn new(value: Option<Value>) -> Self {
        Self { value }
    }

    fn map_instruction(self, method: &mut Method<'_>) -> CompileResult<()> {
        match &self.value {
            Some(value) => log::debug!("Generating return of {value}"),
            None => log::debug!("Generating return nothing"),
        }
        method.append_to_end(Instruction::new(InstructionKind::Return { value: self.value }));
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ShuffleVector {
    pub dest: Value,
    pub first: Value,
    pub second: Value,
    /// Constant container, a uniform literal, undefined, or a variable vector.
    pub mask: Value,
}

impl ShuffleVector {
    pub fn new(dest: Value, first: Value, second: Value, mask: Value) -> Self {
        Self {
            dest,
            first,
            second,
            mask,
        }
    }

    fn map_instruction(self, method: &mut Method<'_>) -> CompileResult<()> {
        log::debug!(
            "Generating operations mixing {} and {} into {}",
            self.first,
            self.second,
            self.dest
        );
        helpers::insert_vector_shuffle(method, &self.dest, &self.first, &self.second, &self.mask)
    }
}

/// Start of a basic block.
#[derive(Debug, Clone)]
pub struct BlockLabel {
    pub label: LocalRef,
}

impl BlockLabel {
    pub fn new(label: LocalRef) -> Self {
        Self { label }
    }

    fn map_instruction(self, method: &mut Method<'_>) -> CompileResult<()> {
        log::debug!("Generating label {}", self.label.name);
        method.append_to_end(Instruction::new(InstructionKind::Label { label: self.label }));
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PhiNode {
    pub dest: Value,
    /// Incoming values with their predecessor blocks, in source order.
    pub incoming: Vec<(Value, LocalRef)>,
}

impl PhiNode {
    pub fn new(dest: Value, incoming: Vec<(Value, LocalRef)>) -> Self {
        Self { dest, incoming }
    }

    fn map_instruction(self, method: &mut Method<'_>) -> CompileResult<()> {
        log::debug!(
            "Generating Phi-Node with {} options into {}",
            self.incoming.len(),
            self.dest
        );
        method.append_to_end(Instruction::new(InstructionKind::Phi {
            dest: self.dest,
            incoming: self.incoming,
        }));
        Ok(())
    }
}

/// `dest = cond ? first : second`
#[derive(Debug, Clone)]
pub struct Selection {
    pub dest: Value,
    pub cond: Value,
    pub first: Value,
    pub second: Value,
}

impl Selection {
    pub fn new(dest: Value, cond: Value, first: Value, second: Value) -> Self {
        Self {
            dest,
            cond,
            first,
            second,
        }
    }

    fn map_instruction(self, method: &mut Method<'_>) -> CompileResult<()> {
        log::debug!(
            "Generating moves for selection of {} or {} into {} depending on {}",
            self.first,
            self.second,
            self.dest,
            self.cond
        );
        let vector_options = self.first.ty.is_vector() || self.second.ty.is_vector();
        if !self.cond.ty.is_vector() && vector_options {
            // a scalar condition selects whole vectors, so it must be visible in every lane
            helpers::insert_replication(method, &self.cond, &Value::nop(self.cond.ty.clone()), true);
        } else {
            method.append_to_end(Instruction::mov(Value::nop(self.cond.ty.clone()), self.cond).with_set_flags());
        }
        method.append_to_end(
            Instruction::mov(self.dest.clone(), self.first).with_condition(ConditionCode::ZeroClear),
        );
        method.append_to_end(Instruction::mov(self.dest, self.second).with_condition(ConditionCode::ZeroSet));
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum Branch {
    Unconditional {
        target: LocalRef,
    },
    Conditional {
        cond: Value,
        then_label: LocalRef,
        else_label: LocalRef,
    },
}

impl Branch {
    pub fn to(target: LocalRef) -> Self {
        Branch::Unconditional { target }
    }

    /// A two-way branch. A constant `true` condition degenerates into a jump to `then_label`.
    pub fn conditional(cond: Value, then_label: LocalRef, else_label: LocalRef) -> Self {
        if cond.is_bool_true() {
            Branch::Unconditional { target: then_label }
        } else {
            Branch::Conditional {
                cond,
                then_label,
                else_label,
            }
        }
    }

    fn map_instruction(self, method: &mut Method<'_>) -> CompileResult<()> {
        match self {
            Branch::Unconditional { target } => {
                log::debug!("Generating unconditional branch to {}", target.name);
                method.append_to_end(Instruction::branch(target, ConditionCode::Always, Value::bool(true)));
            }
            Branch::Conditional {
                cond,
                then_label,
                else_label,
            } => {
                log::debug!(
                    "Generating branch on condition {cond} to either {} or {}",
                    then_label.name,
                    else_label.name
                );
                method.append_to_end(Instruction::branch(then_label, ConditionCode::ZeroClear, cond.clone()));
                method.append_to_end(Instruction::branch(else_label, ConditionCode::ZeroSet, cond));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Switch {
    pub cond: Value,
    pub default_label: LocalRef,
    /// Case values are distinct; cases are lowered in ascending order.
    pub cases: BTreeMap<i32, LocalRef>,
}

impl Switch {
    pub fn new(cond: Value, default_label: LocalRef, cases: BTreeMap<i32, LocalRef>) -> Self {
        Self {
            cond,
            default_label,
            cases,
        }
    }

    fn map_instruction(self, method: &mut Method<'_>) -> CompileResult<()> {
        log::debug!(
            "Generating switch on {} with {} cases and default {}",
            self.cond,
            self.cases.len(),
            self.default_label.name
        );
        for (case, label) in self.cases {
            let matched = method.add_new_local(crate::ir::DataType::BOOL, "%switch");
            let case_value = Value::literal(Literal::Int(case), self.cond.ty.clone());
            method.append_to_end(Instruction::comparison(
                ComparisonPredicate::EQ,
                matched.clone(),
                self.cond.clone(),
                case_value,
            ));
            method.append_to_end(Instruction::branch(label, ConditionCode::ZeroClear, matched));
        }
        method.append_to_end(Instruction::branch(
            self.default_label,
            ConditionCode::Always,
            Value::bool(true),
        ));
        Ok(())
    }
}

/// One lowering request, produced by the front end and consumed by [`LlvmInstruction::map_instruction`].
#[derive(Debug, Clone)]
pub enum LlvmInstruction {
    Call(CallSite),
    Copy(CopyValue),
    UnaryOperator(UnaryOperator),
    BinaryOperator(BinaryOperator),
    IndexOf(IndexOf),
    Comparison(Comparison),
    ContainerInsertion(ContainerInsertion),
    ContainerExtraction(ContainerExtraction),
    ValueReturn(ValueReturn),
    ShuffleVector(ShuffleVector),
    Label(BlockLabel),
    PhiNode(PhiNode),
    Selection(Selection),
    Branch(Branch),
    Switch(Switch),
}

impl LlvmInstruction {
    /// Short name of the request kind, used for statistics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            LlvmInstruction::Call(_) => "call",
            LlvmInstruction::Copy(_) => "copy",
            LlvmInstruction::UnaryOperator(_) => "unary",
            LlvmInstruction::BinaryOperator(_) => "binary",
            LlvmInstruction::IndexOf(_) => "index-of",
            LlvmInstruction::Comparison(_) => "comparison",
            LlvmInstruction::ContainerInsertion(_) => "insertion",
            LlvmInstruction::ContainerExtraction(_) => "extraction",
            LlvmInstruction::ValueReturn(_) => "return",
            LlvmInstruction::ShuffleVector(_) => "shuffle",
            LlvmInstruction::Label(_) => "label",
            LlvmInstruction::PhiNode(_) => "phi",
            LlvmInstruction::Selection(_) => "selection",
            LlvmInstruction::Branch(_) => "branch",
            LlvmInstruction::Switch(_) => "switch",
        }
    }

    /// Append the canonical instructions implementing this request to `method`.
    pub fn map_instruction(self, method: &mut Method<'_>) -> CompileResult<()> {
        match self {
            LlvmInstruction::Call(call) => call.map_instruction(method),
            LlvmInstruction::Copy(copy) => copy.map_instruction(method),
            LlvmInstruction::UnaryOperator(op) => op.map_instruction(method),
            LlvmInstruction::BinaryOperator(op) => op.map_instruction(method),
            LlvmInstruction::IndexOf(index) => index.map_instruction(method),
            LlvmInstruction::Comparison(comparison) => comparison.map_instruction(method),
            LlvmInstruction::ContainerInsertion(insertion) => insertion.map_instruction(method),
            LlvmInstruction::ContainerExtraction(extraction) => extraction.map_instruction(method),
            LlvmInstruction::ValueReturn(ret) => ret.map_instruction(method),
            LlvmInstruction::ShuffleVector(shuffle) => shuffle.map_instruction(method),
            LlvmInstruction::Label(label) => label.map_instruction(method),
            LlvmInstruction::PhiNode(phi) => phi.map_instruction(method),
            LlvmInstruction::Selection(selection) => selection.map_instruction(method),
            LlvmInstruction::Branch(branch) => branch.map_instruction(method),
            LlvmInstruction::Switch(switch) => switch.map_instruction(method),
        }
    }
}

macro_rules! impl_from_request {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for LlvmInstruction {
                fn from(request: $ty) -> Self {
                    LlvmInstruction::$variant(request)
                }
            }
        )*
    };
}

impl_from_request!(
    Call(CallSite),
    Copy(CopyValue),
    UnaryOperator(UnaryOperator),
    BinaryOperator(BinaryOperator),
    IndexOf(IndexOf),
    Comparison(Comparison),
    ContainerInsertion(ContainerInsertion),
    ContainerExtraction(ContainerExtraction),
    ValueReturn(ValueReturn),
    ShuffleVector(ShuffleVector),
    Label(BlockLabel),
    PhiNode(PhiNode),
    Selection(Selection),
    Branch(Branch),
    Switch(Switch),
);
