// This module defines the canonical backend instruction set the lowering pass produces. An
// Instruction is a kind (move, ALU operation, unresolved intrinsic operation, vector rotation,
// comparison, memory access, memory barrier, lifetime boundary, method call, branch, phi,
// label, return) plus the execution attributes every QPU instruction shares: the condition
// code it executes under, whether it updates the flags, and a decoration set describing
// provenance and semantics. Condition codes and the set-flags bit use the hardware encoding
// directly so the instruction-word encoder can consume them unchanged. Instructions are moved
// into a method's arena-backed stream exactly once and are never shared.

//! Canonical backend instructions.

use super::opcodes::{ComparisonPredicate, OpCode};
use super::value::{LocalRef, Value};
use std::fmt;

/// Condition under which an instruction executes (QPU `cond_add`/`cond_mul` encoding).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConditionCode {
    Never = 0,
    #[default]
    Always = 1,
    ZeroSet = 2,
    ZeroClear = 3,
    NegativeSet = 4,
    NegativeClear = 5,
    CarrySet = 6,
    CarryClear = 7,
}

impl ConditionCode {
    pub const ALL: [ConditionCode; 8] = [
        ConditionCode::Never,
        ConditionCode::Always,
        ConditionCode::ZeroSet,
        ConditionCode::ZeroClear,
        ConditionCode::NegativeSet,
        ConditionCode::NegativeClear,
        ConditionCode::CarrySet,
        ConditionCode::CarryClear,
    ];

    /// The condition that holds exactly when this one does not.
    pub fn invert(self) -> ConditionCode {
        match self {
            ConditionCode::Never => ConditionCode::Always,
            ConditionCode::Always => ConditionCode::Never,
            ConditionCode::ZeroSet => ConditionCode::ZeroClear,
            ConditionCode::ZeroClear => ConditionCode::ZeroSet,
            ConditionCode::NegativeSet => ConditionCode::NegativeClear,
            ConditionCode::NegativeClear => ConditionCode::NegativeSet,
            ConditionCode::CarrySet => ConditionCode::CarryClear,
            ConditionCode::CarryClear => ConditionCode::CarrySet,
        }
    }

    pub fn is_inversion_of(self, other: ConditionCode) -> bool {
        self.invert() == other
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            ConditionCode::Never => "never",
            ConditionCode::Always => "",
            ConditionCode::ZeroSet => "ifz",
            ConditionCode::ZeroClear => "ifzc",
            ConditionCode::NegativeSet => "ifn",
            ConditionCode::NegativeClear => "ifnc",
            ConditionCode::CarrySet => "ifc",
            ConditionCode::CarryClear => "ifcc",
        }
    }
}

/// Whether an instruction updates the zero/negative/carry flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SetFlag {
    #[default]
    DontSet = 0,
    SetFlags = 1,
}

/// Decoration flags of a canonical instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InstructionDecorations(u16);

impl InstructionDecorations {
    pub const NONE: Self = Self(0);
    /// Result is identical in all lanes.
    pub const IDENTICAL_ELEMENTS: Self = Self(1 << 0);
    /// Generated from a volatile memory access.
    pub const VOLATILE: Self = Self(1 << 1);
    /// Result is known to be non-negative.
    pub const UNSIGNED_RESULT: Self = Self(1 << 2);
    /// Part of an index calculation (GEP).
    pub const INDEX_CALCULATION: Self = Self(1 << 3);
    /// Floating-point operation allowed to ignore NaN/Inf semantics.
    pub const FAST_MATH: Self = Self(1 << 4);
    /// Part of a bit-cast expansion.
    pub const BITCAST: Self = Self(1 << 5);

    pub fn contains(self, flag: Self) -> bool {
        self.0 & flag.0 == flag.0
    }

    #[must_use]
    pub fn with(self, flag: Self) -> Self {
        Self(self.0 | flag.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Kind of memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryOperation {
    /// `dest = *source`
    Read,
    /// `*dest = source`
    Write,
    /// Copy `count` elements from `*source` to `*dest`.
    Copy,
    /// Fill `count` elements at `*dest` with `source`.
    Fill,
}

/// Scope of a memory barrier (SPIR-V numbering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryScope {
    CrossDevice = 0,
    Device = 1,
    WorkGroup = 2,
    SubGroup = 3,
    Invocation = 4,
}

impl TryFrom<u32> for MemoryScope {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MemoryScope::CrossDevice),
            1 => Ok(MemoryScope::Device),
            2 => Ok(MemoryScope::WorkGroup),
            3 => Ok(MemoryScope::SubGroup),
            4 => Ok(MemoryScope::Invocation),
            other => Err(other),
        }
    }
}

/// Ordering guarantee of a memory barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemorySemantics {
    Relaxed,
    Acquire,
    Release,
    AcquireRelease,
    SequentiallyConsistent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstructionKind {
    Move {
        dest: Value,
        source: Value,
    },
    Operation {
        op: OpCode,
        dest: Value,
        first: Value,
        second: Option<Value>,
    },
    /// Operation with no direct machine counterpart, resolved by a later pass.
    IntrinsicOperation {
        name: String,
        dest: Value,
        first: Value,
        second: Option<Value>,
    },
    /// `dest[i] = source[(i - offset) mod 16]`
    VectorRotation {
        dest: Value,
        source: Value,
        offset: Value,
    },
    Comparison {
        predicate: ComparisonPredicate,
        dest: Value,
        first: Value,
        second: Value,
    },
    Memory {
        op: MemoryOperation,
        dest: Value,
        source: Value,
        count: Value,
    },
    MemoryBarrier {
        scope: MemoryScope,
        semantics: MemorySemantics,
    },
    LifetimeBoundary {
        allocation: Value,
        is_end: bool,
    },
    MethodCall {
        dest: Option<Value>,
        name: String,
        arguments: Vec<Value>,
    },
    /// Jumps to `target` if the instruction's condition holds for the flags set by `flag_source`.
    Branch {
        target: LocalRef,
        flag_source: Value,
    },
    Phi {
        dest: Value,
        incoming: Vec<(Value, LocalRef)>,
    },
    Label {
        label: LocalRef,
    },
    Return {
        value: Option<Value>,
    },
}

/// One canonical backend instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub kind: InstructionKind,
    pub condition: ConditionCode,
    pub set_flags: SetFlag,
    pub decorations: InstructionDecorations,
}

impl Instruction {
    /// An unconditional instruction that leaves the flags alone.
    pub fn new(kind: InstructionKind) -> Self {
        Self {
            kind,
            condition: ConditionCode::Always,
            set_flags: SetFlag::DontSet,
            decorations: InstructionDecorations::NONE,
        }
    }

    pub fn mov(dest: Value, source: Value) -> Self {
        Self::new(InstructionKind::Move { dest, source })
    }

    pub fn operation(op: OpCode, dest: Value, first: Value, second: Option<Value>) -> Self {
        Self::new(InstructionKind::Operation {
            op,
            dest,
            first,
            second,
        })
    }

    pub fn comparison(predicate: ComparisonPredicate, dest: Value, first: Value, second: Value) -> Self {
        Self::new(InstructionKind::Comparison {
            predicate,
            dest,
            first,
            second,
        })
    }

    pub fn memory(op: MemoryOperation, dest: Value, source: Value, count: Value) -> Self {
        Self::new(InstructionKind::Memory {
            op,
            dest,
            source,
            count,
        })
    }

    pub fn branch(target: LocalRef, condition: ConditionCode, flag_source: Value) -> Self {
        Self::new(InstructionKind::Branch {
            target,
            flag_source,
        })
        .with_condition(condition)
    }

    #[must_use]
    pub fn with_condition(mut self, condition: ConditionCode) -> Self {
        self.condition = condition;
        self
    }

    #[must_use]
    pub fn with_set_flags(mut self) -> Self {
        self.set_flags = SetFlag::SetFlags;
        self
    }

    #[must_use]
    pub fn add_decorations(mut self, decorations: InstructionDecorations) -> Self {
        self.decorations = self.decorations.with(decorations);
        self
    }

    /// The value this instruction writes, if any.
    pub fn output(&self) -> Option<&Value> {
        match &self.kind {
            InstructionKind::Move { dest, .. }
            | InstructionKind::Operation { dest, .. }
            | InstructionKind::IntrinsicOperation { dest, .. }
            | InstructionKind::VectorRotation { dest, .. }
            | InstructionKind::Comparison { dest, .. }
            | InstructionKind::Phi { dest, .. } => Some(dest),
            InstructionKind::Memory {
                op: MemoryOperation::Read,
                dest,
                ..
            } => Some(dest),
            InstructionKind::MethodCall { dest, .. } => dest.as_ref(),
            _ => None,
        }
    }

    /// Short name of the instruction kind, used for statistics.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            InstructionKind::Move { .. } => "move",
            InstructionKind::Operation { .. } => "operation",
            InstructionKind::IntrinsicOperation { .. } => "intrinsic",
            InstructionKind::VectorRotation { .. } => "rotation",
            InstructionKind::Comparison { .. } => "comparison",
            InstructionKind::Memory { .. } => "memory",
            InstructionKind::MemoryBarrier { .. } => "barrier",
            InstructionKind::LifetimeBoundary { .. } => "lifetime",
            InstructionKind::MethodCall { .. } => "call",
            InstructionKind::Branch { .. } => "branch",
            InstructionKind::Phi { .. } => "phi",
            InstructionKind::Label { .. } => "label",
            InstructionKind::Return { .. } => "return",
        }
    }

    pub fn is_branch(&self) -> bool {
        matches!(self.kind, InstructionKind::Branch { .. })
    }
}

fn write_operands(f: &mut fmt::Formatter<'_>, first: &Value, second: Option<&Value>) -> fmt::Result {
    write!(f, "{first}")?;
    if let Some(second) = second {
        write!(f, ", {second}")?;
    }
    Ok(())
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            InstructionKind::Move { dest, source } => write!(f, "{dest} = {source}")?,
            InstructionKind::Operation {
                op,
                dest,
                first,
                second,
            } => {
                write!(f, "{dest} = {op} ")?;
                write_operands(f, first, second.as_ref())?;
            }
            InstructionKind::IntrinsicOperation {
                name,
                dest,
                first,
                second,
            } => {
                write!(f, "{dest} = {name} ")?;
                write_operands(f, first, second.as_ref())?;
            }
            InstructionKind::VectorRotation {
                dest,
                source,
                offset,
            } => write!(f, "{dest} = {source} rotate {offset}")?,
            InstructionKind::Comparison {
                predicate,
                dest,
                first,
                second,
            } => write!(f, "{dest} = {predicate} {first}, {second}")?,
            InstructionKind::Memory {
                op,
                dest,
                source,
                count,
            } => match op {
                MemoryOperation::Read => write!(f, "{dest} = load {source}")?,
                MemoryOperation::Write => write!(f, "store {source} into {dest}")?,
                MemoryOperation::Copy => write!(f, "copy {count} from {source} into {dest}")?,
                MemoryOperation::Fill => write!(f, "fill {dest} with {count} times {source}")?,
            },
            InstructionKind::MemoryBarrier { scope, semantics } => {
                write!(f, "mem-fence {scope:?}, {semantics:?}")?
            }
            InstructionKind::LifetimeBoundary { allocation, is_end } => {
                let which = if *is_end { "end" } else { "start" };
                write!(f, "life-time for {allocation} {which}s")?
            }
            InstructionKind::MethodCall {
                dest,
                name,
                arguments,
            } => {
                if let Some(dest) = dest {
                    write!(f, "{dest} = ")?;
                }
                write!(f, "call {name}(")?;
                for (i, argument) in arguments.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{argument}")?;
                }
                f.write_str(")")?;
            }
            InstructionKind::Branch {
                target,
                flag_source,
            } => {
                write!(f, "br {}", target.name)?;
                if self.condition != ConditionCode::Always {
                    write!(f, " (on {flag_source})")?;
                }
            }
            InstructionKind::Phi { dest, incoming } => {
                write!(f, "{dest} = phi ")?;
                for (i, (value, label)) in incoming.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "[{value}, {}]", label.name)?;
                }
            }
            InstructionKind::Label { label } => write!(f, "label: {}", label.name)?,
            InstructionKind::Return { value: Some(value) } => write!(f, "ret {value}")?,
            InstructionKind::Return { value: None } => f.write_str("ret")?,
        }
        if self.set_flags == SetFlag::SetFlags {
            f.write_str(" (setf)")?;
        }
        if self.condition != ConditionCode::Always {
            write!(f, " ({})", self.condition.mnemonic())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::opcodes::OP_ADD;
    use crate::ir::types::DataType;

    #[test]
    fn test_condition_inversion() {
        for cond in ConditionCode::ALL {
            assert_eq!(cond.invert().invert(), cond);
        }
        assert!(ConditionCode::ZeroSet.is_inversion_of(ConditionCode::ZeroClear));
    }

    #[test]
    fn test_display_flags_and_condition() {
        let inst = Instruction::operation(
            OP_ADD,
            Value::nop(DataType::INT32),
            Value::int(1),
            Some(Value::int(2)),
        )
        .with_set_flags()
        .with_condition(ConditionCode::ZeroClear);
        assert_eq!(inst.to_string(), "i32 nop = add i32 1, i32 2 (setf) (ifzc)");
        assert_eq!(inst.output(), Some(&Value::nop(DataType::INT32)));
    }

    #[test]
    fn test_memory_scope_decoding() {
        assert_eq!(MemoryScope::try_from(2), Ok(MemoryScope::WorkGroup));
        assert_eq!(MemoryScope::try_from(9), Err(9));
    }
}
