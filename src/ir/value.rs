// This module defines Value, the typed operand of every lowering request and canonical
// instruction. A value is either a literal constant, a reference to a named Local owned by a
// Method, a reference to a Global owned by the Module, a hardware register (most importantly
// the "nop" register used as a discard destination), a constant container (vector masks and
// similar constant aggregates) or undefined. Values are immutable and cheap to clone: local
// and global references carry only the index into the owning table plus the shared name used
// for diagnostics, so lowering moves and clones values freely without touching the locals.

//! Typed operands of the backend IR.

use super::types::DataType;
use std::fmt;
use std::sync::Arc;

/// Constant value of up to 32 bit, the QPU's native word size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Int(i32),
    Uint(u32),
    Real(f32),
    Bool(bool),
}

impl Literal {
    pub fn signed_int(&self) -> i32 {
        match *self {
            Literal::Int(v) => v,
            Literal::Uint(v) => v as i32,
            Literal::Real(v) => v.to_bits() as i32,
            Literal::Bool(v) => i32::from(v),
        }
    }

    pub fn unsigned_int(&self) -> u32 {
        self.signed_int() as u32
    }

    pub fn is_true(&self) -> bool {
        match *self {
            Literal::Bool(v) => v,
            Literal::Real(v) => v != 0.0,
            _ => self.unsigned_int() != 0,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(v) => write!(f, "{v}"),
            Literal::Uint(v) => write!(f, "{v}"),
            Literal::Real(v) => write!(f, "{v:?}"),
            Literal::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// Hardware registers lowering may refer to directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// Writes are discarded, reads return zero.
    Nop,
    /// Writing replicates lane 0 across all 16 lanes, reading returns the replicated value.
    ReplicateAll,
    /// Reads the lane index (0..16) of each SIMD lane.
    ElementNumber,
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Register::Nop => "nop",
            Register::ReplicateAll => "rep_all",
            Register::ElementNumber => "elem_num",
        })
    }
}

/// Index of a local within its method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(pub(crate) u32);

impl LocalId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a global within its module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalId(pub(crate) u32);

impl GlobalId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identity of a module, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(pub(crate) u32);

/// Non-owning handle to a method local.
#[derive(Debug, Clone)]
pub struct LocalRef {
    pub id: LocalId,
    pub name: Arc<str>,
}

impl PartialEq for LocalRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for LocalRef {}

/// Non-owning handle to a module global.
#[derive(Debug, Clone)]
pub struct GlobalRef {
    /// Module declaring the global; `id` is only meaningful within it.
    pub module: ModuleId,
    pub id: GlobalId,
    pub name: Arc<str>,
}

impl PartialEq for GlobalRef {
    fn eq(&self, other: &Self) -> bool {
        self.module == other.module && self.id == other.id
    }
}

/// What a value refers to.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    Literal(Literal),
    Local(LocalRef),
    Global(GlobalRef),
    Register(Register),
    /// Constant aggregate, e.g. a shuffle mask. Elements may be undefined.
    Container(Vec<Value>),
    Undefined,
}

/// A typed operand.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub kind: ValueKind,
    pub ty: DataType,
}

impl Value {
    pub fn new(kind: ValueKind, ty: DataType) -> Self {
        Self { kind, ty }
    }

    pub fn literal(literal: Literal, ty: DataType) -> Self {
        Self::new(ValueKind::Literal(literal), ty)
    }

    /// 32-bit signed integer literal.
    pub fn int(value: i32) -> Self {
        Self::literal(Literal::Int(value), DataType::INT32)
    }

    pub fn bool(value: bool) -> Self {
        Self::literal(Literal::Bool(value), DataType::BOOL)
    }

    pub fn register(register: Register, ty: DataType) -> Self {
        Self::new(ValueKind::Register(register), ty)
    }

    /// The discard destination.
    pub fn nop(ty: DataType) -> Self {
        Self::register(Register::Nop, ty)
    }

    pub fn undefined(ty: DataType) -> Self {
        Self::new(ValueKind::Undefined, ty)
    }

    pub fn container(elements: Vec<Value>, ty: DataType) -> Self {
        Self::new(ValueKind::Container(elements), ty)
    }

    pub fn local(&self) -> Option<&LocalRef> {
        match &self.kind {
            ValueKind::Local(local) => Some(local),
            _ => None,
        }
    }

    pub fn local_id(&self) -> Option<LocalId> {
        self.local().map(|local| local.id)
    }

    pub fn check_local(&self) -> bool {
        self.local().is_some()
    }

    pub fn global(&self) -> Option<&GlobalRef> {
        match &self.kind {
            ValueKind::Global(global) => Some(global),
            _ => None,
        }
    }

    pub fn literal_value(&self) -> Option<Literal> {
        match self.kind {
            ValueKind::Literal(literal) => Some(literal),
            _ => None,
        }
    }

    /// Whether this is a literal with the same integer bit pattern as `literal`.
    pub fn has_literal(&self, literal: Literal) -> bool {
        self.literal_value()
            .is_some_and(|own| own.unsigned_int() == literal.unsigned_int())
    }

    pub fn has_register(&self, register: Register) -> bool {
        self.kind == ValueKind::Register(register)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self.kind, ValueKind::Undefined)
    }

    pub fn container_elements(&self) -> Option<&[Value]> {
        match &self.kind {
            ValueKind::Container(elements) => Some(elements),
            _ => None,
        }
    }

    /// The constant `true` a conditional construct degenerates to when unconditional.
    pub fn is_bool_true(&self) -> bool {
        self.ty == DataType::BOOL && self.has_literal(Literal::Bool(true))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ValueKind::Literal(literal) => write!(f, "{} {literal}", self.ty),
            ValueKind::Local(local) => write!(f, "{} {}", self.ty, local.name),
            ValueKind::Global(global) => write!(f, "{} {}", self.ty, global.name),
            ValueKind::Register(register) => write!(f, "{} {register}", self.ty),
            ValueKind::Undefined => write!(f, "{} undefined", self.ty),
            ValueKind::Container(elements) => {
                write!(f, "{} <", self.ty)?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{element}")?;
                }
                f.write_str(">")
            }
        }
    }
}
