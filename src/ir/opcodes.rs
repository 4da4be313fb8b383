// This module holds the table of QPU machine operations and the comparison predicates
// lowering understands. Every OpCode records its mnemonic, its encoding on the add ALU and/or
// the mul ALU (0 meaning "not available on that ALU"), how many operands it takes and whether
// it works on floating-point data. OpCode::find resolves a textual opcode coming from the IR
// against this table; unary and binary operator lowering falls back to an intrinsic placeholder
// when the lookup fails. ComparisonPredicate parses LLVM icmp/fcmp predicate names into the
// integer or floating-point family selected by the request.

//! Machine operations and comparison predicates.

use crate::core::error::{CompileError, CompileResult};
use std::fmt;

/// A QPU ALU operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpCode {
    pub name: &'static str,
    /// Encoding on the add ALU, 0 if unavailable there.
    pub op_add: u8,
    /// Encoding on the mul ALU, 0 if unavailable there.
    pub op_mul: u8,
    pub num_operands: u8,
    pub accepts_float: bool,
    pub returns_float: bool,
}

const fn op(
    name: &'static str,
    op_add: u8,
    op_mul: u8,
    num_operands: u8,
    accepts_float: bool,
    returns_float: bool,
) -> OpCode {
    OpCode {
        name,
        op_add,
        op_mul,
        num_operands,
        accepts_float,
        returns_float,
    }
}

pub const OP_FADD: OpCode = op("fadd", 1, 0, 2, true, true);
pub const OP_FSUB: OpCode = op("fsub", 2, 0, 2, true, true);
pub const OP_FMIN: OpCode = op("fmin", 3, 0, 2, true, true);
pub const OP_FMAX: OpCode = op("fmax", 4, 0, 2, true, true);
pub const OP_FMINABS: OpCode = op("fminabs", 5, 0, 2, true, true);
pub const OP_FMAXABS: OpCode = op("fmaxabs", 6, 0, 2, true, true);
pub const OP_FTOI: OpCode = op("ftoi", 7, 0, 1, true, false);
pub const OP_ITOF: OpCode = op("itof", 8, 0, 1, false, true);
pub const OP_ADD: OpCode = op("add", 12, 0, 2, false, false);
pub const OP_SUB: OpCode = op("sub", 13, 0, 2, false, false);
pub const OP_SHR: OpCode = op("shr", 14, 0, 2, false, false);
pub const OP_ASR: OpCode = op("asr", 15, 0, 2, false, false);
pub const OP_ROR: OpCode = op("ror", 16, 0, 2, false, false);
pub const OP_SHL: OpCode = op("shl", 17, 0, 2, false, false);
pub const OP_MIN: OpCode = op("min", 18, 0, 2, false, false);
pub const OP_MAX: OpCode = op("max", 19, 0, 2, false, false);
pub const OP_AND: OpCode = op("and", 20, 0, 2, false, false);
pub const OP_OR: OpCode = op("or", 21, 0, 2, false, false);
pub const OP_XOR: OpCode = op("xor", 22, 0, 2, false, false);
pub const OP_NOT: OpCode = op("not", 23, 0, 1, false, false);
pub const OP_CLZ: OpCode = op("clz", 24, 0, 1, false, false);
pub const OP_V8ADDS: OpCode = op("v8adds", 30, 6, 2, false, false);
pub const OP_V8SUBS: OpCode = op("v8subs", 31, 7, 2, false, false);
pub const OP_FMUL: OpCode = op("fmul", 0, 1, 2, true, true);
pub const OP_MUL24: OpCode = op("mul24", 0, 2, 2, false, false);
pub const OP_V8MULS: OpCode = op("v8muls", 0, 3, 2, false, false);
pub const OP_V8MIN: OpCode = op("v8min", 0, 4, 2, false, false);
pub const OP_V8MAX: OpCode = op("v8max", 0, 5, 2, false, false);

const OPCODES: [OpCode; 28] = [
    OP_FADD, OP_FSUB, OP_FMIN, OP_FMAX, OP_FMINABS, OP_FMAXABS, OP_FTOI, OP_ITOF, OP_ADD, OP_SUB,
    OP_SHR, OP_ASR, OP_ROR, OP_SHL, OP_MIN, OP_MAX, OP_AND, OP_OR, OP_XOR, OP_NOT, OP_CLZ,
    OP_V8ADDS, OP_V8SUBS, OP_FMUL, OP_MUL24, OP_V8MULS, OP_V8MIN, OP_V8MAX,
];

impl OpCode {
    /// Look up a machine operation by mnemonic.
    pub fn find(name: &str) -> Option<OpCode> {
        OPCODES.iter().find(|op| op.name == name).copied()
    }

    pub fn is_unary(&self) -> bool {
        self.num_operands == 1
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Integer comparison predicates (LLVM `icmp`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntPredicate {
    Eq,
    Ne,
    Ugt,
    Uge,
    Ult,
    Ule,
    Sgt,
    Sge,
    Slt,
    Sle,
}

/// Floating-point comparison predicates (LLVM `fcmp`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatPredicate {
    False,
    Oeq,
    Ogt,
    Oge,
    Olt,
    Ole,
    One,
    Ord,
    Ueq,
    Ugt,
    Uge,
    Ult,
    Ule,
    Une,
    Uno,
    True,
}

const INT_PREDICATES: [(&str, IntPredicate); 10] = [
    ("eq", IntPredicate::Eq),
    ("ne", IntPredicate::Ne),
    ("ugt", IntPredicate::Ugt),
    ("uge", IntPredicate::Uge),
    ("ult", IntPredicate::Ult),
    ("ule", IntPredicate::Ule),
    ("sgt", IntPredicate::Sgt),
    ("sge", IntPredicate::Sge),
    ("slt", IntPredicate::Slt),
    ("sle", IntPredicate::Sle),
];

const FLOAT_PREDICATES: [(&str, FloatPredicate); 16] = [
    ("false", FloatPredicate::False),
    ("oeq", FloatPredicate::Oeq),
    ("ogt", FloatPredicate::Ogt),
    ("oge", FloatPredicate::Oge),
    ("olt", FloatPredicate::Olt),
    ("ole", FloatPredicate::Ole),
    ("one", FloatPredicate::One),
    ("ord", FloatPredicate::Ord),
    ("ueq", FloatPredicate::Ueq),
    ("ugt", FloatPredicate::Ugt),
    ("uge", FloatPredicate::Uge),
    ("ult", FloatPredicate::Ult),
    ("ule", FloatPredicate::Ule),
    ("une", FloatPredicate::Une),
    ("uno", FloatPredicate::Uno),
    ("true", FloatPredicate::True),
];

/// A comparison predicate of either family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonPredicate {
    Int(IntPredicate),
    Float(FloatPredicate),
}

impl ComparisonPredicate {
    /// Equality, used by switch lowering.
    pub const EQ: ComparisonPredicate = ComparisonPredicate::Int(IntPredicate::Eq);

    /// Parse `name` in the family selected by `is_float`.
    pub fn parse(name: &str, is_float: bool) -> CompileResult<Self> {
        let found = if is_float {
            FLOAT_PREDICATES
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, p)| ComparisonPredicate::Float(*p))
        } else {
            INT_PREDICATES
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, p)| ComparisonPredicate::Int(*p))
        };
        found.ok_or_else(|| CompileError::UnknownPredicate {
            predicate: name.to_string(),
            family: if is_float { "floating-point" } else { "integer" },
        })
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ComparisonPredicate::Float(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ComparisonPredicate::Int(p) => INT_PREDICATES
                .iter()
                .find(|(_, q)| q == p)
                .map_or("?", |(n, _)| *n),
            ComparisonPredicate::Float(p) => FLOAT_PREDICATES
                .iter()
                .find(|(_, q)| q == p)
                .map_or("?", |(n, _)| *n),
        }
    }
}

impl fmt::Display for ComparisonPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.is_float() { "fcmp" } else { "icmp" };
        write!(f, "{prefix} {}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_opcode() {
        assert_eq!(OpCode::find("fmul"), Some(OP_FMUL));
        assert!(OpCode::find("itof").is_some_and(|op| op.is_unary()));
        // LLVM's "mul" has no single machine instruction
        assert_eq!(OpCode::find("mul"), None);
    }

    #[test]
    fn test_predicate_families() {
        assert_eq!(
            ComparisonPredicate::parse("slt", false),
            Ok(ComparisonPredicate::Int(IntPredicate::Slt))
        );
        assert_eq!(
            ComparisonPredicate::parse("ult", true),
            Ok(ComparisonPredicate::Float(FloatPredicate::Ult))
        );
        assert!(ComparisonPredicate::parse("oeq", false).is_err());
        assert_eq!(ComparisonPredicate::EQ.to_string(), "icmp eq");
    }
}
