//! Branch instruction encoding.

use super::fields::{self, FieldDescriptor, FieldValues, InstructionWord, MachineInstruction};
use super::{IMMEDIATE, SIGNAL_BRANCH, WADDR_ADD, WADDR_MUL, WRITE_SWAP};
use crate::core::error::CompileResult;

/// Condition on the flags of all or any of the 16 lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BranchCondition {
    AllZeroSet = 0,
    AllZeroClear = 1,
    AnyZeroSet = 2,
    AnyZeroClear = 3,
    AllNegativeSet = 4,
    AllNegativeClear = 5,
    AnyNegativeSet = 6,
    AnyNegativeClear = 7,
    AllCarrySet = 8,
    AllCarryClear = 9,
    AnyCarrySet = 10,
    AnyCarryClear = 11,
    Always = 15,
}

const CONDITIONS: &[(u64, &str)] = &[
    (0, "allz"),
    (1, "allnz"),
    (2, "anyz"),
    (3, "anynz"),
    (4, "alln"),
    (5, "allnn"),
    (6, "anyn"),
    (7, "anynn"),
    (8, "allc"),
    (9, "allnc"),
    (10, "anyc"),
    (11, "anync"),
    (15, "always"),
];

const ALL_CONDITIONS: [BranchCondition; 13] = [
    BranchCondition::AllZeroSet,
    BranchCondition::AllZeroClear,
    BranchCondition::AnyZeroSet,
    BranchCondition::AnyZeroClear,
    BranchCondition::AllNegativeSet,
    BranchCondition::AllNegativeClear,
    BranchCondition::AnyNegativeSet,
    BranchCondition::AnyNegativeClear,
    BranchCondition::AllCarrySet,
    BranchCondition::AllCarryClear,
    BranchCondition::AnyCarrySet,
    BranchCondition::AnyCarryClear,
    BranchCondition::Always,
];

impl BranchCondition {
    pub fn mnemonic(self) -> &'static str {
        CONDITIONS
            .iter()
            .find(|(value, _)| *value == self as u64)
            .map_or("always", |(_, name)| *name)
    }

    fn from_bits(bits: u64) -> Self {
        ALL_CONDITIONS
            .into_iter()
            .find(|cond| *cond as u64 == bits)
            .unwrap_or(BranchCondition::Always)
    }
}

pub const CONDITION: FieldDescriptor = FieldDescriptor::enumerated("cond_br", 52, 4, CONDITIONS);
pub const RELATIVE: FieldDescriptor = FieldDescriptor::bit("rel", 51);
pub const USE_REGISTER: FieldDescriptor = FieldDescriptor::bit("reg", 50);
pub const RADDR_A: FieldDescriptor = FieldDescriptor::unsigned("raddr_a", 45, 5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchInstruction {
    pub condition: BranchCondition,
    /// Target is relative to PC + 4 instructions.
    pub relative: bool,
    /// Add register file A entry `raddr_a` to the target.
    pub use_register: bool,
    pub raddr_a: u8,
    pub write_swap: bool,
    /// Receive the return address.
    pub add_out: u8,
    pub mul_out: u8,
    /// Byte offset or absolute address.
    pub immediate: i32,
}

impl BranchInstruction {
    /// A relative branch by `offset` bytes, not saving the return address.
    pub fn relative(condition: BranchCondition, offset: i32) -> Self {
        Self {
            condition,
            relative: true,
            use_register: false,
            raddr_a: 0,
            write_swap: false,
            add_out: super::NOP_ADDRESS,
            mul_out: super::NOP_ADDRESS,
            immediate: offset,
        }
    }
}

impl MachineInstruction for BranchInstruction {
    const KIND: &'static str = "branch";

    const FIELDS: &'static [FieldDescriptor] = &[
        SIGNAL_BRANCH,
        CONDITION,
        RELATIVE,
        USE_REGISTER,
        RADDR_A,
        WRITE_SWAP,
        WADDR_ADD,
        WADDR_MUL,
        IMMEDIATE,
    ];

    fn from_fields(fields: &FieldValues) -> Self {
        Self {
            condition: BranchCondition::from_bits(fields.get(&CONDITION)),
            relative: fields.flag(&RELATIVE),
            use_register: fields.flag(&USE_REGISTER),
            raddr_a: fields.get(&RADDR_A) as u8,
            write_swap: fields.flag(&WRITE_SWAP),
            add_out: fields.get(&WADDR_ADD) as u8,
            mul_out: fields.get(&WADDR_MUL) as u8,
            immediate: fields.get(&IMMEDIATE) as u32 as i32,
        }
    }

    fn encode(&self) -> CompileResult<InstructionWord> {
        fields::pack(&[
            (&SIGNAL_BRANCH, super::BRANCH_SIGNAL),
            (&CONDITION, self.condition as u64),
            (&RELATIVE, u64::from(self.relative)),
            (&USE_REGISTER, u64::from(self.use_register)),
            (&RADDR_A, u64::from(self.raddr_a)),
            (&WRITE_SWAP, u64::from(self.write_swap)),
            (&WADDR_ADD, u64::from(self.add_out)),
            (&WADDR_MUL, u64::from(self.mul_out)),
            (&IMMEDIATE, u64::from(self.immediate as u32)),
        ])
    }

    fn to_asm_string(&self) -> String {
        let mnemonic = if self.relative { "brr" } else { "bra" };
        let link = fields::write_address_name(self.add_out, true, self.write_swap);
        let register = if self.use_register {
            format!("ra{} + ", self.raddr_a)
        } else {
            String::new()
        };
        format!(
            "{mnemonic}.{} {link}, {register}{}",
            self.condition.mnemonic(),
            self.immediate
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_offset() {
        let inst = BranchInstruction::relative(BranchCondition::AnyZeroClear, -64);
        let word = inst.encode().unwrap();
        assert_eq!(word.0 >> 60, 0xF);
        assert_eq!(word.0 as u32, (-64i32) as u32);
        assert_eq!(BranchInstruction::decode(word), Ok(inst));
        assert_eq!(inst.to_asm_string(), "brr.anynz -, -64");
    }

    #[test]
    fn test_reserved_condition_is_invalid() {
        let word = BranchInstruction::relative(BranchCondition::Always, 0).encode().unwrap();
        let reserved = InstructionWord((word.0 & !CONDITION.word_mask()) | (13 << 52));
        assert!(!BranchInstruction::is_valid_instruction(reserved));
    }
}
