// This module implements the 64-bit VideoCore IV QPU instruction words. The top four bits of
// every word are the signal; semaphore and load-immediate words share signal 0xE and are told
// apart by the three opcode bits 57-59, branches use signal 0xF. The fields every
// load-immediate-signal word carries (pack mode, add/mul conditions, set-flags, write swap, the
// two write addresses) and the 32-bit immediate are declared here once and reused by the kind
// tables. decode_any classifies an arbitrary word: because every kind checks its discriminating
// fields first and rejects bits outside its layout, a word is valid for at most one kind.

//! QPU instruction-word encoding.
//!
//! # Key Components
//!
//! - [`fields`]: field descriptors, validation and packing
//! - [`SemaphoreInstruction`], [`LoadImmediateInstruction`], [`BranchInstruction`]: the kinds
//! - [`decode_any`]: classification of raw words

pub mod branch;
pub mod fields;
pub mod load_immediate;
pub mod semaphore;

pub use branch::{BranchCondition, BranchInstruction};
pub use fields::{DecodeKind, FieldDescriptor, InstructionWord, MachineInstruction};
pub use load_immediate::{LoadImmediateInstruction, LoadMode};
pub use semaphore::SemaphoreInstruction;

use crate::ir::ConditionCode;
use std::fmt;

/// Signal of load-immediate and semaphore words.
pub const LOAD_IMMEDIATE_SIGNAL: u64 = 0xE;
/// Signal of branch words.
pub const BRANCH_SIGNAL: u64 = 0xF;
/// Write address discarding the result.
pub const NOP_ADDRESS: u8 = 39;

const CONDITION_NAMES: &[(u64, &str)] = &[
    (0, "never"),
    (1, "always"),
    (2, "zs"),
    (3, "zc"),
    (4, "ns"),
    (5, "nc"),
    (6, "cs"),
    (7, "cc"),
];

pub const SIGNAL_LOAD_IMMEDIATE: FieldDescriptor =
    FieldDescriptor::enumerated("signal", 60, 4, &[(LOAD_IMMEDIATE_SIGNAL, "load_imm")]);
pub const SIGNAL_BRANCH: FieldDescriptor = FieldDescriptor::enumerated("signal", 60, 4, &[(BRANCH_SIGNAL, "branch")]);
/// Pack mode, including the pm bit.
pub const PACK: FieldDescriptor = FieldDescriptor::unsigned("pack", 52, 5);
pub const COND_ADD: FieldDescriptor = FieldDescriptor::enumerated("cond_add", 49, 3, CONDITION_NAMES);
pub const COND_MUL: FieldDescriptor = FieldDescriptor::enumerated("cond_mul", 46, 3, CONDITION_NAMES);
pub const SET_FLAGS: FieldDescriptor = FieldDescriptor::bit("sf", 45);
pub const WRITE_SWAP: FieldDescriptor = FieldDescriptor::bit("ws", 44);
pub const WADDR_ADD: FieldDescriptor = FieldDescriptor::unsigned("waddr_add", 38, 6);
pub const WADDR_MUL: FieldDescriptor = FieldDescriptor::unsigned("waddr_mul", 32, 6);
pub const IMMEDIATE: FieldDescriptor = FieldDescriptor::unsigned("immediate", 0, 32);

pub(crate) fn condition_from_bits(bits: u64) -> ConditionCode {
    ConditionCode::ALL[(bits & 0x7) as usize]
}

pub(crate) fn condition_suffix(condition: ConditionCode) -> String {
    match condition {
        ConditionCode::Always => String::new(),
        other => format!(
            ".{}",
            CONDITION_NAMES
                .iter()
                .find(|(value, _)| *value == other as u64)
                .map_or("?", |(_, name)| *name)
        ),
    }
}

/// A word decoded as one of the supported kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodedInstruction {
    Semaphore(SemaphoreInstruction),
    LoadImmediate(LoadImmediateInstruction),
    Branch(BranchInstruction),
}

impl DecodedInstruction {
    pub fn kind(&self) -> &'static str {
        match self {
            DecodedInstruction::Semaphore(_) => SemaphoreInstruction::KIND,
            DecodedInstruction::LoadImmediate(_) => LoadImmediateInstruction::KIND,
            DecodedInstruction::Branch(_) => BranchInstruction::KIND,
        }
    }

    pub fn fields(&self) -> &'static [FieldDescriptor] {
        match self {
            DecodedInstruction::Semaphore(_) => SemaphoreInstruction::FIELDS,
            DecodedInstruction::LoadImmediate(_) => LoadImmediateInstruction::FIELDS,
            DecodedInstruction::Branch(_) => BranchInstruction::FIELDS,
        }
    }

    pub fn to_asm_string(&self) -> String {
        match self {
            DecodedInstruction::Semaphore(inst) => inst.to_asm_string(),
            DecodedInstruction::LoadImmediate(inst) => inst.to_asm_string(),
            DecodedInstruction::Branch(inst) => inst.to_asm_string(),
        }
    }
}

impl fmt::Display for DecodedInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_asm_string())
    }
}

/// Decode `word` as whichever supported kind it is valid for.
pub fn decode_any(word: InstructionWord) -> Option<DecodedInstruction> {
    if let Ok(inst) = SemaphoreInstruction::decode(word) {
        return Some(DecodedInstruction::Semaphore(inst));
    }
    if let Ok(inst) = LoadImmediateInstruction::decode(word) {
        return Some(DecodedInstruction::LoadImmediate(inst));
    }
    BranchInstruction::decode(word).ok().map(DecodedInstruction::Branch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layouts_are_partitions() {
        assert!(fields::is_partition(SemaphoreInstruction::FIELDS));
        assert!(fields::is_partition(LoadImmediateInstruction::FIELDS));
        assert!(fields::is_partition(BranchInstruction::FIELDS));
    }

    #[test]
    fn test_decode_any() {
        let word = SemaphoreInstruction::new(2, true).encode().unwrap();
        assert_eq!(decode_any(word).map(|inst| inst.kind()), Some("semaphore"));
        let word = BranchInstruction::relative(BranchCondition::Always, 8).encode().unwrap();
        assert_eq!(decode_any(word).map(|inst| inst.kind()), Some("branch"));
        // an ALU instruction (signal 1)
        assert_eq!(decode_any(InstructionWord(0x1000_0000_0000_0000)), None);
    }

    #[test]
    fn test_condition_suffix() {
        assert_eq!(condition_suffix(ConditionCode::Always), "");
        assert_eq!(condition_suffix(ConditionCode::ZeroClear), ".zc");
    }
}
