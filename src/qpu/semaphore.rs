// Semaphore instructions share the load-immediate signal with the LoadImmediate kind and are
// told apart by the opcode bits directly below the signal (signal and opcode together form the
// 7-bit value 0x74). Besides the ALU write fields common to all load-immediate-signal words
// they carry the direction (increment releases, decrement acquires) and the index of one of the
// 16 hardware semaphores.

//! Semaphore instruction encoding.

use super::fields::{self, FieldDescriptor, FieldValues, InstructionWord, MachineInstruction};
use super::{
    condition_from_bits, condition_suffix, COND_ADD, COND_MUL, PACK, SET_FLAGS, SIGNAL_LOAD_IMMEDIATE, WADDR_ADD,
    WADDR_MUL, WRITE_SWAP,
};
use crate::core::error::CompileResult;
use crate::ir::{ConditionCode, SetFlag};

/// Opcode bits 57-59 of a semaphore word.
pub const SEMAPHORE_OPCODE: u64 = 0b100;

pub const OPCODE: FieldDescriptor = FieldDescriptor::enumerated("opcode", 57, 3, &[(SEMAPHORE_OPCODE, "semaphore")]);
pub const INCREMENT: FieldDescriptor = FieldDescriptor::bit("increment", 4);
pub const SEMAPHORE: FieldDescriptor = FieldDescriptor::unsigned("semaphore", 0, 4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemaphoreInstruction {
    /// Pack mode, including the pm bit.
    pub pack: u8,
    pub cond_add: ConditionCode,
    pub cond_mul: ConditionCode,
    pub set_flags: SetFlag,
    pub write_swap: bool,
    pub add_out: u8,
    pub mul_out: u8,
    /// Increment (release) or decrement (acquire).
    pub increment: bool,
    pub semaphore: u8,
}

impl SemaphoreInstruction {
    /// Increment or decrement `semaphore` without writing any register.
    pub fn new(semaphore: u8, increment: bool) -> Self {
        Self {
            pack: 0,
            cond_add: ConditionCode::Never,
            cond_mul: ConditionCode::Never,
            set_flags: SetFlag::DontSet,
            write_swap: false,
            add_out: super::NOP_ADDRESS,
            mul_out: super::NOP_ADDRESS,
            increment,
            semaphore,
        }
    }
}

impl MachineInstruction for SemaphoreInstruction {
    const KIND: &'static str = "semaphore";

    const FIELDS: &'static [FieldDescriptor] = &[
        SIGNAL_LOAD_IMMEDIATE,
        OPCODE,
        PACK,
        COND_ADD,
        COND_MUL,
        SET_FLAGS,
        WRITE_SWAP,
        WADDR_ADD,
        WADDR_MUL,
        INCREMENT,
        SEMAPHORE,
    ];

    fn from_fields(fields: &FieldValues) -> Self {
        Self {
            pack: fields.get(&PACK) as u8,
            cond_add: condition_from_bits(fields.get(&COND_ADD)),
            cond_mul: condition_from_bits(fields.get(&COND_MUL)),
            set_flags: if fields.flag(&SET_FLAGS) {
                SetFlag::SetFlags
            } else {
                SetFlag::DontSet
            },
            write_swap: fields.flag(&WRITE_SWAP),
            add_out: fields.get(&WADDR_ADD) as u8,
            mul_out: fields.get(&WADDR_MUL) as u8,
            increment: fields.flag(&INCREMENT),
            semaphore: fields.get(&SEMAPHORE) as u8,
        }
    }

    fn encode(&self) -> CompileResult<InstructionWord> {
        fields::pack(&[
            (&SIGNAL_LOAD_IMMEDIATE, super::LOAD_IMMEDIATE_SIGNAL),
            (&OPCODE, SEMAPHORE_OPCODE),
            (&PACK, u64::from(self.pack)),
            (&COND_ADD, self.cond_add as u64),
            (&COND_MUL, self.cond_mul as u64),
            (&SET_FLAGS, self.set_flags as u64),
            (&WRITE_SWAP, u64::from(self.write_swap)),
            (&WADDR_ADD, u64::from(self.add_out)),
            (&WADDR_MUL, u64::from(self.mul_out)),
            (&INCREMENT, u64::from(self.increment)),
            (&SEMAPHORE, u64::from(self.semaphore)),
        ])
    }

    fn to_asm_string(&self) -> String {
        let mnemonic = if self.increment { "srel" } else { "sacq" };
        let add = fields::write_address_name(self.add_out, true, self.write_swap);
        let mul = fields::write_address_name(self.mul_out, false, self.write_swap);
        format!(
            "{mnemonic}{}{} {add}, {mul}, {}",
            condition_suffix(self.cond_add),
            if self.set_flags == SetFlag::SetFlags { ".setf" } else { "" },
            self.semaphore
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_layout() {
        let word = SemaphoreInstruction::new(3, true).encode().unwrap();
        // signal and opcode form 0x74 in bits 57-63
        assert_eq!(word.0 >> 57, 0x74);
        assert_eq!(word.0 & 0x1F, 0x13);
        assert!(SemaphoreInstruction::is_valid_instruction(word));
    }

    #[test]
    fn test_semaphore_index_overflow() {
        assert!(SemaphoreInstruction::new(16, false).encode().is_err());
    }

    #[test]
    fn test_asm_string() {
        let inst = SemaphoreInstruction::new(7, false);
        assert_eq!(inst.to_asm_string(), "sacq.never -, -, 7");
    }
}
