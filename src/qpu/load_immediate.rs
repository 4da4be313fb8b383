//! Load-immediate instruction encoding.
//!
//! Writes a 32-bit immediate (or 16 per-lane 2-bit values) to the ALU outputs. Shares the
//! load-immediate signal with [`SemaphoreInstruction`](super::semaphore::SemaphoreInstruction);
//! the opcode bits below the signal select the load mode.

use super::fields::{self, FieldDescriptor, FieldValues, InstructionWord, MachineInstruction};
use super::{
    condition_from_bits, condition_suffix, COND_ADD, COND_MUL, IMMEDIATE, PACK, SET_FLAGS, SIGNAL_LOAD_IMMEDIATE,
    WADDR_ADD, WADDR_MUL, WRITE_SWAP,
};
use crate::core::error::CompileResult;
use crate::ir::{ConditionCode, SetFlag};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadMode {
    /// The same 32-bit value in all lanes.
    Immediate32 = 0,
    /// Per-lane signed 2-bit values (bit i and bit 16 + i form lane i).
    PerElementSigned = 1,
    /// Per-lane unsigned 2-bit values.
    PerElementUnsigned = 3,
}

impl LoadMode {
    fn from_bits(bits: u64) -> Self {
        match bits {
            1 => LoadMode::PerElementSigned,
            3 => LoadMode::PerElementUnsigned,
            _ => LoadMode::Immediate32,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            LoadMode::Immediate32 => "ldi",
            LoadMode::PerElementSigned => "ldi.es",
            LoadMode::PerElementUnsigned => "ldi.eu",
        }
    }
}

pub const MODE: FieldDescriptor = FieldDescriptor::enumerated(
    "mode",
    57,
    3,
    &[(0, "immediate32"), (1, "per-element-signed"), (3, "per-element-unsigned")],
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadImmediateInstruction {
    pub mode: LoadMode,
    pub pack: u8,
    pub cond_add: ConditionCode,
    pub cond_mul: ConditionCode,
    pub set_flags: SetFlag,
    pub write_swap: bool,
    pub add_out: u8,
    pub mul_out: u8,
    pub immediate: u32,
}

impl LoadImmediateInstruction {
    /// Load `immediate` into the add ALU output `add_out`.
    pub fn new(mode: LoadMode, add_out: u8, immediate: u32) -> Self {
        Self {
            mode,
            pack: 0,
            cond_add: ConditionCode::Always,
            cond_mul: ConditionCode::Never,
            set_flags: SetFlag::DontSet,
            write_swap: false,
            add_out,
            mul_out: super::NOP_ADDRESS,
            immediate,
        }
    }
}

impl MachineInstruction for LoadImmediateInstruction {
    const KIND: &'static str = "load-immediate";

    const FIELDS: &'static [FieldDescriptor] = &[
        SIGNAL_LOAD_IMMEDIATE,
        MODE,
        PACK,
        COND_ADD,
        COND_MUL,
        SET_FLAGS,
        WRITE_SWAP,
        WADDR_ADD,
        WADDR_MUL,
        IMMEDIATE,
    ];

    fn from_fields(fields: &FieldValues) -> Self {
        Self {
            mode: LoadMode::from_bits(fields.get(&MODE)),
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
            immediate: fields.get(&IMMEDIATE) as u32,
        }
    }

    fn encode(&self) -> CompileResult<InstructionWord> {
        fields::pack(&[
            (&SIGNAL_LOAD_IMMEDIATE, super::LOAD_IMMEDIATE_SIGNAL),
            (&MODE, self.mode as u64),
            (&PACK, u64::from(self.pack)),
            (&COND_ADD, self.cond_add as u64),
            (&COND_MUL, self.cond_mul as u64),
            (&SET_FLAGS, self.set_flags as u64),
            (&WRITE_SWAP, u64::from(self.write_swap)),
            (&WADDR_ADD, u64::from(self.add_out)),
            (&WADDR_MUL, u64::from(self.mul_out)),
            (&IMMEDIATE, u64::from(self.immediate)),
        ])
    }

    fn to_asm_string(&self) -> String {
        let add = fields::write_address_name(self.add_out, true, self.write_swap);
        let mul = fields::write_address_name(self.mul_out, false, self.write_swap);
        format!(
            "{}{}{} {add}, {mul}, {:#x}",
            self.mode.mnemonic(),
            condition_suffix(self.cond_add),
            if self.set_flags == SetFlag::SetFlags { ".setf" } else { "" },
            self.immediate
        )
    }
}
