// This module provides the bit-field machinery shared by all QPU instruction kinds. A kind is
// described by a table of FieldDescriptors (name, bit offset, bit width, decode kind); the
// table is ordered so that the discriminating fields (the signal, then the opcode where the
// signal is shared) come first. Validation walks the table in order and stops at the first
// field whose value the kind does not accept, and it rejects words with bits set outside all
// declared fields, so a valid word always re-encodes to itself. FieldValues is the read view
// handed to a kind's decoder; it can only be created after validation succeeded, which makes
// check-then-decode the only way to read fields of a word. Encoding packs (field, value) pairs
// and reports values that do not fit their field width.

//! Bit-field descriptors and instruction words.

use crate::core::error::{CompileError, CompileResult};
use std::fmt;

/// How a field's raw bits are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeKind {
    /// Any value fitting the width.
    Unsigned,
    /// A single flag bit.
    Bit,
    /// Only the listed values are defined.
    Enumerated(&'static [(u64, &'static str)]),
}

/// Position, width and interpretation of one named field of a 64-bit word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub offset: u8,
    pub width: u8,
    pub decode: DecodeKind,
}

impl FieldDescriptor {
    pub const fn new(name: &'static str, offset: u8, width: u8, decode: DecodeKind) -> Self {
        Self {
            name,
            offset,
            width,
            decode,
        }
    }

    pub const fn unsigned(name: &'static str, offset: u8, width: u8) -> Self {
        Self::new(name, offset, width, DecodeKind::Unsigned)
    }

    pub const fn bit(name: &'static str, offset: u8) -> Self {
        Self::new(name, offset, 1, DecodeKind::Bit)
    }

    pub const fn enumerated(name: &'static str, offset: u8, width: u8, values: &'static [(u64, &'static str)]) -> Self {
        Self::new(name, offset, width, DecodeKind::Enumerated(values))
    }

    /// Mask of the field's value, not shifted.
    pub fn value_mask(&self) -> u64 {
        if self.width >= 64 {
            u64::MAX
        } else {
            (1u64 << self.width) - 1
        }
    }

    /// Mask of the field's bits within the word.
    pub fn word_mask(&self) -> u64 {
        self.value_mask() << self.offset
    }

    pub fn extract(&self, word: u64) -> u64 {
        (word >> self.offset) & self.value_mask()
    }

    /// Replace the field in `word` with `value`.
    pub fn insert(&self, word: u64, value: u64) -> CompileResult<u64> {
        if value & !self.value_mask() != 0 {
            return Err(CompileError::FieldOverflow {
                field: self.name,
                value,
                width: self.width,
            });
        }
        Ok((word & !self.word_mask()) | (value << self.offset))
    }

    /// Whether `value` is defined for this field.
    pub fn accepts(&self, value: u64) -> bool {
        match self.decode {
            DecodeKind::Unsigned | DecodeKind::Bit => value & !self.value_mask() == 0,
            DecodeKind::Enumerated(values) => values.iter().any(|(v, _)| *v == value),
        }
    }

    /// Human readable form of `value`.
    pub fn describe(&self, value: u64) -> String {
        match self.decode {
            DecodeKind::Unsigned => format!("{value}"),
            DecodeKind::Bit => format!("{}", value != 0),
            DecodeKind::Enumerated(values) => values
                .iter()
                .find(|(v, _)| *v == value)
                .map_or_else(|| format!("<invalid {value}>"), |(_, name)| (*name).to_string()),
        }
    }
}

/// Bits not covered by any field of `fields`.
pub fn reserved_mask(fields: &[FieldDescriptor]) -> u64 {
    !fields.iter().fold(0, |mask, field| mask | field.word_mask())
}

/// Whether no two fields of `fields` share a bit.
pub fn is_partition(fields: &[FieldDescriptor]) -> bool {
    let mut seen = 0u64;
    for field in fields {
        if seen & field.word_mask() != 0 {
            return false;
        }
        seen |= field.word_mask();
    }
    true
}

/// Check `word` against `fields` in table order, discriminators first.
pub fn validate(fields: &[FieldDescriptor], word: u64) -> bool {
    word & reserved_mask(fields) == 0 && fields.iter().all(|field| field.accepts(field.extract(word)))
}

/// Pack `(field, value)` pairs into a word.
pub fn pack(values: &[(&FieldDescriptor, u64)]) -> CompileResult<InstructionWord> {
    values
        .iter()
        .try_fold(0u64, |word, (field, value)| field.insert(word, *value))
        .map(InstructionWord)
}

/// A raw 64-bit machine instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InstructionWord(pub u64);

impl fmt::Display for InstructionWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

impl From<u64> for InstructionWord {
    fn from(word: u64) -> Self {
        InstructionWord(word)
    }
}

/// Read access to the fields of a validated word.
#[derive(Debug, Clone, Copy)]
pub struct FieldValues {
    word: u64,
}

impl FieldValues {
    pub(crate) fn validated(word: InstructionWord) -> Self {
        Self { word: word.0 }
    }

    pub fn get(&self, field: &FieldDescriptor) -> u64 {
        field.extract(self.word)
    }

    pub fn flag(&self, field: &FieldDescriptor) -> bool {
        self.get(field) != 0
    }
}

/// An instruction kind with a fixed field layout.
pub trait MachineInstruction: Sized {
    /// Name used in diagnostics.
    const KIND: &'static str;

    /// Field layout, discriminating fields first.
    const FIELDS: &'static [FieldDescriptor];

    /// Whether `word` is well-formed for this kind.
    fn is_valid_instruction(word: InstructionWord) -> bool {
        validate(Self::FIELDS, word.0)
    }

    /// Decode `word`, which must be valid for this kind.
    fn decode(word: InstructionWord) -> CompileResult<Self> {
        if !Self::is_valid_instruction(word) {
            return Err(CompileError::InvalidInstruction {
                kind: Self::KIND,
                word: word.0,
            });
        }
        Ok(Self::from_fields(&FieldValues::validated(word)))
    }

    /// Build the instruction from the fields of a validated word.
    fn from_fields(fields: &FieldValues) -> Self;

    fn encode(&self) -> CompileResult<InstructionWord>;

    fn to_asm_string(&self) -> String;
}

/// Render a write address for the add (`is_add`) or mul ALU.
pub(crate) fn write_address_name(address: u8, is_add: bool, write_swap: bool) -> String {
    match address {
        32..=35 => format!("r{}", address - 32),
        39 => "-".to_string(),
        _ => {
            // without write swap the add ALU writes register file A
            let file = if is_add != write_swap { "ra" } else { "rb" };
            format!("{file}{address}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELD: FieldDescriptor = FieldDescriptor::unsigned("field", 4, 3);
    const KIND: FieldDescriptor = FieldDescriptor::enumerated("kind", 60, 4, &[(0xE, "load_imm")]);

    #[test]
    fn test_insert_extract() {
        let word = FIELD.insert(0, 5).unwrap();
        assert_eq!(word, 5 << 4);
        assert_eq!(FIELD.extract(word | 0xF), 5);
        assert_eq!(
            FIELD.insert(0, 8),
            Err(CompileError::FieldOverflow {
                field: "field",
                value: 8,
                width: 3
            })
        );
    }

    #[test]
    fn test_validate_checks_discriminator_and_reserved_bits() {
        let fields = [KIND, FIELD];
        assert!(validate(&fields, 0xE << 60));
        assert!(!validate(&fields, 0xF << 60));
        // a bit outside all fields
        assert!(!validate(&fields, (0xE << 60) | 1));
        assert!(is_partition(&fields));
        assert!(!is_partition(&[FIELD, FieldDescriptor::bit("overlap", 5)]));
    }

    #[test]
    fn test_word_display() {
        assert_eq!(InstructionWord(0xE800_0000_0000_0013).to_string(), "0xe800000000000013");
        assert_eq!(KIND.describe(0xE), "load_imm");
        assert_eq!(KIND.describe(1), "<invalid 1>");
    }

    #[test]
    fn test_write_address_names() {
        assert_eq!(write_address_name(39, true, false), "-");
        assert_eq!(write_address_name(33, false, false), "r1");
        assert_eq!(write_address_name(5, true, false), "ra5");
        assert_eq!(write_address_name(5, true, true), "rb5");
    }
}
