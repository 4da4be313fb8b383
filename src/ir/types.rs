// This module defines DataType, the type model shared by values, locals and the canonical
// instruction stream. It covers what lowering needs to reason about: void and label types,
// integer and floating-point scalars with an optional SIMD lane count (up to the QPU's native
// 16 lanes), pointers, fixed-size arrays and (optionally packed) structs. The in-memory layout
// helpers compute byte widths and alignments the way OpenCL C lays data out (vectors are
// aligned to their full size, struct members are padded to their natural alignment), which
// is what GEP-style index calculation and the module's global-data segment layout rely on.

//! Data types of the backend IR.

use std::fmt;

/// Number of SIMD lanes of a QPU register.
pub const NATIVE_VECTOR_SIZE: u8 = 16;

/// Type of an IR value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    Void,
    Label,
    /// Integer scalar (`lanes == 1`) or vector.
    Int { bits: u8, lanes: u8 },
    /// Floating-point scalar (`lanes == 1`) or vector.
    Float { bits: u8, lanes: u8 },
    Pointer(Box<DataType>),
    Array { element: Box<DataType>, count: u32 },
    Struct { elements: Vec<DataType>, packed: bool },
}

impl DataType {
    pub const VOID: DataType = DataType::Void;
    pub const LABEL: DataType = DataType::Label;
    pub const BOOL: DataType = DataType::Int { bits: 1, lanes: 1 };
    pub const INT8: DataType = DataType::Int { bits: 8, lanes: 1 };
    pub const INT16: DataType = DataType::Int { bits: 16, lanes: 1 };
    pub const INT32: DataType = DataType::Int { bits: 32, lanes: 1 };
    pub const FLOAT: DataType = DataType::Float { bits: 32, lanes: 1 };

    /// Pointer to `pointee`.
    pub fn pointer_to(pointee: DataType) -> DataType {
        DataType::Pointer(Box::new(pointee))
    }

    /// Array of `count` elements of `element`.
    pub fn array_of(element: DataType, count: u32) -> DataType {
        DataType::Array {
            element: Box::new(element),
            count,
        }
    }

    /// Non-packed struct of the given members.
    pub fn struct_of(elements: Vec<DataType>) -> DataType {
        DataType::Struct {
            elements,
            packed: false,
        }
    }

    /// The same scalar type with `lanes` SIMD lanes. Non-numeric types are returned unchanged.
    pub fn to_vector(&self, lanes: u8) -> DataType {
        match *self {
            DataType::Int { bits, .. } => DataType::Int { bits, lanes },
            DataType::Float { bits, .. } => DataType::Float { bits, lanes },
            _ => self.clone(),
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, DataType::Void)
    }

    pub fn is_label(&self) -> bool {
        matches!(self, DataType::Label)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, DataType::Pointer(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DataType::Float { .. })
    }

    /// Single-lane numeric type or a pointer.
    pub fn is_scalar(&self) -> bool {
        match self {
            DataType::Int { lanes, .. } | DataType::Float { lanes, .. } => *lanes == 1,
            DataType::Pointer(_) => true,
            _ => false,
        }
    }

    /// Numeric type with more than one lane.
    pub fn is_vector(&self) -> bool {
        match self {
            DataType::Int { lanes, .. } | DataType::Float { lanes, .. } => *lanes > 1,
            _ => false,
        }
    }

    /// Number of SIMD lanes, 1 for everything but vectors.
    pub fn vector_width(&self) -> u8 {
        match self {
            DataType::Int { lanes, .. } | DataType::Float { lanes, .. } => *lanes,
            _ => 1,
        }
    }

    /// Bit width of a single lane (pointers are 32 bit on the QPU).
    pub fn scalar_bit_count(&self) -> u32 {
        match self {
            DataType::Int { bits, .. } | DataType::Float { bits, .. } => u32::from(*bits),
            DataType::Pointer(_) => 32,
            _ => 0,
        }
    }

    /// Type pointed to, for pointers only.
    pub fn pointee(&self) -> Option<&DataType> {
        match self {
            DataType::Pointer(pointee) => Some(pointee),
            _ => None,
        }
    }

    /// Lane type of a vector, element type of an array, pointee of a pointer,
    /// the type itself otherwise.
    pub fn element_type(&self) -> DataType {
        match self {
            DataType::Int { .. } | DataType::Float { .. } => self.to_vector(1),
            DataType::Array { element, .. } => (**element).clone(),
            DataType::Pointer(pointee) => (**pointee).clone(),
            _ => self.clone(),
        }
    }

    /// Size in bytes this type occupies in memory.
    pub fn in_memory_width(&self) -> u32 {
        match self {
            DataType::Void | DataType::Label => 0,
            // 3-element vectors occupy the space of 4-element ones
            DataType::Int { bits, lanes } | DataType::Float { bits, lanes } => {
                element_bytes(*bits) * u32::from(*lanes).next_power_of_two()
            }
            DataType::Pointer(_) => 4,
            DataType::Array { element, count } => element.in_memory_width() * count,
            DataType::Struct { elements, packed } => {
                let mut size = 0u32;
                for element in elements {
                    if !packed {
                        size = align_up(size, element.in_memory_alignment());
                    }
                    size += element.in_memory_width();
                }
                if *packed {
                    size
                } else {
                    align_up(size, self.in_memory_alignment())
                }
            }
        }
    }

    /// Alignment in bytes this type requires in memory.
    pub fn in_memory_alignment(&self) -> u32 {
        match self {
            DataType::Void | DataType::Label => 1,
            // 3-element vectors are aligned like 4-element ones
            DataType::Int { bits, lanes } | DataType::Float { bits, lanes } => {
                element_bytes(*bits) * u32::from(*lanes).next_power_of_two()
            }
            DataType::Pointer(_) => 4,
            DataType::Array { element, .. } => element.in_memory_alignment(),
            DataType::Struct { elements, packed } => {
                if *packed {
                    1
                } else {
                    elements
                        .iter()
                        .map(DataType::in_memory_alignment)
                        .max()
                        .unwrap_or(1)
                }
            }
        }
    }

    /// Byte offset of struct member `index`, `None` for non-structs or out-of-range indices.
    pub fn struct_element_offset(&self, index: usize) -> Option<u32> {
        let DataType::Struct { elements, packed } = self else {
            return None;
        };
        if index >= elements.len() {
            return None;
        }
        let mut offset = 0u32;
        for (i, element) in elements.iter().enumerate() {
            if !packed {
                offset = align_up(offset, element.in_memory_alignment());
            }
            if i == index {
                return Some(offset);
            }
            offset += element.in_memory_width();
        }
        None
    }
}

fn element_bytes(bits: u8) -> u32 {
    u32::from(bits).div_ceil(8).max(1)
}

/// Round `value` up to the next multiple of `alignment`.
pub fn align_up(value: u32, alignment: u32) -> u32 {
    if alignment <= 1 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Void => f.write_str("void"),
            DataType::Label => f.write_str("label"),
            DataType::Int { bits, lanes } if *lanes > 1 => write!(f, "<{lanes} x i{bits}>"),
            DataType::Int { bits, .. } => write!(f, "i{bits}"),
            DataType::Float { bits, lanes } => {
                let name = match bits {
                    16 => "half",
                    64 => "double",
                    _ => "float",
                };
                if *lanes > 1 {
                    write!(f, "<{lanes} x {name}>")
                } else {
                    f.write_str(name)
                }
            }
            DataType::Pointer(pointee) => write!(f, "{pointee}*"),
            DataType::Array { element, count } => write!(f, "[{count} x {element}]"),
            DataType::Struct { elements, packed } => {
                f.write_str(if *packed { "<{" } else { "{" })?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{element}")?;
                }
                f.write_str(if *packed { "}>" } else { "}" })
            }
        }
    }
}
