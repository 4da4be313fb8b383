// This module contains the multi-instruction expansions shared by several lowering requests.
// insert_bitcast reinterprets bits between types of equal total size, combining or splitting
// lanes with shifts and masks when the element widths differ. insert_calculate_indices
// implements GEP-style address arithmetic: the first index strides over the pointed-to type,
// every further index descends into arrays, vectors (by element size) or structs (by member
// offset); constant parts are folded and the result records a provenance link to the container.
// Vector lane access works on the QPU's 16-lane registers: extraction rotates the wanted lane
// down to lane 0, insertion rotates the new value up to the target lane and writes it under
// a flag condition computed from the element-number register. Shuffles are composed from
// these two primitives, replication goes through the replicate-all register, and byte swaps
// are expanded into fixed shift/mask/or sequences for 16- and 32-bit operands.

//! Instruction-sequence helpers used by the lowering requests.

use super::instruction::{ConditionCode, Instruction, InstructionDecorations, InstructionKind};
use super::local::LocalReference;
use super::method::Method;
use super::opcodes::{OpCode, OP_ADD, OP_AND, OP_MUL24, OP_OR, OP_SHL, OP_SHR, OP_SUB, OP_XOR};
use super::types::{DataType, NATIVE_VECTOR_SIZE};
use super::value::{Literal, Register, Value, ValueKind};
use crate::core::error::{CompileError, CompileResult};

/// Append `dest = op first, second` with a fresh destination and return it.
fn emit_temporary(
    method: &mut Method<'_>,
    op: OpCode,
    ty: DataType,
    prefix: &str,
    first: Value,
    second: Value,
    decorations: InstructionDecorations,
) -> Value {
    let tmp = method.add_new_local(ty, prefix);
    method.append_to_end(
        Instruction::operation(op, tmp.clone(), first, Some(second)).add_decorations(decorations),
    );
    tmp
}

fn literal_lane(index: &Value, container: &Value) -> CompileResult<Option<u8>> {
    let Some(literal) = index.literal_value() else {
        return Ok(None);
    };
    let lane = literal.unsigned_int();
    if lane >= u32::from(NATIVE_VECTOR_SIZE) || (container.ty.is_vector() && lane >= u32::from(container.ty.vector_width())) {
        return Err(CompileError::InvalidValue {
            reason: format!("lane index {lane} out of range for {container}"),
        });
    }
    Ok(Some(lane as u8))
}

/// Copy lane `index` of `container` into lane 0 of `dest`.
pub fn insert_vector_extraction(
    method: &mut Method<'_>,
    container: &Value,
    index: &Value,
    dest: &Value,
) -> CompileResult<()> {
    match literal_lane(index, container)? {
        Some(0) => method.append_to_end(Instruction::mov(dest.clone(), container.clone())),
        Some(lane) => {
            let offset = Value::int(i32::from(NATIVE_VECTOR_SIZE - lane));
            method.append_to_end(Instruction::new(InstructionKind::VectorRotation {
                dest: dest.clone(),
                source: container.clone(),
                offset,
            }));
        }
        None => {
            let offset = emit_temporary(
                method,
                OP_SUB,
                DataType::INT32,
                "%extract_offset",
                Value::int(i32::from(NATIVE_VECTOR_SIZE)),
                index.clone(),
                InstructionDecorations::NONE,
            );
            method.append_to_end(Instruction::new(InstructionKind::VectorRotation {
                dest: dest.clone(),
                source: container.clone(),
                offset,
            }));
        }
    }
    Ok(())
}

/// Overwrite lane `index` of `container` with `value`, leaving all other lanes untouched.
pub fn insert_vector_insertion(
    method: &mut Method<'_>,
    container: &Value,
    index: &Value,
    value: &Value,
) -> CompileResult<()> {
    let lane = literal_lane(index, container)?;
    // literals are identical in all lanes, so they never need rotating
    let needs_rotation = lane != Some(0) && value.literal_value().is_none();
    let source = if needs_rotation {
        let rotated = method.add_new_local(container.ty.clone(), "%vector_insert");
        let offset = match lane {
            Some(lane) => Value::int(i32::from(lane)),
            None => index.clone(),
        };
        method.append_to_end(Instruction::new(InstructionKind::VectorRotation {
            dest: rotated.clone(),
            source: value.clone(),
            offset,
        }));
        rotated
    } else {
        value.clone()
    };
    // zero flag is set exactly in the selected lane
    let selector = match lane {
        Some(lane) => Value::int(i32::from(lane)),
        None => index.clone(),
    };
    method.append_to_end(
        Instruction::operation(
            OP_XOR,
            Value::nop(DataType::INT32),
            Value::register(Register::ElementNumber, DataType::INT32.to_vector(NATIVE_VECTOR_SIZE)),
            Some(selector),
        )
        .with_set_flags(),
    );
    method.append_to_end(
        Instruction::mov(container.clone(), source).with_condition(ConditionCode::ZeroSet),
    );
    Ok(())
}

/// Replicate lane 0 of `source` across all lanes of `dest`.
pub fn insert_replication(method: &mut Method<'_>, source: &Value, dest: &Value, set_flags: bool) {
    let replicated = Value::register(Register::ReplicateAll, source.ty.clone());
    method.append_to_end(Instruction::mov(replicated.clone(), source.clone()));
    let read = Instruction::mov(dest.clone(), replicated);
    method.append_to_end(if set_flags { read.with_set_flags() } else { read });
}

/// Build `dest` by picking, for every output lane, a lane of `first` or `second` as
/// selected by `mask`.
pub fn insert_vector_shuffle(
    method: &mut Method<'_>,
    dest: &Value,
    first: &Value,
    second: &Value,
    mask: &Value,
) -> CompileResult<()> {
    let first_width = u32::from(first.ty.vector_width());
    match &mask.kind {
        ValueKind::Undefined => {
            log::trace!("Shuffle with undefined mask leaves {dest} undefined");
            Ok(())
        }
        ValueKind::Container(elements) => {
            let indices: Vec<Option<u32>> = elements
                .iter()
                .map(|element| match element.kind {
                    ValueKind::Undefined => Ok(None),
                    ValueKind::Literal(literal) => Ok(Some(literal.unsigned_int())),
                    _ => Err(CompileError::InvalidValue {
                        reason: format!("shuffle mask element is not constant: {element}"),
                    }),
                })
                .collect::<CompileResult<_>>()?;
            shuffle_constant(method, dest, first, second, &indices, first_width)
        }
        ValueKind::Literal(literal) => {
            // e.g. zeroinitializer: every lane takes the same source lane
            let indices = vec![Some(literal.unsigned_int()); usize::from(dest.ty.vector_width())];
            shuffle_constant(method, dest, first, second, &indices, first_width)
        }
        _ => shuffle_variable(method, dest, first, second, mask, first_width),
    }
}

fn shuffle_constant(
    method: &mut Method<'_>,
    dest: &Value,
    first: &Value,
    second: &Value,
    indices: &[Option<u32>],
    first_width: u32,
) -> CompileResult<()> {
    let is_identity = indices.len() as u32 <= first_width
        && indices
            .iter()
            .enumerate()
            .all(|(lane, index)| index.map_or(true, |index| index == lane as u32));
    if is_identity {
        method.append_to_end(Instruction::mov(dest.clone(), first.clone()));
        return Ok(());
    }
    for (lane, index) in indices.iter().enumerate() {
        let Some(index) = *index else { continue };
        let (source, source_lane) = if index < first_width {
            (first, index)
        } else {
            (second, index - first_width)
        };
        if source.is_undefined() {
            continue;
        }
        let element = method.add_new_local(source.ty.element_type(), "%shuffle_elem");
        insert_vector_extraction(method, source, &Value::int(source_lane as i32), &element)?;
        insert_vector_insertion(method, dest, &Value::int(lane as i32), &element)?;
    }
    Ok(())
}

fn shuffle_variable(
    method: &mut Method<'_>,
    dest: &Value,
    first: &Value,
    second: &Value,
    mask: &Value,
    first_width: u32,
) -> CompileResult<()> {
    let boundary = Value::int(first_width as i32);
    for lane in 0..dest.ty.vector_width() {
        let lane_value = Value::int(i32::from(lane));
        let index = method.add_new_local(DataType::INT32, "%shuffle_mask");
        insert_vector_extraction(method, mask, &lane_value, &index)?;

        let from_first = method.add_new_local(first.ty.element_type(), "%shuffle_first");
        insert_vector_extraction(method, first, &index, &from_first)?;
        let second_index = emit_temporary(
            method,
            OP_SUB,
            DataType::INT32,
            "%shuffle_index",
            index.clone(),
            boundary.clone(),
            InstructionDecorations::NONE,
        );
        let from_second = method.add_new_local(second.ty.element_type(), "%shuffle_second");
        insert_vector_extraction(method, second, &second_index, &from_second)?;

        // negative flag is set iff the mask selects from the first vector
        method.append_to_end(
            Instruction::operation(OP_SUB, Value::nop(DataType::INT32), index, Some(boundary.clone()))
                .with_set_flags(),
        );
        let element = method.add_new_local(first.ty.element_type(), "%shuffle_elem");
        method.append_to_end(
            Instruction::mov(element.clone(), from_first).with_condition(ConditionCode::NegativeSet),
        );
        method.append_to_end(
            Instruction::mov(element.clone(), from_second).with_condition(ConditionCode::NegativeClear),
        );
        insert_vector_insertion(method, dest, &lane_value, &element)?;
    }
    Ok(())
}

/// Compute `dest = &container + Σ index_i × stride_i` for GEP-style `indices`.
///
/// The first index strides over the pointed-to type, every following index selects an
/// element of the aggregate reached so far.
pub fn insert_calculate_indices(
    method: &mut Method<'_>,
    container: &Value,
    dest: &Value,
    indices: &[Value],
) -> CompileResult<()> {
    let decorations = InstructionDecorations::INDEX_CALCULATION;
    let mut ty = container.ty.clone();
    let mut constant_offset: i64 = 0;
    let mut dynamic_offset: Option<Value> = None;

    for (position, index) in indices.iter().enumerate() {
        let (stride, next) = if position == 0 {
            let pointee = ty.pointee().cloned().ok_or_else(|| CompileError::InvalidValue {
                reason: format!("cannot index into non-pointer {container}"),
            })?;
            (pointee.in_memory_width(), pointee)
        } else {
            match &ty {
                DataType::Array { element, .. } => (element.in_memory_width(), (**element).clone()),
                DataType::Int { .. } | DataType::Float { .. } if ty.is_vector() => {
                    let element = ty.element_type();
                    (element.in_memory_width(), element)
                }
                DataType::Struct { elements, .. } => {
                    let member = index
                        .literal_value()
                        .map(|literal| literal.unsigned_int() as usize)
                        .ok_or_else(|| CompileError::InvalidValue {
                            reason: format!("struct member index must be constant: {index}"),
                        })?;
                    let offset = ty.struct_element_offset(member).ok_or_else(|| CompileError::InvalidValue {
                        reason: format!("struct member {member} out of range for {ty}"),
                    })?;
                    constant_offset += i64::from(offset);
                    ty = elements[member].clone();
                    continue;
                }
                other => {
                    return Err(CompileError::InvalidValue {
                        reason: format!("cannot index into {other} (index {index})"),
                    })
                }
            }
        };

        if let Some(literal) = index.literal_value() {
            constant_offset += i64::from(literal.signed_int()) * i64::from(stride);
        } else {
            let scaled = match stride {
                1 => index.clone(),
                s if s.is_power_of_two() => emit_temporary(
                    method,
                    OP_SHL,
                    DataType::INT32,
                    "%index_offset",
                    index.clone(),
                    Value::int(s.trailing_zeros() as i32),
                    decorations,
                ),
                s => emit_temporary(
                    method,
                    OP_MUL24,
                    DataType::INT32,
                    "%index_offset",
                    index.clone(),
                    Value::int(s as i32),
                    decorations,
                ),
            };
            dynamic_offset = Some(match dynamic_offset {
                None => scaled,
                Some(sum) => emit_temporary(method, OP_ADD, DataType::INT32, "%index_sum", sum, scaled, decorations),
            });
        }
        ty = next;
    }

    let constant = i32::try_from(constant_offset).map_err(|_| CompileError::InvalidValue {
        reason: format!("index offset {constant_offset} of {container} exceeds 32 bit"),
    })?;
    let offset = match (dynamic_offset.clone(), constant) {
        (None, 0) => None,
        (None, constant) => Some(Value::int(constant)),
        (Some(dynamic), 0) => Some(dynamic),
        (Some(dynamic), constant) => Some(emit_temporary(
            method,
            OP_ADD,
            DataType::INT32,
            "%index_sum",
            dynamic,
            Value::int(constant),
            decorations,
        )),
    };
    let inst = match offset {
        None => Instruction::mov(dest.clone(), container.clone()),
        Some(offset) => Instruction::operation(OP_ADD, dest.clone(), container.clone(), Some(offset)),
    };
    method.append_to_end(inst.add_decorations(decorations));

    if let (Some(derived), Some(base)) = (dest.local_id(), container.local_id()) {
        let offset = dynamic_offset.is_none().then_some(constant);
        method.set_reference(derived, LocalReference { base, offset });
    }
    Ok(())
}

/// Reinterpret the bits of `source` as the type of `dest`.
pub fn insert_bitcast(method: &mut Method<'_>, source: &Value, dest: &Value) -> CompileResult<()> {
    let decorations = InstructionDecorations::BITCAST;
    let (source_bits, source_lanes) = (source.ty.scalar_bit_count(), u32::from(source.ty.vector_width()));
    let (dest_bits, dest_lanes) = (dest.ty.scalar_bit_count(), u32::from(dest.ty.vector_width()));
    for bits in [source_bits, dest_bits] {
        if bits == 0 || bits > 32 {
            return Err(CompileError::UnsupportedWidth {
                operation: "bit-cast",
                width: bits,
            });
        }
    }
    if source_bits * source_lanes != dest_bits * dest_lanes {
        return Err(CompileError::InvalidValue {
            reason: format!("bit-cast between types of different size: {source} to {dest}"),
        });
    }

    if source_bits == dest_bits {
        method.append_to_end(Instruction::mov(dest.clone(), source.clone()).add_decorations(decorations));
    } else if source_bits < dest_bits {
        // combine several narrow source lanes into each wide destination lane
        let factor = dest_bits / source_bits;
        let element_mask = Value::literal(Literal::Uint((1u32 << source_bits) - 1), DataType::INT32);
        for dest_lane in 0..dest_lanes {
            let mut combined: Option<Value> = None;
            for part in 0..factor {
                let element = method.add_new_local(source.ty.element_type(), "%bitcast_elem");
                insert_vector_extraction(method, source, &Value::int((dest_lane * factor + part) as i32), &element)?;
                let masked = emit_temporary(
                    method,
                    OP_AND,
                    dest.ty.element_type(),
                    "%bitcast_mask",
                    element,
                    element_mask.clone(),
                    decorations,
                );
                let shifted = if part == 0 {
                    masked
                } else {
                    emit_temporary(
                        method,
                        OP_SHL,
                        dest.ty.element_type(),
                        "%bitcast_shift",
                        masked,
                        Value::int((part * source_bits) as i32),
                        decorations,
                    )
                };
                combined = Some(match combined {
                    None => shifted,
                    Some(sum) => emit_temporary(
                        method,
                        OP_OR,
                        dest.ty.element_type(),
                        "%bitcast_or",
                        sum,
                        shifted,
                        decorations,
                    ),
                });
            }
            let Some(combined) = combined else { continue };
            write_lane(method, dest, dest_lanes, dest_lane, combined, decorations)?;
        }
    } else {
        // split each wide source lane into several narrow destination lanes
        let factor = source_bits / dest_bits;
        let element_mask = Value::literal(Literal::Uint((1u32 << dest_bits) - 1), DataType::INT32);
        for dest_lane in 0..dest_lanes {
            let (source_lane, part) = (dest_lane / factor, dest_lane % factor);
            let element = if source_lanes == 1 {
                source.clone()
            } else {
                let element = method.add_new_local(source.ty.element_type(), "%bitcast_elem");
                insert_vector_extraction(method, source, &Value::int(source_lane as i32), &element)?;
                element
            };
            let shifted = if part == 0 {
                element
            } else {
                emit_temporary(
                    method,
                    OP_SHR,
                    source.ty.element_type(),
                    "%bitcast_shift",
                    element,
                    Value::int((part * dest_bits) as i32),
                    decorations,
                )
            };
            let masked = emit_temporary(
                method,
                OP_AND,
                dest.ty.element_type(),
                "%bitcast_mask",
                shifted,
                element_mask.clone(),
                decorations,
            );
            write_lane(method, dest, dest_lanes, dest_lane, masked, decorations)?;
        }
    }

    if source.ty.is_pointer() && dest.ty.is_pointer() {
        if let (Some(derived), Some(base)) = (dest.local_id(), source.local_id()) {
            method.set_reference(derived, LocalReference { base, offset: Some(0) });
        }
    }
    Ok(())
}

fn write_lane(
    method: &mut Method<'_>,
    dest: &Value,
    dest_lanes: u32,
    lane: u32,
    value: Value,
    decorations: InstructionDecorations,
) -> CompileResult<()> {
    if dest_lanes == 1 {
        method.append_to_end(Instruction::mov(dest.clone(), value).add_decorations(decorations));
        Ok(())
    } else {
        insert_vector_insertion(method, dest, &Value::int(lane as i32), &value)
    }
}

/// Reverse the byte order of `source` into `dest`.
pub fn insert_byte_swap(method: &mut Method<'_>, source: &Value, dest: &Value) -> CompileResult<()> {
    let ty = source.ty.clone();
    let none = InstructionDecorations::NONE;
    let byte = |mask: u32| Value::literal(Literal::Uint(mask), DataType::INT32);
    match source.ty.scalar_bit_count() {
        8 => method.append_to_end(Instruction::mov(dest.clone(), source.clone())),
        16 => {
            // ((x >> 8) & 0xFF) | ((x & 0xFF) << 8)
            let high = emit_temporary(method, OP_SHR, ty.clone(), "%bswap", source.clone(), Value::int(8), none);
            let high = emit_temporary(method, OP_AND, ty.clone(), "%bswap", high, byte(0xFF), none);
            let low = emit_temporary(method, OP_AND, ty.clone(), "%bswap", source.clone(), byte(0xFF), none);
            let low = emit_temporary(method, OP_SHL, ty, "%bswap", low, Value::int(8), none);
            method.append_to_end(Instruction::operation(OP_OR, dest.clone(), high, Some(low)));
        }
        32 => {
            // (x >> 24) | ((x >> 8) & 0xFF00) | ((x << 8) & 0xFF0000) | (x << 24)
            let byte0 = emit_temporary(method, OP_SHR, ty.clone(), "%bswap", source.clone(), Value::int(24), none);
            let byte1 = emit_temporary(method, OP_SHR, ty.clone(), "%bswap", source.clone(), Value::int(8), none);
            let byte1 = emit_temporary(method, OP_AND, ty.clone(), "%bswap", byte1, byte(0xFF00), none);
            let byte2 = emit_temporary(method, OP_SHL, ty.clone(), "%bswap", source.clone(), Value::int(8), none);
            let byte2 = emit_temporary(method, OP_AND, ty.clone(), "%bswap", byte2, byte(0xFF_0000), none);
            let byte3 = emit_temporary(method, OP_SHL, ty.clone(), "%bswap", source.clone(), Value::int(24), none);
            let low = emit_temporary(method, OP_OR, ty.clone(), "%bswap", byte0, byte1, none);
            let high = emit_temporary(method, OP_OR, ty, "%bswap", byte2, byte3, none);
            method.append_to_end(Instruction::operation(OP_OR, dest.clone(), low, Some(high)));
        }
        width => {
            return Err(CompileError::UnsupportedWidth {
                operation: "byte swap",
                width,
            })
        }
    }
    Ok(())
}
