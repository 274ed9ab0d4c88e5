//! Packed constant-buffer layout.
//!
//! The Direct3D-flavoured dialect concatenates every value uniform of a
//! stage into a single constant buffer. Offsets are computed here, in
//! declaration order, under the dialect's 16-byte register rule: a value is
//! never allowed to straddle a 16-byte boundary, and a value of three or
//! more components claims a full register for that check. The resulting
//! layout is consumed by the emitter (as `packoffset` annotations) and by
//! the resource-binding layer (to populate the backing buffer at draw
//! time).

use crate::decl::UniformVar;
use crate::error::TranspileError;
use crate::types::ValueType;

/// One uniform's placement in the packed buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutEntry {
    pub name: String,
    pub ty: ValueType,
    pub component_count: u32,
    pub array_len: Option<u32>,
    pub offset: u32,
}

/// Computed layout of one stage's packed uniform buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformLayout {
    pub entries: Vec<LayoutEntry>,
    /// Final offset rounded up to the next 16-byte multiple.
    pub total_size: u32,
}

fn round_up_16(v: u32) -> u32 {
    (v + 15) & !15
}

/// Walk the uniforms in declaration order and assign byte offsets.
pub fn pack(uniforms: &[UniformVar]) -> Result<UniformLayout, TranspileError> {
    let mut entries = Vec::with_capacity(uniforms.len());
    let mut offset = 0u32;

    for u in uniforms {
        let elem_size = u.ty.byte_size();
        let size = match u.array_len {
            Some(len) => {
                if elem_size % 16 != 0 {
                    return Err(TranspileError::UnalignedArrayElement {
                        name: u.name.clone(),
                        size: elem_size,
                    });
                }
                elem_size * len
            }
            None => elem_size,
        };

        // Straddle check: values of 3+ components (and arrays, whose
        // elements are register-sized) span a full 16-byte register.
        let span = if u.array_len.is_some() || u.ty.component_count() >= 3 {
            16
        } else {
            elem_size
        };
        if offset % 16 != 0 && (offset % 16) + span > 16 {
            offset = round_up_16(offset);
        }

        entries.push(LayoutEntry {
            name: u.name.clone(),
            ty: u.ty,
            component_count: u.ty.component_count(),
            array_len: u.array_len,
            offset,
        });
        offset += size;
    }

    Ok(UniformLayout {
        entries,
        total_size: round_up_16(offset),
    })
}
