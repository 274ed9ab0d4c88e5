//! Reflection record handed to the resource-binding layer.
//!
//! One record per translation: the ordered attribute/output lists, the
//! texture/sampler slot pairs, and the uniform bindings (packed offsets for
//! the Direct3D dialect, per-value buffer slots for the Metal dialect).

use crate::classify::ScanResult;
use crate::layout::UniformLayout;
use crate::types::{TextureType, ValueType};
use crate::{Dialect, ShaderStage};

/// A vertex attribute as seen by the vertex-input layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeBinding {
    pub name: String,
    pub ty: ValueType,
    /// Declared location in the source.
    pub location: u32,
    pub per_instance: bool,
    /// Dialect-specific input slot. Per-vertex attributes keep their
    /// location; per-instance attributes are assigned a later slot range
    /// (Direct3D) or their own vertex-stage buffer slot (Metal).
    pub slot: u32,
}

/// A fragment color output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputBinding {
    pub name: String,
    pub ty: ValueType,
    pub location: u32,
}

/// A texture uniform's two binding points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureBinding {
    pub name: String,
    /// Derived sampler name, `<name>_smplr`.
    pub sampler_name: String,
    pub ty: TextureType,
    pub texture_slot: u32,
    pub sampler_slot: u32,
}

/// Where a value uniform lives for the chosen dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformBinding {
    /// Byte offset into the stage's packed constant buffer.
    Offset(u32),
    /// Dedicated buffer slot holding just this value.
    Slot(u32),
}

/// One value uniform in the reflection record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformInfo {
    pub name: String,
    pub ty: ValueType,
    pub component_count: u32,
    pub array_len: Option<u32>,
    pub binding: UniformBinding,
}

/// Reflection for one transpiled stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reflection {
    pub stage: ShaderStage,
    pub entry_point: &'static str,
    /// Vertex stage: ordered by declared location.
    pub attributes: Vec<AttributeBinding>,
    /// Fragment stage: ordered by location.
    pub color_outputs: Vec<OutputBinding>,
    pub textures: Vec<TextureBinding>,
    pub uniforms: Vec<UniformInfo>,
    /// Total packed buffer size; only present for the packed dialect.
    pub uniform_buffer_size: Option<u32>,
}

/// Base input slot for per-instance attributes in the Direct3D dialect,
/// keeping them in a later range than per-vertex data.
pub const INSTANCE_SLOT_BASE: u32 = 8;

pub(crate) fn build(
    scan: &ScanResult,
    dialect: Dialect,
    entry_point: &'static str,
    layout: Option<&UniformLayout>,
) -> Reflection {
    let tables = &scan.tables;

    let uniform_count = tables.uniforms.len() as u32;
    let mut instanced_seen = 0u32;
    let attributes = tables
        .attributes
        .iter()
        .map(|a| {
            let slot = if a.per_instance {
                let s = match dialect {
                    // Instanced data rides in dedicated buffer slots after
                    // the uniform values.
                    Dialect::Msl => uniform_count + instanced_seen,
                    Dialect::Hlsl => INSTANCE_SLOT_BASE + instanced_seen,
                };
                instanced_seen += 1;
                s
            } else {
                a.location
            };
            AttributeBinding {
                name: a.name.clone(),
                ty: a.ty,
                location: a.location,
                per_instance: a.per_instance,
                slot,
            }
        })
        .collect();

    let color_outputs = tables
        .color_outputs
        .iter()
        .map(|o| OutputBinding {
            name: o.name.clone(),
            ty: o.ty,
            location: o.location,
        })
        .collect();

    let textures = tables
        .textures
        .iter()
        .enumerate()
        .map(|(i, t)| TextureBinding {
            name: t.name.clone(),
            sampler_name: format!("{}_smplr", t.name),
            ty: t.ty,
            texture_slot: i as u32,
            sampler_slot: i as u32,
        })
        .collect();

    let uniforms = match layout {
        Some(layout) => layout
            .entries
            .iter()
            .map(|e| UniformInfo {
                name: e.name.clone(),
                ty: e.ty,
                component_count: e.component_count,
                array_len: e.array_len,
                binding: UniformBinding::Offset(e.offset),
            })
            .collect(),
        None => tables
            .uniforms
            .iter()
            .enumerate()
            .map(|(i, u)| UniformInfo {
                name: u.name.clone(),
                ty: u.ty,
                component_count: u.ty.component_count(),
                array_len: u.array_len,
                binding: UniformBinding::Slot(i as u32),
            })
            .collect(),
    };

    Reflection {
        stage: scan.stage,
        entry_point,
        attributes,
        color_outputs,
        textures,
        uniforms,
        uniform_buffer_size: layout.map(|l| l.total_size),
    }
}
