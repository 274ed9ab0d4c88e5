//! Shading-language cross-compiler.
//!
//! Accepts a single shader stage written in a restricted GLSL-like dialect
//! and retargets it to one of the two native dialects used by the graphics
//! back ends: a Metal-flavoured one and a Direct3D-flavoured one. The
//! translation preserves program semantics while bridging the structural
//! differences between the dialects — combined texture+sampler uniforms
//! against split texture/sampler objects, implicit against explicit
//! binding slots, builtin variable names, struct-based I/O, and (for the
//! Direct3D dialect) packed constant-buffer layout.
//!
//! # Overview
//!
//! - [`transpile`] is the whole API: one source, one stage, one dialect in;
//!   one [`Translation`] out, or a line-numbered [`TranspileError`].
//! - [`Reflection`] describes the translated stage's bindings for the
//!   resource-binding layer: attributes, outputs, texture/sampler slot
//!   pairs, and uniform offsets or slots.
//!
//! The transpiler is a pure, synchronous text-to-text function. It holds no
//! state across invocations; concurrent calls need no coordination.
//!
//! # Example
//!
//! ```
//! use shader_cross::{transpile, Dialect, ShaderStage};
//!
//! let src = "\
//! uniform mat4 u_mvp;
//! layout(location = 0) in vec3 a_pos;
//! void main() {
//!     gl_Position = mul(u_mvp, vec4(a_pos, 1.0));
//! }
//! ";
//! let out = transpile(src, ShaderStage::Vertex, Dialect::Msl).unwrap();
//! assert!(out.text.contains("vertex VsOut vs_main"));
//! ```

mod classify;
mod decl;
mod emit;
mod error;
mod layout;
mod reflect;
mod rewrite;
mod scope;
mod types;

pub use error::{ScopeKind, TranspileError};
pub use layout::{LayoutEntry, UniformLayout};
pub use reflect::{
    AttributeBinding, OutputBinding, Reflection, TextureBinding, UniformBinding, UniformInfo,
};
pub use types::{ScalarKind, TextureDim, TextureType, ValueType};

use tracing::debug;

/// The unit of translation: vertex or fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Target shading dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// Metal-flavoured: split texture/sampler entry parameters, one buffer
    /// slot per uniform value.
    Msl,
    /// Direct3D-flavoured: module-scope registers, one packed constant
    /// buffer per stage.
    Hlsl,
}

/// A completed translation: the target-dialect translation unit plus the
/// reflection record for the resource-binding layer.
#[derive(Debug, Clone)]
pub struct Translation {
    pub text: String,
    pub reflection: Reflection,
}

/// Translate one shader stage to the chosen dialect.
///
/// Fails with the first problem found; no partial output is returned.
pub fn transpile(
    source: &str,
    stage: ShaderStage,
    dialect: Dialect,
) -> Result<Translation, TranspileError> {
    let scan = classify::Scanner::new(stage, dialect).run(source)?;
    debug!(
        %stage,
        ?dialect,
        uniforms = scan.tables.uniforms.len(),
        textures = scan.tables.textures.len(),
        "scanned shader source"
    );
    let translation = emit::emit(&scan, dialect)?;
    debug!(
        %stage,
        ?dialect,
        bytes = translation.text.len(),
        "emitted translation unit"
    );
    Ok(translation)
}
