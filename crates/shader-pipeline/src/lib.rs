//! Render-pipeline shader builds.
//!
//! This crate is the boundary between the transpiler and the per-platform
//! resource-binding code. A [`ShaderSet`] describes one pipeline's vertex
//! and fragment sources; [`build_program`] transpiles both stages for a
//! dialect and joins the per-stage reflection into one [`ProgramBindings`]
//! the binding layer consumes. [`ProgramCache`] keeps the result so a
//! pipeline transpiles once per stage per dialect at build time, never per
//! frame.
//!
//! Uniform buffers are reconciled per stage: the vertex and fragment halves
//! of a pipeline each get their own packed buffer or slot range, even when
//! both declare a uniform of the same name.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, error};

use shader_cross::{
    transpile, AttributeBinding, Dialect, OutputBinding, ShaderStage, TextureBinding, Translation,
    UniformInfo,
};

/// Sources for one render pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderSet {
    /// Label used in error messages and as the cache key.
    pub label: String,
    pub vertex: String,
    pub fragment: String,
}

/// Joined reflection for one pipeline, ready for the binding layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramBindings {
    pub attributes: Vec<AttributeBinding>,
    pub color_outputs: Vec<OutputBinding>,
    pub vertex_textures: Vec<TextureBinding>,
    pub fragment_textures: Vec<TextureBinding>,
    pub vertex_uniforms: Vec<UniformInfo>,
    pub fragment_uniforms: Vec<UniformInfo>,
    /// Packed buffer sizes, present for the packed dialect only.
    pub vertex_uniform_size: Option<u32>,
    pub fragment_uniform_size: Option<u32>,
}

/// Both translated stages of a pipeline plus their joined bindings.
#[derive(Debug, Clone)]
pub struct ProgramBuild {
    pub dialect: Dialect,
    pub vertex: Translation,
    pub fragment: Translation,
    pub bindings: ProgramBindings,
}

/// Transpile both stages of `set` for `dialect`.
///
/// Errors carry the shader label and the failing stage, wrapping the
/// transpiler's line-numbered message.
pub fn build_program(set: &ShaderSet, dialect: Dialect) -> Result<ProgramBuild> {
    let vertex = transpile(&set.vertex, ShaderStage::Vertex, dialect)
        .with_context(|| format!("{}: vertex shader", set.label))?;
    let fragment = transpile(&set.fragment, ShaderStage::Fragment, dialect)
        .with_context(|| format!("{}: fragment shader", set.label))?;

    let bindings = ProgramBindings {
        attributes: vertex.reflection.attributes.clone(),
        color_outputs: fragment.reflection.color_outputs.clone(),
        vertex_textures: vertex.reflection.textures.clone(),
        fragment_textures: fragment.reflection.textures.clone(),
        vertex_uniforms: vertex.reflection.uniforms.clone(),
        fragment_uniforms: fragment.reflection.uniforms.clone(),
        vertex_uniform_size: vertex.reflection.uniform_buffer_size,
        fragment_uniform_size: fragment.reflection.uniform_buffer_size,
    };

    debug!(
        label = %set.label,
        ?dialect,
        attributes = bindings.attributes.len(),
        outputs = bindings.color_outputs.len(),
        "built shader program"
    );

    Ok(ProgramBuild {
        dialect,
        vertex,
        fragment,
        bindings,
    })
}

/// Keyed cache of built programs.
///
/// The surrounding pipeline object asks the cache at pipeline-build time; a
/// hit returns the shared build, a miss transpiles and stores it. A shader
/// that fails to transpile is never cached — the pipeline must not be built
/// from it.
#[derive(Default)]
pub struct ProgramCache {
    programs: HashMap<(String, Dialect), Arc<ProgramBuild>>,
}

impl ProgramCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the build for `(set.label, dialect)`, transpiling on first use.
    pub fn get_or_build(&mut self, set: &ShaderSet, dialect: Dialect) -> Result<Arc<ProgramBuild>> {
        let key = (set.label.clone(), dialect);
        if let Some(hit) = self.programs.get(&key) {
            return Ok(hit.clone());
        }
        let built = match build_program(set, dialect) {
            Ok(b) => Arc::new(b),
            Err(err) => {
                error!(label = %set.label, ?dialect, "shader program build failed: {err:#}");
                return Err(err);
            }
        };
        self.programs.insert(key, built.clone());
        Ok(built)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Drop every cached build (e.g. on device loss).
    pub fn clear(&mut self) {
        self.programs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_set() -> ShaderSet {
        ShaderSet {
            label: "sprite".to_string(),
            vertex: "\
uniform mat4 u_mvp;
layout(location = 0) in vec3 a_pos;
layout(location = 1) in vec2 a_uv;
out vec2 v_uv;
void main() {
    v_uv = a_uv;
    gl_Position = mul(u_mvp, vec4(a_pos, 1.0));
}
"
            .to_string(),
            fragment: "\
uniform sampler2D tex;
in vec2 v_uv;
layout(location = 0) out vec4 frag_color;
void main() {
    frag_color = texture(tex, v_uv);
}
"
            .to_string(),
        }
    }

    #[test]
    fn builds_for_both_dialects() {
        let set = demo_set();
        let msl = build_program(&set, Dialect::Msl).unwrap();
        let hlsl = build_program(&set, Dialect::Hlsl).unwrap();

        assert!(msl.vertex.text.contains("vertex VsOut vs_main"));
        assert!(hlsl.vertex.text.contains("VsOutput vs_main"));

        // The joined bindings describe the same sets in both dialects.
        assert_eq!(msl.bindings.attributes.len(), 2);
        assert_eq!(hlsl.bindings.attributes.len(), 2);
        assert_eq!(
            msl.bindings.fragment_textures[0].name,
            hlsl.bindings.fragment_textures[0].name
        );
        assert_eq!(msl.bindings.vertex_uniform_size, None);
        assert_eq!(hlsl.bindings.vertex_uniform_size, Some(64));
    }

    #[test]
    fn cache_returns_shared_build() {
        let set = demo_set();
        let mut cache = ProgramCache::new();
        let a = cache.get_or_build(&set, Dialect::Msl).unwrap();
        let b = cache.get_or_build(&set, Dialect::Msl).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);

        cache.get_or_build(&set, Dialect::Hlsl).unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn failure_names_label_and_stage() {
        let mut set = demo_set();
        set.fragment = "this line matches nothing\nvoid main() {\n}\n".to_string();
        let err = build_program(&set, Dialect::Msl).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("sprite: fragment shader"), "got: {msg}");

        let mut cache = ProgramCache::new();
        assert!(cache.get_or_build(&set, Dialect::Msl).is_err());
        assert!(cache.is_empty());
    }
}
