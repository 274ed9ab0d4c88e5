//! Cross-dialect reflection invariants: for a source that compiles under
//! both dialects, the two translations must describe the same ordered
//! attribute/output/uniform/texture sets even though the surface syntax
//! differs.

use shader_cross::{transpile, Dialect, ShaderStage, Translation, UniformBinding};

const VS: &str = "\
uniform mat4 u_mvp;
uniform vec3 u_tint;
uniform sampler2D heightmap;
layout(location = 0) in vec3 a_pos;
layout(location = 1) in vec2 a_uv;
layout(location = 2) in vec4 a_inst_color[1];
out vec2 v_uv;
out vec4 v_color;
void main() {
    v_uv = a_uv;
    v_color = a_inst_color * vec4(u_tint, 1.0);
    float h = texture(heightmap, a_uv).x;
    gl_Position = mul(u_mvp, vec4(a_pos.x, a_pos.y + h, a_pos.z, 1.0));
}
";

const FS: &str = "\
uniform vec4 u_fog;
uniform sampler2D albedo;
in vec2 v_uv;
in vec4 v_color;
layout(location = 0) out vec4 frag_color;
void main() {
    frag_color = texture(albedo, v_uv) * v_color + u_fog;
}
";

fn both(source: &str, stage: ShaderStage) -> (Translation, Translation) {
    (
        transpile(source, stage, Dialect::Msl).unwrap(),
        transpile(source, stage, Dialect::Hlsl).unwrap(),
    )
}

#[test]
fn vertex_reflection_agrees_across_dialects() {
    let (msl, hlsl) = both(VS, ShaderStage::Vertex);
    let (m, h) = (&msl.reflection, &hlsl.reflection);

    assert_eq!(m.attributes.len(), h.attributes.len());
    for (a, b) in m.attributes.iter().zip(&h.attributes) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.ty, b.ty);
        assert_eq!(a.location, b.location);
        assert_eq!(a.per_instance, b.per_instance);
    }

    assert_eq!(m.textures, h.textures);
    assert_eq!(m.uniforms.len(), h.uniforms.len());
    for (a, b) in m.uniforms.iter().zip(&h.uniforms) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.ty, b.ty);
        assert_eq!(a.component_count, b.component_count);
        assert_eq!(a.array_len, b.array_len);
    }

    // Binding models differ by design: per-value slots against packed
    // offsets.
    assert_eq!(m.uniform_buffer_size, None);
    assert_eq!(h.uniform_buffer_size, Some(80));
    assert_eq!(m.uniforms[1].binding, UniformBinding::Slot(1));
    assert_eq!(h.uniforms[1].binding, UniformBinding::Offset(64));
}

#[test]
fn fragment_reflection_agrees_across_dialects() {
    let (msl, hlsl) = both(FS, ShaderStage::Fragment);
    let (m, h) = (&msl.reflection, &hlsl.reflection);

    assert_eq!(m.color_outputs, h.color_outputs);
    assert_eq!(m.textures, h.textures);
    assert_eq!(m.uniforms[0].name, h.uniforms[0].name);
}

#[test]
fn texture_splits_into_a_predictable_pair() {
    let (msl, hlsl) = both(FS, ShaderStage::Fragment);
    for t in [&msl.reflection.textures, &hlsl.reflection.textures] {
        assert_eq!(t.len(), 1);
        assert_eq!(t[0].name, "albedo");
        assert_eq!(t[0].sampler_name, "albedo_smplr");
        assert_eq!(t[0].texture_slot, 0);
        assert_eq!(t[0].sampler_slot, 0);
    }
}

#[test]
fn component_counts_match_the_data_model() {
    let (_, hlsl) = both(VS, ShaderStage::Vertex);
    let counts: Vec<_> = hlsl
        .reflection
        .uniforms
        .iter()
        .map(|u| (u.name.as_str(), u.component_count))
        .collect();
    assert_eq!(counts, vec![("u_mvp", 16), ("u_tint", 3)]);
}

#[test]
fn entry_points_differ_only_in_name() {
    let (msl, hlsl) = both(FS, ShaderStage::Fragment);
    assert_eq!(msl.reflection.entry_point, "fs_main");
    assert_eq!(hlsl.reflection.entry_point, "ps_main");
    assert_eq!(msl.reflection.stage, ShaderStage::Fragment);
    assert_eq!(hlsl.reflection.stage, ShaderStage::Fragment);
}
