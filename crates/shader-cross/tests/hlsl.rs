//! Direct3D-dialect translation scenarios.

use shader_cross::{transpile, Dialect, ShaderStage, UniformBinding};

fn hlsl(source: &str, stage: ShaderStage) -> shader_cross::Translation {
    transpile(source, stage, Dialect::Hlsl).unwrap()
}

#[test]
fn packed_constant_buffer_offsets() {
    let src = "\
uniform float u_a;
uniform vec3 u_b;
uniform float u_c;
void main() {
    gl_Position = vec4(u_a, u_b.x, u_c, 1.0);
}
";
    let out = hlsl(src, ShaderStage::Vertex);
    assert!(out.text.contains("cbuffer Uniforms : register(b0) {"));
    assert!(out.text.contains("    float u_a : packoffset(c0);"));
    // u_b may not start at offset 4: a three-component value would cross
    // the register boundary there.
    assert!(out.text.contains("    float3 u_b : packoffset(c1);"));
    // u_c packs into u_b's tail component.
    assert!(out.text.contains("    float u_c : packoffset(c1.w);"));

    let offsets: Vec<_> = out
        .reflection
        .uniforms
        .iter()
        .map(|u| u.binding)
        .collect();
    assert_eq!(
        offsets,
        vec![
            UniformBinding::Offset(0),
            UniformBinding::Offset(16),
            UniformBinding::Offset(28),
        ]
    );
    assert_eq!(out.reflection.uniform_buffer_size, Some(32));
}

#[test]
fn array_uniforms_are_register_arrays() {
    let src = "\
uniform vec4 u_pts[4];
uniform mat4 u_mvp;
void main() {
    gl_Position = mul(u_mvp, u_pts[0]);
}
";
    let out = hlsl(src, ShaderStage::Vertex);
    assert!(out.text.contains("    float4 u_pts[4] : packoffset(c0);"));
    assert!(out.text.contains("    float4x4 u_mvp : packoffset(c4);"));
    assert_eq!(out.reflection.uniform_buffer_size, Some(128));
    // Uniform names stay bare in the body: cbuffer members are globals.
    assert!(out.text.contains("    output.position = mul(u_mvp, u_pts[0]);"));
}

#[test]
fn texture_registers_and_semantics() {
    let src = "\
uniform sampler2D tex;
in vec2 v_uv;
flat in int v_mode;
layout(location = 2) out vec4 bright;
layout(location = 0) out vec4 color;
void main() {
    color = texture(tex, v_uv);
    bright = color * 0.5;
}
";
    let out = hlsl(src, ShaderStage::Fragment);
    assert!(out.text.contains("Texture2D<float4> tex : register(t0);"));
    assert!(out.text.contains("SamplerState tex_smplr : register(s0);"));
    assert!(out.text.contains("    float2 v_uv : V_UV;"));
    assert!(out.text.contains("    nointerpolation int v_mode : V_MODE;"));
    // Outputs ordered by location regardless of declaration order.
    let c0 = out.text.find("float4 color : SV_Target0;").unwrap();
    let c2 = out.text.find("float4 bright : SV_Target2;").unwrap();
    assert!(c0 < c2);
    assert!(out.text.contains("PsOutput ps_main(PsInput input) {"));
    assert!(out.text.contains("    output.color = tex_sample(tex, tex_smplr, input.v_uv);"));
    assert!(out.text.contains("    output.bright = output.color * 0.5;"));
}

#[test]
fn index_builtins_live_in_the_input_struct() {
    let src = "\
void main() {
    gl_Position = vec4(float(gl_VertexID), float(gl_InstanceID), 0.0, 1.0);
}
";
    let out = hlsl(src, ShaderStage::Vertex);
    assert!(out.text.contains("    uint vid : SV_VertexID;"));
    assert!(out.text.contains("    uint iid : SV_InstanceID;"));
    assert!(out.text.contains("VsOutput vs_main(VsInput input) {"));
    assert!(out
        .text
        .contains("    output.position = float4(float(input.vid), float(input.iid), 0.0, 1.0);"));
}

#[test]
fn instanced_attributes_take_a_later_slot_range() {
    let src = "\
layout(location = 0) in vec2 a_pos;
layout(location = 1) in vec4 a_tint[1];
out vec4 v_tint;
void main() {
    v_tint = a_tint;
    gl_Position = vec4(a_pos, 0.0, 1.0);
}
";
    let out = hlsl(src, ShaderStage::Vertex);
    assert!(out.text.contains("    float2 a_pos : ATTR0;"));
    assert!(out.text.contains("    float4 a_tint : ATTR8;"));
    assert!(out.text.contains("    output.v_tint = input.a_tint;"));

    let tint = &out.reflection.attributes[1];
    assert!(tint.per_instance);
    assert_eq!(tint.slot, 8);
}

#[test]
fn depth_texture_uses_comparison_sampler() {
    let src = "\
uniform sampler2DShadow shadow_map;
in vec3 v_shadow;
layout(location = 0) out vec4 color;
void main() {
    float s = texture(shadow_map, v_shadow);
    color = vec4(s, s, s, 1.0);
}
";
    let out = hlsl(src, ShaderStage::Fragment);
    assert!(out.text.contains("Texture2D<float> shadow_map : register(t0);"));
    assert!(out
        .text
        .contains("SamplerComparisonState shadow_map_smplr : register(s0);"));
    assert!(out
        .text
        .contains("    float s = tex_sample(shadow_map, shadow_map_smplr, input.v_shadow);"));
}

#[test]
fn point_size_and_depth_builtins() {
    let vs = "\
void main() {
    gl_Position = vec4(0.0, 0.0, 0.0, 1.0);
    gl_PointSize = 4.0;
}
";
    let out = hlsl(vs, ShaderStage::Vertex);
    assert!(out.text.contains("    float point_size : PSIZE;"));
    assert!(out.text.contains("    output.point_size = 4.0;"));

    let fs = "\
layout(location = 0) out vec4 color;
void main() {
    color = vec4(1.0, 1.0, 1.0, 1.0);
    gl_FragDepth = gl_FragCoord.z;
}
";
    let out = hlsl(fs, ShaderStage::Fragment);
    assert!(out.text.contains("    float4 frag_coord : SV_Position;"));
    assert!(out.text.contains("    float frag_depth : SV_Depth;"));
    assert!(out.text.contains("    output.frag_depth = input.frag_coord.z;"));
}

#[test]
fn struct_initializer_drops_the_type_name() {
    let src = "\
struct Light {
    vec3 pos;
    vec3 col;
};
void main() {
    Light l = Light{vec3(0.0, 1.0, 0.0), vec3(1.0, 1.0, 1.0)};
    gl_Position = vec4(l.pos, 1.0);
}
";
    let out = hlsl(src, ShaderStage::Vertex);
    assert!(out.text.contains("struct Light {\n    float3 pos;\n    float3 col;\n};"));
    assert!(out
        .text
        .contains("    Light l = {float3(0.0, 1.0, 0.0), float3(1.0, 1.0, 1.0)};"));
}
