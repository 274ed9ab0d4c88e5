//! Metal-dialect emitter.
//!
//! Resources bind as entry-point parameters: every value uniform gets its
//! own `constant` reference at a dedicated buffer slot (no packing),
//! texture/sampler pairs share an index in their own slot spaces, and
//! per-instance attributes are fetched from dedicated buffers indexed by
//! the instance id. Helpers and private functions are `static` so vertex
//! and fragment translation units can link into one library.

use super::SourceWriter;
use crate::classify::ScanResult;
use crate::error::TranspileError;
use crate::reflect;
use crate::{Dialect, ShaderStage, Translation};

const PREAMBLE_COMMON: &str = r#"#include <metal_stdlib>

using namespace metal;

// GLSL-style floored modulo.
static inline float mod(float x, float y) { return x - y * floor(x / y); }
static inline float2 mod(float2 x, float2 y) { return x - y * floor(x / y); }
static inline float3 mod(float3 x, float3 y) { return x - y * floor(x / y); }
static inline float4 mod(float4 x, float4 y) { return x - y * floor(x / y); }

// Matrix products, column-vector convention on both sides.
static inline float2 mul(float2x2 m, float2 v) { return m * v; }
static inline float3 mul(float3x3 m, float3 v) { return m * v; }
static inline float4 mul(float4x4 m, float4 v) { return m * v; }
static inline float2 mul(float2 v, float2x2 m) { return v * m; }
static inline float3 mul(float3 v, float3x3 m) { return v * m; }
static inline float4 mul(float4 v, float4x4 m) { return v * m; }
static inline float2x2 mul(float2x2 a, float2x2 b) { return a * b; }
static inline float3x3 mul(float3x3 a, float3x3 b) { return a * b; }
static inline float4x4 mul(float4x4 a, float4x4 b) { return a * b; }

// Matrix construction from column vectors or a diagonal scalar.
static inline float2x2 mtx2(float2 c0, float2 c1) { return float2x2(c0, c1); }
static inline float3x3 mtx3(float3 c0, float3 c1, float3 c2) { return float3x3(c0, c1, c2); }
static inline float4x4 mtx4(float4 c0, float4 c1, float4 c2, float4 c3) {
    return float4x4(c0, c1, c2, c3);
}
static inline float2x2 mtx2(float s) { return float2x2(float2(s, 0.0), float2(0.0, s)); }
static inline float3x3 mtx3(float s) {
    return float3x3(float3(s, 0.0, 0.0), float3(0.0, s, 0.0), float3(0.0, 0.0, s));
}
static inline float4x4 mtx4(float s) {
    return float4x4(float4(s, 0.0, 0.0, 0.0), float4(0.0, s, 0.0, 0.0),
                    float4(0.0, 0.0, s, 0.0), float4(0.0, 0.0, 0.0, s));
}

// Texel fetch and size queries, v flipped to the GL image origin.
static inline float4 tex_fetch(texture2d<float> t, sampler s, int2 p, int lod) {
    uint h = t.get_height(uint(lod));
    return t.read(uint2(uint(p.x), h - 1u - uint(p.y)), uint(lod));
}
static inline int4 tex_fetch(texture2d<int> t, sampler s, int2 p, int lod) {
    uint h = t.get_height(uint(lod));
    return t.read(uint2(uint(p.x), h - 1u - uint(p.y)), uint(lod));
}
static inline uint4 tex_fetch(texture2d<uint> t, sampler s, int2 p, int lod) {
    uint h = t.get_height(uint(lod));
    return t.read(uint2(uint(p.x), h - 1u - uint(p.y)), uint(lod));
}
static inline float4 tex_fetch(texture1d<float> t, sampler s, int p, int lod) {
    return t.read(uint(p));
}
static inline int2 tex_size(texture2d<float> t, sampler s, int lod) {
    return int2(int(t.get_width(uint(lod))), int(t.get_height(uint(lod))));
}
static inline int2 tex_size(texture2d<int> t, sampler s, int lod) {
    return int2(int(t.get_width(uint(lod))), int(t.get_height(uint(lod))));
}
static inline int2 tex_size(texture2d<uint> t, sampler s, int lod) {
    return int2(int(t.get_width(uint(lod))), int(t.get_height(uint(lod))));
}
static inline int tex_size(texture1d<float> t, sampler s, int lod) {
    return int(t.get_width());
}

"#;

const PREAMBLE_VERTEX: &str = r#"// Vertex-stage sampling forces mip level zero.
static inline float4 tex_sample(texture2d<float> t, sampler s, float2 uv) {
    return t.sample(s, float2(uv.x, 1.0 - uv.y), level(0.0));
}
static inline int4 tex_sample(texture2d<int> t, sampler s, float2 uv) {
    return t.sample(s, float2(uv.x, 1.0 - uv.y), level(0.0));
}
static inline uint4 tex_sample(texture2d<uint> t, sampler s, float2 uv) {
    return t.sample(s, float2(uv.x, 1.0 - uv.y), level(0.0));
}
static inline float4 tex_sample(texture1d<float> t, sampler s, float x) {
    return t.sample(s, x);
}
static inline float4 tex_sample_lod(texture2d<float> t, sampler s, float2 uv, float lod) {
    return t.sample(s, float2(uv.x, 1.0 - uv.y), level(lod));
}
static inline float4 tex_sample_lod(texture1d<float> t, sampler s, float x, float lod) {
    return t.sample(s, x);
}

"#;

const PREAMBLE_FRAGMENT: &str = r#"static inline float4 tex_sample(texture2d<float> t, sampler s, float2 uv) {
    return t.sample(s, float2(uv.x, 1.0 - uv.y));
}
static inline int4 tex_sample(texture2d<int> t, sampler s, float2 uv) {
    return t.sample(s, float2(uv.x, 1.0 - uv.y));
}
static inline uint4 tex_sample(texture2d<uint> t, sampler s, float2 uv) {
    return t.sample(s, float2(uv.x, 1.0 - uv.y));
}
static inline float4 tex_sample(texture1d<float> t, sampler s, float x) {
    return t.sample(s, x);
}
static inline float tex_sample(depth2d<float> t, sampler s, float3 c) {
    return t.sample_compare(s, float2(c.x, 1.0 - c.y), c.z);
}
static inline float4 tex_sample_lod(texture2d<float> t, sampler s, float2 uv, float lod) {
    return t.sample(s, float2(uv.x, 1.0 - uv.y), level(lod));
}
static inline float4 tex_sample_lod(texture1d<float> t, sampler s, float x, float lod) {
    return t.sample(s, x);
}
// Gradient-based approximation of the LOD query.
static inline float2 tex_query_lod(texture2d<float> t, sampler s, float2 uv) {
    float2 px = uv * float2(t.get_width(), t.get_height());
    float d = max(length_squared(dfdx(px)), length_squared(dfdy(px)));
    float lod = 0.5 * log2(max(d, 1e-12));
    return float2(lod, lod);
}

"#;

/// Entry parameters shared by both stages: uniform buffers, then
/// texture/sampler pairs.
fn resource_params(scan: &ScanResult, params: &mut Vec<String>) {
    for (i, u) in scan.tables.uniforms.iter().enumerate() {
        let ty = u.ty.target_name();
        if u.array_len.is_some() {
            params.push(format!("constant {ty}* {} [[buffer({i})]]", u.name));
        } else {
            params.push(format!("constant {ty}& {} [[buffer({i})]]", u.name));
        }
    }
    for (i, t) in scan.tables.textures.iter().enumerate() {
        params.push(format!("{} {} [[texture({i})]]", t.ty.msl_name(), t.name));
        params.push(format!("sampler {}_smplr [[sampler({i})]]", t.name));
    }
}

fn emit_vertex(w: &mut SourceWriter, scan: &ScanResult) {
    let tables = &scan.tables;
    let usage = &scan.usage;

    let per_vertex: Vec<_> = tables.attributes.iter().filter(|a| !a.per_instance).collect();
    let instanced: Vec<_> = tables.attributes.iter().filter(|a| a.per_instance).collect();

    if !per_vertex.is_empty() {
        w.line("struct VsIn {");
        for a in &per_vertex {
            w.line(&format!(
                "    {} {} [[attribute({})]];",
                a.ty.target_name(),
                a.name,
                a.location
            ));
        }
        w.line("};");
        w.blank();
    }

    w.line("struct VsOut {");
    w.line("    float4 position [[position]];");
    for v in &tables.varyings_out {
        let flat = if v.flat { " [[flat]]" } else { "" };
        w.line(&format!(
            "    {} {} [[user({})]]{flat};",
            v.ty.target_name(),
            v.name,
            v.name
        ));
    }
    if usage.point_size {
        w.line("    float point_size [[point_size]];");
    }
    w.line("};");
    w.blank();

    let mut params = Vec::new();
    if !per_vertex.is_empty() {
        params.push("VsIn in [[stage_in]]".to_string());
    }
    resource_params(scan, &mut params);
    let uniform_count = tables.uniforms.len();
    for (j, a) in instanced.iter().enumerate() {
        params.push(format!(
            "const device {}* {}_data [[buffer({})]]",
            a.ty.target_name(),
            a.name,
            uniform_count + j
        ));
    }
    if usage.vertex_id {
        params.push("uint vid [[vertex_id]]".to_string());
    }
    if usage.instance_id || !instanced.is_empty() {
        params.push("uint iid [[instance_id]]".to_string());
    }

    w.line(&format!("vertex VsOut vs_main({}) {{", params.join(", ")));
    w.line("    VsOut out;");
    for l in &scan.main_body {
        w.line(l);
    }
    w.line("    return out;");
    w.line("}");
}

fn emit_fragment(w: &mut SourceWriter, scan: &ScanResult) {
    let tables = &scan.tables;
    let usage = &scan.usage;

    let has_in = !tables.varyings_in.is_empty() || usage.frag_coord || usage.point_coord;
    let has_out = !tables.color_outputs.is_empty() || usage.frag_depth;

    if has_in {
        w.line("struct FsIn {");
        for v in &tables.varyings_in {
            let flat = if v.flat { " [[flat]]" } else { "" };
            w.line(&format!(
                "    {} {} [[user({})]]{flat};",
                v.ty.target_name(),
                v.name,
                v.name
            ));
        }
        if usage.frag_coord {
            w.line("    float4 frag_coord [[position]];");
        }
        if usage.point_coord {
            w.line("    float2 point_coord [[point_coord]];");
        }
        w.line("};");
        w.blank();
    }

    if has_out {
        w.line("struct FsOut {");
        for o in &tables.color_outputs {
            w.line(&format!(
                "    {} {} [[color({})]];",
                o.ty.target_name(),
                o.name,
                o.location
            ));
        }
        if usage.frag_depth {
            w.line("    float frag_depth [[depth(any)]];");
        }
        w.line("};");
        w.blank();
    }

    let mut params = Vec::new();
    if has_in {
        params.push("FsIn in [[stage_in]]".to_string());
    }
    resource_params(scan, &mut params);

    let ret = if has_out { "FsOut" } else { "void" };
    w.line(&format!("fragment {ret} fs_main({}) {{", params.join(", ")));
    if has_out {
        w.line("    FsOut out;");
    }
    for l in &scan.main_body {
        w.line(l);
    }
    if has_out {
        w.line("    return out;");
    }
    w.line("}");
}

pub(crate) fn emit(scan: &ScanResult) -> Result<Translation, TranspileError> {
    let mut w = SourceWriter::new();
    w.raw(PREAMBLE_COMMON);
    match scan.stage {
        ShaderStage::Vertex => w.raw(PREAMBLE_VERTEX),
        ShaderStage::Fragment => w.raw(PREAMBLE_FRAGMENT),
    }
    w.raw(&scan.stream);

    let entry_point = match scan.stage {
        ShaderStage::Vertex => {
            emit_vertex(&mut w, scan);
            "vs_main"
        }
        ShaderStage::Fragment => {
            emit_fragment(&mut w, scan);
            "fs_main"
        }
    };

    let reflection = reflect::build(scan, Dialect::Msl, entry_point, None);
    Ok(Translation {
        text: w.finish(),
        reflection,
    })
}
