//! Direct3D-dialect emitter.
//!
//! Resources are declared at module scope: texture/sampler pairs at
//! `register(tN)`/`register(sN)`, and every value uniform of the stage
//! concatenated into one constant buffer at `register(b0)` whose member
//! offsets come from the layout packer and are pinned with `packoffset`.
//! I/O travels through semantic-annotated structs; varyings derive their
//! semantic from the identifier so the two stages link by name.

use super::SourceWriter;
use crate::classify::ScanResult;
use crate::error::TranspileError;
use crate::layout::{self, UniformLayout};
use crate::reflect;
use crate::{Dialect, ShaderStage, Translation};

const PREAMBLE_COMMON: &str = r#"// GLSL-style floored modulo.
float mod(float x, float y) { return x - y * floor(x / y); }
float2 mod(float2 x, float2 y) { return x - y * floor(x / y); }
float3 mod(float3 x, float3 y) { return x - y * floor(x / y); }
float4 mod(float4 x, float4 y) { return x - y * floor(x / y); }

// Matrix construction from column vectors or a diagonal scalar. The
// native constructors take rows, hence the transpose.
float2x2 mtx2(float2 c0, float2 c1) { return transpose(float2x2(c0, c1)); }
float3x3 mtx3(float3 c0, float3 c1, float3 c2) { return transpose(float3x3(c0, c1, c2)); }
float4x4 mtx4(float4 c0, float4 c1, float4 c2, float4 c3) {
    return transpose(float4x4(c0, c1, c2, c3));
}
float2x2 mtx2(float s) { return float2x2(s, 0.0, 0.0, s); }
float3x3 mtx3(float s) { return float3x3(s, 0.0, 0.0, 0.0, s, 0.0, 0.0, 0.0, s); }
float4x4 mtx4(float s) {
    return float4x4(s, 0.0, 0.0, 0.0,
                    0.0, s, 0.0, 0.0,
                    0.0, 0.0, s, 0.0,
                    0.0, 0.0, 0.0, s);
}

// Texel fetch and size queries, v flipped to the GL image origin.
float4 tex_fetch(Texture2D<float4> t, SamplerState s, int2 p, int lod) {
    uint w, h, mips;
    t.GetDimensions(uint(lod), w, h, mips);
    return t.Load(int3(p.x, int(h) - 1 - p.y, lod));
}
int4 tex_fetch(Texture2D<int4> t, SamplerState s, int2 p, int lod) {
    uint w, h, mips;
    t.GetDimensions(uint(lod), w, h, mips);
    return t.Load(int3(p.x, int(h) - 1 - p.y, lod));
}
uint4 tex_fetch(Texture2D<uint4> t, SamplerState s, int2 p, int lod) {
    uint w, h, mips;
    t.GetDimensions(uint(lod), w, h, mips);
    return t.Load(int3(p.x, int(h) - 1 - p.y, lod));
}
float4 tex_fetch(Texture1D<float4> t, SamplerState s, int p, int lod) {
    return t.Load(int2(p, lod));
}
int2 tex_size(Texture2D<float4> t, SamplerState s, int lod) {
    uint w, h, mips;
    t.GetDimensions(uint(lod), w, h, mips);
    return int2(int(w), int(h));
}
int2 tex_size(Texture2D<int4> t, SamplerState s, int lod) {
    uint w, h, mips;
    t.GetDimensions(uint(lod), w, h, mips);
    return int2(int(w), int(h));
}
int2 tex_size(Texture2D<uint4> t, SamplerState s, int lod) {
    uint w, h, mips;
    t.GetDimensions(uint(lod), w, h, mips);
    return int2(int(w), int(h));
}
int tex_size(Texture1D<float4> t, SamplerState s, int lod) {
    uint w, mips;
    t.GetDimensions(uint(lod), w, mips);
    return int(w);
}

"#;

const PREAMBLE_VERTEX: &str = r#"// Vertex-stage sampling forces mip level zero.
float4 tex_sample(Texture2D<float4> t, SamplerState s, float2 uv) {
    return t.SampleLevel(s, float2(uv.x, 1.0 - uv.y), 0.0);
}
float4 tex_sample(Texture1D<float4> t, SamplerState s, float x) {
    return t.SampleLevel(s, x, 0.0);
}
float4 tex_sample_lod(Texture2D<float4> t, SamplerState s, float2 uv, float lod) {
    return t.SampleLevel(s, float2(uv.x, 1.0 - uv.y), lod);
}
float4 tex_sample_lod(Texture1D<float4> t, SamplerState s, float x, float lod) {
    return t.SampleLevel(s, x, lod);
}

"#;

const PREAMBLE_FRAGMENT: &str = r#"float4 tex_sample(Texture2D<float4> t, SamplerState s, float2 uv) {
    return t.Sample(s, float2(uv.x, 1.0 - uv.y));
}
float4 tex_sample(Texture1D<float4> t, SamplerState s, float x) {
    return t.Sample(s, x);
}
// Integer textures cannot be filtered; nearest texel lookup instead.
int4 tex_sample(Texture2D<int4> t, SamplerState s, float2 uv) {
    uint w, h;
    t.GetDimensions(w, h);
    return t.Load(int3(int(uv.x * w), int((1.0 - uv.y) * h), 0));
}
uint4 tex_sample(Texture2D<uint4> t, SamplerState s, float2 uv) {
    uint w, h;
    t.GetDimensions(w, h);
    return t.Load(int3(int(uv.x * w), int((1.0 - uv.y) * h), 0));
}
float tex_sample(Texture2D<float> t, SamplerComparisonState s, float3 c) {
    return t.SampleCmpLevelZero(s, float2(c.x, 1.0 - c.y), c.z);
}
float4 tex_sample_lod(Texture2D<float4> t, SamplerState s, float2 uv, float lod) {
    return t.SampleLevel(s, float2(uv.x, 1.0 - uv.y), lod);
}
float4 tex_sample_lod(Texture1D<float4> t, SamplerState s, float x, float lod) {
    return t.SampleLevel(s, x, lod);
}
float2 tex_query_lod(Texture2D<float4> t, SamplerState s, float2 uv) {
    float lod = t.CalculateLevelOfDetail(s, float2(uv.x, 1.0 - uv.y));
    return float2(lod, lod);
}

"#;

/// `packoffset` spelling for a byte offset. Offsets are always 4-aligned.
fn packoffset(offset: u32) -> String {
    let reg = offset / 16;
    match (offset % 16) / 4 {
        0 => format!("c{reg}"),
        1 => format!("c{reg}.y"),
        2 => format!("c{reg}.z"),
        _ => format!("c{reg}.w"),
    }
}

fn semantic(name: &str) -> String {
    name.to_ascii_uppercase()
}

/// Module-scope resource declarations: texture/sampler pairs and the packed
/// constant buffer.
fn emit_resources(w: &mut SourceWriter, scan: &ScanResult, layout: &UniformLayout) {
    let tables = &scan.tables;
    for (i, t) in tables.textures.iter().enumerate() {
        w.line(&format!("{} {} : register(t{i});", t.ty.hlsl_name(), t.name));
        w.line(&format!(
            "{} {}_smplr : register(s{i});",
            t.ty.hlsl_sampler(),
            t.name
        ));
    }
    if !tables.textures.is_empty() {
        w.blank();
    }

    if !layout.entries.is_empty() {
        w.line("cbuffer Uniforms : register(b0) {");
        for e in &layout.entries {
            let ty = e.ty.target_name();
            let po = packoffset(e.offset);
            match e.array_len {
                Some(len) => w.line(&format!("    {ty} {}[{len}] : packoffset({po});", e.name)),
                None => w.line(&format!("    {ty} {} : packoffset({po});", e.name)),
            }
        }
        w.line("};");
        w.blank();
    }
}

fn emit_vertex(w: &mut SourceWriter, scan: &ScanResult) {
    let tables = &scan.tables;
    let usage = &scan.usage;

    let has_in =
        !tables.attributes.is_empty() || usage.vertex_id || usage.instance_id;
    if has_in {
        let mut instanced_seen = 0u32;
        w.line("struct VsInput {");
        for a in &tables.attributes {
            let slot = if a.per_instance {
                let s = reflect::INSTANCE_SLOT_BASE + instanced_seen;
                instanced_seen += 1;
                s
            } else {
                a.location
            };
            w.line(&format!(
                "    {} {} : ATTR{slot};",
                a.ty.target_name(),
                a.name
            ));
        }
        if usage.vertex_id {
            w.line("    uint vid : SV_VertexID;");
        }
        if usage.instance_id {
            w.line("    uint iid : SV_InstanceID;");
        }
        w.line("};");
        w.blank();
    }

    w.line("struct VsOutput {");
    w.line("    float4 position : SV_Position;");
    for v in &tables.varyings_out {
        let flat = if v.flat { "nointerpolation " } else { "" };
        w.line(&format!(
            "    {flat}{} {} : {};",
            v.ty.target_name(),
            v.name,
            semantic(&v.name)
        ));
    }
    if usage.point_size {
        w.line("    float point_size : PSIZE;");
    }
    w.line("};");
    w.blank();

    if has_in {
        w.line("VsOutput vs_main(VsInput input) {");
    } else {
        w.line("VsOutput vs_main() {");
    }
    w.line("    VsOutput output;");
    for l in &scan.main_body {
        w.line(l);
    }
    w.line("    return output;");
    w.line("}");
}

fn emit_fragment(w: &mut SourceWriter, scan: &ScanResult) {
    let tables = &scan.tables;
    let usage = &scan.usage;

    let has_in = !tables.varyings_in.is_empty() || usage.frag_coord || usage.point_coord;
    let has_out = !tables.color_outputs.is_empty() || usage.frag_depth;

    if has_in {
        w.line("struct PsInput {");
        for v in &tables.varyings_in {
            let flat = if v.flat { "nointerpolation " } else { "" };
            w.line(&format!(
                "    {flat}{} {} : {};",
                v.ty.target_name(),
                v.name,
                semantic(&v.name)
            ));
        }
        if usage.frag_coord {
            w.line("    float4 frag_coord : SV_Position;");
        }
        if usage.point_coord {
            w.line("    float2 point_coord : POINTCOORD;");
        }
        w.line("};");
        w.blank();
    }

    if has_out {
        w.line("struct PsOutput {");
        for o in &tables.color_outputs {
            w.line(&format!(
                "    {} {} : SV_Target{};",
                o.ty.target_name(),
                o.name,
                o.location
            ));
        }
        if usage.frag_depth {
            w.line("    float frag_depth : SV_Depth;");
        }
        w.line("};");
        w.blank();
    }

    let ret = if has_out { "PsOutput" } else { "void" };
    if has_in {
        w.line(&format!("{ret} ps_main(PsInput input) {{"));
    } else {
        w.line(&format!("{ret} ps_main() {{"));
    }
    if has_out {
        w.line("    PsOutput output;");
    }
    for l in &scan.main_body {
        w.line(l);
    }
    if has_out {
        w.line("    return output;");
    }
    w.line("}");
}

pub(crate) fn emit(scan: &ScanResult) -> Result<Translation, TranspileError> {
    let layout = layout::pack(&scan.tables.uniforms)?;

    let mut w = SourceWriter::new();
    w.raw(PREAMBLE_COMMON);
    match scan.stage {
        ShaderStage::Vertex => w.raw(PREAMBLE_VERTEX),
        ShaderStage::Fragment => w.raw(PREAMBLE_FRAGMENT),
    }
    w.raw(&scan.stream);
    emit_resources(&mut w, scan, &layout);

    let entry_point = match scan.stage {
        ShaderStage::Vertex => {
            emit_vertex(&mut w, scan);
            "vs_main"
        }
        ShaderStage::Fragment => {
            emit_fragment(&mut w, scan);
            "ps_main"
        }
    };

    let reflection = reflect::build(scan, Dialect::Hlsl, entry_point, Some(&layout));
    Ok(Translation {
        text: w.finish(),
        reflection,
    })
}
