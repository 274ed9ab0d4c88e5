//! Builtin and type rewriting.
//!
//! Body lines are rewritten identifier-by-identifier against fixed
//! per-dialect substitution tables: source type tokens map to the target's
//! vector/matrix spellings, reinterpretation intrinsics map to native
//! equivalents, texture intrinsics map to the preamble's sampling wrappers,
//! and — inside the entry function only — builtins and registered stage I/O
//! collapse to struct-qualified accesses on the synthesized I/O structs.
//! Private-function bodies keep their own parameter names untouched.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::decl::SymbolTables;
use crate::error::TranspileError;
use crate::{Dialect, ShaderStage};

/// Which optional builtins the entry body actually used. Their presence
/// changes the synthesized struct fields and entry parameter list.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinUsage {
    pub vertex_id: bool,
    pub instance_id: bool,
    pub point_size: bool,
    pub frag_coord: bool,
    pub frag_depth: bool,
    pub point_coord: bool,
    pub position_written: bool,
}

/// Source-dialect type tokens, spelled the same in both targets.
const TYPE_TOKENS: &[(&str, &str)] = &[
    ("vec2", "float2"),
    ("vec3", "float3"),
    ("vec4", "float4"),
    ("ivec2", "int2"),
    ("ivec3", "int3"),
    ("ivec4", "int4"),
    ("uvec2", "uint2"),
    ("uvec3", "uint3"),
    ("uvec4", "uint4"),
    ("bvec2", "bool2"),
    ("bvec3", "bool3"),
    ("bvec4", "bool4"),
    ("mat2", "float2x2"),
    ("mat3", "float3x3"),
    ("mat4", "float4x4"),
];

const MSL_INTRINSICS: &[(&str, &str)] = &[
    ("dFdx", "dfdx"),
    ("dFdy", "dfdy"),
    ("inversesqrt", "rsqrt"),
    ("floatBitsToInt", "as_type<int>"),
    ("floatBitsToUint", "as_type<uint>"),
    ("intBitsToFloat", "as_type<float>"),
    ("uintBitsToFloat", "as_type<float>"),
    ("texture", "tex_sample"),
    ("textureLod", "tex_sample_lod"),
    ("texelFetch", "tex_fetch"),
    ("textureSize", "tex_size"),
    ("textureQueryLod", "tex_query_lod"),
];

const HLSL_INTRINSICS: &[(&str, &str)] = &[
    ("fract", "frac"),
    ("mix", "lerp"),
    ("dFdx", "ddx"),
    ("dFdy", "ddy"),
    ("inversesqrt", "rsqrt"),
    ("floatBitsToInt", "asint"),
    ("floatBitsToUint", "asuint"),
    ("intBitsToFloat", "asfloat"),
    ("uintBitsToFloat", "asfloat"),
    ("texture", "tex_sample"),
    ("textureLod", "tex_sample_lod"),
    ("texelFetch", "tex_fetch"),
    ("textureSize", "tex_size"),
    ("textureQueryLod", "tex_query_lod"),
];

static MSL_TOKENS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    TYPE_TOKENS
        .iter()
        .chain(MSL_INTRINSICS)
        .map(|&(k, v)| (k, v))
        .collect()
});

static HLSL_TOKENS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    TYPE_TOKENS
        .iter()
        .chain(HLSL_INTRINSICS)
        .map(|&(k, v)| (k, v))
        .collect()
});

fn token_map(dialect: Dialect) -> &'static HashMap<&'static str, &'static str> {
    match dialect {
        Dialect::Msl => &MSL_TOKENS,
        Dialect::Hlsl => &HLSL_TOKENS,
    }
}

fn is_source_type_token(tok: &str) -> bool {
    crate::types::ValueType::parse(tok).is_some()
}

/// Names of the entry wrapper's input/output locals per dialect. `in`/`out`
/// are reserved words in the Direct3D dialect, so it uses longer names.
pub fn io_var_names(dialect: Dialect) -> (&'static str, &'static str) {
    match dialect {
        Dialect::Msl => ("in", "out"),
        Dialect::Hlsl => ("input", "output"),
    }
}

/// Scan `line` for identifiers and apply `subst` to each. The callback also
/// receives the next non-whitespace character after the identifier, which
/// distinguishes constructor calls from type positions.
fn rewrite_identifiers<F>(line: &str, mut subst: F) -> Result<String, TranspileError>
where
    F: FnMut(&str, Option<char>) -> Result<Option<String>, TranspileError>,
{
    let mut out = String::with_capacity(line.len());
    let mut iter = line.char_indices().peekable();
    while let Some(&(start, c)) = iter.peek() {
        if c.is_ascii_alphabetic() || c == '_' {
            let mut end = start;
            while let Some(&(j, d)) = iter.peek() {
                if d.is_ascii_alphanumeric() || d == '_' {
                    end = j + d.len_utf8();
                    iter.next();
                } else {
                    break;
                }
            }
            let ident = &line[start..end];
            let next = line[end..].chars().find(|ch| !ch.is_whitespace());
            match subst(ident, next)? {
                Some(replacement) => out.push_str(&replacement),
                None => out.push_str(ident),
            }
        } else {
            out.push(c);
            iter.next();
        }
    }
    Ok(out)
}

/// Context for rewriting one body line.
pub struct LineCtx<'a> {
    pub dialect: Dialect,
    pub stage: ShaderStage,
    pub tables: &'a SymbolTables,
    /// Parameter names of the enclosing private function that carry a
    /// texture type; bare references expand to the texture/sampler pair.
    pub texture_params: &'a [String],
    /// Whether this line belongs to the entry function body.
    pub in_main: bool,
    pub line: usize,
}

fn builtin_subst(
    tok: &str,
    ctx: &LineCtx<'_>,
    usage: &mut BuiltinUsage,
) -> Result<Option<String>, TranspileError> {
    if !tok.starts_with("gl_") {
        return Ok(None);
    }
    let (in_var, out_var) = io_var_names(ctx.dialect);
    let rep = match (ctx.stage, tok) {
        (ShaderStage::Vertex, "gl_Position") => format!("{out_var}.position"),
        (ShaderStage::Vertex, "gl_PointSize") => {
            usage.point_size = true;
            format!("{out_var}.point_size")
        }
        (ShaderStage::Vertex, "gl_VertexID") => {
            usage.vertex_id = true;
            match ctx.dialect {
                Dialect::Msl => "vid".to_string(),
                Dialect::Hlsl => format!("{in_var}.vid"),
            }
        }
        (ShaderStage::Vertex, "gl_InstanceID") => {
            usage.instance_id = true;
            match ctx.dialect {
                Dialect::Msl => "iid".to_string(),
                Dialect::Hlsl => format!("{in_var}.iid"),
            }
        }
        (ShaderStage::Fragment, "gl_FragCoord") => {
            usage.frag_coord = true;
            format!("{in_var}.frag_coord")
        }
        (ShaderStage::Fragment, "gl_FragDepth") => {
            usage.frag_depth = true;
            format!("{out_var}.frag_depth")
        }
        (ShaderStage::Fragment, "gl_PointCoord") => {
            usage.point_coord = true;
            format!("{in_var}.point_coord")
        }
        _ => {
            let other = match ctx.stage {
                ShaderStage::Vertex => ShaderStage::Fragment,
                ShaderStage::Fragment => ShaderStage::Vertex,
            };
            if crate::scope::builtins(other).contains(&tok) {
                return Err(TranspileError::WrongStageBuiltin {
                    line: ctx.line,
                    name: tok.to_string(),
                });
            }
            return Ok(None);
        }
    };
    Ok(Some(rep))
}

/// Rewrite one body line (entry body, private-function body, or struct
/// member) for the target dialect.
pub fn rewrite_line(
    src: &str,
    ctx: &LineCtx<'_>,
    usage: &mut BuiltinUsage,
) -> Result<String, TranspileError> {
    if src.contains(".length()") {
        return Err(TranspileError::ArrayLengthQuery { line: ctx.line });
    }

    // Whether a bare `return` must become `return <out>` because the entry
    // wrapper returns the synthesized output struct.
    let returns_struct = ctx.in_main
        && (ctx.stage == ShaderStage::Vertex
            || !ctx.tables.color_outputs.is_empty()
            || usage.frag_depth);

    rewrite_identifiers(src, |tok, next| {
        if tok == "inverse" && next == Some('(') {
            return Err(TranspileError::MatrixInverse { line: ctx.line });
        }
        if is_source_type_token(tok) && next == Some('[') {
            return Err(TranspileError::MisplacedArrayDimension { line: ctx.line });
        }
        // Matrix constructor calls route through the preamble shims so the
        // column-vector argument convention survives on both targets.
        if next == Some('(') {
            match tok {
                "mat2" => return Ok(Some("mtx2".to_string())),
                "mat3" => return Ok(Some("mtx3".to_string())),
                "mat4" => return Ok(Some("mtx4".to_string())),
                _ => {}
            }
        }

        if ctx.in_main {
            if let Some(rep) = builtin_subst(tok, ctx, usage)? {
                return Ok(Some(rep));
            }
            if tok == "return" && next == Some(';') && returns_struct {
                let (_, out_var) = io_var_names(ctx.dialect);
                return Ok(Some(format!("return {out_var}")));
            }
            let (in_var, out_var) = io_var_names(ctx.dialect);
            if let Some(attr) = ctx.tables.find_attribute(tok) {
                if attr.per_instance && ctx.dialect == Dialect::Msl {
                    // Instanced attributes are fetched from their own
                    // buffer, indexed by the instance id.
                    usage.instance_id = true;
                    return Ok(Some(format!("{tok}_data[iid]")));
                }
                return Ok(Some(format!("{in_var}.{tok}")));
            }
            if ctx.tables.varyings_in.iter().any(|v| v.name == tok) {
                return Ok(Some(format!("{in_var}.{tok}")));
            }
            if ctx.tables.is_output(tok) {
                return Ok(Some(format!("{out_var}.{tok}")));
            }
            if ctx.tables.is_texture(tok) {
                return Ok(Some(format!("{tok}, {tok}_smplr")));
            }
        } else if ctx.texture_params.iter().any(|p| p == tok) {
            return Ok(Some(format!("{tok}, {tok}_smplr")));
        }

        if ctx.tables.is_struct(tok) {
            if next == Some('(') {
                return Err(TranspileError::NonBracedInitializer {
                    line: ctx.line,
                    ty: tok.to_string(),
                });
            }
            if next == Some('{') && ctx.dialect == Dialect::Hlsl {
                // The Direct3D dialect spells braced initializers without
                // the leading type name.
                return Ok(Some(String::new()));
            }
            return Ok(None);
        }

        Ok(token_map(ctx.dialect).get(tok).map(|s| s.to_string()))
    })
}
