//! Symbol tables and declaration parsing.
//!
//! Declaration lines recognised by the classifier in the top-level region
//! land here. Declaration order is preserved throughout: it determines
//! binding-slot assignment and, for the packed dialect, byte layout.

use crate::error::TranspileError;
use crate::types::{TextureType, ValueType};
use crate::ShaderStage;

/// A value uniform (scalar/vector/matrix, optionally a fixed-length array).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformVar {
    pub name: String,
    pub ty: ValueType,
    pub array_len: Option<u32>,
}

/// A texture uniform. Expands into a texture + sampler binding pair in both
/// target dialects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureVar {
    pub name: String,
    pub ty: TextureType,
}

/// A vertex attribute with its explicit location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub ty: ValueType,
    pub location: u32,
    pub per_instance: bool,
}

/// A vertex output or fragment input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Varying {
    pub name: String,
    pub ty: ValueType,
    pub flat: bool,
}

/// A fragment color output at an explicit location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorOutput {
    pub location: u32,
    pub name: String,
    pub ty: ValueType,
}

/// Everything declared outside function bodies, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct SymbolTables {
    pub uniforms: Vec<UniformVar>,
    pub textures: Vec<TextureVar>,
    /// Vertex stage only, ordered by declared location.
    pub attributes: Vec<Attribute>,
    /// Fragment stage inputs, declaration order.
    pub varyings_in: Vec<Varying>,
    /// Vertex stage outputs, declaration order.
    pub varyings_out: Vec<Varying>,
    /// Fragment stage outputs, ordered by location.
    pub color_outputs: Vec<ColorOutput>,
    /// User struct names, used to recognise braced initializers.
    pub structs: Vec<String>,
}

impl SymbolTables {
    pub fn is_uniform(&self, name: &str) -> bool {
        self.uniforms.iter().any(|u| u.name == name)
    }

    pub fn is_texture(&self, name: &str) -> bool {
        self.textures.iter().any(|t| t.name == name)
    }

    pub fn find_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn is_input(&self, name: &str) -> bool {
        self.find_attribute(name).is_some() || self.varyings_in.iter().any(|v| v.name == name)
    }

    pub fn is_output(&self, name: &str) -> bool {
        self.varyings_out.iter().any(|v| v.name == name)
            || self.color_outputs.iter().any(|o| o.name == name)
    }

    pub fn is_struct(&self, name: &str) -> bool {
        self.structs.iter().any(|s| s == name)
    }

    fn is_declared(&self, name: &str) -> bool {
        self.is_uniform(name) || self.is_texture(name) || self.is_input(name) || self.is_output(name)
    }

    fn check_fresh(&self, name: &str, line: usize) -> Result<(), TranspileError> {
        if self.is_declared(name) {
            return Err(TranspileError::DuplicateDeclaration {
                line,
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

/// True when a type token names a texture uniform rather than a value
/// uniform. Fixed suffix check, per the source dialect's sampler spellings.
pub fn is_sampler_token(token: &str) -> bool {
    token.contains("sampler")
}

fn check_ident(token: &str, line: usize) -> Result<&str, TranspileError> {
    let ok = !token.is_empty()
        && token
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if ok {
        Ok(token)
    } else {
        Err(TranspileError::UnableToProcess { line })
    }
}

/// Split `name[N]` into the name and the bracketed count.
fn split_array_suffix(token: &str, line: usize) -> Result<(&str, Option<u32>), TranspileError> {
    match token.find('[') {
        None => Ok((check_ident(token, line)?, None)),
        Some(open) => {
            let name = check_ident(&token[..open], line)?;
            let rest = &token[open + 1..];
            let close = rest
                .find(']')
                .ok_or(TranspileError::UnableToProcess { line })?;
            let count: u32 = rest[..close]
                .trim()
                .parse()
                .map_err(|_| TranspileError::UnableToProcess { line })?;
            if !rest[close + 1..].trim().is_empty() {
                return Err(TranspileError::UnableToProcess { line });
            }
            Ok((name, Some(count)))
        }
    }
}

fn parse_value_type(token: &str, line: usize) -> Result<ValueType, TranspileError> {
    if token.contains('[') {
        return Err(TranspileError::MisplacedArrayDimension { line });
    }
    ValueType::parse(token).ok_or_else(|| TranspileError::UnsupportedType {
        line,
        ty: token.to_string(),
    })
}

/// `uniform <type> <name>;` — value uniform or texture uniform.
pub fn parse_uniform(
    tables: &mut SymbolTables,
    decl: &str,
    line: usize,
) -> Result<(), TranspileError> {
    let body = decl
        .trim_start()
        .strip_prefix("uniform")
        .and_then(|r| r.trim_end().strip_suffix(';'))
        .ok_or(TranspileError::UnableToProcess { line })?
        .trim();
    let mut parts = body.split_whitespace();
    let ty_tok = parts.next().ok_or(TranspileError::UnableToProcess { line })?;
    let name_tok = parts.next().ok_or(TranspileError::UnableToProcess { line })?;
    if parts.next().is_some() {
        return Err(TranspileError::UnableToProcess { line });
    }

    if is_sampler_token(ty_tok) {
        let ty = TextureType::parse(ty_tok).ok_or_else(|| TranspileError::UnsupportedTexture {
            line,
            ty: ty_tok.to_string(),
        })?;
        let (name, array_len) = split_array_suffix(name_tok, line)?;
        if array_len.is_some() {
            return Err(TranspileError::UnsupportedTexture {
                line,
                ty: format!("{ty_tok}[]"),
            });
        }
        tables.check_fresh(name, line)?;
        tables.textures.push(TextureVar {
            name: name.to_string(),
            ty,
        });
        return Ok(());
    }

    let ty = parse_value_type(ty_tok, line)?;
    if matches!(ty, ValueType::Matrix(n) if n < 4) {
        // No packing rule for partially-filled matrix registers.
        return Err(TranspileError::UnsupportedType {
            line,
            ty: ty_tok.to_string(),
        });
    }
    let (name, array_len) = split_array_suffix(name_tok, line)?;
    tables.check_fresh(name, line)?;
    tables.uniforms.push(UniformVar {
        name: name.to_string(),
        ty,
        array_len,
    });
    Ok(())
}

/// `layout(location = N) in|out <type> <name>;`
///
/// Vertex `in` declares an attribute; a bracketed count after the name tags
/// it per-instance (the count itself is stripped). Fragment `out` declares a
/// color output at the given location.
pub fn parse_layout_decl(
    tables: &mut SymbolTables,
    stage: ShaderStage,
    decl: &str,
    line: usize,
) -> Result<(), TranspileError> {
    let rest = decl
        .trim_start()
        .strip_prefix("layout")
        .ok_or(TranspileError::UnableToProcess { line })?
        .trim_start();
    let rest = rest
        .strip_prefix('(')
        .ok_or(TranspileError::UnableToProcess { line })?;
    let close = rest
        .find(')')
        .ok_or(TranspileError::UnableToProcess { line })?;
    let args = &rest[..close];
    let decl_rest = rest[close + 1..].trim();

    let (key, value) = args
        .split_once('=')
        .ok_or(TranspileError::UnableToProcess { line })?;
    if key.trim() != "location" {
        return Err(TranspileError::UnableToProcess { line });
    }
    let location: u32 = value
        .trim()
        .parse()
        .map_err(|_| TranspileError::UnableToProcess { line })?;

    let body = decl_rest
        .strip_suffix(';')
        .ok_or(TranspileError::UnableToProcess { line })?
        .trim();

    if let Some(attr) = body.strip_prefix("in ") {
        if stage != ShaderStage::Vertex {
            return Err(TranspileError::UnableToProcess { line });
        }
        let mut parts = attr.split_whitespace();
        let ty_tok = parts.next().ok_or(TranspileError::UnableToProcess { line })?;
        let name_tok = parts.next().ok_or(TranspileError::UnableToProcess { line })?;
        if parts.next().is_some() {
            return Err(TranspileError::UnableToProcess { line });
        }
        let ty = parse_value_type(ty_tok, line)?;
        if matches!(ty, ValueType::Matrix(_)) {
            return Err(TranspileError::UnsupportedType {
                line,
                ty: ty_tok.to_string(),
            });
        }
        let (name, instance_count) = split_array_suffix(name_tok, line)?;
        if tables.attributes.iter().any(|a| a.location == location) {
            return Err(TranspileError::DuplicateLocation {
                line,
                what: "attribute",
                location,
            });
        }
        tables.check_fresh(name, line)?;
        tables.attributes.push(Attribute {
            name: name.to_string(),
            ty,
            location,
            per_instance: instance_count.is_some(),
        });
        tables.attributes.sort_by_key(|a| a.location);
        return Ok(());
    }

    if let Some(out) = body.strip_prefix("out ") {
        if stage != ShaderStage::Fragment {
            return Err(TranspileError::UnableToProcess { line });
        }
        let mut parts = out.split_whitespace();
        let ty_tok = parts.next().ok_or(TranspileError::UnableToProcess { line })?;
        let name_tok = parts.next().ok_or(TranspileError::UnableToProcess { line })?;
        if parts.next().is_some() {
            return Err(TranspileError::UnableToProcess { line });
        }
        let ty = parse_value_type(ty_tok, line)?;
        if matches!(ty, ValueType::Matrix(_)) {
            return Err(TranspileError::UnsupportedType {
                line,
                ty: ty_tok.to_string(),
            });
        }
        let name = check_ident(name_tok, line)?;
        if tables.color_outputs.iter().any(|o| o.location == location) {
            return Err(TranspileError::DuplicateLocation {
                line,
                what: "output",
                location,
            });
        }
        tables.check_fresh(name, line)?;
        tables.color_outputs.push(ColorOutput {
            location,
            name: name.to_string(),
            ty,
        });
        tables.color_outputs.sort_by_key(|o| o.location);
        return Ok(());
    }

    Err(TranspileError::UnableToProcess { line })
}

/// `in`/`out` varying declarations (fragment inputs, vertex outputs),
/// optionally `flat`-qualified.
pub fn parse_varying(
    tables: &mut SymbolTables,
    stage: ShaderStage,
    decl: &str,
    flat: bool,
    line: usize,
) -> Result<(), TranspileError> {
    let body = decl
        .trim_end()
        .strip_suffix(';')
        .ok_or(TranspileError::UnableToProcess { line })?;
    let mut parts = body.split_whitespace();
    let ty_tok = parts.next().ok_or(TranspileError::UnableToProcess { line })?;
    let name_tok = parts.next().ok_or(TranspileError::UnableToProcess { line })?;
    if parts.next().is_some() {
        return Err(TranspileError::UnableToProcess { line });
    }
    let ty = parse_value_type(ty_tok, line)?;
    if matches!(ty, ValueType::Matrix(_)) {
        return Err(TranspileError::UnsupportedType {
            line,
            ty: ty_tok.to_string(),
        });
    }
    let name = check_ident(name_tok, line)?;
    tables.check_fresh(name, line)?;
    let var = Varying {
        name: name.to_string(),
        ty,
        flat,
    };
    match stage {
        ShaderStage::Vertex => tables.varyings_out.push(var),
        ShaderStage::Fragment => tables.varyings_in.push(var),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_value_and_texture() {
        let mut t = SymbolTables::default();
        parse_uniform(&mut t, "uniform mat4 u_mvp;", 1).unwrap();
        parse_uniform(&mut t, "uniform vec4 u_points[8];", 2).unwrap();
        parse_uniform(&mut t, "uniform sampler2D tex;", 3).unwrap();
        assert_eq!(t.uniforms.len(), 2);
        assert_eq!(t.uniforms[1].array_len, Some(8));
        assert_eq!(t.textures.len(), 1);
        assert!(t.is_texture("tex"));
    }

    #[test]
    fn unsupported_texture_dimension() {
        let mut t = SymbolTables::default();
        let err = parse_uniform(&mut t, "uniform sampler3D vol;", 4).unwrap_err();
        assert!(matches!(err, TranspileError::UnsupportedTexture { line: 4, .. }));
    }

    #[test]
    fn misplaced_array_dimension() {
        let mut t = SymbolTables::default();
        let err = parse_uniform(&mut t, "uniform float[3] xs;", 2).unwrap_err();
        assert!(matches!(err, TranspileError::MisplacedArrayDimension { line: 2 }));
    }

    #[test]
    fn attribute_locations_and_instancing() {
        let mut t = SymbolTables::default();
        parse_layout_decl(&mut t, ShaderStage::Vertex, "layout(location = 1) in vec3 normal;", 1)
            .unwrap();
        parse_layout_decl(&mut t, ShaderStage::Vertex, "layout(location = 0) in vec3 pos;", 2)
            .unwrap();
        parse_layout_decl(
            &mut t,
            ShaderStage::Vertex,
            "layout(location = 2) in vec4 inst_color[1];",
            3,
        )
        .unwrap();
        // Ordered by declared location, not declaration order.
        assert_eq!(t.attributes[0].name, "pos");
        assert_eq!(t.attributes[1].name, "normal");
        assert!(t.attributes[2].per_instance);

        let err = parse_layout_decl(
            &mut t,
            ShaderStage::Vertex,
            "layout(location = 0) in vec2 uv;",
            4,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TranspileError::DuplicateLocation { what: "attribute", location: 0, .. }
        ));
    }

    #[test]
    fn duplicate_output_location() {
        let mut t = SymbolTables::default();
        parse_layout_decl(
            &mut t,
            ShaderStage::Fragment,
            "layout(location = 0) out vec4 color;",
            1,
        )
        .unwrap();
        let err = parse_layout_decl(
            &mut t,
            ShaderStage::Fragment,
            "layout(location = 0) out vec4 other;",
            2,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TranspileError::DuplicateLocation { what: "output", location: 0, line: 2 }
        ));
    }
}
