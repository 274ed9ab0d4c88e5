//! Type vocabulary shared by the symbol tables, the rewriter, and the
//! emitters: scalar/vector/matrix value types and the sampled texture types.

/// Scalar component kind of a value or sampled texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Float,
    Int,
    Uint,
    Bool,
}

impl ScalarKind {
    fn target_name(self) -> &'static str {
        match self {
            ScalarKind::Float => "float",
            ScalarKind::Int => "int",
            ScalarKind::Uint => "uint",
            ScalarKind::Bool => "bool",
        }
    }
}

/// A scalar, vector, or square float matrix type.
///
/// Both target dialects spell these the same way (`float3`, `int2`,
/// `float4x4`, ...), so one rendering covers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Scalar(ScalarKind),
    /// 2..=4 components.
    Vector(ScalarKind, u8),
    /// Square float matrix, dimension 2..=4.
    Matrix(u8),
}

impl ValueType {
    /// Parse a source-dialect type token (`vec3`, `mat4`, `uint`, ...).
    pub fn parse(token: &str) -> Option<Self> {
        Some(match token {
            "float" => ValueType::Scalar(ScalarKind::Float),
            "int" => ValueType::Scalar(ScalarKind::Int),
            "uint" => ValueType::Scalar(ScalarKind::Uint),
            "bool" => ValueType::Scalar(ScalarKind::Bool),
            "vec2" => ValueType::Vector(ScalarKind::Float, 2),
            "vec3" => ValueType::Vector(ScalarKind::Float, 3),
            "vec4" => ValueType::Vector(ScalarKind::Float, 4),
            "ivec2" => ValueType::Vector(ScalarKind::Int, 2),
            "ivec3" => ValueType::Vector(ScalarKind::Int, 3),
            "ivec4" => ValueType::Vector(ScalarKind::Int, 4),
            "uvec2" => ValueType::Vector(ScalarKind::Uint, 2),
            "uvec3" => ValueType::Vector(ScalarKind::Uint, 3),
            "uvec4" => ValueType::Vector(ScalarKind::Uint, 4),
            "bvec2" => ValueType::Vector(ScalarKind::Bool, 2),
            "bvec3" => ValueType::Vector(ScalarKind::Bool, 3),
            "bvec4" => ValueType::Vector(ScalarKind::Bool, 4),
            "mat2" => ValueType::Matrix(2),
            "mat3" => ValueType::Matrix(3),
            "mat4" => ValueType::Matrix(4),
            _ => return None,
        })
    }

    /// Spelling in the target dialects.
    pub fn target_name(self) -> String {
        match self {
            ValueType::Scalar(k) => k.target_name().to_string(),
            ValueType::Vector(k, n) => format!("{}{}", k.target_name(), n),
            ValueType::Matrix(n) => format!("float{n}x{n}"),
        }
    }

    /// Number of scalar components.
    pub fn component_count(self) -> u32 {
        match self {
            ValueType::Scalar(_) => 1,
            ValueType::Vector(_, n) => u32::from(n),
            ValueType::Matrix(n) => u32::from(n) * u32::from(n),
        }
    }

    /// Size in bytes when stored in a packed constant buffer. Matrix columns
    /// are padded to 16-byte registers, matching the packed dialect's rules.
    pub fn byte_size(self) -> u32 {
        match self {
            ValueType::Scalar(_) => 4,
            ValueType::Vector(_, n) => 4 * u32::from(n),
            ValueType::Matrix(n) => 16 * u32::from(n),
        }
    }
}

/// Texture dimensionality. Higher dimensions are outside the subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureDim {
    D1,
    D2,
}

/// A sampled texture uniform's type: sampled scalar kind, dimensionality,
/// and whether it is a depth (comparison) texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureType {
    pub sampled: ScalarKind,
    pub dim: TextureDim,
    pub depth: bool,
}

impl TextureType {
    /// Parse a source texture type token. The token has already passed the
    /// sampler suffix check; anything unrecognised here (3D, cube, arrays)
    /// is an unsupported texture type.
    pub fn parse(token: &str) -> Option<Self> {
        Some(match token {
            "sampler1D" => TextureType {
                sampled: ScalarKind::Float,
                dim: TextureDim::D1,
                depth: false,
            },
            "isampler1D" => TextureType {
                sampled: ScalarKind::Int,
                dim: TextureDim::D1,
                depth: false,
            },
            "usampler1D" => TextureType {
                sampled: ScalarKind::Uint,
                dim: TextureDim::D1,
                depth: false,
            },
            "sampler2D" => TextureType {
                sampled: ScalarKind::Float,
                dim: TextureDim::D2,
                depth: false,
            },
            "isampler2D" => TextureType {
                sampled: ScalarKind::Int,
                dim: TextureDim::D2,
                depth: false,
            },
            "usampler2D" => TextureType {
                sampled: ScalarKind::Uint,
                dim: TextureDim::D2,
                depth: false,
            },
            "sampler2DShadow" => TextureType {
                sampled: ScalarKind::Float,
                dim: TextureDim::D2,
                depth: true,
            },
            _ => return None,
        })
    }

    /// Metal-dialect texture type spelling.
    pub fn msl_name(self) -> String {
        if self.depth {
            return "depth2d<float>".to_string();
        }
        let dim = match self.dim {
            TextureDim::D1 => "texture1d",
            TextureDim::D2 => "texture2d",
        };
        format!("{dim}<{}>", self.sampled.target_name())
    }

    /// Direct3D-dialect texture type spelling.
    pub fn hlsl_name(self) -> String {
        if self.depth {
            return "Texture2D<float>".to_string();
        }
        let dim = match self.dim {
            TextureDim::D1 => "Texture1D",
            TextureDim::D2 => "Texture2D",
        };
        format!("{dim}<{}4>", self.sampled.target_name())
    }

    /// Direct3D-dialect sampler type for this texture.
    pub fn hlsl_sampler(self) -> &'static str {
        if self.depth {
            "SamplerComparisonState"
        } else {
            "SamplerState"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_type_spellings() {
        assert_eq!(ValueType::parse("vec3").unwrap().target_name(), "float3");
        assert_eq!(ValueType::parse("ivec2").unwrap().target_name(), "int2");
        assert_eq!(ValueType::parse("mat4").unwrap().target_name(), "float4x4");
        assert!(ValueType::parse("double").is_none());
    }

    #[test]
    fn packed_sizes() {
        assert_eq!(ValueType::parse("float").unwrap().byte_size(), 4);
        assert_eq!(ValueType::parse("vec3").unwrap().byte_size(), 12);
        assert_eq!(ValueType::parse("mat4").unwrap().byte_size(), 64);
    }

    #[test]
    fn texture_tokens() {
        let t = TextureType::parse("usampler2D").unwrap();
        assert_eq!(t.sampled, ScalarKind::Uint);
        assert_eq!(t.msl_name(), "texture2d<uint>");
        assert_eq!(t.hlsl_name(), "Texture2D<uint4>");
        assert!(TextureType::parse("sampler3D").is_none());

        let d = TextureType::parse("sampler2DShadow").unwrap();
        assert!(d.depth);
        assert_eq!(d.hlsl_sampler(), "SamplerComparisonState");
    }
}
