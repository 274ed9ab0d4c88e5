//! The transpiler's error taxonomy.
//!
//! Every failure is fatal: the transpiler either produces a complete
//! translation unit or raises one of these, carrying the 1-based source
//! line where the problem was detected. There is no recovery and no
//! partial output.

use thiserror::Error;

/// Which kind of registered identifier a scope violation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Input,
    Output,
    Uniform,
    Builtin,
}

impl std::fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScopeKind::Input => "input",
            ScopeKind::Output => "output",
            ScopeKind::Uniform => "uniform",
            ScopeKind::Builtin => "builtin",
        };
        f.write_str(s)
    }
}

/// A fatal transpilation error.
#[derive(Debug, Error)]
pub enum TranspileError {
    /// A line in the top-level region matched no recognised declaration or
    /// control form.
    #[error("line {line}: unable to process line")]
    UnableToProcess { line: usize },

    /// `#version` / `#extension` directives are outside the supported subset.
    #[error("line {line}: version and extension directives are not supported")]
    Directive { line: usize },

    /// User macro definitions are outside the supported subset.
    #[error("line {line}: macro definitions are not supported")]
    MacroDefinition { line: usize },

    /// A texture type other than the supported 1D/2D variants.
    #[error("line {line}: unsupported texture type `{ty}`")]
    UnsupportedTexture { line: usize, ty: String },

    /// A declaration uses a type the subset does not admit in that position.
    #[error("line {line}: unsupported type `{ty}`")]
    UnsupportedType { line: usize, ty: String },

    /// `.length()` array-length queries are not supported.
    #[error("line {line}: array length queries are not supported")]
    ArrayLengthQuery { line: usize },

    /// `inverse()` has no portable equivalent in the targets.
    #[error("line {line}: matrix inverse is not supported")]
    MatrixInverse { line: usize },

    /// Struct values must be written with braced initializers.
    #[error("line {line}: struct `{ty}` must use a braced initializer")]
    NonBracedInitializer { line: usize, ty: String },

    /// Array dimensions must follow the variable name, not the type.
    #[error("line {line}: array dimensions must follow the variable name")]
    MisplacedArrayDimension { line: usize },

    /// A registered identifier was referenced outside the entry function
    /// without being an explicit parameter of the enclosing function.
    #[error("line {line}: {kind} `{name}` referenced outside the entry function")]
    ScopeViolation {
        line: usize,
        kind: ScopeKind,
        name: String,
    },

    /// A builtin belonging to the other stage appeared in the entry body.
    #[error("line {line}: builtin `{name}` is not available in this stage")]
    WrongStageBuiltin { line: usize, name: String },

    /// No `void main()` was found.
    #[error("shader has no `void main()` entry function")]
    MissingEntryPoint,

    /// More than one `void main()` was found.
    #[error("line {line}: duplicate `void main()` entry function")]
    DuplicateEntryPoint { line: usize },

    /// A vertex shader must assign `gl_Position` in its entry function.
    #[error("vertex shader never assigns gl_Position")]
    PositionNeverWritten,

    /// Two declarations claim the same attribute or output location.
    #[error("line {line}: duplicate {what} location {location}")]
    DuplicateLocation {
        line: usize,
        what: &'static str,
        location: u32,
    },

    /// The same name was declared twice across the symbol tables.
    #[error("line {line}: duplicate declaration of `{name}`")]
    DuplicateDeclaration { line: usize, name: String },

    /// A private-function signature never balanced its parentheses.
    #[error("function signature starting at line {line} never balances its parentheses")]
    UnbalancedSignature { line: usize },

    /// A struct, function, or entry body was still open at end of input.
    #[error("line {line}: unterminated block at end of input")]
    UnterminatedBlock { line: usize },

    /// Packed constant-buffer layout has no rule for arrays whose element
    /// size is not a multiple of 16 bytes.
    #[error("uniform array `{name}` has element size {size}, packed layout requires a multiple of 16")]
    UnalignedArrayElement { name: String, size: u32 },
}
