//! Scope validation for lines outside the entry function.
//!
//! Stage I/O, uniforms, textures, and the reserved builtins are only
//! visible inside the entry function. A private function may name one of
//! them in its own parameter list, which makes that identifier legal inside
//! its body; anything else is a hard failure. This keeps helper functions
//! pure and explicit about their dependencies, which is what both target
//! dialects require of ordinary subroutines.

use crate::decl::SymbolTables;
use crate::error::{ScopeKind, TranspileError};
use crate::ShaderStage;

/// Reserved builtin names per stage.
pub fn builtins(stage: ShaderStage) -> &'static [&'static str] {
    match stage {
        ShaderStage::Vertex => &["gl_Position", "gl_PointSize", "gl_VertexID", "gl_InstanceID"],
        ShaderStage::Fragment => &["gl_FragCoord", "gl_FragDepth", "gl_PointCoord"],
    }
}

/// Word-boundary search for `name` in `line`.
pub fn mentions(line: &str, name: &str) -> bool {
    let mut from = 0;
    while let Some(pos) = line[from..].find(name) {
        let start = from + pos;
        let end = start + name.len();
        let before_ok = start == 0
            || !line[..start]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
        let after_ok = !line[end..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
        if before_ok && after_ok {
            return true;
        }
        from = end;
    }
    false
}

/// Check one line against every registered identifier and the stage's
/// reserved builtins. `params` is the argument-name set of the private
/// function currently being parsed (empty outside one).
pub fn check_line(
    line: &str,
    tables: &SymbolTables,
    stage: ShaderStage,
    params: &[String],
    line_no: usize,
) -> Result<(), TranspileError> {
    let allowed = |name: &str| params.iter().any(|p| p == name);

    let violation = |kind: ScopeKind, name: &str| TranspileError::ScopeViolation {
        line: line_no,
        kind,
        name: name.to_string(),
    };

    for u in &tables.uniforms {
        if mentions(line, &u.name) && !allowed(&u.name) {
            return Err(violation(ScopeKind::Uniform, &u.name));
        }
    }
    for t in &tables.textures {
        if mentions(line, &t.name) && !allowed(&t.name) {
            return Err(violation(ScopeKind::Uniform, &t.name));
        }
    }
    for a in &tables.attributes {
        if mentions(line, &a.name) && !allowed(&a.name) {
            return Err(violation(ScopeKind::Input, &a.name));
        }
    }
    for v in &tables.varyings_in {
        if mentions(line, &v.name) && !allowed(&v.name) {
            return Err(violation(ScopeKind::Input, &v.name));
        }
    }
    for v in &tables.varyings_out {
        if mentions(line, &v.name) && !allowed(&v.name) {
            return Err(violation(ScopeKind::Output, &v.name));
        }
    }
    for o in &tables.color_outputs {
        if mentions(line, &o.name) && !allowed(&o.name) {
            return Err(violation(ScopeKind::Output, &o.name));
        }
    }
    for b in builtins(stage) {
        if mentions(line, b) && !allowed(b) {
            return Err(violation(ScopeKind::Builtin, b));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::parse_uniform;

    #[test]
    fn word_boundaries() {
        assert!(mentions("x = u_time * 2.0;", "u_time"));
        assert!(!mentions("x = u_time2;", "u_time"));
        assert!(!mentions("x = my_u_time;", "u_time"));
        assert!(mentions("u_time+1.0", "u_time"));
    }

    #[test]
    fn uniform_outside_entry_is_rejected() {
        let mut t = SymbolTables::default();
        parse_uniform(&mut t, "uniform float u_time;", 1).unwrap();

        let err = check_line("return p * u_time;", &t, ShaderStage::Vertex, &[], 7).unwrap_err();
        assert!(matches!(
            err,
            TranspileError::ScopeViolation { line: 7, kind: ScopeKind::Uniform, .. }
        ));

        // Legal when the enclosing private function takes it as a parameter.
        check_line(
            "return p * u_time;",
            &t,
            ShaderStage::Vertex,
            &["u_time".to_string()],
            7,
        )
        .unwrap();
    }

    #[test]
    fn builtins_are_reserved() {
        let t = SymbolTables::default();
        let err = check_line("vec4 p = gl_FragCoord;", &t, ShaderStage::Fragment, &[], 3)
            .unwrap_err();
        assert!(matches!(
            err,
            TranspileError::ScopeViolation { kind: ScopeKind::Builtin, .. }
        ));
    }
}
