//! Line classifier and parser state machine.
//!
//! The source is consumed one line at a time. Each line is stripped of its
//! trailing comment and whitespace, then dispatched on the current parser
//! state: top-level declarations route to the declaration tables, struct
//! and private-function text streams straight to the output buffer
//! (rewritten for the target dialect), and the entry-function body is
//! queued instead of emitted — the synthesized I/O structs and the entry
//! signature depend on builtin usage that is only known once the whole
//! body has been scanned.

use tracing::trace;

use crate::decl::{self, SymbolTables};
use crate::error::TranspileError;
use crate::rewrite::{self, BuiltinUsage, LineCtx};
use crate::scope;
use crate::types::{TextureType, ValueType};
use crate::{Dialect, ShaderStage};

/// Which structural region of the shader the cursor is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    None,
    InMain,
    InPrivateSignature,
    InPrivateBody,
    InStructBody,
}

/// Everything the emitters need: the symbol tables, the streamed
/// struct/private-function text, the queued entry body, and the builtin
/// usage flags discovered while scanning it.
#[derive(Debug)]
pub struct ScanResult {
    pub stage: ShaderStage,
    pub tables: SymbolTables,
    /// Structs and private functions, in source order, already rewritten.
    pub stream: String,
    /// The entry-function body, rewritten and queued for deferred emission.
    pub main_body: Vec<String>,
    pub usage: BuiltinUsage,
}

pub struct Scanner {
    stage: ShaderStage,
    dialect: Dialect,
    state: ParserState,
    tables: SymbolTables,
    stream: String,
    main_body: Vec<String>,
    usage: BuiltinUsage,
    line_no: usize,
    main_seen: bool,
    brace_depth: usize,
    // Private-function signature accumulation.
    sig_text: String,
    sig_line: usize,
    fn_params: Vec<String>,
    fn_texture_params: Vec<String>,
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(idx) => line[..idx].trim_end(),
        None => line.trim_end(),
    }
}

fn paren_balance(text: &str) -> (usize, usize) {
    let open = text.chars().filter(|&c| c == '(').count();
    let close = text.chars().filter(|&c| c == ')').count();
    (open, close)
}

fn brace_net(line: &str) -> (usize, usize) {
    let open = line.chars().filter(|&c| c == '{').count();
    let close = line.chars().filter(|&c| c == '}').count();
    (open, close)
}

/// Does this line assign `name` (optionally through a swizzle)?
fn line_assigns(line: &str, name: &str) -> bool {
    let mut from = 0;
    while let Some(pos) = line[from..].find(name) {
        let start = from + pos;
        let end = start + name.len();
        let boundary_ok = (start == 0
            || !line[..start]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_'))
            && !line[end..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
        if boundary_ok {
            let mut rest = line[end..].trim_start();
            if let Some(swizzled) = rest.strip_prefix('.') {
                let skip = swizzled
                    .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
                    .unwrap_or(swizzled.len());
                rest = swizzled[skip..].trim_start();
            }
            let mut chars = rest.chars();
            match chars.next() {
                Some('=') if chars.next() != Some('=') => return true,
                Some('+' | '-' | '*' | '/') if chars.next() == Some('=') => return true,
                _ => {}
            }
        }
        from = end;
    }
    false
}

impl Scanner {
    pub fn new(stage: ShaderStage, dialect: Dialect) -> Self {
        Scanner {
            stage,
            dialect,
            state: ParserState::None,
            tables: SymbolTables::default(),
            stream: String::new(),
            main_body: Vec::new(),
            usage: BuiltinUsage::default(),
            line_no: 0,
            main_seen: false,
            brace_depth: 0,
            sig_text: String::new(),
            sig_line: 0,
            fn_params: Vec::new(),
            fn_texture_params: Vec::new(),
        }
    }

    /// Run the scan over the whole source.
    pub fn run(mut self, source: &str) -> Result<ScanResult, TranspileError> {
        for (idx, raw) in source.lines().enumerate() {
            self.line_no = idx + 1;
            let line = strip_comment(raw);
            if line.trim().is_empty() {
                continue;
            }
            match self.state {
                ParserState::None => self.top_level(line)?,
                ParserState::InStructBody => self.struct_body(line)?,
                ParserState::InPrivateSignature => self.private_signature(line)?,
                ParserState::InPrivateBody => self.private_body(line)?,
                ParserState::InMain => self.main_line(line)?,
            }
        }

        match self.state {
            ParserState::InPrivateSignature => {
                return Err(TranspileError::UnbalancedSignature { line: self.sig_line });
            }
            ParserState::InStructBody | ParserState::InPrivateBody | ParserState::InMain => {
                return Err(TranspileError::UnterminatedBlock { line: self.line_no });
            }
            ParserState::None => {}
        }
        if !self.main_seen {
            return Err(TranspileError::MissingEntryPoint);
        }
        if self.stage == ShaderStage::Vertex && !self.usage.position_written {
            return Err(TranspileError::PositionNeverWritten);
        }

        Ok(ScanResult {
            stage: self.stage,
            tables: self.tables,
            stream: self.stream,
            main_body: self.main_body,
            usage: self.usage,
        })
    }

    // -----------------------------------------------------------------
    // State: None (top level)
    // -----------------------------------------------------------------

    fn top_level(&mut self, line: &str) -> Result<(), TranspileError> {
        let t = line.trim_start();
        let line_no = self.line_no;

        if let Some(rest) = t.strip_prefix('#') {
            let directive = rest.trim_start();
            if directive.starts_with("version") || directive.starts_with("extension") {
                return Err(TranspileError::Directive { line: line_no });
            }
            if directive.starts_with("define")
                || directive.starts_with("undef")
                || directive.starts_with("ifdef")
                || directive.starts_with("ifndef")
            {
                return Err(TranspileError::MacroDefinition { line: line_no });
            }
            return Err(TranspileError::UnableToProcess { line: line_no });
        }

        if t.starts_with("precision ") && t.ends_with(';') {
            return Ok(());
        }

        if let Some(args) = t.strip_prefix("void main") {
            // Only the literal entry header; `void mainPass(...)` falls
            // through to the private-function path below.
            if let Some(rest) = args.trim_start().strip_prefix('(') {
                let close = rest
                    .find(')')
                    .ok_or(TranspileError::UnableToProcess { line: line_no })?;
                let inner = rest[..close].trim();
                if !(inner.is_empty() || inner == "void") {
                    return Err(TranspileError::UnableToProcess { line: line_no });
                }
                if self.main_seen {
                    return Err(TranspileError::DuplicateEntryPoint { line: line_no });
                }
                let tail = rest[close + 1..].trim();
                self.brace_depth = match tail {
                    "{" => 1,
                    "" => 0,
                    _ => return Err(TranspileError::UnableToProcess { line: line_no }),
                };
                self.main_seen = true;
                self.state = ParserState::InMain;
                trace!(line = line_no, "entering entry function");
                return Ok(());
            }
        }

        if let Some(rest) = t.strip_prefix("struct ") {
            let Some(name) = rest.trim_end().strip_suffix('{') else {
                return Err(TranspileError::UnableToProcess { line: line_no });
            };
            let name = name.trim();
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(TranspileError::UnableToProcess { line: line_no });
            }
            self.tables.structs.push(name.to_string());
            self.stream.push_str(&format!("struct {name} {{\n"));
            self.state = ParserState::InStructBody;
            return Ok(());
        }

        if t.starts_with("uniform ") {
            return decl::parse_uniform(&mut self.tables, t, line_no);
        }
        if t.starts_with("layout") {
            return decl::parse_layout_decl(&mut self.tables, self.stage, t, line_no);
        }
        if let Some(rest) = t.strip_prefix("flat in ") {
            if self.stage == ShaderStage::Fragment {
                return decl::parse_varying(&mut self.tables, self.stage, rest, true, line_no);
            }
            return Err(TranspileError::UnableToProcess { line: line_no });
        }
        if let Some(rest) = t.strip_prefix("in ") {
            if self.stage == ShaderStage::Fragment {
                return decl::parse_varying(&mut self.tables, self.stage, rest, false, line_no);
            }
            // Vertex attributes need an explicit layout(location = N).
            return Err(TranspileError::UnableToProcess { line: line_no });
        }
        if let Some(rest) = t.strip_prefix("flat out ") {
            if self.stage == ShaderStage::Vertex {
                return decl::parse_varying(&mut self.tables, self.stage, rest, true, line_no);
            }
            return Err(TranspileError::UnableToProcess { line: line_no });
        }
        if let Some(rest) = t.strip_prefix("out ") {
            if self.stage == ShaderStage::Vertex {
                return decl::parse_varying(&mut self.tables, self.stage, rest, false, line_no);
            }
            // Fragment outputs need an explicit layout(location = N).
            return Err(TranspileError::UnableToProcess { line: line_no });
        }

        if self.looks_like_function_header(t) {
            self.sig_text = t.to_string();
            self.sig_line = line_no;
            let (open, close) = paren_balance(t);
            if open > 0 && open == close {
                return self.finish_signature();
            }
            self.state = ParserState::InPrivateSignature;
            return Ok(());
        }

        Err(TranspileError::UnableToProcess { line: line_no })
    }

    fn looks_like_function_header(&self, t: &str) -> bool {
        let Some((head, _)) = t.split_once('(') else {
            return false;
        };
        if head.contains('=') {
            return false;
        }
        let mut toks = head.split_whitespace();
        let (Some(ret), Some(name), None) = (toks.next(), toks.next(), toks.next()) else {
            return false;
        };
        let ret_ok = ret == "void" || ValueType::parse(ret).is_some() || self.tables.is_struct(ret);
        let name_ok = name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        ret_ok && name_ok
    }

    // -----------------------------------------------------------------
    // State: InStructBody
    // -----------------------------------------------------------------

    fn struct_body(&mut self, line: &str) -> Result<(), TranspileError> {
        if line.trim() == "};" {
            self.stream.push_str("};\n\n");
            self.state = ParserState::None;
            return Ok(());
        }
        scope::check_line(line, &self.tables, self.stage, &[], self.line_no)?;
        let ctx = LineCtx {
            dialect: self.dialect,
            stage: self.stage,
            tables: &self.tables,
            texture_params: &[],
            in_main: false,
            line: self.line_no,
        };
        let rewritten = rewrite::rewrite_line(line, &ctx, &mut self.usage)?;
        self.stream.push_str(&rewritten);
        self.stream.push('\n');
        Ok(())
    }

    // -----------------------------------------------------------------
    // State: InPrivateSignature / InPrivateBody
    // -----------------------------------------------------------------

    fn private_signature(&mut self, line: &str) -> Result<(), TranspileError> {
        self.sig_text.push(' ');
        self.sig_text.push_str(line.trim());
        let (open, close) = paren_balance(&self.sig_text);
        if open == close {
            return self.finish_signature();
        }
        Ok(())
    }

    /// Parse the accumulated signature text, emit the rewritten header, and
    /// record the parameter-name set for scope checks in the body.
    fn finish_signature(&mut self) -> Result<(), TranspileError> {
        let sig_line = self.sig_line;
        let text = std::mem::take(&mut self.sig_text);

        let open = text
            .find('(')
            .ok_or(TranspileError::UnableToProcess { line: sig_line })?;
        let close = text
            .rfind(')')
            .ok_or(TranspileError::UnableToProcess { line: sig_line })?;

        let mut head = text[..open].split_whitespace();
        let (Some(ret_tok), Some(fn_name), None) = (head.next(), head.next(), head.next()) else {
            return Err(TranspileError::UnableToProcess { line: sig_line });
        };
        let ret = if ret_tok == "void" || self.tables.is_struct(ret_tok) {
            ret_tok.to_string()
        } else {
            ValueType::parse(ret_tok)
                .ok_or_else(|| TranspileError::UnsupportedType {
                    line: sig_line,
                    ty: ret_tok.to_string(),
                })?
                .target_name()
        };

        let mut params_out: Vec<String> = Vec::new();
        self.fn_params.clear();
        self.fn_texture_params.clear();
        let params_src = text[open + 1..close].trim();
        if !params_src.is_empty() {
            for param in params_src.split(',') {
                let mut toks = param.split_whitespace();
                let (Some(ty_tok), Some(name), None) = (toks.next(), toks.next(), toks.next())
                else {
                    return Err(TranspileError::UnableToProcess { line: sig_line });
                };
                if name.contains('[') || ty_tok.contains('[') {
                    return Err(TranspileError::UnableToProcess { line: sig_line });
                }
                if decl::is_sampler_token(ty_tok) {
                    let ty = TextureType::parse(ty_tok).ok_or_else(|| {
                        TranspileError::UnsupportedTexture {
                            line: sig_line,
                            ty: ty_tok.to_string(),
                        }
                    })?;
                    // A texture parameter carries its sampler alongside.
                    match self.dialect {
                        Dialect::Msl => {
                            params_out.push(format!("{} {name}", ty.msl_name()));
                            params_out.push(format!("sampler {name}_smplr"));
                        }
                        Dialect::Hlsl => {
                            params_out.push(format!("{} {name}", ty.hlsl_name()));
                            params_out.push(format!("{} {name}_smplr", ty.hlsl_sampler()));
                        }
                    }
                    self.fn_texture_params.push(name.to_string());
                } else if self.tables.is_struct(ty_tok) {
                    params_out.push(format!("{ty_tok} {name}"));
                } else {
                    let ty = ValueType::parse(ty_tok).ok_or_else(|| {
                        TranspileError::UnsupportedType {
                            line: sig_line,
                            ty: ty_tok.to_string(),
                        }
                    })?;
                    params_out.push(format!("{} {name}", ty.target_name()));
                }
                self.fn_params.push(name.to_string());
            }
        }

        let prefix = match self.dialect {
            Dialect::Msl => "static ",
            Dialect::Hlsl => "",
        };
        self.stream
            .push_str(&format!("{prefix}{ret} {fn_name}({})", params_out.join(", ")));
        trace!(line = sig_line, function = fn_name, "private function signature complete");
        self.state = ParserState::InPrivateBody;

        let after = text[close + 1..].trim();
        if let Some(body) = after.strip_prefix('{') {
            self.stream.push_str(" {\n");
            self.brace_depth = 1;
            let body = body.trim();
            if !body.is_empty() {
                // One-line function: the rest of the line is body text.
                return self.private_body(body);
            }
        } else if after.is_empty() {
            // Opening brace arrives on a later line.
            self.stream.push('\n');
            self.brace_depth = 0;
        } else {
            return Err(TranspileError::UnableToProcess { line: sig_line });
        }
        Ok(())
    }

    fn private_body(&mut self, line: &str) -> Result<(), TranspileError> {
        let t = line.trim();
        if self.brace_depth == 0 {
            if t == "{" {
                self.brace_depth = 1;
                self.stream.push_str("{\n");
                return Ok(());
            }
            return Err(TranspileError::UnableToProcess { line: self.line_no });
        }

        scope::check_line(line, &self.tables, self.stage, &self.fn_params, self.line_no)?;

        let (open, close) = brace_net(line);
        let new_depth = (self.brace_depth + open).saturating_sub(close);
        let ctx = LineCtx {
            dialect: self.dialect,
            stage: self.stage,
            tables: &self.tables,
            texture_params: &self.fn_texture_params,
            in_main: false,
            line: self.line_no,
        };
        let rewritten = rewrite::rewrite_line(line, &ctx, &mut self.usage)?;
        self.stream.push_str(&rewritten);
        self.stream.push('\n');
        self.brace_depth = new_depth;
        if new_depth == 0 {
            self.stream.push('\n');
            self.state = ParserState::None;
            self.fn_params.clear();
            self.fn_texture_params.clear();
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // State: InMain
    // -----------------------------------------------------------------

    fn main_line(&mut self, line: &str) -> Result<(), TranspileError> {
        let t = line.trim();
        if self.brace_depth == 0 {
            if t == "{" {
                self.brace_depth = 1;
                return Ok(());
            }
            return Err(TranspileError::UnableToProcess { line: self.line_no });
        }

        if self.stage == ShaderStage::Vertex && line_assigns(line, "gl_Position") {
            self.usage.position_written = true;
        }

        let (open, close) = brace_net(line);
        let new_depth = (self.brace_depth + open).saturating_sub(close);
        if new_depth == 0 && t == "}" {
            self.brace_depth = 0;
            self.state = ParserState::None;
            trace!(line = self.line_no, "entry function complete");
            return Ok(());
        }

        let ctx = LineCtx {
            dialect: self.dialect,
            stage: self.stage,
            tables: &self.tables,
            texture_params: &self.fn_texture_params,
            in_main: true,
            line: self.line_no,
        };
        let mut rewritten = rewrite::rewrite_line(line, &ctx, &mut self.usage)?;
        if new_depth == 0 {
            // Body text shares a line with the closing brace; the wrapper
            // supplies its own.
            if let Some(stripped) = rewritten.trim_end().strip_suffix('}') {
                rewritten = stripped.trim_end().to_string();
            }
            self.state = ParserState::None;
        }
        if !rewritten.trim().is_empty() {
            self.main_body.push(rewritten);
        }
        self.brace_depth = new_depth;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_detection() {
        assert!(line_assigns("    gl_Position = vec4(p, 1.0);", "gl_Position"));
        assert!(line_assigns("gl_Position.xy = p;", "gl_Position"));
        assert!(line_assigns("gl_Position *= s;", "gl_Position"));
        assert!(!line_assigns("if (gl_Position == other) {", "gl_Position"));
        assert!(!line_assigns("vec4 q = gl_Position;", "gl_Position"));
    }

    #[test]
    fn comment_stripping() {
        assert_eq!(strip_comment("vec3 p; // position"), "vec3 p;");
        assert_eq!(strip_comment("  // only a comment"), "");
    }

    #[test]
    fn unbalanced_signature_is_fatal() {
        let src = "float helper(float a,\n";
        let err = Scanner::new(ShaderStage::Vertex, Dialect::Msl)
            .run(src)
            .unwrap_err();
        assert!(matches!(err, TranspileError::UnbalancedSignature { line: 1 }));
    }

    #[test]
    fn unknown_top_level_line_cites_its_number() {
        let src = "uniform float u_t;\nfloat x = 1.0;\n";
        let err = Scanner::new(ShaderStage::Vertex, Dialect::Msl)
            .run(src)
            .unwrap_err();
        assert!(matches!(err, TranspileError::UnableToProcess { line: 2 }));
    }

    #[test]
    fn missing_entry_point() {
        let src = "uniform float u_t;\n";
        let err = Scanner::new(ShaderStage::Fragment, Dialect::Msl)
            .run(src)
            .unwrap_err();
        assert!(matches!(err, TranspileError::MissingEntryPoint));
    }

    #[test]
    fn vertex_must_write_position() {
        let src = "void main() {\n    float x = 1.0;\n}\n";
        let err = Scanner::new(ShaderStage::Vertex, Dialect::Msl)
            .run(src)
            .unwrap_err();
        assert!(matches!(err, TranspileError::PositionNeverWritten));
    }

    #[test]
    fn multi_line_signature_balances() {
        let src = "\
float wave(float a,\n           float b)\n{\n    return a + b;\n}\nvoid main() {\n    gl_Position = vec4(wave(1.0, 2.0));\n}\n";
        let scan = Scanner::new(ShaderStage::Vertex, Dialect::Msl)
            .run(src)
            .unwrap();
        assert!(scan.stream.contains("static float wave(float a, float b)"));
        assert!(scan.usage.position_written);
    }
}
