//! GLSL interface scanner used by the dummy backend in place of a compiler.
//!
//! Only top-level declarations are read: `in`/`attribute`, `out`/`varying` and
//! `uniform` variables with an optional `layout(location = N)` and array size.
//! Function bodies and interface blocks are skipped.

use crate::backend::ShaderStage;
use crate::layout::BaseType;

/// Storage class of a scanned declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Storage {
    In,
    Out,
    Uniform,
}

/// One interface variable of a shader stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Declaration {
    pub storage: Storage,
    pub name: String,
    pub base_type: BaseType,
    pub components: u8,
    pub array_size: u32,
    pub location: Option<u32>,
    pub line: usize,
}

impl Declaration {
    /// GLSL spelling of the declared type.
    pub fn type_name(&self) -> String {
        self.base_type.glsl_name(self.components)
    }

    /// Consecutive locations this variable occupies.
    pub fn slot_count(&self) -> u32 {
        let per_element = if self.components == 16 { 4 } else { 1 };
        per_element * self.array_size
    }
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    text: &'a str,
    line: usize,
}

/// Scan a stage's source, returning its interface declarations or a
/// compiler-style diagnostic.
pub(crate) fn scan(stage: ShaderStage, source: &str) -> Result<Vec<Declaration>, String> {
    let cleaned = strip_comments_and_directives(source);
    let tokens = tokenize(&cleaned);

    check_braces(&tokens)?;
    if !has_main(&tokens) {
        return Err("0:0(0): error: no function with name 'main'".to_string());
    }

    let mut declarations = Vec::new();
    let mut statement: Vec<Token<'_>> = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        match token.text {
            ";" => {
                scan_statement(stage, &statement, &mut declarations)?;
                statement.clear();
            }
            "{" => {
                let is_block = statement
                    .first()
                    .is_some_and(|t| matches!(t.text, "uniform" | "in" | "out" | "buffer"));
                i = skip_braces(&tokens, i);
                if is_block {
                    // Interface block: skip through the instance name.
                    while i < tokens.len() && tokens[i].text != ";" {
                        i += 1;
                    }
                }
                statement.clear();
            }
            _ => statement.push(token),
        }
        i += 1;
    }

    Ok(declarations)
}

fn scan_statement(
    stage: ShaderStage,
    statement: &[Token<'_>],
    out: &mut Vec<Declaration>,
) -> Result<(), String> {
    let Some(first) = statement.first() else {
        return Ok(());
    };
    let line = first.line;
    let mut rest = statement;

    let mut location = None;
    if first.text == "layout" {
        let close = rest
            .iter()
            .position(|t| t.text == ")")
            .ok_or_else(|| syntax_error(line, "unterminated layout qualifier"))?;
        let qualifier = &rest[..close];
        if let Some(pos) = qualifier.iter().position(|t| t.text == "location") {
            location = qualifier
                .get(pos + 2)
                .filter(|_| qualifier.get(pos + 1).is_some_and(|t| t.text == "="))
                .and_then(|t| t.text.parse::<u32>().ok());
            if location.is_none() {
                return Err(syntax_error(line, "malformed location qualifier"));
            }
        }
        rest = &rest[close + 1..];
    }

    let mut storage = None;
    while let Some(token) = rest.first() {
        match token.text {
            "in" => storage = Some(Storage::In),
            "out" => storage = Some(Storage::Out),
            "uniform" => storage = Some(Storage::Uniform),
            "attribute" => {
                if stage != ShaderStage::Vertex {
                    return Err(syntax_error(
                        token.line,
                        "'attribute' is only valid in the vertex shader",
                    ));
                }
                storage = Some(Storage::In);
            }
            "varying" => {
                storage = Some(match stage {
                    ShaderStage::Vertex => Storage::Out,
                    ShaderStage::Fragment => Storage::In,
                });
            }
            "const" => return Ok(()),
            "flat" | "smooth" | "noperspective" | "centroid" | "invariant" | "precise"
            | "highp" | "mediump" | "lowp" => {}
            _ => break,
        }
        rest = &rest[1..];
    }

    // Precision statements, globals and prototypes carry no interface.
    let Some(storage) = storage else {
        return Ok(());
    };

    let Some((type_token, mut rest)) = rest.split_first() else {
        return Err(syntax_error(line, "expected a type"));
    };
    let (base_type, components) = parse_type(type_token.text).ok_or_else(|| {
        format!(
            "0:{}(1): error: unsupported type `{}`",
            type_token.line, type_token.text
        )
    })?;

    loop {
        let Some((name, after_name)) = rest.split_first() else {
            return Err(syntax_error(type_token.line, "expected an identifier"));
        };
        if !is_identifier(name.text) {
            return Err(syntax_error(name.line, "expected an identifier"));
        }
        rest = after_name;

        let mut array_size = 1;
        if rest.first().is_some_and(|t| t.text == "[") {
            array_size = rest
                .get(1)
                .and_then(|t| t.text.parse::<u32>().ok())
                .filter(|&n| n > 0)
                .ok_or_else(|| syntax_error(name.line, "array size must be a positive constant"))?;
            if !rest.get(2).is_some_and(|t| t.text == "]") {
                return Err(syntax_error(name.line, "expected ']'"));
            }
            rest = &rest[3..];
        }

        out.push(Declaration {
            storage,
            name: name.text.to_string(),
            base_type,
            components,
            array_size,
            location,
            line: name.line,
        });

        match rest.split_first() {
            None => return Ok(()),
            Some((comma, after)) if comma.text == "," => {
                // Explicit locations apply to a single declarator.
                location = None;
                rest = after;
            }
            Some((other, _)) => {
                return Err(syntax_error(
                    other.line,
                    &format!("unexpected `{}`", other.text),
                ));
            }
        }
    }
}

fn parse_type(name: &str) -> Option<(BaseType, u8)> {
    if name.starts_with("sampler") || name.starts_with("isampler") || name.starts_with("usampler")
    {
        return Some((BaseType::Sampler, 1));
    }
    let (base, prefix) = match name.as_bytes().first()? {
        b'i' if name.starts_with("ivec") => (BaseType::Int, "ivec"),
        b'u' if name.starts_with("uvec") => (BaseType::UInt, "uvec"),
        b'd' if name.starts_with("dvec") => (BaseType::Double, "dvec"),
        b'b' if name.starts_with("bvec") => (BaseType::Bool, "bvec"),
        b'v' if name.starts_with("vec") => (BaseType::Float, "vec"),
        _ => {
            return match name {
                "float" => Some((BaseType::Float, 1)),
                "double" => Some((BaseType::Double, 1)),
                "int" => Some((BaseType::Int, 1)),
                "uint" => Some((BaseType::UInt, 1)),
                "bool" => Some((BaseType::Bool, 1)),
                "mat4" => Some((BaseType::Float, 16)),
                "dmat4" => Some((BaseType::Double, 16)),
                _ => None,
            };
        }
    };
    match &name[prefix.len()..] {
        "2" => Some((base, 2)),
        "3" => Some((base, 3)),
        "4" => Some((base, 4)),
        _ => None,
    }
}

fn syntax_error(line: usize, message: &str) -> String {
    format!("0:{line}(1): error: syntax error, {message}")
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Blank out comments and preprocessor lines, keeping line breaks.
fn strip_comments_and_directives(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut line_start = true;
    while let Some(c) = chars.next() {
        match c {
            '/' if chars.peek() == Some(&'/') => {
                while chars.peek().is_some_and(|&c| c != '\n') {
                    chars.next();
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = ' ';
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                    }
                    if previous == '*' && c == '/' {
                        break;
                    }
                    previous = c;
                }
                out.push(' ');
            }
            '#' if line_start => {
                while chars.peek().is_some_and(|&c| c != '\n') {
                    chars.next();
                }
            }
            _ => out.push(c),
        }
        if c == '\n' {
            line_start = true;
        } else if !c.is_whitespace() {
            line_start = false;
        }
    }
    out
}

fn tokenize(source: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut line = 1;
    let bytes = source.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c == b'\n' {
            line += 1;
            i += 1;
        } else if c.is_ascii_whitespace() {
            i += 1;
        } else if c.is_ascii_alphanumeric() || c == b'_' {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'.') {
                // Dots only continue numeric literals.
                if bytes[i] == b'.' && !bytes[start].is_ascii_digit() {
                    break;
                }
                i += 1;
            }
            tokens.push(Token {
                text: &source[start..i],
                line,
            });
        } else {
            let width = source[i..].chars().next().map_or(1, char::len_utf8);
            tokens.push(Token {
                text: &source[i..i + width],
                line,
            });
            i += width;
        }
    }
    tokens
}

fn check_braces(tokens: &[Token<'_>]) -> Result<(), String> {
    let mut depth = 0usize;
    let mut last_line = 0;
    for token in tokens {
        last_line = token.line;
        match token.text {
            "{" => depth += 1,
            "}" => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| syntax_error(token.line, "unexpected '}'"))?;
            }
            _ => {}
        }
    }
    if depth == 0 {
        Ok(())
    } else {
        Err(syntax_error(last_line, "unexpected end of file, expected '}'"))
    }
}

fn has_main(tokens: &[Token<'_>]) -> bool {
    tokens
        .windows(3)
        .any(|w| w[0].text == "void" && w[1].text == "main" && w[2].text == "(")
}

/// Return the index of the `}` matching the `{` at `open`.
fn skip_braces(tokens: &[Token<'_>], open: usize) -> usize {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        match token.text {
            "{" => depth += 1,
            "}" => {
                depth -= 1;
                if depth == 0 {
                    return i;
                }
            }
            _ => {}
        }
    }
    tokens.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = r#"
        #version 330 core
        layout(location = 0) in vec3 pos;
        in mat4 model; // per instance
        in vec4 vColor;
        /* camera
           matrices */
        uniform mat4 view, proj;
        uniform float weights[4];
        out vec4 fColor;

        void main() {
            fColor = vColor;
            gl_Position = proj * view * model * vec4(pos, 1.0);
        }
    "#;

    #[test]
    fn test_scan_vertex_interface() {
        let decls = scan(ShaderStage::Vertex, VERTEX).unwrap();
        let names: Vec<_> = decls.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            ["pos", "model", "vColor", "view", "proj", "weights", "fColor"]
        );

        assert_eq!(decls[0].location, Some(0));
        assert_eq!(decls[0].components, 3);
        assert_eq!(decls[1].components, 16);
        assert_eq!(decls[1].slot_count(), 4);
        assert_eq!(decls[3].storage, Storage::Uniform);
        assert_eq!(decls[4].type_name(), "mat4");
        assert_eq!(decls[5].array_size, 4);
        assert_eq!(decls[6].storage, Storage::Out);
    }

    #[test]
    fn test_legacy_qualifiers() {
        let src = "attribute vec2 a; varying vec3 v; void main() {}";
        let decls = scan(ShaderStage::Vertex, src).unwrap();
        assert_eq!(decls[0].storage, Storage::In);
        assert_eq!(decls[1].storage, Storage::Out);

        let decls = scan(ShaderStage::Fragment, "varying vec3 v; void main() {}").unwrap();
        assert_eq!(decls[0].storage, Storage::In);
    }

    #[test]
    fn test_interface_blocks_and_precision_skipped() {
        let src = r#"
            precision mediump float;
            uniform Lights { vec4 color; } lights;
            const float k = 1.0;
            out vec4 color;
            void main() { color = vec4(k); }
        "#;
        let decls = scan(ShaderStage::Fragment, src).unwrap();
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].name, "color");
    }

    #[test]
    fn test_missing_main() {
        let err = scan(ShaderStage::Vertex, "in vec3 pos;").unwrap_err();
        assert!(err.contains("main"));
    }

    #[test]
    fn test_unbalanced_braces() {
        let err = scan(ShaderStage::Vertex, "void main() {").unwrap_err();
        assert!(err.contains("error"));
    }

    #[test]
    fn test_unknown_type_reports_line() {
        let src = "\n\nin quat q;\nvoid main() {}";
        let err = scan(ShaderStage::Vertex, src).unwrap_err();
        assert!(err.starts_with("0:3"));
        assert!(err.contains("quat"));
    }

    #[test]
    fn test_sampler_and_integer_types() {
        let src = "uniform sampler2D tex; in uvec2 ids; in ivec4 bones; void main() {}";
        let decls = scan(ShaderStage::Vertex, src).unwrap();
        assert_eq!(decls[0].base_type, BaseType::Sampler);
        assert_eq!(decls[1].base_type, BaseType::UInt);
        assert_eq!(decls[2].components, 4);
    }
}
