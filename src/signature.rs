//! Minimal GLSL tokenizer and function-header parser.
//!
//! Only the subset needed to validate operator snippets is understood:
//! `<ReturnType> <name>(<qualifiers> <Type> <param>, ...) {`. Comments and
//! preprocessor lines are skipped, so commented-out braces never confuse the
//! header boundary.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token<'a> {
    Ident(&'a str),
    Number(&'a str),
    Punct(char),
}

impl Token<'_> {
    fn text(&self) -> String {
        match self {
            Token::Ident(s) | Token::Number(s) => (*s).to_string(),
            Token::Punct(c) => c.to_string(),
        }
    }
}

pub fn tokenize(source: &str) -> Vec<Token<'_>> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut line_start = true;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'\n' => {
                line_start = true;
                i += 1;
            }
            b' ' | b'\t' | b'\r' => i += 1,
            b'#' if line_start => {
                // Preprocessor directive: skip to end of line.
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    if bytes[i] == b'\n' {
                        line_start = true;
                    }
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
            }
            b if b.is_ascii_alphabetic() || b == b'_' => {
                line_start = false;
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                tokens.push(Token::Ident(&source[start..i]));
            }
            b if b.is_ascii_digit()
                || (b == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) =>
            {
                line_start = false;
                let start = i;
                while i < bytes.len() {
                    let c = bytes[i];
                    let exp_sign = (c == b'+' || c == b'-')
                        && matches!(bytes[i - 1], b'e' | b'E');
                    if c.is_ascii_alphanumeric() || c == b'.' || exp_sign {
                        i += 1;
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Number(&source[start..i]));
            }
            _ => {
                line_start = false;
                let ch = source[i..].chars().next().unwrap_or('\u{fffd}');
                tokens.push(Token::Punct(ch));
                i += ch.len_utf8().max(1);
            }
        }
    }

    tokens
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    pub qualifiers: Vec<String>,
    /// Declared type text, e.g. `vec3`.
    pub ty: String,
    pub name: Option<String>,
}

impl Param {
    /// `out`/`inout` parameters cannot receive a node's value.
    pub fn is_output(&self) -> bool {
        self.qualifiers.iter().any(|q| q == "out" || q == "inout")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionHeader {
    pub return_type: String,
    pub name: String,
    pub params: Vec<Param>,
}

const PARAM_QUALIFIERS: &[&str] = &[
    "in", "out", "inout", "const", "highp", "mediump", "lowp", "precise",
];

/// Locate the first function header in `code`: the token run before the first `{`.
pub fn parse_function_header(code: &str) -> Option<FunctionHeader> {
    let tokens = tokenize(code);
    let body_open = tokens.iter().position(|t| *t == Token::Punct('{'))?;
    let header = &tokens[..body_open];

    let close = header.len().checked_sub(1)?;
    if header[close] != Token::Punct(')') {
        return None;
    }

    let mut depth = 0i32;
    let mut open = None;
    for idx in (0..=close).rev() {
        match header[idx] {
            Token::Punct(')') => depth += 1,
            Token::Punct('(') => {
                depth -= 1;
                if depth == 0 {
                    open = Some(idx);
                    break;
                }
            }
            _ => {}
        }
    }
    let open = open?;

    let Token::Ident(name) = *header.get(open.checked_sub(1)?)? else {
        return None;
    };
    let Token::Ident(return_type) = *header.get(open.checked_sub(2)?)? else {
        return None;
    };

    let params = parse_params(&header[open + 1..close])?;

    Some(FunctionHeader {
        return_type: return_type.to_string(),
        name: name.to_string(),
        params,
    })
}

fn parse_params(tokens: &[Token<'_>]) -> Option<Vec<Param>> {
    if tokens.is_empty() || tokens == [Token::Ident("void")] {
        return Some(Vec::new());
    }

    let mut params = Vec::new();
    for chunk in tokens.split(|t| *t == Token::Punct(',')) {
        params.push(parse_param(chunk)?);
    }
    Some(params)
}

fn parse_param(tokens: &[Token<'_>]) -> Option<Param> {
    let mut qualifiers = Vec::new();
    let mut rest = tokens;
    while let Some((Token::Ident(word), tail)) = rest.split_first() {
        if !PARAM_QUALIFIERS.contains(word) {
            break;
        }
        qualifiers.push((*word).to_string());
        rest = tail;
    }

    match rest {
        [Token::Ident(ty)] => Some(Param {
            qualifiers,
            ty: (*ty).to_string(),
            name: None,
        }),
        [Token::Ident(ty), Token::Ident(name)] => Some(Param {
            qualifiers,
            ty: (*ty).to_string(),
            name: Some((*name).to_string()),
        }),
        [Token::Ident(_), ..] => {
            // Arrays and other exotic declarators: keep the full text so the
            // caller reports it as a type mismatch.
            Some(Param {
                qualifiers,
                ty: rest.iter().map(Token::text).collect::<String>(),
                name: None,
            })
        }
        _ => None,
    }
}
