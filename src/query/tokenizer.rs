use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Keyword or identifier. Quoted words carry their unescaped content.
    Word { value: String, quoted: bool },
    Number(String),
    Str(String),
    Symbol(&'static str),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset into the tokenized text.
    pub offset: usize,
}

impl Token {
    pub fn is_keyword(&self, kw: &str) -> bool {
        matches!(&self.kind, TokenKind::Word { value, quoted: false } if value.eq_ignore_ascii_case(kw))
    }

    pub fn is_symbol(&self, sym: &str) -> bool {
        matches!(&self.kind, TokenKind::Symbol(s) if *s == sym)
    }

    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Word { value, quoted: true } => format!("\"{}\"", value),
            TokenKind::Word { value, .. } => value.clone(),
            TokenKind::Number(n) => n.clone(),
            TokenKind::Str(s) => format!("'{}'", s),
            TokenKind::Symbol(s) => s.to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

const SYMBOLS: &[&str] = &["<>", "!=", "<=", ">=", "||", ",", "(", ")", ".", "*", "+", "-", "/", "%", "=", "<", ">", ";"];

fn syntax_error(msg: String, offset: usize) -> AppError {
    AppError::syntax("syntax_error".to_string(), format!("{} at offset {}", msg, offset))
}

pub fn tokenize(sql: &str) -> AppResult<Vec<Token>> {
    let bytes = sql.as_bytes();
    let mut out = Vec::new();
    let mut i = 0usize;
    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        if c.is_ascii_alphabetic() || c == b'_' || c >= 0x80 {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'$' || bytes[i] >= 0x80) {
                i += 1;
            }
            out.push(Token { kind: TokenKind::Word { value: sql[start..i].to_string(), quoted: false }, offset: start });
            continue;
        }
        if c.is_ascii_digit() || (c == b'.' && bytes.get(i + 1).is_some_and(|b| b.is_ascii_digit())) {
            while i < bytes.len() && bytes[i].is_ascii_digit() { i += 1; }
            if i < bytes.len() && bytes[i] == b'.' {
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() { i += 1; }
            }
            if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                let mut j = i + 1;
                if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') { j += 1; }
                if j < bytes.len() && bytes[j].is_ascii_digit() {
                    i = j;
                    while i < bytes.len() && bytes[i].is_ascii_digit() { i += 1; }
                } else {
                    return Err(syntax_error("Malformed numeric literal".to_string(), start));
                }
            }
            out.push(Token { kind: TokenKind::Number(sql[start..i].to_string()), offset: start });
            continue;
        }
        if c == b'\'' || c == b'"' {
            let quote = c;
            let mut value = String::new();
            i += 1;
            let mut seg = i;
            loop {
                if i >= bytes.len() {
                    let what = if quote == b'\'' { "string literal" } else { "quoted identifier" };
                    return Err(syntax_error(format!("Unterminated {}", what), start));
                }
                if bytes[i] == quote {
                    value.push_str(&sql[seg..i]);
                    if bytes.get(i + 1) == Some(&quote) {
                        value.push(quote as char);
                        i += 2;
                        seg = i;
                        continue;
                    }
                    i += 1;
                    break;
                }
                i += 1;
            }
            let kind = if quote == b'\'' {
                TokenKind::Str(value)
            } else {
                if value.is_empty() {
                    return Err(syntax_error("Zero-length delimited identifier".to_string(), start));
                }
                TokenKind::Word { value, quoted: true }
            };
            out.push(Token { kind, offset: start });
            continue;
        }
        match SYMBOLS.iter().find(|s| sql[i..].starts_with(**s)) {
            Some(sym) => {
                i += sym.len();
                out.push(Token { kind: TokenKind::Symbol(*sym), offset: start });
            }
            None => {
                let ch = sql[i..].chars().next().unwrap_or('?');
                return Err(syntax_error(format!("Unexpected character '{}'", ch), start));
            }
        }
    }
    out.push(Token { kind: TokenKind::Eof, offset: sql.len() });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(sql: &str) -> Vec<TokenKind> {
        tokenize(sql).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn words_numbers_and_symbols() {
        let k = kinds("select e.ename, 1.5e3 from \"Emp\" e where x<>2");
        assert_eq!(k[0], TokenKind::Word { value: "select".into(), quoted: false });
        assert_eq!(k[2], TokenKind::Symbol("."));
        assert_eq!(k[5], TokenKind::Number("1.5e3".into()));
        assert_eq!(k[7], TokenKind::Word { value: "Emp".into(), quoted: true });
        assert!(k.contains(&TokenKind::Symbol("<>")));
        assert_eq!(*k.last().unwrap(), TokenKind::Eof);
    }

    #[test]
    fn escapes_inside_quotes() {
        let k = kinds("'it''s' \"a\"\"b\"");
        assert_eq!(k[0], TokenKind::Str("it's".into()));
        assert_eq!(k[1], TokenKind::Word { value: "a\"b".into(), quoted: true });
    }

    #[test]
    fn errors_carry_offsets() {
        let err = tokenize("select 'abc").unwrap_err();
        assert!(err.message().contains("offset 7"), "{}", err);
        let err = tokenize("select a ? b").unwrap_err();
        assert!(err.message().contains("'?'"));
        assert!(tokenize("select 1e+").is_err());
    }
}
