/// Strip SQL comments from the input while preserving content inside string literals
/// and quoted identifiers.
/// Supported comment styles:
/// - Line comments starting with `--` until end of line
/// - Block comments delimited by `/* ... */`, nested to any depth
/// Newlines inside comments are preserved to keep line numbers stable; other
/// commented characters are removed. A doubled quote inside a literal is an escape,
/// not a terminator.
pub fn strip_sql_comments(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0usize;
    let mut quote: Option<char> = None;
    let mut block_depth: u32 = 0;
    let mut line_comment = false;

    while i < chars.len() {
        let ch = chars[i];
        let next = chars.get(i + 1).copied();

        if line_comment {
            if ch == '\n' {
                line_comment = false;
                out.push('\n');
            } else if ch == '\r' {
                out.push('\r');
            }
            i += 1;
            continue;
        }

        if block_depth > 0 {
            match (ch, next) {
                ('/', Some('*')) => { block_depth += 1; i += 2; }
                ('*', Some('/')) => { block_depth -= 1; i += 2; }
                ('\n' | '\r', _) => { out.push(ch); i += 1; }
                _ => { i += 1; }
            }
            continue;
        }

        if let Some(q) = quote {
            out.push(ch);
            if ch == q {
                if next == Some(q) {
                    out.push(q);
                    i += 2;
                    continue;
                }
                quote = None;
            }
            i += 1;
            continue;
        }

        match (ch, next) {
            ('\'' | '"', _) => { quote = Some(ch); out.push(ch); i += 1; }
            ('-', Some('-')) => { line_comment = true; i += 2; }
            ('/', Some('*')) => { block_depth = 1; i += 2; }
            _ => { out.push(ch); i += 1; }
        }
    }

    out
}
