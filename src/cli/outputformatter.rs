use terminal_size::{terminal_size, Height, Width};

use crate::validator::Field;

/// Row type as an ASCII table, one line per output column.
pub fn render_row_type(fields: &[Field], termw: usize) -> String {
    let cols = vec!["#".to_string(), "name".to_string(), "type".to_string(), "nullable".to_string()];
    let rows: Vec<Vec<String>> = fields
        .iter()
        .enumerate()
        .map(|(i, f)| vec![(i + 1).to_string(), f.name.clone(), f.ty.sql_type.to_string(), f.ty.nullable.to_string()])
        .collect();
    render_table(&cols, &rows, termw)
}

pub fn render_table(cols: &[String], rows: &[Vec<String>], termw: usize) -> String {
    let mut widths: Vec<usize> = cols.iter().map(|s| visible_len(s).min(termw)).collect();
    for r in rows {
        for (i, cell) in r.iter().enumerate().take(cols.len()) {
            let w = visible_len(cell);
            if w > widths[i] {
                widths[i] = w.min(termw);
            }
        }
    }

    let mut out = Vec::with_capacity(rows.len() + 5);
    let sep = build_separator(&widths);
    out.push(fit_line_to_width(&sep, termw));
    out.push(fit_line_to_width(&build_row(cols, &widths), termw));
    out.push(fit_line_to_width(&sep, termw));
    for r in rows {
        out.push(fit_line_to_width(&build_row(r, &widths), termw));
    }
    out.push(fit_line_to_width(&sep, termw));
    out.push(format!("cols: {}", rows.len()));
    out.join("\n")
}

pub fn get_terminal_width() -> usize {
    match terminal_size() {
        Some((Width(w), Height(_))) if w > 4 => (w - 4) as usize,
        _ => 80,
    }
}

fn build_separator(widths: &[usize]) -> String {
    let mut s = String::from("+");
    for w in widths {
        s.push_str(&"-".repeat(*w + 2));
        s.push('+');
    }
    s
}

fn build_row(cells: &[String], widths: &[usize]) -> String {
    let mut s = String::from("|");
    for (i, w) in widths.iter().enumerate() {
        let cell = cells.get(i).map(String::as_str).unwrap_or_default();
        let text = truncate(cell, *w);
        let pad = " ".repeat(w.saturating_sub(visible_len(&text)));
        s.push(' ');
        if is_numeric_like(cell) {
            s.push_str(&pad);
            s.push_str(&text);
        } else {
            s.push_str(&text);
            s.push_str(&pad);
        }
        s.push_str(" |");
    }
    s
}

fn truncate(s: &str, max: usize) -> String {
    if visible_len(s) <= max {
        return s.to_string();
    }
    if max <= 1 {
        return "…".to_string();
    }
    s.chars().take(max - 1).collect::<String>() + "…"
}

fn is_numeric_like(s: &str) -> bool {
    let st = s.trim();
    !st.is_empty() && st.chars().all(|c| c.is_ascii_digit())
}

fn visible_len(s: &str) -> usize {
    s.chars().count()
}

// Keep both ends of an overlong line
fn fit_line_to_width(s: &str, maxw: usize) -> String {
    let len = visible_len(s);
    if len <= maxw {
        return s.to_string();
    }
    if maxw <= 3 {
        return ".".repeat(maxw);
    }
    let budget = maxw - 3;
    let front = budget / 2;
    let back = budget - front;
    let head: String = s.chars().take(front).collect();
    let tail: String = s.chars().skip(len - back).collect();
    format!("{}...{}", head, tail)
}
