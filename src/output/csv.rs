//! Minimal CSV writing and parsing.
//!
//! Fields containing the separator, a quote, or a newline are quoted with
//! embedded quotes doubled. The parser tolerates quoted fields and CRLF
//! line endings; it exists so our own files round-trip in tests and in the
//! downstream import tooling.

/// Field delimiter for the flat output file.
pub const FIELD_SEP: char = ',';

fn needs_quotes(field: &str) -> bool {
    field.contains(FIELD_SEP)
        || field.contains('"')
        || field.contains('\n')
        || field.contains('\r')
}

/// Append one row (with trailing newline) to `out`.
pub fn write_row(out: &mut String, row: &[String]) {
    let mut first = true;
    for field in row {
        if !first {
            out.push(FIELD_SEP);
        }
        first = false;
        if needs_quotes(field) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push('\n');
}

/// Parse CSV text back into rows. Unterminated quotes are flushed rather
/// than dropped.
pub fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                } else {
                    in_quotes = true;
                }
            }
            c if c == FIELD_SEP && !in_quotes => {
                row.push(std::mem::take(&mut field));
            }
            '\r' | '\n' if !in_quotes => {
                if ch == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                row.push(std::mem::take(&mut field));
                if !(row.len() == 1 && row[0].is_empty()) {
                    rows.push(std::mem::take(&mut row));
                } else {
                    row.clear();
                }
            }
            _ => field.push(ch),
        }
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    rows
}
