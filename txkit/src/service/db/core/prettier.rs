//! SQL rendering for logs
//!
//! Fills bound arguments into their placeholders to produce a readable
//! statement. Only used for log output; execution never sees it.

use crate::service::db::core::types::{PlaceholderFormat, QueryArg};

/// Renders `sql` with `args` substituted for its placeholders.
///
/// Whitespace runs collapse to a single space. A placeholder with no matching
/// argument is left as written.
pub fn pretty(sql: &str, placeholder: PlaceholderFormat, args: &[QueryArg]) -> String {
    let compact = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    if args.is_empty() {
        return compact;
    }

    let mut out = String::with_capacity(compact.len() + args.len() * 8);
    let mut chars = compact.chars().peekable();
    let mut next_question = 0usize;

    while let Some(c) = chars.next() {
        match (placeholder, c) {
            (PlaceholderFormat::Dollar, '$') => {
                let mut digits = String::new();
                while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                    digits.push(d);
                    chars.next();
                }

                match digits.parse::<usize>().ok().and_then(|n| n.checked_sub(1)) {
                    Some(idx) if idx < args.len() => out.push_str(&render_arg(&args[idx])),
                    _ => {
                        out.push('$');
                        out.push_str(&digits);
                    }
                }
            }
            (PlaceholderFormat::Question, '?') => {
                match args.get(next_question) {
                    Some(arg) => out.push_str(&render_arg(arg)),
                    None => out.push('?'),
                }
                next_question += 1;
            }
            _ => out.push(c),
        }
    }

    out
}

fn render_arg(arg: &QueryArg) -> String {
    match arg {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::String(s) => format!("{:?}", s),
        other => other.to_string(),
    }
}
