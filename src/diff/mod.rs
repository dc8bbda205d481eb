use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use crate::drift::ConstraintMatcher;

/// Splits a one-line `CREATE TABLE` into one definition per line so the
/// line diff lines up with the declared layout.
pub fn layout_ddl(sql: &str) -> String {
    if sql.contains('\n') {
        return sql.trim().to_string();
    }
    let Some(open) = sql.find('(') else {
        return sql.trim().to_string();
    };
    let Some(close) = sql.rfind(')') else {
        return sql.trim().to_string();
    };

    let mut parts = Vec::new();
    let mut depth = 0;
    let mut start = open + 1;
    for (i, ch) in sql[..close].char_indices().filter(|(i, _)| *i > open) {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(sql[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(sql[start..close].trim());

    format!(
        "{} (\n    {}\n{}",
        sql[..open].trim(),
        parts.join(",\n    "),
        sql[close..].trim()
    )
}

pub fn format_ddl_diff(live_sql: &str, declared_sql: &str) -> String {
    let live = layout_ddl(live_sql);
    let declared = layout_ddl(declared_sql);
    let diff = TextDiff::from_lines(&live, &declared);
    let mut output = String::new();

    output.push_str(&"───────────────────────────────────────\n".dimmed().to_string());

    for change in diff.iter_all_changes() {
        let line = change.to_string();
        let formatted = match change.tag() {
            ChangeTag::Delete => format!("- {}", line.trim_end()).red().to_string(),
            ChangeTag::Insert => format!("+ {}", line.trim_end()).green().to_string(),
            ChangeTag::Equal => format!("  {}", line.trim_end()).to_string(),
        };
        output.push_str(&formatted);
        output.push('\n');
    }

    output.push_str(&"───────────────────────────────────────".dimmed().to_string());

    output
}

/// Compares DDL ignoring case, whitespace and the `IF NOT EXISTS` clause.
pub fn has_changes(live_sql: &str, declared_sql: &str) -> bool {
    let matcher = ConstraintMatcher::new();
    let strip = |sql: &str| {
        matcher
            .normalize(sql)
            .replace(" if not exists", "")
            .replace("( ", "(")
            .replace(" )", ")")
    };
    strip(live_sql) != strip(declared_sql)
}
