//! Read-only guard applied before any SQL reaches the engine.

use crate::ExecutorError;
use regex::Regex;
use std::sync::OnceLock;

const FORBIDDEN: &[&str] = &[
    "DROP", "DELETE", "TRUNCATE", "ALTER", "CREATE", "INSERT", "UPDATE", "EXEC", "EXECUTE",
    "GRANT", "REVOKE", "ATTACH", "DETACH", "PRAGMA",
];

fn forbidden_keyword() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(r"(?i)\b({})\b", FORBIDDEN.join("|"));
        Regex::new(&pattern).expect("keyword pattern is valid")
    })
}

/// String literals and quoted identifiers, with doubled-quote escapes.
fn quoted() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"'(?:[^']|'')*'|"(?:[^"]|"")*"|`[^`]*`"#).expect("quote pattern is valid")
    })
}

/// Accept a single `SELECT`/`WITH` statement and return it without
/// surrounding whitespace or trailing semicolons.
pub fn ensure_read_only(sql: &str) -> Result<&str, ExecutorError> {
    let statement = sql.trim().trim_end_matches(';').trim_end();
    if statement.is_empty() {
        return Err(ExecutorError::Rejected("empty statement".into()));
    }

    let head = statement
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    if head != "SELECT" && head != "WITH" {
        return Err(ExecutorError::Rejected(
            "statement must start with SELECT or WITH".into(),
        ));
    }

    // Keywords and separators inside quotes are data, not SQL.
    let unquoted = quoted().replace_all(statement, "''");

    if let Some(found) = forbidden_keyword().find(&unquoted) {
        return Err(ExecutorError::Rejected(format!(
            "forbidden keyword {}",
            found.as_str().to_ascii_uppercase()
        )));
    }

    if unquoted.contains(';') {
        return Err(ExecutorError::Rejected("multiple statements".into()));
    }

    Ok(statement)
}
