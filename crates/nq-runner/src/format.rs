//! Rendering of result rows for prompts: markdown table or single value.

use nq_core::message::ResultRow;
use nq_llm::prompts::ResultFormat;
use serde_json::Value;

/// Several rows, or one row with several columns.
pub fn should_use_table_format(rows: &[ResultRow]) -> bool {
    match rows {
        [] => false,
        [only] => only.len() > 1,
        _ => true,
    }
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "NULL".into(),
        Some(Value::String(s)) => s.replace('|', "\\|"),
        Some(other) => other.to_string().replace('|', "\\|"),
    }
}

/// Markdown table of the first `max_rows` rows, with a footer when truncated.
pub fn format_markdown_table(rows: &[ResultRow], max_rows: usize) -> String {
    let Some(first) = rows.first() else {
        return "No results found.".into();
    };
    let columns: Vec<&String> = first.keys().collect();

    let mut lines = Vec::with_capacity(rows.len().min(max_rows) + 3);
    lines.push(format!(
        "| {} |",
        columns.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(" | ")
    ));
    lines.push(format!("| {} |", vec!["---"; columns.len()].join(" | ")));

    for row in rows.iter().take(max_rows) {
        let values: Vec<String> = columns.iter().map(|c| cell(row.get(*c))).collect();
        lines.push(format!("| {} |", values.join(" | ")));
    }

    if rows.len() > max_rows {
        lines.push(format!("\n*Showing {max_rows} of {} total rows*", rows.len()));
    }
    lines.join("\n")
}

/// `**value**` for one column, `**col**: value, ...` for several.
pub fn format_single_value(rows: &[ResultRow]) -> String {
    let Some(first) = rows.first().filter(|r| !r.is_empty()) else {
        return "No result".into();
    };

    if first.len() == 1 {
        let value = first.values().next().map(plain).unwrap_or_default();
        return format!("**{value}**");
    }

    first
        .iter()
        .map(|(k, v)| format!("**{k}**: {}", plain(v)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn plain(value: &Value) -> String {
    match value {
        Value::Null => "NULL".into(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render once, picking the format from the shape of the rows.
pub fn format_results(rows: &[ResultRow], table_max_rows: usize) -> (String, ResultFormat) {
    if should_use_table_format(rows) {
        (format_markdown_table(rows, table_max_rows), ResultFormat::Table)
    } else if !rows.is_empty() {
        (format_single_value(rows), ResultFormat::Single)
    } else {
        ("No results".into(), ResultFormat::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(value: Value) -> Vec<ResultRow> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn one_cell_is_a_single_value() {
        let r = rows(json!([{"COUNT(*)": 3}]));
        assert!(!should_use_table_format(&r));
        assert_eq!(format_results(&r, 10), ("**3**".to_string(), ResultFormat::Single));
    }

    #[test]
    fn one_row_many_columns_is_a_table() {
        let r = rows(json!([{"Name": "Joe", "Age": 52}]));
        assert!(should_use_table_format(&r));
        let (text, format) = format_results(&r, 10);
        assert_eq!(format, ResultFormat::Table);
        assert_eq!(text, "| Name | Age |\n| --- | --- |\n| Joe | 52 |");
    }

    #[test]
    fn table_escapes_pipes_and_shows_nulls() {
        let r = rows(json!([{"a": "x|y", "b": null}, {"a": "z", "b": 1}]));
        let text = format_markdown_table(&r, 10);
        assert!(text.contains("| x\\|y | NULL |"));
    }

    #[test]
    fn table_notes_truncation() {
        let r = rows(json!([{"n": 1}, {"n": 2}, {"n": 3}]));
        let text = format_markdown_table(&r, 2);
        assert!(!text.contains("| 3 |"));
        assert!(text.ends_with("*Showing 2 of 3 total rows*"));
    }

    #[test]
    fn multi_column_single_value_lists_pairs() {
        let r = rows(json!([{"min": 1, "max": "b"}]));
        assert_eq!(format_single_value(&r), "**min**: 1, **max**: b");
    }

    #[test]
    fn no_rows_renders_empty() {
        assert_eq!(format_results(&[], 10), ("No results".to_string(), ResultFormat::Empty));
    }
}
