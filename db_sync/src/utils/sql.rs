//! SQL text utilities
//!
//! Quoting for identifiers and literals embedded into generated MySQL
//! statements.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::schema::types::Value;

static NUMERIC_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d+(\.\d+)?([eE][-+]?\d+)?$").expect("valid numeric regex"));

static EXPRESSION_DEFAULT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(CURRENT_TIMESTAMP|CURRENT_DATE|CURRENT_TIME|NOW|LOCALTIME|LOCALTIMESTAMP)(\(\d*\))?$")
        .expect("valid expression regex")
});

static CHARACTER_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(char|varchar|tinytext|text|mediumtext|longtext|enum|set|json)\b")
        .expect("valid character type regex")
});

/// Quote an identifier with backticks, doubling embedded backticks
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote a string literal, escaping backslashes and single quotes
pub fn quote_str(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

/// Render a value as an inline SQL literal
///
/// Values are embedded into the statement text rather than bound. This is
/// only safe while the values come from a trusted read of the source
/// database.
pub fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Int(i) => i.to_string(),
        Value::UInt(u) => u.to_string(),
        Value::Float(x) if x.is_finite() => x.to_string(),
        Value::Float(x) => quote_str(&x.to_string()),
        Value::Text(s) => quote_str(s),
        Value::Bytes(b) => format!("X'{}'", hex::encode_upper(b)),
    }
}

/// Render a column default as it must appear after `DEFAULT`
///
/// MySQL reports defaults unquoted, so expressions and numbers pass through
/// as-is and everything else becomes a string literal. On character columns
/// only parenthesised expressions stay bare: `'007'` must not become `7`.
pub fn default_literal(data_type: &str, default: &str) -> String {
    let trimmed = default.trim();
    if CHARACTER_TYPE.is_match(data_type) {
        return if trimmed.starts_with('(') && trimmed.ends_with(')') {
            trimmed.to_string()
        } else {
            quote_str(default)
        };
    }

    if trimmed.eq_ignore_ascii_case("NULL")
        || NUMERIC_LITERAL.is_match(trimmed)
        || EXPRESSION_DEFAULT.is_match(trimmed)
        || (trimmed.starts_with('(') && trimmed.ends_with(')'))
        || trimmed.starts_with("b'")
    {
        trimmed.to_string()
    } else {
        quote_str(default)
    }
}

/// Join identifiers as a backtick-quoted, comma separated list
pub fn ident_list<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(|name| quote_ident(name.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Value::Null, "NULL")]
    #[case(Value::Bool(true), "1")]
    #[case(Value::Bool(false), "0")]
    #[case(Value::Int(-42), "-42")]
    #[case(Value::UInt(18446744073709551615), "18446744073709551615")]
    #[case(Value::Float(1.5), "1.5")]
    #[case(Value::from("Alice"), "'Alice'")]
    #[case(Value::from("O'Brien"), r"'O\'Brien'")]
    #[case(Value::from(r"C:\temp"), r"'C:\\temp'")]
    #[case(Value::Bytes(vec![0x00, 0xff, 0x1a]), "X'00FF1A'")]
    #[case(Value::Bytes(Vec::new()), "X''")]
    fn renders_literals(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(literal(&value), expected);
    }

    #[rstest]
    #[case("int", "0", "0")]
    #[case("decimal(5,2)", "-1.25", "-1.25")]
    #[case("timestamp", "CURRENT_TIMESTAMP", "CURRENT_TIMESTAMP")]
    #[case("datetime(3)", "current_timestamp(3)", "current_timestamp(3)")]
    #[case("int", "NULL", "NULL")]
    #[case("binary(16)", "(uuid_to_bin(uuid()))", "(uuid_to_bin(uuid()))")]
    #[case("date", "2024-01-01", "'2024-01-01'")]
    #[case("varchar(10)", "active", "'active'")]
    #[case("varchar(10)", "it's", r"'it\'s'")]
    #[case("varchar(10)", "", "''")]
    #[case("varchar(10)", "007", "'007'")]
    #[case("CHAR(3)", "1.50", "'1.50'")]
    #[case("enum('0','1')", "1", "'1'")]
    #[case("set('a','b')", "NULL", "'NULL'")]
    #[case("text", "CURRENT_TIMESTAMP", "'CURRENT_TIMESTAMP'")]
    #[case("json", "(json_array())", "(json_array())")]
    fn renders_defaults(#[case] data_type: &str, #[case] default: &str, #[case] expected: &str) {
        assert_eq!(default_literal(data_type, default), expected);
    }

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_ident("users"), "`users`");
        assert_eq!(quote_ident("we`ird"), "`we``ird`");
        assert_eq!(ident_list(&["id", "name"]), "`id`, `name`");
    }
}
