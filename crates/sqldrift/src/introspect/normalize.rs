//! Type, default, and literal normalization.
//!
//! Live databases report the same logical type and default under many
//! spellings (aliases, display widths, bracketed defaults, trailing
//! casts). Everything read by the introspector passes through here so
//! that semantically identical inputs compare equal across dumps.

use crate::core::catalog::Dialect;

/// A column type split into its canonical name and up to two arguments,
/// plus a suffix (`[]` for Postgres arrays, ` UNSIGNED` for MySQL).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedType {
    pub name: String,
    pub arg1: String,
    pub arg2: String,
    pub suffix: String,
}

impl NormalizedType {
    /// Re-render the full type string, e.g. `NUMERIC(10,2) UNSIGNED`.
    pub fn rendered(&self) -> String {
        let mut out = self.name.clone();
        if !self.arg1.is_empty() {
            out.push('(');
            out.push_str(&self.arg1);
            if !self.arg2.is_empty() {
                out.push(',');
                out.push_str(&self.arg2);
            }
            out.push(')');
        }
        out.push_str(&self.suffix);
        out
    }
}

/// Canonicalize a column type for a dialect.
///
/// SQLite types are returned uppercased but otherwise unchanged (SQLite
/// does not normalize type names itself). The other dialects collapse
/// their aliases: `integer` becomes `INT` everywhere, Postgres serials
/// map onto their base integer types, MySQL drops deprecated integer
/// display widths, SQL Server expands ANSI long forms.
pub fn normalize_column_type(dialect: Dialect, raw: &str) -> NormalizedType {
    let mut upper = raw.trim().to_uppercase();

    match dialect {
        Dialect::Sqlite => {
            let (name, arg1, arg2) = split_type_args(&upper);
            NormalizedType {
                name,
                arg1,
                arg2,
                suffix: String::new(),
            }
        }
        Dialect::Postgres => {
            // Array suffix is detected before normalization and
            // reattached after.
            let mut suffix = String::new();
            if let Some(base) = upper.strip_suffix("[]") {
                suffix = "[]".to_string();
                upper = base.trim_end().to_string();
            }

            // The time-zone phrase can appear before or after the type
            // arguments; strip it either way and fold it into the name.
            let mut with_tz = false;
            if let Some(stripped) = strip_phrase(&upper, " WITH TIME ZONE") {
                with_tz = true;
                upper = stripped;
            } else if let Some(stripped) = strip_phrase(&upper, " WITHOUT TIME ZONE") {
                upper = stripped;
            }

            let (mut name, arg1, arg2) = split_type_args(&upper);
            name = match name.as_str() {
                "INTEGER" | "SERIAL" | "SERIAL4" | "INT4" => "INT".to_string(),
                "BIGSERIAL" | "SERIAL8" | "INT8" => "BIGINT".to_string(),
                "SMALLSERIAL" | "SERIAL2" | "INT2" => "SMALLINT".to_string(),
                "DECIMAL" => "NUMERIC".to_string(),
                "FLOAT4" => "REAL".to_string(),
                "FLOAT8" => "DOUBLE PRECISION".to_string(),
                "CHARACTER VARYING" => "VARCHAR".to_string(),
                "CHARACTER" => "CHAR".to_string(),
                "BIT VARYING" => "VARBIT".to_string(),
                "BOOL" => "BOOLEAN".to_string(),
                _ => name,
            };
            if with_tz {
                name = match name.as_str() {
                    "TIMESTAMP" => "TIMESTAMPTZ".to_string(),
                    "TIME" => "TIMETZ".to_string(),
                    other => other.to_string(),
                };
            }
            NormalizedType {
                name,
                arg1,
                arg2,
                suffix,
            }
        }
        Dialect::Mysql => {
            // SIGNED is the default and is dropped; UNSIGNED is
            // reattached after normalization.
            let mut unsigned = false;
            if let Some(base) = upper.strip_suffix(" UNSIGNED") {
                unsigned = true;
                upper = base.trim_end().to_string();
            } else if let Some(base) = upper.strip_suffix(" SIGNED") {
                upper = base.trim_end().to_string();
            }

            let (mut name, mut arg1, mut arg2) = split_type_args(&upper);
            match name.as_str() {
                "INTEGER" => name = "INT".to_string(),
                "DEC" | "DECIMAL" => name = "NUMERIC".to_string(),
                "BOOL" | "BOOLEAN" => {
                    name = "TINYINT".to_string();
                    arg1 = "1".to_string();
                    arg2 = String::new();
                }
                _ => {}
            }
            // Integer display widths are deprecated and dropped for
            // matching; TINYINT keeps its width because TINYINT(1) is
            // the boolean spelling.
            if matches!(name.as_str(), "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT") {
                arg1 = String::new();
                arg2 = String::new();
            }
            NormalizedType {
                name,
                arg1,
                arg2,
                suffix: if unsigned {
                    " UNSIGNED".to_string()
                } else {
                    String::new()
                },
            }
        }
        Dialect::Sqlserver => {
            let (mut name, arg1, arg2) = split_type_args(&upper);
            name = match name.as_str() {
                "BINARY VARYING" => "VARBINARY".to_string(),
                "INTEGER" => "INT".to_string(),
                "NATIONAL CHARACTER VARYING" | "NATIONAL CHAR VARYING" => "NVARCHAR".to_string(),
                "NATIONAL CHARACTER" | "NATIONAL CHAR" => "NCHAR".to_string(),
                "CHARACTER VARYING" | "CHAR VARYING" => "VARCHAR".to_string(),
                "CHARACTER" => "CHAR".to_string(),
                "DEC" | "DECIMAL" => "NUMERIC".to_string(),
                _ => name,
            };
            NormalizedType {
                name,
                arg1,
                arg2,
                suffix: String::new(),
            }
        }
    }
}

/// Remove `phrase` from `s` wherever it appears, collapsing the gap.
fn strip_phrase(s: &str, phrase: &str) -> Option<String> {
    s.find(phrase)
        .map(|at| format!("{}{}", &s[..at], &s[at + phrase.len()..]).trim().to_string())
}

/// Split `type(a[,b])` syntax into `(name, arg1, arg2)`. Arguments with
/// more than two comma-separated parts (MySQL ENUM labels) are kept
/// whole in `arg1`.
pub fn split_type_args(raw: &str) -> (String, String, String) {
    let Some(open) = raw.find('(') else {
        return (raw.trim().to_string(), String::new(), String::new());
    };
    let Some(close) = raw.rfind(')') else {
        return (raw.trim().to_string(), String::new(), String::new());
    };
    if close < open {
        return (raw.trim().to_string(), String::new(), String::new());
    }

    // The name can continue after the argument list ("NUMERIC(10,2)
    // UNSIGNED" is handled by the caller; "TIMESTAMP(3) ..." is not).
    let name = format!("{}{}", raw[..open].trim_end(), &raw[close + 1..]);
    let inner = &raw[open + 1..close];
    let parts = split_args(inner);
    match parts.len() {
        0 => (name.trim().to_string(), String::new(), String::new()),
        1 => (
            name.trim().to_string(),
            parts[0].trim().to_string(),
            String::new(),
        ),
        2 => (
            name.trim().to_string(),
            parts[0].trim().to_string(),
            parts[1].trim().to_string(),
        ),
        _ => (
            name.trim().to_string(),
            inner.trim().to_string(),
            String::new(),
        ),
    }
}

/// Canonicalize a column default.
///
/// `1`/`TRUE` map to `'1'` and `0`/`FALSE` to `'0'`; every dialect's
/// spelling of "current timestamp" collapses to `CURRENT_TIMESTAMP`;
/// SQL Server's bracketing and `N''` prefixes are unwrapped; Postgres
/// trailing casts are stripped. Non-literal expressions are wrapped in
/// parentheses for the dialects whose DDL requires it.
pub fn normalize_column_default(dialect: Dialect, raw: &str) -> String {
    let mut s = raw.trim().to_string();
    if s.is_empty() {
        return s;
    }

    if dialect == Dialect::Sqlserver {
        s = strip_outer_parens(&s);
        if let Some(body) = s.strip_prefix("N'").or_else(|| s.strip_prefix("n'")) {
            s = format!("'{}", body);
        }
    }

    if dialect == Dialect::Postgres {
        s = strip_trailing_cast(&s);
    }

    if is_current_timestamp(&s) {
        return "CURRENT_TIMESTAMP".to_string();
    }

    match s.to_uppercase().as_str() {
        "1" | "TRUE" => return "'1'".to_string(),
        "0" | "FALSE" => return "'0'".to_string(),
        _ => {}
    }

    if is_literal(&s) {
        return s;
    }

    // Expression defaults are stored parenthesized where the dialect's
    // DDL wants them that way.
    match dialect {
        Dialect::Sqlserver | Dialect::Mysql if !s.starts_with('(') => format!("({})", s),
        _ => s,
    }
}

/// Strip balanced outer parentheses, repeatedly: `((42))` becomes `42`.
fn strip_outer_parens(s: &str) -> String {
    let mut out = s.trim();
    while out.starts_with('(') && out.ends_with(')') && wraps_whole(out) {
        out = out[1..out.len() - 1].trim();
    }
    out.to_string()
}

/// Whether the opening paren at position 0 matches the closing paren at
/// the end (rather than closing earlier, as in `(a),(b)`).
fn wraps_whole(s: &str) -> bool {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return i == s.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

/// Strip a trailing `::type` cast (outside quotes): `'hello'::text`
/// becomes `'hello'`.
fn strip_trailing_cast(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut in_quote = false;
    let mut cast_at = None;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => in_quote = !in_quote,
            b':' if !in_quote && i + 1 < bytes.len() && bytes[i + 1] == b':' => {
                cast_at = Some(i);
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    let Some(at) = cast_at else {
        return s.to_string();
    };
    // Only strip when the remainder looks like a type name.
    let tail = &s[at + 2..];
    let is_type = !tail.is_empty()
        && tail.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '[' | ']' | '"' | '(' | ')')
        });
    if is_type {
        s[..at].to_string()
    } else {
        s.to_string()
    }
}

/// Recognize each dialect's flavors of "current timestamp".
fn is_current_timestamp(s: &str) -> bool {
    let upper = s.trim().to_uppercase();
    matches!(
        upper.as_str(),
        "CURRENT_TIMESTAMP"
            | "CURRENT_TIMESTAMP()"
            | "NOW()"
            | "GETDATE()"
            | "SYSDATETIME()"
            | "DATETIME('NOW')"
    ) || upper.starts_with("CURRENT_TIMESTAMP(")
}

/// Whether a default is a literal (string, well-known keyword, integer,
/// or float) rather than an expression.
pub fn is_literal(s: &str) -> bool {
    let s = s.trim();
    if s.is_empty() {
        return false;
    }
    if is_quoted_string(s) {
        return true;
    }
    let upper = s.to_uppercase();
    if matches!(upper.as_str(), "TRUE" | "FALSE" | "NULL") || upper.starts_with("CURRENT_") {
        // CURRENT_TIMESTAMP(6) is still a keyword form; current_x() is not.
        return !upper.contains("()");
    }
    is_integer_literal(s) || is_float_literal(s)
}

/// A single-quoted string with internal quotes doubled.
fn is_quoted_string(s: &str) -> bool {
    if s.len() < 2 || !s.starts_with('\'') || !s.ends_with('\'') {
        return false;
    }
    let interior: Vec<char> = s[1..s.len() - 1].chars().collect();
    let mut i = 0;
    while i < interior.len() {
        if interior[i] == '\'' {
            if i + 1 < interior.len() && interior[i + 1] == '\'' {
                i += 2;
                continue;
            }
            return false;
        }
        i += 1;
    }
    true
}

fn is_integer_literal(s: &str) -> bool {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn is_float_literal(s: &str) -> bool {
    let body = s.strip_prefix(['+', '-']).unwrap_or(s);
    let (mantissa, exponent) = match body.split_once(['e', 'E']) {
        Some((m, e)) => (m, Some(e)),
        None => (body, None),
    };
    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (mantissa, None),
    };
    let has_digits = !int_part.is_empty() || frac_part.is_some_and(|f| !f.is_empty());
    if !has_digits
        || !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.unwrap_or("").chars().all(|c| c.is_ascii_digit())
    {
        return false;
    }
    match exponent {
        Some(e) => {
            let e = e.strip_prefix(['+', '-']).unwrap_or(e);
            !e.is_empty() && e.chars().all(|c| c.is_ascii_digit())
        }
        None => frac_part.is_some(),
    }
}

/// Split a comma-separated argument string without splitting inside
/// parentheses, square brackets, or single-quoted strings (with doubled
/// quote escapes). Whitespace is preserved.
pub fn split_args(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut paren_depth = 0usize;
    let mut bracket_depth = 0usize;
    let mut in_quote = false;

    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if in_quote {
            current.push(c);
            if c == '\'' {
                if i + 1 < chars.len() && chars[i + 1] == '\'' {
                    current.push(chars[i + 1]);
                    i += 2;
                    continue;
                }
                in_quote = false;
            }
            i += 1;
            continue;
        }
        match c {
            '\'' => {
                in_quote = true;
                current.push(c);
            }
            '(' => {
                paren_depth += 1;
                current.push(c);
            }
            ')' => {
                paren_depth = paren_depth.saturating_sub(1);
                current.push(c);
            }
            '[' => {
                bracket_depth += 1;
                current.push(c);
            }
            ']' => {
                bracket_depth = bracket_depth.saturating_sub(1);
                current.push(c);
            }
            ',' if paren_depth == 0 && bracket_depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
        i += 1;
    }
    if !current.is_empty() || !parts.is_empty() || !s.is_empty() {
        parts.push(current);
    }
    parts
}

/// Parse a server version string into its ordered numeric components:
/// `"8.0.36-log"` becomes `[8, 0, 36]`.
pub fn parse_version_nums(version: &str) -> Vec<i64> {
    let start = match version.find(|c: char| c.is_ascii_digit()) {
        Some(i) => i,
        None => return Vec::new(),
    };
    let mut nums = Vec::new();
    let mut current = String::new();
    for c in version[start..].chars() {
        if c.is_ascii_digit() {
            current.push(c);
        } else if c == '.' && !current.is_empty() {
            nums.push(current.parse::<i64>().unwrap_or(0));
            current.clear();
        } else {
            break;
        }
    }
    if !current.is_empty() {
        nums.push(current.parse::<i64>().unwrap_or(0));
    }
    nums
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_normalizes_per_dialect() {
        for dialect in [Dialect::Postgres, Dialect::Mysql, Dialect::Sqlserver] {
            assert_eq!(normalize_column_type(dialect, "integer").rendered(), "INT");
        }
        assert_eq!(
            normalize_column_type(Dialect::Sqlite, "integer").rendered(),
            "INTEGER"
        );
    }

    #[test]
    fn test_postgres_aliases() {
        let cases = [
            ("serial", "INT"),
            ("serial8", "BIGINT"),
            ("int4", "INT"),
            ("int8", "BIGINT"),
            ("int2", "SMALLINT"),
            ("decimal(10,2)", "NUMERIC(10,2)"),
            ("float4", "REAL"),
            ("float8", "DOUBLE PRECISION"),
            ("character varying(255)", "VARCHAR(255)"),
            ("character(8)", "CHAR(8)"),
            ("bit varying(4)", "VARBIT(4)"),
            ("bool", "BOOLEAN"),
            ("timestamp with time zone", "TIMESTAMPTZ"),
            ("timestamp(3) with time zone", "TIMESTAMPTZ(3)"),
            ("timestamp without time zone", "TIMESTAMP"),
            ("time with time zone", "TIMETZ"),
        ];
        for (input, want) in cases {
            assert_eq!(
                normalize_column_type(Dialect::Postgres, input).rendered(),
                want,
                "input {:?}",
                input
            );
        }
    }

    #[test]
    fn test_postgres_array_suffix_reattached() {
        assert_eq!(
            normalize_column_type(Dialect::Postgres, "double precision[]").rendered(),
            "DOUBLE PRECISION[]"
        );
        assert_eq!(
            normalize_column_type(Dialect::Postgres, "int4[]").rendered(),
            "INT[]"
        );
    }

    #[test]
    fn test_mysql_aliases_and_widths() {
        let cases = [
            ("int(11)", "INT"),
            ("bigint(20) unsigned", "BIGINT UNSIGNED"),
            ("smallint(6)", "SMALLINT"),
            ("mediumint(9)", "MEDIUMINT"),
            ("tinyint(1)", "TINYINT(1)"),
            ("bool", "TINYINT(1)"),
            ("boolean", "TINYINT(1)"),
            ("dec(8,2)", "NUMERIC(8,2)"),
            ("decimal(8,2) unsigned", "NUMERIC(8,2) UNSIGNED"),
            ("int signed", "INT"),
        ];
        for (input, want) in cases {
            assert_eq!(
                normalize_column_type(Dialect::Mysql, input).rendered(),
                want,
                "input {:?}",
                input
            );
        }
    }

    #[test]
    fn test_sqlserver_aliases() {
        let cases = [
            ("binary varying(16)", "VARBINARY(16)"),
            ("national character varying(50)", "NVARCHAR(50)"),
            ("national character(4)", "NCHAR(4)"),
            ("character(4)", "CHAR(4)"),
            ("dec(9,3)", "NUMERIC(9,3)"),
            ("nvarchar(MAX)", "NVARCHAR(MAX)"),
        ];
        for (input, want) in cases {
            assert_eq!(
                normalize_column_type(Dialect::Sqlserver, input).rendered(),
                want,
                "input {:?}",
                input
            );
        }
    }

    #[test]
    fn test_split_type_args() {
        assert_eq!(
            split_type_args("NUMERIC(10,2)"),
            ("NUMERIC".to_string(), "10".to_string(), "2".to_string())
        );
        assert_eq!(
            split_type_args("VARCHAR(MAX)"),
            ("VARCHAR".to_string(), "MAX".to_string(), String::new())
        );
        assert_eq!(
            split_type_args("TEXT"),
            ("TEXT".to_string(), String::new(), String::new())
        );
        // ENUM labels stay whole.
        assert_eq!(
            split_type_args("ENUM('A','B','C')"),
            ("ENUM".to_string(), "'A','B','C'".to_string(), String::new())
        );
    }

    #[test]
    fn test_default_bool_and_int_mapping() {
        for dialect in Dialect::all() {
            assert_eq!(normalize_column_default(dialect, "TRUE"), "'1'");
            assert_eq!(normalize_column_default(dialect, "FALSE"), "'0'");
            assert_eq!(normalize_column_default(dialect, "1"), "'1'");
            assert_eq!(normalize_column_default(dialect, "0"), "'0'");
        }
    }

    #[test]
    fn test_default_current_timestamp_flavors() {
        assert_eq!(
            normalize_column_default(Dialect::Postgres, "now()"),
            "CURRENT_TIMESTAMP"
        );
        assert_eq!(
            normalize_column_default(Dialect::Sqlserver, "((getdate()))"),
            "CURRENT_TIMESTAMP"
        );
        assert_eq!(
            normalize_column_default(Dialect::Sqlite, "DATETIME('NOW')"),
            "CURRENT_TIMESTAMP"
        );
        assert_eq!(
            normalize_column_default(Dialect::Mysql, "CURRENT_TIMESTAMP(6)"),
            "CURRENT_TIMESTAMP"
        );
    }

    #[test]
    fn test_default_sqlserver_double_unwrap() {
        assert_eq!(normalize_column_default(Dialect::Sqlserver, "((42))"), "42");
        assert_eq!(
            normalize_column_default(Dialect::Sqlserver, "((N'hi'))"),
            "'hi'"
        );
    }

    #[test]
    fn test_default_postgres_cast_stripped() {
        assert_eq!(
            normalize_column_default(Dialect::Postgres, "'hello'::text"),
            "'hello'"
        );
        assert_eq!(
            normalize_column_default(Dialect::Postgres, "'{}'::jsonb"),
            "'{}'"
        );
    }

    #[test]
    fn test_default_expression_wrapping() {
        assert_eq!(
            normalize_column_default(Dialect::Sqlserver, "next value for seq"),
            "(next value for seq)"
        );
        assert_eq!(
            normalize_column_default(Dialect::Mysql, "uuid()"),
            "(uuid())"
        );
        // Postgres stores expressions bare.
        assert_eq!(
            normalize_column_default(Dialect::Postgres, "gen_random_uuid()"),
            "gen_random_uuid()"
        );
    }

    #[test]
    fn test_is_literal() {
        assert!(is_literal("'x''y'"));
        assert!(is_literal("CURRENT_TIMESTAMP"));
        assert!(is_literal("42"));
        assert!(is_literal("1.5e3"));
        assert!(is_literal("-7"));
        assert!(is_literal("NULL"));
        assert!(is_literal("true"));

        assert!(!is_literal("now()"));
        assert!(!is_literal("'unterminated"));
        assert!(!is_literal("'bad'quote'"));
        assert!(!is_literal("1 + 2"));
        assert!(!is_literal(""));
    }

    #[test]
    fn test_split_args_respects_nesting() {
        assert_eq!(
            split_args("a,(b,c),'x,y',[1,2]"),
            vec!["a", "(b,c)", "'x,y'", "[1,2]"]
        );
    }

    #[test]
    fn test_split_args_preserves_whitespace() {
        assert_eq!(
            split_args("a, b[1,2], (c,d), 'e,f'"),
            vec!["a", " b[1,2]", " (c,d)", " 'e,f'"]
        );
    }

    #[test]
    fn test_split_args_quoted_escape() {
        assert_eq!(split_args("'a,''b',c"), vec!["'a,''b'", "c"]);
    }

    #[test]
    fn test_parse_version_nums() {
        assert_eq!(parse_version_nums("15.4"), vec![15, 4]);
        assert_eq!(parse_version_nums("8.0.36-log"), vec![8, 0, 36]);
        assert_eq!(
            parse_version_nums("PostgreSQL 16.2 on x86_64"),
            vec![16, 2]
        );
        assert_eq!(parse_version_nums("16.00.4085.2"), vec![16, 0, 4085, 2]);
        assert_eq!(parse_version_nums("no digits"), Vec::<i64>::new());
    }
}
