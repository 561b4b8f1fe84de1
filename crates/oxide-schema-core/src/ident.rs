//! Sanitizing of user-supplied names, types and default values.
//!
//! Nothing a client sends is spliced into DDL text directly. Names become
//! [`Ident`]s (always double-quoted, embedded quotes doubled), column types
//! must parse as a [`TypeExpr`], and defaults are reduced to a
//! [`DefaultExpr`] literal.

use std::fmt;

use crate::error::{Result, SchemaError};

const QUOTE: char = '"';

/// SQLite reserves every table name starting with this prefix.
const RESERVED_PREFIX: &str = "sqlite_";

/// A validated SQL identifier (table, column or constraint name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ident(String);

impl Ident {
    /// Validates a raw name.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidIdentifier`] if the name is blank, has
    /// surrounding whitespace, contains control characters or uses the
    /// reserved `sqlite_` prefix.
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let reason = if raw.trim().is_empty() {
            Some("identifier is empty")
        } else if raw.trim() != raw {
            Some("identifier has leading or trailing whitespace")
        } else if raw.chars().any(char::is_control) {
            Some("identifier contains a control character")
        } else if raw
            .get(..RESERVED_PREFIX.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(RESERVED_PREFIX))
        {
            Some("names starting with 'sqlite_' are reserved")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(SchemaError::InvalidIdentifier { value: raw, reason }),
            None => Ok(Self(raw)),
        }
    }

    /// Returns the unquoted name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the name quoted for embedding in SQL text.
    #[must_use]
    pub fn quoted(&self) -> String {
        let mut out = String::with_capacity(self.0.len() + 2);
        out.push(QUOTE);
        for c in self.0.chars() {
            if c == QUOTE {
                out.push(QUOTE);
            }
            out.push(c);
        }
        out.push(QUOTE);
        out
    }

    /// Compares against another name the way SQLite resolves table names
    /// (ASCII case-insensitive).
    #[must_use]
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.quoted())
    }
}

impl AsRef<str> for Ident {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A column type restricted to `WORD [WORD ...] [(n[, m])]`, where no word
/// is a constraint keyword such as `PRIMARY` or `REFERENCES`.
///
/// Stored normalized: upper case, single spaces, `(n, m)` arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeExpr(String);

impl TypeExpr {
    /// Parses and normalizes a type expression such as `varchar(255)`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidTypeExpression`] for anything outside the
    /// grammar, including an empty string.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || SchemaError::InvalidTypeExpression(raw.to_string());
        let trimmed = raw.trim();

        let (head, args) = match trimmed.find('(') {
            Some(open) => {
                let inner = trimmed[open + 1..].strip_suffix(')').ok_or_else(invalid)?;
                (&trimmed[..open], Some(inner))
            }
            None => (trimmed, None),
        };

        let words = head
            .split_whitespace()
            .map(|word| {
                if is_type_word(word) {
                    Ok(word.to_ascii_uppercase())
                } else {
                    Err(invalid())
                }
            })
            .collect::<Result<Vec<_>>>()?;
        if words.is_empty() {
            return Err(invalid());
        }

        let mut text = words.join(" ");
        if let Some(inner) = args {
            let params: Vec<&str> = inner.split(',').map(str::trim).collect();
            let well_formed = params.len() <= 2
                && params
                    .iter()
                    .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()));
            if !well_formed {
                return Err(invalid());
            }
            text.push('(');
            text.push_str(&params.join(", "));
            text.push(')');
        }

        Ok(Self(text))
    }

    /// Returns the normalized type text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Words that start or continue a column constraint. A type name may not
/// contain them, or the type text would carry constraints the compiler
/// never sees.
const CONSTRAINT_KEYWORDS: [&str; 24] = [
    "ALWAYS",
    "AS",
    "ASC",
    "AUTOINCREMENT",
    "CHECK",
    "COLLATE",
    "CONFLICT",
    "CONSTRAINT",
    "DEFAULT",
    "DEFERRABLE",
    "DESC",
    "FOREIGN",
    "GENERATED",
    "KEY",
    "MATCH",
    "NOT",
    "NULL",
    "ON",
    "PRIMARY",
    "REFERENCES",
    "STORED",
    "UNIQUE",
    "VIRTUAL",
    "WITHOUT",
];

fn is_type_word(word: &str) -> bool {
    let mut chars = word.chars();
    let well_formed = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    well_formed
        && !CONSTRAINT_KEYWORDS
            .iter()
            .any(|keyword| keyword.eq_ignore_ascii_case(word))
}

const DEFAULT_KEYWORDS: [&str; 6] = [
    "NULL",
    "TRUE",
    "FALSE",
    "CURRENT_TIMESTAMP",
    "CURRENT_DATE",
    "CURRENT_TIME",
];

/// A column default reduced to a literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultExpr {
    /// `NULL`, `TRUE`, `FALSE` or one of the `CURRENT_*` keywords.
    Keyword(&'static str),
    /// A signed numeric literal, kept as written.
    Number(String),
    /// A string value, emitted as a quoted literal.
    Text(String),
}

impl DefaultExpr {
    /// Classifies a raw default. Never fails: text that is neither a keyword,
    /// a number nor a well-formed quoted string becomes a string value.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Some(keyword) = DEFAULT_KEYWORDS
            .iter()
            .copied()
            .find(|k| k.eq_ignore_ascii_case(trimmed))
        {
            return Self::Keyword(keyword);
        }
        if is_numeric_literal(trimmed) {
            return Self::Number(trimmed.to_string());
        }
        if let Some(text) = unquote(trimmed) {
            return Self::Text(text);
        }
        Self::Text(raw.to_string())
    }

    /// Returns the SQL text placed after `DEFAULT`.
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Self::Keyword(keyword) => (*keyword).to_string(),
            Self::Number(number) => number.clone(),
            Self::Text(text) => format!("'{}'", text.replace('\'', "''")),
        }
    }
}

fn is_numeric_literal(s: &str) -> bool {
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    let body = s.strip_prefix(['+', '-']).unwrap_or(s);

    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(at) => (&body[..at], Some(&body[at + 1..])),
        None => (body, None),
    };
    let (int, frac) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if (int.is_empty() && frac.is_empty()) || !all_digits(int) || !all_digits(frac) {
        return false;
    }

    exponent.is_none_or(|exp| {
        let digits = exp.strip_prefix(['+', '-']).unwrap_or(exp);
        !digits.is_empty() && all_digits(digits)
    })
}

/// Decodes a single-quoted SQL string literal, `None` if it is malformed.
fn unquote(s: &str) -> Option<String> {
    let inner = s.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\'' && chars.next() != Some('\'') {
            return None;
        }
        out.push(c);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ident_quoting() {
        assert_eq!(Ident::new("users").unwrap().quoted(), "\"users\"");
        assert_eq!(Ident::new("my table").unwrap().to_string(), "\"my table\"");
        assert_eq!(
            Ident::new("we\"ird").unwrap().quoted(),
            "\"we\"\"ird\""
        );
    }

    #[test]
    fn test_ident_rejections() {
        for raw in ["", "   ", " users", "users ", "a\0b", "line\nbreak", "sqlite_master", "SQLITE_x"] {
            let err = Ident::new(raw).unwrap_err();
            assert!(
                matches!(err, SchemaError::InvalidIdentifier { .. }),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_ident_matches_case_insensitively() {
        let ident = Ident::new("Projects").unwrap();
        assert!(ident.matches("projects"));
        assert!(!ident.matches("project"));
    }

    #[test]
    fn test_type_expr_normalizes() {
        assert_eq!(TypeExpr::parse("integer").unwrap().as_str(), "INTEGER");
        assert_eq!(TypeExpr::parse(" varchar (255) ").unwrap().as_str(), "VARCHAR(255)");
        assert_eq!(
            TypeExpr::parse("double   precision").unwrap().as_str(),
            "DOUBLE PRECISION"
        );
        assert_eq!(TypeExpr::parse("decimal(10,2)").unwrap().as_str(), "DECIMAL(10, 2)");
    }

    #[test]
    fn test_type_expr_rejects_expressions() {
        for raw in [
            "",
            "TEXT); DROP TABLE users; --",
            "INTEGER DEFAULT 1",
            "VARCHAR(255",
            "VARCHAR()",
            "DECIMAL(1, 2, 3)",
            "NUMERIC(-1)",
            "1NT",
            "TEXT(1)(2)",
            "INTEGER REFERENCES missing",
            "INTEGER PRIMARY KEY AUTOINCREMENT",
            "INTEGER GENERATED ALWAYS AS (1)",
            "TEXT NOT NULL",
            "TEXT UNIQUE",
            "TEXT COLLATE nocase",
            "INTEGER CHECK",
            "INTEGER CONSTRAINT c",
            "null",
        ] {
            assert!(TypeExpr::parse(raw).is_err(), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn test_default_keywords_and_numbers() {
        assert_eq!(DefaultExpr::parse("null"), DefaultExpr::Keyword("NULL"));
        assert_eq!(
            DefaultExpr::parse("current_timestamp").to_sql(),
            "CURRENT_TIMESTAMP"
        );
        assert_eq!(DefaultExpr::parse("0").to_sql(), "0");
        assert_eq!(DefaultExpr::parse("-1.5e3").to_sql(), "-1.5e3");
        assert_eq!(DefaultExpr::parse("1.").to_sql(), "1.");
    }

    #[test]
    fn test_default_strings_are_always_literals() {
        assert_eq!(DefaultExpr::parse("'hello'").to_sql(), "'hello'");
        assert_eq!(DefaultExpr::parse("'it''s'"), DefaultExpr::Text("it's".into()));
        assert_eq!(DefaultExpr::parse("Default Project").to_sql(), "'Default Project'");
        assert_eq!(
            DefaultExpr::parse("0); DROP TABLE users; --").to_sql(),
            "'0); DROP TABLE users; --'"
        );
        assert_eq!(DefaultExpr::parse("'broken").to_sql(), "'''broken'");
        assert_eq!(DefaultExpr::parse("(1 + 1)").to_sql(), "'(1 + 1)'");
    }
}
