//! SQLite FTS5 match-expression helpers.
//!
//! # Responsibility
//! - Escape and AND-join user search terms so arbitrary input cannot
//!   break FTS5 syntax.
//! - Map FTS5 syntax failures to the typed query-parameter error.
//!
//! # Invariants
//! - A blank search term produces no match expression.
//! - Escaped expressions only contain quoted phrases joined by `AND`.

use crate::repo::RepoError;

/// Builds a quoted, AND-joined FTS5 match expression from free text.
///
/// Returns `None` for blank input, which callers treat as "no search
/// stage".
pub fn build_match_expression(text: &str) -> Option<String> {
    let terms = text
        .split_whitespace()
        .filter(|term| !term.is_empty())
        .map(escape_fts_term)
        .collect::<Vec<_>>();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" AND "))
    }
}

/// Maps a query failure raised while a match expression was bound.
///
/// FTS5 syntax failures become `InvalidQueryParameter` on the `search`
/// option; everything else passes through as a transport error.
pub(crate) fn map_match_error(err: rusqlite::Error, expression: &str) -> RepoError {
    if is_match_syntax_error(&err) {
        return RepoError::InvalidQueryParameter {
            parameter: "search",
            value: expression.to_string(),
        };
    }

    err.into()
}

fn escape_fts_term(raw: &str) -> String {
    let escaped = raw.replace('"', "\"\"");
    format!("\"{escaped}\"")
}

fn is_match_syntax_error(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => {
            let msg = message.to_lowercase();
            (msg.contains("fts5") && msg.contains("syntax"))
                || msg.contains("malformed match expression")
                || msg.contains("unterminated")
        }
        _ => false,
    }
}
