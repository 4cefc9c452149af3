//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for the versioned
//!   object store and the reference catalog.
//! - Own the uniform error taxonomy consumed by every layer above.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes enforce model validation before persistence.
//! - Missing documents are `None`/empty results, never errors; identity,
//!   format and duplicate failures are typed errors raised adjacent to
//!   the storage call.

use crate::db::DbError;
use crate::model::attack_object::{stix_id_is_valid, ObjectValidationError};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod attack_object_repo;
pub mod reference_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Uniform repository error for store and catalog operations.
#[derive(Debug)]
pub enum RepoError {
    /// A required identifying field was absent (empty).
    MissingParameter { parameter: &'static str },
    /// An identifier failed the store's addressing shape.
    BadlyFormattedParameter { parameter: &'static str },
    /// A uniqueness constraint on the natural key was violated.
    DuplicateId { key: String },
    /// An unrecognized value was supplied for a selector option.
    InvalidQueryParameter {
        parameter: &'static str,
        value: String,
    },
    Validation(ObjectValidationError),
    Db(DbError),
    /// Persisted data cannot be converted to a valid record.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingParameter { parameter } => {
                write!(f, "missing required parameter `{parameter}`")
            }
            Self::BadlyFormattedParameter { parameter } => {
                write!(f, "badly formatted parameter `{parameter}`")
            }
            Self::DuplicateId { key } => write!(f, "duplicate id `{key}`"),
            Self::InvalidQueryParameter { parameter, value } => {
                write!(f, "invalid query parameter `{parameter}`: `{value}`")
            }
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "repository requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ObjectValidationError> for RepoError {
    fn from(value: ObjectValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Pagination metadata computed alongside a page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    /// Total matching records before the page window was applied.
    pub total: u32,
    pub offset: u32,
    pub limit: Option<u32>,
}

/// Paged query result envelope.
///
/// Serializes to the `{ pagination: { total, offset, limit }, data }`
/// wire shape expected by paginated endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub pagination: Pagination,
    pub data: Vec<T>,
}

/// Rejects empty and malformed identifier parameters.
///
/// Empty mirrors the missing-parameter case of the REST surface; a
/// non-empty value that fails the `<type>--<uuid>` shape is badly
/// formatted.
pub(crate) fn require_stix_id(value: &str, parameter: &'static str) -> RepoResult<()> {
    if value.is_empty() {
        return Err(RepoError::MissingParameter { parameter });
    }
    if !stix_id_is_valid(value) {
        return Err(RepoError::BadlyFormattedParameter { parameter });
    }
    Ok(())
}

/// Maps a SQLite failure to `DuplicateId` when it is a uniqueness
/// violation, passing every other failure through as a transport error.
pub(crate) fn map_unique_violation(
    err: rusqlite::Error,
    key: impl FnOnce() -> String,
) -> RepoError {
    if is_unique_violation(&err) {
        RepoError::DuplicateId { key: key() }
    } else {
        RepoError::Db(DbError::Sqlite(err))
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, Some(message)) => {
            failure.code == rusqlite::ErrorCode::ConstraintViolation
                && message.to_lowercase().contains("unique")
        }
        _ => false,
    }
}

/// Appends the `LIMIT`/`OFFSET` tail: an explicit limit takes an
/// optional offset; an offset alone disables the limit.
pub(crate) fn push_pagination(
    sql: &mut String,
    binds: &mut Vec<rusqlite::types::Value>,
    limit: Option<u32>,
    offset: u32,
) {
    use rusqlite::types::Value;

    if let Some(limit) = limit {
        sql.push_str(" LIMIT ?");
        binds.push(Value::Integer(i64::from(limit)));
        if offset > 0 {
            sql.push_str(" OFFSET ?");
            binds.push(Value::Integer(i64::from(offset)));
        }
    } else if offset > 0 {
        sql.push_str(" LIMIT -1 OFFSET ?");
        binds.push(Value::Integer(i64::from(offset)));
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn int_to_bool(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

pub(crate) fn table_exists(conn: &rusqlite::Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type IN ('table', 'view') AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(crate) fn table_has_column(
    conn: &rusqlite::Connection,
    table: &str,
    column: &str,
) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
