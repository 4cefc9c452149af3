//! Reference catalog repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide create/update/list APIs over the `reference_sources` table.
//! - Keep the text-search stage and pagination facet inside the
//!   persistence boundary.
//!
//! # Invariants
//! - `source_name` is the natural key and is never rewritten by update.
//! - The text-search stage precedes filtering and sorting; result
//!   ordering is deterministic by `source_name`.

use crate::model::reference::Reference;
use crate::repo::{
    map_unique_violation, push_pagination, table_exists, Page, Pagination, RepoError, RepoResult,
};
use crate::search::fts::{build_match_expression, map_match_error};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const REFERENCE_SELECT_COLUMNS: &str = "source_name, description, url";

/// Filter and pagination options for listing references.
#[derive(Debug, Clone, Default)]
pub struct ReferenceListOptions {
    /// Free-text search over the citation fields.
    pub search: Option<String>,
    /// Exact natural-key match.
    pub source_name: Option<String>,
    pub offset: u32,
    pub limit: Option<u32>,
}

/// Shallow field overwrite addressed by `source_name`.
#[derive(Debug, Clone, Default)]
pub struct ReferenceUpdate {
    /// Natural key of the record being updated. Required.
    pub source_name: String,
    pub description: Option<String>,
    pub url: Option<String>,
}

/// Repository interface for reference catalog operations.
pub trait ReferenceRepository {
    /// Persists one new citation. Fails with `DuplicateId` when the
    /// `source_name` already exists.
    fn create_reference(&self, reference: &Reference) -> RepoResult<()>;
    /// Lists citations, text-search first, sorted by `source_name`.
    fn retrieve_all(&self, options: &ReferenceListOptions) -> RepoResult<Vec<Reference>>;
    /// Same as `retrieve_all`, plus the pre-pagination total.
    fn retrieve_all_paged(&self, options: &ReferenceListOptions) -> RepoResult<Page<Reference>>;
    /// Returns the citation addressed by the natural key.
    fn retrieve_by_source_name(&self, source_name: &str) -> RepoResult<Option<Reference>>;
    /// Merges non-key fields onto the addressed citation.
    ///
    /// Returns `Ok(None)` when no such citation exists.
    fn update_reference(&self, update: &ReferenceUpdate) -> RepoResult<Option<Reference>>;
}

/// SQLite-backed reference catalog repository.
pub struct SqliteReferenceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteReferenceRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        for table in ["reference_sources", "reference_sources_fts"] {
            if !table_exists(conn, table)? {
                return Err(RepoError::MissingRequiredTable(table));
            }
        }
        Ok(Self { conn })
    }
}

impl ReferenceRepository for SqliteReferenceRepository<'_> {
    fn create_reference(&self, reference: &Reference) -> RepoResult<()> {
        if reference.source_name.is_empty() {
            return Err(RepoError::MissingParameter {
                parameter: "sourceName",
            });
        }

        self.conn
            .execute(
                "INSERT INTO reference_sources (source_name, description, url)
                 VALUES (?1, ?2, ?3);",
                params![
                    reference.source_name.as_str(),
                    reference.description.as_deref(),
                    reference.url.as_deref(),
                ],
            )
            .map_err(|err| map_unique_violation(err, || reference.source_name.clone()))?;

        Ok(())
    }

    fn retrieve_all(&self, options: &ReferenceListOptions) -> RepoResult<Vec<Reference>> {
        let (clause, binds, match_expr) = build_reference_filter(options);
        let mut sql = format!(
            "SELECT {REFERENCE_SELECT_COLUMNS}
             FROM reference_sources
             WHERE 1 = 1{clause}
             ORDER BY source_name ASC"
        );
        let mut bind_values = binds;
        push_pagination(&mut sql, &mut bind_values, options.limit, options.offset);

        let map_err = |err: rusqlite::Error| match &match_expr {
            Some(expr) => map_match_error(err, expr),
            None => err.into(),
        };

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values)).map_err(map_err)?;
        let mut references = Vec::new();

        while let Some(row) = rows.next().map_err(map_err)? {
            references.push(parse_reference_row(row)?);
        }

        Ok(references)
    }

    fn retrieve_all_paged(&self, options: &ReferenceListOptions) -> RepoResult<Page<Reference>> {
        let (clause, binds, match_expr) = build_reference_filter(options);
        let mut sql = format!(
            "SELECT {REFERENCE_SELECT_COLUMNS},
                 COUNT(*) OVER () AS total_count
             FROM reference_sources
             WHERE 1 = 1{clause}
             ORDER BY source_name ASC"
        );
        let mut bind_values = binds.clone();
        push_pagination(&mut sql, &mut bind_values, options.limit, options.offset);

        let map_err = |err: rusqlite::Error| match &match_expr {
            Some(expr) => map_match_error(err, expr),
            None => err.into(),
        };

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values)).map_err(map_err)?;
        let mut total: u32 = 0;
        let mut references = Vec::new();

        while let Some(row) = rows.next().map_err(map_err)? {
            total = row.get("total_count")?;
            references.push(parse_reference_row(row)?);
        }

        if references.is_empty() {
            let count_sql = format!(
                "SELECT COUNT(*) FROM reference_sources WHERE 1 = 1{clause}"
            );
            total = self
                .conn
                .query_row(&count_sql, params_from_iter(binds), |row| row.get(0))
                .map_err(map_err)?;
        }

        Ok(Page {
            pagination: Pagination {
                total,
                offset: options.offset,
                limit: options.limit,
            },
            data: references,
        })
    }

    fn retrieve_by_source_name(&self, source_name: &str) -> RepoResult<Option<Reference>> {
        if source_name.is_empty() {
            return Err(RepoError::MissingParameter {
                parameter: "sourceName",
            });
        }

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REFERENCE_SELECT_COLUMNS}
             FROM reference_sources
             WHERE source_name = ?1;"
        ))?;
        let mut rows = stmt.query([source_name])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_reference_row(row)?));
        }

        Ok(None)
    }

    fn update_reference(&self, update: &ReferenceUpdate) -> RepoResult<Option<Reference>> {
        let Some(mut reference) = self.retrieve_by_source_name(&update.source_name)? else {
            return Ok(None);
        };

        if let Some(description) = &update.description {
            reference.description = Some(description.clone());
        }
        if let Some(url) = &update.url {
            reference.url = Some(url.clone());
        }

        self.conn.execute(
            "UPDATE reference_sources
             SET description = ?1, url = ?2
             WHERE source_name = ?3;",
            params![
                reference.description.as_deref(),
                reference.url.as_deref(),
                reference.source_name.as_str(),
            ],
        )?;

        Ok(Some(reference))
    }
}

// The text-search stage precedes the exact-match filter, matching the
// catalog's pipeline order; without a version reduction the two stages
// commute, so this only fixes the documented shape.
fn build_reference_filter(
    options: &ReferenceListOptions,
) -> (String, Vec<Value>, Option<String>) {
    let mut clause = String::new();
    let mut binds: Vec<Value> = Vec::new();

    let match_expr = options
        .search
        .as_deref()
        .and_then(build_match_expression);
    if let Some(expr) = &match_expr {
        clause.push_str(
            " AND id IN (
                SELECT rowid FROM reference_sources_fts WHERE reference_sources_fts MATCH ?
            )",
        );
        binds.push(Value::Text(expr.clone()));
    }

    if let Some(source_name) = &options.source_name {
        clause.push_str(" AND source_name = ?");
        binds.push(Value::Text(source_name.clone()));
    }

    (clause, binds, match_expr)
}

fn parse_reference_row(row: &Row<'_>) -> RepoResult<Reference> {
    Ok(Reference {
        source_name: row.get("source_name")?,
        description: row.get("description")?,
        url: row.get("url")?,
    })
}
