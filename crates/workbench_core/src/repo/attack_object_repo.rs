//! Versioned object repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide stable CRUD and version-chain query APIs over canonical
//!   `attack_objects` storage.
//! - Keep SQL details, including the latest-version reduction, inside
//!   the persistence boundary.
//!
//! # Invariants
//! - Write paths call `AttackObject::validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Latest-version queries reduce to the maximum `modified` per
//!   `stix_id` before any revoked/deprecated/state/search filtering, so
//!   a filtered-out latest version makes its id disappear rather than
//!   fall back to an older version.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::attack_object::{
    AttackObject, ExternalReference, ObjectAttributes, ObjectType, StixId, WorkflowState,
};
use crate::repo::{
    bool_to_int, int_to_bool, map_unique_violation, push_pagination, require_stix_id,
    table_exists, table_has_column, Page, Pagination, RepoError, RepoResult,
};
use crate::search::fts::{build_match_expression, map_match_error};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::Serialize;

const OBJECT_SELECT_COLUMNS: &str = "
    stix_id,
    modified,
    created,
    type,
    spec_version,
    name,
    description,
    created_by_ref,
    modified_by_ref,
    attack_spec_version,
    external_references,
    object_marking_refs,
    revoked,
    deprecated,
    workflow_state,
    attributes";

// Group every stored version by stix_id and keep the maximum modified
// timestamp per group; joining back on the pair re-materializes exactly
// one full document per logical id.
const LATEST_CTE: &str = "WITH latest AS (
    SELECT stix_id, MAX(modified) AS modified
    FROM attack_objects
    GROUP BY stix_id
)";

const FROM_LATEST: &str = "FROM attack_objects JOIN latest USING (stix_id, modified)";

/// Version selector for id-scoped retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSelector {
    /// Every stored version, storage order.
    All,
    /// Only the maximum-`modified` version.
    Latest,
}

impl VersionSelector {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "all" => Some(Self::All),
            "latest" => Some(Self::Latest),
            _ => None,
        }
    }
}

/// Filter and pagination options for listing latest versions.
#[derive(Debug, Clone, Default)]
pub struct ObjectListOptions {
    /// Keep versions whose latest is revoked.
    pub include_revoked: bool,
    /// Keep versions whose latest is deprecated.
    pub include_deprecated: bool,
    /// Exact editorial-state match.
    pub state: Option<WorkflowState>,
    /// Restrict to one object kind.
    pub kind: Option<ObjectType>,
    /// Free-text search over name/description, applied after the
    /// latest-version reduction.
    pub search: Option<String>,
    pub offset: u32,
    pub limit: Option<u32>,
}

/// Options for id-scoped retrieval.
#[derive(Debug, Clone)]
pub struct ObjectRetrievalOptions {
    /// Version selector, `all` or `latest`.
    pub versions: String,
}

impl Default for ObjectRetrievalOptions {
    fn default() -> Self {
        Self {
            versions: "latest".to_string(),
        }
    }
}

/// Shallow field overwrite applied to one exact stored version.
///
/// `None` fields keep the stored value. Re-stamping `modified` moves the
/// version inside its chain and can collide with a sibling version.
#[derive(Debug, Clone, Default)]
pub struct ObjectUpdate {
    pub modified: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub revoked: Option<bool>,
    pub deprecated: Option<bool>,
    pub workflow_state: Option<WorkflowState>,
    pub attributes: Option<ObjectAttributes>,
}

impl ObjectUpdate {
    fn apply(&self, object: &mut AttackObject) {
        if let Some(modified) = self.modified {
            object.modified = modified;
        }
        if let Some(name) = &self.name {
            object.name = Some(name.clone());
        }
        if let Some(description) = &self.description {
            object.description = Some(description.clone());
        }
        if let Some(revoked) = self.revoked {
            object.revoked = revoked;
        }
        if let Some(deprecated) = self.deprecated {
            object.deprecated = deprecated;
        }
        if let Some(state) = self.workflow_state {
            object.workflow_state = Some(state);
        }
        if let Some(attributes) = &self.attributes {
            object.attributes = attributes.clone();
        }
    }
}

/// Repository interface for versioned object operations.
pub trait AttackObjectRepository {
    /// Persists one new version. Fails with `DuplicateId` when the
    /// (`stix_id`, `modified`) pair already exists.
    fn create_object(&self, object: &AttackObject) -> RepoResult<()>;
    /// Lists the latest version per logical id, filtered and paginated.
    fn retrieve_all(&self, options: &ObjectListOptions) -> RepoResult<Vec<AttackObject>>;
    /// Same as `retrieve_all`, plus the pre-pagination total.
    fn retrieve_all_paged(&self, options: &ObjectListOptions) -> RepoResult<Page<AttackObject>>;
    /// Returns versions of one id per the `versions` selector.
    fn retrieve_by_id(
        &self,
        stix_id: &str,
        options: &ObjectRetrievalOptions,
    ) -> RepoResult<Vec<AttackObject>>;
    /// Returns the maximum-`modified` version of one id.
    fn retrieve_latest(&self, stix_id: &str) -> RepoResult<Option<AttackObject>>;
    /// Returns the exact version addressed by the natural key.
    fn retrieve_version(&self, stix_id: &str, modified: i64) -> RepoResult<Option<AttackObject>>;
    /// Replaces the exact version addressed by the natural key.
    ///
    /// Returns `Ok(None)` when no such version exists.
    fn update_version(
        &self,
        stix_id: &str,
        modified: i64,
        update: &ObjectUpdate,
    ) -> RepoResult<Option<AttackObject>>;
    /// Removes the exact version addressed by the natural key.
    ///
    /// Returns the removed document, or `None` when nothing matched.
    fn delete_version(&self, stix_id: &str, modified: i64) -> RepoResult<Option<AttackObject>>;
    /// Removes every version of one id, returning the removed documents.
    fn delete_all_versions(&self, stix_id: &str) -> RepoResult<Vec<AttackObject>>;
}

/// SQLite-backed versioned object repository.
pub struct SqliteObjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteObjectRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_object_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl AttackObjectRepository for SqliteObjectRepository<'_> {
    fn create_object(&self, object: &AttackObject) -> RepoResult<()> {
        object.validate()?;

        self.conn
            .execute(
                "INSERT INTO attack_objects (
                    stix_id,
                    modified,
                    created,
                    type,
                    spec_version,
                    name,
                    description,
                    created_by_ref,
                    modified_by_ref,
                    attack_spec_version,
                    external_references,
                    object_marking_refs,
                    revoked,
                    deprecated,
                    workflow_state,
                    attributes
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16);",
                params![
                    object.stix_id.as_str(),
                    object.modified,
                    object.created,
                    object.kind().as_str(),
                    object.spec_version.as_str(),
                    object.name.as_deref(),
                    object.description.as_deref(),
                    object.created_by_ref.as_deref(),
                    object.modified_by_ref.as_deref(),
                    object.attack_spec_version.as_deref(),
                    to_json(&object.external_references, "external_references")?,
                    to_json(&object.object_marking_refs, "object_marking_refs")?,
                    bool_to_int(object.revoked),
                    bool_to_int(object.deprecated),
                    object.workflow_state.map(WorkflowState::as_str),
                    to_json(&object.attributes, "attributes")?,
                ],
            )
            .map_err(|err| {
                map_unique_violation(err, || version_key(&object.stix_id, object.modified))
            })?;

        Ok(())
    }

    fn retrieve_all(&self, options: &ObjectListOptions) -> RepoResult<Vec<AttackObject>> {
        let ListFilter {
            clause,
            mut binds,
            match_expr,
        } = build_list_filter(options);
        let mut sql = format!(
            "{LATEST_CTE}
             SELECT {OBJECT_SELECT_COLUMNS}
             {FROM_LATEST}
             WHERE 1 = 1{clause}
             ORDER BY stix_id ASC"
        );
        push_pagination(&mut sql, &mut binds, options.limit, options.offset);

        let map_err = |err: rusqlite::Error| match &match_expr {
            Some(expr) => map_match_error(err, expr),
            None => err.into(),
        };

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds)).map_err(map_err)?;
        let mut objects = Vec::new();

        while let Some(row) = rows.next().map_err(map_err)? {
            objects.push(parse_object_row(row)?);
        }

        Ok(objects)
    }

    fn retrieve_all_paged(&self, options: &ObjectListOptions) -> RepoResult<Page<AttackObject>> {
        let ListFilter {
            clause,
            binds,
            match_expr,
        } = build_list_filter(options);
        let mut sql = format!(
            "{LATEST_CTE}
             SELECT {OBJECT_SELECT_COLUMNS},
                 COUNT(*) OVER () AS total_count
             {FROM_LATEST}
             WHERE 1 = 1{clause}
             ORDER BY stix_id ASC"
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
        let mut objects = Vec::new();

        while let Some(row) = rows.next().map_err(map_err)? {
            total = row.get("total_count")?;
            objects.push(parse_object_row(row)?);
        }

        // An offset past the last match returns an empty window, which
        // carries no total_count column value; recount without the page.
        if objects.is_empty() {
            let count_sql = format!(
                "{LATEST_CTE} SELECT COUNT(*) {FROM_LATEST} WHERE 1 = 1{clause}"
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
            data: objects,
        })
    }

    fn retrieve_by_id(
        &self,
        stix_id: &str,
        options: &ObjectRetrievalOptions,
    ) -> RepoResult<Vec<AttackObject>> {
        if stix_id.is_empty() {
            return Err(RepoError::MissingParameter { parameter: "stixId" });
        }
        let Some(selector) = VersionSelector::parse(&options.versions) else {
            return Err(RepoError::InvalidQueryParameter {
                parameter: "versions",
                value: options.versions.clone(),
            });
        };
        require_stix_id(stix_id, "stixId")?;

        match selector {
            VersionSelector::All => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {OBJECT_SELECT_COLUMNS} FROM attack_objects WHERE stix_id = ?1;"
                ))?;
                let mut rows = stmt.query([stix_id])?;
                let mut objects = Vec::new();
                while let Some(row) = rows.next()? {
                    objects.push(parse_object_row(row)?);
                }
                Ok(objects)
            }
            VersionSelector::Latest => {
                Ok(self.retrieve_latest(stix_id)?.into_iter().collect())
            }
        }
    }

    fn retrieve_latest(&self, stix_id: &str) -> RepoResult<Option<AttackObject>> {
        require_stix_id(stix_id, "stixId")?;

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {OBJECT_SELECT_COLUMNS}
             FROM attack_objects
             WHERE stix_id = ?1
             ORDER BY modified DESC
             LIMIT 1;"
        ))?;
        let mut rows = stmt.query([stix_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_object_row(row)?));
        }

        Ok(None)
    }

    fn retrieve_version(&self, stix_id: &str, modified: i64) -> RepoResult<Option<AttackObject>> {
        require_stix_id(stix_id, "stixId")?;

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {OBJECT_SELECT_COLUMNS}
             FROM attack_objects
             WHERE stix_id = ?1 AND modified = ?2;"
        ))?;
        let mut rows = stmt.query(params![stix_id, modified])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_object_row(row)?));
        }

        Ok(None)
    }

    fn update_version(
        &self,
        stix_id: &str,
        modified: i64,
        update: &ObjectUpdate,
    ) -> RepoResult<Option<AttackObject>> {
        require_stix_id(stix_id, "stixId")?;

        let Some(mut object) = self.retrieve_version(stix_id, modified)? else {
            return Ok(None);
        };
        update.apply(&mut object);
        object.validate()?;

        let changed = self
            .conn
            .execute(
                "UPDATE attack_objects
                 SET
                    modified = ?1,
                    type = ?2,
                    spec_version = ?3,
                    name = ?4,
                    description = ?5,
                    created_by_ref = ?6,
                    modified_by_ref = ?7,
                    attack_spec_version = ?8,
                    external_references = ?9,
                    object_marking_refs = ?10,
                    revoked = ?11,
                    deprecated = ?12,
                    workflow_state = ?13,
                    attributes = ?14
                 WHERE stix_id = ?15 AND modified = ?16;",
                params![
                    object.modified,
                    object.kind().as_str(),
                    object.spec_version.as_str(),
                    object.name.as_deref(),
                    object.description.as_deref(),
                    object.created_by_ref.as_deref(),
                    object.modified_by_ref.as_deref(),
                    object.attack_spec_version.as_deref(),
                    to_json(&object.external_references, "external_references")?,
                    to_json(&object.object_marking_refs, "object_marking_refs")?,
                    bool_to_int(object.revoked),
                    bool_to_int(object.deprecated),
                    object.workflow_state.map(WorkflowState::as_str),
                    to_json(&object.attributes, "attributes")?,
                    stix_id,
                    modified,
                ],
            )
            .map_err(|err| {
                map_unique_violation(err, || version_key(&object.stix_id, object.modified))
            })?;

        if changed == 0 {
            // The exact version vanished between lookup and replace.
            return Ok(None);
        }

        Ok(Some(object))
    }

    fn delete_version(&self, stix_id: &str, modified: i64) -> RepoResult<Option<AttackObject>> {
        require_stix_id(stix_id, "stixId")?;

        let Some(object) = self.retrieve_version(stix_id, modified)? else {
            return Ok(None);
        };

        self.conn.execute(
            "DELETE FROM attack_objects WHERE stix_id = ?1 AND modified = ?2;",
            params![stix_id, modified],
        )?;

        Ok(Some(object))
    }

    fn delete_all_versions(&self, stix_id: &str) -> RepoResult<Vec<AttackObject>> {
        require_stix_id(stix_id, "stixId")?;

        let versions = self.retrieve_by_id(
            stix_id,
            &ObjectRetrievalOptions {
                versions: "all".to_string(),
            },
        )?;

        self.conn.execute(
            "DELETE FROM attack_objects WHERE stix_id = ?1;",
            [stix_id],
        )?;

        Ok(versions)
    }
}

struct ListFilter {
    clause: String,
    binds: Vec<Value>,
    match_expr: Option<String>,
}

// Filters apply after the latest-version reduction, mirroring the
// aggregation order: group, pick latest, then match.
fn build_list_filter(options: &ObjectListOptions) -> ListFilter {
    let mut clause = String::new();
    let mut binds: Vec<Value> = Vec::new();

    if !options.include_revoked {
        clause.push_str(" AND revoked = 0");
    }
    if !options.include_deprecated {
        clause.push_str(" AND deprecated = 0");
    }
    if let Some(state) = options.state {
        clause.push_str(" AND workflow_state = ?");
        binds.push(Value::Text(state.as_str().to_string()));
    }
    if let Some(kind) = options.kind {
        clause.push_str(" AND type = ?");
        binds.push(Value::Text(kind.as_str().to_string()));
    }

    let match_expr = options
        .search
        .as_deref()
        .and_then(build_match_expression);
    if let Some(expr) = &match_expr {
        clause.push_str(
            " AND id IN (
                SELECT rowid FROM attack_objects_fts WHERE attack_objects_fts MATCH ?
            )",
        );
        binds.push(Value::Text(expr.clone()));
    }

    ListFilter {
        clause,
        binds,
        match_expr,
    }
}

fn parse_object_row(row: &Row<'_>) -> RepoResult<AttackObject> {
    let type_text: String = row.get("type")?;
    let attributes_json: String = row.get("attributes")?;
    let attributes: ObjectAttributes = serde_json::from_str(&attributes_json).map_err(|err| {
        RepoError::InvalidData(format!(
            "invalid attributes payload for type `{type_text}`: {err}"
        ))
    })?;
    if attributes.kind().as_str() != type_text {
        return Err(RepoError::InvalidData(format!(
            "type column `{type_text}` does not match attributes discriminator `{}`",
            attributes.kind().as_str()
        )));
    }

    let workflow_state = match row.get::<_, Option<String>>("workflow_state")? {
        Some(value) => Some(WorkflowState::parse(&value).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid workflow state `{value}` in attack_objects.workflow_state"
            ))
        })?),
        None => None,
    };

    let external_references: Vec<ExternalReference> =
        from_json(&row.get::<_, String>("external_references")?, "external_references")?;
    let object_marking_refs: Vec<StixId> =
        from_json(&row.get::<_, String>("object_marking_refs")?, "object_marking_refs")?;

    let object = AttackObject {
        stix_id: row.get("stix_id")?,
        modified: row.get("modified")?,
        created: row.get("created")?,
        spec_version: row.get("spec_version")?,
        name: row.get("name")?,
        description: row.get("description")?,
        created_by_ref: row.get("created_by_ref")?,
        modified_by_ref: row.get("modified_by_ref")?,
        attack_spec_version: row.get("attack_spec_version")?,
        external_references,
        object_marking_refs,
        revoked: int_to_bool(row.get("revoked")?, "attack_objects.revoked")?,
        deprecated: int_to_bool(row.get("deprecated")?, "attack_objects.deprecated")?,
        workflow_state,
        attributes,
    };
    object.validate()?;
    Ok(object)
}

fn to_json<T: Serialize>(value: &T, what: &str) -> RepoResult<String> {
    serde_json::to_string(value)
        .map_err(|err| RepoError::InvalidData(format!("cannot serialize {what}: {err}")))
}

fn from_json<T: serde::de::DeserializeOwned>(value: &str, what: &str) -> RepoResult<T> {
    serde_json::from_str(value)
        .map_err(|err| RepoError::InvalidData(format!("invalid {what} payload: {err}")))
}

fn version_key(stix_id: &str, modified: i64) -> String {
    format!("{stix_id}/{modified}")
}

fn ensure_object_connection_ready(conn: &Connection) -> RepoResult<()> {
    let actual_version: u32 = conn
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .map_err(|err| RepoError::Db(DbError::Sqlite(err)))?;
    let expected_version = latest_version();
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "attack_objects")? {
        return Err(RepoError::MissingRequiredTable("attack_objects"));
    }
    for column in ["stix_id", "modified", "attributes"] {
        if !table_has_column(conn, "attack_objects", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "attack_objects",
                column,
            });
        }
    }

    Ok(())
}
