use workbench_core::db::open_db_in_memory;
use workbench_core::{
    AttackObject, AttackObjectRepository, ObjectAttributes, ObjectListOptions, ObjectType,
    SqliteObjectRepository, WorkflowState,
};

const T1: i64 = 1_700_000_000_000;
const T2: i64 = 1_700_000_060_000;

const TECHNIQUE_A: &str = "attack-pattern--00000000-0000-4000-8000-00000000000a";
const TECHNIQUE_B: &str = "attack-pattern--00000000-0000-4000-8000-00000000000b";
const TECHNIQUE_C: &str = "attack-pattern--00000000-0000-4000-8000-00000000000c";
const TACTIC_A: &str = "x-mitre-tactic--00000000-0000-4000-8000-00000000000a";

fn technique_with_id(stix_id: &str, name: &str, timestamp: i64) -> AttackObject {
    AttackObject::with_id(
        stix_id.to_string(),
        ObjectAttributes::Technique {
            platforms: Vec::new(),
            detection: None,
            is_subtechnique: false,
        },
        name,
        timestamp,
    )
}

fn tactic_with_id(stix_id: &str, name: &str, timestamp: i64) -> AttackObject {
    AttackObject::with_id(
        stix_id.to_string(),
        ObjectAttributes::Tactic { shortname: None },
        name,
        timestamp,
    )
}

#[test]
fn retrieve_all_excludes_revoked_and_deprecated_by_default() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteObjectRepository::try_new(&conn).unwrap();

    let active = technique_with_id(TECHNIQUE_A, "Active", T1);
    let mut revoked = technique_with_id(TECHNIQUE_B, "Revoked", T1);
    revoked.revoked = true;
    let mut deprecated = technique_with_id(TECHNIQUE_C, "Deprecated", T1);
    deprecated.deprecated = true;
    repo.create_object(&active).unwrap();
    repo.create_object(&revoked).unwrap();
    repo.create_object(&deprecated).unwrap();

    let visible = repo.retrieve_all(&ObjectListOptions::default()).unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].stix_id, TECHNIQUE_A);

    let with_revoked = repo
        .retrieve_all(&ObjectListOptions {
            include_revoked: true,
            ..ObjectListOptions::default()
        })
        .unwrap();
    assert_eq!(with_revoked.len(), 2);

    let with_everything = repo
        .retrieve_all(&ObjectListOptions {
            include_revoked: true,
            include_deprecated: true,
            ..ObjectListOptions::default()
        })
        .unwrap();
    assert_eq!(with_everything.len(), 3);
}

#[test]
fn deprecated_latest_version_hides_the_id_entirely() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteObjectRepository::try_new(&conn).unwrap();

    let clean = technique_with_id(TECHNIQUE_A, "Once clean", T1);
    repo.create_object(&clean).unwrap();
    let mut successor = clean.next_version(T2);
    successor.deprecated = true;
    repo.create_object(&successor).unwrap();

    // The reduction picks the deprecated latest, then the filter drops
    // it; the older clean version is never considered.
    let visible = repo.retrieve_all(&ObjectListOptions::default()).unwrap();
    assert!(visible.is_empty());

    let included = repo
        .retrieve_all(&ObjectListOptions {
            include_deprecated: true,
            ..ObjectListOptions::default()
        })
        .unwrap();
    assert_eq!(included.len(), 1);
    assert_eq!(included[0].modified, T2);
}

#[test]
fn retrieve_all_filters_by_workflow_state() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteObjectRepository::try_new(&conn).unwrap();

    let mut draft = technique_with_id(TECHNIQUE_A, "Draft", T1);
    draft.workflow_state = Some(WorkflowState::WorkInProgress);
    let mut reviewed = technique_with_id(TECHNIQUE_B, "Reviewed", T1);
    reviewed.workflow_state = Some(WorkflowState::Reviewed);
    repo.create_object(&draft).unwrap();
    repo.create_object(&reviewed).unwrap();

    let drafts = repo
        .retrieve_all(&ObjectListOptions {
            state: Some(WorkflowState::WorkInProgress),
            ..ObjectListOptions::default()
        })
        .unwrap();
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].stix_id, TECHNIQUE_A);
}

#[test]
fn retrieve_all_filters_by_object_kind() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteObjectRepository::try_new(&conn).unwrap();

    repo.create_object(&technique_with_id(TECHNIQUE_A, "Technique", T1))
        .unwrap();
    repo.create_object(&tactic_with_id(TACTIC_A, "Tactic", T1))
        .unwrap();

    let tactics = repo
        .retrieve_all(&ObjectListOptions {
            kind: Some(ObjectType::Tactic),
            ..ObjectListOptions::default()
        })
        .unwrap();
    assert_eq!(tactics.len(), 1);
    assert_eq!(tactics[0].stix_id, TACTIC_A);
}

#[test]
fn retrieve_all_orders_by_id_and_paginates() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteObjectRepository::try_new(&conn).unwrap();

    repo.create_object(&technique_with_id(TECHNIQUE_C, "c", T1))
        .unwrap();
    repo.create_object(&technique_with_id(TECHNIQUE_A, "a", T1))
        .unwrap();
    repo.create_object(&technique_with_id(TECHNIQUE_B, "b", T1))
        .unwrap();

    let page = repo
        .retrieve_all(&ObjectListOptions {
            limit: Some(2),
            offset: 1,
            ..ObjectListOptions::default()
        })
        .unwrap();

    assert_eq!(page.len(), 2);
    assert_eq!(page[0].stix_id, TECHNIQUE_B);
    assert_eq!(page[1].stix_id, TECHNIQUE_C);
}

#[test]
fn paged_retrieval_reports_total_before_pagination() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteObjectRepository::try_new(&conn).unwrap();

    repo.create_object(&technique_with_id(TECHNIQUE_A, "a", T1))
        .unwrap();
    repo.create_object(&technique_with_id(TECHNIQUE_B, "b", T1))
        .unwrap();

    let page = repo
        .retrieve_all_paged(&ObjectListOptions {
            limit: Some(1),
            offset: 0,
            ..ObjectListOptions::default()
        })
        .unwrap();

    assert_eq!(page.data.len(), 1);
    assert_eq!(page.pagination.total, 2);
    assert_eq!(page.pagination.offset, 0);
    assert_eq!(page.pagination.limit, Some(1));
}

#[test]
fn paged_retrieval_past_the_last_match_keeps_the_total() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteObjectRepository::try_new(&conn).unwrap();

    repo.create_object(&technique_with_id(TECHNIQUE_A, "a", T1))
        .unwrap();
    repo.create_object(&technique_with_id(TECHNIQUE_B, "b", T1))
        .unwrap();

    let page = repo
        .retrieve_all_paged(&ObjectListOptions {
            limit: Some(10),
            offset: 5,
            ..ObjectListOptions::default()
        })
        .unwrap();

    assert!(page.data.is_empty());
    assert_eq!(page.pagination.total, 2);
}

#[test]
fn paged_retrieval_with_no_matches_is_empty_not_error() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteObjectRepository::try_new(&conn).unwrap();

    let page = repo
        .retrieve_all_paged(&ObjectListOptions::default())
        .unwrap();

    assert_eq!(page.pagination.total, 0);
    assert!(page.data.is_empty());
}

#[test]
fn search_applies_after_latest_reduction() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteObjectRepository::try_new(&conn).unwrap();

    // A's older version mentions the term, its latest does not.
    let mut a_old = technique_with_id(TECHNIQUE_A, "Container escape", T1);
    a_old.description = Some("A zebra wanders through the savanna.".to_string());
    repo.create_object(&a_old).unwrap();
    let mut a_new = a_old.next_version(T2);
    a_new.description = Some("Plain successor text.".to_string());
    repo.create_object(&a_new).unwrap();

    // B's only (latest) version mentions the term.
    let mut b = technique_with_id(TECHNIQUE_B, "Watering hole", T1);
    b.description = Some("A zebra sighting in the wild.".to_string());
    repo.create_object(&b).unwrap();

    let zebra_hits = repo
        .retrieve_all(&ObjectListOptions {
            search: Some("zebra".to_string()),
            ..ObjectListOptions::default()
        })
        .unwrap();
    assert_eq!(zebra_hits.len(), 1);
    assert_eq!(zebra_hits[0].stix_id, TECHNIQUE_B);

    let successor_hits = repo
        .retrieve_all(&ObjectListOptions {
            search: Some("successor".to_string()),
            ..ObjectListOptions::default()
        })
        .unwrap();
    assert_eq!(successor_hits.len(), 1);
    assert_eq!(successor_hits[0].stix_id, TECHNIQUE_A);
    assert_eq!(successor_hits[0].modified, T2);
}

#[test]
fn paged_envelope_serializes_to_wire_shape() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteObjectRepository::try_new(&conn).unwrap();

    repo.create_object(&technique_with_id(TECHNIQUE_A, "a", T1))
        .unwrap();

    let page = repo
        .retrieve_all_paged(&ObjectListOptions {
            limit: Some(5),
            ..ObjectListOptions::default()
        })
        .unwrap();

    let json = serde_json::to_value(&page).unwrap();
    assert_eq!(json["pagination"]["total"], 1);
    assert_eq!(json["pagination"]["offset"], 0);
    assert_eq!(json["pagination"]["limit"], 5);
    assert_eq!(json["data"][0]["id"], TECHNIQUE_A);
    assert_eq!(json["data"][0]["type"], "attack-pattern");
}
