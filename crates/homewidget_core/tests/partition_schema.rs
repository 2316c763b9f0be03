use homewidget_core::db::schema::{inspect, SchemaState};
use homewidget_core::db::{open_db, open_db_in_memory};
use homewidget_core::{AppGroupStore, SharedStore};
use rusqlite::{params, Connection};

const PARTITION: &str = "group.com.efe.lifenotes";

#[test]
fn revision_defaults_to_one_and_rejects_zero() {
    let conn = open_db_in_memory().unwrap();

    conn.execute(
        "INSERT INTO shared_entries (partition, key, value) VALUES (?1, ?2, ?3)",
        params![PARTITION, "widget_title", "Pizza Tracker"],
    )
    .unwrap();
    assert_eq!(revision_of(&conn, PARTITION, "widget_title"), Some(1));

    let rejected = conn.execute(
        "INSERT INTO shared_entries (partition, key, value, revision) VALUES (?1, ?2, ?3, 0)",
        params![PARTITION, "widget_value", "42%"],
    );
    assert!(rejected.is_err(), "revision 0 must violate the CHECK");
    assert_eq!(revision_of(&conn, PARTITION, "widget_value"), None);
}

#[test]
fn entries_are_keyed_by_partition_and_key() {
    let conn = open_db_in_memory().unwrap();
    let insert = "INSERT INTO shared_entries (partition, key, value) VALUES (?1, ?2, ?3)";

    conn.execute(insert, params![PARTITION, "note", "{}"]).unwrap();
    conn.execute(insert, params!["group.other", "note", "{}"])
        .unwrap();
    assert!(conn
        .execute(insert, params![PARTITION, "note", "{\"note\":\"dup\"}"])
        .is_err());

    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM shared_entries", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 2);
}

#[test]
fn revisions_survive_reopening_the_partition() {
    let dir = tempfile::tempdir().unwrap();

    let store = AppGroupStore::new(dir.path());
    store.set(PARTITION, "widget_push", "{\"note\":\"a\"}").unwrap();
    store.set(PARTITION, "widget_push", "{\"note\":\"b\"}").unwrap();
    assert_eq!(
        store.get_revision(PARTITION, "widget_push").unwrap().unwrap().revision,
        2
    );
    let path = store.partition_path(PARTITION);
    drop(store);

    let reopened = AppGroupStore::new(dir.path());
    assert!(reopened
        .compare_and_set(PARTITION, "widget_push", Some(2), "{\"note\":\"c\"}")
        .unwrap());
    assert!(!reopened
        .compare_and_set(PARTITION, "widget_push", Some(2), "{\"note\":\"stale\"}")
        .unwrap());
    let stored = reopened
        .get_revision(PARTITION, "widget_push")
        .unwrap()
        .unwrap();
    assert_eq!(stored.revision, 3);
    assert_eq!(stored.value, "{\"note\":\"c\"}");
    drop(reopened);

    let conn = open_db(&path).unwrap();
    assert_eq!(inspect(&conn).unwrap(), SchemaState::Current);
    assert_eq!(revision_of(&conn, PARTITION, "widget_push"), Some(3));
}

#[test]
fn partition_with_future_schema_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let store = AppGroupStore::new(dir.path());
    let path = store.partition_path("group.future");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = store.get("group.future", "note").unwrap_err();
    assert!(err.is_unavailable());
}

#[test]
fn partitions_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let store = AppGroupStore::new(dir.path());
    store.set("group.a", "note", "{\"note\":\"a\"}").unwrap();
    store.set("group.b", "note", "{\"note\":\"b\"}").unwrap();

    assert_eq!(
        store.get("group.a", "note").unwrap().as_deref(),
        Some("{\"note\":\"a\"}")
    );
    assert_eq!(
        store.get("group.b", "note").unwrap().as_deref(),
        Some("{\"note\":\"b\"}")
    );
}

fn revision_of(conn: &Connection, partition: &str, key: &str) -> Option<i64> {
    conn.query_row(
        "SELECT revision FROM shared_entries WHERE partition = ?1 AND key = ?2",
        params![partition, key],
        |row| row.get(0),
    )
    .ok()
}
