//! End-to-end loads of fixture directories into an in-memory store.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use fixset_core::{
    identifier_for, FixtureError, Loader, ModelDef, Schema, TimestampStyle, LABEL_FIELD,
};
use fixset_storage::{Document, MemoryStore};
use serde_json::{json, Value};
use tempfile::TempDir;
use time::macros::datetime;

fn write(dir: &Path, relative: &str, content: &str) {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn schema() -> Schema {
    Schema::from_models(vec![
        ModelDef::new("User")
            .timestamps(TimestampStyle::Long, TimestampStyle::Long)
            .belongs_to("group", "Group")
            .habtm("tags", "Tag")
            .embeds_one("address", "Address"),
        ModelDef::new("Group").has_many("users", "User"),
        ModelDef::new("Tag"),
        ModelDef::new("Address").field_default("country", "uk"),
        ModelDef::new("Admin"),
        ModelDef::new("Post")
            .belongs_to("author", "User")
            .belongs_to_polymorphic("owner"),
    ])
    .unwrap()
}

fn no_overrides() -> BTreeMap<String, String> {
    BTreeMap::new()
}

fn by_label<'a>(store: &'a MemoryStore, model: &str, label: &str) -> &'a Document {
    store
        .documents(model)
        .iter()
        .find(|d| d.get(LABEL_FIELD) == Some(&json!(label)))
        .unwrap_or_else(|| panic!("no {} labelled {}", model, label))
}

fn hex(label: &str) -> Value {
    json!(identifier_for(label).to_hex())
}

#[test]
fn has_many_links_users_and_skips_store_when_cached() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "users.yml", "alice:\n  name: Alice\n");
    write(
        tmp.path(),
        "groups.yml",
        "admins:\n  name: Admins\n  users: [alice]\n",
    );
    let schema = schema();
    let mut store = MemoryStore::new();
    let mut loader = Loader::new(&schema);

    let sets = loader
        .load_fixtures(&mut store, tmp.path(), &["users", "groups"], &no_overrides())
        .unwrap();
    assert_eq!(sets.len(), 2);
    assert_eq!(sets[0].name(), "users");
    assert_eq!(sets[1].model(), "Group");

    let alice = by_label(&store, "User", "alice");
    let admins = by_label(&store, "Group", "admins");
    assert_eq!(alice.get("name"), Some(&json!("Alice")));
    assert_eq!(admins.get("name"), Some(&json!("Admins")));
    assert_eq!(alice.get("group_id"), Some(&hex("admins")));
    assert!(admins.get("users").is_none());

    let writes = store.writes();
    let again = loader
        .load_fixtures(&mut store, tmp.path(), &["users", "groups"], &no_overrides())
        .unwrap();
    assert_eq!(store.writes(), writes);
    assert!(Arc::ptr_eq(&sets[0], &again[0]));
    assert_eq!(sets[1], again[1]);
}

#[test]
fn has_many_inline_records_get_owner_key() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "users.yml", "alice:\n  name: Alice\n");
    write(
        tmp.path(),
        "groups.yml",
        "admins:\n  name: Admins\n  users:\n    - name: X\n    - alice\n",
    );
    let schema = schema();
    let mut store = MemoryStore::new();

    Loader::new(&schema)
        .load_fixtures(&mut store, tmp.path(), &["users", "groups"], &no_overrides())
        .unwrap();

    let users = store.documents("User");
    assert_eq!(users.len(), 2);
    let inline = users
        .iter()
        .find(|d| d.get("name") == Some(&json!("X")))
        .unwrap();
    assert!(!inline.contains(LABEL_FIELD));
    assert_eq!(inline.get("group_id"), Some(&hex("admins")));
    assert_eq!(by_label(&store, "User", "alice").get("group_id"), Some(&hex("admins")));
}

#[test]
fn pinned_id_is_reported_by_the_set() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "users.yml",
        "alice:\n  _id: 0123456789abcdef01234567\n  name: Alice\nbob:\n  name: Bob\n",
    );
    let schema = schema();
    let mut store = MemoryStore::new();

    let sets = Loader::new(&schema)
        .load_fixtures(&mut store, tmp.path(), &["users"], &no_overrides())
        .unwrap();
    let users = &sets[0];

    let alice = by_label(&store, "User", "alice");
    assert_eq!(alice.id().unwrap().to_hex(), "0123456789abcdef01234567");
    assert_eq!(users.identifier("alice").unwrap(), alice.id());
    assert_eq!(users.identifier("bob").unwrap(), by_label(&store, "User", "bob").id());
    assert_eq!(users.identifier("bob").unwrap(), Some(identifier_for("bob")));
    assert_eq!(users.identifier("carol").unwrap(), None);
}

#[test]
fn identifiers_follow_labels_across_record_sets() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "users.yml", "alice:\n  group: admins\n");
    write(tmp.path(), "groups.yml", "admins:\n  name: Admins\n");
    let schema = schema();
    let mut store = MemoryStore::new();

    Loader::new(&schema)
        .load_fixtures(&mut store, tmp.path(), &["users", "groups"], &no_overrides())
        .unwrap();

    let alice = by_label(&store, "User", "alice");
    let admins = by_label(&store, "Group", "admins");
    assert_eq!(alice.id(), Some(identifier_for("alice")));
    assert_eq!(admins.id(), Some(identifier_for("admins")));
    assert_eq!(alice.get("group_id"), Some(&hex("admins")));
    assert_eq!(store.documents("Group").len(), 1);
    assert_eq!(admins.get("name"), Some(&json!("Admins")));
}

#[test]
fn reloading_in_a_fresh_loader_reuses_labelled_documents() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "users.yml", "alice:\n  name: Alice\nbob:\n  name: Bob\n");
    let schema = schema();
    let mut store = MemoryStore::new();

    for _ in 0..2 {
        Loader::new(&schema)
            .load_fixtures(&mut store, tmp.path(), &["users"], &no_overrides())
            .unwrap();
    }
    assert_eq!(store.documents("User").len(), 2);
}

#[test]
fn arrays_from_separate_record_sets_are_concatenated() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "users.yml", "alice:\n  roles: [reader]\n");
    write(tmp.path(), "staff.yml", "alice:\n  roles: [writer]\n");
    let schema = schema();
    let mut store = MemoryStore::new();
    let overrides = BTreeMap::from([("staff".to_string(), "User".to_string())]);

    let sets = Loader::new(&schema)
        .load_fixtures(&mut store, tmp.path(), &["users", "staff"], &overrides)
        .unwrap();
    assert_eq!(sets[1].model(), "User");

    let alice = by_label(&store, "User", "alice");
    assert_eq!(alice.get("roles"), Some(&json!(["writer", "reader"])));
}

#[test]
fn habtm_updates_both_sides() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "users.yml", "alice:\n  tags: [red, blue]\n");
    let schema = schema();
    let mut store = MemoryStore::new();

    Loader::new(&schema)
        .load_fixtures(&mut store, tmp.path(), &["users"], &no_overrides())
        .unwrap();

    let alice = by_label(&store, "User", "alice");
    let ids = alice.get("tag_ids").and_then(Value::as_array).unwrap();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&hex("red")));
    assert!(ids.contains(&hex("blue")));

    let red = by_label(&store, "Tag", "red");
    assert_eq!(red.get("user_ids"), Some(&json!([identifier_for("alice").to_hex()])));
}

#[test]
fn embedded_defaults_are_not_persisted() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "users.yml",
        "alice:\n  address:\n    street: Main St\n    country: uk\n",
    );
    let schema = schema();
    let mut store = MemoryStore::new();

    Loader::new(&schema)
        .load_fixtures(&mut store, tmp.path(), &["users"], &no_overrides())
        .unwrap();

    let alice = by_label(&store, "User", "alice");
    assert_eq!(alice.get("address"), Some(&json!({ "street": "Main St" })));
}

#[test]
fn polymorphic_label_sets_type_and_key() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "posts.yml", "hello:\n  owner: bob (Admin)\n");
    let schema = schema();
    let mut store = MemoryStore::new();

    Loader::new(&schema)
        .load_fixtures(&mut store, tmp.path(), &["posts"], &no_overrides())
        .unwrap();

    let post = by_label(&store, "Post", "hello");
    assert_eq!(post.get("owner_type"), Some(&json!("Admin")));
    assert_eq!(post.get("owner_id"), Some(&hex("bob")));
    assert_eq!(by_label(&store, "Admin", "bob").id(), Some(identifier_for("bob")));
}

#[test]
fn inline_belongs_to_creates_anonymous_document() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "posts.yml", "hello:\n  author:\n    name: X\n");
    let schema = schema();
    let mut store = MemoryStore::new();

    Loader::new(&schema)
        .load_fixtures(&mut store, tmp.path(), &["posts"], &no_overrides())
        .unwrap();

    let users = store.documents("User");
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].get("name"), Some(&json!("X")));
    assert!(!users[0].contains(LABEL_FIELD));

    let post = by_label(&store, "Post", "hello");
    let author_id = users[0].id().unwrap();
    assert_eq!(post.get("author_id"), Some(&json!(author_id.to_hex())));
}

#[test]
fn nested_record_under_polymorphic_relation_is_rejected() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "posts.yml", "hello:\n  owner:\n    name: X\n");
    let schema = schema();
    let mut store = MemoryStore::new();

    let err = Loader::new(&schema)
        .load_fixtures(&mut store, tmp.path(), &["posts"], &no_overrides())
        .unwrap_err();
    assert!(matches!(err, FixtureError::Definition { .. }), "{err}");
}

#[test]
fn defaults_label_interpolation_and_timestamps() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "users.yml",
        "DEFAULTS: &defaults\n  role: member\n  email: $LABEL@example.com\n\
         alice:\n  <<: *defaults\n  name: Alice\n",
    );
    let schema = schema();
    let mut store = MemoryStore::new();

    let sets = Loader::new(&schema)
        .with_clock(datetime!(2024-01-02 03:04:05 UTC))
        .load_fixtures(&mut store, tmp.path(), &["users"], &no_overrides())
        .unwrap();
    assert_eq!(sets[0].labels().collect::<Vec<_>>(), ["alice"]);
    assert!(sets[0].get("DEFAULTS").is_none());

    let alice = by_label(&store, "User", "alice");
    assert_eq!(alice.get("role"), Some(&json!("member")));
    assert_eq!(alice.get("email"), Some(&json!("alice@example.com")));
    assert_eq!(alice.get("created_at"), Some(&json!("2024-01-02T03:04:05Z")));
    assert_eq!(alice.get("updated_at"), Some(&json!("2024-01-02T03:04:05Z")));
    assert_eq!(store.documents("User").len(), 1);
}

#[test]
fn directory_files_and_top_level_file_share_one_set() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "users/admins/root.yml", "root:\n  name: Root\n");
    write(tmp.path(), "users/guests.yaml", "guest:\n  name: Guest\n");
    write(tmp.path(), "users.yml", "alice:\n  name: Alice\n");
    let schema = schema();
    let mut store = MemoryStore::new();

    let sets = Loader::new(&schema)
        .load_fixtures(&mut store, tmp.path(), &["users"], &no_overrides())
        .unwrap();

    assert_eq!(sets[0].labels().collect::<Vec<_>>(), ["root", "guest", "alice"]);
    assert_eq!(store.documents("User").len(), 3);
}

#[test]
fn missing_record_set_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let schema = schema();
    let mut store = MemoryStore::new();
    let mut loader = Loader::new(&schema);

    let err = loader
        .load_fixtures(&mut store, tmp.path(), &["ghosts"], &no_overrides())
        .unwrap_err();
    assert!(matches!(err, FixtureError::MissingSource { ref name, .. } if name == "ghosts"));
    assert!(!loader.is_cached("ghosts"));
}

#[test]
fn store_failure_aborts_load_without_caching() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "users.yml", "alice:\n  name: Alice\n");
    let schema = schema();
    let mut store = MemoryStore::new();
    store.fail_writes(true);
    let mut loader = Loader::new(&schema);

    let err = loader
        .load_fixtures(&mut store, tmp.path(), &["users"], &no_overrides())
        .unwrap_err();
    assert!(matches!(err, FixtureError::Store(_)), "{err}");
    assert!(!loader.is_cached("users"));
    assert!(loader.all_loaded().contains_key("users"));
}

#[test]
fn failed_parse_registers_no_set_from_that_call() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "users.yml", "alice:\n  name: Alice\n");
    let schema = schema();
    let mut store = MemoryStore::new();
    let mut loader = Loader::new(&schema);

    let err = loader
        .load_fixtures(&mut store, tmp.path(), &["users", "ghosts"], &no_overrides())
        .unwrap_err();
    assert!(matches!(err, FixtureError::MissingSource { .. }), "{err}");
    assert!(loader.all_loaded().is_empty());
    assert!(!loader.is_cached("users"));
    assert!(store.is_empty());
}

#[test]
fn fixtures_bypass_model_validation() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "users.yml", "alice:\n  name: Alice\n");
    let schema = schema();
    let mut store =
        MemoryStore::new().with_validator("User", |_| Err("email is required".to_string()));

    Loader::new(&schema)
        .load_fixtures(&mut store, tmp.path(), &["users"], &no_overrides())
        .unwrap();
    assert_eq!(store.documents("User").len(), 1);
}

#[test]
fn unknown_model_is_parsed_but_not_written() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "widgets.yml", "one:\n  size: 3\n");
    let schema = schema();
    let mut store = MemoryStore::new();
    let mut loader = Loader::new(&schema);

    let sets = loader
        .load_fixtures(&mut store, tmp.path(), &["widgets"], &no_overrides())
        .unwrap();
    assert_eq!(sets[0].model(), "Widget");
    assert_eq!(sets[0].len(), 1);
    assert!(store.is_empty());
    assert!(loader.is_cached("widgets"));
}

#[test]
fn duplicate_names_load_once() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "users.yml", "alice:\n  name: Alice\n");
    let schema = schema();
    let mut store = MemoryStore::new();

    let sets = Loader::new(&schema)
        .load_fixtures(&mut store, tmp.path(), &["users", "users"], &no_overrides())
        .unwrap();
    assert_eq!(sets.len(), 2);
    assert!(Arc::ptr_eq(&sets[0], &sets[1]));
    assert_eq!(store.documents("User").len(), 1);
}

#[test]
fn reset_cache_forces_reload_but_keeps_registry() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "users.yml", "alice:\n  name: Alice\n");
    let schema = schema();
    let mut store = MemoryStore::new();
    let mut loader = Loader::new(&schema);

    loader
        .load_fixtures(&mut store, tmp.path(), &["users"], &no_overrides())
        .unwrap();
    assert!(loader.is_cached("users"));
    assert!(loader.cached(&["users", "groups"])[1].is_none());

    loader.reset_cache();
    assert!(!loader.is_cached("users"));
    assert!(loader.cached(&["users"])[0].is_none());
    assert!(loader.all_loaded().contains_key("users"));

    let writes = store.writes();
    loader
        .load_fixtures(&mut store, tmp.path(), &["users"], &no_overrides())
        .unwrap();
    assert!(store.writes() > writes);
    assert_eq!(store.documents("User").len(), 1);
}
