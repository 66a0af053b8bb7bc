use proptest::prelude::*;
use std::{collections::HashSet, sync::Arc, thread};
use widedb::{
    Error,
    db::{SessionErrorKind, TableRef},
    error::ErrorClass,
    obs::CounterSink,
    prelude::*,
};

#[derive(Clone, Debug, PartialEq, Entity)]
#[entity(column_family = "users")]
struct User {
    #[column(key)]
    id: String,
    #[column(index)]
    age: i32,
    email: Option<String>,
    tags: Vec<String>,
}

impl User {
    fn new(id: impl Into<String>, age: i32) -> Self {
        Self {
            id: id.into(),
            age,
            email: None,
            tags: Vec::new(),
        }
    }
}

fn persistence() -> (Arc<MemorySession>, Persistence<MemorySession>) {
    let session = Arc::new(MemorySession::new());
    let persistence =
        Persistence::new(Arc::clone(&session), "app").expect("persistence should start");

    (session, persistence)
}

#[test]
fn insert_find_update_delete() {
    let (_session, persistence) = persistence();

    persistence
        .insert(&User::new("u1", 30))
        .expect("insert should succeed");
    let found: Option<User> = persistence.find_by_key("u1").expect("find should succeed");
    assert_eq!(found, Some(User::new("u1", 30)));

    persistence
        .update(&User::new("u1", 31))
        .expect("update should succeed");
    let found: Option<User> = persistence.find_by_key("u1").expect("find should succeed");
    assert_eq!(found.map(|u| u.age), Some(31));

    persistence
        .delete_by_key::<User>("u1")
        .expect("delete should succeed");
    let found: Option<User> = persistence.find_by_key("u1").expect("find should succeed");
    assert_eq!(found, None);
}

#[test]
fn count_after_inserts_and_deletes() {
    let (_session, persistence) = persistence();
    let users: Vec<User> = (0..10).map(|i| User::new(format!("u{i}"), i)).collect();

    persistence.insert_many(&users).expect("insert should succeed");
    persistence
        .delete_many(&users[..4])
        .expect("delete should succeed");
    assert_eq!(persistence.count::<User>().expect("count should succeed"), 6);

    // deleting absent keys never drives the count below the rows present
    let absent: Vec<User> = (100..120).map(|i| User::new(format!("u{i}"), i)).collect();
    persistence
        .delete_many(&absent)
        .expect("delete should succeed");
    persistence
        .delete_many(&users)
        .expect("delete should succeed");
    assert_eq!(persistence.count::<User>().expect("count should succeed"), 0);
}

#[test]
fn upsert_never_clears_columns() {
    let (_session, persistence) = persistence();
    let mut user = User::new("u1", 30);
    user.email = Some("u1@example.com".into());
    persistence.insert(&user).expect("insert should succeed");

    user.email = None;
    persistence.upsert(&user).expect("upsert should succeed");

    let found: User = persistence
        .find_by_key("u1")
        .expect("find should succeed")
        .expect("user should exist");
    assert_eq!(found.email.as_deref(), Some("u1@example.com"));

    persistence
        .delete_columns::<User>("u1", &["age"])
        .expect_err("age is not optional");
    persistence
        .delete_columns::<User>("u1", &["email"])
        .expect("column delete should succeed");
    let found: User = persistence
        .find_by_key("u1")
        .expect("find should succeed")
        .expect("user should exist");
    assert_eq!(found.email, None);
}

#[test]
fn range_bounds_inclusive_and_exclusive() {
    let (_session, persistence) = persistence();
    persistence
        .insert(&User::new("u1", 30))
        .expect("insert should succeed");

    let hit: Vec<User> = persistence
        .find_by_key_and_index_range("u1", "age", IndexRange::inclusive(30, 40))
        .expect("range read should succeed");
    assert_eq!(hit.len(), 1);

    let miss: Vec<User> = persistence
        .find_by_key_and_index_range("u1", "age", IndexRange::exclusive(30, 40))
        .expect("range read should succeed");
    assert!(miss.is_empty());

    // bounds are used as given
    let reversed: Vec<User> = persistence
        .find_by_key_and_index_range("u1", "age", IndexRange::inclusive(40, 30))
        .expect("range read should succeed");
    assert!(reversed.is_empty());
}

#[test]
fn key_and_index_equality() {
    let (_session, persistence) = persistence();
    persistence
        .insert(&User::new("u1", 30))
        .expect("insert should succeed");

    let hit: Vec<User> = persistence
        .find_by_key_and_index("u1", "age", 30)
        .expect("read should succeed");
    assert_eq!(hit.len(), 1);

    // email is not indexed; the read is filtered instead
    let miss: Vec<User> = persistence
        .find_by_key_and_index("u1", "email", "nobody@example.com")
        .expect("filtered read should succeed");
    assert!(miss.is_empty());
}

#[test]
fn invalid_arguments_fail_before_execution() {
    let (session, persistence) = persistence();
    persistence
        .ensure_column_family::<User>()
        .expect("table should exist");
    session.clear_executed();

    let wrong_type = persistence
        .find_by_key::<User>(42)
        .expect_err("int key for a text column");
    let unknown = persistence
        .find_by_index::<User>("height", 1)
        .expect_err("no such column");
    let null_key = persistence
        .find_by_key::<User>(Option::<String>::None)
        .expect_err("null key");

    for err in [wrong_type, unknown, null_key] {
        assert_eq!(err.class(), ErrorClass::InvalidArgument, "{err}");
    }
    assert!(session.executed().is_empty());
}

#[test]
fn concurrent_first_use_converges() {
    let session = Arc::new(MemorySession::new());

    thread::scope(|scope| {
        for worker in 0..8 {
            let session = Arc::clone(&session);
            scope.spawn(move || {
                let persistence =
                    Persistence::new(session, "app").expect("persistence should start");
                persistence
                    .insert(&User::new(format!("w{worker}"), worker))
                    .expect("insert should succeed");
            });
        }
    });

    assert_eq!(session.row_count(&TableRef::new("app", "users")), Some(8));
    assert!(session.has_index(&TableRef::new("app", "users"), "users_age_idx"));
}

#[test]
fn shared_facade_across_threads() {
    let (_session, persistence) = persistence();

    thread::scope(|scope| {
        for worker in 0..4 {
            let persistence = &persistence;
            scope.spawn(move || {
                for i in 0..25 {
                    persistence
                        .insert(&User::new(format!("w{worker}-{i}"), i))
                        .expect("insert should succeed");
                }
            });
        }
    });

    assert_eq!(persistence.count::<User>().expect("count should succeed"), 100);
    assert_eq!(persistence.descriptors().len(), 1);
}

#[test]
fn unreachable_consistency_is_reported() {
    let (session, persistence) = persistence();
    persistence
        .insert(&User::new("u1", 30))
        .expect("insert should succeed");
    session.set_live_replicas(1);

    let found: Vec<User> = persistence
        .find_all_with(Consistency::One)
        .expect("ONE is reachable");
    assert_eq!(found.len(), 1);

    let err = persistence
        .find_all_with::<User>(Consistency::All)
        .expect_err("ALL is not reachable");
    let Error::Consistency(err) = err else {
        panic!("expected a consistency error");
    };
    assert_eq!(err.consistency, Some(Consistency::All));
    assert_eq!(err.source.kind, SessionErrorKind::Unavailable);
}

#[test]
fn batch_failure_leaves_earlier_statements_applied() {
    let (session, persistence) = persistence();
    persistence
        .ensure_column_family::<User>()
        .expect("table should exist");

    let err = persistence
        .batch()
        .insert(&User::new("a", 1))
        .statement(
            persistence
                .delete_builder::<User>(&[])
                .where_eq("age", 1)
                .into_statement(),
        )
        .insert(&User::new("b", 2))
        .execute()
        .expect_err("delete by a non-key column is rejected");

    assert_eq!(err.class(), ErrorClass::Write);
    assert_eq!(session.row_count(&TableRef::new("app", "users")), Some(1));
}

#[test]
fn find_by_keys_honours_key_order() {
    let (_session, persistence) = persistence();
    for id in ["a", "b", "c", "d"] {
        persistence
            .insert(&User::new(id, 1))
            .expect("insert should succeed");
    }

    let found: Vec<User> = persistence
        .find_by_keys(["d", "b", "x", "b"])
        .expect("read should succeed");

    let ids: Vec<&str> = found.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, ["d", "b"]);
}

#[test]
fn builders_share_the_facade_state() {
    let (_session, persistence) = persistence();

    persistence
        .insert_builder::<User>("u1")
        .value("age", 20)
        .execute()
        .expect("insert should succeed");
    persistence
        .update_builder_for::<User>("u1")
        .add("tags", vec!["x", "y"])
        .execute()
        .expect("update should succeed");

    let user = persistence
        .select::<User>()
        .eq("id", "u1")
        .first()
        .expect("select should succeed")
        .expect("user should exist");
    assert_eq!(user.tags, ["x", "y"]);

    persistence
        .delete_builder_for::<User>(&[], "u1")
        .execute()
        .expect("delete should succeed");
    assert_eq!(persistence.select::<User>().count().expect("count"), 0);
}

#[test]
fn config_file_drives_construction() {
    let config = PersistenceConfig::from_toml_str(
        r#"
            keyspace = "shop"
            request_timeout_ms = 500

            [replication]
            factor = 1
        "#,
    )
    .expect("config should parse");
    let session = Arc::new(MemorySession::new());
    let sink = Arc::new(CounterSink::new());

    let persistence = Persistence::from_config(Arc::clone(&session), &config)
        .expect("persistence should start");
    assert_eq!(persistence.default_keyspace(), "shop");
    assert_eq!(
        session
            .keyspace_replication("shop")
            .map(|r| r.factor),
        Some(1)
    );

    // with one replica, QUORUM needs exactly that replica
    let persistence = Persistence::builder(Arc::clone(&session), "shop")
        .metrics_sink(sink.clone())
        .build()
        .expect("persistence should start");
    session.set_live_replicas(0);
    let err = persistence
        .insert_with(&User::new("u1", 1), Consistency::Quorum)
        .expect_err("no replica is live");
    assert_eq!(err.class(), ErrorClass::Consistency);
    assert_eq!(sink.snapshot().unavailable, 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn find_by_keys_agrees_with_single_lookups(picks in proptest::collection::vec(0_u8..12, 0..10)) {
        let (_session, persistence) = persistence();
        for id in 0..8 {
            persistence
                .insert(&User::new(format!("k{id}"), id))
                .expect("insert should succeed");
        }
        let requested: Vec<String> = picks.iter().map(|k| format!("k{k}")).collect();

        let found: Vec<User> = persistence
            .find_by_keys(requested.iter().map(String::as_str))
            .expect("batch read should succeed");

        let mut seen = HashSet::new();
        let mut expected = Vec::new();
        for key in requested.iter().filter(|key| seen.insert(*key)) {
            let user: Option<User> = persistence
                .find_by_key(key.as_str())
                .expect("single read should succeed");
            expected.extend(user);
        }
        prop_assert_eq!(found, expected);
    }
}
