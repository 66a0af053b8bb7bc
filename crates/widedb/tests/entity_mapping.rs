use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};
use time::OffsetDateTime;
use widedb::{
    Error,
    db::{ReadError, TableRef},
    model::ColumnType,
    prelude::*,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq, FieldEnum)]
enum Plan {
    Free,
    #[field_enum(rename = "pro")]
    Professional,
}

#[derive(Clone, Debug, PartialEq, Entity)]
#[entity(column_family = "accounts")]
struct Account {
    #[column(key)]
    id: String,
    #[column(index)]
    plan: Plan,
    #[column(name = "display")]
    display_name: Option<String>,
    labels: BTreeSet<String>,
    limits: BTreeMap<String, i64>,
    opened: OffsetDateTime,
    #[column(skip)]
    scratch: Vec<u8>,
}

impl Account {
    fn new(id: &str, plan: Plan) -> Self {
        Self {
            id: id.to_string(),
            plan,
            display_name: None,
            labels: BTreeSet::new(),
            limits: BTreeMap::new(),
            opened: OffsetDateTime::from_unix_timestamp(1_700_000_000)
                .expect("fixed timestamp should be valid"),
            scratch: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Entity)]
#[entity(keyspace = "audit")]
struct AuditEvent {
    #[column(key)]
    id: i64,
    message: String,
}

fn persistence() -> (Arc<MemorySession>, Persistence<MemorySession>) {
    let session = Arc::new(MemorySession::new());
    let persistence =
        Persistence::new(Arc::clone(&session), "app").expect("persistence should start");

    (session, persistence)
}

#[test]
fn derived_model_matches_the_attributes() {
    let model = Account::model();
    assert_eq!(Account::ENTITY_NAME, "Account");
    assert_eq!(model.column_family, "accounts");
    assert_eq!(model.keyspace, None);

    let descriptor =
        EntityDescriptor::resolve(&model, "app").expect("derived model should resolve");
    assert_eq!(descriptor.primary_key().column(), "id");
    assert_eq!(
        descriptor
            .binding_for_field("display_name")
            .map(|b| b.column()),
        Some("display")
    );
    assert!(descriptor.binding_for_field("scratch").is_none());
    assert_eq!(
        descriptor.binding("limits").map(|b| b.column_type().clone()),
        Some(ColumnType::map(ColumnType::Text, ColumnType::BigInt))
    );
    assert_eq!(descriptor.binding("plan").map(|b| b.is_nullable()), Some(false));
    assert_eq!(descriptor.binding("display").map(|b| b.is_nullable()), Some(true));
    assert_eq!(descriptor.binding("labels").map(|b| b.is_nullable()), Some(true));
    assert_eq!(
        descriptor.default_index().map(|i| i.name()),
        Some("accounts_plan_idx")
    );
}

#[test]
fn collections_enums_and_timestamps_round_trip() {
    let (_session, persistence) = persistence();
    let mut account = Account::new("a1", Plan::Professional);
    account.display_name = Some("Ada".into());
    account.labels = ["beta", "admin"].into_iter().map(String::from).collect();
    account.limits = [("requests".to_string(), 1_000), ("storage".to_string(), 5)]
        .into_iter()
        .collect();
    account.scratch = vec![1, 2, 3];

    persistence.insert(&account).expect("insert should succeed");
    let found: Account = persistence
        .find_by_key("a1")
        .expect("find should succeed")
        .expect("account should exist");

    // skipped fields come back as their default
    assert_eq!(
        found,
        Account {
            scratch: Vec::new(),
            ..account
        }
    );
}

#[test]
fn enum_index_lookup_uses_the_stored_name() {
    let (session, persistence) = persistence();
    persistence
        .insert_many(&[
            Account::new("a1", Plan::Free),
            Account::new("a2", Plan::Professional),
            Account::new("a3", Plan::Professional),
        ])
        .expect("batch insert should succeed");

    let pros: Vec<Account> = persistence
        .find_by_default_index(Plan::Professional)
        .expect("index read should succeed");
    assert_eq!(pros.len(), 2);

    let rows = session
        .execute_raw("SELECT plan FROM app.accounts WHERE id = 'a2'")
        .expect("raw read should succeed");
    assert_eq!(rows[0].get("plan"), Some(&Value::Text("pro".into())));
}

#[test]
fn empty_collections_read_back_empty() {
    let (_session, persistence) = persistence();
    persistence
        .insert(&Account::new("a1", Plan::Free))
        .expect("insert should succeed");

    let found: Account = persistence
        .find_by_key("a1")
        .expect("find should succeed")
        .expect("account should exist");

    assert!(found.labels.is_empty());
    assert!(found.limits.is_empty());
    assert_eq!(found.display_name, None);
}

#[test]
fn null_in_a_required_column_is_a_read_error() {
    let (_session, persistence) = persistence();
    persistence
        .ensure_column_family::<Account>()
        .expect("table should exist");
    persistence
        .execute_update("INSERT INTO accounts (id) VALUES ('bare')")
        .expect("raw insert should succeed");

    let err = persistence
        .find_by_key::<Account>("bare")
        .expect_err("plan is not optional");

    let Error::Read(ReadError::NullColumn { column, .. }) = err else {
        panic!("expected a null column error");
    };
    assert_eq!(column, "plan");
}

#[test]
fn keyspace_override_and_default_column_family() {
    let (session, persistence) = persistence();

    persistence
        .insert(&AuditEvent {
            id: 7,
            message: "created".into(),
        })
        .expect("insert should succeed");

    assert!(session.has_table(&TableRef::new("audit", "audit_event")));
    assert_eq!(
        session.keyspace_replication("audit"),
        session.keyspace_replication("app"),
        "created keyspaces use the engine's replication"
    );
    let found: Option<AuditEvent> = persistence.find_by_key(7_i64).expect("find should succeed");
    assert_eq!(found.map(|e| e.message), Some("created".to_string()));
}
