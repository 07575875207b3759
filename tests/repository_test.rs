use std::sync::Arc;
use repokit::tables::{Session, SessionFilter, SessionKey, SessionTable};
use repokit::{
    Cacheable, ColumnModifier, ColumnType, CompositeKey, Dao, Error, ForeignKey, QueryExecutor,
    ReferentialAction, Repository, Row, SchemaBuilder, SharedExecutor, SqlValue, SqliteExecutor, Table,
};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq)]
struct Membership {
    session_id: i64,
    player: String,
    score: f64,
}

impl Membership {
    fn new(session_id: i64, player: &str, score: f64) -> Self {
        Self { session_id, player: player.to_string(), score }
    }
}

impl Cacheable for Membership {
    fn identifier(&self) -> String {
        format!("{}/{}", self.session_id, self.player)
    }
}

fn membership_key(session_id: i64, player: &str) -> CompositeKey {
    CompositeKey::new(&["session_id", "player"])
        .with("player", player).unwrap()
        .with("session_id", session_id).unwrap()
}

struct MembershipTable;

impl Table for MembershipTable {
    type Entity = Membership;
    type Key = CompositeKey;

    fn name(&self) -> &str {
        "membership"
    }

    fn define_schema(&self, schema: SchemaBuilder) -> SchemaBuilder {
        schema
            .add_column("session_id", ColumnType::Integer, &[ColumnModifier::PrimaryKey, ColumnModifier::NotNull])
            .add_column("player", ColumnType::Text, &[ColumnModifier::PrimaryKey, ColumnModifier::NotNull])
            .add_column_with_default("score", ColumnType::Real, 0.0, &[ColumnModifier::NotNull])
            .add_foreign_key_constraint(
                ForeignKey::new(&["session_id"], "session", &["id"]).on_delete(ReferentialAction::Cascade),
            )
            .add_check("score >= 0")
    }

    fn map_row(&self, row: &Row) -> repokit::Result<Membership> {
        Ok(Membership {
            session_id: row.get("session_id")?,
            player: row.get("player")?,
            score: row.get("score")?,
        })
    }

    fn key_of(&self, entity: &Membership) -> CompositeKey {
        membership_key(entity.session_id, &entity.player)
    }

    fn column_values(&self, entity: &Membership) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("session_id", entity.session_id.into()),
            ("player", entity.player.as_str().into()),
            ("score", entity.score.into()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Event {
    id: Option<i64>,
    name: String,
}

impl Event {
    fn unsaved(name: &str) -> Self {
        Self { id: None, name: name.to_string() }
    }

    fn keyed(id: i64) -> Self {
        Self { id: Some(id), name: String::new() }
    }
}

impl Cacheable for Event {
    fn identifier(&self) -> String {
        self.id.map(|id| id.to_string()).unwrap_or_default()
    }
}

struct EventTable;

impl Table for EventTable {
    type Entity = Event;
    type Key = CompositeKey;

    fn name(&self) -> &str {
        "event"
    }

    fn define_schema(&self, schema: SchemaBuilder) -> SchemaBuilder {
        schema
            .add_column("id", ColumnType::Integer, &[ColumnModifier::PrimaryKey, ColumnModifier::AutoIncrement])
            .add_column("name", ColumnType::Text, &[ColumnModifier::NotNull])
    }

    fn map_row(&self, row: &Row) -> repokit::Result<Event> {
        Ok(Event { id: row.get("id")?, name: row.get("name")? })
    }

    fn key_of(&self, entity: &Event) -> CompositeKey {
        let mut key = CompositeKey::new(&["id"]);
        key.set("id", entity.id).unwrap();
        key
    }

    fn column_values(&self, entity: &Event) -> Vec<(&'static str, SqlValue)> {
        vec![("id", entity.id.into()), ("name", entity.name.as_str().into())]
    }

    fn with_rowid(&self, entity: &Event, rowid: i64) -> Event {
        Event { id: Some(rowid), ..entity.clone() }
    }
}

struct Fixture {
    _dir: TempDir,
    executor: SharedExecutor,
    sessions: Repository<SessionTable>,
    memberships: Repository<MembershipTable>,
}

fn setup() -> Fixture {
    let dir = TempDir::new().unwrap();
    let executor: SharedExecutor = Arc::new(SqliteExecutor::open(dir.path().join("repo.db")).unwrap());
    let sessions = Repository::new(executor.clone(), SessionTable).unwrap();
    let memberships = Repository::new(executor.clone(), MembershipTable).unwrap();
    Fixture { _dir: dir, executor, sessions, memberships }
}

fn seed(fx: &Fixture) {
    fx.sessions.insert_all(&[Session::new(1, "warmup"), Session::new(2, "trial")]).unwrap();
    fx.memberships
        .insert_all(&[
            Membership::new(1, "ann", 1.5),
            Membership::new(1, "bob", 2.0),
            Membership::new(2, "ann", 0.5),
        ])
        .unwrap();
    fx.sessions.clear_cache();
    fx.memberships.clear_cache();
}

#[test]
fn test_session_scenario() {
    let fx = setup();

    assert_eq!(fx.sessions.insert(&Session::new(1, "warmup")).unwrap(), 1);
    assert_eq!(fx.sessions.select(&SessionKey::new(1)).unwrap(), Session::new(1, "warmup"));

    fx.sessions.update(&Session::new(1, "final")).unwrap();
    assert_eq!(fx.sessions.select(&SessionKey::new(1)).unwrap().label, "final");

    assert_eq!(fx.sessions.delete(&SessionKey::new(1)).unwrap(), 1);
    assert!(matches!(fx.sessions.select(&SessionKey::new(1)), Err(Error::NotFound(_))));
    assert!(!fx.sessions.exists(&SessionKey::new(1)).unwrap());

    // deleting a missing row is not an error
    assert_eq!(fx.sessions.delete(&SessionKey::new(1)).unwrap(), 0);
}

#[test]
fn test_composite_key_round_trip() {
    let fx = setup();
    seed(&fx);

    let found = fx.memberships.select(&membership_key(1, "bob")).unwrap();
    assert_eq!(found, Membership::new(1, "bob", 2.0));

    let mut all = fx.memberships.select_all().unwrap();
    all.sort_by(|a, b| a.identifier().cmp(&b.identifier()));
    assert_eq!(all.len(), 3);
    assert_eq!(all[0], Membership::new(1, "ann", 1.5));
}

#[test]
fn test_select_many_keeps_key_order() {
    let fx = setup();
    seed(&fx);

    let found = fx
        .memberships
        .select_many(&[membership_key(2, "ann"), membership_key(1, "ann")])
        .unwrap();
    assert_eq!(found[0].session_id, 2);
    assert_eq!(found[1].session_id, 1);

    let err = fx
        .memberships
        .select_many(&[membership_key(1, "ann"), membership_key(9, "zed")])
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(!fx.executor.in_transaction());
}

#[test]
fn test_select_where_matches_present_columns() {
    let fx = setup();
    seed(&fx);

    let ann = CompositeKey::new(&["session_id", "player"]).with("player", "ann").unwrap();
    let mut found = fx.memberships.select_where(&ann).unwrap();
    found.sort_by_key(|m| m.session_id);
    assert_eq!(found.iter().map(|m| m.session_id).collect::<Vec<_>>(), vec![1, 2]);

    assert!(fx.memberships.exists_where(&ann).unwrap());
    let zed = CompositeKey::new(&["session_id", "player"]).with("player", "zed").unwrap();
    assert!(!fx.memberships.exists_where(&zed).unwrap());

    let trial = SessionFilter { label: Some("trial".to_string()) };
    assert_eq!(fx.sessions.select_where(&trial).unwrap(), vec![Session::new(2, "trial")]);
    assert_eq!(fx.sessions.select_where(&SessionFilter::default()).unwrap().len(), 2);
}

#[test]
fn test_delete_all_is_atomic() {
    let fx = setup();
    seed(&fx);

    let partial = CompositeKey::new(&["session_id", "player"]).with("session_id", 1i64).unwrap();
    let keys = vec![membership_key(1, "ann"), partial, membership_key(2, "ann")];

    assert!(fx.memberships.delete_all(&keys).is_err());
    assert!(!fx.executor.in_transaction());
    assert_eq!(fx.memberships.select_all().unwrap().len(), 3);
    assert!(fx.memberships.exists(&membership_key(1, "ann")).unwrap());
}

#[test]
fn test_delete_all_counts_removed_rows() {
    let fx = setup();
    seed(&fx);

    let removed = fx
        .memberships
        .delete_all(&[membership_key(1, "ann"), membership_key(7, "nobody"), membership_key(2, "ann")])
        .unwrap();
    assert_eq!(removed, 2);
    assert_eq!(fx.memberships.select_all().unwrap(), vec![Membership::new(1, "bob", 2.0)]);
}

#[test]
fn test_insert_all_rolls_back_on_duplicate() {
    let fx = setup();

    let err = fx
        .sessions
        .insert_all(&[Session::new(1, "a"), Session::new(2, "b"), Session::new(1, "again")])
        .unwrap_err();

    assert!(matches!(err, Error::Query { .. }));
    assert!(!fx.executor.in_transaction());
    assert!(fx.sessions.select_all().unwrap().is_empty());
}

#[test]
fn test_update_missing_row_is_not_found() {
    let fx = setup();
    fx.sessions.insert(&Session::new(1, "a")).unwrap();

    assert!(fx.sessions.update(&Session::new(5, "ghost")).unwrap_err().is_not_found());

    let err = fx
        .sessions
        .update_all(&[Session::new(1, "changed"), Session::new(5, "ghost")])
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(fx.sessions.select(&SessionKey::new(1)).unwrap().label, "a");
}

#[test]
fn test_foreign_keys_and_checks_enforced() {
    let fx = setup();
    seed(&fx);

    assert!(fx.memberships.insert(&Membership::new(42, "ann", 1.0)).is_err());
    assert!(fx.memberships.insert(&Membership::new(1, "cat", -1.0)).is_err());

    fx.sessions.delete(&SessionKey::new(1)).unwrap();
    assert_eq!(fx.memberships.select_all().unwrap(), vec![Membership::new(2, "ann", 0.5)]);
}

#[test]
fn test_schema_initialization_is_idempotent() {
    let fx = setup();
    seed(&fx);

    let again = Repository::new(fx.executor.clone(), MembershipTable).unwrap();
    assert_eq!(again.select_all().unwrap().len(), 3);
    let sessions_again = Repository::new(fx.executor.clone(), SessionTable).unwrap();
    assert_eq!(sessions_again.select_all().unwrap().len(), 2);
}

#[test]
fn test_exists_agrees_with_select() {
    let fx = setup();
    seed(&fx);

    for key in [membership_key(1, "ann"), membership_key(1, "zed"), membership_key(3, "ann")] {
        let exists = fx.memberships.exists(&key).unwrap();
        match fx.memberships.select(&key) {
            Ok(_) => assert!(exists),
            Err(e) => {
                assert!(e.is_not_found());
                assert!(!exists);
            }
        }
    }
}

#[test]
fn test_cache_populated_outside_transactions() {
    let fx = setup();
    let needle = Session::new(1, "");

    fx.sessions.insert(&Session::new(1, "warmup")).unwrap();
    assert_eq!(fx.sessions.cached(&needle), Some(Session::new(1, "warmup")));

    fx.sessions.update(&Session::new(1, "final")).unwrap();
    assert_eq!(fx.sessions.cached(&needle).unwrap().label, "final");

    fx.sessions.delete(&SessionKey::new(1)).unwrap();
    assert!(fx.sessions.cached(&needle).is_none());

    fx.sessions.insert(&Session::new(2, "trial")).unwrap();
    fx.sessions.clear_cache();
    fx.sessions.select_all().unwrap();
    assert_eq!(fx.sessions.cache_len(), 1);
}

#[test]
fn test_cache_untouched_by_uncommitted_writes() {
    let fx = setup();
    let needle = Session::new(1, "");

    fx.executor.begin_transaction().unwrap();
    fx.sessions.insert(&Session::new(1, "pending")).unwrap();
    assert!(fx.sessions.cached(&needle).is_none());
    fx.executor.rollback().unwrap();

    assert!(fx.sessions.cached(&needle).is_none());
    assert!(!fx.sessions.exists(&SessionKey::new(1)).unwrap());
}

#[test]
fn test_batches_join_an_open_transaction() {
    let fx = setup();

    fx.executor.begin_transaction().unwrap();
    fx.sessions.insert_all(&[Session::new(1, "a"), Session::new(2, "b")]).unwrap();
    assert!(fx.executor.in_transaction());
    fx.executor.rollback().unwrap();

    assert!(fx.sessions.select_all().unwrap().is_empty());
}

#[test]
fn test_composite_cache_eviction_on_delete() {
    let fx = setup();
    seed(&fx);

    let needle = Membership::new(1, "ann", 0.0);
    fx.memberships.select(&membership_key(1, "ann")).unwrap();
    assert!(fx.memberships.cached(&needle).is_some());

    fx.memberships.delete(&membership_key(1, "ann")).unwrap();
    assert!(fx.memberships.cached(&needle).is_none());
}

#[test]
fn test_generated_keys_are_returned_and_cached() {
    let fx = setup();
    let events = Repository::new(fx.executor.clone(), EventTable).unwrap();

    let first = events.insert_returning(&Event::unsaved("start")).unwrap();
    let second = events.insert_returning(&Event::unsaved("stop")).unwrap();
    assert_eq!(first.id, Some(1));
    assert_eq!(second.id, Some(2));

    assert_eq!(events.cached(&Event::keyed(2)).unwrap().name, "stop");
    assert!(events.cached(&Event::unsaved("")).is_none());
    assert_eq!(events.cache_len(), 2);

    // AUTOINCREMENT never hands out a deleted id again
    events.delete(&events.table().key_of(&second)).unwrap();
    assert_eq!(events.insert(&Event::unsaved("again")).unwrap(), 1);
    assert_eq!(events.cached(&Event::keyed(3)).unwrap().name, "again");
    assert_eq!(events.select_all().unwrap().len(), 2);
}

#[test]
fn test_generated_key_inside_transaction_is_not_cached() {
    let fx = setup();
    let events = Repository::new(fx.executor.clone(), EventTable).unwrap();

    fx.executor.begin_transaction().unwrap();
    let pending = events.insert_returning(&Event::unsaved("pending")).unwrap();
    assert_eq!(pending.id, Some(1));
    assert!(events.cached(&pending).is_none());
    fx.executor.commit().unwrap();

    let stored = events.select(&events.table().key_of(&pending)).unwrap();
    assert_eq!(stored, pending);
}

#[test]
fn test_open_transaction_is_invisible_to_other_executors() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("shared.db");
    let writer: SharedExecutor = Arc::new(SqliteExecutor::open(&path).unwrap());
    let reader: SharedExecutor = Arc::new(SqliteExecutor::open(&path).unwrap());
    let writer_sessions = Repository::new(writer.clone(), SessionTable).unwrap();
    let reader_sessions = Repository::new(reader.clone(), SessionTable).unwrap();

    writer.begin_transaction().unwrap();
    writer_sessions.insert(&Session::new(1, "pending")).unwrap();
    assert!(writer_sessions.exists(&SessionKey::new(1)).unwrap());

    assert!(reader_sessions.select_all().unwrap().is_empty());
    assert!(!reader_sessions.exists(&SessionKey::new(1)).unwrap());
    assert!(!reader.in_transaction());

    writer.commit().unwrap();
    assert_eq!(reader_sessions.select_all().unwrap(), vec![Session::new(1, "pending")]);
}
