//! Batch-write engine behavior against a recording driver.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use batch_sink::{
    BatchWriter, DestinationDriver, EventOutcome, Statement, StatementBuilder, UpdateStrategy,
    WriteAction, WriteError, WritePolicy, WriteRequest,
};
use chrono::Utc;
use sync_codec::{CodecRegistry, NativeRow, NativeValue};
use sync_core::{Field, FieldType, RecordEvent, Row, Table, TypedValue, ValueKind};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Fakes
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Execute(String),
    Append(String, Vec<NativeRow>),
    Commit,
}

#[derive(Default)]
struct RecordingDriver {
    calls: Mutex<Vec<Call>>,
}

impl RecordingDriver {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DestinationDriver for RecordingDriver {
    async fn execute(&self, statement: &str) -> anyhow::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Execute(statement.to_string()));
        Ok(())
    }

    async fn query(&self, _statement: &str) -> anyhow::Result<Vec<NativeRow>> {
        Ok(Vec::new())
    }

    async fn append(&self, table: &str, rows: &[NativeRow]) -> anyhow::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Append(table.to_string(), rows.to_vec()));
        Ok(())
    }

    async fn commit(&self) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(Call::Commit);
        Ok(())
    }
}

/// Appends every write and renders deletes as SQL keyed on the key columns.
struct AppendBuilder;

impl StatementBuilder for AppendBuilder {
    fn build(&self, table: &Table, request: WriteRequest<'_>) -> batch_sink::Result<Statement> {
        match request.action {
            WriteAction::Delete => {
                let predicate = request
                    .key
                    .iter()
                    .map(|(name, value)| format!("{name} = {}", value.to_sql_literal()))
                    .collect::<Vec<_>>()
                    .join(" AND ");
                Ok(Statement::Sql(format!(
                    "DELETE FROM {} WHERE {predicate}",
                    table.id()
                )))
            }
            _ => Ok(Statement::Append(request.row.clone())),
        }
    }
}

fn table() -> Table {
    Table::builder("T")
        .field(Field::key("id", FieldType::BigInt))
        .field(Field::new("name", FieldType::varchar(64)))
        .field(Field::new("payload", FieldType::Binary))
        .build()
        .unwrap()
}

fn row(pairs: &[(&str, TypedValue)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn insert(id: i64) -> RecordEvent {
    RecordEvent::insert(
        "T",
        Utc::now(),
        row(&[("id", id.into()), ("name", format!("n{id}").into())]),
    )
}

/// Codecs for integers and strings only; binary is left unregistered.
fn codecs() -> CodecRegistry {
    let mut codecs = CodecRegistry::new();
    codecs
        .register(ValueKind::Integer, None, |v| match v {
            TypedValue::Integer(i) => Ok(NativeValue::Int(*i)),
            _ => Ok(NativeValue::Null),
        })
        .register(ValueKind::String, None, |v| match v {
            TypedValue::String(s) => Ok(NativeValue::Text(s.clone())),
            _ => Ok(NativeValue::Null),
        });
    codecs
}

fn engine(driver: &Arc<RecordingDriver>, policy: WritePolicy) -> BatchWriter {
    BatchWriter::new(
        Arc::clone(driver) as Arc<dyn DestinationDriver>,
        Arc::new(codecs()),
        Arc::new(AppendBuilder),
        policy,
    )
}

// ============================================================================
// Counting and ordering
// ============================================================================

#[tokio::test]
async fn test_mixed_batch_counts_by_intent() {
    let driver = Arc::new(RecordingDriver::default());
    let writer = engine(
        &driver,
        WritePolicy {
            update_strategy: UpdateStrategy::Append,
            ..Default::default()
        },
    );

    let events = vec![
        insert(1),
        insert(2),
        insert(3),
        RecordEvent::update(
            "T",
            Utc::now(),
            Some(row(&[("id", 2.into())])),
            Some(row(&[("id", 2.into()), ("name", "renamed".into())])),
        )
        .unwrap(),
        RecordEvent::delete("T", Utc::now(), row(&[("id", 3.into())])),
    ];

    let result = writer
        .write(&table(), &events, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!((result.inserted, result.modified, result.removed), (3, 1, 1));
    assert_eq!(result.outcomes.len(), 5);
    assert_eq!(result.failed(), 0);

    // Four appends coalesce into one call ahead of the delete.
    let calls = driver.calls();
    assert_eq!(calls.len(), 3);
    match &calls[0] {
        Call::Append(table, rows) => {
            assert_eq!(table, "T");
            let ids: Vec<&NativeValue> = rows.iter().map(|r| &r["id"]).collect();
            assert_eq!(
                ids,
                vec![
                    &NativeValue::Int(1),
                    &NativeValue::Int(2),
                    &NativeValue::Int(3),
                    &NativeValue::Int(2)
                ]
            );
        }
        other => panic!("expected append, got {other:?}"),
    }
    assert_eq!(calls[1], Call::Execute("DELETE FROM T WHERE id = 3".to_string()));
    assert_eq!(calls[2], Call::Commit);
}

#[tokio::test]
async fn test_delete_insert_strategy_preserves_order() {
    let driver = Arc::new(RecordingDriver::default());
    let writer = engine(
        &driver,
        WritePolicy {
            update_strategy: UpdateStrategy::DeleteInsert,
            ..Default::default()
        },
    );

    let update = RecordEvent::update(
        "T",
        Utc::now(),
        Some(row(&[("id", 7.into())])),
        Some(row(&[("id", 7.into()), ("name", "x".into())])),
    )
    .unwrap();
    let result = writer
        .write(&table(), &[insert(6), update], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!((result.inserted, result.modified), (1, 1));
    let calls = driver.calls();
    assert!(matches!(&calls[0], Call::Append(_, rows) if rows.len() == 1));
    assert_eq!(calls[1], Call::Execute("DELETE FROM T WHERE id = 7".to_string()));
    assert!(matches!(&calls[2], Call::Append(_, rows) if rows.len() == 1));
    assert_eq!(calls[3], Call::Commit);
}

// ============================================================================
// Conversion outcomes
// ============================================================================

#[tokio::test]
async fn test_binary_without_codec_passes_through_with_fallback() {
    let driver = Arc::new(RecordingDriver::default());
    let writer = engine(&driver, WritePolicy::default());

    let event = RecordEvent::insert(
        "T",
        Utc::now(),
        row(&[("id", 1.into()), ("payload", TypedValue::Binary(vec![0, 159, 146]))]),
    );
    let result = writer
        .write(&table(), &[event], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.outcomes, vec![EventOutcome::Applied { fallback: true }]);
    assert_eq!(result.fallbacks(), 1);
    match &driver.calls()[0] {
        Call::Append(_, rows) => {
            assert_eq!(rows[0]["payload"], NativeValue::Bytes(vec![0, 159, 146]));
        }
        other => panic!("expected append, got {other:?}"),
    }
}

#[tokio::test]
async fn test_registered_codec_is_not_fallback() {
    let driver = Arc::new(RecordingDriver::default());
    let mut codecs = CodecRegistry::new();
    codecs.register(ValueKind::Integer, None, |v| match v {
        TypedValue::Integer(i) => Ok(NativeValue::Int(*i * 10)),
        _ => Ok(NativeValue::Null),
    });
    let writer = BatchWriter::new(
        Arc::clone(&driver) as Arc<dyn DestinationDriver>,
        Arc::new(codecs),
        Arc::new(AppendBuilder),
        WritePolicy::default(),
    );

    let event = RecordEvent::insert("T", Utc::now(), row(&[("id", 4.into())]));
    let result = writer
        .write(&table(), &[event], &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.outcomes, vec![EventOutcome::Applied { fallback: false }]);

    match &driver.calls()[0] {
        Call::Append(_, rows) => assert_eq!(rows[0]["id"], NativeValue::Int(40)),
        other => panic!("expected append, got {other:?}"),
    }
}

#[tokio::test]
async fn test_sparse_and_empty_rows() {
    let driver = Arc::new(RecordingDriver::default());
    let writer = engine(&driver, WritePolicy::default());

    let sparse = RecordEvent::insert("T", Utc::now(), row(&[("id", 1.into())]));
    let undeclared = RecordEvent::insert("T", Utc::now(), row(&[("ghost", 1.into())]));
    let result = writer
        .write(&table(), &[sparse, undeclared], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        result.outcomes,
        vec![EventOutcome::Applied { fallback: false }, EventOutcome::Dropped]
    );
    assert_eq!(result.inserted, 1);
    match &driver.calls()[0] {
        Call::Append(_, rows) => {
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].keys().collect::<Vec<_>>(), vec!["id"]);
        }
        other => panic!("expected append, got {other:?}"),
    }
}

#[tokio::test]
async fn test_conversion_failure_skips_event_only() {
    let driver = Arc::new(RecordingDriver::default());
    let writer = engine(&driver, WritePolicy::default());

    let bad = RecordEvent::insert("T", Utc::now(), row(&[("id", "not-a-number".into())]));
    let wrong_table = RecordEvent::insert("U", Utc::now(), row(&[("id", 9.into())]));
    let result = writer
        .write(&table(), &[insert(1), bad, wrong_table, insert(2)], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.inserted, 2);
    assert_eq!(result.failed(), 2);
    assert!(matches!(&result.outcomes[1], EventOutcome::Failed(reason) if reason.contains("id")));
    assert!(matches!(&result.outcomes[2], EventOutcome::Failed(reason) if reason.contains("'U'")));
}

#[tokio::test]
async fn test_out_of_range_epoch_day_fails_event() {
    let driver = Arc::new(RecordingDriver::default());
    let writer = engine(&driver, WritePolicy::default());
    let events_table = Table::builder("E")
        .field(Field::key("id", FieldType::BigInt))
        .field(Field::new("day", FieldType::Date))
        .build()
        .unwrap();

    let overflow = RecordEvent::insert(
        "E",
        Utc::now(),
        row(&[("id", 1.into()), ("day", TypedValue::Integer(i64::MAX))]),
    );
    let plain = RecordEvent::insert("E", Utc::now(), row(&[("id", 2.into())]));
    let result = writer
        .write(&events_table, &[overflow, plain], &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(&result.outcomes[0], EventOutcome::Failed(reason) if reason.contains("day")));
    assert_eq!(result.outcomes[1], EventOutcome::Applied { fallback: false });
    assert_eq!((result.inserted, result.failed()), (1, 1));
}

#[tokio::test]
async fn test_update_without_before_image_when_required() {
    let driver = Arc::new(RecordingDriver::default());
    let writer = engine(
        &driver,
        WritePolicy {
            requires_before_image: true,
            ..Default::default()
        },
    );

    let update = RecordEvent::update(
        "T",
        Utc::now(),
        None,
        Some(row(&[("id", 1.into()), ("name", "a".into())])),
    )
    .unwrap();
    let result = writer
        .write(&table(), &[update], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.modified, 0);
    assert_eq!(result.failed(), 1);
    assert!(driver.calls().is_empty());
}

// ============================================================================
// Liveness and serialization
// ============================================================================

#[tokio::test]
async fn test_cancelled_token_interrupts_without_commit() {
    let driver = Arc::new(RecordingDriver::default());
    let writer = engine(&driver, WritePolicy::default());
    let table = table();
    let cancel = CancellationToken::new();

    let mut table_writer = writer.writer(&table).await;
    table_writer.add_to_batch(&[insert(1), insert(2)], &cancel).unwrap();
    cancel.cancel();
    let err = table_writer
        .add_to_batch(&[insert(3)], &cancel)
        .unwrap_err();

    assert!(matches!(
        err,
        WriteError::Interrupted {
            processed: 0,
            total: 1,
            ..
        }
    ));
    let result = table_writer.commit().await.unwrap();
    assert_eq!(result.inserted, 0);
    assert!(driver.calls().is_empty());
}

#[tokio::test]
async fn test_one_writer_per_table() {
    let driver = Arc::new(RecordingDriver::default());
    let writer = engine(&driver, WritePolicy::default());
    let t = table();
    let u = Table::builder("U")
        .field(Field::key("id", FieldType::BigInt))
        .build()
        .unwrap();

    let held = writer.writer(&t).await;

    let blocked = tokio::time::timeout(Duration::from_millis(50), writer.writer(&t)).await;
    assert!(blocked.is_err());

    let other = tokio::time::timeout(Duration::from_millis(50), writer.writer(&u)).await;
    assert!(other.is_ok());
    drop(other);

    drop(held);
    let reacquired = tokio::time::timeout(Duration::from_millis(50), writer.writer(&t)).await;
    assert!(reacquired.is_ok());
}

#[tokio::test]
async fn test_execute_all_commits_once() {
    let driver = Arc::new(RecordingDriver::default());
    let writer = engine(&driver, WritePolicy::default());

    writer
        .execute_all(&["ALTER TABLE T ADD COLUMN c Int32".to_string()])
        .await
        .unwrap();
    writer.execute_all(&[]).await.unwrap();

    assert_eq!(
        driver.calls(),
        vec![
            Call::Execute("ALTER TABLE T ADD COLUMN c Int32".to_string()),
            Call::Commit
        ]
    );
}
