use super::*;
use crate::error::DbError;
use crate::resource::{Connection, Cursor, DataSource, PreparedStatement, Statement};
use crate::testing::{FakeConn, FakeSource};
use crate::value::SqlValue;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

// ── Helpers ──

fn setup(conn: FakeConn) -> (Arc<BufferSink>, InstrumentedConnection<FakeConn>) {
    setup_with(conn, |config| config)
}

fn setup_with(
    conn: FakeConn,
    configure: impl FnOnce(LogConfig) -> LogConfig,
) -> (Arc<BufferSink>, InstrumentedConnection<FakeConn>) {
    let sink = Arc::new(BufferSink::new());
    let config = configure(LogConfig::from_sink_arc(sink.clone()));
    let conn = InstrumentedConnection::with_allocator(conn, config, IdentityAllocator::new());
    (sink, conn)
}

/// The line up to its trailing ` time:` field, which varies run to run.
fn body(line: &str) -> &str {
    line.rsplit_once(" time: ").map_or(line, |(body, _)| body)
}

// ── Statements ──

#[tokio::test]
async fn test_statement_logs_sql_and_result() {
    let (sink, mut conn) = setup(FakeConn::default());
    let mut stmt = conn.create_statement().await.unwrap();

    let n = stmt
        .execute_update("update accounts set active = false")
        .await
        .unwrap();

    assert_eq!(n, 1);
    let lines = sink.take();
    assert_eq!(lines.len(), 1);
    assert_eq!(
        body(&lines[0]),
        "jdbc [1][1] statement: update accounts set active = false result: 1"
    );
    assert!(!lines[0].contains("error:"));
}

#[tokio::test]
async fn test_failing_query_logs_error_and_returns_it_unchanged() {
    let (sink, mut conn) = setup(FakeConn::default());
    let mut stmt = conn.create_statement().await.unwrap();

    let err = stmt
        .execute_query("select * from missing_table")
        .await
        .err()
        .unwrap();

    assert!(matches!(err, DbError::Other(ref m) if m.contains("missing_table")));
    let lines = sink.take();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("jdbc [1][1] statement: select * from missing_table time: "));
    assert!(lines[0].ends_with("error: relation \"missing_table\" does not exist"));
}

#[tokio::test]
async fn test_failed_update_omits_result() {
    let (sink, mut conn) = setup(FakeConn::failing());
    let mut stmt = conn.create_statement().await.unwrap();

    assert!(stmt.execute_update("delete from t").await.is_err());

    let lines = sink.take();
    assert_eq!(lines.len(), 1);
    assert!(!lines[0].contains("result:"));
    assert!(lines[0].ends_with(" error: update failed"));
}

#[tokio::test]
async fn test_prepare_failure_is_returned_without_a_line() {
    let (sink, mut conn) = setup(FakeConn::default());

    let err = conn.prepare_statement("syntax error here").await.err().unwrap();

    assert!(matches!(err, DbError::Other(ref m) if m.starts_with("cannot prepare")));
    assert!(sink.is_empty());
}

// ── Prepared statements ──

#[tokio::test]
async fn test_prepared_update_logs_sorted_params() {
    let (sink, mut conn) = setup(FakeConn::default());
    let mut ps = conn
        .prepare_statement("insert into orders (qty, price) values (?, ?)")
        .await
        .unwrap();

    ps.set(2, 10).unwrap();
    ps.set(1, 5).unwrap();
    let n = ps.execute_update().await.unwrap();

    assert_eq!(n, 1);
    let lines = sink.take();
    assert_eq!(lines.len(), 1);
    assert_eq!(
        body(&lines[0]),
        "jdbc [1][1] statement: insert into orders (qty, price) values (?, ?) params: ?1:5 ?2:10 result: 1"
    );
    assert!(lines[0].contains(" time: "));
    assert!(!lines[0].contains("error:"));
}

#[tokio::test]
async fn test_last_bind_wins_and_buffer_clears_after_execute() {
    let (sink, mut conn) = setup(FakeConn::default());
    let mut ps = conn.prepare_statement("select ?, ?").await.unwrap();

    assert_eq!(ps.buffered(), "");
    ps.set(2, "x").unwrap();
    ps.set(1, "x").unwrap();
    ps.set(1, "y").unwrap();
    assert_eq!(ps.buffered(), " ?1:y ?2:x");

    let cursor = ps.execute_query().await.unwrap();
    assert_eq!(ps.buffered(), "");
    drop(cursor);

    let lines = sink.take();
    assert!(body(&lines[0]).ends_with("params: ?1:y ?2:x"));
}

#[tokio::test]
async fn test_buffer_clears_after_failed_execute() {
    let (sink, mut conn) = setup(FakeConn::failing());
    let mut ps = conn.prepare_statement("update t set a = ?").await.unwrap();

    ps.set(1, SqlValue::Null).unwrap();
    assert!(ps.execute_update().await.is_err());

    assert_eq!(ps.buffered(), "");
    let lines = sink.take();
    assert_eq!(lines.len(), 1);
    assert!(body(&lines[0]).ends_with("params: ?1:null"));
    assert!(lines[0].ends_with("error: update failed"));
}

#[tokio::test]
async fn test_rejected_bind_is_returned_and_still_recorded() {
    let (_sink, mut conn) = setup(FakeConn::default());
    let mut ps = conn.prepare_statement("select ?, ?").await.unwrap();

    let err = ps.set(3, true).unwrap_err();

    assert!(matches!(err, DbError::InvalidParameter { ordinal: 3, .. }));
    assert_eq!(ps.buffered(), " ?3:true");
}

#[tokio::test]
async fn test_unbound_execute_logs_empty_params() {
    let (sink, mut conn) = setup(FakeConn::default());
    let mut ps = conn.prepare_statement("delete from t").await.unwrap();

    ps.execute_update().await.unwrap();

    let lines = sink.take();
    assert_eq!(body(&lines[0]), "jdbc [1][1] statement: delete from t params: result: 1");
}

#[tokio::test]
async fn test_clear_parameters_passes_through() {
    let (_sink, mut conn) = setup(FakeConn::default());
    let mut ps = conn.prepare_statement("select ?").await.unwrap();

    ps.set(1, 7).unwrap();
    ps.clear_parameters().unwrap();

    assert!(ps.inner().bound.is_empty());
    assert_eq!(ps.buffered(), " ?1:7");
}

// ── Cursors ──

#[tokio::test]
async fn test_cursor_counts_rows_and_passes_values_through() {
    let (sink, mut conn) = setup(FakeConn::with_rows(3));
    let mut stmt = conn.create_statement().await.unwrap();
    let mut cursor = stmt.execute_query("select id, name from t").await.unwrap();

    let mut names = Vec::new();
    while cursor.advance().await.unwrap() {
        names.push(cursor.value(1).unwrap());
    }
    assert_eq!(cursor.state(), Some(CursorState::Active));
    cursor.close().await.unwrap();

    assert_eq!(
        names,
        vec![
            SqlValue::Text("row1".into()),
            SqlValue::Text("row2".into()),
            SqlValue::Text("row3".into()),
        ]
    );
    assert_eq!(cursor.column_count(), 2);
    assert_eq!(cursor.column_name(0), Some("id"));
    assert_eq!(cursor.state(), Some(CursorState::Closed));
    assert_eq!(cursor.row_count(), Some(3));

    let lines = sink.take();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("jdbc [1][1] cursor row count: 3 first row time: "));
    assert!(lines[1].contains(" all rows time: "));
    assert!(lines[1].contains(" close time: "));
}

#[tokio::test]
async fn test_cursor_closed_before_advance_reports_minus_one() {
    let (sink, mut conn) = setup(FakeConn::with_rows(3));
    let mut stmt = conn.create_statement().await.unwrap();
    let mut cursor = stmt.execute_query("select 1").await.unwrap();

    assert_eq!(cursor.state(), Some(CursorState::Idle));
    cursor.close().await.unwrap();

    let lines = sink.take();
    assert_eq!(
        body(&lines[1]),
        "jdbc [1][1] cursor row count: -1 first row time: 0 all rows time: 0 close"
    );
}

#[tokio::test]
async fn test_cursor_reports_once_when_closed_twice() {
    let (sink, mut conn) = setup(FakeConn::with_rows(1));
    let mut stmt = conn.create_statement().await.unwrap();
    let mut cursor = stmt.execute_query("select 1").await.unwrap();

    cursor.close().await.unwrap();
    cursor.close().await.unwrap();
    assert!(cursor.advance().await.is_err());
    drop(cursor);

    let cursor_lines = sink
        .take()
        .into_iter()
        .filter(|l| l.contains("cursor row count"))
        .count();
    assert_eq!(cursor_lines, 1);
}

#[tokio::test]
async fn test_dropped_cursor_still_reports() {
    let (sink, mut conn) = setup(FakeConn::with_rows(2));
    let mut stmt = conn.create_statement().await.unwrap();
    let mut cursor = stmt.execute_query("select 1").await.unwrap();

    cursor.advance().await.unwrap();
    drop(cursor);

    let lines = sink.take();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].contains("cursor row count: 0 "));
    assert!(lines[1].ends_with(" dropped time: 0"));
}

#[tokio::test]
async fn test_prepared_cursor_shares_statement_identity() {
    let (sink, mut conn) = setup(FakeConn::with_rows(1));
    let _plain = conn.create_statement().await.unwrap();
    let mut ps = conn.prepare_statement("select ?").await.unwrap();
    ps.set(1, 1).unwrap();

    let mut cursor = ps.execute_query().await.unwrap();
    while cursor.advance().await.unwrap() {}
    cursor.close().await.unwrap();

    let lines = sink.take();
    assert!(lines[0].starts_with("jdbc [1][2] statement: select ?"));
    assert!(lines[1].starts_with("jdbc [1][2] cursor row count: 1 "));
}

// ── Transactions ──

#[tokio::test]
async fn test_commit_and_rollback_each_log_one_line() {
    let (sink, mut conn) = setup(FakeConn::default());

    conn.commit().await.unwrap();
    conn.rollback().await.unwrap();

    let lines = sink.take();
    assert_eq!(lines.len(), 2);
    assert_eq!(body(&lines[0]), "jdbc [1] commit");
    assert_eq!(body(&lines[1]), "jdbc [1] rollback");
}

#[tokio::test]
async fn test_failed_rollback_logs_error() {
    let (sink, mut conn) = setup(FakeConn::failing());

    let err = conn.rollback().await.unwrap_err();

    assert!(matches!(err, DbError::Other(ref m) if m == "rollback refused"));
    let lines = sink.take();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with(" error: rollback refused"));
}

#[tokio::test]
async fn test_other_connection_calls_are_not_logged() {
    let (sink, mut conn) = setup(FakeConn::default());

    conn.set_auto_commit(true).await.unwrap();
    assert!(conn.auto_commit());
    conn.close().await.unwrap();
    assert!(conn.is_closed());

    assert!(sink.is_empty());
}

// ── Toggles and the enabled-check ──

#[tokio::test]
async fn test_disabled_sink_sees_no_lines() {
    let (sink, mut conn) = setup(FakeConn::with_rows(2));
    sink.set_enabled(false);

    let mut stmt = conn.create_statement().await.unwrap();
    stmt.execute_update("update t set a = 1").await.unwrap();
    let mut cursor = stmt.execute_query("select 1").await.unwrap();
    while cursor.advance().await.unwrap() {}
    cursor.close().await.unwrap();
    let mut ps = conn.prepare_statement("select ?").await.unwrap();
    ps.set(1, 1).unwrap();
    ps.execute_update().await.unwrap();
    conn.commit().await.unwrap();

    assert!(sink.is_empty());
    assert_eq!(stmt.id(), None);
    assert_eq!(cursor.state(), None);
}

#[tokio::test]
async fn test_statement_created_while_disabled_stays_unlogged() {
    let (sink, mut conn) = setup(FakeConn::default());

    sink.set_enabled(false);
    let mut stmt = conn.create_statement().await.unwrap();
    sink.set_enabled(true);
    stmt.execute_update("update t set a = 1").await.unwrap();

    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_prepared_statement_follows_enabled_check_per_call() {
    let (sink, mut conn) = setup(FakeConn::default());
    let mut ps = conn.prepare_statement("update t set a = ?, b = ?").await.unwrap();

    ps.set(1, "a").unwrap();
    sink.set_enabled(false);
    ps.set(2, "b").unwrap();
    assert_eq!(ps.buffered(), " ?1:a");
    ps.execute_update().await.unwrap();
    assert_eq!(ps.buffered(), "");
    assert!(sink.is_empty());

    sink.set_enabled(true);
    ps.execute_update().await.unwrap();

    let lines = sink.take();
    assert_eq!(lines.len(), 1);
    assert_eq!(
        body(&lines[0]),
        "jdbc [1][1] statement: update t set a = ?, b = ? params: result: 1"
    );
    assert_eq!(ps.inner().bound.len(), 2);
}

#[tokio::test]
async fn test_cursor_skips_rows_advanced_while_disabled() {
    let (sink, mut conn) = setup(FakeConn::with_rows(3));
    let mut stmt = conn.create_statement().await.unwrap();
    let mut cursor = stmt.execute_query("select id from t").await.unwrap();

    assert!(cursor.advance().await.unwrap());
    sink.set_enabled(false);
    assert!(cursor.advance().await.unwrap());
    assert_eq!(cursor.row_count(), Some(0));
    sink.set_enabled(true);
    while cursor.advance().await.unwrap() {}
    cursor.close().await.unwrap();

    let lines = sink.take();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("jdbc [1][1] cursor row count: 2 first row time: "));
    assert!(lines[1].contains(" close time: "));
}

#[tokio::test]
async fn test_statement_toggle_off_keeps_transactions() {
    let (sink, mut conn) = setup_with(FakeConn::with_rows(1), |c| c.statements(false));

    let mut stmt = conn.create_statement().await.unwrap();
    let mut cursor = stmt.execute_query("select 1").await.unwrap();
    while cursor.advance().await.unwrap() {}
    cursor.close().await.unwrap();
    conn.commit().await.unwrap();

    let lines = sink.take();
    assert_eq!(lines.len(), 1);
    assert_eq!(body(&lines[0]), "jdbc [1] commit");
}

#[tokio::test]
async fn test_cursor_toggle_off_leaves_cursor_unwrapped() {
    let (sink, mut conn) = setup_with(FakeConn::with_rows(1), |c| c.cursors(false));

    let mut stmt = conn.create_statement().await.unwrap();
    let mut cursor = stmt.execute_query("select 1").await.unwrap();
    while cursor.advance().await.unwrap() {}
    cursor.close().await.unwrap();

    assert_eq!(cursor.state(), None);
    let lines = sink.take();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("statement: select 1"));
}

#[tokio::test]
async fn test_transaction_toggle_off() {
    let (sink, mut conn) = setup_with(FakeConn::default(), |c| c.transactions(false));

    conn.commit().await.unwrap();
    conn.rollback().await.unwrap();

    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_custom_prefix() {
    let (sink, mut conn) = setup_with(FakeConn::default(), |c| c.prefix("sql"));

    conn.commit().await.unwrap();

    assert_eq!(body(&sink.take()[0]), "sql [1] commit");
}

#[tokio::test]
async fn test_settings_apply_to_config() {
    let settings: LogSettings = toml::from_str("cursors = false\nprefix = \"db\"").unwrap();
    let config = LogConfig::new(BufferSink::new()).with_settings(&settings);

    assert!(config.logs_statements());
    assert!(!config.logs_cursors());
    assert!(config.logs_transactions());
    assert_eq!(config.line_prefix(), "db");
    assert_eq!(LogSettings::default().prefix, DEFAULT_PREFIX);
}

// ── Sink failures ──

#[tokio::test]
async fn test_panicking_sink_does_not_disturb_calls() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let config = LogConfig::from_fns(
        || true,
        move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            panic!("sink is broken");
        },
    );
    let mut conn =
        InstrumentedConnection::with_allocator(FakeConn::with_rows(1), config, IdentityAllocator::new());

    let mut stmt = conn.create_statement().await.unwrap();
    assert_eq!(stmt.execute_update("update t set a = 1").await.unwrap(), 1);
    conn.commit().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_panicking_enabled_check_counts_as_disabled() {
    let config = LogConfig::from_fns(|| panic!("check is broken"), |_| {});
    let mut conn =
        InstrumentedConnection::with_allocator(FakeConn::default(), config, IdentityAllocator::new());

    let stmt = conn.create_statement().await.unwrap();

    assert_eq!(stmt.id(), None);
    conn.commit().await.unwrap();
}

// ── Identities ──

#[tokio::test]
async fn test_identities_increase_across_connections() {
    let ids = IdentityAllocator::new();
    let sink = Arc::new(BufferSink::new());
    let config = Arc::new(LogConfig::from_sink_arc(sink.clone()));

    let mut a = InstrumentedConnection::with_allocator(FakeConn::default(), config.clone(), ids.clone());
    let mut b = InstrumentedConnection::with_allocator(FakeConn::default(), config, ids);
    assert!(a.id() < b.id());

    let s1 = a.create_statement().await.unwrap();
    let s2 = b.prepare_statement("select 1").await.unwrap();
    let s3 = a.create_statement().await.unwrap();
    assert!(s1.id() < s2.id());
    assert!(s2.id() < s3.id());
}

#[test]
fn test_concurrent_allocation_never_repeats() {
    let ids = IdentityAllocator::new();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ids = ids.clone();
            std::thread::spawn(move || (0..500).map(|_| ids.next_statement()).collect::<Vec<_>>())
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(seen.insert(id));
        }
    }
    assert_eq!(seen.len(), 4000);
    assert!(seen.iter().all(|id| id.get() >= 1));
}

#[tokio::test]
async fn test_data_source_hands_out_instrumented_connections() {
    let sink = Arc::new(BufferSink::new());
    let source = LogDataSource::with_allocator(
        FakeSource::default(),
        LogConfig::from_sink_arc(sink.clone()),
        IdentityAllocator::new(),
    );

    let mut first = source.connect().await.unwrap();
    let second = source.connect().await.unwrap();
    first.commit().await.unwrap();

    assert_eq!(first.id().get(), 1);
    assert_eq!(second.id().get(), 2);
    assert_eq!(body(&sink.take()[0]), "jdbc [1] commit");
}

#[tokio::test]
async fn test_instrument_uses_global_allocator() {
    let sink = Arc::new(BufferSink::new());
    let a = instrument(FakeConn::default(), LogConfig::from_sink_arc(sink.clone()));
    let b = instrument(FakeConn::default(), LogConfig::from_sink_arc(sink));

    assert!(a.id() < b.id());
    assert!(!a.into_inner().is_closed());
}
