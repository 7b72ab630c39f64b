use super::*;

#[test]
fn test_data_source_rejects_malformed_url() {
    let err = PgDataSource::new("postgres://user@host:notaport/db").err().unwrap();
    assert!(matches!(err, DbError::Config(_)));
}

#[test]
fn test_data_source_defaults_to_manual_commit() {
    let source = PgDataSource::new("postgres://user@localhost/db").unwrap();
    assert!(!source.auto_commit);
    assert!(source.auto_commit(true).auto_commit);
}

#[tokio::test]
async fn test_connect_reports_malformed_url_as_connection_error() {
    let err = PgConnection::connect("postgres://user@host:notaport/db")
        .await
        .err()
        .unwrap();
    assert!(matches!(err, DbError::Connection(_)));
}
