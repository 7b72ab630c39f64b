use crate::cli::QueryArgs;
use crate::config::ConfigFile;
use crate::table;
use anyhow::Context;
use colored::Colorize;
use dblog::{
    Connection, Cursor, DataSource, LogConfig, LogDataSource, PgDataSource, Statement, StderrSink,
};

pub async fn run(args: QueryArgs) -> anyhow::Result<()> {
    let sql = table::select_sql(&args.sql)?;
    let file = ConfigFile::load(args.connect.config.as_deref())?;
    let url = file.database_url(&args.connect)?;

    let config = LogConfig::new(StderrSink::new()).with_settings(&file.log);
    let source = LogDataSource::new(PgDataSource::new(&url)?.auto_commit(true), config);
    let mut conn = source.connect().await.context("failed to connect")?;

    let mut statement = conn.create_statement().await?;
    let mut cursor = statement.execute_query(&sql).await?;
    let (table, shown) = table::collect(&mut cursor, args.page).await?;
    cursor.close().await?;
    statement.close().await?;
    conn.close().await?;

    println!("{table}");
    let summary = match args.page.rows() {
        Some(window) if shown > 0 => format!(
            "({shown} rows, page {} showing rows {}-{})",
            args.page.index,
            window.start + 1,
            window.start + shown
        ),
        Some(_) => format!("(0 rows, page {})", args.page.index),
        None => format!("({shown} rows)"),
    };
    println!("{}", summary.dimmed());
    Ok(())
}
