use crate::cli::RunArgs;
use crate::config::ConfigFile;
use anyhow::Context;
use colored::Colorize;
use dblog::{
    BufferSink, Connection, DataSource, LogConfig, LogDataSource, LogSink, PgDataSource, Script,
    StderrSink,
};
use std::sync::Arc;

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let file = ConfigFile::load(args.connect.config.as_deref())?;
    let url = file.database_url(&args.connect)?;

    let mut scripts = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        scripts.push((path, Script::new(text)));
    }

    let buffer = Arc::new(BufferSink::new());
    let sink: Arc<dyn LogSink> = if args.quiet {
        buffer.clone()
    } else {
        Arc::new(StderrSink::new())
    };
    let config = LogConfig::from_sink_arc(sink)
        .with_settings(&file.log)
        .statements(file.log.statements && !args.no_statements)
        .cursors(file.log.cursors && !args.no_cursors)
        .transactions(file.log.transactions && !args.no_transactions);

    let source = LogDataSource::new(PgDataSource::new(&url)?, config);
    let mut conn = source.connect().await.context("failed to connect")?;

    let mut total = 0;
    for (path, script) in &scripts {
        match script.execute(&mut conn, args.commit_after).await {
            Ok(n) => {
                println!("{} {} ({n} statements)", "✓".green().bold(), path.display());
                total += n;
            }
            Err(e) => {
                if let Err(rb) = conn.rollback().await {
                    tracing::warn!(target: "dblog", error = %rb, "rollback after failure failed");
                }
                return Err(e).with_context(|| format!("{} failed", path.display()));
            }
        }
    }
    conn.close().await?;

    if args.quiet {
        println!("{total} statements, {} log lines", buffer.len());
    }
    Ok(())
}
