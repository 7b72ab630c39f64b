use crate::table::Page;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpTopic {
    Root,
    Run,
    Query,
}

#[derive(Debug, Clone)]
pub enum Command {
    Help(HelpTopic),
    Run(RunArgs),
    Query(QueryArgs),
}

/// Options shared by every command that connects.
#[derive(Debug, Clone, Default)]
pub struct ConnectArgs {
    /// Explicit `--config`; `dblog.toml` is used when present otherwise.
    pub config: Option<PathBuf>,
    pub database: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RunArgs {
    pub connect: ConnectArgs,
    pub commit_after: usize,
    pub no_statements: bool,
    pub no_cursors: bool,
    pub no_transactions: bool,
    pub quiet: bool,
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct QueryArgs {
    pub connect: ConnectArgs,
    pub sql: String,
    pub page: Page,
}

pub fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let mut it = args.iter().skip(1);
    let Some(first) = it.next() else {
        return Ok(Command::Help(HelpTopic::Root));
    };

    match first.as_str() {
        "-h" | "--help" | "help" => Ok(Command::Help(HelpTopic::Root)),
        "run" => parse_run(it.map(|s| s.as_str())),
        "query" => parse_query(it.map(|s| s.as_str())),
        _ => anyhow::bail!("unknown command: {first}"),
    }
}

/// Consume `--config` / `--database` in either `--flag value` or
/// `--flag=value` form. Returns `false` when `token` is not one of them.
fn parse_connect_flag<'a>(
    token: &'a str,
    it: &mut impl Iterator<Item = &'a str>,
    connect: &mut ConnectArgs,
) -> anyhow::Result<bool> {
    match token {
        "--config" => {
            let Some(v) = it.next() else {
                anyhow::bail!("--config requires a value");
            };
            connect.config = Some(PathBuf::from(v));
        }
        _ if token.starts_with("--config=") => {
            connect.config = Some(PathBuf::from(token.trim_start_matches("--config=")));
        }
        "--database" => {
            let Some(v) = it.next() else {
                anyhow::bail!("--database requires a value");
            };
            connect.database = Some(v.to_string());
        }
        _ if token.starts_with("--database=") => {
            connect.database = Some(token.trim_start_matches("--database=").to_string());
        }
        _ => return Ok(false),
    }
    Ok(true)
}

fn parse_count(flag: &str, v: &str) -> anyhow::Result<usize> {
    v.parse()
        .map_err(|_| anyhow::anyhow!("{flag} must be a non-negative integer, got {v}"))
}

/// Value of `flag` given as `--flag value` or `--flag=value`, or `None` when
/// `token` is a different argument.
fn flag_value<'a>(
    flag: &str,
    token: &'a str,
    it: &mut impl Iterator<Item = &'a str>,
) -> anyhow::Result<Option<&'a str>> {
    if token == flag {
        let Some(v) = it.next() else {
            anyhow::bail!("{flag} requires a value");
        };
        return Ok(Some(v));
    }
    Ok(token
        .strip_prefix(flag)
        .and_then(|rest| rest.strip_prefix('=')))
}

fn parse_run<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut connect = ConnectArgs::default();
    let mut commit_after = 0;
    let mut no_statements = false;
    let mut no_cursors = false;
    let mut no_transactions = false;
    let mut quiet = false;
    let mut files: Vec<PathBuf> = Vec::new();

    while let Some(token) = it.next() {
        if parse_connect_flag(token, &mut it, &mut connect)? {
            continue;
        }
        if let Some(v) = flag_value("--commit-after", token, &mut it)? {
            commit_after = parse_count("--commit-after", v)?;
            continue;
        }
        match token {
            "-h" | "--help" => return Ok(Command::Help(HelpTopic::Run)),
            "--no-statements" => no_statements = true,
            "--no-cursors" => no_cursors = true,
            "--no-transactions" => no_transactions = true,
            "-q" | "--quiet" => quiet = true,
            other if other.starts_with('-') => anyhow::bail!("unknown argument: {other}"),
            file => files.push(PathBuf::from(file)),
        }
    }

    if files.is_empty() {
        anyhow::bail!("dblog run requires at least one SQL file");
    }

    Ok(Command::Run(RunArgs {
        connect,
        commit_after,
        no_statements,
        no_cursors,
        no_transactions,
        quiet,
        files,
    }))
}

fn parse_query<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut connect = ConnectArgs::default();
    let mut sql: Option<String> = None;
    let mut page = Page::default();

    while let Some(token) = it.next() {
        if parse_connect_flag(token, &mut it, &mut connect)? {
            continue;
        }
        if let Some(v) = flag_value("--page", token, &mut it)? {
            page.index = parse_count("--page", v)?;
            continue;
        }
        if let Some(v) = flag_value("--page-len", token, &mut it)? {
            page.len = parse_count("--page-len", v)?;
            continue;
        }
        match token {
            "-h" | "--help" => return Ok(Command::Help(HelpTopic::Query)),
            other if other.starts_with("--") => anyhow::bail!("unknown argument: {other}"),
            text if sql.is_none() => sql = Some(text.to_string()),
            extra => anyhow::bail!("unexpected argument: {extra} (quote the SQL as one argument)"),
        }
    }

    let Some(sql) = sql else {
        anyhow::bail!("dblog query requires a SQL statement");
    };

    Ok(Command::Query(QueryArgs { connect, sql, page }))
}

pub fn print_help(topic: HelpTopic) {
    match topic {
        HelpTopic::Root => {
            println!(
                "\
dblog - run SQL through a logging connection

USAGE:
  dblog <COMMAND> [OPTIONS]

COMMANDS:
  run           Execute SQL script files
  query         Run one query and print the rows as a table
  help          Print this help

Run `dblog <command> --help` for more."
            );
        }
        HelpTopic::Run => {
            println!(
                "\
USAGE:
  dblog run <FILE>... [OPTIONS]

Statements are separated by `;`; `--` starts a comment. Every statement runs
as an update on one connection with auto-commit off.

OPTIONS:
  --config <FILE>       Config file path (default: dblog.toml, if present)
  --database <URL>      Override database.url from config
  --commit-after <N>    Commit after every N statements (default: only at the end)
  --no-statements       Do not log statements
  --no-cursors          Do not log cursor statistics
  --no-transactions     Do not log commit/rollback
  -q, --quiet           Collect log lines and print only a count
  -h, --help            Print help"
            );
        }
        HelpTopic::Query => {
            println!(
                "\
USAGE:
  dblog query <SQL> [OPTIONS]

Only SELECT statements are accepted; lines starting with `--` are ignored.

OPTIONS:
  --config <FILE>       Config file path (default: dblog.toml, if present)
  --database <URL>      Override database.url from config
  --page <N>            Page to show, counting from 0 (needs --page-len)
  --page-len <N>        Rows per page (default: show every row)
  -h, --help            Print help"
            );
        }
    }
}
