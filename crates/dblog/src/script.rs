//! SQL script splitting and execution.
//!
//! Statements are separated by `;`. A `;` inside a single-quoted literal does
//! not separate, and `--` starts a comment running to the end of the line.
//! Statements are trimmed and empty ones are skipped.
//!
//! ```
//! use dblog::Script;
//!
//! let script = Script::new("create table t (a text); -- setup\ninsert into t values ('x;y');");
//! let statements: Vec<String> = script.statements().collect();
//! assert_eq!(statements, ["create table t (a text)", "insert into t values ('x;y')"]);
//! ```

use crate::error::DbResult;
use crate::resource::{Connection, Statement};
use std::iter::Peekable;
use std::str::Chars;

/// A SQL script held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    text: String,
}

impl Script {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Iterate over the statements of the script.
    pub fn statements(&self) -> Statements<'_> {
        Statements {
            chars: self.text.chars().peekable(),
        }
    }

    /// Run every statement as an update through one statement handle.
    ///
    /// With `commit_after > 0` the connection commits after every
    /// `commit_after` statements; it always commits once at the end. Returns
    /// the number of statements executed. Stops at the first failure without
    /// committing.
    pub async fn execute<C: Connection>(&self, conn: &mut C, commit_after: usize) -> DbResult<usize> {
        let mut statement = conn.create_statement().await?;
        let mut executed = 0;
        for sql in self.statements() {
            statement.execute_update(&sql).await?;
            executed += 1;
            if commit_after > 0 && executed % commit_after == 0 {
                conn.commit().await?;
            }
        }
        statement.close().await?;
        conn.commit().await?;
        tracing::debug!(target: "dblog", executed, "script finished");
        Ok(executed)
    }
}

impl<'a> IntoIterator for &'a Script {
    type Item = String;
    type IntoIter = Statements<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.statements()
    }
}

/// Iterator over the statements of a [`Script`].
pub struct Statements<'a> {
    chars: Peekable<Chars<'a>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Scan {
    Code,
    Literal,
    Comment,
}

impl Statements<'_> {
    /// Read up to the next separator. The flag is false once input ran out.
    fn read_one(&mut self) -> (String, bool) {
        let mut buf = String::new();
        let mut scan = Scan::Code;
        while let Some(c) = self.chars.next() {
            match scan {
                Scan::Literal => {
                    if c == '\'' {
                        scan = Scan::Code;
                    }
                }
                Scan::Comment => {
                    if c != '\n' {
                        continue;
                    }
                    scan = Scan::Code;
                }
                Scan::Code => match c {
                    ';' => return (buf, true),
                    '\'' => scan = Scan::Literal,
                    '-' if self.chars.peek() == Some(&'-') => {
                        scan = Scan::Comment;
                        continue;
                    }
                    _ => {}
                },
            }
            buf.push(c);
        }
        (buf, false)
    }
}

impl Iterator for Statements<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let (text, more) = self.read_one();
            let text = text.trim();
            if !text.is_empty() {
                return Some(text.to_string());
            }
            if !more {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeConn;

    fn split(text: &str) -> Vec<String> {
        Script::new(text).statements().collect()
    }

    #[test]
    fn test_splits_on_semicolon_outside_literals() {
        assert_eq!(
            split("/tmp/a.sql;' -- note';a toto --real note\n;next "),
            ["/tmp/a.sql", "' -- note'", "a toto", "next"]
        );
    }

    #[test]
    fn test_skips_blank_statements() {
        assert_eq!(split(";;  ;\n"), Vec::<String>::new());
        assert_eq!(split("select 1;;select 2;"), ["select 1", "select 2"]);
    }

    #[test]
    fn test_comment_at_end_without_newline() {
        assert_eq!(split("select 1 -- trailing; not a split"), ["select 1"]);
    }

    #[test]
    fn test_single_dash_is_code() {
        assert_eq!(split("select 3 - 1; select -2"), ["select 3 - 1", "select -2"]);
    }

    #[test]
    fn test_multiline_statement_keeps_inner_newlines() {
        assert_eq!(
            split("insert into t\n  -- values below\n  values ('it''s; fine');"),
            ["insert into t\n  \n  values ('it''s; fine')"]
        );
    }

    #[tokio::test]
    async fn test_execute_commits_in_batches_and_at_end() {
        let mut conn = FakeConn::default();
        let script = Script::new("insert a; insert b; insert c;");

        let executed = script.execute(&mut conn, 2).await.unwrap();

        assert_eq!(executed, 3);
        assert_eq!(
            conn.events(),
            [
                "update: insert a",
                "update: insert b",
                "commit",
                "update: insert c",
                "commit",
            ]
        );
    }

    #[tokio::test]
    async fn test_execute_without_batches_commits_once() {
        let mut conn = FakeConn::default();

        Script::new("a; b").execute(&mut conn, 0).await.unwrap();

        assert_eq!(conn.events(), ["update: a", "update: b", "commit"]);
    }

    #[tokio::test]
    async fn test_execute_stops_at_first_failure() {
        let mut conn = FakeConn::failing();

        assert!(Script::new("a; b").execute(&mut conn, 1).await.is_err());
        assert!(conn.events().is_empty());
    }
}
