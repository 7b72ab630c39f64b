use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table, presets::UTF8_FULL};
use dblog::{Cursor, DbResult, SqlValue};
use std::ops::Range;

/// A window of result rows. Pages are numbered from 0; `len == 0` shows
/// every row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub index: usize,
    pub len: usize,
}

impl Page {
    /// Row indexes shown, or `None` when not paging.
    pub fn rows(&self) -> Option<Range<usize>> {
        if self.len == 0 {
            return None;
        }
        let start = self.index.saturating_mul(self.len);
        Some(start..start.saturating_add(self.len))
    }
}

/// Drop blank lines and `--` comment lines, then make sure what is left is
/// a query.
pub fn select_sql(sql: &str) -> anyhow::Result<String> {
    let cleaned = sql
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");
    if cleaned.is_empty() {
        anyhow::bail!("no SQL to run");
    }
    let is_select = cleaned
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("select"));
    if !is_select {
        anyhow::bail!("only SELECT statements can be shown as a table");
    }
    Ok(cleaned)
}

/// Read `cursor` into a console table with one header cell per column,
/// keeping only the rows of `page`.
///
/// Returns the table and the number of rows in it. Reading stops at the end
/// of the page.
pub async fn collect<K: Cursor>(cursor: &mut K, page: Page) -> DbResult<(Table, usize)> {
    let columns = cursor.column_count();
    let header: Vec<Cell> = (0..columns)
        .map(|i| {
            Cell::new(cursor.column_name(i).unwrap_or("?"))
                .add_attribute(Attribute::Bold)
                .fg(Color::Cyan)
        })
        .collect();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);

    let window = page.rows();
    let mut rows = 0;
    let mut index = 0;
    while cursor.advance().await? {
        let at = index;
        index += 1;
        if let Some(window) = &window {
            if at < window.start {
                continue;
            }
            if at >= window.end {
                break;
            }
        }
        let mut row = Vec::with_capacity(columns);
        for i in 0..columns {
            row.push(cell(&cursor.value(i)?));
        }
        table.add_row(row);
        rows += 1;
    }
    Ok((table, rows))
}

fn cell(value: &SqlValue) -> Cell {
    match value {
        SqlValue::Null => Cell::new("(null)").fg(Color::DarkGrey),
        SqlValue::Int(_) | SqlValue::Float(_) | SqlValue::Decimal(_) => {
            Cell::new(value).fg(Color::Yellow)
        }
        SqlValue::Bool(_) => Cell::new(value).fg(Color::Green),
        _ => Cell::new(value),
    }
}
