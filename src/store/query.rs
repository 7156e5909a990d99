//! Read-only SQL escape hatch over the artifact schema.

use std::io::Write;

use serde::Serialize;
use serde_json::{Number, Value};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Column, Executor, Row, Statement, TypeInfo, ValueRef};
use tracing::debug;

use super::Store;
use crate::error::QueryError;

const READ_KEYWORDS: [&str; 4] = ["SELECT", "WITH", "VALUES", "EXPLAIN"];

/// Tabular query output. Cells are JSON scalars (`null`, number, string).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Values of one column by name, in row order.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().filter_map(|r| r.get(idx)).collect())
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> anyhow::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.columns)?;
        for row in &self.rows {
            wtr.write_record(row.iter().map(|v| cell_text(v, "")))?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Plain aligned table for terminals.
    pub fn render_table(&self) -> String {
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|r| r.iter().map(|v| cell_text(v, "NULL")).collect())
            .collect();
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &cells {
            for (i, cell) in row.iter().enumerate() {
                if let Some(w) = widths.get_mut(i) {
                    *w = (*w).max(cell.chars().count());
                }
            }
        }

        let line = |values: &[String]| -> String {
            values
                .iter()
                .zip(&widths)
                .map(|(v, w)| format!("{v:<w$}", w = *w))
                .collect::<Vec<_>>()
                .join(" | ")
                .trim_end()
                .to_string()
        };

        let mut out = String::new();
        out.push_str(&line(&self.columns));
        out.push('\n');
        out.push_str(
            &widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("-+-"),
        );
        out.push('\n');
        for row in &cells {
            out.push_str(&line(row));
            out.push('\n');
        }
        out
    }
}

fn cell_text(v: &Value, null: &str) -> String {
    match v {
        Value::Null => null.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl Store {
    /// Run one read-only statement and return its rows.
    ///
    /// The statement is screened lexically (single statement, read keyword
    /// first) and then executed on the reader pool, whose connections are
    /// opened with `PRAGMA query_only = ON`, so the engine refuses any write
    /// that slips past the screen. Dropping the future mid-query cannot leave
    /// a writer connection read-only. Zero rows is an empty result, not an
    /// error.
    pub async fn query(&self, sql: &str) -> Result<QueryResult, QueryError> {
        let statement = screen_read_only(sql)?;
        let mut conn = self.reader().acquire().await?;
        let result = run_read(&mut conn, statement).await;

        match &result {
            Ok(r) => debug!(rows = r.len(), columns = r.columns.len(), "query finished"),
            Err(e) => debug!(error = %e, "query failed"),
        }
        result
    }
}

async fn run_read(conn: &mut SqliteConnection, sql: &str) -> Result<QueryResult, QueryError> {
    let prepared = (&mut *conn).prepare(sql).await?;
    let columns: Vec<String> = prepared
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    let rows = sqlx::query(sql).fetch_all(&mut *conn).await?;
    let rows = rows.iter().map(|row| decode_row(row, columns.len())).collect();
    Ok(QueryResult { columns, rows })
}

fn decode_row(row: &SqliteRow, width: usize) -> Vec<Value> {
    (0..width).map(|idx| decode_cell(row, idx)).collect()
}

fn decode_cell(row: &SqliteRow, idx: usize) -> Value {
    let type_name = match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_ascii_uppercase(),
        Err(_) => return Value::Null,
    };
    match type_name.as_str() {
        "INTEGER" | "INT" | "BIGINT" | "BOOLEAN" => row
            .try_get_unchecked::<i64, _>(idx)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => row
            .try_get_unchecked::<f64, _>(idx)
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "BLOB" => row
            .try_get_unchecked::<Vec<u8>, _>(idx)
            .map(|bytes| Value::String(bytes.iter().map(|b| format!("{b:02x}")).collect()))
            .unwrap_or(Value::Null),
        _ => row
            .try_get_unchecked::<String, _>(idx)
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

/// Reject anything that is not a single read statement. Returns the statement
/// with trailing semicolons and whitespace removed.
pub(crate) fn screen_read_only(sql: &str) -> Result<&str, QueryError> {
    let body = sql.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    if body.is_empty() || strip_leading_comments(body).is_empty() {
        return Err(QueryError::Empty);
    }
    if has_statement_separator(body) {
        return Err(QueryError::Forbidden("multiple statements".into()));
    }
    let head = strip_leading_comments(body);
    let keyword: String = head
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();
    if !READ_KEYWORDS.contains(&keyword.as_str()) {
        let shown = if keyword.is_empty() { "<none>" } else { keyword.as_str() };
        return Err(QueryError::Forbidden(format!("{shown} statement")));
    }
    Ok(body)
}

fn strip_leading_comments(mut s: &str) -> &str {
    loop {
        s = s.trim_start();
        if let Some(rest) = s.strip_prefix("--") {
            s = rest.split_once('\n').map(|(_, tail)| tail).unwrap_or("");
        } else if let Some(rest) = s.strip_prefix("/*") {
            s = rest.split_once("*/").map(|(_, tail)| tail).unwrap_or("");
        } else {
            return s;
        }
    }
}

/// True if a `;` appears outside string literals, quoted identifiers and comments.
fn has_statement_separator(sql: &str) -> bool {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        Single,
        Double,
        Bracket,
        LineComment,
        BlockComment,
    }
    let mut state = State::Code;
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        state = match (state, c) {
            (State::Code, ';') => return true,
            (State::Code, '\'') => State::Single,
            (State::Code, '"') => State::Double,
            (State::Code, '[') => State::Bracket,
            (State::Code, '-') if chars.peek() == Some(&'-') => {
                chars.next();
                State::LineComment
            }
            (State::Code, '/') if chars.peek() == Some(&'*') => {
                chars.next();
                State::BlockComment
            }
            (State::Single, '\'') => State::Code,
            (State::Double, '"') => State::Code,
            (State::Bracket, ']') => State::Code,
            (State::LineComment, '\n') => State::Code,
            (State::BlockComment, '*') if chars.peek() == Some(&'/') => {
                chars.next();
                State::Code
            }
            (s, _) => s,
        };
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::sample;
    use serde_json::json;
    use std::time::Duration;

    async fn seeded() -> Store {
        let store = Store::in_memory().await.unwrap();
        store
            .insert_batch(&[sample(1, &["Grey", "Blue"]), sample(2, &["Grey"])])
            .await;
        store
    }

    #[test]
    fn screen_accepts_single_reads() {
        assert!(screen_read_only("SELECT 1").is_ok());
        assert!(screen_read_only("  select * from artifact_metadata;  ").is_ok());
        assert!(screen_read_only("WITH x AS (SELECT 1) SELECT * FROM x").is_ok());
        assert!(screen_read_only("-- note\nSELECT ';' AS semi").is_ok());
        assert_eq!(screen_read_only("SELECT 1;;").unwrap(), "SELECT 1");
    }

    #[test]
    fn screen_rejects_writes_and_batches() {
        assert!(matches!(screen_read_only("   "), Err(QueryError::Empty)));
        assert!(matches!(screen_read_only("-- only a comment"), Err(QueryError::Empty)));
        assert!(matches!(
            screen_read_only("DELETE FROM artifact_colors"),
            Err(QueryError::Forbidden(_))
        ));
        assert!(matches!(
            screen_read_only("SELECT 1; DROP TABLE artifact_metadata"),
            Err(QueryError::Forbidden(_))
        ));
        assert!(matches!(
            screen_read_only("PRAGMA query_only = OFF"),
            Err(QueryError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn returns_typed_cells() {
        let store = seeded().await;
        let res = store
            .query(
                "SELECT m.id, m.title, a.rank, c.percent, m.period
                 FROM artifact_metadata m
                 JOIN artifact_media a ON a.objectid = m.id
                 JOIN artifact_colors c ON c.objectid = m.id
                 WHERE m.id = 2",
            )
            .await
            .unwrap();
        assert_eq!(res.columns, vec!["id", "title", "rank", "percent", "period"]);
        assert_eq!(res.rows, vec![vec![json!(2), json!("Object 2"), json!(20), json!(0.5), Value::Null]]);
    }

    #[tokio::test]
    async fn zero_rows_is_empty_not_error() {
        let store = seeded().await;
        let res = store
            .query("SELECT id, title FROM artifact_metadata WHERE id < 0")
            .await
            .unwrap();
        assert!(res.is_empty());
        assert_eq!(res.columns, vec!["id", "title"]);
    }

    #[tokio::test]
    async fn syntax_errors_are_reported() {
        let store = seeded().await;
        let err = store.query("SELECT FROM WHERE").await.unwrap_err();
        assert!(matches!(err, QueryError::Engine(_)));
    }

    #[tokio::test]
    async fn cte_writes_are_refused_by_engine() {
        let store = seeded().await;
        let err = store
            .query("WITH doomed AS (SELECT 1) DELETE FROM artifact_colors")
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Engine(_)));
        assert_eq!(store.counts().await.unwrap().color_rows, 3);
        assert_eq!(store.insert_batch(&[sample(3, &[])]).await.succeeded, 1);
    }

    #[tokio::test]
    async fn abandoned_query_leaves_store_writable() {
        let store = seeded().await;
        let slow = store.query(
            "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < 20000000)
             SELECT x FROM n",
        );
        let timed_out = tokio::time::timeout(Duration::from_millis(50), slow).await;
        assert!(timed_out.is_err(), "query should still be running");

        let report = store.insert_batch(&[sample(7, &["Red"])]).await;
        assert_eq!(report.succeeded, 1, "{:?}", report.failed);
        assert!(report.failed.is_empty());
        assert_eq!(store.counts().await.unwrap().metadata_rows, 3);
    }

    #[tokio::test]
    async fn aggregates_and_column_access() {
        let store = seeded().await;
        let res = store
            .query("SELECT hue, COUNT(*) AS frequency FROM artifact_colors GROUP BY hue ORDER BY frequency DESC")
            .await
            .unwrap();
        assert_eq!(res.column("hue").unwrap(), vec![&json!("Grey"), &json!("Blue")]);
        assert_eq!(res.column("frequency").unwrap(), vec![&json!(2), &json!(1)]);
        assert!(res.column("nope").is_none());
    }

    #[test]
    fn csv_and_table_rendering() {
        let res = QueryResult {
            columns: vec!["id".into(), "title".into()],
            rows: vec![
                vec![json!(1), json!("Bowl, glazed")],
                vec![json!(22), Value::Null],
            ],
        };
        let mut buf = Vec::new();
        res.write_csv(&mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "id,title\n1,\"Bowl, glazed\"\n22,\n"
        );

        let table = res.render_table();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "id | title");
        assert_eq!(lines[1], "---+-------------");
        assert_eq!(lines[2], "1  | Bowl, glazed");
        assert_eq!(lines[3], "22 | NULL");
    }
}
