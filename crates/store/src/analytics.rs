//! SQLite database for text-to-SQL analytics.
//!
//! `table_info` renders each table's `CREATE` statement followed by a few
//! sample rows, which is what the model sees when writing a query. `run`
//! executes a query and renders the rows as a list of tuples.
//!
//! The database is opened read-only and never created. `run` accepts a single
//! `SELECT` (or `WITH`) statement, and when a table list is set it refuses
//! queries that name any other table.

use async_trait::async_trait;
use parley_core::error::StoreError;
use parley_core::sql::SqlDatabase;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, SqlitePool, TypeInfo, ValueRef};
use std::str::FromStr;
use tracing::{debug, warn};

/// A SQLite database the analytics tool can describe and query.
pub struct SqliteDatabase {
    pool: SqlitePool,
    tables: Vec<String>,
    sample_rows: usize,
}

impl SqliteDatabase {
    /// Open the existing database at `path` (a file path or `sqlite:` URL)
    /// read-only. The journal mode is left as the file has it.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let options = if path.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(path)
                .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
        } else {
            SqliteConnectOptions::new().filename(path)
        };
        let options = options.read_only(true).create_if_missing(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| {
                StoreError::Storage(format!("Failed to open analytics database {path}: {e}"))
            })?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            tables: Vec::new(),
            sample_rows: 2,
        }
    }

    /// Restrict the tables shown to the model. Empty means every table.
    pub fn with_tables(mut self, tables: Vec<String>) -> Self {
        self.tables = tables;
        self
    }

    pub fn with_sample_rows(mut self, sample_rows: usize) -> Self {
        self.sample_rows = sample_rows;
        self
    }

    /// Names of the user tables in the database, sorted.
    pub async fn table_names(&self) -> Result<Vec<String>, StoreError> {
        sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("List tables: {e}")))
    }

    /// Tables that exist and are allowed.
    async fn usable_tables(&self) -> Result<Vec<String>, StoreError> {
        let existing = self.table_names().await?;
        if self.tables.is_empty() {
            return Ok(existing);
        }
        Ok(self
            .tables
            .iter()
            .filter(|t| existing.contains(t))
            .cloned()
            .collect())
    }

    /// Refuse anything but one read query over the allowed tables.
    async fn check_query(&self, sql: &str) -> Result<(), StoreError> {
        let scan = scan_sql(sql);
        match scan.words.first().map(String::as_str) {
            Some("select") | Some("with") => {}
            _ => return Err(StoreError::QueryFailed("Only SELECT queries are allowed".into())),
        }
        if scan.statements > 1 {
            return Err(StoreError::QueryFailed(
                "Only one statement per query is allowed".into(),
            ));
        }
        if self.tables.is_empty() {
            return Ok(());
        }

        let allowed: Vec<String> = self.tables.iter().map(|t| t.to_lowercase()).collect();
        let hidden: Vec<String> = self
            .table_names()
            .await?
            .into_iter()
            .map(|t| t.to_lowercase())
            .filter(|t| !allowed.contains(t))
            .collect();

        for word in &scan.words {
            if word.starts_with("sqlite_") || word.starts_with("pragma_") || hidden.contains(word) {
                return Err(StoreError::QueryFailed(format!("Table {word} is not available")));
            }
        }
        Ok(())
    }

    async fn describe_table(&self, table: &str) -> Result<String, StoreError> {
        let create: String =
            sqlx::query_scalar("SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1")
                .bind(table)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| StoreError::QueryFailed(format!("Schema of {table}: {e}")))?;

        let mut out = create.trim().to_string();
        if self.sample_rows == 0 {
            return Ok(out);
        }

        let sql = format!(
            "SELECT * FROM {} LIMIT {}",
            quote_identifier(table),
            self.sample_rows
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("Sample rows of {table}: {e}")))?;

        out.push_str(&format!(
            "\n\n/*\n{} rows from {table} table:\n",
            self.sample_rows
        ));
        if let Some(first) = rows.first() {
            let header: Vec<&str> = first.columns().iter().map(|c| c.name()).collect();
            out.push_str(&header.join("\t"));
            out.push('\n');
        }
        for row in &rows {
            let cells: Vec<String> = (0..row.len()).map(|i| render_cell(row, i, false)).collect();
            out.push_str(&cells.join("\t"));
            out.push('\n');
        }
        out.push_str("*/");
        Ok(out)
    }
}

/// Quote a SQL identifier for SQLite.
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Words and statement count of a SQL text.
struct SqlScan {
    /// Lower-cased keywords and identifiers, including quoted identifiers.
    words: Vec<String>,
    /// Non-empty statements separated by `;`.
    statements: usize,
}

/// Split SQL into words, skipping string literals and comments.
fn scan_sql(sql: &str) -> SqlScan {
    let chars: Vec<char> = sql.chars().collect();
    let mut words = Vec::new();
    let mut statements = 0;
    let mut in_statement = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' => {
                i += 1;
                while i < chars.len() {
                    if chars[i] == '\'' {
                        if chars.get(i + 1) == Some(&'\'') {
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    i += 1;
                }
                i += 1;
                in_statement = true;
            }
            '"' | '`' | '[' => {
                let close = if c == '[' { ']' } else { c };
                let start = i + 1;
                i = start;
                while i < chars.len() && chars[i] != close {
                    i += 1;
                }
                let word: String = chars[start..i.min(chars.len())].iter().collect();
                words.push(word.to_lowercase());
                i += 1;
                in_statement = true;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
            }
            ';' => {
                if in_statement {
                    statements += 1;
                    in_statement = false;
                }
                i += 1;
            }
            c if c.is_alphanumeric() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                words.push(word.to_lowercase());
                in_statement = true;
            }
            c if c.is_whitespace() => i += 1,
            _ => {
                i += 1;
                in_statement = true;
            }
        }
    }
    if in_statement {
        statements += 1;
    }

    SqlScan { words, statements }
}

/// Render one cell. `quoted` wraps text in single quotes for tuple output.
fn render_cell(row: &SqliteRow, index: usize, quoted: bool) -> String {
    let is_null = row
        .try_get_raw(index)
        .map(|value| value.is_null())
        .unwrap_or(true);
    if is_null {
        return "None".into();
    }

    if let Ok(v) = row.try_get::<i64, _>(index) {
        return v.to_string();
    }
    if let Ok(v) = row.try_get::<f64, _>(index) {
        return v.to_string();
    }
    if let Ok(v) = row.try_get::<String, _>(index) {
        return if quoted {
            format!("'{}'", v.replace('\'', "\\'"))
        } else {
            v
        };
    }
    if let Ok(v) = row.try_get::<Vec<u8>, _>(index) {
        return format!("<{} bytes>", v.len());
    }

    let type_name = row
        .try_get_raw(index)
        .map(|value| value.type_info().name().to_string())
        .unwrap_or_default();
    format!("<{type_name}>")
}

/// Render rows as `[(a, 'b'), (c, 'd')]`. No rows renders as an empty string.
fn render_rows(rows: &[SqliteRow]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let tuples: Vec<String> = rows
        .iter()
        .map(|row| {
            let cells: Vec<String> = (0..row.len()).map(|i| render_cell(row, i, true)).collect();
            if cells.len() == 1 {
                format!("({},)", cells[0])
            } else {
                format!("({})", cells.join(", "))
            }
        })
        .collect();

    format!("[{}]", tuples.join(", "))
}

#[async_trait]
impl SqlDatabase for SqliteDatabase {
    fn dialect(&self) -> &str {
        "sqlite"
    }

    async fn table_info(&self) -> Result<String, StoreError> {
        let tables = self.usable_tables().await?;
        let mut sections = Vec::with_capacity(tables.len());
        for table in &tables {
            sections.push(self.describe_table(table).await?);
        }
        Ok(sections.join("\n\n"))
    }

    async fn run(&self, sql: &str) -> Result<String, StoreError> {
        debug!(sql = %sql, "Running analytics query");
        if let Err(e) = self.check_query(sql).await {
            warn!(sql = %sql, error = %e, "Refused analytics query");
            return Err(e);
        }
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        Ok(render_rows(&rows))
    }
}
