use crate::config::DEFAULT_BUSY_TIMEOUT_MS;
use crate::models::{Category, PageDetail, PageStatistics};
use crate::repository::{category_from_row, page_from_row, CATEGORY_COLUMNS, PAGE_COLUMNS};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Tables are created if missing; there is no migration step.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS project (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS namespace (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS page (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL CHECK (length(trim(title)) > 0),
    -- lowercased title, folded in Rust so non-ASCII case variants collide
    title_key TEXT NOT NULL UNIQUE,
    text TEXT NOT NULL DEFAULT '',
    views INTEGER NOT NULL DEFAULT 0 CHECK (views >= 0),
    status TEXT NOT NULL DEFAULT 'stub' CHECK (status IN ('stub', 'active')),
    project_id INTEGER REFERENCES project(id),
    namespace_id INTEGER REFERENCES namespace(id),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_page_project_id ON page(project_id);
CREATE INDEX IF NOT EXISTS idx_page_views ON page(views DESC);

CREATE TABLE IF NOT EXISTS category (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    name_key TEXT NOT NULL UNIQUE,
    text_content TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'stub' CHECK (status IN ('stub', 'active'))
);

-- no uniqueness on the pair: a page can be linked to the same category twice
CREATE TABLE IF NOT EXISTS page_category (
    page_id INTEGER NOT NULL REFERENCES page(id) ON DELETE CASCADE,
    category_id INTEGER NOT NULL REFERENCES category(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_page_category_page_id ON page_category(page_id);
CREATE INDEX IF NOT EXISTS idx_page_category_category_id ON page_category(category_id);
"#;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("invalid data: {0}")]
    InvalidData(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// True when a UNIQUE constraint rejected the write.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => {
                e.code == ErrorCode::ConstraintViolation
                    && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            }
            _ => false,
        }
    }
}

/// Storage handle owning one SQLite connection.
///
/// Every repository call runs inside its own short transaction obtained
/// through [`Store::session`] or [`Store::write_session`]; nothing spans a
/// whole source row.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        let store = Self::bootstrap(conn)?;
        info!(path = ?path, "Opened database");
        Ok(store)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
        Self::bootstrap(conn)
    }

    fn bootstrap(conn: Connection) -> StoreResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Runs `f` in a deferred transaction: committed on `Ok`, rolled back on `Err`.
    pub fn session<T>(
        &mut self,
        f: impl FnOnce(&Transaction<'_>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        self.session_with(TransactionBehavior::Deferred, f)
    }

    /// Like [`Store::session`] but takes the write lock up front, so a
    /// check-then-insert inside `f` cannot interleave with another writer.
    pub fn write_session<T>(
        &mut self,
        f: impl FnOnce(&Transaction<'_>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        self.session_with(TransactionBehavior::Immediate, f)
    }

    fn session_with<T>(
        &mut self,
        behavior: TransactionBehavior,
        f: impl FnOnce(&Transaction<'_>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let tx = self.conn.transaction_with_behavior(behavior)?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                debug!(error = %e, "Rolling back session");
                if let Err(rollback_err) = tx.rollback() {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Raw connection for ad-hoc reads.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn page_count(&self) -> StoreResult<i64> {
        self.count("SELECT COUNT(*) FROM page")
    }

    pub fn category_count(&self) -> StoreResult<i64> {
        self.count("SELECT COUNT(*) FROM category")
    }

    pub fn link_count(&self) -> StoreResult<i64> {
        self.count("SELECT COUNT(*) FROM page_category")
    }

    fn count(&self, sql: &str) -> StoreResult<i64> {
        Ok(self.conn.query_row(sql, [], |row| row.get(0))?)
    }

    pub fn page_statistics(&self) -> StoreResult<PageStatistics> {
        let stats = self.conn.query_row(
            r#"SELECT COUNT(*),
                      COALESCE(SUM(views), 0),
                      COALESCE(AVG(views), 0.0),
                      COALESCE(MAX(views), 0),
                      COALESCE(MIN(views), 0),
                      COUNT(DISTINCT project_id),
                      COUNT(DISTINCT namespace_id)
               FROM page"#,
            [],
            |row| {
                Ok(PageStatistics {
                    total_pages: row.get(0)?,
                    total_views: row.get(1)?,
                    avg_views: row.get(2)?,
                    max_views: row.get(3)?,
                    min_views: row.get(4)?,
                    projects_count: row.get(5)?,
                    namespaces_count: row.get(6)?,
                })
            },
        )?;
        Ok(stats)
    }

    pub fn get_page(&self, page_id: i64) -> StoreResult<Option<PageDetail>> {
        let sql = format!(
            r#"SELECT {PAGE_COLUMNS}, pr.name, n.name
               FROM page p
               LEFT JOIN project pr ON p.project_id = pr.id
               LEFT JOIN namespace n ON p.namespace_id = n.id
               WHERE p.id = ?1"#
        );
        let detail = self
            .conn
            .query_row(&sql, params![page_id], |row| {
                Ok(PageDetail {
                    page: page_from_row(row)?,
                    project_name: row.get(7)?,
                    namespace_name: row.get(8)?,
                })
            })
            .optional()?;
        Ok(detail)
    }

    /// Categories linked to a page, one entry per link row, in link order.
    pub fn categories_for_page(&self, page_id: i64) -> StoreResult<Vec<Category>> {
        let sql = format!(
            r#"SELECT {CATEGORY_COLUMNS}
               FROM page_category pc
               JOIN category c ON c.id = pc.category_id
               WHERE pc.page_id = ?1
               ORDER BY pc.rowid"#
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let categories = stmt
            .query_map(params![page_id], category_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    pub fn top_viewed(&self, limit: u32) -> StoreResult<Vec<PageDetail>> {
        let sql = format!(
            r#"SELECT {PAGE_COLUMNS}, pr.name, n.name
               FROM page p
               LEFT JOIN project pr ON p.project_id = pr.id
               LEFT JOIN namespace n ON p.namespace_id = n.id
               ORDER BY p.views DESC, p.id
               LIMIT ?1"#
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let pages = stmt
            .query_map(params![limit], |row| {
                Ok(PageDetail {
                    page: page_from_row(row)?,
                    project_name: row.get(7)?,
                    namespace_name: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pages)
    }
}
