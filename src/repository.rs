//! Repository contracts consumed by the row processor, and their SQLite
//! implementation on [`Store`].
//!
//! Create operations return `Ok(None)` when the natural key (page title,
//! category name) is already taken, including when the storage UNIQUE
//! constraint rejects a racing insert. `Err` is reserved for storage failures.

use crate::models::{Category, NewPage, Page, PageCategory, ReferenceTable, Status};
use crate::store::{Store, StoreResult};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, warn};

pub(crate) const PAGE_COLUMNS: &str =
    "p.id, p.title, p.text, p.views, p.status, p.project_id, p.namespace_id";

pub(crate) const CATEGORY_COLUMNS: &str = "c.id, c.name, c.text_content, c.status";

pub trait PageRepository {
    /// Exact title match ignoring case (see [`fold_key`]).
    fn get_page_by_title(&mut self, title: &str) -> StoreResult<Option<Page>>;
    /// Inserts the page unless the title exists; `Ok(None)` if it does.
    fn create_page(&mut self, page: &NewPage) -> StoreResult<Option<Page>>;
}

pub trait CategoryRepository {
    /// Exact name match ignoring case (see [`fold_key`]).
    fn get_category_by_name(&mut self, name: &str) -> StoreResult<Option<Category>>;
    /// Inserts a stub category with a blank body; `Ok(None)` if the name exists.
    fn create_category(&mut self, name: &str) -> StoreResult<Option<Category>>;
    fn link_page_to_category(
        &mut self,
        page_id: i64,
        category_id: i64,
    ) -> StoreResult<PageCategory>;

    /// Looks the name up, creates it when absent, then reads back the
    /// persisted row. The read-back returns whichever writer won if another
    /// run created the same name in between.
    fn get_or_create_category(&mut self, name: &str) -> StoreResult<Option<Category>> {
        if let Some(category) = self.get_category_by_name(name)? {
            return Ok(Some(category));
        }
        debug!(category = name, "Creating stub category");
        self.create_category(name)?;
        self.get_category_by_name(name)
    }
}

/// Name-keyed lookup tables (project, namespace).
pub trait ReferenceStore {
    fn load_references(&mut self, table: ReferenceTable) -> StoreResult<Vec<(String, i64)>>;
    /// Unconditional insert; returns the new id.
    fn insert_reference(&mut self, table: ReferenceTable, name: &str) -> StoreResult<i64>;
}

/// Everything the row processor needs from storage.
pub trait Repository: PageRepository + CategoryRepository + ReferenceStore {}

impl<T: PageRepository + CategoryRepository + ReferenceStore + ?Sized> Repository for T {}

impl<T: PageRepository + ?Sized> PageRepository for &mut T {
    fn get_page_by_title(&mut self, title: &str) -> StoreResult<Option<Page>> {
        (**self).get_page_by_title(title)
    }

    fn create_page(&mut self, page: &NewPage) -> StoreResult<Option<Page>> {
        (**self).create_page(page)
    }
}

impl<T: CategoryRepository + ?Sized> CategoryRepository for &mut T {
    fn get_category_by_name(&mut self, name: &str) -> StoreResult<Option<Category>> {
        (**self).get_category_by_name(name)
    }

    fn create_category(&mut self, name: &str) -> StoreResult<Option<Category>> {
        (**self).create_category(name)
    }

    fn link_page_to_category(
        &mut self,
        page_id: i64,
        category_id: i64,
    ) -> StoreResult<PageCategory> {
        (**self).link_page_to_category(page_id, category_id)
    }

    fn get_or_create_category(&mut self, name: &str) -> StoreResult<Option<Category>> {
        (**self).get_or_create_category(name)
    }
}

impl<T: ReferenceStore + ?Sized> ReferenceStore for &mut T {
    fn load_references(&mut self, table: ReferenceTable) -> StoreResult<Vec<(String, i64)>> {
        (**self).load_references(table)
    }

    fn insert_reference(&mut self, table: ReferenceTable, name: &str) -> StoreResult<i64> {
        (**self).insert_reference(table, name)
    }
}

fn status_from_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Status> {
    let raw: String = row.get(idx)?;
    Status::parse(&raw).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(idx, "status".to_string(), Type::Text)
    })
}

/// Expects the column order of [`PAGE_COLUMNS`].
pub(crate) fn page_from_row(row: &Row<'_>) -> rusqlite::Result<Page> {
    Ok(Page {
        id: row.get(0)?,
        title: row.get(1)?,
        text: row.get(2)?,
        views: row.get(3)?,
        status: status_from_column(row, 4)?,
        project_id: row.get(5)?,
        namespace_id: row.get(6)?,
    })
}

/// Expects the column order of [`CATEGORY_COLUMNS`].
pub(crate) fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        text_content: row.get(2)?,
        status: status_from_column(row, 3)?,
    })
}

/// Unique key for page titles and category names.
///
/// Full Unicode lowercasing, so `École` and `école` share a key. SQLite's
/// `NOCASE` only folds ASCII.
pub fn fold_key(value: &str) -> String {
    value.to_lowercase()
}

fn select_page_by_title(conn: &Connection, title: &str) -> rusqlite::Result<Option<Page>> {
    conn.query_row(
        &format!("SELECT {PAGE_COLUMNS} FROM page p WHERE p.title_key = ?1"),
        params![fold_key(title)],
        page_from_row,
    )
    .optional()
}

fn select_category_by_name(conn: &Connection, name: &str) -> rusqlite::Result<Option<Category>> {
    conn.query_row(
        &format!("SELECT {CATEGORY_COLUMNS} FROM category c WHERE c.name_key = ?1"),
        params![fold_key(name)],
        category_from_row,
    )
    .optional()
}

impl PageRepository for Store {
    fn get_page_by_title(&mut self, title: &str) -> StoreResult<Option<Page>> {
        self.session(|tx| Ok(select_page_by_title(tx, title)?))
    }

    fn create_page(&mut self, page: &NewPage) -> StoreResult<Option<Page>> {
        let inserted = self.write_session(|tx| {
            if select_page_by_title(tx, &page.title)?.is_some() {
                return Ok(None);
            }
            tx.execute(
                r#"INSERT INTO page (title, title_key, text, views, status, project_id, namespace_id)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
                params![
                    page.title,
                    fold_key(&page.title),
                    page.text,
                    page.views,
                    page.status.as_str(),
                    page.project_id,
                    page.namespace_id,
                ],
            )?;
            Ok(Some(tx.last_insert_rowid()))
        });

        match inserted {
            Ok(Some(id)) => {
                debug!(id, title = %page.title, "Created page");
                Ok(Some(Page {
                    id,
                    title: page.title.clone(),
                    text: page.text.clone(),
                    views: page.views,
                    status: page.status,
                    project_id: page.project_id,
                    namespace_id: page.namespace_id,
                }))
            }
            Ok(None) => {
                warn!(title = %page.title, "Page with this title already exists");
                Ok(None)
            }
            Err(e) if e.is_unique_violation() => {
                warn!(title = %page.title, "Page insert rejected by unique constraint");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

impl CategoryRepository for Store {
    fn get_category_by_name(&mut self, name: &str) -> StoreResult<Option<Category>> {
        self.session(|tx| Ok(select_category_by_name(tx, name)?))
    }

    fn create_category(&mut self, name: &str) -> StoreResult<Option<Category>> {
        let inserted = self.write_session(|tx| {
            if select_category_by_name(tx, name)?.is_some() {
                return Ok(None);
            }
            tx.execute(
                "INSERT INTO category (name, name_key, text_content, status) VALUES (?1, ?2, '', ?3)",
                params![name, fold_key(name), Status::Stub.as_str()],
            )?;
            Ok(Some(tx.last_insert_rowid()))
        });

        match inserted {
            Ok(Some(id)) => {
                debug!(id, category = name, "Created category");
                Ok(Some(Category {
                    id,
                    name: name.to_string(),
                    text_content: String::new(),
                    status: Status::Stub,
                }))
            }
            Ok(None) => {
                debug!(category = name, "Category already exists");
                Ok(None)
            }
            Err(e) if e.is_unique_violation() => {
                debug!(category = name, "Category insert rejected by unique constraint");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn link_page_to_category(
        &mut self,
        page_id: i64,
        category_id: i64,
    ) -> StoreResult<PageCategory> {
        self.session(|tx| {
            tx.execute(
                "INSERT INTO page_category (page_id, category_id) VALUES (?1, ?2)",
                params![page_id, category_id],
            )?;
            Ok(PageCategory {
                page_id,
                category_id,
            })
        })
    }
}

impl ReferenceStore for Store {
    fn load_references(&mut self, table: ReferenceTable) -> StoreResult<Vec<(String, i64)>> {
        self.session(|tx| {
            let mut stmt = tx.prepare(&format!("SELECT name, id FROM {}", table.table_name()))?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn insert_reference(&mut self, table: ReferenceTable, name: &str) -> StoreResult<i64> {
        self.session(|tx| {
            tx.execute(
                &format!("INSERT INTO {} (name) VALUES (?1)", table.table_name()),
                params![name],
            )?;
            Ok(tx.last_insert_rowid())
        })
    }
}
