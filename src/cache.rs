use crate::models::ReferenceTable;
use crate::repository::ReferenceStore;
use crate::store::StoreResult;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

/// Name → id maps for the project and namespace tables.
///
/// Keys are matched exactly, case included, unlike page titles and category
/// names which storage compares case-insensitively. The cache lives for one
/// run and is never invalidated; it assumes nothing else deletes or renames
/// reference rows while the run is in progress.
#[derive(Debug, Default)]
pub struct ReferenceCache {
    projects: FxHashMap<String, i64>,
    namespaces: FxHashMap<String, i64>,
    created: u64,
}

impl ReferenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-loads every existing project and namespace name.
    pub fn warm<S: ReferenceStore + ?Sized>(store: &mut S) -> StoreResult<Self> {
        let mut cache = Self::new();
        for table in [ReferenceTable::Project, ReferenceTable::Namespace] {
            let rows = store.load_references(table)?;
            cache.map_mut(table).extend(rows);
        }
        info!(
            projects = cache.projects.len(),
            namespaces = cache.namespaces.len(),
            "Reference cache warmed"
        );
        Ok(cache)
    }

    /// Returns the id for `name`, inserting a new row on a cache miss.
    ///
    /// Absent or blank names resolve to `None` without touching storage.
    pub fn resolve_or_create<S: ReferenceStore + ?Sized>(
        &mut self,
        store: &mut S,
        table: ReferenceTable,
        name: Option<&str>,
    ) -> StoreResult<Option<i64>> {
        let name = match name.map(str::trim) {
            Some(n) if !n.is_empty() => n,
            _ => return Ok(None),
        };

        if let Some(id) = self.get(table, name) {
            return Ok(Some(id));
        }

        let id = store.insert_reference(table, name)?;
        debug!(table = table.table_name(), reference = name, id, "Created reference");
        self.map_mut(table).insert(name.to_string(), id);
        self.created += 1;
        Ok(Some(id))
    }

    pub fn get(&self, table: ReferenceTable, name: &str) -> Option<i64> {
        self.map(table).get(name).copied()
    }

    pub fn len(&self, table: ReferenceTable) -> usize {
        self.map(table).len()
    }

    /// Rows inserted through this cache since it was built.
    pub fn created(&self) -> u64 {
        self.created
    }

    fn map(&self, table: ReferenceTable) -> &FxHashMap<String, i64> {
        match table {
            ReferenceTable::Project => &self.projects,
            ReferenceTable::Namespace => &self.namespaces,
        }
    }

    fn map_mut(&mut self, table: ReferenceTable) -> &mut FxHashMap<String, i64> {
        match table {
            ReferenceTable::Project => &mut self.projects,
            ReferenceTable::Namespace => &mut self.namespaces,
        }
    }
}
