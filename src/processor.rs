//! Turns one denormalized [`SourceRecord`] into normalized rows.
//!
//! A record creates at most one page. Project and namespace references are
//! resolved through the run's [`ReferenceCache`] before the page insert, and
//! categories are resolved and linked after it, each one independently.
//! Every storage call commits on its own, so a record can leave a page behind
//! even when some of its category links fail.

use crate::cache::ReferenceCache;
use crate::config::CATEGORY_DELIMITER;
use crate::models::{NewPage, PageCategory, ReferenceTable, SourceRecord, Status};
use crate::repository::Repository;
use crate::store::{StoreError, StoreResult};
use rustc_hash::FxHashSet;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessOptions {
    /// Link each distinct category once per record instead of once per token.
    pub dedup_categories: bool,
}

#[derive(Debug)]
pub enum RowOutcome {
    Created { page_id: i64, links: LinkReport },
    Skipped(SkipReason),
}

impl RowOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, RowOutcome::Created { .. })
    }
}

#[derive(Debug)]
pub enum SkipReason {
    /// Title missing or whitespace only
    BlankTitle,
    /// A page with this title (ignoring case) already exists
    DuplicateTitle,
    /// The insert lost to a page created after the existence check
    CreateRejected,
    StorageFailure(StoreError),
}

/// Per-record result of category linking.
#[derive(Debug, Default)]
pub struct LinkReport {
    pub linked: Vec<PageCategory>,
    /// Category names that could not be resolved or linked
    pub failed: Vec<String>,
    /// Tokens dropped because they resolved to an already linked category
    pub deduplicated: usize,
}

/// Splits a `categories` cell into trimmed, non-empty names.
pub fn split_categories(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(CATEGORY_DELIMITER)
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

/// Missing or non-numeric counts become 0; fractions truncate; negatives clamp to 0.
pub fn normalize_view_count(raw: Option<&str>) -> i64 {
    let raw = match raw.map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => return 0,
    };
    if let Ok(n) = raw.parse::<i64>() {
        return n.max(0);
    }
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() => (f.trunc() as i64).max(0),
        _ => {
            debug!(value = raw, "Non-numeric view count, using 0");
            0
        }
    }
}

pub struct RowProcessor<R> {
    repo: R,
    cache: ReferenceCache,
    options: ProcessOptions,
}

impl<R: Repository> RowProcessor<R> {
    /// Warms the reference cache from `repo` before the first record.
    pub fn new(mut repo: R, options: ProcessOptions) -> StoreResult<Self> {
        let cache = ReferenceCache::warm(&mut repo)?;
        Ok(Self::with_cache(repo, cache, options))
    }

    pub fn with_cache(repo: R, cache: ReferenceCache, options: ProcessOptions) -> Self {
        Self {
            repo,
            cache,
            options,
        }
    }

    pub fn cache(&self) -> &ReferenceCache {
        &self.cache
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn into_repository(self) -> R {
        self.repo
    }

    /// Processes one record. Storage errors are logged and reported as
    /// [`SkipReason::StorageFailure`]; they never propagate.
    pub fn process(&mut self, record: &SourceRecord) -> RowOutcome {
        match self.try_process(record) {
            Ok(outcome) => outcome,
            Err(e) => {
                let title = record.title.as_deref().unwrap_or("").trim();
                error!(title, error = %e, "Failed to process row");
                RowOutcome::Skipped(SkipReason::StorageFailure(e))
            }
        }
    }

    fn try_process(&mut self, record: &SourceRecord) -> StoreResult<RowOutcome> {
        let title = record.title.as_deref().unwrap_or("").trim();
        if title.is_empty() {
            return Ok(RowOutcome::Skipped(SkipReason::BlankTitle));
        }

        if self.repo.get_page_by_title(title)?.is_some() {
            warn!(title, "Page already exists, skipping");
            return Ok(RowOutcome::Skipped(SkipReason::DuplicateTitle));
        }

        let project_id = self.cache.resolve_or_create(
            &mut self.repo,
            ReferenceTable::Project,
            record.project_name.as_deref(),
        )?;
        let namespace_id = self.cache.resolve_or_create(
            &mut self.repo,
            ReferenceTable::Namespace,
            record.namespace_name.as_deref(),
        )?;

        let page = NewPage {
            title: title.to_string(),
            text: record.text.as_deref().unwrap_or("").trim().to_string(),
            views: normalize_view_count(record.view_count.as_deref()),
            status: Status::Stub,
            project_id,
            namespace_id,
        };

        let created = match self.repo.create_page(&page)? {
            Some(created) => created,
            None => return Ok(RowOutcome::Skipped(SkipReason::CreateRejected)),
        };

        let links = match record.categories.as_deref() {
            Some(raw) => self.link_categories(created.id, raw),
            None => LinkReport::default(),
        };

        debug!(
            id = created.id,
            title,
            linked = links.linked.len(),
            failed = links.failed.len(),
            "Imported page"
        );

        Ok(RowOutcome::Created {
            page_id: created.id,
            links,
        })
    }

    /// Best effort: a failing category is logged and recorded, then the
    /// next one is attempted.
    fn link_categories(&mut self, page_id: i64, raw: &str) -> LinkReport {
        let mut report = LinkReport::default();
        let mut seen = FxHashSet::default();

        for name in split_categories(raw) {
            let category = match self.repo.get_or_create_category(name) {
                Ok(Some(category)) => category,
                Ok(None) => {
                    error!(page_id, category = name, "Category could not be resolved");
                    report.failed.push(name.to_string());
                    continue;
                }
                Err(e) => {
                    error!(page_id, category = name, error = %e, "Failed to resolve category");
                    report.failed.push(name.to_string());
                    continue;
                }
            };

            if self.options.dedup_categories && !seen.insert(category.id) {
                report.deduplicated += 1;
                continue;
            }

            match self.repo.link_page_to_category(page_id, category.id) {
                Ok(link) => report.linked.push(link),
                Err(e) => {
                    error!(page_id, category = name, error = %e, "Failed to link page to category");
                    report.failed.push(name.to_string());
                }
            }
        }

        report
    }
}
