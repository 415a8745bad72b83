use crate::processor::{RowOutcome, SkipReason};
use serde::Serialize;

/// Counters accumulated over one import run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub total_rows: u64,
    pub pages_created: u64,
    pub blank_titles: u64,
    pub duplicate_titles: u64,
    pub rejected_creates: u64,
    pub storage_failures: u64,
    pub categories_linked: u64,
    pub category_failures: u64,
    pub categories_deduplicated: u64,
    pub references_created: u64,
}

/// The three headline numbers reported at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total_rows: u64,
    pub pages_created: u64,
    pub pages_skipped: u64,
}

impl RunStats {
    pub fn new(total_rows: u64) -> Self {
        Self {
            total_rows,
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: &RowOutcome) {
        match outcome {
            RowOutcome::Created { links, .. } => {
                self.pages_created += 1;
                self.categories_linked += links.linked.len() as u64;
                self.category_failures += links.failed.len() as u64;
                self.categories_deduplicated += links.deduplicated as u64;
            }
            RowOutcome::Skipped(reason) => match reason {
                SkipReason::BlankTitle => self.blank_titles += 1,
                SkipReason::DuplicateTitle => self.duplicate_titles += 1,
                SkipReason::CreateRejected => self.rejected_creates += 1,
                SkipReason::StorageFailure(_) => self.storage_failures += 1,
            },
        }
    }

    pub fn pages_skipped(&self) -> u64 {
        self.blank_titles + self.duplicate_titles + self.rejected_creates + self.storage_failures
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            total_rows: self.total_rows,
            pages_created: self.pages_created,
            pages_skipped: self.pages_skipped(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PageCategory;
    use crate::processor::LinkReport;
    use crate::store::StoreError;

    fn created(linked: usize, failed: usize) -> RowOutcome {
        RowOutcome::Created {
            page_id: 1,
            links: LinkReport {
                linked: (0..linked as i64)
                    .map(|id| PageCategory {
                        page_id: 1,
                        category_id: id,
                    })
                    .collect(),
                failed: (0..failed).map(|i| format!("cat{i}")).collect(),
                deduplicated: 0,
            },
        }
    }

    #[test]
    fn default_values_are_zero() {
        let stats = RunStats::new(0);
        assert_eq!(stats.summary(), RunSummary {
            total_rows: 0,
            pages_created: 0,
            pages_skipped: 0,
        });
        assert_eq!(stats.categories_linked, 0);
    }

    #[test]
    fn created_rows_count_links() {
        let mut stats = RunStats::new(2);
        stats.record(&created(3, 0));
        stats.record(&created(2, 1));
        assert_eq!(stats.pages_created, 2);
        assert_eq!(stats.categories_linked, 5);
        assert_eq!(stats.category_failures, 1);
        assert_eq!(stats.pages_skipped(), 0);
    }

    #[test]
    fn every_skip_reason_counts_as_skipped() {
        let mut stats = RunStats::new(4);
        stats.record(&RowOutcome::Skipped(SkipReason::BlankTitle));
        stats.record(&RowOutcome::Skipped(SkipReason::DuplicateTitle));
        stats.record(&RowOutcome::Skipped(SkipReason::CreateRejected));
        stats.record(&RowOutcome::Skipped(SkipReason::StorageFailure(
            StoreError::InvalidData("boom".to_string()),
        )));

        assert_eq!(stats.blank_titles, 1);
        assert_eq!(stats.duplicate_titles, 1);
        assert_eq!(stats.rejected_creates, 1);
        assert_eq!(stats.storage_failures, 1);
        assert_eq!(stats.summary().pages_skipped, 4);
        assert_eq!(stats.summary().pages_created, 0);
    }

    #[test]
    fn summary_serializes_with_expected_keys() {
        let mut stats = RunStats::new(1);
        stats.record(&created(0, 0));
        let json = serde_json::to_value(stats.summary()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"total_rows": 1, "pages_created": 1, "pages_skipped": 0})
        );
    }
}
