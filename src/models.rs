use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state shared by pages and categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Created by the loader, awaiting curation
    #[default]
    Stub,
    Active,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Stub => "stub",
            Status::Active => "active",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "stub" => Some(Status::Stub),
            "active" => Some(Status::Active),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Auxiliary lookup tables referenced by foreign key from `page`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceTable {
    Project,
    Namespace,
}

impl ReferenceTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            ReferenceTable::Project => "project",
            ReferenceTable::Namespace => "namespace",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub id: i64,
    pub title: String,
    pub text: String,
    pub views: i64,
    pub status: Status,
    pub project_id: Option<i64>,
    pub namespace_id: Option<i64>,
}

/// A page that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPage {
    pub title: String,
    pub text: String,
    pub views: i64,
    pub status: Status,
    pub project_id: Option<i64>,
    pub namespace_id: Option<i64>,
}

/// Page joined with the names of its project and namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageDetail {
    #[serde(flatten)]
    pub page: Page,
    pub project_name: Option<String>,
    pub namespace_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub text_content: String,
    pub status: Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageCategory {
    pub page_id: i64,
    pub category_id: i64,
}

/// Aggregate view counts over the page table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageStatistics {
    pub total_pages: i64,
    pub total_views: i64,
    pub avg_views: f64,
    pub max_views: i64,
    pub min_views: i64,
    pub projects_count: i64,
    pub namespaces_count: i64,
}

/// One denormalized source row, keyed by normalized header names.
///
/// Every column is optional: unknown columns are ignored and missing ones
/// deserialize to `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SourceRecord {
    pub title: Option<String>,
    pub text: Option<String>,
    pub view_count: Option<String>,
    pub project_name: Option<String>,
    pub namespace_name: Option<String>,
    pub categories: Option<String>,
}
