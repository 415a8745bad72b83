//! Wikietl: denormalized page CSV to normalized SQLite tables
//!
//! Each source row describes one Wikipedia page together with its project,
//! namespace and a `;`-separated list of categories. The loader spreads that
//! row over five tables (`page`, `project`, `namespace`, `category` and the
//! `page_category` link table) and can be re-run over the same file without
//! creating duplicate pages.
//!
//! # Pipeline
//!
//! 1. **Read** -- The whole CSV is loaded into memory and its header names are
//!    normalized (`"View Count"` becomes `view_count`)
//! 2. **Warm** -- Existing project and namespace names are bulk-loaded into a
//!    run-scoped cache
//! 3. **Process** -- Rows are handled strictly in file order: skip blank or
//!    already-imported titles, resolve references, create the page, then
//!    resolve and link its categories one by one
//! 4. **Report** -- Per-row outcomes roll up into [`stats::RunStats`] and a
//!    [`stats::RunSummary`]
//!
//! # Consistency model
//!
//! - Every storage call is its own transaction; there is no per-row
//!   transaction, so a page survives even if some of its category links fail
//! - Page titles and category names are unique ignoring case (full Unicode
//!   lowercasing into a `*_key` column), enforced by the schema as well as by
//!   the lookups
//! - Project and namespace names are matched exactly, case included
//! - Rows never abort the run: failures become [`processor::SkipReason`] values
//!
//! # Key Modules
//!
//! - [`import`] -- Batch driver and [`import::ImportConfig`]
//! - [`processor`] -- Per-row resolution and linking
//! - [`cache`] -- Project/namespace reference cache
//! - [`repository`] -- Repository traits and their SQLite implementation
//! - [`store`] -- Connection handle, schema and transactional sessions
//! - [`source`] -- CSV reading and header normalization
//! - [`models`] -- Entities and the source record
//! - [`stats`] -- Run counters and summary
//! - [`config`] -- Constants
//!
//! # Example Usage
//!
//! ```bash
//! # Import a file, creating the database if needed
//! wikietl -v import -i denormalized_pages.csv --db pages.db
//!
//! # Same file again: nothing new is created
//! wikietl import -i denormalized_pages.csv --db pages.db --json
//!
//! # Page statistics and the most viewed pages
//! wikietl stats --db pages.db --top 5
//! ```

pub mod cache;
pub mod config;
pub mod import;
pub mod models;
pub mod processor;
pub mod repository;
pub mod source;
pub mod stats;
pub mod store;
