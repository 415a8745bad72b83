use crate::models::SourceRecord;
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord};
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{info, warn};

/// Trims, lowercases and replaces spaces with underscores, so
/// `" Project Name"` matches the `project_name` column.
pub fn normalize_header(header: &str) -> String {
    header
        .trim_start_matches('\u{feff}')
        .trim()
        .to_lowercase()
        .replace(' ', "_")
}

/// Reads every record of a CSV file into memory.
pub fn read_records(path: &Path) -> Result<Vec<SourceRecord>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open source file: {}", path.display()))?;
    let records = read_records_from(BufReader::with_capacity(128 * 1024, file))
        .with_context(|| format!("Failed to read source file: {}", path.display()))?;
    info!(rows = records.len(), path = %path.display(), "Source loaded");
    Ok(records)
}

/// When two headers normalize to the same name the last column wins; earlier
/// ones are renamed so deserialization ignores them.
fn dedup_headers(mut names: Vec<String>) -> StringRecord {
    let mut last_index: FxHashMap<String, usize> = FxHashMap::default();
    for (idx, name) in names.iter().enumerate() {
        last_index.insert(name.clone(), idx);
    }
    for (idx, name) in names.iter_mut().enumerate() {
        if last_index.get(name.as_str()).is_some_and(|&last| last != idx) {
            warn!(column = idx + 1, header = %name, "Duplicate header, keeping the last column");
            *name = format!("__shadowed_{idx}");
        }
    }
    names.into_iter().collect()
}

/// Header names are normalized before the first row is deserialized.
/// Unknown columns are ignored and short rows leave trailing columns absent.
pub fn read_records_from<R: Read>(input: R) -> Result<Vec<SourceRecord>> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(input);

    let headers = dedup_headers(
        reader
            .headers()
            .context("Failed to read CSV header")?
            .iter()
            .map(normalize_header)
            .collect(),
    );
    reader.set_headers(headers);

    reader
        .deserialize::<SourceRecord>()
        .enumerate()
        .map(|(idx, row)| row.with_context(|| format!("Malformed CSV record {}", idx + 1)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn normalize_header_cases() {
        assert_eq!(normalize_header("Title"), "title");
        assert_eq!(normalize_header("  View Count "), "view_count");
        assert_eq!(normalize_header("Project Name"), "project_name");
        assert_eq!(normalize_header("\u{feff}title"), "title");
        assert_eq!(normalize_header("namespace_name"), "namespace_name");
    }

    #[test]
    fn reads_records_with_messy_headers() {
        let csv = "Title, Text ,View Count,Project Name,Namespace Name,Categories\n\
                   Go,lang,5,Eng,Main,Languages;Programming\n";
        let records = read_records_from(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.title.as_deref(), Some("Go"));
        assert_eq!(r.text.as_deref(), Some("lang"));
        assert_eq!(r.view_count.as_deref(), Some("5"));
        assert_eq!(r.project_name.as_deref(), Some("Eng"));
        assert_eq!(r.namespace_name.as_deref(), Some("Main"));
        assert_eq!(r.categories.as_deref(), Some("Languages;Programming"));
    }

    #[test]
    fn colliding_headers_keep_last_column() {
        let csv = "Title,title ,text\nOld,New,lang\n";
        let records = read_records_from(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title.as_deref(), Some("New"));
        assert_eq!(records[0].text.as_deref(), Some("lang"));
    }

    #[test]
    fn dedup_headers_renames_only_earlier_duplicates() {
        let names = vec!["title".to_string(), "text".to_string(), "title".to_string()];
        let headers = dedup_headers(names);
        assert_eq!(headers.get(0), Some("__shadowed_0"));
        assert_eq!(headers.get(1), Some("text"));
        assert_eq!(headers.get(2), Some("title"));
    }

    #[test]
    fn missing_and_unknown_columns() {
        let csv = "title,extra\nRust,ignored\n";
        let records = read_records_from(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title.as_deref(), Some("Rust"));
        assert_eq!(records[0].categories, None);
        assert_eq!(records[0].view_count, None);
    }

    #[test]
    fn empty_cells_are_absent() {
        let csv = "title,project_name,categories\nRust,,\n";
        let records = read_records_from(csv.as_bytes()).unwrap();
        assert_eq!(records[0].project_name, None);
        assert_eq!(records[0].categories, None);
    }

    #[test]
    fn short_rows_are_tolerated() {
        let csv = "title,text,categories\nRust\nGo,lang\n";
        let records = read_records_from(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text, None);
        assert_eq!(records[1].text.as_deref(), Some("lang"));
        assert_eq!(records[1].categories, None);
    }

    #[test]
    fn quoted_fields_keep_delimiters() {
        let csv = "title,text\n\"Hello, World\",\"line one\nline two\"\n";
        let records = read_records_from(csv.as_bytes()).unwrap();
        assert_eq!(records[0].title.as_deref(), Some("Hello, World"));
        assert_eq!(records[0].text.as_deref(), Some("line one\nline two"));
    }

    #[test]
    fn empty_input_has_no_records() {
        let records = read_records_from("".as_bytes()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn read_records_from_file() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(tmp, "title").unwrap();
        writeln!(tmp, "A").unwrap();
        writeln!(tmp, "B").unwrap();
        tmp.flush().unwrap();

        let records = read_records(tmp.path()).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(read_records(Path::new("/nonexistent/pages.csv")).is_err());
    }
}
