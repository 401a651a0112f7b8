use std::fs;
use std::path::{Path, PathBuf};

use csv::Writer;
use tracing::debug;

use crate::rank::{RankedRow, top_prefix};

/// Column headers of the published datasets, in fixed order. The
/// presentation layer depends on this contract, including the historical
/// "Size (KB)" label: the column carries the humanized size ("2.00 MB")
/// derived from the API's kilobyte count, not the raw number.
pub const HEADER: [&str; 11] = [
    "Ranking",
    "Project Name",
    "Repo URL",
    "Description",
    "Stars",
    "Forks",
    "Watchers",
    "Open Issues",
    "Size (KB)",
    "Created At",
    "Last Commit",
];

/// A failed output write fails the language: a dataset without its file is
/// useless to the presentation layer.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("output I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Output file locations are a pure function of the language slug, so the
/// presentation layer can construct them from the language identifier alone.
pub fn full_path(dir: &Path, slug: &str) -> PathBuf {
    dir.join(format!("{slug}.csv"))
}

pub fn top_path(dir: &Path, slug: &str) -> PathBuf {
    dir.join(format!("top10_{slug}.csv"))
}

/// Writes both per-language dataset files: the full ranked sequence and its
/// top-10 prefix. An empty dataset produces header-only files.
pub fn write_language(dir: &Path, slug: &str, rows: &[RankedRow]) -> Result<(), OutputError> {
    fs::create_dir_all(dir)?;
    write_csv(&full_path(dir, slug), rows)?;
    write_csv(&top_path(dir, slug), top_prefix(rows))?;
    debug!(slug, rows = rows.len(), "wrote dataset files");
    Ok(())
}

fn write_csv(path: &Path, rows: &[RankedRow]) -> Result<(), OutputError> {
    let mut wtr = Writer::from_path(path)?;
    wtr.write_record(HEADER)?;
    for row in rows {
        wtr.write_record([
            row.rank.to_string(),
            row.full_name.clone(),
            row.html_url.clone(),
            row.description.clone(),
            row.stars.to_string(),
            row.forks.to_string(),
            row.watchers.to_string(),
            row.open_issues.to_string(),
            row.size.clone(),
            row.created_at.clone(),
            row.pushed_at.clone(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::sample_item;
    use crate::rank::rank;

    fn rows(n: u64) -> Vec<RankedRow> {
        let records: Vec<_> = (0..n)
            .map(|i| serde_json::from_value(sample_item(&format!("o/r{i}"), 100 - i)).unwrap())
            .collect();
        rank(&records)
    }

    #[test]
    fn writes_full_and_top10_files() {
        let dir = tempfile::tempdir().unwrap();
        write_language(dir.path(), "rust", &rows(15)).unwrap();

        let full = fs::read_to_string(full_path(dir.path(), "rust")).unwrap();
        let top = fs::read_to_string(top_path(dir.path(), "rust")).unwrap();

        assert_eq!(full.lines().count(), 16);
        assert_eq!(top.lines().count(), 11);
        // The top-10 file is a byte prefix of the full file.
        assert!(full.starts_with(&top));
    }

    #[test]
    fn header_matches_output_contract() {
        let dir = tempfile::tempdir().unwrap();
        write_language(dir.path(), "go", &rows(1)).unwrap();

        let content = fs::read_to_string(full_path(dir.path(), "go")).unwrap();
        assert_eq!(
            content.lines().next().unwrap(),
            "Ranking,Project Name,Repo URL,Description,Stars,Forks,Watchers,Open Issues,\
             Size (KB),Created At,Last Commit"
        );
        assert!(content.contains("1,o/r0,https://github.com/o/r0"));
    }

    #[test]
    fn empty_dataset_writes_header_only_files() {
        let dir = tempfile::tempdir().unwrap();
        write_language(dir.path(), "dm", &[]).unwrap();

        for path in [full_path(dir.path(), "dm"), top_path(dir.path(), "dm")] {
            let content = fs::read_to_string(path).unwrap();
            assert_eq!(content.lines().count(), 1);
            assert!(content.starts_with("Ranking,"));
        }
    }

    #[test]
    fn fewer_than_ten_rows_duplicates_full_into_top() {
        let dir = tempfile::tempdir().unwrap();
        write_language(dir.path(), "tex", &rows(3)).unwrap();

        let full = fs::read_to_string(full_path(dir.path(), "tex")).unwrap();
        let top = fs::read_to_string(top_path(dir.path(), "tex")).unwrap();
        assert_eq!(full, top);
    }
}
