//! Set of article links already present in the dataset.
//!
//! The dataset file is the only source of truth: the store is rebuilt by a
//! full scan at the start of every fetch cycle and only grows in memory
//! afterwards. The handle is cheap to clone; every clone shares one set, so
//! the adapters (through the session) and the writer see each other's
//! additions within a cycle.
//!
//! Loading also repairs a crash-damaged tail. It runs before the first
//! append of every cycle.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, instrument, warn};

use crate::errors::StoreError;
use crate::models::{DATASET_COLUMNS, DEDUP_COLUMN};

#[derive(Debug, Clone, Default)]
pub struct DedupStore {
    links: Arc<RwLock<HashSet<String>>>,
}

impl DedupStore {
    /// Scan the dataset at `path` and collect its `article_link` column.
    ///
    /// A missing file yields an empty store. A crash can leave the last row
    /// half-written; such a tail is cut off so later appends start on a
    /// record boundary, and its link is not registered. Other rows that
    /// fail to parse are logged and skipped.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No dataset yet; starting with an empty store");
                return Ok(Self::default());
            }
            Err(source) => return Err(io_err(path, source)),
        };

        let csv_err = |source| StoreError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let column = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .position(|h| h == DEDUP_COLUMN);
        let Some(column) = column else {
            warn!("Dataset has no {DEDUP_COLUMN} column; treating it as empty");
            return Ok(Self::default());
        };

        let mut links = HashSet::new();
        let mut skipped = 0usize;
        let mut last: Option<LastRecord> = None;
        let mut record = csv::ByteRecord::new();
        loop {
            let start = reader.position().byte();
            match reader.read_byte_record(&mut record) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => return Err(csv_err(e)),
                Err(e) => {
                    skipped += 1;
                    debug!(start, error = %e, "Skipping unreadable dataset row");
                    continue;
                }
            }
            let link = record
                .get(column)
                .and_then(|l| std::str::from_utf8(l).ok())
                .filter(|l| !l.is_empty());
            let newly_added = match link {
                Some(link) => links.insert(link.to_string()),
                None => false,
            };
            last = Some(LastRecord {
                start,
                fields: record.len(),
                link: newly_added.then(|| link.map(str::to_string)).flatten(),
            });
        }
        if skipped > 0 {
            warn!(skipped, "Some dataset rows could not be read");
        }

        let end = reader.position().byte();
        if let Some(last) = last {
            let mut file = reader.into_inner();
            if !record_is_complete(&mut file, last.start, last.fields)
                .map_err(|source| io_err(path, source))?
            {
                warn!(
                    offset = last.start,
                    dropped_bytes = end - last.start,
                    "Dataset ends in a half-written row; truncating it"
                );
                OpenOptions::new()
                    .write(true)
                    .open(path)
                    .and_then(|f| f.set_len(last.start))
                    .map_err(|source| io_err(path, source))?;
                if let Some(link) = last.link {
                    links.remove(&link);
                }
            }
        }

        Ok(Self {
            links: Arc::new(RwLock::new(links)),
        })
    }

    pub fn contains(&self, link: &str) -> bool {
        self.links
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(link)
    }

    /// Register a link. Returns `false` if it was already known.
    pub fn add(&self, link: impl Into<String>) -> bool {
        self.links
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(link.into())
    }

    pub fn len(&self) -> usize {
        self.links.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where the last data row of the dataset starts, and what it registered.
struct LastRecord {
    start: u64,
    fields: usize,
    link: Option<String>,
}

/// A row written in full has every column, ends in a newline and closes
/// every quote it opens.
fn record_is_complete(file: &mut File, start: u64, fields: usize) -> io::Result<bool> {
    if fields != DATASET_COLUMNS.len() {
        return Ok(false);
    }
    let mut raw = Vec::new();
    file.seek(SeekFrom::Start(start))?;
    file.read_to_end(&mut raw)?;
    let quotes = raw.iter().filter(|&&b| b == b'"').count();
    Ok(raw.ends_with(b"\n") && quotes % 2 == 0)
}

fn io_err(path: &Path, source: io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_missing_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DedupStore::load(&tmp.path().join("dataset.csv")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_reads_link_column() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("dataset.csv");
        fs::write(
            &path,
            "source_name,source_link,category_name,category_link,published_at,article_link,title,body_text\n\
             lenta,https://lenta.ru/,Мир,https://lenta.ru/rubrics/world/,,https://lenta.ru/a/,A,\"multi\nline\"\n\
             rbk,https://www.rbc.ru/,Экономика,https://www.rbc.ru/economics/,,https://www.rbc.ru/b,B,text\n",
        )
        .unwrap();

        let before = fs::read(&path).unwrap();
        let store = DedupStore::load(&path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), before);
        assert_eq!(store.len(), 2);
        assert!(store.contains("https://lenta.ru/a/"));
        assert!(store.contains("https://www.rbc.ru/b"));
        assert!(!store.contains("https://lenta.ru/c/"));
    }

    fn dataset_with_tail(dir: &Path, tail: &str) -> (std::path::PathBuf, String) {
        let path = dir.join("dataset.csv");
        let complete = format!(
            "{}\nlenta,https://lenta.ru/,Мир,https://lenta.ru/rubrics/world/,,https://lenta.ru/a/,A,text\n",
            DATASET_COLUMNS.join(",")
        );
        fs::write(&path, format!("{complete}{tail}")).unwrap();
        (path, complete)
    }

    #[test]
    fn test_half_written_tail_is_cut_off() {
        let tmp = tempfile::tempdir().unwrap();
        let (path, complete) = dataset_with_tail(
            tmp.path(),
            "rbk,https://www.rbc.ru/,Экономика,https://www.rbc.ru/economics/,,https://www.rbc.ru/c,C,\"partial bo",
        );

        let store = DedupStore::load(&path).unwrap();
        assert_eq!(store.len(), 1);
        assert!(!store.contains("https://www.rbc.ru/c"));
        assert_eq!(fs::read_to_string(&path).unwrap(), complete);
    }

    #[test]
    fn test_open_quote_ending_in_newline_is_cut_off() {
        let tmp = tempfile::tempdir().unwrap();
        let (path, complete) = dataset_with_tail(
            tmp.path(),
            "rbk,https://www.rbc.ru/,Экономика,https://www.rbc.ru/economics/,,https://www.rbc.ru/c,C,\"first line\n",
        );

        let store = DedupStore::load(&path).unwrap();
        assert!(!store.contains("https://www.rbc.ru/c"));
        assert!(store.contains("https://lenta.ru/a/"));
        assert_eq!(fs::read_to_string(&path).unwrap(), complete);
    }

    #[test]
    fn test_row_missing_its_newline_is_cut_off() {
        let tmp = tempfile::tempdir().unwrap();
        let (path, complete) = dataset_with_tail(
            tmp.path(),
            "rbk,https://www.rbc.ru/,Экономика,https://www.rbc.ru/economics/,,https://www.rbc.ru/c,C,done",
        );
        DedupStore::load(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), complete);
    }

    #[test]
    fn test_load_without_link_column() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("dataset.csv");
        fs::write(&path, "a,b\n1,2\n").unwrap();
        assert!(DedupStore::load(&path).unwrap().is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let store = DedupStore::default();
        let other = store.clone();
        assert!(store.add("https://example.com/1"));
        assert!(other.contains("https://example.com/1"));
        assert!(!other.add("https://example.com/1"));
        assert_eq!(store.len(), 1);
    }
}
