//! Data models shared by the ingestion pipeline and the retrain trigger.
//!
//! - [`RawArticle`]: one scraped article, also the row shape of the dataset file
//! - [`DatasetMetadata`]: the small keyed document describing the dataset

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::errors::MetadataError;
use crate::utils::{TIMESTAMP_FORMAT, parse_size_mb};

/// Header row of the dataset file, in column order.
pub const DATASET_COLUMNS: [&str; 8] = [
    "source_name",
    "source_link",
    "category_name",
    "category_link",
    "published_at",
    "article_link",
    "title",
    "body_text",
];

/// Name of the column that uniquely identifies an article.
pub const DEDUP_COLUMN: &str = "article_link";

/// An article as produced by a source adapter.
///
/// Once accepted by the writer the same fields become one dataset row, so the
/// field order here must match [`DATASET_COLUMNS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawArticle {
    /// Short source name, e.g. `lenta`.
    pub source_name: String,
    /// Home page of the source.
    pub source_link: String,
    /// Category (rubric) the article was listed under.
    pub category_name: String,
    pub category_link: String,
    /// Publication time, normalized to `YYYY-MM-DD HH:MM:SS` when possible.
    pub published_at: String,
    /// Canonical article URL. This is the dedup key.
    pub article_link: String,
    pub title: String,
    pub body_text: String,
}

/// Persisted description of the dataset file.
///
/// Both fields are kept as the strings written to disk; the typed views are
/// parsed on demand so a malformed value surfaces as a [`MetadataError`] at the
/// point of use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    /// Human-readable size, e.g. `"12.34 МБ"`. Empty until the first write.
    #[serde(default)]
    pub dataset_size: String,
    /// Local time of the last accepted write. Empty until the first write.
    #[serde(default)]
    pub dataset_last_update: String,
}

impl DatasetMetadata {
    /// Dataset size in megabytes. An empty size counts as zero.
    pub fn size_mb(&self) -> Result<f64, MetadataError> {
        if self.dataset_size.trim().is_empty() {
            return Ok(0.0);
        }
        parse_size_mb(&self.dataset_size)
            .ok_or_else(|| MetadataError::MalformedSize(self.dataset_size.clone()))
    }

    /// Time of the last accepted write, or `None` if nothing was written yet.
    pub fn last_update(&self) -> Result<Option<NaiveDateTime>, MetadataError> {
        let raw = self.dataset_last_update.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
            .map(Some)
            .map_err(|_| MetadataError::MalformedTimestamp(self.dataset_last_update.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn article() -> RawArticle {
        RawArticle {
            source_name: "lenta".to_string(),
            source_link: "https://lenta.ru/".to_string(),
            category_name: "Наука".to_string(),
            category_link: "https://lenta.ru/rubrics/science/".to_string(),
            published_at: "2026-10-16 14:32:00".to_string(),
            article_link: "https://lenta.ru/news/2026/10/16/sample/".to_string(),
            title: "Зонд, \"новый\"".to_string(),
            body_text: "Первая строка\nвторая строка".to_string(),
        }
    }

    #[test]
    fn test_raw_article_serializes_in_column_order() {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(true)
            .from_writer(Vec::new());
        writer.serialize(article()).unwrap();
        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let header = out.lines().next().unwrap();
        assert_eq!(header, DATASET_COLUMNS.join(","));
    }

    #[test]
    fn test_metadata_empty_values() {
        let meta = DatasetMetadata::default();
        assert_eq!(meta.size_mb().unwrap(), 0.0);
        assert_eq!(meta.last_update().unwrap(), None);
    }

    #[test]
    fn test_metadata_typed_views() {
        let meta = DatasetMetadata {
            dataset_size: "12.34 МБ".to_string(),
            dataset_last_update: "2026-10-16 09:15:00".to_string(),
        };
        assert!((meta.size_mb().unwrap() - 12.34).abs() < 1e-9);
        let expected = NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap();
        assert_eq!(meta.last_update().unwrap(), Some(expected));
    }

    #[test]
    fn test_metadata_malformed_values() {
        let meta = DatasetMetadata {
            dataset_size: "big".to_string(),
            dataset_last_update: "yesterday".to_string(),
        };
        assert!(matches!(meta.size_mb(), Err(MetadataError::MalformedSize(_))));
        assert!(matches!(
            meta.last_update(),
            Err(MetadataError::MalformedTimestamp(_))
        ));
    }

    #[test]
    fn test_metadata_deserializes_missing_keys() {
        let meta: DatasetMetadata = serde_json::from_str("{}").unwrap();
        assert_eq!(meta, DatasetMetadata::default());
    }
}
