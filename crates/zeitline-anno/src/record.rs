//! Page-level output schema

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One extracted newspaper page.
///
/// This is the schema of both the per-worker output shards and the
/// merged corpus. Aliases accept the field names older shard files
/// used, so the merge stage normalizes on read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageRecord {
    pub title: String,
    pub aid: String,
    #[serde(alias = "issue_date")]
    pub date: NaiveDate,
    #[serde(alias = "page_index")]
    pub page: u32,
    /// OCR text; may be empty when the scan carries no recognized text
    #[serde(alias = "ocr_text", default)]
    pub text: String,
    #[serde(alias = "timestamp")]
    pub extracted_at: DateTime<Utc>,
}

impl PageRecord {
    /// Dedup key within the corpus: `(aid, issue date, page index)`.
    pub fn key(&self) -> (String, NaiveDate, u32) {
        (self.aid.clone(), self.date, self.page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> PageRecord {
        PageRecord {
            title: "Neue Freie Presse".into(),
            aid: "nfp".into(),
            date: NaiveDate::from_ymd_opt(1899, 3, 5).unwrap(),
            page: 4,
            text: "Der Abend war still.".into(),
            extracted_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn json_roundtrip() {
        let rec = record();
        let json = serde_json::to_string(&rec).unwrap();
        let back: PageRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn legacy_field_names_accepted() {
        let json = r#"{
            "title": "Neue Freie Presse",
            "aid": "nfp",
            "issue_date": "1899-03-05",
            "page_index": 4,
            "ocr_text": "Der Abend war still.",
            "timestamp": "2023-11-14T22:13:20Z"
        }"#;
        let rec: PageRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec, record());
    }

    #[test]
    fn missing_text_defaults_to_empty() {
        let json = r#"{
            "title": "t", "aid": "a", "date": "1900-01-01",
            "page": 1, "extracted_at": "2023-11-14T22:13:20Z"
        }"#;
        let rec: PageRecord = serde_json::from_str(json).unwrap();
        assert!(rec.text.is_empty());
    }
}
