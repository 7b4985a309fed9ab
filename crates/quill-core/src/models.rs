//! Data models
//!
//! Defines the `Entry` record that every encrypted blob carries, the
//! `Document` grouping used by dump/import snapshots, and the timestamp
//! helpers shared across the store.
//!
//! An entry is immutable once written. Editing writes a new blob with the
//! same `entry` name; deletion writes a tombstone blob whose `text` is one
//! of the sentinel values below.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Sentinel text marking a single entry as deleted
pub const ENTRY_TOMBSTONE: &str = "ignore entry";

/// Sentinel text marking a whole document as deleted
pub const DOCUMENT_TOMBSTONE: &str = "ignore document";

/// Canonical timestamp form used everywhere on disk
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One versioned text record, persisted as a single encrypted blob
///
/// `timestamp` is when the logical entry was first created and is carried
/// forward across edits; `modified_timestamp` is when this particular blob
/// was written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entry {
    pub text: String,
    pub timestamp: String,
    pub modified_timestamp: String,
    pub document: String,
    pub entry: String,
    /// On-disk filename; derived, never serialized
    #[serde(skip)]
    pub uuid: String,
}

impl Entry {
    pub fn is_entry_tombstone(&self) -> bool {
        self.text == ENTRY_TOMBSTONE
    }

    pub fn is_document_tombstone(&self) -> bool {
        self.text == DOCUMENT_TOMBSTONE
    }
}

/// A named group of entries, as it appears in dump/import snapshots
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub name: String,
    pub entries: Vec<Entry>,
}

/// The current local time in canonical form
pub fn now_stamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a timestamp in any accepted input form
///
/// Accepted: the canonical form, `YYYY-MM-DD HH:MM`, a bare `YYYY-MM-DD`
/// date, and RFC 3339.
pub fn parse_stamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT) {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M") {
        return Some(dt);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    None
}

/// Reformat a timestamp into the canonical form
pub fn reformat_stamp(s: &str) -> Result<String> {
    parse_stamp(s)
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
        .ok_or_else(|| Error::InvalidTimestamp(s.to_string()))
}

/// A fresh random 10-character alphanumeric entry name
pub fn random_entry_name() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_serializes_with_wire_field_names() {
        let entry = Entry {
            text: "hello".to_string(),
            timestamp: "2023-01-01 10:00:00".to_string(),
            modified_timestamp: "2023-01-01 10:00:00".to_string(),
            document: "notes".to_string(),
            entry: "greet".to_string(),
            uuid: "should-not-appear".to_string(),
        };

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"text\""));
        assert!(json.contains("\"timestamp\""));
        assert!(json.contains("\"modified_timestamp\""));
        assert!(json.contains("\"document\""));
        assert!(json.contains("\"entry\""));
        assert!(!json.contains("uuid"));
        assert!(!json.contains("should-not-appear"));

        let back: Entry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.text, "hello");
        assert!(back.uuid.is_empty());
    }

    #[test]
    fn tombstone_detection() {
        let mut entry = Entry {
            text: "ignore entry".to_string(),
            timestamp: String::new(),
            modified_timestamp: String::new(),
            document: "notes".to_string(),
            entry: "e".to_string(),
            uuid: String::new(),
        };
        assert!(entry.is_entry_tombstone());
        assert!(!entry.is_document_tombstone());

        entry.text = "ignore document".to_string();
        assert!(entry.is_document_tombstone());
        assert!(!entry.is_entry_tombstone());

        entry.text = "regular text".to_string();
        assert!(!entry.is_entry_tombstone());
        assert!(!entry.is_document_tombstone());
    }

    #[test]
    fn parse_accepts_canonical_form() {
        let dt = parse_stamp("2023-06-15 08:30:05").unwrap();
        assert_eq!(dt.format(TIMESTAMP_FORMAT).to_string(), "2023-06-15 08:30:05");
    }

    #[test]
    fn parse_accepts_shortened_forms() {
        assert!(parse_stamp("2023-06-15 08:30").is_some());
        assert!(parse_stamp("2023-06-15").is_some());
        assert!(parse_stamp("2023-06-15T08:30:05+00:00").is_some());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_stamp("not a date").is_none());
        assert!(parse_stamp("").is_none());
    }

    #[test]
    fn reformat_canonicalizes() {
        assert_eq!(reformat_stamp("2023-06-15").unwrap(), "2023-06-15 00:00:00");
        assert_eq!(
            reformat_stamp("2023-06-15 08:30").unwrap(),
            "2023-06-15 08:30:00"
        );
    }

    #[test]
    fn reformat_rejects_garbage() {
        let err = reformat_stamp("tomorrow-ish").unwrap_err();
        assert!(matches!(err, Error::InvalidTimestamp(_)));
    }

    #[test]
    fn now_stamp_round_trips() {
        let stamp = now_stamp();
        assert!(parse_stamp(&stamp).is_some());
    }

    #[test]
    fn random_entry_names_are_ten_alphanumeric_chars() {
        for _ in 0..20 {
            let name = random_entry_name();
            assert_eq!(name.len(), 10);
            assert!(name.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn random_entry_names_differ() {
        assert_ne!(random_entry_name(), random_entry_name());
    }
}
