//! View builder
//!
//! Materializes the logical picture of documents and entries from the
//! unordered pile of encrypted blobs in a user's local directory.
//!
//! The algorithm runs in two sorting passes:
//!
//! 1. every blob is decrypted, parsed, and sorted by modified timestamp
//!    descending (filename breaks ties); walking that order, the first
//!    blob seen per entry name is its current version - last writer wins
//! 2. the surviving versions are re-sorted by created timestamp and laid
//!    out per document in chronological order
//!
//! Tombstones stay in the view and are masked at query time: a document
//! containing any `"ignore document"` blob reads as deleted, and an entry
//! whose current version is `"ignore entry"` reads as deleted.
//!
//! The view is a pure function of the blob set, so merging two stores by
//! file union yields the same view regardless of merge order.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::crypto;
use crate::error::{Error, Result};
use crate::models::{self, Entry};

/// What to do when a blob fails to decrypt or parse
///
/// `Skip` drops the blob with a warning; `Fail` aborts the build with
/// [`Error::ParseCorrupt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParsePolicy {
    #[default]
    Skip,
    Fail,
}

/// Result of resolving an ambiguous name (see [`View::resolve`])
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// The name matched a document
    Document { name: String, entries: Vec<Entry> },
    /// The name matched a single entry within a document
    Entry { document: String, entry: Entry },
}

/// A blob successfully decrypted and parsed, with its sort key
pub(crate) struct ParsedBlob {
    pub entry: Entry,
    pub modified: NaiveDateTime,
    pub created: NaiveDateTime,
}

/// Decrypt and parse every blob in `dir`
///
/// The sort key prefers the modified timestamp and falls back to the
/// created timestamp when a blob predates the modified field.
pub(crate) fn parse_blobs(dir: &Path, password: &str, policy: ParsePolicy) -> Result<Vec<ParsedBlob>> {
    let mut names: Vec<_> = match fs::read_dir(dir) {
        Ok(iter) => iter
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .map(|e| e.path())
            .collect(),
        Err(_) => return Ok(Vec::new()),
    };
    names.sort();

    let mut parsed = Vec::with_capacity(names.len());
    for path in names {
        debug!("parsing {:?}", path);
        let blob = match read_blob(&path, password) {
            Ok(blob) => blob,
            Err(err) => match policy {
                ParsePolicy::Fail => return Err(err),
                ParsePolicy::Skip => {
                    warn!("skipping unreadable blob {:?}: {}", path, err);
                    continue;
                }
            },
        };
        parsed.push(blob);
    }
    Ok(parsed)
}

fn read_blob(path: &Path, password: &str) -> Result<ParsedBlob> {
    let corrupt = |details: String| Error::ParseCorrupt {
        path: path.to_path_buf(),
        details,
    };

    let plaintext =
        crypto::decrypt_from_file(password, path).map_err(|e| corrupt(e.to_string()))?;
    let mut entry: Entry =
        serde_json::from_slice(&plaintext).map_err(|e| corrupt(e.to_string()))?;
    entry.uuid = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let created = models::parse_stamp(&entry.timestamp).unwrap_or(NaiveDateTime::MIN);
    let modified = if entry.modified_timestamp.is_empty() {
        created
    } else {
        models::parse_stamp(&entry.modified_timestamp).unwrap_or(NaiveDateTime::MIN)
    };

    Ok(ParsedBlob {
        entry,
        modified,
        created,
    })
}

/// The materialized, totally ordered picture of one user's store
#[derive(Debug)]
pub struct View {
    /// every parsed blob, keyed by uuid
    entries: HashMap<String, Entry>,
    /// entry name -> uuid of its current version
    entry_name_to_uuid: HashMap<String, String>,
    /// document -> current-version uuids in created-timestamp order
    ordering: HashMap<String, Vec<String>>,
}

impl View {
    /// Build the view from every blob in `dir`
    pub fn build(dir: &Path, password: &str, policy: ParsePolicy) -> Result<View> {
        let mut blobs = parse_blobs(dir, password, policy)?;

        // newest first; ties go to the lexicographically greatest filename
        blobs.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| b.entry.uuid.cmp(&a.entry.uuid))
        });

        let mut entries = HashMap::with_capacity(blobs.len());
        let mut entry_name_to_uuid = HashMap::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut current: Vec<&ParsedBlob> = Vec::new();

        for blob in &blobs {
            entries.insert(blob.entry.uuid.clone(), blob.entry.clone());
            if seen.insert(blob.entry.entry.clone()) {
                entry_name_to_uuid.insert(blob.entry.entry.clone(), blob.entry.uuid.clone());
                current.push(blob);
            }
        }

        // second pass: newest created first, reversed below to chronological
        current.sort_by(|a, b| {
            b.created
                .cmp(&a.created)
                .then_with(|| b.entry.uuid.cmp(&a.entry.uuid))
        });

        let mut ordering: HashMap<String, Vec<String>> = HashMap::new();
        for blob in &current {
            ordering
                .entry(blob.entry.document.clone())
                .or_default()
                .push(blob.entry.uuid.clone());
        }
        for uuids in ordering.values_mut() {
            uuids.reverse();
        }

        Ok(View {
            entries,
            entry_name_to_uuid,
            ordering,
        })
    }

    /// All documents, alphabetical, minus the tombstoned ones
    pub fn list_documents(&self) -> Vec<String> {
        let mut documents: Vec<String> = self
            .ordering
            .iter()
            .filter(|(_, uuids)| {
                !uuids
                    .iter()
                    .any(|uuid| self.entries[uuid].is_document_tombstone())
            })
            .map(|(name, _)| name.clone())
            .collect();
        documents.sort();
        documents
    }

    /// All entry names across all documents
    pub fn list_entries(&self) -> Vec<String> {
        self.entry_name_to_uuid.keys().cloned().collect()
    }

    /// Whether any version of this entry name exists
    pub fn contains_entry_name(&self, entry_name: &str) -> bool {
        self.entry_name_to_uuid.contains_key(entry_name)
    }

    /// A document's live entries in chronological order
    ///
    /// A document tombstone empties the whole document; individual entry
    /// tombstones are skipped.
    pub fn get_document(&self, document_name: &str) -> Vec<Entry> {
        let Some(uuids) = self.ordering.get(document_name) else {
            return Vec::new();
        };
        if uuids
            .iter()
            .any(|uuid| self.entries[uuid].is_document_tombstone())
        {
            return Vec::new();
        }
        uuids
            .iter()
            .map(|uuid| &self.entries[uuid])
            .filter(|entry| !entry.is_entry_tombstone())
            .cloned()
            .collect()
    }

    /// The current version of one entry
    pub fn get_entry(&self, document_name: &str, entry_name: &str) -> Result<Entry> {
        if let Some(uuids) = self.ordering.get(document_name) {
            for uuid in uuids {
                let entry = &self.entries[uuid];
                if entry.entry == entry_name {
                    if entry.is_entry_tombstone() {
                        return Err(Error::Tombstoned);
                    }
                    return Ok(entry.clone());
                }
            }
        }
        Err(Error::NotFound(entry_name.to_string()))
    }

    /// Resolve a name that may be either a document or an entry
    pub fn resolve(&self, name: &str) -> Result<Resolved> {
        if self.ordering.contains_key(name) {
            return Ok(Resolved::Document {
                name: name.to_string(),
                entries: self.get_document(name),
            });
        }
        for (document, uuids) in &self.ordering {
            for uuid in uuids {
                let entry = &self.entries[uuid];
                if entry.entry == name {
                    return Ok(Resolved::Entry {
                        document: document.clone(),
                        entry: entry.clone(),
                    });
                }
            }
        }
        Err(Error::NotFound(name.to_string()))
    }
}
