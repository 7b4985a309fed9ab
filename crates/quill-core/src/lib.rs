//! Quill core library
//!
//! A personal, end-to-end-encrypted, synchronizing notes store. A user
//! owns a collection of **documents**, each an ordered list of
//! **entries**; every entry version is one encrypted, content-addressed
//! blob on disk, and the whole blob set syncs against a dumb HTTP server
//! as a single compressed archive.
//!
//! # Architecture
//!
//! - **Blobs**: append-only source of truth; filename = content hash,
//!   deletion by tombstone, conflict-free merge by set union
//! - **View**: in-memory reconstruction of documents and entries, rebuilt
//!   lazily after every write
//! - **Sync**: background pull at init, push of the re-packed archive at
//!   close, MD5 comparison to skip redundant transfers
//!
//! # Quick start
//!
//! ```ignore
//! use quill_core::{Paths, Repository};
//!
//! let mut repo = Repository::init(Paths::new()?, Some("alice"), Some(""))?;
//! repo.open("password")?;
//! repo.update("remember the milk", "groceries", "", "")?;
//! for doc in repo.list_documents()? {
//!     println!("{doc}");
//! }
//! repo.close()?;
//! ```
//!
//! # Modules
//!
//! - `repository`: lifecycle and entry store (main entry point)
//! - `view`: materialized document/entry queries
//! - `models`: entry records and timestamp helpers
//! - `crypto`: AEAD file encryption, content hashing, the slow PIN hash
//! - `archive`: deterministic tar+bzip2 bundling
//! - `remote`: HTTP client for the archive server
//! - `config`: the per-user configuration list
//! - `paths`: on-disk layout

pub mod archive;
pub mod config;
pub mod crypto;
pub mod error;
pub mod models;
pub mod paths;
pub mod remote;
pub mod repository;
pub mod view;

pub use config::Config;
pub use error::{Error, Result};
pub use models::{Document, Entry};
pub use paths::Paths;
pub use remote::RemoteClient;
pub use repository::Repository;
pub use view::{ParsePolicy, Resolved, View};
