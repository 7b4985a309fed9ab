//! Repository lifecycle
//!
//! The `Repository` is the owning façade over one user's store: the path
//! layout, the session password, the background pull, the blob writes, and
//! the lazily built view.
//!
//! Lifecycle: `init` resolves the configuration, prepares directories and
//! spawns the pull thread; `open` joins the pull, probe-decrypts one blob
//! to check the password, and unlocks the store; reads and writes then run
//! sequentially; `close` re-packs the local archive and pushes it when the
//! server's copy differs.
//!
//! ```ignore
//! let mut repo = Repository::init(Paths::new()?, Some("alice"), Some(""))?;
//! repo.open("correct horse battery staple")?;
//! repo.update("hello", "notes", "greet", "")?;
//! let docs = repo.list_documents()?;
//! repo.close()?;
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use chrono::Local;
use tracing::{debug, warn};

use crate::archive;
use crate::config;
use crate::crypto;
use crate::error::{Error, Result};
use crate::models::{self, Document, Entry, DOCUMENT_TOMBSTONE, ENTRY_TOMBSTONE};
use crate::paths::Paths;
use crate::remote::RemoteClient;
use crate::view::{ParsePolicy, Resolved, View};

/// One user's synchronized encrypted entry store
#[derive(Debug)]
pub struct Repository {
    paths: Paths,
    username: String,
    method: String,
    password: Option<String>,
    pull: Option<JoinHandle<bool>>,
    successful_pull: bool,
    parse_policy: ParsePolicy,
    view: Option<View>,
}

impl Repository {
    /// Initialize the store and start the background pull
    ///
    /// Resolves the active configuration (see [`config::resolve`]): with
    /// no stored configuration a username is required; a known username
    /// keeps its stored sync method. Returns immediately; the pull runs on
    /// its own thread and is joined inside [`open`](Self::open).
    pub fn init(paths: Paths, username: Option<&str>, method: Option<&str>) -> Result<Self> {
        paths.ensure()?;
        let active = config::resolve(&paths.config_file(), username, method)?;
        debug!("initializing repository for {}", active.username);

        fs::create_dir_all(paths.local_repo(&active.username))?;
        fs::create_dir_all(paths.remote_repo(&active.username))?;

        let mut repo = Self {
            paths,
            username: active.username,
            method: active.method,
            password: None,
            pull: None,
            successful_pull: false,
            parse_policy: ParsePolicy::default(),
            view: None,
        };
        repo.spawn_pull();
        Ok(repo)
    }

    /// Choose what happens when a blob fails to decrypt or parse
    pub fn with_parse_policy(mut self, policy: ParsePolicy) -> Self {
        self.parse_policy = policy;
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    /// Change the sync method and persist it to the configuration
    pub fn set_method(&mut self, method: &str) -> Result<()> {
        config::set_method(&self.paths.config_file(), &self.username, method)?;
        self.method = method.to_string();
        Ok(())
    }

    fn spawn_pull(&mut self) {
        let task = PullTask {
            username: self.username.clone(),
            method: self.method.clone(),
            local_repo: self.paths.local_repo(&self.username),
            remote_repo: self.paths.remote_repo(&self.username),
            local_archive: self.paths.local_archive(&self.username),
            remote_archive: self.paths.remote_archive(&self.username),
        };
        self.pull = Some(std::thread::spawn(move || task.run()));
    }

    /// Unlock the store with the session password
    ///
    /// Joins the pull thread, then sanity-checks the password by
    /// decrypting one local blob. An empty store accepts any password.
    pub fn open(&mut self, password: &str) -> Result<()> {
        if let Some(handle) = self.pull.take() {
            self.successful_pull = handle.join().unwrap_or(false);
            debug!("pull finished, successful={}", self.successful_pull);
        }

        if let Some(probe) = first_blob(&self.paths.local_repo(&self.username))? {
            debug!("probing password against {:?}", probe);
            crypto::decrypt_from_file(password, &probe).map_err(|_| Error::WrongPassword)?;
        }
        self.password = Some(password.to_string());
        Ok(())
    }

    fn password(&self) -> Result<&str> {
        self.password.as_deref().ok_or(Error::NotOpen)
    }

    fn view(&mut self) -> Result<&View> {
        if self.view.is_none() {
            let password = self.password()?.to_string();
            let built = View::build(
                &self.paths.local_repo(&self.username),
                &password,
                self.parse_policy,
            )?;
            self.view = Some(built);
        }
        self.view.as_ref().ok_or(Error::NotOpen)
    }

    // ==================== Writes ====================

    /// Write a new entry version
    ///
    /// An empty `entry_name` gets a fresh random identifier. An empty
    /// `timestamp` means "now"; otherwise it is reformatted into canonical
    /// form. Writing the same `(text, entry_name)` twice is a no-op: the
    /// filename is the content address.
    pub fn update(
        &mut self,
        text: &str,
        document_name: &str,
        entry_name: &str,
        timestamp: &str,
    ) -> Result<()> {
        self.password()?;

        let entry_name = if entry_name.is_empty() {
            models::random_entry_name()
        } else {
            entry_name.to_string()
        };

        let file = self.blob_path(text, &entry_name);
        if file.exists() {
            debug!("blob already present, skipping {:?}", file);
            return Ok(());
        }

        let timestamp = if timestamp.is_empty() {
            models::now_stamp()
        } else {
            models::reformat_stamp(timestamp)?
        };
        let modified_timestamp = if self.view()?.contains_entry_name(&entry_name) {
            models::now_stamp()
        } else {
            timestamp.clone()
        };

        let record = Entry {
            text: text.to_string(),
            timestamp,
            modified_timestamp,
            document: document_name.to_string(),
            entry: entry_name.clone(),
            uuid: String::new(),
        };
        let bytes = serde_json::to_vec_pretty(&record)?;
        crypto::encrypt_to_file(&bytes, self.password()?, &file)?;
        debug!("inserted entry {} as {:?}", entry_name, file);

        self.view = None;
        Ok(())
    }

    /// Mark one entry as deleted
    pub fn delete_entry(&mut self, document_name: &str, entry_name: &str) -> Result<()> {
        self.update(ENTRY_TOMBSTONE, document_name, entry_name, "")
    }

    /// Mark a whole document as deleted
    pub fn delete_document(&mut self, document_name: &str) -> Result<()> {
        self.update(DOCUMENT_TOMBSTONE, document_name, "", "")
    }

    fn blob_path(&self, text: &str, entry_name: &str) -> PathBuf {
        let address = crypto::hash_and_hex(&format!("{text}{entry_name}"));
        self.paths
            .local_repo(&self.username)
            .join(format!("{address}.json"))
    }

    // ==================== Reads ====================

    /// All documents, alphabetical, minus the tombstoned ones
    pub fn list_documents(&mut self) -> Result<Vec<String>> {
        Ok(self.view()?.list_documents())
    }

    /// All entry names across all documents
    pub fn list_entries(&mut self) -> Result<Vec<String>> {
        Ok(self.view()?.list_entries())
    }

    /// A document's live entries in chronological order
    pub fn get_document(&mut self, document_name: &str) -> Result<Vec<Entry>> {
        Ok(self.view()?.get_document(document_name))
    }

    /// The current version of one entry
    pub fn get_entry(&mut self, document_name: &str, entry_name: &str) -> Result<Entry> {
        self.view()?.get_entry(document_name, entry_name)
    }

    /// Resolve a name that may be either a document or an entry
    pub fn get_document_or_entry(&mut self, name: &str) -> Result<Resolved> {
        self.view()?.resolve(name)
    }

    // ==================== Close ====================

    /// Pack the local blobs and push the archive when it changed
    ///
    /// Outcomes: `Ok` when the archive was uploaded;
    /// [`Error::NetworkUnavailable`] when the session ran offline;
    /// [`Error::NoChanges`] when the server already has these bytes;
    /// [`Error::UploadFailed`] when the push itself failed. The scratch
    /// temp file is shredded in every case.
    pub fn close(&mut self) -> Result<()> {
        let result = self.close_inner();
        self.paths.clean_up();
        result
    }

    fn close_inner(&mut self) -> Result<()> {
        let local_archive = self.paths.local_archive(&self.username);
        let blobs = json_blobs(&self.paths.local_repo(&self.username))?;
        debug!("archiving {} blobs", blobs.len());
        archive::pack(&local_archive, &blobs)?;

        if !self.successful_pull {
            return Err(Error::NetworkUnavailable);
        }

        let client = RemoteClient::new(&self.method, &self.username);
        let matching = match client.fetch_md5() {
            Ok(server_md5) => crypto::compute_md5(&local_archive)
                .map(|local| local == server_md5)
                .unwrap_or(false),
            Err(err) => {
                warn!("md5 re-check failed: {}", err);
                false
            }
        };
        if matching {
            return Err(Error::NoChanges);
        }

        let password = self.password()?;
        client
            .push_archive(&local_archive, password)
            .map_err(|err| {
                warn!("upload failed: {}", err);
                Error::UploadFailed
            })?;
        debug!("archive uploaded");
        Ok(())
    }

    /// Delete this user's archive on the server
    pub fn delete_remote(&self) -> Result<()> {
        if RemoteClient::is_sync_target(&self.method) {
            let password = self.password()?;
            RemoteClient::new(&self.method, &self.username).delete_archive(password)?;
        }
        Ok(())
    }

    // ==================== PIN vault ====================

    /// Whether a PIN shortcut exists for this user
    pub fn has_pin_file(&self) -> bool {
        self.paths.key_file(&self.username).exists()
    }

    /// Store the session password encrypted under the slow hash of a PIN
    pub fn set_pin_from_password(&self, pin: &str) -> Result<()> {
        let password = self.password()?;
        let key = crypto::hash_password_slow(pin)?;
        crypto::encrypt_to_file(
            password.as_bytes(),
            &key,
            &self.paths.key_file(&self.username),
        )
    }

    /// Recover the password from a PIN
    ///
    /// Any failure deletes the key file: a wrong guess destroys the
    /// shortcut rather than leaving it around for offline brute force.
    pub fn get_password_from_pin(&self, pin: &str) -> Result<String> {
        let key_file = self.paths.key_file(&self.username);
        if !key_file.exists() {
            return Err(Error::NoPin);
        }

        let key = match crypto::hash_password_slow(pin) {
            Ok(key) => key,
            Err(err) => {
                let _ = fs::remove_file(&key_file);
                return Err(err);
            }
        };
        match crypto::decrypt_from_file(&key, &key_file) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(password) => Ok(password),
                Err(_) => {
                    let _ = fs::remove_file(&key_file);
                    Err(Error::WrongPassword)
                }
            },
            Err(_) => {
                let _ = fs::remove_file(&key_file);
                Err(Error::WrongPassword)
            }
        }
    }

    // ==================== Dump / Import ====================

    /// Write an encrypted snapshot of every blob version
    ///
    /// The snapshot groups entries by document, newest modification first,
    /// and is written to `<username>-YYYY-MM-DD.quill` in the working
    /// directory. Returns the filename.
    pub fn dump_all(&mut self) -> Result<String> {
        let password = self.password()?.to_string();
        let mut blobs = crate::view::parse_blobs(
            &self.paths.local_repo(&self.username),
            &password,
            self.parse_policy,
        )?;
        blobs.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| b.entry.uuid.cmp(&a.entry.uuid))
        });

        let mut documents: Vec<Document> = Vec::new();
        for blob in blobs {
            match documents
                .iter_mut()
                .find(|d| d.name == blob.entry.document)
            {
                Some(doc) => doc.entries.push(blob.entry),
                None => documents.push(Document {
                    name: blob.entry.document.clone(),
                    entries: vec![blob.entry],
                }),
            }
        }

        let filename = format!(
            "{}-{}.quill",
            self.username,
            Local::now().format("%Y-%m-%d")
        );
        let bytes = serde_json::to_vec_pretty(&documents)?;
        crypto::encrypt_to_file(&bytes, &password, Path::new(&filename))?;
        Ok(filename)
    }

    /// Re-ingest a plaintext snapshot
    ///
    /// Each entry replays through [`update`](Self::update) with its
    /// modified timestamp, so imported history keeps its dates.
    pub fn import(&mut self, path: &Path) -> Result<()> {
        let bytes = fs::read(path)?;
        let documents: Vec<Document> = serde_json::from_slice(&bytes)?;
        for document in documents {
            for entry in document.entries {
                self.update(
                    &entry.text,
                    &entry.document,
                    &entry.entry,
                    &entry.modified_timestamp,
                )?;
            }
        }
        Ok(())
    }
}

/// The background pull: fetch, unpack, and merge the remote archive
struct PullTask {
    username: String,
    method: String,
    local_repo: PathBuf,
    remote_repo: PathBuf,
    local_archive: PathBuf,
    remote_archive: PathBuf,
}

impl PullTask {
    /// Returns true when the remote state was reached without error
    fn run(self) -> bool {
        let pulled = if RemoteClient::is_sync_target(&self.method) {
            match self.download() {
                Ok(()) => true,
                Err(err) => {
                    debug!("pull failed, running offline: {}", err);
                    false
                }
            }
        } else {
            false
        };

        self.decompress();
        self.merge_remote_into_local();
        pulled
    }

    /// Fetch the remote archive when its MD5 differs from our local copy
    fn download(&self) -> Result<()> {
        let client = RemoteClient::new(&self.method, &self.username);
        let server_md5 = client.fetch_md5()?;
        let local_md5 = crypto::compute_md5(&self.local_archive).unwrap_or_default();
        if server_md5 == local_md5 {
            debug!("archive unchanged, not downloading");
            return Ok(());
        }
        client.fetch_archive(&self.remote_archive)
    }

    /// Unpack both archives into their working directories
    fn decompress(&self) {
        if self.remote_archive.exists() {
            let _ = fs::remove_dir_all(&self.remote_repo);
            if let Err(err) = archive::unpack(&self.remote_archive, &self.remote_repo) {
                warn!("cannot unpack remote archive: {}", err);
            }
        }

        // recovery path: a local archive with no unpacked blobs next to it
        let unpacked = fs::read_dir(&self.local_repo)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false);
        if self.local_archive.exists() && !unpacked {
            if let Err(err) = archive::unpack(&self.local_archive, &self.local_repo) {
                warn!("cannot unpack local archive: {}", err);
            }
        }
    }

    /// Copy every remote blob absent from the local directory
    ///
    /// Pure set union: blobs are content-addressed and immutable, so a
    /// basename collision means identical content.
    fn merge_remote_into_local(&self) {
        let Ok(remote_files) = fs::read_dir(&self.remote_repo) else {
            return;
        };
        for file in remote_files.filter_map(|e| e.ok()) {
            let target = self.local_repo.join(file.file_name());
            if !target.exists() {
                debug!("merging remote blob {:?}", file.file_name());
                if let Err(err) = fs::copy(file.path(), &target) {
                    warn!("cannot merge {:?}: {}", file.path(), err);
                }
            }
        }
    }
}

/// One arbitrary blob for the open-time password probe
fn first_blob(dir: &Path) -> Result<Option<PathBuf>> {
    let mut blobs = json_blobs(dir)?;
    blobs.sort();
    Ok(blobs.into_iter().next())
}

/// All `.json` blobs in a directory
fn json_blobs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut blobs = Vec::new();
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                blobs.push(path);
            }
        }
    }
    Ok(blobs)
}
