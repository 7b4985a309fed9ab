//! Configuration
//!
//! A JSON array of per-user records in `config.json`; the first element is
//! the active default. A record carries the username, an optional hashed
//! password (persisted for compatibility, unused by the lifecycle), and
//! the sync method: an `http[s]://...` URL for remote sync, or empty /
//! `ssh...` for none.
//!
//! Resolution rule (see [`resolve`]): select by username, or fall back to
//! the current default; create a record when nothing matches; the selected
//! record always moves to the front and the file is rewritten.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// One per-user configuration record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub username: String,
    #[serde(default)]
    pub hashed_password: String,
    #[serde(default)]
    pub method: String,
}

/// Load the config list; a missing file yields an empty list
pub fn load(path: &Path) -> Result<Vec<Config>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Persist the config list, pretty-printed
pub fn save(path: &Path, configs: &[Config]) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(configs)?;
    fs::write(path, bytes)?;
    Ok(())
}

/// Select or create the active configuration
///
/// - no file and no username: [`Error::ConfigMissing`]
/// - no file: create a record from the supplied values
/// - file exists: pick the first record matching `username` (or the
///   current default when no username is given); create a new record from
///   the supplied values when none matches
///
/// The selected record is moved to the front (it becomes the new default)
/// and the file is rewritten. Returns the active record.
pub fn resolve(path: &Path, username: Option<&str>, method: Option<&str>) -> Result<Config> {
    let mut configs = load(path)?;

    if configs.is_empty() {
        let Some(username) = username.filter(|u| !u.is_empty()) else {
            return Err(Error::ConfigMissing);
        };
        debug!("creating first configuration for {}", username);
        configs.push(Config {
            username: username.to_string(),
            hashed_password: String::new(),
            method: method.unwrap_or_default().to_string(),
        });
    } else {
        let wanted = match username.filter(|u| !u.is_empty()) {
            Some(u) => u.to_string(),
            None => configs[0].username.clone(),
        };
        match configs.iter().position(|c| c.username == wanted) {
            Some(found) => {
                let selected = configs.remove(found);
                configs.insert(0, selected);
            }
            None => {
                debug!("adding configuration for new user {}", wanted);
                configs.insert(
                    0,
                    Config {
                        username: wanted,
                        hashed_password: String::new(),
                        method: method.unwrap_or_default().to_string(),
                    },
                );
            }
        }
    }

    save(path, &configs)?;
    Ok(configs[0].clone())
}

/// Validate a sync method string
pub fn validate_method(method: &str) -> Result<()> {
    if method.contains("http") || method.contains("ssh") {
        Ok(())
    } else {
        Err(Error::BadMethod(method.to_string()))
    }
}

/// Rewrite the sync method of an existing user's record
pub fn set_method(path: &Path, username: &str, method: &str) -> Result<()> {
    validate_method(method)?;
    let mut configs = load(path)?;
    for config in &mut configs {
        if config.username == username {
            config.method = method.to_string();
            break;
        }
    }
    save(path, &configs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_path(tmp: &TempDir) -> std::path::PathBuf {
        tmp.path().join("config.json")
    }

    #[test]
    fn missing_file_and_no_username_fails() {
        let tmp = TempDir::new().unwrap();
        let err = resolve(&config_path(&tmp), None, None).unwrap_err();
        assert!(matches!(err, Error::ConfigMissing));
    }

    #[test]
    fn first_use_creates_file() {
        let tmp = TempDir::new().unwrap();
        let path = config_path(&tmp);

        let active = resolve(&path, Some("alice"), Some("http://example.com")).unwrap();
        assert_eq!(active.username, "alice");
        assert_eq!(active.method, "http://example.com");

        let stored = load(&path).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].username, "alice");
    }

    #[test]
    fn default_is_first_record() {
        let tmp = TempDir::new().unwrap();
        let path = config_path(&tmp);
        resolve(&path, Some("alice"), Some("")).unwrap();
        resolve(&path, Some("bob"), Some("")).unwrap();

        // no username: picks the current default (bob, most recently used)
        let active = resolve(&path, None, None).unwrap();
        assert_eq!(active.username, "bob");
    }

    #[test]
    fn selection_moves_to_front() {
        let tmp = TempDir::new().unwrap();
        let path = config_path(&tmp);
        resolve(&path, Some("alice"), Some("")).unwrap();
        resolve(&path, Some("bob"), Some("")).unwrap();

        let active = resolve(&path, Some("alice"), None).unwrap();
        assert_eq!(active.username, "alice");

        let stored = load(&path).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].username, "alice");
        assert_eq!(stored[1].username, "bob");
    }

    #[test]
    fn existing_user_keeps_stored_method() {
        let tmp = TempDir::new().unwrap();
        let path = config_path(&tmp);
        resolve(&path, Some("alice"), Some("http://sync.example.com")).unwrap();

        // the supplied method is ignored for a known user
        let active = resolve(&path, Some("alice"), Some("http://elsewhere.example")).unwrap();
        assert_eq!(active.method, "http://sync.example.com");
    }

    #[test]
    fn set_method_validates() {
        let tmp = TempDir::new().unwrap();
        let path = config_path(&tmp);
        resolve(&path, Some("alice"), Some("")).unwrap();

        let err = set_method(&path, "alice", "gopher://old.example").unwrap_err();
        assert!(matches!(err, Error::BadMethod(_)));

        set_method(&path, "alice", "https://sync.example.com").unwrap();
        let stored = load(&path).unwrap();
        assert_eq!(stored[0].method, "https://sync.example.com");
    }

    #[test]
    fn hashed_password_field_round_trips() {
        let tmp = TempDir::new().unwrap();
        let path = config_path(&tmp);
        save(
            &path,
            &[Config {
                username: "alice".to_string(),
                hashed_password: "legacy-hash".to_string(),
                method: String::new(),
            }],
        )
        .unwrap();

        resolve(&path, Some("alice"), None).unwrap();
        let stored = load(&path).unwrap();
        assert_eq!(stored[0].hashed_password, "legacy-hash");
    }
}
