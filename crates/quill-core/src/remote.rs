//! Remote archive client
//!
//! Blocking HTTP operations against the sync server. The server is a dumb
//! per-user blob holder; the whole archive is the unit of transfer.
//!
//! Wire contract (base URL is the configured method):
//! - `GET /md5` - current archive MD5 as plain text; Basic auth carries
//!   the username with an empty password
//! - `GET /repo` - the archive bytes; same auth
//! - `POST /repo` - upload the archive; Basic auth with username and the
//!   user's encryption password (authorizes writes, never decrypts)
//! - `DELETE /repo` - remove this user's archive; same auth as POST
//!
//! Callers treat any failure here as "offline" and degrade; the MD5 check
//! is the only optimization against redundant transfers.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::Result;

/// Client for one user's archive on one server
pub struct RemoteClient {
    base: String,
    username: String,
    http: reqwest::blocking::Client,
}

impl RemoteClient {
    pub fn new(base: &str, username: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            username: username.to_string(),
            http: reqwest::blocking::Client::new(),
        }
    }

    /// Whether a configured method names a server this client can talk to
    pub fn is_sync_target(method: &str) -> bool {
        method.starts_with("http")
    }

    /// Fetch the server-side archive MD5
    pub fn fetch_md5(&self) -> Result<String> {
        let url = format!("{}/md5", self.base);
        debug!("GET {}", url);
        let body = self
            .http
            .get(&url)
            .basic_auth(&self.username, Some(""))
            .send()?
            .error_for_status()?
            .text()?;
        Ok(body.trim().to_string())
    }

    /// Download the archive into `dest`
    pub fn fetch_archive(&self, dest: &Path) -> Result<()> {
        let url = format!("{}/repo", self.base);
        debug!("GET {}", url);
        let bytes = self
            .http
            .get(&url)
            .basic_auth(&self.username, Some(""))
            .send()?
            .error_for_status()?
            .bytes()?;
        fs::write(dest, &bytes)?;
        Ok(())
    }

    /// Upload the archive at `path`
    pub fn push_archive(&self, path: &Path, password: &str) -> Result<()> {
        let url = format!("{}/repo", self.base);
        debug!("POST {}", url);
        let bytes = fs::read(path)?;
        self.http
            .post(&url)
            .basic_auth(&self.username, Some(password))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()?
            .error_for_status()?;
        Ok(())
    }

    /// Delete this user's archive on the server
    pub fn delete_archive(&self, password: &str) -> Result<()> {
        let url = format!("{}/repo", self.base);
        debug!("DELETE {}", url);
        self.http
            .delete(&url)
            .basic_auth(&self.username, Some(password))
            .send()?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_target_detection() {
        assert!(RemoteClient::is_sync_target("http://example.com"));
        assert!(RemoteClient::is_sync_target("https://example.com:8080"));
        assert!(!RemoteClient::is_sync_target(""));
        assert!(!RemoteClient::is_sync_target("ssh://example.com"));
    }

    #[test]
    fn base_url_is_normalized() {
        let client = RemoteClient::new("http://example.com/", "alice");
        assert_eq!(client.base, "http://example.com");
    }

    #[test]
    fn unreachable_server_reports_error() {
        // nothing listens on this port; failure must surface, not panic
        let client = RemoteClient::new("http://127.0.0.1:9", "alice");
        assert!(client.fetch_md5().is_err());
    }
}
