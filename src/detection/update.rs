//! Remote signature updates.
//!
//! An update fetches a complete database document, compares its version with
//! the local one and, when they differ (or the caller forces it), replaces the
//! local database wholesale. Updates never merge.

use crate::core::config::UpdateConfig;
use crate::core::error::{Error, Result};
use crate::detection::database::{SignatureDatabase, SignatureStore};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// A fetched candidate database and the version it claims.
#[derive(Debug, Clone)]
pub struct UpdateDescriptor {
    pub remote_version: String,
    pub database: SignatureDatabase,
}

impl UpdateDescriptor {
    /// Parse a database document.
    pub fn parse(document: &str) -> Result<Self> {
        let database = SignatureDatabase::from_json(document)
            .map_err(|e| Error::UpdateFailed(format!("Invalid database document: {}", e)))?;
        Ok(Self {
            remote_version: database.metadata.version.clone(),
            database,
        })
    }
}

/// Fetches remote databases and applies them to a [`SignatureStore`].
pub struct UpdateCoordinator {
    store: Arc<SignatureStore>,
    client: reqwest::Client,
    url: String,
    timeout_secs: u64,
}

impl UpdateCoordinator {
    /// Create a coordinator for the configured update source.
    pub fn new(store: Arc<SignatureStore>, config: &UpdateConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("vigil/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(
            store,
            client,
            config.update_url.clone(),
            config.timeout_secs,
        ))
    }

    /// Create a coordinator around an existing HTTP client.
    pub fn with_client(
        store: Arc<SignatureStore>,
        client: reqwest::Client,
        url: impl Into<String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            store,
            client,
            url: url.into(),
            timeout_secs,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch and apply a remote database. Returns true iff the local
    /// database changed. Failures are logged and leave local state untouched.
    pub async fn update(&self, force: bool) -> bool {
        match self.try_update(force).await {
            Ok(changed) => changed,
            Err(e) => {
                log::error!("Signature update failed: {}", e);
                if let Some(hint) = e.suggestion() {
                    log::info!("{}", hint);
                }
                false
            }
        }
    }

    /// Like [`update`](Self::update) but returns the failure.
    pub async fn try_update(&self, force: bool) -> Result<bool> {
        let descriptor = self.fetch().await?;
        self.apply(descriptor, force)
    }

    /// Download the remote database document. Single attempt, no retry.
    pub async fn fetch(&self) -> Result<UpdateDescriptor> {
        log::info!("Checking for signature updates at {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::UpdateFailed(format!(
                "{} returned HTTP {}",
                self.url, status
            )));
        }

        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        UpdateDescriptor::parse(&body)
    }

    /// Apply a database document read from a local file.
    pub fn import_file(&self, path: &Path, force: bool) -> Result<bool> {
        let document = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        let descriptor = UpdateDescriptor::parse(&document)?;
        log::info!("Importing signatures from {:?}", path);
        self.apply(descriptor, force)
    }

    /// Decide on and perform the replacement. Returns true iff it happened.
    pub fn apply(&self, descriptor: UpdateDescriptor, force: bool) -> Result<bool> {
        let local_version = self.store.snapshot()?.metadata.version.clone();

        // Plain string equality: a different but older remote version still replaces.
        if !force && descriptor.remote_version == local_version {
            log::info!(
                "Signatures already current (version {})",
                descriptor.remote_version
            );
            return Ok(false);
        }

        let mut database = descriptor.database;
        let timestamp = database.stamp_now().to_string();

        // Persistence failures keep the in-memory swap
        if let Err(e) = self.store.persist(&database) {
            log::error!("Failed to persist updated signatures: {}", e);
        }
        if let Err(e) = self.store.write_marker(&timestamp) {
            log::error!("Failed to write last-updated marker: {}", e);
        }

        log::info!(
            "Signatures updated: {} -> {} ({} signatures)",
            local_version,
            descriptor.remote_version,
            database.len()
        );
        self.store.replace(database)?;
        Ok(true)
    }

    fn transport_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::network_timeout(format!("GET {}", self.url), self.timeout_secs)
        } else {
            Error::DownloadFailed {
                url: self.url.clone(),
                source: e,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::detection::signature::{HashAlgorithm, SignatureEntry};
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use tempfile::{tempdir, TempDir};

    const SHA_HELLO: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    fn store_with_version(version: &str) -> (TempDir, Arc<SignatureStore>) {
        let dir = tempdir().unwrap();
        let store = SignatureStore::new(Config::rooted_at(dir.path()).signatures);
        let mut db = SignatureDatabase::empty();
        db.metadata.version = version.to_string();
        store.replace(db).unwrap();
        (dir, Arc::new(store))
    }

    fn remote_database(version: &str) -> SignatureDatabase {
        let mut db = SignatureDatabase::empty();
        db.metadata.version = version.to_string();
        db.insert(SignatureEntry {
            hash: SHA_HELLO.to_string(),
            threat_name: "Test.Hello".to_string(),
            algorithm: HashAlgorithm::Sha256,
        });
        db
    }

    fn descriptor(version: &str) -> UpdateDescriptor {
        UpdateDescriptor {
            remote_version: version.to_string(),
            database: remote_database(version),
        }
    }

    fn coordinator(store: Arc<SignatureStore>, url: String) -> UpdateCoordinator {
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        UpdateCoordinator::with_client(store, client, url, 5)
    }

    /// Answer exactly one HTTP request with the given status and body.
    fn serve_once(status_line: &'static str, body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_line,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes());
                let _ = stream.flush();
            }
        });

        format!("http://{}/online_definitions_with_meta.json", addr)
    }

    #[test]
    fn test_equal_version_is_noop() {
        let (_dir, store) = store_with_version("1.0");
        let updater = coordinator(Arc::clone(&store), "http://127.0.0.1:9/".to_string());

        assert!(!updater.apply(descriptor("1.0"), false).unwrap());
        assert!(store.snapshot().unwrap().is_empty());
        assert!(!store.config().marker_file().exists());
    }

    #[test]
    fn test_force_always_replaces() {
        let (_dir, store) = store_with_version("1.0");
        let updater = coordinator(Arc::clone(&store), "http://127.0.0.1:9/".to_string());

        assert!(updater.apply(descriptor("1.0"), true).unwrap());
        let db = store.snapshot().unwrap();
        assert_eq!(db.lookup(SHA_HELLO, HashAlgorithm::Sha256), Some("Test.Hello"));
        assert_ne!(db.metadata.last_updated, "Never");
    }

    #[test]
    fn test_older_remote_version_still_replaces() {
        let (_dir, store) = store_with_version("2.0");
        let updater = coordinator(Arc::clone(&store), "http://127.0.0.1:9/".to_string());

        assert!(updater.apply(descriptor("1.0"), false).unwrap());
        assert_eq!(store.info().unwrap().version, "1.0");
    }

    #[test]
    fn test_apply_persists_snapshot_and_marker() {
        let (_dir, store) = store_with_version("1.0");
        let updater = coordinator(Arc::clone(&store), "http://127.0.0.1:9/".to_string());

        assert!(updater.apply(descriptor("1.1"), false).unwrap());

        let stamped = store.snapshot().unwrap().metadata.last_updated.clone();
        let marker = std::fs::read_to_string(store.config().marker_file()).unwrap();
        assert_eq!(marker, stamped);

        // A fresh load sees the replacement
        let reopened = SignatureStore::open(store.config().clone()).unwrap();
        assert_eq!(reopened.info().unwrap().version, "1.1");
        assert_eq!(
            reopened.lookup(SHA_HELLO, HashAlgorithm::Sha256).unwrap(),
            Some("Test.Hello".to_string())
        );
    }

    #[tokio::test]
    async fn test_update_over_http() {
        let (_dir, store) = store_with_version("1.0");
        let body = remote_database("2024.06.01").to_json().unwrap();
        let url = serve_once("200 OK", body);

        let updater = coordinator(Arc::clone(&store), url);
        assert!(updater.update(false).await);
        assert_eq!(store.info().unwrap().version, "2024.06.01");
        assert_eq!(store.info().unwrap().sha256_count, 1);
    }

    #[tokio::test]
    async fn test_update_http_error_keeps_local_state() {
        let (_dir, store) = store_with_version("1.0");
        let url = serve_once("500 Internal Server Error", String::new());

        let updater = coordinator(Arc::clone(&store), url);
        assert!(!updater.update(true).await);
        assert_eq!(store.info().unwrap().version, "1.0");
    }

    #[tokio::test]
    async fn test_update_invalid_body_keeps_local_state() {
        let (_dir, store) = store_with_version("1.0");
        let url = serve_once("200 OK", "<html>not json</html>".to_string());

        let updater = coordinator(Arc::clone(&store), url);
        let err = updater.try_update(true).await.unwrap_err();
        assert!(matches!(err, Error::UpdateFailed(_)));
        assert_eq!(store.info().unwrap().version, "1.0");
    }

    #[tokio::test]
    async fn test_update_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (_dir, store) = store_with_version("1.0");
        let updater = coordinator(Arc::clone(&store), format!("http://{}/defs.json", addr));
        assert!(!updater.update(true).await);
        assert_eq!(store.info().unwrap().version, "1.0");
    }

    #[test]
    fn test_import_file() {
        let (dir, store) = store_with_version("1.0");
        let path = dir.path().join("defs.json");
        std::fs::write(&path, remote_database("1.5").to_json().unwrap()).unwrap();

        let updater = coordinator(Arc::clone(&store), "http://127.0.0.1:9/".to_string());
        assert!(updater.import_file(&path, false).unwrap());
        assert!(!updater.import_file(&path, false).unwrap());
        assert!(updater
            .import_file(&dir.path().join("missing.json"), true)
            .is_err());
    }

    #[test]
    fn test_descriptor_uses_document_version() {
        let json = r#"{"md5": {}, "sha256": {}, "metadata": {"version": "3.2", "last_updated": "Never"}}"#;
        let descriptor = UpdateDescriptor::parse(json).unwrap();
        assert_eq!(descriptor.remote_version, "3.2");
        assert!(UpdateDescriptor::parse("[]").is_err());
    }
}
