//! Persistence for the single token record
//!
//! `FileTokenStore` keeps one JSON object on disk. Writes go to a temp file in
//! the same directory and are renamed over the target, so a concurrent `load`
//! sees either the old record or the new one, never a partial write. A missing
//! file means no record (unauthenticated).
//!
//! `MemoryTokenStore` is the in-process substitute for tests and ephemeral runs.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::token::TokenRecord;

/// Durable storage for one `TokenRecord`.
///
/// Every operation completes before returning and reports failures as
/// errors; callers decide whether to retry.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Pin<Box<dyn Future<Output = Result<Option<TokenRecord>>> + Send + '_>>;

    /// Replace the stored record as a whole.
    fn save<'a>(
        &'a self,
        record: &'a TokenRecord,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Remove the stored record. Clearing an empty store succeeds.
    fn clear(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// JSON file on disk, written atomically with 0600 permissions.
pub struct FileTokenStore {
    path: PathBuf,
    /// Serializes writers so they never share a temp file
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Pin<Box<dyn Future<Output = Result<Option<TokenRecord>>> + Send + '_>> {
        Box::pin(async move {
            let contents = match tokio::fs::read_to_string(&self.path).await {
                Ok(c) => c,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(Error::Io(format!("reading token file: {e}"))),
            };
            let record: TokenRecord = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing token file: {e}")))?;
            record.validate()?;
            Ok(Some(record))
        })
    }

    fn save<'a>(
        &'a self,
        record: &'a TokenRecord,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            record.validate()?;
            let _guard = self.write_lock.lock().await;
            write_atomic(&self.path, record).await?;
            info!(path = %self.path.display(), expires_at = record.expires_at, "token record saved");
            Ok(())
        })
    }

    fn clear(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            match tokio::fs::remove_file(&self.path).await {
                Ok(()) => {
                    info!(path = %self.path.display(), "token record cleared");
                    Ok(())
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(Error::Io(format!("removing token file: {e}"))),
            }
        })
    }
}

/// Write the record to a temp file next to `path`, then rename it over `path`.
async fn write_atomic(path: &Path, record: &TokenRecord) -> Result<()> {
    let json = serde_json::to_string_pretty(record)
        .map_err(|e| Error::CredentialParse(format!("serializing token record: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("token path has no parent directory".into()))?;
    if !dir.as_os_str().is_empty() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| Error::Io(format!("creating token directory: {e}")))?;
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Io("token path has no file name".into()))?
        .to_string_lossy();
    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp token file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting token file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp token file: {e}")))?;

    debug!(path = %path.display(), "persisted token record");
    Ok(())
}

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryTokenStore {
    record: Mutex<Option<TokenRecord>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: TokenRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Pin<Box<dyn Future<Output = Result<Option<TokenRecord>>> + Send + '_>> {
        Box::pin(async move { Ok(self.record.lock().await.clone()) })
    }

    fn save<'a>(
        &'a self,
        record: &'a TokenRecord,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            record.validate()?;
            *self.record.lock().await = Some(record.clone());
            Ok(())
        })
    }

    fn clear(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            *self.record.lock().await = None;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn test_record(suffix: &str) -> TokenRecord {
        TokenRecord {
            access_token: format!("at_{suffix}"),
            refresh_token: format!("rt_{suffix}"),
            token_type: "bearer".into(),
            expires_at: 1_760_000_000_000,
            scope: BTreeSet::from(["offline".to_string(), "read:sleep".to_string()]),
        }
    }

    #[tokio::test]
    async fn roundtrip_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("whoop_tokens.json");

        let store = FileTokenStore::new(&path);
        store.save(&test_record("1")).await.unwrap();

        // A fresh instance reads what the first one wrote
        let loaded = FileTokenStore::new(&path).load().await.unwrap();
        assert_eq!(loaded, Some(test_record("1")));
    }

    #[tokio::test]
    async fn missing_file_is_no_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("whoop_tokens.json"));
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_replaces_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("whoop_tokens.json"));

        store.save(&test_record("1")).await.unwrap();
        store.save(&test_record("2")).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(test_record("2")));
    }

    #[tokio::test]
    async fn clear_removes_file_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("whoop_tokens.json");
        let store = FileTokenStore::new(&path);

        store.save(&test_record("1")).await.unwrap();
        store.clear().await.unwrap();
        assert!(!path.exists());
        assert_eq!(store.load().await.unwrap(), None);

        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn persisted_layout_is_a_single_json_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("whoop_tokens.json");
        FileTokenStore::new(&path)
            .save(&test_record("1"))
            .await
            .unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(json["access_token"], "at_1");
        assert_eq!(json["refresh_token"], "rt_1");
        assert_eq!(json["token_type"], "bearer");
        assert_eq!(json["expires_at"], 1_760_000_000_000u64);
        assert_eq!(json["scope"], serde_json::json!(["offline", "read:sleep"]));
    }

    #[tokio::test]
    async fn corrupt_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("whoop_tokens.json");
        tokio::fs::write(&path, "{\"access_token\": \"at\"").await.unwrap();

        let err = FileTokenStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, Error::CredentialParse(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn partial_record_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("whoop_tokens.json");
        tokio::fs::write(
            &path,
            r#"{"access_token":"at","refresh_token":"","token_type":"bearer","expires_at":1,"scope":[]}"#,
        )
        .await
        .unwrap();

        let err = FileTokenStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, Error::CredentialParse(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn save_creates_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("whoop_tokens.json");
        let store = FileTokenStore::new(&path);

        store.save(&test_record("1")).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn unwritable_location_surfaces_io_error() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the parent directory should be
        let blocker = dir.path().join("not-a-dir");
        tokio::fs::write(&blocker, "x").await.unwrap();
        let store = FileTokenStore::new(blocker.join("whoop_tokens.json"));

        let err = store.save(&test_record("1")).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)), "got {err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_permissions_are_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("whoop_tokens.json");
        FileTokenStore::new(&path)
            .save(&test_record("1"))
            .await
            .unwrap();

        let metadata = tokio::fs::metadata(&path).await.unwrap();
        let mode = metadata.permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "token file must be 0600, got {mode:o}");
    }

    #[tokio::test]
    async fn concurrent_saves_leave_a_whole_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("whoop_tokens.json");
        let store = Arc::new(FileTokenStore::new(&path));

        let mut handles = vec![];
        for i in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.save(&test_record(&i.to_string())).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        // Whichever writer won, the file parses as one complete record
        let record = store.load().await.unwrap().unwrap();
        let suffix = record.access_token.trim_start_matches("at_").to_string();
        assert_eq!(record.refresh_token, format!("rt_{suffix}"));
    }

    #[tokio::test]
    async fn memory_store_roundtrip_and_clear() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.load().await.unwrap(), None);

        store.save(&test_record("1")).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(test_record("1")));

        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }
}
