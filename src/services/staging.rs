use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Longest extension carried over from an uploaded filename.
const MAX_EXTENSION_LEN: usize = 10;

/// Allocates collision-free paths under a single storage root and persists
/// uploaded bytes there.
///
/// Identity of a staged file is a random 128-bit token plus the sanitized
/// extension of the original upload. Tokens make collisions between
/// concurrent requests practically impossible, so no locking or
/// retry-on-collision logic exists anywhere in the crate.
pub struct StagingStore {
    root: PathBuf,
}

impl StagingStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    /// `create_dir_all` is idempotent and safe under concurrent startup.
    pub async fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reserve a fresh token path with the given extension (may be empty).
    /// Does not touch the filesystem; the caller (or an external tool told
    /// to write there) creates the file.
    pub fn allocate(&self, extension: &str) -> PathBuf {
        let token = Uuid::new_v4().simple().to_string();
        let name = if extension.is_empty() {
            token
        } else {
            format!("{token}.{extension}")
        };
        self.root.join(name)
    }

    /// Write one upload's full content to a fresh token path, keeping the
    /// original filename's extension so extension-sniffing tools (LibreOffice)
    /// still recognize the format.
    pub async fn stage(&self, original_filename: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        let path = self.allocate(&sanitize_extension(original_filename));
        tokio::fs::write(&path, bytes).await?;
        debug!("📄 Staged {} bytes at {}", bytes.len(), path.display());
        Ok(path)
    }
}

/// Extract and sanitize the extension of an uploaded filename. The token is
/// server-generated, so the extension is the only request-controlled text
/// that ever reaches a command line; restrict it to short ASCII alphanumerics.
fn sanitize_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            e.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .take(MAX_EXTENSION_LEN)
                .collect::<String>()
                .to_lowercase()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_stage_writes_bytes_with_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = StagingStore::new(dir.path()).await.unwrap();

        let path = store.stage("report.docx", b"hello").await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"hello");
        assert_eq!(path.extension().unwrap(), "docx");
        assert!(path.starts_with(dir.path()));
    }

    #[tokio::test]
    async fn test_allocated_paths_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let store = StagingStore::new(dir.path()).await.unwrap();

        let paths: HashSet<_> = (0..100).map(|_| store.allocate("pdf")).collect();
        assert_eq!(paths.len(), 100);
    }

    #[tokio::test]
    async fn test_extension_is_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let store = StagingStore::new(dir.path()).await.unwrap();

        let path = store.stage("evil.p d;f", b"x").await.unwrap();
        assert_eq!(path.extension().unwrap(), "pdf");

        let path = store.stage("noext", b"x").await.unwrap();
        assert!(path.extension().is_none());
    }

    #[tokio::test]
    async fn test_new_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        StagingStore::new(dir.path()).await.unwrap();
        StagingStore::new(dir.path()).await.unwrap();
    }
}
