use crate::api::error::AppError;
use crate::services::staging::StagingStore;
use std::path::PathBuf;
use tracing::debug;
use zip::CompressionMethod;
use zip::write::FileOptions;

/// The one path a response streams out, plus its download metadata.
#[derive(Debug)]
pub struct Deliverable {
    pub path: PathBuf,
    pub filename: String,
    pub media_type: String,
}

/// Turn one-or-many output paths into exactly one deliverable.
///
/// A single output is returned as-is under `single_name`; multiple outputs are
/// bundled into a flat zip archive (base names only, insertion order
/// preserved) under `archive_name`. Zero outputs means an operation handler
/// broke its contract, which is a programming error, not a conversion failure.
pub async fn package(
    staging: &StagingStore,
    paths: Vec<PathBuf>,
    single_name: &str,
    archive_name: &str,
    media_type: &str,
) -> Result<Deliverable, AppError> {
    match paths.len() {
        0 => Err(AppError::Internal(
            "packager invoked with zero outputs".to_string(),
        )),
        1 => Ok(Deliverable {
            path: paths.into_iter().next().unwrap(),
            filename: single_name.to_string(),
            media_type: media_type.to_string(),
        }),
        n => {
            let archive_path = staging.allocate("zip");
            debug!("📦 Archiving {} files into {}", n, archive_path.display());

            let target = archive_path.clone();
            tokio::task::spawn_blocking(move || write_archive(&target, &paths))
                .await
                .map_err(|e| AppError::Internal(format!("archive task panicked: {e}")))??;

            Ok(Deliverable {
                path: archive_path,
                filename: archive_name.to_string(),
                media_type: "application/zip".to_string(),
            })
        }
    }
}

fn write_archive(archive_path: &PathBuf, paths: &[PathBuf]) -> Result<(), AppError> {
    let file = std::fs::File::create(archive_path)?;
    let mut writer = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for path in paths {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AppError::Internal(format!("unnamed path {}", path.display())))?;
        writer
            .start_file(name, options)
            .map_err(|e| AppError::Internal(format!("zip entry failed: {e}")))?;
        let mut input = std::fs::File::open(path)?;
        std::io::copy(&mut input, &mut writer)?;
    }

    writer
        .finish()
        .map_err(|e| AppError::Internal(format!("zip finalize failed: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    async fn store() -> (tempfile::TempDir, StagingStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = StagingStore::new(dir.path()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_single_path_returned_directly() {
        let (_dir, store) = store().await;
        let page = store.stage("page.pdf", b"%PDF").await.unwrap();

        let d = package(&store, vec![page.clone()], "page1.pdf", "pages.zip", "application/pdf")
            .await
            .unwrap();

        assert_eq!(d.path, page);
        assert_eq!(d.filename, "page1.pdf");
        assert_eq!(d.media_type, "application/pdf");
    }

    #[tokio::test]
    async fn test_multiple_paths_archived_in_order() {
        let (_dir, store) = store().await;
        let a = store.stage("a.pdf", b"first").await.unwrap();
        let b = store.stage("b.pdf", b"second").await.unwrap();
        let c = store.stage("c.pdf", b"third").await.unwrap();

        let d = package(
            &store,
            vec![a.clone(), b.clone(), c.clone()],
            "page1.pdf",
            "pages.zip",
            "application/pdf",
        )
        .await
        .unwrap();

        assert_eq!(d.filename, "pages.zip");
        assert_eq!(d.media_type, "application/zip");

        let bytes = std::fs::read(&d.path).unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 3);

        let expected_names: Vec<String> = [&a, &b, &c]
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        let mut contents = Vec::new();
        for i in 0..3 {
            let mut entry = archive.by_index(i).unwrap();
            assert_eq!(entry.name(), expected_names[i]);
            // Flat storage: no directory components.
            assert!(!entry.name().contains('/'));
            let mut buf = String::new();
            entry.read_to_string(&mut buf).unwrap();
            contents.push(buf);
        }
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_zero_paths_is_internal_error() {
        let (_dir, store) = store().await;
        let err = package(&store, vec![], "x.pdf", "x.zip", "application/pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
