use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Scoped set of staged paths removed when the guard goes out of scope.
///
/// Every operation handler owns exactly one guard and tracks every path it
/// creates: the original upload(s), intermediate pages/images, and the final
/// deliverable. Removal happens in `Drop`, so it runs on every exit path:
/// normal return, `?` propagation, panic unwind, and future cancellation when
/// a client disconnects mid-request.
///
/// Cleanup never raises: a per-path removal failure is logged and swallowed so
/// one stuck path cannot block removal of the rest, and a secondary cleanup
/// error can never mask the error that caused the exit.
#[derive(Default)]
pub struct CleanupGuard {
    paths: Vec<PathBuf>,
}

impl CleanupGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    pub fn track_all<I>(&mut self, paths: I)
    where
        I: IntoIterator,
        I::Item: Into<PathBuf>,
    {
        self.paths.extend(paths.into_iter().map(Into::into));
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        for path in &self.paths {
            remove_best_effort(path);
        }
    }
}

fn remove_best_effort(path: &Path) {
    let result = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    match result {
        Ok(()) => debug!("🧹 Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}
