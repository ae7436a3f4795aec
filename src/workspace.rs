use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::CleanupWarning;
use crate::events::LogSink;

/// Private scratch directory for one job item.
///
/// Every path handed out by [`TempWorkspace::allocate`] or accepted by
/// [`TempWorkspace::register`] is removed exactly once, followed by the
/// directory itself, either by [`TempWorkspace::dispose`] or when the
/// workspace is dropped. Paths that existed before registration are never
/// accepted, so source files can't end up on the removal list.
pub struct TempWorkspace {
    root: PathBuf,
    dir: Option<TempDir>,
    created: Vec<PathBuf>,
    log: LogSink,
}

impl TempWorkspace {
    pub fn new(base_dir: &Path, log: LogSink) -> io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("bookend-")
            .tempdir_in(base_dir)?;
        debug!("opened workspace {:?}", dir.path());
        Ok(TempWorkspace {
            root: dir.path().to_path_buf(),
            dir: Some(dir),
            created: vec![],
            log,
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// A fresh path inside the workspace, owned by it.
    pub fn allocate(&mut self, name: &str) -> PathBuf {
        let path = self.root.join(name);
        if !self.created.contains(&path) {
            self.created.push(path.clone());
        }
        path
    }

    /// Takes ownership of a path the caller is about to create. Refuses
    /// paths that already exist.
    pub fn register(&mut self, path: &Path) -> bool {
        if path.exists() || self.created.iter().any(|p| p == path) {
            return false;
        }
        self.created.push(PathBuf::from(path));
        true
    }

    /// Removes everything. Failures are logged and returned, never raised.
    pub fn dispose(mut self) -> Vec<CleanupWarning> {
        self.cleanup()
    }

    fn cleanup(&mut self) -> Vec<CleanupWarning> {
        let mut warnings = vec![];
        for path in self.created.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => debug!("removed {:?}", path),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {},
                Err(source) => warnings.push(CleanupWarning { path, source }),
            }
        }
        if let Some(dir) = self.dir.take() {
            if let Err(source) = dir.close() {
                warnings.push(CleanupWarning { path: self.root.clone(), source });
            }
        }
        for w in &warnings {
            warn!("{}", w);
            self.log.warn(w.to_string());
        }
        warnings
    }
}

impl Drop for TempWorkspace {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{channels, Severity};

    #[test]
    fn test_each_workspace_is_fresh() {
        let base = tempfile::tempdir().unwrap();
        let a = TempWorkspace::new(base.path(), LogSink::discard()).unwrap();
        let b = TempWorkspace::new(base.path(), LogSink::discard()).unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.path().starts_with(base.path()));
        assert_eq!(fs::read_dir(a.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_dispose_removes_created_but_not_inputs() {
        let base = tempfile::tempdir().unwrap();
        let input = base.path().join("input.mp4");
        fs::write(&input, b"source").unwrap();

        let mut ws = TempWorkspace::new(base.path(), LogSink::discard()).unwrap();
        let normalized = ws.allocate("main.mp4");
        fs::write(&normalized, b"normalized").unwrap();
        let never_written = ws.allocate("outro.mp4");
        assert!(!ws.register(&input));
        let root = ws.path().to_path_buf();

        let warnings = ws.dispose();
        assert!(warnings.is_empty());
        assert!(!normalized.exists());
        assert!(!never_written.exists());
        assert!(!root.exists());
        assert!(input.exists());
    }

    #[test]
    fn test_drop_cleans_up() {
        let base = tempfile::tempdir().unwrap();
        let (root, file) = {
            let mut ws = TempWorkspace::new(base.path(), LogSink::discard()).unwrap();
            let file = ws.allocate("intro.mp4");
            fs::write(&file, b"x").unwrap();
            (ws.path().to_path_buf(), file)
        };
        assert!(!file.exists());
        assert!(!root.exists());
    }

    #[test]
    fn test_register_outside_workspace() {
        let base = tempfile::tempdir().unwrap();
        let outside = base.path().join("partial.mp4");
        let mut ws = TempWorkspace::new(base.path(), LogSink::discard()).unwrap();
        assert!(ws.register(&outside));
        assert!(!ws.register(&outside));
        fs::write(&outside, b"x").unwrap();
        ws.dispose();
        assert!(!outside.exists());
    }

    #[test]
    fn test_removal_failure_is_a_warning() {
        let base = tempfile::tempdir().unwrap();
        let (sink, stream) = channels();
        let mut ws = TempWorkspace::new(base.path(), sink.log.clone()).unwrap();
        let stubborn = ws.allocate("stubborn");
        fs::create_dir(&stubborn).unwrap();
        fs::write(stubborn.join("inner"), b"x").unwrap();
        let root = ws.path().to_path_buf();

        let warnings = ws.dispose();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].path, stubborn);
        assert!(stream.drain_logs().iter().any(|l| l.severity == Severity::Warning));
        assert!(!root.exists());
    }
}
