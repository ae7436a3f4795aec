use std::collections::HashSet;
use std::fs;
use std::path::{self, Path, PathBuf};

use tracing::warn;

const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "mkv", "avi", "mov"];

/// Ordered, duplicate-free list of source videos. Insertion order is
/// processing order.
#[derive(Clone, Debug, Default)]
pub struct JobQueue {
    seen: HashSet<PathBuf>,
    items: Vec<PathBuf>,
}

impl JobQueue {
    pub fn new() -> Self {
        JobQueue::default()
    }

    /// Queues every path not already present. Returns how many were added.
    pub fn add<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut added = 0;
        for p in paths {
            let key = absolute(p.as_ref());
            if self.seen.insert(key.clone()) {
                self.items.push(key);
                added += 1;
            }
        }
        added
    }

    pub fn remove<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let doomed: HashSet<PathBuf> = paths.into_iter()
            .map(|p| absolute(p.as_ref()))
            .filter(|p| self.seen.contains(p))
            .collect();
        self.items.retain(|i| !doomed.contains(i));
        self.seen.retain(|i| !doomed.contains(i));
        doomed.len()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.seen.clear();
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.seen.contains(&absolute(path))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Copy of the queue for a run to iterate; later edits don't touch it.
    pub fn snapshot(&self) -> Vec<PathBuf> {
        self.items.clone()
    }
}

fn absolute(path: &Path) -> PathBuf {
    path::absolute(path).unwrap_or_else(|_| PathBuf::from(path))
}

pub fn is_video(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()),
        None => false,
    }
}

/// Collects video files under `dirpath`, sorted by path.
pub fn scan_videos(dirpath: &Path, recursive: bool) -> Vec<PathBuf> {
    let mut found = vec![];
    let mut dirpaths = vec![PathBuf::from(dirpath)];
    while let Some(current_dir) = dirpaths.pop() {
        match fs::read_dir(&current_dir) {
            Ok(entries) => {
                for entry in entries.filter_map(|e| e.ok()) {
                    if let Ok(ft) = entry.file_type() {
                        let p = entry.path();
                        if ft.is_file() && is_video(&p) {
                            found.push(p);
                        } else if ft.is_dir() && recursive {
                            dirpaths.push(p);
                        }
                    }
                }
            },
            Err(err) => warn!("unable to read {:?}: {}", current_dir, err),
        };
    }
    found.sort();
    found
}
