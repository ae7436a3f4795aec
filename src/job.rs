use std::collections::HashMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};

use crate::events::StatusEvent;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
}

impl ItemStatus {
    pub fn is_resolved(&self) -> bool {
        matches!(self, ItemStatus::Succeeded | ItemStatus::Failed)
    }
}

impl Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status_str = match self {
            ItemStatus::Pending => "☐",
            ItemStatus::Processing => "🚧",
            ItemStatus::Succeeded => "✅",
            ItemStatus::Failed => "🚫",
        };
        write!(f, "{}", status_str)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct JobItem {
    pub path: PathBuf,
    pub status: ItemStatus,
    pub error: Option<String>,
}

impl JobItem {
    pub fn new(path: PathBuf) -> Self {
        JobItem {
            path,
            status: ItemStatus::Pending,
            error: None,
        }
    }
}

impl Display for JobItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error {
            None => write!(f, "{} {}", self.status, self.path.display()),
            Some(err) => write!(f, "{} {} ({})", self.status, self.path.display(), err),
        }
    }
}

/// The observer's view of a run. Only ever mutated by applying events
/// received from the worker.
pub struct JobBoard {
    index: HashMap<PathBuf, usize>,
    pub items: Vec<JobItem>,
    pub progress: f64,
}

impl JobBoard {
    pub fn new(snapshot: &[PathBuf]) -> Self {
        let items: Vec<JobItem> = snapshot.iter().cloned().map(JobItem::new).collect();
        let index = items.iter()
            .enumerate()
            .map(|(i, item)| (item.path.clone(), i))
            .collect();
        JobBoard {
            index,
            items,
            progress: 0.0,
        }
    }

    pub fn get(&self, path: &Path) -> Option<&JobItem> {
        self.index.get(path).map(|&i| &self.items[i])
    }

    pub fn apply(&mut self, event: &StatusEvent) {
        match event {
            StatusEvent::Item { path, status, message } => {
                if let Some(&i) = self.index.get(path) {
                    let item = &mut self.items[i];
                    item.status = *status;
                    item.error = match status {
                        ItemStatus::Failed => message.clone(),
                        _ => None,
                    };
                }
            },
            StatusEvent::Progress(percent) => self.progress = *percent,
            StatusEvent::Finished(_) => {},
        }
    }

    pub fn count(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|i| i.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_applies_events() {
        let a = PathBuf::from("/videos/a.mp4");
        let b = PathBuf::from("/videos/b.mp4");
        let mut board = JobBoard::new(&[a.clone(), b.clone()]);
        assert_eq!(board.count(ItemStatus::Pending), 2);

        board.apply(&StatusEvent::Item { path: a.clone(), status: ItemStatus::Processing, message: None });
        board.apply(&StatusEvent::Item { path: a.clone(), status: ItemStatus::Failed, message: Some(String::from("boom")) });
        board.apply(&StatusEvent::Progress(50.0));

        let item = board.get(&a).unwrap();
        assert_eq!(item.status, ItemStatus::Failed);
        assert_eq!(item.error.as_deref(), Some("boom"));
        assert_eq!(board.get(&b).unwrap().status, ItemStatus::Pending);
        assert_eq!(board.progress, 50.0);
    }

    #[test]
    fn test_board_ignores_unknown_paths() {
        let mut board = JobBoard::new(&[PathBuf::from("/videos/a.mp4")]);
        board.apply(&StatusEvent::Item {
            path: PathBuf::from("/elsewhere.mp4"),
            status: ItemStatus::Succeeded,
            message: None,
        });
        assert_eq!(board.count(ItemStatus::Succeeded), 0);
    }

    #[test]
    fn test_display() {
        let mut item = JobItem::new(PathBuf::from("/videos/a.mp4"));
        assert_eq!(format!("{}", item), "☐ /videos/a.mp4");
        item.status = ItemStatus::Failed;
        item.error = Some(String::from("bad"));
        assert_eq!(format!("{}", item), "🚫 /videos/a.mp4 (bad)");
    }
}
