//! Terminal front end for a running batch: polls the worker's channels on a
//! fixed cadence, keeps the job board current and draws a progress bar.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use human_repr::{HumanCount, HumanDuration};
use kdam::{term, tqdm, Bar, BarExt};
use tracing::{debug, error, info, warn};

use crate::batch_worker::{BatchWorker, RunSummary};
use crate::events::{EventStream, LogEvent, Severity, StatusEvent};
use crate::job::{ItemStatus, JobBoard};

pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct Observer {
    board: JobBoard,
    pbar: Bar,
    started: Instant,
    summary: Option<RunSummary>,
}

impl Observer {
    pub fn new(snapshot: &[PathBuf]) -> Self {
        term::init(false);
        Observer {
            board: JobBoard::new(snapshot),
            pbar: tqdm!(
                total = snapshot.len(),
                desc = "starting",
                position = 0,
                force_refresh = true
            ),
            started: Instant::now(),
            summary: None,
        }
    }

    /// Drains events until the worker reports the end of the run, or until
    /// its thread is gone without having reported. A raised `interrupted`
    /// flag turns into a single stop request.
    pub fn watch(&mut self, worker: &BatchWorker, events: &EventStream, interrupted: &Arc<AtomicBool>) -> RunSummary {
        let mut stop_sent = false;
        loop {
            if interrupted.load(Ordering::Relaxed) && !stop_sent {
                warn!("interrupted; stopping after the current item (press ctrl-c again to abort)");
                worker.request_stop();
                stop_sent = true;
            }

            // sampled before draining: once the run has ended its final
            // events are already queued
            let alive = worker.is_running();
            self.render_logs(events.drain_logs());
            for event in events.drain_statuses() {
                self.handle_status(&event);
            }

            if let Some(summary) = &self.summary {
                return summary.clone();
            }
            if !alive {
                error!("batch worker exited without finishing the run");
                return worker.summary();
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn render_logs(&mut self, logs: Vec<LogEvent>) {
        if logs.iter().all(|l| l.severity == Severity::Debug) && !tracing::enabled!(tracing::Level::DEBUG) {
            return;
        }
        let _ = self.pbar.clear();
        for log in logs {
            match log.severity {
                Severity::Debug => debug!(target: "bookend::step", "{}", log.text),
                Severity::Info => info!("{}", log.text),
                Severity::Warning => warn!("{}", log.text),
                Severity::Error => error!("{}", log.text),
            }
        }
        let _ = self.pbar.refresh();
    }

    fn handle_status(&mut self, event: &StatusEvent) {
        self.board.apply(event);
        match event {
            StatusEvent::Item { path, status: ItemStatus::Processing, .. } => {
                let name = path.file_name().unwrap_or(path.as_os_str()).to_string_lossy().to_string();
                self.pbar.set_description(name);
                let _ = self.pbar.refresh();
            },
            StatusEvent::Item { .. } => {},
            StatusEvent::Progress(_) => {
                let resolved = self.board.count(ItemStatus::Succeeded) + self.board.count(ItemStatus::Failed);
                self.pbar.set_postfix(format!("{} failed", self.board.count(ItemStatus::Failed)));
                let _ = self.pbar.update_to(resolved);
            },
            StatusEvent::Finished(summary) => {
                self.summary = Some(summary.clone());
            },
        }
    }

    /// Prints totals, output sizes and every failed item.
    pub fn report(&mut self, summary: &RunSummary, outputs: impl Fn(&PathBuf) -> PathBuf) {
        let _ = self.pbar.clear();
        eprintln!();
        let mut written: u64 = 0;
        for item in &self.board.items {
            match item.status {
                ItemStatus::Succeeded => {
                    let output = outputs(&item.path);
                    written += std::fs::metadata(&output).map(|m| m.len()).unwrap_or(0);
                    eprintln!("{} -> {}", item, output.display());
                },
                _ => eprintln!("{}", item),
            }
        }
        eprintln!(
            "{:?}: {} succeeded, {} failed, {} pending of {} ({} written in {})",
            summary.status,
            summary.succeeded,
            summary.failed,
            summary.pending,
            summary.total,
            written.human_count_bytes(),
            self.started.elapsed().human_duration());
    }
}
