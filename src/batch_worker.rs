use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, info};

use crate::error::{ConfigError, StartError};
use crate::events::{EventSink, StatusEvent};
use crate::job::ItemStatus;
use crate::pipeline::{BatchConfig, ItemPipeline};
use crate::probe::Prober;
use crate::transcoder::Transcoder;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
    Idle,
    Running,
    Completed,
    Stopped,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub status: RunStatus,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub pending: usize,
}

#[derive(Debug)]
struct RunState {
    status: RunStatus,
    total: usize,
    succeeded: usize,
    failed: usize,
}

impl RunState {
    fn idle() -> Self {
        RunState {
            status: RunStatus::Idle,
            total: 0,
            succeeded: 0,
            failed: 0,
        }
    }

    fn running(total: usize) -> Self {
        RunState {
            status: RunStatus::Running,
            total,
            succeeded: 0,
            failed: 0,
        }
    }

    fn progress(&self) -> f64 {
        match self.total {
            0 => 0.0,
            total => ((self.succeeded + self.failed) as f64) * 100.0 / (total as f64),
        }
    }

    fn summary(&self) -> RunSummary {
        RunSummary {
            status: self.status,
            total: self.total,
            succeeded: self.succeeded,
            failed: self.failed,
            pending: self.total - self.succeeded - self.failed,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cooperative cancellation flag, checked between items.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs a queue snapshot through the pipeline on a background thread, one
/// item at a time.
pub struct BatchWorker {
    state: Arc<Mutex<RunState>>,
    stop: StopHandle,
    transcoder: Transcoder,
    prober: Arc<dyn Prober>,
    events: EventSink,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl BatchWorker {
    pub fn new(transcoder: Transcoder, prober: Arc<dyn Prober>, events: EventSink) -> Self {
        BatchWorker {
            transcoder,
            prober,
            events,
            state: Arc::new(Mutex::new(RunState::idle())),
            stop: StopHandle::default(),
            thread: Mutex::new(None),
        }
    }

    /// Begins a run over `snapshot`. Refused while another run is active or
    /// when the configuration is unusable; neither case touches any state.
    pub fn start(&self, snapshot: Vec<PathBuf>, config: BatchConfig) -> Result<(), StartError> {
        let mut state = lock(&self.state);
        if state.status == RunStatus::Running {
            return Err(StartError::AlreadyRunning);
        }
        if snapshot.is_empty() {
            return Err(StartError::Config(ConfigError::EmptyQueue));
        }
        config.validate()?;

        // the previous run has already published its summary
        if let Some(previous) = lock(&self.thread).take() {
            let _ = previous.join();
        }

        *state = RunState::running(snapshot.len());
        self.stop.reset();
        info!("starting batch of {} item(s), {} mode, {}", snapshot.len(), config.mode, config.geometry);

        let run = Run {
            state: Arc::clone(&self.state),
            stop: self.stop.clone(),
            transcoder: self.transcoder.clone(),
            prober: Arc::clone(&self.prober),
            events: self.events.clone(),
            snapshot,
            config,
        };
        *lock(&self.thread) = Some(thread::spawn(move || run.execute()));
        Ok(())
    }

    /// Asks the run to stop before its next item. The current step finishes.
    pub fn request_stop(&self) {
        if !self.stop.is_stop_requested() {
            debug!("stop requested");
        }
        self.stop.request_stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn status(&self) -> RunStatus {
        lock(&self.state).status
    }

    /// True while a run is in progress and its thread is still alive. A
    /// thread that died mid-run leaves `status()` at `Running` but is not
    /// reported as running here.
    pub fn is_running(&self) -> bool {
        if self.status() != RunStatus::Running {
            return false;
        }
        lock(&self.thread).as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Resolved items as a percentage of the run's total.
    pub fn progress(&self) -> f64 {
        lock(&self.state).progress()
    }

    pub fn summary(&self) -> RunSummary {
        lock(&self.state).summary()
    }

    /// Blocks until the worker thread exits.
    pub fn wait(&self) {
        let handle = lock(&self.thread).take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

struct Run {
    state: Arc<Mutex<RunState>>,
    stop: StopHandle,
    transcoder: Transcoder,
    prober: Arc<dyn Prober>,
    events: EventSink,
    snapshot: Vec<PathBuf>,
    config: BatchConfig,
}

impl Run {
    fn execute(self) {
        let pipeline = ItemPipeline {
            config: &self.config,
            transcoder: &self.transcoder,
            prober: self.prober.as_ref(),
            log: &self.events.log,
        };
        let total = self.snapshot.len();
        let mut stopped = false;

        for (i, source) in self.snapshot.iter().enumerate() {
            if self.stop.is_stop_requested() {
                self.events.log.info(format!("stopped; {} item(s) left pending", total - i));
                stopped = true;
                break;
            }

            self.events.item(source, ItemStatus::Processing, None);
            self.events.log.info(format!("[{}/{}] {}", i + 1, total, source.display()));

            let resolved = match pipeline.process(source) {
                Ok(output) => {
                    self.events.log.info(format!("wrote {}", output.display()));
                    self.events.item(source, ItemStatus::Succeeded, None);
                    ItemStatus::Succeeded
                },
                Err(err) => {
                    self.events.log.error(format!("{}: {}", source.display(), err));
                    self.events.item(source, ItemStatus::Failed, Some(err.to_string()));
                    ItemStatus::Failed
                },
            };

            let progress = {
                let mut state = lock(&self.state);
                match resolved {
                    ItemStatus::Succeeded => state.succeeded += 1,
                    _ => state.failed += 1,
                }
                state.progress()
            };
            self.events.publish(StatusEvent::Progress(progress));
        }

        let mut state = lock(&self.state);
        state.status = match stopped {
            true => RunStatus::Stopped,
            false => RunStatus::Completed,
        };
        let summary = state.summary();
        info!("batch finished: {:?}", summary);
        self.events.publish(StatusEvent::Finished(summary));
    }
}
