use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::pipeline::PipelineMode;

/// Problems with the batch configuration. Raised before any work begins.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("mode {mode} requires an intro clip")]
    MissingIntro { mode: PipelineMode },

    #[error("mode {mode} requires an outro clip")]
    MissingOutro { mode: PipelineMode },

    #[error("{path:?} does not exist")]
    MissingInput { path: PathBuf },

    #[error("output directory {path:?} is not a directory")]
    BadOutputDir { path: PathBuf },

    #[error("temp directory {path:?} is not a directory")]
    BadTempDir { path: PathBuf },

    #[error("an empty prefix would write outputs over their sources")]
    EmptyPrefix,

    #[error("neither an intro nor an outro was given")]
    NoClips,

    #[error("unknown mode {0:?}, expected intro, outro or both")]
    UnknownMode(String),

    #[error("nothing is queued")]
    EmptyQueue,

    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },

    #[error("unable to read settings from {path:?}: {msg}")]
    Settings { path: PathBuf, msg: String },
}

impl ConfigError {
    pub fn for_settings(path: &Path, msg: &str) -> Self {
        ConfigError::Settings {
            path: PathBuf::from(path),
            msg: String::from(msg),
        }
    }
}

/// Why a [`crate::batch_worker::BatchWorker::start`] call was refused.
#[derive(Debug, Error, PartialEq)]
pub enum StartError {
    #[error("a batch is already running")]
    AlreadyRunning,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Failure of a single external step.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StepError {
    #[error("unable to launch {program:?}: {msg}")]
    Launch { program: PathBuf, msg: String },

    #[error("{program:?} exited with {}{}", exit_code_str(.exit_code), tail_str(.last_lines))]
    Exit {
        program: PathBuf,
        exit_code: Option<i32>,
        last_lines: Vec<String>,
    },

    #[error("invalid command: {0}")]
    Command(#[from] CommandError),
}

impl StepError {
    pub fn launch(program: &Path, msg: &str) -> Self {
        StepError::Launch {
            program: PathBuf::from(program),
            msg: String::from(msg),
        }
    }
}

fn exit_code_str(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("code {}", code),
        None => String::from("no exit code (killed by signal)"),
    }
}

fn tail_str(lines: &[String]) -> String {
    match lines.last() {
        None => String::new(),
        Some(last) => format!(": {}", last),
    }
}

/// Rejections from [`crate::command::FFmpegCommand::build`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommandError {
    #[error("no inputs")]
    NoInputs,

    #[error("no output")]
    NoOutput,

    #[error("filter graph expects {expected} inputs but {actual} were given")]
    InputCount { expected: usize, actual: usize },

    #[error("output {0:?} is also an input")]
    OutputIsInput(PathBuf),
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("unable to run ffprobe on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ffprobe rejected {path:?}")]
    Failed { path: PathBuf },

    #[error("unable to parse ffprobe output for {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path:?} has no video stream")]
    NoVideo { path: PathBuf },
}

/// Why a single job item failed. Caught at the item boundary.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("unable to create a workspace: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("{stage} failed: {source}")]
    Step {
        stage: &'static str,
        #[source]
        source: StepError,
    },
}

impl ItemError {
    pub fn step(stage: &'static str, source: StepError) -> Self {
        ItemError::Step { stage, source }
    }
}

/// A temp path that could not be removed. Logged, never propagated.
#[derive(Debug, Error)]
#[error("unable to remove {path:?}: {source}")]
pub struct CleanupWarning {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}
