use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::command::CommandSpec;
use crate::error::StepError;
use crate::events::LogSink;

/// How many trailing output lines a failed step keeps for diagnostics.
pub const TAIL_LINES: usize = 20;

/// Runs one external step to completion.
pub trait StepRunner: Send + Sync {
    fn run(&self, command: &CommandSpec) -> Result<(), StepError>;
}

/// Runs steps as child processes, forwarding every output line to the log
/// sink at debug severity.
pub struct ProcessStepRunner {
    log: LogSink,
    tail_len: usize,
}

impl ProcessStepRunner {
    pub fn new(log: LogSink) -> Self {
        ProcessStepRunner {
            log,
            tail_len: TAIL_LINES,
        }
    }
}

impl StepRunner for ProcessStepRunner {
    fn run(&self, command: &CommandSpec) -> Result<(), StepError> {
        debug!("running {}", command);
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| StepError::launch(&command.program, &err.to_string()))?;

        let (tx, rx) = mpsc::channel();
        let readers: Vec<JoinHandle<()>> = [
            child.stdout.take().map(|s| forward_lines(s, tx.clone())),
            child.stderr.take().map(|s| forward_lines(s, tx.clone())),
        ].into_iter().flatten().collect();
        drop(tx);

        let mut tail: VecDeque<String> = VecDeque::with_capacity(self.tail_len);
        for line in rx {
            self.log.debug(line.as_str());
            if tail.len() == self.tail_len {
                tail.pop_front();
            }
            tail.push_back(line);
        }
        for reader in readers {
            let _ = reader.join();
        }

        let status = child.wait()
            .map_err(|err| StepError::launch(&command.program, &format!("error waiting for process: {}", err)))?;
        match status.success() {
            true => Ok(()),
            false => Err(StepError::Exit {
                program: command.program.clone(),
                exit_code: status.code(),
                last_lines: tail.into(),
            }),
        }
    }
}

fn forward_lines<R: Read + Send + 'static>(stream: R, tx: Sender<String>) -> JoinHandle<()> {
    thread::spawn(move || {
        for chunk in BufReader::new(stream).split(b'\n') {
            let Ok(bytes) = chunk else { break };
            let line = String::from_utf8_lossy(&bytes).trim_end_matches('\r').to_string();
            if tx.send(line).is_err() {
                break;
            }
        }
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use crate::events::{channels, Severity};

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh", vec![OsString::from("-c"), OsString::from(script)])
    }

    #[test]
    fn test_success_forwards_both_streams() {
        let (sink, stream) = channels();
        let runner = ProcessStepRunner::new(sink.log.clone());
        runner.run(&sh("echo out; echo err 1>&2")).unwrap();

        let logs = stream.drain_logs();
        let mut texts: Vec<&str> = logs.iter().map(|l| l.text.as_str()).collect();
        texts.sort();
        assert_eq!(texts, vec!["err", "out"]);
        assert!(logs.iter().all(|l| l.severity == Severity::Debug));
    }

    #[test]
    fn test_nonzero_exit_keeps_tail() {
        let runner = ProcessStepRunner::new(LogSink::discard());
        let err = runner.run(&sh("for i in $(seq 1 30); do echo $i; done; exit 3")).unwrap_err();
        match err {
            StepError::Exit { exit_code, last_lines, .. } => {
                assert_eq!(exit_code, Some(3));
                assert_eq!(last_lines.len(), TAIL_LINES);
                assert_eq!(last_lines.first().map(String::as_str), Some("11"));
                assert_eq!(last_lines.last().map(String::as_str), Some("30"));
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_program_is_launch_error() {
        let runner = ProcessStepRunner::new(LogSink::discard());
        let err = runner.run(&CommandSpec::new("/definitely/not/a/real/ffmpeg", vec![])).unwrap_err();
        assert!(matches!(err, StepError::Launch { .. }));
    }
}
