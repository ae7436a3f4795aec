use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::debug;

/// Locations of the ffmpeg and ffprobe executables.
#[derive(Clone, Debug)]
pub struct FFmpeg {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for FFmpeg {
    fn default() -> Self {
        FFmpeg::new("ffmpeg", "ffprobe")
    }
}

impl FFmpeg {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        FFmpeg {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    pub fn is_installed(&self) -> bool {
        runs(&self.ffmpeg) && runs(&self.ffprobe)
    }
}

fn runs(program: &PathBuf) -> bool {
    let cmd = Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match cmd {
        Ok(status) => status.success(),
        Err(err) => {
            debug!("unable to run {:?}: {}", program, err);
            false
        },
    }
}
