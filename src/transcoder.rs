use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::command::{FFmpegCommand, Filter};
use crate::error::StepError;
use crate::geometry::GeometrySpec;
use crate::step_runner::StepRunner;

/// Turns normalize/concatenate requests into ffmpeg invocations and hands
/// them to a [`StepRunner`].
#[derive(Clone)]
pub struct Transcoder {
    ffmpeg: PathBuf,
    runner: Arc<dyn StepRunner>,
}

impl Transcoder {
    pub fn new(ffmpeg: impl Into<PathBuf>, runner: Arc<dyn StepRunner>) -> Self {
        Transcoder {
            ffmpeg: ffmpeg.into(),
            runner,
        }
    }

    /// Re-encodes `input` to the target size and framerate.
    pub fn normalize(&self, input: &Path, output: &Path, geometry: &GeometrySpec) -> Result<(), StepError> {
        let command = FFmpegCommand::new(&self.ffmpeg)
            .input(input)
            .filter(Filter::Scale { width: geometry.width, height: geometry.height })
            .video_codec(geometry.encoder.cv_parameter())
            .frame_rate(geometry.framerate)
            .audio_codec("aac")
            .output(output)
            .build()?;
        self.runner.run(&command)
    }

    /// Joins `inputs`, in order, into `output`.
    pub fn concatenate(&self, inputs: &[PathBuf], output: &Path, geometry: &GeometrySpec) -> Result<(), StepError> {
        let command = FFmpegCommand::new(&self.ffmpeg)
            .inputs(inputs)
            .filter(Filter::Concat { segments: inputs.len() })
            .video_codec(geometry.encoder.cv_parameter())
            .video_bitrate(geometry.bitrate_kbps)
            .frame_rate(geometry.framerate)
            .audio_codec("aac")
            .output(output)
            .build()?;
        self.runner.run(&command)
    }
}
