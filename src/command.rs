//! Typed ffmpeg command lines.
//!
//! Arguments are always laid out as: global flags, inputs, filter graph and
//! stream maps, output flags, output path. [`FFmpegCommand::build`] refuses
//! commands whose pieces don't agree with each other.

use std::ffi::OsString;
use std::fmt::Display;
use std::path::{self, Path, PathBuf};

use crate::error::CommandError;

/// A fully-formed external invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>, args: Vec<OsString>) -> Self {
        CommandSpec {
            program: program.into(),
            args,
        }
    }

    /// The last argument, which for ffmpeg is the output file.
    pub fn output(&self) -> Option<&Path> {
        self.args.last().map(Path::new)
    }
}

impl Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {:?}", arg)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    /// Scale to an exact size with square pixels.
    Scale { width: u32, height: u32 },
    /// Join `segments` inputs, video and audio, into `[outv]` and `[outa]`.
    Concat { segments: usize },
}

impl Filter {
    fn expected_inputs(&self) -> Option<usize> {
        match self {
            Filter::Scale { .. } => Some(1),
            Filter::Concat { segments } => Some(*segments),
        }
    }

    fn args(&self) -> Vec<OsString> {
        match self {
            Filter::Scale { width, height } => vec![
                OsString::from("-vf"),
                OsString::from(format!("scale={}:{},setsar=1", width, height)),
            ],
            Filter::Concat { segments } => {
                let mut graph: String = (0..*segments)
                    .map(|i| format!("[{i}:v][{i}:a]"))
                    .collect();
                graph.push_str(&format!("concat=n={}:v=1:a=1[outv][outa]", segments));
                vec![
                    OsString::from("-filter_complex"), OsString::from(graph),
                    OsString::from("-map"), OsString::from("[outv]"),
                    OsString::from("-map"), OsString::from("[outa]"),
                ]
            },
        }
    }
}

#[derive(Clone, Debug)]
pub struct FFmpegCommand {
    program: PathBuf,
    inputs: Vec<PathBuf>,
    filter: Option<Filter>,
    output_args: Vec<OsString>,
    output: Option<PathBuf>,
}

impl FFmpegCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        FFmpegCommand {
            program: program.into(),
            inputs: vec![],
            filter: None,
            output_args: vec![],
            output: None,
        }
    }

    pub fn input(mut self, path: impl AsRef<Path>) -> Self {
        self.inputs.push(PathBuf::from(path.as_ref()));
        self
    }

    pub fn inputs<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.inputs.extend(paths.into_iter().map(|p| PathBuf::from(p.as_ref())));
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn output_arg(mut self, arg: impl Into<OsString>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    pub fn video_codec(self, codec: &str) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    pub fn video_bitrate(self, kbps: u32) -> Self {
        self.output_arg("-b:v").output_arg(format!("{}k", kbps))
    }

    pub fn frame_rate(self, fps: u32) -> Self {
        self.output_arg("-r").output_arg(fps.to_string())
    }

    pub fn audio_codec(self, codec: &str) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    pub fn output(mut self, path: impl AsRef<Path>) -> Self {
        self.output = Some(PathBuf::from(path.as_ref()));
        self
    }

    pub fn build(self) -> Result<CommandSpec, CommandError> {
        if self.inputs.is_empty() {
            return Err(CommandError::NoInputs);
        }
        let output = self.output.ok_or(CommandError::NoOutput)?;
        if let Some(expected) = self.filter.as_ref().and_then(Filter::expected_inputs) {
            if expected != self.inputs.len() {
                return Err(CommandError::InputCount {
                    expected,
                    actual: self.inputs.len(),
                });
            }
        }
        let target = resolved(&output);
        if self.inputs.iter().any(|input| resolved(input) == target) {
            return Err(CommandError::OutputIsInput(output));
        }

        let mut args = vec![
            OsString::from("-hide_banner"),
            OsString::from("-nostdin"),
            OsString::from("-loglevel"), OsString::from("warning"),
            OsString::from("-y"),
        ];
        for input in &self.inputs {
            args.push(OsString::from("-i"));
            args.push(input.clone().into_os_string());
        }
        if let Some(filter) = &self.filter {
            args.append(&mut filter.args());
        }
        args.extend(self.output_args);
        args.push(output.into_os_string());

        Ok(CommandSpec::new(self.program, args))
    }
}

/// `path` made absolute against the working directory, so `./a.mp4` and
/// `/videos/a.mp4` compare equal when run from `/videos`.
fn resolved(path: &Path) -> PathBuf {
    path::absolute(path).unwrap_or_else(|_| PathBuf::from(path))
}
