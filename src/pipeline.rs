use std::env;
use std::ffi::OsString;
use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CleanupWarning, ConfigError, ItemError, StepError};
use crate::events::LogSink;
use crate::geometry::GeometrySpec;
use crate::probe::{ConformancePolicy, Prober};
use crate::transcoder::Transcoder;
use crate::workspace::TempWorkspace;

pub const DEFAULT_PREFIX: &str = "processed_";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineMode {
    #[serde(rename = "intro")]
    IntroOnly,
    #[serde(rename = "outro")]
    OutroOnly,
    Both,
}

impl PipelineMode {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "intro" => Some(PipelineMode::IntroOnly),
            "outro" => Some(PipelineMode::OutroOnly),
            "both" => Some(PipelineMode::Both),
            _ => None,
        }
    }

    /// The mode implied by which clips were supplied.
    pub fn infer(has_intro: bool, has_outro: bool) -> Option<Self> {
        match (has_intro, has_outro) {
            (true, true) => Some(PipelineMode::Both),
            (true, false) => Some(PipelineMode::IntroOnly),
            (false, true) => Some(PipelineMode::OutroOnly),
            (false, false) => None,
        }
    }

    pub fn wants_intro(&self) -> bool {
        matches!(self, PipelineMode::IntroOnly | PipelineMode::Both)
    }

    pub fn wants_outro(&self) -> bool {
        matches!(self, PipelineMode::OutroOnly | PipelineMode::Both)
    }
}

impl Display for PipelineMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PipelineMode::IntroOnly => "intro",
            PipelineMode::OutroOnly => "outro",
            PipelineMode::Both => "both",
        };
        write!(f, "{}", s)
    }
}

/// Everything a run needs besides the queue itself. Fixed for the whole run.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchConfig {
    pub mode: PipelineMode,
    pub intro: Option<PathBuf>,
    pub outro: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub geometry: GeometrySpec,
    pub temp_dir: PathBuf,
    pub prefix: String,
    pub conformance: ConformancePolicy,
}

impl BatchConfig {
    pub fn new(mode: PipelineMode, output_dir: impl Into<PathBuf>, geometry: GeometrySpec) -> Self {
        BatchConfig {
            mode,
            intro: None,
            outro: None,
            output_dir: output_dir.into(),
            geometry,
            temp_dir: env::temp_dir(),
            prefix: String::from(DEFAULT_PREFIX),
            conformance: ConformancePolicy::default(),
        }
    }

    pub fn intro(mut self, intro: impl Into<PathBuf>) -> Self {
        self.intro = Some(intro.into());
        self
    }

    pub fn outro(mut self, outro: impl Into<PathBuf>) -> Self {
        self.outro = Some(outro.into());
        self
    }

    pub fn temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    pub fn prefix(mut self, prefix: &str) -> Self {
        self.prefix = String::from(prefix);
        self
    }

    pub fn conformance(mut self, conformance: ConformancePolicy) -> Self {
        self.conformance = conformance;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mode.wants_intro() {
            check_clip(self.intro.as_deref(), ConfigError::MissingIntro { mode: self.mode })?;
        }
        if self.mode.wants_outro() {
            check_clip(self.outro.as_deref(), ConfigError::MissingOutro { mode: self.mode })?;
        }
        if !self.output_dir.is_dir() {
            return Err(ConfigError::BadOutputDir { path: self.output_dir.clone() });
        }
        if !self.temp_dir.is_dir() {
            return Err(ConfigError::BadTempDir { path: self.temp_dir.clone() });
        }
        if self.prefix.is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }
        if self.geometry.framerate == 0 {
            return Err(ConfigError::Zero { name: "framerate" });
        }
        if self.geometry.bitrate_kbps == 0 {
            return Err(ConfigError::Zero { name: "bitrate" });
        }
        Ok(())
    }

    /// `<output_dir>/<prefix><basename>`. Existing files are overwritten.
    pub fn output_path(&self, source: &Path) -> PathBuf {
        let mut name = OsString::from(&self.prefix);
        name.push(source.file_name().unwrap_or(source.as_os_str()));
        self.output_dir.join(name)
    }
}

fn check_clip(clip: Option<&Path>, missing: ConfigError) -> Result<(), ConfigError> {
    match clip {
        None => Err(missing),
        Some(path) if !path.is_file() => Err(ConfigError::MissingInput { path: PathBuf::from(path) }),
        Some(_) => Ok(()),
    }
}

/// Ordered clips for one concatenation: intro, main, outro.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Segment {
    paths: Vec<PathBuf>,
}

impl Segment {
    pub fn push(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Intro,
    Main,
    Outro,
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::Intro => "intro",
            Stage::Main => "main",
            Stage::Outro => "outro",
        }
    }
}

/// Runs normalize → concatenate for one source.
pub struct ItemPipeline<'a> {
    pub config: &'a BatchConfig,
    pub transcoder: &'a Transcoder,
    pub prober: &'a dyn Prober,
    pub log: &'a LogSink,
}

impl ItemPipeline<'_> {
    pub fn process(&self, source: &Path) -> Result<PathBuf, ItemError> {
        let mut workspace = TempWorkspace::new(&self.config.temp_dir, self.log.clone())
            .map_err(ItemError::Workspace)?;
        let segment = self.assemble(source, &mut workspace)?;

        let output = self.config.output_path(source);
        if let Err(err) = self.transcoder.concatenate(segment.paths(), &output, &self.config.geometry) {
            // only a step that ran can have written to `output`
            if let StepError::Exit { .. } = err {
                self.discard_partial(&output);
            }
            return Err(ItemError::step("concatenation", err));
        }

        workspace.dispose();
        Ok(output)
    }

    /// A failed concatenation may leave a truncated output behind.
    fn discard_partial(&self, output: &Path) {
        match fs::remove_file(output) {
            Ok(()) => self.log.info(format!("removed partial output {:?}", output)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {},
            Err(source) => {
                let warning = CleanupWarning { path: PathBuf::from(output), source };
                warn!("{}", warning);
                self.log.warn(warning.to_string());
            },
        }
    }

    fn assemble(&self, source: &Path, workspace: &mut TempWorkspace) -> Result<Segment, ItemError> {
        let mut segment = Segment::default();
        let stages = [
            (Stage::Intro, self.config.mode.wants_intro(), self.config.intro.as_deref()),
            (Stage::Main, true, Some(source)),
            (Stage::Outro, self.config.mode.wants_outro(), self.config.outro.as_deref()),
        ];
        for (stage, wanted, input) in stages {
            if let (true, Some(input)) = (wanted, input) {
                segment.push(self.normalized(stage, input, workspace)?);
            }
        }
        Ok(segment)
    }

    /// The clip itself when it already conforms, otherwise a normalized copy
    /// inside the workspace.
    fn normalized(&self, stage: Stage, input: &Path, workspace: &mut TempWorkspace) -> Result<PathBuf, ItemError> {
        if self.conforms(input) {
            self.log.info(format!("{} {:?} already matches {}, reusing it", stage.name(), input, self.config.geometry.resolution()));
            return Ok(PathBuf::from(input));
        }

        let output = workspace.allocate(&format!("{}.mp4", stage.name()));
        self.log.info(format!("normalizing {} {:?}", stage.name(), input));
        self.transcoder
            .normalize(input, &output, &self.config.geometry)
            .map_err(|e| ItemError::step(stage.name(), e))?;
        Ok(output)
    }

    fn conforms(&self, input: &Path) -> bool {
        match self.prober.probe(input) {
            Ok(props) => self.config.conformance.conforms(&props, &self.config.geometry),
            Err(err) => {
                self.log.warn(format!("{}; normalizing anyway", err));
                false
            },
        }
    }
}
