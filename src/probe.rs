use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};

use crate::error::ProbeError;
use crate::geometry::{GeometrySpec, Resolution};

#[derive(Clone, Debug, PartialEq)]
pub struct VideoProperties {
    pub resolution: Resolution,
    pub sample_aspect_ratio: Option<String>,
    pub frame_rate: Option<u32>,
}

impl VideoProperties {
    pub fn has_square_pixels(&self) -> bool {
        match self.sample_aspect_ratio.as_deref() {
            None => true,
            Some(sar) => sar == "1:1" || sar == "1",
        }
    }
}

/// Whether framerate takes part in deciding that a source can be reused.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConformancePolicy {
    /// Size and pixel aspect only.
    #[default]
    Geometry,
    /// Size, pixel aspect and framerate.
    GeometryAndFramerate,
}

impl ConformancePolicy {
    pub fn conforms(&self, props: &VideoProperties, target: &GeometrySpec) -> bool {
        let geometry_ok = props.resolution == target.resolution() && props.has_square_pixels();
        match self {
            ConformancePolicy::Geometry => geometry_ok,
            ConformancePolicy::GeometryAndFramerate => geometry_ok && props.frame_rate == Some(target.framerate),
        }
    }
}

pub trait Prober: Send + Sync {
    fn probe(&self, path: &Path) -> Result<VideoProperties, ProbeError>;
}

pub struct FFprobe {
    program: PathBuf,
}

impl FFprobe {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        FFprobe { program: program.into() }
    }
}

#[derive(Serialize, Deserialize, Debug)]
struct FFProbeJsonOutput {
    #[serde(default)]
    pub streams: Vec<FFProbeJsonStream>,
}

#[derive(Serialize, Deserialize, Debug)]
struct FFProbeJsonStream {
    pub width: u32,
    pub height: u32,
    pub sample_aspect_ratio: Option<String>,
    pub avg_frame_rate: Option<String>,
}

impl Prober for FFprobe {
    fn probe(&self, path: &Path) -> Result<VideoProperties, ProbeError> {
        let output = Command::new(&self.program)
            .args(["-v", "error", "-of", "json", "-show_streams", "-select_streams", "v:0"])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ProbeError::Io { path: PathBuf::from(path), source })?;
        if !output.status.success() {
            return Err(ProbeError::Failed { path: PathBuf::from(path) });
        }
        parse_probe_output(path, &output.stdout)
    }
}

fn parse_probe_output(path: &Path, json: &[u8]) -> Result<VideoProperties, ProbeError> {
    let deserialized = serde_json::from_slice::<FFProbeJsonOutput>(json)
        .map_err(|source| ProbeError::Parse { path: PathBuf::from(path), source })?;
    let stream = deserialized.streams.into_iter().next()
        .ok_or_else(|| ProbeError::NoVideo { path: PathBuf::from(path) })?;
    Ok(VideoProperties {
        resolution: Resolution {
            width: stream.width,
            height: stream.height,
        },
        frame_rate: stream.avg_frame_rate.as_deref().and_then(parse_frame_rate),
        sample_aspect_ratio: stream.sample_aspect_ratio,
    })
}

/// Parses ffprobe's `num/denom` rate, rounded to whole frames.
fn parse_frame_rate(rate: &str) -> Option<u32> {
    let (num, denom) = rate.split_once('/')?;
    let num = num.parse::<f64>().ok()?;
    let denom = denom.parse::<f64>().ok()?;
    if denom == 0.0 {
        return None;
    }
    Some((num / denom).round() as u32)
}
