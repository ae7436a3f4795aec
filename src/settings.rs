//! Batch settings, layered: defaults, then an optional JSON file, then
//! command-line flags.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::ffmpeg::FFmpeg;
use crate::geometry::{self, GeometrySelection};
use crate::pipeline::{BatchConfig, PipelineMode, DEFAULT_PREFIX};
use crate::probe::ConformancePolicy;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub intro: Option<PathBuf>,
    pub outro: Option<PathBuf>,
    pub mode: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub prefix: Option<String>,
    pub temp_dir: Option<PathBuf>,
    pub strict_framerate: Option<bool>,
    pub ffmpeg: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,
    #[serde(flatten)]
    pub geometry: GeometrySelection,
}

impl BatchSettings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)
            .map_err(|e| ConfigError::for_settings(path, &e.to_string()))?;
        serde_json::from_str(&text)
            .map_err(|e| ConfigError::for_settings(path, &e.to_string()))
    }

    /// Values set in `over` win.
    pub fn overlay(self, over: BatchSettings) -> Self {
        BatchSettings {
            intro: over.intro.or(self.intro),
            outro: over.outro.or(self.outro),
            mode: over.mode.or(self.mode),
            output_dir: over.output_dir.or(self.output_dir),
            prefix: over.prefix.or(self.prefix),
            temp_dir: over.temp_dir.or(self.temp_dir),
            strict_framerate: over.strict_framerate.or(self.strict_framerate),
            ffmpeg: over.ffmpeg.or(self.ffmpeg),
            ffprobe: over.ffprobe.or(self.ffprobe),
            geometry: GeometrySelection {
                resolution: over.geometry.resolution.or(self.geometry.resolution),
                orientation: over.geometry.orientation.or(self.geometry.orientation),
                gpu: over.geometry.gpu.or(self.geometry.gpu),
                framerate: over.geometry.framerate.or(self.geometry.framerate),
                bitrate_kbps: over.geometry.bitrate_kbps.or(self.geometry.bitrate_kbps),
            },
        }
    }

    pub fn tools(&self) -> FFmpeg {
        let defaults = FFmpeg::default();
        FFmpeg::new(
            self.ffmpeg.clone().unwrap_or(defaults.ffmpeg),
            self.ffprobe.clone().unwrap_or(defaults.ffprobe))
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Resolves the mode and geometry. Does not touch the filesystem; call
    /// [`BatchConfig::validate`] for that.
    pub fn to_config(&self) -> Result<BatchConfig, ConfigError> {
        let mode = match &self.mode {
            Some(tag) => PipelineMode::from_tag(tag).ok_or_else(|| ConfigError::UnknownMode(tag.clone()))?,
            None => PipelineMode::infer(self.intro.is_some(), self.outro.is_some()).ok_or(ConfigError::NoClips)?,
        };
        let conformance = match self.strict_framerate {
            Some(true) => ConformancePolicy::GeometryAndFramerate,
            _ => ConformancePolicy::Geometry,
        };

        let mut config = BatchConfig::new(mode, self.output_dir(), geometry::plan(&self.geometry))
            .prefix(self.prefix.as_deref().unwrap_or(DEFAULT_PREFIX))
            .temp_dir(self.temp_dir.clone().unwrap_or_else(env::temp_dir))
            .conformance(conformance);
        config.intro = self.intro.clone();
        config.outro = self.outro.clone();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Encoder;

    #[test]
    fn test_load_and_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{
            "outro": "/clips/outro.mp4",
            "resolution": "720p",
            "gpu": "intel",
            "bitrate_kbps": 2500,
            "prefix": "final_"
        }"#).unwrap();

        let file = BatchSettings::load(&path).unwrap();
        assert_eq!(file.geometry.bitrate_kbps, Some(2500));

        let cli = BatchSettings {
            intro: Some(PathBuf::from("/clips/intro.mp4")),
            geometry: GeometrySelection {
                resolution: Some(String::from("4k")),
                ..Default::default()
            },
            ..Default::default()
        };
        let merged = file.overlay(cli);
        let config = merged.to_config().unwrap();
        assert_eq!(config.mode, PipelineMode::Both);
        assert_eq!((config.geometry.width, config.geometry.height), (3840, 2160));
        assert_eq!(config.geometry.bitrate_kbps, 2500);
        assert_eq!(config.geometry.encoder, Encoder::Qsv);
        assert_eq!(config.prefix, "final_");
        assert_eq!(config.conformance, ConformancePolicy::Geometry);
    }

    #[test]
    fn test_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ nope").unwrap();
        assert!(matches!(BatchSettings::load(&path), Err(ConfigError::Settings { .. })));
        assert!(matches!(BatchSettings::load(&dir.path().join("missing.json")), Err(ConfigError::Settings { .. })));
    }

    #[test]
    fn test_mode_resolution() {
        let settings = BatchSettings::default();
        assert_eq!(settings.to_config(), Err(ConfigError::NoClips));

        let settings = BatchSettings { mode: Some(String::from("sideways")), ..Default::default() };
        assert_eq!(settings.to_config(), Err(ConfigError::UnknownMode(String::from("sideways"))));

        let settings = BatchSettings {
            mode: Some(String::from("intro")),
            outro: Some(PathBuf::from("o.mp4")),
            strict_framerate: Some(true),
            ..Default::default()
        };
        let config = settings.to_config().unwrap();
        assert_eq!(config.mode, PipelineMode::IntroOnly);
        assert_eq!(config.conformance, ConformancePolicy::GeometryAndFramerate);
        assert_eq!(config.output_dir, PathBuf::from("."));
    }
}
