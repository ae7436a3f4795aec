use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::encoder::Encoder;

pub const DEFAULT_FRAMERATE: u32 = 25;
pub const DEFAULT_BITRATE_KBPS: u32 = 1100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Resolves a named resolution. Unknown names resolve to 1080p.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag.map(|t| t.trim().to_lowercase()).as_deref() {
            Some("720p" | "hd") => Resolution { width: 1280, height: 720 },
            Some("4k" | "uhd" | "2160p") => Resolution { width: 3840, height: 2160 },
            _ => Resolution { width: 1920, height: 1080 },
        }
    }

    pub fn rotated(self) -> Self {
        Resolution {
            width: self.height,
            height: self.width,
        }
    }
}

impl Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Orientation {
    #[default]
    Landscape,
    Portrait,
}

impl Orientation {
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag.map(|t| t.trim().to_lowercase()).as_deref() {
            Some("portrait" | "vertical") => Orientation::Portrait,
            _ => Orientation::Landscape,
        }
    }
}

/// Raw user choices, before they are resolved into a [`GeometrySpec`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometrySelection {
    pub resolution: Option<String>,
    pub orientation: Option<String>,
    pub gpu: Option<String>,
    pub framerate: Option<u32>,
    pub bitrate_kbps: Option<u32>,
}

/// Concrete encode parameters shared by every step of a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeometrySpec {
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    pub bitrate_kbps: u32,
    pub encoder: Encoder,
}

impl GeometrySpec {
    pub fn resolution(&self) -> Resolution {
        Resolution {
            width: self.width,
            height: self.height,
        }
    }
}

impl Display for GeometrySpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} @ {}fps, {}k, {}",
            self.resolution(),
            self.framerate,
            self.bitrate_kbps,
            self.encoder)
    }
}

pub fn plan(selection: &GeometrySelection) -> GeometrySpec {
    let resolution = match Orientation::from_tag(selection.orientation.as_deref()) {
        Orientation::Landscape => Resolution::from_tag(selection.resolution.as_deref()),
        Orientation::Portrait => Resolution::from_tag(selection.resolution.as_deref()).rotated(),
    };

    GeometrySpec {
        width: resolution.width,
        height: resolution.height,
        framerate: selection.framerate.unwrap_or(DEFAULT_FRAMERATE),
        bitrate_kbps: selection.bitrate_kbps.unwrap_or(DEFAULT_BITRATE_KBPS),
        encoder: Encoder::from_gpu_tag(selection.gpu.as_deref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection(resolution: &str, orientation: &str, gpu: Option<&str>) -> GeometrySelection {
        GeometrySelection {
            resolution: Some(String::from(resolution)),
            orientation: Some(String::from(orientation)),
            gpu: gpu.map(String::from),
            framerate: Some(30),
            bitrate_kbps: Some(5000),
        }
    }

    #[test]
    fn test_plan_landscape() {
        assert_eq!(plan(&selection("1080p", "landscape", None)), GeometrySpec {
            width: 1920,
            height: 1080,
            framerate: 30,
            bitrate_kbps: 5000,
            encoder: Encoder::Libx264,
        });
        assert_eq!(plan(&selection("720p", "landscape", None)).resolution(), Resolution { width: 1280, height: 720 });
        assert_eq!(plan(&selection("4K", "landscape", None)).resolution(), Resolution { width: 3840, height: 2160 });
    }

    #[test]
    fn test_plan_portrait_swaps() {
        let spec = plan(&selection("720p", "portrait", Some("nvidia")));
        assert_eq!((spec.width, spec.height), (720, 1280));
        assert_eq!(spec.encoder, Encoder::Nvenc);
    }

    #[test]
    fn test_plan_defaults() {
        let spec = plan(&GeometrySelection::default());
        assert_eq!(spec.resolution(), Resolution { width: 1920, height: 1080 });
        assert_eq!(spec.framerate, DEFAULT_FRAMERATE);
        assert_eq!(spec.bitrate_kbps, DEFAULT_BITRATE_KBPS);
        assert_eq!(spec.encoder, Encoder::Libx264);
    }

    #[test]
    fn test_unknown_tags_fall_back() {
        let spec = plan(&selection("8k", "diagonal", Some("voodoo")));
        assert_eq!(spec.resolution(), Resolution { width: 1920, height: 1080 });
        assert_eq!(spec.encoder, Encoder::Libx264);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Resolution { width: 1920, height: 1080 }), "1920x1080");
        assert_eq!(format!("{}", plan(&selection("1080p", "landscape", None))), "1920x1080 @ 30fps, 5000k, libx264");
    }
}
