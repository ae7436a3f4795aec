use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Video encoder handed to ffmpeg via `-c:v`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoder {
    #[default]
    Libx264,
    Nvenc,
    Amf,
    Qsv,
}

impl Encoder {
    /// Maps a hardware-acceleration tag to an encoder. Anything unrecognized
    /// (or no tag at all) falls back to software encoding.
    pub fn from_gpu_tag(tag: Option<&str>) -> Self {
        match tag.map(|t| t.trim().to_lowercase()).as_deref() {
            Some("nvidia" | "nvenc" | "cuda") => Encoder::Nvenc,
            Some("amd" | "amf") => Encoder::Amf,
            Some("intel" | "qsv") => Encoder::Qsv,
            _ => Encoder::Libx264,
        }
    }

    pub fn cv_parameter(&self) -> &'static str {
        match self {
            Encoder::Libx264 => "libx264",
            Encoder::Nvenc => "h264_nvenc",
            Encoder::Amf => "h264_amf",
            Encoder::Qsv => "h264_qsv",
        }
    }
}

impl Display for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.cv_parameter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_gpu_tag() {
        assert_eq!(Encoder::from_gpu_tag(Some("nvidia")), Encoder::Nvenc);
        assert_eq!(Encoder::from_gpu_tag(Some("AMD")), Encoder::Amf);
        assert_eq!(Encoder::from_gpu_tag(Some(" intel ")), Encoder::Qsv);
        assert_eq!(Encoder::from_gpu_tag(Some("integrated")), Encoder::Libx264);
        assert_eq!(Encoder::from_gpu_tag(None), Encoder::Libx264);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Encoder::Libx264), "libx264");
        assert_eq!(format!("{}", Encoder::Nvenc), "h264_nvenc");
        assert_eq!(format!("{}", Encoder::Amf), "h264_amf");
        assert_eq!(format!("{}", Encoder::Qsv), "h264_qsv");
    }
}
