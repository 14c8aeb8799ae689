use std::path::Path;
use std::process::{Command, Stdio};

use log::debug;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("failed to run ffprobe (is ffmpeg installed?): {0}")]
    Spawn(#[from] std::io::Error),
    #[error("ffprobe exited with {status}: {detail}")]
    Failed { status: String, detail: String },
    #[error("unreadable ffprobe output: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no video stream found")]
    NoVideoStream,
    #[error("video stream reports invalid geometry {0}")]
    BadGeometry(String),
}

/// Stream layout of a source video.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoProbe {
    /// Display width, after any container rotation is applied.
    pub width: u32,
    /// Display height, after any container rotation is applied.
    pub height: u32,
    /// Container rotation in degrees, normalized to `0..360`.
    pub rotation: u32,
    /// Codec name of every audio stream, in stream order.
    pub audio_codecs: Vec<String>,
    /// Container duration in seconds, when ffprobe reports one.
    pub duration: Option<f64>,
}

impl VideoProbe {
    pub fn has_audio(&self) -> bool {
        !self.audio_codecs.is_empty()
    }

    pub fn audio_streams(&self) -> usize {
        self.audio_codecs.len()
    }
}

#[derive(Deserialize)]
struct ProbeOut {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    side_data_list: Vec<SideData>,
    tags: Option<StreamTags>,
}

#[derive(Deserialize)]
struct SideData {
    rotation: Option<f64>,
}

#[derive(Deserialize)]
struct StreamTags {
    rotate: Option<String>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

impl ProbeStream {
    // Display-matrix side data wins over the legacy `rotate` tag.
    fn rotation(&self) -> u32 {
        let degrees = self
            .side_data_list
            .iter()
            .find_map(|sd| sd.rotation)
            .or_else(|| {
                self.tags
                    .as_ref()
                    .and_then(|t| t.rotate.as_deref())
                    .and_then(|r| r.trim().parse::<f64>().ok())
            })
            .unwrap_or(0.0);
        (degrees.round() as i64).rem_euclid(360) as u32
    }
}

/// Probe `path` for its first video stream geometry and its audio streams.
pub fn probe(path: &Path) -> Result<VideoProbe, ProbeError> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProbeError::Failed {
            status: output.status.to_string(),
            detail: last_line(&stderr).to_string(),
        });
    }

    debug!(
        "ffprobe {}: {} bytes of json",
        path.display(),
        output.stdout.len()
    );
    parse_json(&output.stdout)
}

/// Parse `ffprobe -print_format json -show_streams -show_format` output.
///
/// Sources carrying a quarter-turn rotation report their geometry swapped,
/// matching the frames ffmpeg hands to the filter graph after autorotation.
pub fn parse_json(data: &[u8]) -> Result<VideoProbe, ProbeError> {
    let parsed: ProbeOut = serde_json::from_slice(data)?;

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or(ProbeError::NoVideoStream)?;
    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        (w, h) => return Err(ProbeError::BadGeometry(format!("{w:?}x{h:?}"))),
    };
    let rotation = video.rotation();
    let (width, height) = if rotation % 180 == 90 {
        (height, width)
    } else {
        (width, height)
    };

    let audio_codecs = parsed
        .streams
        .iter()
        .filter(|s| s.codec_type.as_deref() == Some("audio"))
        .map(|s| s.codec_name.clone().unwrap_or_default())
        .collect();
    let duration = parsed
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok());

    Ok(VideoProbe {
        width,
        height,
        rotation,
        audio_codecs,
        duration,
    })
}

/// Last non-empty line of a diagnostic stream.
pub fn last_line(text: &str) -> &str {
    text.lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
}
