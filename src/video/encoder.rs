use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};
use thiserror::Error;

use crate::config::{MediaspinConfig, MP4_COPYABLE_AUDIO};
use crate::video::probe::last_line;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("failed to spawn ffmpeg (is it installed?): {0}")]
    Spawn(#[source] std::io::Error),
    #[error("failed waiting on ffmpeg: {0}")]
    Wait(#[source] std::io::Error),
    #[error("ffmpeg exited with {status}: {detail}")]
    Failed { status: String, detail: String },
    #[error("ffmpeg did not finish within {0:?}")]
    TimedOut(Duration),
}

/// One ffmpeg invocation: source file, filter chain, and destination.
#[derive(Debug, Clone)]
pub struct EncodeJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub filter: String,
    /// Probed codec of every source audio stream; empty for silent sources.
    pub audio_codecs: Vec<String>,
}

impl EncodeJob {
    /// Audio codec to pass to `-c:a`, or `None` when the source is silent.
    ///
    /// A configured `copy` falls back to `cfg.audio_fallback_codec` when any
    /// source stream is something the mp4 muxer rejects.
    pub fn audio_codec<'a>(&self, cfg: &'a MediaspinConfig) -> Option<&'a str> {
        if self.audio_codecs.is_empty() {
            return None;
        }
        let copyable = self
            .audio_codecs
            .iter()
            .all(|c| MP4_COPYABLE_AUDIO.contains(&c.to_ascii_lowercase().as_str()));
        if cfg.audio_codec == "copy" && !copyable {
            Some(cfg.audio_fallback_codec.as_str())
        } else {
            Some(cfg.audio_codec.as_str())
        }
    }

    /// Full argument list for the ffmpeg CLI.
    pub fn args(&self, cfg: &MediaspinConfig) -> Vec<String> {
        let mut args: Vec<String> = ["-y", "-hide_banner", "-loglevel", "error", "-nostdin", "-i"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.push(self.input.display().to_string());
        args.extend(["-map", "0:v:0", "-vf"].map(String::from));
        args.push(self.filter.clone());
        args.extend([
            "-c:v".to_string(),
            cfg.video_codec.clone(),
            "-pix_fmt".to_string(),
            cfg.pixel_format.clone(),
        ]);
        match self.audio_codec(cfg) {
            Some(codec) => args.extend([
                "-map".to_string(),
                "0:a".to_string(),
                "-c:a".to_string(),
                codec.to_string(),
            ]),
            None => args.push("-an".to_string()),
        }
        args.push(self.output.display().to_string());
        args
    }
}

/// Kills and reaps the child if it is still running when dropped.
struct ChildGuard(Child);

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Ok(None) = self.0.try_wait() {
            let _ = self.0.kill();
            let _ = self.0.wait();
        }
    }
}

/// Run one encode to completion, or until `cfg.encode_timeout` expires.
pub fn run(job: &EncodeJob, cfg: &MediaspinConfig) -> Result<(), EncoderError> {
    let args = job.args(cfg);
    debug!("ffmpeg {}", args.join(" "));

    let child = Command::new("ffmpeg")
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(EncoderError::Spawn)?;
    let mut child = ChildGuard(child);

    // Drain stderr on its own thread so a chatty encoder can't fill the pipe and stall.
    let stderr_reader = child.0.stderr.take().map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    });

    let status = wait_with_deadline(&mut child.0, cfg.encode_timeout)?;
    let stderr = stderr_reader
        .and_then(|h| h.join().ok())
        .unwrap_or_default();

    let Some(status) = status else {
        return Err(EncoderError::TimedOut(cfg.encode_timeout.unwrap_or_default()));
    };

    if !status.success() {
        return Err(EncoderError::Failed {
            status: status.to_string(),
            detail: diagnostic(&stderr),
        });
    }

    info!("encoded {}", job.output.display());
    Ok(())
}

/// Last stderr line, decoded lossily since ffmpeg echoes paths byte-for-byte.
fn diagnostic(stderr: &[u8]) -> String {
    last_line(&String::from_utf8_lossy(stderr)).to_string()
}

/// `Ok(None)` means the deadline passed with the child still running.
fn wait_with_deadline(
    child: &mut Child,
    timeout: Option<Duration>,
) -> Result<Option<ExitStatus>, EncoderError> {
    let Some(timeout) = timeout else {
        return child.wait().map(Some).map_err(EncoderError::Wait);
    };

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().map_err(EncoderError::Wait)? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

pub fn is_ffmpeg_on_path() -> bool {
    ["ffmpeg", "ffprobe"].iter().all(|bin| {
        Command::new(bin)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    })
}
