use std::time::Duration;

// Uniqueness search
pub const DEFAULT_MIN_DISTANCE: f64 = 0.07;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 50;

// Rounding applied to each slot before distances are measured
pub const CONTRAST_DECIMALS: i32 = 3;
pub const BRIGHTNESS_DECIMALS: i32 = 3;
pub const ROTATION_DECIMALS: i32 = 2;
pub const CROP_DECIMALS: i32 = 3;

// Request defaults
pub const DEFAULT_BATCH_SIZE: u32 = 5;
pub const DEFAULT_INTENSITY: i32 = 30;
pub const DEFAULT_FLIP_PROBABILITY: f64 = 0.5;

// Image output
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

// Video output
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";
pub const DEFAULT_AUDIO_CODEC: &str = "copy";
// Lossless, and accepted by the mp4 muxer for any decodable source audio
pub const DEFAULT_AUDIO_FALLBACK_CODEC: &str = "alac";
// Audio codecs the mp4 muxer takes as a stream copy
pub const MP4_COPYABLE_AUDIO: &[&str] = &["aac", "mp3", "ac3", "eac3", "opus", "flac", "alac"];
pub const DEFAULT_ENCODE_TIMEOUT_SECS: u64 = 600;
pub const VIDEO_EXTENSION: &str = "mp4";

// ffmpeg's eq filter rejects brightness outside [-1, 1]
pub const EQ_BRIGHTNESS_LIMIT: f64 = 1.0;

/// Closed interval of a sampled magnitude before intensity scaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

/// Per-effect sampling ranges.
///
/// The pair chosen for each effect decides how dramatic a variant can get at
/// intensity 100. [`EffectBounds::default`] is the dramatic table;
/// [`EffectBounds::subtle`] keeps variants close to the source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectBounds {
    /// Contrast delta, applied as a factor of `1 + delta`.
    pub contrast: Bounds,
    /// Brightness delta. Multiplicative (`1 + delta`) for images, additive for video.
    pub brightness: Bounds,
    /// Rotation in degrees, counter-clockwise.
    pub rotation: Bounds,
    /// Fraction of width/height trimmed from each edge.
    pub crop: Bounds,
}

impl Default for EffectBounds {
    fn default() -> Self {
        Self {
            contrast: Bounds::new(-4.0, 4.0),
            brightness: Bounds::new(-2.0, 2.0),
            rotation: Bounds::new(-25.0, 25.0),
            crop: Bounds::new(0.10, 0.35),
        }
    }
}

impl EffectBounds {
    pub fn subtle() -> Self {
        Self {
            contrast: Bounds::new(-0.1, 0.1),
            brightness: Bounds::new(-0.1, 0.1),
            rotation: Bounds::new(-5.0, 5.0),
            crop: Bounds::new(0.01, 0.05),
        }
    }
}

/// Which effects a batch request turns on. Constant for every variant of the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EffectSelection {
    pub contrast: bool,
    pub brightness: bool,
    pub rotation: bool,
    pub crop: bool,
    pub flip: bool,
}

impl EffectSelection {
    pub fn all() -> Self {
        Self {
            contrast: true,
            brightness: true,
            rotation: true,
            crop: true,
            flip: true,
        }
    }

    /// True if at least one effect contributes a slot to the parameter vector.
    pub fn has_magnitudes(&self) -> bool {
        self.contrast || self.brightness || self.rotation || self.crop
    }
}

/// How the corners exposed by an expanding rotation are painted.
///
/// Sources with an alpha channel always receive transparent corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPolicy {
    /// Paint opaque sources with a solid RGB colour.
    Matte([u8; 3]),
    /// Promote opaque sources to RGBA and leave the corners transparent.
    Transparent,
}

impl Default for FillPolicy {
    fn default() -> Self {
        FillPolicy::Matte([0, 0, 0])
    }
}

/// One batch request as submitted by a caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchRequest {
    pub batch_size: u32,
    pub intensity: i32,
    pub effects: EffectSelection,
}

impl Default for BatchRequest {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            intensity: DEFAULT_INTENSITY,
            effects: EffectSelection::default(),
        }
    }
}

/// Runtime configuration for the variant generator.
#[derive(Debug, Clone)]
pub struct MediaspinConfig {
    pub bounds: EffectBounds,
    pub min_distance: f64,
    pub max_attempts: u32,
    pub flip_probability: f64,
    pub fill: FillPolicy,
    pub jpeg_quality: u8,
    pub video_codec: String,
    pub pixel_format: String,
    /// `copy` passes audio through when the output container accepts it.
    pub audio_codec: String,
    /// Used instead of a stream copy the output container would reject.
    pub audio_fallback_codec: String,
    /// `None` waits for the encoder indefinitely.
    pub encode_timeout: Option<Duration>,
    /// Fixed seed for reproducible batches.
    pub seed: Option<u64>,
    pub show_progress: bool,
}

impl Default for MediaspinConfig {
    fn default() -> Self {
        Self {
            bounds: EffectBounds::default(),
            min_distance: DEFAULT_MIN_DISTANCE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            flip_probability: DEFAULT_FLIP_PROBABILITY,
            fill: FillPolicy::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            video_codec: DEFAULT_VIDEO_CODEC.to_string(),
            pixel_format: DEFAULT_PIXEL_FORMAT.to_string(),
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_fallback_codec: DEFAULT_AUDIO_FALLBACK_CODEC.to_string(),
            encode_timeout: Some(Duration::from_secs(DEFAULT_ENCODE_TIMEOUT_SECS)),
            seed: None,
            show_progress: false,
        }
    }
}

/// Round `value` to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
