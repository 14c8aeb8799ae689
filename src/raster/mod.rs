pub mod ops;

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageError, ImageFormat};

use crate::config::FillPolicy;
use crate::sampler::ParameterVector;

/// Output container chosen for one rendered image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Lossless, keeps transparency.
    Png,
    /// Lossy, opaque RGB.
    Jpeg,
}

impl OutputFormat {
    /// PNG when the image carries an alpha channel, JPEG otherwise.
    pub fn for_image(img: &DynamicImage) -> Self {
        if img.color().has_alpha() {
            OutputFormat::Png
        } else {
            OutputFormat::Jpeg
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }
}

/// An encoded variant ready to be published.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

/// Decode source bytes into RGB8, or RGBA8 when the source has alpha.
pub fn decode(data: &[u8]) -> Result<DynamicImage, ImageError> {
    image::load_from_memory(data).map(ops::normalize)
}

/// Apply the enabled effects of one variant in fixed order:
/// contrast, brightness, rotation, crop, flip.
pub fn render(
    source: &DynamicImage,
    params: &ParameterVector,
    flip: bool,
    fill: FillPolicy,
) -> DynamicImage {
    let mut img = source.clone();

    if let Some(delta) = params.contrast {
        ops::adjust_contrast(&mut img, 1.0 + delta);
    }
    if let Some(delta) = params.brightness {
        ops::adjust_brightness(&mut img, 1.0 + delta);
    }
    if let Some(degrees) = params.rotation {
        img = ops::rotate_expand(&img, degrees, fill);
    }
    if let Some(fraction) = params.crop {
        img = ops::crop_border(&img, fraction);
    }
    if flip {
        img = img.fliph();
    }

    img
}

/// Encode a rendered variant, picking the container from its channel layout.
pub fn encode(img: &DynamicImage, jpeg_quality: u8) -> Result<EncodedImage, ImageError> {
    let format = OutputFormat::for_image(img);
    let mut bytes = Vec::new();

    match format {
        OutputFormat::Png => {
            img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        }
        OutputFormat::Jpeg => {
            let rgb = img.to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut bytes, jpeg_quality.clamp(1, 100));
            encoder.encode_image(&rgb)?;
        }
    }

    Ok(EncodedImage {
        bytes,
        format,
        width: img.width(),
        height: img.height(),
    })
}
