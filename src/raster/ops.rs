use image::{DynamicImage, RgbImage, RgbaImage};
use rayon::prelude::*;

use crate::config::FillPolicy;

/// Interleaved 8-bit samples plus channel count, for RGB8 and RGBA8 images.
///
/// Anything else is converted by [`normalize`] before it reaches these ops.
fn samples_mut(img: &mut DynamicImage) -> Option<(&mut [u8], usize)> {
    match img {
        DynamicImage::ImageRgb8(buf) => Some((&mut **buf, 3)),
        DynamicImage::ImageRgba8(buf) => Some((&mut **buf, 4)),
        _ => None,
    }
}

/// Convert to RGBA8 if the image carries alpha, RGB8 otherwise.
pub fn normalize(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => img,
        other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

fn to_u8(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Rounded mean of the ITU-R 601 luma over all pixels.
fn mean_luma(samples: &[u8], channels: usize) -> f64 {
    let pixels = samples.len() / channels;
    if pixels == 0 {
        return 0.0;
    }
    let sum: u64 = samples
        .par_chunks_exact(channels)
        .map(|px| (px[0] as u64 * 299 + px[1] as u64 * 587 + px[2] as u64 * 114) / 1000)
        .sum();
    (sum as f64 / pixels as f64).round()
}

/// Scale colour channels around the mean luma by `factor`. Alpha is untouched.
pub fn adjust_contrast(img: &mut DynamicImage, factor: f64) {
    let Some((samples, channels)) = samples_mut(img) else {
        return;
    };
    let mean = mean_luma(samples, channels);
    samples.par_chunks_exact_mut(channels).for_each(|px| {
        for c in &mut px[..3] {
            *c = to_u8(mean + factor * (*c as f64 - mean));
        }
    });
}

/// Scale colour channels by `factor`. Alpha is untouched.
pub fn adjust_brightness(img: &mut DynamicImage, factor: f64) {
    let Some((samples, channels)) = samples_mut(img) else {
        return;
    };
    samples.par_chunks_exact_mut(channels).for_each(|px| {
        for c in &mut px[..3] {
            *c = to_u8(*c as f64 * factor);
        }
    });
}

// Trim float noise before ceil so exact right angles don't grow by a pixel.
fn ceil_clean(v: f64) -> u32 {
    ((v * 1e6).round() / 1e6).ceil().max(1.0) as u32
}

/// Canvas size needed to hold a `width`x`height` image rotated by `degrees`.
pub fn expanded_size(width: u32, height: u32, degrees: f64) -> (u32, u32) {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let (w, h) = (width as f64, height as f64);
    (
        ceil_clean(w * cos.abs() + h * sin.abs()),
        ceil_clean(w * sin.abs() + h * cos.abs()),
    )
}

/// Rotate counter-clockwise by `degrees` about the centre, growing the canvas
/// so no corner is clipped.
///
/// Sources with alpha get transparent corners. Opaque sources follow `fill`.
pub fn rotate_expand(img: &DynamicImage, degrees: f64, fill: FillPolicy) -> DynamicImage {
    if degrees == 0.0 {
        return img.clone();
    }

    let (width, height) = (img.width(), img.height());
    let (out_w, out_h) = expanded_size(width, height, degrees);

    match (img, fill) {
        (DynamicImage::ImageRgb8(src), FillPolicy::Matte(rgb)) => {
            let data = rotate_samples(src, width, height, 3, degrees, &rgb, out_w, out_h);
            RgbImage::from_raw(out_w, out_h, data)
                .map(DynamicImage::ImageRgb8)
                .unwrap_or_else(|| img.clone())
        }
        _ => {
            let src = img.to_rgba8();
            let data = rotate_samples(&src, width, height, 4, degrees, &[0; 4], out_w, out_h);
            RgbaImage::from_raw(out_w, out_h, data)
                .map(DynamicImage::ImageRgba8)
                .unwrap_or_else(|| img.clone())
        }
    }
}

/// Bilinear inverse-mapped rotation. Four-channel input is interpolated with
/// premultiplied alpha, so colour never bleeds in from transparent fill.
#[allow(clippy::too_many_arguments)]
fn rotate_samples(
    src: &[u8],
    width: u32,
    height: u32,
    channels: usize,
    degrees: f64,
    fill: &[u8],
    out_w: u32,
    out_h: u32,
) -> Vec<u8> {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let (src_cx, src_cy) = (width as f64 / 2.0, height as f64 / 2.0);
    let (dst_cx, dst_cy) = (out_w as f64 / 2.0, out_h as f64 / 2.0);
    let row_len = out_w as usize * channels;
    let premultiplied = channels == 4;

    let fetch = |x: i64, y: i64| -> [f64; 4] {
        let px = if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
            fill
        } else {
            let at = (y as usize * width as usize + x as usize) * channels;
            &src[at..at + channels]
        };
        let mut v = [0.0; 4];
        for (dst, &c) in v.iter_mut().zip(px) {
            *dst = c as f64;
        }
        if premultiplied {
            let alpha = v[3] / 255.0;
            for c in &mut v[..3] {
                *c *= alpha;
            }
        }
        v
    };

    let mut out = vec![0u8; row_len * out_h as usize];
    out.par_chunks_exact_mut(row_len)
        .enumerate()
        .for_each(|(y, row)| {
            let dy = y as f64 + 0.5 - dst_cy;
            for x in 0..out_w as usize {
                let dx = x as f64 + 0.5 - dst_cx;
                // Inverse of the on-screen counter-clockwise turn (y axis points down).
                let sx = src_cx + dx * cos - dy * sin - 0.5;
                let sy = src_cy + dx * sin + dy * cos - 0.5;

                let (x0, y0) = (sx.floor(), sy.floor());
                let (fx, fy) = (sx - x0, sy - y0);
                let (x0, y0) = (x0 as i64, y0 as i64);

                let corners = [
                    (fetch(x0, y0), (1.0 - fx) * (1.0 - fy)),
                    (fetch(x0 + 1, y0), fx * (1.0 - fy)),
                    (fetch(x0, y0 + 1), (1.0 - fx) * fy),
                    (fetch(x0 + 1, y0 + 1), fx * fy),
                ];
                let mut v = [0.0; 4];
                for (px, weight) in corners {
                    for (acc, c) in v.iter_mut().zip(px) {
                        *acc += c * weight;
                    }
                }
                if premultiplied && v[3] > 0.0 {
                    let scale = 255.0 / v[3];
                    for c in &mut v[..3] {
                        *c *= scale;
                    }
                }

                let px = &mut row[x * channels..(x + 1) * channels];
                for (out_c, c) in px.iter_mut().zip(v) {
                    *out_c = to_u8(c);
                }
            }
        });
    out
}

/// Border in pixels removed from each side for a given fraction, never
/// leaving less than one pixel.
pub fn crop_margin(extent: u32, fraction: f64) -> u32 {
    let margin = (extent as f64 * fraction.max(0.0)).floor() as u32;
    margin.min(extent.saturating_sub(1) / 2)
}

/// Remove `fraction` of the width from left and right and of the height from
/// top and bottom. The canvas shrinks; nothing is rescaled.
pub fn crop_border(img: &DynamicImage, fraction: f64) -> DynamicImage {
    let (w, h) = (img.width(), img.height());
    let dx = crop_margin(w, fraction);
    let dy = crop_margin(h, fraction);
    img.crop_imm(dx, dy, w - 2 * dx, h - 2 * dy)
}
