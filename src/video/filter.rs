use std::f64::consts::PI;

use crate::config;
use crate::raster::ops::crop_margin;
use crate::sampler::ParameterVector;

/// Output geometry shared by every variant of one source: the probed size
/// rounded down to even, as yuv420p requires.
pub fn target_geometry(width: u32, height: u32) -> (u32, u32) {
    ((width & !1).max(2), (height & !1).max(2))
}

/// Builds the `-vf` chain for one variant, in fixed order:
/// eq, rotate, crop, hflip, then a final scale back to the source geometry.
#[derive(Debug, Clone)]
pub struct FilterChain {
    width: u32,
    height: u32,
    filters: Vec<String>,
}

impl FilterChain {
    /// `width`/`height` are the probed dimensions of the source, captured
    /// before any rotation.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            filters: Vec::new(),
        }
    }

    pub fn for_variant(width: u32, height: u32, params: &ParameterVector, flip: bool) -> Self {
        let mut chain = Self::new(width, height);
        if params.contrast.is_some() || params.brightness.is_some() {
            chain.eq(
                1.0 + params.contrast.unwrap_or(0.0),
                params.brightness.unwrap_or(0.0),
            );
        }
        if let Some(degrees) = params.rotation {
            chain.rotate(degrees);
        }
        if let Some(fraction) = params.crop {
            chain.crop(fraction);
        }
        if flip {
            chain.hflip();
        }
        chain
    }

    /// Combined contrast factor and additive brightness.
    pub fn eq(&mut self, contrast: f64, brightness: f64) -> &mut Self {
        let limit = config::EQ_BRIGHTNESS_LIMIT;
        let brightness = brightness.clamp(-limit, limit);
        self.filters
            .push(format!("eq=contrast={contrast:.6}:brightness={brightness:.6}"));
        self
    }

    /// Rotate by `degrees`; the output keeps the input canvas and the exposed
    /// corners are painted black.
    pub fn rotate(&mut self, degrees: f64) -> &mut Self {
        let radians = degrees * PI / 180.0;
        self.filters
            .push(format!("rotate={radians:.6}:ow=iw:oh=ih:c=black"));
        self
    }

    /// Trim `fraction` of the original width/height from each edge.
    pub fn crop(&mut self, fraction: f64) -> &mut Self {
        let dx = crop_margin(self.width, fraction);
        let dy = crop_margin(self.height, fraction);
        self.filters.push(format!(
            "crop={}:{}:{}:{}",
            self.width - 2 * dx,
            self.height - 2 * dy,
            dx,
            dy
        ));
        self
    }

    pub fn hflip(&mut self) -> &mut Self {
        self.filters.push("hflip".to_string());
        self
    }

    /// The finished chain, always ending in a rescale to [`target_geometry`].
    pub fn build(&self) -> String {
        let (w, h) = target_geometry(self.width, self.height);
        let mut parts = self.filters.clone();
        parts.push(format!("scale={w}:{h}"));
        parts.push("setsar=1".to_string());
        parts.join(",")
    }
}
