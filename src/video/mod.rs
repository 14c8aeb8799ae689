pub mod encoder;
pub mod filter;
pub mod probe;

use std::path::Path;

use log::debug;

use crate::config::MediaspinConfig;
use crate::sampler::ParameterVector;
use encoder::{EncodeJob, EncoderError};
use filter::FilterChain;
use probe::VideoProbe;

/// Render one variant of `input` into `output`.
///
/// Only the video stream is filtered. Audio, when present, is stream-copied
/// when mp4 accepts it and losslessly re-encoded otherwise, untouched by any effect.
pub fn render_variant(
    input: &Path,
    output: &Path,
    source: &VideoProbe,
    params: &ParameterVector,
    flip: bool,
    cfg: &MediaspinConfig,
) -> Result<(), EncoderError> {
    let filter = FilterChain::for_variant(source.width, source.height, params, flip).build();
    debug!("filter chain for {}: {}", output.display(), filter);

    let job = EncodeJob {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        filter,
        audio_codecs: source.audio_codecs.clone(),
    };
    encoder::run(&job, cfg)
}
