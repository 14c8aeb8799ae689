use std::io::Write;
use std::path::Path;

use indicatif::ProgressBar;
use log::info;
use rand::rngs::StdRng;
use tempfile::{NamedTempFile, TempDir};

use super::publish::{DirectoryPublisher, Publisher};
use super::{
    batch_rng, check_distinct_basenames, progress_bar, BatchReport, ItemReport, ProcessError,
    VariantRecord,
};
use crate::config::{BatchRequest, MediaspinConfig, VIDEO_EXTENSION};
use crate::integrity;
use crate::sampler::{flip_coin, ParameterSampler};
use crate::source::{variant_name, SourceItem};
use crate::uniqueness::UniquenessGuard;
use crate::video::encoder::EncoderError;
use crate::video::filter::target_geometry;
use crate::video::{self, probe};

/// Generate `request.batch_size` re-encoded variants of every video and write
/// each one to both `out_dir` and `history_dir`.
pub fn process_videos(
    items: &[SourceItem],
    request: &BatchRequest,
    out_dir: &Path,
    history_dir: &Path,
    cfg: &MediaspinConfig,
) -> Result<BatchReport, ProcessError> {
    let publisher = DirectoryPublisher::new([out_dir, history_dir])?;
    process_videos_with(items, request, &publisher, cfg)
}

/// Like [`process_videos`], publishing through any [`Publisher`].
///
/// Each upload is written to a temporary file and each variant is encoded
/// into a per-item staging directory; both are removed when the item is done,
/// whether it succeeded or not. Variants are published only once the whole
/// item encoded.
pub fn process_videos_with<P: Publisher + ?Sized>(
    items: &[SourceItem],
    request: &BatchRequest,
    publisher: &P,
    cfg: &MediaspinConfig,
) -> Result<BatchReport, ProcessError> {
    check_distinct_basenames(items)?;
    let mut rng = batch_rng(cfg);
    let sampler = ParameterSampler::new(cfg.bounds);
    let progress = progress_bar(
        cfg,
        items.len() as u64 * request.batch_size as u64,
        "variants",
    );

    let mut report = BatchReport::default();
    for item in items {
        info!(
            "processing video {} ({} variants, intensity {})",
            item.filename(),
            request.batch_size,
            request.intensity
        );
        let upload = stage_upload(item)?;
        let staging = tempfile::tempdir().map_err(|e| ProcessError::io(std::env::temp_dir(), e))?;
        let staged = render_item(
            item,
            upload.path(),
            &staging,
            request,
            &sampler,
            &mut rng,
            cfg,
            &progress,
        )?;

        let mut variants = Vec::with_capacity(staged.len());
        for mut record in staged {
            let rendered = staging.path().join(&record.file_name);
            record.published = publisher.publish_file(&record.file_name, &rendered)?;
            variants.push(record);
        }
        report.items.push(ItemReport {
            source: item.filename().to_string(),
            variants,
        });
    }

    progress.finish_and_clear();
    Ok(report)
}

/// Copy the upload to a temp file that keeps its extension, for ffmpeg to read.
fn stage_upload(item: &SourceItem) -> Result<NamedTempFile, ProcessError> {
    let mut file = tempfile::Builder::new()
        .prefix("mediaspin-upload-")
        .suffix(&item.dotted_extension())
        .tempfile()
        .map_err(|e| ProcessError::io(std::env::temp_dir(), e))?;
    file.write_all(item.data())
        .and_then(|_| file.flush())
        .map_err(|e| ProcessError::io(file.path(), e))?;
    Ok(file)
}

#[allow(clippy::too_many_arguments)]
fn render_item(
    item: &SourceItem,
    input: &Path,
    staging: &TempDir,
    request: &BatchRequest,
    sampler: &ParameterSampler,
    rng: &mut StdRng,
    cfg: &MediaspinConfig,
    progress: &ProgressBar,
) -> Result<Vec<VariantRecord>, ProcessError> {
    let source = probe::probe(input).map_err(|e| ProcessError::Decode {
        file: item.filename().to_string(),
        detail: e.to_string(),
    })?;
    info!(
        "{}: {}x{} (rotation {}), audio {:?}",
        item.filename(),
        source.width,
        source.height,
        source.rotation,
        source.audio_codecs
    );

    let (width, height) = target_geometry(source.width, source.height);
    let basename = item.basename();
    let mut guard = UniquenessGuard::new(cfg.min_distance, cfg.max_attempts);
    let mut staged = Vec::with_capacity(request.batch_size as usize);

    for index in 1..=request.batch_size {
        let accepted = guard.draw(|| sampler.sample(rng, &request.effects, request.intensity));
        let flipped = flip_coin(rng, &request.effects, cfg.flip_probability);

        let file_name = variant_name(&basename, index, VIDEO_EXTENSION);
        let output = staging.path().join(&file_name);
        video::render_variant(input, &output, &source, &accepted.vector, flipped, cfg)
            .map_err(|e| encoder_failure(item, e))?;

        let sha256 = integrity::sha256_file_hex(&output).map_err(|e| ProcessError::io(&output, e))?;
        info!(
            "{} -> {} ({:?}, flip={})",
            item.filename(),
            file_name,
            accepted.vector,
            flipped
        );

        staged.push(VariantRecord {
            index,
            file_name,
            params: accepted.vector,
            flipped,
            attempts: accepted.attempts,
            fell_back: accepted.fell_back,
            width,
            height,
            sha256,
            published: Vec::new(),
        });
        progress.inc(1);
    }

    Ok(staged)
}

fn encoder_failure(item: &SourceItem, err: EncoderError) -> ProcessError {
    let file = item.filename().to_string();
    match err {
        EncoderError::TimedOut(after) => ProcessError::Timeout { file, after },
        EncoderError::Failed { status, detail } => ProcessError::Encode { file, status, detail },
        other @ (EncoderError::Spawn(_) | EncoderError::Wait(_)) => ProcessError::Encode {
            file,
            status: "not run".to_string(),
            detail: other.to_string(),
        },
    }
}
