use std::path::Path;

use indicatif::ProgressBar;
use log::info;
use rand::rngs::StdRng;

use super::publish::{DirectoryPublisher, Publisher};
use super::{
    batch_rng, check_distinct_basenames, progress_bar, BatchReport, ItemReport, ProcessError,
    VariantRecord,
};
use crate::config::{BatchRequest, MediaspinConfig};
use crate::integrity;
use crate::raster;
use crate::sampler::{flip_coin, ParameterSampler};
use crate::source::{variant_name, SourceItem};
use crate::uniqueness::UniquenessGuard;

/// Generate `request.batch_size` variants of every image and write each one
/// to both `out_dir` and `history_dir`.
pub fn process_images(
    items: &[SourceItem],
    request: &BatchRequest,
    out_dir: &Path,
    history_dir: &Path,
    cfg: &MediaspinConfig,
) -> Result<BatchReport, ProcessError> {
    let publisher = DirectoryPublisher::new([out_dir, history_dir])?;
    process_images_with(items, request, &publisher, cfg)
}

/// Like [`process_images`], publishing through any [`Publisher`].
///
/// An item's variants are held in memory until all of them rendered, then
/// published together. A failure leaves earlier items published and nothing
/// of the failing item.
pub fn process_images_with<P: Publisher + ?Sized>(
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
            "processing image {} ({} variants, intensity {})",
            item.filename(),
            request.batch_size,
            request.intensity
        );
        let staged = render_item(item, request, &sampler, &mut rng, cfg, &progress)?;

        let mut variants = Vec::with_capacity(staged.len());
        for (mut record, bytes) in staged {
            record.published = publisher.publish_bytes(&record.file_name, &bytes)?;
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

fn render_item(
    item: &SourceItem,
    request: &BatchRequest,
    sampler: &ParameterSampler,
    rng: &mut StdRng,
    cfg: &MediaspinConfig,
    progress: &ProgressBar,
) -> Result<Vec<(VariantRecord, Vec<u8>)>, ProcessError> {
    let source = raster::decode(item.data()).map_err(|e| ProcessError::Decode {
        file: item.filename().to_string(),
        detail: e.to_string(),
    })?;
    let basename = item.basename();
    let mut guard = UniquenessGuard::new(cfg.min_distance, cfg.max_attempts);
    let mut staged = Vec::with_capacity(request.batch_size as usize);

    for index in 1..=request.batch_size {
        let accepted = guard.draw(|| sampler.sample(rng, &request.effects, request.intensity));
        let flipped = flip_coin(rng, &request.effects, cfg.flip_probability);

        let rendered = raster::render(&source, &accepted.vector, flipped, cfg.fill);
        let encoded = raster::encode(&rendered, cfg.jpeg_quality).map_err(|e| ProcessError::Encode {
            file: item.filename().to_string(),
            status: "image encoder".to_string(),
            detail: e.to_string(),
        })?;

        let file_name = variant_name(&basename, index, encoded.format.extension());
        info!(
            "{} -> {} ({}x{}, {:?}, flip={})",
            item.filename(),
            file_name,
            encoded.width,
            encoded.height,
            accepted.vector,
            flipped
        );

        staged.push((
            VariantRecord {
                index,
                file_name,
                params: accepted.vector,
                flipped,
                attempts: accepted.attempts,
                fell_back: accepted.fell_back,
                width: encoded.width,
                height: encoded.height,
                sha256: integrity::sha256_hex(&encoded.bytes),
                published: Vec::new(),
            },
            encoded.bytes,
        ));
        progress.inc(1);
    }

    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EffectSelection;
    use crate::uniqueness::distance;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
    use crate::pipeline::publish::PublishError;
    use std::fs;
    use std::io::{self, Cursor};
    use std::path::PathBuf;

    fn encoded(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), format).unwrap();
        out
    }

    fn photo(name: &str) -> SourceItem {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(120, 80, |x, y| {
            Rgb([(x * 2) as u8, (y * 3) as u8, ((x + y) % 256) as u8])
        }));
        SourceItem::new(name, encoded(&img, ImageFormat::Png))
    }

    fn seeded() -> MediaspinConfig {
        MediaspinConfig {
            seed: Some(1234),
            ..Default::default()
        }
    }

    #[test]
    fn test_crop_batch_shrinks_and_stays_distinct() {
        let root = tempfile::tempdir().unwrap();
        let (out, history) = (root.path().join("out"), root.path().join("history"));
        let request = BatchRequest {
            batch_size: 3,
            intensity: 50,
            effects: EffectSelection {
                crop: true,
                ..Default::default()
            },
        };

        let report = process_images(&[photo("cat.png")], &request, &out, &history, &seeded()).unwrap();
        let variants = &report.items[0].variants;
        assert_eq!(variants.len(), 3);

        for (i, v) in variants.iter().enumerate() {
            assert_eq!(v.index, i as u32 + 1);
            assert_eq!(v.file_name, format!("cat_variant_{}.jpg", i + 1));
            assert!(v.width < 120 && v.height < 80);

            let a = fs::read(out.join(&v.file_name)).unwrap();
            let b = fs::read(history.join(&v.file_name)).unwrap();
            assert_eq!(a, b);
            assert_eq!(integrity::sha256_hex(&a), v.sha256);

            if !v.fell_back {
                for prev in &variants[..i] {
                    assert!(distance(&v.params, &prev.params) > 0.07);
                }
            } else {
                assert_eq!(v.attempts, 50);
            }
        }
    }

    #[test]
    fn test_no_effects_round_trips_lossless_source() {
        let root = tempfile::tempdir().unwrap();
        let src = DynamicImage::ImageRgba8(RgbaImage::from_fn(16, 16, |x, y| {
            Rgba([x as u8 * 10, y as u8 * 10, 99, 128])
        }));
        let item = SourceItem::new("logo.png", encoded(&src, ImageFormat::Png));
        let request = BatchRequest {
            batch_size: 2,
            intensity: 100,
            effects: EffectSelection::default(),
        };

        let report = process_images(
            &[item],
            &request,
            &root.path().join("o"),
            &root.path().join("h"),
            &seeded(),
        )
        .unwrap();

        for v in &report.items[0].variants {
            assert!(v.file_name.ends_with(".png"));
            assert!(!v.flipped);
            assert!(!v.fell_back);
            let bytes = fs::read(&v.published[0]).unwrap();
            assert_eq!(raster::decode(&bytes).unwrap(), src);
        }
    }

    #[test]
    fn test_decode_failure_names_file_and_keeps_earlier_items() {
        let root = tempfile::tempdir().unwrap();
        let (out, history) = (root.path().join("out"), root.path().join("history"));
        let items = [photo("good.png"), SourceItem::new("broken.jpg", b"nope".to_vec())];
        let request = BatchRequest {
            batch_size: 2,
            intensity: 30,
            effects: EffectSelection::all(),
        };

        let err = process_images(&items, &request, &out, &history, &seeded()).unwrap_err();
        assert!(matches!(err, ProcessError::Decode { .. }));
        assert_eq!(err.file(), Some("broken.jpg"));

        let mut published: Vec<String> = fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        published.sort();
        assert_eq!(published.len(), 2);
        assert!(published.iter().all(|n| n.starts_with("good_variant_")));
    }

    #[test]
    fn test_same_stem_in_one_batch_is_rejected_before_publishing() {
        let root = tempfile::tempdir().unwrap();
        let (out, history) = (root.path().join("out"), root.path().join("history"));
        let red = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([255, 0, 0])));
        let blue = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([0, 0, 255])));
        let items = [
            SourceItem::new("photo.png", encoded(&red, ImageFormat::Png)),
            SourceItem::new("photo.bmp", encoded(&blue, ImageFormat::Bmp)),
        ];
        let request = BatchRequest {
            batch_size: 1,
            ..Default::default()
        };

        let err = process_images(&items, &request, &out, &history, &seeded()).unwrap_err();
        assert!(matches!(err, ProcessError::DuplicateName { .. }));
        assert_eq!(err.file(), Some("photo.bmp"));
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    }

    struct ReadOnlyShelf(PathBuf);

    impl Publisher for ReadOnlyShelf {
        fn publish_bytes(&self, name: &str, _bytes: &[u8]) -> Result<Vec<PathBuf>, PublishError> {
            Err(PublishError::new(
                self.0.join(name),
                io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
            ))
        }
    }

    #[test]
    fn test_publish_failure_reports_destination_path() {
        let shelf = ReadOnlyShelf(PathBuf::from("/srv/history"));
        let request = BatchRequest {
            batch_size: 1,
            ..Default::default()
        };

        let err =
            process_images_with(&[photo("cat.png")], &request, &shelf, &seeded()).unwrap_err();
        match err {
            ProcessError::Io { path, source } => {
                assert_eq!(path, PathBuf::from("/srv/history/cat_variant_1.jpg"));
                assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
            }
            other => panic!("expected an io failure, got {other}"),
        }
    }

    #[test]
    fn test_seed_makes_batches_reproducible() {
        let request = BatchRequest {
            batch_size: 4,
            intensity: 80,
            effects: EffectSelection::all(),
        };
        let run = || {
            let root = tempfile::tempdir().unwrap();
            let publisher = DirectoryPublisher::new([root.path()]).unwrap();
            process_images_with(&[photo("dog.png")], &request, &publisher, &seeded())
                .unwrap()
                .items[0]
                .variants
                .iter()
                .map(|v| v.sha256.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
