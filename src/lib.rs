pub mod config;
mod integrity;
pub mod pipeline;
pub mod raster;
pub mod sampler;
pub mod source;
pub mod uniqueness;
pub mod video;

pub use config::{BatchRequest, EffectBounds, EffectSelection, FillPolicy, MediaspinConfig};
pub use pipeline::images::{process_images, process_images_with};
pub use pipeline::publish::{DirectoryPublisher, PublishError, Publisher};
pub use pipeline::videos::{process_videos, process_videos_with};
pub use pipeline::{BatchReport, ItemReport, ProcessError, VariantRecord};
pub use source::{MediaKind, SourceItem};
