pub mod images;
pub mod publish;
pub mod videos;

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;

use crate::config::MediaspinConfig;
use crate::sampler::ParameterVector;
use crate::source::SourceItem;
use publish::PublishError;

/// A batch failure. Every variant except `Io` names the source file that caused it.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("could not decode '{file}': {detail}")]
    Decode { file: String, detail: String },
    #[error("encoding '{file}' failed ({status}): {detail}")]
    Encode {
        file: String,
        status: String,
        detail: String,
    },
    #[error("encoding '{file}' timed out after {after:?}")]
    Timeout { file: String, after: Duration },
    #[error("'{file}' and '{earlier}' would both publish as '{basename}_variant_*'")]
    DuplicateName {
        file: String,
        earlier: String,
        basename: String,
    },
    #[error("filesystem error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ProcessError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ProcessError::Io {
            path: path.into(),
            source,
        }
    }

    /// Source file the failure is attributed to, if any.
    pub fn file(&self) -> Option<&str> {
        match self {
            ProcessError::Decode { file, .. }
            | ProcessError::Encode { file, .. }
            | ProcessError::Timeout { file, .. }
            | ProcessError::DuplicateName { file, .. } => Some(file),
            ProcessError::Io { .. } => None,
        }
    }
}

impl From<PublishError> for ProcessError {
    fn from(e: PublishError) -> Self {
        ProcessError::Io {
            path: e.path,
            source: e.source,
        }
    }
}

/// Fail before rendering anything if two items share an output basename.
///
/// Names are compared case-insensitively so the check also holds on
/// case-folding filesystems.
pub(crate) fn check_distinct_basenames(items: &[SourceItem]) -> Result<(), ProcessError> {
    let mut seen: HashMap<String, &str> = HashMap::with_capacity(items.len());
    for item in items {
        let basename = item.basename();
        if let Some(earlier) = seen.insert(basename.to_lowercase(), item.filename()) {
            return Err(ProcessError::DuplicateName {
                file: item.filename().to_string(),
                earlier: earlier.to_string(),
                basename,
            });
        }
    }
    Ok(())
}

/// What was produced for one variant.
#[derive(Debug, Clone)]
pub struct VariantRecord {
    /// 1-based position within the item's batch.
    pub index: u32,
    pub file_name: String,
    pub params: ParameterVector,
    pub flipped: bool,
    /// Candidates drawn by the uniqueness search.
    pub attempts: u32,
    /// The uniqueness search hit its cap and kept the last candidate.
    pub fell_back: bool,
    pub width: u32,
    pub height: u32,
    pub sha256: String,
    pub published: Vec<PathBuf>,
}

/// All variants generated for one source item.
#[derive(Debug, Clone)]
pub struct ItemReport {
    pub source: String,
    pub variants: Vec<VariantRecord>,
}

impl ItemReport {
    pub fn fell_back(&self) -> usize {
        self.variants.iter().filter(|v| v.fell_back).count()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub items: Vec<ItemReport>,
}

impl BatchReport {
    pub fn variant_count(&self) -> usize {
        self.items.iter().map(|i| i.variants.len()).sum()
    }
}

pub(crate) fn batch_rng(cfg: &MediaspinConfig) -> StdRng {
    match cfg.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

pub(crate) fn progress_bar(cfg: &MediaspinConfig, total: u64, unit: &str) -> ProgressBar {
    if !cfg.show_progress {
        return ProgressBar::hidden();
    }
    let progress = ProgressBar::new(total);
    let template =
        format!("[{{elapsed_precise}}] {{bar:40.cyan/blue}} {{pos}}/{{len}} {unit} ({{eta}})");
    if let Ok(style) = ProgressStyle::default_bar().template(&template) {
        progress.set_style(style.progress_chars("##-"));
    }
    progress
}
