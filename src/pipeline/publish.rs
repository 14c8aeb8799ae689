use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// A destination that could not be written, with the path that failed.
#[derive(Error, Debug)]
#[error("failed to publish {}: {source}", .path.display())]
pub struct PublishError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl PublishError {
    pub fn new(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

/// Where finished variants go.
///
/// The generator hands every variant to [`Publisher`] exactly once; fanning
/// out to several destinations is the publisher's business.
pub trait Publisher {
    /// Publish in-memory bytes under `name`. Returns every path written.
    fn publish_bytes(&self, name: &str, bytes: &[u8]) -> Result<Vec<PathBuf>, PublishError>;

    /// Publish an already-rendered file under `name`.
    fn publish_file(&self, name: &str, path: &Path) -> Result<Vec<PathBuf>, PublishError> {
        let bytes = fs::read(path).map_err(|e| PublishError::new(path, e))?;
        self.publish_bytes(name, &bytes)
    }
}

/// Writes each variant into every configured directory.
///
/// Each write lands in a `.partial` sibling first and is renamed into
/// place, so a reader never sees a half-written variant.
#[derive(Debug, Clone)]
pub struct DirectoryPublisher {
    dirs: Vec<PathBuf>,
}

impl DirectoryPublisher {
    /// Creates the directories if they do not exist.
    pub fn new<I, P>(dirs: I) -> Result<Self, PublishError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let dirs: Vec<PathBuf> = dirs.into_iter().map(Into::into).collect();
        for dir in &dirs {
            fs::create_dir_all(dir).map_err(|e| PublishError::new(dir, e))?;
        }
        Ok(Self { dirs })
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    fn commit<F>(&self, name: &str, mut write: F) -> Result<Vec<PathBuf>, PublishError>
    where
        F: FnMut(&Path) -> io::Result<()>,
    {
        let mut written = Vec::with_capacity(self.dirs.len());
        for dir in &self.dirs {
            let dest = dir.join(name);
            let partial = dir.join(format!(".{name}.partial"));
            if let Err(e) = write(&partial).and_then(|_| fs::rename(&partial, &dest)) {
                let _ = fs::remove_file(&partial);
                return Err(PublishError::new(dest, e));
            }
            written.push(dest);
        }
        Ok(written)
    }
}

impl Publisher for DirectoryPublisher {
    fn publish_bytes(&self, name: &str, bytes: &[u8]) -> Result<Vec<PathBuf>, PublishError> {
        self.commit(name, |path| fs::write(path, bytes))
    }

    fn publish_file(&self, name: &str, path: &Path) -> Result<Vec<PathBuf>, PublishError> {
        self.commit(name, |dest| fs::copy(path, dest).map(|_| ()))
    }
}
