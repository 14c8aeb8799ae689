use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "tiff", "tif", "webp"];
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "mov", "avi", "wmv", "flv", "webm", "m4v", "ts", "mpg", "mpeg",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Guess the kind from a filename extension, case-insensitively.
    pub fn infer(filename: &str) -> Option<Self> {
        let ext = Path::new(filename)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }
}

/// One uploaded media file: its original name and its bytes.
#[derive(Debug, Clone)]
pub struct SourceItem {
    filename: String,
    data: Vec<u8>,
}

impl SourceItem {
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            data,
        }
    }

    /// Read a whole stream into memory under the given upload name.
    pub fn from_reader<R: Read>(filename: impl Into<String>, reader: R) -> io::Result<Self> {
        let mut data = Vec::new();
        BufReader::new(reader).read_to_end(&mut data)?;
        Ok(Self::new(filename, data))
    }

    pub fn from_path(path: &Path) -> io::Result<Self> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_reader(filename, File::open(path)?)
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::infer(&self.filename)
    }

    /// File stem of the last path component; directory parts of an upload name are dropped.
    pub fn basename(&self) -> String {
        let last = self
            .filename
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.filename);
        match Path::new(last).file_stem().and_then(|s| s.to_str()) {
            Some(stem) if !stem.is_empty() => stem.to_string(),
            _ => "upload".to_string(),
        }
    }

    /// The extension of the upload name including its dot, or empty.
    pub fn dotted_extension(&self) -> String {
        Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default()
    }
}

/// `{basename}_variant_{index}.{extension}`, with `index` starting at 1.
pub fn variant_name(basename: &str, index: u32, extension: &str) -> String {
    format!("{basename}_variant_{index}.{extension}")
}
