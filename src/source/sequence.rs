use super::{FrameSource, SourceKind};
use crate::error::{Result, SourceError, VidwatchError};
use crate::frame::Frame;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "tif", "tiff", "webp"];

/// Whether a path looks like a still image the `image` crate can decode
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// File source backed by a directory of still images (or a single image)
///
/// Images are decoded lazily in lexicographic filename order.
pub struct ImageSequenceSource {
    root: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
    next_id: u64,
}

impl ImageSequenceSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let root = path.as_ref().to_path_buf();

        let files = if root.is_dir() {
            let mut files = std::fs::read_dir(&root)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_image_path(p))
                .collect::<Vec<_>>();
            files.sort();
            files
        } else if root.is_file() && is_image_path(&root) {
            vec![root.clone()]
        } else {
            Vec::new()
        };

        if files.is_empty() {
            return Err(VidwatchError::source_unavailable(format!(
                "no readable images at {}",
                root.display()
            )));
        }

        info!(
            "Opened image sequence {} ({} frames)",
            root.display(),
            files.len()
        );

        Ok(Self {
            root,
            files,
            cursor: 0,
            next_id: 0,
        })
    }

    /// Number of frames in one pass over the sequence
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn kind(&self) -> SourceKind {
        SourceKind::File
    }

    /// Read the next decodable image; images that fail to decode are skipped
    fn read(&mut self) -> std::result::Result<Frame, SourceError> {
        while let Some(path) = self.files.get(self.cursor) {
            let position = self.cursor as u64;
            self.cursor += 1;

            let image = match image::open(path) {
                Ok(image) => image.to_rgb8(),
                Err(e) => {
                    warn!("Skipping undecodable image {}: {}", path.display(), e);
                    continue;
                }
            };

            let frame = Frame::new(self.next_id, position, image);
            trace!("Read image {} as frame {}", path.display(), frame.id);
            self.next_id += 1;
            return Ok(frame);
        }

        Err(SourceError::EndOfStream)
    }

    fn seek_to_start(&mut self) -> std::result::Result<(), SourceError> {
        debug!("Rewinding image sequence {}", self.root.display());
        self.cursor = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.files.clear();
        self.cursor = 0;
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}
