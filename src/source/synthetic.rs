use super::{FrameSource, SourceKind};
use crate::error::{Result, SourceError, VidwatchError};
use crate::frame::Frame;
use image::{Rgb, RgbImage};
use tracing::trace;

pub const STUB_SCHEME: &str = "stub://";

const DEFAULT_WIDTH: u32 = 320;
const DEFAULT_HEIGHT: u32 = 240;
const SQUARE_SIZE: u32 = 40;

/// Generated file-like source for dry runs and tests
///
/// Addressed as `stub://<frames>` or `stub://<frames>@<width>x<height>`.
/// Each frame is a flat grey field with a bright square that moves with the
/// frame position; the first pixel encodes the position so frames can be
/// identified after they have travelled through the pipeline.
pub struct SyntheticSource {
    frames: u64,
    width: u32,
    height: u32,
    cursor: u64,
    next_id: u64,
    closed: bool,
}

impl SyntheticSource {
    pub fn new(frames: u64, width: u32, height: u32) -> Self {
        Self {
            frames,
            width,
            height,
            cursor: 0,
            next_id: 0,
            closed: false,
        }
    }

    /// Parse a `stub://` address
    pub fn from_address(address: &str) -> Result<Self> {
        let spec = address.strip_prefix(STUB_SCHEME).ok_or_else(|| {
            VidwatchError::source_unavailable(format!("not a stub address: {}", address))
        })?;

        let invalid = || VidwatchError::source_unavailable(format!("invalid stub address: {}", address));

        let (count, dims) = match spec.split_once('@') {
            Some((count, dims)) => (count, Some(dims)),
            None => (spec, None),
        };

        let frames: u64 = count.parse().map_err(|_| invalid())?;
        if frames == 0 {
            return Err(invalid());
        }

        let (width, height) = match dims {
            Some(dims) => {
                let (w, h) = dims.split_once('x').ok_or_else(invalid)?;
                let w: u32 = w.parse().map_err(|_| invalid())?;
                let h: u32 = h.parse().map_err(|_| invalid())?;
                if w == 0 || h == 0 {
                    return Err(invalid());
                }
                (w, h)
            }
            None => (DEFAULT_WIDTH, DEFAULT_HEIGHT),
        };

        Ok(Self::new(frames, width, height))
    }

    /// Render the frame found at `position`
    pub fn render(position: u64, width: u32, height: u32) -> RgbImage {
        let mut image = RgbImage::from_pixel(width, height, Rgb([64, 64, 64]));

        let span = width.saturating_sub(SQUARE_SIZE).max(1) as u64;
        let left = ((position * 8) % span) as u32;
        let top = height.saturating_sub(SQUARE_SIZE) / 2;
        for y in top..(top + SQUARE_SIZE).min(height) {
            for x in left..(left + SQUARE_SIZE).min(width) {
                image.put_pixel(x, y, Rgb([230, 230, 230]));
            }
        }

        image.put_pixel(0, 0, Rgb([(position % 256) as u8, (position / 256 % 256) as u8, 0]));
        image
    }

    /// Recover the position encoded into a rendered frame
    pub fn decode_position(image: &RgbImage) -> u64 {
        let pixel = image.get_pixel(0, 0);
        pixel[0] as u64 + pixel[1] as u64 * 256
    }
}

impl FrameSource for SyntheticSource {
    fn kind(&self) -> SourceKind {
        SourceKind::File
    }

    fn read(&mut self) -> std::result::Result<Frame, SourceError> {
        if self.closed {
            return Err(SourceError::transient("synthetic source closed"));
        }
        if self.cursor >= self.frames {
            return Err(SourceError::EndOfStream);
        }

        let image = Self::render(self.cursor, self.width, self.height);
        let frame = Frame::new(self.next_id, self.cursor, image);
        trace!("Generated synthetic frame {} (position {})", frame.id, self.cursor);

        self.cursor += 1;
        self.next_id += 1;
        Ok(frame)
    }

    fn seek_to_start(&mut self) -> std::result::Result<(), SourceError> {
        self.cursor = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn describe(&self) -> String {
        format!("{}{}@{}x{}", STUB_SCHEME, self.frames, self.width, self.height)
    }
}
