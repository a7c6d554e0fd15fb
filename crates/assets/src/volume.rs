use std::path::Path;

use crate::fetch_bytes;

/// Dimensions of a single-channel (r8) volume dataset.
///
/// The on-disk layout is tightly packed: `width` bytes per row, `height`
/// rows per slice, `depth` slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeDesc {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl VolumeDesc {
    pub fn new(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Bytes in one row of one slice.
    pub fn bytes_per_row(&self) -> u32 {
        self.width
    }

    /// Total payload size in bytes.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.depth as usize
    }

    /// An all-zero volume of this shape.
    pub fn blank(&self) -> Vec<u8> {
        vec![0; self.expected_len()]
    }
}

/// Load a volume dataset, best effort.
///
/// A missing or unreadable file yields a blank volume; a size mismatch is
/// padded or truncated to the described shape. Either way the caller gets
/// uploadable data and the frame loop stays alive.
pub fn load_volume_or_blank(root: &Path, path: &str, desc: VolumeDesc) -> Vec<u8> {
    let mut data = match fetch_bytes(root, path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(path, error = %e, "volume fetch failed, using blank volume");
            return desc.blank();
        }
    };

    let expected = desc.expected_len();
    if data.len() != expected {
        tracing::warn!(
            path,
            got = data.len(),
            expected,
            "volume size mismatch, coercing to described shape"
        );
        data.resize(expected, 0);
    }
    data
}
