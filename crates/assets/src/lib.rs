//! Asset access for the resource graph.
//!
//! Everything here is a thin I/O boundary the graph consumes: reading bytes
//! from the asset root (with transparent zstd decompression), describing the
//! volume data layout, and watching the asset tree for changes. None of it
//! retries; a failed fetch surfaces as an error (or, for the best-effort
//! variants, as blank data) and reload is driven externally through the
//! registry.

mod volume;
mod watcher;

use std::path::Path;

pub use volume::{VolumeDesc, load_volume_or_blank};
pub use watcher::AssetWatcher;

/// Errors from asset fetches. Clonable so a failure can live inside a shared
/// future and reach every awaiter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },
    #[error("failed to decompress {path}: {message}")]
    Decompress { path: String, message: String },
}

/// Read an asset's bytes from under `root`. Paths ending in `.zst` are
/// decompressed transparently.
pub fn fetch_bytes(root: &Path, path: &str) -> Result<Vec<u8>, AssetError> {
    let full = root.join(path);
    let raw = std::fs::read(&full).map_err(|e| AssetError::Io {
        path: path.to_string(),
        message: e.to_string(),
    })?;

    if path.ends_with(".zst") {
        zstd::decode_all(raw.as_slice()).map_err(|e| AssetError::Decompress {
            path: path.to_string(),
            message: e.to_string(),
        })
    } else {
        Ok(raw)
    }
}

/// Best-effort fetch: a failure yields empty data so resource creation can
/// proceed with a blank placeholder instead of aborting the frame loop.
pub fn fetch_bytes_or_empty(root: &Path, path: &str) -> Vec<u8> {
    match fetch_bytes(root, path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(path, error = %e, "asset fetch failed, substituting empty data");
            Vec::new()
        }
    }
}

/// Read an asset as UTF-8 text (shader sources).
pub fn fetch_text(root: &Path, path: &str) -> Result<String, AssetError> {
    let bytes = fetch_bytes(root, path)?;
    String::from_utf8(bytes).map_err(|e| AssetError::Io {
        path: path.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn fetch_reads_plain_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.bin"), b"volume").unwrap();

        let bytes = fetch_bytes(dir.path(), "data.bin").unwrap();
        assert_eq!(bytes, b"volume");
    }

    #[test]
    fn fetch_decompresses_zst() {
        let dir = tempfile::tempdir().unwrap();
        let compressed = zstd::encode_all(&b"payload"[..], 0).unwrap();
        let mut file = std::fs::File::create(dir.path().join("data.bin.zst")).unwrap();
        file.write_all(&compressed).unwrap();

        let bytes = fetch_bytes(dir.path(), "data.bin.zst").unwrap();
        assert_eq!(bytes, b"payload");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = fetch_bytes(dir.path(), "absent.bin").unwrap_err();
        assert!(matches!(err, AssetError::Io { .. }));
        assert!(err.to_string().contains("absent.bin"));
    }

    #[test]
    fn corrupt_zst_is_decompress_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.zst"), b"not zstd at all").unwrap();
        let err = fetch_bytes(dir.path(), "bad.zst").unwrap_err();
        assert!(matches!(err, AssetError::Decompress { .. }));
    }

    #[test]
    fn best_effort_fetch_never_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(fetch_bytes_or_empty(dir.path(), "absent.bin").is_empty());
    }

    #[test]
    fn fetch_text_rejects_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bin.wgsl"), [0xff, 0xfe, 0x00]).unwrap();
        assert!(fetch_text(dir.path(), "bin.wgsl").is_err());
    }
}
