//! Asset models.
//!
//! An [`Asset`] identifies one reference/distorted video pair together with
//! the decode parameters the external quality tools need. Assets are the
//! unit of work for every executor, and their [`Asset::identity`] string is
//! one half of every cache key, so it must be deterministic across process
//! restarts.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Raw pixel format of the decoded YUV input files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 4:2:0 chroma subsampling
    #[default]
    Yuv420p,
    /// 4:2:2 chroma subsampling
    Yuv422p,
    /// 4:4:4 (no chroma subsampling)
    Yuv444p,
}

impl PixelFormat {
    /// Format token as understood by the external quality tools.
    pub fn as_str(&self) -> &'static str {
        match self {
            PixelFormat::Yuv420p => "yuv420p",
            PixelFormat::Yuv422p => "yuv422p",
            PixelFormat::Yuv444p => "yuv444p",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inclusive range of decoded frames to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRange {
    /// First frame index (0-based)
    pub start: u32,
    /// Last frame index (inclusive)
    pub end: u32,
}

impl FrameRange {
    /// Create a new frame range. `start` must not exceed `end`.
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "frame range start must not exceed end");
        Self { start, end }
    }

    /// Number of frames covered by the range.
    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for FrameRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A reference/distorted video pair plus decode parameters.
///
/// Immutable once constructed. Two assets with equal [`Asset::identity`]
/// must be treated as the same cache subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    reference_path: PathBuf,
    distorted_path: PathBuf,
    pixel_format: PixelFormat,
    width: u32,
    height: u32,
    frame_range: Option<FrameRange>,
}

impl Asset {
    /// Create a new asset covering the full frame range.
    pub fn new(
        reference_path: impl Into<PathBuf>,
        distorted_path: impl Into<PathBuf>,
        pixel_format: PixelFormat,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            reference_path: reference_path.into(),
            distorted_path: distorted_path.into(),
            pixel_format,
            width,
            height,
            frame_range: None,
        }
    }

    /// Restrict the asset to a frame range.
    pub fn with_frame_range(mut self, range: FrameRange) -> Self {
        self.frame_range = Some(range);
        self
    }

    pub fn reference_path(&self) -> &Path {
        &self.reference_path
    }

    pub fn distorted_path(&self) -> &Path {
        &self.distorted_path
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn frame_range(&self) -> Option<FrameRange> {
        self.frame_range
    }

    /// Deterministic, filesystem-safe identity string.
    ///
    /// Format: `{distorted stem}_{w}x{h}_{pix_fmt}_{range}_{digest8}` where
    /// `digest8` is the first 8 hex chars of the SHA-256 of
    /// `"{reference_path}|{distorted_path}"`. The digest disambiguates
    /// distorted files that share a stem but live in different directories.
    pub fn identity(&self) -> String {
        let stem = self
            .distorted_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());

        let range = match self.frame_range {
            Some(r) => format!("f{}-{}", r.start, r.end),
            None => "full".to_string(),
        };

        let mut hasher = Sha256::new();
        hasher.update(self.reference_path.to_string_lossy().as_bytes());
        hasher.update(b"|");
        hasher.update(self.distorted_path.to_string_lossy().as_bytes());
        let digest = hasher.finalize();
        let digest8: String = digest[..4].iter().map(|b| format!("{:02x}", b)).collect();

        format!(
            "{}_{}x{}_{}_{}_{}",
            sanitize(&stem),
            self.width,
            self.height,
            self.pixel_format.as_str(),
            range,
            digest8
        )
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identity())
    }
}

/// Replace path-hostile characters so the identity can be used in file names.
fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_asset() -> Asset {
        Asset::new(
            "/data/ref/src01.yuv",
            "/data/dis/src01_crf30.yuv",
            PixelFormat::Yuv420p,
            1920,
            1080,
        )
    }

    #[test]
    fn test_identity_is_deterministic() {
        let a = test_asset();
        let b = test_asset();
        assert_eq!(a.identity(), b.identity());
    }

    #[test]
    fn test_identity_changes_with_fields() {
        let base = test_asset();

        let other_dis = Asset::new(
            "/data/ref/src01.yuv",
            "/data/dis/src01_crf40.yuv",
            PixelFormat::Yuv420p,
            1920,
            1080,
        );
        assert_ne!(base.identity(), other_dis.identity());

        let other_size = Asset::new(
            "/data/ref/src01.yuv",
            "/data/dis/src01_crf30.yuv",
            PixelFormat::Yuv420p,
            1280,
            720,
        );
        assert_ne!(base.identity(), other_size.identity());

        let ranged = test_asset().with_frame_range(FrameRange::new(0, 47));
        assert_ne!(base.identity(), ranged.identity());
    }

    #[test]
    fn test_identity_distinguishes_same_stem_different_dir() {
        let a = Asset::new("/a/ref.yuv", "/run1/out.yuv", PixelFormat::Yuv420p, 640, 480);
        let b = Asset::new("/a/ref.yuv", "/run2/out.yuv", PixelFormat::Yuv420p, 640, 480);
        assert_ne!(a.identity(), b.identity());
    }

    #[test]
    fn test_identity_is_filesystem_safe() {
        let asset = Asset::new(
            "/data/ref/some video.yuv",
            "/data/dis/some video (enc).yuv",
            PixelFormat::Yuv422p,
            640,
            480,
        );
        let id = asset.identity();
        assert!(id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'));
    }

    #[test]
    fn test_frame_range_len() {
        assert_eq!(FrameRange::new(0, 0).len(), 1);
        assert_eq!(FrameRange::new(10, 19).len(), 10);
    }
}
