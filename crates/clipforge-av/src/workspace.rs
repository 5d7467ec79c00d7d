//! Per-render scratch space.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Scratch directory owned by exactly one render.
///
/// Every intermediate asset of a render (downloaded inputs, the trimmed
/// audio track, the encoded output) lives inside one temporary directory
/// that is removed when the workspace is dropped, whether the render
/// succeeded or failed. Workspaces are never shared between renders.
///
/// # Example
///
/// ```no_run
/// use clipforge_av::RenderWorkspace;
///
/// let ws = RenderWorkspace::new()?;
/// let video = ws.input_video();
/// // download into `video`, encode into `ws.output()` ...
/// # Ok::<(), clipforge_av::Error>(())
/// ```
pub struct RenderWorkspace {
    temp_dir: TempDir,
}

impl RenderWorkspace {
    /// Create a fresh scratch directory.
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::with_prefix("clipforge-render-")
            .map_err(|e| Error::Workspace(e.to_string()))?;
        Ok(Self { temp_dir })
    }

    /// Root of the scratch directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Destination for the downloaded primary video.
    pub fn input_video(&self) -> PathBuf {
        self.temp_dir.path().join("in_video.mp4")
    }

    /// Destination for the downloaded audio track.
    pub fn input_audio(&self) -> PathBuf {
        self.temp_dir.path().join("in_audio")
    }

    /// Destination for the (preprocessed) overlay image.
    pub fn overlay_image(&self) -> PathBuf {
        self.temp_dir.path().join("overlay.png")
    }

    /// The trimmed, normalized audio track.
    pub fn trimmed_audio(&self) -> PathBuf {
        self.temp_dir.path().join("trim_audio.aac")
    }

    /// The encoded output artifact.
    pub fn output(&self) -> PathBuf {
        self.temp_dir.path().join("out_final.mp4")
    }

    /// Create a scratch file path with the given name.
    pub fn temp_file(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_paths_live_in_scratch() {
        let ws = RenderWorkspace::new().unwrap();
        for p in [
            ws.input_video(),
            ws.input_audio(),
            ws.overlay_image(),
            ws.trimmed_audio(),
            ws.output(),
        ] {
            assert!(p.starts_with(ws.path()));
        }
        assert_eq!(ws.output().file_name().unwrap(), "out_final.mp4");
    }

    #[test]
    fn test_scratch_removed_on_drop() {
        let ws = RenderWorkspace::new().unwrap();
        let root = ws.path().to_path_buf();
        std::fs::write(ws.input_video(), b"data").unwrap();
        assert!(root.exists());
        drop(ws);
        assert!(!root.exists());
    }

    #[test]
    fn test_workspaces_are_disjoint() {
        let a = RenderWorkspace::new().unwrap();
        let b = RenderWorkspace::new().unwrap();
        assert_ne!(a.path(), b.path());
    }
}
