//! Render orchestration.
//!
//! One render is one strictly sequential pipeline: every stage depends on
//! the previous stage's output and no stage is revisited or skipped. Any
//! stage failure abandons the remaining stages and surfaces a stage-tagged
//! error; no partial artifact is ever returned. All scratch assets live in
//! a per-render workspace removed when the run ends, success or failure.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use clipforge_av::{
    build_filter_graph, compute_start, probe_media, transcode, trim_audio, CaptionPosition,
    EncodeJob, FilterOptions, RenderWorkspace, TargetFormat, TrimSpec,
};

use crate::acquire::{AcquireError, RemoteAcquirer};
use crate::config::RenderConfig;
use crate::overlay;

/// Fallback shade canvas when the source hides its dimensions.
const FALLBACK_SOURCE_SIZE: (u32, u32) = (1920, 1080);

/// A render submission. Enum-like fields arrive as strings and are parsed
/// into their closed sets by [`RenderRequest::validate`] before any I/O.
#[derive(Debug, Clone, Deserialize)]
pub struct RenderRequest {
    pub video_url: String,
    pub audio_url: String,
    #[serde(default)]
    pub overlay_image_url: Option<String>,
    #[serde(default)]
    pub overlay_text: String,
    #[serde(default = "default_position")]
    pub position: String,
    #[serde(default)]
    pub mix_audio: bool,
    #[serde(default = "default_target")]
    pub target: String,
    #[serde(default = "default_crf")]
    pub crf: u32,
    #[serde(default)]
    pub random_audio_start: bool,
    #[serde(default)]
    pub dark_overlay: bool,
    #[serde(default = "default_opacity")]
    pub overlay_opacity: f32,
    #[serde(default)]
    pub saturation: Option<f32>,
}

fn default_position() -> String {
    "bottom".to_string()
}
fn default_target() -> String {
    "original".to_string()
}
fn default_crf() -> u32 {
    18
}
fn default_opacity() -> f32 {
    0.3
}

/// A request whose closed-set fields have been parsed.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub video_url: String,
    pub audio_url: String,
    pub overlay_image_url: Option<String>,
    pub overlay_text: String,
    pub position: CaptionPosition,
    pub mix_audio: bool,
    pub target: TargetFormat,
    pub crf: u32,
    pub random_audio_start: bool,
    pub dark_overlay: bool,
    pub overlay_opacity: f32,
    pub saturation: Option<f32>,
}

impl RenderRequest {
    /// Parse the closed-set fields, rejecting the request before any I/O.
    pub fn validate(&self) -> Result<ValidatedRequest, RenderError> {
        let position: CaptionPosition = self
            .position
            .parse()
            .map_err(|e: clipforge_av::Error| RenderError::Validation(e.to_string()))?;
        let target: TargetFormat = self
            .target
            .parse()
            .map_err(|e: clipforge_av::Error| RenderError::Validation(e.to_string()))?;

        if self.video_url.is_empty() {
            return Err(RenderError::Validation("video_url is required".to_string()));
        }
        if self.audio_url.is_empty() {
            return Err(RenderError::Validation("audio_url is required".to_string()));
        }

        Ok(ValidatedRequest {
            video_url: self.video_url.clone(),
            audio_url: self.audio_url.clone(),
            overlay_image_url: self.overlay_image_url.clone(),
            overlay_text: self.overlay_text.clone(),
            position,
            mix_audio: self.mix_audio,
            target,
            crf: self.crf,
            random_audio_start: self.random_audio_start,
            dark_overlay: self.dark_overlay,
            overlay_opacity: self.overlay_opacity,
            saturation: self.saturation,
        })
    }
}

/// Stages of one render, in transition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    Validated,
    Acquiring,
    Preprocessing,
    Probing,
    AligningAudio,
    TrimmingAudio,
    BuildingGraph,
    Transcoding,
    Verifying,
    Done,
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RenderStage::Validated => "validated",
            RenderStage::Acquiring => "acquiring",
            RenderStage::Preprocessing => "preprocessing",
            RenderStage::Probing => "probing",
            RenderStage::AligningAudio => "aligning_audio",
            RenderStage::TrimmingAudio => "trimming_audio",
            RenderStage::BuildingGraph => "building_graph",
            RenderStage::Transcoding => "transcoding",
            RenderStage::Verifying => "verifying",
            RenderStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Stage-tagged render failures.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("acquisition failed for {what}: {source}")]
    Acquisition {
        what: &'static str,
        #[source]
        source: AcquireError,
    },

    #[error("probe failed: {0}")]
    Probe(#[source] clipforge_av::Error),

    #[error("audio trim failed: {0}")]
    Trim(#[source] clipforge_av::Error),

    #[error("transcode failed: {0}")]
    Transcode(#[source] clipforge_av::Error),

    #[error("integrity check failed: {0}")]
    Integrity(String),

    #[error("internal failure during {stage}: {message}")]
    Internal { stage: RenderStage, message: String },
}

impl RenderError {
    /// The stage this failure belongs to.
    pub fn stage(&self) -> RenderStage {
        match self {
            RenderError::Validation(_) => RenderStage::Validated,
            RenderError::Acquisition { .. } => RenderStage::Acquiring,
            RenderError::Probe(_) => RenderStage::Probing,
            RenderError::Trim(_) => RenderStage::TrimmingAudio,
            RenderError::Transcode(_) => RenderStage::Transcoding,
            RenderError::Integrity(_) => RenderStage::Verifying,
            RenderError::Internal { stage, .. } => *stage,
        }
    }
}

/// The finished artifact. The pipeline holds no long-term ownership; the
/// bytes are read out before the workspace is destroyed.
pub struct RenderArtifact {
    pub data: Vec<u8>,
    pub size: u64,
}

/// Owns the collaborators shared across renders: the acquirer (with its
/// once-resolved credential) and the render tunables.
pub struct RenderPipeline {
    acquirer: Arc<RemoteAcquirer>,
    settings: RenderConfig,
}

impl RenderPipeline {
    pub fn new(acquirer: Arc<RemoteAcquirer>, settings: RenderConfig) -> Self {
        Self { acquirer, settings }
    }

    /// Run one render through the full stage sequence.
    pub async fn render(&self, request: &RenderRequest) -> Result<RenderArtifact, RenderError> {
        let render_id = uuid::Uuid::new_v4();
        let request = request.validate()?;
        tracing::info!(%render_id, stage = %RenderStage::Validated, "render accepted");

        let encode_timeout = Duration::from_secs(self.settings.encode_timeout_secs);

        let workspace = RenderWorkspace::new().map_err(|e| RenderError::Internal {
            stage: RenderStage::Acquiring,
            message: e.to_string(),
        })?;

        // Acquiring
        tracing::info!(%render_id, stage = %RenderStage::Acquiring, "fetching inputs");
        self.acquirer
            .acquire(&request.video_url, &workspace.input_video())
            .await
            .map_err(|source| RenderError::Acquisition {
                what: "video",
                source,
            })?;
        self.acquirer
            .acquire(&request.audio_url, &workspace.input_audio())
            .await
            .map_err(|source| RenderError::Acquisition {
                what: "audio",
                source,
            })?;
        let has_overlay = if let Some(ref url) = request.overlay_image_url {
            self.acquirer
                .acquire(url, &workspace.overlay_image())
                .await
                .map_err(|source| RenderError::Acquisition {
                    what: "overlay image",
                    source,
                })?;
            true
        } else {
            false
        };

        // Preprocessing: round the overlay corners; failures degrade to the
        // original bytes inside round_overlay.
        if has_overlay {
            tracing::info!(%render_id, stage = %RenderStage::Preprocessing, "rounding overlay");
            let path = workspace.overlay_image();
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| RenderError::Internal {
                    stage: RenderStage::Preprocessing,
                    message: e.to_string(),
                })?;
            let rounded = overlay::round_overlay(&bytes);
            tokio::fs::write(&path, rounded)
                .await
                .map_err(|e| RenderError::Internal {
                    stage: RenderStage::Preprocessing,
                    message: e.to_string(),
                })?;
        }

        // Probing
        tracing::info!(%render_id, stage = %RenderStage::Probing, "probing durations");
        let video_probe = {
            let path = workspace.input_video();
            run_blocking(RenderStage::Probing, move || probe_media(&path))
                .await?
                .map_err(RenderError::Probe)?
        };
        let audio_probe = {
            let path = workspace.input_audio();
            run_blocking(RenderStage::Probing, move || probe_media(&path))
                .await?
                .map_err(RenderError::Probe)?
        };

        // AligningAudio
        let start = compute_start(
            audio_probe.duration_secs,
            video_probe.duration_secs,
            request.random_audio_start,
        );
        tracing::info!(
            %render_id,
            stage = %RenderStage::AligningAudio,
            start_secs = start,
            "audio aligned"
        );

        // TrimmingAudio
        tracing::info!(%render_id, stage = %RenderStage::TrimmingAudio, "trimming audio");
        {
            let input = workspace.input_audio();
            let output = workspace.trimmed_audio();
            let spec = TrimSpec {
                start_secs: start,
                duration_secs: video_probe.duration_secs,
            };
            run_blocking(RenderStage::TrimmingAudio, move || {
                trim_audio(&input, &output, spec, encode_timeout)
            })
            .await?
            .map_err(RenderError::Trim)?;
        }

        // BuildingGraph
        let source_size = match (video_probe.width, video_probe.height) {
            (Some(w), Some(h)) => (w, h),
            _ => FALLBACK_SOURCE_SIZE,
        };
        let options = FilterOptions {
            caption_text: request.overlay_text.clone(),
            position: request.position,
            target: request.target,
            mix_audio: request.mix_audio,
            dark_overlay: request.dark_overlay,
            overlay_opacity: request.overlay_opacity,
            saturation: request.saturation,
            overlay_image: has_overlay,
            font_file: self.settings.font_path.clone(),
            source_size,
        };
        let graph = build_filter_graph(&options);
        tracing::debug!(%render_id, stage = %RenderStage::BuildingGraph, graph = %graph.render(), "graph built");

        // Transcoding
        tracing::info!(%render_id, stage = %RenderStage::Transcoding, crf = request.crf, "encoding");
        {
            let video = workspace.input_video();
            let trimmed = workspace.trimmed_audio();
            let overlay_path = has_overlay.then(|| workspace.overlay_image());
            let output = workspace.output();
            let graph = graph.clone();
            let crf = request.crf;
            run_blocking(RenderStage::Transcoding, move || {
                transcode(&EncodeJob {
                    video: &video,
                    trimmed_audio: &trimmed,
                    overlay: overlay_path.as_deref(),
                    graph: &graph,
                    crf,
                    output: &output,
                    timeout: encode_timeout,
                })
            })
            .await?
            .map_err(RenderError::Transcode)?;
        }

        // Verifying: the artifact must exist and be non-empty.
        let output = workspace.output();
        let size = tokio::fs::metadata(&output)
            .await
            .map_err(|_| RenderError::Integrity("output artifact missing".to_string()))?
            .len();
        if size == 0 {
            return Err(RenderError::Integrity("output artifact is empty".to_string()));
        }
        let data = tokio::fs::read(&output)
            .await
            .map_err(|e| RenderError::Integrity(format!("cannot read output artifact: {}", e)))?;

        tracing::info!(%render_id, stage = %RenderStage::Done, size, "render complete");
        Ok(RenderArtifact { data, size })
        // workspace drops here; scratch assets are removed on both the
        // success and every failure path above.
    }
}

/// Run a blocking tool invocation off the async runtime.
async fn run_blocking<T, F>(stage: RenderStage, f: F) -> Result<T, RenderError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RenderError::Internal {
            stage,
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RenderRequest {
        serde_json::from_str(
            r#"{
                "video_url": "https://cdn.example.com/clip.mp4",
                "audio_url": "https://cdn.example.com/track.mp3"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults_applied() {
        let req = request();
        assert_eq!(req.position, "bottom");
        assert_eq!(req.target, "original");
        assert_eq!(req.crf, 18);
        assert_eq!(req.overlay_opacity, 0.3);
        assert!(!req.mix_audio);
        assert!(!req.dark_overlay);
        assert!(req.saturation.is_none());
    }

    #[test]
    fn test_validate_accepts_closed_sets() {
        let mut req = request();
        req.position = "center".to_string();
        req.target = "9:16".to_string();
        let validated = req.validate().unwrap();
        assert_eq!(validated.position, CaptionPosition::Center);
        assert_eq!(validated.target, TargetFormat::Vertical);
    }

    #[test]
    fn test_validate_rejects_bad_position() {
        let mut req = request();
        req.position = "upside-down".to_string();
        let err = req.validate().unwrap_err();
        assert!(matches!(err, RenderError::Validation(_)));
        assert_eq!(err.stage(), RenderStage::Validated);
    }

    #[test]
    fn test_validate_rejects_bad_target() {
        let mut req = request();
        req.target = "widescreen".to_string();
        assert!(matches!(req.validate(), Err(RenderError::Validation(_))));
    }

    #[test]
    fn test_validate_requires_urls() {
        let mut req = request();
        req.video_url = String::new();
        assert!(matches!(req.validate(), Err(RenderError::Validation(_))));
    }

    #[test]
    fn test_error_stage_tagging() {
        let err = RenderError::Integrity("empty".to_string());
        assert_eq!(err.stage(), RenderStage::Verifying);

        let err = RenderError::Acquisition {
            what: "video",
            source: AcquireError::EmptyDownload(std::path::PathBuf::from("/tmp/x")),
        };
        assert_eq!(err.stage(), RenderStage::Acquiring);

        let err = RenderError::Internal {
            stage: RenderStage::Preprocessing,
            message: "io".to_string(),
        };
        assert_eq!(err.stage(), RenderStage::Preprocessing);
    }

    #[test]
    fn test_stage_display_names() {
        assert_eq!(RenderStage::AligningAudio.to_string(), "aligning_audio");
        assert_eq!(RenderStage::Done.to_string(), "done");
    }
}
