//! Filter-graph construction and ffmpeg/ffprobe invocation for clipforge.
//!
//! This crate owns everything that talks to the external media tools: tool
//! detection, per-render scratch space, duration probing, deterministic
//! filter-graph assembly, and the trim/transcode invocations themselves.

mod error;

pub mod encode;
pub mod filter;
pub mod probe;
pub mod tools;
pub mod workspace;

pub use encode::{compute_start, transcode, trim_audio, EncodeJob, TrimSpec};
pub use error::{Error, Result};
pub use filter::{
    build_filter_graph, sanitize_caption, AudioRoute, CaptionPosition, FilterGraph, FilterNode,
    FilterOptions, TargetFormat, VERTICAL_CANVAS,
};
pub use probe::{probe_media, MediaProbe};
pub use tools::{check_tools, require_tool, ToolInfo};
pub use workspace::RenderWorkspace;
