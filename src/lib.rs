//! Clipforge: a declarative video render service.
//!
//! Accepts render requests naming a remote video, audio track and optional
//! overlay image, acquires the inputs (defeating provider interstitial
//! pages), composes a deterministic ffmpeg filter graph for captions,
//! framing, shading and audio mixing, and returns a single MP4 artifact.

pub mod acquire;
pub mod config;
pub mod overlay;
pub mod pipeline;
pub mod server;
