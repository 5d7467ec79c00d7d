//! Deterministic ffmpeg filter-graph construction.
//!
//! [`build_filter_graph`] is a pure function from a typed option set to a
//! [`FilterGraph`]: identical options always serialize to a byte-identical
//! graph description. Nodes are emitted in a fixed assembly order and every
//! node only consumes labels produced earlier, so the chain is topological
//! by construction.
//!
//! Input stream indices are fixed by the encoder invocation: `0` is the
//! primary video, `1` the externally trimmed audio track, `2` the optional
//! overlay image.

use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Portrait canvas used for the `vertical` / `9:16` target.
pub const VERTICAL_CANVAS: (u32, u32) = (1080, 1920);

/// Caption font size in points.
const CAPTION_FONT_SIZE: u32 = 48;
/// Opacity of the boxed caption background.
const CAPTION_BOX_OPACITY: &str = "0.45";
/// Caption margin from the top or bottom edge, in pixels.
const CAPTION_MARGIN: u32 = 60;
/// Volume applied to the trimmed music track when mixing.
const MIX_MUSIC_VOLUME: &str = "0.35";
/// Volume applied to the video's own audio when mixing.
const MIX_SOURCE_VOLUME: &str = "1.0";

/// Vertical anchor of the caption box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionPosition {
    Top,
    Center,
    Bottom,
}

impl CaptionPosition {
    /// Vertical anchor expression for drawtext.
    pub fn y_expr(&self) -> String {
        match self {
            CaptionPosition::Top => format!("{}", CAPTION_MARGIN),
            CaptionPosition::Center => "(h-text_h)/2".to_string(),
            CaptionPosition::Bottom => format!("h-text_h-{}", CAPTION_MARGIN),
        }
    }

    /// Horizontal anchor expression for drawtext. Always centered.
    pub fn x_expr(&self) -> &'static str {
        "(w-text_w)/2"
    }
}

impl FromStr for CaptionPosition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "top" => Ok(CaptionPosition::Top),
            "center" => Ok(CaptionPosition::Center),
            "bottom" => Ok(CaptionPosition::Bottom),
            other => Err(Error::InvalidInput(format!(
                "invalid position '{}': expected top, center or bottom",
                other
            ))),
        }
    }
}

impl fmt::Display for CaptionPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptionPosition::Top => write!(f, "top"),
            CaptionPosition::Center => write!(f, "center"),
            CaptionPosition::Bottom => write!(f, "bottom"),
        }
    }
}

/// Output canvas selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    /// Pass the source resolution through unchanged.
    Original,
    /// Fixed 1080x1920 portrait canvas.
    Vertical,
    /// Explicit canvas parsed from a `WxH` pair.
    Exact { width: u32, height: u32 },
}

impl TargetFormat {
    /// The scale/pad canvas, or `None` for pass-through.
    pub fn canvas(&self) -> Option<(u32, u32)> {
        match self {
            TargetFormat::Original => None,
            TargetFormat::Vertical => Some(VERTICAL_CANVAS),
            TargetFormat::Exact { width, height } => Some((*width, *height)),
        }
    }
}

impl FromStr for TargetFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "" | "original" => Ok(TargetFormat::Original),
            "vertical" | "9:16" => Ok(TargetFormat::Vertical),
            other => {
                let parsed = other.split_once('x').and_then(|(w, h)| {
                    let width = w.parse::<u32>().ok()?;
                    let height = h.parse::<u32>().ok()?;
                    (width > 0 && height > 0).then_some(TargetFormat::Exact { width, height })
                });
                parsed.ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "invalid target '{}': expected original, vertical, 9:16 or WxH",
                        other
                    ))
                })
            }
        }
    }
}

/// Options consumed by the graph builder. Already validated and typed.
#[derive(Debug, Clone)]
pub struct FilterOptions {
    /// Caption text, raw. Empty text omits the caption stage.
    pub caption_text: String,
    /// Caption anchor.
    pub position: CaptionPosition,
    /// Output canvas.
    pub target: TargetFormat,
    /// Mix the video's own audio with the trimmed track instead of replacing it.
    pub mix_audio: bool,
    /// Composite a translucent dark layer over the video.
    pub dark_overlay: bool,
    /// Opacity of the dark layer.
    pub overlay_opacity: f32,
    /// Saturation multiplier. Always applied; `None` means unity.
    pub saturation: Option<f32>,
    /// Whether an overlay image is supplied as input `2`.
    pub overlay_image: bool,
    /// Path to the caption font file.
    pub font_file: String,
    /// Probed source dimensions, used to size the dark layer when the
    /// target is pass-through.
    pub source_size: (u32, u32),
}

/// One filter node: zero or more input labels, a directive, one output label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterNode {
    pub inputs: Vec<String>,
    pub directive: String,
    pub output: String,
}

impl FilterNode {
    fn render(&self) -> String {
        let mut out = String::new();
        for input in &self.inputs {
            out.push('[');
            out.push_str(input);
            out.push(']');
        }
        out.push_str(&self.directive);
        out.push('[');
        out.push_str(&self.output);
        out.push(']');
        out
    }
}

/// Where the encoder takes its audio from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioRoute {
    /// Map the trimmed track verbatim.
    Stream(&'static str),
    /// Map a filter output label (the mix case).
    Label(String),
}

/// A fully assembled graph: a linear video chain plus an audio route.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGraph {
    nodes: Vec<FilterNode>,
    video_output: String,
    audio: AudioRoute,
}

impl FilterGraph {
    /// The nodes in emission order.
    pub fn nodes(&self) -> &[FilterNode] {
        &self.nodes
    }

    /// Serialize to the `-filter_complex` argument.
    pub fn render(&self) -> String {
        self.nodes
            .iter()
            .map(FilterNode::render)
            .collect::<Vec<_>>()
            .join(";")
    }

    /// The `-map` argument for the video output port.
    pub fn video_map(&self) -> String {
        format!("[{}]", self.video_output)
    }

    /// The `-map` argument for the audio source.
    pub fn audio_map(&self) -> String {
        match &self.audio {
            AudioRoute::Stream(spec) => (*spec).to_string(),
            AudioRoute::Label(label) => format!("[{}]", label),
        }
    }
}

struct GraphBuilder {
    nodes: Vec<FilterNode>,
    next_index: usize,
}

impl GraphBuilder {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            next_index: 1,
        }
    }

    /// Emit a node with an explicit output label.
    fn emit(&mut self, inputs: &[&str], directive: String, output: &str) -> String {
        self.nodes.push(FilterNode {
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            directive,
            output: output.to_string(),
        });
        output.to_string()
    }

    /// Emit a node with the next sequential label.
    fn chain(&mut self, inputs: &[&str], directive: String) -> String {
        let label = format!("v{}", self.next_index);
        self.next_index += 1;
        self.emit(inputs, directive, &label)
    }
}

/// Strip characters outside the printable ASCII range, then escape the
/// characters that carry meaning inside a drawtext directive: backslash,
/// colon, single quote, double quote, in that order.
pub fn sanitize_caption(text: &str) -> String {
    let printable: String = text.chars().filter(|c| (' '..='~').contains(c)).collect();
    printable
        .replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
        .replace('"', "\\\"")
}

fn scale_pad_directive(width: u32, height: u32) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
        w = width,
        h = height
    )
}

fn drawtext_directive(text: &str, position: CaptionPosition, font_file: &str) -> String {
    format!(
        "drawtext=fontfile={font}:text='{text}':fontsize={size}:fontcolor=white:\
         box=1:boxcolor=black@{box_opacity}:boxborderw=10:x={x}:y={y}",
        font = font_file,
        text = text,
        size = CAPTION_FONT_SIZE,
        box_opacity = CAPTION_BOX_OPACITY,
        x = position.x_expr(),
        y = position.y_expr(),
    )
}

/// Build the filter graph for one render.
///
/// Assembly order is fixed regardless of which optional stages are present:
/// overlay pixel-format normalization, scale/pad, saturation (always,
/// producing `base`), dark layer, image overlay, caption, and a final
/// pixel-format normalization whose output is the designated video port.
pub fn build_filter_graph(opts: &FilterOptions) -> FilterGraph {
    let mut g = GraphBuilder::new();

    if opts.overlay_image {
        g.emit(&["2:v"], "format=rgba".to_string(), "ovl");
    }

    let mut current = "0:v".to_string();

    if let Some((w, h)) = opts.target.canvas() {
        current = g.chain(&[&current], scale_pad_directive(w, h));
    }

    let saturation = opts.saturation.unwrap_or(1.0);
    current = g.emit(
        &[&current],
        format!("eq=saturation={}", saturation),
        "base",
    );

    if opts.dark_overlay {
        let (w, h) = opts.target.canvas().unwrap_or(opts.source_size);
        g.emit(
            &[],
            format!("color=c=black@{}:s={}x{}", opts.overlay_opacity, w, h),
            "shade",
        );
        current = g.chain(&[&current, "shade"], "overlay=0:0:shortest=1".to_string());
    }

    if opts.overlay_image {
        current = g.chain(
            &[&current, "ovl"],
            "overlay=(main_w-overlay_w)/2:(main_h-overlay_h)/2".to_string(),
        );
    }

    let caption = sanitize_caption(&opts.caption_text);
    if !caption.is_empty() {
        current = g.chain(
            &[&current],
            drawtext_directive(&caption, opts.position, &opts.font_file),
        );
    }

    let video_output = g.emit(&[&current], "format=yuv420p".to_string(), "vout");

    let audio = if opts.mix_audio {
        g.emit(&["0:a"], format!("volume={}", MIX_SOURCE_VOLUME), "a0");
        g.emit(&["1:a"], format!("volume={}", MIX_MUSIC_VOLUME), "a1");
        g.emit(
            &["a0", "a1"],
            "amix=inputs=2:duration=shortest".to_string(),
            "aout",
        );
        AudioRoute::Label("aout".to_string())
    } else {
        AudioRoute::Stream("1:a:0")
    };

    FilterGraph {
        nodes: g.nodes,
        video_output,
        audio,
    }
}
