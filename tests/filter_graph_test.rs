//! Whole-graph serialization checks: a fully featured render request must
//! produce exactly the expected `-filter_complex` text and stream maps.

use clipforge_av::{
    build_filter_graph, CaptionPosition, FilterOptions, TargetFormat,
};

const FONT: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf";

fn base_options() -> FilterOptions {
    FilterOptions {
        caption_text: String::new(),
        position: CaptionPosition::Bottom,
        target: TargetFormat::Original,
        mix_audio: false,
        dark_overlay: false,
        overlay_opacity: 0.3,
        saturation: None,
        overlay_image: false,
        font_file: FONT.to_string(),
        source_size: (1920, 1080),
    }
}

#[test]
fn minimal_render_graph_serialization() {
    let graph = build_filter_graph(&base_options());
    assert_eq!(
        graph.render(),
        "[0:v]eq=saturation=1[base];[base]format=yuv420p[vout]"
    );
    assert_eq!(graph.video_map(), "[vout]");
    assert_eq!(graph.audio_map(), "1:a:0");
}

#[test]
fn full_featured_render_graph_serialization() {
    let graph = build_filter_graph(&FilterOptions {
        caption_text: "Watch this".to_string(),
        position: CaptionPosition::Top,
        target: TargetFormat::Vertical,
        mix_audio: true,
        dark_overlay: true,
        overlay_opacity: 0.3,
        saturation: Some(1.2),
        overlay_image: true,
        ..base_options()
    });

    let expected = concat!(
        "[2:v]format=rgba[ovl];",
        "[0:v]scale=1080:1920:force_original_aspect_ratio=decrease,",
        "pad=1080:1920:(ow-iw)/2:(oh-ih)/2[v1];",
        "[v1]eq=saturation=1.2[base];",
        "color=c=black@0.3:s=1080x1920[shade];",
        "[base][shade]overlay=0:0:shortest=1[v2];",
        "[v2][ovl]overlay=(main_w-overlay_w)/2:(main_h-overlay_h)/2[v3];",
        "[v3]drawtext=fontfile=/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf:",
        "text='Watch this':fontsize=48:fontcolor=white:",
        "box=1:boxcolor=black@0.45:boxborderw=10:x=(w-text_w)/2:y=60[v4];",
        "[v4]format=yuv420p[vout];",
        "[0:a]volume=1.0[a0];",
        "[1:a]volume=0.35[a1];",
        "[a0][a1]amix=inputs=2:duration=shortest[aout]",
    );
    assert_eq!(graph.render(), expected);
    assert_eq!(graph.video_map(), "[vout]");
    assert_eq!(graph.audio_map(), "[aout]");
}

#[test]
fn graph_stage_toggles_are_independent() {
    // Each optional stage appears exactly when its toggle is set, with the
    // rest of the chain re-linking around it.
    let shaded = build_filter_graph(&FilterOptions {
        dark_overlay: true,
        ..base_options()
    });
    assert_eq!(
        shaded.render(),
        concat!(
            "[0:v]eq=saturation=1[base];",
            "color=c=black@0.3:s=1920x1080[shade];",
            "[base][shade]overlay=0:0:shortest=1[v1];",
            "[v1]format=yuv420p[vout]",
        )
    );

    let captioned = build_filter_graph(&FilterOptions {
        caption_text: "hi".to_string(),
        ..base_options()
    });
    assert_eq!(
        captioned.render(),
        concat!(
            "[0:v]eq=saturation=1[base];",
            "[base]drawtext=fontfile=/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf:",
            "text='hi':fontsize=48:fontcolor=white:",
            "box=1:boxcolor=black@0.45:boxborderw=10:x=(w-text_w)/2:y=h-text_h-60[v1];",
            "[v1]format=yuv420p[vout]",
        )
    );
}
