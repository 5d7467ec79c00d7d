//! FFprobe-based media probing.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::process::Command;

/// Probe results the render pipeline consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaProbe {
    /// Container duration in seconds.
    pub duration_secs: f64,
    /// Width of the primary video stream, if any.
    pub width: Option<u32>,
    /// Height of the primary video stream, if any.
    pub height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
}

/// Probe a media file with ffprobe, returning its duration and primary
/// video dimensions.
///
/// # Errors
///
/// Fails when the file is missing or empty, when ffprobe is unavailable or
/// exits non-zero, or when no parsable duration is reported.
pub fn probe_media(path: &Path) -> Result<MediaProbe> {
    if !path.exists() {
        return Err(Error::file_not_found(path));
    }
    let len = std::fs::metadata(path)?.len();
    if len == 0 {
        return Err(Error::InvalidInput(format!(
            "empty media file: {}",
            path.display()
        )));
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::tool_not_found("ffprobe")
            } else {
                Error::Io(e)
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::tool_failed("ffprobe", stderr.to_string()));
    }

    let json_str = String::from_utf8(output.stdout)
        .map_err(|e| Error::parse_error("ffprobe", format!("invalid UTF-8: {}", e)))?;

    let ff_output: FfprobeOutput = serde_json::from_str(&json_str)?;
    parse_probe_output(ff_output)
}

fn parse_probe_output(output: FfprobeOutput) -> Result<MediaProbe> {
    let duration_secs = output
        .format
        .duration
        .as_deref()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| Error::parse_error("ffprobe", "cannot read duration"))?;

    let video = output
        .streams
        .iter()
        .find(|s| s.codec_type == "video");

    Ok(MediaProbe {
        duration_secs,
        width: video.and_then(|s| s.width),
        height: video.and_then(|s| s.height),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<MediaProbe> {
        parse_probe_output(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_parse_duration_and_dimensions() {
        let probe = parse(
            r#"{
                "format": {"duration": "12.345000"},
                "streams": [
                    {"codec_type": "audio"},
                    {"codec_type": "video", "width": 1920, "height": 1080}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(probe.duration_secs, 12.345);
        assert_eq!(probe.width, Some(1920));
        assert_eq!(probe.height, Some(1080));
    }

    #[test]
    fn test_parse_audio_only() {
        let probe = parse(
            r#"{"format": {"duration": "30.0"}, "streams": [{"codec_type": "audio"}]}"#,
        )
        .unwrap();
        assert_eq!(probe.duration_secs, 30.0);
        assert_eq!(probe.width, None);
        assert_eq!(probe.height, None);
    }

    #[test]
    fn test_parse_missing_duration_fails() {
        let err = parse(r#"{"format": {}, "streams": []}"#).unwrap_err();
        assert!(matches!(err, Error::ParseError { .. }));
    }

    #[test]
    fn test_parse_garbage_duration_fails() {
        let err = parse(r#"{"format": {"duration": "N/A"}, "streams": []}"#).unwrap_err();
        assert!(matches!(err, Error::ParseError { .. }));
    }

    #[test]
    fn test_probe_missing_file() {
        let err = probe_media(Path::new("/nonexistent/clip.mp4")).unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }

    #[test]
    fn test_probe_empty_file() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let err = probe_media(f.path()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
