//! Audio alignment, trimming and the encoder invocation.

use crate::filter::FilterGraph;
use crate::{Error, Result};
use rand::Rng;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Channel count the trimmed audio is normalized to.
pub const AUDIO_CHANNELS: u32 = 2;
/// Sample rate the trimmed audio is normalized to.
pub const AUDIO_SAMPLE_RATE: u32 = 48_000;
/// Bitrate of the encoded audio stream.
pub const AUDIO_BITRATE: &str = "192k";
/// x264 speed/quality preset for the encoder.
pub const VIDEO_PRESET: &str = "veryfast";

/// Poll interval while waiting on an ffmpeg child.
const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Compute the audio trim-start offset.
///
/// Returns 0 unless randomization is requested and the audio outlasts the
/// video; otherwise a uniformly random offset in
/// `[0, audio_duration - video_duration]`, which guarantees the trimmed
/// clip can cover the full video duration.
pub fn compute_start(audio_duration: f64, video_duration: f64, randomize: bool) -> f64 {
    if !randomize || audio_duration <= video_duration {
        return 0.0;
    }
    let max = audio_duration - video_duration;
    rand::thread_rng().gen_range(0.0..=max)
}

/// Start offset and target length for the audio trim.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimSpec {
    /// Seek into the source before decoding, in seconds.
    pub start_secs: f64,
    /// Cut the output to this length, in seconds. Trimming only shortens;
    /// a shorter source yields a shorter clip and downstream muxing is
    /// bounded by the shortest mapped stream.
    pub duration_secs: f64,
}

/// Trim the audio track to the video duration and normalize it to
/// stereo 48 kHz AAC.
pub fn trim_audio(input: &Path, output: &Path, spec: TrimSpec, timeout: Duration) -> Result<()> {
    let mut args: Vec<String> = vec!["-y".into()];
    if spec.start_secs > 0.0 {
        args.push("-ss".into());
        args.push(format!("{:.3}", spec.start_secs));
    }
    args.push("-i".into());
    args.push(input.to_string_lossy().into_owned());
    args.push("-t".into());
    args.push(format!("{:.3}", spec.duration_secs));
    args.push("-ac".into());
    args.push(AUDIO_CHANNELS.to_string());
    args.push("-ar".into());
    args.push(AUDIO_SAMPLE_RATE.to_string());
    args.push("-c:a".into());
    args.push("aac".into());
    args.push(output.to_string_lossy().into_owned());

    tracing::debug!(start = spec.start_secs, duration = spec.duration_secs, "trimming audio");
    run_ffmpeg(&args, timeout)
}

/// One encoder invocation.
#[derive(Debug)]
pub struct EncodeJob<'a> {
    /// Primary video input (stream index 0).
    pub video: &'a Path,
    /// Trimmed audio input (stream index 1).
    pub trimmed_audio: &'a Path,
    /// Optional overlay image input (stream index 2).
    pub overlay: Option<&'a Path>,
    /// The assembled filter graph.
    pub graph: &'a FilterGraph,
    /// Caller-supplied quality factor.
    pub crf: u32,
    /// Output path.
    pub output: &'a Path,
    /// Kill the encoder if it runs longer than this.
    pub timeout: Duration,
}

/// Run the encoder: one filter graph, exactly one mapped video port and
/// one mapped audio source, fixed codec pairing, output capped to the
/// shorter of the mapped streams.
pub fn transcode(job: &EncodeJob<'_>) -> Result<()> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-i".into(),
        job.video.to_string_lossy().into_owned(),
        "-i".into(),
        job.trimmed_audio.to_string_lossy().into_owned(),
    ];
    if let Some(overlay) = job.overlay {
        args.push("-i".into());
        args.push(overlay.to_string_lossy().into_owned());
    }
    args.extend([
        "-filter_complex".into(),
        job.graph.render(),
        "-map".into(),
        job.graph.video_map(),
        "-map".into(),
        job.graph.audio_map(),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        VIDEO_PRESET.into(),
        "-crf".into(),
        job.crf.to_string(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        AUDIO_BITRATE.into(),
        "-shortest".into(),
        job.output.to_string_lossy().into_owned(),
    ]);

    tracing::debug!(crf = job.crf, "running encoder");
    run_ffmpeg(&args, job.timeout)
}

/// Spawn ffmpeg and wait for it, killing the child when the deadline
/// passes. Stderr is captured on a reader thread so a chatty encoder
/// cannot block on a full pipe.
fn run_ffmpeg(args: &[String], timeout: Duration) -> Result<()> {
    let mut child = Command::new("ffmpeg")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::tool_not_found("ffmpeg")
            } else {
                Error::Io(e)
            }
        })?;

    let mut stderr_pipe = child.stderr.take();
    let reader = std::thread::spawn(move || {
        let mut buf = String::new();
        if let Some(ref mut pipe) = stderr_pipe {
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                let _ = reader.join();
                return Err(Error::tool_failed(
                    "ffmpeg",
                    format!("timed out after {}s", timeout.as_secs()),
                ));
            }
            None => std::thread::sleep(CHILD_POLL_INTERVAL),
        }
    };

    let stderr = reader.join().unwrap_or_default();

    if !status.success() {
        return Err(Error::tool_failed("ffmpeg", stderr));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_start_zero_without_randomize() {
        assert_eq!(compute_start(30.0, 12.0, false), 0.0);
        assert_eq!(compute_start(5.0, 12.0, false), 0.0);
    }

    #[test]
    fn test_compute_start_zero_when_audio_not_longer() {
        assert_eq!(compute_start(10.0, 10.0, true), 0.0);
        assert_eq!(compute_start(5.0, 12.0, true), 0.0);
    }

    #[test]
    fn test_compute_start_range() {
        // 30s of audio over a 12.345s video leaves at most 17.655s of slack.
        for _ in 0..200 {
            let start = compute_start(30.0, 12.345, true);
            assert!((0.0..=17.655).contains(&start), "offset {} out of range", start);
        }
    }

    #[test]
    fn test_trim_spec_duration_formatting() {
        // The -t argument carries exactly three decimals.
        assert_eq!(format!("{:.3}", 12.345_f64), "12.345");
        assert_eq!(format!("{:.3}", 12.0_f64), "12.000");
    }
}
