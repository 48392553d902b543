//! ffmpeg and ffprobe invocations.

use super::scheme::ConversionScheme;
use crate::error::ConversionError;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Bitrate in kbit/s that reproduces a file of `size_bytes` over `duration_secs`.
///
/// Rounded up so a re-encode never comes out below the source.
pub fn bitrate_kbps(size_bytes: u64, duration_secs: f64) -> Option<u32> {
    if !duration_secs.is_finite() || duration_secs <= 0.0 {
        return None;
    }
    let kbps = (size_bytes as f64 * 8.0) / (duration_secs * 1000.0);
    Some(kbps.floor() as u32 + 1)
}

/// Build the ffmpeg argument vector for one conversion.
///
/// With a cover, the image is read from stdin as the second input and mapped
/// as an attached picture.
pub fn build_args(
    source: &Path,
    output: &Path,
    scheme: &ConversionScheme,
    bitrate_kbps: Option<u32>,
    with_cover: bool,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-y".into(),
        "-loglevel".into(),
        "error".into(),
        "-i".into(),
        source.into(),
    ];

    let cover = with_cover.then_some(scheme.image_codec).flatten();
    if cover.is_some() {
        args.extend(["-i", "pipe:0", "-map", "0:a", "-map", "1:v"].map(OsString::from));
    } else {
        args.push("-vn".into());
    }

    args.push("-c:a".into());
    args.push(scheme.audio_codec.ffmpeg_name().into());
    if let Some(kbps) = bitrate_kbps {
        args.push("-b:a".into());
        args.push(format!("{}k", kbps).into());
    }

    if let Some(codec) = cover {
        args.push("-c:v".into());
        args.push(codec.ffmpeg_name().into());
        args.push("-disposition:v:0".into());
        args.push("attached_pic".into());
    }

    args.push(output.into());
    args
}

/// Run ffmpeg, feeding `stdin_data` to its standard input when given.
pub async fn run_ffmpeg(
    program: &str,
    args: &[OsString],
    stdin_data: Option<Vec<u8>>,
) -> Result<(), ConversionError> {
    debug!("Running {} {:?}", program, args);

    let spawned = Command::new(program)
        .args(args)
        .stdin(if stdin_data.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConversionError::ToolNotFound(program.to_string()));
        }
        Err(e) => return Err(ConversionError::Io(e)),
    };

    // Written from a separate task so a full stderr pipe cannot stall us.
    let writer = match (child.stdin.take(), stdin_data) {
        (Some(mut stdin), Some(data)) => Some(tokio::spawn(async move {
            if let Err(e) = stdin.write_all(&data).await {
                warn!("Failed to write cover to ffmpeg: {}", e);
            }
        })),
        _ => None,
    };

    let output = child.wait_with_output().await?;
    if let Some(writer) = writer {
        let _ = writer.await;
    }

    if output.status.success() {
        Ok(())
    } else {
        Err(ConversionError::Transcoder {
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Duration of a media file in seconds.
pub async fn probe_duration(program: &str, path: &Path) -> Result<f64, ConversionError> {
    let result = Command::new(program)
        .arg("-v").arg("quiet")
        .arg("-print_format").arg("json")
        .arg("-show_format")
        .arg(path)
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConversionError::ToolNotFound(program.to_string()));
        }
        Err(e) => return Err(ConversionError::Probe(format!("{} failed: {}", program, e))),
    };

    if !output.status.success() {
        return Err(ConversionError::Probe(format!("{} returned an error", program)));
    }

    parse_probe_duration(&String::from_utf8_lossy(&output.stdout))
}

fn parse_probe_duration(json: &str) -> Result<f64, ConversionError> {
    let parsed: serde_json::Value = serde_json::from_str(json)
        .map_err(|_| ConversionError::Probe("invalid ffprobe output".into()))?;

    parsed["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| ConversionError::Probe("could not determine duration".into()))
}

/// Probe the source and derive the bitrate to encode at.
pub async fn probe_bitrate(program: &str, path: &Path) -> Result<u32, ConversionError> {
    let size = tokio::fs::metadata(path).await?.len();
    let duration = probe_duration(program, path).await?;
    bitrate_kbps(size, duration)
        .ok_or_else(|| ConversionError::Probe(format!("non-positive duration {}", duration)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::scheme::{resolve_scheme, TargetFormat};
    use std::path::PathBuf;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_bitrate_rounds_up() {
        assert_eq!(bitrate_kbps(1_250_000, 100.0), Some(101));
        assert_eq!(bitrate_kbps(1_000, 0.0), None);
        assert_eq!(bitrate_kbps(1_000, f64::NAN), None);
    }

    #[test]
    fn test_copy_with_cover() {
        let scheme = resolve_scheme("m4a", TargetFormat::M4a, true);
        let args = strings(&build_args(
            &PathBuf::from("/d/tmp/a.m4a"),
            &PathBuf::from("/d/a.m4a"),
            &scheme,
            None,
            true,
        ));

        assert_eq!(
            args,
            vec![
                "-y", "-loglevel", "error", "-i", "/d/tmp/a.m4a", "-i", "pipe:0", "-map", "0:a",
                "-map", "1:v", "-c:a", "copy", "-c:v", "mjpeg", "-disposition:v:0",
                "attached_pic", "/d/a.m4a",
            ]
        );
    }

    #[test]
    fn test_reencode_without_cover() {
        let scheme = resolve_scheme("m4a", TargetFormat::Opus, true);
        let args = strings(&build_args(
            &PathBuf::from("/d/tmp/a.m4a"),
            &PathBuf::from("/d/a.opus"),
            &scheme,
            Some(129),
            true,
        ));

        assert!(args.contains(&"-vn".to_string()));
        assert!(!args.contains(&"pipe:0".to_string()));
        let codec = args.iter().position(|a| a == "-c:a").unwrap();
        assert_eq!(args[codec + 1], "libopus");
        let rate = args.iter().position(|a| a == "-b:a").unwrap();
        assert_eq!(args[rate + 1], "129k");
        assert_eq!(args.last().unwrap(), "/d/a.opus");
    }

    #[test]
    fn test_no_cover_file_means_no_image_input() {
        let scheme = resolve_scheme("webm", TargetFormat::Mp3, true);
        let args = strings(&build_args(
            &PathBuf::from("/d/tmp/a.webm"),
            &PathBuf::from("/d/a.mp3"),
            &scheme,
            Some(160),
            false,
        ));
        assert!(!args.contains(&"attached_pic".to_string()));
        assert!(args.contains(&"-vn".to_string()));
    }

    #[test]
    fn test_parse_probe_duration() {
        let json = r#"{"format": {"filename": "a.webm", "duration": "212.341000"}}"#;
        assert!((parse_probe_duration(json).unwrap() - 212.341).abs() < 1e-9);
        assert!(parse_probe_duration(r#"{"format": {}}"#).is_err());
        assert!(parse_probe_duration("not json").is_err());
    }

    #[tokio::test]
    async fn test_missing_ffmpeg() {
        let err = run_ffmpeg("ytaudio-no-such-ffmpeg", &[], None).await.unwrap_err();
        assert!(matches!(err, ConversionError::ToolNotFound(_)));
    }
}
