// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local media probing via ffprobe.
//!
//! Duration probes carry a 2-second ceiling and degrade to "unknown" (0)
//! rather than failing playback; dimension probes get 10 seconds.

use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;
use tracing::warn;

use echotune_core::Error;

const DURATION_TIMEOUT: Duration = Duration::from_secs(2);
const DIMENSIONS_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
pub struct FfprobeOutput {
    #[serde(default)]
    pub format: FfprobeFormat,
}

#[derive(Debug, Default, Deserialize)]
pub struct FfprobeFormat {
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub tags: FfprobeTags,
}

#[derive(Debug, Default, Deserialize)]
pub struct FfprobeTags {
    #[serde(default)]
    pub title: Option<String>,
}

/// Runs ffprobe with `-show_format` against `input` (path or URL).
pub async fn probe_format(input: &str, timeout: Duration) -> Result<FfprobeOutput, Error> {
    let run = Command::new("ffprobe")
        .args(["-v", "quiet", "-print_format", "json", "-show_format"])
        .arg(input)
        .output();

    let output = tokio::time::timeout(timeout, run)
        .await
        .map_err(|_| Error::Timeout { duration: timeout })?
        .map_err(|e| Error::TranscodeFailed(format!("ffprobe spawn failed: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::TranscodeFailed(format!(
            "ffprobe exited with {:?}: {}",
            output.status.code(),
            stderr.trim()
        )));
    }

    serde_json::from_slice(&output.stdout)
        .map_err(|e| Error::TranscodeFailed(format!("ffprobe output parse failed: {e}")))
}

/// Duration of a local file or URL in whole seconds; 0 when unknown.
///
/// Never fails: probe errors are logged and reported as unknown.
pub async fn media_duration(input: &str) -> u32 {
    match probe_format(input, DURATION_TIMEOUT).await {
        Ok(probed) => probed
            .format
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .map(|d| (d + 0.5) as u32)
            .unwrap_or(0),
        Err(e) => {
            warn!(input, error = %e, "duration probe failed");
            0
        }
    }
}

/// Width and height of the first video stream; `None` when probing fails.
pub async fn video_dimensions(input: &str) -> Option<(u32, u32)> {
    let run = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=s=x:p=0",
        ])
        .arg(input)
        .output();

    let output = match tokio::time::timeout(DIMENSIONS_TIMEOUT, run).await {
        Ok(Ok(output)) if output.status.success() => output,
        Ok(Ok(output)) => {
            warn!(
                input,
                code = output.status.code(),
                "dimension probe exited non-zero"
            );
            return None;
        }
        Ok(Err(e)) => {
            warn!(input, error = %e, "dimension probe spawn failed");
            return None;
        }
        Err(_) => {
            warn!(input, "dimension probe timed out");
            return None;
        }
    };

    let text = String::from_utf8_lossy(&output.stdout);
    let mut parts = text.trim().split('x');
    let width = parts.next()?.parse().ok()?;
    let height = parts.next()?.parse().ok()?;
    if width == 0 || height == 0 {
        return None;
    }
    Some((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_output_parses_duration_and_title() {
        let json = r#"{"format":{"duration":"212.091","tags":{"title":"A Song"}}}"#;
        let parsed: FfprobeOutput = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.format.duration.as_deref(), Some("212.091"));
        assert_eq!(parsed.format.tags.title.as_deref(), Some("A Song"));
    }

    #[test]
    fn format_output_tolerates_missing_fields() {
        let parsed: FfprobeOutput = serde_json::from_str("{}").unwrap();
        assert!(parsed.format.duration.is_none());
        assert!(parsed.format.tags.title.is_none());
    }

    #[tokio::test]
    async fn missing_file_reports_unknown_duration() {
        assert_eq!(media_duration("/nonexistent/file.mp3").await, 0);
    }
}
