// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Video-platform source.
//!
//! Recognizes canonical watch/short/shortened URL forms, searches through
//! the public JSON endpoint, and downloads either through the API gateway
//! (audio, when configured) or the external `yt-dlp` binary.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use echotune_core::types::Track;
use echotune_core::Error;
use rand::seq::SliceRandom;
use regex::Regex;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::download::Download;
use crate::gateway::GatewaySource;
use crate::search::search_youtube;
use crate::{MusicSource, ResolverContext};

const SEARCH_LIMIT: usize = 5;
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(150);

static WATCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.)?youtube\.com/watch\?v=([\w-]{11})(?:[&#?].*)?$").unwrap()
});
static SHORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.)?youtu\.be/([\w-]{11})(?:[?#].*)?$").unwrap()
});
static SHORTS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.)?youtube\.com/shorts/([\w-]{11})(?:[?#].*)?$").unwrap()
});

/// Strips fragments and extra query parameters from a pasted URL.
fn clear_query(query: &str) -> String {
    let query = query.split('#').next().unwrap_or("");
    let query = query.split('&').next().unwrap_or("");
    query.trim().to_string()
}

/// Converts shortened/shorts forms into the standard watch URL.
fn normalize_url(url: &str) -> String {
    for marker in ["youtu.be/", "youtube.com/shorts/"] {
        if let Some(rest) = url.split(marker).nth(1) {
            let id = rest.split(['?', '#']).next().unwrap_or("");
            return format!("https://www.youtube.com/watch?v={id}");
        }
    }
    url.to_string()
}

/// Extracts the 11-character video id from any recognized URL form.
fn extract_video_id(url: &str) -> Option<String> {
    let url = normalize_url(url);
    for pattern in [&*WATCH_RE, &*SHORT_RE, &*SHORTS_RE] {
        if let Some(captures) = pattern.captures(&url) {
            return Some(captures[1].to_string());
        }
    }
    None
}

pub struct YoutubeSource {
    ctx: Arc<ResolverContext>,
    query: String,
}

impl YoutubeSource {
    pub fn new(ctx: Arc<ResolverContext>, query: &str) -> Self {
        Self {
            ctx,
            query: clear_query(query),
        }
    }

    fn gateway_configured(&self) -> bool {
        !self.ctx.sources.api_url.is_empty() && !self.ctx.sources.api_key.is_empty()
    }

    /// One cookie jar chosen uniformly at random, when any are configured.
    fn pick_cookie_file(&self) -> Option<&str> {
        self.ctx
            .sources
            .cookies_path
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
    }

    fn ytdlp_args(&self, video_id: &str, video: bool) -> Vec<String> {
        let output_template = Path::new(&self.ctx.downloads.dir)
            .join("%(id)s.%(ext)s")
            .to_string_lossy()
            .into_owned();

        let mut args: Vec<String> = [
            "--no-warnings",
            "--quiet",
            "--geo-bypass",
            "--retries",
            "2",
            "--continue",
            "--no-part",
            "--concurrent-fragments",
            "3",
            "--socket-timeout",
            "10",
            "--throttled-rate",
            "100K",
            "--retry-sleep",
            "1",
            "--no-write-thumbnail",
            "--no-write-info-json",
            "--no-embed-metadata",
            "--no-embed-chapters",
            "--no-embed-subs",
            "-o",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.push(output_template);

        if video {
            args.push("-f".into());
            args.push("bestvideo[height<=720]+bestaudio/best[height<=720]".into());
            args.push("--merge-output-format".into());
            args.push("mp4".into());
        } else {
            args.push("--extract-audio".into());
            args.push("--audio-format".into());
            args.push("best".into());
        }

        if let Some(cookie_file) = self.pick_cookie_file() {
            args.push("--cookies".into());
            args.push(cookie_file.to_string());
        } else if !self.ctx.sources.proxy.is_empty() {
            args.push("--proxy".into());
            args.push(self.ctx.sources.proxy.clone());
        }

        args.push(format!("https://www.youtube.com/watch?v={video_id}"));
        args.push("--print".into());
        args.push("after_move:filepath".into());

        args
    }

    /// Spawns `yt-dlp` with a bounded timeout and returns the reported path.
    async fn download_with_ytdlp(
        &self,
        video_id: &str,
        video: bool,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, Error> {
        if video_id.is_empty() {
            return Err(Error::download("empty video id"));
        }

        let args = self.ytdlp_args(video_id, video);
        debug!(video_id, video, "invoking yt-dlp");

        let run = Command::new("yt-dlp").args(&args).output();
        let output = tokio::select! {
            result = tokio::time::timeout(DOWNLOAD_TIMEOUT, run) => {
                result
                    .map_err(|_| Error::Timeout { duration: DOWNLOAD_TIMEOUT })?
                    .map_err(|e| Error::DownloadFailed {
                        message: "yt-dlp spawn failed".into(),
                        source: Some(Box::new(e)),
                    })?
            }
            _ = cancel.cancelled() => return Err(Error::Cancelled),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::download(format!(
                "yt-dlp exited with {:?}: {}",
                output.status.code(),
                stderr.trim()
            )));
        }

        let path_str = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if path_str.is_empty() {
            return Err(Error::download(format!(
                "yt-dlp reported no output path for {video_id}"
            )));
        }

        let path = PathBuf::from(&path_str);
        if !path.exists() {
            return Err(Error::download(format!(
                "downloaded file missing at reported path {path_str}"
            )));
        }

        Ok(path)
    }

    /// Audio download through the API gateway's CDN resolution.
    async fn download_with_gateway(
        &self,
        video_id: &str,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, Error> {
        let url = format!("https://www.youtube.com/watch?v={video_id}");
        let gateway = GatewaySource::new(self.ctx.clone(), &url);
        let track = gateway.get_track(cancel).await?;
        Download::new(self.ctx.clone(), &track)?.process(cancel).await
    }
}

#[async_trait]
impl MusicSource for YoutubeSource {
    fn is_valid(&self) -> bool {
        !self.query.is_empty()
            && [&*WATCH_RE, &*SHORT_RE, &*SHORTS_RE]
                .iter()
                .any(|p| p.is_match(&self.query))
    }

    async fn get_info(&self, _cancel: &CancellationToken) -> Result<Vec<Track>, Error> {
        if !self.is_valid() {
            return Err(Error::ResolverInvalidInput(self.query.clone()));
        }

        let normalized = normalize_url(&self.query);
        let video_id = extract_video_id(&normalized)
            .ok_or_else(|| Error::ResolverInvalidInput(self.query.clone()))?;

        let tracks = search_youtube(&self.ctx.http, &video_id, SEARCH_LIMIT).await?;
        let matched: Vec<Track> = tracks
            .into_iter()
            .filter(|t| t.track_id == video_id)
            .take(1)
            .collect();

        if matched.is_empty() {
            return Err(Error::ResolverNotFound(video_id));
        }
        Ok(matched)
    }

    async fn search(&self, _cancel: &CancellationToken) -> Result<Vec<Track>, Error> {
        let tracks = search_youtube(&self.ctx.http, &self.query, SEARCH_LIMIT).await?;
        if tracks.is_empty() {
            return Err(Error::ResolverNotFound(self.query.clone()));
        }
        Ok(tracks)
    }

    async fn get_track(&self, cancel: &CancellationToken) -> Result<Track, Error> {
        if self.query.is_empty() {
            return Err(Error::ResolverInvalidInput("empty query".into()));
        }
        if !self.is_valid() {
            return Err(Error::ResolverInvalidInput(self.query.clone()));
        }

        // The gateway resolves CDN fields the direct path cannot.
        if self.gateway_configured() {
            let gateway = GatewaySource::new(self.ctx.clone(), &self.query);
            if let Ok(track) = gateway.get_track(cancel).await {
                return Ok(track);
            }
        }

        let mut tracks = self.get_info(cancel).await?;
        let result = tracks
            .drain(..)
            .next()
            .ok_or_else(|| Error::ResolverNotFound(self.query.clone()));
        result
    }

    async fn download_track(
        &self,
        track: &Track,
        video: bool,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, Error> {
        if !video && self.gateway_configured() {
            match self.download_with_gateway(&track.track_id, cancel).await {
                Ok(path) => return Ok(path),
                Err(e) => {
                    warn!(track_id = %track.track_id, error = %e,
                        "gateway download failed, falling back to yt-dlp");
                }
            }
        }

        self.download_with_ytdlp(&track.track_id, video, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echotune_config::model::{DownloadConfig, SourceConfig};

    fn source(query: &str) -> YoutubeSource {
        let ctx = Arc::new(ResolverContext::new(
            SourceConfig::default(),
            DownloadConfig::default(),
            None,
        ));
        YoutubeSource::new(ctx, query)
    }

    #[test]
    fn recognizes_canonical_forms() {
        assert!(source("https://www.youtube.com/watch?v=dQw4w9WgXcQ").is_valid());
        assert!(source("https://youtu.be/dQw4w9WgXcQ").is_valid());
        assert!(source("https://www.youtube.com/shorts/dQw4w9WgXcQ").is_valid());
        assert!(source("youtube.com/watch?v=dQw4w9WgXcQ").is_valid());
        assert!(!source("https://www.youtube.com/playlist?list=PLx").is_valid());
        assert!(!source("plain text query").is_valid());
    }

    #[test]
    fn extracts_video_id_from_every_form() {
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?t=30",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
        ] {
            assert_eq!(extract_video_id(url).as_deref(), Some("dQw4w9WgXcQ"), "{url}");
        }
        assert!(extract_video_id("https://example.org/watch?v=dQw4w9WgXcQ").is_none());
    }

    #[test]
    fn clear_query_strips_extra_params() {
        assert_eq!(
            clear_query("https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PLx#t=1"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }

    #[test]
    fn audio_args_extract_audio_without_format_selector() {
        let s = source("https://youtu.be/dQw4w9WgXcQ");
        let args = s.ytdlp_args("dQw4w9WgXcQ", false);
        assert!(args.contains(&"--extract-audio".to_string()));
        assert!(!args.iter().any(|a| a.contains("bestvideo")));
        assert!(args.contains(&"--print".to_string()));
    }

    #[test]
    fn video_args_cap_height_and_merge_mp4() {
        let s = source("https://youtu.be/dQw4w9WgXcQ");
        let args = s.ytdlp_args("dQw4w9WgXcQ", true);
        let format_pos = args.iter().position(|a| a == "-f").unwrap();
        assert_eq!(
            args[format_pos + 1],
            "bestvideo[height<=720]+bestaudio/best[height<=720]"
        );
        assert!(args.contains(&"--merge-output-format".to_string()));
        assert!(args.contains(&"mp4".to_string()));
    }

    #[test]
    fn proxy_is_used_only_without_cookies() {
        let mut sources = SourceConfig::default();
        sources.proxy = "socks5://127.0.0.1:9050".into();
        let ctx = Arc::new(ResolverContext::new(
            sources,
            DownloadConfig::default(),
            None,
        ));
        let s = YoutubeSource::new(ctx, "https://youtu.be/dQw4w9WgXcQ");
        let args = s.ytdlp_args("dQw4w9WgXcQ", false);
        assert!(args.contains(&"--proxy".to_string()));

        let mut sources = SourceConfig::default();
        sources.proxy = "socks5://127.0.0.1:9050".into();
        sources.cookies_path = vec!["cookies/a.txt".into()];
        let ctx = Arc::new(ResolverContext::new(
            sources,
            DownloadConfig::default(),
            None,
        ));
        let s = YoutubeSource::new(ctx, "https://youtu.be/dQw4w9WgXcQ");
        let args = s.ytdlp_args("dQw4w9WgXcQ", false);
        assert!(args.contains(&"--cookies".to_string()));
        assert!(!args.contains(&"--proxy".to_string()));
    }
}
