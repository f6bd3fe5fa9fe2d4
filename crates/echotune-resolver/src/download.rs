// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CDN download handling.
//!
//! Plain CDN URLs are returned as-is (the engine streams them); protected
//! Spotify payloads are fetched, decrypted, and remuxed locally. Download
//! artifacts are keyed by track id so an interrupted transfer is simply
//! redone.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::LazyLock;

use echotune_core::types::{Platform, Track};
use echotune_core::Error;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::spotify;
use crate::ResolverContext;

static SANITIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*]"#).unwrap());
static FILENAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"filename\*?=(?:UTF-8'')?([^;]+)").unwrap());

/// Strips characters that are invalid in filesystem names.
pub fn sanitize_filename(name: &str) -> String {
    SANITIZE_RE.replace_all(name, "").trim().to_string()
}

/// Extracts the original filename from a `Content-Disposition` header.
pub fn extract_filename(content_disposition: &str) -> Option<String> {
    let captured = FILENAME_RE.captures(content_disposition)?;
    let raw = captured.get(1)?.as_str().trim_matches('"');
    Some(sanitize_filename(raw))
}

/// One validated download operation for a resolved track.
pub struct Download {
    ctx: Arc<ResolverContext>,
    track: Track,
}

impl Download {
    /// Fails when the track carries no CDN URL to fetch from.
    pub fn new(ctx: Arc<ResolverContext>, track: &Track) -> Result<Self, Error> {
        if track.cdn_url.as_deref().unwrap_or("").is_empty() {
            return Err(Error::download("missing CDN URL"));
        }
        Ok(Self {
            ctx,
            track: track.clone(),
        })
    }

    /// Produces a playable local path or streamable URL for the track.
    pub async fn process(&self, cancel: &CancellationToken) -> Result<PathBuf, Error> {
        let cdn_url = self
            .track
            .cdn_url
            .as_deref()
            .ok_or_else(|| Error::download("missing CDN URL"))?;

        let is_spotify_protected = self.track.platform == Platform::Spotify
            && self
                .track
                .decryption_key
                .as_deref()
                .is_some_and(|k| !k.is_empty());

        if is_spotify_protected {
            return spotify::process_protected(&self.ctx, &self.track, cancel).await;
        }

        // The engine streams plain CDN URLs directly; no local copy needed.
        Ok(PathBuf::from(cdn_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echotune_config::model::{DownloadConfig, SourceConfig};

    fn ctx() -> Arc<ResolverContext> {
        Arc::new(ResolverContext::new(
            SourceConfig::default(),
            DownloadConfig::default(),
            None,
        ))
    }

    #[test]
    fn sanitize_strips_invalid_chars() {
        assert_eq!(sanitize_filename("a/b\\c:d*e?f\"g<h>i|j"), "abcdefghij");
        assert_eq!(sanitize_filename("  plain name.mp3 "), "plain name.mp3");
    }

    #[test]
    fn extract_filename_handles_both_forms() {
        assert_eq!(
            extract_filename("attachment; filename=\"song.mp3\"").as_deref(),
            Some("song.mp3")
        );
        assert_eq!(
            extract_filename("attachment; filename*=UTF-8''song.ogg").as_deref(),
            Some("song.ogg")
        );
        assert_eq!(extract_filename("inline"), None);
    }

    #[test]
    fn download_requires_cdn_url() {
        let track = Track::new("https://x", "x", Platform::Spotify, "id");
        assert!(Download::new(ctx(), &track).is_err());
    }

    #[tokio::test]
    async fn plain_cdn_url_is_returned_unfetched() {
        let mut track = Track::new("https://x", "x", Platform::JioSaavn, "id");
        track.cdn_url = Some("https://cdn.example.org/a.m4a".into());
        let download = Download::new(ctx(), &track).unwrap();
        let path = download.process(&CancellationToken::new()).await.unwrap();
        assert_eq!(path, PathBuf::from("https://cdn.example.org/a.m4a"));
    }
}
