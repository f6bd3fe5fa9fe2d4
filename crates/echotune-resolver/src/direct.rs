// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Direct-link source: any http(s) URL the transcoder can ingest.
//!
//! Metadata comes from a local ffprobe run; "download" returns the URL
//! itself since the engine streams remote inputs directly.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use echotune_core::types::{Platform, Track};
use echotune_core::Error;
use tokio_util::sync::CancellationToken;

use crate::probe;
use crate::MusicSource;

const MAX_TITLE_LEN: usize = 30;
const INFO_TIMEOUT: Duration = Duration::from_secs(20);

pub struct DirectSource {
    query: String,
}

impl DirectSource {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.trim().to_string(),
        }
    }

    /// Last path segment of the URL, unescaped and truncated, as a fallback
    /// title when the stream carries no tags.
    fn title_from_url(&self) -> String {
        let base = self
            .query
            .rsplit('/')
            .next()
            .unwrap_or("")
            .split(['?', '#'])
            .next()
            .unwrap_or("");
        let decoded = percent_decode(base);
        let title = if decoded.is_empty() {
            "Direct Link".to_string()
        } else {
            decoded
        };

        if title.chars().count() > MAX_TITLE_LEN {
            let cut: String = title.chars().take(MAX_TITLE_LEN - 3).collect();
            format!("{cut}...")
        } else {
            title
        }
    }
}

/// Minimal percent-decoding for display names; invalid escapes pass through.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(byte) = u8::from_str_radix(&input[i + 1..i + 3], 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[async_trait]
impl MusicSource for DirectSource {
    fn is_valid(&self) -> bool {
        self.query.starts_with("http://") || self.query.starts_with("https://")
    }

    async fn get_info(&self, cancel: &CancellationToken) -> Result<Vec<Track>, Error> {
        if !self.is_valid() {
            return Err(Error::ResolverInvalidInput(self.query.clone()));
        }

        let probed = tokio::select! {
            result = probe::probe_format(&self.query, INFO_TIMEOUT) => result
                .map_err(|e| Error::ResolverInvalidInput(format!(
                    "unplayable link {}: {e}", self.query
                )))?,
            _ = cancel.cancelled() => return Err(Error::Cancelled),
        };

        let duration = probed
            .format
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .map(|d| d as u32)
            .unwrap_or(0);

        let title = probed
            .format
            .tags
            .title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.title_from_url());

        let mut track = Track::new(&self.query, title, Platform::DirectLink, &self.query);
        track.duration_secs = duration;
        Ok(vec![track])
    }

    async fn search(&self, cancel: &CancellationToken) -> Result<Vec<Track>, Error> {
        self.get_info(cancel).await
    }

    async fn get_track(&self, cancel: &CancellationToken) -> Result<Track, Error> {
        let mut tracks = self.get_info(cancel).await?;
        let mut track = tracks
            .pop()
            .ok_or_else(|| Error::ResolverNotFound(self.query.clone()))?;
        track.cdn_url = Some(self.query.clone());
        Ok(track)
    }

    async fn download_track(
        &self,
        _track: &Track,
        _video: bool,
        _cancel: &CancellationToken,
    ) -> Result<PathBuf, Error> {
        // The engine streams http(s) inputs; nothing to fetch locally.
        Ok(PathBuf::from(&self.query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_http_urls_are_valid() {
        assert!(DirectSource::new("https://example.org/a.mp3").is_valid());
        assert!(DirectSource::new("http://example.org/a.mp3").is_valid());
        assert!(!DirectSource::new("ftp://example.org/a.mp3").is_valid());
        assert!(!DirectSource::new("some search text").is_valid());
    }

    #[test]
    fn title_falls_back_to_url_segment() {
        let source = DirectSource::new("https://example.org/media/My%20Song.mp3?sig=x");
        assert_eq!(source.title_from_url(), "My Song.mp3");
    }

    #[test]
    fn long_titles_are_truncated() {
        let source = DirectSource::new(
            "https://example.org/a-very-long-file-name-that-never-seems-to-end.mp3",
        );
        let title = source.title_from_url();
        assert!(title.chars().count() <= 30);
        assert!(title.ends_with("..."));
    }

    #[tokio::test]
    async fn download_returns_the_url_itself() {
        let source = DirectSource::new("https://example.org/a.mp3");
        let track = Track::new(
            "https://example.org/a.mp3",
            "a",
            Platform::DirectLink,
            "https://example.org/a.mp3",
        );
        let path = source
            .download_track(&track, false, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(path, PathBuf::from("https://example.org/a.mp3"));
    }
}
