// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multi-provider API gateway source.
//!
//! One HTTP client covers several music platforms behind URL-regex
//! recognition. Every request carries the configured key in an `X-API-Key`
//! header. Paths: `get_url` (info), `search?limit=5`, `track`.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use echotune_core::types::{Platform, Track};
use echotune_core::Error;
use regex::Regex;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::download::Download;
use crate::youtube::YoutubeSource;
use crate::{MusicSource, ResolverContext};

const INFO_TIMEOUT: Duration = Duration::from_secs(20);
const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);
const SEARCH_LIMIT: u32 = 5;

static PLATFORM_PATTERNS: LazyLock<Vec<(Platform, Regex)>> = LazyLock::new(|| {
    vec![
        (
            Platform::Apple,
            Regex::new(r"(?i)^https?://music\.apple\.com/[a-zA-Z-]+/(?:song/(?:[^/]+/)?\d+|album/[^/]+/\d+(?:\?i=\d+)?|playlist/[^/]+/pl\.[\w.-]+|artist/[^/]+/\d+)(?:\?.*)?$").unwrap(),
        ),
        (
            Platform::Spotify,
            Regex::new(r"(?i)^(https?://)?([a-z0-9-]+\.)*spotify\.com/(track|playlist|album|artist)/[a-zA-Z0-9]+(\?.*)?$").unwrap(),
        ),
        (
            Platform::Youtube,
            Regex::new(r"(?i)^(?:https?://)?(?:www\.)?(?:youtube\.com|music\.youtube\.com)/(?:playlist|watch)\?.*\blist=([\w-]+)").unwrap(),
        ),
        (
            Platform::Youtube,
            Regex::new(r"(?i)^(?:https?://)?music\.youtube\.com/(?:watch|playlist)\?.*v=([\w-]+)").unwrap(),
        ),
        (
            Platform::JioSaavn,
            Regex::new(r"(?i)https?://(?:www\.)?jiosaavn\.com/(song|album|playlist|featured)/[^/]+/([A-Za-z0-9_]+)").unwrap(),
        ),
        (
            Platform::Deezer,
            Regex::new(r"(?i)https?://(?:www\.)?deezer\.com/(?:[a-z]{2}/)?(track|album|playlist)/(\d+)").unwrap(),
        ),
        (
            Platform::SoundCloud,
            Regex::new(r"(?i)^(https?://)?(www\.)?soundcloud\.com/[a-zA-Z0-9_-]+/(sets/)?[a-zA-Z0-9._-]+(\?.*)?$").unwrap(),
        ),
        (
            Platform::Gaana,
            Regex::new(r"(?i)https?://(?:www\.)?gaana\.com/(song|album|playlist|artist)/([A-Za-z0-9-]+)").unwrap(),
        ),
    ]
});

/// Wire shape of a single track from the gateway.
#[derive(Debug, Deserialize)]
struct ApiTrack {
    #[serde(default)]
    id: String,
    #[serde(default, alias = "title")]
    name: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    duration: u32,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    views: Option<String>,
    #[serde(default)]
    platform: Option<String>,
    #[serde(default)]
    cdnurl: Option<String>,
    #[serde(default)]
    key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiTracks {
    #[serde(default)]
    results: Vec<ApiTrack>,
}

impl ApiTrack {
    fn into_track(self, fallback_platform: Platform) -> Track {
        let platform = self
            .platform
            .as_deref()
            .and_then(|p| p.parse().ok())
            .unwrap_or(fallback_platform);

        let mut track = Track::new(self.url, self.name, platform, self.id);
        track.duration_secs = self.duration;
        track.thumbnail = self.thumbnail;
        track.channel = self.channel;
        track.views = self.views;
        track.cdn_url = self.cdnurl;
        track.decryption_key = self.key.filter(|k| !k.is_empty());
        track
    }
}

pub struct GatewaySource {
    ctx: Arc<ResolverContext>,
    query: String,
}

impl GatewaySource {
    pub fn new(ctx: Arc<ResolverContext>, query: &str) -> Self {
        Self {
            ctx,
            query: query.trim().to_string(),
        }
    }

    fn configured(&self) -> bool {
        !self.ctx.sources.api_url.is_empty() && !self.ctx.sources.api_key.is_empty()
    }

    fn base_url(&self) -> String {
        self.ctx.sources.api_url.trim_end_matches('/').to_string()
    }

    /// The platform whose URL pattern matched the query, if any.
    pub fn matched_platform(&self) -> Option<Platform> {
        PLATFORM_PATTERNS
            .iter()
            .find(|(_, pattern)| pattern.is_match(&self.query))
            .map(|(platform, _)| *platform)
    }

    async fn fetch_tracks(
        &self,
        path: &str,
        params: &[(&str, &str)],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ApiTracks, Error> {
        let request = self
            .ctx
            .http
            .get(format!("{}/api/{path}", self.base_url()))
            .query(params)
            .timeout(timeout)
            .header("X-API-Key", &self.ctx.sources.api_key)
            .send();

        let response = tokio::select! {
            result = request => result.map_err(|e| Error::Platform {
                message: format!("gateway {path} request failed"),
                source: Some(Box::new(e)),
            })?,
            _ = cancel.cancelled() => return Err(Error::Cancelled),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(Error::platform(format!(
                "gateway {path} returned status {status}"
            )));
        }

        response.json().await.map_err(|e| Error::Platform {
            message: format!("gateway {path} decode failed"),
            source: Some(Box::new(e)),
        })
    }
}

#[async_trait]
impl MusicSource for GatewaySource {
    fn is_valid(&self) -> bool {
        !self.query.is_empty() && self.configured() && self.matched_platform().is_some()
    }

    async fn get_info(&self, cancel: &CancellationToken) -> Result<Vec<Track>, Error> {
        if !self.is_valid() {
            return Err(Error::ResolverInvalidInput(self.query.clone()));
        }
        let fallback = self.matched_platform().unwrap_or(Platform::Youtube);
        let data = self
            .fetch_tracks("get_url", &[("url", &self.query)], INFO_TIMEOUT, cancel)
            .await?;
        if data.results.is_empty() {
            return Err(Error::ResolverNotFound(self.query.clone()));
        }
        Ok(data
            .results
            .into_iter()
            .map(|t| t.into_track(fallback))
            .collect())
    }

    async fn search(&self, cancel: &CancellationToken) -> Result<Vec<Track>, Error> {
        // A recognized URL is served as an info lookup; bare text hits search.
        if self.is_valid() {
            return self.get_info(cancel).await;
        }

        let limit = SEARCH_LIMIT.to_string();
        let data = self
            .fetch_tracks(
                "search",
                &[("query", self.query.as_str()), ("limit", limit.as_str())],
                SEARCH_TIMEOUT,
                cancel,
            )
            .await?;
        if data.results.is_empty() {
            return Err(Error::ResolverNotFound(self.query.clone()));
        }
        let fallback = Platform::Spotify;
        Ok(data
            .results
            .into_iter()
            .map(|t| t.into_track(fallback))
            .collect())
    }

    async fn get_track(&self, cancel: &CancellationToken) -> Result<Track, Error> {
        let fallback = self.matched_platform().unwrap_or(Platform::Youtube);
        let request = self
            .ctx
            .http
            .get(format!("{}/api/track", self.base_url()))
            .query(&[("url", &self.query)])
            .timeout(INFO_TIMEOUT)
            .header("X-API-Key", &self.ctx.sources.api_key)
            .send();

        let response = tokio::select! {
            result = request => result.map_err(|e| Error::Platform {
                message: "gateway track request failed".into(),
                source: Some(Box::new(e)),
            })?,
            _ = cancel.cancelled() => return Err(Error::Cancelled),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(Error::platform(format!(
                "gateway track returned status {status}"
            )));
        }

        let track: ApiTrack = response.json().await.map_err(|e| Error::Platform {
            message: "gateway track decode failed".into(),
            source: Some(Box::new(e)),
        })?;
        Ok(track.into_track(fallback))
    }

    async fn download_track(
        &self,
        track: &Track,
        video: bool,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, Error> {
        // Video requests for the video platform go through its own path.
        if track.platform == Platform::Youtube && video {
            let yt = YoutubeSource::new(self.ctx.clone(), &self.query);
            return yt.download_track(track, video, cancel).await;
        }

        match Download::new(self.ctx.clone(), track) {
            Ok(download) => match download.process(cancel).await {
                Ok(path) => Ok(path),
                Err(e) if track.platform == Platform::Youtube => {
                    tracing::warn!(track_id = %track.track_id, error = %e,
                        "gateway download failed, retrying via video platform");
                    let yt = YoutubeSource::new(self.ctx.clone(), &self.query);
                    yt.download_track(track, video, cancel).await
                }
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        }
    }
}
