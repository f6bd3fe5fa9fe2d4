// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Source resolution for play requests.
//!
//! A query (URL or free text) is classified into one source variant; the
//! wrapper then behaves identically to its choice through the shared
//! [`MusicSource`] capability set. Priority order: platform message >
//! video platform > API gateway > direct link > the configured default
//! service.

pub mod direct;
pub mod download;
pub mod gateway;
pub mod probe;
pub mod search;
pub mod spotify;
pub mod telegram;
pub mod youtube;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use echotune_config::model::{DefaultService, DownloadConfig, SourceConfig};
use echotune_core::types::Track;
use echotune_core::{Error, PlatformClient};
use tokio_util::sync::CancellationToken;

use crate::direct::DirectSource;
use crate::gateway::GatewaySource;
use crate::telegram::TelegramSource;
use crate::youtube::YoutubeSource;

/// Shared context threaded into every source variant.
pub struct ResolverContext {
    pub sources: SourceConfig,
    pub downloads: DownloadConfig,
    pub http: reqwest::Client,
    /// Primary bot client, used by the platform-message variant. `None` in
    /// contexts without a platform connection (classification still works).
    pub platform: Option<Arc<dyn PlatformClient>>,
}

impl ResolverContext {
    pub fn new(
        sources: SourceConfig,
        downloads: DownloadConfig,
        platform: Option<Arc<dyn PlatformClient>>,
    ) -> Self {
        Self {
            sources,
            downloads,
            http: reqwest::Client::new(),
            platform,
        }
    }
}

/// Capability set every source variant provides.
#[async_trait]
pub trait MusicSource: Send + Sync {
    /// Whether this variant can handle its query at all.
    fn is_valid(&self) -> bool;

    /// Metadata for a track or a multi-track container (playlist, album).
    async fn get_info(&self, cancel: &CancellationToken) -> Result<Vec<Track>, Error>;

    /// Free-text search; first result is the best match.
    async fn search(&self, cancel: &CancellationToken) -> Result<Vec<Track>, Error>;

    /// Detailed descriptor for a single track, including CDN fields.
    async fn get_track(&self, cancel: &CancellationToken) -> Result<Track, Error>;

    /// Produce a local path (or streamable URL) for the track.
    async fn download_track(
        &self,
        track: &Track,
        video: bool,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, Error>;
}

/// The variant a query was classified into. Test-visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Telegram,
    Youtube,
    Gateway,
    Direct,
}

enum Variant {
    Telegram(TelegramSource),
    Youtube(YoutubeSource),
    Gateway(GatewaySource),
    Direct(DirectSource),
}

/// Wrapper that picks one variant per query and delegates to it.
pub struct SourceResolver {
    query: String,
    variant: Variant,
}

impl SourceResolver {
    /// Classifies `query` and binds the winning variant.
    pub fn new(ctx: Arc<ResolverContext>, query: &str) -> Self {
        let query = query.trim().to_string();

        let telegram = ctx
            .platform
            .clone()
            .map(|client| TelegramSource::new(ctx.clone(), client, &query));
        let yt = YoutubeSource::new(ctx.clone(), &query);
        let api = GatewaySource::new(ctx.clone(), &query);
        let direct = DirectSource::new(&query);

        let variant = if let Some(telegram) = telegram.filter(TelegramSource::is_valid) {
            Variant::Telegram(telegram)
        } else if yt.is_valid() {
            Variant::Youtube(yt)
        } else if api.is_valid() {
            Variant::Gateway(api)
        } else if direct.is_valid() {
            Variant::Direct(direct)
        } else {
            match ctx.sources.default_service {
                DefaultService::Spotify => Variant::Gateway(api),
                DefaultService::Youtube => Variant::Youtube(yt),
            }
        };

        Self { query, variant }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Which variant won classification.
    pub fn kind(&self) -> SourceKind {
        match self.variant {
            Variant::Telegram(_) => SourceKind::Telegram,
            Variant::Youtube(_) => SourceKind::Youtube,
            Variant::Gateway(_) => SourceKind::Gateway,
            Variant::Direct(_) => SourceKind::Direct,
        }
    }

    fn inner(&self) -> &dyn MusicSource {
        match &self.variant {
            Variant::Telegram(s) => s,
            Variant::Youtube(s) => s,
            Variant::Gateway(s) => s,
            Variant::Direct(s) => s,
        }
    }
}

#[async_trait]
impl MusicSource for SourceResolver {
    fn is_valid(&self) -> bool {
        self.inner().is_valid()
    }

    async fn get_info(&self, cancel: &CancellationToken) -> Result<Vec<Track>, Error> {
        self.inner().get_info(cancel).await
    }

    async fn search(&self, cancel: &CancellationToken) -> Result<Vec<Track>, Error> {
        self.inner().search(cancel).await
    }

    async fn get_track(&self, cancel: &CancellationToken) -> Result<Track, Error> {
        self.inner().get_track(cancel).await
    }

    async fn download_track(
        &self,
        track: &Track,
        video: bool,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, Error> {
        self.inner().download_track(track, video, cancel).await
    }
}

/// Produces a playable local path (or streamable URL) for a queued track.
///
/// Direct links stream as-is; platform-message tracks download through the
/// bot client; everything else goes through the wrapper for its platform.
/// A wrapper result that is itself a platform-message URL is chased once.
pub async fn download_song(
    ctx: &Arc<ResolverContext>,
    track: &Track,
    cancel: &CancellationToken,
) -> Result<PathBuf, Error> {
    match track.platform {
        echotune_core::Platform::DirectLink => Ok(PathBuf::from(&track.url)),
        echotune_core::Platform::Telegram => {
            let client = ctx
                .platform
                .clone()
                .ok_or_else(|| Error::download("no platform client for message download"))?;
            let source = TelegramSource::new(ctx.clone(), client, &track.url);
            source.download_track(track, track.is_video, cancel).await
        }
        _ => {
            let resolver = SourceResolver::new(ctx.clone(), &track.url);
            if !resolver.is_valid() {
                return Err(Error::ResolverInvalidInput(track.url.clone()));
            }
            let resolved = resolver.get_track(cancel).await?;
            let path = resolver
                .download_track(&resolved, track.is_video, cancel)
                .await?;

            let path_str = path.to_string_lossy();
            if telegram::is_message_url(&path_str) {
                let client = ctx.platform.clone().ok_or_else(|| {
                    Error::download("no platform client for message download")
                })?;
                let source = TelegramSource::new(ctx.clone(), client, &path_str);
                return source.download_track(track, track.is_video, cancel).await;
            }
            Ok(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(api: bool) -> Arc<ResolverContext> {
        let mut sources = SourceConfig::default();
        if api {
            sources.api_url = "https://gateway.example.org".into();
            sources.api_key = "k".into();
        }
        Arc::new(ResolverContext::new(
            sources,
            DownloadConfig::default(),
            None,
        ))
    }

    #[test]
    fn classifier_fixtures() {
        let ctx = ctx(true);
        let cases = [
            (
                "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
                SourceKind::Youtube,
            ),
            ("https://youtu.be/dQw4w9WgXcQ", SourceKind::Youtube),
            (
                "https://www.youtube.com/shorts/dQw4w9WgXcQ",
                SourceKind::Youtube,
            ),
            (
                "https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC",
                SourceKind::Gateway,
            ),
            (
                "https://music.apple.com/us/song/test/1234567890",
                SourceKind::Gateway,
            ),
            (
                "https://www.jiosaavn.com/song/tum-hi-ho/OgwNWCGBVFs",
                SourceKind::Gateway,
            ),
            ("https://example.org/audio.mp3", SourceKind::Direct),
            ("http://example.org/stream", SourceKind::Direct),
        ];
        for (query, expected) in cases {
            let resolver = SourceResolver::new(ctx.clone(), query);
            assert_eq!(resolver.kind(), expected, "query: {query}");
        }
    }

    #[tokio::test]
    async fn direct_link_downloads_to_its_own_url() {
        let mut track = Track::new(
            "https://example.org/a.mp3",
            "a",
            echotune_core::Platform::DirectLink,
            "https://example.org/a.mp3",
        );
        track.duration_secs = 10;
        let path = download_song(&ctx(false), &track, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(path, PathBuf::from("https://example.org/a.mp3"));
    }

    #[test]
    fn free_text_falls_back_to_default_service() {
        let resolver = SourceResolver::new(ctx(false), "never gonna give you up");
        assert_eq!(resolver.kind(), SourceKind::Youtube);
    }

    #[test]
    fn gateway_requires_credentials() {
        // Without gateway credentials a Spotify URL cannot be served.
        let resolver = SourceResolver::new(
            ctx(false),
            "https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC",
        );
        assert_eq!(resolver.kind(), SourceKind::Direct);
    }
}
