// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Platform-message source: tracks attached to chat messages.
//!
//! Accepts `https://t.me/<username>/<id>` and `https://t.me/c/<chatid>/<id>`
//! URLs, resolved through the chat-platform client. Attachments are always
//! downloaded to the configured downloads directory, never into memory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use echotune_core::traits::platform::PlatformMessage;
use echotune_core::types::{Platform, Track};
use echotune_core::{Error, PlatformClient};
use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::download::sanitize_filename;
use crate::{MusicSource, ResolverContext};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

static MESSAGE_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://t\.me/(?:c/(\d+)|([a-zA-Z0-9_]{4,}))/(\d+)$").unwrap()
});

/// Whether `url` addresses a single platform message.
pub fn is_message_url(url: &str) -> bool {
    MESSAGE_URL_RE.is_match(url.trim())
}

pub struct TelegramSource {
    ctx: Arc<ResolverContext>,
    client: Arc<dyn PlatformClient>,
    query: String,
}

impl TelegramSource {
    pub fn new(ctx: Arc<ResolverContext>, client: Arc<dyn PlatformClient>, query: &str) -> Self {
        Self {
            ctx,
            client,
            query: query.trim().to_string(),
        }
    }

    async fn resolve(&self) -> Result<PlatformMessage, Error> {
        let message = self.client.resolve_message(&self.query).await?;
        if message.file.is_none() {
            return Err(Error::ResolverNotFound(
                "message has no downloadable file".into(),
            ));
        }
        Ok(message)
    }

    fn track_from(&self, message: &PlatformMessage) -> Option<Track> {
        let file = message.file.as_ref()?;
        let mut track = Track::new(
            &message.link,
            sanitize_filename(&file.name),
            Platform::Telegram,
            &file.file_id,
        );
        track.duration_secs = file.duration_secs;
        Some(track)
    }
}

#[async_trait]
impl MusicSource for TelegramSource {
    fn is_valid(&self) -> bool {
        is_message_url(&self.query)
    }

    async fn get_info(&self, _cancel: &CancellationToken) -> Result<Vec<Track>, Error> {
        if !self.is_valid() {
            return Err(Error::ResolverInvalidInput(self.query.clone()));
        }
        let message = self.resolve().await?;
        let track = self
            .track_from(&message)
            .ok_or_else(|| Error::ResolverNotFound("message has no downloadable file".into()))?;
        Ok(vec![track])
    }

    async fn search(&self, cancel: &CancellationToken) -> Result<Vec<Track>, Error> {
        self.get_info(cancel).await
    }

    async fn get_track(&self, cancel: &CancellationToken) -> Result<Track, Error> {
        let mut tracks = self.get_info(cancel).await?;
        tracks
            .pop()
            .ok_or_else(|| Error::ResolverNotFound(self.query.clone()))
    }

    async fn download_track(
        &self,
        track: &Track,
        _video: bool,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, Error> {
        let message = self.resolve().await?;
        let file = message
            .file
            .as_ref()
            .ok_or_else(|| Error::ResolverNotFound("message has no file".into()))?;

        let file_name = sanitize_filename(&file.name);
        let file_name = if file_name.is_empty() {
            format!("{}.bin", sanitize_filename(&track.track_id))
        } else {
            file_name
        };
        let dest = Path::new(&self.ctx.downloads.dir).join(file_name);
        if dest.exists() {
            return Ok(dest);
        }

        let download = self.client.download_file(file, &dest);
        tokio::select! {
            result = tokio::time::timeout(DOWNLOAD_TIMEOUT, download) => {
                result.map_err(|_| Error::Timeout { duration: DOWNLOAD_TIMEOUT })?
            }
            _ = cancel.cancelled() => Err(Error::Cancelled),
        }
    }
}
