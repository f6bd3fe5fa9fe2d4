// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Playback controller.
//!
//! Coordinates resolver, admission, engine, and per-chat state for every
//! control operation. Entry points are serialized per chat; no state lock is
//! held across resolver or download I/O.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use echotune_cache::ChatRegistry;
use echotune_core::types::{ChatId, QueueEntry, Track};
use echotune_core::util::sec_to_min;
use echotune_core::{Error, PlatformClient, Store};
use echotune_resolver::{download_song, MusicSource, ResolverContext, SourceResolver};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::admission::Admission;
use crate::media;
use crate::pool::AssistantPool;

/// Maximum queued tracks per chat.
pub const QUEUE_CAP: usize = 10;

pub const MIN_SEEK_SECONDS: u64 = 20;
pub const MIN_SPEED: f64 = 0.5;
pub const MAX_SPEED: f64 = 4.0;

/// Result of a play request, rendered by the command layer.
#[derive(Debug)]
pub enum PlayOutcome {
    /// The queue was empty; the track is now streaming.
    NowPlaying(QueueEntry),
    /// Appended behind the current track.
    Queued { position: usize, entry: QueueEntry },
    /// Multi-track enqueue summary.
    Batch {
        added: Vec<(usize, QueueEntry)>,
        skipped: Vec<String>,
        total_duration: u32,
        started: bool,
    },
}

/// Result of a queue advance.
#[derive(Debug)]
pub enum NextOutcome {
    /// The head replayed due to a positive loop counter.
    Replayed(QueueEntry),
    /// The next entry took over the head.
    Advanced(QueueEntry),
    /// The queue drained; the engine was stopped.
    Finished,
}

pub struct ControllerSettings {
    /// Tracks longer than this are refused; 0 disables the limit.
    pub duration_limit: u32,
    /// Chat receiving now-playing status lines; 0 disables.
    pub logger_id: i64,
}

pub struct PlaybackController {
    registry: Arc<ChatRegistry>,
    pool: Arc<AssistantPool>,
    admission: Arc<Admission>,
    resolver: Arc<ResolverContext>,
    store: Arc<dyn Store>,
    bot: Arc<dyn PlatformClient>,
    settings: ControllerSettings,
    serial: DashMap<i64, Arc<Mutex<()>>>,
}

impl PlaybackController {
    pub fn new(
        registry: Arc<ChatRegistry>,
        pool: Arc<AssistantPool>,
        admission: Arc<Admission>,
        resolver: Arc<ResolverContext>,
        store: Arc<dyn Store>,
        bot: Arc<dyn PlatformClient>,
        settings: ControllerSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            pool,
            admission,
            resolver,
            store,
            bot,
            settings,
            serial: DashMap::new(),
        })
    }

    pub fn registry(&self) -> &Arc<ChatRegistry> {
        &self.registry
    }

    pub fn admission(&self) -> &Arc<Admission> {
        &self.admission
    }

    /// Per-chat command lock: commands are observed in arrival order within
    /// one chat, with no ordering across chats.
    fn command_lock(&self, chat: ChatId) -> Arc<Mutex<()>> {
        self.serial
            .entry(chat.0)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Resolves a query (URL or free text) into candidate tracks.
    pub async fn resolve(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Track>, Error> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::ResolverInvalidInput("empty query".into()));
        }

        let resolver = SourceResolver::new(self.resolver.clone(), query);
        if query.starts_with("http://") || query.starts_with("https://") {
            if !resolver.is_valid() {
                return Err(Error::ResolverInvalidInput(query.to_string()));
            }
            resolver.get_info(cancel).await
        } else {
            let mut tracks = resolver.search(cancel).await?;
            tracks.truncate(1);
            Ok(tracks)
        }
    }

    /// Full play request: resolve, then enqueue or start playback.
    pub async fn play(
        &self,
        chat: ChatId,
        query: &str,
        is_video: bool,
        requester: &str,
        cancel: &CancellationToken,
    ) -> Result<PlayOutcome, Error> {
        let tracks = self.resolve(query, cancel).await?;
        if tracks.len() > 1 {
            self.enqueue_batch(chat, tracks, is_video, requester, cancel)
                .await
        } else {
            let track = tracks
                .into_iter()
                .next()
                .ok_or_else(|| Error::ResolverNotFound(query.to_string()))?;
            self.play_track(chat, track, is_video, requester, cancel)
                .await
        }
    }

    /// Enqueues one resolved track, starting playback if the queue was empty.
    pub async fn play_track(
        &self,
        chat: ChatId,
        mut track: Track,
        is_video: bool,
        requester: &str,
        cancel: &CancellationToken,
    ) -> Result<PlayOutcome, Error> {
        let lock = self.command_lock(chat);
        let _guard = lock.lock().await;

        if self.registry.queue_len(chat).await >= QUEUE_CAP {
            return Err(Error::QueueFull(QUEUE_CAP));
        }
        if self
            .registry
            .track_if_exists(chat, &track.track_id)
            .await
            .is_some()
        {
            return Err(Error::DuplicateTrack(track.title.clone()));
        }
        if self.settings.duration_limit > 0 && track.duration_secs > self.settings.duration_limit {
            return Err(Error::ResolverInvalidInput(format!(
                "track exceeds the {} minute limit",
                self.settings.duration_limit / 60
            )));
        }

        track.is_video = is_video;
        let entry = QueueEntry::new(track, requester);
        let position = self.registry.add_song(chat, entry.clone()).await;

        if position > 1 {
            return Ok(PlayOutcome::Queued { position, entry });
        }

        let playing = self.play_head(chat, entry, cancel).await?;
        Ok(PlayOutcome::NowPlaying(playing))
    }

    /// Multi-track enqueue: over-limit tracks are skipped and reported in
    /// aggregate; the first track added to an empty queue starts playback.
    pub async fn enqueue_batch(
        &self,
        chat: ChatId,
        tracks: Vec<Track>,
        is_video: bool,
        requester: &str,
        cancel: &CancellationToken,
    ) -> Result<PlayOutcome, Error> {
        let lock = self.command_lock(chat);
        let _guard = lock.lock().await;

        let mut added = Vec::new();
        let mut skipped = Vec::new();
        let mut total_duration = 0u32;
        let mut should_start = false;

        for mut track in tracks {
            if self.settings.duration_limit > 0
                && track.duration_secs > self.settings.duration_limit
            {
                skipped.push(track.title.clone());
                continue;
            }
            if self.registry.queue_len(chat).await >= QUEUE_CAP {
                skipped.push(track.title.clone());
                continue;
            }

            track.is_video = is_video;
            total_duration += track.duration_secs;
            let entry = QueueEntry::new(track, requester);
            let position = self.registry.add_song(chat, entry.clone()).await;
            if position == 1 {
                should_start = true;
            }
            added.push((position, entry));
        }

        if added.is_empty() && skipped.is_empty() {
            return Err(Error::ResolverNotFound("no tracks found".into()));
        }

        if should_start {
            if let Err(e) = self.advance(chat, cancel).await {
                warn!(chat_id = chat.0, error = %e, "starting batch playback failed");
            }
        }

        Ok(PlayOutcome::Batch {
            added,
            skipped,
            total_duration,
            started: should_start,
        })
    }

    /// Downloads and starts the queue head, updating the stored entry with
    /// the local path and normalized duration.
    async fn play_head(
        &self,
        chat: ChatId,
        mut entry: QueueEntry,
        cancel: &CancellationToken,
    ) -> Result<QueueEntry, Error> {
        let reply = self
            .bot
            .send_message(chat, &format!("Downloading {}...", entry.track.title))
            .await
            .ok();

        if entry.file_path.is_empty() {
            let path = match download_song(&self.resolver, &entry.track, cancel).await {
                Ok(path) => path,
                Err(e) => {
                    self.registry.remove_current_song(chat).await;
                    if let Some(reply) = reply {
                        let _ = self
                            .bot
                            .edit_message(reply, "Failed to download the track.")
                            .await;
                    }
                    return Err(e);
                }
            };
            entry.file_path = path.to_string_lossy().into_owned();
        }

        if entry.track.duration_secs == 0 {
            entry.track.duration_secs =
                echotune_resolver::probe::media_duration(&entry.file_path).await;
        }

        // Commit the resolved path back into the head before the engine
        // starts reading it.
        {
            let state = self.registry.entry(chat);
            let mut guard = state.lock().await;
            if let Some(head) = guard.playing_track_mut() {
                if head.track.track_id == entry.track.track_id {
                    *head = entry.clone();
                }
            }
        }

        if let Err(e) = self
            .play_media(chat, &entry.file_path, entry.track.is_video, "")
            .await
        {
            self.registry.remove_current_song(chat).await;
            if let Some(reply) = reply {
                let _ = self.bot.edit_message(reply, "Playback failed.").await;
            }
            return Err(e);
        }

        if let Some(reply) = reply {
            let _ = self
                .bot
                .edit_message(reply, &now_playing_text(&entry))
                .await;
        }

        Ok(entry)
    }

    /// Streams a file or URL into the chat's call, admitting the assistant
    /// first when needed.
    pub async fn play_media(
        &self,
        chat: ChatId,
        file_path: &str,
        video: bool,
        ffmpeg_params: &str,
    ) -> Result<(), Error> {
        let assistant = self.pool.select(chat).await?;

        if chat.is_supergroup() {
            if let Err(e) = self.admission.ensure_joined(&assistant, chat).await {
                self.registry.clear_chat(chat).await;
                return Err(e);
            }
        }

        info!(chat_id = chat.0, file_path, "playing media");
        let description = media::build_media_description(file_path, video, ffmpeg_params).await;

        if let Err(e) = assistant.handle.play(chat, description).await {
            warn!(chat_id = chat.0, error = %e, "engine play failed");
            self.registry.clear_chat(chat).await;
            return Err(e);
        }

        self.log_status_line(chat).await;
        Ok(())
    }

    /// Advances the queue after a stream-end: replay under loop, else
    /// dequeue, else stop and announce the end of the queue.
    pub async fn play_next(&self, chat: ChatId) -> Result<NextOutcome, Error> {
        let lock = self.command_lock(chat);
        let _guard = lock.lock().await;
        self.advance(chat, &CancellationToken::new()).await
    }

    async fn advance(&self, chat: ChatId, cancel: &CancellationToken) -> Result<NextOutcome, Error> {
        enum Step {
            Replay(QueueEntry),
            Advance(QueueEntry),
            Finish,
        }

        loop {
            let step = {
                let state = self.registry.entry(chat);
                let mut guard = state.lock().await;
                if guard.consume_loop() {
                    match guard.playing_track().cloned() {
                        Some(entry) => Step::Replay(entry),
                        None => Step::Finish,
                    }
                } else if let Some(next) = guard.upcoming_track().cloned() {
                    guard.remove_current_song();
                    Step::Advance(next)
                } else {
                    guard.remove_current_song();
                    Step::Finish
                }
            };

            let (entry, replayed) = match step {
                Step::Replay(entry) => (entry, true),
                Step::Advance(entry) => (entry, false),
                Step::Finish => {
                    self.stop_engine(chat).await;
                    let _ = self
                        .bot
                        .send_message(
                            chat,
                            "The queue has finished. Use /play to add more songs!",
                        )
                        .await;
                    return Ok(NextOutcome::Finished);
                }
            };

            match self.play_head(chat, entry, cancel).await {
                Ok(playing) => {
                    return Ok(if replayed {
                        NextOutcome::Replayed(playing)
                    } else {
                        NextOutcome::Advanced(playing)
                    });
                }
                Err(e) => {
                    // play_head already dropped the failing entry.
                    warn!(chat_id = chat.0, error = %e, "skipping unplayable track");
                }
            }
        }
    }

    /// Stops playback and clears the chat's queue.
    pub async fn stop(&self, chat: ChatId) -> Result<(), Error> {
        let lock = self.command_lock(chat);
        let _guard = lock.lock().await;

        self.registry.clear_chat(chat).await;
        let assistant = self.pool.select(chat).await?;
        assistant.handle.stop(chat).await
    }

    async fn stop_engine(&self, chat: ChatId) {
        if let Ok(assistant) = self.pool.select(chat).await {
            if let Err(e) = assistant.handle.stop(chat).await {
                warn!(chat_id = chat.0, error = %e, "engine stop failed");
            }
        }
    }

    pub async fn pause(&self, chat: ChatId) -> Result<bool, Error> {
        if !self.registry.is_active(chat).await {
            return Ok(false);
        }
        self.pool.select(chat).await?.handle.pause(chat).await
    }

    pub async fn resume(&self, chat: ChatId) -> Result<bool, Error> {
        if !self.registry.is_active(chat).await {
            return Ok(false);
        }
        self.pool.select(chat).await?.handle.resume(chat).await
    }

    pub async fn mute(&self, chat: ChatId) -> Result<bool, Error> {
        if !self.registry.is_active(chat).await {
            return Ok(false);
        }
        self.pool.select(chat).await?.handle.mute(chat).await
    }

    pub async fn unmute(&self, chat: ChatId) -> Result<bool, Error> {
        if !self.registry.is_active(chat).await {
            return Ok(false);
        }
        self.pool.select(chat).await?.handle.unmute(chat).await
    }

    /// Relative seek forward. Returns the absolute position seeked to.
    pub async fn seek(&self, chat: ChatId, seconds: u64) -> Result<u64, Error> {
        if seconds < MIN_SEEK_SECONDS {
            return Err(Error::ResolverInvalidInput(format!(
                "the minimum seek is {MIN_SEEK_SECONDS} seconds"
            )));
        }

        let playing = self
            .registry
            .playing_track(chat)
            .await
            .ok_or_else(|| Error::ResolverNotFound("no track currently playing".into()))?;

        let assistant = self.pool.select(chat).await?;
        let played = assistant.handle.played_time(chat).await?;
        let target = played + seconds;

        if playing.track.duration_secs > 0 && target >= playing.track.duration_secs as u64 {
            return Err(Error::ResolverInvalidInput(format!(
                "cannot seek beyond the track duration of {}",
                sec_to_min(playing.track.duration_secs)
            )));
        }

        let is_local = Path::new(&playing.file_path).exists();
        let params = media::seek_params(
            &playing.file_path,
            is_local,
            target,
            playing.track.duration_secs,
        );
        self.play_media(chat, &playing.file_path, playing.track.is_video, &params)
            .await?;
        Ok(target)
    }

    /// Changes playback speed by re-running the transcoder with PTS/atempo
    /// filters.
    pub async fn change_speed(&self, chat: ChatId, speed: f64) -> Result<(), Error> {
        if !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
            return Err(Error::ResolverInvalidInput(format!(
                "speed must be between {MIN_SPEED} and {MAX_SPEED}"
            )));
        }

        let playing = self
            .registry
            .playing_track(chat)
            .await
            .ok_or_else(|| Error::ResolverNotFound("no track currently playing".into()))?;

        let filters = media::speed_filters(speed);
        self.play_media(chat, &playing.file_path, playing.track.is_video, &filters)
            .await
    }

    /// Optional per-bot status line to the logger chat. Never fatal.
    async fn log_status_line(&self, chat: ChatId) {
        if self.settings.logger_id == 0 {
            return;
        }
        let enabled = self
            .store
            .logger_enabled(self.bot.me().id)
            .await
            .unwrap_or(false);
        if !enabled {
            return;
        }
        if let Some(entry) = self.registry.playing_track(chat).await {
            let line = format!(
                "Playing {} [{}] in {} for {}",
                entry.track.title,
                sec_to_min(entry.track.duration_secs),
                chat,
                entry.requested_by
            );
            if let Err(e) = self
                .bot
                .send_message(ChatId(self.settings.logger_id), &line)
                .await
            {
                warn!(error = %e, "logger status line failed");
            }
        }
    }
}

/// Now-playing reply body.
pub fn now_playing_text(entry: &QueueEntry) -> String {
    format!(
        "<b>Now Playing:</b>\n\n‣ <b>Title:</b> <a href='{}'>{}</a>\n‣ <b>Duration:</b> {}\n‣ <b>Requested by:</b> {}",
        entry.track.url,
        entry.track.title,
        sec_to_min(entry.track.duration_secs),
        entry.requested_by
    )
}

/// Added-to-queue reply body.
pub fn queued_text(position: usize, entry: &QueueEntry) -> String {
    format!(
        "<b>Added to Queue (#{position})</b>\n\n<b>Track:</b> <a href='{}'>{}</a>\n<b>Duration:</b> {}\n<b>By:</b> {}",
        entry.track.url,
        entry.track.title,
        sec_to_min(entry.track.duration_secs),
        entry.requested_by
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Connector;
    use crate::sessions::SessionInfo;
    use async_trait::async_trait;
    use echotune_cache::AdminCache;
    use echotune_config::model::{DownloadConfig, SourceConfig};
    use echotune_core::traits::platform::GroupCall;
    use echotune_core::types::{MemberStatus, Platform, UserId};
    use echotune_core::CallEngine;
    use echotune_test_utils::{MemoryStore, MockEngine, MockPlatform};

    const CHAT: ChatId = ChatId(-100);
    const UB_ID: i64 = 900;

    struct Fixture {
        bot: Arc<MockPlatform>,
        ub: Arc<MockPlatform>,
        engine: Arc<MockEngine>,
        controller: Arc<PlaybackController>,
    }

    struct FixedConnector {
        client: Arc<MockPlatform>,
        engine: Arc<MockEngine>,
    }

    #[async_trait]
    impl Connector for FixedConnector {
        async fn connect(
            &self,
            _session: &SessionInfo,
        ) -> Result<(Arc<dyn PlatformClient>, Arc<dyn CallEngine>), Error> {
            Ok((self.client.clone(), self.engine.clone()))
        }
    }

    async fn fixture() -> Fixture {
        let bot = Arc::new(MockPlatform::new(10, "musicbot", true));
        let ub = Arc::new(MockPlatform::new(UB_ID, "assistant", false));
        let engine = Arc::new(MockEngine::new());
        let store = Arc::new(MemoryStore::new());

        // The assistant is already a member and a voice chat is live.
        bot.set_member(CHAT, UserId(UB_ID), MemberStatus::Member);
        ub.set_group_call(CHAT, GroupCall { id: 1, access_hash: 2 });

        let pool = Arc::new(AssistantPool::new(store.clone()));
        pool.start_client(
            &FixedConnector {
                client: ub.clone(),
                engine: engine.clone(),
            },
            echotune_config::model::SessionEncoding::Native,
            "s",
        )
        .await
        .unwrap();

        let admission = Arc::new(Admission::new(bot.clone(), Arc::new(AdminCache::new())));
        let resolver = Arc::new(ResolverContext::new(
            SourceConfig::default(),
            DownloadConfig::default(),
            None,
        ));

        let controller = PlaybackController::new(
            Arc::new(ChatRegistry::new()),
            pool,
            admission,
            resolver,
            store,
            bot.clone(),
            ControllerSettings {
                duration_limit: 0,
                logger_id: 0,
            },
        );

        Fixture {
            bot,
            ub,
            engine,
            controller,
        }
    }

    fn direct_track(id: &str, duration: u32) -> Track {
        let url = format!("https://cdn.example.org/{id}.mp3");
        let mut track = Track::new(&url, format!("track {id}"), Platform::DirectLink, &url);
        track.duration_secs = duration;
        track
    }

    #[tokio::test]
    async fn first_track_plays_immediately() {
        let f = fixture().await;
        let cancel = CancellationToken::new();

        let outcome = f
            .controller
            .play_track(CHAT, direct_track("a", 200), false, "tester", &cancel)
            .await
            .unwrap();

        match outcome {
            PlayOutcome::NowPlaying(entry) => {
                assert_eq!(entry.file_path, "https://cdn.example.org/a.mp3");
            }
            other => panic!("expected NowPlaying, got {other:?}"),
        }
        assert_eq!(f.engine.play_history().len(), 1);
        assert_eq!(f.controller.registry().queue_len(CHAT).await, 1);

        // Now-playing text reached the chat.
        let edits = f.bot.edited_messages();
        assert!(edits.iter().any(|(_, _, text)| text.contains("Now Playing")));
    }

    #[tokio::test]
    async fn second_track_queues_without_engine_call() {
        let f = fixture().await;
        let cancel = CancellationToken::new();

        f.controller
            .play_track(CHAT, direct_track("a", 200), false, "tester", &cancel)
            .await
            .unwrap();
        let outcome = f
            .controller
            .play_track(CHAT, direct_track("b", 100), false, "tester", &cancel)
            .await
            .unwrap();

        match outcome {
            PlayOutcome::Queued { position, .. } => assert_eq!(position, 2),
            other => panic!("expected Queued, got {other:?}"),
        }
        // Only the head ever reached the engine (P2).
        assert_eq!(f.engine.play_history().len(), 1);
    }

    #[tokio::test]
    async fn queue_cap_is_enforced() {
        let f = fixture().await;
        let cancel = CancellationToken::new();

        for i in 0..QUEUE_CAP {
            f.controller
                .play_track(CHAT, direct_track(&format!("t{i}"), 60), false, "x", &cancel)
                .await
                .unwrap();
        }
        let err = f
            .controller
            .play_track(CHAT, direct_track("overflow", 60), false, "x", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::QueueFull(_)));
    }

    #[tokio::test]
    async fn duplicates_are_rejected() {
        let f = fixture().await;
        let cancel = CancellationToken::new();

        f.controller
            .play_track(CHAT, direct_track("same", 60), false, "x", &cancel)
            .await
            .unwrap();
        let err = f
            .controller
            .play_track(CHAT, direct_track("same", 60), false, "x", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateTrack(_)));
    }

    #[tokio::test]
    async fn loop_replays_then_advances() {
        let f = fixture().await;
        let cancel = CancellationToken::new();
        let registry = f.controller.registry().clone();

        f.controller
            .play_track(CHAT, direct_track("a", 60), false, "x", &cancel)
            .await
            .unwrap();
        registry.set_loop_count(CHAT, 2).await;

        // First two stream-ends replay the head.
        for expected_remaining in [1, 0] {
            let outcome = f.controller.play_next(CHAT).await.unwrap();
            assert!(matches!(outcome, NextOutcome::Replayed(_)));
            assert_eq!(registry.loop_count(CHAT).await, expected_remaining);
            assert_eq!(registry.queue_len(CHAT).await, 1);
        }

        // Third stream-end drains the queue and stops the engine (P3).
        let outcome = f.controller.play_next(CHAT).await.unwrap();
        assert!(matches!(outcome, NextOutcome::Finished));
        assert_eq!(registry.queue_len(CHAT).await, 0);
        assert_eq!(f.engine.stop_count(), 1);

        let sent = f.bot.sent_messages();
        assert!(sent
            .iter()
            .any(|(_, text)| text.contains("queue has finished")));
    }

    #[tokio::test]
    async fn next_advances_to_second_entry() {
        let f = fixture().await;
        let cancel = CancellationToken::new();
        let registry = f.controller.registry().clone();

        f.controller
            .play_track(CHAT, direct_track("a", 60), false, "x", &cancel)
            .await
            .unwrap();
        f.controller
            .play_track(CHAT, direct_track("b", 60), false, "x", &cancel)
            .await
            .unwrap();

        let outcome = f.controller.play_next(CHAT).await.unwrap();
        match outcome {
            NextOutcome::Advanced(entry) => {
                assert!(entry.track.track_id.contains("b"));
            }
            other => panic!("expected Advanced, got {other:?}"),
        }
        assert_eq!(registry.queue_len(CHAT).await, 1);
    }

    #[tokio::test]
    async fn engine_failure_clears_the_chat() {
        let f = fixture().await;
        let cancel = CancellationToken::new();
        f.engine.fail_next_plays(true);

        let err = f
            .controller
            .play_track(CHAT, direct_track("a", 60), false, "x", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EngineFailed { .. }));
        assert!(!f.controller.registry().is_active(CHAT).await);
    }

    #[tokio::test]
    async fn pause_and_resume_gate_on_activity() {
        let f = fixture().await;
        let cancel = CancellationToken::new();

        assert!(!f.controller.pause(CHAT).await.unwrap());

        f.controller
            .play_track(CHAT, direct_track("a", 60), false, "x", &cancel)
            .await
            .unwrap();
        assert!(f.controller.pause(CHAT).await.unwrap());
        assert!(f.controller.resume(CHAT).await.unwrap());
    }

    #[tokio::test]
    async fn seek_validates_bounds() {
        let f = fixture().await;
        let cancel = CancellationToken::new();

        f.controller
            .play_track(CHAT, direct_track("a", 200), false, "x", &cancel)
            .await
            .unwrap();
        f.engine.set_played_time(CHAT, 40);

        // Below the 20 second floor.
        assert!(f.controller.seek(CHAT, 10).await.is_err());

        // 40 played + 30 requested = 70, within a 200 second track.
        let target = f.controller.seek(CHAT, 30).await.unwrap();
        assert_eq!(target, 70);

        // The engine received a rebuilt description with seek flags.
        let history = f.engine.source_update_history();
        let last = &history.last().unwrap().1;
        let audio = last.microphone.as_ref().unwrap();
        assert!(audio.input.contains("-ss 70"), "got: {}", audio.input);
        assert!(audio.input.contains("-to 200"));
    }

    #[tokio::test]
    async fn seek_beyond_duration_is_refused() {
        let f = fixture().await;
        let cancel = CancellationToken::new();

        f.controller
            .play_track(CHAT, direct_track("a", 60), false, "x", &cancel)
            .await
            .unwrap();
        f.engine.set_played_time(CHAT, 45);

        assert!(f.controller.seek(CHAT, 30).await.is_err());
    }

    #[tokio::test]
    async fn change_speed_rebuilds_with_filters() {
        let f = fixture().await;
        let cancel = CancellationToken::new();

        f.controller
            .play_track(CHAT, direct_track("a", 60), false, "x", &cancel)
            .await
            .unwrap();

        assert!(f.controller.change_speed(CHAT, 8.0).await.is_err());
        f.controller.change_speed(CHAT, 3.0).await.unwrap();

        let history = f.engine.source_update_history();
        let audio = history.last().unwrap().1.microphone.clone().unwrap();
        assert!(audio.input.contains("atempo=2.0,atempo=1.500000"));
        assert!(audio.input.contains("setpts=0.333333*PTS"));
    }

    #[tokio::test]
    async fn stop_clears_state_and_engine() {
        let f = fixture().await;
        let cancel = CancellationToken::new();

        f.controller
            .play_track(CHAT, direct_track("a", 60), false, "x", &cancel)
            .await
            .unwrap();
        f.controller.stop(CHAT).await.unwrap();

        assert!(!f.controller.registry().is_active(CHAT).await);
        assert_eq!(f.engine.stop_count(), 1);
    }

    #[tokio::test]
    async fn batch_skips_over_limit_tracks() {
        let bot = Arc::new(MockPlatform::new(10, "musicbot", true));
        let ub = Arc::new(MockPlatform::new(UB_ID, "assistant", false));
        let engine = Arc::new(MockEngine::new());
        let store = Arc::new(MemoryStore::new());
        bot.set_member(CHAT, UserId(UB_ID), MemberStatus::Member);
        ub.set_group_call(CHAT, GroupCall { id: 1, access_hash: 2 });

        let pool = Arc::new(AssistantPool::new(store.clone()));
        pool.start_client(
            &FixedConnector {
                client: ub,
                engine: engine.clone(),
            },
            echotune_config::model::SessionEncoding::Native,
            "s",
        )
        .await
        .unwrap();

        let controller = PlaybackController::new(
            Arc::new(ChatRegistry::new()),
            pool,
            Arc::new(Admission::new(bot.clone(), Arc::new(AdminCache::new()))),
            Arc::new(ResolverContext::new(
                SourceConfig::default(),
                DownloadConfig::default(),
                None,
            )),
            store,
            bot,
            ControllerSettings {
                duration_limit: 100,
                logger_id: 0,
            },
        );

        let tracks = vec![
            direct_track("short1", 60),
            direct_track("toolong", 600),
            direct_track("short2", 90),
        ];
        let outcome = controller
            .enqueue_batch(CHAT, tracks, false, "x", &CancellationToken::new())
            .await
            .unwrap();

        match outcome {
            PlayOutcome::Batch {
                added,
                skipped,
                started,
                ..
            } => {
                assert_eq!(added.len(), 2);
                assert_eq!(skipped, vec!["track toolong".to_string()]);
                assert!(started);
            }
            other => panic!("expected Batch, got {other:?}"),
        }
        assert_eq!(engine.play_history().len(), 1);
    }
}
