// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command dispatch: permission gates in front, controller behind, reply
//! text out.

use std::sync::Arc;

use echotune_calls::controller::{now_playing_text, queued_text};
use echotune_calls::{GateKind, Gates, NextOutcome, PlayOutcome, PlaybackController};
use echotune_core::types::{AccessMode, ChatId, UserId};
use echotune_core::util::sec_to_min;
use echotune_core::{Error, Store};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::commands::{CallbackAction, Command};

/// Implicit arguments supplied by replying to another message.
#[derive(Debug, Clone, Default)]
pub struct ReplyContext {
    /// Sender of the replied-to message, target of `/auth` and `/unauth`.
    pub sender: Option<UserId>,
    /// The replied-to message itself, source of `/play` attachments.
    pub message: Option<echotune_core::traits::platform::PlatformMessage>,
}

pub struct Dispatcher {
    controller: Arc<PlaybackController>,
    gates: Arc<Gates>,
    store: Arc<dyn Store>,
    max_file_size: u64,
}

impl Dispatcher {
    pub fn new(
        controller: Arc<PlaybackController>,
        gates: Arc<Gates>,
        store: Arc<dyn Store>,
        max_file_size: u64,
    ) -> Self {
        Self {
            controller,
            gates,
            store,
            max_file_size,
        }
    }

    /// Runs one command for `user` in `chat` and returns the reply text.
    pub async fn dispatch(
        &self,
        chat: ChatId,
        user: UserId,
        display_name: &str,
        command: Command,
        reply: Option<&ReplyContext>,
    ) -> String {
        let gate = match &command {
            Command::Play { .. } | Command::VPlay { .. } => Some(GateKind::Play),
            Command::Reload | Command::Queue | Command::AuthList => None,
            _ => Some(GateKind::Admin),
        };

        if let Some(kind) = gate {
            if let Err(e) = self.gates.check(kind, chat, user).await {
                return reply_for(&e);
            }
        } else if let Err(e) = self.gates.ensure_supergroup(chat) {
            return reply_for(&e);
        }

        match self.run(chat, user, display_name, command, reply).await {
            Ok(text) => text,
            Err(e) => reply_for(&e),
        }
    }

    async fn run(
        &self,
        chat: ChatId,
        user: UserId,
        display_name: &str,
        command: Command,
        reply: Option<&ReplyContext>,
    ) -> Result<String, Error> {
        debug!(chat_id = chat.0, user_id = user.0, ?command, "dispatching");

        match command {
            Command::Play { query } if query.is_empty() => {
                self.play_implicit(chat, reply, false, display_name).await
            }
            Command::VPlay { query } if query.is_empty() => {
                self.play_implicit(chat, reply, true, display_name).await
            }

            Command::Play { query } => self.play(chat, &query, false, display_name).await,
            Command::VPlay { query } => self.play(chat, &query, true, display_name).await,

            Command::Skip => match self.controller.play_next(chat).await? {
                NextOutcome::Replayed(entry) | NextOutcome::Advanced(entry) => {
                    Ok(now_playing_text(&entry))
                }
                NextOutcome::Finished => Ok("The queue has finished.".to_string()),
            },

            Command::Stop => {
                self.controller.stop(chat).await?;
                Ok("Playback stopped and the queue cleared.".to_string())
            }

            Command::Pause => Ok(if self.controller.pause(chat).await? {
                "Paused.".to_string()
            } else {
                "No track currently playing.".to_string()
            }),

            Command::Resume => Ok(if self.controller.resume(chat).await? {
                "Resumed.".to_string()
            } else {
                "No track currently playing.".to_string()
            }),

            Command::Mute => Ok(if self.controller.mute(chat).await? {
                "Muted.".to_string()
            } else {
                "No track currently playing.".to_string()
            }),

            Command::Unmute => Ok(if self.controller.unmute(chat).await? {
                "Unmuted.".to_string()
            } else {
                "No track currently playing.".to_string()
            }),

            Command::Seek { seconds } => {
                let position = self.controller.seek(chat, seconds).await?;
                Ok(format!("Seeked to {}.", sec_to_min(position as u32)))
            }

            Command::Speed { value } => {
                self.controller.change_speed(chat, value).await?;
                Ok(format!("Playback speed set to {value:.2}x."))
            }

            Command::Loop { count } => {
                let registry = self.controller.registry();
                if !registry.is_active(chat).await {
                    return Ok("No track currently playing.".to_string());
                }
                registry.set_loop_count(chat, count).await;
                Ok(if count == 0 {
                    "Looping disabled.".to_string()
                } else {
                    format!("The current track will loop {count} more times.")
                })
            }

            Command::Remove { position } => {
                let registry = self.controller.registry();
                let queue_len = registry.queue_len(chat).await;
                if queue_len == 0 {
                    return Ok("The queue is currently empty.".to_string());
                }
                match registry.remove_track(chat, position).await {
                    Some(removed) => Ok(format!(
                        "Removed #{position}: {} (requested by {display_name}).",
                        removed.track.title
                    )),
                    None => Ok(format!(
                        "Track numbers go from 1 to {queue_len}."
                    )),
                }
            }

            Command::Queue => Ok(self.render_queue(chat).await),

            Command::Settings => {
                let play_mode = self.store.play_mode(chat).await?;
                let admin_mode = self.store.admin_mode(chat).await?;
                Ok(format!(
                    "Settings\n\nPlay mode: {play_mode}\nAdmin mode: {admin_mode}\n\n\
                     Change with the buttons below."
                ))
            }

            Command::Auth => {
                let target = reply.and_then(|r| r.sender).unwrap_or(user);
                self.store.add_auth_user(chat, target).await?;
                Ok(format!("User {target} added to the authorized list."))
            }

            Command::Unauth => {
                let target = reply.and_then(|r| r.sender).unwrap_or(user);
                self.store.remove_auth_user(chat, target).await?;
                Ok(format!("User {target} removed from the authorized list."))
            }

            Command::AuthList => {
                let users = self.store.auth_users(chat).await?;
                if users.is_empty() {
                    Ok("No authorized users in this chat.".to_string())
                } else {
                    let lines: Vec<String> =
                        users.iter().map(|u| format!("- {}", u.0)).collect();
                    Ok(format!("Authorized users:\n{}", lines.join("\n")))
                }
            }

            Command::Reload => {
                self.controller.admission().update_invite_link(chat, "");
                let count = self.gates.reload_admins(chat).await?;
                Ok(format!("Admin cache reloaded ({count} admins)."))
            }
        }
    }

    /// `/play` with no arguments: a replied-to media message is the track;
    /// otherwise reply with usage.
    async fn play_implicit(
        &self,
        chat: ChatId,
        reply: Option<&ReplyContext>,
        is_video: bool,
        display_name: &str,
    ) -> Result<String, Error> {
        match reply.and_then(|r| r.message.as_ref()) {
            Some(message) => {
                self.play_attachment(chat, message, is_video, display_name)
                    .await
            }
            None => Ok(
                "Usage: /play [song name or URL]\n\nSupported: YouTube, Spotify, \
                 Apple Music, JioSaavn, direct links, and forwarded media."
                    .to_string(),
            ),
        }
    }

    /// Enqueues the attachment of a replied-to message. Oversized files are
    /// rejected before any download starts.
    async fn play_attachment(
        &self,
        chat: ChatId,
        message: &echotune_core::traits::platform::PlatformMessage,
        is_video: bool,
        display_name: &str,
    ) -> Result<String, Error> {
        let file = message
            .file
            .as_ref()
            .ok_or_else(|| Error::ResolverInvalidInput("that message has no media".into()))?;

        if self.max_file_size > 0 && file.size > self.max_file_size {
            return Err(Error::ResolverInvalidInput(format!(
                "file too large, max {} MB",
                self.max_file_size / (1024 * 1024)
            )));
        }

        let mut track = echotune_core::Track::new(
            &message.link,
            &file.name,
            echotune_core::Platform::Telegram,
            &file.file_id,
        );
        track.duration_secs = file.duration_secs;

        let outcome = self
            .controller
            .play_track(chat, track, is_video, display_name, &CancellationToken::new())
            .await?;
        Ok(render_outcome(outcome))
    }

    async fn play(
        &self,
        chat: ChatId,
        query: &str,
        is_video: bool,
        display_name: &str,
    ) -> Result<String, Error> {
        // Playlist ids resolve through the store, everything else through
        // the source resolver.
        if let Some(playlist) = self.playlist_tracks(query).await? {
            let outcome = self
                .controller
                .enqueue_batch(chat, playlist, is_video, display_name, &CancellationToken::new())
                .await?;
            return Ok(render_outcome(outcome));
        }

        let outcome = self
            .controller
            .play(chat, query, is_video, display_name, &CancellationToken::new())
            .await?;
        Ok(render_outcome(outcome))
    }

    async fn playlist_tracks(
        &self,
        query: &str,
    ) -> Result<Option<Vec<echotune_core::Track>>, Error> {
        if !query.starts_with("tgpl_") {
            return Ok(None);
        }
        let playlist = self
            .store
            .playlist(query)
            .await?
            .ok_or_else(|| Error::ResolverNotFound("playlist not found".into()))?;
        if playlist.songs.is_empty() {
            return Err(Error::ResolverNotFound("the playlist is empty".into()));
        }
        Ok(Some(playlist.songs))
    }

    async fn render_queue(&self, chat: ChatId) -> String {
        let entries = self.controller.registry().queue_snapshot(chat).await;
        if entries.is_empty() {
            return "The queue is currently empty.".to_string();
        }

        let mut lines = vec!["<b>Queue</b>".to_string()];
        for (index, entry) in entries.iter().enumerate() {
            let marker = if index == 0 { "▶" } else { " " };
            lines.push(format!(
                "{marker} {}. {} [{}] — {}",
                index + 1,
                entry.track.title,
                sec_to_min(entry.track.duration_secs),
                entry.requested_by
            ));
        }
        let loops = self.controller.registry().loop_count(chat).await;
        if loops > 0 {
            lines.push(format!("Looping the current track {loops} more times."));
        }
        lines.join("\n")
    }

    /// Maps an inline-button action onto its command equivalent.
    pub async fn dispatch_callback(
        &self,
        chat: ChatId,
        user: UserId,
        display_name: &str,
        action: CallbackAction,
    ) -> String {
        let command = match action {
            CallbackAction::Skip => Command::Skip,
            CallbackAction::Stop => Command::Stop,
            CallbackAction::Pause => Command::Pause,
            CallbackAction::Resume => Command::Resume,
            CallbackAction::Mute => Command::Mute,
            CallbackAction::Unmute => Command::Unmute,
            CallbackAction::Close => return String::new(),
            CallbackAction::AddToPlaylist => {
                return match self.add_playing_to_playlist(chat, user).await {
                    Ok(reply) => reply,
                    Err(e) => reply_for(&e),
                }
            }
            CallbackAction::Help(topic) => {
                return format!("Help for {topic}: see /settings and /play.")
            }
            CallbackAction::SetLang(code) => {
                return match self.store.set_lang(chat, &code).await {
                    Ok(()) => format!("Language set to {code}."),
                    Err(e) => reply_for(&e),
                }
            }
            CallbackAction::Settings { kind, value } => {
                return match self.apply_setting(chat, &kind, &value).await {
                    Ok(reply) => reply,
                    Err(e) => reply_for(&e),
                }
            }
        };
        self.dispatch(chat, user, display_name, command, None).await
    }

    async fn apply_setting(&self, chat: ChatId, kind: &str, value: &str) -> Result<String, Error> {
        let mode: AccessMode = value
            .parse()
            .map_err(|_| Error::ResolverInvalidInput(format!("unknown mode {value}")))?;
        match kind {
            "playmode" => self.store.set_play_mode(chat, mode).await?,
            "adminmode" => self.store.set_admin_mode(chat, mode).await?,
            other => {
                return Err(Error::ResolverInvalidInput(format!(
                    "unknown setting {other}"
                )))
            }
        }
        Ok(format!("{kind} set to {mode}."))
    }

    async fn add_playing_to_playlist(&self, chat: ChatId, user: UserId) -> Result<String, Error> {
        let playing = self
            .controller
            .registry()
            .playing_track(chat)
            .await
            .ok_or_else(|| Error::ResolverNotFound("no track currently playing".into()))?;

        let playlists = self.store.user_playlists(user).await?;
        let playlist_id = match playlists.first() {
            Some(playlist) => playlist.id.clone(),
            None => self.store.create_playlist("Favorites", user).await?,
        };
        self.store
            .add_song_to_playlist(&playlist_id, &playing.track)
            .await?;
        Ok(format!("Added {} to your playlist.", playing.track.title))
    }
}

fn render_outcome(outcome: PlayOutcome) -> String {
    match outcome {
        PlayOutcome::NowPlaying(entry) => now_playing_text(&entry),
        PlayOutcome::Queued { position, entry } => queued_text(position, &entry),
        PlayOutcome::Batch {
            added,
            skipped,
            total_duration,
            ..
        } => {
            let mut lines = vec![format!("Added {} tracks to the queue.", added.len())];
            lines.push(format!("Total duration: {}", sec_to_min(total_duration)));
            if !skipped.is_empty() {
                lines.push(format!(
                    "Skipped {} tracks (exceeded the duration limit).",
                    skipped.len()
                ));
            }
            lines.join("\n")
        }
    }
}

/// User-facing reply for an error. Raw library messages never pass through
/// here; every variant renders a deliberate sentence.
pub fn reply_for(error: &Error) -> String {
    match error {
        Error::ChatNotSupergroup(_) => {
            "This chat must be upgraded to a supergroup before music can be played.".to_string()
        }
        Error::PermissionDenied(reason) => format!("Not allowed: {reason}."),
        Error::AssistantUnavailable => {
            "No assistant account is available right now. Try again later.".to_string()
        }
        Error::AssistantBanned { user, .. } => format!(
            "The assistant ({user}) is banned from this chat or its invite expired. \
             Unban it and try again."
        ),
        Error::InviteLinkUnavailable(_) => {
            "Could not fetch an invite link for the assistant. \
             Give the bot the invite-users right."
                .to_string()
        }
        Error::ResolverInvalidInput(reason) => format!("Cannot play that: {reason}."),
        Error::ResolverNotFound(query) => format!("No results found for {query}."),
        Error::DownloadFailed { message, .. } => format!("Download failed: {message}."),
        Error::TranscodeFailed(_) => "Processing the media failed.".to_string(),
        Error::EngineFailed { .. } => {
            "Playback failed. Is a voice chat active in this group?".to_string()
        }
        Error::QueueFull(cap) => {
            format!("The queue is full (max {cap} tracks). Use /end to clear it.")
        }
        Error::DuplicateTrack(title) => format!("{title} is already in the queue."),
        Error::RateLimited { retry_after } => format!(
            "Please wait {} before trying again.",
            sec_to_min(retry_after.as_secs() as u32)
        ),
        Error::Timeout { .. } => "The operation timed out. Try again.".to_string(),
        Error::Cancelled => "The operation was cancelled.".to_string(),
        Error::Config(_) | Error::Auth(_) | Error::Platform { .. } | Error::Storage { .. } => {
            "Something went wrong. Try again or contact support.".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn replies_never_leak_library_detail() {
        let err = Error::Storage {
            source: Box::new(std::io::Error::other("disk sector 12 unreadable")),
        };
        let reply = reply_for(&err);
        assert!(!reply.contains("sector"));

        let err = Error::Platform {
            message: "RPC_CALL_FAIL at mtproto layer".into(),
            source: None,
        };
        assert!(!reply_for(&err).contains("RPC"));
    }

    #[test]
    fn rate_limited_reply_shows_wait_time() {
        let err = Error::RateLimited {
            retry_after: Duration::from_secs(90),
        };
        assert!(reply_for(&err).contains("1:30"));
    }
}
