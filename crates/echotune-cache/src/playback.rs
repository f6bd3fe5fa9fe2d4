// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-chat playback state: the track queue and loop counter.
//!
//! Every chat owns an independent state record behind its own async mutex;
//! no lock ever covers two chats. The queue head is the currently playing
//! entry. Invariants:
//!
//! - at most one entry per chat is being consumed by the engine,
//! - a positive loop counter implies a non-empty queue,
//! - all mutations of one chat's record are serialized.

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
use echotune_core::types::{ChatId, QueueEntry};
use tokio::sync::Mutex;

/// Mutable playback record of a single chat.
#[derive(Debug, Default)]
pub struct ChatPlayback {
    queue: VecDeque<QueueEntry>,
    loop_remaining: u32,
}

impl ChatPlayback {
    /// Appends an entry; returns the new queue length.
    pub fn add_song(&mut self, entry: QueueEntry) -> usize {
        self.queue.push_back(entry);
        self.queue.len()
    }

    /// The currently playing entry (queue head).
    pub fn playing_track(&self) -> Option<&QueueEntry> {
        self.queue.front()
    }

    pub fn playing_track_mut(&mut self) -> Option<&mut QueueEntry> {
        self.queue.front_mut()
    }

    /// The entry that would play after the current one.
    pub fn upcoming_track(&self) -> Option<&QueueEntry> {
        self.queue.get(1)
    }

    /// Pops the queue head. Clears the loop counter when the queue empties.
    pub fn remove_current_song(&mut self) -> Option<QueueEntry> {
        let removed = self.queue.pop_front();
        if self.queue.is_empty() {
            self.loop_remaining = 0;
        }
        removed
    }

    /// Removes the nth entry (1-indexed). Out-of-range positions are a no-op.
    pub fn remove_track(&mut self, position: usize) -> Option<QueueEntry> {
        if position == 0 || position > self.queue.len() {
            return None;
        }
        let removed = self.queue.remove(position - 1);
        if self.queue.is_empty() {
            self.loop_remaining = 0;
        }
        removed
    }

    pub fn set_loop_count(&mut self, count: u32) {
        // A loop count on an empty queue would never be consumed.
        if !self.queue.is_empty() {
            self.loop_remaining = count;
        }
    }

    pub fn loop_count(&self) -> u32 {
        self.loop_remaining
    }

    /// Decrements the loop counter, returning whether a replay is due.
    pub fn consume_loop(&mut self) -> bool {
        if self.loop_remaining > 0 && !self.queue.is_empty() {
            self.loop_remaining -= 1;
            true
        } else {
            false
        }
    }

    pub fn is_active(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queue(&self) -> impl Iterator<Item = &QueueEntry> {
        self.queue.iter()
    }

    /// The queued entry with this track id, if any. Used to suppress
    /// duplicate enqueues.
    pub fn track_if_exists(&self, track_id: &str) -> Option<&QueueEntry> {
        self.queue.iter().find(|e| e.track.track_id == track_id)
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.loop_remaining = 0;
    }
}

/// Registry of playback state, one record per chat.
#[derive(Default)]
pub struct ChatRegistry {
    chats: DashMap<i64, Arc<Mutex<ChatPlayback>>>,
}

impl ChatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The chat's state handle, created on first use.
    ///
    /// Callers that must serialize a multi-step mutation hold the returned
    /// mutex across the whole step sequence.
    pub fn entry(&self, chat: ChatId) -> Arc<Mutex<ChatPlayback>> {
        self.chats
            .entry(chat.0)
            .or_insert_with(|| Arc::new(Mutex::new(ChatPlayback::default())))
            .clone()
    }

    pub async fn add_song(&self, chat: ChatId, entry: QueueEntry) -> usize {
        self.entry(chat).lock().await.add_song(entry)
    }

    pub async fn playing_track(&self, chat: ChatId) -> Option<QueueEntry> {
        self.entry(chat).lock().await.playing_track().cloned()
    }

    pub async fn upcoming_track(&self, chat: ChatId) -> Option<QueueEntry> {
        self.entry(chat).lock().await.upcoming_track().cloned()
    }

    pub async fn remove_current_song(&self, chat: ChatId) -> Option<QueueEntry> {
        self.entry(chat).lock().await.remove_current_song()
    }

    pub async fn remove_track(&self, chat: ChatId, position: usize) -> Option<QueueEntry> {
        self.entry(chat).lock().await.remove_track(position)
    }

    pub async fn set_loop_count(&self, chat: ChatId, count: u32) {
        self.entry(chat).lock().await.set_loop_count(count);
    }

    pub async fn loop_count(&self, chat: ChatId) -> u32 {
        self.entry(chat).lock().await.loop_count()
    }

    pub async fn is_active(&self, chat: ChatId) -> bool {
        self.entry(chat).lock().await.is_active()
    }

    pub async fn queue_len(&self, chat: ChatId) -> usize {
        self.entry(chat).lock().await.queue_len()
    }

    pub async fn queue_snapshot(&self, chat: ChatId) -> Vec<QueueEntry> {
        self.entry(chat).lock().await.queue().cloned().collect()
    }

    pub async fn track_if_exists(&self, chat: ChatId, track_id: &str) -> Option<QueueEntry> {
        self.entry(chat)
            .lock()
            .await
            .track_if_exists(track_id)
            .cloned()
    }

    pub async fn clear_chat(&self, chat: ChatId) {
        if let Some(state) = self.chats.get(&chat.0) {
            state.lock().await.clear();
        }
    }

    /// Chats whose queue is currently non-empty.
    pub async fn active_chats(&self) -> Vec<ChatId> {
        let handles: Vec<(i64, Arc<Mutex<ChatPlayback>>)> = self
            .chats
            .iter()
            .map(|r| (*r.key(), r.value().clone()))
            .collect();

        let mut active = Vec::new();
        for (id, state) in handles {
            if state.lock().await.is_active() {
                active.push(ChatId(id));
            }
        }
        active
    }
}
