// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assistant session-string decoding.
//!
//! Session strings arrive in one of three ecosystem encodings. Each is a
//! urlsafe-base64 envelope over a fixed binary layout; decoding normalizes
//! them into [`SessionInfo`] so the connector sees one shape regardless of
//! which client exported the credential.

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use echotune_core::Error;
use echotune_config::model::SessionEncoding;

/// Authentication key length shared by every encoding.
const AUTH_KEY_LEN: usize = 256;

/// Telethon: a version marker byte `'1'` followed by
/// `dc_id(1) | ip(4|16) | port(2) | auth_key(256)`.
const TELETHON_IPV4_LEN: usize = 1 + 4 + 2 + AUTH_KEY_LEN;
const TELETHON_IPV6_LEN: usize = 1 + 16 + 2 + AUTH_KEY_LEN;

/// Pyrogram v3: `dc_id(1) | api_id(4) | test_mode(1) | auth_key(256) |
/// user_id(8) | is_bot(1)`; the legacy v2 layout omits `api_id`.
const PYROGRAM_LEN: usize = 1 + 4 + 1 + AUTH_KEY_LEN + 8 + 1;
const PYROGRAM_LEGACY_LEN: usize = 1 + 1 + AUTH_KEY_LEN + 8 + 1;

/// Normalized session credential.
#[derive(Clone)]
pub struct SessionInfo {
    pub dc_id: u8,
    pub auth_key: Vec<u8>,
    pub user_id: Option<i64>,
    pub is_bot: Option<bool>,
    /// The original string, for connectors that consume the native envelope.
    pub raw: String,
}

impl std::fmt::Debug for SessionInfo {
    // Auth keys never reach logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionInfo")
            .field("dc_id", &self.dc_id)
            .field("user_id", &self.user_id)
            .field("is_bot", &self.is_bot)
            .finish_non_exhaustive()
    }
}

/// Decodes `session` according to `encoding`.
pub fn decode_session(encoding: SessionEncoding, session: &str) -> Result<SessionInfo, Error> {
    let session = session.trim();
    if session.is_empty() {
        return Err(Error::Auth("empty session string".into()));
    }

    match encoding {
        SessionEncoding::Telethon => decode_telethon(session),
        SessionEncoding::Pyrogram => decode_pyrogram(session),
        SessionEncoding::Native => Ok(SessionInfo {
            dc_id: 0,
            auth_key: Vec::new(),
            user_id: None,
            is_bot: None,
            raw: session.to_string(),
        }),
    }
}

fn b64_decode(payload: &str) -> Result<Vec<u8>, Error> {
    URL_SAFE
        .decode(payload)
        .or_else(|_| URL_SAFE_NO_PAD.decode(payload))
        .map_err(|e| Error::Auth(format!("session string is not valid base64: {e}")))
}

fn decode_telethon(session: &str) -> Result<SessionInfo, Error> {
    let payload = session
        .strip_prefix('1')
        .ok_or_else(|| Error::Auth("telethon session must start with version marker '1'".into()))?;

    let data = b64_decode(payload)?;
    let ip_len = match data.len() {
        TELETHON_IPV4_LEN => 4,
        TELETHON_IPV6_LEN => 16,
        other => {
            return Err(Error::Auth(format!(
                "telethon session has unexpected length {other}"
            )))
        }
    };

    let dc_id = data[0];
    let auth_key = data[1 + ip_len + 2..].to_vec();

    Ok(SessionInfo {
        dc_id,
        auth_key,
        user_id: None,
        is_bot: None,
        raw: session.to_string(),
    })
}

fn decode_pyrogram(session: &str) -> Result<SessionInfo, Error> {
    let data = b64_decode(session)?;

    let (dc_id, key_start) = match data.len() {
        PYROGRAM_LEN => (data[0], 1 + 4 + 1),
        PYROGRAM_LEGACY_LEN => (data[0], 1 + 1),
        other => {
            return Err(Error::Auth(format!(
                "pyrogram session has unexpected length {other}"
            )))
        }
    };

    let auth_key = data[key_start..key_start + AUTH_KEY_LEN].to_vec();
    let tail = &data[key_start + AUTH_KEY_LEN..];
    let user_id = i64::from_be_bytes(
        tail[..8]
            .try_into()
            .map_err(|_| Error::Auth("pyrogram session truncated".into()))?,
    );
    let is_bot = tail[8] != 0;

    Ok(SessionInfo {
        dc_id,
        auth_key,
        user_id: Some(user_id),
        is_bot: Some(is_bot),
        raw: session.to_string(),
    })
}
