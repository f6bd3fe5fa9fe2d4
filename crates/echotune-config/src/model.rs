// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup with an actionable error message.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Top-level Echotune configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections default to sensible values; required
/// credentials are enforced by the `validation` module, not by serde.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EchotuneConfig {
    /// Primary bot identity and operator settings.
    #[serde(default)]
    pub bot: BotConfig,

    /// Assistant (secondary identity) settings.
    #[serde(default)]
    pub assistants: AssistantConfig,

    /// Music-source resolver settings.
    #[serde(default)]
    pub sources: SourceConfig,

    /// Download directory and limits.
    #[serde(default)]
    pub downloads: DownloadConfig,

    /// Persistent store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Health/metrics listener settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// Persistent store settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "echotune.db".to_string()
}

/// Primary bot identity and operator settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    /// Platform API id issued for the application.
    #[serde(default)]
    pub api_id: i32,

    /// Platform API hash issued for the application.
    #[serde(default)]
    pub api_hash: String,

    /// Bot token. Empty disables startup (fatal at validation).
    #[serde(default)]
    pub token: String,

    /// Chat id that receives status lines and join logs. 0 disables.
    #[serde(default)]
    pub logger_id: i64,

    /// Support channel username shown in operator-facing replies.
    #[serde(default)]
    pub support_channel: String,

    /// Support group username shown in operator-facing replies.
    #[serde(default)]
    pub support_group: String,

    /// User ids with developer privileges.
    #[serde(default)]
    pub devs: Vec<i64>,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            api_id: 0,
            api_hash: String::new(),
            token: String::new(),
            logger_id: 0,
            support_channel: String::new(),
            support_group: String::new(),
            devs: Vec::new(),
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Encoding of the configured assistant session strings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize, Default,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionEncoding {
    Telethon,
    Pyrogram,
    /// The native envelope of the original ecosystem client.
    #[serde(alias = "gogram")]
    #[default]
    Native,
}

/// Assistant pool settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AssistantConfig {
    /// One opaque session string per assistant identity.
    #[serde(default)]
    pub session_strings: Vec<String>,

    /// Encoding of the session strings above.
    #[serde(default)]
    pub session_type: SessionEncoding,
}

/// Default provider used when a free-text query matches no URL pattern.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize, Default,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DefaultService {
    #[default]
    Youtube,
    Spotify,
}

/// Music-source resolver settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Base URL of the multi-provider API gateway. Empty disables it.
    #[serde(default)]
    pub api_url: String,

    /// API key sent as `X-API-Key` on every gateway request.
    #[serde(default)]
    pub api_key: String,

    /// Provider used for bare search terms.
    #[serde(default)]
    pub default_service: DefaultService,

    /// Cookie-jar files handed to the external downloader; one is picked
    /// uniformly at random per invocation.
    #[serde(default)]
    pub cookies_path: Vec<String>,

    /// Proxy URL for the external downloader, used only when no cookie jar
    /// is configured.
    #[serde(default)]
    pub proxy: String,
}

/// Download directory and limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DownloadConfig {
    /// Directory downloaded media is written to.
    #[serde(default = "default_downloads_dir")]
    pub dir: String,

    /// Maximum accepted size of message attachments, in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Tracks longer than this many seconds are refused.
    #[serde(default = "default_song_duration_limit")]
    pub song_duration_limit: u32,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            dir: default_downloads_dir(),
            max_file_size: default_max_file_size(),
            song_duration_limit: default_song_duration_limit(),
        }
    }
}

fn default_downloads_dir() -> String {
    "downloads".to_string()
}

fn default_max_file_size() -> u64 {
    500 * 1024 * 1024
}

fn default_song_duration_limit() -> u32 {
    3 * 60 * 60
}

/// Health/metrics listener settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let config = EchotuneConfig::default();
        assert_eq!(config.downloads.dir, "downloads");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.bot.log_level, "info");
        assert_eq!(config.sources.default_service, DefaultService::Youtube);
        assert_eq!(config.assistants.session_type, SessionEncoding::Native);
    }

    #[test]
    fn session_encoding_accepts_legacy_alias() {
        let enc: SessionEncoding = serde_json::from_str("\"gogram\"").unwrap();
        assert_eq!(enc, SessionEncoding::Native);
        let enc: SessionEncoding = serde_json::from_str("\"pyrogram\"").unwrap();
        assert_eq!(enc, SessionEncoding::Pyrogram);
    }
}
