// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Merge order (later overrides earlier): compiled defaults,
//! `/etc/echotune/echotune.toml`, `~/.config/echotune/echotune.toml`,
//! `./echotune.toml`, then `ECHOTUNE_*` environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::EchotuneConfig;

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<EchotuneConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no file lookup, no env).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<EchotuneConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(EchotuneConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<EchotuneConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(EchotuneConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading (exposed for diagnostics).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(EchotuneConfig::default()))
        .merge(Toml::file("/etc/echotune/echotune.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("echotune/echotune.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("echotune.toml"))
        .merge(env_provider())
}

/// Environment variable provider using explicit `map()` for section-to-dot
/// mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` so underscore-containing keys map
/// correctly: `ECHOTUNE_DOWNLOADS_MAX_FILE_SIZE` must become
/// `downloads.max_file_size`, not `downloads.max.file.size`.
fn env_provider() -> Env {
    Env::prefixed("ECHOTUNE_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("bot_", "bot.", 1)
            .replacen("assistants_", "assistants.", 1)
            .replacen("sources_", "sources.", 1)
            .replacen("downloads_", "downloads.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("server_", "server.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn str_loading_overrides_defaults() {
        let config = load_config_from_str(
            r#"
            [bot]
            api_id = 12345
            api_hash = "abcdef"
            token = "123:abc"

            [downloads]
            dir = "/tmp/music"
            "#,
        )
        .unwrap();

        assert_eq!(config.bot.api_id, 12345);
        assert_eq!(config.downloads.dir, "/tmp/music");
        // Untouched sections keep their defaults.
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = load_config_from_str(
            r#"
            [bot]
            tokne = "typo"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn session_strings_parse_as_list() {
        let config = load_config_from_str(
            r#"
            [assistants]
            session_strings = ["AAA", "BBB"]
            session_type = "pyrogram"
            "#,
        )
        .unwrap();
        assert_eq!(config.assistants.session_strings.len(), 2);
    }
}
