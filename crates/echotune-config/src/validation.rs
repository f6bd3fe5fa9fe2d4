// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Startup validation of a loaded configuration.
//!
//! Validation failures here are fatal: the process refuses to start rather
//! than limping along with missing credentials.

use crate::model::EchotuneConfig;

/// A single validation problem with enough context to fix it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validates the configuration, returning every problem found.
pub fn validate(config: &EchotuneConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.bot.api_id == 0 {
        errors.push(ValidationError {
            field: "bot.api_id".into(),
            message: "platform API id is required".into(),
        });
    }
    if config.bot.api_hash.is_empty() {
        errors.push(ValidationError {
            field: "bot.api_hash".into(),
            message: "platform API hash is required".into(),
        });
    }
    if config.bot.token.is_empty() {
        errors.push(ValidationError {
            field: "bot.token".into(),
            message: "bot token is required".into(),
        });
    }
    if config.assistants.session_strings.is_empty() {
        errors.push(ValidationError {
            field: "assistants.session_strings".into(),
            message: "at least one assistant session string is required".into(),
        });
    }
    if config.assistants.session_strings.iter().any(String::is_empty) {
        errors.push(ValidationError {
            field: "assistants.session_strings".into(),
            message: "session strings must not be empty".into(),
        });
    }
    if config.downloads.dir.is_empty() {
        errors.push(ValidationError {
            field: "downloads.dir".into(),
            message: "downloads directory is required".into(),
        });
    }
    if config.sources.api_url.is_empty() != config.sources.api_key.is_empty() {
        errors.push(ValidationError {
            field: "sources.api_url".into(),
            message: "api_url and api_key must be set together".into(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_config_from_str;

    fn minimal_valid() -> EchotuneConfig {
        load_config_from_str(
            r#"
            [bot]
            api_id = 1
            api_hash = "h"
            token = "1:t"

            [assistants]
            session_strings = ["AAA"]
            "#,
        )
        .unwrap()
    }

    #[test]
    fn minimal_config_validates() {
        assert!(validate(&minimal_valid()).is_ok());
    }

    #[test]
    fn empty_config_reports_all_missing_credentials() {
        let errors = validate(&EchotuneConfig::default()).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"bot.api_id"));
        assert!(fields.contains(&"bot.token"));
        assert!(fields.contains(&"assistants.session_strings"));
    }

    #[test]
    fn gateway_key_without_url_is_rejected() {
        let mut config = minimal_valid();
        config.sources.api_key = "secret".into();
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "sources.api_url");
    }
}
