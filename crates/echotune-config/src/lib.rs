// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration for the Echotune voice-chat player.
//!
//! TOML files merged over compiled defaults, with `ECHOTUNE_*` environment
//! variable overrides. See [`loader`] for the hierarchy and [`validation`]
//! for fatal startup checks.

pub mod loader;
pub mod model;
pub mod validation;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{DefaultService, EchotuneConfig, SessionEncoding};
