//! # ripple-settings
//!
//! Configuration for the ripple server and client, loaded from three layers
//! (in priority order):
//! 1. **Compiled defaults** - [`RippleSettings::default()`]
//! 2. **Settings file** - `~/.ripple/settings.json` or an explicit path
//!    (deep-merged over defaults)
//! 3. **Environment variables** - `RIPPLE_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::{ClientSettings, LoggingSettings, RippleSettings, ServerSettings};
