// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2026 Waveforge contributors
// Part of Waveforge. Licensed under AGPL-3.0-or-later.

//! Process-level configuration for the Waveforge engine.
//!
//! Settings are resolved once at startup, from the environment or from
//! explicit constructors, and passed by reference to the subsystems that
//! need them. Nothing in this crate holds global state apart from the
//! tracing-subscriber guard in [`tracing`].

use std::path::{Path, PathBuf};

pub mod tracing;

/// Directory name used for per-user application state.
pub const APP_NAME: &str = "waveforge";

/// Startup settings consumed by the caching layer.
///
/// `WAVEFORGE_CACHE_DIR` overrides the platform cache root;
/// `WAVEFORGE_NO_DISK_CACHE` (any value) keeps the cache memory-only for
/// the life of the process.
#[derive(Clone, Debug)]
pub struct Settings {
    cache_dir: Option<PathBuf>,
    disk_cache: bool,
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Self {
        let cache_dir = std::env::var_os("WAVEFORGE_CACHE_DIR").map(PathBuf::from);
        let disk_cache = std::env::var_os("WAVEFORGE_NO_DISK_CACHE").is_none();
        Self {
            cache_dir,
            disk_cache,
        }
    }

    /// Settings for a memory-only cache; nothing touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            cache_dir: None,
            disk_cache: false,
        }
    }

    /// Settings rooted at an explicit directory. Used by hosts that manage
    /// their own state layout, and by tests that need an isolated root.
    pub fn with_cache_dir<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            cache_dir: Some(path.into()),
            disk_cache: true,
        }
    }

    /// The configured cache-root override, if any.
    pub fn cache_dir(&self) -> Option<&Path> {
        self.cache_dir.as_deref()
    }

    /// Whether cache contents may be persisted to disk.
    pub fn disk_cache(&self) -> bool {
        self.disk_cache
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_env()
    }
}
