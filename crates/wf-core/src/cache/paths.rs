// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2026 Waveforge contributors
// Part of Waveforge. Licensed under AGPL-3.0-or-later.

//! Platform cache-root resolution.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use waveforge_config::{Settings, APP_NAME};

/// Failure to obtain a writable per-application cache directory.
///
/// Fatal for persistence only: callers are expected to fall back to a
/// memory-only cache rather than abort the host.
#[derive(Debug, Error)]
pub enum CacheDirError {
    /// The platform reported no per-user cache directory.
    #[error("could not determine a per-user cache directory")]
    Resolve,
    /// Creating the directory failed for a reason other than already-exists.
    #[error("failed to create cache directory '{path}'")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Resolves the writable per-application cache root, creating every missing
/// intermediate directory.
///
/// The settings override wins; otherwise the platform convention applies
/// (roaming application data on Windows, `~/Library/Caches` on macOS,
/// `~/.cache` elsewhere), suffixed with the application directory.
pub fn resolve_cache_root(settings: &Settings) -> Result<PathBuf, CacheDirError> {
    let root = match settings.cache_dir() {
        Some(dir) => dir.to_path_buf(),
        None => dirs::cache_dir()
            .ok_or(CacheDirError::Resolve)?
            .join(APP_NAME),
    };

    std::fs::create_dir_all(&root).map_err(|source| CacheDirError::Create {
        path: root.clone(),
        source,
    })?;
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_root_is_created_on_demand() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("deeply").join("nested").join("cache");
        let settings = Settings::with_cache_dir(&nested);

        let root = resolve_cache_root(&settings).unwrap();
        assert_eq!(root, nested);
        assert!(root.is_dir());
    }

    #[test]
    fn resolution_is_stable_across_calls() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = Settings::with_cache_dir(tmp.path());

        let first = resolve_cache_root(&settings).unwrap();
        let second = resolve_cache_root(&settings).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn file_in_the_way_reports_creation_error() {
        let tmp = tempfile::tempdir().unwrap();
        let obstruction = tmp.path().join("not-a-directory");
        std::fs::write(&obstruction, b"occupied").unwrap();

        let settings = Settings::with_cache_dir(obstruction.join("child"));
        let err = resolve_cache_root(&settings).unwrap_err();
        assert!(matches!(err, CacheDirError::Create { .. }));
    }
}
