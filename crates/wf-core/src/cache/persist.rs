// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2026 Waveforge contributors
// Part of Waveforge. Licensed under AGPL-3.0-or-later.

//! On-disk persistence for the raw-blob table.
//!
//! Layout under the cache root:
//!
//! ```text
//! <root>/blobs/index.json      versioned manifest: key, file stem, words, checksum
//! <root>/blobs/<hash16>.bin    little-endian 32-bit words
//! ```
//!
//! File stems are a stable 64-bit hash of the cache key, so keys never
//! appear as raw path components. The index is written last, to a temp file
//! renamed into place, so a crash mid-save leaves the previous index intact
//! and pointing at previous blobs. On load, any corruption degrades to a
//! cold cache, never to incorrect results.
//!
//! Only raw blobs persist. Pipelines are rebuilt per process; a backend
//! wanting to keep driver pipeline-cache bytes across runs stores them as a
//! raw blob under its own key convention.

use std::fs::{self, File};
use std::hash::{Hash, Hasher};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::RawBlob;

/// Bumped whenever the on-disk layout changes. Unknown versions load as a
/// cold cache.
const INDEX_VERSION: u32 = 1;
const INDEX_FILE: &str = "index.json";
const BLOB_DIR: &str = "blobs";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("cache i/o failed at '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cache index could not be encoded")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct Index {
    version: u32,
    entries: Vec<IndexEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexEntry {
    key: String,
    file: String,
    words: usize,
    checksum: u64,
}

/// Stable 64-bit hash used for blob file stems and content checksums.
///
/// `DefaultHasher::new()` hashes with fixed keys, so values are stable
/// across processes, unlike a keyed `RandomState`.
fn stable_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn blob_file_stem(key: &str) -> String {
    format!("{:016x}", stable_hash(key))
}

fn io_at(path: &Path) -> impl FnOnce(io::Error) -> PersistError + '_ {
    move |source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Writes `entries` under `root`, returning the number of blobs saved.
pub fn save_blobs(root: &Path, entries: &[(String, RawBlob)]) -> Result<usize, PersistError> {
    let dir = root.join(BLOB_DIR);
    fs::create_dir_all(&dir).map_err(io_at(&dir))?;

    let mut index = Index {
        version: INDEX_VERSION,
        entries: Vec::with_capacity(entries.len()),
    };
    for (key, blob) in entries {
        let stem = blob_file_stem(key);
        let path = dir.join(format!("{stem}.bin"));
        fs::write(&path, bytemuck::cast_slice::<u32, u8>(blob.as_slice())).map_err(io_at(&path))?;
        index.entries.push(IndexEntry {
            key: key.clone(),
            file: stem,
            words: blob.len(),
            checksum: stable_hash(blob.as_slice()),
        });
    }

    let index_path = dir.join(INDEX_FILE);
    let tmp = index_path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(&index)?;
    let mut file = File::create(&tmp).map_err(io_at(&tmp))?;
    file.write_all(json.as_bytes()).map_err(io_at(&tmp))?;
    file.flush().map_err(io_at(&tmp))?;
    fs::rename(&tmp, &index_path).map_err(io_at(&index_path))?;

    debug!(
        "saved {} cached blobs to {}",
        index.entries.len(),
        dir.display()
    );
    Ok(index.entries.len())
}

/// Loads persisted blobs from `root`.
///
/// A missing, unparsable, or version-mismatched index yields an empty list;
/// an entry whose blob fails its length or checksum validation is dropped
/// individually. Only hard i/o faults on an existing index surface as
/// errors.
pub fn load_blobs(root: &Path) -> Result<Vec<(String, RawBlob)>, PersistError> {
    let dir = root.join(BLOB_DIR);
    let index_path = dir.join(INDEX_FILE);
    let json = match fs::read_to_string(&index_path) {
        Ok(json) => json,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(PersistError::Io {
                path: index_path,
                source,
            })
        }
    };

    let index: Index = match serde_json::from_str(&json) {
        Ok(index) => index,
        Err(err) => {
            warn!("cache index unreadable, starting cold: {err}");
            return Ok(Vec::new());
        }
    };
    if index.version != INDEX_VERSION {
        warn!(
            "cache index version {} does not match {INDEX_VERSION}, starting cold",
            index.version
        );
        return Ok(Vec::new());
    }

    let mut entries = Vec::with_capacity(index.entries.len());
    for entry in index.entries {
        let path = dir.join(format!("{}.bin", entry.file));
        let words = match read_words(&path) {
            Ok(words) => words,
            Err(err) => {
                warn!("dropping cached blob '{}': {err}", entry.key);
                continue;
            }
        };
        if words.len() != entry.words || stable_hash(words.as_slice()) != entry.checksum {
            warn!("dropping cached blob '{}': checksum mismatch", entry.key);
            continue;
        }
        entries.push((entry.key, Arc::new(words)));
    }

    debug!("loaded {} cached blobs from {}", entries.len(), dir.display());
    Ok(entries)
}

fn read_words(path: &Path) -> io::Result<Vec<u32>> {
    let bytes = fs::read(path)?;
    if bytes.len() % 4 != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "blob length is not word aligned",
        ));
    }
    Ok(bytemuck::pod_collect_to_vec(&bytes))
}
