// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2026 Waveforge contributors
// Part of Waveforge. Licensed under AGPL-3.0-or-later.

//! Core caching layer for the Waveforge signal-processing engine.
//!
//! Building a GPU compute pipeline or a precompiled transform plan costs
//! driver compilation and device-memory negotiation; this crate makes that
//! cost pay once per logically-distinct configuration. [`ArtifactCache`]
//! maps semantic string keys to shared artifacts, and [`CacheManager`] ties
//! a cache instance to a resolved on-disk root so raw blobs survive process
//! restarts.
//!
//! The crate is GPU-agnostic: the pipeline table is generic over the
//! backend's artifact type, so the tables are unit-testable without a
//! device. The wgpu realization lives in `wf-backend-wgpu`.

pub mod cache;

pub use cache::paths::{resolve_cache_root, CacheDirError};
pub use cache::persist::PersistError;
pub use cache::{ArtifactCache, CacheManager, RawBlob};
