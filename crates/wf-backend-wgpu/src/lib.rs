// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2026 Waveforge contributors
// Part of Waveforge. Licensed under AGPL-3.0-or-later.

//! WGPU realization of the Waveforge artifact cache: the shared device
//! context, compute-pipeline compilation, and the bound spectral-transform
//! plan lifecycle used by the waveform-processing stages.

pub mod context;
pub mod fft;
mod pipeline;

pub use context::{GpuContext, GpuError};
pub use fft::{FftBackend, FftPlan, PlanError, WgpuFftBackend};
pub use pipeline::{compile_pipeline, PipelineArtifact};

/// The artifact cache specialized to this backend's pipeline type.
pub type GpuArtifactCache = wf_core::ArtifactCache<PipelineArtifact>;

/// The cache manager specialized to this backend's pipeline type.
pub type GpuCacheManager = wf_core::CacheManager<PipelineArtifact>;
