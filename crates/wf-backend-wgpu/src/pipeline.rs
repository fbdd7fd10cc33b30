// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2026 Waveforge contributors
// Part of Waveforge. Licensed under AGPL-3.0-or-later.

//! Compute-pipeline compilation.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::context::GpuError;

/// A compiled compute pipeline together with the shader module it was built
/// from. Cached entries are shared and never mutated after store.
pub struct PipelineArtifact {
    pub module: wgpu::ShaderModule,
    pub pipeline: wgpu::ComputePipeline,
}

/// Compiles `source` and builds a compute pipeline for `entry_point`.
///
/// WGSL validation failures panic inside wgpu, so module creation is fenced
/// with `catch_unwind` and reported as [`GpuError::Shader`].
pub fn compile_pipeline(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    entry_point: &str,
    layout: Option<&wgpu::PipelineLayout>,
) -> Result<PipelineArtifact, GpuError> {
    let module = catch_unwind(AssertUnwindSafe(|| {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        })
    }))
    .map_err(|payload| GpuError::Shader {
        label: label.to_owned(),
        reason: panic_payload_to_string(payload),
    })?;

    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout,
        module: &module,
        entry_point,
        compilation_options: Default::default(),
        cache: None,
    });
    Ok(PipelineArtifact { module, pipeline })
}

fn panic_payload_to_string(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
