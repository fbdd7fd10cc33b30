// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2026 Waveforge contributors
// Part of Waveforge. Licensed under AGPL-3.0-or-later.

//! Shared GPU device context.

use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing::debug;

/// Failures at the GPU backend boundary.
#[derive(Debug, Error)]
pub enum GpuError {
    #[error("no compatible WGPU adapter was found")]
    NoAdapter,
    #[error("failed to acquire WGPU device: {0}")]
    RequestDevice(String),
    #[error("failed to compile compute shader '{label}': {reason}")]
    Shader { label: String, reason: String },
    #[error("failed to map GPU buffer for readback")]
    Map,
}

/// Externally-owned GPU infrastructure shared by every compute consumer.
///
/// The handles are plain reference-counted wgpu values: the context copies
/// them and never manages the lifetime of the underlying device. Every
/// queue submission serializes through [`GpuContext::lock_submission`]
/// because the hardware queue accepts only serialized submissions.
pub struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    submission: Mutex<()>,
}

impl GpuContext {
    /// Wraps device infrastructure supplied once by the host's startup
    /// code.
    pub fn from_parts(device: wgpu::Device, queue: wgpu::Queue) -> Arc<Self> {
        Arc::new(Self {
            device,
            queue,
            submission: Mutex::new(()),
        })
    }

    /// Brings up a default instance, adapter and device for hosts without
    /// their own GPU initialization.
    pub fn request() -> Result<Arc<Self>, GpuError> {
        let instance = wgpu::Instance::default();
        let adapter =
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))
                .ok_or(GpuError::NoAdapter)?;
        let info = adapter.get_info();
        debug!("using adapter {} ({:?})", info.name, info.backend);

        let (device, queue) =
            pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default(), None))
                .map_err(|err| GpuError::RequestDevice(err.to_string()))?;
        Ok(Self::from_parts(device, queue))
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Serializes plan binds and queue submissions on the shared hardware
    /// queue. Held only across the bind or submit in question, never across
    /// a plan's lifetime.
    pub fn lock_submission(&self) -> MutexGuard<'_, ()> {
        self.submission.lock().expect("gpu submission mutex poisoned")
    }
}
