// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2026 Waveforge contributors
// Part of Waveforge. Licensed under AGPL-3.0-or-later.

//! Bound spectral-transform plans.
//!
//! An [`FftPlan`] owns the device-side state for one configured transform
//! length: acquired exactly once at construction, reused across many
//! executions, released exactly once when the plan drops. Plans are cheap
//! to execute and expensive to bind, so callers cache them keyed by
//! [`FftPlan::size`].
//!
//! The transform itself is a Stockham autosort radix-2 FFT: one dispatch
//! per stage, ping-ponging between two storage buffers, twiddle factors
//! generated once per length and shared through the raw-blob cache.

use std::sync::Arc;

use bytemuck::{cast_slice, Pod, Zeroable};
use thiserror::Error;
use tracing::trace;
use wf_core::RawBlob;
use wgpu::util::DeviceExt;

use crate::context::{GpuContext, GpuError};
use crate::pipeline::{compile_pipeline, PipelineArtifact};
use crate::GpuArtifactCache;

const FFT_WGSL: &str = include_str!("shaders/fft_radix2.wgsl");
const WORKGROUP_SIZE: u32 = 64;

/// Failures constructing or executing a transform plan.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Transform lengths must be powers of two of at least two points.
    #[error("unsupported transform length {0}")]
    InvalidLength(usize),
    /// The input slice does not match the plan's configured length.
    #[error("input has {got} interleaved words, plan expects {expected}")]
    InputLength { expected: usize, got: usize },
    /// The backend rejected the bind for a backend-specific reason.
    #[error("failed to bind transform plan: {0}")]
    Bind(String),
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

/// Acquires and releases the device-side state behind an [`FftPlan`].
///
/// The seam exists so the plan lifecycle can be exercised against a
/// counting test double; [`WgpuFftBackend`] is the production
/// implementation.
pub trait FftBackend {
    type State;

    /// Binds all device state for a transform of `size` points.
    ///
    /// Must be all-or-nothing: on failure every already-acquired
    /// sub-resource is released before the error returns.
    fn bind(&self, size: usize) -> Result<Self::State, PlanError>;

    /// Releases state produced by `bind`. Called exactly once per
    /// successful bind.
    fn release(&self, state: Self::State);
}

/// One bound instance of a single-dimension transform configuration.
///
/// Valid only while the device infrastructure it was built against remains
/// valid; the plan stores handle copies and never extends their lifetime.
/// Single-owner after construction: share only with external
/// synchronization.
#[derive(Debug)]
pub struct FftPlan<B: FftBackend> {
    backend: Arc<B>,
    size: usize,
    state: Option<B::State>,
}

impl<B: FftBackend> FftPlan<B> {
    /// Binds a plan for a transform of `size` points.
    ///
    /// A bind failure propagates; no partially-initialized plan is ever
    /// returned.
    pub fn new(backend: Arc<B>, size: usize) -> Result<Self, PlanError> {
        let state = backend.bind(size)?;
        trace!("bound transform plan of length {size}");
        Ok(Self {
            backend,
            size,
            state: Some(state),
        })
    }

    /// Configured transform length, for cache-key derivation by callers.
    pub fn size(&self) -> usize {
        self.size
    }
}

impl<B: FftBackend> Drop for FftPlan<B> {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            self.backend.release(state);
        }
    }
}

/// Per-stage uniform data consumed by the stage kernel.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct StageParams {
    n: u32,
    ns: u32,
    inverse: u32,
    _pad: u32,
}

fn pipeline_key() -> String {
    format!("fft.radix2.wg{WORKGROUP_SIZE}")
}

fn twiddle_key(size: usize) -> String {
    format!("fft.twiddle.{size}")
}

/// Twiddle table for an `size`-point transform: `size / 2` unit roots
/// `exp(-2πik/size)` as interleaved f32 bit patterns, `size` words total.
fn twiddle_words(size: usize) -> Vec<u32> {
    let mut words = Vec::with_capacity(size);
    for k in 0..size / 2 {
        let theta = -2.0 * std::f64::consts::PI * k as f64 / size as f64;
        words.push((theta.cos() as f32).to_bits());
        words.push((theta.sin() as f32).to_bits());
    }
    words
}

/// Device-side state owned by one bound wgpu plan.
pub struct WgpuPlanState {
    pipeline: Arc<PipelineArtifact>,
    twiddles: RawBlob,
    io: [wgpu::Buffer; 2],
    staging: wgpu::Buffer,
    uniforms: Vec<wgpu::Buffer>,
    bind_groups: Vec<wgpu::BindGroup>,
    stages: u32,
}

/// Production [`FftBackend`] over a shared [`GpuContext`].
///
/// Stage pipelines land in the pipeline table under `fft.radix2.*`;
/// twiddle tables land in the raw table under `fft.twiddle.<n>`, so every
/// plan of the same length shares both.
pub struct WgpuFftBackend {
    ctx: Arc<GpuContext>,
    cache: Arc<GpuArtifactCache>,
    layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
}

fn bge_storage(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn bge_uniform(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl WgpuFftBackend {
    pub fn new(ctx: Arc<GpuContext>, cache: Arc<GpuArtifactCache>) -> Self {
        let layout = ctx
            .device()
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("wf.fft.layout"),
                entries: &[
                    bge_storage(0, true),
                    bge_storage(1, false),
                    bge_storage(2, true),
                    bge_uniform(3),
                ],
            });
        let pipeline_layout = ctx
            .device()
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("wf.fft.pipeline_layout"),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });
        Self {
            ctx,
            cache,
            layout,
            pipeline_layout,
        }
    }

    pub fn context(&self) -> &Arc<GpuContext> {
        &self.ctx
    }

    fn stage_pipeline(&self) -> Result<Arc<PipelineArtifact>, GpuError> {
        let key = pipeline_key();
        if let Some(artifact) = self.cache.lookup_pipeline(&key) {
            return Ok(artifact);
        }
        // Compiled without the cache lock held; a concurrent builder may
        // race and the last store wins.
        let artifact = Arc::new(compile_pipeline(
            self.ctx.device(),
            "wf.fft.radix2",
            FFT_WGSL,
            "fft_stage",
            Some(&self.pipeline_layout),
        )?);
        self.cache.store_pipeline(&key, Arc::clone(&artifact));
        Ok(artifact)
    }

    fn execute_bound(
        &self,
        state: &WgpuPlanState,
        size: usize,
        input: &[f32],
        inverse: bool,
    ) -> Result<Vec<f32>, PlanError> {
        let device = self.ctx.device();
        let queue = self.ctx.queue();
        let byte_len = (input.len() * 4) as u64;

        // The hardware queue accepts only serialized submissions.
        let _guard = self.ctx.lock_submission();

        queue.write_buffer(&state.io[0], 0, cast_slice(input));
        for (s, uniform) in state.uniforms.iter().enumerate() {
            let params = StageParams {
                n: size as u32,
                ns: 1 << s,
                inverse: u32::from(inverse),
                _pad: 0,
            };
            queue.write_buffer(uniform, 0, bytemuck::bytes_of(&params));
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("wf.fft.encoder"),
        });
        for s in 0..state.stages as usize {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("wf.fft.stage"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&state.pipeline.pipeline);
            pass.set_bind_group(0, &state.bind_groups[s], &[]);
            let half = (size / 2) as u32;
            pass.dispatch_workgroups(half.div_ceil(WORKGROUP_SIZE).max(1), 1, 1);
        }
        let out_index = (state.stages % 2) as usize;
        encoder.copy_buffer_to_buffer(&state.io[out_index], 0, &state.staging, 0, byte_len);
        queue.submit(Some(encoder.finish()));

        let slice = state.staging.slice(0..byte_len);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = sender.send(res);
        });
        let _ = device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|_| GpuError::Map)?
            .map_err(|_| GpuError::Map)?;

        let data = slice.get_mapped_range();
        let mut out = vec![0f32; input.len()];
        out.copy_from_slice(cast_slice(&data));
        drop(data);
        state.staging.unmap();

        if inverse {
            let scale = 1.0 / size as f32;
            for value in &mut out {
                *value *= scale;
            }
        }
        Ok(out)
    }
}

impl FftBackend for WgpuFftBackend {
    type State = WgpuPlanState;

    fn bind(&self, size: usize) -> Result<WgpuPlanState, PlanError> {
        if size < 2 || !size.is_power_of_two() {
            return Err(PlanError::InvalidLength(size));
        }

        // Serialized against every other bind and submission; dropped
        // before the plan is first used.
        let _guard = self.ctx.lock_submission();

        let pipeline = self.stage_pipeline()?;
        let twiddles = self
            .cache
            .get_or_build_raw(&twiddle_key(size), || {
                Ok::<_, PlanError>(twiddle_words(size))
            })?;

        let device = self.ctx.device();
        let byte_len = (size * 8) as u64;
        let twiddle_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("wf.fft.twiddles"),
            contents: cast_slice::<u32, u8>(&twiddles),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let io = [0, 1].map(|i| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(if i == 0 { "wf.fft.io_a" } else { "wf.fft.io_b" }),
                size: byte_len,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        });
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("wf.fft.staging"),
            size: byte_len,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let stages = size.trailing_zeros();
        let mut uniforms = Vec::with_capacity(stages as usize);
        let mut bind_groups = Vec::with_capacity(stages as usize);
        for s in 0..stages as usize {
            let uniform = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("wf.fft.params"),
                size: std::mem::size_of::<StageParams>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let (src, dst) = if s % 2 == 0 { (0, 1) } else { (1, 0) };
            bind_groups.push(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("wf.fft.bind"),
                layout: &self.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: io[src].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: io[dst].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: twiddle_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: uniform.as_entire_binding(),
                    },
                ],
            }));
            uniforms.push(uniform);
        }

        Ok(WgpuPlanState {
            pipeline,
            twiddles,
            io,
            staging,
            uniforms,
            bind_groups,
            stages,
        })
    }

    fn release(&self, state: Self::State) {
        trace!(
            "released transform plan state ({} stages, {} twiddle words)",
            state.stages,
            state.twiddles.len()
        );
        drop(state);
    }
}

impl FftPlan<WgpuFftBackend> {
    /// Runs the transform over `input`, `size` interleaved re/im pairs,
    /// returning interleaved output in natural order. The inverse
    /// direction normalizes by `1/size`.
    pub fn execute(&mut self, input: &[f32], inverse: bool) -> Result<Vec<f32>, PlanError> {
        let expected = self.size * 2;
        if input.len() != expected {
            return Err(PlanError::InputLength {
                expected,
                got: input.len(),
            });
        }
        let state = self.state.as_ref().expect("plan state released");
        self.backend.execute_bound(state, self.size, input, inverse)
    }
}
