// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2026 Waveforge contributors
// Part of Waveforge. Licensed under AGPL-3.0-or-later.

//! Device-backed plan tests. Skipped on machines without a usable adapter.

use std::sync::Arc;

use wf_backend_wgpu::{FftPlan, GpuArtifactCache, GpuContext, WgpuFftBackend};

fn fixture() -> Option<(Arc<WgpuFftBackend>, Arc<GpuArtifactCache>)> {
    let ctx = match GpuContext::request() {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("skipping GPU tests: {err}");
            return None;
        }
    };
    let cache = Arc::new(GpuArtifactCache::new());
    Some((
        Arc::new(WgpuFftBackend::new(ctx, Arc::clone(&cache))),
        cache,
    ))
}

fn naive_dft(input: &[f32]) -> Vec<f32> {
    let n = input.len() / 2;
    let mut out = vec![0f32; input.len()];
    for k in 0..n {
        let mut acc = (0.0f64, 0.0f64);
        for j in 0..n {
            let theta = -2.0 * std::f64::consts::PI * (j * k) as f64 / n as f64;
            let (s, c) = theta.sin_cos();
            let (re, im) = (input[2 * j] as f64, input[2 * j + 1] as f64);
            acc.0 += re * c - im * s;
            acc.1 += re * s + im * c;
        }
        out[2 * k] = acc.0 as f32;
        out[2 * k + 1] = acc.1 as f32;
    }
    out
}

#[test]
fn transform_matches_reference_and_roundtrips() {
    let Some((backend, _cache)) = fixture() else {
        return;
    };

    let n = 256;
    let input: Vec<f32> = (0..2 * n)
        .map(|i| {
            let t = i as f32 / n as f32;
            (2.0 * std::f32::consts::PI * 7.0 * t).sin()
        })
        .collect();

    let mut plan = FftPlan::new(backend, n).unwrap();
    assert_eq!(plan.size(), n);

    let spectrum = plan.execute(&input, false).unwrap();
    let want = naive_dft(&input);
    for (g, w) in spectrum.iter().zip(&want) {
        assert!((g - w).abs() < 1e-2 * n as f32, "got {g}, want {w}");
    }

    let restored = plan.execute(&spectrum, true).unwrap();
    for (r, x) in restored.iter().zip(&input) {
        assert!((r - x).abs() < 1e-3, "got {r}, want {x}");
    }
}

#[test]
fn plans_of_one_length_share_cached_artifacts() {
    let Some((backend, cache)) = fixture() else {
        return;
    };

    let first = FftPlan::new(Arc::clone(&backend), 1024).unwrap();
    assert_eq!(cache.pipeline_count(), 1);
    assert!(cache.lookup_raw("fft.twiddle.1024").is_some());

    let second = FftPlan::new(Arc::clone(&backend), 1024).unwrap();
    assert_eq!(cache.pipeline_count(), 1, "stage pipeline must be reused");
    assert_eq!(cache.raw_count(), 1, "twiddle table must be reused");
    drop((first, second));

    // A different length adds a twiddle table but reuses the pipeline.
    let _third = FftPlan::new(backend, 2048).unwrap();
    assert_eq!(cache.pipeline_count(), 1);
    assert_eq!(cache.raw_count(), 2);
}

#[test]
fn invalid_lengths_are_rejected_outright() {
    let Some((backend, cache)) = fixture() else {
        return;
    };

    for bad in [0usize, 1, 3, 100] {
        assert!(FftPlan::new(Arc::clone(&backend), bad).is_err());
    }
    assert_eq!(cache.raw_count(), 0, "failed binds must not populate the cache");
}

#[test]
fn mismatched_input_length_is_reported() {
    let Some((backend, _cache)) = fixture() else {
        return;
    };

    let mut plan = FftPlan::new(backend, 64).unwrap();
    let err = plan.execute(&[0.0; 64], false).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("128"), "unexpected error: {message}");
}
