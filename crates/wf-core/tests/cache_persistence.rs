// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2026 Waveforge contributors
// Part of Waveforge. Licensed under AGPL-3.0-or-later.

//! End-to-end persistence behaviour of the cache manager.

use std::sync::Arc;

use waveforge_config::Settings;
use wf_core::CacheManager;

struct NullPipeline;

type Manager = CacheManager<NullPipeline>;

#[test]
fn flush_and_reopen_restores_raw_blobs() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = Settings::with_cache_dir(tmp.path());

    let manager = Manager::open(&settings);
    manager
        .cache()
        .store_raw("fft.twiddle.256", Arc::new((0..256).collect()));
    assert_eq!(manager.flush().unwrap(), 1);
    drop(manager);

    let reopened = Manager::open(&settings);
    let blob = reopened
        .cache()
        .lookup_raw("fft.twiddle.256")
        .expect("persisted blob must reload");
    assert_eq!(blob.len(), 256);
    assert_eq!(blob[255], 255);
}

#[test]
fn teardown_flushes_without_an_explicit_call() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = Settings::with_cache_dir(tmp.path());

    {
        let manager = Manager::open(&settings);
        manager
            .cache()
            .store_raw("decoder.lut.uart", Arc::new(vec![7; 32]));
    }

    let reopened = Manager::open(&settings);
    assert!(reopened.cache().lookup_raw("decoder.lut.uart").is_some());
}

#[test]
fn pipelines_never_persist() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = Settings::with_cache_dir(tmp.path());

    {
        let manager = Manager::open(&settings);
        manager.cache().store_pipeline("p", Arc::new(NullPipeline));
    }

    let reopened = Manager::open(&settings);
    assert!(reopened.cache().lookup_pipeline("p").is_none());
}

#[test]
fn clear_does_not_delete_disk_state() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = Settings::with_cache_dir(tmp.path());

    let manager = Manager::open(&settings);
    manager.cache().store_raw("k", Arc::new(vec![1, 2]));
    manager.flush().unwrap();

    manager.cache().clear();
    assert!(manager.cache().lookup_raw("k").is_none());

    // Clearing emptied the tables only; the flushed state is still on disk
    // and a fresh manager picks it up.
    let reopened = Manager::open(&settings);
    assert_eq!(
        reopened.cache().lookup_raw("k").expect("disk state intact").as_slice(),
        &[1, 2]
    );
}

#[test]
fn memory_only_settings_leave_the_directory_untouched() {
    let manager = Manager::open(&Settings::in_memory());
    manager.cache().store_raw("k", Arc::new(vec![1]));
    assert!(manager.root().is_none());
}
