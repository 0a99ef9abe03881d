//! Worker lifecycle, liveness and degradation under load

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use renderq_core::domain::{BridgeConfig, FnKernel, IdentityKernel, RenderqConfig, WaitPolicy};
use renderq_infra::audio::Bridge;
use renderq_tests::{generate_silence, generate_sine_wave, wait_until};
use tempfile::TempDir;

const QUANTUM: usize = 128;

fn small(policy: WaitPolicy) -> BridgeConfig {
    BridgeConfig {
        capacity: 1024,
        max_channels: 1,
        batch_size: 256,
        wait_policy: policy,
        ..Default::default()
    }
}

// ============================================================================
// SHUTDOWN
// ============================================================================

#[test]
fn test_idle_worker_stops_promptly() {
    for policy in [WaitPolicy::Block, WaitPolicy::Spin] {
        let config = BridgeConfig {
            wait_timeout_ms: 0,
            ..small(policy)
        };
        let running = Bridge::build(&config, IdentityKernel)
            .unwrap()
            .start()
            .unwrap();
        assert!(running.monitor().wait_until_ready(Duration::from_secs(5)));

        // No deadline on the wait: only the shutdown wake can end it
        let stats = running.stop().unwrap();
        assert_eq!(stats.batches, 0);
        assert_eq!(stats.timeouts, 0);
    }
}

#[test]
fn test_dropping_running_bridge_joins_worker() {
    let running = Bridge::build(&small(WaitPolicy::Block), IdentityKernel)
        .unwrap()
        .start()
        .unwrap();
    let monitor = running.monitor().clone();
    assert!(monitor.wait_until_ready(Duration::from_secs(5)));
    drop(running);
    assert!(monitor.is_worker_ready());
}

// ============================================================================
// LIVENESS
// ============================================================================

#[test]
fn test_timed_out_wait_rechecks_state() {
    let config = BridgeConfig {
        wait_timeout_ms: 5,
        ..small(WaitPolicy::Block)
    };
    let bridge = Bridge::build(&config, IdentityKernel).unwrap();
    let mut running = bridge.start().unwrap();
    let monitor = running.monitor().clone();
    assert!(monitor.wait_until_ready(Duration::from_secs(5)));

    // One quantum stays below the batch threshold, so only timeouts wake the worker
    let audio = running.audio_mut();
    let mut out = [generate_silence(QUANTUM)];
    audio.process(&[generate_silence(QUANTUM)], &mut out, QUANTUM);
    assert_eq!(audio.input_frames_available(), QUANTUM);

    assert!(wait_until(Duration::from_secs(5), || {
        monitor.stats().timeouts >= 2
    }));

    let stats = running.stop().unwrap();
    // Below the batch size: the timeouts found nothing to do
    assert_eq!(stats.batches, 0);
    assert_eq!(stats.input.frames_available, QUANTUM);
}

#[test]
fn test_request_during_batch_is_not_lost() {
    let started = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&started);
    let slow = FnKernel(move |input: &[Vec<f32>], output: &mut [Vec<f32>], channels: usize| {
        seen.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20));
        for ch in 0..channels {
            output[ch].copy_from_slice(&input[ch]);
        }
    });

    let config = BridgeConfig {
        wait_timeout_ms: 0,
        ..small(WaitPolicy::Block)
    };
    let mut running = Bridge::build(&config, slow).unwrap().start().unwrap();
    let monitor = running.monitor().clone();
    assert!(monitor.wait_until_ready(Duration::from_secs(5)));

    let tone = generate_sine_wave(440.0, 48000, QUANTUM);
    let mut out = [generate_silence(QUANTUM)];

    // First batch: the worker wakes and starts the slow kernel
    for _ in 0..2 {
        running.audio_mut().process(&[tone.clone()], &mut out, QUANTUM);
    }
    assert!(wait_until(Duration::from_secs(5), || {
        started.load(Ordering::SeqCst) >= 1
    }));

    // Second batch arrives mid-kernel; the flag was cleared before the kernel
    // ran, so this is a fresh edge and the worker must not sleep through it
    for _ in 0..2 {
        running.audio_mut().process(&[tone.clone()], &mut out, QUANTUM);
    }
    assert!(wait_until(Duration::from_secs(5), || {
        monitor.stats().batches >= 2
    }));

    let stats = running.stop().unwrap();
    assert_eq!(stats.batches, 2);
    assert_eq!(stats.wakes, 2);
}

// ============================================================================
// DEGRADATION
// ============================================================================

#[test]
fn test_stalled_worker_overruns_then_recovers() {
    let bridge = Bridge::build(&small(WaitPolicy::Block), IdentityKernel).unwrap();
    let (mut audio, mut worker, monitor) = bridge.into_parts();

    let tone = generate_sine_wave(1000.0, 48000, QUANTUM);
    let mut out = [generate_silence(QUANTUM)];

    // 1024 frames of room, 10 quanta pushed: the last two are dropped
    let pushed = (0..10)
        .filter(|_| audio.process(&[tone.clone()], &mut out, QUANTUM).pushed)
        .count();
    assert_eq!(pushed, 8);

    let stats = monitor.stats();
    assert_eq!(stats.input.overruns, 2);
    assert_eq!(stats.input.frames_free, 0);
    assert_eq!(stats.output.underrun_frames, 10 * QUANTUM as u64);
    assert_eq!(stats.wakes, 1);

    // The worker catches up on everything it has room for
    assert_eq!(worker.process_pending(), 4);
    let report = audio.process(&[tone.clone()], &mut out, QUANTUM);
    assert!(report.pushed);
    assert_eq!(report.pulled, QUANTUM);
    assert_eq!(out[0], tone);
}

#[tokio::test]
async fn test_bridge_from_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("renderq.toml");
    tokio::fs::write(
        &path,
        "[bridge]\ncapacity = 2048\nmax_channels = 1\nbatch_size = 256\nwait_policy = \"spin\"\n",
    )
    .await
    .unwrap();

    let config = RenderqConfig::load_from_file(&path).await.unwrap();
    assert_eq!(config.bridge.wait_policy, WaitPolicy::Spin);

    let bridge = Bridge::build(&config.bridge, config.clock.kernel.build()).unwrap();
    let (audio, worker, _monitor) = bridge.into_parts();
    assert_eq!(audio.batch_threshold(), 256);
    assert_eq!(worker.batch_size(), 256);
}
