//! End-to-end tests across the audio thread, the worker thread and both rings

use std::sync::Arc;
use std::time::Duration;

use renderq_core::domain::{
    BridgeConfig, GainKernel, IdentityKernel, RegionLayout, RenderSignal, RingBuffer, WaitPolicy,
};
use renderq_infra::audio::{Bridge, WorkerThreadAdapter};
use renderq_tests::{assert_close, ramp, wait_until};

const QUANTUM: usize = 128;
const BATCH: usize = 512;

// ============================================================================
// REFERENCE SCENARIO
// ============================================================================

#[test]
fn test_four_quanta_through_identity_worker() {
    let layout = RegionLayout::new(4096, 1).unwrap().with_batch(BATCH).unwrap();
    let input = RingBuffer::new(layout);
    let output = RingBuffer::new(layout);
    let (requester, waiter) =
        RenderSignal::new(Arc::clone(input.region())).split(WaitPolicy::Block);
    let (mut producer, worker_in) = input.split();
    let (worker_out, mut consumer) = output.split();

    let worker = WorkerThreadAdapter::new(worker_in, worker_out, waiter, IdentityKernel)
        .with_timeout(Some(Duration::from_secs(5)));
    let stats = worker.stats();
    let handle = worker.spawn(requester.clone()).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        requester.is_worker_ready()
    }));

    for i in 0..4 {
        assert!(producer.push(&[ramp(i * QUANTUM, QUANTUM)], QUANTUM));
    }
    assert_eq!(producer.frames_available(), 512);
    assert!(requester.request());

    assert!(wait_until(Duration::from_secs(5), || {
        consumer.is_frame_available(BATCH)
    }));

    for i in 0..4 {
        let mut out = [vec![-1.0f32; QUANTUM]];
        assert_eq!(consumer.pull(&mut out, QUANTUM), QUANTUM);
        assert_eq!(out[0], ramp(i * QUANTUM, QUANTUM));
    }
    assert_eq!(consumer.snapshot().underrun_frames, 0);

    handle.stop().unwrap();
    assert_eq!(stats.batches(), 1);
    assert_eq!(requester.wakes(), 1);
}

// ============================================================================
// STREAMING
// ============================================================================

/// Drive the audio side unpaced, never overrunning the input ring, and collect
/// every real output frame until `expected` frames have come back.
fn stream_through(config: &BridgeConfig, gain: f32, quanta: usize) -> Vec<f32> {
    let bridge = Bridge::build(config, GainKernel::new(gain)).unwrap();
    let mut running = bridge.start().unwrap();
    assert!(running.monitor().wait_until_ready(Duration::from_secs(5)));

    let expected = quanta * QUANTUM;
    let mut collected = Vec::with_capacity(expected + QUANTUM);
    let mut out = [vec![0.0f32; QUANTUM]];
    let mut sent = 0;

    let finished = wait_until(Duration::from_secs(20), || {
        let audio = running.audio_mut();
        if config.capacity - audio.input_frames_available() < QUANTUM {
            return false;
        }
        let input = if sent < quanta {
            ramp(sent * QUANTUM, QUANTUM)
        } else {
            vec![0.0; QUANTUM]
        };
        let report = audio.process(&[input], &mut out, QUANTUM);
        assert!(report.pushed);
        sent += 1;
        collected.extend_from_slice(&out[0][..report.pulled]);
        collected.len() >= expected
    });
    assert!(finished, "only {} frames came back", collected.len());

    let stats = running.stop().unwrap();
    assert_eq!(stats.input.overruns, 0);
    assert!(stats.batches >= (expected / config.batch_size) as u64);

    collected.truncate(expected);
    collected
}

#[test]
fn test_streaming_preserves_order_block_policy() {
    let config = BridgeConfig {
        max_channels: 1,
        ..Default::default()
    };
    let collected = stream_through(&config, 1.0, 64);
    assert_eq!(collected, ramp(0, 64 * QUANTUM));
}

#[test]
fn test_streaming_preserves_order_spin_policy() {
    let config = BridgeConfig {
        max_channels: 1,
        capacity: 2048,
        wait_policy: WaitPolicy::Spin,
        wait_timeout_ms: 10,
        ..Default::default()
    };
    let collected = stream_through(&config, 0.5, 48);
    let expected: Vec<f32> = ramp(0, 48 * QUANTUM).iter().map(|s| s * 0.5).collect();
    assert_close(&collected, &expected, 1e-3);
}

#[test]
fn test_stereo_channels_stay_separate() {
    let config = BridgeConfig {
        capacity: 1024,
        batch_size: 256,
        ..Default::default()
    };
    let bridge = Bridge::build(&config, IdentityKernel).unwrap();
    let (mut audio, mut worker, _monitor) = bridge.into_parts();

    let left = vec![1.0f32; QUANTUM];
    let right = vec![-1.0f32; QUANTUM];
    let mut out = [vec![0.0f32; QUANTUM], vec![0.0; QUANTUM]];

    audio.process(&[left.clone(), right.clone()], &mut out, QUANTUM);
    audio.process(&[left.clone(), right.clone()], &mut out, QUANTUM);
    assert_eq!(worker.process_pending(), 1);

    let report = audio.process(&[left.clone(), right.clone()], &mut out, QUANTUM);
    assert_eq!(report.pulled, QUANTUM);
    assert_eq!(out[0], left);
    assert_eq!(out[1], right);
}

#[test]
fn test_channel_count_change_reaches_output() {
    let config = BridgeConfig {
        capacity: 1024,
        batch_size: 256,
        ..Default::default()
    };
    let bridge = Bridge::build(&config, IdentityKernel).unwrap();
    let (mut audio, mut worker, monitor) = bridge.into_parts();

    let mono = [vec![0.25f32; QUANTUM]];
    let mut out = [vec![9.0f32; QUANTUM], vec![9.0; QUANTUM]];
    audio.process(&mono, &mut out, QUANTUM);
    audio.process(&mono, &mut out, QUANTUM);
    assert_eq!(worker.process_pending(), 1);
    assert_eq!(monitor.stats().output.active_channels, 1);

    audio.process(&mono, &mut out, QUANTUM);
    assert_eq!(out[0], vec![0.25; QUANTUM]);
    // Second output channel is silent once the worker is mono
    assert_eq!(out[1], vec![0.0; QUANTUM]);

    assert_eq!(monitor.stats().input.active_channels, 1);
}
