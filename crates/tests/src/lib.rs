//! Shared signal helpers for the renderq integration tests

use std::time::{Duration, Instant};

/// Frames whose value is their own index, starting at `start`
pub fn ramp(start: usize, frames: usize) -> Vec<f32> {
    (start..start + frames).map(|i| i as f32).collect()
}

pub fn generate_sine_wave(frequency: f32, sample_rate: u32, frames: usize) -> Vec<f32> {
    (0..frames)
        .map(|i| 2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate as f32)
        .map(|phase| phase.sin())
        .collect()
}

pub fn generate_silence(frames: usize) -> Vec<f32> {
    vec![0.0; frames]
}

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while !condition() {
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_micros(200));
    }
    true
}

pub fn assert_close(actual: &[f32], expected: &[f32], tolerance: f32) {
    assert_eq!(actual.len(), expected.len(), "length mismatch");
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() <= tolerance,
            "sample {} differs: {} vs {}",
            i,
            a,
            e
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp() {
        assert_eq!(ramp(3, 3), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_sine_starts_at_zero() {
        let sine = generate_sine_wave(440.0, 48000, 64);
        assert_eq!(sine.len(), 64);
        assert_eq!(sine[0], 0.0);
        assert!(sine.iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn test_wait_until_times_out() {
        assert!(!wait_until(Duration::from_millis(5), || false));
        assert!(wait_until(Duration::from_millis(5), || true));
    }
}
