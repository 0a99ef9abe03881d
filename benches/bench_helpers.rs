//! Helper utilities for benchmarks

/// Generate sine wave test signal
pub fn generate_sine_wave(freq: f32, sample_rate: u32, frames: usize) -> Vec<f32> {
    (0..frames)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * freq * t).sin()
        })
        .collect()
}

/// Generate silence
pub fn generate_silence(frames: usize) -> Vec<f32> {
    vec![0.0; frames]
}

/// One sine channel per entry, each slightly detuned so channels differ
pub fn planar_sine(channels: usize, frames: usize) -> Vec<Vec<f32>> {
    (0..channels)
        .map(|ch| generate_sine_wave(440.0 * (ch + 1) as f32, 48000, frames))
        .collect()
}

/// Zeroed planar buffers, the shape every push/pull call takes
pub fn planar_silence(channels: usize, frames: usize) -> Vec<Vec<f32>> {
    vec![generate_silence(frames); channels]
}

/// Calculate peak level
pub fn calc_peak(buffer: &[f32]) -> f32 {
    buffer.iter().map(|&s| s.abs()).fold(0.0f32, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_sine_wave() {
        let wave = generate_sine_wave(440.0, 48000, 512);
        assert_eq!(wave.len(), 512);
        assert!(wave.iter().all(|&s| (-1.0..=1.0).contains(&s)));
    }

    #[test]
    fn test_planar_shapes() {
        let sine = planar_sine(2, 128);
        assert_eq!(sine.len(), 2);
        assert!(sine.iter().all(|ch| ch.len() == 128));
        assert_ne!(sine[0], sine[1]);

        let silence = planar_silence(3, 64);
        assert_eq!(calc_peak(&silence[2]), 0.0);
    }

    #[test]
    fn test_calc_peak() {
        let signal = vec![0.5, -0.8, 0.3, -0.2];
        let peak = calc_peak(&signal);
        assert!((peak - 0.8).abs() < 0.01);
    }
}
