//! Simulated device clock
//!
//! Drives an [`AudioThreadAdapter`] at the cadence a real device would, one
//! render quantum every `quantum / sample_rate` seconds, feeding it a sine
//! tone. Used by the CLI and by soak tests that have no audio hardware.

use serde::Serialize;
use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use renderq_core::domain::{RenderQuantum, SampleRate};

use super::realtime::{AudioThreadAdapter, QuantumReport};
use crate::error::{HostError, Result};

/// Phase-accumulating sine generator
#[derive(Debug, Clone, Copy)]
pub struct SineSource {
    phase: f32,
    step: f32,
    amplitude: f32,
}

impl SineSource {
    /// A zero sample rate or a non-finite frequency gives a silent source
    pub fn new(frequency: f32, sample_rate: SampleRate) -> Self {
        let step = match sample_rate.hz() {
            0 => 0.0,
            hz => TAU * frequency / hz as f32,
        };
        Self {
            phase: 0.0,
            step: if step.is_finite() { step } else { 0.0 },
            amplitude: 0.5,
        }
    }

    /// Fill the first channel with the next samples and copy it to the others
    pub fn fill<S: AsMut<[f32]>>(&mut self, channels: &mut [S]) {
        let Some((first, rest)) = channels.split_first_mut() else {
            return;
        };
        let first = first.as_mut();
        for sample in first.iter_mut() {
            *sample = self.amplitude * self.phase.sin();
            self.phase = (self.phase + self.step) % TAU;
        }
        for channel in rest {
            let channel = channel.as_mut();
            let len = channel.len().min(first.len());
            channel[..len].copy_from_slice(&first[..len]);
        }
    }
}

/// Totals gathered by the clock thread
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ClockReport {
    pub quanta: u64,
    /// Input quanta rejected because the input ring was full
    pub dropped_quanta: u64,
    /// Output frames that came from the worker
    pub played_frames: u64,
    /// Output frames zero-filled on underrun
    pub silent_frames: u64,
    /// Quanta that started after their deadline
    pub late_quanta: u64,
    pub peak: f32,
}

impl ClockReport {
    fn record(&mut self, report: QuantumReport, frames: usize, output: &[Vec<f32>]) {
        self.quanta += 1;
        if !report.pushed {
            self.dropped_quanta += 1;
        }
        self.played_frames += report.pulled as u64;
        self.silent_frames += (frames - report.pulled) as u64;
        for channel in output {
            for &sample in &channel[..report.pulled.min(channel.len())] {
                self.peak = self.peak.max(sample.abs());
            }
        }
    }
}

/// Paced render loop for an [`AudioThreadAdapter`]
#[derive(Debug)]
pub struct RenderClock {
    frames: usize,
    period: Duration,
    source: SineSource,
    input: Vec<Vec<f32>>,
    output: Vec<Vec<f32>>,
    report: ClockReport,
}

impl RenderClock {
    pub fn new(quantum: RenderQuantum, sample_rate: SampleRate, channels: usize) -> Result<Self> {
        let frames = quantum.frames();
        let channels = channels.max(1);
        Ok(Self {
            frames,
            period: quantum.period(sample_rate)?,
            source: SineSource::new(440.0, sample_rate),
            input: vec![vec![0.0; frames]; channels],
            output: vec![vec![0.0; frames]; channels],
            report: ClockReport::default(),
        })
    }

    pub fn with_source(mut self, source: SineSource) -> Self {
        self.source = source;
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn report(&self) -> ClockReport {
        self.report
    }

    /// Run one quantum immediately, without pacing
    pub fn tick(&mut self, audio: &mut AudioThreadAdapter) -> QuantumReport {
        self.source.fill(&mut self.input);
        let report = audio.process(&self.input, &mut self.output, self.frames);
        self.report.record(report, self.frames, &self.output);
        report
    }

    /// Run on a dedicated thread until the handle is stopped
    pub fn start(mut self, mut audio: AudioThreadAdapter) -> Result<ClockHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        info!(
            frames = self.frames,
            period_us = self.period.as_micros() as u64,
            "Starting render clock"
        );

        let thread = thread::Builder::new()
            .name("renderq-clock".into())
            .spawn(move || {
                let mut deadline = Instant::now();
                while !stop_flag.load(Ordering::Acquire) {
                    let now = Instant::now();
                    if now > deadline + self.period {
                        self.report.late_quanta += 1;
                        deadline = now;
                    }

                    self.tick(&mut audio);

                    deadline += self.period;
                    if let Some(wait) = deadline.checked_duration_since(Instant::now()) {
                        thread::sleep(wait);
                    }
                }
                debug!(quanta = self.report.quanta, "Render clock stopped");
                (audio, self.report)
            })
            .map_err(|source| HostError::Spawn {
                thread: "clock",
                source,
            })?;

        Ok(ClockHandle {
            stop,
            thread: Some(thread),
        })
    }
}

/// Running clock thread; stopped on drop
#[derive(Debug)]
pub struct ClockHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<(AudioThreadAdapter, ClockReport)>>,
}

impl ClockHandle {
    /// Stop the clock and take back the adapter
    pub fn stop(mut self) -> Result<(AudioThreadAdapter, ClockReport)> {
        self.stop.store(true, Ordering::Release);
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| HostError::Panicked("clock")),
            None => Err(HostError::Panicked("clock")),
        }
    }
}

impl Drop for ClockHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
