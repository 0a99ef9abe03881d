//! Single-threaded batching for kernels with a block size other than the
//! render quantum
//!
//! The kernel runs inside the audio callback as soon as a whole batch is
//! buffered, so output lags input by one batch. Use this when the kernel is
//! cheap enough for the real-time deadline; otherwise use the worker bridge.

use renderq_core::domain::{
    BridgeConfig, Kernel, Result, RingBuffer, RingConsumer, RingProducer,
};

pub struct InlineBatcher<K: Kernel> {
    input_producer: RingProducer,
    input_consumer: RingConsumer,
    output_producer: RingProducer,
    output_consumer: RingConsumer,
    kernel: K,
    batch: usize,
    input_scratch: Vec<Vec<f32>>,
    output_scratch: Vec<Vec<f32>>,
    batches: u64,
}

impl<K: Kernel> InlineBatcher<K> {
    pub fn new(config: &BridgeConfig, kernel: K) -> Result<Self> {
        let layout = config.layout()?;
        let batch = config.batch_size;
        let channels = layout.max_channels();

        let (input_producer, input_consumer) = RingBuffer::new(layout).split();
        let (output_producer, output_consumer) = RingBuffer::new(layout).split();

        Ok(Self {
            input_producer,
            input_consumer,
            output_producer,
            output_consumer,
            kernel,
            batch,
            input_scratch: vec![vec![0.0; batch]; channels],
            output_scratch: vec![vec![0.0; batch]; channels],
            batches: 0,
        })
    }

    /// Run one render quantum and return the number of real output frames.
    ///
    /// The node's channel count is taken from `input.len()`, clamped to the
    /// configured maximum.
    pub fn process<I, O>(&mut self, input: &[I], output: &mut [O], frames: usize) -> usize
    where
        I: AsRef<[f32]>,
        O: AsMut<[f32]>,
    {
        let max = self.input_producer.layout().max_channels();
        let channels = input.len().clamp(1, max);
        if channels != self.input_producer.active_channels() {
            let _ = self.input_producer.adapt_channel_count(channels);
            let _ = self.input_consumer.adapt_channel_count(channels);
            let _ = self.output_producer.adapt_channel_count(channels);
            let _ = self.output_consumer.adapt_channel_count(channels);
        }

        self.input_producer.push(input, frames);

        if self.input_consumer.is_frame_available(self.batch)
            && self.output_producer.frames_free() >= self.batch
        {
            let channels = self.input_consumer.active_channels();
            self.input_consumer.pull(&mut self.input_scratch, self.batch);
            self.kernel
                .process(&self.input_scratch, &mut self.output_scratch, channels);
            self.output_producer
                .push(&self.output_scratch[..channels], self.batch);
            self.batches += 1;
        }

        self.output_consumer.pull(output, frames)
    }

    pub fn batch_size(&self) -> usize {
        self.batch
    }

    pub fn batches(&self) -> u64 {
        self.batches
    }

    /// Frames currently held back waiting for a full batch
    pub fn pending_frames(&self) -> usize {
        self.input_consumer.frames_available()
    }
}
