use crate::audio::error::{AudioError, AudioResult};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::{debug, info};

/// Audio resampler for converting device rates to the session rate
///
/// Uses high-quality Sinc interpolation to convert mono audio from the input
/// device's native rate to the fixed 24 kHz session rate.
pub struct AudioResampler {
    /// The rubato resampler instance
    resampler: SincFixedIn<f32>,
    /// Input buffer for rubato (channels x samples)
    input_buffer: Vec<Vec<f32>>,
    /// Output buffer for rubato (channels x samples)
    output_buffer: Vec<Vec<f32>>,
    /// Input sample rate
    input_rate: u32,
    /// Output sample rate
    output_rate: u32,
    /// Number of input samples per chunk
    chunk_size: usize,
}

impl AudioResampler {
    /// Create a new audio resampler
    ///
    /// # Arguments
    /// * `input_rate` - Input sample rate in Hz
    /// * `output_rate` - Output sample rate in Hz (24000 for a session)
    ///
    /// # Errors
    /// Returns `AudioError::ResampleFailed` if the resampler cannot be created.
    ///
    /// # Example
    /// ```no_run
    /// use voxline::audio::resampler::AudioResampler;
    ///
    /// // Resample from 48kHz to the 24kHz session rate
    /// let resampler = AudioResampler::new(48000, 24000).unwrap();
    /// ```
    pub fn new(input_rate: u32, output_rate: u32) -> AudioResult<Self> {
        info!("Creating resampler: {} Hz -> {} Hz", input_rate, output_rate);

        let ratio = output_rate as f64 / input_rate as f64;
        debug!("Resample ratio: {:.6}", ratio);

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };

        // Chunks of about 10ms of input audio
        let chunk_size = (input_rate / 100) as usize;

        debug!(
            "Chunk size: {} samples ({:.1}ms @ {} Hz)",
            chunk_size,
            1000.0 * chunk_size as f64 / input_rate as f64,
            input_rate
        );

        let resampler = SincFixedIn::<f32>::new(
            ratio,
            2.0,
            params,
            chunk_size,
            1, // mono
        )
        .map_err(|e| AudioError::ResampleFailed(format!("Failed to create resampler: {}", e)))?;

        let input_buffer = resampler.input_buffer_allocate(true);
        let output_buffer = resampler.output_buffer_allocate(true);

        info!(
            "Resampler created: chunk_size={}, output_size={}",
            chunk_size,
            resampler.output_frames_max()
        );

        Ok(Self {
            resampler,
            input_buffer,
            output_buffer,
            input_rate,
            output_rate,
            chunk_size,
        })
    }

    /// Process exactly one chunk of input samples
    ///
    /// # Errors
    /// Returns `AudioError::ResampleFailed` if the input length is not
    /// exactly `chunk_size()` or resampling fails.
    pub fn process(&mut self, input: &[f32]) -> AudioResult<Vec<f32>> {
        if input.len() != self.chunk_size {
            return Err(AudioError::ResampleFailed(format!(
                "Input size mismatch: expected {} samples, got {}",
                self.chunk_size,
                input.len()
            )));
        }

        self.input_buffer[0].copy_from_slice(input);

        let (_input_frames_used, output_frames_generated) = self
            .resampler
            .process_into_buffer(&self.input_buffer, &mut self.output_buffer, None)
            .map_err(|e| AudioError::ResampleFailed(format!("Resampling failed: {}", e)))?;

        Ok(self.output_buffer[0][..output_frames_generated].to_vec())
    }

    /// Process a variable-length input buffer
    ///
    /// Accumulates samples in `buffer` and processes as many complete chunks
    /// as are available. The returned vector may be empty when not enough
    /// input has accumulated yet.
    pub fn process_buffered(
        &mut self,
        input: &[f32],
        buffer: &mut Vec<f32>,
    ) -> AudioResult<Vec<f32>> {
        buffer.extend_from_slice(input);

        let mut output = Vec::new();

        while buffer.len() >= self.chunk_size {
            let chunk: Vec<f32> = buffer.drain(..self.chunk_size).collect();
            let resampled = self.process(&chunk)?;
            output.extend(resampled);
        }

        Ok(output)
    }

    /// Reset the resampler state
    ///
    /// Clears internal filter state, useful when starting a new session.
    pub fn reset(&mut self) {
        debug!("Resetting resampler");
        self.resampler.reset();

        for channel in &mut self.input_buffer {
            channel.fill(0.0);
        }
        for channel in &mut self.output_buffer {
            channel.fill(0.0);
        }
    }

    /// Input sample rate in Hz
    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    /// Output sample rate in Hz
    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Number of input samples consumed per `process` call
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}
