use serde::{Deserialize, Serialize};

/// RMS level the normalizer aims for
pub const TARGET_RMS: f32 = 0.1;

/// Upper bound on the applied gain factor
pub const MAX_GAIN: f32 = 4.0;

/// RMS below which a frame is considered silent
pub const SILENCE_RMS_FLOOR: f32 = 0.01;

/// What to do with frames whose RMS is below the silence floor
///
/// `Drop` suppresses silent frames entirely. `Forward` passes them through
/// unamplified, for services whose idle timeout requires a steady stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SilencePolicy {
    /// Discard silent frames (default)
    #[default]
    Drop,
    /// Forward silent frames without gain
    Forward,
}

/// A normalized frame together with its silence classification
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFrame {
    /// Quantized samples, clamped to the i16 range
    pub samples: Vec<i16>,
    /// Whether the input RMS was below the silence floor
    pub silent: bool,
}

/// Amplitude normalizer for captured frames
///
/// Computes the RMS of each f32 frame and applies
/// `min(target_rms / rms, max_gain)` before quantizing to signed 16-bit
/// integers. Quantization clamps to the representable range, so the output
/// never wraps around regardless of input level.
///
/// # Example
/// ```
/// use voxline::audio::gain::GainNormalizer;
///
/// let normalizer = GainNormalizer::new();
/// let frame = normalizer.normalize(&[0.05, -0.05, 0.05, -0.05]);
/// assert!(!frame.silent);
/// ```
#[derive(Debug, Clone)]
pub struct GainNormalizer {
    target_rms: f32,
    max_gain: f32,
    silence_floor: f32,
}

impl GainNormalizer {
    /// Create a normalizer with the default parameters
    pub fn new() -> Self {
        Self {
            target_rms: TARGET_RMS,
            max_gain: MAX_GAIN,
            silence_floor: SILENCE_RMS_FLOOR,
        }
    }

    /// Override the target RMS level
    pub fn with_target_rms(mut self, target_rms: f32) -> Self {
        self.target_rms = target_rms;
        self
    }

    /// Override the maximum gain factor
    pub fn with_max_gain(mut self, max_gain: f32) -> Self {
        self.max_gain = max_gain;
        self
    }

    /// Override the silence floor
    pub fn with_silence_floor(mut self, silence_floor: f32) -> Self {
        self.silence_floor = silence_floor;
        self
    }

    /// Compute the root-mean-square level of a frame
    pub fn rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
        (sum_sq / samples.len() as f32).sqrt()
    }

    /// Normalize a frame of f32 samples to clamped PCM16
    ///
    /// Frames below the silence floor are quantized without gain and marked
    /// silent; the caller decides their fate via [`SilencePolicy`].
    pub fn normalize(&self, samples: &[f32]) -> NormalizedFrame {
        let rms = Self::rms(samples);

        let (gain, silent) = if rms < self.silence_floor {
            (1.0, true)
        } else {
            ((self.target_rms / rms).min(self.max_gain), false)
        };

        let quantized = samples
            .iter()
            .map(|&s| {
                let scaled = (s * gain).clamp(-1.0, 1.0);
                (scaled * 32767.0) as i16
            })
            .collect();

        NormalizedFrame {
            samples: quantized,
            silent,
        }
    }
}

impl Default for GainNormalizer {
    fn default() -> Self {
        Self::new()
    }
}
