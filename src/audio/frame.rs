use base64::{Engine, engine::general_purpose::STANDARD};
use std::time::Duration;

use crate::audio::error::{AudioError, AudioResult};

/// Sample rate every frame in a session is captured and played at, in Hz.
pub const SAMPLE_RATE: u32 = 24_000;

/// Number of channels in every frame (mono).
pub const CHANNELS: u16 = 1;

/// A fixed-rate mono frame of signed 16-bit PCM samples
///
/// Frames are the unit of exchange between the capture pipeline, the session
/// router and the wire protocol. The sample rate is fixed at 24 kHz for the
/// lifetime of a session; the byte view is always little-endian and exactly
/// twice the sample count.
///
/// # Example
/// ```
/// use voxline::audio::frame::AudioFrame;
///
/// let frame = AudioFrame::new(vec![0i16; 960]);
/// assert_eq!(frame.to_le_bytes().len(), 1920);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Vec<i16>,
}

impl AudioFrame {
    /// Create a frame from raw i16 samples
    pub fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    /// Borrow the raw samples
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Number of samples in the frame
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the frame contains no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Wall-clock duration of the frame at the fixed 24 kHz rate
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / SAMPLE_RATE as f64)
    }

    /// Serialize the samples as little-endian bytes
    ///
    /// The returned buffer has exactly `2 * len()` bytes.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.samples.len() * 2);
        for &sample in &self.samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        bytes
    }

    /// Base64-encode the little-endian byte view for wire transport
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_le_bytes())
    }

    /// Decode a frame from little-endian PCM16 bytes
    ///
    /// # Errors
    /// Returns `AudioError::DecodeFailed` if the byte count is odd.
    pub fn from_le_bytes(bytes: &[u8]) -> AudioResult<Self> {
        if bytes.len() % 2 != 0 {
            return Err(AudioError::DecodeFailed(format!(
                "odd byte count: {}",
                bytes.len()
            )));
        }

        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        Ok(Self { samples })
    }
}
