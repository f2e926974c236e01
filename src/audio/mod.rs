/// Audio capture and streaming
pub mod capture;

/// Audio device enumeration and management
pub mod device;

/// Audio-related error types
pub mod error;

/// Fixed-rate PCM16 frames
pub mod frame;

/// Amplitude normalization
pub mod gain;

/// Capture pipeline: microphone to normalized frames
pub mod pipeline;

/// Gapless playback of streamed PCM16 chunks
pub mod playback;

/// Audio resampling
pub mod resampler;

// Re-export commonly used types
pub use capture::AudioCapture;
pub use device::{AudioDevice, get_device_config, list_input_devices};
pub use error::{AudioError, AudioResult};
pub use frame::{AudioFrame, CHANNELS, SAMPLE_RATE};
pub use gain::{GainNormalizer, NormalizedFrame, SilencePolicy};
pub use pipeline::{CaptureConfig, CapturePipeline};
pub use playback::{PlaybackPipeline, PlaybackQueue};
pub use resampler::AudioResampler;
