use crate::audio::device::find_device_by_id;
use crate::audio::error::{AudioError, AudioResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Microphone capture
///
/// Owns the cpal input stream and forwards raw f32 sample batches, downmixed
/// to mono, through a channel. The audio callback never blocks: batches are
/// handed off with `try_send` and dropped when the channel is full.
pub struct AudioCapture {
    /// The audio input stream (None when stopped)
    stream: Option<Stream>,
    /// Sample rate of the input device
    sample_rate: u32,
    /// Number of channels delivered by the device
    channels: u16,
    /// Device being used for capture
    device: Device,
    /// Stream configuration
    config: StreamConfig,
}

impl AudioCapture {
    /// Create a new capture instance
    ///
    /// # Arguments
    /// * `device_id` - Optional device ID. If None, uses the default input device.
    ///
    /// # Errors
    /// Returns `AudioError::DeviceNotFound` if no device is available.
    /// Returns `AudioError::DefaultConfigError` if unable to get device config.
    ///
    /// # Example
    /// ```no_run
    /// use voxline::audio::capture::AudioCapture;
    ///
    /// let capture = AudioCapture::new(None).unwrap();
    /// println!("Capturing at {} Hz", capture.sample_rate());
    /// ```
    pub fn new(device_id: Option<&str>) -> AudioResult<Self> {
        let host = cpal::default_host();

        let device = if let Some(id) = device_id {
            find_device_by_id(&host, id)?
        } else {
            host.default_input_device()
                .ok_or(AudioError::DeviceNotFound)?
        };

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Using audio input device: {}", device_name);

        let config = device.default_input_config()?;
        let sample_rate = config.sample_rate().0;
        let channels = config.channels();

        info!("Device config: {} Hz, {} channels", sample_rate, channels);

        let stream_config = StreamConfig {
            channels,
            sample_rate: config.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        Ok(Self {
            stream: None,
            sample_rate,
            channels,
            device,
            config: stream_config,
        })
    }

    /// Start capturing audio
    ///
    /// Multi-channel input is downmixed to mono by taking the first channel
    /// of each interleaved group before the batch is forwarded.
    ///
    /// # Arguments
    /// * `sender` - Channel sender for mono f32 sample batches
    ///
    /// # Errors
    /// Returns `AudioError::StreamBuildFailed` if unable to build the stream.
    pub fn start(&mut self, sender: mpsc::Sender<Vec<f32>>) -> AudioResult<()> {
        if self.stream.is_some() {
            warn!("Audio capture already started");
            return Ok(());
        }

        info!("Starting audio capture");

        let channels = self.channels as usize;

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mono: Vec<f32> = if channels == 1 {
                        data.to_vec()
                    } else {
                        data.chunks(channels).map(|group| group[0]).collect()
                    };

                    // try_send keeps the audio thread responsive; a full
                    // channel drops the batch
                    let _ = sender.try_send(mono);
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::StreamBuildFailed(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        self.stream = Some(stream);
        info!("Audio capture started successfully");

        Ok(())
    }

    /// Stop capturing audio
    ///
    /// Drops the input stream, releasing the device. Safe to call when not
    /// started and safe to call multiple times.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            info!("Stopping audio capture");
            drop(stream);
            debug!("Audio capture stopped");
        }
    }

    /// Sample rate of the input device in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of channels delivered by the device
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Whether capture is currently active
    pub fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_audio_capture_creation() {
        match AudioCapture::new(None) {
            Ok(capture) => {
                assert!(capture.sample_rate() > 0, "Sample rate should be positive");
                assert!(capture.channels() > 0, "Should have at least one channel");
                assert!(!capture.is_capturing(), "Should not be capturing initially");
            }
            Err(e) => {
                eprintln!("Warning: Could not create AudioCapture: {}", e);
            }
        }
    }

    #[tokio::test]
    async fn test_audio_capture_start_stop() {
        let (tx, mut rx) = mpsc::channel(100);

        let Ok(mut capture) = AudioCapture::new(None) else {
            eprintln!("Warning: No audio device available for testing");
            return;
        };

        assert!(capture.start(tx).is_ok(), "Should start successfully");
        assert!(capture.is_capturing(), "Should be capturing after start");

        let timeout_result = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;

        if let Ok(Some(data)) = timeout_result {
            assert!(!data.is_empty(), "Should receive non-empty data");
        }

        capture.stop();
        assert!(!capture.is_capturing(), "Should not be capturing after stop");

        // Should be safe to call stop again
        capture.stop();
    }

    #[tokio::test]
    async fn test_audio_capture_double_start() {
        let (tx, _rx) = mpsc::channel(100);

        if let Ok(mut capture) = AudioCapture::new(None) {
            assert!(capture.start(tx.clone()).is_ok());

            // Second start is a warning, not an error
            assert!(capture.start(tx).is_ok());

            capture.stop();
        }
    }

    #[tokio::test]
    async fn test_audio_capture_with_unknown_device() {
        let result = AudioCapture::new(Some("NonExistentDevice"));
        assert!(result.is_err(), "Should fail with non-existent device");
    }
}
