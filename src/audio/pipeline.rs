use crate::audio::capture::AudioCapture;
use crate::audio::error::{AudioError, AudioResult};
use crate::audio::frame::{AudioFrame, SAMPLE_RATE};
use crate::audio::gain::{GainNormalizer, SilencePolicy};
use crate::audio::resampler::AudioResampler;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Configuration for the capture pipeline
///
/// # Example
/// ```
/// use voxline::audio::pipeline::CaptureConfig;
/// use voxline::audio::gain::SilencePolicy;
///
/// let config = CaptureConfig::default()
///     .with_frame_ms(20)
///     .with_silence_policy(SilencePolicy::Forward);
/// assert_eq!(config.frame_samples(), 480);
/// ```
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Input device ID (None for the default device)
    pub device_id: Option<String>,

    /// Frame period in milliseconds (20-50ms recommended)
    pub frame_ms: u32,

    /// What to do with silent frames
    pub silence_policy: SilencePolicy,

    /// Amplitude normalizer applied to every frame
    pub normalizer: GainNormalizer,
}

impl CaptureConfig {
    /// Set the input device ID
    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Set the frame period in milliseconds
    pub fn with_frame_ms(mut self, frame_ms: u32) -> Self {
        self.frame_ms = frame_ms;
        self
    }

    /// Set the silent-frame policy
    pub fn with_silence_policy(mut self, policy: SilencePolicy) -> Self {
        self.silence_policy = policy;
        self
    }

    /// Samples per frame at the fixed 24 kHz session rate
    pub fn frame_samples(&self) -> usize {
        (SAMPLE_RATE as usize * self.frame_ms as usize) / 1000
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_id: None,
            frame_ms: 40,
            silence_policy: SilencePolicy::default(),
            normalizer: GainNormalizer::new(),
        }
    }
}

/// Microphone capture pipeline
///
/// This pipeline:
/// 1. Captures mono audio from the microphone (via [`AudioCapture`])
/// 2. Resamples to the 24 kHz session rate (via [`AudioResampler`])
/// 3. Accumulates fixed-length frames (40ms by default)
/// 4. Normalizes amplitude and quantizes to PCM16
/// 5. Delivers each [`AudioFrame`] to the sink channel
///
/// The capture callback itself never blocks; all processing happens in a
/// spawned task fed through an internal channel.
///
/// # Example
/// ```no_run
/// use voxline::audio::pipeline::{CaptureConfig, CapturePipeline};
/// use tokio::sync::mpsc;
///
/// #[tokio::main]
/// async fn main() {
///     let (tx, mut rx) = mpsc::channel(100);
///
///     let mut pipeline = CapturePipeline::new(CaptureConfig::default()).unwrap();
///     pipeline.start(tx).await.unwrap();
///
///     while let Some(frame) = rx.recv().await {
///         println!("Captured {} samples", frame.len());
///     }
/// }
/// ```
pub struct CapturePipeline {
    /// Audio capture instance
    capture: AudioCapture,
    /// Pipeline configuration
    config: CaptureConfig,
    /// Processing task handle
    processing_task: Option<JoinHandle<()>>,
    /// Stop signal sender
    stop_signal: Option<tokio::sync::oneshot::Sender<()>>,
    /// Whether the pipeline is currently running
    is_running: bool,
}

impl CapturePipeline {
    /// Create a new capture pipeline
    ///
    /// Acquires the input device immediately; the sink is never invoked if
    /// acquisition fails.
    ///
    /// # Errors
    /// Returns a media error if the device cannot be acquired.
    pub fn new(config: CaptureConfig) -> AudioResult<Self> {
        info!("Creating capture pipeline");

        let capture = AudioCapture::new(config.device_id.as_deref())?;
        info!("Audio capture created: {} Hz", capture.sample_rate());

        Ok(Self {
            capture,
            config,
            processing_task: None,
            stop_signal: None,
            is_running: false,
        })
    }

    /// Start the pipeline, delivering frames to `sink`
    ///
    /// # Errors
    /// Returns an error if the pipeline is already running or the input
    /// stream cannot be started.
    pub async fn start(&mut self, sink: mpsc::Sender<AudioFrame>) -> AudioResult<()> {
        if self.is_running {
            return Err(AudioError::StreamBuildFailed(
                "Pipeline already running".to_string(),
            ));
        }

        info!("Starting capture pipeline");

        let (internal_tx, internal_rx) = mpsc::channel(100);
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel();

        let mut resampler = AudioResampler::new(self.capture.sample_rate(), SAMPLE_RATE)?;

        self.capture.start(internal_tx)?;

        let normalizer = self.config.normalizer.clone();
        let policy = self.config.silence_policy;
        let frame_samples = self.config.frame_samples();

        let processing_task = tokio::spawn(async move {
            if let Err(e) = Self::processing_loop(
                internal_rx,
                sink,
                stop_rx,
                &mut resampler,
                &normalizer,
                policy,
                frame_samples,
            )
            .await
            {
                error!("Capture processing loop error: {}", e);
            }
        });

        self.processing_task = Some(processing_task);
        self.stop_signal = Some(stop_tx);
        self.is_running = true;

        info!("Capture pipeline started");
        Ok(())
    }

    /// Stop the pipeline and release the input device
    ///
    /// Safe to call when not started. Awaits the processing task so that no
    /// frame is delivered after this returns.
    pub async fn stop(&mut self) {
        if !self.is_running {
            return;
        }

        info!("Stopping capture pipeline");

        self.capture.stop();

        if let Some(stop_tx) = self.stop_signal.take() {
            let _ = stop_tx.send(());
        }

        if let Some(task) = self.processing_task.take() {
            let _ = task.await;
        }

        self.is_running = false;
        info!("Capture pipeline stopped");
    }

    /// Whether the pipeline is running
    pub fn is_running(&self) -> bool {
        self.is_running
    }

    /// Input device sample rate in Hz
    pub fn input_sample_rate(&self) -> u32 {
        self.capture.sample_rate()
    }

    /// Output sample rate in Hz (always 24000)
    pub fn output_sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    /// Processing loop: resample, frame, normalize, deliver
    async fn processing_loop(
        mut input_rx: mpsc::Receiver<Vec<f32>>,
        sink: mpsc::Sender<AudioFrame>,
        mut stop_rx: tokio::sync::oneshot::Receiver<()>,
        resampler: &mut AudioResampler,
        normalizer: &GainNormalizer,
        policy: SilencePolicy,
        frame_samples: usize,
    ) -> AudioResult<()> {
        // Buffer for samples awaiting a complete resampler chunk
        let mut resample_buffer = Vec::new();

        // Buffer for resampled samples awaiting a complete frame
        let mut frame_buffer: Vec<f32> = Vec::new();

        info!("Capture processing loop started");
        debug!("Frame size: {} samples", frame_samples);

        loop {
            tokio::select! {
                Some(batch) = input_rx.recv() => {
                    match resampler.process_buffered(&batch, &mut resample_buffer) {
                        Ok(resampled) => {
                            if resampled.is_empty() {
                                continue;
                            }

                            frame_buffer.extend(resampled);

                            while frame_buffer.len() >= frame_samples {
                                let raw: Vec<f32> =
                                    frame_buffer.drain(..frame_samples).collect();

                                let normalized = normalizer.normalize(&raw);
                                if normalized.silent && policy == SilencePolicy::Drop {
                                    debug!("Dropping silent frame");
                                    continue;
                                }

                                let frame = AudioFrame::new(normalized.samples);
                                if sink.send(frame).await.is_err() {
                                    warn!("Frame sink closed, stopping processing loop");
                                    return Ok(());
                                }
                            }
                        }
                        Err(e) => {
                            error!("Resampling error: {}", e);
                        }
                    }
                }

                _ = &mut stop_rx => {
                    info!("Stop signal received");
                    break;
                }

                else => {
                    info!("Capture channel closed");
                    break;
                }
            }
        }

        info!("Capture processing loop finished");
        Ok(())
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        if self.is_running {
            // stop() is async and unavailable in Drop, but we can still
            // release the device and signal the task
            self.capture.stop();

            if let Some(stop_tx) = self.stop_signal.take() {
                let _ = stop_tx.send(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_config_defaults() {
        let config = CaptureConfig::default();

        assert_eq!(config.frame_ms, 40);
        assert_eq!(config.frame_samples(), 960);
        assert_eq!(config.silence_policy, SilencePolicy::Drop);
        assert!(config.device_id.is_none());
    }

    #[test]
    fn test_capture_config_builder() {
        let config = CaptureConfig::default()
            .with_device("Some Mic")
            .with_frame_ms(20)
            .with_silence_policy(SilencePolicy::Forward);

        assert_eq!(config.device_id.as_deref(), Some("Some Mic"));
        assert_eq!(config.frame_samples(), 480);
        assert_eq!(config.silence_policy, SilencePolicy::Forward);
    }

    #[test]
    fn test_frame_samples_within_bound() {
        // The recommended 20-50ms cadence maps to 480-1200 samples
        for ms in [20u32, 40, 50] {
            let config = CaptureConfig::default().with_frame_ms(ms);
            let samples = config.frame_samples();
            assert!((480..=1200).contains(&samples));
        }
    }

    #[tokio::test]
    async fn test_pipeline_creation() {
        match CapturePipeline::new(CaptureConfig::default()) {
            Ok(pipeline) => {
                assert!(!pipeline.is_running());
                assert_eq!(pipeline.output_sample_rate(), 24000);
            }
            Err(e) => {
                eprintln!("Warning: no capture device available: {}", e);
            }
        }
    }

    #[tokio::test]
    async fn test_pipeline_start_stop() {
        let (tx, mut rx) = mpsc::channel(10);

        let Ok(mut pipeline) = CapturePipeline::new(CaptureConfig::default()) else {
            eprintln!("Warning: no capture device available");
            return;
        };

        assert!(pipeline.start(tx).await.is_ok());
        assert!(pipeline.is_running());

        tokio::select! {
            Some(frame) = rx.recv() => {
                // Every delivered frame has the fixed byte length
                assert_eq!(frame.to_le_bytes().len(), frame.len() * 2);
            }
            _ = tokio::time::sleep(tokio::time::Duration::from_secs(2)) => {
                // No audio input in this environment; still a valid run
            }
        }

        pipeline.stop().await;
        assert!(!pipeline.is_running());
    }

    #[tokio::test]
    async fn test_pipeline_double_start() {
        let (tx, _rx) = mpsc::channel(10);

        if let Ok(mut pipeline) = CapturePipeline::new(CaptureConfig::default()) {
            assert!(pipeline.start(tx.clone()).await.is_ok());
            assert!(pipeline.start(tx).await.is_err());
            pipeline.stop().await;
        }
    }
}
