use crate::audio::device::default_output_device;
use crate::audio::error::{AudioError, AudioResult};
use crate::audio::frame::SAMPLE_RATE;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use ringbuf::{
    HeapRb,
    traits::{Consumer, Producer, Split},
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Capacity of the ring between the scheduler and the device callback,
/// in samples (200ms at 24 kHz)
const RING_CAPACITY: usize = 4800;

/// How far ahead of its scheduled start a chunk is staged to the device ring
const SCHEDULE_LEAD: Duration = Duration::from_millis(20);

/// Decode little-endian PCM16 bytes to f32 samples in [-1.0, 1.0]
///
/// # Errors
/// Returns `AudioError::DecodeFailed` if the byte count is odd.
pub fn decode_pcm16(bytes: &[u8]) -> AudioResult<Vec<f32>> {
    if bytes.len() % 2 != 0 {
        return Err(AudioError::DecodeFailed(format!(
            "odd byte count: {}",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect())
}

/// Ordered queue of decoded audio chunks with a running schedule cursor
///
/// Implements the running-clock scheduling that keeps playback gapless: each
/// popped chunk starts at `max(next_start, now)` and the cursor advances by
/// the chunk's duration. A cleared queue with a reset cursor is the only
/// stopped state.
#[derive(Debug)]
pub struct PlaybackQueue {
    chunks: VecDeque<Vec<f32>>,
    next_start: Option<Instant>,
    playing_until: Option<Instant>,
    sample_rate: u32,
}

impl PlaybackQueue {
    /// Create an empty queue for the given output rate
    pub fn new(sample_rate: u32) -> Self {
        Self {
            chunks: VecDeque::new(),
            next_start: None,
            playing_until: None,
            sample_rate,
        }
    }

    /// Append a decoded chunk
    ///
    /// Zero-length chunks are ignored so they never advance the clock.
    pub fn push(&mut self, samples: Vec<f32>) {
        if samples.is_empty() {
            debug!("Ignoring zero-length playback chunk");
            return;
        }
        self.chunks.push_back(samples);
    }

    /// Pop the next chunk together with its scheduled start time
    ///
    /// The start is `max(next_start, now)`; the cursor then advances by the
    /// chunk's duration, so consecutive chunks neither overlap nor leave a
    /// gap even when the caller is late.
    pub fn pop_scheduled(&mut self, now: Instant) -> Option<(Vec<f32>, Instant)> {
        let chunk = self.chunks.pop_front()?;

        let start = match self.next_start {
            Some(cursor) if cursor > now => cursor,
            _ => now,
        };

        let duration = Duration::from_secs_f64(chunk.len() as f64 / self.sample_rate as f64);
        let end = start + duration;
        self.next_start = Some(end);
        self.playing_until = Some(end);

        Some((chunk, start))
    }

    /// Empty the queue and reset the schedule cursor
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.next_start = None;
        self.playing_until = None;
    }

    /// Number of pending chunks
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether no chunks are pending
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Whether chunks are pending or a popped chunk is still playing
    pub fn is_active(&self, now: Instant) -> bool {
        if !self.chunks.is_empty() {
            return true;
        }
        self.playing_until.is_some_and(|until| until > now)
    }
}

/// Shared state between the pipeline handle and the scheduler thread
struct PlaybackShared {
    queue: Mutex<PlaybackQueue>,
    wake: Condvar,
    /// Bumped on clear; invalidates chunks mid-staging
    epoch: AtomicU64,
    /// Asks the device callback to drop staged samples
    flush: AtomicBool,
    shutdown: AtomicBool,
}

/// Gapless playback of streamed PCM16 chunks
///
/// `enqueue` accepts raw little-endian PCM16 buffers; decoded chunks are
/// scheduled back to back on a running clock and fed to the output device
/// through a lock-free ring. `clear` takes effect immediately for everything
/// still queued; samples the device callback has already consumed cannot be
/// recalled.
///
/// # Example
/// ```no_run
/// use voxline::audio::playback::PlaybackPipeline;
///
/// let playback = PlaybackPipeline::new();
/// playback.start().unwrap();
/// playback.enqueue(&[0u8; 960]).unwrap();
/// assert!(playback.is_playing());
/// playback.clear();
/// assert!(!playback.is_playing());
/// ```
pub struct PlaybackPipeline {
    shared: Arc<PlaybackShared>,
    worker: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl PlaybackPipeline {
    /// Create a pipeline for the fixed 24 kHz session rate
    ///
    /// No device is touched until [`start`](Self::start); chunks enqueued
    /// before then simply wait in the queue.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(PlaybackShared {
                queue: Mutex::new(PlaybackQueue::new(SAMPLE_RATE)),
                wake: Condvar::new(),
                epoch: AtomicU64::new(0),
                flush: AtomicBool::new(false),
                shutdown: AtomicBool::new(false),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Open the output device and start draining the queue
    ///
    /// cpal streams are not `Send`, so a dedicated thread owns the stream
    /// and runs the scheduler loop. Idempotent while running.
    ///
    /// # Errors
    /// Returns a media error if no output device is available or the stream
    /// cannot be built.
    pub fn start(&self) -> AudioResult<()> {
        let mut worker = self.worker.lock().unwrap();
        if worker.is_some() {
            warn!("Playback already started");
            return Ok(());
        }

        info!("Starting playback pipeline");
        self.shared.shutdown.store(false, Ordering::Release);

        let shared = Arc::clone(&self.shared);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), AudioError>>();

        let handle = std::thread::spawn(move || {
            run_scheduler(shared, ready_tx);
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                *worker = Some(handle);
                info!("Playback pipeline started");
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(AudioError::StreamBuildFailed(
                    "playback thread exited before signalling readiness".to_string(),
                ))
            }
        }
    }

    /// Append a PCM16 chunk to the queue
    ///
    /// Zero-length chunks are ignored. If the pipeline is started and idle,
    /// draining resumes immediately.
    ///
    /// # Errors
    /// Returns `AudioError::DecodeFailed` for a malformed (odd-length)
    /// chunk; the queue is left untouched and keeps draining.
    pub fn enqueue(&self, pcm: &[u8]) -> AudioResult<()> {
        if pcm.is_empty() {
            return Ok(());
        }

        let samples = decode_pcm16(pcm)?;

        let mut queue = self.shared.queue.lock().unwrap();
        queue.push(samples);
        self.shared.wake.notify_one();

        Ok(())
    }

    /// Empty the queue and halt scheduling immediately
    ///
    /// Audio already handed to the output device keeps playing out; that
    /// residual tail is bounded by the staging lead.
    pub fn clear(&self) {
        let mut queue = self.shared.queue.lock().unwrap();
        queue.clear();
        self.shared.epoch.fetch_add(1, Ordering::AcqRel);
        self.shared.flush.store(true, Ordering::Release);
        self.shared.wake.notify_one();
        debug!("Playback queue cleared");
    }

    /// Whether chunks are queued or one is currently scheduled
    pub fn is_playing(&self) -> bool {
        self.shared
            .queue
            .lock()
            .unwrap()
            .is_active(Instant::now())
    }

    /// Number of chunks waiting in the queue
    pub fn pending_chunks(&self) -> usize {
        self.shared.queue.lock().unwrap().len()
    }

    /// Stop draining and release the output device
    pub fn stop(&self) {
        let handle = self.worker.lock().unwrap().take();
        if let Some(handle) = handle {
            info!("Stopping playback pipeline");
            self.shared.shutdown.store(true, Ordering::Release);
            self.shared.wake.notify_one();
            let _ = handle.join();
            info!("Playback pipeline stopped");
        }
    }
}

impl Default for PlaybackPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PlaybackPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Scheduler loop run on the thread that owns the output stream
fn run_scheduler(
    shared: Arc<PlaybackShared>,
    ready_tx: std::sync::mpsc::Sender<Result<(), AudioError>>,
) {
    let host = cpal::default_host();
    let device = match default_output_device(&host) {
        Ok(d) => d,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    let config = StreamConfig {
        channels: 1,
        sample_rate: SampleRate(SAMPLE_RATE),
        buffer_size: cpal::BufferSize::Default,
    };

    let rb = HeapRb::<f32>::new(RING_CAPACITY);
    let (mut producer, mut consumer) = rb.split();

    let callback_shared = Arc::clone(&shared);
    let stream = match device.build_output_stream(
        &config,
        move |output: &mut [f32], _: &cpal::OutputCallbackInfo| {
            if callback_shared.flush.swap(false, Ordering::AcqRel) {
                consumer.clear();
            }
            let read = consumer.pop_slice(output);
            output[read..].fill(0.0);
        },
        |err| error!("Playback stream error: {}", err),
        None,
    ) {
        Ok(s) => s,
        Err(e) => {
            let _ = ready_tx.send(Err(AudioError::StreamBuildFailed(e.to_string())));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(AudioError::StreamError(e.to_string())));
        return;
    }

    let _ = ready_tx.send(Ok(()));
    info!("Playback scheduler running");

    while !shared.shutdown.load(Ordering::Acquire) {
        let epoch = shared.epoch.load(Ordering::Acquire);
        let next = {
            let mut queue = shared.queue.lock().unwrap();
            queue.pop_scheduled(Instant::now())
        };

        match next {
            Some((chunk, start)) => {
                // Stage the chunk just ahead of its scheduled start so a
                // clear() can still cancel most of it
                let now = Instant::now();
                if start > now + SCHEDULE_LEAD {
                    std::thread::sleep(start - now - SCHEDULE_LEAD);
                }

                let mut offset = 0;
                while offset < chunk.len() {
                    if shared.shutdown.load(Ordering::Acquire)
                        || shared.epoch.load(Ordering::Acquire) != epoch
                    {
                        break;
                    }
                    offset += producer.push_slice(&chunk[offset..]);
                    if offset < chunk.len() {
                        std::thread::sleep(Duration::from_millis(5));
                    }
                }
            }
            None => {
                let queue = shared.queue.lock().unwrap();
                let _unused = shared
                    .wake
                    .wait_timeout(queue, Duration::from_millis(10))
                    .unwrap();
            }
        }
    }

    debug!("Playback scheduler exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(samples: usize) -> Vec<f32> {
        vec![0.1; samples]
    }

    #[test]
    fn test_decode_pcm16() {
        let samples = decode_pcm16(&[0x00, 0x40, 0x00, 0xC0]).unwrap();
        assert_eq!(samples.len(), 2);
        assert!((samples[0] - 0.5).abs() < 0.001);
        assert!((samples[1] + 0.5).abs() < 0.001);
    }

    #[test]
    fn test_decode_pcm16_odd_length() {
        assert!(matches!(
            decode_pcm16(&[0x00, 0x01, 0x02]),
            Err(AudioError::DecodeFailed(_))
        ));
    }

    #[test]
    fn test_queue_fifo_scheduling() {
        let mut queue = PlaybackQueue::new(24000);
        let now = Instant::now();

        // Three 100ms chunks
        queue.push(chunk(2400));
        queue.push(chunk(2400));
        queue.push(chunk(2400));

        let (_, start1) = queue.pop_scheduled(now).unwrap();
        let (_, start2) = queue.pop_scheduled(now).unwrap();
        let (_, start3) = queue.pop_scheduled(now).unwrap();

        // Back-to-back, neither overlapping nor gapped
        assert_eq!(start1, now);
        assert_eq!(start2, now + Duration::from_millis(100));
        assert_eq!(start3, now + Duration::from_millis(200));
    }

    #[test]
    fn test_queue_catches_up_after_idle() {
        let mut queue = PlaybackQueue::new(24000);
        let now = Instant::now();

        queue.push(chunk(2400));
        let _ = queue.pop_scheduled(now).unwrap();

        // A chunk arriving long after the previous one finished starts
        // immediately instead of at the stale cursor
        let later = now + Duration::from_secs(5);
        queue.push(chunk(2400));
        let (_, start) = queue.pop_scheduled(later).unwrap();
        assert_eq!(start, later);
    }

    #[test]
    fn test_queue_zero_length_chunk_ignored() {
        let mut queue = PlaybackQueue::new(24000);
        queue.push(Vec::new());

        assert!(queue.is_empty());
        assert!(queue.pop_scheduled(Instant::now()).is_none());
    }

    #[test]
    fn test_queue_clear_resets_cursor() {
        let mut queue = PlaybackQueue::new(24000);
        let now = Instant::now();

        queue.push(chunk(2400));
        let _ = queue.pop_scheduled(now).unwrap();
        queue.push(chunk(2400));

        queue.clear();

        assert!(queue.is_empty());
        assert!(!queue.is_active(now));

        // Next chunk after a clear starts fresh
        queue.push(chunk(2400));
        let (_, start) = queue.pop_scheduled(now).unwrap();
        assert_eq!(start, now);
    }

    #[test]
    fn test_queue_is_active_while_chunk_plays() {
        let mut queue = PlaybackQueue::new(24000);
        let now = Instant::now();

        queue.push(chunk(2400)); // 100ms
        assert!(queue.is_active(now));

        let _ = queue.pop_scheduled(now).unwrap();
        assert!(queue.is_active(now + Duration::from_millis(50)));
        assert!(!queue.is_active(now + Duration::from_millis(150)));
    }

    #[test]
    fn test_pipeline_enqueue_and_clear_without_device() {
        let playback = PlaybackPipeline::new();

        // Three queued buffers
        playback.enqueue(&[0u8; 1920]).unwrap();
        playback.enqueue(&[0u8; 1920]).unwrap();
        playback.enqueue(&[0u8; 1920]).unwrap();

        assert_eq!(playback.pending_chunks(), 3);
        assert!(playback.is_playing());

        playback.clear();

        assert_eq!(playback.pending_chunks(), 0);
        assert!(!playback.is_playing());
    }

    #[test]
    fn test_pipeline_zero_length_chunk() {
        let playback = PlaybackPipeline::new();

        playback.enqueue(&[]).unwrap();
        assert_eq!(playback.pending_chunks(), 0);
    }

    #[test]
    fn test_pipeline_malformed_chunk_is_skipped() {
        let playback = PlaybackPipeline::new();

        playback.enqueue(&[0u8; 1920]).unwrap();
        let result = playback.enqueue(&[0u8; 3]);

        assert!(result.is_err());
        // The malformed chunk did not disturb the queue
        assert_eq!(playback.pending_chunks(), 1);
    }

    #[test]
    fn test_pipeline_start_stop() {
        let playback = PlaybackPipeline::new();

        match playback.start() {
            Ok(()) => {
                playback.enqueue(&[0u8; 480]).unwrap();
                std::thread::sleep(Duration::from_millis(50));
                playback.stop();
            }
            Err(e) => {
                eprintln!("Warning: no output device available: {}", e);
            }
        }
    }
}
