use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::SystemTime;

use crossbeam_channel::Receiver;
use instant::Instant;
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::capture::{CycleSignal, RingReader};
use crate::config::RenderConfig;
use crate::error::{EncodeError, HostError};
use crate::render::canvas::Canvas;

/// NeuQuant sampling factor handed to the gif crate (1 = best, 30 = fastest).
const QUANTIZE_SPEED: i32 = 10;

/// One finished animation.
#[derive(Debug, Clone)]
pub struct EncodedOutput {
    pub blob: Vec<u8>,
    pub produced_at: SystemTime,
    pub frames: usize,
    /// Cycle whose signal triggered this encode.
    pub cycle: u64,
}

/// Capacity-1 mailbox with overwrite semantics. A newer value replaces one
/// that was never taken.
#[derive(Clone, Default)]
pub struct LatestSlot {
    inner: Arc<Mutex<Option<EncodedOutput>>>,
}

impl LatestSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `output`. Returns true if it displaced an untaken one.
    pub fn publish(&self, output: EncodedOutput) -> bool {
        self.inner.lock().replace(output).is_some()
    }

    pub fn take(&self) -> Option<EncodedOutput> {
        self.inner.lock().take()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_none()
    }
}

// ---------------------------------------------------------------------------
// GIF encoder
// ---------------------------------------------------------------------------

/// Quantizes frames on a bounded rayon pool and serializes a looping GIF.
pub struct GifEncoder {
    pool: rayon::ThreadPool,
    width: u32,
    height: u32,
    delay_cs: u16,
    final_hold_cs: Option<u16>,
}

impl GifEncoder {
    pub fn new(config: &RenderConfig) -> Result<Self, HostError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.encode_threads)
            .thread_name(|i| format!("terrarium-quantize-{i}"))
            .build()?;
        Ok(Self {
            pool,
            width: config.width,
            height: config.height,
            delay_cs: config.frame_delay_cs(),
            final_hold_cs: config
                .final_frame_hold_ms
                .map(|ms| (ms / 10).clamp(1, u16::MAX as u32) as u16),
        })
    }

    /// Encode `frames` in order. Each frame is quantized independently.
    pub fn encode(&self, frames: &[Canvas]) -> Result<Vec<u8>, EncodeError> {
        if frames.is_empty() {
            return Err(EncodeError::Empty);
        }
        let (w, h) = match (u16::try_from(self.width), u16::try_from(self.height)) {
            (Ok(w), Ok(h)) => (w, h),
            _ => {
                return Err(EncodeError::TooLarge {
                    width: self.width,
                    height: self.height,
                })
            }
        };
        let expected = w as usize * h as usize * 3;
        for (index, frame) in frames.iter().enumerate() {
            let actual = frame.as_bytes().len();
            if actual != expected {
                return Err(EncodeError::FrameSize {
                    index,
                    actual,
                    expected,
                });
            }
        }

        // Indexed par_iter collects back in input order
        let delay = self.delay_cs;
        let mut quantized: Vec<gif::Frame<'static>> = self.pool.install(|| {
            frames
                .par_iter()
                .map(|frame| {
                    let mut out = gif::Frame::from_rgb_speed(w, h, frame.as_bytes(), QUANTIZE_SPEED);
                    out.delay = delay;
                    out
                })
                .collect()
        });
        if let (Some(hold), Some(last)) = (self.final_hold_cs, quantized.last_mut()) {
            last.delay = hold;
        }

        let mut encoder = gif::Encoder::new(Vec::new(), w, h, &[])?;
        encoder.set_repeat(gif::Repeat::Infinite)?;
        for frame in &quantized {
            encoder.write_frame(frame)?;
        }
        let blob = encoder.into_inner().map_err(gif::EncodingError::from)?;
        Ok(blob)
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Waits for cycle signals, snapshots the ring, encodes and publishes.
/// Exits once every signal sender is gone.
pub struct EncoderWorker {
    reader: RingReader,
    encoder: GifEncoder,
    signals: Receiver<CycleSignal>,
    ready: LatestSlot,
    fault: Arc<AtomicBool>,
    scratch: Vec<Canvas>,
}

impl EncoderWorker {
    pub fn new(
        reader: RingReader,
        encoder: GifEncoder,
        signals: Receiver<CycleSignal>,
        ready: LatestSlot,
        fault: Arc<AtomicBool>,
    ) -> Self {
        Self {
            reader,
            encoder,
            signals,
            ready,
            fault,
            scratch: Vec::new(),
        }
    }

    pub fn spawn(self) -> Result<JoinHandle<()>, HostError> {
        thread::Builder::new()
            .name("terrarium-encoder".into())
            .spawn(move || self.run())
            .map_err(|source| HostError::Spawn {
                name: "encoder",
                source,
            })
    }

    pub fn run(mut self) {
        log::info!(
            "encoder worker started ({} frames per cycle)",
            self.reader.capacity()
        );
        while let Ok(signal) = self.signals.recv() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.process(signal)));
            match outcome {
                Ok(Ok(output)) => {
                    if self.ready.publish(output) {
                        log::debug!("unclaimed animation replaced by cycle {}", signal.cycle);
                    }
                }
                Ok(Err(e)) => log::warn!("cycle {} not encoded: {e}", signal.cycle),
                Err(payload) => {
                    log::error!(
                        "encoder panicked on cycle {}: {}",
                        signal.cycle,
                        panic_message(&*payload)
                    );
                    self.fault.store(true, Ordering::Release);
                    break;
                }
            }
        }
        log::info!("encoder worker stopped");
    }

    /// Encode the ring as it stands now.
    pub fn process(&mut self, signal: CycleSignal) -> Result<EncodedOutput, EncodeError> {
        let started = Instant::now();
        let cursor = self.reader.snapshot_into(&mut self.scratch);
        if cursor > signal.cursor {
            log::debug!(
                "cycle {} snapshot overlaps {} newer frames",
                signal.cycle,
                cursor - signal.cursor
            );
        }
        let blob = self.encoder.encode(&self.scratch)?;
        log::debug!(
            "cycle {} encoded: {} frames, {} bytes in {:.1}ms",
            signal.cycle,
            self.scratch.len(),
            blob.len(),
            started.elapsed().as_secs_f64() * 1000.0
        );
        Ok(EncodedOutput {
            blob,
            produced_at: SystemTime::now(),
            frames: self.scratch.len(),
            cycle: signal.cycle,
        })
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}
