use crossbeam_channel::{Sender, TrySendError};

use super::ring::{RingWatch, RingWriter};
use crate::render::canvas::Canvas;

/// Emitted after every N-th write: one full pass over the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSignal {
    /// 1-based cycle number.
    pub cycle: u64,
    /// Write cursor right after the completing write.
    pub cursor: u64,
}

/// Copies each composited frame into the ring and signals completed cycles.
/// Signalling never blocks: if the encoder still has a signal pending, the new
/// one is dropped and the encoder picks up the newer frames on its next pass.
pub struct CaptureScheduler {
    writer: RingWriter,
    signals: Sender<CycleSignal>,
    cycles: u64,
    dropped: u64,
    disconnected: bool,
}

impl CaptureScheduler {
    pub fn new(writer: RingWriter, signals: Sender<CycleSignal>) -> Self {
        Self {
            writer,
            signals,
            cycles: 0,
            dropped: 0,
            disconnected: false,
        }
    }

    /// Store `frame`; returns the signal if this write completed a cycle.
    pub fn capture(&mut self, frame: &Canvas) -> Option<CycleSignal> {
        let cursor = self.writer.write(frame);
        if cursor % self.writer.capacity() as u64 != 0 {
            return None;
        }

        self.cycles += 1;
        let signal = CycleSignal {
            cycle: self.cycles,
            cursor,
        };
        match self.signals.try_send(signal) {
            Ok(()) => log::debug!("cycle {} complete at frame {cursor}", self.cycles),
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                log::debug!("encoder busy, cycle {} signal dropped", self.cycles);
            }
            Err(TrySendError::Disconnected(_)) => {
                if !self.disconnected {
                    log::warn!("encoder is gone; captured cycles will not be encoded");
                    self.disconnected = true;
                }
            }
        }
        Some(signal)
    }

    /// Completed cycles, whether or not their signal was delivered.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn dropped_signals(&self) -> u64 {
        self.dropped
    }

    pub fn watch(&self) -> RingWatch {
        self.writer.watch()
    }
}
