//! Fixed-capacity frame ring shared by exactly one writer and one reader.
//!
//! The writer copies each frame into slot `cursor % N` and then bumps the
//! cursor. The reader snapshots the cursor and copies all N slots starting at
//! `cursor % N`, which is the oldest frame when the writer is idle.
//!
//! Reads are relaxed: if the writer keeps going while a snapshot is copied,
//! the tail of the snapshot may already hold frames from the next cycle. The
//! overlap is bounded by the number of frames written during the copy (at most
//! N - 1 before the snapshot's own start slot is reached). Each slot has its
//! own lock, so a frame is never observed half-written and the writer only
//! contends on the single slot the reader is copying at that instant.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::HostError;
use crate::render::canvas::Canvas;

struct Shared {
    slots: Box<[Mutex<Canvas>]>,
    /// Total frames ever written. Only the writer advances it.
    cursor: AtomicU64,
    width: u32,
    height: u32,
}

impl Shared {
    fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// Preallocate `capacity` frames of `width` x `height` and split into the two ends.
pub fn frame_ring(
    capacity: usize,
    width: u32,
    height: u32,
) -> Result<(RingWriter, RingReader), HostError> {
    let bytes = width as usize * height as usize * 3;
    let alloc_err = || HostError::Allocation {
        slots: capacity,
        bytes,
    };
    if capacity == 0 {
        return Err(alloc_err());
    }

    let mut slots = Vec::new();
    slots.try_reserve_exact(capacity).map_err(|_| alloc_err())?;
    for _ in 0..capacity {
        let frame = Canvas::try_new(width, height).ok_or_else(alloc_err)?;
        slots.push(Mutex::new(frame));
    }

    let shared = Arc::new(Shared {
        slots: slots.into_boxed_slice(),
        cursor: AtomicU64::new(0),
        width,
        height,
    });
    Ok((
        RingWriter {
            shared: Arc::clone(&shared),
        },
        RingReader { shared },
    ))
}

/// The single producing end. Not `Clone`.
pub struct RingWriter {
    shared: Arc<Shared>,
}

impl RingWriter {
    /// Copy `frame` into the next slot. Returns the cursor after the write.
    ///
    /// `frame` must match the ring's dimensions.
    pub fn write(&mut self, frame: &Canvas) -> u64 {
        debug_assert_eq!((frame.width(), frame.height()), (self.shared.width, self.shared.height));
        // Only this writer stores to the cursor, so a relaxed load is current.
        let cursor = self.shared.cursor.load(Ordering::Relaxed);
        let index = (cursor % self.shared.capacity() as u64) as usize;
        self.shared.slots[index].lock().copy_from(frame);
        let next = cursor + 1;
        self.shared.cursor.store(next, Ordering::Release);
        next
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    pub fn cursor(&self) -> u64 {
        self.shared.cursor.load(Ordering::Acquire)
    }

    pub fn watch(&self) -> RingWatch {
        RingWatch {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// The single consuming end. Not `Clone`.
pub struct RingReader {
    shared: Arc<Shared>,
}

impl RingReader {
    /// All N frames oldest first, rotated so slot `cursor % N` leads.
    pub fn snapshot(&self) -> Vec<Canvas> {
        let mut out = Vec::with_capacity(self.capacity());
        self.snapshot_into(&mut out);
        out
    }

    /// Like [`RingReader::snapshot`] but reuses `out`'s frame allocations.
    /// Returns the cursor the rotation was based on.
    pub fn snapshot_into(&self, out: &mut Vec<Canvas>) -> u64 {
        let n = self.capacity();
        let cursor = self.shared.cursor.load(Ordering::Acquire);
        let start = (cursor % n as u64) as usize;

        out.truncate(n);
        for i in 0..n {
            let slot = self.shared.slots[(start + i) % n].lock();
            match out.get_mut(i) {
                Some(dst) => dst.copy_from(&slot),
                None => out.push(slot.clone()),
            }
        }
        cursor
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    pub fn cursor(&self) -> u64 {
        self.shared.cursor.load(Ordering::Acquire)
    }
}

/// Read-only view of the write cursor, for monitoring.
#[derive(Clone)]
pub struct RingWatch {
    shared: Arc<Shared>,
}

impl RingWatch {
    pub fn cursor(&self) -> u64 {
        self.shared.cursor.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }
}
