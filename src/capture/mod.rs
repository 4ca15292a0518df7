pub mod ring;
pub mod scheduler;

pub use ring::{frame_ring, RingWatch, RingReader, RingWriter};
pub use scheduler::{CaptureScheduler, CycleSignal};
