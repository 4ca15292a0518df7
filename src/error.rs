use thiserror::Error;

/// Rejected render configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("canvas dimensions {width}x{height} must be between 1 and {max}", max = u16::MAX)]
    Dimensions { width: u32, height: u32 },
    #[error("fps must be at least 1")]
    ZeroFps,
    #[error("capture window must be at least 1 second")]
    ZeroWindow,
    #[error("{fps} fps for {seconds}s exceeds {max} frames per animation", max = crate::config::MAX_FRAMES_PER_CYCLE)]
    CycleTooLong { fps: u32, seconds: u32 },
    #[error("encode pool needs at least one thread")]
    ZeroEncodeThreads,
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Failures surfaced by [`crate::host::RenderHost`] lifecycle calls.
#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to allocate {slots} frame slots of {bytes} bytes")]
    Allocation { slots: usize, bytes: usize },
    #[error("failed to build encode pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot {action} a host in state {state:?}")]
    Lifecycle {
        action: &'static str,
        state: crate::host::HostState,
    },
}

/// Reasons a cycle produced no animation blob.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("no frames to encode")]
    Empty,
    #[error("frame {index} is {actual} bytes, expected {expected}")]
    FrameSize {
        index: usize,
        actual: usize,
        expected: usize,
    },
    #[error("canvas {width}x{height} exceeds the GIF limit")]
    TooLarge { width: u32, height: u32 },
    #[error("gif encoder: {0}")]
    Codec(#[from] gif::EncodingError),
}

/// Externally supplied pixels that could not be used as-is.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("image has zero width or height")]
    Empty,
    #[error("image buffer is {actual} bytes, expected {expected} for RGBA")]
    Length { actual: usize, expected: usize },
}
