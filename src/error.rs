use std::io;

/// everything that can go wrong between the caller and the kernel
///
/// os errors pass through verbatim; the rest are protocol or contract
/// conditions of our own
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("device did not return enough data to fit an event")]
    NotEnoughData,
    #[error("no connected output with a usable mode and encoder")]
    NoMatchingOutput,
    #[error("adapter does not support dumb buffers")]
    DumbBuffersUnsupported,
    #[error("rect ({x0},{y0})..({x1},{y1}) exceeds the {width}x{height} framebuffer")]
    RectOutOfBounds {
        x0: u32,
        y0: u32,
        x1: u32,
        y1: u32,
        width: u32,
        height: u32,
    },
}
