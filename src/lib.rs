//! take exclusive control of a display adapter through the kernel
//! mode-setting interface and draw raw pixels into the physical display,
//! double buffered, with no userspace graphics library in between
//!
//! [`Surface`] is the drawing entrypoint
//!
//! the layers underneath, bottom up:
//!
//! - [`ioctl`], encoding and invocation of device control commands
//! - [`uapi`], bit-exact payload codecs for the mode-setting ABI
//! - [`card`], the adapter device node and the [`Device`] seam
//! - [`control`], resource discovery and dumb buffer operations
//! - [`mmap`], mapping dumb buffers into process memory
//! - [`event`], the adapter's completion event stream
//! - [`modeset`], output selection and the page-flip protocol
//! - [`surface`], the double-buffered surface on top of it all
//!
//! everything is synchronous and single-owner: one process owns the card,
//! one thread drives the surface, and `swap` blocks on the flip event

// the payload codecs and the event stream are little-endian, as is every
// linux port with a dri subsystem this can run on
#[cfg(target_endian = "big")]
compile_error!("scanout only supports little-endian targets");

pub mod card;
pub mod config;
pub mod control;
pub mod error;
pub mod event;
pub mod ioctl;
pub mod mmap;
pub mod modeset;
pub mod surface;
pub mod uapi;

pub use card::{Card, Device};
pub use control::ControlDevice;
pub use error::Error;
pub use modeset::{Framebuffer, Modeset};
pub use surface::Surface;
