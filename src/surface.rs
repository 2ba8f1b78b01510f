//! the double-buffered surface
//!
//! two framebuffers, one on screen, one taking draws; `swap` flips them
//! and only returns once the kernel has completed the flip, so the new
//! back buffer is immediately safe to draw into

use crate::card::Card;
use crate::control::ControlDevice;
use crate::error::Error;
use crate::modeset::{Framebuffer, Modeset};

/// a modeset plus exactly two framebuffers and the index of the one
/// currently on screen
///
/// single-owner like everything below it: concurrent callers must
/// serialize on their side
pub struct Surface<D = Card> {
    modeset: Modeset<D>,
    fbs: [Framebuffer; 2],
    front: usize,
}

impl Surface<Card> {
    /// take over `/dev/dri/card<minor>` and build the buffer pair
    pub fn open(minor: u32) -> Result<Surface<Card>, Error> {
        Surface::new(Modeset::open(minor)?)
    }
}

impl<D: ControlDevice> Surface<D> {
    pub fn new(modeset: Modeset<D>) -> Result<Surface<D>, Error> {
        let fbs = modeset.create_framebuffers()?;
        Ok(Surface { modeset, fbs, front: 1 })
    }

    pub fn width(&self) -> u32 {
        self.fbs[0].width
    }

    pub fn height(&self) -> u32 {
        self.fbs[0].height
    }

    pub fn modeset(&self) -> &Modeset<D> {
        &self.modeset
    }

    /// the framebuffer not currently displayed; all drawing targets it
    pub fn back_buffer(&self) -> &Framebuffer {
        &self.fbs[self.front ^ 1]
    }

    pub fn back_buffer_mut(&mut self) -> &mut Framebuffer {
        &mut self.fbs[self.front ^ 1]
    }

    /// copy raw pixel bytes into the back buffer
    ///
    /// copies `min(src, dst)` bytes; supply exactly the buffer's byte
    /// length to avoid a partial frame
    pub fn write_pixels(&mut self, bytes: &[u8]) {
        let dst = self.back_buffer_mut().bytes_mut();
        let n = bytes.len().min(dst.len());
        dst[..n].copy_from_slice(&bytes[..n]);
    }

    /// zero the back buffer
    pub fn clear(&mut self) {
        self.back_buffer_mut().bytes_mut().fill(0);
    }

    /// write a packed 32-bit rgb value at every pixel of
    /// `(x0,y0)..(x1,y1)` in the back buffer, addressing by
    /// `pitch * y + 4 * x`
    ///
    /// the rectangle must lie inside the buffer; anything else is
    /// [`Error::RectOutOfBounds`], nothing is written
    pub fn fill_rect(&mut self, x0: u32, y0: u32, x1: u32, y1: u32, rgb: u32) -> Result<(), Error> {
        let fb = self.back_buffer_mut();
        if x0 > x1 || y0 > y1 || x1 > fb.width || y1 > fb.height {
            return Err(Error::RectOutOfBounds {
                x0,
                y0,
                x1,
                y1,
                width: fb.width,
                height: fb.height,
            });
        }
        let pitch = fb.pitch as usize;
        let bytes = fb.bytes_mut();
        for y in y0..y1 {
            for x in x0..x1 {
                let offset = pitch * y as usize + 4 * x as usize;
                bytes[offset..offset + 4].copy_from_slice(&rgb.to_le_bytes());
            }
        }
        Ok(())
    }

    /// flip the display to the back buffer and wait for completion, then
    /// toggle front and back
    ///
    /// when this returns the old front buffer is the new back buffer and
    /// is safe to draw into right away
    pub fn swap(&mut self) -> Result<(), Error> {
        self.modeset.page_flip_and_wait(self.fbs[self.front ^ 1].id)?;
        self.front ^= 1;
        Ok(())
    }

    /// tear everything down: both framebuffers (unmap, deregister, free,
    /// per buffer, in that order), then the device
    pub fn close(self) -> Result<(), Error> {
        let Surface { modeset, fbs, .. } = self;
        let [first, second] = fbs;
        modeset.destroy_framebuffer(first)?;
        modeset.destroy_framebuffer(second)?;
        modeset.close()
    }
}
