//! output selection and the page-flip protocol

use crate::card::Card;
use crate::control::{ConnectionState, ControlDevice, Mode, PageFlipFlags};
use crate::error::Error;
use crate::event;
use crate::mmap::MappedRegion;
use crate::uapi;

const DEPTH: u32 = 24;
const BPP: u32 = 32;

/// a displayable framebuffer: a registered dumb buffer mapped into process
/// memory
///
/// teardown goes through [`Modeset::destroy_framebuffer`], which releases
/// the three kernel objects behind it in the only safe order
pub struct Framebuffer {
    pub id: u32,
    pub width: u32,
    pub height: u32,
    /// kernel-computed row stride in bytes
    pub pitch: u32,
    pub(crate) handle: u32,
    pub(crate) region: MappedRegion,
}

impl Framebuffer {
    pub fn bytes(&self) -> &[u8] {
        self.region.as_slice()
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        self.region.as_mut_slice()
    }
}

/// the bound output configuration: one connector, its crtc, one mode
pub struct Modeset<D = Card> {
    device: D,
    connector: u32,
    crtc: u32,
    mode: Mode,
}

impl Modeset<Card> {
    /// open `/dev/dri/card<minor>` and bind the first usable output
    pub fn open(minor: u32) -> Result<Modeset<Card>, Error> {
        Modeset::new(Card::open(minor)?)
    }
}

impl<D: ControlDevice> Modeset<D> {
    /// select an output: the first connector in the adapter's list that is
    /// connected, has at least one mode and has an attached encoder; its
    /// encoder resolves to the crtc, its first mode becomes the mode
    ///
    /// no ranking beyond catalog order. fails with
    /// [`Error::NoMatchingOutput`] when nothing passes the filter
    pub fn new(device: D) -> Result<Modeset<D>, Error> {
        if device.get_cap(uapi::CAP_DUMB_BUFFER)? == 0 {
            return Err(Error::DumbBuffersUnsupported);
        }

        let res = device.get_resources()?;
        for id in &res.connectors {
            let conn = device.get_connector(*id)?;
            if conn.state() != ConnectionState::Connected {
                tracing::debug!("ignoring unconnected connector {}", conn.id());
                continue;
            }
            if conn.modes.is_empty() {
                tracing::debug!("no valid mode for connector {}", conn.id());
                continue;
            }
            if conn.encoder_id() == 0 {
                tracing::debug!("no attached encoder for connector {}", conn.id());
                continue;
            }

            let encoder = device.get_encoder(conn.encoder_id())?;
            let mode = conn.modes[0];
            tracing::info!(
                connector = conn.id(),
                crtc = encoder.crtc_id,
                "selected output, mode {} {}x{}@{}",
                mode.name(),
                mode.hdisplay(),
                mode.vdisplay(),
                mode.vrefresh(),
            );
            return Ok(Modeset {
                device,
                connector: conn.id(),
                crtc: encoder.crtc_id,
                mode,
            });
        }

        Err(Error::NoMatchingOutput)
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn connector(&self) -> u32 {
        self.connector
    }

    pub fn crtc(&self) -> u32 {
        self.crtc
    }

    /// allocate, register and map one framebuffer at the mode's resolution
    ///
    /// on a partial failure the pieces that did succeed are not rolled
    /// back; the caller owns whatever was created
    pub fn create_framebuffer(&self) -> Result<Framebuffer, Error> {
        let width = u32::from(self.mode.hdisplay());
        let height = u32::from(self.mode.vdisplay());
        let dumb = self.device.create_dumb(width, height, BPP)?;
        let id = self.device.add_fb(width, height, DEPTH, BPP, dumb.pitch, dumb.handle)?;
        let offset = self.device.map_dumb(dumb.handle)?;
        let region = self.device.map_region(offset, dumb.size as usize)?;
        Ok(Framebuffer {
            id,
            width,
            height,
            pitch: dumb.pitch,
            handle: dumb.handle,
            region,
        })
    }

    /// create the front/back pair and program the crtc once with the first
    /// buffer at (0,0); every later update is a page flip, never another
    /// full mode-set
    pub fn create_framebuffers(&self) -> Result<[Framebuffer; 2], Error> {
        let fbs = [self.create_framebuffer()?, self.create_framebuffer()?];
        self.device
            .set_crtc(self.crtc, fbs[0].id, 0, 0, &[self.connector], Some(&self.mode))?;
        Ok(fbs)
    }

    /// release a framebuffer: unmap the region, deregister the fb id, then
    /// destroy the dumb handle, strictly in that order
    pub fn destroy_framebuffer(&self, fb: Framebuffer) -> Result<(), Error> {
        let Framebuffer { id, handle, region, .. } = fb;
        region.unmap()?;
        self.device.rm_fb(id)?;
        self.device.destroy_dumb(handle)?;
        Ok(())
    }

    /// flip the crtc to `fb_id` and block until the kernel signals
    /// completion
    ///
    /// exactly one event read; the decoded header is all the wait needs.
    /// no timeout: a kernel that never delivers the event blocks forever
    pub fn page_flip_and_wait(&self, fb_id: u32) -> Result<(), Error> {
        self.device.page_flip(self.crtc, fb_id, PageFlipFlags::EVENT)?;
        event::read_event(&self.device)?;
        Ok(())
    }

    /// close the device; every framebuffer must have been destroyed first
    pub fn close(self) -> Result<(), Error> {
        self.device.close()?;
        Ok(())
    }
}
