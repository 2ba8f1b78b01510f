//! resource discovery and dumb buffer operations
//!
//! variable-length queries use the kernel's two-phase protocol: call once
//! with zeroed pointer fields to learn the counts, allocate, point the
//! request at the allocations, call again. the two calls are not atomic
//! against a hot-plug in between; a count that grew leaves the late
//! entries unread, a count that shrank is truncated to what the kernel
//! filled. no retry, the window is accepted

use bitflags::bitflags;

use crate::card::Device;
use crate::error::Error;
use crate::uapi;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFlipFlags: u32 {
        /// queue a completion event on the device fd when the flip lands
        const EVENT = uapi::PAGE_FLIP_EVENT;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Unknown,
}

impl ConnectionState {
    fn from_raw(v: u32) -> ConnectionState {
        match v {
            uapi::CONNECTED => ConnectionState::Connected,
            uapi::DISCONNECTED => ConnectionState::Disconnected,
            _ => ConnectionState::Unknown,
        }
    }
}

/// one display timing as reported by the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode {
    pub(crate) raw: uapi::ModeInfo,
}

impl Mode {
    pub fn name(&self) -> &str {
        self.raw.name()
    }

    pub fn hdisplay(&self) -> u16 {
        self.raw.hdisplay
    }

    pub fn vdisplay(&self) -> u16 {
        self.raw.vdisplay
    }

    pub fn vrefresh(&self) -> u32 {
        self.raw.vrefresh
    }

    pub fn clock(&self) -> u32 {
        self.raw.clock
    }

    /// the full timing record
    pub fn info(&self) -> &uapi::ModeInfo {
        &self.raw
    }
}

/// the adapter's global id lists, produced fresh by each discovery call
#[derive(Debug, Clone)]
pub struct Resources {
    raw: uapi::CardRes,
    pub fbs: Vec<u32>,
    pub crtcs: Vec<u32>,
    pub connectors: Vec<u32>,
    pub encoders: Vec<u32>,
}

impl Resources {
    pub fn min_resolution(&self) -> (u32, u32) {
        (self.raw.min_width, self.raw.min_height)
    }

    pub fn max_resolution(&self) -> (u32, u32) {
        (self.raw.max_width, self.raw.max_height)
    }
}

/// a physical output: the raw query snapshot plus the arrays fetched in
/// phase two
#[derive(Debug, Clone)]
pub struct Connector {
    raw: uapi::GetConnector,
    pub modes: Vec<Mode>,
    /// (property id, property value) pairs
    pub props: Vec<(u32, u64)>,
    /// ids of every encoder that can drive this connector
    pub encoders: Vec<u32>,
}

impl Connector {
    pub fn id(&self) -> u32 {
        self.raw.connector_id
    }

    pub fn connector_type(&self) -> u32 {
        self.raw.connector_type
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_raw(self.raw.connection)
    }

    /// currently attached encoder id, zero when none
    pub fn encoder_id(&self) -> u32 {
        self.raw.encoder_id
    }

    /// physical size in millimeters
    pub fn size_mm(&self) -> (u32, u32) {
        (self.raw.mm_width, self.raw.mm_height)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Encoder {
    pub id: u32,
    pub kind: u32,
    /// currently attached crtc id, zero when none
    pub crtc_id: u32,
    pub possible_crtcs: u32,
    pub possible_clones: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct Crtc {
    pub id: u32,
    /// bound framebuffer id, zero when disconnected
    pub fb_id: u32,
    pub x: u32,
    pub y: u32,
    pub gamma_size: u32,
    pub mode: Option<Mode>,
}

/// a linear cpu-writable pixel buffer in device memory
///
/// `pitch` and `size` are kernel-computed and must be used verbatim for
/// addressing
#[derive(Debug, Clone, Copy)]
pub struct DumbBuffer {
    pub handle: u32,
    pub width: u32,
    pub height: u32,
    pub bpp: u32,
    pub pitch: u32,
    pub size: u64,
}

/// address of a caller-allocated array for the kernel to fill, zero when
/// empty; the allocation must stay alive across the ioctl
fn slice_addr<T>(s: &mut [T]) -> u64 {
    if s.is_empty() {
        0
    } else {
        s.as_mut_ptr() as usize as u64
    }
}

/// mode-setting operations over any [`Device`]
pub trait ControlDevice: Device {
    /// discover the adapter's global resource lists
    fn get_resources(&self) -> Result<Resources, Error> {
        let mut buf = uapi::CardRes::default().encode();
        self.ioctl(uapi::GET_RESOURCES, &mut buf)?;
        let mut raw = uapi::CardRes::decode(&buf);

        let mut fbs = vec![0u32; raw.count_fbs as usize];
        let mut crtcs = vec![0u32; raw.count_crtcs as usize];
        let mut connectors = vec![0u32; raw.count_connectors as usize];
        let mut encoders = vec![0u32; raw.count_encoders as usize];
        raw.fb_id_ptr = slice_addr(&mut fbs);
        raw.crtc_id_ptr = slice_addr(&mut crtcs);
        raw.connector_id_ptr = slice_addr(&mut connectors);
        raw.encoder_id_ptr = slice_addr(&mut encoders);

        let mut buf = raw.encode();
        self.ioctl(uapi::GET_RESOURCES, &mut buf)?;
        let raw = uapi::CardRes::decode(&buf);

        fbs.truncate(raw.count_fbs as usize);
        crtcs.truncate(raw.count_crtcs as usize);
        connectors.truncate(raw.count_connectors as usize);
        encoders.truncate(raw.count_encoders as usize);

        Ok(Resources { raw, fbs, crtcs, connectors, encoders })
    }

    /// fetch one connector's detail record
    fn get_connector(&self, id: u32) -> Result<Connector, Error> {
        let probe = uapi::GetConnector {
            connector_id: id,
            ..Default::default()
        };
        let mut buf = probe.encode();
        self.ioctl(uapi::GET_CONNECTOR, &mut buf)?;
        let mut raw = uapi::GetConnector::decode(&buf);

        let mut props = vec![0u32; raw.count_props as usize];
        let mut prop_values = vec![0u64; raw.count_props as usize];
        let mut encoders = vec![0u32; raw.count_encoders as usize];
        // a probed-but-unready display may report zero modes; asking for
        // one slot anyway makes the kernel hand back its best guess
        if raw.count_modes == 0 {
            raw.count_modes = 1;
        }
        let mut mode_buf = vec![0u8; raw.count_modes as usize * uapi::ModeInfo::SIZE];
        raw.props_ptr = slice_addr(&mut props);
        raw.prop_values_ptr = slice_addr(&mut prop_values);
        raw.encoders_ptr = slice_addr(&mut encoders);
        raw.modes_ptr = slice_addr(&mut mode_buf);

        let mut buf = raw.encode();
        self.ioctl(uapi::GET_CONNECTOR, &mut buf)?;
        let raw = uapi::GetConnector::decode(&buf);

        let modes = mode_buf
            .chunks_exact(uapi::ModeInfo::SIZE)
            .take(raw.count_modes as usize)
            .map(|chunk| Mode { raw: uapi::ModeInfo::decode(chunk) })
            .collect();
        props.truncate(raw.count_props as usize);
        prop_values.truncate(raw.count_props as usize);
        encoders.truncate(raw.count_encoders as usize);

        Ok(Connector {
            raw,
            modes,
            props: props.into_iter().zip(prop_values).collect(),
            encoders,
        })
    }

    /// fetch one encoder record; fixed size, single-shot
    fn get_encoder(&self, id: u32) -> Result<Encoder, Error> {
        let req = uapi::GetEncoder {
            encoder_id: id,
            ..Default::default()
        };
        let mut buf = req.encode();
        self.ioctl(uapi::GET_ENCODER, &mut buf)?;
        let raw = uapi::GetEncoder::decode(&buf);
        Ok(Encoder {
            id: raw.encoder_id,
            kind: raw.encoder_type,
            crtc_id: raw.crtc_id,
            possible_crtcs: raw.possible_crtcs,
            possible_clones: raw.possible_clones,
        })
    }

    /// fetch one crtc's current state
    fn get_crtc(&self, id: u32) -> Result<Crtc, Error> {
        let req = uapi::CrtcReq {
            crtc_id: id,
            ..Default::default()
        };
        let mut buf = req.encode();
        self.ioctl(uapi::GET_CRTC, &mut buf)?;
        let raw = uapi::CrtcReq::decode(&buf);
        Ok(Crtc {
            id: raw.crtc_id,
            fb_id: raw.fb_id,
            x: raw.x,
            y: raw.y,
            gamma_size: raw.gamma_size,
            mode: (raw.mode_valid != 0).then(|| Mode { raw: raw.mode }),
        })
    }

    /// program a crtc: bind `fb_id` at (`x`,`y`) and drive `connectors`
    /// with `mode`
    ///
    /// this is the full mode-set; routine buffer swaps go through
    /// [`page_flip`](ControlDevice::page_flip) instead
    fn set_crtc(
        &self,
        crtc_id: u32,
        fb_id: u32,
        x: u32,
        y: u32,
        connectors: &[u32],
        mode: Option<&Mode>,
    ) -> Result<(), Error> {
        let mut connectors = connectors.to_vec();
        let mut raw = uapi::CrtcReq {
            crtc_id,
            fb_id,
            x,
            y,
            ..Default::default()
        };
        raw.set_connectors_ptr = slice_addr(&mut connectors);
        raw.count_connectors = connectors.len() as u32;
        if let Some(mode) = mode {
            raw.mode = mode.raw;
            raw.mode_valid = 1;
        }
        let mut buf = raw.encode();
        self.ioctl(uapi::SET_CRTC, &mut buf)?;
        Ok(())
    }

    /// allocate a dumb buffer sized for `width`x`height` at `bpp`
    fn create_dumb(&self, width: u32, height: u32, bpp: u32) -> Result<DumbBuffer, Error> {
        let req = uapi::CreateDumb {
            width,
            height,
            bpp,
            ..Default::default()
        };
        let mut buf = req.encode();
        self.ioctl(uapi::CREATE_DUMB, &mut buf)?;
        let raw = uapi::CreateDumb::decode(&buf);
        Ok(DumbBuffer {
            handle: raw.handle,
            width,
            height,
            bpp,
            pitch: raw.pitch,
            size: raw.size,
        })
    }

    /// request the mmap offset for a dumb buffer handle
    fn map_dumb(&self, handle: u32) -> Result<u64, Error> {
        let req = uapi::MapDumb {
            handle,
            ..Default::default()
        };
        let mut buf = req.encode();
        self.ioctl(uapi::MAP_DUMB, &mut buf)?;
        Ok(uapi::MapDumb::decode(&buf).offset)
    }

    /// free a dumb buffer handle
    fn destroy_dumb(&self, handle: u32) -> Result<(), Error> {
        let mut buf = uapi::DestroyDumb { handle }.encode();
        self.ioctl(uapi::DESTROY_DUMB, &mut buf)?;
        Ok(())
    }

    /// register a dumb buffer as a displayable framebuffer object
    fn add_fb(
        &self,
        width: u32,
        height: u32,
        depth: u32,
        bpp: u32,
        pitch: u32,
        handle: u32,
    ) -> Result<u32, Error> {
        let req = uapi::FbCmd {
            width,
            height,
            depth,
            bpp,
            pitch,
            handle,
            ..Default::default()
        };
        let mut buf = req.encode();
        self.ioctl(uapi::ADD_FB, &mut buf)?;
        Ok(uapi::FbCmd::decode(&buf).fb_id)
    }

    /// deregister a framebuffer object
    fn rm_fb(&self, fb_id: u32) -> Result<(), Error> {
        let mut buf = fb_id.to_le_bytes();
        self.ioctl(uapi::RM_FB, &mut buf)?;
        Ok(())
    }

    /// ask the crtc to start displaying `fb_id`; completion is signaled
    /// asynchronously on the event stream when [`PageFlipFlags::EVENT`] is
    /// set
    fn page_flip(&self, crtc_id: u32, fb_id: u32, flags: PageFlipFlags) -> Result<(), Error> {
        let req = uapi::PageFlip {
            crtc_id,
            fb_id,
            flags: flags.bits(),
            ..Default::default()
        };
        let mut buf = req.encode();
        self.ioctl(uapi::PAGE_FLIP, &mut buf)?;
        Ok(())
    }
}
