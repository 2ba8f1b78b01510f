//! bit-exact payload codecs for the kernel mode-setting ABI
//!
//! each request struct below mirrors one fixed-layout kernel record; the
//! `encode`/`decode` pair is the single source of truth for its field
//! offsets and widths (all little-endian). pointer fields hold userspace
//! addresses of caller-allocated arrays, written as 64-bit values the way
//! the kernel expects them on every supported target
//!
//! command values are encoded at compile time; each constant matches the
//! kernel's `DRM_IOWR(..)` definition bit for bit

use crate::ioctl::{Cmd, Dir};

/// magic byte of the display subsystem
pub const MAGIC: u8 = b'd';

const RW: Dir = Dir::READ.union(Dir::WRITE);

pub const GET_CAP: Cmd = Cmd::new(RW, GetCap::SIZE, MAGIC, 0x0c);
pub const GET_RESOURCES: Cmd = Cmd::new(RW, CardRes::SIZE, MAGIC, 0xa0);
pub const GET_CRTC: Cmd = Cmd::new(RW, CrtcReq::SIZE, MAGIC, 0xa1);
pub const SET_CRTC: Cmd = Cmd::new(RW, CrtcReq::SIZE, MAGIC, 0xa2);
pub const GET_ENCODER: Cmd = Cmd::new(RW, GetEncoder::SIZE, MAGIC, 0xa6);
pub const GET_CONNECTOR: Cmd = Cmd::new(RW, GetConnector::SIZE, MAGIC, 0xa7);
pub const ADD_FB: Cmd = Cmd::new(RW, FbCmd::SIZE, MAGIC, 0xae);
pub const RM_FB: Cmd = Cmd::new(RW, 4, MAGIC, 0xaf);
pub const PAGE_FLIP: Cmd = Cmd::new(RW, PageFlip::SIZE, MAGIC, 0xb0);
pub const CREATE_DUMB: Cmd = Cmd::new(RW, CreateDumb::SIZE, MAGIC, 0xb2);
pub const MAP_DUMB: Cmd = Cmd::new(RW, MapDumb::SIZE, MAGIC, 0xb3);
pub const DESTROY_DUMB: Cmd = Cmd::new(RW, DestroyDumb::SIZE, MAGIC, 0xb4);

/// capability id: adapter supports dumb buffers
pub const CAP_DUMB_BUFFER: u64 = 0x1;

pub const CONNECTED: u32 = 1;
pub const DISCONNECTED: u32 = 2;
pub const UNKNOWN_CONNECTION: u32 = 3;

/// flag for [`PageFlip`]: queue a completion event on the device fd
pub const PAGE_FLIP_EVENT: u32 = 0x01;

pub const MODE_NAME_LEN: usize = 32;

pub(crate) fn get_u16(buf: &[u8], off: usize) -> u16 {
    let mut b = [0u8; 2];
    b.copy_from_slice(&buf[off..off + 2]);
    u16::from_le_bytes(b)
}

pub(crate) fn get_u32(buf: &[u8], off: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&buf[off..off + 4]);
    u32::from_le_bytes(b)
}

pub(crate) fn get_u64(buf: &[u8], off: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[off..off + 8]);
    u64::from_le_bytes(b)
}

pub(crate) fn put_u16(buf: &mut [u8], off: usize, v: u16) {
    buf[off..off + 2].copy_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_u32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_u64(buf: &mut [u8], off: usize, v: u64) {
    buf[off..off + 8].copy_from_slice(&v.to_le_bytes());
}

/// `drm_get_cap`, 16 bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct GetCap {
    pub id: u64,
    pub value: u64,
}

impl GetCap {
    pub const SIZE: usize = 16;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        put_u64(&mut buf, 0x00, self.id);
        put_u64(&mut buf, 0x08, self.value);
        buf
    }

    pub fn decode(buf: &[u8]) -> GetCap {
        GetCap {
            id: get_u64(buf, 0x00),
            value: get_u64(buf, 0x08),
        }
    }
}

/// `drm_mode_card_res`, 64 bytes
///
/// the four pointer fields reference caller-allocated `u32` arrays sized by
/// the matching count; zero means "counts only" (phase one of discovery)
#[derive(Debug, Clone, Copy, Default)]
pub struct CardRes {
    pub fb_id_ptr: u64,
    pub crtc_id_ptr: u64,
    pub connector_id_ptr: u64,
    pub encoder_id_ptr: u64,
    pub count_fbs: u32,
    pub count_crtcs: u32,
    pub count_connectors: u32,
    pub count_encoders: u32,
    pub min_width: u32,
    pub max_width: u32,
    pub min_height: u32,
    pub max_height: u32,
}

impl CardRes {
    pub const SIZE: usize = 64;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        put_u64(&mut buf, 0x00, self.fb_id_ptr);
        put_u64(&mut buf, 0x08, self.crtc_id_ptr);
        put_u64(&mut buf, 0x10, self.connector_id_ptr);
        put_u64(&mut buf, 0x18, self.encoder_id_ptr);
        put_u32(&mut buf, 0x20, self.count_fbs);
        put_u32(&mut buf, 0x24, self.count_crtcs);
        put_u32(&mut buf, 0x28, self.count_connectors);
        put_u32(&mut buf, 0x2c, self.count_encoders);
        put_u32(&mut buf, 0x30, self.min_width);
        put_u32(&mut buf, 0x34, self.max_width);
        put_u32(&mut buf, 0x38, self.min_height);
        put_u32(&mut buf, 0x3c, self.max_height);
        buf
    }

    pub fn decode(buf: &[u8]) -> CardRes {
        CardRes {
            fb_id_ptr: get_u64(buf, 0x00),
            crtc_id_ptr: get_u64(buf, 0x08),
            connector_id_ptr: get_u64(buf, 0x10),
            encoder_id_ptr: get_u64(buf, 0x18),
            count_fbs: get_u32(buf, 0x20),
            count_crtcs: get_u32(buf, 0x24),
            count_connectors: get_u32(buf, 0x28),
            count_encoders: get_u32(buf, 0x2c),
            min_width: get_u32(buf, 0x30),
            max_width: get_u32(buf, 0x34),
            min_height: get_u32(buf, 0x38),
            max_height: get_u32(buf, 0x3c),
        }
    }
}

/// `drm_mode_modeinfo`, 68 bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeInfo {
    pub clock: u32,
    pub hdisplay: u16,
    pub hsync_start: u16,
    pub hsync_end: u16,
    pub htotal: u16,
    pub hskew: u16,
    pub vdisplay: u16,
    pub vsync_start: u16,
    pub vsync_end: u16,
    pub vtotal: u16,
    pub vscan: u16,
    pub vrefresh: u32,
    pub flags: u32,
    pub kind: u32,
    /// null-terminated display name
    pub name: [u8; MODE_NAME_LEN],
}

impl ModeInfo {
    pub const SIZE: usize = 68;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        put_u32(&mut buf, 0x00, self.clock);
        put_u16(&mut buf, 0x04, self.hdisplay);
        put_u16(&mut buf, 0x06, self.hsync_start);
        put_u16(&mut buf, 0x08, self.hsync_end);
        put_u16(&mut buf, 0x0a, self.htotal);
        put_u16(&mut buf, 0x0c, self.hskew);
        put_u16(&mut buf, 0x0e, self.vdisplay);
        put_u16(&mut buf, 0x10, self.vsync_start);
        put_u16(&mut buf, 0x12, self.vsync_end);
        put_u16(&mut buf, 0x14, self.vtotal);
        put_u16(&mut buf, 0x16, self.vscan);
        put_u32(&mut buf, 0x18, self.vrefresh);
        put_u32(&mut buf, 0x1c, self.flags);
        put_u32(&mut buf, 0x20, self.kind);
        buf[0x24..0x24 + MODE_NAME_LEN].copy_from_slice(&self.name);
        buf
    }

    pub fn decode(buf: &[u8]) -> ModeInfo {
        let mut name = [0u8; MODE_NAME_LEN];
        name.copy_from_slice(&buf[0x24..0x24 + MODE_NAME_LEN]);
        ModeInfo {
            clock: get_u32(buf, 0x00),
            hdisplay: get_u16(buf, 0x04),
            hsync_start: get_u16(buf, 0x06),
            hsync_end: get_u16(buf, 0x08),
            htotal: get_u16(buf, 0x0a),
            hskew: get_u16(buf, 0x0c),
            vdisplay: get_u16(buf, 0x0e),
            vsync_start: get_u16(buf, 0x10),
            vsync_end: get_u16(buf, 0x12),
            vtotal: get_u16(buf, 0x14),
            vscan: get_u16(buf, 0x16),
            vrefresh: get_u32(buf, 0x18),
            flags: get_u32(buf, 0x1c),
            kind: get_u32(buf, 0x20),
            name,
        }
    }

    /// display name up to the first null byte
    pub fn name(&self) -> &str {
        let end = self.name.iter().position(|b| *b == 0).unwrap_or(MODE_NAME_LEN);
        std::str::from_utf8(&self.name[..end]).unwrap_or("")
    }
}

/// `drm_mode_get_connector`, 80 bytes
///
/// `modes_ptr` references an array of [`ModeInfo::SIZE`]-byte records,
/// `props_ptr`/`prop_values_ptr` parallel `u32`/`u64` arrays of
/// `count_props` entries, `encoders_ptr` a `u32` array
#[derive(Debug, Clone, Copy, Default)]
pub struct GetConnector {
    pub encoders_ptr: u64,
    pub modes_ptr: u64,
    pub props_ptr: u64,
    pub prop_values_ptr: u64,
    pub count_modes: u32,
    pub count_props: u32,
    pub count_encoders: u32,
    pub encoder_id: u32,
    pub connector_id: u32,
    pub connector_type: u32,
    pub connector_type_id: u32,
    pub connection: u32,
    pub mm_width: u32,
    pub mm_height: u32,
    pub subpixel: u32,
}

impl GetConnector {
    pub const SIZE: usize = 80;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        put_u64(&mut buf, 0x00, self.encoders_ptr);
        put_u64(&mut buf, 0x08, self.modes_ptr);
        put_u64(&mut buf, 0x10, self.props_ptr);
        put_u64(&mut buf, 0x18, self.prop_values_ptr);
        put_u32(&mut buf, 0x20, self.count_modes);
        put_u32(&mut buf, 0x24, self.count_props);
        put_u32(&mut buf, 0x28, self.count_encoders);
        put_u32(&mut buf, 0x2c, self.encoder_id);
        put_u32(&mut buf, 0x30, self.connector_id);
        put_u32(&mut buf, 0x34, self.connector_type);
        put_u32(&mut buf, 0x38, self.connector_type_id);
        put_u32(&mut buf, 0x3c, self.connection);
        put_u32(&mut buf, 0x40, self.mm_width);
        put_u32(&mut buf, 0x44, self.mm_height);
        put_u32(&mut buf, 0x48, self.subpixel);
        // 0x4c: padding
        buf
    }

    pub fn decode(buf: &[u8]) -> GetConnector {
        GetConnector {
            encoders_ptr: get_u64(buf, 0x00),
            modes_ptr: get_u64(buf, 0x08),
            props_ptr: get_u64(buf, 0x10),
            prop_values_ptr: get_u64(buf, 0x18),
            count_modes: get_u32(buf, 0x20),
            count_props: get_u32(buf, 0x24),
            count_encoders: get_u32(buf, 0x28),
            encoder_id: get_u32(buf, 0x2c),
            connector_id: get_u32(buf, 0x30),
            connector_type: get_u32(buf, 0x34),
            connector_type_id: get_u32(buf, 0x38),
            connection: get_u32(buf, 0x3c),
            mm_width: get_u32(buf, 0x40),
            mm_height: get_u32(buf, 0x44),
            subpixel: get_u32(buf, 0x48),
        }
    }
}

/// `drm_mode_get_encoder`, 20 bytes; single-shot, no pointer fields
#[derive(Debug, Clone, Copy, Default)]
pub struct GetEncoder {
    pub encoder_id: u32,
    pub encoder_type: u32,
    pub crtc_id: u32,
    pub possible_crtcs: u32,
    pub possible_clones: u32,
}

impl GetEncoder {
    pub const SIZE: usize = 20;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        put_u32(&mut buf, 0x00, self.encoder_id);
        put_u32(&mut buf, 0x04, self.encoder_type);
        put_u32(&mut buf, 0x08, self.crtc_id);
        put_u32(&mut buf, 0x0c, self.possible_crtcs);
        put_u32(&mut buf, 0x10, self.possible_clones);
        buf
    }

    pub fn decode(buf: &[u8]) -> GetEncoder {
        GetEncoder {
            encoder_id: get_u32(buf, 0x00),
            encoder_type: get_u32(buf, 0x04),
            crtc_id: get_u32(buf, 0x08),
            possible_crtcs: get_u32(buf, 0x0c),
            possible_clones: get_u32(buf, 0x10),
        }
    }
}

/// `drm_mode_crtc`, 104 bytes; serves both the get and set commands
///
/// `set_connectors_ptr` references a `u32` array of `count_connectors`
/// connector ids (set only)
#[derive(Debug, Clone, Copy, Default)]
pub struct CrtcReq {
    pub set_connectors_ptr: u64,
    pub count_connectors: u32,
    pub crtc_id: u32,
    pub fb_id: u32,
    pub x: u32,
    pub y: u32,
    pub gamma_size: u32,
    pub mode_valid: u32,
    pub mode: ModeInfo,
}

impl CrtcReq {
    pub const SIZE: usize = 104;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        put_u64(&mut buf, 0x00, self.set_connectors_ptr);
        put_u32(&mut buf, 0x08, self.count_connectors);
        put_u32(&mut buf, 0x0c, self.crtc_id);
        put_u32(&mut buf, 0x10, self.fb_id);
        put_u32(&mut buf, 0x14, self.x);
        put_u32(&mut buf, 0x18, self.y);
        put_u32(&mut buf, 0x1c, self.gamma_size);
        put_u32(&mut buf, 0x20, self.mode_valid);
        buf[0x24..0x24 + ModeInfo::SIZE].copy_from_slice(&self.mode.encode());
        buf
    }

    pub fn decode(buf: &[u8]) -> CrtcReq {
        CrtcReq {
            set_connectors_ptr: get_u64(buf, 0x00),
            count_connectors: get_u32(buf, 0x08),
            crtc_id: get_u32(buf, 0x0c),
            fb_id: get_u32(buf, 0x10),
            x: get_u32(buf, 0x14),
            y: get_u32(buf, 0x18),
            gamma_size: get_u32(buf, 0x1c),
            mode_valid: get_u32(buf, 0x20),
            mode: ModeInfo::decode(&buf[0x24..0x24 + ModeInfo::SIZE]),
        }
    }
}

/// `drm_mode_fb_cmd`, 28 bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct FbCmd {
    pub fb_id: u32,
    pub width: u32,
    pub height: u32,
    pub pitch: u32,
    pub bpp: u32,
    pub depth: u32,
    /// driver-specific dumb buffer handle
    pub handle: u32,
}

impl FbCmd {
    pub const SIZE: usize = 28;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        put_u32(&mut buf, 0x00, self.fb_id);
        put_u32(&mut buf, 0x04, self.width);
        put_u32(&mut buf, 0x08, self.height);
        put_u32(&mut buf, 0x0c, self.pitch);
        put_u32(&mut buf, 0x10, self.bpp);
        put_u32(&mut buf, 0x14, self.depth);
        put_u32(&mut buf, 0x18, self.handle);
        buf
    }

    pub fn decode(buf: &[u8]) -> FbCmd {
        FbCmd {
            fb_id: get_u32(buf, 0x00),
            width: get_u32(buf, 0x04),
            height: get_u32(buf, 0x08),
            pitch: get_u32(buf, 0x0c),
            bpp: get_u32(buf, 0x10),
            depth: get_u32(buf, 0x14),
            handle: get_u32(buf, 0x18),
        }
    }
}

/// `drm_mode_create_dumb`, 32 bytes; height comes before width in the abi
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateDumb {
    pub height: u32,
    pub width: u32,
    pub bpp: u32,
    pub flags: u32,
    pub handle: u32,
    /// row stride computed by the kernel, to be used verbatim
    pub pitch: u32,
    pub size: u64,
}

impl CreateDumb {
    pub const SIZE: usize = 32;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        put_u32(&mut buf, 0x00, self.height);
        put_u32(&mut buf, 0x04, self.width);
        put_u32(&mut buf, 0x08, self.bpp);
        put_u32(&mut buf, 0x0c, self.flags);
        put_u32(&mut buf, 0x10, self.handle);
        put_u32(&mut buf, 0x14, self.pitch);
        put_u64(&mut buf, 0x18, self.size);
        buf
    }

    pub fn decode(buf: &[u8]) -> CreateDumb {
        CreateDumb {
            height: get_u32(buf, 0x00),
            width: get_u32(buf, 0x04),
            bpp: get_u32(buf, 0x08),
            flags: get_u32(buf, 0x0c),
            handle: get_u32(buf, 0x10),
            pitch: get_u32(buf, 0x14),
            size: get_u64(buf, 0x18),
        }
    }
}

/// `drm_mode_map_dumb`, 16 bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct MapDumb {
    pub handle: u32,
    /// fake offset for the subsequent mmap of this handle
    pub offset: u64,
}

impl MapDumb {
    pub const SIZE: usize = 16;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        put_u32(&mut buf, 0x00, self.handle);
        // 0x04: padding
        put_u64(&mut buf, 0x08, self.offset);
        buf
    }

    pub fn decode(buf: &[u8]) -> MapDumb {
        MapDumb {
            handle: get_u32(buf, 0x00),
            offset: get_u64(buf, 0x08),
        }
    }
}

/// `drm_mode_destroy_dumb`, 4 bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct DestroyDumb {
    pub handle: u32,
}

impl DestroyDumb {
    pub const SIZE: usize = 4;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        self.handle.to_le_bytes()
    }
}

/// `drm_mode_crtc_page_flip`, 24 bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct PageFlip {
    pub crtc_id: u32,
    pub fb_id: u32,
    pub flags: u32,
    pub user_data: u64,
}

impl PageFlip {
    pub const SIZE: usize = 24;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        put_u32(&mut buf, 0x00, self.crtc_id);
        put_u32(&mut buf, 0x04, self.fb_id);
        put_u32(&mut buf, 0x08, self.flags);
        // 0x0c: reserved
        put_u64(&mut buf, 0x10, self.user_data);
        buf
    }

    pub fn decode(buf: &[u8]) -> PageFlip {
        PageFlip {
            crtc_id: get_u32(buf, 0x00),
            fb_id: get_u32(buf, 0x04),
            flags: get_u32(buf, 0x08),
            user_data: get_u64(buf, 0x10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // values straight out of the kernel headers
    #[test]
    fn commands_match_the_kernel() {
        assert_eq!(GET_CAP.raw(), 0xc010640c);
        assert_eq!(GET_RESOURCES.raw(), 0xc04064a0);
        assert_eq!(GET_CRTC.raw(), 0xc06864a1);
        assert_eq!(SET_CRTC.raw(), 0xc06864a2);
        assert_eq!(GET_ENCODER.raw(), 0xc01464a6);
        assert_eq!(GET_CONNECTOR.raw(), 0xc05064a7);
        assert_eq!(ADD_FB.raw(), 0xc01c64ae);
        assert_eq!(RM_FB.raw(), 0xc00464af);
        assert_eq!(PAGE_FLIP.raw(), 0xc01864b0);
        assert_eq!(CREATE_DUMB.raw(), 0xc02064b2);
        assert_eq!(MAP_DUMB.raw(), 0xc01064b3);
        assert_eq!(DESTROY_DUMB.raw(), 0xc00464b4);
    }

    #[test]
    fn card_res_roundtrip() {
        let res = CardRes {
            fb_id_ptr: 0x1122_3344_5566_7788,
            crtc_id_ptr: 0xdead_beef,
            connector_id_ptr: 1,
            encoder_id_ptr: 2,
            count_fbs: 3,
            count_crtcs: 4,
            count_connectors: 5,
            count_encoders: 6,
            min_width: 640,
            max_width: 4096,
            min_height: 480,
            max_height: 4096,
        };
        let buf = res.encode();
        assert_eq!(get_u64(&buf, 0x00), 0x1122_3344_5566_7788);
        assert_eq!(get_u32(&buf, 0x28), 5);
        let back = CardRes::decode(&buf);
        assert_eq!(back.count_connectors, 5);
        assert_eq!(back.max_height, 4096);
        assert_eq!(back.fb_id_ptr, res.fb_id_ptr);
    }

    #[test]
    fn mode_info_layout() {
        let mut name = [0u8; MODE_NAME_LEN];
        name[..7].copy_from_slice(b"640x480");
        let mode = ModeInfo {
            clock: 25175,
            hdisplay: 640,
            hsync_start: 656,
            hsync_end: 752,
            htotal: 800,
            hskew: 0,
            vdisplay: 480,
            vsync_start: 490,
            vsync_end: 492,
            vtotal: 525,
            vscan: 0,
            vrefresh: 60,
            flags: 0,
            kind: 0,
            name,
        };
        let buf = mode.encode();
        assert_eq!(get_u32(&buf, 0x00), 25175);
        assert_eq!(get_u16(&buf, 0x04), 640);
        assert_eq!(get_u16(&buf, 0x0e), 480);
        assert_eq!(get_u32(&buf, 0x18), 60);
        assert_eq!(&buf[0x24..0x2b], b"640x480");
        let back = ModeInfo::decode(&buf);
        assert_eq!(back, mode);
        assert_eq!(back.name(), "640x480");
    }

    #[test]
    fn crtc_req_embeds_the_mode() {
        let mut req = CrtcReq::default();
        req.crtc_id = 7;
        req.mode_valid = 1;
        req.mode.hdisplay = 1920;
        let buf = req.encode();
        assert_eq!(get_u32(&buf, 0x0c), 7);
        assert_eq!(get_u32(&buf, 0x20), 1);
        assert_eq!(get_u16(&buf, 0x24 + 0x04), 1920);
        assert_eq!(CrtcReq::decode(&buf).mode.hdisplay, 1920);
    }

    #[test]
    fn create_dumb_height_first() {
        let req = CreateDumb {
            height: 480,
            width: 640,
            bpp: 32,
            ..Default::default()
        };
        let buf = req.encode();
        assert_eq!(get_u32(&buf, 0x00), 480);
        assert_eq!(get_u32(&buf, 0x04), 640);
        assert_eq!(get_u32(&buf, 0x08), 32);
    }
}
