//! drives the whole stack against a mock adapter: ioctls answered from a
//! scripted kernel, dumb buffers backed by a temp file so the real mapper
//! runs, flip events synthesized on the fd's event stream

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use scanout::card::Device;
use scanout::control::ControlDevice;
use scanout::error::Error;
use scanout::ioctl::Cmd;
use scanout::modeset::Modeset;
use scanout::surface::Surface;
use scanout::uapi;

const CONNECTOR_ID: u32 = 1;
const CRTC_ID: u32 = 10;
const ENCODER_ID: u32 = 20;
const PAGE: u64 = 4096;

#[derive(Default)]
struct MockState {
    next_handle: u32,
    next_fb: u32,
    next_offset: u64,
    offsets: HashMap<u32, u64>,
    live_handles: Vec<u32>,
    live_fbs: Vec<u32>,
    crtc_fb: u32,
    flips: Vec<u32>,
    teardown: Vec<String>,
    pending_events: usize,
    forced_mode_request: bool,
}

struct MockCard {
    backing: File,
    connected: bool,
    zero_modes: bool,
    dumb_cap: bool,
    state: Arc<Mutex<MockState>>,
}

fn backing_file() -> File {
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let path = std::env::temp_dir().join(format!(
        "scanout-mock-{}-{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed),
    ));
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path)
        .unwrap();
    std::fs::remove_file(&path).unwrap();
    file
}

fn mock() -> MockCard {
    MockCard {
        backing: backing_file(),
        connected: true,
        zero_modes: false,
        dumb_cap: true,
        state: Arc::new(Mutex::new(MockState::default())),
    }
}

fn mode_640x480() -> uapi::ModeInfo {
    let mut name = [0u8; uapi::MODE_NAME_LEN];
    name[..7].copy_from_slice(b"640x480");
    uapi::ModeInfo {
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
    }
}

unsafe fn fill_u32(ptr: u64, values: &[u32]) {
    if ptr != 0 {
        std::slice::from_raw_parts_mut(ptr as usize as *mut u32, values.len())
            .copy_from_slice(values);
    }
}

unsafe fn fill_u64(ptr: u64, values: &[u64]) {
    if ptr != 0 {
        std::slice::from_raw_parts_mut(ptr as usize as *mut u64, values.len())
            .copy_from_slice(values);
    }
}

unsafe fn fill_bytes(ptr: u64, bytes: &[u8]) {
    if ptr != 0 {
        std::slice::from_raw_parts_mut(ptr as usize as *mut u8, bytes.len())
            .copy_from_slice(bytes);
    }
}

impl AsRawFd for MockCard {
    fn as_raw_fd(&self) -> RawFd {
        self.backing.as_raw_fd()
    }
}

impl Device for MockCard {
    fn ioctl(&self, cmd: Cmd, payload: &mut [u8]) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        match cmd.op() {
            // GET_CAP
            0x0c => {
                let mut cap = uapi::GetCap::decode(payload);
                cap.value = match cap.id {
                    uapi::CAP_DUMB_BUFFER if self.dumb_cap => 1,
                    _ => 0,
                };
                payload.copy_from_slice(&cap.encode());
            }
            // GET_RESOURCES
            0xa0 => {
                let mut raw = uapi::CardRes::decode(payload);
                unsafe {
                    fill_u32(raw.crtc_id_ptr, &[CRTC_ID]);
                    fill_u32(raw.connector_id_ptr, &[CONNECTOR_ID]);
                    fill_u32(raw.encoder_id_ptr, &[ENCODER_ID]);
                }
                raw.count_fbs = 0;
                raw.count_crtcs = 1;
                raw.count_connectors = 1;
                raw.count_encoders = 1;
                raw.min_width = 640;
                raw.min_height = 480;
                raw.max_width = 4096;
                raw.max_height = 4096;
                payload.copy_from_slice(&raw.encode());
            }
            // GET_CONNECTOR
            0xa7 => {
                let mut raw = uapi::GetConnector::decode(payload);
                assert_eq!(raw.connector_id, CONNECTOR_ID);
                let second_phase = raw.modes_ptr != 0;
                if second_phase {
                    // phase two must ask for at least one slot even when
                    // phase one reported zero modes
                    assert!(raw.count_modes >= 1);
                    if self.zero_modes && raw.count_modes == 1 {
                        state.forced_mode_request = true;
                    }
                    unsafe {
                        fill_bytes(raw.modes_ptr, &mode_640x480().encode());
                        fill_u32(raw.encoders_ptr, &[ENCODER_ID]);
                        fill_u32(raw.props_ptr, &[1, 2]);
                        fill_u64(raw.prop_values_ptr, &[10, 20]);
                    }
                    raw.count_modes = 1;
                } else {
                    raw.count_modes = if self.zero_modes { 0 } else { 1 };
                }
                raw.count_props = 2;
                raw.count_encoders = 1;
                raw.connection = if self.connected {
                    uapi::CONNECTED
                } else {
                    uapi::DISCONNECTED
                };
                raw.encoder_id = if self.connected { ENCODER_ID } else { 0 };
                raw.mm_width = 520;
                raw.mm_height = 320;
                payload.copy_from_slice(&raw.encode());
            }
            // GET_ENCODER
            0xa6 => {
                let mut raw = uapi::GetEncoder::decode(payload);
                assert_eq!(raw.encoder_id, ENCODER_ID);
                raw.encoder_type = 2;
                raw.crtc_id = CRTC_ID;
                raw.possible_crtcs = 1;
                raw.possible_clones = 0;
                payload.copy_from_slice(&raw.encode());
            }
            // SET_CRTC
            0xa2 => {
                let raw = uapi::CrtcReq::decode(payload);
                assert_eq!(raw.crtc_id, CRTC_ID);
                assert_eq!(raw.mode_valid, 1);
                assert_eq!(raw.count_connectors, 1);
                let conns = unsafe {
                    std::slice::from_raw_parts(raw.set_connectors_ptr as usize as *const u32, 1)
                };
                assert_eq!(conns, [CONNECTOR_ID]);
                assert!(state.live_fbs.contains(&raw.fb_id));
                state.crtc_fb = raw.fb_id;
            }
            // CREATE_DUMB
            0xb2 => {
                let mut raw = uapi::CreateDumb::decode(payload);
                state.next_handle += 1;
                raw.handle = state.next_handle;
                raw.pitch = raw.width * (raw.bpp / 8);
                raw.size = u64::from(raw.pitch) * u64::from(raw.height);
                let offset = state.next_offset;
                // mmap offsets must stay page aligned
                state.next_offset += (raw.size + PAGE - 1) & !(PAGE - 1);
                self.backing.set_len(state.next_offset)?;
                state.offsets.insert(raw.handle, offset);
                state.live_handles.push(raw.handle);
                payload.copy_from_slice(&raw.encode());
            }
            // MAP_DUMB
            0xb3 => {
                let mut raw = uapi::MapDumb::decode(payload);
                raw.offset = state.offsets[&raw.handle];
                payload.copy_from_slice(&raw.encode());
            }
            // ADD_FB
            0xae => {
                let mut raw = uapi::FbCmd::decode(payload);
                assert!(state.live_handles.contains(&raw.handle));
                assert_eq!(raw.bpp, 32);
                assert_eq!(raw.depth, 24);
                assert_eq!(raw.pitch, raw.width * 4);
                raw.fb_id = 100 + state.next_fb;
                state.next_fb += 1;
                state.live_fbs.push(raw.fb_id);
                payload.copy_from_slice(&raw.encode());
            }
            // RM_FB
            0xaf => {
                let id = u32::from_le_bytes(payload[..4].try_into().unwrap());
                let pos = state.live_fbs.iter().position(|fb| *fb == id).unwrap();
                state.live_fbs.remove(pos);
                state.teardown.push(format!("rm_fb {id}"));
            }
            // DESTROY_DUMB
            0xb4 => {
                let handle = u32::from_le_bytes(payload[..4].try_into().unwrap());
                let pos = state.live_handles.iter().position(|h| *h == handle).unwrap();
                state.live_handles.remove(pos);
                state.teardown.push(format!("destroy_dumb {handle}"));
            }
            // PAGE_FLIP
            0xb0 => {
                let raw = uapi::PageFlip::decode(payload);
                assert_eq!(raw.crtc_id, CRTC_ID);
                assert_eq!(raw.flags, uapi::PAGE_FLIP_EVENT);
                assert!(state.live_fbs.contains(&raw.fb_id));
                state.crtc_fb = raw.fb_id;
                state.flips.push(raw.fb_id);
                state.pending_events += 1;
            }
            op => panic!("unexpected ioctl op {op:#x}"),
        }
        Ok(())
    }

    fn read_raw(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        if state.pending_events == 0 {
            return Err(io::Error::from(io::ErrorKind::WouldBlock));
        }
        state.pending_events -= 1;
        buf[0..4].copy_from_slice(&2u32.to_le_bytes());
        buf[4..8].copy_from_slice(&8u32.to_le_bytes());
        Ok(8)
    }
}

impl ControlDevice for MockCard {}

#[test]
fn end_to_end_setup_swap_and_toggle() {
    let card = mock();
    let state = card.state.clone();

    let modeset = Modeset::new(card).unwrap();
    assert_eq!(modeset.connector(), CONNECTOR_ID);
    assert_eq!(modeset.crtc(), CRTC_ID);
    assert_eq!(modeset.mode().name(), "640x480");

    let mut surface = Surface::new(modeset).unwrap();
    assert_eq!(surface.width(), 640);
    assert_eq!(surface.height(), 480);
    // the crtc was programmed once, with the first framebuffer
    assert_eq!(state.lock().unwrap().crtc_fb, 100);
    assert_eq!(surface.back_buffer().id, 100);

    let frame = vec![0xaa; 640 * 480 * 4];
    surface.write_pixels(&frame);
    assert_eq!(surface.back_buffer().bytes()[0], 0xaa);

    surface.swap().unwrap();
    assert_eq!(state.lock().unwrap().flips, [100]);
    // the old front buffer is the new back buffer
    assert_eq!(surface.back_buffer().id, 101);

    surface.swap().unwrap();
    assert_eq!(state.lock().unwrap().flips, [100, 101]);
    assert_eq!(surface.back_buffer().id, 100);
}

#[test]
fn fill_rect_full_extent_readback() {
    let modeset = Modeset::new(mock()).unwrap();
    let mut surface = Surface::new(modeset).unwrap();

    surface.fill_rect(0, 0, 640, 480, 0x00ff8040).unwrap();

    let fb = surface.back_buffer();
    let pitch = fb.pitch as usize;
    let bytes = fb.bytes();
    for y in 0..480usize {
        for x in 0..640usize {
            let offset = pitch * y + 4 * x;
            assert_eq!(&bytes[offset..offset + 4], &0x00ff8040u32.to_le_bytes());
        }
    }
}

#[test]
fn fill_rect_out_of_bounds_is_rejected() {
    let modeset = Modeset::new(mock()).unwrap();
    let mut surface = Surface::new(modeset).unwrap();

    assert!(matches!(
        surface.fill_rect(0, 0, 641, 480, 0),
        Err(Error::RectOutOfBounds { .. })
    ));
    assert!(matches!(
        surface.fill_rect(10, 10, 5, 20, 0),
        Err(Error::RectOutOfBounds { .. })
    ));
    // nothing was written
    assert!(surface.back_buffer().bytes().iter().all(|b| *b == 0));
}

#[test]
fn teardown_releases_in_order() {
    let card = mock();
    let state = card.state.clone();

    let surface = Surface::new(Modeset::new(card).unwrap()).unwrap();
    surface.close().unwrap();

    let state = state.lock().unwrap();
    assert_eq!(
        state.teardown,
        ["rm_fb 100", "destroy_dumb 1", "rm_fb 101", "destroy_dumb 2"],
    );
    assert!(state.live_fbs.is_empty());
    assert!(state.live_handles.is_empty());
}

#[test]
fn zero_mode_connector_fetches_one_slot() {
    let mut card = mock();
    card.zero_modes = true;
    let state = card.state.clone();

    let conn = card.get_connector(CONNECTOR_ID).unwrap();
    assert_eq!(conn.modes.len(), 1);
    assert_eq!(conn.modes[0].hdisplay(), 640);
    assert!(state.lock().unwrap().forced_mode_request);
}

#[test]
fn connector_detail_carries_props_and_encoders() {
    let conn = mock().get_connector(CONNECTOR_ID).unwrap();
    assert_eq!(conn.props, [(1, 10), (2, 20)]);
    assert_eq!(conn.encoders, [ENCODER_ID]);
    assert_eq!(conn.size_mm(), (520, 320));
    assert_eq!(conn.encoder_id(), ENCODER_ID);
}

#[test]
fn disconnected_connector_means_no_output() {
    let mut card = mock();
    card.connected = false;
    assert!(matches!(Modeset::new(card), Err(Error::NoMatchingOutput)));
}

#[test]
fn missing_dumb_buffer_cap_is_refused() {
    let mut card = mock();
    card.dumb_cap = false;
    assert!(matches!(
        Modeset::new(card),
        Err(Error::DumbBuffersUnsupported)
    ));
}
