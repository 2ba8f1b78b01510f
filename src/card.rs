//! the adapter device node and the fd-level device seam

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsRawFd, IntoRawFd, RawFd};
use std::path::PathBuf;

use crate::control::ControlDevice;
use crate::error::Error;
use crate::ioctl::{self, Cmd};
use crate::mmap::{self, MappedRegion};
use crate::uapi;

const DRI_DIR: &str = "/dev/dri";

/// fd-level operations of a display adapter
///
/// everything above the raw descriptor goes through these three calls, so
/// substituting the implementation swaps the whole kernel out from under
/// the stack; [`ControlDevice`] builds the mode-setting protocol on top
pub trait Device: AsRawFd {
    /// issue a control command; the kernel reads and writes `payload` in
    /// place
    fn ioctl(&self, cmd: Cmd, payload: &mut [u8]) -> io::Result<()> {
        ioctl::call(self.as_raw_fd(), cmd, payload)
    }

    /// one blocking read of the adapter's event stream
    fn read_raw(&self, buf: &mut [u8]) -> io::Result<usize> {
        let n = unsafe {
            libc::read(self.as_raw_fd(), buf.as_mut_ptr() as *mut libc::c_void, buf.len())
        };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(n as usize)
    }

    /// map `len` bytes of device memory at a map-request `offset`
    fn map_region(&self, offset: u64, len: usize) -> io::Result<MappedRegion> {
        mmap::map(self.as_raw_fd(), offset, len)
    }

    /// query one 64-bit capability value
    fn get_cap(&self, id: u64) -> Result<u64, Error> {
        let mut buf = uapi::GetCap { id, value: 0 }.encode();
        self.ioctl(uapi::GET_CAP, &mut buf)?;
        Ok(uapi::GetCap::decode(&buf).value)
    }

    /// release the descriptor; every id and handle derived from this
    /// device is dead afterwards
    fn close(self) -> io::Result<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// an open display adapter node, `/dev/dri/card<minor>`
///
/// single-owner: all derived ids and handles die with it, and nothing here
/// locks, so keep one exclusive owner per process lifetime
pub struct Card {
    file: File,
}

impl Card {
    /// open the adapter read-write; os errors (absent node, permissions)
    /// surface verbatim
    pub fn open(minor: u32) -> io::Result<Card> {
        let path = PathBuf::from(format!("{DRI_DIR}/card{minor}"));
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        tracing::debug!("opened {}", path.display());
        Ok(Card { file })
    }
}

impl AsRawFd for Card {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl Device for Card {
    fn close(self) -> io::Result<()> {
        let fd = self.file.into_raw_fd();
        let ret = unsafe { libc::close(fd) };
        if ret != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl ControlDevice for Card {}
