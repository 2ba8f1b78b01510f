//! mapping dumb buffers into process memory

use std::io;
use std::os::fd::RawFd;
use std::ptr::NonNull;
use std::slice;

/// a writable shared mapping of device memory
///
/// valid only while the dumb buffer handle behind it is alive; teardown
/// must [`unmap`](MappedRegion::unmap) before the handle is destroyed
pub struct MappedRegion {
    ptr: NonNull<u8>,
    len: usize,
}

/// map `len` bytes of `fd` at `offset`, read+write, shared
///
/// `offset` must come from a prior map request against a specific dumb
/// buffer handle on the same descriptor
pub fn map(fd: RawFd, offset: u64, len: usize) -> io::Result<MappedRegion> {
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            fd,
            offset as libc::off_t,
        )
    };
    if ptr == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }
    // mmap never returns null on success
    let ptr = unsafe { NonNull::new_unchecked(ptr.cast()) };
    Ok(MappedRegion { ptr, len })
}

impl MappedRegion {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// release the mapping; dropping without unmapping keeps the pages
    /// around until the process exits
    pub fn unmap(self) -> io::Result<()> {
        let ret = unsafe { libc::munmap(self.ptr.as_ptr().cast(), self.len) };
        if ret != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}
