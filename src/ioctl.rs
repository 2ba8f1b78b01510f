//! device control command encoding
//!
//! a command is a packed 32-bit value the kernel decodes back into
//! direction, payload size, subsystem magic and opcode; getting any of the
//! four wrong silently corrupts the call, so the whole layout lives here
//! and nowhere else

use std::io;
use std::os::fd::RawFd;

use bitflags::bitflags;

bitflags! {
    /// data direction of a command, bits [31:30]
    ///
    /// an empty set means the command carries no payload; bit patterns
    /// above `READ | WRITE` are not a direction and [`Dir::from_bits`]
    /// rejects them
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Dir: u32 {
        const WRITE = 0b01;
        const READ = 0b10;
    }
}

/// the payload size field is 14 bits wide
pub const MAX_PAYLOAD: usize = (1 << 14) - 1;

/// an encoded device control command
///
/// layout: `(dir << 30) | (size << 16) | (magic << 8) | op`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cmd(u32);

impl Cmd {
    /// encode a command
    ///
    /// panics when `size` does not fit the 14-bit field; the command table
    /// in [`crate::uapi`] is `const`, so an oversized payload there fails
    /// the build rather than a syscall
    pub const fn new(dir: Dir, size: usize, magic: u8, op: u8) -> Cmd {
        assert!(size <= MAX_PAYLOAD, "ioctl payload exceeds the 14-bit size field");
        Cmd((dir.bits() << 30) | ((size as u32) << 16) | ((magic as u32) << 8) | op as u32)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn dir(self) -> Dir {
        Dir::from_bits_retain(self.0 >> 30)
    }

    pub const fn size(self) -> usize {
        ((self.0 >> 16) & 0x3fff) as usize
    }

    pub const fn magic(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn op(self) -> u8 {
        self.0 as u8
    }
}

/// issue `cmd` against `fd` with `payload` as the argument buffer
///
/// the kernel reads and/or writes `payload` in place according to the
/// command's direction; a non-zero return surfaces the os error verbatim
pub fn call(fd: RawFd, cmd: Cmd, payload: &mut [u8]) -> io::Result<()> {
    debug_assert_eq!(payload.len(), cmd.size());
    let ret = unsafe { libc::ioctl(fd, cmd.raw() as _, payload.as_mut_ptr()) };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let cmd = Cmd::new(Dir::READ.union(Dir::WRITE), 104, b'd', 0xa2);
        assert_eq!(cmd.dir(), Dir::READ | Dir::WRITE);
        assert_eq!(cmd.size(), 104);
        assert_eq!(cmd.magic(), b'd');
        assert_eq!(cmd.op(), 0xa2);
    }

    #[test]
    fn roundtrip_all_directions() {
        for dir in [Dir::empty(), Dir::WRITE, Dir::READ, Dir::READ | Dir::WRITE] {
            for size in [0usize, 1, 0x3fff] {
                let cmd = Cmd::new(dir, size, 0x42, 0x07);
                assert_eq!(cmd.dir(), dir);
                assert_eq!(cmd.size(), size);
                assert_eq!(cmd.magic(), 0x42);
                assert_eq!(cmd.op(), 0x07);
            }
        }
    }

    #[test]
    fn direction_out_of_range_is_rejected() {
        assert_eq!(Dir::from_bits(0b100), None);
        assert_eq!(Dir::from_bits(0b111), None);
    }

    #[test]
    #[should_panic]
    fn oversized_payload_panics() {
        Cmd::new(Dir::READ, MAX_PAYLOAD + 1, b'd', 0x00);
    }
}
