//! the adapter's completion event stream
//!
//! the kernel packs one or more `{type, length}`-headed records into each
//! read; the flip wait only needs to see that a record arrived, but the
//! length field lets a caller walk everything a single read returned

use crate::card::Device;
use crate::error::Error;
use crate::uapi;

/// read chunk size, the same one libdrm uses
pub const EVENT_BUF_LEN: usize = 1024;

/// `{type: u32, length: u32}`, little-endian
pub const HEADER_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    VBlank,
    PageFlip,
    CrtcSequence,
    /// unrecognized type, kept so a multi-event walk can still skip it
    Other(u32),
}

impl EventKind {
    fn from_raw(v: u32) -> EventKind {
        match v {
            1 => EventKind::VBlank,
            2 => EventKind::PageFlip,
            3 => EventKind::CrtcSequence,
            other => EventKind::Other(other),
        }
    }
}

/// decoded event header; `len` covers the header plus the type-specific
/// payload that follows it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventHeader {
    pub kind: EventKind,
    pub len: u32,
}

impl EventHeader {
    /// decode the header at the start of `buf`
    ///
    /// fewer than [`HEADER_LEN`] bytes is [`Error::NotEnoughData`], never a
    /// partial header
    pub fn decode(buf: &[u8]) -> Result<EventHeader, Error> {
        if buf.len() < HEADER_LEN {
            return Err(Error::NotEnoughData);
        }
        Ok(EventHeader {
            kind: EventKind::from_raw(uapi::get_u32(buf, 0x00)),
            len: uapi::get_u32(buf, 0x04),
        })
    }
}

/// iterator over the records packed into one read chunk
///
/// stops at the first truncated record
pub struct Events<'a> {
    buf: &'a [u8],
}

/// walk the events in `buf`, honoring each header's length field
pub fn events(buf: &[u8]) -> Events<'_> {
    Events { buf }
}

impl Iterator for Events<'_> {
    type Item = EventHeader;

    fn next(&mut self) -> Option<EventHeader> {
        let header = EventHeader::decode(self.buf).ok()?;
        // a length below the header size would loop forever
        let len = (header.len as usize).max(HEADER_LEN);
        if len > self.buf.len() {
            return None;
        }
        self.buf = &self.buf[len..];
        Some(header)
    }
}

/// block on one read of the device's event stream and decode the first
/// header
///
/// a zero-length read is [`Error::NotEnoughData`]; there is no timeout, a
/// kernel that never signals keeps the caller blocked
pub fn read_event(device: &impl Device) -> Result<EventHeader, Error> {
    let mut buf = [0u8; EVENT_BUF_LEN];
    let n = device.read_raw(&mut buf)?;
    if n == 0 {
        return Err(Error::NotEnoughData);
    }
    EventHeader::decode(&buf[..n])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: u32, len: u32) -> Vec<u8> {
        let mut buf = vec![0u8; len as usize];
        buf[0..4].copy_from_slice(&kind.to_le_bytes());
        buf[4..8].copy_from_slice(&len.to_le_bytes());
        buf
    }

    #[test]
    fn short_read_is_not_enough_data() {
        assert!(matches!(EventHeader::decode(&[]), Err(Error::NotEnoughData)));
        assert!(matches!(
            EventHeader::decode(&[2, 0, 0, 0, 8, 0, 0]),
            Err(Error::NotEnoughData)
        ));
    }

    #[test]
    fn header_decodes_little_endian() {
        let header = EventHeader::decode(&record(2, 8)).unwrap();
        assert_eq!(header.kind, EventKind::PageFlip);
        assert_eq!(header.len, 8);
    }

    #[test]
    fn walks_multiple_records_by_length() {
        let mut chunk = record(1, 32);
        chunk.extend(record(2, 8));
        chunk.extend(record(3, 16));
        let kinds: Vec<_> = events(&chunk).map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            [EventKind::VBlank, EventKind::PageFlip, EventKind::CrtcSequence]
        );
    }

    #[test]
    fn truncated_tail_stops_the_walk() {
        let mut chunk = record(2, 8);
        chunk.extend(record(1, 32).into_iter().take(12));
        let collected: Vec<_> = events(&chunk).collect();
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].kind, EventKind::PageFlip);
    }

    #[test]
    fn unknown_type_is_preserved() {
        let header = EventHeader::decode(&record(9, 8)).unwrap();
        assert_eq!(header.kind, EventKind::Other(9));
    }
}
