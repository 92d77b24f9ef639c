//! Datagram decoder for the binary pixel protocol.
//!
//! ```text
//! byte 0      has_alpha (0 = false, anything else = true)
//! byte 1      protocol version (informational)
//! bytes 2..N  records, little-endian:
//!             x:u16 y:u16 r:u8 g:u8 b:u8 [a:u8 when has_alpha]
//! ```
//!
//! Decoding borrows the datagram and yields records lazily; nothing is allocated per pixel.

use std::iter::Take;
use std::slice::ChunksExact;

use crate::core::{HEADER_LEN, PixelUpdate, RECORD_LEN_RGB, RECORD_LEN_RGBA};
use crate::error::{VloedError, VloedResult};

/// Fixed two-byte datagram header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketHeader {
    pub has_alpha: bool,
    pub version: u8,
}

impl PacketHeader {
    pub fn record_len(self) -> usize {
        if self.has_alpha {
            RECORD_LEN_RGBA
        } else {
            RECORD_LEN_RGB
        }
    }
}

/// Lazy, finite sequence of records from one datagram.
///
/// Holds at most `max_pixels` records; trailing bytes that do not form a whole record are never
/// visited.
#[derive(Clone, Debug)]
pub struct PixelRecords<'a> {
    header: PacketHeader,
    chunks: Take<ChunksExact<'a, u8>>,
}

impl PixelRecords<'_> {
    pub fn header(&self) -> PacketHeader {
        self.header
    }
}

impl Iterator for PixelRecords<'_> {
    type Item = PixelUpdate;

    fn next(&mut self) -> Option<Self::Item> {
        let rec = self.chunks.next()?;
        Some(PixelUpdate {
            x: u16::from_le_bytes([rec[0], rec[1]]),
            y: u16::from_le_bytes([rec[2], rec[3]]),
            r: rec[4],
            g: rec[5],
            b: rec[6],
            a: if self.header.has_alpha { rec[7] } else { u8::MAX },
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for PixelRecords<'_> {}

/// Number of records a payload of `len` bytes yields under the cap.
pub fn pixel_count(len: usize, has_alpha: bool, max_pixels: usize) -> usize {
    let record_len = if has_alpha {
        RECORD_LEN_RGBA
    } else {
        RECORD_LEN_RGB
    };
    (len.saturating_sub(HEADER_LEN) / record_len).min(max_pixels)
}

/// Parse the header of `bytes` and return the records it carries, capped at `max_pixels`.
///
/// Payloads shorter than the header are rejected as a whole.
pub fn decode(bytes: &[u8], max_pixels: usize) -> VloedResult<PixelRecords<'_>> {
    let (head, body) = match bytes.split_first_chunk::<HEADER_LEN>() {
        Some(split) => split,
        None => return Err(VloedError::malformed(bytes.len(), "shorter than header")),
    };
    let header = PacketHeader {
        has_alpha: head[0] != 0,
        version: head[1],
    };
    let count = pixel_count(bytes.len(), header.has_alpha, max_pixels);
    let chunks = body.chunks_exact(header.record_len()).take(count);
    if chunks.len() != count {
        return Err(VloedError::malformed(bytes.len(), "short record"));
    }
    Ok(PixelRecords { header, chunks })
}

/// Encode `pixels` into a single datagram. Used by clients and tests.
pub fn encode(has_alpha: bool, version: u8, pixels: &[PixelUpdate]) -> Vec<u8> {
    let record_len = if has_alpha {
        RECORD_LEN_RGBA
    } else {
        RECORD_LEN_RGB
    };
    let mut out = Vec::with_capacity(HEADER_LEN + pixels.len() * record_len);
    out.push(u8::from(has_alpha));
    out.push(version);
    for p in pixels {
        out.extend_from_slice(&p.x.to_le_bytes());
        out.extend_from_slice(&p.y.to_le_bytes());
        out.extend_from_slice(&[p.r, p.g, p.b]);
        if has_alpha {
            out.push(p.a);
        }
    }
    out
}
