use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use crate::error::CodecError;

/// Token returned by `EncodeCursor::reserve_u16`, pointing at a length
/// placeholder to be backpatched once the true length is known.
#[derive(Debug, Clone, Copy)]
pub struct LengthSlot {
    at: usize,
}

/// Position-tracking writer over a caller-owned, growable output buffer.
///
/// Writes are big-endian and never fail; the buffer grows as needed.
/// Nested TLVs reserve a two-byte length slot up front and patch it when
/// their body is done.
pub struct EncodeCursor<'a> {
    buf: &'a mut Vec<u8>,
}

impl<'a> EncodeCursor<'a> {
    pub fn new(buf: &'a mut Vec<u8>) -> EncodeCursor<'a> {
        EncodeCursor { buf }
    }

    /// Current absolute write position.
    pub fn pos(&self) -> usize {
        self.buf.len()
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        // writes into a Vec cannot fail
        self.buf.write_u16::<BigEndian>(v).unwrap();
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.write_u32::<BigEndian>(v).unwrap();
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.write_u64::<BigEndian>(v).unwrap();
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_zero(&mut self, n: usize) {
        self.buf.resize(self.buf.len() + n, 0);
    }

    /// Write a zero placeholder for a u16 length field and return a slot
    /// token for later patching.
    pub fn reserve_u16(&mut self) -> LengthSlot {
        let at = self.pos();
        self.write_u16(0);
        LengthSlot { at }
    }

    pub fn patch_u16(&mut self, slot: LengthSlot, v: u16) {
        BigEndian::write_u16(&mut self.buf[slot.at..slot.at + 2], v);
    }

    /// Patch `slot` with the number of bytes written since `start`.
    pub fn patch_length(&mut self, slot: LengthSlot, start: usize) {
        let len = self.pos() - start;
        self.patch_u16(slot, len as u16);
    }

    /// Zero-fill so that the bytes written since `start` become a
    /// multiple of `align`.
    pub fn pad_to_multiple(&mut self, start: usize, align: usize) {
        let len = self.pos() - start;
        self.write_zero((align - len % align) % align);
    }
}

/// Bounds-checked reader over an input slice.
///
/// Reading past the end fails with `TruncatedMessage`; it never panics.
/// The cursor is `Copy`, so lookahead is a cheap copy-and-read.
#[derive(Debug, Clone, Copy)]
pub struct DecodeCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> DecodeCursor<'a> {
    pub fn new(buf: &'a [u8]) -> DecodeCursor<'a> {
        DecodeCursor { buf, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::TruncatedMessage {
                at: self.pos,
                need: n,
                left: self.remaining(),
            });
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        Ok(BigEndian::read_u64(self.take(8)?))
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        self.take(n)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), CodecError> {
        self.take(n).map(|_| ())
    }

    /// Split off the next `n` bytes as a bounded sub-cursor, advancing
    /// this cursor past them. Sub-structures with a declared length are
    /// decoded against such a cursor so they can neither overrun their
    /// span nor leave residue undetected.
    pub fn slice(&mut self, n: usize) -> Result<DecodeCursor<'a>, CodecError> {
        Ok(DecodeCursor::new(self.take(n)?))
    }

    /// Remaining bytes without advancing.
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_fixed_width() {
        let mut buf = vec![];
        let mut w = EncodeCursor::new(&mut buf);
        w.write_u8(0x01);
        w.write_u16(0x0203);
        w.write_u32(0x0405_0607);
        w.write_u64(0x0809_0a0b_0c0d_0e0f);
        let mut r = DecodeCursor::new(&buf);
        assert_eq!(r.read_u8().unwrap(), 0x01);
        assert_eq!(r.read_u16().unwrap(), 0x0203);
        assert_eq!(r.read_u32().unwrap(), 0x0405_0607);
        assert_eq!(r.read_u64().unwrap(), 0x0809_0a0b_0c0d_0e0f);
        assert!(r.is_empty());
    }

    #[test]
    fn patch_length_measures_from_start() {
        let mut buf = vec![0xaa]; // pre-existing caller bytes stay put
        let mut w = EncodeCursor::new(&mut buf);
        let start = w.pos();
        w.write_u16(0xffff);
        let slot = w.reserve_u16();
        w.write_bytes(&[1, 2, 3, 4, 5]);
        w.patch_length(slot, start);
        assert_eq!(buf[0], 0xaa);
        // 2 (tag) + 2 (slot) + 5 (body) = 9
        assert_eq!(&buf[3..5], &[0x00, 0x09]);
    }

    #[test]
    fn pad_to_multiple_modulus() {
        let mut buf = vec![];
        let mut w = EncodeCursor::new(&mut buf);
        w.write_bytes(&[0; 12]);
        w.pad_to_multiple(0, 8);
        assert_eq!(buf.len(), 16);
        let mut buf = vec![];
        let mut w = EncodeCursor::new(&mut buf);
        w.write_bytes(&[0; 8]);
        w.pad_to_multiple(0, 8);
        assert_eq!(buf.len(), 8, "already aligned writes no padding");
    }

    #[test]
    fn reads_past_end_fail_typed() {
        let mut r = DecodeCursor::new(&[1, 2, 3]);
        assert_eq!(r.read_u16().unwrap(), 0x0102);
        let err = r.read_u32().unwrap_err();
        assert_eq!(
            err,
            CodecError::TruncatedMessage {
                at: 2,
                need: 4,
                left: 1
            }
        );
    }

    #[test]
    fn slice_bounds_sub_decoders() {
        let mut r = DecodeCursor::new(&[1, 2, 3, 4]);
        let mut sub = r.slice(2).unwrap();
        assert_eq!(sub.read_u8().unwrap(), 1);
        assert_eq!(sub.read_u8().unwrap(), 2);
        assert!(sub.read_u8().is_err());
        assert_eq!(r.read_u16().unwrap(), 0x0304);
    }
}
