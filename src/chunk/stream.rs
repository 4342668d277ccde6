//! Byte-order aware cursors over chunk payloads.

use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};

use crate::util::{pad4, Endianness, Error, Result};

/// Bounds-checked reader over a payload slice.
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
    endian: Endianness,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8], endian: Endianness) -> Self {
        Self { data, pos: 0, endian }
    }

    /// Current read position.
    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    #[inline]
    pub fn endian(&self) -> Endianness {
        self.endian
    }

    /// Fail with [`Error::TruncatedChunk`] unless `n` more bytes exist.
    pub fn ensure(&self, n: usize) -> Result<()> {
        if n > self.remaining() {
            return Err(Error::TruncatedChunk { needed: n, available: self.remaining() });
        }
        Ok(())
    }

    /// Borrow the next `n` bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.ensure(n)?;
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Borrow `count` elements of `size` bytes, checking the product first.
    pub fn read_array(&mut self, count: usize, size: usize) -> Result<&'a [u8]> {
        let needed = count.checked_mul(size).ok_or(Error::TruncatedChunk {
            needed: usize::MAX,
            available: self.remaining(),
        })?;
        self.read_bytes(needed)
    }

    /// Skip padding up to the next multiple of four.
    pub fn align4(&mut self) -> Result<()> {
        let pad = pad4(self.pos);
        self.read_bytes(pad).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.read_bytes(2)?;
        Ok(match self.endian {
            Endianness::Little => LittleEndian::read_u16(b),
            Endianness::Big => BigEndian::read_u16(b),
        })
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.read_bytes(4)?;
        Ok(match self.endian {
            Endianness::Little => LittleEndian::read_u32(b),
            Endianness::Big => BigEndian::read_u32(b),
        })
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }
}

/// Growable payload writer.
pub struct ByteWriter {
    buf: Vec<u8>,
    endian: Endianness,
}

impl ByteWriter {
    pub fn new(endian: Endianness) -> Self {
        Self { buf: Vec::new(), endian }
    }

    /// Current write position.
    #[inline]
    pub fn pos(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn endian(&self) -> Endianness {
        self.endian
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Zero-pad to the next multiple of four.
    pub fn align4(&mut self) {
        let pad = pad4(self.buf.len());
        self.buf.resize(self.buf.len() + pad, 0);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        match self.endian {
            Endianness::Little => self.buf.write_u16::<LittleEndian>(value)?,
            Endianness::Big => self.buf.write_u16::<BigEndian>(value)?,
        }
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        match self.endian {
            Endianness::Little => self.buf.write_u32::<LittleEndian>(value)?,
            Endianness::Big => self.buf.write_u32::<BigEndian>(value)?,
        }
        Ok(())
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_u32(value as u32)
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_u32(value.to_bits())
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_both_orders() {
        for endian in [Endianness::Little, Endianness::Big] {
            let mut w = ByteWriter::new(endian);
            w.write_u8(7);
            w.align4();
            w.write_u16(0xBEEF).unwrap();
            w.write_i32(-12).unwrap();
            w.write_f32(1.5).unwrap();
            let bytes = w.into_inner();
            assert_eq!(bytes.len(), 14);

            let mut r = ByteCursor::new(&bytes, endian);
            assert_eq!(r.read_u8().unwrap(), 7);
            r.align4().unwrap();
            assert_eq!(r.read_u16().unwrap(), 0xBEEF);
            assert_eq!(r.read_i32().unwrap(), -12);
            assert_eq!(r.read_f32().unwrap(), 1.5);
            assert_eq!(r.remaining(), 0);
        }
    }

    #[test]
    fn test_big_endian_layout() {
        let mut w = ByteWriter::new(Endianness::Big);
        w.write_u32(0x0102_0304).unwrap();
        assert_eq!(w.into_inner(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_truncation() {
        let data = [0u8; 6];
        let mut r = ByteCursor::new(&data, Endianness::Little);
        r.read_u32().unwrap();
        assert!(matches!(
            r.read_u32(),
            Err(Error::TruncatedChunk { needed: 4, available: 2 })
        ));
        assert!(matches!(
            r.read_array(usize::MAX, 2),
            Err(Error::TruncatedChunk { .. })
        ));
    }
}
