use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{DecodeError, Result};
use crate::synth::align_up;
use crate::window::{ByteWindow, Endianness};

/// Sequential, endian-aware reader over a [`ByteWindow`].
///
/// The position never exceeds the window length. Failed reads leave the
/// position where it was.
#[derive(Debug, Clone)]
pub struct ByteCursor<'w> {
    window: &'w ByteWindow,
    pos: u64,
}

impl<'w> ByteCursor<'w> {
    pub fn new(window: &'w ByteWindow) -> Self {
        Self { window, pos: 0 }
    }

    #[inline]
    pub fn window(&self) -> &'w ByteWindow {
        self.window
    }

    #[inline]
    pub fn position(&self) -> u64 {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> u64 {
        self.window.len() - self.pos
    }

    pub fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.window.len() {
            return Err(DecodeError::bounds(pos, 0, self.window.len()));
        }
        self.pos = pos;
        Ok(())
    }

    /// Round the position up to the next multiple of `n`.
    pub fn align_to(&mut self, n: u64) -> Result<()> {
        let aligned = align_up(self.pos, n);
        if aligned > self.window.len() {
            return Err(DecodeError::bounds(self.pos, aligned - self.pos, self.window.len()));
        }
        self.pos = aligned;
        Ok(())
    }

    fn take(&mut self, want: u64) -> Result<&'w [u8]> {
        if want > self.remaining() {
            return Err(DecodeError::bounds(self.pos, want, self.window.len()));
        }
        let start = self.pos as usize;
        self.pos += want;
        Ok(&self.window.bytes()[start..start + want as usize])
    }

    pub fn read_bytes(&mut self, len: u64) -> Result<&'w [u8]> {
        self.take(len)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_u16_with(self.window.order())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_u32_with(self.window.order())
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.read_u64_with(self.window.order())
    }

    pub fn read_u16_with(&mut self, order: Endianness) -> Result<u16> {
        let buf = self.take(2)?;
        Ok(match order {
            Endianness::Little => LittleEndian::read_u16(buf),
            Endianness::Big => BigEndian::read_u16(buf),
        })
    }

    pub fn read_u32_with(&mut self, order: Endianness) -> Result<u32> {
        let buf = self.take(4)?;
        Ok(match order {
            Endianness::Little => LittleEndian::read_u32(buf),
            Endianness::Big => BigEndian::read_u32(buf),
        })
    }

    pub fn read_u64_with(&mut self, order: Endianness) -> Result<u64> {
        let buf = self.take(8)?;
        Ok(match order {
            Endianness::Little => LittleEndian::read_u64(buf),
            Endianness::Big => BigEndian::read_u64(buf),
        })
    }

    /// Length in bytes of the NUL-terminated string at the current position,
    /// not counting the terminator. Does not move the cursor.
    pub fn peek_nul_terminated_len(&self) -> Result<u64> {
        let rest = &self.window.bytes()[self.pos as usize..];
        rest.iter()
            .position(|b| *b == 0)
            .map(|n| n as u64)
            .ok_or_else(|| DecodeError::bounds(self.pos, rest.len() as u64 + 1, self.window.len()))
    }

    /// Read a NUL-terminated string and consume its terminator.
    pub fn read_nul_terminated_string(&mut self) -> Result<String> {
        let len = self.peek_nul_terminated_len()?;
        let raw = self.take(len + 1)?;
        Ok(String::from_utf8_lossy(&raw[..len as usize]).into_owned())
    }
}

// lets binrw-derived headers read straight off a window
impl Read for ByteCursor<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = (buf.len() as u64).min(self.remaining());
        let src = self.take(n).map_err(|e| io::Error::new(io::ErrorKind::UnexpectedEof, e))?;
        buf[..n as usize].copy_from_slice(src);
        Ok(n as usize)
    }
}

impl Seek for ByteCursor<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::Current(d) => self.pos.checked_add_signed(d),
            SeekFrom::End(d) => self.window.len().checked_add_signed(d),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of window")
        })?;
        ByteCursor::seek(self, target)
            .map_err(|e| io::Error::new(io::ErrorKind::UnexpectedEof, e))?;
        Ok(self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn window(bytes: &[u8], order: Endianness) -> ByteWindow {
        ByteWindow::new(bytes.to_vec(), order)
    }

    #[test]
    fn reads_follow_window_order() {
        let le = window(&hex::decode("efbeadde0100").unwrap(), Endianness::Little);
        let mut c = ByteCursor::new(&le);
        assert_eq!(c.read_u32().unwrap(), 0xDEADBEEF);
        assert_eq!(c.read_u16().unwrap(), 1);
        assert_eq!(c.remaining(), 0);

        let be = window(&hex::decode("deadbeef00000000cafebabe").unwrap(), Endianness::Big);
        let mut c = ByteCursor::new(&be);
        assert_eq!(c.read_u32().unwrap(), 0xDEADBEEF);
        assert_eq!(c.read_u64().unwrap(), 0xCAFEBABE);
    }

    #[test]
    fn explicit_order_overrides_window() {
        let w = window(&[0x12, 0x34], Endianness::Little);
        let mut c = ByteCursor::new(&w);
        assert_eq!(c.read_u16_with(Endianness::Big).unwrap(), 0x1234);
    }

    #[test]
    fn out_of_bounds_read_keeps_position() {
        let w = window(&[1, 2, 3], Endianness::Little);
        let mut c = ByteCursor::new(&w);
        c.read_u8().unwrap();
        let err = c.read_u32().unwrap_err();
        assert_eq!(err, DecodeError::bounds(1, 4, 3));
        assert_eq!(c.position(), 1);
        assert_eq!(c.read_u16().unwrap(), 0x0302);
    }

    #[test]
    fn align_never_moves_backwards() {
        let w = window(&[0u8; 16], Endianness::Little);
        let mut c = ByteCursor::new(&w);
        c.align_to(4).unwrap();
        assert_eq!(c.position(), 0);
        c.seek(5).unwrap();
        c.align_to(4).unwrap();
        assert_eq!(c.position(), 8);
        c.align_to(4).unwrap();
        assert_eq!(c.position(), 8);
        c.seek(13).unwrap();
        assert!(c.align_to(32).is_err());
        assert_eq!(c.position(), 13);
    }

    #[test]
    fn nul_terminated_strings() {
        let w = window(b"\0abc\0xyz", Endianness::Little);
        let mut c = ByteCursor::new(&w);
        assert_eq!(c.read_nul_terminated_string().unwrap(), "");
        assert_eq!(c.position(), 1);
        assert_eq!(c.read_nul_terminated_string().unwrap(), "abc");
        assert_eq!(c.position(), 5);
        assert!(matches!(
            c.read_nul_terminated_string(),
            Err(DecodeError::BoundsViolation { .. })
        ));
        assert_eq!(c.position(), 5);
    }

    #[test]
    fn seek_is_bounded() {
        let w = window(&[0u8; 4], Endianness::Little);
        let mut c = ByteCursor::new(&w);
        c.seek(4).unwrap();
        assert_eq!(c.remaining(), 0);
        assert!(c.seek(5).is_err());
    }

    #[test]
    fn io_read_stops_at_window_end() {
        let w = window(&[1, 2, 3], Endianness::Little);
        let mut c = ByteCursor::new(&w);
        let mut buf = [0u8; 8];
        assert_eq!(Read::read(&mut c, &mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert_eq!(Read::read(&mut c, &mut buf).unwrap(), 0);
    }
}
