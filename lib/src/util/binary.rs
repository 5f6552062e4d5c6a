use std::{
    io,
    io::{Cursor, Read, Seek, SeekFrom, Write},
    ops::{Deref, DerefMut},
};

use anyhow::Result;
use binrw::{BinRead, BinWrite, Endian};
use half::f16;

use crate::error::XfbinError;

/// Fixed-width value that can be read from and written to a [`BinaryCursor`].
pub trait Primitive: Copy {
    const SIZE: usize;

    fn decode(bytes: &[u8], endian: Endian) -> Self;

    fn encode(self, endian: Endian, out: &mut [u8]);
}

macro_rules! impl_primitive {
    ($($ty:ty),* $(,)?) => {$(
        impl Primitive for $ty {
            const SIZE: usize = std::mem::size_of::<$ty>();

            #[inline]
            fn decode(bytes: &[u8], endian: Endian) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                buf.copy_from_slice(&bytes[..Self::SIZE]);
                match endian {
                    Endian::Big => <$ty>::from_be_bytes(buf),
                    Endian::Little => <$ty>::from_le_bytes(buf),
                }
            }

            #[inline]
            fn encode(self, endian: Endian, out: &mut [u8]) {
                let buf = match endian {
                    Endian::Big => self.to_be_bytes(),
                    Endian::Little => self.to_le_bytes(),
                };
                out[..Self::SIZE].copy_from_slice(&buf);
            }
        }
    )*};
}

impl_primitive!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl Primitive for f16 {
    const SIZE: usize = 2;

    #[inline]
    fn decode(bytes: &[u8], endian: Endian) -> Self { f16::from_bits(u16::decode(bytes, endian)) }

    #[inline]
    fn encode(self, endian: Endian, out: &mut [u8]) { self.to_bits().encode(endian, out) }
}

/// Text encoding used for string reads and writes.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum TextEncoding {
    #[default]
    Utf8,
    /// One byte per character, code points 0..=255.
    Latin1,
}

/// Endian-aware cursor over a growable byte buffer.
///
/// Reads past the end of the buffer fail with [`XfbinError::OutOfBounds`]; writes past the end
/// grow the buffer.
#[derive(Clone, Debug)]
pub struct BinaryCursor {
    inner: Cursor<Vec<u8>>,
    endian: Endian,
    encoding: TextEncoding,
}

impl Default for BinaryCursor {
    fn default() -> Self { Self::new(Vec::new(), Endian::Big) }
}

impl BinaryCursor {
    pub fn new(data: Vec<u8>, endian: Endian) -> Self {
        Self { inner: Cursor::new(data), endian, encoding: TextEncoding::Utf8 }
    }

    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    #[inline]
    pub fn endian(&self) -> Endian { self.endian }

    #[inline]
    pub fn set_endian(&mut self, endian: Endian) { self.endian = endian; }

    #[inline]
    pub fn pos(&self) -> u64 { self.inner.position() }

    #[inline]
    pub fn len(&self) -> u64 { self.inner.get_ref().len() as u64 }

    #[inline]
    pub fn is_empty(&self) -> bool { self.inner.get_ref().is_empty() }

    #[inline]
    pub fn eof(&self) -> bool { self.pos() >= self.len() }

    #[inline]
    pub fn remaining(&self) -> u64 { self.len().saturating_sub(self.pos()) }

    pub fn buffer(&self) -> &[u8] { self.inner.get_ref() }

    pub fn into_inner(self) -> Vec<u8> { self.inner.into_inner() }

    /// Moves the cursor to an absolute position. Positions past the end are allowed; the next
    /// read fails, the next write pads with zeros.
    #[inline]
    pub fn seek_to(&mut self, pos: u64) { self.inner.set_position(pos); }

    pub fn skip(&mut self, count: u64) -> Result<()> {
        self.check(count)?;
        self.inner.set_position(self.pos() + count);
        Ok(())
    }

    fn check(&self, len: u64) -> Result<(), XfbinError> {
        let offset = self.pos();
        match offset.checked_add(len) {
            Some(end) if end <= self.len() => Ok(()),
            _ => Err(XfbinError::OutOfBounds { offset, len, size: self.len() }),
        }
    }

    /// Returns a guard that restores the current position when dropped.
    pub fn save_pos(&mut self) -> PosGuard<'_> {
        let pos = self.pos();
        PosGuard { cursor: self, pos }
    }

    /// Seeks to `pos`, runs `f`, then restores the previous position even if `f` failed.
    pub fn with_pos<T, F>(&mut self, pos: u64, f: F) -> Result<T>
    where F: FnOnce(&mut Self) -> Result<T> {
        let mut guard = self.save_pos();
        guard.seek_to(pos);
        f(&mut guard)
    }

    pub fn read<T: Primitive>(&mut self) -> Result<T> {
        self.check(T::SIZE as u64)?;
        let start = self.pos() as usize;
        let value = T::decode(&self.inner.get_ref()[start..start + T::SIZE], self.endian);
        self.inner.set_position((start + T::SIZE) as u64);
        Ok(value)
    }

    pub fn read_vec<T: Primitive>(&mut self, count: usize) -> Result<Vec<T>> {
        self.check((count * T::SIZE) as u64)?;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.read::<T>()?);
        }
        Ok(out)
    }

    pub fn read_array<T: Primitive, const N: usize>(&mut self) -> Result<[T; N]> {
        self.check((N * T::SIZE) as u64)?;
        let start = self.pos() as usize;
        let data = &self.inner.get_ref()[start..start + N * T::SIZE];
        let out = std::array::from_fn(|i| T::decode(&data[i * T::SIZE..], self.endian));
        self.inner.set_position((start + N * T::SIZE) as u64);
        Ok(out)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        self.check(len as u64)?;
        let start = self.pos() as usize;
        let out = self.inner.get_ref()[start..start + len].to_vec();
        self.inner.set_position((start + len) as u64);
        Ok(out)
    }

    fn decode_text(&self, bytes: &[u8], offset: u64) -> Result<String> {
        match self.encoding {
            TextEncoding::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|e| {
                anyhow::Error::from(XfbinError::malformed(
                    "string",
                    offset,
                    format!("invalid UTF-8: {e}"),
                ))
            }),
            TextEncoding::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
        }
    }

    fn encode_text(&self, text: &str) -> Result<Vec<u8>> {
        match self.encoding {
            TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
            TextEncoding::Latin1 => text
                .chars()
                .map(|c| {
                    u8::try_from(u32::from(c)).map_err(|_| {
                        anyhow::Error::from(XfbinError::Value(format!(
                            "character {c:?} is not representable"
                        )))
                    })
                })
                .collect(),
        }
    }

    /// Reads `len` bytes as a string, stopping at the first NUL.
    pub fn read_str(&mut self, len: usize) -> Result<String> {
        let offset = self.pos();
        let bytes = self.read_bytes(len)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        self.decode_text(&bytes[..end], offset)
    }

    /// Reads a NUL-terminated string, consuming the terminator.
    pub fn read_cstr(&mut self) -> Result<String> { self.read_str_until(&[0]) }

    /// Reads until `token` is found, consuming the token but not returning it.
    pub fn read_str_until(&mut self, token: &[u8]) -> Result<String> {
        let offset = self.pos();
        let data = &self.inner.get_ref()[offset.min(self.len()) as usize..];
        let end = data.windows(token.len().max(1)).position(|w| w == token).ok_or(
            XfbinError::OutOfBounds { offset, len: data.len() as u64 + 1, size: self.len() },
        )?;
        let bytes = data[..end].to_vec();
        self.inner.set_position(offset + (end + token.len()) as u64);
        self.decode_text(&bytes, offset)
    }

    /// Reads a structured record through its [`BinRead`] implementation.
    pub fn read_struct<T>(&mut self) -> Result<T>
    where
        T: BinRead,
        for<'a> T::Args<'a>: Default,
    {
        let offset = self.pos();
        let size = self.len();
        let endian = self.endian;
        T::read_options(&mut self.inner, endian, Default::default())
            .map_err(|e| map_binrw_error(e, offset, size))
    }

    pub fn write<T: Primitive>(&mut self, value: T) -> Result<()> {
        let mut buf = [0u8; 16];
        value.encode(self.endian, &mut buf);
        self.write_bytes(&buf[..T::SIZE])
    }

    pub fn write_slice<T: Primitive>(&mut self, values: &[T]) -> Result<()> {
        for &value in values {
            self.write(value)?;
        }
        Ok(())
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.inner.write_all(data)?;
        Ok(())
    }

    /// Writes `text` into exactly `len` bytes, padding with NULs or truncating.
    pub fn write_str_fixed(&mut self, text: &str, len: usize) -> Result<()> {
        let mut bytes = self.encode_text(text)?;
        bytes.resize(len, 0);
        self.write_bytes(&bytes)
    }

    pub fn write_cstr(&mut self, text: &str) -> Result<()> {
        let mut bytes = self.encode_text(text)?;
        if bytes.contains(&0) {
            return Err(XfbinError::Value(format!("string {text:?} contains NUL")).into());
        }
        bytes.push(0);
        self.write_bytes(&bytes)
    }

    /// Writes a structured record through its [`BinWrite`] implementation.
    pub fn write_struct<T>(&mut self, value: &T) -> Result<()>
    where
        T: BinWrite,
        for<'a> T::Args<'a>: Default,
    {
        let endian = self.endian;
        value.write_options(&mut self.inner, endian, Default::default())?;
        Ok(())
    }

    /// Advances the cursor to the next multiple of `alignment`, returning the bytes skipped.
    pub fn align_pos(&mut self, alignment: u64) -> Result<u64> {
        let skip = padding(self.pos(), alignment);
        self.skip(skip)?;
        Ok(skip)
    }

    /// Writes zeros up to the next multiple of `alignment`, returning the bytes padded.
    pub fn align(&mut self, alignment: u64) -> Result<u64> {
        let pad = padding(self.pos(), alignment);
        self.write_bytes(&vec![0u8; pad as usize])?;
        Ok(pad)
    }
}

#[inline]
pub fn padding(pos: u64, alignment: u64) -> u64 {
    if alignment == 0 {
        return 0;
    }
    (alignment - pos % alignment) % alignment
}

#[inline]
pub fn align_up(pos: u64, alignment: u64) -> u64 { pos + padding(pos, alignment) }

fn map_binrw_error(err: binrw::Error, offset: u64, size: u64) -> anyhow::Error {
    match err {
        binrw::Error::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            XfbinError::OutOfBounds { offset, len: size.saturating_sub(offset) + 1, size }.into()
        }
        e => XfbinError::malformed("record", offset, e.to_string()).into(),
    }
}

impl Read for BinaryCursor {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> { self.inner.read(buf) }
}

impl Write for BinaryCursor {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> { self.inner.write(buf) }

    fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

impl Seek for BinaryCursor {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> { self.inner.seek(pos) }
}

/// Restores the cursor position it was created at when dropped.
pub struct PosGuard<'a> {
    cursor: &'a mut BinaryCursor,
    pos: u64,
}

impl Deref for PosGuard<'_> {
    type Target = BinaryCursor;

    fn deref(&self) -> &Self::Target { self.cursor }
}

impl DerefMut for PosGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target { self.cursor }
}

impl Drop for PosGuard<'_> {
    fn drop(&mut self) { self.cursor.seek_to(self.pos); }
}
