use std::{
    io::{Seek, SeekFrom, Write},
    mem::size_of,
};

use anyhow::Result;
use strum::{Display, EnumString, IntoStaticStr};
use zerocopy::{AsBytes, BigEndian, FromBytes, FromZeroes, U16, U32};

use crate::error::XfbinError;

/// Header of a chunk record inside a page.
#[derive(Clone, Debug, Default, PartialEq, FromBytes, FromZeroes, AsBytes)]
#[repr(C)]
pub struct ChunkDescriptor {
    pub size: U32<BigEndian>,
    /// Page-local slot of the record's chunk map.
    pub map_index: U32<BigEndian>,
    pub version: U16<BigEndian>,
    pub unk: U16<BigEndian>,
}

impl ChunkDescriptor {
    pub const SIZE: usize = size_of::<Self>();

    pub fn new(map_index: u32, version: u16) -> Self {
        Self {
            size: U32::new(0),
            map_index: U32::new(map_index),
            version: U16::new(version),
            unk: U16::new(0),
        }
    }

    /// Splits `data` into the record header, its payload and the bytes following the record.
    /// `offset` is the position of `data` in the file and only used for error reporting.
    pub fn slice(data: &[u8], offset: u64) -> Result<(&Self, &[u8], &[u8])> {
        let header = Self::ref_from_prefix(data).ok_or(XfbinError::OutOfBounds {
            offset,
            len: Self::SIZE as u64,
            size: data.len() as u64,
        })?;
        let start = Self::SIZE;
        let end = start + header.size.get() as usize;
        if end > data.len() {
            return Err(XfbinError::OutOfBounds {
                offset: offset + start as u64,
                len: header.size.get() as u64,
                size: (data.len() - start) as u64,
            }
            .into());
        }
        Ok((header, &data[start..end], &data[end..]))
    }

    pub fn write<W, CB>(&self, w: &mut W, mut cb: CB) -> Result<()>
    where
        W: Write + Seek,
        CB: FnMut(&mut W) -> Result<()>,
    {
        // Skip over the header
        let header_pos = w.stream_position()?;
        let data_pos = header_pos + Self::SIZE as u64;
        w.seek(SeekFrom::Start(data_pos))?;

        // Write the payload and determine the size
        cb(w)?;
        let end_pos = w.stream_position()?;

        // Return to the start of the record and write the header
        w.seek(SeekFrom::Start(header_pos))?;
        let mut out = self.clone();
        let size = u32::try_from(end_pos - data_pos).map_err(|_| {
            XfbinError::Value(format!("chunk payload too large: {:#x}", end_pos - data_pos))
        })?;
        out.size.set(size);
        w.write_all(out.as_bytes())?;

        // Seek to the end
        w.seek(SeekFrom::Start(end_pos))?;
        Ok(())
    }
}

/// Known chunk type tags.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, EnumString, IntoStaticStr, Display)]
pub enum ChunkType {
    #[strum(serialize = "nuccChunkNull")]
    Null,
    #[strum(serialize = "nuccChunkPage")]
    Page,
    #[strum(serialize = "nuccChunkIndex")]
    Index,
    #[strum(serialize = "nuccChunkBinary")]
    Binary,
    #[strum(serialize = "nuccChunkClump")]
    Clump,
    #[strum(serialize = "nuccChunkCoord")]
    Coord,
    #[strum(serialize = "nuccChunkModel")]
    Model,
    #[strum(serialize = "nuccChunkModelHit")]
    ModelHit,
    #[strum(serialize = "nuccChunkMaterial")]
    Material,
    #[strum(serialize = "nuccChunkTexture")]
    Texture,
    #[strum(serialize = "nuccChunkDynamics")]
    Dynamics,
    #[strum(serialize = "nuccChunkAnm")]
    Anm,
    #[strum(serialize = "nuccChunkCamera")]
    Camera,
    #[strum(serialize = "nuccChunkLightDirc")]
    LightDirc,
    #[strum(serialize = "nuccChunkLightPoint")]
    LightPoint,
    #[strum(serialize = "nuccChunkAmbient")]
    Ambient,
}

impl ChunkType {
    /// Parses a type tag, returning `None` for tags outside the known set.
    pub fn parse(type_name: &str) -> Option<Self> { type_name.parse().ok() }

    /// Null, Page and Index only frame pages and never appear in the chunk graph.
    #[inline]
    pub fn is_framing(self) -> bool {
        matches!(self, ChunkType::Null | ChunkType::Page | ChunkType::Index)
    }

    #[inline]
    pub fn name(self) -> &'static str { self.into() }
}

/// Whether `type_name` is one of the page framing tags.
pub fn is_framing_type(type_name: &str) -> bool {
    ChunkType::parse(type_name).map_or(false, ChunkType::is_framing)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::error::{error_kind, ErrorKind};

    #[test]
    fn descriptor_layout() {
        let mut cursor = Cursor::new(Vec::new());
        ChunkDescriptor::new(3, 0x79)
            .write(&mut cursor, |w| {
                w.write_all(&[0xAA; 5])?;
                Ok(())
            })
            .unwrap();
        let data = cursor.into_inner();
        assert_eq!(&data[..12], &[0, 0, 0, 5, 0, 0, 0, 3, 0, 0x79, 0, 0]);

        let (header, payload, rest) = ChunkDescriptor::slice(&data, 0).unwrap();
        assert_eq!(header.map_index.get(), 3);
        assert_eq!(payload, &[0xAA; 5]);
        assert!(rest.is_empty());
    }

    #[test]
    fn truncated_payload() {
        let data = [0, 0, 0, 8, 0, 0, 0, 1, 0, 0x79, 0, 0, 1, 2];
        let err = ChunkDescriptor::slice(&data, 0x40).unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::Structural));
    }

    #[test]
    fn type_tags() {
        assert_eq!(ChunkType::parse("nuccChunkModelHit"), Some(ChunkType::ModelHit));
        assert_eq!(ChunkType::Anm.name(), "nuccChunkAnm");
        assert_eq!(ChunkType::parse("nuccChunkSprite"), None);
        assert!(is_framing_type("nuccChunkPage"));
        assert!(!is_framing_type("nuccChunkCoord"));
    }
}
