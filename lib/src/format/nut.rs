//! `NTP3` texture container embedded in texture chunks.
use anyhow::{ensure, Context, Result};
use binrw::{binrw, Endian};
use serde_derive::Serialize;
use strum::{Display, FromRepr};

use crate::{
    error::XfbinError,
    format::FourCC,
    util::binary::{align_up, padding, BinaryCursor},
};

pub const K_NUT_MAGIC: FourCC = FourCC(*b"NTP3");
pub const K_NUT_VERSION: u16 = 0x0100;
pub const K_EXT_MAGIC: FourCC = FourCC(*b"eXt\0");
pub const K_GIDX_MAGIC: FourCC = FourCC(*b"GIDX");
/// Cube map bit of `cubemap_format`, shared with DDS `caps2`.
pub const K_NUT_CUBEMAP: u32 = 0x200;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, FromRepr, Display, Serialize)]
#[repr(u8)]
pub enum ENutPixelFormat {
    Dxt1 = 0,
    Dxt3 = 1,
    Dxt5 = 2,
    A1R5G5B5 = 6,
    A4R4G4B4 = 7,
    R5G6B5 = 8,
    A8B8G8R8 = 14,
    A8R8G8B8 = 17,
    Ati1 = 21,
    Ati2 = 22,
}

impl ENutPixelFormat {
    /// Bytes per 4x4 block for block-compressed formats.
    pub fn block_size(self) -> Option<usize> {
        match self {
            ENutPixelFormat::Dxt1 | ENutPixelFormat::Ati1 => Some(8),
            ENutPixelFormat::Dxt3 | ENutPixelFormat::Dxt5 | ENutPixelFormat::Ati2 => Some(16),
            _ => None,
        }
    }

    /// Bytes per pixel for uncompressed formats.
    pub fn pixel_size(self) -> Option<usize> {
        match self {
            ENutPixelFormat::A1R5G5B5 | ENutPixelFormat::A4R4G4B4 | ENutPixelFormat::R5G6B5 => {
                Some(2)
            }
            ENutPixelFormat::A8B8G8R8 | ENutPixelFormat::A8R8G8B8 => Some(4),
            _ => None,
        }
    }

    #[inline]
    pub fn is_compressed(self) -> bool { self.block_size().is_some() }

    /// Unpadded size of mip `level` of a `width`x`height` surface.
    pub fn mip_size(self, width: u32, height: u32, level: u32) -> usize {
        let w = (width >> level).max(1) as usize;
        let h = (height >> level).max(1) as usize;
        match (self.block_size(), self.pixel_size()) {
            (Some(block), _) => ((w + 3) / 4) * ((h + 3) / 4) * block,
            (_, Some(pixel)) => w * h * pixel,
            _ => 0,
        }
    }
}

#[binrw]
#[derive(Clone, Debug, Default)]
struct SNutHeader {
    version: u16,
    #[brw(pad_after = 8)]
    texture_count: u16,
}

#[binrw]
#[derive(Clone, Debug, Default)]
struct SNutTextureHeader {
    total_size: u32,
    #[brw(pad_before = 4)]
    data_size: u32,
    header_size: u16,
    #[brw(pad_before = 3)]
    mipmap_count: u8,
    #[brw(pad_before = 1)]
    pixel_format: u8,
    width: u16,
    height: u16,
    #[brw(pad_before = 4)]
    cubemap_format: u32,
    #[brw(pad_after = 8)]
    cube_face_size: [u32; 2],
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NutTexture {
    pub pixel_format: ENutPixelFormat,
    pub width: u16,
    pub height: u16,
    pub cubemap_format: u32,
    pub hash_id: u32,
    /// Mip count as stored. Some single-mip textures store zero.
    pub mipmap_count: u8,
    /// Size of every mip level of one face, as stored.
    pub mipmap_sizes: Vec<u32>,
    /// Faces one after another, each holding its mip chain.
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl NutTexture {
    #[inline]
    pub fn is_cube_map(&self) -> bool { self.cubemap_format & K_NUT_CUBEMAP != 0 }

    #[inline]
    pub fn face_count(&self) -> usize {
        if self.is_cube_map() {
            6
        } else {
            1
        }
    }

    #[inline]
    pub fn face_size(&self) -> usize { self.data.len() / self.face_count() }

    /// `align16(0x30 + mip table) + 0x20`; the mip table only exists for multi-mip textures.
    pub fn header_size(&self) -> u16 {
        let mips = self.mipmap_sizes.len();
        let table = if mips > 1 { 4 * mips as u64 } else { 0 };
        (align_up(0x30 + table, 16) + 0x20) as u16
    }

    /// Mip slices of face `face`.
    pub fn mips(&self, face: usize) -> impl Iterator<Item = &[u8]> + '_ {
        let base = face * self.face_size();
        self.mipmap_sizes.iter().scan(base, move |pos, &size| {
            let start = (*pos).min(self.data.len());
            let end = (start + size as usize).min(self.data.len());
            *pos += size as usize;
            Some(&self.data[start..end])
        })
    }

    fn validate(&self) -> Result<()> {
        let expected = self.mipmap_sizes.iter().map(|&s| s as usize).sum::<usize>()
            * self.face_count();
        if expected != self.data.len() {
            return Err(XfbinError::Value(format!(
                "texture data is {:#x} bytes, mip sizes add up to {:#x}",
                self.data.len(),
                expected
            ))
            .into());
        }
        ensure!(
            (1..=u8::MAX as usize).contains(&self.mipmap_sizes.len()),
            XfbinError::Value(format!("invalid mip count {}", self.mipmap_sizes.len()))
        );
        let mips = self.mipmap_sizes.len();
        ensure!(
            self.mipmap_count as usize == mips || (self.mipmap_count == 0 && mips == 1),
            XfbinError::Value(format!("mip count {} for {mips} mip sizes", self.mipmap_count))
        );
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Nut {
    pub version: u16,
    pub textures: Vec<NutTexture>,
}

impl Default for Nut {
    fn default() -> Self { Self { version: K_NUT_VERSION, textures: Vec::new() } }
}

impl Nut {
    pub fn read(cursor: &mut BinaryCursor) -> Result<Self> {
        let start = cursor.pos();
        let magic = FourCC(cursor.read_array()?);
        if magic != K_NUT_MAGIC {
            return Err(XfbinError::BadMagic {
                offset: start,
                expected: K_NUT_MAGIC.to_string(),
                found: magic.to_string(),
            }
            .into());
        }
        let header: SNutHeader = cursor.read_struct()?;

        let mut headers = Vec::with_capacity(header.texture_count as usize);
        for i in 0..header.texture_count {
            let header_pos = cursor.pos();
            let tex: SNutTextureHeader = cursor
                .read_struct()
                .with_context(|| format!("While reading NUT texture header {i}"))?;
            let mipmap_sizes = if tex.mipmap_count > 1 {
                let sizes = cursor.read_vec::<u32>(tex.mipmap_count as usize)?;
                cursor.skip(padding(cursor.pos() - header_pos, 16))?;
                sizes
            } else {
                let faces = if tex.cubemap_format & K_NUT_CUBEMAP != 0 { 6 } else { 1 };
                vec![tex.data_size / faces]
            };
            let ext = FourCC(cursor.read_array()?);
            if ext != K_EXT_MAGIC {
                return Err(XfbinError::BadMagic {
                    offset: cursor.pos() - 4,
                    expected: K_EXT_MAGIC.to_string(),
                    found: ext.to_string(),
                }
                .into());
            }
            cursor.skip(12)?;
            let gidx = FourCC(cursor.read_array()?);
            if gidx != K_GIDX_MAGIC {
                return Err(XfbinError::BadMagic {
                    offset: cursor.pos() - 4,
                    expected: K_GIDX_MAGIC.to_string(),
                    found: gidx.to_string(),
                }
                .into());
            }
            cursor.skip(4)?;
            let hash_id = cursor.read::<u32>()?;
            cursor.skip(4)?;
            if cursor.pos() - header_pos != tex.header_size as u64 {
                return Err(XfbinError::malformed(
                    "NUT texture header",
                    header_pos,
                    format!(
                        "header is {:#x} bytes, expected {:#x}",
                        cursor.pos() - header_pos,
                        tex.header_size
                    ),
                )
                .into());
            }
            let pixel_format = ENutPixelFormat::from_repr(tex.pixel_format)
                .ok_or_else(|| XfbinError::unsupported("NUT pixel format", tex.pixel_format))?;
            headers.push((tex, pixel_format, mipmap_sizes, hash_id));
        }

        let mut textures = Vec::with_capacity(headers.len());
        for (tex, pixel_format, mipmap_sizes, hash_id) in headers {
            let data = cursor.read_bytes(tex.data_size as usize)?;
            let texture = NutTexture {
                pixel_format,
                width: tex.width,
                height: tex.height,
                cubemap_format: tex.cubemap_format,
                hash_id,
                mipmap_count: tex.mipmap_count,
                mipmap_sizes,
                data,
            };
            texture.validate()?;
            textures.push(texture);
        }
        Ok(Self { version: header.version, textures })
    }

    pub fn write(&self, cursor: &mut BinaryCursor) -> Result<()> {
        let texture_count = u16::try_from(self.textures.len())
            .map_err(|_| XfbinError::Value(format!("{} textures", self.textures.len())))?;
        cursor.write_bytes(&K_NUT_MAGIC.0)?;
        cursor.write_struct(&SNutHeader { version: self.version, texture_count })?;
        for texture in &self.textures {
            texture.validate()?;
            let header_size = texture.header_size();
            let face_size = if texture.is_cube_map() { texture.face_size() as u32 } else { 0 };
            let header_start = cursor.pos();
            cursor.write_struct(&SNutTextureHeader {
                total_size: header_size as u32 + texture.data.len() as u32,
                data_size: texture.data.len() as u32,
                header_size,
                mipmap_count: texture.mipmap_count,
                pixel_format: texture.pixel_format as u8,
                width: texture.width,
                height: texture.height,
                cubemap_format: texture.cubemap_format,
                cube_face_size: [face_size, face_size],
            })?;
            if texture.mipmap_sizes.len() > 1 {
                cursor.write_slice(&texture.mipmap_sizes)?;
                let pad = padding(cursor.pos() - header_start, 16);
                cursor.write_bytes(&vec![0; pad as usize])?;
            }
            cursor.write_bytes(&K_EXT_MAGIC.0)?;
            cursor.write_slice(&[0x20u32, 0x10, 0])?;
            cursor.write_bytes(&K_GIDX_MAGIC.0)?;
            cursor.write_slice(&[0x10u32, texture.hash_id, 0])?;
            debug_assert_eq!(cursor.pos() - header_start, header_size as u64);
        }
        for texture in &self.textures {
            cursor.write_bytes(&texture.data)?;
        }
        Ok(())
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::read(&mut BinaryCursor::new(data.to_vec(), Endian::Big))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut cursor = BinaryCursor::new(Vec::new(), Endian::Big);
        self.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }
}
