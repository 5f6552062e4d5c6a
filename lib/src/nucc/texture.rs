use anyhow::{Context, Result};
use binrw::binrw;
use serde_derive::Serialize;

use crate::{
    error::XfbinError,
    format::{chunk::ChunkType, nut::Nut},
    nucc::{DecodeContext, EncodeContext, NuccChunk},
    util::{binary::BinaryCursor, dds},
};

#[binrw]
#[derive(Copy, Clone, Debug, Default)]
struct STextureHeader {
    field00: u16,
    width: u16,
    height: u16,
    field06: u16,
    nut_size: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Texture {
    pub field00: u16,
    pub width: u16,
    pub height: u16,
    pub field06: u16,
    /// `None` when the pixels live in another container.
    pub nut: Option<Nut>,
}

impl Texture {
    /// Builds a texture from a DDS file.
    pub fn from_dds(data: &[u8]) -> Result<Self> {
        let texture = dds::read_dds(data)?;
        Ok(Self {
            field00: 0,
            width: texture.width,
            height: texture.height,
            field06: 0,
            nut: Some(Nut { textures: vec![texture], ..Default::default() }),
        })
    }

    /// Builds a replacement for this texture from a DDS file. Header fields, the NUT version
    /// and the GIDX hash carry over.
    pub fn import_dds(&self, data: &[u8]) -> Result<Self> {
        let mut texture = Self::from_dds(data)?;
        texture.field00 = self.field00;
        texture.field06 = self.field06;
        if let (Some(old), Some(new)) = (&self.nut, &mut texture.nut) {
            new.version = old.version;
            if let (Some(old), Some(new)) = (old.textures.first(), new.textures.first_mut()) {
                new.hash_id = old.hash_id;
            }
        }
        Ok(texture)
    }

    /// Converts the first NUT texture to a DDS file.
    pub fn to_dds(&self) -> Result<Vec<u8>> {
        let texture = self
            .nut
            .as_ref()
            .and_then(|nut| nut.textures.first())
            .ok_or_else(|| XfbinError::Value("texture holds no pixel data".into()))?;
        let mut out = Vec::new();
        dds::write_dds(&mut out, texture)?;
        Ok(out)
    }

    #[inline]
    pub fn is_reference(&self) -> bool { self.nut.is_none() }
}

impl NuccChunk for Texture {
    const TYPE: ChunkType = ChunkType::Texture;

    fn read_data(cursor: &mut BinaryCursor, _ctx: &mut DecodeContext) -> Result<Self> {
        let header: STextureHeader = cursor.read_struct()?;
        let nut = match header.nut_size {
            0 => None,
            size => {
                let data = cursor.read_bytes(size as usize)?;
                Some(Nut::from_bytes(&data).context("While reading NUT")?)
            }
        };
        Ok(Self {
            field00: header.field00,
            width: header.width,
            height: header.height,
            field06: header.field06,
            nut,
        })
    }

    fn write_data(&self, cursor: &mut BinaryCursor, _ctx: &mut EncodeContext) -> Result<()> {
        let nut = match &self.nut {
            Some(nut) => nut.to_bytes()?,
            None => Vec::new(),
        };
        cursor.write_struct(&STextureHeader {
            field00: self.field00,
            width: self.width,
            height: self.height,
            field06: self.field06,
            nut_size: nut.len() as u32,
        })?;
        cursor.write_bytes(&nut)
    }
}

#[cfg(test)]
mod tests {
    use binrw::Endian;

    use super::*;
    use crate::{
        error::{error_kind, ErrorKind},
        format::nut::{ENutPixelFormat, NutTexture},
        nucc::Xfbin,
    };

    fn dxt1() -> Texture {
        let nut = Nut {
            textures: vec![NutTexture {
                pixel_format: ENutPixelFormat::Dxt1,
                width: 4,
                height: 4,
                cubemap_format: 0,
                hash_id: 0,
                mipmap_count: 1,
                mipmap_sizes: vec![16],
                // One 8-byte block, zero padded
                data: [[0x5A; 8], [0; 8]].concat(),
            }],
            ..Default::default()
        };
        Texture { width: 4, height: 4, nut: Some(nut), ..Default::default() }
    }

    #[test]
    fn nut_is_embedded_with_its_size() {
        let texture = dxt1();
        let xfbin = Xfbin::new();
        let mut ctx = EncodeContext::new(&xfbin);
        let mut cursor = BinaryCursor::default();
        texture.write_data(&mut cursor, &mut ctx).unwrap();
        assert_eq!(&cursor.buffer()[12..16], b"NTP3");

        let mut cursor = BinaryCursor::new(cursor.into_inner(), Endian::Big);
        let mut dctx = DecodeContext::new(&[], &[]);
        assert_eq!(Texture::read_data(&mut cursor, &mut dctx).unwrap(), texture);
    }

    #[test]
    fn dds_round_trip() {
        let texture = dxt1();
        let dds = texture.to_dds().unwrap();
        assert_eq!(&dds[..4], b"DDS ");
        let back = Texture::from_dds(&dds).unwrap();
        assert_eq!(back.nut, texture.nut);
        assert_eq!((back.width, back.height), (4, 4));
    }

    #[test]
    fn import_keeps_the_texture_id() {
        let mut old = dxt1();
        old.field00 = 2;
        old.field06 = 1;
        if let Some(nut) = &mut old.nut {
            nut.textures[0].hash_id = 0x4C1E_0F2A;
        }
        let dds = dxt1().to_dds().unwrap();
        let texture = old.import_dds(&dds).unwrap();
        assert_eq!((texture.field00, texture.field06), (2, 1));
        assert_eq!(texture.nut, old.nut);

        let data = texture.nut.unwrap().to_bytes().unwrap();
        let nut = Nut::from_bytes(&data).unwrap();
        assert_eq!(nut.textures[0].hash_id, 0x4C1E_0F2A);
    }

    #[test]
    fn reference_only_texture_has_no_dds() {
        let texture = Texture::default();
        assert!(texture.is_reference());
        let err = texture.to_dds().unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::Value));
    }
}
