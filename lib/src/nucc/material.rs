use anyhow::Result;
use binrw::binrw;
use bitflags::bitflags;
use serde_derive::Serialize;

use crate::{
    error::XfbinError,
    format::chunk::ChunkType,
    nucc::{ChunkId, DecodeContext, EncodeContext, NuccChunk},
    util::binary::BinaryCursor,
};

bitflags! {
    /// Optional material fields present in the record.
    #[binrw]
    #[derive(Serialize)]
    pub struct MaterialFlags: u32 {
        const UV0 = 0x01;
        const UV1 = 0x02;
        const UV2 = 0x04;
        const UV3 = 0x08;
        const BLEND_RATE = 0x10;
        const BLEND_TYPE = 0x20;
        const FALLOFF = 0x40;
        const OUTLINE_ID = 0x80;
    }
}

const K_UV_FLAGS: [MaterialFlags; 4] =
    [MaterialFlags::UV0, MaterialFlags::UV1, MaterialFlags::UV2, MaterialFlags::UV3];

#[binrw]
#[derive(Clone, Debug)]
struct SMaterialHeader {
    group_count: u16,
    field02: u16,
    alpha: f32,
    glare: f32,
    flags: MaterialFlags,
    #[br(if(flags.contains(MaterialFlags::UV0)))]
    uv0: Option<[f32; 4]>,
    #[br(if(flags.contains(MaterialFlags::UV1)))]
    uv1: Option<[f32; 4]>,
    #[br(if(flags.contains(MaterialFlags::UV2)))]
    uv2: Option<[f32; 4]>,
    #[br(if(flags.contains(MaterialFlags::UV3)))]
    uv3: Option<[f32; 4]>,
    #[br(if(flags.contains(MaterialFlags::BLEND_RATE)))]
    blend_rate: Option<[f32; 2]>,
    #[br(if(flags.contains(MaterialFlags::BLEND_TYPE)))]
    blend_type: Option<u32>,
    #[br(if(flags.contains(MaterialFlags::FALLOFF)))]
    falloff: Option<f32>,
    #[br(if(flags.contains(MaterialFlags::OUTLINE_ID)))]
    outline_id: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TextureGroup {
    pub unk: u16,
    pub field04: u32,
    pub textures: Vec<ChunkId>,
}

impl TextureGroup {
    pub fn new(textures: Vec<ChunkId>) -> Self { Self { textures, ..Default::default() } }
}

/// Surface parameters and the textures they sample.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Material {
    pub field02: u16,
    pub alpha: f32,
    pub glare: f32,
    /// Offset U, offset V, scale U, scale V per UV set.
    pub uv_offsets: [Option<[f32; 4]>; 4],
    pub blend_rate: Option<[f32; 2]>,
    pub blend_type: Option<u32>,
    pub falloff: Option<f32>,
    pub outline_id: Option<u32>,
    pub texture_groups: Vec<TextureGroup>,
}

impl Material {
    pub fn new(texture_groups: Vec<TextureGroup>) -> Result<Self> {
        if !(1..=2).contains(&texture_groups.len()) {
            return Err(XfbinError::Value(format!(
                "a material takes one or two texture groups, got {}",
                texture_groups.len()
            ))
            .into());
        }
        Ok(Self {
            field02: 0,
            alpha: 1.0,
            glare: 0.0,
            uv_offsets: [None; 4],
            blend_rate: None,
            blend_type: None,
            falloff: None,
            outline_id: None,
            texture_groups,
        })
    }

    /// Flag word describing which optional fields are set.
    pub fn flags(&self) -> MaterialFlags {
        let mut flags = MaterialFlags::empty();
        for (uv, flag) in self.uv_offsets.iter().zip(K_UV_FLAGS) {
            flags.set(flag, uv.is_some());
        }
        flags.set(MaterialFlags::BLEND_RATE, self.blend_rate.is_some());
        flags.set(MaterialFlags::BLEND_TYPE, self.blend_type.is_some());
        flags.set(MaterialFlags::FALLOFF, self.falloff.is_some());
        flags.set(MaterialFlags::OUTLINE_ID, self.outline_id.is_some());
        flags
    }
}

impl NuccChunk for Material {
    const TYPE: ChunkType = ChunkType::Material;

    fn read_data(cursor: &mut BinaryCursor, ctx: &mut DecodeContext) -> Result<Self> {
        let offset = cursor.pos();
        let header: SMaterialHeader = cursor.read_struct()?;
        let unknown = header.flags.bits() & !MaterialFlags::all().bits();
        if unknown != 0 {
            return Err(XfbinError::unsupported(
                "material flags",
                format!("{unknown:#x} at {:#x}", offset + 12),
            )
            .into());
        }

        let mut texture_groups = Vec::with_capacity(header.group_count as usize);
        for _ in 0..header.group_count {
            let offset = cursor.pos();
            let count = cursor.read::<i16>()?;
            let count = usize::try_from(count).map_err(|_| {
                XfbinError::malformed("texture group", offset, format!("negative count {count}"))
            })?;
            let unk = cursor.read::<u16>()?;
            let field04 = cursor.read::<u32>()?;
            let textures = cursor
                .read_vec::<u32>(count)?
                .into_iter()
                .map(|slot| ctx.require(slot, ChunkType::Texture))
                .collect::<Result<Vec<_>>>()?;
            texture_groups.push(TextureGroup { unk, field04, textures });
        }

        Ok(Self {
            field02: header.field02,
            alpha: header.alpha,
            glare: header.glare,
            uv_offsets: [header.uv0, header.uv1, header.uv2, header.uv3],
            blend_rate: header.blend_rate,
            blend_type: header.blend_type,
            falloff: header.falloff,
            outline_id: header.outline_id,
            texture_groups,
        })
    }

    fn write_data(&self, cursor: &mut BinaryCursor, ctx: &mut EncodeContext) -> Result<()> {
        let group_count = u16::try_from(self.texture_groups.len()).map_err(|_| {
            XfbinError::Value(format!("{} texture groups", self.texture_groups.len()))
        })?;
        let [uv0, uv1, uv2, uv3] = self.uv_offsets;
        cursor.write_struct(&SMaterialHeader {
            group_count,
            field02: self.field02,
            alpha: self.alpha,
            glare: self.glare,
            flags: self.flags(),
            uv0,
            uv1,
            uv2,
            uv3,
            blend_rate: self.blend_rate,
            blend_type: self.blend_type,
            falloff: self.falloff,
            outline_id: self.outline_id,
        })?;
        for group in &self.texture_groups {
            let count = i16::try_from(group.textures.len()).map_err(|_| {
                XfbinError::Value(format!("{} textures in one group", group.textures.len()))
            })?;
            cursor.write(count)?;
            cursor.write(group.unk)?;
            cursor.write(group.field04)?;
            for &texture in &group.textures {
                let slot = ctx.slot(texture)?;
                cursor.write(slot)?;
            }
        }
        Ok(())
    }

    fn visit_ids(&mut self, f: &mut dyn FnMut(&mut ChunkId)) {
        self.texture_groups.iter_mut().flat_map(|g| g.textures.iter_mut()).for_each(f);
    }
}

#[cfg(test)]
mod tests {
    use binrw::Endian;

    use super::*;
    use crate::error::{error_kind, ErrorKind};

    fn context<'a>(maps: &'a [Option<ChunkId>], types: &'a [String]) -> DecodeContext<'a> {
        DecodeContext::new(maps, types)
    }

    #[test]
    fn optional_fields_follow_flags() {
        let maps = [None, None, None, Some(ChunkId(0))];
        let types = ["nuccChunkTexture".to_string()];
        let index = [0, 3, 1];
        let mut ctx = context(&maps, &types);
        ctx.set_page(&index);

        let mut cursor = BinaryCursor::default();
        cursor.write_slice(&[1u16, 0]).unwrap();
        cursor.write_slice(&[0.5f32, 0.25]).unwrap();
        cursor.write(0x42u32).unwrap();
        cursor.write_slice(&[0.0f32, 0.0, 1.0, 1.0]).unwrap();
        cursor.write(0.75f32).unwrap();
        cursor.write_slice(&[1i16, 0]).unwrap();
        cursor.write_slice(&[0u32, 1]).unwrap();

        let mut cursor = BinaryCursor::new(cursor.into_inner(), Endian::Big);
        let material = Material::read_data(&mut cursor, &mut ctx).unwrap();
        assert!(cursor.eof());
        assert_eq!(material.alpha, 0.5);
        assert_eq!(material.uv_offsets[1], Some([0.0, 0.0, 1.0, 1.0]));
        assert_eq!(material.uv_offsets[0], None);
        assert_eq!(material.falloff, Some(0.75));
        assert_eq!(material.blend_rate, None);
        assert_eq!(material.texture_groups[0].textures, vec![ChunkId(0)]);
        assert_eq!(material.flags().bits(), 0x42);
    }

    #[test]
    fn unknown_flag_bits_are_unsupported() {
        let mut cursor = BinaryCursor::default();
        cursor.write_slice(&[0u16, 0]).unwrap();
        cursor.write_slice(&[1.0f32, 0.0]).unwrap();
        cursor.write(0x100u32).unwrap();
        let mut cursor = BinaryCursor::new(cursor.into_inner(), Endian::Big);
        let mut ctx = context(&[], &[]);
        let err = Material::read_data(&mut cursor, &mut ctx).unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::UnsupportedFormat));
    }

    #[test]
    fn one_or_two_groups() {
        assert!(Material::new(vec![TextureGroup::default()]).is_ok());
        let err = Material::new(Vec::new()).unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::Value));
        assert!(Material::new(vec![TextureGroup::default(); 3]).is_err());
    }
}
