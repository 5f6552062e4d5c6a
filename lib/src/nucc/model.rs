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
    #[binrw]
    #[derive(Serialize)]
    pub struct RiggingFlags: u16 {
        const UNSKINNED = 0x1;
        const SKINNED = 0x2;
        const OUTLINE = 0x4;
    }
}

#[binrw]
#[derive(Copy, Clone, Debug)]
struct SModelHeader {
    field00: u16,
    rigging_flags: RiggingFlags,
    field04: u16,
    field06: u16,
    clump: u32,
    hit: u32,
    coord_index: u32,
    material_count: u32,
}

/// Renderable mesh bound to one bone of its clump.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Model {
    pub field00: u16,
    pub rigging_flags: RiggingFlags,
    pub field04: u16,
    pub field06: u16,
    pub clump: Option<ChunkId>,
    /// Collision mesh, if any.
    pub hit: Option<ChunkId>,
    /// Bone index into the clump's coords.
    pub coord_index: u32,
    /// Coord at `coord_index`, filled in by [`crate::nucc::Xfbin::resolve_links`].
    pub coord: Option<ChunkId>,
    pub materials: Vec<ChunkId>,
    /// NUD mesh data.
    #[serde(skip)]
    pub mesh: Vec<u8>,
}

impl Model {
    pub fn new(clump: ChunkId, coord_index: u32, materials: Vec<ChunkId>, mesh: Vec<u8>) -> Self {
        Self {
            field00: 0,
            rigging_flags: RiggingFlags::UNSKINNED,
            field04: 0,
            field06: 0,
            clump: Some(clump),
            hit: None,
            coord_index,
            coord: None,
            materials,
            mesh,
        }
    }
}

impl NuccChunk for Model {
    const TYPE: ChunkType = ChunkType::Model;

    fn read_data(cursor: &mut BinaryCursor, ctx: &mut DecodeContext) -> Result<Self> {
        let header: SModelHeader = cursor.read_struct()?;
        let clump = ctx.resolve_as(header.clump, ChunkType::Clump)?;
        let hit = ctx.resolve_as(header.hit, ChunkType::ModelHit)?;
        let materials = cursor
            .read_vec::<u32>(header.material_count as usize)?
            .into_iter()
            .map(|slot| ctx.require(slot, ChunkType::Material))
            .collect::<Result<Vec<_>>>()?;
        let mesh_size = cursor.read::<u32>()?;
        let mesh = cursor.read_bytes(mesh_size as usize)?;
        Ok(Self {
            field00: header.field00,
            rigging_flags: header.rigging_flags,
            field04: header.field04,
            field06: header.field06,
            clump,
            hit,
            coord_index: header.coord_index,
            coord: None,
            materials,
            mesh,
        })
    }

    fn write_data(&self, cursor: &mut BinaryCursor, ctx: &mut EncodeContext) -> Result<()> {
        let clump = ctx.slot_opt(self.clump)?;
        let hit = ctx.slot_opt(self.hit)?;
        cursor.write_struct(&SModelHeader {
            field00: self.field00,
            rigging_flags: self.rigging_flags,
            field04: self.field04,
            field06: self.field06,
            clump,
            hit,
            coord_index: self.coord_index,
            material_count: self.materials.len() as u32,
        })?;
        for &material in &self.materials {
            let slot = ctx.slot(material)?;
            cursor.write(slot)?;
        }
        let mesh_size = u32::try_from(self.mesh.len())
            .map_err(|_| XfbinError::Value(format!("mesh too large: {:#x}", self.mesh.len())))?;
        cursor.write(mesh_size)?;
        cursor.write_bytes(&self.mesh)
    }

    fn visit_ids(&mut self, f: &mut dyn FnMut(&mut ChunkId)) {
        self.clump.iter_mut().chain(&mut self.hit).chain(&mut self.coord).for_each(&mut *f);
        self.materials.iter_mut().for_each(f);
    }
}
