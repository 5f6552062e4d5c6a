use anyhow::Result;
use binrw::binrw;
use serde_derive::Serialize;

use crate::{
    format::chunk::ChunkType,
    nucc::{ChunkId, DecodeContext, EncodeContext, NuccChunk},
    util::binary::BinaryCursor,
};

#[binrw]
#[derive(Copy, Clone, Debug, Default)]
struct SCoord {
    position: [f32; 3],
    rotation: [f32; 3],
    scale: [f32; 3],
    opacity: f32,
    flags: u16,
    unk: u16,
}

/// Bone or transform node.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Coord {
    pub position: [f32; 3],
    /// Euler angles in degrees.
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
    pub opacity: f32,
    pub flags: u16,
    pub unk: u16,
    pub parent: Option<ChunkId>,
    /// Children in read order.
    pub children: Vec<ChunkId>,
}

impl Default for Coord {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0; 3],
            scale: [1.0; 3],
            opacity: 1.0,
            flags: 0,
            unk: 0,
            parent: None,
            children: Vec::new(),
        }
    }
}

impl Coord {
    pub fn new(position: [f32; 3], rotation: [f32; 3], scale: [f32; 3]) -> Self {
        Self { position, rotation, scale, ..Default::default() }
    }
}

impl NuccChunk for Coord {
    const TYPE: ChunkType = ChunkType::Coord;

    fn read_data(cursor: &mut BinaryCursor, _ctx: &mut DecodeContext) -> Result<Self> {
        let raw: SCoord = cursor.read_struct()?;
        Ok(Self {
            position: raw.position,
            rotation: raw.rotation,
            scale: raw.scale,
            opacity: raw.opacity,
            flags: raw.flags,
            unk: raw.unk,
            parent: None,
            children: Vec::new(),
        })
    }

    fn write_data(&self, cursor: &mut BinaryCursor, _ctx: &mut EncodeContext) -> Result<()> {
        cursor.write_struct(&SCoord {
            position: self.position,
            rotation: self.rotation,
            scale: self.scale,
            opacity: self.opacity,
            flags: self.flags,
            unk: self.unk,
        })
    }

    fn visit_ids(&mut self, f: &mut dyn FnMut(&mut ChunkId)) {
        if let Some(parent) = &mut self.parent {
            f(parent);
        }
        self.children.iter_mut().for_each(f);
    }
}
