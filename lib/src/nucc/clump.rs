use anyhow::Result;
use serde_derive::Serialize;

use crate::{
    error::XfbinError,
    format::chunk::ChunkType,
    nucc::{ChunkId, DecodeContext, EncodeContext, NuccChunk},
    util::binary::BinaryCursor,
};

const K_NO_PARENT: i16 = -1;
const K_GROUP_END: i16 = -1;
const K_EMPTY_SLOT: i32 = -1;

/// Models that are swapped in and out together.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ClumpModelGroup {
    pub flags: [u8; 2],
    pub unk: u32,
    /// `None` marks an empty slot.
    pub models: Vec<Option<ChunkId>>,
}

/// Skeleton root: the bones and the models attached to them.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Clump {
    pub field00: u32,
    pub coord_flags: [u8; 2],
    /// Bones in index order. Parent links live on the coords themselves.
    pub coords: Vec<ChunkId>,
    pub model_flags: [u8; 2],
    pub model_padding: u32,
    pub models: Vec<Option<ChunkId>>,
    pub model_groups: Vec<ClumpModelGroup>,
}

impl Clump {
    pub fn new(coords: Vec<ChunkId>, models: Vec<Option<ChunkId>>) -> Self {
        Self { coords, models, ..Default::default() }
    }

    /// Bone index of `coord` within this clump.
    pub fn coord_index(&self, coord: ChunkId) -> Option<usize> {
        self.coords.iter().position(|&id| id == coord)
    }
}

fn count_u16(len: usize, what: &str) -> Result<u16> {
    u16::try_from(len)
        .map_err(|_| XfbinError::Value(format!("{len} {what} do not fit a clump")).into())
}

impl NuccChunk for Clump {
    const TYPE: ChunkType = ChunkType::Clump;

    fn read_data(cursor: &mut BinaryCursor, ctx: &mut DecodeContext) -> Result<Self> {
        let field00 = cursor.read::<u32>()?;
        let coord_count = cursor.read::<u16>()? as usize;
        let coord_flags = cursor.read_array::<u8, 2>()?;
        let coords = cursor
            .read_vec::<u32>(coord_count)?
            .into_iter()
            .map(|slot| ctx.require(slot, ChunkType::Coord))
            .collect::<Result<Vec<_>>>()?;
        let parents = cursor.read_vec::<i16>(coord_count)?;
        for (&child, &parent) in coords.iter().zip(&parents) {
            if parent == K_NO_PARENT {
                continue;
            }
            let Some(&parent) = usize::try_from(parent).ok().and_then(|i| coords.get(i)) else {
                return Err(ctx.out_of_range(parent as i64, coord_count));
            };
            ctx.link_coord(child, parent);
        }

        let model_count = cursor.read::<u16>()? as usize;
        let model_flags = cursor.read_array::<u8, 2>()?;
        let model_padding = cursor.read::<u32>()?;
        let models = cursor
            .read_vec::<u32>(model_count)?
            .into_iter()
            .map(|slot| ctx.resolve_as(slot, ChunkType::Model))
            .collect::<Result<Vec<_>>>()?;

        let mut model_groups = Vec::new();
        while !cursor.eof() {
            let offset = cursor.pos();
            let count = cursor.read::<i16>()?;
            if count == K_GROUP_END {
                break;
            }
            let count = usize::try_from(count).map_err(|_| {
                XfbinError::malformed("model group", offset, format!("count {count}"))
            })?;
            let flags = cursor.read_array::<u8, 2>()?;
            let unk = cursor.read::<u32>()?;
            let models = cursor
                .read_vec::<i32>(count)?
                .into_iter()
                .map(|slot| match slot {
                    K_EMPTY_SLOT => Ok(None),
                    slot => ctx.resolve_as(slot as u32, ChunkType::Model),
                })
                .collect::<Result<Vec<_>>>()?;
            model_groups.push(ClumpModelGroup { flags, unk, models });
        }

        Ok(Self { field00, coord_flags, coords, model_flags, model_padding, models, model_groups })
    }

    fn write_data(&self, cursor: &mut BinaryCursor, ctx: &mut EncodeContext) -> Result<()> {
        let xfbin = ctx.xfbin();
        cursor.write(self.field00)?;
        cursor.write(count_u16(self.coords.len(), "coords")?)?;
        cursor.write_slice(&self.coord_flags)?;
        for &coord in &self.coords {
            let slot = ctx.slot(coord)?;
            cursor.write(slot)?;
        }
        for &coord in &self.coords {
            let parent = xfbin
                .coord(coord)
                .and_then(|c| c.parent)
                .and_then(|parent| self.coord_index(parent))
                .map_or(K_NO_PARENT, |i| i as i16);
            cursor.write(parent)?;
        }

        cursor.write(count_u16(self.models.len(), "models")?)?;
        cursor.write_slice(&self.model_flags)?;
        cursor.write(self.model_padding)?;
        for &model in &self.models {
            let slot = ctx.slot_opt(model)?;
            cursor.write(slot)?;
        }

        for group in &self.model_groups {
            let count = i16::try_from(group.models.len()).map_err(|_| {
                XfbinError::Value(format!("{} models do not fit a group", group.models.len()))
            })?;
            cursor.write(count)?;
            cursor.write_slice(&group.flags)?;
            cursor.write(group.unk)?;
            for &model in &group.models {
                let slot = match model {
                    Some(id) => ctx.slot(id)? as i32,
                    None => K_EMPTY_SLOT,
                };
                cursor.write(slot)?;
            }
        }
        cursor.write(K_GROUP_END)?;
        Ok(())
    }

    fn visit_ids(&mut self, f: &mut dyn FnMut(&mut ChunkId)) {
        self.coords.iter_mut().for_each(&mut *f);
        let grouped = self.model_groups.iter_mut().flat_map(|g| g.models.iter_mut());
        self.models.iter_mut().chain(grouped).flatten().for_each(f);
    }
}
