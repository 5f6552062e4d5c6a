//! Animation chunks.
//!
//! An animation lists the clumps it drives, each with the bones and materials its tracks address,
//! plus "other" chunks (cameras and lights) addressed directly. Entries name their target by
//! clump position and an index into that clump's bones followed by its materials, or by position
//! in the other list.
use anyhow::Result;
use binrw::binrw;
use serde_derive::Serialize;

use crate::{
    error::XfbinError,
    format::{
        chunk::ChunkType,
        curve::{curve_target, AnmCurve, CurveTarget, EAnmEntryFormat, SAnmCurveHeader, Sample},
    },
    nucc::{ChunkId, DecodeContext, EncodeContext, NuccChunk},
    util::binary::BinaryCursor,
};

const K_OTHER_CLUMP: i16 = -1;

#[binrw]
#[derive(Copy, Clone, Debug, Default)]
struct SAnmHeader {
    frame_count: u32,
    frame_size: u32,
    entry_count: u16,
    loop_flag: u16,
    clump_count: u16,
    other_count: u16,
    coord_count: u32,
}

#[binrw]
#[derive(Copy, Clone, Debug, Default)]
struct SAnmClumpHeader {
    clump: u32,
    bone_material_count: u16,
    model_count: u16,
}

#[binrw]
#[derive(Copy, Clone, Debug, Default)]
struct SAnmEntryHeader {
    clump: i16,
    index: u16,
    format: u16,
    curve_count: u16,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnmClump {
    pub clump: ChunkId,
    pub bones: Vec<ChunkId>,
    pub materials: Vec<ChunkId>,
    pub models: Vec<Option<ChunkId>>,
}

impl AnmClump {
    pub fn new(clump: ChunkId) -> Self {
        Self { clump, bones: Vec::new(), materials: Vec::new(), models: Vec::new() }
    }

    /// Chunk at `index` of the bones followed by the materials.
    pub fn target(&self, index: u16) -> Option<ChunkId> {
        self.bones.iter().chain(&self.materials).nth(index as usize).copied()
    }

    #[inline]
    pub fn target_count(&self) -> usize { self.bones.len() + self.materials.len() }
}

/// Bone of an animated clump: clump position and bone index. A clump of `-1` marks an unused
/// entry.
#[binrw]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub struct AnmCoord {
    pub clump: i16,
    pub coord: u16,
}

impl AnmCoord {
    pub const NONE: Self = Self { clump: -1, coord: 0 };

    #[inline]
    pub fn is_none(self) -> bool { self.clump < 0 }
}

#[binrw]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub struct AnmCoordLink {
    pub parent: AnmCoord,
    pub child: AnmCoord,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub enum AnmEntryTarget {
    /// Bone or material `index` of the clump at position `clump`.
    Clump { clump: u16, index: u16 },
    /// Chunk at position `index` of [`Anm::others`].
    Other { index: u16 },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnmEntry {
    pub target: AnmEntryTarget,
    pub format: EAnmEntryFormat,
    pub curves: Vec<AnmCurve>,
}

impl AnmEntry {
    pub fn new(target: AnmEntryTarget, format: EAnmEntryFormat) -> Self {
        Self { target, format, curves: Vec::new() }
    }

    /// Property animated by `curve` on this entry's target.
    pub fn curve_target(&self, curve: &AnmCurve) -> Option<CurveTarget> {
        curve_target(self.format, curve.index, curve.format)
    }

    /// Every curve decoded to samples, paired with the property it animates.
    pub fn tracks(&self, frame_size: u32) -> Result<Vec<(Option<CurveTarget>, Vec<Sample>)>> {
        self.curves
            .iter()
            .map(|c| -> Result<_> { Ok((self.curve_target(c), c.samples(frame_size)?)) })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Anm {
    pub frame_count: u32,
    /// Frames between two keys of a fixed-interval curve.
    pub frame_size: u32,
    pub loop_flag: u16,
    pub clumps: Vec<AnmClump>,
    /// Cameras and lights.
    pub others: Vec<ChunkId>,
    /// Bone hierarchy between animated clumps.
    pub coord_links: Vec<AnmCoordLink>,
    pub entries: Vec<AnmEntry>,
}

impl Anm {
    pub fn new(frame_count: u32, frame_size: u32) -> Self {
        Self {
            frame_count,
            frame_size,
            loop_flag: 0,
            clumps: Vec::new(),
            others: Vec::new(),
            coord_links: Vec::new(),
            entries: Vec::new(),
        }
    }

    #[inline]
    pub fn is_looped(&self) -> bool { self.loop_flag != 0 }

    fn coord(&self, coord: AnmCoord) -> Option<ChunkId> {
        let clump = self.clumps.get(usize::try_from(coord.clump).ok()?)?;
        clump.bones.get(coord.coord as usize).copied()
    }

    /// Parent and child bone of every coord link, sentinel entries skipped.
    pub fn bone_links(&self) -> Vec<(ChunkId, ChunkId)> {
        self.coord_links
            .iter()
            .filter(|link| !link.parent.is_none() && !link.child.is_none())
            .filter_map(|link| Some((self.coord(link.parent)?, self.coord(link.child)?)))
            .collect()
    }

    /// Chunk animated by `entry`.
    pub fn entry_chunk(&self, entry: &AnmEntry) -> Option<ChunkId> {
        match entry.target {
            AnmEntryTarget::Clump { clump, index } => {
                self.clumps.get(clump as usize)?.target(index)
            }
            AnmEntryTarget::Other { index } => self.others.get(index as usize).copied(),
        }
    }

    fn check_coord(&self, coord: AnmCoord) -> Option<(i64, usize)> {
        if coord.is_none() {
            return None;
        }
        match self.clumps.get(coord.clump as usize) {
            None => Some((coord.clump as i64, self.clumps.len())),
            Some(clump) if coord.coord as usize >= clump.bones.len() => {
                Some((coord.coord as i64, clump.bones.len()))
            }
            Some(_) => None,
        }
    }

    fn check_target(&self, target: AnmEntryTarget) -> Option<(i64, usize)> {
        match target {
            AnmEntryTarget::Clump { clump, index } => match self.clumps.get(clump as usize) {
                None => Some((clump as i64, self.clumps.len())),
                Some(c) if index as usize >= c.target_count() => {
                    Some((index as i64, c.target_count()))
                }
                Some(_) => None,
            },
            AnmEntryTarget::Other { index } if index as usize >= self.others.len() => {
                Some((index as i64, self.others.len()))
            }
            AnmEntryTarget::Other { .. } => None,
        }
    }

    /// First index that points outside the lists it addresses.
    fn find_bad_index(&self) -> Option<(i64, usize)> {
        self.coord_links
            .iter()
            .find_map(|link| self.check_coord(link.parent).or_else(|| self.check_coord(link.child)))
            .or_else(|| self.entries.iter().find_map(|e| self.check_target(e.target)))
    }
}

fn read_clump(cursor: &mut BinaryCursor, ctx: &DecodeContext) -> Result<AnmClump> {
    let header: SAnmClumpHeader = cursor.read_struct()?;
    let clump = ctx.require(header.clump, ChunkType::Clump)?;
    let mut out = AnmClump::new(clump);
    for _ in 0..header.bone_material_count {
        let offset = cursor.pos();
        let slot = cursor.read::<u32>()?;
        let expected = || format!("{} or {}", ChunkType::Coord, ChunkType::Material);
        let Some(id) = ctx.resolve(slot)? else {
            return Err(ctx.wrong_type(slot, expected(), ChunkType::Null.name()));
        };
        match ctx.type_of(id).and_then(ChunkType::parse) {
            Some(ChunkType::Coord) if out.materials.is_empty() => out.bones.push(id),
            Some(ChunkType::Coord) => {
                return Err(XfbinError::malformed(
                    "animation clump",
                    offset,
                    "bone listed after a material",
                )
                .into())
            }
            Some(ChunkType::Material) => out.materials.push(id),
            _ => {
                return Err(ctx.wrong_type(slot, expected(), ctx.type_of(id).unwrap_or_default()))
            }
        }
    }
    out.models = cursor
        .read_vec::<u32>(header.model_count as usize)?
        .into_iter()
        .map(|slot| ctx.resolve_as(slot, ChunkType::Model))
        .collect::<Result<Vec<_>>>()?;
    Ok(out)
}

fn read_entry(cursor: &mut BinaryCursor) -> Result<AnmEntry> {
    let header: SAnmEntryHeader = cursor.read_struct()?;
    let format = EAnmEntryFormat::from_u16(header.format)?;
    let target = match header.clump {
        K_OTHER_CLUMP => AnmEntryTarget::Other { index: header.index },
        clump => AnmEntryTarget::Clump {
            clump: u16::try_from(clump).map_err(|_| {
                XfbinError::malformed(
                    "animation entry",
                    cursor.pos() - 8,
                    format!("clump index {clump}"),
                )
            })?,
            index: header.index,
        },
    };
    let mut headers = Vec::with_capacity(header.curve_count as usize);
    for _ in 0..header.curve_count {
        headers.push(cursor.read_struct::<SAnmCurveHeader>()?);
    }
    let curves = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            AnmCurve::read(cursor, h).map_err(|e| e.context(format!("While reading curve {i}")))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(AnmEntry { target, format, curves })
}

fn check_frame_size(frame_size: u32) -> Result<()> {
    if i32::try_from(frame_size).is_err() {
        return Err(XfbinError::Value(format!("frame size {frame_size:#x} is not a frame")).into());
    }
    Ok(())
}

fn count<T: TryFrom<usize>>(len: usize, what: &str) -> Result<T> {
    T::try_from(len)
        .map_err(|_| XfbinError::Value(format!("{len} {what} do not fit an animation")).into())
}

impl NuccChunk for Anm {
    const TYPE: ChunkType = ChunkType::Anm;

    fn read_data(cursor: &mut BinaryCursor, ctx: &mut DecodeContext) -> Result<Self> {
        let header: SAnmHeader = cursor.read_struct()?;
        check_frame_size(header.frame_size)?;
        let mut clumps = Vec::with_capacity(header.clump_count as usize);
        for i in 0..header.clump_count {
            clumps.push(
                read_clump(cursor, ctx).map_err(|e| e.context(format!("While reading clump {i}")))?,
            );
        }
        let others = cursor
            .read_vec::<u32>(header.other_count as usize)?
            .into_iter()
            .map(|slot| {
                ctx.resolve(slot)?
                    .ok_or_else(|| ctx.wrong_type(slot, "camera or light", ChunkType::Null.name()))
            })
            .collect::<Result<Vec<_>>>()?;
        let mut coord_links = Vec::with_capacity(header.coord_count.min(0x10000) as usize);
        for _ in 0..header.coord_count {
            coord_links.push(cursor.read_struct::<AnmCoordLink>()?);
        }
        let mut entries = Vec::with_capacity(header.entry_count as usize);
        for i in 0..header.entry_count {
            entries.push(
                read_entry(cursor).map_err(|e| e.context(format!("While reading entry {i}")))?,
            );
        }

        let anm = Self {
            frame_count: header.frame_count,
            frame_size: header.frame_size,
            loop_flag: header.loop_flag,
            clumps,
            others,
            coord_links,
            entries,
        };
        if let Some((index, limit)) = anm.find_bad_index() {
            return Err(ctx.out_of_range(index, limit));
        }
        Ok(anm)
    }

    fn write_data(&self, cursor: &mut BinaryCursor, ctx: &mut EncodeContext) -> Result<()> {
        if let Some((index, limit)) = self.find_bad_index() {
            return Err(XfbinError::Value(format!(
                "animation index {index} outside a list of {limit}"
            ))
            .into());
        }
        check_frame_size(self.frame_size)?;
        cursor.write_struct(&SAnmHeader {
            frame_count: self.frame_count,
            frame_size: self.frame_size,
            entry_count: count(self.entries.len(), "entries")?,
            loop_flag: self.loop_flag,
            clump_count: count(self.clumps.len(), "clumps")?,
            other_count: count(self.others.len(), "other entries")?,
            coord_count: count(self.coord_links.len(), "coord links")?,
        })?;
        for clump in &self.clumps {
            cursor.write_struct(&SAnmClumpHeader {
                clump: ctx.slot(clump.clump)?,
                bone_material_count: count(clump.target_count(), "bones and materials")?,
                model_count: count(clump.models.len(), "models")?,
            })?;
            for &id in clump.bones.iter().chain(&clump.materials) {
                let slot = ctx.slot(id)?;
                cursor.write(slot)?;
            }
            for &model in &clump.models {
                let slot = ctx.slot_opt(model)?;
                cursor.write(slot)?;
            }
        }
        for &other in &self.others {
            let slot = ctx.slot(other)?;
            cursor.write(slot)?;
        }
        for link in &self.coord_links {
            cursor.write_struct(link)?;
        }
        for entry in &self.entries {
            let (clump, index) = match entry.target {
                AnmEntryTarget::Clump { clump, index } => {
                    (count::<i16>(clump as usize, "clumps")?, index)
                }
                AnmEntryTarget::Other { index } => (K_OTHER_CLUMP, index),
            };
            cursor.write_struct(&SAnmEntryHeader {
                clump,
                index,
                format: entry.format as u16,
                curve_count: count(entry.curves.len(), "curves")?,
            })?;
            for curve in &entry.curves {
                cursor.write_struct(&curve.header())?;
            }
            for curve in &entry.curves {
                curve.write(cursor)?;
            }
        }
        Ok(())
    }

    fn visit_ids(&mut self, f: &mut dyn FnMut(&mut ChunkId)) {
        for clump in &mut self.clumps {
            f(&mut clump.clump);
            clump.bones.iter_mut().chain(&mut clump.materials).for_each(&mut *f);
            clump.models.iter_mut().flatten().for_each(&mut *f);
        }
        self.others.iter_mut().for_each(f);
    }
}
