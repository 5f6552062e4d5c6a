use anyhow::Result;
use binrw::binrw;
use serde_derive::Serialize;

use crate::{
    error::XfbinError,
    format::chunk::ChunkType,
    nucc::{ChunkId, DecodeContext, EncodeContext, NuccChunk},
    util::binary::BinaryCursor,
};

#[binrw]
#[derive(Copy, Clone, Debug, Default)]
struct SDynamicsHeader {
    spring_group_count: u16,
    collision_count: u16,
    clump: u32,
}

#[binrw]
#[derive(Copy, Clone, Debug, Default)]
struct SSpringGroup {
    bounciness: f32,
    elasticity: f32,
    stiffness: f32,
    movement_limit: f32,
    coord_index: u16,
    bone_count: u16,
    flags: u32,
}

#[binrw]
#[derive(Copy, Clone, Debug, Default)]
struct SCollisionSphere {
    offset: [f32; 3],
    scale: [f32; 3],
    coord_index: u16,
    attach_groups: u16,
    #[brw(pad_after = 2)]
    attached_count: u16,
}

/// Chain of spring bones hanging from one coord of the clump.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SpringGroup {
    pub bounciness: f32,
    pub elasticity: f32,
    pub stiffness: f32,
    pub movement_limit: f32,
    pub coord_index: u16,
    pub flags: u32,
    /// One value per affected bone.
    pub bones: Vec<u16>,
    /// Coord at `coord_index`, filled in by [`crate::nucc::Xfbin::resolve_links`].
    pub coord: Option<ChunkId>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CollisionSphere {
    pub offset: [f32; 3],
    pub scale: [f32; 3],
    pub coord_index: u16,
    /// Spring groups the sphere collides with; `None` when the sphere is not attached.
    pub attached_groups: Option<Vec<u16>>,
    pub coord: Option<ChunkId>,
}

/// Spring bones and collision spheres of a clump.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Dynamics {
    pub clump: Option<ChunkId>,
    pub spring_groups: Vec<SpringGroup>,
    pub collisions: Vec<CollisionSphere>,
}

impl Dynamics {
    /// Points every spring group and sphere at the coord its bone index selects in `coords`.
    pub fn link_coords(&mut self, coords: &[ChunkId]) {
        for group in &mut self.spring_groups {
            group.coord = coords.get(group.coord_index as usize).copied();
        }
        for sphere in &mut self.collisions {
            sphere.coord = coords.get(sphere.coord_index as usize).copied();
        }
    }

    fn check_attached(&self) -> Result<()> {
        let limit = self.spring_groups.len();
        let attached = self.collisions.iter().filter_map(|c| c.attached_groups.as_ref()).flatten();
        if let Some(index) = attached.copied().find(|&i| i as usize >= limit) {
            return Err(XfbinError::Value(format!(
                "collision attached to spring group {index} of {limit}"
            ))
            .into());
        }
        Ok(())
    }
}

fn count_u16(len: usize, what: &str) -> Result<u16> {
    u16::try_from(len)
        .map_err(|_| XfbinError::Value(format!("{len} {what} do not fit dynamics")).into())
}

impl NuccChunk for Dynamics {
    const TYPE: ChunkType = ChunkType::Dynamics;

    fn read_data(cursor: &mut BinaryCursor, ctx: &mut DecodeContext) -> Result<Self> {
        let header: SDynamicsHeader = cursor.read_struct()?;
        let clump = ctx.resolve_as(header.clump, ChunkType::Clump)?;
        let mut groups = Vec::with_capacity(header.spring_group_count as usize);
        for _ in 0..header.spring_group_count {
            groups.push(cursor.read_struct::<SSpringGroup>()?);
        }
        let mut spheres = Vec::with_capacity(header.collision_count as usize);
        for _ in 0..header.collision_count {
            spheres.push(cursor.read_struct::<SCollisionSphere>()?);
        }

        // The per-bone values of every group are stored back to back
        let mut spring_groups = Vec::with_capacity(groups.len());
        for raw in &groups {
            spring_groups.push(SpringGroup {
                bounciness: raw.bounciness,
                elasticity: raw.elasticity,
                stiffness: raw.stiffness,
                movement_limit: raw.movement_limit,
                coord_index: raw.coord_index,
                flags: raw.flags,
                bones: cursor.read_vec::<u16>(raw.bone_count as usize)?,
                coord: None,
            });
        }

        let mut collisions = Vec::with_capacity(spheres.len());
        for raw in &spheres {
            let attached_groups = if raw.attach_groups != 0 {
                let groups = cursor.read_vec::<u16>(raw.attached_count as usize)?;
                if let Some(&index) = groups.iter().find(|&&i| i as usize >= spring_groups.len()) {
                    return Err(ctx.out_of_range(index as i64, spring_groups.len()));
                }
                Some(groups)
            } else {
                None
            };
            collisions.push(CollisionSphere {
                offset: raw.offset,
                scale: raw.scale,
                coord_index: raw.coord_index,
                attached_groups,
                coord: None,
            });
        }
        Ok(Self { clump, spring_groups, collisions })
    }

    fn write_data(&self, cursor: &mut BinaryCursor, ctx: &mut EncodeContext) -> Result<()> {
        self.check_attached()?;
        let clump = ctx.slot_opt(self.clump)?;
        cursor.write_struct(&SDynamicsHeader {
            spring_group_count: count_u16(self.spring_groups.len(), "spring groups")?,
            collision_count: count_u16(self.collisions.len(), "collisions")?,
            clump,
        })?;
        for group in &self.spring_groups {
            cursor.write_struct(&SSpringGroup {
                bounciness: group.bounciness,
                elasticity: group.elasticity,
                stiffness: group.stiffness,
                movement_limit: group.movement_limit,
                coord_index: group.coord_index,
                bone_count: count_u16(group.bones.len(), "spring bones")?,
                flags: group.flags,
            })?;
        }
        for sphere in &self.collisions {
            let attached = sphere.attached_groups.as_deref().unwrap_or_default();
            cursor.write_struct(&SCollisionSphere {
                offset: sphere.offset,
                scale: sphere.scale,
                coord_index: sphere.coord_index,
                attach_groups: sphere.attached_groups.is_some() as u16,
                attached_count: count_u16(attached.len(), "attached groups")?,
            })?;
        }
        for group in &self.spring_groups {
            cursor.write_slice(&group.bones)?;
        }
        for groups in self.collisions.iter().filter_map(|c| c.attached_groups.as_ref()) {
            cursor.write_slice(groups)?;
        }
        Ok(())
    }

    fn visit_ids(&mut self, f: &mut dyn FnMut(&mut ChunkId)) {
        let groups = self.spring_groups.iter_mut().map(|g| &mut g.coord);
        let spheres = self.collisions.iter_mut().map(|c| &mut c.coord);
        std::iter::once(&mut self.clump).chain(groups).chain(spheres).flatten().for_each(f);
    }
}

#[cfg(test)]
mod tests {
    use binrw::Endian;

    use super::*;
    use crate::{
        error::{error_kind, ErrorKind},
        nucc::Xfbin,
    };

    fn dynamics() -> Dynamics {
        Dynamics {
            clump: None,
            spring_groups: vec![
                SpringGroup { coord_index: 1, bones: vec![1, 2, 3], ..Default::default() },
                SpringGroup {
                    coord_index: 4,
                    stiffness: 0.5,
                    bones: vec![7],
                    ..Default::default()
                },
            ],
            collisions: vec![
                CollisionSphere {
                    coord_index: 2,
                    attached_groups: Some(vec![1, 0]),
                    ..Default::default()
                },
                CollisionSphere { coord_index: 0, scale: [2.0; 3], ..Default::default() },
            ],
        }
    }

    #[test]
    fn flattened_arrays_are_split_per_group() {
        let value = dynamics();
        let xfbin = Xfbin::new();
        let mut ctx = EncodeContext::new(&xfbin);
        let mut cursor = BinaryCursor::default();
        value.write_data(&mut cursor, &mut ctx).unwrap();
        // Header, two groups, two spheres, four bone values, two attached indices
        assert_eq!(cursor.len(), 8 + 2 * 24 + 2 * 32 + 4 * 2 + 2 * 2);

        let mut cursor = BinaryCursor::new(cursor.into_inner(), Endian::Big);
        let maps = [None];
        let mut dctx = DecodeContext::new(&maps, &[]);
        dctx.set_page(&[0]);
        assert_eq!(Dynamics::read_data(&mut cursor, &mut dctx).unwrap(), value);
    }

    #[test]
    fn links_bones_by_index() {
        let mut value = dynamics();
        value.link_coords(&[ChunkId(10), ChunkId(11), ChunkId(12)]);
        assert_eq!(value.spring_groups[0].coord, Some(ChunkId(11)));
        assert_eq!(value.spring_groups[1].coord, None);
        assert_eq!(value.collisions[0].coord, Some(ChunkId(12)));
        assert_eq!(value.collisions[1].coord, Some(ChunkId(10)));
    }

    #[test]
    fn attached_group_out_of_range() {
        let mut value = dynamics();
        value.collisions[0].attached_groups = Some(vec![2]);
        let xfbin = Xfbin::new();
        let mut ctx = EncodeContext::new(&xfbin);
        let err = value.write_data(&mut BinaryCursor::default(), &mut ctx).unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::Value));
    }
}
