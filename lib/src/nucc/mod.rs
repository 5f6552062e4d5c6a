//! The chunk graph: an arena of typed chunks whose cross references are [`ChunkId`]s.
pub mod anm;
pub mod camera;
pub mod clump;
pub mod context;
pub mod coord;
pub mod decode;
pub mod dynamics;
pub mod encode;
pub mod hit;
pub mod material;
pub mod merge;
pub mod model;
pub mod texture;

use anyhow::Result;
use serde_derive::Serialize;

pub use self::{
    anm::{Anm, AnmClump, AnmCoord, AnmCoordLink, AnmEntry, AnmEntryTarget},
    camera::{Ambient, Camera, LightDirc, LightPoint},
    clump::{Clump, ClumpModelGroup},
    context::{DecodeContext, EncodeContext},
    coord::Coord,
    decode::{decode, decode_with, DecodeOptions, UnknownChunkPolicy},
    dynamics::{CollisionSphere, Dynamics, SpringGroup},
    encode::encode,
    hit::{ModelHit, ModelHitMesh},
    material::{Material, MaterialFlags, TextureGroup},
    merge::{merge, MergePolicy},
    model::{Model, RiggingFlags},
    texture::Texture,
};
use crate::{
    error::XfbinError,
    format::{chunk::ChunkType, xfbin::K_NUCC_VERSION},
    util::binary::BinaryCursor,
};

/// Index of a chunk in [`Xfbin::chunks`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct ChunkId(pub u32);

impl ChunkId {
    #[inline]
    pub fn index(self) -> usize { self.0 as usize }
}

/// Payload codec of one chunk kind.
pub trait NuccChunk: Sized {
    const TYPE: ChunkType;

    fn read_data(cursor: &mut BinaryCursor, ctx: &mut DecodeContext) -> Result<Self>;

    fn write_data(&self, cursor: &mut BinaryCursor, ctx: &mut EncodeContext) -> Result<()>;

    /// Visits every chunk reference held by the payload, derived links included.
    fn visit_ids(&mut self, _f: &mut dyn FnMut(&mut ChunkId)) {}
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum ChunkData {
    /// Reference-only placeholder; the chunk's data lives elsewhere.
    Null { type_name: String },
    Binary {
        #[serde(skip)]
        data: Vec<u8>,
    },
    Clump(Clump),
    Coord(Coord),
    Model(Model),
    ModelHit(ModelHit),
    Material(Material),
    Texture(Texture),
    Dynamics(Dynamics),
    Anm(Anm),
    Camera(Camera),
    LightDirc(LightDirc),
    LightPoint(LightPoint),
    Ambient(Ambient),
    /// Chunk of a type outside the known set, kept as raw bytes.
    Unknown {
        type_name: String,
        #[serde(skip)]
        data: Vec<u8>,
    },
}

macro_rules! chunk_accessors {
    ($($variant:ident => $get:ident, $get_mut:ident;)*) => {
        impl ChunkData {
            $(
                pub fn $get(&self) -> Option<&$variant> {
                    match self {
                        ChunkData::$variant(v) => Some(v),
                        _ => None,
                    }
                }

                pub fn $get_mut(&mut self) -> Option<&mut $variant> {
                    match self {
                        ChunkData::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            )*
        }
    };
}

chunk_accessors! {
    Clump => as_clump, as_clump_mut;
    Coord => as_coord, as_coord_mut;
    Model => as_model, as_model_mut;
    ModelHit => as_model_hit, as_model_hit_mut;
    Material => as_material, as_material_mut;
    Texture => as_texture, as_texture_mut;
    Dynamics => as_dynamics, as_dynamics_mut;
    Anm => as_anm, as_anm_mut;
}

impl ChunkData {
    pub fn type_name(&self) -> &str {
        match self {
            ChunkData::Null { type_name } | ChunkData::Unknown { type_name, .. } => type_name,
            ChunkData::Binary { .. } => ChunkType::Binary.name(),
            ChunkData::Clump(_) => ChunkType::Clump.name(),
            ChunkData::Coord(_) => ChunkType::Coord.name(),
            ChunkData::Model(_) => ChunkType::Model.name(),
            ChunkData::ModelHit(_) => ChunkType::ModelHit.name(),
            ChunkData::Material(_) => ChunkType::Material.name(),
            ChunkData::Texture(_) => ChunkType::Texture.name(),
            ChunkData::Dynamics(_) => ChunkType::Dynamics.name(),
            ChunkData::Anm(_) => ChunkType::Anm.name(),
            ChunkData::Camera(_) => ChunkType::Camera.name(),
            ChunkData::LightDirc(_) => ChunkType::LightDirc.name(),
            ChunkData::LightPoint(_) => ChunkType::LightPoint.name(),
            ChunkData::Ambient(_) => ChunkType::Ambient.name(),
        }
    }

    #[inline]
    pub fn is_placeholder(&self) -> bool { matches!(self, ChunkData::Null { .. }) }

    pub fn visit_ids(&mut self, f: &mut dyn FnMut(&mut ChunkId)) {
        match self {
            ChunkData::Clump(v) => v.visit_ids(f),
            ChunkData::Coord(v) => v.visit_ids(f),
            ChunkData::Model(v) => v.visit_ids(f),
            ChunkData::Material(v) => v.visit_ids(f),
            ChunkData::Dynamics(v) => v.visit_ids(f),
            ChunkData::Anm(v) => v.visit_ids(f),
            ChunkData::Null { .. }
            | ChunkData::Unknown { .. }
            | ChunkData::Binary { .. }
            | ChunkData::ModelHit(_)
            | ChunkData::Texture(_)
            | ChunkData::Camera(_)
            | ChunkData::LightDirc(_)
            | ChunkData::LightPoint(_)
            | ChunkData::Ambient(_) => {}
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Chunk {
    pub path: String,
    pub name: String,
    pub version: u16,
    pub data: ChunkData,
}

impl Chunk {
    pub fn new(path: impl Into<String>, name: impl Into<String>, data: ChunkData) -> Self {
        Self { path: path.into(), name: name.into(), version: K_NUCC_VERSION as u16, data }
    }

    /// Reference-only chunk of `type_name`.
    pub fn placeholder(
        type_name: impl Into<String>,
        path: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::new(path, name, ChunkData::Null { type_name: type_name.into() })
    }

    #[inline]
    pub fn type_name(&self) -> &str { self.data.type_name() }

    /// Identity of the chunk: type, path and name.
    #[inline]
    pub fn key(&self) -> (&str, &str, &str) { (self.type_name(), &self.path, &self.name) }
}

impl PartialEq for Chunk {
    fn eq(&self, other: &Self) -> bool { self.key() == other.key() }
}

impl Eq for Chunk {}

/// Another name under which a page refers to a chunk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChunkReference {
    pub name: String,
    pub chunk: ChunkId,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Page {
    /// Chunks whose records this page holds, in record order.
    pub chunks: Vec<ChunkId>,
    pub references: Vec<ChunkReference>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Xfbin {
    pub chunks: Vec<Chunk>,
    pub pages: Vec<Page>,
}

impl Xfbin {
    pub fn new() -> Self { Self::default() }

    pub fn read(data: &[u8]) -> Result<Self> { decode(data) }

    pub fn read_with(data: &[u8], options: &DecodeOptions) -> Result<Self> {
        decode_with(data, options)
    }

    pub fn write(&self) -> Result<Vec<u8>> { encode(self) }

    pub fn add_chunk(&mut self, chunk: Chunk) -> ChunkId {
        self.chunks.push(chunk);
        ChunkId(self.chunks.len() as u32 - 1)
    }

    /// Appends a page holding `chunks`, returning its index.
    pub fn add_page(&mut self, chunks: Vec<ChunkId>) -> usize {
        self.pages.push(Page { chunks, references: Vec::new() });
        self.pages.len() - 1
    }

    #[inline]
    pub fn chunk(&self, id: ChunkId) -> Option<&Chunk> { self.chunks.get(id.index()) }

    #[inline]
    pub fn chunk_mut(&mut self, id: ChunkId) -> Option<&mut Chunk> {
        self.chunks.get_mut(id.index())
    }

    pub fn ids(&self) -> impl Iterator<Item = ChunkId> {
        (0..self.chunks.len() as u32).map(ChunkId)
    }

    pub fn find(&self, type_name: &str, path: &str, name: &str) -> Option<ChunkId> {
        self.chunks
            .iter()
            .position(|c| c.key() == (type_name, path, name))
            .map(|i| ChunkId(i as u32))
    }

    /// First chunk of any type called `name`.
    pub fn find_by_name(&self, name: &str) -> Option<ChunkId> {
        self.chunks.iter().position(|c| c.name == name).map(|i| ChunkId(i as u32))
    }

    pub fn coord(&self, id: ChunkId) -> Option<&Coord> {
        self.chunk(id).and_then(|c| c.data.as_coord())
    }

    pub fn coord_mut(&mut self, id: ChunkId) -> Option<&mut Coord> {
        self.chunk_mut(id).and_then(|c| c.data.as_coord_mut())
    }

    fn check_coord(&self, id: ChunkId) -> Result<()> {
        if self.coord(id).is_none() {
            return Err(XfbinError::Value(format!("chunk {} is not a coord", id.0)).into());
        }
        Ok(())
    }

    /// Makes `child` a child of `parent`, or a root when `parent` is `None`, detaching it from
    /// its previous parent first.
    pub fn attach_coord(&mut self, parent: Option<ChunkId>, child: ChunkId) -> Result<()> {
        self.check_coord(child)?;
        if let Some(parent) = parent {
            self.check_coord(parent)?;
            // Walk up from the new parent to reject cycles
            let mut node = Some(parent);
            while let Some(id) = node {
                if id == child {
                    return Err(XfbinError::Value(format!(
                        "attaching coord {} to {} would create a cycle",
                        child.0, parent.0
                    ))
                    .into());
                }
                node = self.coord(id).and_then(|c| c.parent);
            }
        }
        let old = self.coord(child).and_then(|c| c.parent);
        if let Some(coord) = old.and_then(|id| self.coord_mut(id)) {
            coord.children.retain(|&id| id != child);
        }
        if let Some(coord) = self.coord_mut(child) {
            coord.parent = parent;
        }
        if let Some(coord) = parent.and_then(|id| self.coord_mut(id)) {
            coord.children.push(child);
        }
        Ok(())
    }

    /// Coords of `clump` without a parent.
    pub fn coord_roots(&self, clump: ChunkId) -> Result<Vec<ChunkId>> {
        let clump = self
            .chunk(clump)
            .and_then(|c| c.data.as_clump())
            .ok_or_else(|| XfbinError::Value(format!("chunk {} is not a clump", clump.0)))?;
        Ok(clump
            .coords
            .iter()
            .copied()
            .filter(|&id| self.coord(id).map_or(false, |c| c.parent.is_none()))
            .collect())
    }

    /// Recomputes the coord links derived from bone indices: `Model::coord` from each clump's
    /// models and groups, and the coords of spring groups and collision spheres.
    pub fn resolve_links(&mut self) {
        let mut model_links = Vec::new();
        let mut dynamics_links = Vec::new();
        for (i, chunk) in self.chunks.iter().enumerate() {
            match &chunk.data {
                ChunkData::Clump(clump) => {
                    let grouped = clump.model_groups.iter().flat_map(|g| g.models.iter());
                    for model in clump.models.iter().chain(grouped).flatten().copied() {
                        let Some(index) =
                            self.chunk(model).and_then(|c| c.data.as_model()).map(|m| m.coord_index)
                        else {
                            continue;
                        };
                        model_links.push((model, clump.coords.get(index as usize).copied()));
                    }
                }
                ChunkData::Dynamics(dynamics) => {
                    let coords = dynamics
                        .clump
                        .and_then(|id| self.chunk(id))
                        .and_then(|c| c.data.as_clump())
                        .map(|c| c.coords.clone())
                        .unwrap_or_default();
                    dynamics_links.push((ChunkId(i as u32), coords));
                }
                _ => {}
            }
        }
        for (model, coord) in model_links {
            if let Some(model) = self.chunk_mut(model).and_then(|c| c.data.as_model_mut()) {
                model.coord = coord;
            }
        }
        for (id, coords) in dynamics_links {
            if let Some(dynamics) = self.chunk_mut(id).and_then(|c| c.data.as_dynamics_mut()) {
                dynamics.link_coords(&coords);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{error_kind, ErrorKind};

    fn coord() -> ChunkData { ChunkData::Coord(Coord::default()) }

    #[test]
    fn identity_ignores_payload() {
        let a = Chunk::new("c/1nrt/max", "root", coord());
        let mut b = Chunk::new("c/1nrt/max", "root", coord());
        b.version = 0x70;
        assert_eq!(a, b);
        let c = Chunk::placeholder("nuccChunkCoord", "c/1nrt/max", "root");
        assert_eq!(a, c);
        let d = Chunk::placeholder("nuccChunkModel", "c/1nrt/max", "root");
        assert_ne!(a, d);
    }

    #[test]
    fn attach_and_reparent() {
        let mut xfbin = Xfbin::new();
        let root = xfbin.add_chunk(Chunk::new("p", "root", coord()));
        let a = xfbin.add_chunk(Chunk::new("p", "a", coord()));
        let b = xfbin.add_chunk(Chunk::new("p", "b", coord()));
        xfbin.attach_coord(Some(root), a).unwrap();
        xfbin.attach_coord(Some(root), b).unwrap();
        assert_eq!(xfbin.coord(root).unwrap().children, vec![a, b]);

        xfbin.attach_coord(Some(a), b).unwrap();
        assert_eq!(xfbin.coord(root).unwrap().children, vec![a]);
        assert_eq!(xfbin.coord(a).unwrap().children, vec![b]);
        assert_eq!(xfbin.coord(b).unwrap().parent, Some(a));

        let err = xfbin.attach_coord(Some(b), root).unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::Value));
        xfbin.attach_coord(None, b).unwrap();
        assert!(xfbin.coord(a).unwrap().children.is_empty());
    }

    #[test]
    fn find_by_identity() {
        let mut xfbin = Xfbin::new();
        xfbin.add_chunk(Chunk::new("p", "x", ChunkData::Binary { data: vec![1] }));
        let id = xfbin.add_chunk(Chunk::new("p", "x", coord()));
        assert_eq!(xfbin.find("nuccChunkCoord", "p", "x"), Some(id));
        assert_eq!(xfbin.find("nuccChunkCoord", "q", "x"), None);
        assert_eq!(xfbin.find_by_name("x"), Some(ChunkId(0)));
    }
}
