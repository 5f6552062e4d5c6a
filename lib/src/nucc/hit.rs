use anyhow::Result;
use serde_derive::Serialize;

use crate::{
    error::XfbinError,
    format::chunk::ChunkType,
    nucc::{DecodeContext, EncodeContext, NuccChunk},
    util::binary::BinaryCursor,
};

/// Triangle list used for collision.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ModelHitMesh {
    pub flags: [u8; 4],
    /// Three vertices per triangle.
    pub vertices: Vec<[f32; 3]>,
}

impl ModelHitMesh {
    pub fn new(flags: [u8; 4], vertices: Vec<[f32; 3]>) -> Result<Self> {
        let mesh = Self { flags, vertices };
        mesh.validate()?;
        Ok(mesh)
    }

    fn validate(&self) -> Result<()> {
        if self.vertices.len() % 3 != 0 {
            return Err(XfbinError::Value(format!(
                "{} vertices do not form whole triangles",
                self.vertices.len()
            ))
            .into());
        }
        Ok(())
    }

    pub fn triangles(&self) -> impl Iterator<Item = &[[f32; 3]]> { self.vertices.chunks_exact(3) }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ModelHit {
    pub meshes: Vec<ModelHitMesh>,
}

impl NuccChunk for ModelHit {
    const TYPE: ChunkType = ChunkType::ModelHit;

    fn read_data(cursor: &mut BinaryCursor, _ctx: &mut DecodeContext) -> Result<Self> {
        let mesh_count = cursor.read::<u32>()?;
        let total = cursor.read::<u32>()?;
        let mut counts = Vec::with_capacity(mesh_count.min(0x1000) as usize);
        for _ in 0..mesh_count {
            let offset = cursor.pos();
            let count = cursor.read::<u32>()?;
            if count % 3 != 0 {
                return Err(XfbinError::malformed(
                    "hit mesh",
                    offset,
                    format!("vertex count {count} is not a multiple of 3"),
                )
                .into());
            }
            counts.push((count, cursor.read_array::<u8, 4>()?));
        }
        let sum = counts.iter().map(|&(count, _)| count as u64).sum::<u64>();
        if sum != total as u64 {
            return Err(XfbinError::malformed(
                "hit mesh",
                4,
                format!("meshes hold {sum} vertices, header says {total}"),
            )
            .into());
        }
        let mut meshes = Vec::with_capacity(counts.len());
        for (count, flags) in counts {
            let mut vertices = Vec::with_capacity(count as usize);
            for _ in 0..count {
                vertices.push(cursor.read_array::<f32, 3>()?);
            }
            meshes.push(ModelHitMesh { flags, vertices });
        }
        Ok(Self { meshes })
    }

    fn write_data(&self, cursor: &mut BinaryCursor, _ctx: &mut EncodeContext) -> Result<()> {
        for mesh in &self.meshes {
            mesh.validate()?;
        }
        let total = self.meshes.iter().map(|m| m.vertices.len()).sum::<usize>();
        cursor.write(self.meshes.len() as u32)?;
        cursor.write(total as u32)?;
        for mesh in &self.meshes {
            cursor.write(mesh.vertices.len() as u32)?;
            cursor.write_slice(&mesh.flags)?;
        }
        for vertex in self.meshes.iter().flat_map(|m| &m.vertices) {
            cursor.write_slice(vertex)?;
        }
        Ok(())
    }
}
