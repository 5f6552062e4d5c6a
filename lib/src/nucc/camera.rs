//! Cameras and lights: fixed-size records without chunk references.
use anyhow::Result;
use binrw::binrw;
use serde_derive::Serialize;

use crate::{
    format::chunk::ChunkType,
    nucc::{DecodeContext, EncodeContext, NuccChunk},
    util::binary::BinaryCursor,
};

#[binrw]
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct Camera {
    pub field00: u32,
    /// Vertical field of view in degrees.
    pub fov: f32,
}

#[binrw]
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct LightDirc {
    pub color: [f32; 3],
    pub energy: f32,
}

#[binrw]
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct LightPoint {
    pub color: [f32; 3],
    pub energy: f32,
    pub radius: f32,
    pub cutoff: f32,
}

#[binrw]
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct Ambient {
    /// RGBA.
    pub color: [f32; 4],
}

macro_rules! record_chunk {
    ($($ty:ident),* $(,)?) => {$(
        impl NuccChunk for $ty {
            const TYPE: ChunkType = ChunkType::$ty;

            fn read_data(cursor: &mut BinaryCursor, _ctx: &mut DecodeContext) -> Result<Self> {
                cursor.read_struct()
            }

            fn write_data(
                &self,
                cursor: &mut BinaryCursor,
                _ctx: &mut EncodeContext,
            ) -> Result<()> {
                cursor.write_struct(self)
            }
        }
    )*};
}

record_chunk!(Camera, LightDirc, LightPoint, Ambient);
