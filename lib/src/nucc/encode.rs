use anyhow::{Context, Result};
use binrw::Endian;

use crate::{
    error::XfbinError,
    format::{
        chunk::ChunkType,
        xfbin::{RawChunkMap, RawPage, RawRecord, RawReference, RawXfbin},
    },
    nucc::{Chunk, ChunkData, ChunkId, EncodeContext, NuccChunk, Xfbin},
    util::binary::BinaryCursor,
};

fn write_chunk<T: NuccChunk>(value: &T, ctx: &mut EncodeContext) -> Result<Vec<u8>> {
    let mut cursor = BinaryCursor::new(Vec::new(), Endian::Big);
    value.write_data(&mut cursor, ctx)?;
    Ok(cursor.into_inner())
}

fn encode_payload(chunk: &Chunk, ctx: &mut EncodeContext) -> Result<Vec<u8>> {
    match &chunk.data {
        ChunkData::Null { .. } => Ok(Vec::new()),
        ChunkData::Binary { data } => {
            let mut cursor = BinaryCursor::new(Vec::with_capacity(data.len() + 4), Endian::Big);
            let size = u32::try_from(data.len()).map_err(|_| {
                XfbinError::Value(format!("binary chunk too large: {:#x}", data.len()))
            })?;
            cursor.write(size)?;
            cursor.write_bytes(data)?;
            Ok(cursor.into_inner())
        }
        ChunkData::Clump(v) => write_chunk(v, ctx),
        ChunkData::Coord(v) => write_chunk(v, ctx),
        ChunkData::Model(v) => write_chunk(v, ctx),
        ChunkData::ModelHit(v) => write_chunk(v, ctx),
        ChunkData::Material(v) => write_chunk(v, ctx),
        ChunkData::Texture(v) => write_chunk(v, ctx),
        ChunkData::Dynamics(v) => write_chunk(v, ctx),
        ChunkData::Anm(v) => write_chunk(v, ctx),
        ChunkData::Camera(v) => write_chunk(v, ctx),
        ChunkData::LightDirc(v) => write_chunk(v, ctx),
        ChunkData::LightPoint(v) => write_chunk(v, ctx),
        ChunkData::Ambient(v) => write_chunk(v, ctx),
        ChunkData::Unknown { data, .. } => Ok(data.clone()),
    }
}

fn chunk_maps(xfbin: &Xfbin) -> Result<Vec<RawChunkMap>> {
    let mut maps = vec![
        RawChunkMap::new(ChunkType::Null.name(), "", ""),
        RawChunkMap::new(ChunkType::Page.name(), "", "Page0"),
        RawChunkMap::new(ChunkType::Index.name(), "", "index"),
    ];
    for chunk in &xfbin.chunks {
        let map = RawChunkMap::new(chunk.type_name(), &chunk.path, &chunk.name);
        if map.is_framing() {
            return Err(XfbinError::Value(format!(
                "chunk '{}' uses the reserved type {}",
                chunk.name,
                chunk.type_name()
            ))
            .into());
        }
        maps.push(map);
    }
    Ok(maps)
}

/// Serializes the chunk graph. Every arena chunk gets a global chunk map in arena order; each
/// page's index table lists the Null map, then the maps its records use in first-use order, then
/// the Page map.
pub fn encode(xfbin: &Xfbin) -> Result<Vec<u8>> {
    let maps = chunk_maps(xfbin)?;
    let mut ctx = EncodeContext::new(xfbin);
    let mut pages = Vec::with_capacity(xfbin.pages.len());
    for (page_index, page) in xfbin.pages.iter().enumerate() {
        log::debug!("Writing page {page_index} with {} chunks", page.chunks.len());
        let mut records = Vec::with_capacity(page.chunks.len());
        for &id in &page.chunks {
            let chunk = xfbin.chunk(id).ok_or_else(|| missing_chunk(id, xfbin))?;
            let slot = ctx.slot(id)?;
            let data = encode_payload(chunk, &mut ctx).with_context(|| {
                format!("While encoding {} '{}' ({})", chunk.type_name(), chunk.name, chunk.path)
            })?;
            records.push(RawRecord {
                slot,
                map: EncodeContext::map_of(id),
                version: chunk.version,
                unk: 0,
                offset: 0,
                data,
            });
        }
        let references = page
            .references
            .iter()
            .map(|r| match xfbin.chunk(r.chunk) {
                Some(_) => {
                    Ok(RawReference { name: r.name.clone(), map: EncodeContext::map_of(r.chunk) })
                }
                None => Err(missing_chunk(r.chunk, xfbin)),
            })
            .collect::<Result<Vec<_>>>()?;
        pages.push(RawPage { index: ctx.finish_page(), references, records });
    }
    RawXfbin { maps, pages }.write()
}

fn missing_chunk(id: ChunkId, xfbin: &Xfbin) -> anyhow::Error {
    XfbinError::Value(format!(
        "page lists chunk {} outside the table of {}",
        id.0,
        xfbin.chunks.len()
    ))
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        format::xfbin::RawXfbin,
        nucc::{decode, Coord},
    };

    #[test]
    fn index_table_order() {
        let mut xfbin = Xfbin::new();
        let root = Chunk::new("c/bone", "root", ChunkData::Coord(Coord::default()));
        let root = xfbin.add_chunk(root);
        let bin = Chunk::new("c/data", "blob", ChunkData::Binary { data: vec![7; 3] });
        let bin = xfbin.add_chunk(bin);
        xfbin.add_page(vec![bin, root]);

        let raw = RawXfbin::read(&encode(&xfbin).unwrap()).unwrap();
        assert_eq!(raw.maps.len(), 5);
        assert_eq!(raw.maps[4].type_name, "nuccChunkBinary");
        assert_eq!(raw.pages.len(), 1);
        assert_eq!(raw.pages[0].index, vec![0, 4, 3, 1]);
        assert_eq!(raw.pages[0].records[0].slot, 1);
        assert_eq!(raw.pages[0].records[0].data, vec![0, 0, 0, 3, 7, 7, 7]);
        assert_eq!(raw.pages[0].records[1].data.len(), 44);
    }

    #[test]
    fn binary_round_trip() {
        let mut xfbin = Xfbin::new();
        let a = Chunk::new("p", "a", ChunkData::Binary { data: b"hello".to_vec() });
        let a = xfbin.add_chunk(a);
        let b = xfbin.add_chunk(Chunk::placeholder("nuccChunkTexture", "p", "tex"));
        let c = xfbin.add_chunk(Chunk::new("p", "odd", ChunkData::Unknown {
            type_name: "nuccChunkFuture".into(),
            data: vec![1, 2, 3],
        }));
        xfbin.add_page(vec![a, b]);
        xfbin.add_page(vec![c]);
        let alias = crate::nucc::ChunkReference { name: "alias".into(), chunk: a };
        xfbin.pages[1].references.push(alias);

        let bytes = encode(&xfbin).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.chunks.len(), 3);
        assert_eq!(decoded.chunks[0].data, ChunkData::Binary { data: b"hello".to_vec() });
        assert!(decoded.chunks[1].data.is_placeholder());
        assert_eq!(decoded.chunks[2].type_name(), "nuccChunkFuture");
        assert_eq!(decoded.pages, xfbin.pages);
        assert_eq!(encode(&decoded).unwrap(), bytes);
    }

    #[test]
    fn rejects_reserved_types() {
        let mut xfbin = Xfbin::new();
        xfbin.add_chunk(Chunk::placeholder("nuccChunkPage", "", "x"));
        assert!(encode(&xfbin).is_err());
    }
}
