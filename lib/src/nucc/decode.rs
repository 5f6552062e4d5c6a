use anyhow::{Context, Result};
use binrw::Endian;

use crate::{
    error::{ErrorKind, XfbinError},
    format::{
        chunk::ChunkType,
        xfbin::{RawRecord, RawXfbin},
    },
    nucc::{
        context::DecodeContext, Ambient, Anm, Camera, Chunk, ChunkData, ChunkId, ChunkReference,
        Clump, Coord, Dynamics, LightDirc, LightPoint, Material, Model, ModelHit, NuccChunk, Page,
        Texture, Xfbin,
    },
    util::binary::BinaryCursor,
};

/// What to do with chunk type tags outside the known set.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum UnknownChunkPolicy {
    /// Keep the chunk as [`ChunkData::Unknown`].
    #[default]
    Preserve,
    /// Fail with an unsupported format error.
    Reject,
}

#[derive(Clone, Debug, Default)]
pub struct DecodeOptions {
    pub unknown_chunks: UnknownChunkPolicy,
    /// Keep chunks whose payload uses an unsupported format as [`ChunkData::Unknown`] instead of
    /// failing.
    pub skip_unsupported: bool,
}

pub fn decode(data: &[u8]) -> Result<Xfbin> { decode_with(data, &DecodeOptions::default()) }

pub fn decode_with(data: &[u8], options: &DecodeOptions) -> Result<Xfbin> {
    let raw = RawXfbin::read(data)?;

    // Every content map becomes an arena chunk up front, so references in either direction
    // resolve regardless of record order.
    let mut maps = Vec::with_capacity(raw.maps.len());
    let mut chunks = Vec::new();
    for map in &raw.maps {
        if map.is_framing() {
            maps.push(None);
            continue;
        }
        if ChunkType::parse(&map.type_name).is_none() {
            if options.unknown_chunks == UnknownChunkPolicy::Reject {
                return Err(XfbinError::unsupported("chunk type", &map.type_name))
                    .with_context(|| format!("While decoding chunk '{}' ({})", map.name, map.path));
            }
            log::debug!("Unknown chunk type {} for '{}'", map.type_name, map.name);
        }
        maps.push(Some(ChunkId(chunks.len() as u32)));
        chunks.push(Chunk::placeholder(&map.type_name, &map.path, &map.name));
    }
    let types: Vec<String> = chunks.iter().map(|c| c.type_name().to_string()).collect();

    let mut pages = Vec::with_capacity(raw.pages.len());
    let mut seen = vec![false; chunks.len()];
    let mut ctx = DecodeContext::new(&maps, &types);
    for (page_index, raw_page) in raw.pages.iter().enumerate() {
        log::debug!("Resolving page {page_index}");
        ctx.set_page(&raw_page.index);
        let mut page = Page::default();
        for record in &raw_page.records {
            let Some(id) = maps[record.map as usize] else {
                continue;
            };
            if std::mem::replace(&mut seen[id.index()], true) {
                let chunk = &chunks[id.index()];
                log::warn!(
                    "Ignoring duplicate record for {} '{}' at {:#x}",
                    chunk.type_name(),
                    chunk.name,
                    record.offset
                );
                continue;
            }
            let chunk = &chunks[id.index()];
            let description = format!(
                "{} '{}' ({}) at {:#x}",
                chunk.type_name(),
                chunk.name,
                chunk.path,
                record.offset
            );
            ctx.set_chunk(description.clone());
            let data = decode_payload(&types[id.index()], record, &mut ctx, options)
                .with_context(|| format!("While decoding {description}"))?;
            let chunk = &mut chunks[id.index()];
            chunk.version = record.version;
            chunk.data = data;
            page.chunks.push(id);
        }
        for reference in &raw_page.references {
            match maps[reference.map as usize] {
                Some(chunk) => {
                    page.references.push(ChunkReference { name: reference.name.clone(), chunk })
                }
                None => log::debug!("Dropping reference '{}' to a framing chunk", reference.name),
            }
        }
        pages.push(page);
    }

    let links = std::mem::take(&mut ctx.links);
    drop(ctx);
    let mut xfbin = Xfbin { chunks, pages };
    for link in links {
        if xfbin.coord(link.parent).is_none() {
            continue;
        }
        match xfbin.coord_mut(link.child) {
            Some(child) if child.parent.is_none() => child.parent = Some(link.parent),
            _ => continue,
        }
        if let Some(parent) = xfbin.coord_mut(link.parent) {
            parent.children.push(link.child);
        }
    }
    xfbin.resolve_links();
    Ok(xfbin)
}

fn read_chunk<T: NuccChunk>(data: &[u8], ctx: &mut DecodeContext) -> Result<T> {
    let mut cursor = BinaryCursor::new(data.to_vec(), Endian::Big);
    let value = T::read_data(&mut cursor, ctx)?;
    if !cursor.eof() {
        log::debug!("{} trailing bytes after {}", cursor.remaining(), T::TYPE);
    }
    Ok(value)
}

fn decode_payload(
    type_name: &str,
    record: &RawRecord,
    ctx: &mut DecodeContext,
    options: &DecodeOptions,
) -> Result<ChunkData> {
    if record.data.is_empty() {
        return Ok(ChunkData::Null { type_name: type_name.to_string() });
    }
    let Some(ty) = ChunkType::parse(type_name) else {
        let data = record.data.clone();
        return Ok(ChunkData::Unknown { type_name: type_name.to_string(), data });
    };
    let links = ctx.links.len();
    let data = &record.data;
    let result = match ty {
        ChunkType::Binary => read_binary(data),
        ChunkType::Clump => read_chunk::<Clump>(data, ctx).map(ChunkData::Clump),
        ChunkType::Coord => read_chunk::<Coord>(data, ctx).map(ChunkData::Coord),
        ChunkType::Model => read_chunk::<Model>(data, ctx).map(ChunkData::Model),
        ChunkType::ModelHit => read_chunk::<ModelHit>(data, ctx).map(ChunkData::ModelHit),
        ChunkType::Material => read_chunk::<Material>(data, ctx).map(ChunkData::Material),
        ChunkType::Texture => read_chunk::<Texture>(data, ctx).map(ChunkData::Texture),
        ChunkType::Dynamics => read_chunk::<Dynamics>(data, ctx).map(ChunkData::Dynamics),
        ChunkType::Anm => read_chunk::<Anm>(data, ctx).map(ChunkData::Anm),
        ChunkType::Camera => read_chunk::<Camera>(data, ctx).map(ChunkData::Camera),
        ChunkType::LightDirc => read_chunk::<LightDirc>(data, ctx).map(ChunkData::LightDirc),
        ChunkType::LightPoint => read_chunk::<LightPoint>(data, ctx).map(ChunkData::LightPoint),
        ChunkType::Ambient => read_chunk::<Ambient>(data, ctx).map(ChunkData::Ambient),
        ChunkType::Null | ChunkType::Page | ChunkType::Index => {
            unreachable!("framing records never reach payload decoding")
        }
    };
    match result {
        Err(e)
            if options.skip_unsupported
                && crate::error::error_kind(&e) == Some(ErrorKind::UnsupportedFormat) =>
        {
            log::warn!("Keeping {type_name} as raw bytes: {e:#}");
            ctx.links.truncate(links);
            Ok(ChunkData::Unknown { type_name: type_name.to_string(), data: record.data.clone() })
        }
        result => result,
    }
}

fn read_binary(data: &[u8]) -> Result<ChunkData> {
    let mut cursor = BinaryCursor::new(data.to_vec(), Endian::Big);
    let size = cursor.read::<u32>()?;
    Ok(ChunkData::Binary { data: cursor.read_bytes(size as usize)? })
}
