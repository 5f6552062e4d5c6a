//! Outer XFBIN structure: the NUCC header, the chunk table and the pages of chunk records.
//!
//! The framer only deals with raw records. Payloads stay opaque bytes and the page-local slot of
//! every record is mapped to its global chunk map; reference fields inside payloads are resolved
//! later by [`crate::nucc`].
use std::io::Write;

use anyhow::{Context, Result};
use binrw::{binrw, Endian};
use indexmap::IndexSet;

use crate::{
    error::XfbinError,
    format::{
        chunk::{is_framing_type, ChunkDescriptor, ChunkType},
        FourCC,
    },
    util::binary::BinaryCursor,
};

pub const K_NUCC_MAGIC: FourCC = FourCC(*b"NUCC");
pub const K_NUCC_VERSION: u32 = 0x79;
pub const K_NUCC_HEADER_SIZE: u64 = 28;

/// Global map indices of the framing maps every encoded file starts with.
pub const K_MAP_NULL: u32 = 0;
pub const K_MAP_PAGE: u32 = 1;
pub const K_MAP_INDEX: u32 = 2;
pub const K_FRAMING_MAP_COUNT: u32 = 3;

#[binrw]
#[derive(Clone, Debug)]
pub struct SXfbinHeader {
    pub nucc_id: u32,
    #[brw(pad_before = 8)]
    pub chunk_table_size: u32,
    pub min_page_size: u32,
    pub nucc_id2: u16,
    pub unk: u16,
}

impl Default for SXfbinHeader {
    fn default() -> Self {
        Self {
            nucc_id: K_NUCC_VERSION,
            chunk_table_size: 0,
            min_page_size: 3,
            nucc_id2: K_NUCC_VERSION as u16,
            unk: 0,
        }
    }
}

#[binrw]
#[derive(Clone, Debug, Default)]
pub struct SChunkTableHeader {
    pub type_count: u32,
    pub type_size: u32,
    pub path_count: u32,
    pub path_size: u32,
    pub name_count: u32,
    pub name_size: u32,
    pub map_count: u32,
    pub map_size: u32,
    pub map_index_count: u32,
    pub reference_count: u32,
}

#[binrw]
#[derive(Copy, Clone, Debug)]
pub struct SChunkMap {
    pub type_index: u32,
    pub path_index: u32,
    pub name_index: u32,
}

#[binrw]
#[derive(Copy, Clone, Debug)]
pub struct SChunkReference {
    pub name_index: u32,
    pub map_index: u32,
}

#[binrw]
#[derive(Copy, Clone, Debug, Default)]
pub struct SPageInfo {
    pub slot_count: u32,
    pub reference_count: u32,
}

/// A global chunk table entry with its strings resolved.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct RawChunkMap {
    pub type_name: String,
    pub path: String,
    pub name: String,
}

impl RawChunkMap {
    pub fn new(
        type_name: impl Into<String>,
        path: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self { type_name: type_name.into(), path: path.into(), name: name.into() }
    }

    pub fn is_framing(&self) -> bool { is_framing_type(&self.type_name) }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawReference {
    pub name: String,
    /// Global chunk map index.
    pub map: u32,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawRecord {
    /// Page-local slot as stored.
    pub slot: u32,
    /// Global chunk map index, resolved through the page index table.
    pub map: u32,
    pub version: u16,
    pub unk: u16,
    /// File offset of the record header.
    pub offset: u64,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RawPage {
    /// Page index table: local slot to global chunk map.
    pub index: Vec<u32>,
    pub references: Vec<RawReference>,
    /// Content records, framing records excluded.
    pub records: Vec<RawRecord>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RawXfbin {
    pub maps: Vec<RawChunkMap>,
    pub pages: Vec<RawPage>,
}

fn read_strings(
    cursor: &mut BinaryCursor,
    count: u32,
    size: u32,
    what: &'static str,
) -> Result<Vec<String>> {
    let start = cursor.pos();
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        out.push(cursor.read_cstr().with_context(|| format!("While reading {what} strings"))?);
    }
    let read = cursor.pos() - start;
    if read != size as u64 {
        return Err(XfbinError::malformed(
            "chunk table",
            start,
            format!("{what} block is {read:#x} bytes, header says {size:#x}"),
        )
        .into());
    }
    Ok(out)
}

fn lookup<'a>(strings: &'a [String], index: u32, what: &str) -> Result<&'a str> {
    strings.get(index as usize).map(String::as_str).ok_or_else(|| {
        XfbinError::Reference {
            chunk: format!("{what} string table"),
            index: index as i64,
            limit: strings.len(),
        }
        .into()
    })
}

impl RawXfbin {
    pub fn read(data: &[u8]) -> Result<Self> {
        let magic = FourCC::from_bytes(data).ok_or(XfbinError::OutOfBounds {
            offset: 0,
            len: 4,
            size: data.len() as u64,
        })?;
        if magic != K_NUCC_MAGIC {
            return Err(XfbinError::BadMagic {
                offset: 0,
                expected: K_NUCC_MAGIC.to_string(),
                found: magic.to_string(),
            }
            .into());
        }
        let mut cursor = BinaryCursor::new(data.to_vec(), Endian::Big);
        cursor.seek_to(4);
        let header: SXfbinHeader = cursor.read_struct().context("While reading NUCC header")?;
        log::debug!(
            "NUCC version {:#x}, chunk table {:#x} bytes",
            header.nucc_id,
            header.chunk_table_size
        );

        let table_start = cursor.pos();
        let table: SChunkTableHeader = cursor.read_struct().context("While reading chunk table")?;
        let types = read_strings(&mut cursor, table.type_count, table.type_size, "type")?;
        let paths = read_strings(&mut cursor, table.path_count, table.path_size, "path")?;
        let names = read_strings(&mut cursor, table.name_count, table.name_size, "name")?;
        cursor.align_pos(4)?;

        let mut maps = Vec::with_capacity(table.map_count as usize);
        for _ in 0..table.map_count {
            let map: SChunkMap = cursor.read_struct().context("While reading chunk maps")?;
            maps.push(RawChunkMap::new(
                lookup(&types, map.type_index, "type")?,
                lookup(&paths, map.path_index, "path")?,
                lookup(&names, map.name_index, "name")?,
            ));
        }
        let mut references = Vec::with_capacity(table.reference_count as usize);
        for _ in 0..table.reference_count {
            let reference: SChunkReference = cursor.read_struct()?;
            references.push(RawReference {
                name: lookup(&names, reference.name_index, "name")?.to_string(),
                map: reference.map_index,
            });
        }
        let map_indices = cursor.read_vec::<u32>(table.map_index_count as usize)?;
        for (i, &map) in map_indices.iter().enumerate() {
            if map as usize >= maps.len() {
                return Err(XfbinError::Reference {
                    chunk: format!("page index table entry {i}"),
                    index: map as i64,
                    limit: maps.len(),
                }
                .into());
            }
        }
        for reference in &references {
            if reference.map as usize >= maps.len() {
                return Err(XfbinError::Reference {
                    chunk: format!("chunk reference {:?}", reference.name),
                    index: reference.map as i64,
                    limit: maps.len(),
                }
                .into());
            }
        }

        let pages_start = K_NUCC_HEADER_SIZE + header.chunk_table_size as u64;
        if cursor.pos() - table_start != header.chunk_table_size as u64 {
            log::debug!(
                "Chunk table ends at {:#x}, header places pages at {:#x}",
                cursor.pos(),
                pages_start
            );
        }
        let pages = read_pages(data, pages_start, &maps, &map_indices, &references)?;
        Ok(Self { maps, pages })
    }

    pub fn write(&self) -> Result<Vec<u8>> {
        let mut types = IndexSet::<&str>::new();
        let mut paths = IndexSet::<&str>::new();
        let mut names = IndexSet::<&str>::new();
        let mut maps = Vec::with_capacity(self.maps.len());
        for map in &self.maps {
            maps.push(SChunkMap {
                type_index: types.insert_full(&map.type_name).0 as u32,
                path_index: paths.insert_full(&map.path).0 as u32,
                name_index: names.insert_full(&map.name).0 as u32,
            });
        }
        let mut references = Vec::new();
        let mut map_indices = Vec::new();
        for page in &self.pages {
            for reference in &page.references {
                references.push(SChunkReference {
                    name_index: names.insert_full(&reference.name).0 as u32,
                    map_index: reference.map,
                });
            }
            map_indices.extend_from_slice(&page.index);
        }

        let block_size =
            |set: &IndexSet<&str>| set.iter().map(|s| s.len() + 1).sum::<usize>() as u32;
        let table = SChunkTableHeader {
            type_count: types.len() as u32,
            type_size: block_size(&types),
            path_count: paths.len() as u32,
            path_size: block_size(&paths),
            name_count: names.len() as u32,
            name_size: block_size(&names),
            map_count: maps.len() as u32,
            map_size: maps.len() as u32 * 12,
            map_index_count: map_indices.len() as u32,
            reference_count: references.len() as u32,
        };

        let mut cursor = BinaryCursor::new(Vec::new(), Endian::Big);
        cursor.write_bytes(&K_NUCC_MAGIC.0)?;
        cursor.write_struct(&SXfbinHeader::default())?;
        let table_start = cursor.pos();
        cursor.write_struct(&table)?;
        for s in types.iter().chain(paths.iter()).chain(names.iter()) {
            cursor.write_cstr(s)?;
        }
        cursor.align(4)?;
        for map in &maps {
            cursor.write_struct(map)?;
        }
        for reference in &references {
            cursor.write_struct(reference)?;
        }
        cursor.write_slice(&map_indices)?;
        let table_size = (cursor.pos() - table_start) as u32;
        cursor.with_pos(4, |c| {
            c.write_struct(&SXfbinHeader { chunk_table_size: table_size, ..Default::default() })
        })?;

        for (i, page) in self.pages.iter().enumerate() {
            write_page(&mut cursor, page).with_context(|| format!("While writing page {i}"))?;
        }
        Ok(cursor.into_inner())
    }
}

fn read_pages(
    data: &[u8],
    start: u64,
    maps: &[RawChunkMap],
    map_indices: &[u32],
    references: &[RawReference],
) -> Result<Vec<RawPage>> {
    let mut pages = Vec::new();
    let mut offset = start;
    let mut remain = data.get(start as usize..).ok_or(XfbinError::OutOfBounds {
        offset: start,
        len: 0,
        size: data.len() as u64,
    })?;
    let mut index_start = 0usize;
    let mut reference_start = 0usize;
    let mut page = RawPage::default();
    let mut open = false;
    while !remain.is_empty() {
        let (header, payload, rest) = ChunkDescriptor::slice(remain, offset)?;
        let slot = header.map_index.get();
        let map = index_start
            .checked_add(slot as usize)
            .and_then(|i| map_indices.get(i))
            .copied()
            .ok_or_else(|| XfbinError::Reference {
                chunk: format!("record at {offset:#x}"),
                index: slot as i64,
                limit: map_indices.len() - index_start.min(map_indices.len()),
            })?;
        let chunk_map = &maps[map as usize];
        open = true;
        match ChunkType::parse(&chunk_map.type_name) {
            Some(ChunkType::Page) => {
                let info: SPageInfo = BinaryCursor::new(payload.to_vec(), Endian::Big)
                    .read_struct()
                    .with_context(|| format!("While reading page terminator at {offset:#x}"))?;
                let index_end = index_start + info.slot_count as usize;
                let reference_end = reference_start + info.reference_count as usize;
                if index_end > map_indices.len() || reference_end > references.len() {
                    return Err(XfbinError::malformed(
                        "page",
                        offset,
                        format!(
                            "page needs {} slots and {} references past the chunk table",
                            info.slot_count, info.reference_count
                        ),
                    )
                    .into());
                }
                page.index = map_indices[index_start..index_end].to_vec();
                page.references = references[reference_start..reference_end].to_vec();
                if let Some(record) = page.records.iter().find(|r| r.slot >= info.slot_count) {
                    return Err(XfbinError::Reference {
                        chunk: format!("record at {:#x}", record.offset),
                        index: record.slot as i64,
                        limit: info.slot_count as usize,
                    }
                    .into());
                }
                log::debug!(
                    "Page {}: {} records, {} slots, {} references",
                    pages.len(),
                    page.records.len(),
                    info.slot_count,
                    info.reference_count
                );
                pages.push(std::mem::take(&mut page));
                index_start = index_end;
                reference_start = reference_end;
                open = false;
            }
            Some(ChunkType::Null) | Some(ChunkType::Index) => {}
            _ => page.records.push(RawRecord {
                slot,
                map,
                version: header.version.get(),
                unk: header.unk.get(),
                offset,
                data: payload.to_vec(),
            }),
        }
        offset += (remain.len() - rest.len()) as u64;
        remain = rest;
    }
    if open {
        return Err(XfbinError::malformed("page", offset, "records after the last page terminator")
            .into());
    }
    Ok(pages)
}

fn framing_slot(page: &RawPage, map: u32) -> Result<u32> {
    page.index.iter().position(|&m| m == map).map(|slot| slot as u32).ok_or_else(|| {
        XfbinError::Value(format!("page index table has no slot for framing map {map}")).into()
    })
}

fn write_page(cursor: &mut BinaryCursor, page: &RawPage) -> Result<()> {
    let version = K_NUCC_VERSION as u16;
    ChunkDescriptor::new(framing_slot(page, K_MAP_NULL)?, version).write(cursor, |_| Ok(()))?;
    for record in &page.records {
        let mut desc = ChunkDescriptor::new(record.slot, record.version);
        desc.unk.set(record.unk);
        desc.write(cursor, |w| {
            w.write_all(&record.data)?;
            Ok(())
        })?;
    }
    let info = SPageInfo {
        slot_count: page.index.len() as u32,
        reference_count: page.references.len() as u32,
    };
    ChunkDescriptor::new(framing_slot(page, K_MAP_PAGE)?, version)
        .write(cursor, |w| w.write_struct(&info))
}
