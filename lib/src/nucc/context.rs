use std::collections::HashMap;

use anyhow::Result;

use crate::{
    error::XfbinError,
    format::{
        chunk::ChunkType,
        xfbin::{K_FRAMING_MAP_COUNT, K_MAP_NULL, K_MAP_PAGE},
    },
    nucc::{ChunkId, Xfbin},
};

/// Link between a coord and its parent, applied once every chunk has been decoded.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct CoordLink {
    pub child: ChunkId,
    pub parent: ChunkId,
}

/// State threaded through payload decoding: the global chunk table, the index table of the page
/// being decoded and the links deferred until all chunks exist.
pub struct DecodeContext<'a> {
    /// Global chunk map to arena id; `None` for framing maps.
    maps: &'a [Option<ChunkId>],
    /// Type tag of every arena chunk.
    types: &'a [String],
    /// Current page index table.
    index: &'a [u32],
    chunk: String,
    pub(crate) links: Vec<CoordLink>,
}

impl<'a> DecodeContext<'a> {
    pub(crate) fn new(maps: &'a [Option<ChunkId>], types: &'a [String]) -> Self {
        Self { maps, types, index: &[], chunk: String::new(), links: Vec::new() }
    }

    pub(crate) fn set_page(&mut self, index: &'a [u32]) { self.index = index; }

    /// Names the chunk being decoded in reference errors.
    pub(crate) fn set_chunk(&mut self, description: String) { self.chunk = description; }

    pub fn chunk_count(&self) -> usize { self.types.len() }

    pub fn type_of(&self, id: ChunkId) -> Option<&str> {
        self.types.get(id.index()).map(String::as_str)
    }

    fn reference_error(&self, index: i64, limit: usize) -> anyhow::Error {
        XfbinError::Reference { chunk: self.chunk.clone(), index, limit }.into()
    }

    /// Resolves a page-local slot. Slots of framing maps, the Null map in particular, resolve to
    /// `None`.
    pub fn resolve(&self, slot: u32) -> Result<Option<ChunkId>> {
        let map = *self
            .index
            .get(slot as usize)
            .ok_or_else(|| self.reference_error(slot as i64, self.index.len()))?;
        let id = self
            .maps
            .get(map as usize)
            .ok_or_else(|| self.reference_error(map as i64, self.maps.len()))?;
        Ok(*id)
    }

    /// Resolves a slot that must be empty or point at a chunk of type `ty`.
    pub fn resolve_as(&self, slot: u32, ty: ChunkType) -> Result<Option<ChunkId>> {
        let Some(id) = self.resolve(slot)? else {
            return Ok(None);
        };
        let found = self.type_of(id).unwrap_or_default();
        if found != ty.name() {
            return Err(self.wrong_type(slot, ty.name(), found));
        }
        Ok(Some(id))
    }

    /// Resolves a slot that must point at a chunk of type `ty`.
    pub fn require(&self, slot: u32, ty: ChunkType) -> Result<ChunkId> {
        self.resolve_as(slot, ty)?
            .ok_or_else(|| self.wrong_type(slot, ty.name(), ChunkType::Null.name()))
    }

    /// Reference error for a slot pointing at a chunk of type `found`.
    pub fn wrong_type(&self, slot: u32, expected: impl Into<String>, found: &str) -> anyhow::Error {
        XfbinError::ReferenceType {
            chunk: self.chunk.clone(),
            index: slot as i64,
            expected: expected.into(),
            found: found.to_string(),
        }
        .into()
    }

    pub(crate) fn link_coord(&mut self, child: ChunkId, parent: ChunkId) {
        self.links.push(CoordLink { child, parent });
    }

    /// Reference error against the current chunk, for index spaces local to a payload.
    pub fn out_of_range(&self, index: i64, limit: usize) -> anyhow::Error {
        self.reference_error(index, limit)
    }
}

/// State threaded through payload encoding: allocates page-local slots on first use.
pub struct EncodeContext<'a> {
    xfbin: &'a Xfbin,
    index: Vec<u32>,
    slots: HashMap<u32, u32>,
}

impl<'a> EncodeContext<'a> {
    pub(crate) fn new(xfbin: &'a Xfbin) -> Self {
        let mut ctx = Self { xfbin, index: Vec::new(), slots: HashMap::new() };
        ctx.begin_page();
        ctx
    }

    #[inline]
    pub fn xfbin(&self) -> &'a Xfbin { self.xfbin }

    /// Global chunk map of an arena chunk.
    #[inline]
    pub fn map_of(id: ChunkId) -> u32 { id.0 + K_FRAMING_MAP_COUNT }

    fn slot_of_map(&mut self, map: u32) -> u32 {
        let next = self.index.len() as u32;
        let index = &mut self.index;
        *self.slots.entry(map).or_insert_with(|| {
            index.push(map);
            next
        })
    }

    pub(crate) fn begin_page(&mut self) {
        self.index.clear();
        self.slots.clear();
        self.slot_of_map(K_MAP_NULL);
    }

    /// Closes the page: the Page map takes the last slot. Returns the page index table.
    pub(crate) fn finish_page(&mut self) -> Vec<u32> {
        self.slot_of_map(K_MAP_PAGE);
        let index = std::mem::take(&mut self.index);
        self.begin_page();
        index
    }

    pub fn slot(&mut self, id: ChunkId) -> Result<u32> {
        if self.xfbin.chunk(id).is_none() {
            return Err(XfbinError::Value(format!(
                "reference to chunk {} outside the table of {}",
                id.0,
                self.xfbin.chunks.len()
            ))
            .into());
        }
        Ok(self.slot_of_map(Self::map_of(id)))
    }

    /// Slot of `id`, or the Null slot for `None`.
    pub fn slot_opt(&mut self, id: Option<ChunkId>) -> Result<u32> {
        match id {
            Some(id) => self.slot(id),
            None => Ok(self.slot_of_map(K_MAP_NULL)),
        }
    }
}
