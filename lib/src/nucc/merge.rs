use std::collections::HashSet;

use anyhow::Result;

use crate::{
    error::XfbinError,
    nucc::{Chunk, ChunkData, ChunkId, Xfbin},
};

/// What [`merge`] takes from the incoming graph.
#[derive(Clone, Debug)]
pub struct MergePolicy {
    /// Matched chunks take the incoming payload, unless the incoming chunk is a placeholder.
    pub replace_payloads: bool,
    /// Unmatched incoming chunks are appended.
    pub add_missing: bool,
}

impl Default for MergePolicy {
    fn default() -> Self { Self { replace_payloads: true, add_missing: true } }
}

/// Merges `incoming` into a copy of `existing`, matching chunks by identity.
///
/// References inside copied payloads are remapped into the result. A reference to an incoming
/// chunk that is neither matched nor added becomes a placeholder of that chunk. Incoming chunks
/// that no existing page holds go to a new page.
pub fn merge(existing: &Xfbin, incoming: &Xfbin, policy: &MergePolicy) -> Result<Xfbin> {
    let mut out = existing.clone();
    let mut remap: Vec<Option<ChunkId>> =
        incoming.chunks.iter().map(|c| out.find(c.type_name(), &c.path, &c.name)).collect();
    let mut added = HashSet::new();
    if policy.add_missing {
        for (chunk, slot) in incoming.chunks.iter().zip(remap.iter_mut()) {
            if slot.is_none() {
                let placeholder = Chunk::placeholder(chunk.type_name(), &chunk.path, &chunk.name);
                let id = out.add_chunk(placeholder);
                log::debug!("Adding {} '{}'", chunk.type_name(), chunk.name);
                added.insert(id);
                *slot = Some(id);
            }
        }
    }

    let matched = remap.clone();
    let mut copies = Vec::new();
    let mut coord_links = Vec::new();
    for (chunk, target) in incoming.chunks.iter().zip(matched.iter().copied()) {
        let Some(target) = target else {
            continue;
        };
        if chunk.data.is_placeholder() || !(added.contains(&target) || policy.replace_payloads) {
            continue;
        }
        let mut data = chunk.data.clone();
        let mut refs = Vec::new();
        data.visit_ids(&mut |id| refs.push(*id));
        for id in refs {
            let source = incoming.chunk(id).ok_or_else(|| {
                XfbinError::Value(format!(
                    "'{}' refers to chunk {} outside the table of {}",
                    chunk.name,
                    id.0,
                    incoming.chunks.len()
                ))
            })?;
            if remap[id.index()].is_none() {
                let placeholder =
                    Chunk::placeholder(source.type_name(), &source.path, &source.name);
                remap[id.index()] = Some(out.add_chunk(placeholder));
            }
        }
        data.visit_ids(&mut |id| {
            if let Some(mapped) = remap[id.index()] {
                *id = mapped;
            }
        });
        // Coords keep their current links until the forest is edited below
        if let ChunkData::Coord(coord) = &mut data {
            let (parent, children) =
                out.coord(target).map(|c| (c.parent, c.children.clone())).unwrap_or_default();
            let parent = std::mem::replace(&mut coord.parent, parent);
            let children = std::mem::replace(&mut coord.children, children);
            coord_links.push((target, parent, children));
        }
        copies.push((target, chunk.version, data));
    }
    for (target, version, data) in copies {
        if let Some(chunk) = out.chunk_mut(target) {
            log::debug!("Replacing {} '{}'", chunk.type_name(), chunk.name);
            chunk.version = version;
            chunk.data = data;
        }
    }
    for (target, parent, children) in coord_links {
        let parent = parent.filter(|&id| out.coord(id).is_some());
        out.attach_coord(parent, target)?;
        for child in children {
            if out.coord(child).is_some() {
                out.attach_coord(Some(target), child)?;
            }
        }
    }

    let paged: HashSet<ChunkId> = out.pages.iter().flat_map(|p| p.chunks.iter().copied()).collect();
    let mut page = Vec::new();
    for id in incoming.pages.iter().flat_map(|p| &p.chunks) {
        if let Some(target) = matched.get(id.index()).copied().flatten() {
            if !paged.contains(&target) && !page.contains(&target) {
                page.push(target);
            }
        }
    }
    if !page.is_empty() {
        out.add_page(page);
    }
    out.resolve_links();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nucc::{Coord, Material, Texture, TextureGroup};

    fn texture(width: u16) -> ChunkData {
        ChunkData::Texture(Texture { width, ..Default::default() })
    }

    fn material(textures: Vec<ChunkId>) -> ChunkData {
        ChunkData::Material(Material::new(vec![TextureGroup::new(textures)]).unwrap())
    }

    fn existing() -> Xfbin {
        let mut xfbin = Xfbin::new();
        let tex = xfbin.add_chunk(Chunk::new("c/tex", "body", texture(64)));
        let mat = xfbin.add_chunk(Chunk::new("c/mat", "body", material(vec![tex])));
        xfbin.add_page(vec![tex, mat]);
        xfbin
    }

    fn incoming() -> Xfbin {
        let mut xfbin = Xfbin::new();
        let face = xfbin.add_chunk(Chunk::new("c/tex", "face", texture(32)));
        let body = xfbin.add_chunk(Chunk::new("c/tex", "body", texture(128)));
        let mat = xfbin.add_chunk(Chunk::new("c/mat", "face", material(vec![face, body])));
        xfbin.add_page(vec![face, body, mat]);
        xfbin
    }

    fn width(xfbin: &Xfbin, id: ChunkId) -> u16 {
        xfbin.chunk(id).and_then(|c| c.data.as_texture()).map(|t| t.width).unwrap()
    }

    #[test]
    fn replaces_and_adds() {
        let existing = existing();
        let merged = merge(&existing, &incoming(), &MergePolicy::default()).unwrap();
        assert_eq!(merged.chunks.len(), 4);
        assert_eq!(width(&merged, ChunkId(0)), 128);
        let face = merged.find("nuccChunkTexture", "c/tex", "face").unwrap();
        assert_eq!(width(&merged, face), 32);
        let mat = merged.find("nuccChunkMaterial", "c/mat", "face").unwrap();
        let material = merged.chunk(mat).and_then(|c| c.data.as_material()).unwrap();
        assert_eq!(material.texture_groups[0].textures, vec![face, ChunkId(0)]);
        assert_eq!(merged.pages.len(), 2);
        assert_eq!(merged.pages[1].chunks, vec![face, mat]);
        // The inputs are untouched
        assert_eq!(width(&existing, ChunkId(0)), 64);
    }

    #[test]
    fn keeps_payloads_when_asked() {
        let policy = MergePolicy { replace_payloads: false, add_missing: false };
        let merged = merge(&existing(), &incoming(), &policy).unwrap();
        assert_eq!(merged.chunks.len(), 2);
        assert_eq!(width(&merged, ChunkId(0)), 64);
        assert_eq!(merged.pages.len(), 1);
    }

    #[test]
    fn unmatched_references_become_placeholders() {
        let policy = MergePolicy { replace_payloads: true, add_missing: false };
        let mut incoming = incoming();
        // Replace the existing material with one pointing at a texture the merge does not add
        incoming.chunks[2].name = "body".into();
        let merged = merge(&existing(), &incoming, &policy).unwrap();
        assert_eq!(merged.chunks.len(), 3);
        assert!(merged.chunks[2].data.is_placeholder());
        assert_eq!(merged.chunks[2].name, "face");
        let material = merged.chunks[1].data.as_material().unwrap();
        assert_eq!(material.texture_groups[0].textures, vec![ChunkId(2), ChunkId(0)]);
        // Only referenced, so it stays off the pages
        assert_eq!(merged.pages.len(), 1);
    }

    #[test]
    fn replaced_coords_move_in_the_forest() {
        let coord = || ChunkData::Coord(Coord::default());
        let mut existing = Xfbin::new();
        let hips = existing.add_chunk(Chunk::new("c/anm", "hips", coord()));
        let chest = existing.add_chunk(Chunk::new("c/anm", "chest", coord()));
        let arm = existing.add_chunk(Chunk::new("c/anm", "arm", coord()));
        existing.attach_coord(Some(hips), arm).unwrap();
        existing.add_page(vec![hips, chest, arm]);

        let mut incoming = Xfbin::new();
        let new_chest = incoming.add_chunk(Chunk::new("c/anm", "chest", coord()));
        let new_arm = incoming.add_chunk(Chunk::new("c/anm", "arm", coord()));
        incoming.attach_coord(Some(new_chest), new_arm).unwrap();
        incoming.add_page(vec![new_chest, new_arm]);

        let policy = MergePolicy { replace_payloads: true, add_missing: false };
        let merged = merge(&existing, &incoming, &policy).unwrap();
        assert_eq!(merged.chunks.len(), 3);
        assert!(merged.coord(hips).unwrap().children.is_empty());
        assert_eq!(merged.coord(chest).unwrap().parent, None);
        assert_eq!(merged.coord(chest).unwrap().children, vec![arm]);
        assert_eq!(merged.coord(arm).unwrap().parent, Some(chest));
        // The existing forest is untouched
        assert_eq!(existing.coord(hips).unwrap().children, vec![arm]);
    }
}
