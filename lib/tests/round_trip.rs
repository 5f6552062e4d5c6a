use xfbinlib::{
    decode, encode,
    format::{
        curve::{AnmCurve, EAnmCurveFormat, EAnmEntryFormat, Sample, Value},
        nut::{ENutPixelFormat, Nut, NutTexture},
    },
    nucc::{
        Anm, AnmClump, AnmCoord, AnmCoordLink, AnmEntry, AnmEntryTarget, Camera, Chunk, ChunkData,
        ChunkId, Clump, ClumpModelGroup, CollisionSphere, Coord, Dynamics, LightPoint, Material,
        Model, ModelHit, ModelHitMesh, SpringGroup, Texture, TextureGroup,
    },
    Xfbin,
};

struct Character {
    xfbin: Xfbin,
    root: ChunkId,
    arm: ChunkId,
    hand: ChunkId,
    clump: ChunkId,
    model: ChunkId,
    anm: ChunkId,
}

fn nut() -> Nut {
    Nut {
        textures: vec![NutTexture {
            pixel_format: ENutPixelFormat::Dxt1,
            width: 4,
            height: 4,
            cubemap_format: 0,
            hash_id: 0x8000_0001,
            mipmap_count: 1,
            mipmap_sizes: vec![16],
            data: [[0x5A; 8], [0; 8]].concat(),
        }],
        ..Default::default()
    }
}

fn bone_track(samples: &[(i32, [f32; 3])]) -> AnmCurve {
    let samples: Vec<Sample> =
        samples.iter().map(|&(frame, v)| Sample { frame, value: Value::Vec3(v) }).collect();
    AnmCurve::from_samples(0, EAnmCurveFormat::Vector3Linear, 100, &samples).unwrap()
}

fn character() -> Character {
    let path = "c/1nrt/max/1nrtbod1.max";
    let mut xfbin = Xfbin::new();
    let coord = |pos| ChunkData::Coord(Coord::new(pos, [0.0; 3], [1.0; 3]));
    let root = xfbin.add_chunk(Chunk::new(path, "root", coord([0.0; 3])));
    let arm = xfbin.add_chunk(Chunk::new(path, "arm", coord([0.0, 1.5, 0.0])));
    let hand = xfbin.add_chunk(Chunk::new(path, "hand", coord([0.4, 0.0, 0.0])));
    let tex = xfbin.add_chunk(Chunk::new(
        "c/1nrt/tex/1nrtbod1.nut",
        "1nrtbod1",
        ChunkData::Texture(Texture { width: 4, height: 4, nut: Some(nut()), ..Default::default() }),
    ));
    let shared = xfbin.add_chunk(Chunk::placeholder("nuccChunkTexture", "c/cmn/tex", "eye"));
    let mut material = Material::new(vec![TextureGroup::new(vec![tex, shared])]).unwrap();
    material.falloff = Some(0.25);
    material.uv_offsets[1] = Some([0.0, 0.0, 1.0, 1.0]);
    let mat = xfbin.add_chunk(Chunk::new(path, "body_mat", ChunkData::Material(material)));
    let triangle = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
    let hit = xfbin.add_chunk(Chunk::new(
        path,
        "body_hit",
        ChunkData::ModelHit(ModelHit {
            meshes: vec![ModelHitMesh::new([1, 0, 0, 0], triangle).unwrap()],
        }),
    ));
    let clump = ChunkId(xfbin.chunks.len() as u32 + 1);
    let mut model = Model::new(clump, 1, vec![mat], vec![0xDE, 0xAD, 0xBE, 0xEF, 0x01]);
    model.hit = Some(hit);
    let model = xfbin.add_chunk(Chunk::new(path, "body", ChunkData::Model(model)));
    let mut body = Clump::new(vec![root, arm, hand], vec![Some(model)]);
    let group = ClumpModelGroup { flags: [0, 1], unk: 0, models: vec![None, Some(model)] };
    body.model_groups.push(group);
    assert_eq!(xfbin.add_chunk(Chunk::new(path, "root", ChunkData::Clump(body))), clump);
    xfbin.attach_coord(Some(root), arm).unwrap();
    xfbin.attach_coord(Some(arm), hand).unwrap();

    let dynamics = Dynamics {
        clump: Some(clump),
        spring_groups: vec![SpringGroup {
            bounciness: 0.5,
            coord_index: 2,
            bones: vec![2],
            ..Default::default()
        }],
        collisions: vec![CollisionSphere {
            scale: [0.2; 3],
            coord_index: 1,
            attached_groups: Some(vec![0]),
            ..Default::default()
        }],
    };
    xfbin.add_chunk(Chunk::new(path, "root", ChunkData::Dynamics(dynamics)));
    let camera = xfbin.add_chunk(Chunk::new(
        "c/1nrt/cam",
        "camera",
        ChunkData::Camera(Camera { field00: 0, fov: 45.0 }),
    ));
    let light = LightPoint { color: [1.0; 3], energy: 2.0, radius: 5.0, cutoff: 0.1 };
    let light = xfbin.add_chunk(Chunk::new("c/1nrt/light", "point", ChunkData::LightPoint(light)));

    let mut anm = Anm::new(200, 100);
    anm.loop_flag = 1;
    anm.clumps.push(AnmClump {
        bones: vec![root, arm, hand],
        materials: vec![mat],
        models: vec![Some(model)],
        ..AnmClump::new(clump)
    });
    anm.others = vec![camera, light];
    let bone = |coord| AnmCoord { clump: 0, coord };
    anm.coord_links = vec![
        AnmCoordLink { parent: bone(0), child: bone(1) },
        AnmCoordLink { parent: AnmCoord::NONE, child: AnmCoord::NONE },
    ];
    let mut arm_entry =
        AnmEntry::new(AnmEntryTarget::Clump { clump: 0, index: 1 }, EAnmEntryFormat::Bone);
    arm_entry.curves.push(bone_track(&[(0, [0.0, 1.5, 0.0]), (150, [0.0, 2.0, 0.0])]));
    let mut fov_entry = AnmEntry::new(AnmEntryTarget::Other { index: 0 }, EAnmEntryFormat::Camera);
    let fov = [
        Sample { frame: 0, value: Value::Scalar(45.0) },
        Sample { frame: 100, value: Value::Scalar(60.0) },
    ];
    let fov = AnmCurve::from_samples(2, EAnmCurveFormat::FloatFixed, 100, &fov).unwrap();
    fov_entry.curves.push(fov);
    anm.entries = vec![arm_entry, fov_entry];
    let anm = xfbin.add_chunk(Chunk::new("c/1nrt/anm", "1nrt_idle", ChunkData::Anm(anm)));

    let blob = xfbin.add_chunk(Chunk::new("c/1nrt/bin", "params", ChunkData::Binary {
        data: b"\x00\x01params".to_vec(),
    }));
    let custom = xfbin.add_chunk(Chunk::new("c/1nrt/bin", "custom", ChunkData::Unknown {
        type_name: "nuccChunkCustom".into(),
        data: vec![1, 2, 3, 4],
    }));

    // Models, textures and materials on the first page, the skeleton and the rest on the second
    xfbin.add_page(vec![tex, mat, hit, model]);
    let rest: Vec<ChunkId> = xfbin
        .ids()
        .filter(|id| ![tex, shared, mat, hit, model, blob, custom].contains(id))
        .collect();
    let page = xfbin.add_page(rest);
    xfbin.add_page(vec![blob, custom]);
    xfbin.pages[page].references.push(xfbinlib::nucc::ChunkReference {
        name: "1nrt_idle_alias".into(),
        chunk: anm,
    });
    xfbin.resolve_links();
    Character { xfbin, root, arm, hand, clump, model, anm }
}

#[test]
fn every_chunk_kind_survives() {
    let character = character();
    let data = encode(&character.xfbin).unwrap();
    let decoded = decode(&data).unwrap();

    assert_eq!(decoded.chunks.len(), character.xfbin.chunks.len());
    for (a, b) in character.xfbin.chunks.iter().zip(&decoded.chunks) {
        assert_eq!(a.key(), b.key());
        assert_eq!(a.data, b.data, "{} '{}'", a.type_name(), a.name);
        assert_eq!(a.version, b.version);
    }
    assert_eq!(decoded.pages, character.xfbin.pages);
    assert!(decoded.chunks[4].data.is_placeholder());
    assert_eq!(decoded.chunks[4].type_name(), "nuccChunkTexture");

    // Writing the decoded graph again reproduces the file
    assert_eq!(encode(&decoded).unwrap(), data);
}

#[test]
fn skeleton_is_rebuilt() {
    let character = character();
    let decoded = decode(&encode(&character.xfbin).unwrap()).unwrap();
    assert_eq!(decoded.coord_roots(character.clump).unwrap(), vec![character.root]);
    assert_eq!(decoded.coord(character.root).unwrap().children, vec![character.arm]);
    assert_eq!(decoded.coord(character.hand).unwrap().parent, Some(character.arm));

    let model = decoded.chunk(character.model).and_then(|c| c.data.as_model()).unwrap();
    assert_eq!(model.coord, Some(character.arm));

    let dynamics = decoded.chunks.iter().find_map(|c| c.data.as_dynamics()).unwrap();
    assert_eq!(dynamics.spring_groups[0].coord, Some(character.hand));
    assert_eq!(dynamics.collisions[0].coord, Some(character.arm));

    let anm = decoded.chunk(character.anm).and_then(|c| c.data.as_anm()).unwrap();
    assert!(anm.is_looped());
    assert_eq!(anm.bone_links(), vec![(character.root, character.arm)]);
    assert_eq!(anm.entry_chunk(&anm.entries[0]), Some(character.arm));
}

#[test]
fn curves_decode_to_frames() {
    let character = character();
    let decoded = decode(&encode(&character.xfbin).unwrap()).unwrap();
    let anm = decoded.chunk(character.anm).and_then(|c| c.data.as_anm()).unwrap();

    let tracks = anm.entries[0].tracks(anm.frame_size).unwrap();
    let (target, samples) = &tracks[0];
    assert_eq!(*target, Some(xfbinlib::format::curve::CurveTarget::Location));
    assert_eq!(samples[1], Sample { frame: 150, value: Value::Vec3([0.0, 2.0, 0.0]) });

    // Fixed curves have one key per frame step
    let tracks = anm.entries[1].tracks(anm.frame_size).unwrap();
    let (target, samples) = &tracks[0];
    assert_eq!(*target, Some(xfbinlib::format::curve::CurveTarget::Fov));
    let frames: Vec<i32> = samples.iter().map(|s| s.frame).collect();
    assert_eq!(frames, vec![0, 100]);
}

#[test]
fn texture_exports_to_dds() {
    let character = character();
    let decoded = decode(&encode(&character.xfbin).unwrap()).unwrap();
    let tex = decoded.find("nuccChunkTexture", "c/1nrt/tex/1nrtbod1.nut", "1nrtbod1").unwrap();
    let texture = decoded.chunk(tex).and_then(|c| c.data.as_texture()).unwrap();
    let dds = texture.to_dds().unwrap();
    assert_eq!(&dds[..4], b"DDS ");

    let back = Texture::from_dds(&dds).unwrap();
    assert_eq!((back.width, back.height), (4, 4));
    let nut = back.nut.unwrap();
    assert_eq!(nut.textures[0].pixel_format, ENutPixelFormat::Dxt1);
    assert_eq!(nut.textures[0].data, [[0x5A; 8], [0; 8]].concat());
}
