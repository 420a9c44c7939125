//! # Container Round Trip Tests
//!
//! Save then load in every compression mode, byte order and text encoding,
//! and check that each seek table entry points at a parseable block.

use glam::{Vec2, Vec4};
use std::io::Cursor;
use strata_terrain::{
    CellCoord, Compression, Endianness, HeightField, LoadMode, LodMesh, SaveOptions, TerrainBuilder, TerrainCell,
    TerrainConfig, TerrainContainer, TerrainError, TerrainHeader, TerrainLayer, TerrainLayerGroup, TextEncoding,
};
use uuid::Uuid;

fn small_world() -> TerrainContainer {
    let mut config = TerrainConfig::default();
    config.world.seed = 1234;
    config.world.grid_width = 2;
    config.world.grid_height = 2;
    config.world.height_resolution = 17;
    config.world.cell_size = 32;
    config.noise.octaves = 3;
    config.noise.smooth_passes = 1;
    config.lod.base_tessellation = 16;
    config.lod.levels = 3;
    let mut world = TerrainBuilder::new(config).unwrap().build().unwrap();

    // Paint something so masks are not trivially opaque.
    let grass = world.add_layer(TerrainLayer::new("grass ☘", Uuid::from_u128(0xFEED)));
    let group = strata_terrain::GroupId(0);
    let g = world.layer_group_mut(group).unwrap();
    g.add_layer(grass).unwrap();
    g.mask_mut().paint(Vec2::new(8.0, 8.0), 5.0, 1, 0.8).unwrap();
    world
}

fn save(world: &mut TerrainContainer, options: SaveOptions) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    world.save(&mut out, &options).unwrap();
    out.into_inner()
}

fn all_options() -> Vec<SaveOptions> {
    let mut options = Vec::new();
    for compression in [Compression::None, Compression::Deflate, Compression::Lz4] {
        for endianness in [Endianness::Little, Endianness::Big] {
            for encoding in [TextEncoding::Utf8, TextEncoding::Utf16] {
                options.push(SaveOptions {
                    encoding,
                    endianness,
                    compression,
                });
            }
        }
    }
    options
}

fn assert_same_world(a: &TerrainContainer, b: &TerrainContainer) {
    assert_eq!(a.layers().len(), b.layers().len());
    for (la, lb) in a.layers().iter().zip(b.layers()) {
        assert_eq!(la.name(), lb.name());
        assert_eq!(la.material(), lb.material());
    }

    assert_eq!(a.layer_groups().len(), b.layer_groups().len());
    for (ga, gb) in a.layer_groups().iter().zip(b.layer_groups()) {
        assert_eq!(ga.mask(), gb.mask());
        let names_a: Vec<_> = ga.iter().map(|l| l.name().to_owned()).collect();
        let names_b: Vec<_> = gb.iter().map(|l| l.name().to_owned()).collect();
        assert_eq!(names_a, names_b);
    }

    assert_eq!(a.cells().len(), b.cells().len());
    for (ca, cb) in a.cells().iter().zip(b.cells()) {
        assert_eq!(ca.coord(), cb.coord());
        assert_eq!(ca.id(), cb.id());
        assert_eq!(ca.layer_groups(), cb.layer_groups());
        assert_eq!(ca.height_field().unwrap(), cb.height_field().unwrap());
        assert_eq!(ca.lod_count(), cb.lod_count());
        for i in 0..ca.lod_count() {
            assert_eq!(ca.lod(i).unwrap(), cb.lod(i).unwrap());
        }
    }
}

#[test]
fn test_roundtrip_every_encoding() {
    let mut world = small_world();
    for options in all_options() {
        let bytes = save(&mut world, options);
        let back = TerrainContainer::load(&mut Cursor::new(&bytes), LoadMode::Immediate)
            .unwrap_or_else(|e| panic!("{options:?}: {e}"));
        assert_eq!(back.format(), options.format());
        assert_same_world(&world, &back);
    }
}

#[test]
fn test_save_is_deterministic() {
    let mut a = small_world();
    let mut b = small_world();
    let options = SaveOptions::default();
    assert_eq!(save(&mut a, options), save(&mut b, options));
}

#[test]
fn test_header_counts_match_contents() {
    let mut world = small_world();
    let bytes = save(&mut world, SaveOptions::default());
    let header = TerrainHeader::read(&mut bytes.as_slice()).unwrap();
    assert_eq!(header.version, TerrainHeader::CURRENT_VERSION);
    assert_eq!(header.layer_count as usize, world.layers().len());
    assert_eq!(header.group_count as usize, world.layer_groups().len());
    assert_eq!(header.cell_count as usize, world.cells().len());
}

#[test]
fn test_seek_entries_point_at_their_blocks() {
    let mut world = small_world();
    for options in all_options() {
        let bytes = save(&mut world, options);
        let ctx = options.format();
        for cell in world.cells() {
            assert_eq!(cell.seek_table().len(), cell.lod_count());
            for (i, entry) in cell.seek_table().entries().iter().enumerate() {
                let start = entry.offset as usize;
                let end = start + entry.size as usize;
                assert!(end <= bytes.len());
                let raw = ctx.compression.decompress_to_vec(&bytes[start..end]).unwrap();
                let mesh = LodMesh::read(&mut raw.as_slice(), ctx.endianness).unwrap();
                assert_eq!(mesh.lod_level(), entry.lod_level);
                assert_eq!(&mesh, cell.lod(i).unwrap().as_ref());
            }
        }
    }
}

#[test]
fn test_blocks_are_contiguous_and_ordered() {
    let mut world = small_world();
    save(&mut world, SaveOptions::default());
    for cell in world.cells() {
        let entries = cell.seek_table().entries();
        for pair in entries.windows(2) {
            assert_eq!(pair[0].offset + pair[0].size, pair[1].offset);
            assert!(pair[0].lod_level < pair[1].lod_level);
        }
    }
}

#[test]
fn test_truncated_file_fails_cleanly() {
    let mut world = small_world();
    let bytes = save(&mut world, SaveOptions::default());
    for cut in [5, 40, bytes.len() / 2, bytes.len() - 1] {
        let err = TerrainContainer::load(&mut Cursor::new(&bytes[..cut]), LoadMode::Immediate).unwrap_err();
        assert!(
            matches!(
                err,
                TerrainError::Truncated { .. }
                    | TerrainError::LodNotFound { .. }
                    | TerrainError::InvalidData { .. }
                    | TerrainError::Io { .. }
            ),
            "cut at {cut}: {err}"
        );
    }
}

#[test]
fn test_resave_of_loaded_world_is_identical() {
    let mut world = small_world();
    let options = SaveOptions {
        encoding: TextEncoding::Utf16,
        endianness: Endianness::Big,
        compression: Compression::Deflate,
    };
    let first = save(&mut world, options);
    let mut back = TerrainContainer::load(&mut Cursor::new(&first), LoadMode::Immediate).unwrap();
    assert_eq!(save(&mut back, options), first);
}

#[test]
fn test_empty_slots_are_written_as_minus_one() {
    let mut world = TerrainContainer::new();
    let rock = world.add_layer(TerrainLayer::new("rock", Uuid::nil()));
    let mut group = TerrainLayerGroup::new(1, 1).unwrap();
    group.add_layer(rock).unwrap();
    world.add_layer_group(group);

    let options = SaveOptions {
        compression: Compression::None,
        ..SaveOptions::default()
    };
    let bytes = save(&mut world, options);
    // header (41) + layer (4 + 4 + 16) + slot count (4)
    let slots = &bytes[41 + 24 + 4..41 + 24 + 4 + 16];
    let slots: Vec<i32> = slots
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    assert_eq!(slots, vec![0, -1, -1, -1]);
}

#[test]
fn test_manual_cells_without_groups() {
    let mut world = TerrainContainer::new();
    for x in 0..3 {
        let hf = HeightField::from_data(2, 2, vec![x as f32; 4]).unwrap();
        let mut mesh = LodMesh::new(0, 4, 4, 3, 3).unwrap();
        mesh.generate(&hf);
        let mut cell = TerrainCell::new(CellCoord::new(x, -x), Uuid::from_u128(x as u128), hf);
        cell.set_lods(vec![mesh]);
        world.insert_cell(cell).unwrap();
    }
    let bytes = save(&mut world, SaveOptions::default());
    let back = TerrainContainer::load(&mut Cursor::new(&bytes), LoadMode::Immediate).unwrap();
    assert_same_world(&world, &back);
    assert!(back.cell(CellCoord::new(2, -2)).is_some());
    let group = TerrainLayerGroup::new(1, 1).unwrap();
    assert_eq!(group.mask().pixel(0, 0).unwrap(), Vec4::new(1.0, 0.0, 0.0, 0.0));
}

#[test]
fn test_save_of_unresolved_world_writes_nothing() {
    let mut world = small_world();
    let bytes = save(&mut world, SaveOptions::default());
    let mut lazy = TerrainContainer::load(&mut Cursor::new(&bytes), LoadMode::Streaming).unwrap();

    let mut sink = Cursor::new(Vec::new());
    let err = lazy.save(&mut sink, &SaveOptions::default()).unwrap_err();
    assert!(matches!(err, TerrainError::HeightFieldNotLoaded { .. }), "{err}");
    assert!(sink.get_ref().is_empty());

    // Height fields alone are not enough; meshes are still on disk.
    let ctx = lazy.format();
    let coords: Vec<_> = lazy.cells().iter().map(TerrainCell::coord).collect();
    let mut reader = Cursor::new(&bytes);
    for coord in coords {
        lazy.cell_mut(coord).unwrap().load_height_data(&mut reader, &ctx).unwrap();
    }
    let err = lazy.save(&mut sink, &SaveOptions::default()).unwrap_err();
    assert!(matches!(err, TerrainError::LodNotLoaded { index: 0 }), "{err}");
    assert!(sink.get_ref().is_empty());

    lazy.load_deferred(&mut reader).unwrap();
    lazy.save(&mut sink, &SaveOptions::default()).unwrap();
    assert_eq!(sink.into_inner(), bytes);
}
