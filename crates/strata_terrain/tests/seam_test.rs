//! # Seam Tests
//!
//! Neighbouring cells must meet without cracks or lighting steps.

use glam::Vec3;
use strata_terrain::{CellCoord, Edge, HeightField, LodMesh, TerrainCell, TerrainContainer};
use uuid::Uuid;

const ROWS: u32 = 5;
const COLUMNS: u32 = 5;

fn sloped_cell(x: i32, y: i32, heights: Vec<f32>) -> TerrainCell {
    let hf = HeightField::from_data(2, 2, heights).unwrap();
    let mut mesh = LodMesh::new(0, 8, 8, ROWS, COLUMNS).unwrap();
    mesh.generate(&hf);
    let mut cell = TerrainCell::new(CellCoord::new(x, y), Uuid::from_u128((x * 10 + y) as u128), hf);
    cell.set_lods(vec![mesh]);
    cell
}

fn flat_pair() -> TerrainContainer {
    let mut world = TerrainContainer::new();
    world.insert_cell(sloped_cell(0, 0, vec![0.0; 4])).unwrap();
    world.insert_cell(sloped_cell(1, 0, vec![0.0; 4])).unwrap();
    world
}

fn mesh(world: &TerrainContainer, x: i32, y: i32) -> &LodMesh {
    world.cell(CellCoord::new(x, y)).unwrap().lod(0).unwrap()
}

#[test]
fn test_flat_pair_border_normals_identical() {
    let mut world = flat_pair();
    world.stitch_seams().unwrap();

    let west = mesh(&world, 0, 0);
    let east = mesh(&world, 1, 0);
    for column in 0..COLUMNS {
        let a = west.index_of(ROWS - 1, column);
        let b = east.index_of(0, column);
        assert_eq!(west.normals()[a].to_array().map(f32::to_bits), east.normals()[b].to_array().map(f32::to_bits));
        assert_eq!(west.tangents()[a].to_array().map(f32::to_bits), east.tangents()[b].to_array().map(f32::to_bits));
        assert!((west.normals()[a] - Vec3::Y).length() < 1e-6);
    }
}

#[test]
fn test_mismatched_slopes_meet_after_stitching() {
    // West cell rises toward +X, east cell is flat and higher.
    let mut world = TerrainContainer::new();
    world.insert_cell(sloped_cell(0, 0, vec![0.0, 4.0, 0.0, 4.0])).unwrap();
    world.insert_cell(sloped_cell(1, 0, vec![6.0; 4])).unwrap();

    let before_west = mesh(&world, 0, 0).clone();
    let before_east = mesh(&world, 1, 0).clone();
    let a0 = before_west.index_of(ROWS - 1, 2);
    let b0 = before_east.index_of(0, 2);
    assert_ne!(before_west.positions()[a0].y, before_east.positions()[b0].y);
    assert_ne!(before_west.normals()[a0], before_east.normals()[b0]);

    world.stitch_seams().unwrap();
    let west = mesh(&world, 0, 0);
    let east = mesh(&world, 1, 0);

    // Interior of the edge; corners also belong to the N/S seams.
    for column in 1..COLUMNS - 1 {
        let a = west.index_of(ROWS - 1, column);
        let b = east.index_of(0, column);
        assert_eq!(west.positions()[a].y.to_bits(), east.positions()[b].y.to_bits());
        assert_eq!(west.normals()[a].to_array().map(f32::to_bits), east.normals()[b].to_array().map(f32::to_bits));
        assert!((west.normals()[a].length() - 1.0).abs() < 1e-5);
    }

    // The far borders are untouched.
    for column in 0..COLUMNS {
        let far_west = west.index_of(0, column);
        assert_eq!(west.positions()[far_west], before_west.positions()[far_west]);
        let far_east = east.index_of(ROWS - 1, column);
        assert_eq!(east.positions()[far_east], before_east.positions()[far_east]);
    }
}

#[test]
fn test_stitching_twice_is_stable() {
    let mut world = TerrainContainer::new();
    world.insert_cell(sloped_cell(0, 0, vec![1.0, 2.0, 3.0, 5.0])).unwrap();
    world.insert_cell(sloped_cell(0, 1, vec![2.0, 2.0, 2.0, 2.0])).unwrap();
    world.stitch_seams().unwrap();
    let once = (mesh(&world, 0, 0).clone(), mesh(&world, 0, 1).clone());
    world.stitch_seams().unwrap();
    assert_eq!(mesh(&world, 0, 0), &once.0);
    assert_eq!(mesh(&world, 0, 1), &once.1);
}

#[test]
fn test_direct_edge_calls_match_container_stitch() {
    let heights = vec![0.0, 3.0, 1.0, 2.0];
    let mut world = TerrainContainer::new();
    world.insert_cell(sloped_cell(0, 0, heights.clone())).unwrap();
    world.insert_cell(sloped_cell(0, 1, vec![5.0; 4])).unwrap();

    let mut south = mesh(&world, 0, 0).clone();
    let mut north = mesh(&world, 0, 1).clone();
    south.fuse_edge(Edge::North, &mut north).unwrap();
    south.average_edge(Edge::North, &mut north).unwrap();

    world.stitch_seams().unwrap();
    assert_eq!(mesh(&world, 0, 0), &south);
    assert_eq!(mesh(&world, 0, 1), &north);
}
