//! # Terrain Tool
//!
//! Command-line utility for terrain containers.
//!
//! ```text
//! terrain_tool generate <config.toml> <out.terrain>
//! terrain_tool inspect <file.terrain>
//! terrain_tool verify <file.terrain>
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::process::ExitCode;
use std::time::Instant;
use strata_terrain::{
    HeightSlot, LoadMode, TerrainBuilder, TerrainConfig, TerrainContainer, TerrainError, TerrainHeader,
    TerrainResult,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let result = match args.get(1).map(String::as_str) {
        Some("generate") if args.len() == 4 => generate(&args[2], &args[3]),
        Some("inspect") if args.len() == 3 => inspect(&args[2]),
        Some("verify") if args.len() == 3 => verify(&args[2]),
        _ => {
            print_usage();
            return ExitCode::from(2);
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         STRATA TERRAIN TOOL                                      ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();
    println!("Usage:");
    println!("  terrain_tool generate <config.toml> <out.terrain>");
    println!("  terrain_tool inspect <file.terrain>");
    println!("  terrain_tool verify <file.terrain>");
}

fn open(path: &str) -> TerrainResult<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| TerrainError::Io { section: "input file", source })
}

fn generate(config_path: &str, out_path: &str) -> TerrainResult<()> {
    let config = TerrainConfig::from_file(config_path)?;
    let options = config.output.save_options();
    let started = Instant::now();
    let mut world = TerrainBuilder::new(config)?.build()?;

    let file = File::create(out_path).map_err(|source| TerrainError::Io {
        section: "output file",
        source,
    })?;
    let mut writer = BufWriter::new(file);
    world.save(&mut writer, &options)?;
    info!(
        path = out_path,
        cells = world.cells().len(),
        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "wrote terrain"
    );
    Ok(())
}

fn inspect(path: &str) -> TerrainResult<()> {
    let header = TerrainHeader::read(&mut open(path)?)?;
    let container = TerrainContainer::load(&mut open(path)?, LoadMode::Streaming)?;

    println!("┌─ HEADER ─────────────────────────────────────────────────────────┐");
    println!("│ Version:      {}", header.version);
    println!("│ Endianness:   {:?}", header.endianness);
    println!("│ Encoding:     {:?}", header.encoding);
    println!("│ Compression:  {:?}", header.compression);
    println!("│ Layers:       {}", header.layer_count);
    println!("│ Groups:       {}", header.group_count);
    println!("│ Cells:        {}", header.cell_count);
    println!("└──────────────────────────────────────────────────────────────────┘");

    for layer in container.layers() {
        println!("  layer '{}' material {}", layer.name(), layer.material());
    }
    for (i, group) in container.layer_groups().iter().enumerate() {
        let names: Vec<&str> = group.iter().map(|l| l.name()).collect();
        println!(
            "  group {i}: [{}] mask {}x{} occupation {:?}",
            names.join(", "),
            group.mask().width(),
            group.mask().height(),
            group.mask().channel_occupation()
        );
    }

    for cell in container.cells() {
        let coord = cell.coord();
        let height = match cell.height_slot() {
            HeightSlot::Deferred(h) => format!("{}x{} @{} ({} B)", h.width, h.height, h.span.offset, h.span.size),
            HeightSlot::Loaded(hf) => format!("{}x{} loaded", hf.width(), hf.height()),
        };
        println!("┌─ CELL ({}, {}) {}", coord.x, coord.y, cell.id());
        println!("│ Height field: {height}");
        println!("│ Groups:       {:?}", cell.layer_groups());
        for (i, entry) in cell.seek_table().entries().iter().enumerate() {
            println!(
                "│ LOD[{i}] level {:>2}  offset {:>10}  size {:>8}",
                entry.lod_level, entry.offset, entry.size
            );
        }
        println!("└──────────────────────────────────────────────────────────────────┘");
    }
    Ok(())
}

fn verify(path: &str) -> TerrainResult<()> {
    let immediate = TerrainContainer::load(&mut open(path)?, LoadMode::Immediate)?;
    let mut reader = open(path)?;
    let mut lazy = TerrainContainer::load(&mut reader, LoadMode::Streaming)?;
    lazy.load_deferred(&mut reader)?;

    let mut mismatches = 0usize;
    for (a, b) in immediate.cells().iter().zip(lazy.cells()) {
        let heights_match = a.height_field()? == b.height_field()?;
        let lods_match = a.lod_count() == b.lod_count()
            && (0..a.lod_count()).all(|i| a.lod(i) == b.lod(i));
        if !(heights_match && lods_match && a.id() == b.id()) {
            mismatches += 1;
            error!(x = a.coord().x, y = a.coord().y, "streamed cell differs from immediate load");
        }
    }

    if immediate.cells().len() != lazy.cells().len() || mismatches > 0 {
        return Err(TerrainError::InvalidData {
            section: "verify",
            reason: format!("{mismatches} cells differ between load modes"),
        });
    }
    println!("✓ {} cells verified in both load modes", immediate.cells().len());
    Ok(())
}
