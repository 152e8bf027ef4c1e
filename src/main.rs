use std::sync::Arc;

use anyhow::Context;
use tile_terrain::{
    default_save_path, load_map, save_map, CornerCopyGenerator, HeightFieldGenerator, MapConfig,
    ProceduralGenerator, TileCatalog, TileCoord, TileMap,
};

const MAP_SAMPLES: usize = 65;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = MapConfig::from_env();
    let catalog = Arc::new(TileCatalog::with_defaults());
    let map = TileMap::new(config, Arc::clone(&catalog)).context("invalid map configuration")?;

    let seed = std::env::var("TILE_MAP_SEED")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0x5EED);
    let generator = ProceduralGenerator::new(seed, MAP_SAMPLES, MAP_SAMPLES);
    for (name, value) in generator.properties() {
        log::debug!("{name} = {value}");
    }
    map.generate(&generator)?;

    let (x, y) = map.size();
    log::info!("tile map: {} x {} tiles", x, y);
    if x == 0 || y == 0 {
        anyhow::bail!("chunk size {} leaves no room for tiles", config.chunk_size);
    }

    let start = TileCoord::new(0, 0);
    let target = TileCoord::new(x as i32 - 1, y as i32 - 1);
    match map.find_path(start, target) {
        Some(path) => log::info!(
            "path ({}, {}) -> ({}, {}): {} tiles, cost {:.2}",
            start.x,
            start.y,
            target.x,
            target.y,
            path.tiles.len(),
            path.cost
        ),
        None => log::warn!("no path from ({}, {}) to ({}, {})", start.x, start.y, target.x, target.y),
    }

    let path = default_save_path();
    save_map(&path, &map)?;

    let restored = TileMap::new(config, catalog)?;
    load_map(&path, &restored)?;

    // rebuilding from the restored corners must reproduce the terrain
    let corners = CornerCopyGenerator::new(&restored);
    let field = corners.generate_height_field();
    log::info!(
        "corner copy: {} x {} samples in {} steps",
        field.x_size(),
        field.y_size(),
        corners.progress()
    );
    restored.generate(&corners)?;
    log::info!(
        "restored height at centre: {}",
        restored.height_at(TileCoord::new(x as i32 / 2, y as i32 / 2))
    );
    Ok(())
}
