use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use fitcheck_contracts::{DataUrl, OutfitResult};
use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgb, RgbImage};
use log::{info, warn};
use sha2::{Digest, Sha256};

const SLUG_MAX_CHARS: usize = 48;

/// Grid geometry for the composite styleboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleboardLayout {
    pub tile_width: u32,
    pub tile_height: u32,
    pub columns: u32,
    pub padding: u32,
}

impl Default for StyleboardLayout {
    fn default() -> Self {
        Self {
            tile_width: 384,
            tile_height: 512,
            columns: 3,
            padding: 24,
        }
    }
}

impl StyleboardLayout {
    /// Canvas size for `tiles` images; never narrower than one tile.
    pub fn canvas_size(&self, tiles: usize) -> (u32, u32) {
        let tiles = tiles.max(1) as u32;
        let columns = self.columns.clamp(1, tiles);
        let rows = tiles.div_ceil(columns);
        (
            columns * self.tile_width + (columns + 1) * self.padding,
            rows * self.tile_height + (rows + 1) * self.padding,
        )
    }

    fn tile_origin(&self, index: u32) -> (u32, u32) {
        let columns = self.columns.max(1);
        let (col, row) = (index % columns, index / columns);
        (
            self.padding + col * (self.tile_width + self.padding),
            self.padding + row * (self.tile_height + self.padding),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Styleboard {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub tiles: usize,
}

/// `<NN>-<slug>-<hash8>.<ext>`, `position` being 1-based.
pub fn outfit_file_name(name: &str, position: usize, ext: &str) -> String {
    format!("{position:02}-{}-{}.{ext}", slugify(name), short_id(name))
}

/// Writes the decoded image of a `Done` result into `dir`.
pub fn save_outfit_image(result: &OutfitResult, position: usize, dir: &Path) -> Result<PathBuf> {
    let url = match result.image_url.as_deref() {
        Some(url) if result.is_done() => url,
        _ => bail!(
            "'{}' has no generated image (status: {})",
            result.name,
            result.status.as_str()
        ),
    };
    let decoded = DataUrl::parse(url)
        .with_context(|| format!("invalid image data for '{}'", result.name))?;
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(outfit_file_name(&result.name, position, decoded.extension()));
    fs::write(&path, &decoded.bytes)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("saved '{}' to {}", result.name, path.display());
    Ok(path)
}

/// Lays every `Done` image out on a white grid and saves it as PNG.
///
/// Images that fail to decode are skipped with a warning; the board fails
/// only when nothing is left to draw.
pub fn compose_styleboard(
    results: &[OutfitResult],
    path: &Path,
    layout: &StyleboardLayout,
) -> Result<Styleboard> {
    let mut tiles = Vec::new();
    for result in results.iter().filter(|result| result.is_done()) {
        let Some(url) = result.image_url.as_deref() else {
            continue;
        };
        let decoded = DataUrl::parse(url)
            .map_err(anyhow::Error::from)
            .and_then(|data| image::load_from_memory(&data.bytes).map_err(anyhow::Error::from));
        match decoded {
            Ok(image) => tiles.push(
                image
                    .resize(layout.tile_width, layout.tile_height, FilterType::Triangle)
                    .to_rgb8(),
            ),
            Err(err) => warn!("styleboard: skipping '{}': {err:#}", result.name),
        }
    }
    if tiles.is_empty() {
        bail!("no generated outfit images to place on the styleboard");
    }

    let (width, height) = layout.canvas_size(tiles.len());
    let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    for (index, tile) in tiles.iter().enumerate() {
        let (x, y) = layout.tile_origin(index as u32);
        // Centre within the cell; resize keeps the aspect ratio.
        let x = x + (layout.tile_width.saturating_sub(tile.width())) / 2;
        let y = y + (layout.tile_height.saturating_sub(tile.height())) / 2;
        imageops::overlay(&mut canvas, tile, i64::from(x), i64::from(y));
    }

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    canvas
        .save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("failed to save {}", path.display()))?;
    info!(
        "styleboard with {} outfits saved to {}",
        tiles.len(),
        path.display()
    );
    Ok(Styleboard {
        path: path.to_path_buf(),
        width,
        height,
        tiles: tiles.len(),
    })
}

fn slugify(name: &str) -> String {
    let mut slug = String::new();
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
        if slug.len() >= SLUG_MAX_CHARS {
            break;
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "outfit".to_string()
    } else {
        slug.to_string()
    }
}

fn short_id(name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..4])
}
