use super::*;
use image::{imageops, RgbaImage};

/// Downloads the card images and composes them into a grid saved at
/// `out_path`. Returns `None` when there is nothing to render or when any
/// image cannot be fetched or decoded.
pub(super) async fn compose(
    http: &reqwest::Client,
    urls: &[String],
    columns: u32,
    out_path: &Path,
) -> Result<Option<PathBuf>> {
    if urls.is_empty() {
        return Ok(None);
    }

    let mut tiles = Vec::with_capacity(urls.len());
    for url in urls {
        let bytes = match fetch_image(http, url).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("card image fetch failed for {}: {:#}", url, err);
                return Ok(None);
            }
        };
        match image::load_from_memory(&bytes) {
            Ok(img) => tiles.push(img.to_rgba8()),
            Err(err) => {
                warn!("card image decode failed for {}: {}", url, err);
                return Ok(None);
            }
        }
    }

    let sheet = compose_grid(&tiles, columns);
    sheet
        .save(out_path)
        .with_context(|| format!("save rendered album {}", out_path.display()))?;
    Ok(Some(out_path.to_path_buf()))
}

async fn fetch_image(http: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let response = http.get(url).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}

/// Lays tiles out row by row on a transparent canvas. Cells take the size of
/// the largest tile; smaller tiles are centered in their cell.
pub(super) fn compose_grid(tiles: &[RgbaImage], columns: u32) -> RgbaImage {
    let columns = columns.max(1);
    let cell_w = tiles.iter().map(|tile| tile.width()).max().unwrap_or(0);
    let cell_h = tiles.iter().map(|tile| tile.height()).max().unwrap_or(0);
    let rows = (tiles.len() as u32 + columns - 1) / columns;

    let mut sheet = RgbaImage::new(cell_w * columns, cell_h * rows);
    for (index, tile) in tiles.iter().enumerate() {
        let col = index as u32 % columns;
        let row = index as u32 / columns;
        let x = col * cell_w + (cell_w - tile.width()) / 2;
        let y = row * cell_h + (cell_h - tile.height()) / 2;
        imageops::overlay(&mut sheet, tile, x as i64, y as i64);
    }
    sheet
}
