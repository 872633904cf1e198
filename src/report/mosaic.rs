//! PNG renderings of test-set predictions.
//!
//! Mosaics lay samples out [`GRID`] to a row, each framed green when the
//! prediction matched the label and red when it did not. The confusion matrix
//! is drawn as a heatmap, one square per cell, brighter for higher counts.

use crate::core::dataset::{ImageGeometry, SignItem};
use crate::core::metrics::ConfusionMatrix;
use image::{Rgb, RgbImage};
use rand::Rng;

/// Tiles per mosaic row, and rows in a full mosaic.
pub const GRID: usize = 5;

const BORDER: u32 = 2;
const CELL: u32 = 12;

const CORRECT: Rgb<u8> = Rgb([0, 160, 0]);
const WRONG: Rgb<u8> = Rgb([200, 0, 0]);
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Anchors of a viridis-like ramp, from empty to full.
const RAMP: [[u8; 3]; 5] = [
    [68, 1, 84],
    [59, 82, 139],
    [33, 145, 140],
    [94, 201, 98],
    [253, 231, 37],
];

/// A test sample together with the category the model gave it.
#[derive(Debug, Clone, Copy)]
pub struct Tile<'a> {
    pub item: &'a SignItem,
    pub predicted: usize,
}

impl Tile<'_> {
    pub fn is_correct(&self) -> bool {
        self.item.label == self.predicted
    }
}

/// Up to `count` distinct samples drawn at random, in test order.
pub fn sample_tiles<'a>(
    items: &'a [SignItem],
    predictions: &[usize],
    count: usize,
    rng: &mut impl Rng,
) -> Vec<Tile<'a>> {
    let len = items.len().min(predictions.len());
    let mut indices = rand::seq::index::sample(rng, len, count.min(len)).into_vec();
    indices.sort_unstable();

    indices
        .into_iter()
        .map(|i| Tile {
            item: &items[i],
            predicted: predictions[i],
        })
        .collect()
}

/// The first `count` samples whose prediction differs from their label.
pub fn misclassified_tiles<'a>(
    items: &'a [SignItem],
    predictions: &[usize],
    count: usize,
) -> Vec<Tile<'a>> {
    items
        .iter()
        .zip(predictions)
        .map(|(item, &predicted)| Tile { item, predicted })
        .filter(|tile| !tile.is_correct())
        .take(count)
        .collect()
}

/// Lay `tiles` out [`GRID`] per row. An empty list renders one blank row.
pub fn render_mosaic(tiles: &[Tile], geometry: ImageGeometry) -> RgbImage {
    let tile_width = geometry.width as u32 + 2 * BORDER;
    let tile_height = geometry.height as u32 + 2 * BORDER;
    let rows = tiles.len().div_ceil(GRID).max(1) as u32;

    let mut canvas =
        RgbImage::from_pixel(GRID as u32 * tile_width, rows * tile_height, BACKGROUND);

    for (index, tile) in tiles.iter().enumerate() {
        let left = (index % GRID) as u32 * tile_width;
        let top = (index / GRID) as u32 * tile_height;
        let frame = if tile.is_correct() { CORRECT } else { WRONG };

        for y in 0..tile_height {
            for x in 0..tile_width {
                let inside = x >= BORDER
                    && y >= BORDER
                    && x < tile_width - BORDER
                    && y < tile_height - BORDER;
                let color = if inside {
                    let (x, y) = ((x - BORDER) as usize, (y - BORDER) as usize);
                    sample_pixel(tile.item, geometry, x, y)
                } else {
                    frame
                };
                canvas.put_pixel(left + x, top + y, color);
            }
        }
    }

    canvas
}

/// One square per cell, rows are true categories and columns predictions.
pub fn render_confusion_matrix(matrix: &ConfusionMatrix) -> RgbImage {
    let n = matrix.num_categories();
    let peak = (0..n)
        .flat_map(|truth| (0..n).map(move |predicted| (truth, predicted)))
        .map(|(truth, predicted)| matrix.count(truth, predicted))
        .max()
        .unwrap_or(0)
        .max(1);

    let side = n as u32 * CELL;
    RgbImage::from_fn(side, side, |x, y| {
        let count = matrix.count((y / CELL) as usize, (x / CELL) as usize);
        ramp(count as f32 / peak as f32)
    })
}

/// Colour of the CHW pixel at `(x, y)`, values in [0, 1].
fn sample_pixel(item: &SignItem, geometry: ImageGeometry, x: usize, y: usize) -> Rgb<u8> {
    let plane = geometry.plane();
    let offset = y * geometry.width + x;
    let channel = |c: usize| {
        let value = item.pixels.get(c * plane + offset).copied().unwrap_or(0.0);
        (value * 255.0).round().clamp(0.0, 255.0) as u8
    };
    Rgb([channel(0), channel(1), channel(2)])
}

fn ramp(t: f32) -> Rgb<u8> {
    let scaled = t.clamp(0.0, 1.0) * (RAMP.len() - 1) as f32;
    let lower = (scaled.floor() as usize).min(RAMP.len() - 2);
    let fraction = scaled - lower as f32;

    let mix = |c: usize| {
        let from = RAMP[lower][c] as f32;
        let to = RAMP[lower + 1][c] as f32;
        (from + (to - from) * fraction).round() as u8
    };
    Rgb([mix(0), mix(1), mix(2)])
}
