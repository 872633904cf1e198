use super::dataset::{ImageGeometry, SignDataset, SignItem};
use image::ImageFormat;
use image::imageops::FilterType;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Could not read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Could not decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("Category directory {path} is outside of the {num_categories} known categories")]
    LabelOutOfRange { path: PathBuf, num_categories: usize },
    #[error("No images found under {0}")]
    Empty(PathBuf),
}

pub trait Ingestable {
    fn ingest(&self) -> Result<SignDataset, Error>;
}

/// A directory with one numerically named subdirectory per category.
///
/// ```text
/// gtsrb/
///   0/00000_00000.ppm
///   0/00000_00001.ppm
///   1/...
///   42/...
/// ```
pub struct ImageFolder {
    root: PathBuf,
    geometry: ImageGeometry,
    num_categories: usize,
}

impl ImageFolder {
    pub fn new(root: impl Into<PathBuf>, geometry: ImageGeometry, num_categories: usize) -> Self {
        Self {
            root: root.into(),
            geometry,
            num_categories,
        }
    }

    /// Numerically named subdirectories, ordered by label.
    fn categories(&self) -> Result<Vec<(usize, PathBuf)>, Error> {
        let mut categories = Vec::new();

        for entry in read_dir(&self.root)? {
            if !entry.is_dir() {
                continue;
            }

            let Some(label) = entry
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.parse::<usize>().ok())
            else {
                tracing::debug!(path = %entry.display(), "Skipping non-category directory");
                continue;
            };

            if label >= self.num_categories {
                return Err(Error::LabelOutOfRange {
                    path: entry,
                    num_categories: self.num_categories,
                });
            }

            categories.push((label, entry));
        }

        categories.sort_by_key(|(label, _)| *label);
        Ok(categories)
    }
}

impl Ingestable for ImageFolder {
    fn ingest(&self) -> Result<SignDataset, Error> {
        let mut items = Vec::new();

        for (label, dir) in self.categories()? {
            let before = items.len();

            for path in read_dir(&dir)? {
                // Annotation files such as GT-00000.csv live next to the images
                if !path.is_file() || ImageFormat::from_path(&path).is_err() {
                    continue;
                }

                items.push(SignItem {
                    pixels: load_image(&path, self.geometry)?,
                    label,
                });
            }

            tracing::debug!(label = label, images = items.len() - before, "Category loaded");
        }

        if items.is_empty() {
            return Err(Error::Empty(self.root.clone()));
        }

        tracing::info!(
            message = "Images loaded",
            root = %self.root.display(),
            images = items.len(),
        );

        Ok(SignDataset::new(self.geometry, items))
    }
}

/// Decode an image file, resize it to `geometry` and lay it out as CHW values in `[0, 1]`.
pub fn load_image(path: &Path, geometry: ImageGeometry) -> Result<Vec<f32>, Error> {
    let image = image::open(path).map_err(|source| Error::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    let rgb = image
        .resize_exact(
            geometry.width as u32,
            geometry.height as u32,
            FilterType::Triangle,
        )
        .to_rgb8();

    let plane = geometry.plane();
    let mut pixels = vec![0.0; geometry.pixel_count()];
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let offset = y as usize * geometry.width + x as usize;
        for (channel, value) in pixel.0.iter().enumerate() {
            pixels[channel * plane + offset] = *value as f32 / 255.0;
        }
    }

    Ok(pixels)
}

/// Directory entries in a stable order.
fn read_dir(path: &Path) -> Result<Vec<PathBuf>, Error> {
    let to_error = |source| Error::ReadDir {
        path: path.to_path_buf(),
        source,
    };

    let mut paths = fs::read_dir(path)
        .map_err(to_error)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(to_error)?;

    paths.sort();
    Ok(paths)
}
