use image::{Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn create_temp_dir(name: &str) -> PathBuf {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "traffic_signs_{}_{}_{}",
        name,
        std::process::id(),
        timestamp
    ));
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Lay out `per_category` solid-colour images in each of `categories`
/// numbered subdirectories, each category with its own colour.
pub fn write_sign_folder(root: &Path, categories: usize, per_category: usize) {
    for label in 0..categories {
        let category = root.join(label.to_string());
        fs::create_dir_all(&category).unwrap();
        let color = [(label * 50) as u8, 255 - (label * 50) as u8, (label * 25) as u8];
        for i in 0..per_category {
            RgbImage::from_pixel(32 + i as u32 % 3, 32, Rgb(color))
                .save(category.join(format!("{:05}.png", i)))
                .unwrap();
        }
    }
}
