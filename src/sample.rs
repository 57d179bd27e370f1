use std::path::Path;

use image::{DynamicImage, GenericImageView, ImageReader};
use log::debug;

use crate::{
    error::{Error, Result},
    k_means::Pixel,
};

/// Pixels of an image in row-major order, `pixels[y * width + x]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Samples {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Pixel>,
}

impl Samples {
    /// Shrinks `image` to fit within `max_width` x `max_height` (keeping its
    /// aspect ratio, never enlarging) and flattens it to RGB.
    pub fn from_image(image: DynamicImage, max_width: u32, max_height: u32) -> Self {
        let (max_width, max_height) = (max_width.max(1), max_height.max(1));
        let image = if image.width() > max_width || image.height() > max_height {
            let (w, h) = image.dimensions();
            let image = image.thumbnail(max_width, max_height);
            debug!(
                "downscaled {}x{} to {}x{}",
                w,
                h,
                image.width(),
                image.height()
            );
            image
        } else {
            image
        };

        let image = image.into_rgb8();
        let (width, height) = image.dimensions();
        let pixels = image.pixels().copied().collect();

        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn open(path: impl AsRef<Path>, max_width: u32, max_height: u32) -> Result<Self> {
        let path = path.as_ref();
        let image = ImageReader::open(path)
            .and_then(|r| r.with_guessed_format())
            .map_err(|source| Error::Io {
                path: path.to_path_buf(),
                source,
            })?
            .decode()
            .map_err(|source| Error::Image {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self::from_image(image, max_width, max_height))
    }
}
