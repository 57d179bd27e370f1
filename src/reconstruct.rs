use std::{
    io::{Cursor, Write},
    path::Path,
};

use image::{ImageFormat, ImageResult, Rgb, RgbImage};
use tempfile::NamedTempFile;

use crate::{
    error::{Error, Result},
    k_means::Centroid,
};

/// Rounds half away from zero and clamps each channel into `0..=255`.
pub fn to_rgb(c: &Centroid) -> Rgb<u8> {
    Rgb(c.map(|v| v.round().clamp(0., 255.) as u8))
}

pub fn rgb_to_hex(Rgb([r, g, b]): Rgb<u8>) -> String {
    format!("#{:02X}{:02X}{:02X}", r, g, b)
}

pub fn palette_hex(centroids: &[Centroid]) -> Vec<String> {
    centroids.iter().map(|c| rgb_to_hex(to_rgb(c))).collect()
}

/// Paints every pixel with the colour of its cluster.
///
/// `labels` must be row-major and hold exactly `width * height` entries.
pub fn reconstruct(
    width: u32,
    height: u32,
    labels: &[usize],
    centroids: &[Centroid],
) -> Result<RgbImage> {
    if labels.len() != width as usize * height as usize {
        return Err(Error::DimensionMismatch {
            len: labels.len(),
            width,
            height,
        });
    }

    let palette = centroids.iter().map(to_rgb).collect::<Vec<_>>();
    let mut image = RgbImage::new(width, height);
    for (x, y, px) in image.enumerate_pixels_mut() {
        let index = y as usize * width as usize + x as usize;
        let label = labels[index];
        *px = *palette.get(label).ok_or(Error::LabelOutOfRange {
            index,
            label,
            k: centroids.len(),
        })?;
    }

    Ok(image)
}

pub fn encode(image: &RgbImage, format: ImageFormat) -> ImageResult<Vec<u8>> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), format)?;
    Ok(buf)
}

/// Encodes `image` in the format named by `path`'s extension, then writes it.
/// Nothing touches the filesystem unless encoding succeeded.
pub fn save(image: &RgbImage, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let image_err = |source| Error::Image {
        path: path.to_path_buf(),
        source,
    };
    let format = ImageFormat::from_path(path).map_err(image_err)?;
    let buf = encode(image, format).map_err(image_err)?;
    write_file(path, &buf)
}

/// Writes `bytes` to a temporary file beside `path`, then renames it over
/// `path`. A failed write leaves `path` as it was.
pub fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let io_err = |source| Error::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    // temp files are created owner-only
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))
            .map_err(io_err)?;
    }
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    Ok(())
}
