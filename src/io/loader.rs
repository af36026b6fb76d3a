use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::{ImageBuffer, Luma};
use log::{debug, warn};
use tiff::decoder::{Decoder, DecodingResult, Limits};

use crate::error::{CellverseError, Result};
use crate::image_stack::ImagePlane;

type GrayF32 = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Load a grayscale stack normalized to [0, 1], one plane per page, each blurred with
/// `blur_sigma` (0 disables the blur).
/// Unreadable input is logged and yields no planes.
pub fn load_image(path: &Path, blur_sigma: f32) -> Vec<ImagePlane> {
    profiling::scope!("load_image");
    let pages = if is_tiff(path) {
        load_tiff_pages(path)
    } else {
        image::open(path)
            .map(|img| vec![img.to_luma32f()])
            .map_err(CellverseError::from)
    };

    let pages = match pages {
        Ok(pages) => pages,
        Err(e) => {
            warn!("could not read image {}: {e}", path.display());
            return Vec::new();
        }
    };

    let planes: Vec<ImagePlane> = pages
        .into_iter()
        .filter_map(|page| {
            let page = if blur_sigma > 0.0 {
                image::imageops::blur(&page, blur_sigma)
            } else {
                page
            };
            let (w, h) = page.dimensions();
            ImagePlane::from_vec(w, h, page.into_raw())
        })
        .collect();

    debug!("loaded {} slice(s) from {}", planes.len(), path.display());
    planes
}

fn is_tiff(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
}

// multi-page tiff: every directory becomes one slice
fn load_tiff_pages(path: &Path) -> Result<Vec<GrayF32>> {
    let file = File::open(path).map_err(|e| CellverseError::io(path, e))?;
    let unsupported = |reason: String| CellverseError::UnsupportedImage {
        path: path.to_path_buf(),
        reason,
    };
    let mut decoder = Decoder::new(BufReader::new(file))?.with_limits(Limits::unlimited());

    let mut pages = Vec::new();
    loop {
        let channels = match decoder.colortype()? {
            tiff::ColorType::Gray(_) => 1,
            tiff::ColorType::GrayA(_) => 2,
            tiff::ColorType::RGB(_) => 3,
            tiff::ColorType::RGBA(_) => 4,
            other => return Err(unsupported(format!("color type {other:?}"))),
        };
        let (w, h) = decoder.dimensions()?;

        let samples: Vec<f32> = match decoder.read_image()? {
            DecodingResult::U8(buf) => buf.iter().map(|&v| v as f32 / u8::MAX as f32).collect(),
            DecodingResult::U16(buf) => buf.iter().map(|&v| v as f32 / u16::MAX as f32).collect(),
            DecodingResult::F32(buf) => buf.iter().map(|&v| v.clamp(0.0, 1.0)).collect(),
            DecodingResult::F64(buf) => buf.iter().map(|&v| v.clamp(0.0, 1.0) as f32).collect(),
            _ => return Err(unsupported("sample format".into())),
        };

        let gray = to_gray(&samples, channels);
        if let Some(page) = GrayF32::from_raw(w, h, gray) {
            pages.push(page);
        }

        if !decoder.more_images() {
            break;
        }
        decoder.next_image()?;
    }
    Ok(pages)
}

// rec.601 luma; alpha is ignored
fn to_gray(samples: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        1 => samples.to_vec(),
        2 => samples.chunks_exact(2).map(|px| px[0]).collect(),
        _ => samples
            .chunks_exact(channels)
            .map(|px| 0.299 * px[0] + 0.587 * px[1] + 0.114 * px[2])
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_no_planes() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_image(&dir.path().join("nope.png"), 1.5).is_empty());
    }

    #[test]
    fn test_corrupt_file_yields_no_planes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.tif");
        std::fs::write(&path, b"definitely not a tiff").unwrap();
        assert!(load_image(&path, 1.5).is_empty());
    }

    #[test]
    fn test_png_loads_as_single_normalized_plane() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flat.png");
        image::GrayImage::from_pixel(6, 4, Luma([255u8])).save(&path).unwrap();

        let planes = load_image(&path, 0.0);
        assert_eq!(planes.len(), 1);
        assert_eq!((planes[0].width, planes[0].height), (6, 4));
        assert!(planes[0].data.iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_blur_keeps_flat_image_flat() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flat.png");
        image::GrayImage::from_pixel(16, 16, Luma([128u8])).save(&path).unwrap();

        let planes = load_image(&path, 1.5);
        let expected = 128.0 / 255.0;
        assert!(planes[0].data.iter().all(|&v| (v - expected).abs() < 1e-3));
    }

    #[test]
    fn test_gray_conversion() {
        assert_eq!(to_gray(&[0.5, 1.0, 0.25, 0.0], 2), vec![0.5, 0.25]);
        let g = to_gray(&[1.0, 1.0, 1.0], 3);
        assert!((g[0] - 1.0).abs() < 1e-6);
    }
}
