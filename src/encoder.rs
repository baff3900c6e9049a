//! Gradient-histogram feature encoding of a cropped face region.
//!
//! The detector's bounding box is expanded by a fixed margin, resized to a
//! canonical square, and reduced to a grid of magnitude-weighted orientation
//! histograms. The concatenated histograms are fitted to the system
//! dimension and L2-normalized. Deterministic for identical pixel input.

use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array2;

use crate::error::EncodingError;
use crate::index::FaceVector;
use crate::records::{BoundingBox, Quality};

/// Canonical face size the region is resized to before feature extraction.
pub const CANONICAL_SIZE: u32 = 128;
/// Margin added around the detection box, clamped to image bounds.
const REGION_MARGIN: u32 = 20;
/// Side length of one histogram cell in canonical pixels.
const CELL_SIZE: usize = 16;
/// Orientation bins per cell, spanning the full angular range.
const ORIENTATION_BINS: usize = 9;

/// Encode a face region into a unit-norm [`FaceVector`].
pub fn encode(image: &RgbImage, region: &BoundingBox) -> Result<FaceVector, EncodingError> {
    let crop = crop_with_margin(image, region)?;
    let face = imageops::resize(&crop, CANONICAL_SIZE, CANONICAL_SIZE, FilterType::Triangle);
    let gray = to_intensity(&face);
    let (magnitude, orientation) = gradients(&gray);
    let features = cell_histograms(&magnitude, &orientation);
    FaceVector::new(features)
        .fitted()
        .into_unit()
        .map_err(|_| EncodingError::DegenerateRegion)
}

/// Grade the face region for registration metadata: sharpness (Laplacian
/// variance) and brightness over the raw region, plus its size.
pub fn assess_quality(image: &RgbImage, region: &BoundingBox) -> Quality {
    let Some(crop) = crop_exact(image, region) else {
        // Nothing to measure; grade conservatively.
        return Quality::Medium;
    };
    let gray = to_intensity(&crop);
    let sharpness = laplacian_variance(&gray);
    let brightness = gray.mean().unwrap_or(0.0);
    let (w, h) = (region.width, region.height);

    if sharpness > 500.0 && (50.0..200.0).contains(&brightness) && w > 100 && h > 100 {
        Quality::High
    } else if sharpness > 200.0 && (30.0..220.0).contains(&brightness) && w > 50 && h > 50 {
        Quality::Medium
    } else {
        Quality::Low
    }
}

/// Expand the box by [`REGION_MARGIN`] and crop, clamped to image bounds.
fn crop_with_margin(image: &RgbImage, region: &BoundingBox) -> Result<RgbImage, EncodingError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(EncodingError::MalformedImage);
    }
    if region.width == 0 || region.height == 0 {
        return Err(EncodingError::EmptyRegion);
    }
    let x0 = region.x.saturating_sub(REGION_MARGIN);
    let y0 = region.y.saturating_sub(REGION_MARGIN);
    let x1 = region
        .x
        .saturating_add(region.width)
        .saturating_add(REGION_MARGIN)
        .min(image.width());
    let y1 = region
        .y
        .saturating_add(region.height)
        .saturating_add(REGION_MARGIN)
        .min(image.height());
    if x0 >= x1 || y0 >= y1 {
        return Err(EncodingError::EmptyRegion);
    }
    Ok(imageops::crop_imm(image, x0, y0, x1 - x0, y1 - y0).to_image())
}

fn crop_exact(image: &RgbImage, region: &BoundingBox) -> Option<RgbImage> {
    if region.width == 0 || region.height == 0 || region.x >= image.width() || region.y >= image.height() {
        return None;
    }
    let w = region.width.min(image.width() - region.x);
    let h = region.height.min(image.height() - region.y);
    Some(imageops::crop_imm(image, region.x, region.y, w, h).to_image())
}

/// Single-channel intensity plane (Rec. 601 luma weights).
fn to_intensity(image: &RgbImage) -> Array2<f32> {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let mut gray = Array2::zeros((h, w));
    for (x, y, pixel) in image.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        gray[[y as usize, x as usize]] =
            0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
    }
    gray
}

/// Per-pixel gradient magnitude and orientation via 3x3 Sobel kernels.
/// Border pixels stay zero.
fn gradients(gray: &Array2<f32>) -> (Array2<f32>, Array2<f32>) {
    let (h, w) = gray.dim();
    let mut magnitude = Array2::zeros((h, w));
    let mut orientation = Array2::zeros((h, w));
    if h < 3 || w < 3 {
        return (magnitude, orientation);
    }
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let gx = gray[[y - 1, x + 1]] + 2.0 * gray[[y, x + 1]] + gray[[y + 1, x + 1]]
                - gray[[y - 1, x - 1]]
                - 2.0 * gray[[y, x - 1]]
                - gray[[y + 1, x - 1]];
            let gy = gray[[y + 1, x - 1]] + 2.0 * gray[[y + 1, x]] + gray[[y + 1, x + 1]]
                - gray[[y - 1, x - 1]]
                - 2.0 * gray[[y - 1, x]]
                - gray[[y - 1, x + 1]];
            magnitude[[y, x]] = (gx * gx + gy * gy).sqrt();
            orientation[[y, x]] = gy.atan2(gx);
        }
    }
    (magnitude, orientation)
}

/// Partition the canonical plane into [`CELL_SIZE`] cells and build one
/// magnitude-weighted orientation histogram per cell, concatenated in
/// row-major cell order.
fn cell_histograms(magnitude: &Array2<f32>, orientation: &Array2<f32>) -> Vec<f32> {
    let (h, w) = magnitude.dim();
    let cells_y = h / CELL_SIZE;
    let cells_x = w / CELL_SIZE;
    let mut features = Vec::with_capacity(cells_y * cells_x * ORIENTATION_BINS);

    for cy in 0..cells_y {
        for cx in 0..cells_x {
            let mut hist = [0.0f32; ORIENTATION_BINS];
            let y_end = ((cy + 1) * CELL_SIZE).min(h);
            let x_end = ((cx + 1) * CELL_SIZE).min(w);
            for y in cy * CELL_SIZE..y_end {
                for x in cx * CELL_SIZE..x_end {
                    let angle = orientation[[y, x]];
                    // Map [-pi, pi] onto the bin range; the +pi endpoint
                    // folds into the last bin.
                    let bin = (((angle + std::f32::consts::PI)
                        / (2.0 * std::f32::consts::PI))
                        * ORIENTATION_BINS as f32) as usize;
                    hist[bin.min(ORIENTATION_BINS - 1)] += magnitude[[y, x]];
                }
            }
            features.extend_from_slice(&hist);
        }
    }
    features
}

fn laplacian_variance(gray: &Array2<f32>) -> f32 {
    let (h, w) = gray.dim();
    if h < 3 || w < 3 {
        return 0.0;
    }
    let mut responses = Vec::with_capacity((h - 2) * (w - 2));
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            responses.push(
                gray[[y - 1, x]] + gray[[y + 1, x]] + gray[[y, x - 1]] + gray[[y, x + 1]]
                    - 4.0 * gray[[y, x]],
            );
        }
    }
    let mean = responses.iter().sum::<f32>() / responses.len() as f32;
    responses.iter().map(|r| (r - mean).powi(2)).sum::<f32>() / responses.len() as f32
}
