// grayscale image planes and depth stacks.
// all pixel values are f32 in [0, 1], row-major.

use std::fmt;

use crate::error::{CellverseError, Result};

/// one depth slice
#[derive(Clone, Debug, PartialEq)]
pub struct ImagePlane {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl ImagePlane {
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, 0.0)
    }

    pub fn filled(width: u32, height: u32, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    /// wrap an existing buffer; the buffer length must be width * height
    pub fn from_vec(width: u32, height: u32, data: Vec<f32>) -> Option<Self> {
        if data.len() != width as usize * height as usize {
            return None;
        }
        Some(Self { width, height, data })
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: f32) {
        self.data[(y * self.width + x) as usize] = value;
    }

    pub fn num_pixels(&self) -> usize {
        self.data.len()
    }

    /// quantize to 8-bit grayscale (clamped, rounded)
    pub fn to_luma8(&self) -> Vec<u8> {
        self.data
            .iter()
            .map(|&v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect()
    }

    pub fn to_gray_image(&self) -> image::GrayImage {
        image::GrayImage::from_raw(self.width, self.height, self.to_luma8())
            .unwrap_or_else(|| image::GrayImage::new(self.width, self.height))
    }
}

/// width, height and slice count of a stack
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct StackShape {
    pub width: u32,
    pub height: u32,
    pub depth: usize,
}

impl StackShape {
    pub fn new(width: u32, height: u32, depth: usize) -> Self {
        Self { width, height, depth }
    }

    pub fn is_empty(&self) -> bool {
        self.depth == 0 || self.width == 0 || self.height == 0
    }

    pub fn num_voxels(&self) -> usize {
        self.width as usize * self.height as usize * self.depth
    }
}

impl fmt::Display for StackShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.depth)
    }
}

/// ordered sequence of planes, one per depth slice.
/// every plane has the same dimensions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImageStack {
    planes: Vec<ImagePlane>,
}

impl ImageStack {
    pub fn empty() -> Self {
        Self { planes: Vec::new() }
    }

    pub fn from_planes(planes: Vec<ImagePlane>) -> Result<Self> {
        if let Some(first) = planes.first() {
            let expected = StackShape::new(first.width, first.height, planes.len());
            for plane in &planes {
                if plane.width != first.width || plane.height != first.height {
                    return Err(CellverseError::ShapeMismatch {
                        expected,
                        got: StackShape::new(plane.width, plane.height, planes.len()),
                    });
                }
            }
        }
        Ok(Self { planes })
    }

    /// a stack of `shape.depth` planes all set to `value`
    pub fn filled(shape: StackShape, value: f32) -> Self {
        Self {
            planes: (0..shape.depth)
                .map(|_| ImagePlane::filled(shape.width, shape.height, value))
                .collect(),
        }
    }

    pub fn shape(&self) -> StackShape {
        match self.planes.first() {
            Some(p) => StackShape::new(p.width, p.height, self.planes.len()),
            None => StackShape::default(),
        }
    }

    pub fn planes(&self) -> &[ImagePlane] {
        &self.planes
    }

    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ImagePlane> {
        self.planes.iter()
    }
}

impl<'a> IntoIterator for &'a ImageStack {
    type Item = &'a ImagePlane;
    type IntoIter = std::slice::Iter<'a, ImagePlane>;

    fn into_iter(self) -> Self::IntoIter {
        self.planes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_of_empty_stack() {
        let stack = ImageStack::empty();
        assert_eq!(stack.shape(), StackShape::default());
        assert!(stack.shape().is_empty());
    }

    #[test]
    fn test_from_planes_rejects_mixed_dimensions() {
        let planes = vec![ImagePlane::new(4, 4), ImagePlane::new(4, 5)];
        let err = ImageStack::from_planes(planes).unwrap_err();
        assert!(err.is_precondition_violation());
    }

    #[test]
    fn test_to_luma8_clamps() {
        let plane = ImagePlane::from_vec(3, 1, vec![-0.5, 0.5, 2.0]).unwrap();
        assert_eq!(plane.to_luma8(), vec![0, 128, 255]);
    }

    #[test]
    fn test_from_vec_checks_length() {
        assert!(ImagePlane::from_vec(2, 2, vec![0.0; 3]).is_none());
    }
}
