use rayon::prelude::*;
use tiny_skia as sk;

use crate::cell::Sphere;
use crate::config::SimulationConfig;
use crate::geom::slice_radius;
use crate::image_stack::{ImagePlane, ImageStack, StackShape};

/// turns a cell configuration into a synthetic stack.
/// must be a pure function of its inputs so costs stay reproducible.
pub trait SyntheticRenderer: Send + Sync {
    fn render(&self, cells: &[Sphere], shape: StackShape) -> ImageStack;
}

// Scratch pixmap reused across calls to avoid allocations.
// One per rayon worker since slices render in parallel.
thread_local! {
    static SCRATCH_PIX: std::cell::RefCell<Option<sk::Pixmap>> =
        const { std::cell::RefCell::new(None) };
}

/// flat-shaded sphere renderer: each slice shows every sphere's cross-section
/// as a disc of `cell_intensity` over a `background` field.
#[derive(Clone, Debug, PartialEq)]
pub struct CpuRenderer {
    pub background: f32,
    pub cell_intensity: f32,
    pub antialiasing: bool,
    pub z_spacing: f32,
}

impl CpuRenderer {
    pub fn from_config(cfg: &SimulationConfig) -> Self {
        Self {
            background: cfg.background_intensity,
            cell_intensity: cfg.cell_intensity,
            antialiasing: cfg.antialiasing,
            z_spacing: cfg.z_spacing,
        }
    }

    fn render_slice(&self, cells: &[Sphere], width: u32, height: u32, slice: usize) -> ImagePlane {
        profiling::scope!("render_slice");
        let slice_z = slice as f32 * self.z_spacing;

        SCRATCH_PIX.with(|pix_cell| {
            let need_new = match pix_cell.borrow().as_ref() {
                Some(pm) => pm.width() != width || pm.height() != height,
                None => true,
            };
            if need_new {
                *pix_cell.borrow_mut() = sk::Pixmap::new(width, height);
            }

            let mut pix_borrow = pix_cell.borrow_mut();
            let Some(pix) = pix_borrow.as_mut() else {
                return ImagePlane::filled(width, height, self.background);
            };

            pix.fill(gray(self.background));

            let mut paint = sk::Paint::default();
            paint.anti_alias = self.antialiasing;
            paint.shader = sk::Shader::SolidColor(gray(self.cell_intensity));

            for cell in cells {
                draw_disc(pix, cell, slice_z, &paint);
            }

            // opaque gray: the red channel carries the intensity
            let data = pix.data().chunks_exact(4).map(|px| px[0] as f32 / 255.0).collect();
            ImagePlane { width, height, data }
        })
    }
}

impl SyntheticRenderer for CpuRenderer {
    fn render(&self, cells: &[Sphere], shape: StackShape) -> ImageStack {
        profiling::scope!("CpuRenderer::render");
        if shape.is_empty() {
            return ImageStack::filled(shape, self.background);
        }

        let planes: Vec<ImagePlane> = (0..shape.depth)
            .into_par_iter()
            .map(|k| self.render_slice(cells, shape.width, shape.height, k))
            .collect();

        ImageStack::from_planes(planes).unwrap_or_else(|_| ImageStack::filled(shape, self.background))
    }
}

#[inline]
fn gray(v: f32) -> sk::Color {
    let v = v.clamp(0.0, 1.0);
    sk::Color::from_rgba(v, v, v, 1.0).unwrap_or(sk::Color::BLACK)
}

fn draw_disc(pix: &mut sk::Pixmap, cell: &Sphere, slice_z: f32, paint: &sk::Paint) {
    let Some(r) = slice_radius(cell.radius, slice_z - cell.z) else {
        return;
    };

    // pixel (i, j) covers [i, i + 1) x [j, j + 1); cell coordinates address pixel centers
    let cx = cell.x + 0.5;
    let cy = cell.y + 0.5;

    // Quick reject: bbox fully outside the pixmap
    let (w, h) = (pix.width() as f32, pix.height() as f32);
    if cx + r < 0.0 || cy + r < 0.0 || cx - r >= w || cy - r >= h {
        return;
    }

    if let Some(path) = sk::PathBuilder::from_circle(cx, cy, r) {
        pix.fill_path(&path, paint, sk::FillRule::Winding, sk::Transform::identity(), None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> CpuRenderer {
        CpuRenderer {
            background: 0.0,
            cell_intensity: 1.0,
            antialiasing: true,
            z_spacing: 1.0,
        }
    }

    #[test]
    fn test_empty_configuration_renders_background() {
        let r = CpuRenderer { background: 0.2, ..renderer() };
        let stack = r.render(&[], StackShape::new(8, 6, 2));
        assert_eq!(stack.shape(), StackShape::new(8, 6, 2));
        for plane in &stack {
            for &v in &plane.data {
                assert!((v - 0.2).abs() <= 1.0 / 255.0);
            }
        }
    }

    #[test]
    fn test_disc_center_is_lit_and_corner_is_not() {
        let cells = [Sphere::new("a", 10.0, 10.0, 0.0, 4.0)];
        let stack = renderer().render(&cells, StackShape::new(20, 20, 1));
        let plane = &stack.planes()[0];
        assert_eq!(plane.get(10, 10), 1.0);
        assert_eq!(plane.get(0, 0), 0.0);
    }

    #[test]
    fn test_cross_section_shrinks_away_from_center_slice() {
        let cells = [Sphere::new("a", 16.0, 16.0, 2.0, 6.0)];
        let stack = renderer().render(&cells, StackShape::new(32, 32, 9));
        let lit = |k: usize| stack.planes()[k].data.iter().filter(|&&v| v > 0.5).count();
        assert!(lit(2) > lit(5));
        assert!(lit(5) > 0);
        // |dz| = 6 touches the sphere surface only
        assert_eq!(lit(8), 0);
    }

    #[test]
    fn test_render_is_deterministic() {
        let cells = [
            Sphere::new("a", 7.3, 9.1, 1.2, 3.7),
            Sphere::new("b", 15.8, 4.4, 0.4, 2.9),
        ];
        let shape = StackShape::new(24, 16, 3);
        let first = renderer().render(&cells, shape);
        for _ in 0..3 {
            assert_eq!(renderer().render(&cells, shape), first);
        }
    }

    #[test]
    fn test_zero_depth_shape_renders_nothing() {
        let stack = renderer().render(&[Sphere::new("a", 1.0, 1.0, 0.0, 1.0)], StackShape::default());
        assert!(stack.is_empty());
    }
}
