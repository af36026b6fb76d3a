// sphere geometry helpers
//
// this module keeps cell models physically valid:
// - centers stay inside the imaged volume
// - radii stay inside the configured range
// - splits conserve volume and keep both children inside the parent

use rand::Rng;

use crate::cell::Sphere;
use crate::image_stack::StackShape;

/// the imaged volume in pixel units. slice k sits at depth k * z_spacing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VolumeBounds {
    pub width: f32,
    pub height: f32,
    pub max_z: f32,
}

impl VolumeBounds {
    pub fn from_shape(shape: StackShape, z_spacing: f32) -> Self {
        Self {
            width: shape.width as f32,
            height: shape.height as f32,
            max_z: shape.depth.saturating_sub(1) as f32 * z_spacing,
        }
    }

    /// true when the stack has a single slice and cells cannot move in z
    pub fn is_planar(&self) -> bool {
        self.max_z <= 0.0
    }

    /// x in [0, width), y in [0, height), z in [0, max_z]
    #[inline]
    pub fn contains(&self, x: f32, y: f32, z: f32) -> bool {
        x >= 0.0 && x < self.width && y >= 0.0 && y < self.height && z >= 0.0 && z <= self.max_z
    }
}

/// check a sphere against volume and radius limits.
/// nan parameters always fail.
pub fn sphere_is_valid(s: &Sphere, bounds: &VolumeBounds, radius_min: f32, radius_max: f32) -> bool {
    s.radius >= radius_min
        && s.radius <= radius_max
        && s.radius >= 0.0
        && bounds.contains(s.x, s.y, s.z)
}

/// pull a sphere back inside the volume and radius range.
/// the open far edges are approached to within 1e-3 px.
pub fn clamp_sphere(s: &mut Sphere, bounds: &VolumeBounds, radius_min: f32, radius_max: f32) {
    const EDGE: f32 = 1e-3;
    s.x = s.x.clamp(0.0, (bounds.width - EDGE).max(0.0));
    s.y = s.y.clamp(0.0, (bounds.height - EDGE).max(0.0));
    s.z = s.z.clamp(0.0, bounds.max_z.max(0.0));
    s.radius = s.radius.clamp(radius_min, radius_max);
}

/// radius of the disc a sphere cuts out of a slice at distance `dz` from its center.
/// None when the slice misses the sphere.
#[inline]
pub fn slice_radius(radius: f32, dz: f32) -> Option<f32> {
    let r2 = radius * radius - dz * dz;
    if r2 > 0.0 {
        Some(r2.sqrt())
    } else {
        None
    }
}

/// uniformly distributed direction. planar volumes get a direction in the xy plane.
pub fn random_unit_vector<R: Rng>(rng: &mut R, planar: bool) -> [f32; 3] {
    let theta = rng.random_range(0.0..std::f32::consts::TAU);
    if planar {
        return [theta.cos(), theta.sin(), 0.0];
    }
    // archimedes: uniform z on [-1, 1] gives uniform points on the sphere
    let z: f32 = rng.random_range(-1.0..=1.0);
    let r = (1.0 - z * z).max(0.0).sqrt();
    [r * theta.cos(), r * theta.sin(), z]
}

/// child radius and center offset for a volume-preserving split.
/// the two children each hold half the parent volume and touch the parent's surface.
#[inline]
pub fn split_geometry(parent_radius: f32) -> (f32, f32) {
    let child_radius = parent_radius / 2f32.cbrt();
    (child_radius, parent_radius - child_radius)
}

/// the two children of a split along `axis`, named by the caller
pub fn split_sphere(parent: &Sphere, axis: [f32; 3], names: (String, String)) -> (Sphere, Sphere) {
    let (child_radius, offset) = split_geometry(parent.radius);
    let [ax, ay, az] = axis;
    let a = Sphere::new(
        names.0,
        parent.x + ax * offset,
        parent.y + ay * offset,
        parent.z + az * offset,
        child_radius,
    );
    let b = Sphere::new(
        names.1,
        parent.x - ax * offset,
        parent.y - ay * offset,
        parent.z - az * offset,
        child_radius,
    );
    (a, b)
}
