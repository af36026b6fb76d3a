use std::fmt;

use serde::{Deserialize, Serialize};

/// a sphere-shaped cell model. position and radius are in pixels;
/// `z` is measured along the stack axis in the same units (see `SimulationConfig::z_spacing`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub radius: f32,
}

/// the scalar parameters a perturbation can touch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Param {
    X,
    Y,
    Z,
    Radius,
}

impl Param {
    pub const ALL: [Param; 4] = [Param::X, Param::Y, Param::Z, Param::Radius];

    pub fn is_position(self) -> bool {
        !matches!(self, Param::Radius)
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Param::X => "x",
            Param::Y => "y",
            Param::Z => "z",
            Param::Radius => "radius",
        };
        f.write_str(s)
    }
}

impl Sphere {
    pub fn new(name: impl Into<String>, x: f32, y: f32, z: f32, radius: f32) -> Self {
        Self { name: name.into(), x, y, z, radius }
    }

    #[inline]
    pub fn get(&self, param: Param) -> f32 {
        match param {
            Param::X => self.x,
            Param::Y => self.y,
            Param::Z => self.z,
            Param::Radius => self.radius,
        }
    }

    #[inline]
    pub fn set(&mut self, param: Param, value: f32) {
        match param {
            Param::X => self.x = value,
            Param::Y => self.y = value,
            Param::Z => self.z = value,
            Param::Radius => self.radius = value,
        }
    }

    pub fn volume(&self) -> f32 {
        4.0 / 3.0 * std::f32::consts::PI * self.radius.powi(3)
    }

    pub fn to_params(&self, file: &str) -> CellParams {
        CellParams {
            file: file.to_owned(),
            name: self.name.clone(),
            x: self.x,
            y: self.y,
            z: self.z,
            radius: self.radius,
        }
    }
}

/// one exported row: a cell plus the image it was fitted in
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellParams {
    pub file: String,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub radius: f32,
}

impl CellParams {
    pub fn into_sphere(self) -> Sphere {
        Sphere {
            name: self.name,
            x: self.x,
            y: self.y,
            z: self.z,
            radius: self.radius,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_round_trip_every_param() {
        let mut s = Sphere::new("a", 1.0, 2.0, 3.0, 4.0);
        for (i, p) in Param::ALL.iter().enumerate() {
            s.set(*p, 10.0 + i as f32);
            assert_eq!(s.get(*p), 10.0 + i as f32);
        }
        assert_eq!(s.name, "a");
    }

    #[test]
    fn test_to_params_carries_file_label() {
        let s = Sphere::new("c1", 1.0, 2.0, 0.0, 3.0);
        let row = s.to_params("frame_000.tif");
        assert_eq!(row.file, "frame_000.tif");
        assert_eq!(row.into_sphere(), s);
    }
}
