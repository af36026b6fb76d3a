//! Fits sphere cell models to time-lapse microscopy stacks.
//!
//! Each time point is a [`Frame`]: a real image stack and a set of [`Sphere`] cells that
//! are perturbed and split until their rendered stack matches the real one.
//! A [`Lineage`] holds the frames in time order and carries cells from one frame to the next.

pub mod cell;
pub mod config;
pub mod engine;
pub mod error;
pub mod fitness;
pub mod geom;
pub mod image_stack;
pub mod io;
pub mod lineage;
pub mod render;
pub mod settings;

pub use cell::{CellParams, Param, Sphere};
pub use config::{Algorithm, GradientConfig, MoveWeights, SimulationConfig};
pub use engine::{Frame, MoveKind, OptimizeReport, OptimizerContext, OptimizerState, Outcome, PendingMove};
pub use error::{CellverseError, Result};
pub use fitness::{Cost, CostEvaluator, CostMetric, MetricsSnapshot};
pub use image_stack::{ImagePlane, ImageStack, StackShape};
pub use lineage::Lineage;
pub use render::{CpuRenderer, SyntheticRenderer};
pub use settings::Settings;
