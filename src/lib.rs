//! Impact-cratering simulation core.
//!
//! The crate is organized around three computational layers and one
//! orchestrator:
//!
//! * [`scaling`] - bidirectional projectile/crater scaling laws (pi-group
//!   scaling with smooth strength/gravity regime blending).
//! * [`emplacement`] + [`surface`] - placement of a crater on a spherical
//!   cell grid: great-circle distances, initial bearings, and the
//!   footprint-averaged surface normal.
//! * [`noise_functions`] - multi-octave coherent-noise terrain synthesis.
//! * [`simulation`] - the seeded [`Simulation`] orchestrator tying the
//!   layers together behind a layered JSON configuration.
//!
//! All quantities are SI: meters, seconds, kg/m^3, Pa, and radians.

pub mod crater;
pub mod emplacement;
pub mod errors;
pub mod noise_functions;
pub mod scaling;
pub mod simulation;
pub mod surface;
pub mod target;

pub use crater::{Crater, Location, Morphotype, Projectile};
pub use errors::{ConfigError, GeometryError, ScalingError, SimulationError};
pub use noise_functions::{NoiseModel, DEFAULT_NUM_OCTAVES};
pub use simulation::{ImpactArgs, Simulation, SimulationConfig};
pub use surface::SurfaceGrid;
pub use target::{Material, MaterialConfig, Target, TargetConfig};

/// Threshold below which a vector norm is treated as zero.
pub(crate) const VSMALL: f64 = 10.0 * f64::EPSILON;
