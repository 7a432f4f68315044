//! Multi-octave coherent-noise terrain synthesis over grid cells.
//!
//! All evaluators work in sphere-radius-normalized units: the caller's
//! `noise_height` (meters) is divided by the target radius before evaluation
//! and the resulting field is multiplied back by the radius before being
//! added to the elevation field. Elevation is only ever accumulated, so
//! multiple passes compose.

use ndarray::{Array1, Array2};
use noise::{NoiseFn, RotatePoint, ScalePoint, SuperSimplex};
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use log::debug;

use crate::surface::SurfaceGrid;
use crate::target::Target;

/// Default amplitude for the height-scaled models, in meters.
pub const DEFAULT_NOISE_HEIGHT: f64 = 20.0e3;

/// Default number of summed octaves for a noise pass.
pub const DEFAULT_NUM_OCTAVES: usize = 12;

/// Selectable noise model with its validated parameter record.
///
/// The turbulence family (`Turbulence`, `Billowed`, `Ridged`, `Plaw`) is a
/// straight fractal sum shaped per octave; `Swiss` and `Jordan` are the
/// derivative-warped variants of de Carpentier, which sharpen ridges by
/// offsetting each octave along the accumulated gradient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoiseModel {
    Turbulence {
        /// Output amplitude in meters.
        noise_height: f64,
        /// Frequency multiplier per octave.
        freq: f64,
        /// Amplitude multiplier per octave.
        pers: f64,
    },
    Billowed {
        noise_height: f64,
        freq: f64,
        pers: f64,
    },
    Ridged {
        noise_height: f64,
        freq: f64,
        pers: f64,
    },
    Plaw {
        noise_height: f64,
        freq: f64,
        /// Spectral slope; octave amplitude falls off as `freq^(-slope i)`.
        slope: f64,
    },
    Swiss {
        lacunarity: f64,
        gain: f64,
        warp: f64,
    },
    Jordan {
        lacunarity: f64,
        gain: f64,
        warp: f64,
        gain0: f64,
        warp0: f64,
        damp0: f64,
        damp: f64,
        damp_scale: f64,
    },
}

impl NoiseModel {
    pub fn turbulence() -> Self {
        Self::Turbulence {
            noise_height: DEFAULT_NOISE_HEIGHT,
            freq: 2.0,
            pers: 0.5,
        }
    }

    pub fn billowed() -> Self {
        Self::Billowed {
            noise_height: DEFAULT_NOISE_HEIGHT,
            freq: 2.0,
            pers: 0.5,
        }
    }

    pub fn ridged() -> Self {
        Self::Ridged {
            noise_height: DEFAULT_NOISE_HEIGHT,
            freq: 2.0,
            pers: 0.5,
        }
    }

    pub fn plaw() -> Self {
        Self::Plaw {
            noise_height: DEFAULT_NOISE_HEIGHT,
            freq: 2.0,
            slope: 2.0,
        }
    }

    pub fn swiss() -> Self {
        Self::Swiss {
            lacunarity: 1.92,
            gain: 0.5,
            warp: 0.35,
        }
    }

    pub fn jordan() -> Self {
        Self::Jordan {
            lacunarity: 1.92,
            gain: 0.5,
            warp: 0.35,
            gain0: 70.0,
            warp0: 0.4,
            damp0: 1.0,
            damp: 0.8,
            damp_scale: 0.01,
        }
    }
}

/// Evaluates `model` over every grid cell and adds the result to the
/// elevation field.
///
/// # Arguments
/// * `grid` - Surface grid whose `elevation` field is accumulated into.
/// * `target` - Body providing the radius used for unit normalization.
/// * `model` - Noise model and parameters.
/// * `noise_width` - Base spatial wavelength of the noise in meters.
/// * `anchor` - Per-octave decorrelation vectors, shape `num_octaves x 3`.
///   Reusing the same anchor reproduces the same field bit-for-bit.
/// * `seed` - Seed for the underlying noise source.
pub fn apply_noise(
    grid: &mut SurfaceGrid,
    target: &Target,
    model: &NoiseModel,
    noise_width: f64,
    anchor: &Array2<f64>,
    seed: u32,
) {
    let scale = target.radius / noise_width;
    let (x, y, z) = grid.cell_positions();
    // Unit-sphere coordinates stretched by the spatial-frequency scale, so
    // one noise period spans noise_width meters on the surface.
    let fac = scale / target.radius;
    let xn: Vec<f64> = x.iter().map(|&v| v * fac).collect();
    let yn: Vec<f64> = y.iter().map(|&v| v * fac).collect();
    let zn: Vec<f64> = z.iter().map(|&v| v * fac).collect();

    debug!(
        "noise pass: {:?}, width={} m, {} octaves over {} cells",
        model,
        noise_width,
        anchor.nrows(),
        grid.n_cells()
    );

    let field: Vec<f64> = match *model {
        NoiseModel::Turbulence {
            noise_height,
            freq,
            pers,
        } => fractal_field(
            &xn,
            &yn,
            &zn,
            freq,
            noise_height / target.radius,
            anchor,
            seed,
            |i| pers.powi(i),
            |n| n,
        ),
        NoiseModel::Billowed {
            noise_height,
            freq,
            pers,
        } => fractal_field(
            &xn,
            &yn,
            &zn,
            freq,
            noise_height / target.radius,
            anchor,
            seed,
            |i| pers.powi(i),
            |n| n.abs(),
        ),
        NoiseModel::Ridged {
            noise_height,
            freq,
            pers,
        } => fractal_field(
            &xn,
            &yn,
            &zn,
            freq,
            noise_height / target.radius,
            anchor,
            seed,
            |i| pers.powi(i),
            |n| 1.0 - n.abs(),
        ),
        NoiseModel::Plaw {
            noise_height,
            freq,
            slope,
        } => fractal_field(
            &xn,
            &yn,
            &zn,
            freq,
            noise_height / target.radius,
            anchor,
            seed,
            |i| freq.powf(-slope * i as f64),
            |n| n,
        ),
        NoiseModel::Swiss {
            lacunarity,
            gain,
            warp,
        } => swiss_field(&xn, &yn, &zn, lacunarity, gain, warp, anchor, seed),
        NoiseModel::Jordan {
            lacunarity,
            gain,
            warp,
            gain0,
            warp0,
            damp0,
            damp,
            damp_scale,
        } => jordan_field(
            &xn, &yn, &zn, lacunarity, gain, warp, gain0, warp0, damp0, damp, damp_scale, anchor,
            seed,
        ),
    };

    // Accumulate, never overwrite: layered passes compose additively.
    let delta = Array1::from_vec(field) * target.radius;
    grid.elevation += &delta;
}

/// Computes a multi-octave fractal sum over 3D positions.
///
/// Each octave is scaled by `freq^i`, shaped by `shape`, weighted by
/// `amplitude(i)`, and spatially rotated by the per-octave anchor row to
/// decorrelate octaves. The result is normalized and scaled by
/// `noise_height` (already in sphere-radius units).
#[allow(clippy::too_many_arguments)]
fn fractal_field(
    x: &[f64],
    y: &[f64],
    z: &[f64],
    freq: f64,
    noise_height: f64,
    anchor: &Array2<f64>,
    seed: u32,
    amplitude: impl Fn(i32) -> f64,
    shape: fn(f64) -> f64,
) -> Vec<f64> {
    let n_points = x.len();
    let num_octaves = anchor.nrows();
    let mut result = vec![0.0_f64; n_points];

    let mut norm = 0.5;
    for i in 0..num_octaves {
        let spatial_fac = freq.powi(i as i32);
        let noise_mag = amplitude(i as i32);
        let rot_x = anchor[[i, 0]];
        let rot_y = anchor[[i, 1]];
        let rot_z = anchor[[i, 2]];
        norm += 0.5 * noise_mag;

        let base = SuperSimplex::new(seed);
        let scaled = ScalePoint::new(base).set_scale(spatial_fac);
        let source = RotatePoint::new(scaled).set_angles(rot_x, rot_y, rot_z, 0.0);

        let octave: Vec<f64> = (0..n_points)
            .into_par_iter()
            .map(|j| shape(source.get([x[j], y[j], z[j]])) * noise_mag)
            .collect();
        for (r, &val) in result.iter_mut().zip(octave.iter()) {
            *r += val;
        }
    }

    for val in result.iter_mut() {
        *val *= noise_height / norm;
    }
    result
}

/// Step used for the central-difference gradients of the warped models.
const GRAD_STEP: f64 = 1.0e-4;

/// Noise value and central-difference gradient at `p`.
#[inline]
fn noise_with_gradient(source: &SuperSimplex, p: [f64; 3]) -> (f64, [f64; 3]) {
    let value = source.get(p);
    let gx = (source.get([p[0] + GRAD_STEP, p[1], p[2]])
        - source.get([p[0] - GRAD_STEP, p[1], p[2]]))
        / (2.0 * GRAD_STEP);
    let gy = (source.get([p[0], p[1] + GRAD_STEP, p[2]])
        - source.get([p[0], p[1] - GRAD_STEP, p[2]]))
        / (2.0 * GRAD_STEP);
    let gz = (source.get([p[0], p[1], p[2] + GRAD_STEP])
        - source.get([p[0], p[1], p[2] - GRAD_STEP]))
        / (2.0 * GRAD_STEP);
    (value, [gx, gy, gz])
}

/// Swiss turbulence (de Carpentier): ridged fractal with each octave warped
/// along the accumulated downhill gradient, carving valley networks.
#[allow(clippy::too_many_arguments)]
fn swiss_field(
    x: &[f64],
    y: &[f64],
    z: &[f64],
    lacunarity: f64,
    gain: f64,
    warp: f64,
    anchor: &Array2<f64>,
    seed: u32,
) -> Vec<f64> {
    let num_octaves = anchor.nrows();
    let sources: Vec<SuperSimplex> = (0..num_octaves)
        .map(|i| SuperSimplex::new(seed.wrapping_add(i as u32)))
        .collect();

    (0..x.len())
        .into_par_iter()
        .map(|j| {
            let p = [x[j], y[j], z[j]];
            let mut sum = 0.0;
            let mut freq = 1.0;
            let mut amp = 1.0;
            let mut dsum = [0.0_f64; 3];
            for (i, source) in sources.iter().enumerate() {
                let q = [
                    (p[0] + warp * dsum[0]) * freq + anchor[[i, 0]],
                    (p[1] + warp * dsum[1]) * freq + anchor[[i, 1]],
                    (p[2] + warp * dsum[2]) * freq + anchor[[i, 2]],
                ];
                let (value, grad) = noise_with_gradient(source, q);
                sum += amp * (1.0 - value.abs());
                dsum[0] += amp * grad[0] * -value;
                dsum[1] += amp * grad[1] * -value;
                dsum[2] += amp * grad[2] * -value;
                freq *= lacunarity;
                amp *= gain * sum.clamp(0.0, 1.0);
            }
            sum
        })
        .collect()
}

/// Jordan turbulence (de Carpentier): squared-noise fractal with separate
/// warp and damping gradient accumulators, damping amplitude on slopes.
#[allow(clippy::too_many_arguments)]
fn jordan_field(
    x: &[f64],
    y: &[f64],
    z: &[f64],
    lacunarity: f64,
    gain: f64,
    warp: f64,
    gain0: f64,
    warp0: f64,
    damp0: f64,
    damp: f64,
    damp_scale: f64,
    anchor: &Array2<f64>,
    seed: u32,
) -> Vec<f64> {
    let num_octaves = anchor.nrows();
    let sources: Vec<SuperSimplex> = (0..num_octaves)
        .map(|i| SuperSimplex::new(seed.wrapping_add(i as u32)))
        .collect();

    (0..x.len())
        .into_par_iter()
        .map(|j| {
            let p = [x[j], y[j], z[j]];
            let p0 = [p[0] + anchor[[0, 0]], p[1] + anchor[[0, 1]], p[2] + anchor[[0, 2]]];
            let (value, grad) = noise_with_gradient(&sources[0], p0);
            // d(n^2)/dx = 2 n grad; the constant factor folds into the warps.
            let mut sum = value * value;
            let mut dsum_warp = [
                warp0 * grad[0] * value,
                warp0 * grad[1] * value,
                warp0 * grad[2] * value,
            ];
            let mut dsum_damp = [
                damp0 * grad[0] * value,
                damp0 * grad[1] * value,
                damp0 * grad[2] * value,
            ];

            let mut freq = lacunarity;
            let mut amp = gain0;
            let mut damped_amp = amp * gain;

            for (i, source) in sources.iter().enumerate().skip(1) {
                let q = [
                    p[0] * freq + dsum_warp[0] + anchor[[i, 0]],
                    p[1] * freq + dsum_warp[1] + anchor[[i, 1]],
                    p[2] * freq + dsum_warp[2] + anchor[[i, 2]],
                ];
                let (value, grad) = noise_with_gradient(source, q);
                sum += damped_amp * value * value;
                dsum_warp[0] += warp * grad[0] * value;
                dsum_warp[1] += warp * grad[1] * value;
                dsum_warp[2] += warp * grad[2] * value;
                dsum_damp[0] += damp * grad[0] * value;
                dsum_damp[1] += damp * grad[1] * value;
                dsum_damp[2] += damp * grad[2] * value;
                freq *= lacunarity;
                amp *= gain;
                let damp_sq = dsum_damp[0] * dsum_damp[0]
                    + dsum_damp[1] * dsum_damp[1]
                    + dsum_damp[2] * dsum_damp[2];
                damped_amp = amp * (1.0 - damp_scale / (1.0 + damp_sq));
            }
            sum
        })
        .collect()
}
