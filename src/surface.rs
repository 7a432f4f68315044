//! Spherical surface grid: per-cell coordinates, geometry queries, and the
//! mutable fields written by emplacement and noise synthesis.

use std::f64::consts::PI;

use itertools::Itertools;
use ndarray::Array1;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::crater::Location;
use crate::VSMALL;

/// Computes the positive modulus of `x` with respect to `m`.
/// Ensures the result is always in the range `[0, m)`.
#[inline]
fn positive_mod(x: f64, m: f64) -> f64 {
    ((x % m) + m) % m
}

/// Computes the Haversine distance between two points on a sphere given their
/// longitude and latitude in radians.
///
/// # Arguments
/// * `lon1`, `lat1` - Coordinates of the first point in radians.
/// * `lon2`, `lat2` - Coordinates of the second point in radians.
/// * `radius` - Radius of the sphere in meters.
///
/// # Returns
/// Distance in meters between the two points along the surface of the sphere.
#[inline]
pub fn haversine_distance(lon1: f64, lat1: f64, lon2: f64, lat2: f64, radius: f64) -> f64 {
    let dlon = lon2 - lon1;
    let dlat = lat2 - lat1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    radius * c
}

/// Computes the initial bearing (forward azimuth) from point 1 to point 2 on
/// a sphere, in radians in (-pi, pi]. Zero angular separation yields 0 by the
/// atan2(0, 0) convention, never NaN.
#[inline]
pub fn initial_bearing(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let dlon = positive_mod(lon2 - lon1 + PI, 2.0 * PI) - PI;
    let x = dlon.sin() * lat2.cos();
    let y = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    x.atan2(y)
}

/// An unstructured cell grid on a sphere.
///
/// Cell-center positions are stored in meters; `lon`/`lat` are derived at
/// construction. The three named fields `crater_distance`, `crater_bearing`,
/// and `elevation` are the only state the emplacement and noise passes
/// mutate; topology is fixed for the life of the grid.
#[derive(Debug, Clone)]
pub struct SurfaceGrid {
    x: Array1<f64>,
    y: Array1<f64>,
    z: Array1<f64>,
    lon: Array1<f64>,
    lat: Array1<f64>,
    /// Great-circle distance from the current crater center to each cell (m).
    pub crater_distance: Array1<f64>,
    /// Initial bearing from the current crater center to each cell, [0, 2pi).
    pub crater_bearing: Array1<f64>,
    /// Accumulated per-cell height perturbation (m). Only ever added to.
    pub elevation: Array1<f64>,
}

impl SurfaceGrid {
    /// Wraps collaborator-supplied cell-center coordinates (meters) into a
    /// grid, deriving longitude and latitude per cell.
    pub fn from_cells(x: Vec<f64>, y: Vec<f64>, z: Vec<f64>) -> Self {
        assert_eq!(x.len(), y.len());
        assert_eq!(x.len(), z.len());
        let n = x.len();
        let (lon, lat): (Vec<f64>, Vec<f64>) = (0..n)
            .map(|i| {
                let r = (x[i] * x[i] + y[i] * y[i] + z[i] * z[i]).sqrt();
                (y[i].atan2(x[i]), (z[i] / r).asin())
            })
            .unzip();
        Self {
            x: Array1::from_vec(x),
            y: Array1::from_vec(y),
            z: Array1::from_vec(z),
            lon: Array1::from_vec(lon),
            lat: Array1::from_vec(lat),
            crater_distance: Array1::zeros(n),
            crater_bearing: Array1::zeros(n),
            elevation: Array1::zeros(n),
        }
    }

    /// Builds a quasi-uniform golden-spiral (Fibonacci) cell layout on a
    /// sphere of the given radius. A stand-in for an externally generated
    /// mesh; cell spacing is roughly `sqrt(4 pi R^2 / n)`.
    pub fn fibonacci(n: usize, radius: f64) -> Self {
        let golden_angle = PI * (3.0 - 5.0_f64.sqrt());
        let (x, y, z): (Vec<f64>, Vec<f64>, Vec<f64>) = (0..n)
            .map(|i| {
                let zf = 1.0 - 2.0 * (i as f64 + 0.5) / n as f64;
                let r_xy = (1.0 - zf * zf).sqrt();
                let theta = golden_angle * i as f64;
                (
                    radius * r_xy * theta.cos(),
                    radius * r_xy * theta.sin(),
                    radius * zf,
                )
            })
            .multiunzip();
        Self::from_cells(x, y, z)
    }

    pub fn n_cells(&self) -> usize {
        self.x.len()
    }

    /// Cell-center coordinate arrays, in meters.
    pub fn cell_positions(&self) -> (&Array1<f64>, &Array1<f64>, &Array1<f64>) {
        (&self.x, &self.y, &self.z)
    }

    /// Per-cell longitude, radians.
    pub fn lon(&self) -> &Array1<f64> {
        &self.lon
    }

    /// Per-cell latitude, radians.
    pub fn lat(&self) -> &Array1<f64> {
        &self.lat
    }

    /// Computes the Haversine distance from `location` to every cell on a
    /// sphere of radius `radius` (meters).
    pub fn get_cell_distance(&self, location: Location, radius: f64) -> Array1<f64> {
        let n = self.n_cells();
        let result_vec: Vec<f64> = (0..n)
            .into_par_iter()
            .map(|i| haversine_distance(location.lon, location.lat, self.lon[i], self.lat[i], radius))
            .collect();
        Array1::from_vec(result_vec)
    }

    /// Computes the initial bearing from `location` to every cell, normalized
    /// to [0, 2pi).
    pub fn get_cell_initial_bearing(&self, location: Location) -> Array1<f64> {
        let n = self.n_cells();
        let result_vec: Vec<f64> = (0..n)
            .into_par_iter()
            .map(|i| {
                let bearing = initial_bearing(location.lon, location.lat, self.lon[i], self.lat[i]);
                // Normalize bearing to 0 to 2*pi
                (bearing + 2.0 * PI) % (2.0 * PI)
            })
            .collect();
        Array1::from_vec(result_vec)
    }

    /// Averages the outward unit normals of all cells within
    /// `footprint_radius` (m, along the surface) of `location` and normalizes
    /// the result. On a sphere the outward normal of a cell is its normalized
    /// position vector. Falls back to the nearest cell's normal when the
    /// footprint is smaller than the cell spacing.
    pub fn get_average_surface(&self, location: Location, footprint_radius: f64) -> [f64; 3] {
        // The sphere radius cancels out of the unit normals, so any positive
        // value works for footprint selection as long as it matches the
        // stored coordinates.
        let radius = self.local_radius(0);
        let distance = self.get_cell_distance(location, radius);

        let mut sum = [0.0_f64; 3];
        let mut count = 0usize;
        for i in 0..self.n_cells() {
            if distance[i] < footprint_radius {
                let r = self.local_radius(i);
                sum[0] += self.x[i] / r;
                sum[1] += self.y[i] / r;
                sum[2] += self.z[i] / r;
                count += 1;
            }
        }
        if count == 0 {
            let i = self.nearest_cell(location);
            let r = self.local_radius(i);
            return [self.x[i] / r, self.y[i] / r, self.z[i] / r];
        }

        let norm = (sum[0] * sum[0] + sum[1] * sum[1] + sum[2] * sum[2]).sqrt();
        if norm < VSMALL {
            // Antipodal cancellation; fall back to the center cell normal.
            let i = self.nearest_cell(location);
            let r = self.local_radius(i);
            return [self.x[i] / r, self.y[i] / r, self.z[i] / r];
        }
        [sum[0] / norm, sum[1] / norm, sum[2] / norm]
    }

    /// Index of the cell closest to `location` along the surface.
    pub fn nearest_cell(&self, location: Location) -> usize {
        let radius = self.local_radius(0);
        (0..self.n_cells())
            .position_min_by(|&a, &b| {
                let da =
                    haversine_distance(location.lon, location.lat, self.lon[a], self.lat[a], radius);
                let db =
                    haversine_distance(location.lon, location.lat, self.lon[b], self.lat[b], radius);
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(0)
    }

    #[inline]
    fn local_radius(&self, i: usize) -> f64 {
        (self.x[i] * self.x[i] + self.y[i] * self.y[i] + self.z[i] * self.z[i]).sqrt()
    }
}
