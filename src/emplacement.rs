//! Crater emplacement: spatial placement fields and the footprint-averaged
//! surface normal.

use std::f64::consts::PI;

use log::debug;

use crate::crater::Crater;
use crate::errors::GeometryError;
use crate::surface::SurfaceGrid;
use crate::target::Target;

/// Places `crater` on `grid`, writing `crater_distance` and `crater_bearing`
/// for every cell and recording the footprint-averaged outward normal on the
/// crater itself.
///
/// A pure function of its inputs: re-invoking with the same crater and
/// location reproduces identical field values. All outputs are computed
/// before any of them is assigned, so an error leaves both the grid and the
/// crater untouched.
///
/// # Errors
///
/// * [`GeometryError::FootprintTooLarge`] when the crater radius exceeds half
///   the great-circle circumference of the body.
/// * [`GeometryError::DegenerateLocation`] for non-finite coordinates or a
///   latitude outside [-pi/2, pi/2].
pub fn emplace(
    crater: &mut Crater,
    grid: &mut SurfaceGrid,
    target: &Target,
) -> Result<(), GeometryError> {
    let limit = PI * target.radius;
    if !(crater.radius.is_finite() && crater.radius <= limit) {
        return Err(GeometryError::FootprintTooLarge {
            radius: crater.radius,
            limit,
        });
    }
    let location = crater.location;
    if !location.lon.is_finite() || !location.lat.is_finite() || location.lat.abs() > PI / 2.0 {
        return Err(GeometryError::DegenerateLocation {
            lon: location.lon,
            lat: location.lat,
        });
    }

    let distance = grid.get_cell_distance(location, target.radius);
    let bearing = grid.get_cell_initial_bearing(location);
    let normal = grid.get_average_surface(location, crater.radius);

    debug!(
        "emplaced crater d={} m at (lon {}, lat {}) on {:?}",
        crater.diameter, location.lon, location.lat, target.name
    );

    grid.crater_distance = distance;
    grid.crater_bearing = bearing;
    crater.average_surface_normal = Some(normal);
    Ok(())
}
