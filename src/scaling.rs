//! Bidirectional crater/projectile scaling laws.
//!
//! Uses the pi-group crater scaling of Holsapple & Housen as formulated by
//! Richardson (2009), with the material constants `K1`, `mu`, and `Ybar`
//! carried by [`Material`](crate::target::Material). The strength and gravity
//! regimes are blended smoothly by the `pi2 + pi3^((2+mu)/2)` term, so the
//! forward and inverse directions share a single continuous formula with no
//! regime-boundary discontinuity.

use std::f64::consts::PI;

use log::debug;

use crate::crater::{Crater, Location, Morphotype, Projectile};
use crate::errors::ScalingError;
use crate::target::{Target, GRAV_EARTH};

/// Rim enlargement from the transient cavity to the final crater.
const FINAL_OVER_TRANSIENT: f64 = 1.25;

/// Simple-to-complex transition diameter on the Moon, in meters.
const MOON_SC_TRANSITION: f64 = 18.7e3;

const MOON_GRAVITY: f64 = 0.1657 * GRAV_EARTH;

/// Relative tolerance of the inverse (crater -> projectile) solver.
const INVERSE_RTOL: f64 = 1.0e-12;

/// Crater diameter separating the strength and gravity regimes for this
/// body, `Ybar / (density * gravity)`. Depends only on the target, so regime
/// selection is identical whether approached from the crater or the
/// projectile side.
pub fn strength_transition_diameter(target: &Target) -> f64 {
    target.material.ybar / (target.material.density * target.gravity)
}

/// Simple-to-complex morphology transition diameter, anchored on the lunar
/// value and scaling inversely with surface gravity.
pub fn simple_complex_transition_diameter(target: &Target) -> f64 {
    MOON_SC_TRANSITION * MOON_GRAVITY / target.gravity
}

/// Classifies a final crater diameter as simple or complex on this body.
pub fn morphotype_from_diameter(diameter: f64, target: &Target) -> Morphotype {
    if diameter < simple_complex_transition_diameter(target) {
        Morphotype::Simple
    } else {
        Morphotype::Complex
    }
}

/// True when a crater of this final diameter sits in the gravity regime on
/// this body.
pub fn is_gravity_regime(diameter: f64, target: &Target) -> bool {
    diameter >= strength_transition_diameter(target)
}

/// Transient crater diameter produced by a projectile of radius `radius`
/// striking with vertical velocity `vertical_velocity`.
///
/// pi2 = g r / v^2 and pi3 = Ybar / (rho v^2); the cratering efficiency is
/// piV = K1 (pi2 + pi3^((2+mu)/2))^(-3 mu / (2+mu)), the excavated volume is
/// piV m/rho, and the transient diameter follows from a hemispherical cavity.
/// The projectile is assigned the target material density, so the density
/// ratio group pi4 drops out.
fn transient_diameter(radius: f64, vertical_velocity: f64, target: &Target) -> f64 {
    let mu = target.material.mu;
    let exp_strength = (2.0 + mu) / 2.0;
    let exp_coupling = -3.0 * mu / (2.0 + mu);

    let v2 = vertical_velocity * vertical_velocity;
    let pi2 = target.gravity * radius / v2;
    let pi3 = target.material.ybar / (target.material.density * v2);

    let pi_v = target.material.k1 * (pi2 + pi3.powf(exp_strength)).powf(exp_coupling);
    // m / rho for a projectile of target-material density.
    let volume_equivalent = 4.0 / 3.0 * PI * radius.powi(3);
    let cavity_volume = pi_v * volume_equivalent;

    2.0 * (3.0 * cavity_volume / (2.0 * PI)).cbrt()
}

/// Converts a projectile into the crater it produces on `target`, placed at
/// `location`.
pub fn projectile_to_crater(
    projectile: &Projectile,
    target: &Target,
    location: Location,
) -> Result<Crater, ScalingError> {
    let transient = transient_diameter(
        projectile.radius(),
        projectile.vertical_velocity(),
        target,
    );
    let diameter = FINAL_OVER_TRANSIENT * transient;
    if !(diameter.is_finite() && diameter > 0.0) {
        return Err(ScalingError::OutOfDomain {
            quantity: "scaled crater diameter",
            value: diameter,
        });
    }
    debug!(
        "projectile d={} m at v_perp={} m/s -> crater d={} m on {:?}",
        projectile.diameter(),
        projectile.vertical_velocity(),
        diameter,
        target.name
    );
    Crater::new(diameter, morphotype_from_diameter(diameter, target), location)
}

/// Converts a crater back into the projectile that produced it, given the
/// impact speed and angle. Exact inverse of [`projectile_to_crater`] within
/// floating tolerance.
///
/// The projectile-radius -> crater-diameter map is strictly monotonic for
/// mu < 2/3 (guaranteed at material resolution), so the inverse is found by
/// bracketed bisection.
pub fn crater_to_projectile(
    crater: &Crater,
    target: &Target,
    velocity: f64,
    sin_impact_angle: f64,
) -> Result<Projectile, ScalingError> {
    if !(crater.diameter.is_finite() && crater.diameter > 0.0) {
        return Err(ScalingError::OutOfDomain {
            quantity: "crater diameter",
            value: crater.diameter,
        });
    }
    if !(velocity.is_finite() && velocity > 0.0) {
        return Err(ScalingError::OutOfDomain {
            quantity: "impact velocity",
            value: velocity,
        });
    }
    if !(sin_impact_angle.is_finite() && sin_impact_angle > 0.0 && sin_impact_angle <= 1.0) {
        return Err(ScalingError::ImpactAngle(sin_impact_angle));
    }

    let vertical_velocity = velocity * sin_impact_angle;
    let transient_target = crater.diameter / FINAL_OVER_TRANSIENT;
    let f = |radius: f64| transient_diameter(radius, vertical_velocity, target);

    // Expand a bracket around the root. The crater is always larger than the
    // projectile so the transient diameter itself is a safe upper seed.
    let mut lo = transient_target * 1.0e-9;
    let mut hi = transient_target;
    for _ in 0..200 {
        if f(hi) >= transient_target {
            break;
        }
        hi *= 2.0;
    }
    for _ in 0..200 {
        if f(lo) <= transient_target {
            break;
        }
        lo *= 0.5;
    }
    if !(f(lo) <= transient_target && f(hi) >= transient_target) {
        return Err(ScalingError::OutOfDomain {
            quantity: "crater diameter (inverse scaling bracket)",
            value: crater.diameter,
        });
    }

    let mut radius = 0.5 * (lo + hi);
    for _ in 0..200 {
        if (hi - lo) <= INVERSE_RTOL * hi {
            break;
        }
        radius = 0.5 * (lo + hi);
        if f(radius) < transient_target {
            lo = radius;
        } else {
            hi = radius;
        }
    }

    Projectile::new(radius, velocity, sin_impact_angle)
}
