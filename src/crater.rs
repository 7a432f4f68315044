use serde::Serialize;

use crate::errors::ScalingError;

/// Categorical crater shape classification, determined by the final diameter
/// relative to the body-specific simple-to-complex transition diameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Morphotype {
    /// Bowl-shaped crater below the transition diameter.
    Simple,
    /// Terraced, central-peak crater at or above the transition diameter.
    Complex,
}

/// A point on the target sphere, longitude and latitude in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Location {
    pub lon: f64,
    pub lat: f64,
}

impl Location {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// An impactor, described by its size and impact kinematics.
///
/// `diameter`/`radius` and `vertical_velocity` are derived fields kept
/// consistent by construction; the struct has no public constructor bypass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projectile {
    radius: f64,
    diameter: f64,
    velocity: f64,
    sin_impact_angle: f64,
    vertical_velocity: f64,
}

impl Projectile {
    /// Builds a projectile from its radius, impact speed (m/s), and the sine
    /// of the impact angle (1.0 for a vertical impact).
    pub fn new(radius: f64, velocity: f64, sin_impact_angle: f64) -> Result<Self, ScalingError> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(ScalingError::OutOfDomain {
                quantity: "projectile radius",
                value: radius,
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
        Ok(Self {
            radius,
            diameter: 2.0 * radius,
            velocity,
            sin_impact_angle,
            vertical_velocity: velocity * sin_impact_angle,
        })
    }

    /// Builds a projectile from its diameter instead of its radius.
    pub fn from_diameter(
        diameter: f64,
        velocity: f64,
        sin_impact_angle: f64,
    ) -> Result<Self, ScalingError> {
        if !(diameter.is_finite() && diameter > 0.0) {
            return Err(ScalingError::OutOfDomain {
                quantity: "projectile diameter",
                value: diameter,
            });
        }
        Self::new(diameter / 2.0, velocity, sin_impact_angle)
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn diameter(&self) -> f64 {
        self.diameter
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn sin_impact_angle(&self) -> f64 {
        self.sin_impact_angle
    }

    /// Velocity component normal to the surface, `velocity * sin_impact_angle`.
    pub fn vertical_velocity(&self) -> f64 {
        self.vertical_velocity
    }
}

/// A crater produced (or consumed) by the scaling law.
///
/// `average_surface_normal` is populated exclusively by the emplacement
/// engine and stays `None` until a crater has been placed on a grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Crater {
    pub diameter: f64,
    pub radius: f64,
    pub morphotype: Morphotype,
    pub location: Location,
    pub average_surface_normal: Option<[f64; 3]>,
}

impl Crater {
    /// Builds a crater record. The morphotype is supplied by the scaling
    /// module, which knows the body-specific transition diameter.
    pub fn new(
        diameter: f64,
        morphotype: Morphotype,
        location: Location,
    ) -> Result<Self, ScalingError> {
        if !(diameter.is_finite() && diameter > 0.0) {
            return Err(ScalingError::OutOfDomain {
                quantity: "crater diameter",
                value: diameter,
            });
        }
        Ok(Self {
            diameter,
            radius: diameter / 2.0,
            morphotype,
            location,
            average_surface_normal: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projectile_derived_fields_are_consistent() {
        let p = Projectile::new(500.0, 15.0e3, 0.5).unwrap();
        assert_eq!(p.diameter(), 1000.0);
        assert_eq!(p.vertical_velocity(), 7.5e3);

        let q = Projectile::from_diameter(1000.0, 15.0e3, 0.5).unwrap();
        assert_eq!(q, p);
    }

    #[test]
    fn invalid_kinematics_are_rejected() {
        assert!(Projectile::new(-1.0, 15.0e3, 0.5).is_err());
        assert!(Projectile::new(500.0, 0.0, 0.5).is_err());
        assert!(Projectile::new(500.0, 15.0e3, 0.0).is_err());
        assert!(Projectile::new(500.0, 15.0e3, 1.1).is_err());
        assert!(Projectile::new(f64::NAN, 15.0e3, 0.5).is_err());
    }

    #[test]
    fn crater_rejects_nonpositive_diameter() {
        let loc = Location::new(0.0, 0.0);
        assert!(Crater::new(-100.0, Morphotype::Simple, loc).is_err());
        assert!(Crater::new(f64::INFINITY, Morphotype::Simple, loc).is_err());
        let c = Crater::new(2000.0, Morphotype::Simple, loc).unwrap();
        assert_eq!(c.radius, 1000.0);
        assert!(c.average_surface_normal.is_none());
    }
}
