use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Standard Earth gravity in SI units.
pub const GRAV_EARTH: f64 = 9.80665;

/// Material properties controlling the crater scaling relationship.
///
/// The dimensionless constants `k1` and `mu` and the strength measure `ybar`
/// come from Richardson (2009), Table 1.
///
/// Richardson, J.E., 2009. Cratering saturation and equilibrium: A new model looks
/// at an old problem. Icarus 204, 697-715. https://doi.org/10.1016/j.icarus.2009.07.029
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Material {
    pub name: String,
    /// Cratering efficiency coefficient (dimensionless, > 0).
    pub k1: f64,
    /// Velocity-scaling exponent (dimensionless, in (0, 2/3)).
    pub mu: f64,
    /// Effective material strength in Pa (>= 0).
    pub ybar: f64,
    /// Bulk density in kg/m^3 (> 0).
    pub density: f64,
}

/// Partially-resolved material configuration.
///
/// Every field is optional so that layers (file, catalogue, overrides) can be
/// merged in priority order before [`build`](MaterialConfig::build) checks that
/// nothing was left unset.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MaterialConfig {
    pub name: Option<String>,
    pub k1: Option<f64>,
    pub mu: Option<f64>,
    pub ybar: Option<f64>,
    pub density: Option<f64>,
}

// (K1, mu, Ybar [Pa], density [kg/m^3]) per Richardson (2009), Table 1.
fn material_catalogue(name: &str) -> Option<(f64, f64, f64, f64)> {
    match name {
        "Water" => Some((2.30, 0.55, 0.0, 1000.0)),
        "Sand" => Some((0.24, 0.41, 0.0, 1750.0)),
        "Dry Soil" => Some((0.24, 0.41, 0.18e6, 1500.0)),
        "Wet Soil" => Some((0.20, 0.55, 1.14e6, 2000.0)),
        "Soft Rock" => Some((0.20, 0.55, 7.60e6, 2250.0)),
        "Hard Rock" => Some((0.20, 0.55, 18.0e6, 2500.0)),
        "Ice" => Some((2.30, 0.39, 0.0, 900.0)),
        _ => None,
    }
}

// (radius [m], gravity [m/s^2], default material) for solar system bodies of interest.
fn target_catalogue(name: &str) -> Option<(f64, f64, &'static str)> {
    match name {
        "Mercury" => Some((2440.0e3, 0.377 * GRAV_EARTH, "Soft Rock")),
        "Venus" => Some((6051.84e3, 0.905 * GRAV_EARTH, "Hard Rock")),
        "Earth" => Some((6371.01e3, 1.0 * GRAV_EARTH, "Wet Soil")),
        "Moon" => Some((1737.53e3, 0.1657 * GRAV_EARTH, "Soft Rock")),
        "Mars" => Some((3389.92e3, 0.379 * GRAV_EARTH, "Soft Rock")),
        "Ceres" => Some((469.7e3, 0.29 * GRAV_EARTH, "Ice")),
        "Vesta" => Some((262.7e3, 0.25 * GRAV_EARTH, "Soft Rock")),
        _ => None,
    }
}

/// Names of all built-in materials.
pub fn known_materials() -> &'static [&'static str] {
    &[
        "Water",
        "Sand",
        "Dry Soil",
        "Wet Soil",
        "Soft Rock",
        "Hard Rock",
        "Ice",
    ]
}

/// Names of all built-in target bodies.
pub fn known_targets() -> &'static [&'static str] {
    &["Mercury", "Venus", "Earth", "Moon", "Mars", "Ceres", "Vesta"]
}

/// On-disk configuration document. Sections are keyed by the lowercase
/// type name of the entity they configure.
#[derive(Debug, Default, Deserialize)]
struct ConfigDocument {
    material: Option<MaterialConfig>,
    target: Option<TargetConfig>,
}

fn read_document(path: &Path) -> Result<ConfigDocument, ConfigError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

impl MaterialConfig {
    /// Reads the `"material"` section of a JSON configuration file. A missing
    /// section yields an empty (all-`None`) configuration, not an error.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Ok(read_document(path)?.material.unwrap_or_default())
    }

    /// Looks up a named entry in the built-in material catalogue.
    pub fn from_catalogue(name: &str) -> Result<Self, ConfigError> {
        let (k1, mu, ybar, density) = material_catalogue(name)
            .ok_or_else(|| ConfigError::UnknownMaterial(name.to_string()))?;
        Ok(Self {
            name: Some(name.to_string()),
            k1: Some(k1),
            mu: Some(mu),
            ybar: Some(ybar),
            density: Some(density),
        })
    }

    /// Merges `higher` on top of `self`; set fields of `higher` win.
    pub fn merge(self, higher: Self) -> Self {
        Self {
            name: higher.name.or(self.name),
            k1: higher.k1.or(self.k1),
            mu: higher.mu.or(self.mu),
            ybar: higher.ybar.or(self.ybar),
            density: higher.density.or(self.density),
        }
    }

    /// Validates the merged configuration and produces an immutable
    /// [`Material`], or a [`ConfigError`] naming the offending field.
    pub fn build(self) -> Result<Material, ConfigError> {
        const ENTITY: &str = "material";
        let name = self.name.ok_or(ConfigError::Unset {
            entity: ENTITY,
            field: "name",
        })?;
        let k1 = require(ENTITY, "k1", self.k1)?;
        let mu = require(ENTITY, "mu", self.mu)?;
        let ybar = require(ENTITY, "ybar", self.ybar)?;
        let density = require(ENTITY, "density", self.density)?;

        check(ENTITY, "k1", k1, k1 > 0.0, "must be positive")?;
        // mu < 2/3 keeps the projectile-size -> crater-size map monotonic,
        // which the inverse scaling solver relies on.
        check(ENTITY, "mu", mu, mu > 0.0 && mu < 2.0 / 3.0, "must lie in (0, 2/3)")?;
        check(ENTITY, "ybar", ybar, ybar >= 0.0, "must be non-negative")?;
        check(ENTITY, "density", density, density > 0.0, "must be positive")?;

        Ok(Material {
            name,
            k1,
            mu,
            ybar,
            density,
        })
    }
}

impl Material {
    /// Builds a material straight from the built-in catalogue.
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        MaterialConfig::from_catalogue(name)?.build()
    }

    /// Resolves a material through the three configuration layers, in
    /// increasing priority: JSON file, catalogue entry, direct overrides.
    pub fn resolve(
        file: Option<&Path>,
        catalogue_name: Option<&str>,
        overrides: MaterialConfig,
    ) -> Result<Self, ConfigError> {
        let mut config = MaterialConfig::default();
        if let Some(path) = file {
            config = config.merge(MaterialConfig::from_file(path)?);
        }
        if let Some(name) = catalogue_name {
            config = config.merge(MaterialConfig::from_catalogue(name)?);
        }
        let material = config.merge(overrides).build()?;
        debug!(
            "resolved material {:?}: K1={}, mu={}, Ybar={} Pa, density={} kg/m^3",
            material.name, material.k1, material.mu, material.ybar, material.density
        );
        Ok(material)
    }
}

/// The target body struck by projectiles: a sphere with uniform gravity and a
/// single surface material. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Target {
    pub name: String,
    /// Body radius in meters (> 0).
    pub radius: f64,
    /// Surface gravitational acceleration in m/s^2 (> 0).
    pub gravity: f64,
    pub material: Material,
}

/// Partially-resolved target configuration, merged the same way as
/// [`MaterialConfig`]. `material_name` selects the material catalogue entry
/// used when no explicit material is supplied.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TargetConfig {
    pub name: Option<String>,
    pub radius: Option<f64>,
    pub gravity: Option<f64>,
    pub material_name: Option<String>,
}

impl TargetConfig {
    /// Reads the `"target"` section of a JSON configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Ok(read_document(path)?.target.unwrap_or_default())
    }

    /// Looks up a named entry in the built-in target catalogue.
    pub fn from_catalogue(name: &str) -> Result<Self, ConfigError> {
        let (radius, gravity, material_name) =
            target_catalogue(name).ok_or_else(|| ConfigError::UnknownTarget(name.to_string()))?;
        Ok(Self {
            name: Some(name.to_string()),
            radius: Some(radius),
            gravity: Some(gravity),
            material_name: Some(material_name.to_string()),
        })
    }

    /// Merges `higher` on top of `self`; set fields of `higher` win.
    pub fn merge(self, higher: Self) -> Self {
        Self {
            name: higher.name.or(self.name),
            radius: higher.radius.or(self.radius),
            gravity: higher.gravity.or(self.gravity),
            material_name: higher.material_name.or(self.material_name),
        }
    }

    /// Validates the merged configuration and attaches the material,
    /// producing an immutable [`Target`].
    pub fn build(self, material: Option<Material>) -> Result<Target, ConfigError> {
        const ENTITY: &str = "target";
        let name = self.name.ok_or(ConfigError::Unset {
            entity: ENTITY,
            field: "name",
        })?;
        let radius = require(ENTITY, "radius", self.radius)?;
        let gravity = require(ENTITY, "gravity", self.gravity)?;

        check(ENTITY, "radius", radius, radius > 0.0, "must be positive")?;
        check(ENTITY, "gravity", gravity, gravity > 0.0, "must be positive")?;

        let material = match material {
            Some(material) => material,
            None => {
                let material_name = self.material_name.ok_or(ConfigError::Unset {
                    entity: ENTITY,
                    field: "material_name",
                })?;
                Material::from_name(&material_name)?
            }
        };

        Ok(Target {
            name,
            radius,
            gravity,
            material,
        })
    }
}

impl Target {
    /// Builds a target straight from the built-in catalogue, with its default
    /// material.
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        TargetConfig::from_catalogue(name)?.build(None)
    }

    /// Resolves a target through the three configuration layers, in
    /// increasing priority: JSON file, catalogue entry, direct overrides.
    /// An explicit `material` takes precedence over any `material_name`.
    pub fn resolve(
        file: Option<&Path>,
        catalogue_name: Option<&str>,
        overrides: TargetConfig,
        material: Option<Material>,
    ) -> Result<Self, ConfigError> {
        let mut config = TargetConfig::default();
        if let Some(path) = file {
            config = config.merge(TargetConfig::from_file(path)?);
        }
        if let Some(name) = catalogue_name {
            config = config.merge(TargetConfig::from_catalogue(name)?);
        }
        let target = config.merge(overrides).build(material)?;
        debug!(
            "resolved target {:?}: radius={} m, gravity={} m/s^2, material={:?}",
            target.name, target.radius, target.gravity, target.material.name
        );
        Ok(target)
    }
}

fn require(
    entity: &'static str,
    field: &'static str,
    value: Option<f64>,
) -> Result<f64, ConfigError> {
    let value = value.ok_or(ConfigError::Unset { entity, field })?;
    check(entity, field, value, value.is_finite(), "must be finite")?;
    Ok(value)
}

fn check(
    entity: &'static str,
    field: &'static str,
    value: f64,
    ok: bool,
    reason: &'static str,
) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            entity,
            field,
            value,
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ConfigError;
    use std::io::Write;

    #[test]
    fn every_catalogue_material_resolves() {
        for name in known_materials() {
            let material = Material::from_name(name).unwrap();
            assert_eq!(&material.name, name);
            assert!(material.density > 0.0);
        }
    }

    #[test]
    fn every_catalogue_target_resolves() {
        for name in known_targets() {
            let target = Target::from_name(name).unwrap();
            assert_eq!(&target.name, name);
            assert!(target.radius > 0.0 && target.gravity > 0.0);
        }
    }

    #[test]
    fn moon_catalogue_values() {
        let moon = Target::from_name("Moon").unwrap();
        assert_eq!(moon.radius, 1737.53e3);
        assert!((moon.gravity - 0.1657 * GRAV_EARTH).abs() < 1e-12);
        assert_eq!(moon.material.name, "Soft Rock");
        assert_eq!(moon.material.ybar, 7.60e6);
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!(matches!(
            Material::from_name("Plutonium"),
            Err(ConfigError::UnknownMaterial(_))
        ));
        assert!(matches!(
            Target::from_name("Krypton"),
            Err(ConfigError::UnknownTarget(_))
        ));
    }

    #[test]
    fn unset_field_is_named_in_the_error() {
        let config = MaterialConfig {
            name: Some("Custom".to_string()),
            k1: Some(0.2),
            mu: Some(0.55),
            ybar: Some(1.0e6),
            density: None,
        };
        match config.build() {
            Err(ConfigError::Unset { entity, field }) => {
                assert_eq!(entity, "material");
                assert_eq!(field, "density");
            }
            other => panic!("expected Unset error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_mu_is_rejected_at_build_time() {
        let config = MaterialConfig {
            mu: Some(0.9),
            ..MaterialConfig::from_catalogue("Soft Rock").unwrap()
        };
        assert!(matches!(
            config.build(),
            Err(ConfigError::Invalid { field: "mu", .. })
        ));
    }

    #[test]
    fn overrides_beat_catalogue_beats_file() {
        let dir = std::env::temp_dir().join("cratersim-config-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("layering.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"material": {{"k1": 9.0, "density": 123.0}}, "target": {{"radius": 1.0}}}}"#
        )
        .unwrap();

        // Catalogue overrides the file value of k1 and density, the explicit
        // override then wins on density alone.
        let material = Material::resolve(
            Some(&path),
            Some("Soft Rock"),
            MaterialConfig {
                density: Some(3000.0),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(material.k1, 0.20);
        assert_eq!(material.density, 3000.0);

        // File alone is not enough to build a full material.
        let err = Material::resolve(Some(&path), None, MaterialConfig::default());
        assert!(matches!(err, Err(ConfigError::Unset { .. })));

        // The file's target section participates in target layering.
        let target = Target::resolve(
            Some(&path),
            None,
            TargetConfig {
                name: Some("Flatland".to_string()),
                gravity: Some(1.0),
                material_name: Some("Sand".to_string()),
                ..Default::default()
            },
            None,
        )
        .unwrap();
        assert_eq!(target.radius, 1.0);
        assert_eq!(target.material.name, "Sand");
    }

    #[test]
    fn explicit_material_takes_precedence() {
        let ice = Material::from_name("Ice").unwrap();
        let target = Target::resolve(None, Some("Moon"), TargetConfig::default(), Some(ice))
            .unwrap();
        assert_eq!(target.material.name, "Ice");
    }
}
