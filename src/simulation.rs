//! The `Simulation` orchestrator: owns the target, surface grid, and RNG, and
//! drives scaling, emplacement, and noise passes through one seeded state.

use std::f64::consts::PI;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::{debug, info};
use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use serde::{Deserialize, Serialize};

use crate::crater::{Crater, Location, Projectile};
use crate::emplacement::emplace;
use crate::errors::{ConfigError, SimulationError};
use crate::noise_functions::{apply_noise, NoiseModel};
use crate::scaling::{crater_to_projectile, morphotype_from_diameter, projectile_to_crater};
use crate::surface::SurfaceGrid;
use crate::target::{Target, TargetConfig};

/// Default RNG seed when none is configured.
pub const DEFAULT_SEED: u64 = 235029385;

/// Default end of the simulated interval, in years (roughly the age of the
/// oldest cratered surfaces).
pub const DEFAULT_TSTOP: f64 = 4.31e9;

/// Default impact speed in m/s (mean asteroidal impact velocity on the Moon).
pub const DEFAULT_IMPACTOR_VELOCITY: f64 = 18.3e3;

/// Partially-resolved simulation configuration, merged the same way as
/// [`TargetConfig`]: file section, then overrides, with set fields winning.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SimulationConfig {
    pub seed: Option<u64>,
    /// Cell pitch of the surface grid in meters. Defaults to one thousandth
    /// of the square root of the body surface area.
    pub pix: Option<f64>,
    pub tstart: Option<f64>,
    pub tstop: Option<f64>,
    pub impactor_velocity: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigDocument {
    simulation: Option<SimulationConfig>,
}

impl SimulationConfig {
    /// Reads the `"simulation"` section of a JSON configuration file. A
    /// missing section yields an empty configuration, not an error.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let document: ConfigDocument = serde_json::from_reader(BufReader::new(file))?;
        Ok(document.simulation.unwrap_or_default())
    }

    /// Merges `higher` on top of `self`; set fields of `higher` win.
    pub fn merge(self, higher: Self) -> Self {
        Self {
            seed: higher.seed.or(self.seed),
            pix: higher.pix.or(self.pix),
            tstart: higher.tstart.or(self.tstart),
            tstop: higher.tstop.or(self.tstop),
            impactor_velocity: higher.impactor_velocity.or(self.impactor_velocity),
        }
    }
}

/// Arguments describing one impact event. `diameter` is interpreted by the
/// operation it is passed to (crater diameter or projectile diameter);
/// unset fields are sampled from the simulation RNG or defaulted.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImpactArgs {
    pub diameter: f64,
    pub location: Option<Location>,
    pub velocity: Option<f64>,
    pub sin_impact_angle: Option<f64>,
}

impl ImpactArgs {
    pub fn new(diameter: f64) -> Self {
        Self {
            diameter,
            ..Default::default()
        }
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_velocity(mut self, velocity: f64) -> Self {
        self.velocity = Some(velocity);
        self
    }

    pub fn with_sin_impact_angle(mut self, sin_impact_angle: f64) -> Self {
        self.sin_impact_angle = Some(sin_impact_angle);
        self
    }
}

/// Top-level simulation state.
///
/// All stochastic choices (impact locations, impact angles, noise anchors)
/// are drawn from the one seeded RNG, so a given seed reproduces the same
/// event sequence exactly.
#[derive(Debug, Serialize)]
pub struct Simulation {
    pub target: Target,
    pub seed: u64,
    /// Surface grid cell pitch, meters.
    pub pix: f64,
    /// Start of the simulated interval, years.
    pub tstart: f64,
    /// End of the simulated interval, years.
    pub tstop: f64,
    /// Default impact speed, m/s.
    pub impactor_velocity: f64,
    /// Most recently generated or emplaced crater.
    pub crater: Option<Crater>,
    /// Most recently generated or emplaced projectile.
    pub projectile: Option<Projectile>,
    #[serde(skip)]
    pub surface: SurfaceGrid,
    #[serde(skip)]
    rng: ChaCha12Rng,
}

impl Simulation {
    /// Builds a simulation on `target`, applying defaults for unset
    /// configuration fields and validating the rest.
    pub fn new(target: Target, config: SimulationConfig) -> Result<Self, SimulationError> {
        const ENTITY: &str = "simulation";

        let area = 4.0 * PI * target.radius * target.radius;
        let seed = config.seed.unwrap_or(DEFAULT_SEED);
        let pix = config.pix.unwrap_or(1.0e-3 * area.sqrt());
        let tstart = config.tstart.unwrap_or(0.0);
        let tstop = config.tstop.unwrap_or(DEFAULT_TSTOP);
        let impactor_velocity = config.impactor_velocity.unwrap_or(DEFAULT_IMPACTOR_VELOCITY);

        check(ENTITY, "pix", pix, pix.is_finite() && pix > 0.0, "must be positive")?;
        check(ENTITY, "tstart", tstart, tstart.is_finite(), "must be finite")?;
        check(
            ENTITY,
            "tstop",
            tstop,
            tstop.is_finite() && tstop >= tstart,
            "must be finite and at or after tstart",
        )?;
        check(
            ENTITY,
            "impactor_velocity",
            impactor_velocity,
            impactor_velocity.is_finite() && impactor_velocity > 0.0,
            "must be positive",
        )?;

        let n_cells = (area / (pix * pix)).ceil().max(4.0) as usize;
        let surface = SurfaceGrid::fibonacci(n_cells, target.radius);
        info!(
            "simulation on {:?}: seed={}, pix={} m, {} cells, t=[{}, {}] y",
            target.name, seed, pix, n_cells, tstart, tstop
        );

        Ok(Self {
            target,
            seed,
            pix,
            tstart,
            tstop,
            impactor_velocity,
            crater: None,
            projectile: None,
            surface,
            rng: ChaCha12Rng::seed_from_u64(seed),
        })
    }

    /// Builds a simulation for a catalogue body with default configuration.
    pub fn from_target_name(name: &str) -> Result<Self, SimulationError> {
        Self::new(Target::from_name(name)?, SimulationConfig::default())
    }

    /// Resolves target and simulation configuration through the layered
    /// scheme (file section, catalogue, overrides) and builds the simulation.
    pub fn resolve(
        file: Option<&Path>,
        target_name: Option<&str>,
        target_overrides: TargetConfig,
        overrides: SimulationConfig,
    ) -> Result<Self, SimulationError> {
        let target = Target::resolve(file, target_name, target_overrides, None)?;
        let mut config = SimulationConfig::default();
        if let Some(path) = file {
            config = config.merge(SimulationConfig::from_file(path)?);
        }
        Self::new(target, config.merge(overrides))
    }

    pub fn n_cells(&self) -> usize {
        self.surface.n_cells()
    }

    /// Generates a crater of the given final diameter along with the
    /// projectile that would have produced it, without emplacing either.
    /// Unset impact parameters are sampled from the simulation RNG.
    pub fn generate_crater(&mut self, args: ImpactArgs) -> Result<(), SimulationError> {
        let (crater, projectile) = self.pair_from_crater(args)?;
        self.crater = Some(crater);
        self.projectile = Some(projectile);
        Ok(())
    }

    /// Generates a projectile of the given diameter along with the crater it
    /// produces, without emplacing either.
    pub fn generate_projectile(&mut self, args: ImpactArgs) -> Result<(), SimulationError> {
        let (crater, projectile) = self.pair_from_projectile(args)?;
        self.crater = Some(crater);
        self.projectile = Some(projectile);
        Ok(())
    }

    /// Generates a crater of the given final diameter and places it on the
    /// surface grid. On error nothing is modified: the crater/projectile pair
    /// is built and emplaced before either is stored.
    pub fn emplace_crater(&mut self, args: ImpactArgs) -> Result<(), SimulationError> {
        let (mut crater, projectile) = self.pair_from_crater(args)?;
        emplace(&mut crater, &mut self.surface, &self.target)?;
        self.crater = Some(crater);
        self.projectile = Some(projectile);
        Ok(())
    }

    /// Generates the crater produced by a projectile of the given diameter
    /// and places it on the surface grid.
    pub fn emplace_projectile(&mut self, args: ImpactArgs) -> Result<(), SimulationError> {
        let (mut crater, projectile) = self.pair_from_projectile(args)?;
        emplace(&mut crater, &mut self.surface, &self.target)?;
        self.crater = Some(crater);
        self.projectile = Some(projectile);
        Ok(())
    }

    /// Runs one noise pass over the surface grid and returns the per-octave
    /// anchor that was used, so the same field can be regenerated later.
    ///
    /// When `anchor` is `None`, a fresh anchor of shape `num_octaves x 3` is
    /// drawn from the simulation RNG; otherwise the supplied anchor is used
    /// and `num_octaves` must match its row count.
    pub fn apply_noise(
        &mut self,
        model: &NoiseModel,
        noise_width: f64,
        num_octaves: usize,
        anchor: Option<Array2<f64>>,
    ) -> Result<Array2<f64>, SimulationError> {
        const ENTITY: &str = "noise";
        check(
            ENTITY,
            "noise_width",
            noise_width,
            noise_width.is_finite() && noise_width > 0.0,
            "must be positive",
        )?;
        check(
            ENTITY,
            "num_octaves",
            num_octaves as f64,
            num_octaves >= 1,
            "must be at least 1",
        )?;

        let scale = self.target.radius / noise_width;
        let anchor = match anchor {
            Some(anchor) => {
                check(
                    ENTITY,
                    "anchor",
                    anchor.nrows() as f64,
                    anchor.nrows() == num_octaves && anchor.ncols() == 3,
                    "must have shape num_octaves x 3",
                )?;
                anchor
            }
            None => Array2::from_shape_fn((num_octaves, 3), |_| {
                self.rng.random_range(0.0..scale)
            }),
        };

        apply_noise(
            &mut self.surface,
            &self.target,
            model,
            noise_width,
            &anchor,
            self.seed as u32,
        );
        Ok(anchor)
    }

    /// Serializes the simulation state (minus the surface arrays and RNG) as
    /// pretty-printed JSON.
    pub fn to_json(&self, path: &Path) -> Result<(), SimulationError> {
        let file = File::create(path).map_err(ConfigError::from)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self).map_err(ConfigError::from)?;
        debug!("wrote simulation state to {}", path.display());
        Ok(())
    }

    fn pair_from_crater(
        &mut self,
        args: ImpactArgs,
    ) -> Result<(Crater, Projectile), SimulationError> {
        let location = match args.location {
            Some(location) => location,
            None => self.sample_location(),
        };
        let velocity = args.velocity.unwrap_or(self.impactor_velocity);
        let sin_impact_angle = match args.sin_impact_angle {
            Some(sin_impact_angle) => sin_impact_angle,
            None => self.sample_sin_impact_angle(),
        };
        let crater = Crater::new(
            args.diameter,
            morphotype_from_diameter(args.diameter, &self.target),
            location,
        )?;
        let projectile = crater_to_projectile(&crater, &self.target, velocity, sin_impact_angle)?;
        Ok((crater, projectile))
    }

    fn pair_from_projectile(
        &mut self,
        args: ImpactArgs,
    ) -> Result<(Crater, Projectile), SimulationError> {
        let location = match args.location {
            Some(location) => location,
            None => self.sample_location(),
        };
        let velocity = args.velocity.unwrap_or(self.impactor_velocity);
        let sin_impact_angle = match args.sin_impact_angle {
            Some(sin_impact_angle) => sin_impact_angle,
            None => self.sample_sin_impact_angle(),
        };
        let projectile = Projectile::from_diameter(args.diameter, velocity, sin_impact_angle)?;
        let crater = projectile_to_crater(&projectile, &self.target, location)?;
        Ok((crater, projectile))
    }

    /// Samples a location uniformly over the sphere surface.
    fn sample_location(&mut self) -> Location {
        let lon = self.rng.random_range(-PI..PI);
        let z: f64 = self.rng.random_range(-1.0..1.0);
        Location::new(lon, z.asin())
    }

    /// Samples sin(theta) from the sin(2 theta) impact-angle distribution,
    /// whose most probable angle is 45 degrees. Guarded away from zero, which
    /// would describe a grazing non-impact.
    fn sample_sin_impact_angle(&mut self) -> f64 {
        let u: f64 = self.rng.random();
        u.sqrt().clamp(1.0e-8, 1.0)
    }
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
    use crate::crater::Morphotype;
    use crate::errors::{GeometryError, SimulationError};
    use std::io::Write;

    // A coarse pitch keeps test grids at a few thousand cells.
    fn coarse(seed: u64) -> SimulationConfig {
        SimulationConfig {
            seed: Some(seed),
            pix: Some(100.0e3),
            ..Default::default()
        }
    }

    fn moon_sim(seed: u64) -> Simulation {
        Simulation::new(Target::from_name("Moon").unwrap(), coarse(seed)).unwrap()
    }

    #[test]
    fn defaults_are_applied() {
        let sim = moon_sim(1);
        assert_eq!(sim.seed, 1);
        assert_eq!(sim.tstart, 0.0);
        assert_eq!(sim.tstop, DEFAULT_TSTOP);
        assert_eq!(sim.impactor_velocity, DEFAULT_IMPACTOR_VELOCITY);
        let area = 4.0 * PI * sim.target.radius * sim.target.radius;
        let expected = (area / (sim.pix * sim.pix)).ceil() as usize;
        assert_eq!(sim.n_cells(), expected);
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let target = Target::from_name("Moon").unwrap();
        let bad_pix = SimulationConfig {
            pix: Some(-5.0),
            ..Default::default()
        };
        assert!(matches!(
            Simulation::new(target.clone(), bad_pix),
            Err(SimulationError::Config(ConfigError::Invalid { field: "pix", .. }))
        ));

        let bad_interval = SimulationConfig {
            pix: Some(100.0e3),
            tstart: Some(10.0),
            tstop: Some(5.0),
            ..Default::default()
        };
        assert!(matches!(
            Simulation::new(target, bad_interval),
            Err(SimulationError::Config(ConfigError::Invalid { field: "tstop", .. }))
        ));
    }

    #[test]
    fn same_seed_reproduces_the_event_sequence() {
        let mut a = moon_sim(42);
        let mut b = moon_sim(42);
        for _ in 0..5 {
            a.generate_crater(ImpactArgs::new(20.0e3)).unwrap();
            b.generate_crater(ImpactArgs::new(20.0e3)).unwrap();
            assert_eq!(a.crater, b.crater);
            assert_eq!(a.projectile, b.projectile);
        }

        let mut c = moon_sim(43);
        c.generate_crater(ImpactArgs::new(20.0e3)).unwrap();
        assert_ne!(a.crater.as_ref().unwrap().location, c.crater.unwrap().location);
    }

    #[test]
    fn generated_pair_is_self_consistent() {
        let mut sim = moon_sim(7);
        sim.generate_crater(
            ImpactArgs::new(20.0e3)
                .with_velocity(15.0e3)
                .with_sin_impact_angle(0.7),
        )
        .unwrap();
        let crater = sim.crater.clone().unwrap();
        let projectile = sim.projectile.clone().unwrap();
        assert_eq!(crater.diameter, 20.0e3);
        assert_eq!(crater.morphotype, Morphotype::Complex);
        assert_eq!(projectile.velocity(), 15.0e3);

        // The stored projectile regenerates the stored crater.
        let rebuilt =
            projectile_to_crater(&projectile, &sim.target, crater.location).unwrap();
        let rel = (rebuilt.diameter - crater.diameter).abs() / crater.diameter;
        assert!(rel < 1.0e-9, "relative error {rel}");
    }

    #[test]
    fn generate_projectile_scales_forward() {
        let mut sim = moon_sim(7);
        sim.generate_projectile(
            ImpactArgs::new(1000.0)
                .with_velocity(15.0e3)
                .with_sin_impact_angle((45.0_f64).to_radians().sin()),
        )
        .unwrap();
        let crater = sim.crater.clone().unwrap();
        let projectile = sim.projectile.clone().unwrap();
        assert_eq!(projectile.diameter(), 1000.0);
        assert!(crater.diameter > 5.0e3 && crater.diameter < 50.0e3);
    }

    #[test]
    fn emplace_crater_populates_grid_and_normal() {
        let mut sim = moon_sim(7);
        let location = Location::new(0.0, 0.0);
        sim.emplace_crater(ImpactArgs::new(30.0e3).at(location)).unwrap();

        let crater = sim.crater.as_ref().unwrap();
        assert!(crater.average_surface_normal.is_some());
        let nearest = sim.surface.nearest_cell(location);
        assert!(sim.surface.crater_distance[nearest] < sim.pix);
    }

    #[test]
    fn failed_emplacement_leaves_state_untouched() {
        let mut sim = moon_sim(7);
        // A crater larger than the body.
        let oversized = 4.0 * PI * sim.target.radius;
        let err = sim
            .emplace_crater(ImpactArgs::new(oversized).at(Location::new(0.0, 0.0)))
            .unwrap_err();
        assert!(matches!(
            err,
            SimulationError::Geometry(GeometryError::FootprintTooLarge { .. })
        ));
        assert!(sim.crater.is_none());
        assert!(sim.projectile.is_none());
        assert!(sim.surface.crater_distance.iter().all(|&d| d == 0.0));
    }

    #[test]
    fn noise_anchor_round_trips() {
        let mut sim = moon_sim(11);
        let model = NoiseModel::turbulence();
        let anchor = sim.apply_noise(&model, 500.0e3, 4, None).unwrap();
        assert_eq!(anchor.dim(), (4, 3));
        let elevation = sim.surface.elevation.clone();

        // Replaying the returned anchor on a fresh simulation reproduces the
        // field bit-for-bit.
        let mut replay = moon_sim(11);
        let replayed = replay
            .apply_noise(&model, 500.0e3, 4, Some(anchor.clone()))
            .unwrap();
        assert_eq!(replayed, anchor);
        assert_eq!(replay.surface.elevation, elevation);
    }

    #[test]
    fn noise_argument_validation() {
        let mut sim = moon_sim(11);
        let model = NoiseModel::turbulence();
        assert!(sim.apply_noise(&model, -1.0, 4, None).is_err());
        assert!(sim.apply_noise(&model, 500.0e3, 0, None).is_err());
        let wrong_shape = Array2::zeros((3, 3));
        assert!(sim.apply_noise(&model, 500.0e3, 4, Some(wrong_shape)).is_err());
    }

    #[test]
    fn configuration_file_layering() {
        let dir = std::env::temp_dir().join("cratersim-simulation-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("sim.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"simulation": {{"seed": 99, "pix": 200000.0}}, "target": {{"gravity": 2.5}}}}"#
        )
        .unwrap();

        let sim = Simulation::resolve(
            Some(&path),
            Some("Moon"),
            TargetConfig::default(),
            SimulationConfig {
                pix: Some(150.0e3),
                ..Default::default()
            },
        )
        .unwrap();
        // File sets the seed, the explicit override wins on pix, and the
        // catalogue overrides the file's target gravity.
        assert_eq!(sim.seed, 99);
        assert_eq!(sim.pix, 150.0e3);
        assert!((sim.target.gravity - 0.1657 * crate::target::GRAV_EARTH).abs() < 1e-12);
    }

    #[test]
    fn to_json_writes_a_parseable_snapshot() {
        let dir = std::env::temp_dir().join("cratersim-simulation-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("state.json");

        let mut sim = moon_sim(5);
        sim.generate_crater(ImpactArgs::new(20.0e3)).unwrap();
        sim.to_json(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["seed"], 5);
        assert_eq!(value["target"]["name"], "Moon");
        assert_eq!(value["crater"]["diameter"], 20.0e3);
    }
}
