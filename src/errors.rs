use thiserror::Error;

/// Errors raised while resolving Material/Target/Simulation configuration.
///
/// Resolution is the only place these can occur: once an entity is built,
/// every numeric field is known to be set and valid, so downstream
/// computations never have to re-check.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("the property `{field}` of {entity} has not been set")]
    Unset {
        entity: &'static str,
        field: &'static str,
    },

    #[error("invalid value {value} for `{field}` of {entity}: {reason}")]
    Invalid {
        entity: &'static str,
        field: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("unknown material name {0:?}")]
    UnknownMaterial(String),

    #[error("unknown target name {0:?}")]
    UnknownTarget(String),

    #[error("could not read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors raised by crater emplacement before any grid field is mutated.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("crater radius {radius} m exceeds half the great-circle circumference ({limit} m)")]
    FootprintTooLarge { radius: f64, limit: f64 },

    #[error("degenerate crater location: lon = {lon}, lat = {lat}")]
    DegenerateLocation { lon: f64, lat: f64 },
}

/// Errors raised by the scaling laws before an output record is constructed.
#[derive(Debug, Error)]
pub enum ScalingError {
    #[error("`{quantity}` must be positive and finite, got {value}")]
    OutOfDomain {
        quantity: &'static str,
        value: f64,
    },

    #[error("sin of the impact angle must lie in (0, 1], got {0}")]
    ImpactAngle(f64),
}

/// Top-level error type propagated unchanged by the [`Simulation`](crate::Simulation)
/// orchestrator. No variant is retried or silently replaced with a default.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Scaling(#[from] ScalingError),
}
