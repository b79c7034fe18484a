//! Standalone intersection simulation module
//!
//! This module contains all the core simulation logic: vehicles, the signal
//! arbiter, the clearance sensor, metrics and the siren detector worker. It
//! has no rendering dependency and can be driven from a console loop or tests.

mod approach;
mod arbiter;
mod clearance;
mod config;
mod detector;
mod metrics;
mod snapshot;
mod types;
mod vehicle;
mod vehicle_manager;
mod world;

pub use approach::ApproachQueue;
pub use arbiter::{ArbiterInputs, SignalArbiter, SignalPhase, Transition};
pub use clearance::ClearanceSensor;
pub use config::{
    SimConfig, StarvationPolicy, BOX_HALF_SIZE, HALF_EXTENT, LANE_OFFSET, MAX_GREEN, MIN_GREEN,
    QUEUE_WINDOW, SAFE_DISTANCE, SIREN_COOLDOWN_SECONDS, SPAWN_CHANCE, STARVE_TIME,
    SWITCH_DELAY_SECONDS, VEHICLE_SPEED,
};
pub use detector::{
    emergency_mailbox, DetectorHandle, EmergencyRequest, RandomSiren, ScriptedSiren,
    SirenDetector, SirenSource,
};
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use snapshot::{DirectionStats, SimSnapshot, VehicleView};
pub use types::{
    Direction, PerDirection, Position, Rect, VehicleClass, VehicleId, BUS_LENGTH, CAR_LENGTH,
    UNITS_PER_METER, VEHICLE_WIDTH,
};
pub use vehicle::{StepContext, Vehicle, VehicleUpdateResult};
pub use vehicle_manager::{despawn_vehicles, spawn_too_close};
pub use world::SimWorld;
