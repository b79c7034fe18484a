//! Read-only state handed to renderers once per tick

use super::arbiter::SignalPhase;
use super::metrics::MetricsSnapshot;
use super::types::{Direction, PerDirection, Position, VehicleClass, VehicleId};

/// What a renderer needs to draw one vehicle
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleView {
    pub id: VehicleId,
    pub direction: Direction,
    pub class: VehicleClass,
    pub position: f32,
    pub center: Position,
    pub committed: bool,
    pub crossed: bool,
    pub queued: bool,
    /// Metres left to the centre, reported for emergency vehicles
    pub distance_to_intersection_m: Option<f32>,
}

/// Per-approach numbers for the overlay graphs
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DirectionStats {
    pub count: usize,
    pub queued: usize,
    pub average_wait: f32,
    pub oldest_wait: f32,
    /// Count relative to the busiest approach, 0 when the road is empty
    pub load_ratio: f32,
}

/// Full state of the simulation after a tick
#[derive(Debug, Clone, PartialEq)]
pub struct SimSnapshot {
    pub time: f32,
    pub phase: SignalPhase,
    pub active_direction: Option<Direction>,
    pub emergency_direction: Option<Direction>,
    pub intersection_clear: bool,
    pub status_message: &'static str,
    pub vehicles: Vec<VehicleView>,
    pub directions: PerDirection<DirectionStats>,
    pub metrics: MetricsSnapshot,
}

impl SimSnapshot {
    pub fn emergency_vehicles(&self) -> impl Iterator<Item = &VehicleView> {
        self.vehicles.iter().filter(|v| v.class.is_emergency())
    }
}
