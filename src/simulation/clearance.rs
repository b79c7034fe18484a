//! Occupancy sensor for the central conflict box
//!
//! Simulated, so it is exact: it looks at every live vehicle on every call,
//! regardless of which direction currently has right-of-way.

use super::config::SimConfig;
use super::types::{Rect, VehicleId};
use super::vehicle::Vehicle;

/// Reports whether any vehicle overlaps the conflict box
#[derive(Debug, Clone)]
pub struct ClearanceSensor {
    pub conflict_box: Rect,
    pub lane_offset: f32,
}

impl ClearanceSensor {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            conflict_box: Rect::centered(config.box_half_size),
            lane_offset: config.lane_offset,
        }
    }

    fn occupies(&self, vehicle: &Vehicle) -> bool {
        vehicle
            .footprint(self.lane_offset)
            .intersects(&self.conflict_box)
    }

    /// True when no vehicle footprint touches the conflict box
    pub fn is_clear(&self, vehicles: &[Vehicle]) -> bool {
        !vehicles.iter().any(|v| self.occupies(v))
    }

    /// Vehicles currently inside the conflict box
    pub fn occupants(&self, vehicles: &[Vehicle]) -> Vec<VehicleId> {
        vehicles
            .iter()
            .filter(|v| self.occupies(v))
            .map(|v| v.id)
            .collect()
    }
}
