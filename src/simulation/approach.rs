//! Per-direction queries over the live vehicle set
//!
//! Nothing is cached: every call walks the vehicle list, which is cheap at
//! the scale of a single intersection.

use ordered_float::OrderedFloat;

use super::types::{Direction, PerDirection};
use super::vehicle::Vehicle;

/// Read-only view of the vehicles grouped by approach
#[derive(Debug, Clone, Copy)]
pub struct ApproachQueue<'a> {
    vehicles: &'a [Vehicle],
}

impl<'a> ApproachQueue<'a> {
    pub fn new(vehicles: &'a [Vehicle]) -> Self {
        Self { vehicles }
    }

    fn in_direction(&self, direction: Direction) -> impl Iterator<Item = &'a Vehicle> {
        self.vehicles.iter().filter(move |v| v.direction == direction)
    }

    /// Number of vehicles assigned to a direction
    pub fn count(&self, direction: Direction) -> usize {
        self.in_direction(direction).count()
    }

    /// Number of vehicles in a direction that are currently waiting
    pub fn queued_count(&self, direction: Direction) -> usize {
        self.in_direction(direction).filter(|v| v.is_queued()).count()
    }

    /// Longest current wait in a direction, 0 when nobody is waiting
    pub fn oldest_wait(&self, direction: Direction, now: f32) -> f32 {
        self.in_direction(direction)
            .filter_map(|v| v.queued_since)
            .map(|since| (now - since).max(0.0))
            .fold(0.0, f32::max)
    }

    /// Mean current wait of the vehicles waiting in a direction
    pub fn average_wait(&self, direction: Direction, now: f32) -> f32 {
        let waits: Vec<f32> = self
            .in_direction(direction)
            .filter_map(|v| v.queued_since)
            .map(|since| (now - since).max(0.0))
            .collect();
        if waits.is_empty() {
            0.0
        } else {
            waits.iter().sum::<f32>() / waits.len() as f32
        }
    }

    pub fn counts(&self) -> PerDirection<usize> {
        let mut counts = PerDirection::splat(0);
        for vehicle in self.vehicles {
            counts.0[vehicle.direction.index()] += 1;
        }
        counts
    }

    /// A direction's count relative to the busiest direction, in [0, 1]
    pub fn load_ratio(&self, direction: Direction) -> f32 {
        let counts = self.counts();
        let max = counts.0.iter().copied().max().unwrap_or(0).max(1);
        counts.get(direction) as f32 / max as f32
    }

    /// The nearest vehicle strictly ahead of `vehicle` in its lane
    pub fn front_vehicle(&self, vehicle: &Vehicle) -> Option<&'a Vehicle> {
        self.in_direction(vehicle.direction)
            .filter(|other| other.id != vehicle.id && other.position > vehicle.position)
            .min_by_key(|other| OrderedFloat(other.position))
    }

    /// The emergency vehicle closest to the intersection centre; the earliest
    /// spawned wins a tie
    pub fn nearest_emergency(&self, lane_offset: f32) -> Option<&'a Vehicle> {
        self.vehicles
            .iter()
            .filter(|v| v.is_emergency())
            .min_by_key(|v| OrderedFloat(v.world_center(lane_offset).length()))
    }
}
