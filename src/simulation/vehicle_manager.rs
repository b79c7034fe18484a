//! Vehicle spawning and management for the intersection simulation
//!
//! This module contains functions for spawning, moving and retiring vehicles.
//! It separates vehicle bookkeeping from the main world coordination.

use log::debug;

use super::approach::ApproachQueue;
use super::config::SimConfig;
use super::metrics::MetricsCollector;
use super::types::{Direction, VehicleClass, VehicleId};
use super::vehicle::{StepContext, Vehicle, VehicleUpdateResult};

/// Whether a vehicle of `direction` still sits within the safe distance of
/// that approach's spawn edge
pub fn spawn_too_close(vehicles: &[Vehicle], direction: Direction, config: &SimConfig) -> bool {
    let guard = -config.half_extent + config.safe_distance;
    vehicles
        .iter()
        .any(|v| v.direction == direction && v.trailing_edge() < guard)
}

/// Place a new vehicle at the spawn edge of `direction`
///
/// Returns `None` without touching `vehicles` if the spawn edge is occupied.
pub fn spawn_vehicle(
    vehicle_id: VehicleId,
    direction: Direction,
    class: VehicleClass,
    vehicles: &mut Vec<Vehicle>,
    config: &SimConfig,
) -> Option<VehicleId> {
    if spawn_too_close(vehicles, direction, config) {
        debug!("Spawn of {:?} from {} rejected: edge occupied", class, direction);
        return None;
    }

    vehicles.push(Vehicle::new(vehicle_id, direction, class, config));
    Some(vehicle_id)
}

/// Update all vehicles in spawn order
///
/// Returns the ids of vehicles that left the simulation this tick
pub fn update_vehicles(
    vehicles: &mut [Vehicle],
    ctx: &StepContext<'_>,
    metrics: &mut MetricsCollector,
) -> Vec<VehicleId> {
    let mut departed = Vec::new();

    for index in 0..vehicles.len() {
        // Resolve the front vehicle before borrowing this one mutably
        let front_trailing_edge = ApproachQueue::new(vehicles)
            .front_vehicle(&vehicles[index])
            .map(Vehicle::trailing_edge);

        let vehicle = &mut vehicles[index];
        if vehicle.step(front_trailing_edge, ctx, metrics) == VehicleUpdateResult::Despawn {
            departed.push(vehicle.id);
        }
    }

    departed
}

/// Remove departed vehicles and settle their accounting
///
/// Only vehicles that crossed the centre line count as throughput. A vehicle
/// still queued when it leaves has its wait closed out.
pub fn despawn_vehicles(
    departed: &[VehicleId],
    vehicles: &mut Vec<Vehicle>,
    metrics: &mut MetricsCollector,
    now: f32,
) {
    vehicles.retain_mut(|vehicle| {
        if !departed.contains(&vehicle.id) {
            return true;
        }
        if vehicle.crossed {
            metrics.record_throughput();
        }
        metrics.record_wait(vehicle.queued_since.take(), now);
        false
    });
}
