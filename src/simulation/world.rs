//! Main simulation world that ties everything together
//!
//! `SimWorld` owns every piece of mutable simulation state. The host loop
//! calls `tick` once per frame; the siren detector only reaches it through
//! the emergency mailbox.

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::Rng;
use rand::SeedableRng;

use super::approach::ApproachQueue;
use super::arbiter::{ArbiterInputs, SignalArbiter};
use super::clearance::ClearanceSensor;
use super::config::SimConfig;
use super::detector::{emergency_mailbox, EmergencyRequest};
use super::metrics::MetricsCollector;
use super::snapshot::{DirectionStats, SimSnapshot, VehicleView};
use super::types::{Direction, PerDirection, VehicleClass, VehicleId};
use super::vehicle::{StepContext, Vehicle};
use super::vehicle_manager;

/// Characters per side of the terminal map
const MAP_CELLS: usize = 41;

/// Width of the ASCII bars in the summary
const BAR_WIDTH: usize = 20;

/// The main simulation world
pub struct SimWorld {
    pub config: SimConfig,

    /// All live vehicles, in spawn order
    pub vehicles: Vec<Vehicle>,

    pub arbiter: SignalArbiter,

    pub sensor: ClearanceSensor,

    pub metrics: MetricsCollector,

    /// Time of the last tick
    pub time: f32,

    /// Next ID to assign
    next_id: usize,

    /// Optional seeded RNG for reproducible simulations
    rng: Option<StdRng>,

    /// Pending requests from the siren detector
    mailbox: Option<Receiver<EmergencyRequest>>,
}

impl SimWorld {
    fn new_internal(config: SimConfig, rng: Option<StdRng>) -> Result<Self> {
        config.validate().context("Invalid simulation config")?;

        Ok(Self {
            arbiter: SignalArbiter::new(&config, 0.0),
            sensor: ClearanceSensor::new(&config),
            metrics: MetricsCollector::new(0.0),
            vehicles: Vec::new(),
            time: 0.0,
            next_id: 0,
            rng,
            mailbox: None,
            config,
        })
    }

    pub fn new(config: SimConfig) -> Result<Self> {
        Self::new_internal(config, None)
    }

    /// Create a new SimWorld with a seeded RNG for reproducible simulations
    pub fn new_with_seed(config: SimConfig, seed: u64) -> Result<Self> {
        Self::new_internal(config, Some(StdRng::seed_from_u64(seed)))
    }

    /// Open the emergency mailbox and return the sending side for a detector
    ///
    /// Replaces any previously opened mailbox.
    pub fn emergency_mailbox(&mut self) -> Sender<EmergencyRequest> {
        let (sender, receiver) = emergency_mailbox();
        self.mailbox = Some(receiver);
        sender
    }

    /// Roll a `0..=denominator` draw, using seeded RNG if available
    fn roll(&mut self, denominator: u32) -> bool {
        match &mut self.rng {
            Some(rng) => rng.random_range(0..=denominator) == 0,
            None => rand::rng().random_range(0..=denominator) == 0,
        }
    }

    fn random_bool(&mut self, p: f64) -> bool {
        match &mut self.rng {
            Some(rng) => rng.random_bool(p),
            None => rand::rng().random_bool(p),
        }
    }

    fn random_direction(&mut self) -> Direction {
        let chosen = match &mut self.rng {
            Some(rng) => Direction::ALL[..].choose(rng).copied(),
            None => Direction::ALL[..].choose(&mut rand::rng()).copied(),
        };
        chosen.unwrap_or(Direction::North)
    }

    fn random_ordinary_class(&mut self) -> VehicleClass {
        if self.random_bool(self.config.bus_probability) {
            VehicleClass::Bus
        } else {
            VehicleClass::Car
        }
    }

    fn random_emergency_class(&mut self) -> VehicleClass {
        if self.random_bool(self.config.fire_probability) {
            VehicleClass::Fire
        } else {
            VehicleClass::Ambulance
        }
    }

    fn next_vehicle_id(&mut self) -> VehicleId {
        let id = VehicleId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn approach(&self) -> ApproachQueue<'_> {
        ApproachQueue::new(&self.vehicles)
    }

    pub fn is_intersection_clear(&self) -> bool {
        self.sensor.is_clear(&self.vehicles)
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.iter().find(|v| v.id == id)
    }

    /// Spawn a vehicle at the edge of `direction`
    ///
    /// Returns `None` if another vehicle is still too close to the spawn edge
    pub fn spawn_vehicle(&mut self, direction: Direction, class: VehicleClass) -> Option<VehicleId> {
        let id = self.next_vehicle_id();
        let spawned =
            vehicle_manager::spawn_vehicle(id, direction, class, &mut self.vehicles, &self.config)?;
        self.metrics.record_spawn();
        Some(spawned)
    }

    /// Seed the road with `count` ordinary vehicles before the first tick
    ///
    /// Each attempt picks a random approach and goes through the spawn guard,
    /// so attempts on an occupied edge are dropped. Returns how many were placed.
    pub fn prespawn(&mut self, count: usize) -> usize {
        let mut placed = 0;
        for _ in 0..count {
            let direction = self.random_direction();
            let class = self.random_ordinary_class();
            if self.spawn_vehicle(direction, class).is_some() {
                placed += 1;
            }
        }
        debug!("Prespawned {} of {} vehicles", placed, count);
        placed
    }

    /// Put a prepared vehicle on the road as-is, bypassing the spawn guard
    ///
    /// The vehicle is given a fresh id so ids stay unique.
    pub fn insert_vehicle(&mut self, mut vehicle: Vehicle) -> VehicleId {
        let id = self.next_vehicle_id();
        vehicle.id = id;
        self.vehicles.push(vehicle);
        self.metrics.record_spawn();
        id
    }

    /// Remove a vehicle without any throughput or wait accounting
    pub fn remove_vehicle(&mut self, id: VehicleId) -> Option<Vehicle> {
        let index = self.vehicles.iter().position(|v| v.id == id)?;
        Some(self.vehicles.remove(index))
    }

    /// Spawn an emergency vehicle and preempt the signals for it
    ///
    /// Without a direction one is picked at random. If the spawn edge is
    /// occupied the request is dropped.
    pub fn request_emergency(&mut self, direction: Option<Direction>) -> Option<VehicleId> {
        let direction = match direction {
            Some(direction) => direction,
            None => self.random_direction(),
        };
        let class = self.random_emergency_class();

        let Some(id) = self.spawn_vehicle(direction, class) else {
            debug!("Emergency request for {} dropped: spawn edge occupied", direction);
            return None;
        };

        info!("Emergency {:?} {:?} dispatched from {}", class, id, direction);
        self.arbiter.preempt(direction, self.time);
        Some(id)
    }

    /// Handle any request the detector posted since the last tick
    fn drain_mailbox(&mut self) {
        let requests: Vec<EmergencyRequest> = match &self.mailbox {
            Some(mailbox) => mailbox.try_iter().collect(),
            None => return,
        };
        for request in requests {
            self.request_emergency(request.direction);
        }
    }

    /// Random traffic generation; an emergency roll that hits skips the
    /// ordinary roll for this tick
    fn spawn_random_traffic(&mut self) {
        if let Some(chance) = self.config.emergency_spawn_chance {
            if self.roll(chance) {
                let direction = self.random_direction();
                let class = self.random_emergency_class();
                self.spawn_vehicle(direction, class);
                return;
            }
        }

        if let Some(chance) = self.config.spawn_chance {
            if self.roll(chance) {
                let direction = self.random_direction();
                let class = self.random_ordinary_class();
                self.spawn_vehicle(direction, class);
            }
        }
    }

    fn update_vehicles(&mut self, now: f32, delta_secs: f32) {
        let ctx = StepContext {
            now,
            delta_secs,
            green: self.arbiter.active_direction(),
            config: &self.config,
        };
        let departed = vehicle_manager::update_vehicles(&mut self.vehicles, &ctx, &mut self.metrics);
        vehicle_manager::despawn_vehicles(&departed, &mut self.vehicles, &mut self.metrics, now);
    }

    /// What the arbiter sees this tick
    pub fn arbiter_inputs(&self) -> ArbiterInputs {
        let approach = self.approach();
        ArbiterInputs {
            queue_counts: approach.counts(),
            intersection_clear: self.is_intersection_clear(),
            nearest_emergency: approach
                .nearest_emergency(self.config.lane_offset)
                .map(|v| v.direction),
        }
    }

    /// Main simulation tick
    ///
    /// Advances the world to `now`: detector requests, spawning, vehicle
    /// movement, then the signal arbiter.
    pub fn tick(&mut self, now: f32) -> SimSnapshot {
        let delta_secs = (now - self.time).max(0.0);
        self.time = now;

        self.drain_mailbox();
        self.spawn_random_traffic();
        self.update_vehicles(now, delta_secs);

        let inputs = self.arbiter_inputs();
        self.arbiter.evaluate(now, &inputs);

        self.snapshot()
    }

    /// Tick `delta_secs` after the previous tick
    pub fn advance(&mut self, delta_secs: f32) -> SimSnapshot {
        self.tick(self.time + delta_secs)
    }

    /// Read-only state for renderers
    pub fn snapshot(&self) -> SimSnapshot {
        let approach = self.approach();
        let now = self.time;

        let mut directions = PerDirection::splat(DirectionStats::default());
        for direction in Direction::ALL {
            directions.set(
                direction,
                DirectionStats {
                    count: approach.count(direction),
                    queued: approach.queued_count(direction),
                    average_wait: approach.average_wait(direction, now),
                    oldest_wait: approach.oldest_wait(direction, now),
                    load_ratio: approach.load_ratio(direction),
                },
            );
        }

        let vehicles = self
            .vehicles
            .iter()
            .map(|v| VehicleView {
                id: v.id,
                direction: v.direction,
                class: v.class,
                position: v.position,
                center: v.world_center(self.config.lane_offset),
                committed: v.committed,
                crossed: v.crossed,
                queued: v.is_queued(),
                distance_to_intersection_m: v
                    .is_emergency()
                    .then(|| v.distance_to_intersection_m()),
            })
            .collect();

        SimSnapshot {
            time: now,
            phase: self.arbiter.phase(),
            active_direction: self.arbiter.active_direction(),
            emergency_direction: self.arbiter.emergency_direction(),
            intersection_clear: self.is_intersection_clear(),
            status_message: self.arbiter.status_message(),
            vehicles,
            directions,
            metrics: self.metrics.snapshot(now),
        }
    }

    /// Print a summary of the world state
    pub fn print_summary(&self) {
        let snapshot = self.snapshot();

        println!("=== Intersection Summary ===");
        println!("Time: {:.2}s", snapshot.time);
        println!(
            "Light: {} | Green: {}",
            snapshot.phase,
            snapshot
                .active_direction
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
        if !snapshot.status_message.is_empty() {
            println!("{}", snapshot.status_message);
        }
        if let Some(direction) = snapshot.emergency_direction {
            println!("EMERGENCY VEHICLE DETECTED! Preempting {}", direction);
        }
        println!("{}", self.metrics.summary(snapshot.time));
        println!("Total vehicles on road: {}", snapshot.vehicles.len());
        println!();

        println!("--- Approaches ---");
        for (direction, stats) in snapshot.directions.iter() {
            let filled = (stats.load_ratio * BAR_WIDTH as f32).round() as usize;
            println!(
                "  {} [{:<width$}] count={} queued={} avg_wait={:.1}s oldest={:.1}s",
                direction,
                "#".repeat(filled.min(BAR_WIDTH)),
                stats.count,
                stats.queued,
                stats.average_wait,
                stats.oldest_wait,
                width = BAR_WIDTH
            );
        }

        let emergencies: Vec<&VehicleView> = snapshot.emergency_vehicles().collect();
        if !emergencies.is_empty() {
            println!("--- Emergency Vehicles ---");
            for view in emergencies {
                println!(
                    "  {:?} ({}): {:.1}m",
                    view.class,
                    view.direction,
                    view.distance_to_intersection_m.unwrap_or(0.0)
                );
            }
        }
    }

    /// Draw a visual map of the intersection in the terminal
    pub fn draw_map(&self) {
        let extent = self.config.half_extent;
        let scale = (MAP_CELLS - 1) as f32 / (2.0 * extent);

        // Helper to convert world coords to grid coords
        let to_grid = |x: f32, y: f32| -> Option<(usize, usize)> {
            let col = ((x + extent) * scale).round();
            let row = ((y + extent) * scale).round();
            if col < 0.0 || row < 0.0 {
                return None;
            }
            let (col, row) = (col as usize, row as usize);
            (col < MAP_CELLS && row < MAP_CELLS).then_some((row, col))
        };

        let mut grid = vec![vec![' '; MAP_CELLS]; MAP_CELLS];

        // Roads
        let road_half = self.config.box_half_size;
        for (row, line) in grid.iter_mut().enumerate() {
            for (col, cell) in line.iter_mut().enumerate() {
                let x = col as f32 / scale - extent;
                let y = row as f32 / scale - extent;
                let on_vertical = x.abs() <= road_half;
                let on_horizontal = y.abs() <= road_half;
                if on_vertical && on_horizontal {
                    *cell = '+';
                } else if on_vertical || on_horizontal {
                    *cell = '.';
                }
            }
        }

        // Vehicles
        for vehicle in &self.vehicles {
            let center = vehicle.world_center(self.config.lane_offset);
            if let Some((row, col)) = to_grid(center.x, center.y) {
                grid[row][col] = match vehicle.class {
                    VehicleClass::Car => 'c',
                    VehicleClass::Bus => 'b',
                    VehicleClass::Ambulance => 'A',
                    VehicleClass::Fire => 'F',
                };
            }
        }

        println!("\n=== Intersection Map ===");
        println!("Legend: +=Conflict box, .=Road, c=Car, b=Bus, A=Ambulance, F=Fire");
        println!();
        for row in &grid {
            let line: String = row.iter().collect();
            println!("{}", line);
        }
        println!();
    }
}
