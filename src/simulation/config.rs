//! Tunable constants for the intersection simulation
//!
//! Every option has a default matching the adaptive controller's reference
//! timings. `validate` must pass before a world is built from a config.

use anyhow::{ensure, Result};

/// Seconds each green must last before a demand-driven switch
pub const MIN_GREEN: f32 = 5.0;
/// Seconds after which a green is switched regardless of demand
pub const MAX_GREEN: f32 = 30.0;
/// Seconds without green after which a direction is starving
pub const STARVE_TIME: f32 = 25.0;
/// Minimum gap kept between consecutive vehicles in a lane
pub const SAFE_DISTANCE: f32 = 15.0;
/// Pause between a clear intersection and the next green
pub const SWITCH_DELAY_SECONDS: f32 = 1.0;
/// A vehicle spawns on ticks where a draw in `0..=SPAWN_CHANCE` hits 0
pub const SPAWN_CHANCE: u32 = 15;
/// Vehicle speed in world units per second (2 units per frame at 60 fps)
pub const VEHICLE_SPEED: f32 = 120.0;
/// Distance from the centre to each simulation edge
pub const HALF_EXTENT: f32 = 400.0;
/// Half the side of the central conflict box
pub const BOX_HALF_SIZE: f32 = 60.0;
/// Lateral offset of each lane's centre line from the road axis
pub const LANE_OFFSET: f32 = 15.0;
/// Vehicles whose leading edge is within this distance of the centre can queue
pub const QUEUE_WINDOW: f32 = 300.0;
/// Minimum gap between detector triggers
pub const SIREN_COOLDOWN_SECONDS: f32 = 3.0;

/// How a starving direction is picked when several are starving
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StarvationPolicy {
    /// Serve the starving direction with the largest queue
    #[default]
    LargestQueue,
    /// Serve the direction that has waited longest, then by queue size
    LongestStarved,
}

/// Simulation configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    pub min_green: f32,
    pub max_green: f32,
    pub starve_time: f32,
    pub safe_distance: f32,
    pub switch_delay: f32,
    /// `None` disables random spawning
    pub spawn_chance: Option<u32>,
    /// `None` disables random emergency spawning
    pub emergency_spawn_chance: Option<u32>,
    /// Share of ordinary spawns that are buses
    pub bus_probability: f64,
    /// Share of emergency spawns that are fire engines
    pub fire_probability: f64,
    pub vehicle_speed: f32,
    pub half_extent: f32,
    pub box_half_size: f32,
    pub lane_offset: f32,
    pub queue_window: f32,
    pub starvation_policy: StarvationPolicy,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            min_green: MIN_GREEN,
            max_green: MAX_GREEN,
            starve_time: STARVE_TIME,
            safe_distance: SAFE_DISTANCE,
            switch_delay: SWITCH_DELAY_SECONDS,
            spawn_chance: Some(SPAWN_CHANCE),
            emergency_spawn_chance: None,
            bus_probability: 0.3,
            fire_probability: 0.5,
            vehicle_speed: VEHICLE_SPEED,
            half_extent: HALF_EXTENT,
            box_half_size: BOX_HALF_SIZE,
            lane_offset: LANE_OFFSET,
            queue_window: QUEUE_WINDOW,
            starvation_policy: StarvationPolicy::default(),
        }
    }
}

impl SimConfig {
    /// A config with random spawning switched off, for scripted scenarios
    pub fn quiet() -> Self {
        Self {
            spawn_chance: None,
            emergency_spawn_chance: None,
            ..Self::default()
        }
    }

    /// The stop line sits on the near edge of the conflict box
    pub fn stop_line(&self) -> f32 {
        -self.box_half_size
    }

    /// Check the configuration for values that would break the simulation
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("min_green", self.min_green),
            ("max_green", self.max_green),
            ("starve_time", self.starve_time),
            ("switch_delay", self.switch_delay),
            ("vehicle_speed", self.vehicle_speed),
            ("half_extent", self.half_extent),
            ("box_half_size", self.box_half_size),
            ("queue_window", self.queue_window),
        ] {
            ensure!(
                value.is_finite() && value > 0.0,
                "{} must be a positive number, got {}",
                name,
                value
            );
        }

        ensure!(
            self.min_green <= self.max_green,
            "min_green ({}) must not exceed max_green ({})",
            self.min_green,
            self.max_green
        );
        ensure!(
            self.safe_distance.is_finite() && self.safe_distance >= 0.0,
            "safe_distance must be non-negative, got {}",
            self.safe_distance
        );
        ensure!(
            self.lane_offset.is_finite() && self.lane_offset >= 0.0,
            "lane_offset must be non-negative, got {}",
            self.lane_offset
        );
        ensure!(
            self.box_half_size < self.half_extent,
            "conflict box ({}) must fit inside the simulation extent ({})",
            self.box_half_size,
            self.half_extent
        );
        ensure!(
            self.spawn_chance != Some(0) && self.emergency_spawn_chance != Some(0),
            "spawn chance denominators must be at least 1"
        );
        for (name, p) in [
            ("bus_probability", self.bus_probability),
            ("fire_probability", self.fire_probability),
        ] {
            ensure!(
                (0.0..=1.0).contains(&p),
                "{} must be within [0, 1], got {}",
                name,
                p
            );
        }

        Ok(())
    }
}

