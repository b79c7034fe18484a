//! Vehicle movement logic for the intersection simulation
//!
//! Every approach is handled by the same code: a vehicle only knows its
//! scalar offset along its direction's travel axis, and world coordinates
//! are recovered from the direction's unit vectors when needed.

use super::config::SimConfig;
use super::metrics::MetricsCollector;
use super::types::{Direction, Position, Rect, VehicleClass, VehicleId, UNITS_PER_METER};

/// Inset applied to footprints along the travel axis, at each end
const FOOTPRINT_INSET_ALONG: f32 = 5.0;

/// Inset applied to footprints across the travel axis, at each side
const FOOTPRINT_INSET_ACROSS: f32 = 2.0;

/// Result of a vehicle update indicating what should happen to it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleUpdateResult {
    Continue,
    /// The vehicle left the far edge and should be removed
    Despawn,
}

/// Everything a vehicle needs to know about the rest of the world for one tick
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub now: f32,
    pub delta_secs: f32,
    /// The direction holding a green light, `None` outside GREEN
    pub green: Option<Direction>,
    pub config: &'a SimConfig,
}

/// A vehicle approaching or crossing the intersection
#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub id: VehicleId,
    pub direction: Direction,
    pub class: VehicleClass,
    /// Offset of the leading edge along the travel axis; 0 is the centre line
    pub position: f32,
    pub length: f32,
    pub width: f32,
    /// Set once the vehicle legally entered the conflict zone; never cleared
    pub committed: bool,
    /// When the vehicle started waiting, if it is waiting
    pub queued_since: Option<f32>,
    /// Set once the vehicle's centre passed the centre line
    pub crossed: bool,
}

impl Vehicle {
    /// Create a vehicle at the spawn edge of its approach
    pub fn new(id: VehicleId, direction: Direction, class: VehicleClass, config: &SimConfig) -> Self {
        Self {
            id,
            direction,
            class,
            position: -config.half_extent,
            length: class.length(),
            width: class.width(),
            committed: false,
            queued_since: None,
            crossed: false,
        }
    }

    /// Place the vehicle's leading edge at a given offset
    pub fn with_position(mut self, position: f32) -> Self {
        self.position = position;
        self
    }

    pub fn is_emergency(&self) -> bool {
        self.class.is_emergency()
    }

    pub fn is_queued(&self) -> bool {
        self.queued_since.is_some()
    }

    pub fn leading_edge(&self) -> f32 {
        self.position
    }

    pub fn trailing_edge(&self) -> f32 {
        self.position - self.length
    }

    /// Offset of the vehicle's centre along the travel axis
    pub fn center_offset(&self) -> f32 {
        self.position - self.length / 2.0
    }

    /// Centre of the vehicle in world coordinates
    pub fn world_center(&self, lane_offset: f32) -> Position {
        let along = self.direction.travel().scale(self.center_offset());
        let across = self.direction.lane_normal().scale(lane_offset);
        along.add(&across)
    }

    /// Inset footprint rectangle in world coordinates
    pub fn footprint(&self, lane_offset: f32) -> Rect {
        let travel = self.direction.travel();
        let normal = self.direction.lane_normal();

        let along_start = self.trailing_edge() + FOOTPRINT_INSET_ALONG;
        let along_len = (self.length - 2.0 * FOOTPRINT_INSET_ALONG).max(1.0);
        let half_across = (self.width - 2.0 * FOOTPRINT_INSET_ACROSS).max(1.0) / 2.0;

        let rear = travel
            .scale(along_start)
            .add(&normal.scale(lane_offset - half_across));
        let front = travel
            .scale(along_start + along_len)
            .add(&normal.scale(lane_offset + half_across));
        Rect::from_corners(rear, front)
    }

    /// Remaining distance to the intersection centre in metres, 0 once crossed
    pub fn distance_to_intersection_m(&self) -> f32 {
        if self.crossed {
            return 0.0;
        }
        (-self.center_offset() / UNITS_PER_METER).max(0.0)
    }

    pub fn has_reached_stop_line(&self, config: &SimConfig) -> bool {
        self.leading_edge() >= config.stop_line()
    }

    pub fn is_near_intersection(&self, config: &SimConfig) -> bool {
        self.leading_edge() >= -config.queue_window
    }

    /// Whether the trailing edge is past the far edge of the simulation
    pub fn has_left(&self, config: &SimConfig) -> bool {
        self.trailing_edge() > config.half_extent
    }

    /// Green for our direction, or an emergency vehicle ignoring the light
    pub fn can_pass(&self, green: Option<Direction>) -> bool {
        self.is_emergency() || green == Some(self.direction)
    }

    /// Gap check against the trailing edge of the vehicle ahead, if any
    pub fn safe_to_move(&self, front_trailing_edge: Option<f32>, safe_distance: f32) -> bool {
        match front_trailing_edge {
            None => true,
            Some(trailing) => trailing - self.leading_edge() > safe_distance,
        }
    }

    /// Whether the vehicle would advance this tick under the traffic rules
    pub fn will_move(&self, can_pass: bool, safe: bool, config: &SimConfig) -> bool {
        self.committed || (can_pass && safe) || (!self.has_reached_stop_line(config) && safe)
    }

    fn try_commit(
        &mut self,
        can_pass: bool,
        now: f32,
        config: &SimConfig,
        metrics: &mut MetricsCollector,
    ) {
        if !self.committed && can_pass && self.has_reached_stop_line(config) {
            self.committed = true;
            metrics.record_wait(self.queued_since.take(), now);
        }
    }

    /// Where the vehicle would end up if it moved this tick
    ///
    /// Uncommitted vehicles stop short of the safe gap behind the vehicle
    /// ahead, and exactly on the stop line when they may not pass.
    fn target_position(
        &self,
        can_pass: bool,
        front_trailing_edge: Option<f32>,
        ctx: &StepContext<'_>,
    ) -> f32 {
        let config = ctx.config;
        let mut target = self.position + config.vehicle_speed * ctx.delta_secs;

        if !self.committed {
            if let Some(trailing) = front_trailing_edge {
                target = target.min(trailing - config.safe_distance);
            }
            if !can_pass && !self.has_reached_stop_line(config) {
                target = target.min(config.stop_line());
            }
        }

        target.max(self.position)
    }

    /// Whether the vehicle actually advances this tick
    ///
    /// A vehicle the rules allow to move but whose clamped target is its
    /// current position is held in place and counts as not moving.
    fn moves_this_tick(
        &self,
        can_pass: bool,
        safe: bool,
        front_trailing_edge: Option<f32>,
        ctx: &StepContext<'_>,
    ) -> bool {
        if !self.will_move(can_pass, safe, ctx.config) {
            return false;
        }
        ctx.delta_secs <= 0.0
            || self.target_position(can_pass, front_trailing_edge, ctx) > self.position
    }

    /// Advance the vehicle by one tick
    ///
    /// `front_trailing_edge` is the trailing edge of the nearest vehicle ahead
    /// in the same lane. Finished waits are reported to `metrics`.
    pub fn step(
        &mut self,
        front_trailing_edge: Option<f32>,
        ctx: &StepContext<'_>,
        metrics: &mut MetricsCollector,
    ) -> VehicleUpdateResult {
        let config = ctx.config;
        let can_pass = self.can_pass(ctx.green);
        let safe = self.safe_to_move(front_trailing_edge, config.safe_distance);

        // Start the wait clock before committing so a wait that ends this
        // same tick is still recorded
        if !self.moves_this_tick(can_pass, safe, front_trailing_edge, ctx)
            && !self.committed
            && self.queued_since.is_none()
            && self.is_near_intersection(config)
        {
            self.queued_since = Some(ctx.now);
        }

        self.try_commit(can_pass, ctx.now, config, metrics);

        if self.moves_this_tick(can_pass, safe, front_trailing_edge, ctx) {
            self.position = self.target_position(can_pass, front_trailing_edge, ctx);
            // Crossing the stop line on green commits within the same tick,
            // so nothing uncommitted is ever left past the line
            self.try_commit(can_pass, ctx.now, config, metrics);
        }

        if !self.crossed && self.center_offset() >= 0.0 {
            self.crossed = true;
        }

        if self.has_left(config) {
            VehicleUpdateResult::Despawn
        } else {
            VehicleUpdateResult::Continue
        }
    }
}
