//! Signal arbiter for the four-way intersection
//!
//! A tick-driven state machine deciding which single direction holds green.
//! Ordinary switches go through a clearance handshake:
//!
//! ```text
//! GREEN -> REQUEST_SWITCH -> AWAIT_CLEARANCE -> SWITCH_DELAY -> GREEN
//! ```
//!
//! Emergency preemption is evaluated before the phase table on every tick and
//! may jump straight to GREEN from any phase.

use std::cmp::Reverse;
use std::fmt;

use log::{debug, info};
use ordered_float::OrderedFloat;

use super::config::{SimConfig, StarvationPolicy};
use super::types::{Direction, PerDirection};

/// Phase of the signal controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalPhase {
    /// Exactly one direction has right-of-way
    Green,
    /// A switch was requested; every light is red from here on
    RequestSwitch,
    /// Waiting for the conflict box to empty
    AwaitClearance,
    /// Box is clear, pausing before the next green
    SwitchDelay,
}

impl SignalPhase {
    pub fn label(self) -> &'static str {
        match self {
            SignalPhase::Green => "GREEN",
            SignalPhase::RequestSwitch => "REQUEST_SWITCH",
            SignalPhase::AwaitClearance => "AWAIT_CLEARANCE",
            SignalPhase::SwitchDelay => "SWITCH_DELAY",
        }
    }
}

impl fmt::Display for SignalPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What the arbiter reads from the rest of the world each tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArbiterInputs {
    pub queue_counts: PerDirection<usize>,
    pub intersection_clear: bool,
    /// Direction of the emergency vehicle closest to the centre, if any
    pub nearest_emergency: Option<Direction>,
}

/// A phase change decided by the phase table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub to: SignalPhase,
    /// Direction granted green when `to` is `Green`
    pub grant: Option<Direction>,
}

/// Finite state machine owning the right-of-way
#[derive(Debug, Clone)]
pub struct SignalArbiter {
    /// Direction holding (or last holding) green
    current: Direction,
    phase: SignalPhase,
    phase_entered_at: f32,
    /// When each direction last entered GREEN
    last_served: PerDirection<f32>,
    emergency_direction: Option<Direction>,
    switch_requested_at: Option<f32>,
    clearance_wait_started_at: Option<f32>,
    delay_started_at: Option<f32>,
    min_green: f32,
    max_green: f32,
    starve_time: f32,
    switch_delay: f32,
    starvation_policy: StarvationPolicy,
}

impl SignalArbiter {
    /// Start in GREEN for North with every starvation clock at `start`
    pub fn new(config: &SimConfig, start: f32) -> Self {
        Self {
            current: Direction::North,
            phase: SignalPhase::Green,
            phase_entered_at: start,
            last_served: PerDirection::splat(start),
            emergency_direction: None,
            switch_requested_at: None,
            clearance_wait_started_at: None,
            delay_started_at: None,
            min_green: config.min_green,
            max_green: config.max_green,
            starve_time: config.starve_time,
            switch_delay: config.switch_delay,
            starvation_policy: config.starvation_policy,
        }
    }

    pub fn phase(&self) -> SignalPhase {
        self.phase
    }

    pub fn phase_entered_at(&self) -> f32 {
        self.phase_entered_at
    }

    /// The direction with right-of-way; `None` in every non-GREEN phase
    pub fn active_direction(&self) -> Option<Direction> {
        match self.phase {
            SignalPhase::Green => Some(self.current),
            _ => None,
        }
    }

    /// The direction that holds or last held green
    pub fn current_direction(&self) -> Direction {
        self.current
    }

    pub fn last_served(&self, direction: Direction) -> f32 {
        self.last_served.get(direction)
    }

    pub fn emergency_active(&self) -> bool {
        self.emergency_direction.is_some()
    }

    pub fn emergency_direction(&self) -> Option<Direction> {
        self.emergency_direction
    }

    pub fn switch_requested_at(&self) -> Option<f32> {
        self.switch_requested_at
    }

    pub fn clearance_wait_started_at(&self) -> Option<f32> {
        self.clearance_wait_started_at
    }

    pub fn delay_started_at(&self) -> Option<f32> {
        self.delay_started_at
    }

    /// Human-readable status of the switch handshake, empty in GREEN
    pub fn status_message(&self) -> &'static str {
        match self.phase {
            SignalPhase::Green => "",
            SignalPhase::RequestSwitch | SignalPhase::AwaitClearance => {
                "Waiting for intersection to clear..."
            }
            SignalPhase::SwitchDelay => "Intersection clear, delaying before switch",
        }
    }

    /// Longest time any direction has gone without entering GREEN
    pub fn longest_unserved(&self, now: f32) -> (Direction, f32) {
        Direction::ALL
            .iter()
            .map(|&d| (d, now - self.last_served.get(d)))
            .min_by_key(|&(_, waited)| Reverse(OrderedFloat(waited)))
            .unwrap_or((self.current, 0.0))
    }

    /// Pick the direction that should hold green next
    ///
    /// Starving directions win first. Otherwise the busiest approach wins,
    /// keeping the current direction on a tie. The busiest count is taken
    /// over every direction; when only `exclude` reaches it, the first other
    /// direction is chosen. When every queue is empty the light rotates
    /// (or, with `exclude`, the first other direction is chosen).
    pub fn select_direction(
        &self,
        now: f32,
        counts: &PerDirection<usize>,
        exclude: Option<Direction>,
    ) -> Direction {
        let candidates: Vec<Direction> = Direction::ALL
            .iter()
            .copied()
            .filter(|&d| Some(d) != exclude)
            .collect();

        let starving: Vec<Direction> = candidates
            .iter()
            .copied()
            .filter(|&d| now - self.last_served.get(d) >= self.starve_time)
            .collect();

        // min_by_key keeps the first of equal keys, which is enumeration order
        let starving_pick = match self.starvation_policy {
            StarvationPolicy::LargestQueue => starving
                .iter()
                .copied()
                .min_by_key(|&d| Reverse(counts.get(d))),
            StarvationPolicy::LongestStarved => starving.iter().copied().min_by_key(|&d| {
                (OrderedFloat(self.last_served.get(d)), Reverse(counts.get(d)))
            }),
        };
        if let Some(direction) = starving_pick {
            return direction;
        }

        let max_count = Direction::ALL
            .iter()
            .map(|&d| counts.get(d))
            .max()
            .unwrap_or(0);

        if max_count == 0 {
            return match exclude {
                None => self.current.next(),
                Some(_) => candidates.first().copied().unwrap_or(self.current),
            };
        }

        // The busiest approach may be the excluded one, leaving no tie set
        let best: Vec<Direction> = candidates
            .iter()
            .copied()
            .filter(|&d| counts.get(d) == max_count)
            .collect();

        if best.contains(&self.current) {
            self.current
        } else {
            best.first()
                .or(candidates.first())
                .copied()
                .unwrap_or(self.current)
        }
    }

    /// Immediately grant green to an emergency direction
    ///
    /// Bypasses the green timers and the clearance handshake. Returns false
    /// when already preempting for that direction.
    pub fn preempt(&mut self, direction: Direction, now: f32) -> bool {
        if self.emergency_direction == Some(direction) {
            return false;
        }
        info!(
            "Emergency preemption: {} green (was {} in {})",
            direction, self.current, self.phase
        );
        self.emergency_direction = Some(direction);
        self.enter_green(direction, now);
        true
    }

    /// Run one tick of the arbiter
    pub fn evaluate(&mut self, now: f32, inputs: &ArbiterInputs) {
        // A phase change made by the emergency policy counts as this tick's
        // transition
        if self.apply_emergency_policy(now, inputs.nearest_emergency) {
            return;
        }

        if let Some(transition) = self.transition(now, inputs) {
            self.apply(transition, now);
        }
    }

    /// Returns true when the phase changed
    fn apply_emergency_policy(&mut self, now: f32, nearest: Option<Direction>) -> bool {
        match nearest {
            Some(direction) => self.preempt(direction, now),
            None => {
                let Some(cleared) = self.emergency_direction.take() else {
                    return false;
                };
                info!("Emergency in {} cleared, resuming normal arbitration", cleared);
                self.last_served.set(cleared, now);
                if self.phase == SignalPhase::Green {
                    self.apply(
                        Transition {
                            to: SignalPhase::RequestSwitch,
                            grant: None,
                        },
                        now,
                    );
                    return true;
                }
                false
            }
        }
    }

    /// The phase table: decide the next phase without mutating anything
    pub fn transition(&self, now: f32, inputs: &ArbiterInputs) -> Option<Transition> {
        let elapsed = now - self.phase_entered_at;
        match self.phase {
            SignalPhase::Green => {
                if self.emergency_active() {
                    return None;
                }
                let need_switch = elapsed >= self.max_green
                    || (elapsed >= self.min_green
                        && self.select_direction(now, &inputs.queue_counts, None) != self.current);
                need_switch.then_some(Transition {
                    to: SignalPhase::RequestSwitch,
                    grant: None,
                })
            }
            SignalPhase::RequestSwitch => Some(Transition {
                to: SignalPhase::AwaitClearance,
                grant: None,
            }),
            SignalPhase::AwaitClearance => inputs.intersection_clear.then_some(Transition {
                to: SignalPhase::SwitchDelay,
                grant: None,
            }),
            SignalPhase::SwitchDelay => (elapsed >= self.switch_delay).then(|| Transition {
                to: SignalPhase::Green,
                grant: Some(self.select_direction(
                    now,
                    &inputs.queue_counts,
                    Some(self.current),
                )),
            }),
        }
    }

    fn apply(&mut self, transition: Transition, now: f32) {
        debug!(
            "Signal {} -> {} at {:.2}s",
            self.phase, transition.to, now
        );
        match transition.to {
            SignalPhase::Green => {
                let direction = transition.grant.unwrap_or(self.current);
                self.enter_green(direction, now);
            }
            SignalPhase::RequestSwitch => {
                self.phase = SignalPhase::RequestSwitch;
                self.phase_entered_at = now;
                self.switch_requested_at = Some(now);
            }
            SignalPhase::AwaitClearance => {
                self.phase = SignalPhase::AwaitClearance;
                self.phase_entered_at = now;
                self.clearance_wait_started_at = Some(now);
            }
            SignalPhase::SwitchDelay => {
                self.phase = SignalPhase::SwitchDelay;
                self.phase_entered_at = now;
                self.delay_started_at = Some(now);
            }
        }
    }

    fn enter_green(&mut self, direction: Direction, now: f32) {
        self.current = direction;
        self.phase = SignalPhase::Green;
        self.phase_entered_at = now;
        self.switch_requested_at = None;
        self.clearance_wait_started_at = None;
        self.delay_started_at = None;
        self.last_served.set(direction, now);
    }
}
