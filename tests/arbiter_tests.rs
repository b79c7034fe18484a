//! Signal arbiter state machine tests
//!
//! The arbiter is driven directly with hand-built inputs, one tick every
//! quarter second so every timestamp is exact in f32.

use intersection_sim::simulation::{
    ArbiterInputs, Direction, PerDirection, SignalArbiter, SignalPhase, SimConfig,
    StarvationPolicy, MAX_GREEN, STARVE_TIME, SWITCH_DELAY_SECONDS,
};

const DT: f32 = 0.25;

fn inputs(counts: [usize; 4], clear: bool, emergency: Option<Direction>) -> ArbiterInputs {
    ArbiterInputs {
        queue_counts: PerDirection(counts),
        intersection_clear: clear,
        nearest_emergency: emergency,
    }
}

fn new_arbiter() -> SignalArbiter {
    SignalArbiter::new(&SimConfig::quiet(), 0.0)
}

/// Run the ordinary switch handshake until `target` holds green
///
/// Only `target` has traffic. Returns the time green was granted.
fn drive_to_green(arbiter: &mut SignalArbiter, start: f32, target: Direction) -> f32 {
    let mut counts = [0; 4];
    counts[target.index()] = 1;
    let step = inputs(counts, true, None);

    for k in 1..=400 {
        let now = start + k as f32 * DT;
        arbiter.evaluate(now, &step);
        if arbiter.active_direction() == Some(target) {
            return now;
        }
    }
    panic!("{} never received green", target);
}

#[test]
fn test_arbiter_initial_state() {
    let arbiter = new_arbiter();
    assert_eq!(arbiter.phase(), SignalPhase::Green);
    assert_eq!(arbiter.active_direction(), Some(Direction::North));
    assert!(!arbiter.emergency_active());
    for direction in Direction::ALL {
        assert_eq!(arbiter.last_served(direction), 0.0);
    }
    assert_eq!(arbiter.status_message(), "");
}

#[test]
fn test_handshake_sequence_to_east() {
    let mut arbiter = new_arbiter();
    let east_waiting = inputs([0, 1, 0, 0], true, None);

    arbiter.evaluate(4.75, &east_waiting);
    assert_eq!(arbiter.phase(), SignalPhase::Green, "min green not respected");

    arbiter.evaluate(5.0, &east_waiting);
    assert_eq!(arbiter.phase(), SignalPhase::RequestSwitch);
    assert_eq!(arbiter.switch_requested_at(), Some(5.0));
    assert_eq!(arbiter.active_direction(), None, "no green outside GREEN");

    arbiter.evaluate(5.25, &east_waiting);
    assert_eq!(arbiter.phase(), SignalPhase::AwaitClearance);
    assert_eq!(arbiter.clearance_wait_started_at(), Some(5.25));

    arbiter.evaluate(5.5, &east_waiting);
    assert_eq!(arbiter.phase(), SignalPhase::SwitchDelay);
    assert_eq!(arbiter.delay_started_at(), Some(5.5));

    arbiter.evaluate(6.0, &east_waiting);
    assert_eq!(arbiter.phase(), SignalPhase::SwitchDelay, "switch delay cut short");

    arbiter.evaluate(6.5, &east_waiting);
    assert_eq!(arbiter.active_direction(), Some(Direction::East));
    assert_eq!(arbiter.last_served(Direction::East), 6.5);
    assert_eq!(arbiter.switch_requested_at(), None);
    assert_eq!(arbiter.clearance_wait_started_at(), None);
    assert_eq!(arbiter.delay_started_at(), None);
}

#[test]
fn test_request_switch_lasts_one_tick() {
    let mut arbiter = new_arbiter();
    arbiter.evaluate(5.0, &inputs([0, 3, 0, 0], false, None));
    assert_eq!(arbiter.phase(), SignalPhase::RequestSwitch);

    // Moves on even though the box is occupied
    arbiter.evaluate(5.25, &inputs([0, 3, 0, 0], false, None));
    assert_eq!(arbiter.phase(), SignalPhase::AwaitClearance);
}

#[test]
fn test_clearance_blocks_switch_indefinitely() {
    let mut arbiter = new_arbiter();
    let blocked = inputs([0, 4, 0, 0], false, None);
    arbiter.evaluate(5.0, &blocked);
    arbiter.evaluate(5.25, &blocked);
    assert_eq!(arbiter.phase(), SignalPhase::AwaitClearance);

    for k in 1..=400 {
        let now = 5.25 + k as f32 * DT;
        arbiter.evaluate(now, &blocked);
        assert_eq!(
            arbiter.phase(),
            SignalPhase::AwaitClearance,
            "left AWAIT_CLEARANCE with an occupied box at {}s",
            now
        );
        assert_eq!(arbiter.active_direction(), None);
    }

    arbiter.evaluate(200.0, &inputs([0, 4, 0, 0], true, None));
    assert_eq!(arbiter.phase(), SignalPhase::SwitchDelay);
}

#[test]
fn test_max_green_forces_switch() {
    let mut arbiter = new_arbiter();
    let north_only = inputs([5, 0, 0, 0], true, None);

    let mut now = 0.0;
    while now < MAX_GREEN - DT {
        now += DT;
        arbiter.evaluate(now, &north_only);
        assert_eq!(
            arbiter.active_direction(),
            Some(Direction::North),
            "switched away from the only busy direction at {}s",
            now
        );
    }

    arbiter.evaluate(MAX_GREEN, &north_only);
    assert_eq!(arbiter.phase(), SignalPhase::RequestSwitch);
}

#[test]
fn test_transition_is_pure() {
    let arbiter = new_arbiter();
    let step = inputs([0, 2, 0, 0], true, None);
    let first = arbiter.transition(5.0, &step);
    let second = arbiter.transition(5.0, &step);
    assert_eq!(first, second);
    assert_eq!(arbiter.phase(), SignalPhase::Green);
    assert_eq!(
        first.map(|t| t.to),
        Some(SignalPhase::RequestSwitch)
    );
    assert_eq!(arbiter.transition(1.0, &step), None);
}

#[test]
fn test_select_direction_keeps_current_on_tie() {
    let mut arbiter = new_arbiter();
    let counts = PerDirection([5, 5, 0, 0]);
    assert_eq!(arbiter.select_direction(1.0, &counts, None), Direction::North);

    let granted = drive_to_green(&mut arbiter, 0.0, Direction::East);
    let now = granted + 0.5;
    assert_eq!(arbiter.select_direction(now, &counts, None), Direction::East);
    assert_eq!(arbiter.select_direction(now, &counts, None), Direction::East);
}

#[test]
fn test_select_direction_largest_queue_wins() {
    let arbiter = new_arbiter();
    let counts = PerDirection([1, 2, 7, 0]);
    assert_eq!(arbiter.select_direction(1.0, &counts, None), Direction::South);
    assert_eq!(
        arbiter.select_direction(1.0, &counts, Some(Direction::South)),
        Direction::East
    );
}

#[test]
fn test_select_direction_empty_queues_rotate() {
    let mut arbiter = new_arbiter();
    let empty = PerDirection([0; 4]);
    assert_eq!(arbiter.select_direction(1.0, &empty, None), Direction::East);
    assert_eq!(
        arbiter.select_direction(1.0, &empty, Some(Direction::North)),
        Direction::East
    );

    let granted = drive_to_green(&mut arbiter, 0.0, Direction::East);
    let now = granted + DT;
    assert_eq!(arbiter.select_direction(now, &empty, None), Direction::South);
    assert_eq!(
        arbiter.select_direction(now, &empty, Some(Direction::East)),
        Direction::North
    );
}

#[test]
fn test_excluded_direction_never_selected() {
    let arbiter = new_arbiter();
    let counts = PerDirection([9, 0, 0, 0]);
    let picked = arbiter.select_direction(1.0, &counts, Some(Direction::North));
    assert_ne!(picked, Direction::North, "excluded direction was granted green");
    assert_eq!(picked, Direction::East);
}

#[test]
fn test_excluded_busiest_falls_back_to_first_other_direction() {
    let arbiter = new_arbiter();
    // North still sets the maximum, so South's smaller queue is not a tie
    let counts = PerDirection([9, 0, 2, 0]);
    assert_eq!(
        arbiter.select_direction(1.0, &counts, Some(Direction::North)),
        Direction::East,
        "the busiest count must be taken over every direction"
    );

    // Another direction sharing the maximum still wins
    let counts = PerDirection([9, 0, 9, 0]);
    assert_eq!(
        arbiter.select_direction(1.0, &counts, Some(Direction::North)),
        Direction::South,
        "a non-excluded direction at the maximum should be chosen"
    );
}

#[test]
fn test_starving_direction_largest_queue_policy() {
    let arbiter = new_arbiter();
    // Everyone is starving at 30s; the biggest queue goes first
    let counts = PerDirection([1, 2, 7, 0]);
    assert_eq!(arbiter.select_direction(30.0, &counts, None), Direction::South);

    let mut arbiter = new_arbiter();
    let granted = drive_to_green(&mut arbiter, 0.0, Direction::East);
    let now = granted + STARVE_TIME - 1.0;
    // Only N, S and W are starving; E's large queue is ignored
    let counts = PerDirection([0, 9, 3, 1]);
    assert_eq!(arbiter.select_direction(now, &counts, None), Direction::South);
}

#[test]
fn test_starving_direction_longest_starved_policy() {
    let config = SimConfig {
        starvation_policy: StarvationPolicy::LongestStarved,
        ..SimConfig::quiet()
    };
    let mut longest = SignalArbiter::new(&config, 0.0);
    let mut largest = new_arbiter();
    drive_to_green(&mut longest, 0.0, Direction::East);
    drive_to_green(&mut largest, 0.0, Direction::East);

    // All four are starving; East was served most recently
    let counts = PerDirection([0, 9, 3, 1]);
    assert_eq!(largest.select_direction(40.0, &counts, None), Direction::East);
    assert_eq!(longest.select_direction(40.0, &counts, None), Direction::South);
}

#[test]
fn test_emergency_preempts_within_one_tick() {
    let mut arbiter = new_arbiter();
    let granted = drive_to_green(&mut arbiter, 0.0, Direction::East);

    let now = granted + DT;
    arbiter.evaluate(now, &inputs([3, 3, 0, 0], true, Some(Direction::North)));
    assert_eq!(arbiter.phase(), SignalPhase::Green);
    assert_eq!(arbiter.active_direction(), Some(Direction::North));
    assert!(arbiter.emergency_active());
    assert_eq!(arbiter.last_served(Direction::North), now);
}

#[test]
fn test_emergency_preempts_during_handshake() {
    let mut arbiter = new_arbiter();
    let blocked = inputs([0, 2, 0, 0], false, None);
    arbiter.evaluate(5.0, &blocked);
    arbiter.evaluate(5.25, &blocked);
    assert_eq!(arbiter.phase(), SignalPhase::AwaitClearance);

    arbiter.evaluate(5.5, &inputs([0, 2, 0, 0], false, Some(Direction::West)));
    assert_eq!(arbiter.active_direction(), Some(Direction::West));
    assert_eq!(arbiter.switch_requested_at(), None);
    assert_eq!(arbiter.clearance_wait_started_at(), None);
}

#[test]
fn test_emergency_suppresses_green_timers() {
    let mut arbiter = new_arbiter();
    assert!(arbiter.preempt(Direction::North, 0.0));
    assert!(!arbiter.preempt(Direction::North, 0.5), "repeat preempt must be a no-op");

    let busy_east = inputs([0, 10, 0, 0], true, Some(Direction::North));
    for k in 1..=400 {
        let now = k as f32 * DT;
        arbiter.evaluate(now, &busy_east);
        assert_eq!(arbiter.active_direction(), Some(Direction::North));
    }
}

#[test]
fn test_emergency_direction_follows_nearest() {
    let mut arbiter = new_arbiter();
    arbiter.preempt(Direction::North, 1.0);
    arbiter.evaluate(2.0, &inputs([0; 4], true, Some(Direction::South)));
    assert_eq!(arbiter.active_direction(), Some(Direction::South));
    assert_eq!(arbiter.emergency_direction(), Some(Direction::South));
}

#[test]
fn test_post_emergency_switches_away() {
    let mut arbiter = new_arbiter();
    arbiter.preempt(Direction::North, 1.0);

    let mut now = 1.0;
    while now < 3.0 {
        now += DT;
        arbiter.evaluate(now, &inputs([3, 0, 0, 0], true, Some(Direction::North)));
    }

    now += DT;
    arbiter.evaluate(now, &inputs([3, 0, 0, 0], true, None));
    assert!(!arbiter.emergency_active());
    assert_eq!(arbiter.phase(), SignalPhase::RequestSwitch);
    assert_eq!(arbiter.last_served(Direction::North), now);

    let mut phases = vec![arbiter.phase()];
    for _ in 0..20 {
        now += DT;
        arbiter.evaluate(now, &inputs([3, 0, 0, 0], true, None));
        if phases.last() != Some(&arbiter.phase()) {
            phases.push(arbiter.phase());
        }
        if arbiter.phase() == SignalPhase::Green {
            break;
        }
    }

    assert_eq!(
        phases,
        vec![
            SignalPhase::RequestSwitch,
            SignalPhase::AwaitClearance,
            SignalPhase::SwitchDelay,
            SignalPhase::Green,
        ]
    );
    let active = arbiter.active_direction();
    assert!(active.is_some());
    assert_ne!(active, Some(Direction::North), "emergency direction kept green");
}

#[test]
fn test_starvation_bound_under_skewed_demand() {
    let mut arbiter = new_arbiter();
    let skewed = inputs([10, 1, 1, 1], true, None);
    let bound = STARVE_TIME + MAX_GREEN + SWITCH_DELAY_SECONDS + 1.0;

    for k in 1..=2400 {
        let now = k as f32 * DT;
        arbiter.evaluate(now, &skewed);
        for direction in Direction::ALL {
            let unserved = now - arbiter.last_served(direction);
            assert!(
                unserved <= bound,
                "{} unserved for {}s at {}s",
                direction,
                unserved,
                now
            );
        }
    }

    for direction in Direction::ALL {
        assert!(arbiter.last_served(direction) > 0.0, "{} never served", direction);
    }
    let (_, longest) = arbiter.longest_unserved(600.0);
    assert!(longest <= bound);
}
