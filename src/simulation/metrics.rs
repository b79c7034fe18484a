//! Wait-time and throughput accounting
//!
//! Fed by vehicle lifecycle events: a finished wait when a vehicle commits
//! (or leaves while still queued), and a throughput tick when a vehicle that
//! crossed the centre line leaves the simulation.

/// Running totals for the whole simulation
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    /// Simulation time the collector started counting from
    pub start_time: f32,

    /// Sum of all finished waits in seconds
    pub total_wait_time: f32,

    /// Number of vehicles whose wait was recorded
    pub served_waits: usize,

    /// Vehicles that crossed the intersection and left
    pub throughput: usize,

    /// Vehicles that made it onto the road
    pub vehicles_spawned: usize,
}

/// Point-in-time copy of the derived metrics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    pub average_wait: f32,
    pub throughput: usize,
    pub throughput_per_minute: f32,
    pub vehicles_spawned: usize,
}

impl MetricsCollector {
    pub fn new(start_time: f32) -> Self {
        Self {
            start_time,
            ..Self::default()
        }
    }

    /// Close out a wait that started at `queued_since`. No-op when the
    /// vehicle was never queued.
    pub fn record_wait(&mut self, queued_since: Option<f32>, now: f32) {
        let Some(since) = queued_since else {
            return;
        };
        self.total_wait_time += (now - since).max(0.0);
        self.served_waits += 1;
    }

    pub fn record_throughput(&mut self) {
        self.throughput += 1;
    }

    pub fn record_spawn(&mut self) {
        self.vehicles_spawned += 1;
    }

    pub fn average_wait(&self) -> f32 {
        if self.served_waits == 0 {
            return 0.0;
        }
        self.total_wait_time / self.served_waits as f32
    }

    pub fn throughput_per_minute(&self, now: f32) -> f32 {
        let elapsed_minutes = (now - self.start_time) / 60.0;
        if elapsed_minutes <= 0.0 {
            return 0.0;
        }
        self.throughput as f32 / elapsed_minutes
    }

    pub fn snapshot(&self, now: f32) -> MetricsSnapshot {
        MetricsSnapshot {
            average_wait: self.average_wait(),
            throughput: self.throughput,
            throughput_per_minute: self.throughput_per_minute(now),
            vehicles_spawned: self.vehicles_spawned,
        }
    }

    /// Get a summary string for display
    pub fn summary(&self, now: f32) -> String {
        format!(
            "Avg wait: {:.2}s | Throughput: {} ({:.2}/min) | Spawned: {}",
            self.average_wait(),
            self.throughput,
            self.throughput_per_minute(now),
            self.vehicles_spawned
        )
    }
}
