use std::time::Duration;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use log::info;

use intersection_sim::simulation::{
    DetectorHandle, RandomSiren, SimConfig, SimWorld, SirenDetector, StarvationPolicy,
};

#[derive(Parser)]
#[command(name = "intersection_sim")]
#[command(about = "Four-way intersection with an adaptive, emergency-aware signal arbiter")]
struct Cli {
    /// Number of simulation ticks to run
    #[arg(long, default_value = "3600")]
    ticks: u32,

    /// Time delta per tick in seconds
    #[arg(long, default_value = "0.0166667")]
    delta: f32,

    /// Seed for reproducible traffic
    #[arg(long)]
    seed: Option<u64>,

    /// Seconds of simulated time between printed summaries (0 disables)
    #[arg(long, default_value = "10.0")]
    report_every: f32,

    /// Draw the terminal map with each summary
    #[arg(long)]
    map: bool,

    /// Sleep between ticks so simulated time tracks wall-clock time
    #[arg(long)]
    realtime: bool,

    /// Vehicles to place before the first tick (one per free spawn edge)
    #[arg(long, default_value = "0")]
    prespawn: usize,

    #[arg(long, default_value_t = intersection_sim::simulation::MIN_GREEN)]
    min_green: f32,

    #[arg(long, default_value_t = intersection_sim::simulation::MAX_GREEN)]
    max_green: f32,

    #[arg(long, default_value_t = intersection_sim::simulation::STARVE_TIME)]
    starve_time: f32,

    #[arg(long, default_value_t = intersection_sim::simulation::SAFE_DISTANCE)]
    safe_distance: f32,

    #[arg(long, default_value_t = intersection_sim::simulation::SWITCH_DELAY_SECONDS)]
    switch_delay: f32,

    /// Spawn denominator for ordinary vehicles (0 disables random spawning)
    #[arg(long, default_value_t = intersection_sim::simulation::SPAWN_CHANCE)]
    spawn_chance: u32,

    /// Spawn denominator for random emergency vehicles (0 disables)
    #[arg(long, default_value = "0")]
    emergency_chance: u32,

    /// Serve the longest-starved direction first instead of the busiest
    #[arg(long)]
    longest_starved: bool,

    /// Simulated time (seconds) at which to issue a manual emergency command
    #[arg(long = "emergency-at")]
    emergency_at: Vec<f32>,

    /// Per-poll probability of the simulated siren detector firing
    #[arg(long)]
    siren_rate: Option<f64>,

    /// Siren detector poll interval in milliseconds
    #[arg(long, default_value = "100")]
    siren_poll_ms: u64,

    /// Minimum seconds between siren triggers
    #[arg(long, default_value_t = intersection_sim::simulation::SIREN_COOLDOWN_SECONDS)]
    siren_cooldown: f32,
}

impl Cli {
    fn config(&self) -> SimConfig {
        SimConfig {
            min_green: self.min_green,
            max_green: self.max_green,
            starve_time: self.starve_time,
            safe_distance: self.safe_distance,
            switch_delay: self.switch_delay,
            spawn_chance: (self.spawn_chance > 0).then_some(self.spawn_chance),
            emergency_spawn_chance: (self.emergency_chance > 0).then_some(self.emergency_chance),
            starvation_policy: if self.longest_starved {
                StarvationPolicy::LongestStarved
            } else {
                StarvationPolicy::LargestQueue
            },
            ..SimConfig::default()
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn,intersection_sim=info"),
    )
    .init();

    let cli = Cli::parse();
    run_headless(&cli)
}

/// Run the simulation in headless mode (no graphics)
fn run_headless(cli: &Cli) -> Result<()> {
    ensure!(
        cli.delta.is_finite() && cli.delta > 0.0,
        "--delta must be positive"
    );

    let config = cli.config();
    let mut world = match cli.seed {
        Some(seed) => SimWorld::new_with_seed(config, seed)?,
        None => SimWorld::new(config)?,
    };

    let tick_sleep = cli
        .realtime
        .then(|| Duration::try_from_secs_f32(cli.delta))
        .transpose()
        .context("--delta is too large for --realtime")?;

    if cli.prespawn > 0 {
        let placed = world.prespawn(cli.prespawn);
        info!("Prespawned {} vehicles", placed);
    }

    let detector = start_detector(cli, &mut world)?;

    println!("Running intersection simulation in headless mode...");
    println!("Ticks: {}, Delta: {}s", cli.ticks, cli.delta);
    println!();

    let mut manual_emergencies = cli.emergency_at.clone();
    manual_emergencies.sort_by(f32::total_cmp);
    let mut manual_emergencies = manual_emergencies.into_iter().peekable();

    let mut next_report = cli.report_every;
    for tick in 1..=cli.ticks {
        let now = tick as f32 * cli.delta;

        while manual_emergencies.next_if(|&at| at <= now).is_some() {
            world.request_emergency(None);
        }

        world.tick(now);

        if cli.report_every > 0.0 && now >= next_report {
            next_report += cli.report_every;
            println!("--- After tick {} ({:.1}s simulated time) ---", tick, now);
            world.print_summary();
            if cli.map {
                world.draw_map();
            }
            println!();
        }

        if let Some(pause) = tick_sleep {
            std::thread::sleep(pause);
        }
    }

    if let Some(detector) = detector {
        detector.stop().context("Failed to stop siren detector")?;
    }

    println!("=== Final State ===");
    world.print_summary();
    if cli.map {
        world.draw_map();
    }

    let metrics = world.metrics.snapshot(world.time);
    let (starved, waited) = world.arbiter.longest_unserved(world.time);
    info!("=== SIMULATION COMPLETE ===");
    info!("Elapsed time: {:.2}s", world.time);
    info!("Total vehicles spawned: {}", metrics.vehicles_spawned);
    info!("Throughput (total): {}", metrics.throughput);
    info!("Throughput (per min): {:.2}", metrics.throughput_per_minute);
    info!("Average wait: {:.2}s", metrics.average_wait);
    info!("Vehicles on road: {}", world.vehicles.len());
    info!("Longest unserved: {} for {:.1}s", starved, waited);

    Ok(())
}

fn start_detector(cli: &Cli, world: &mut SimWorld) -> Result<Option<DetectorHandle>> {
    let Some(rate) = cli.siren_rate else {
        return Ok(None);
    };
    ensure!(
        (0.0..=1.0).contains(&rate),
        "--siren-rate must be within [0, 1]"
    );
    ensure!(
        cli.siren_cooldown.is_finite() && cli.siren_cooldown >= 0.0,
        "--siren-cooldown must be non-negative"
    );

    let cooldown = Duration::try_from_secs_f32(cli.siren_cooldown)
        .context("--siren-cooldown is out of range")?;
    let detector = SirenDetector {
        poll_interval: Duration::from_millis(cli.siren_poll_ms.max(1)),
        cooldown,
    };
    let source = RandomSiren::new(rate, None, cli.seed);
    let handle = detector.spawn(source, world.emergency_mailbox())?;
    Ok(Some(handle))
}
