//! Siren detector worker
//!
//! Runs on its own thread and never touches simulation state: detections are
//! posted as `EmergencyRequest`s into a bounded mailbox that the simulation
//! drains at the start of each tick.

use std::collections::VecDeque;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::config::SIREN_COOLDOWN_SECONDS;
use super::types::Direction;

/// Request to spawn an emergency vehicle and preempt for it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmergencyRequest {
    /// `None` when the siren was heard but not localised
    pub direction: Option<Direction>,
}

/// Something the detector can poll for sirens
pub trait SirenSource: Send {
    /// `Some(direction)` when a siren was detected during this poll
    fn poll(&mut self) -> Option<Option<Direction>>;
}

/// Detects a siren with a fixed probability per poll
pub struct RandomSiren {
    rate: f64,
    direction: Option<Direction>,
    rng: StdRng,
}

impl RandomSiren {
    pub fn new(rate: f64, direction: Option<Direction>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        let rate = if rate.is_finite() {
            rate.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            rate,
            direction,
            rng,
        }
    }
}

impl SirenSource for RandomSiren {
    fn poll(&mut self) -> Option<Option<Direction>> {
        self.rng.random_bool(self.rate).then_some(self.direction)
    }
}

/// Replays a fixed list of polls; `None` entries are silent polls
pub struct ScriptedSiren {
    script: VecDeque<Option<Option<Direction>>>,
}

impl ScriptedSiren {
    pub fn new(script: impl IntoIterator<Item = Option<Option<Direction>>>) -> Self {
        Self {
            script: script.into_iter().collect(),
        }
    }
}

impl SirenSource for ScriptedSiren {
    fn poll(&mut self) -> Option<Option<Direction>> {
        self.script.pop_front().flatten()
    }
}

/// Create the single-slot mailbox between detector and simulation
pub fn emergency_mailbox() -> (Sender<EmergencyRequest>, Receiver<EmergencyRequest>) {
    bounded(1)
}

/// Handle to a running detector thread
pub struct DetectorHandle {
    stop_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl DetectorHandle {
    /// Stop the worker and wait for it to exit. Requests it already posted
    /// stay in the mailbox.
    pub fn stop(mut self) -> Result<()> {
        self.signal_and_join()
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn signal_and_join(&mut self) -> Result<()> {
        // Already-exited workers have dropped their receiver
        let _ = self.stop_tx.try_send(());
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|_| anyhow!("siren detector thread panicked"))?;
        }
        Ok(())
    }
}

impl Drop for DetectorHandle {
    fn drop(&mut self) {
        let _ = self.signal_and_join();
    }
}

/// Detector settings
#[derive(Debug, Clone, Copy)]
pub struct SirenDetector {
    pub poll_interval: Duration,
    pub cooldown: Duration,
}

impl Default for SirenDetector {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            cooldown: Duration::from_secs_f32(SIREN_COOLDOWN_SECONDS),
        }
    }
}

impl SirenDetector {
    /// Start polling `source` on a new thread, posting into `mailbox`
    pub fn spawn<S>(self, mut source: S, mailbox: Sender<EmergencyRequest>) -> Result<DetectorHandle>
    where
        S: SirenSource + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let thread = thread::Builder::new()
            .name("siren-detector".to_string())
            .spawn(move || self.run(&mut source, &mailbox, &stop_rx))?;

        info!(
            "Siren detector started (poll {:?}, cooldown {:?})",
            self.poll_interval, self.cooldown
        );
        Ok(DetectorHandle {
            stop_tx,
            thread: Some(thread),
        })
    }

    fn run(
        &self,
        source: &mut dyn SirenSource,
        mailbox: &Sender<EmergencyRequest>,
        stop_rx: &Receiver<()>,
    ) {
        let mut last_trigger: Option<Instant> = None;

        loop {
            if let Some(direction) = source.poll() {
                let now = Instant::now();
                let cooling_down =
                    last_trigger.is_some_and(|t| now.duration_since(t) < self.cooldown);

                if !cooling_down {
                    last_trigger = Some(now);
                    match mailbox.try_send(EmergencyRequest { direction }) {
                        Ok(()) => debug!("Siren detected, requested emergency ({:?})", direction),
                        Err(TrySendError::Full(_)) => {
                            debug!("Emergency mailbox full, dropping siren detection")
                        }
                        Err(TrySendError::Disconnected(_)) => {
                            info!("Simulation mailbox closed, siren detector exiting");
                            return;
                        }
                    }
                }
            }

            // A stop message or a dropped handle both end the loop
            match stop_rx.recv_timeout(self.poll_interval) {
                Err(RecvTimeoutError::Timeout) => {}
                _ => break,
            }
        }

        info!("Siren detector stopped");
    }
}
