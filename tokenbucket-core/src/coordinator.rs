// tokenbucket-core/src/coordinator.rs
//! The bucket coordinator: the only owner of the token count.
//!
//! A single Tokio task selects over the refill ticker, the request mailbox and
//! the shutdown token, handling one event at a time. Because nothing else ever
//! touches `count`, `0 <= count <= capacity` holds without a lock.

use log::{debug, info, trace, warn};
use std::collections::VecDeque;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::RefillSchedule;

/// Messages a `TokenBucket` handle can send to the coordinator.
#[derive(Debug)]
pub(crate) enum Command {
    /// Fail-fast acquisition: answered immediately with a grant decision.
    Acquire { count: u64, reply: oneshot::Sender<bool> },
    /// Queued acquisition: answered once `count` tokens have been taken.
    Wait { count: u64, reply: oneshot::Sender<()> },
    /// Snapshot of the current count.
    Available { reply: oneshot::Sender<u64> },
}

#[derive(Debug)]
struct Waiter {
    count: u64,
    reply: oneshot::Sender<()>,
}

#[derive(Debug)]
pub(crate) struct Coordinator {
    capacity: u64,
    count: u64,
    schedule: RefillSchedule,
    waiters: VecDeque<Waiter>,
}

impl Coordinator {
    /// A coordinator for a full bucket.
    pub(crate) fn new(capacity: u64, schedule: RefillSchedule) -> Self {
        Self {
            capacity,
            count: capacity,
            schedule,
            waiters: VecDeque::new(),
        }
    }

    pub(crate) fn spawn(
        self,
        runtime: &Handle,
        rx: mpsc::Receiver<Command>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        runtime.spawn(self.run(rx, shutdown))
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Command>, shutdown: CancellationToken) {
        let period = self.schedule.period;
        // First refill one full period after creation; the bucket starts full.
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        debug!(
            "Token bucket coordinator started: capacity={}, period={:?}, increment={}",
            self.capacity, period, self.schedule.increment
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Token bucket shut down with {} tokens left.", self.count);
                    break;
                }
                _ = ticker.tick() => self.refill(),
                command = rx.recv() => match command {
                    Some(command) => self.handle(command),
                    None => {
                        debug!("All token bucket handles dropped; coordinator exiting.");
                        break;
                    }
                },
            }
        }

        // Anything still queued is answered with a dropped sender.
        rx.close();
        self.waiters.clear();
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Acquire { count, reply } => {
                let granted = self.try_take(count);
                trace!("acquire({}) -> {} ({} left)", count, granted, self.count);
                if reply.send(granted).is_err() && granted {
                    warn!("Caller dropped before receiving {} granted tokens; refunding.", count);
                    self.refund(count);
                }
            }
            Command::Wait { count, reply } => {
                if self.waiters.is_empty() && self.try_take(count) {
                    trace!("wait({}) granted immediately ({} left)", count, self.count);
                    if reply.send(()).is_err() {
                        self.refund(count);
                    }
                } else if !reply.is_closed() {
                    trace!("wait({}) queued behind {} waiters", count, self.waiters.len());
                    self.waiters.push_back(Waiter { count, reply });
                }
            }
            Command::Available { reply } => {
                let _ = reply.send(self.count);
            }
        }
    }

    fn refill(&mut self) {
        self.count = self
            .count
            .saturating_add(self.schedule.increment)
            .min(self.capacity);
        trace!("tick: {} tokens available", self.count);
        self.serve_waiters();
    }

    /// Grants queued waiters in arrival order while the front one fits.
    fn serve_waiters(&mut self) {
        while let Some(front) = self.waiters.front() {
            if front.reply.is_closed() {
                self.waiters.pop_front();
                continue;
            }
            if front.count > self.count {
                break;
            }
            if let Some(waiter) = self.waiters.pop_front() {
                self.count -= waiter.count;
                if waiter.reply.send(()).is_err() {
                    self.refund(waiter.count);
                }
            }
        }
    }

    fn try_take(&mut self, count: u64) -> bool {
        if self.count >= count {
            self.count -= count;
            true
        } else {
            false
        }
    }

    fn refund(&mut self, count: u64) {
        self.count = self.count.saturating_add(count).min(self.capacity);
    }
}
