use crate::token::CodeGenerator;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RotationSnapshot {
    pub token: String,
    pub remaining: u32,
    pub period: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Countdown { remaining: u32 },
    Rotated { token: String },
}

/// Countdown that swaps the advertised token every `period` ticks.
#[derive(Debug)]
pub struct RotationTimer {
    generator: CodeGenerator,
    period: u32,
    remaining: u32,
    token: String,
}

impl RotationTimer {
    pub fn new(generator: CodeGenerator, period: u32) -> Self {
        let period = period.max(1);
        let token = generator.generate();
        Self {
            generator,
            period,
            remaining: period,
            token,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    pub fn snapshot(&self) -> RotationSnapshot {
        RotationSnapshot {
            token: self.token.clone(),
            remaining: self.remaining,
            period: self.period,
        }
    }

    pub fn tick(&mut self) -> TickOutcome {
        if self.remaining <= 1 {
            self.token = self.generator.generate();
            self.remaining = self.period;
            debug!(token = %self.token, "scan token rotated");
            TickOutcome::Rotated {
                token: self.token.clone(),
            }
        } else {
            self.remaining -= 1;
            TickOutcome::Countdown {
                remaining: self.remaining,
            }
        }
    }

    /// Drives `tick` every `every` on the current runtime. The task ends
    /// when the returned handle is dropped.
    pub fn spawn(mut self, every: Duration) -> RotationHandle {
        let (tx, rx) = watch::channel(self.snapshot());
        info!(
            "Reception rotating scan token every {} ticks of {:?}",
            self.period, every
        );
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;
            loop {
                interval.tick().await;
                self.tick();
                if tx.send(self.snapshot()).is_err() {
                    break;
                }
            }
        });
        RotationHandle { rx, task }
    }
}

pub struct RotationHandle {
    rx: watch::Receiver<RotationSnapshot>,
    task: JoinHandle<()>,
}

impl RotationHandle {
    pub fn current(&self) -> RotationSnapshot {
        self.rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RotationSnapshot> {
        self.rx.clone()
    }

    /// Waits for the next published snapshot.
    pub async fn changed(&mut self) -> Option<RotationSnapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

impl Drop for RotationHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_ticks_rotate_and_reset() {
        let mut timer = RotationTimer::new(CodeGenerator::default(), 15);
        let first = timer.token().to_string();
        assert_eq!(timer.remaining(), 15);

        for _ in 0..14 {
            assert!(matches!(timer.tick(), TickOutcome::Countdown { .. }));
            assert_eq!(timer.token(), first);
        }
        assert_eq!(timer.remaining(), 1);

        match timer.tick() {
            TickOutcome::Rotated { token } => assert_ne!(token, first),
            other => panic!("expected rotation, got {other:?}"),
        }
        assert_eq!(timer.remaining(), 15);
    }

    #[test]
    fn zero_period_is_clamped() {
        let mut timer = RotationTimer::new(CodeGenerator::default(), 0);
        let first = timer.token().to_string();
        assert!(matches!(timer.tick(), TickOutcome::Rotated { .. }));
        assert_ne!(timer.token(), first);
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_timer_publishes_and_stops_on_drop() {
        let timer = RotationTimer::new(CodeGenerator::default(), 3);
        let initial = timer.token().to_string();
        let mut handle = timer.spawn(Duration::from_secs(1));

        let snap = handle.changed().await.unwrap();
        assert_eq!(snap.remaining, 2);
        assert_eq!(snap.token, initial);

        handle.changed().await.unwrap();
        let rotated = handle.changed().await.unwrap();
        assert_eq!(rotated.remaining, 3);
        assert_ne!(rotated.token, initial);

        let mut rx = handle.subscribe();
        rx.borrow_and_update();
        drop(handle);
        assert!(rx.changed().await.is_err());
    }
}
