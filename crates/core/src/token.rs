//! Scan tokens and time-derived ids.

use chrono::Utc;
use rand::Rng;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 6;

/// Wall-clock milliseconds that never repeat or go backwards.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: AtomicI64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_millis(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut prev = self.last.load(Ordering::SeqCst);
        loop {
            let next = now.max(prev + 1);
            match self
                .last
                .compare_exchange(prev, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }

    pub fn next_id(&self) -> String {
        self.next_millis().to_string()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CodeGenerator {
    clock: Arc<MonotonicClock>,
}

impl CodeGenerator {
    pub fn new(clock: Arc<MonotonicClock>) -> Self {
        Self { clock }
    }

    /// `<millis>-<base36 suffix>`, URL-safe.
    pub fn generate(&self) -> String {
        let ts = self.clock.next_millis();
        let mut rng = rand::thread_rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        format!("{ts}-{suffix}")
    }
}
