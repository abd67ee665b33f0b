//! Minimal epoch-based measurement harness.

use std::time::{Duration, Instant};

/// Runs a routine over several epochs and reports the median per-iteration
/// wall time. One warm-up call makes the initial allocations so that scratch
/// reuse, not allocation, is what gets measured.
#[derive(Clone, Copy, Debug)]
pub struct Bench {
    pub epochs: usize,
    pub min_epoch_time: Duration,
    pub max_epoch_time: Duration,
    pub warmup: usize,
}

impl Default for Bench {
    fn default() -> Self {
        Self {
            epochs: 15,
            min_epoch_time: Duration::from_millis(5),
            max_epoch_time: Duration::from_millis(500),
            warmup: 1,
        }
    }
}

impl Bench {
    /// Median elapsed time per iteration, in fractional milliseconds.
    pub fn measure(&self, mut routine: impl FnMut()) -> f64 {
        for _ in 0..self.warmup {
            routine();
        }

        let mut epoch_times = Vec::with_capacity(self.epochs);
        for _ in 0..self.epochs {
            let started = Instant::now();
            let mut iterations = 0u64;
            loop {
                routine();
                iterations += 1;
                let elapsed = started.elapsed();
                if elapsed >= self.min_epoch_time || elapsed >= self.max_epoch_time {
                    break;
                }
            }
            epoch_times.push(started.elapsed().as_secs_f64() * 1e3 / iterations as f64);
        }

        epoch_times.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap());
        let middle = epoch_times.len() / 2;
        if epoch_times.len() % 2 == 1 {
            epoch_times[middle]
        } else {
            (epoch_times[middle - 1] + epoch_times[middle]) / 2.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measures_a_cheap_routine() {
        let bench = Bench {
            epochs: 3,
            min_epoch_time: Duration::from_micros(200),
            max_epoch_time: Duration::from_millis(5),
            warmup: 1,
        };
        let mut calls = 0u64;
        let median = bench.measure(|| calls += 1);
        assert!(median >= 0.0);
        // The warm-up plus at least one iteration per epoch.
        assert!(calls >= 4);
    }

    #[test]
    fn slow_routines_run_once_per_epoch() {
        let bench = Bench {
            epochs: 2,
            min_epoch_time: Duration::from_micros(1),
            max_epoch_time: Duration::from_micros(2),
            warmup: 0,
        };
        let mut calls = 0u64;
        let median = bench.measure(|| {
            calls += 1;
            std::thread::sleep(Duration::from_millis(1));
        });
        assert_eq!(calls, 2);
        assert!(median >= 1.0);
    }
}
