//! Measures the skiplist queue against a single-lock heap under the same workload.

pub mod error;
pub mod key_arrangement;
pub mod workload;

pub use error::{BenchmarkError, Result};
pub use key_arrangement::{KeyArrangement, KeyOrder};
pub use workload::{Measurement, Workload};

use crate::queue::locking::LockingPriorityQueue;
use crate::queue::PriorityQueue;
use cpq_skiplist::{ConcurrentPriorityQueue, DEFAULT_DELETE_THRESHOLD, DEFAULT_HEIGHT};
use std::fmt;
use std::time::Duration;

const WARMUP_KEYS: usize = 1000;

pub struct BenchmarkBuilder {
    threads: usize,
    duration: Duration,
    key_order: KeyOrder,
    workload: Workload,
    count: usize,
    height: usize,
    delete_threshold: usize,
    warmup_rounds: usize,
    seed: u64,
}

impl Default for BenchmarkBuilder {
    fn default() -> BenchmarkBuilder {
        BenchmarkBuilder {
            threads: 4,
            duration: Duration::from_secs(5),
            key_order: KeyOrder::Uniform,
            workload: Workload::Timed,
            count: 100_000,
            height: DEFAULT_HEIGHT,
            delete_threshold: DEFAULT_DELETE_THRESHOLD,
            warmup_rounds: 1,
            seed: 0,
        }
    }
}

impl BenchmarkBuilder {
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn key_order(mut self, key_order: KeyOrder) -> Self {
        self.key_order = key_order;
        self
    }

    pub fn workload(mut self, workload: Workload) -> Self {
        self.workload = workload;
        self
    }

    /// Size of the key set for the fixed workloads, and the key span for timed runs.
    pub fn count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn height(mut self, height: usize) -> Self {
        self.height = height;
        self
    }

    pub fn delete_threshold(mut self, delete_threshold: usize) -> Self {
        self.delete_threshold = delete_threshold;
        self
    }

    pub fn warmup_rounds(mut self, warmup_rounds: usize) -> Self {
        self.warmup_rounds = warmup_rounds;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn build(self) -> Result<Benchmark> {
        if self.threads == 0 {
            return Err(BenchmarkError::InvalidArgument("threads", "0".to_string()));
        }
        if self.count == 0 {
            return Err(BenchmarkError::InvalidArgument("count", "0".to_string()));
        }
        if self.workload == Workload::Timed && self.duration == Duration::from_secs(0) {
            return Err(BenchmarkError::InvalidArgument("duration", "0".to_string()));
        }

        // Surface a bad queue configuration before any thread is started.
        ConcurrentPriorityQueue::builder()
            .height(self.height)
            .delete_threshold(self.delete_threshold)
            .build::<i64, i64>()?;

        Ok(Benchmark { config: self })
    }
}

pub struct Benchmark {
    config: BenchmarkBuilder,
}

#[derive(Debug, Clone, Copy)]
pub struct BenchmarkResult {
    pub threads: usize,
    pub workload: Workload,
    pub key_order: KeyOrder,
    pub locking: Measurement,
    pub concurrent: Measurement,
}

impl Benchmark {
    fn concurrent_queue(&self) -> Result<ConcurrentPriorityQueue<i64, i64>> {
        Ok(ConcurrentPriorityQueue::builder()
            .height(self.config.height)
            .delete_threshold(self.config.delete_threshold)
            .build()?)
    }

    fn measure(&self, queue: &dyn PriorityQueue<i64, i64>, keys: &[i64]) -> Result<Measurement> {
        let config = &self.config;
        info!(
            "running {} workload with {} keys on {} queue, {} threads",
            config.workload,
            config.key_order,
            queue.name(),
            config.threads
        );

        match config.workload {
            Workload::Timed => {
                let arrangement = config.key_order.arrangement(config.count as i64);
                workload::run_timed(queue, &*arrangement, config.threads, config.duration)
            }
            workload => workload::run_fixed(queue, workload, keys, config.threads),
        }
    }

    fn warm_up(&self) -> Result<()> {
        let keys = self.config.key_order.generate(WARMUP_KEYS, self.config.seed);
        for round in 0..self.config.warmup_rounds {
            debug!("warm-up round {}", round);
            let locking: LockingPriorityQueue<i64, i64> = LockingPriorityQueue::new();
            workload::run_fixed(&locking, Workload::Uniform, &keys, self.config.threads)?;
            let concurrent = self.concurrent_queue()?;
            workload::run_fixed(&concurrent, Workload::Uniform, &keys, self.config.threads)?;
        }
        Ok(())
    }

    pub fn run(&self) -> Result<BenchmarkResult> {
        self.warm_up()?;

        let keys = match self.config.workload {
            Workload::Timed => Vec::new(),
            _ => self.config.key_order.generate(self.config.count, self.config.seed),
        };

        let locking_queue: LockingPriorityQueue<i64, i64> = LockingPriorityQueue::new();
        let locking = self.measure(&locking_queue, &keys)?;
        let concurrent = self.measure(&self.concurrent_queue()?, &keys)?;

        Ok(BenchmarkResult {
            threads: self.config.threads,
            workload: self.config.workload,
            key_order: self.config.key_order,
            locking,
            concurrent,
        })
    }
}

impl fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} workload, {} keys, {} threads",
            self.workload, self.key_order, self.threads
        )?;
        writeln!(
            f,
            "{:<12}{:>14}{:>14}{:>16}",
            "queue", "operations", "elapsed(ms)", "ops/sec"
        )?;
        for (name, measurement) in [("locking", &self.locking), ("concurrent", &self.concurrent)].iter() {
            writeln!(
                f,
                "{:<12}{:>14}{:>14}{:>16.0}",
                name,
                measurement.operations,
                measurement.elapsed.as_millis(),
                measurement.throughput()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_rejects_bad_arguments() {
        assert!(BenchmarkBuilder::default().threads(0).build().is_err());
        assert!(BenchmarkBuilder::default().count(0).build().is_err());
        assert!(BenchmarkBuilder::default()
            .duration(Duration::from_secs(0))
            .build()
            .is_err());

        match BenchmarkBuilder::default().delete_threshold(1).build() {
            Err(BenchmarkError::Queue(_)) => {}
            _ => panic!("expected a queue configuration error"),
        }
    }

    #[test]
    fn fixed_run_reports_both_queues() {
        let result = BenchmarkBuilder::default()
            .threads(2)
            .workload(Workload::EnqueueDequeue)
            .key_order(KeyOrder::Descending)
            .count(2000)
            .warmup_rounds(0)
            .build()
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(result.locking.operations, 4000);
        assert_eq!(result.concurrent.operations, 4000);

        let report = result.to_string();
        assert!(report.contains("enqueue-dequeue workload, descending keys, 2 threads"));
        assert!(report.contains("locking"));
        assert!(report.contains("concurrent"));
    }

    #[test]
    fn timed_run_with_warmup() {
        let result = BenchmarkBuilder::default()
            .threads(2)
            .duration(Duration::from_millis(20))
            .key_order(KeyOrder::Ascending)
            .count(1000)
            .build()
            .unwrap()
            .run()
            .unwrap();

        assert!(result.locking.operations > 0);
        assert!(result.concurrent.operations > 0);
    }
}
