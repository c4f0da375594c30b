use super::error::{BenchmarkError, Result};
use super::key_arrangement::KeyArrangement;
use crate::queue::PriorityQueue;

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Barrier;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workload {
    /// Every thread alternates enqueue and dequeue until the deadline.
    Timed,
    /// A fixed key set split between threads; each key is enqueued and followed by a dequeue.
    Uniform,
    /// A fixed key set split between threads; each thread enqueues its share, then dequeues as
    /// many entries.
    EnqueueDequeue,
}

impl FromStr for Workload {
    type Err = BenchmarkError;

    fn from_str(s: &str) -> Result<Workload> {
        match s {
            "timed" => Ok(Workload::Timed),
            "uniform" => Ok(Workload::Uniform),
            "enqueue-dequeue" => Ok(Workload::EnqueueDequeue),
            _ => Err(BenchmarkError::InvalidArgument("workload", s.to_string())),
        }
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Workload::Timed => "timed",
            Workload::Uniform => "uniform",
            Workload::EnqueueDequeue => "enqueue-dequeue",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub operations: u64,
    pub elapsed: Duration,
}

impl Measurement {
    /// Operations per second.
    pub fn throughput(&self) -> f64 {
        let seconds = self.elapsed.as_secs_f64();
        if seconds == 0.0 {
            0.0
        } else {
            self.operations as f64 / seconds
        }
    }
}

/// Runs `worker` on `threads` scoped threads released together, and sums the operation counts they
/// return. `on_start` runs on the calling thread once the workers are released and decides when
/// the measurement ends.
fn run_workers<W, S>(threads: usize, worker: W, on_start: S) -> Result<Measurement>
where
    W: Fn(usize) -> u64 + Sync,
    S: FnOnce(),
{
    let barrier = Barrier::new(threads + 1);

    crossbeam::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|index| {
                let barrier = &barrier;
                let worker = &worker;
                scope.spawn(move |_| {
                    barrier.wait();
                    worker(index)
                })
            })
            .collect();

        barrier.wait();
        let start = Instant::now();
        on_start();

        let mut operations = 0;
        for handle in handles {
            operations += handle.join().map_err(|_| BenchmarkError::WorkerPanicked)?;
        }
        Ok(Measurement {
            operations,
            elapsed: start.elapsed(),
        })
    })
    .map_err(|_| BenchmarkError::WorkerPanicked)?
}

fn chunk_size(len: usize, threads: usize) -> usize {
    ((len + threads - 1) / threads).max(1)
}

/// Alternates enqueue and try_dequeue on every thread for `duration`.
pub fn run_timed(
    queue: &dyn PriorityQueue<i64, i64>,
    keys: &dyn KeyArrangement,
    threads: usize,
    duration: Duration,
) -> Result<Measurement> {
    let stop = AtomicBool::new(false);

    run_workers(
        threads,
        |_| {
            let mut operations = 0;
            while !stop.load(Ordering::Relaxed) {
                let key = keys.next_key();
                queue.enqueue(key, key);
                queue.try_dequeue();
                operations += 2;
            }
            operations
        },
        || {
            thread::sleep(duration);
            stop.store(true, Ordering::Relaxed);
        },
    )
}

pub fn run_fixed(
    queue: &dyn PriorityQueue<i64, i64>,
    workload: Workload,
    keys: &[i64],
    threads: usize,
) -> Result<Measurement> {
    let chunks: Vec<&[i64]> = keys.chunks(chunk_size(keys.len(), threads)).collect();

    run_workers(
        threads,
        |index| {
            let chunk = match chunks.get(index) {
                Some(chunk) => *chunk,
                None => return 0,
            };

            match workload {
                Workload::EnqueueDequeue => {
                    for key in chunk {
                        queue.enqueue(*key, *key);
                    }
                    for _ in chunk {
                        queue.try_dequeue();
                    }
                }
                _ => {
                    for key in chunk {
                        queue.enqueue(*key, *key);
                        queue.try_dequeue();
                    }
                }
            }
            chunk.len() as u64 * 2
        },
        || {},
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::key_arrangement::{Ascending, KeyOrder};
    use crate::queue::locking::LockingPriorityQueue;
    use cpq_skiplist::ConcurrentPriorityQueue;

    #[test]
    fn chunks_cover_every_key() {
        assert_eq!(chunk_size(10, 4), 3);
        assert_eq!(chunk_size(8, 4), 2);
        assert_eq!(chunk_size(0, 4), 1);
    }

    #[test]
    fn fixed_workloads_count_operations() {
        let keys = KeyOrder::Uniform.generate(1000, 1);

        for workload in [Workload::Uniform, Workload::EnqueueDequeue].iter() {
            let queue: ConcurrentPriorityQueue<i64, i64> = ConcurrentPriorityQueue::new();
            let measurement = run_fixed(&queue, *workload, &keys, 4).unwrap();
            assert_eq!(measurement.operations, 2000);
        }
    }

    #[test]
    fn more_threads_than_keys() {
        let queue: LockingPriorityQueue<i64, i64> = LockingPriorityQueue::new();
        let measurement = run_fixed(&queue, Workload::Uniform, &[3, 1, 2], 8).unwrap();
        assert_eq!(measurement.operations, 6);
        assert!(queue.is_empty());
    }

    #[test]
    fn timed_workload_stops() {
        let queue: ConcurrentPriorityQueue<i64, i64> = ConcurrentPriorityQueue::new();
        let keys = Ascending::new(0);
        let measurement = run_timed(&queue, &keys, 2, Duration::from_millis(50)).unwrap();

        assert!(measurement.operations > 0);
        assert_eq!(measurement.operations % 2, 0);
        assert!(measurement.elapsed >= Duration::from_millis(50));
        assert!(measurement.throughput() > 0.0);
    }

    #[test]
    fn parse_and_display() {
        for workload in [Workload::Timed, Workload::Uniform, Workload::EnqueueDequeue].iter() {
            assert_eq!(workload.to_string().parse::<Workload>().unwrap(), *workload);
        }
        assert!("bursty".parse::<Workload>().is_err());
    }
}
