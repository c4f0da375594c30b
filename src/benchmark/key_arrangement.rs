use super::error::BenchmarkError;

use rand::rngs::StdRng;
use rand::{thread_rng, Rng, SeedableRng};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};

/// Hands out keys to worker threads.
pub trait KeyArrangement: Send + Sync {
    fn next_key(&self) -> i64;
}

pub struct Ascending {
    next: AtomicI64,
}

impl Ascending {
    pub fn new(start: i64) -> Ascending {
        Ascending {
            next: AtomicI64::new(start),
        }
    }
}

impl KeyArrangement for Ascending {
    fn next_key(&self) -> i64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

pub struct Descending {
    next: AtomicI64,
}

impl Descending {
    pub fn new(start: i64) -> Descending {
        Descending {
            next: AtomicI64::new(start),
        }
    }
}

impl KeyArrangement for Descending {
    fn next_key(&self) -> i64 {
        self.next.fetch_sub(1, Ordering::Relaxed)
    }
}

/// Keys drawn uniformly from `low..high`.
pub struct Uniform {
    low: i64,
    high: i64,
}

impl Uniform {
    pub fn new(low: i64, high: i64) -> Uniform {
        Uniform { low, high }
    }
}

impl KeyArrangement for Uniform {
    fn next_key(&self) -> i64 {
        thread_rng().gen_range(self.low, self.high)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrder {
    Ascending,
    Descending,
    Uniform,
}

impl KeyOrder {
    /// An endless key source for timed runs.
    pub fn arrangement(self, span: i64) -> Box<dyn KeyArrangement> {
        match self {
            KeyOrder::Ascending => Box::new(Ascending::new(0)),
            KeyOrder::Descending => Box::new(Descending::new(span)),
            KeyOrder::Uniform => Box::new(Uniform::new(0, span.max(1))),
        }
    }

    /// A fixed key set for runs over a known number of operations.
    pub fn generate(self, count: usize, seed: u64) -> Vec<i64> {
        match self {
            KeyOrder::Ascending => (0..count as i64).collect(),
            KeyOrder::Descending => (0..count as i64).rev().collect(),
            KeyOrder::Uniform => {
                let mut rng = StdRng::seed_from_u64(seed);
                (0..count)
                    .map(|_| rng.gen_range(0, count.max(1) as i64))
                    .collect()
            }
        }
    }
}

impl FromStr for KeyOrder {
    type Err = BenchmarkError;

    fn from_str(s: &str) -> Result<KeyOrder, BenchmarkError> {
        match s {
            "ascending" => Ok(KeyOrder::Ascending),
            "descending" => Ok(KeyOrder::Descending),
            "uniform" => Ok(KeyOrder::Uniform),
            _ => Err(BenchmarkError::InvalidArgument("keys", s.to_string())),
        }
    }
}

impl fmt::Display for KeyOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyOrder::Ascending => "ascending",
            KeyOrder::Descending => "descending",
            KeyOrder::Uniform => "uniform",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn ascending_keys_are_unique_across_threads() {
        let keys: Arc<dyn KeyArrangement> = Arc::new(Ascending::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let keys = keys.clone();
                thread::spawn(move || (0..1000).map(|_| keys.next_key()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for key in handle.join().unwrap() {
                assert!(seen.insert(key));
            }
        }
        assert_eq!(seen.len(), 4000);
        assert!(seen.iter().all(|key| *key >= 0 && *key < 4000));
    }

    #[test]
    fn descending_counts_down() {
        let keys = Descending::new(10);
        assert_eq!(keys.next_key(), 10);
        assert_eq!(keys.next_key(), 9);
    }

    #[test]
    fn uniform_stays_in_range() {
        let keys = KeyOrder::Uniform.arrangement(50);
        assert!((0..1000).map(|_| keys.next_key()).all(|key| key >= 0 && key < 50));
    }

    #[test]
    fn generated_sets() {
        assert_eq!(KeyOrder::Ascending.generate(4, 0), vec![0, 1, 2, 3]);
        assert_eq!(KeyOrder::Descending.generate(4, 0), vec![3, 2, 1, 0]);
        assert_eq!(
            KeyOrder::Uniform.generate(100, 7),
            KeyOrder::Uniform.generate(100, 7)
        );
    }

    #[test]
    fn parse_and_display() {
        for order in [KeyOrder::Ascending, KeyOrder::Descending, KeyOrder::Uniform].iter() {
            assert_eq!(order.to_string().parse::<KeyOrder>().unwrap(), *order);
        }
        assert!("sideways".parse::<KeyOrder>().is_err());
    }
}
