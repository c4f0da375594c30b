#[macro_use]
extern crate quick_error;
#[macro_use]
extern crate log;

pub mod benchmark;
mod queue;

pub use cpq_skiplist::{
    Comparator, ConcurrentPriorityQueue, Entries, NaturalOrder, QueueBuilder, QueueError,
    DEFAULT_DELETE_THRESHOLD, DEFAULT_HEIGHT,
};
pub use queue::locking::LockingPriorityQueue;
pub use queue::PriorityQueue;
