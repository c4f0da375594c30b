//! A concurrent priority queue built on a skiplist with logical deletion.
//!
//! Enqueue links a node bottom-up: level 0 under the predecessor's lock, upper levels with a plain
//! CAS and on a best effort basis. Dequeue claims the first live node on level 0 by flipping its
//! `deleted` flag under its lock and leaves it in place as a tombstone. When a dequeue has to step
//! over `delete_threshold` tombstones it moves the head past them and trims the upper levels.
//!
//! Memory is reclaimed with crossbeam-epoch. A node counts the links pointing at it. When the last
//! one is gone it drops its own links on the spot, so a chain cut off by a head advance reaches the
//! collector as one batch.

#[macro_use]
extern crate quick_error;
#[macro_use]
extern crate log;

mod buffer_pool;
mod comparator;
mod error;
mod node;
mod queue;
mod skiplist;

pub use comparator::{Comparator, NaturalOrder};
pub use error::{QueueError, Result};
pub use queue::{ConcurrentPriorityQueue, QueueBuilder, DEFAULT_DELETE_THRESHOLD, DEFAULT_HEIGHT};
pub use skiplist::Entries;
