use crossbeam::queue::SegQueue;
use std::ops::{Deref, DerefMut};
use std::ptr;

/// A fixed length array of node pointers. Null slots are meaningful to the caller.
pub struct Buffer<T> {
    slots: Box<[*const T]>,
}

// A buffer only carries addresses between operations; it never dereferences them.
unsafe impl<T> Send for Buffer<T> {}

impl<T> Buffer<T> {
    fn new(len: usize) -> Buffer<T> {
        Buffer {
            slots: vec![ptr::null(); len].into_boxed_slice(),
        }
    }

    fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = ptr::null();
        }
    }
}

/// Free list of scratch buffers, all of the same length.
pub struct BufferPool<T> {
    free: SegQueue<Buffer<T>>,
    len: usize,
}

/// A buffer on loan from a pool. It is cleared and handed back when dropped.
pub struct PooledBuffer<'a, T> {
    pool: &'a BufferPool<T>,
    buffer: Option<Buffer<T>>,
}

impl<T> BufferPool<T> {
    pub fn new(len: usize) -> BufferPool<T> {
        BufferPool {
            free: SegQueue::new(),
            len,
        }
    }

    pub fn rent(&self) -> PooledBuffer<'_, T> {
        let buffer = self.free.pop().ok().unwrap_or_else(|| Buffer::new(self.len));
        PooledBuffer {
            pool: self,
            buffer: Some(buffer),
        }
    }

    #[cfg(test)]
    pub fn available(&self) -> usize {
        self.free.len()
    }
}

impl<T> Deref for PooledBuffer<'_, T> {
    type Target = [*const T];

    fn deref(&self) -> &[*const T] {
        match &self.buffer {
            Some(buffer) => &buffer.slots,
            None => &[],
        }
    }
}

impl<T> DerefMut for PooledBuffer<'_, T> {
    fn deref_mut(&mut self) -> &mut [*const T] {
        match &mut self.buffer {
            Some(buffer) => &mut buffer.slots,
            None => &mut [],
        }
    }
}

impl<T> Drop for PooledBuffer<'_, T> {
    fn drop(&mut self) {
        if let Some(mut buffer) = self.buffer.take() {
            buffer.clear();
            self.pool.free.push(buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BufferPool;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn rented_buffers_have_pool_length() {
        let pool: BufferPool<u64> = BufferPool::new(7);
        let buffer = pool.rent();
        assert_eq!(buffer.len(), 7);
        assert!(buffer.iter().all(|slot| slot.is_null()));
    }

    #[test]
    fn buffers_come_back_cleared() {
        let pool: BufferPool<u64> = BufferPool::new(4);
        let value = 42u64;
        {
            let mut buffer = pool.rent();
            buffer[2] = &value;
        }
        assert_eq!(pool.available(), 1);

        let buffer = pool.rent();
        assert_eq!(pool.available(), 0);
        assert!(buffer.iter().all(|slot| slot.is_null()));
    }

    #[test]
    fn concurrent_rent_and_return() {
        let pool: Arc<BufferPool<u64>> = Arc::new(BufferPool::new(16));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                thread::spawn(move || {
                    let value = 7u64;
                    for i in 0..1000 {
                        let mut first = pool.rent();
                        let mut second = pool.rent();
                        first[i % 16] = &value;
                        second[(i + 1) % 16] = &value;
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let available = pool.available();
        assert!(available >= 2 && available <= 16);
        let rented: Vec<_> = (0..available).map(|_| pool.rent()).collect();
        assert_eq!(pool.available(), 0);
        for buffer in rented.iter() {
            assert!(buffer.iter().all(|slot| slot.is_null()));
        }
    }
}
