//! Growable body buffer with an explicit growth policy.
//!
//! Capacity starts at an initial size and doubles until `len + chunk + 1` fits,
//! never exceeding the maximum. The extra byte keeps room for a terminator, so
//! `len < capacity` holds until the buffer is filled to exactly the maximum.
//! Appending past the maximum is refused and leaves the buffer untouched.

use crate::protocol::HandlerError;
use tracing::trace;

/// Initial capacity of every body buffer.
pub const INITIAL_BUFFER_SIZE: usize = 4096;

#[derive(Debug)]
pub struct GrowableBuffer {
    data: Vec<u8>,
    /// Capacity granted by the growth policy; the vector may hold more.
    capacity: usize,
    max_capacity: usize,
}

impl GrowableBuffer {
    /// Allocates `initial` bytes up front.
    pub fn with_limits(initial: usize, max_capacity: usize) -> Result<Self, HandlerError> {
        let capacity = initial.min(max_capacity);
        let mut data = Vec::new();
        data.try_reserve_exact(capacity).map_err(|_e| HandlerError::alloc_failed(capacity))?;
        Ok(Self { data, capacity, max_capacity })
    }

    pub fn append(&mut self, chunk: &[u8]) -> Result<(), HandlerError> {
        let len = self.data.len();
        if len + chunk.len() > self.max_capacity {
            return Err(HandlerError::too_large(self.max_capacity));
        }

        let needed = len + chunk.len() + 1;
        if needed > self.capacity {
            let new_capacity = grown_capacity(self.capacity, needed, self.max_capacity);
            self.data.try_reserve_exact(new_capacity - len).map_err(|_e| HandlerError::alloc_failed(new_capacity))?;
            trace!(from = self.capacity, to = new_capacity, "grow body buffer");
            self.capacity = new_capacity;
        }

        self.data.extend_from_slice(chunk);
        Ok(())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }
}

fn grown_capacity(current: usize, needed: usize, max_capacity: usize) -> usize {
    let mut capacity = current.max(1) * 2;
    while capacity < needed {
        capacity *= 2;
    }
    capacity.min(max_capacity)
}
