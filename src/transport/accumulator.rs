//! Response body accumulator.
//!
//! Assembles a body of unknown length from partial deliveries. The length
//! always equals the bytes appended so far; capacity grows amortized, so the
//! number of allocations differs from a copy-per-delivery scheme but the
//! bytes never do.

use crate::config::DEFAULT_MAX_RESPONSE_LEN;
use crate::errors::{TransportError, TransportResult};

/// Append-only byte buffer with an overflow-checked size limit.
#[derive(Debug)]
pub struct ResponseAccumulator {
    buf: Vec<u8>,
    limit: usize,
}

impl ResponseAccumulator {
    /// Creates an empty accumulator with the default limit.
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_RESPONSE_LEN)
    }

    /// Creates an empty accumulator holding at most `limit` bytes.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            limit,
        }
    }

    /// Appends a delivery.
    ///
    /// Fails with `OutOfMemory` when the new total would exceed the limit or
    /// cannot be allocated. On failure the accumulated bytes are discarded,
    /// never truncated.
    pub fn append(&mut self, data: &[u8]) -> TransportResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        let total = match checked_total(self.buf.len(), data.len(), self.limit) {
            Some(total) => total,
            None => {
                let current = self.buf.len();
                self.discard();
                return Err(TransportError::out_of_memory(format!(
                    "response of {} + {} bytes exceeds the {} byte limit",
                    current,
                    data.len(),
                    self.limit
                )));
            }
        };

        if let Err(e) = self.buf.try_reserve(data.len()) {
            self.discard();
            return Err(e.into());
        }
        self.buf.extend_from_slice(data);
        debug_assert_eq!(self.buf.len(), total);
        Ok(())
    }

    /// Accumulated bytes.
    pub fn data(&self) -> &[u8] {
        &self.buf
    }

    /// Number of accumulated bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if nothing has been accumulated.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Size limit.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Moves the accumulated bytes out, leaving the accumulator empty.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }

    /// Drops the accumulated bytes and their allocation.
    pub fn discard(&mut self) {
        self.buf = Vec::new();
    }
}

/// New total length, or `None` when it overflows or passes `limit`.
fn checked_total(current: usize, incoming: usize, limit: usize) -> Option<usize> {
    current.checked_add(incoming).filter(|total| *total <= limit)
}

impl Default for ResponseAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
