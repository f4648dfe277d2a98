use crate::encode::pixel::{PixelBuffer, PixelFormat};
use crate::foundation::core::PixelSize;

/// Limits for a [`PixelBufferPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBufferPoolOpts {
    /// Maximum number of buffers handed out at the same time.
    pub max_buffers: usize,
    /// Upper bound on a single buffer's size in bytes.
    pub max_buffer_bytes: usize,
}

impl Default for PixelBufferPoolOpts {
    fn default() -> Self {
        Self {
            max_buffers: 2,
            // 8K RGBA8.
            max_buffer_bytes: 7680 * 4320 * 4,
        }
    }
}

/// Allocation counters of a pool.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PixelBufferPoolStats {
    /// Buffers currently handed out.
    pub outstanding: usize,
    /// Buffers currently parked for reuse.
    pub retained: usize,
    /// Fresh allocations.
    pub allocated: u64,
    /// Acquisitions served from retained buffers.
    pub reused: u64,
    /// Acquisitions that failed.
    pub failed: u64,
}

/// Why a buffer could not be handed out.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// Every buffer is in flight.
    #[error("pool exhausted ({outstanding} of {max} buffers in flight)")]
    Exhausted {
        /// Buffers in flight.
        outstanding: usize,
        /// Pool limit.
        max: usize,
    },
    /// A buffer of this size exceeds the configured limit.
    #[error("{bytes} byte buffer exceeds the {limit} byte limit")]
    TooLarge {
        /// Requested size.
        bytes: usize,
        /// Configured limit.
        limit: usize,
    },
    /// The allocator refused the request.
    #[error("allocation of {bytes} bytes failed")]
    AllocationFailed {
        /// Requested size.
        bytes: usize,
    },
}

/// Bounded pool of equally sized pixel buffers.
///
/// Sized once, from the first frame of a stream. Buffers must come back through
/// [`PixelBufferPool::release`]; buffers of a different size are dropped on release.
#[derive(Debug)]
pub struct PixelBufferPool {
    size: PixelSize,
    format: PixelFormat,
    opts: PixelBufferPoolOpts,
    free: Vec<PixelBuffer>,
    stats: PixelBufferPoolStats,
}

impl PixelBufferPool {
    /// Create an empty pool for buffers of `size`.
    pub fn new(size: PixelSize, format: PixelFormat, opts: PixelBufferPoolOpts) -> Self {
        Self {
            size,
            format,
            opts,
            free: Vec::new(),
            stats: PixelBufferPoolStats::default(),
        }
    }

    /// Pixel size of every buffer in this pool.
    pub fn size(&self) -> PixelSize {
        self.size
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> PixelBufferPoolStats {
        self.stats.clone()
    }

    fn byte_len(&self) -> usize {
        (self.size.width as usize)
            .saturating_mul(self.size.height as usize)
            .saturating_mul(self.format.bytes_per_pixel())
    }

    /// Hand out a buffer. Contents are unspecified; callers overwrite every pixel.
    pub fn acquire(&mut self) -> Result<PixelBuffer, PoolError> {
        if self.stats.outstanding >= self.opts.max_buffers {
            self.stats.failed += 1;
            return Err(PoolError::Exhausted {
                outstanding: self.stats.outstanding,
                max: self.opts.max_buffers,
            });
        }

        if let Some(buf) = self.free.pop() {
            self.stats.retained = self.free.len();
            self.stats.reused += 1;
            self.stats.outstanding += 1;
            return Ok(buf);
        }

        let bytes = self.byte_len();
        if bytes > self.opts.max_buffer_bytes {
            self.stats.failed += 1;
            return Err(PoolError::TooLarge {
                bytes,
                limit: self.opts.max_buffer_bytes,
            });
        }

        let mut data = Vec::new();
        if data.try_reserve_exact(bytes).is_err() {
            self.stats.failed += 1;
            return Err(PoolError::AllocationFailed { bytes });
        }
        data.resize(bytes, 0);

        self.stats.allocated += 1;
        self.stats.outstanding += 1;
        Ok(PixelBuffer::from_parts(self.size, self.format, data))
    }

    /// Return a buffer obtained from [`PixelBufferPool::acquire`].
    pub fn release(&mut self, buf: PixelBuffer) {
        self.stats.outstanding = self.stats.outstanding.saturating_sub(1);
        if buf.size() != self.size || buf.format() != self.format {
            return;
        }
        if self.free.len() < self.opts.max_buffers {
            self.free.push(buf);
        }
        self.stats.retained = self.free.len();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/pool.rs"]
mod tests;
