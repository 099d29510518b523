//! Bucketed pixel/sample buffer pool with handle-based identity, generalizing
//! the teacher's `SurfacePool` (bucketed by `(w, h, format)`) to the wider
//! key the Frame Processor needs: `(w, h, pixel_format, usage,
//! storage_mode, mip_level_count)`. Buffers are tracked by an integer
//! handle assigned at allocation rather than pointer identity, so a buffer
//! minted by a foreign pool can never be mistaken for one of ours.

use std::collections::HashMap;

use crate::error::{ExportError, ExportResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Bgra8,
    Rgba16Float,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Usage {
    RenderTarget,
    ShaderRead,
    ShaderReadWrite,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StorageMode {
    Private,
    Shared,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferKey {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub usage: Usage,
    pub storage_mode: StorageMode,
    pub mip_level_count: u32,
}

impl BufferKey {
    fn byte_len(self) -> usize {
        let px = (self.width as usize).saturating_mul(self.height as usize);
        let bytes_per_pixel = match self.format {
            PixelFormat::Bgra8 => 4,
            PixelFormat::Rgba16Float => 8,
        };
        px.saturating_mul(bytes_per_pixel).saturating_mul(self.mip_level_count.max(1) as usize)
    }
}

/// A unique integer handle assigned at allocation. Pool `release` calls
/// check this against the handle it issued, so a buffer borrowed from a
/// different pool instance (or never borrowed at all) cannot poison a
/// bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferHandle(u64);

pub struct PixelBuffer {
    pub handle: BufferHandle,
    pub key: BufferKey,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    fn new(handle: BufferHandle, key: BufferKey) -> Self {
        Self {
            handle,
            key,
            data: vec![0u8; key.byte_len()],
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PoolStats {
    pub retained_buffers: usize,
    pub retained_bytes: usize,
    pub alloc_count: u64,
    pub dropped_on_release: u64,
}

struct Bucket {
    key: BufferKey,
    buffers: Vec<PixelBuffer>,
}

#[derive(Clone, Copy, Debug)]
pub struct PoolOpts {
    pub max_pool_bytes: usize,
    pub max_buffers_per_bucket: usize,
}

impl Default for PoolOpts {
    fn default() -> Self {
        Self {
            max_pool_bytes: 256 * 1024 * 1024,
            max_buffers_per_bucket: 8,
        }
    }
}

/// Single-owner bucketed pool. Checkout/checkin are not internally
/// synchronized -- the texture pool is owned
/// by exactly one render context and its callers serialize access.
pub struct BufferPool {
    opts: PoolOpts,
    stats: PoolStats,
    issued: HashMap<u64, BufferKey>,
    next_handle: u64,
    bucket_idx_by_key: HashMap<BufferKey, usize>,
    buckets: Vec<Bucket>,
}

impl BufferPool {
    pub fn new(opts: PoolOpts) -> Self {
        Self {
            opts,
            stats: PoolStats::default(),
            issued: HashMap::new(),
            next_handle: 0,
            bucket_idx_by_key: HashMap::new(),
            buckets: Vec::new(),
        }
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    pub fn checkout(&mut self, key: BufferKey) -> ExportResult<PixelBuffer> {
        if key.width == 0 || key.height == 0 {
            return Err(ExportError::InvalidDimensions(
                "buffer width/height must be > 0".into(),
            ));
        }

        if let Some(&bi) = self.bucket_idx_by_key.get(&key) {
            if let Some(mut buf) = self.buckets[bi].buffers.pop() {
                self.stats.retained_buffers = self.stats.retained_buffers.saturating_sub(1);
                self.stats.retained_bytes = self.stats.retained_bytes.saturating_sub(key.byte_len());
                let handle = self.mint_handle(key);
                buf.handle = handle;
                buf.data.iter_mut().for_each(|b| *b = 0);
                return Ok(buf);
            }
        }

        let handle = self.mint_handle(key);
        self.stats.alloc_count += 1;
        Ok(PixelBuffer::new(handle, key))
    }

    fn mint_handle(&mut self, key: BufferKey) -> BufferHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.issued.insert(handle, key);
        BufferHandle(handle)
    }

    /// Returns `buf` to its bucket, or drops it if it was never issued by
    /// this pool, if its tracked key doesn't match, or if the pool is full.
    pub fn checkin(&mut self, buf: PixelBuffer) {
        let Some(&tracked_key) = self.issued.get(&buf.handle.0) else {
            // Foreign handle: never issued by this pool. Drop silently.
            return;
        };
        if tracked_key != buf.key {
            self.stats.dropped_on_release += 1;
            self.issued.remove(&buf.handle.0);
            return;
        }
        self.issued.remove(&buf.handle.0);

        if self.opts.max_pool_bytes == 0 || self.opts.max_buffers_per_bucket == 0 {
            self.stats.dropped_on_release += 1;
            return;
        }

        let bytes = buf.key.byte_len();
        if self.stats.retained_bytes.saturating_add(bytes) > self.opts.max_pool_bytes {
            self.stats.dropped_on_release += 1;
            return;
        }

        let bi = match self.bucket_idx_by_key.get(&buf.key).copied() {
            Some(i) => i,
            None => {
                let i = self.buckets.len();
                self.buckets.push(Bucket {
                    key: buf.key,
                    buffers: Vec::new(),
                });
                self.bucket_idx_by_key.insert(buf.key, i);
                i
            }
        };

        let bucket = &mut self.buckets[bi];
        if bucket.buffers.len() >= self.opts.max_buffers_per_bucket {
            self.stats.dropped_on_release += 1;
            return;
        }

        bucket.buffers.push(buf);
        self.stats.retained_buffers += 1;
        self.stats.retained_bytes += bytes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(w: u32, h: u32) -> BufferKey {
        BufferKey {
            width: w,
            height: h,
            format: PixelFormat::Bgra8,
            usage: Usage::RenderTarget,
            storage_mode: StorageMode::Private,
            mip_level_count: 1,
        }
    }

    #[test]
    fn checkout_reuses_checked_in_buffer() {
        let mut pool = BufferPool::new(PoolOpts::default());
        let k = key(16, 16);
        let a = pool.checkout(k).unwrap();
        let handle_a = a.handle;
        pool.checkin(a);
        assert_eq!(pool.stats().retained_buffers, 1);

        let b = pool.checkout(k).unwrap();
        assert_ne!(b.handle, handle_a, "pool must mint a fresh handle on reuse");
        assert_eq!(pool.stats().alloc_count, 1);
    }

    #[test]
    fn foreign_buffer_cannot_poison_the_pool() {
        let mut pool = BufferPool::new(PoolOpts::default());
        let k = key(8, 8);
        let foreign = PixelBuffer::new(BufferHandle(9999), k);
        pool.checkin(foreign);
        assert_eq!(pool.stats().retained_buffers, 0);
    }

    #[test]
    fn bucket_cap_drops_excess_on_checkin() {
        let mut pool = BufferPool::new(PoolOpts {
            max_pool_bytes: 1 << 30,
            max_buffers_per_bucket: 1,
        });
        let k = key(4, 4);
        let a = pool.checkout(k).unwrap();
        let b = pool.checkout(k).unwrap();
        pool.checkin(a);
        pool.checkin(b);
        assert_eq!(pool.stats().retained_buffers, 1);
        assert_eq!(pool.stats().dropped_on_release, 1);
    }

    #[test]
    fn zero_dimensions_rejected() {
        let mut pool = BufferPool::new(PoolOpts::default());
        assert!(pool.checkout(key(0, 4)).is_err());
    }
}
