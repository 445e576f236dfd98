//! Cluster-granular I/O against the backing file.
//!
//! Data clusters are addressed by 1-based ids relative to the data region;
//! id 0 is the "not allocated" sentinel. Allocation is lazy: writing with
//! id 0 grabs the first zero bit of the data bitmap.

use crate::fs::CLUSTER_SIZE;
use crate::fs::FREE_CLUSTER;
use crate::fs::FileSystem;
use crate::fs::bitmap;
use crate::fs::error::FsError;
use crate::fs::error::Result;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;

impl FileSystem {
    /// Absolute byte offset of the data cluster `id`.
    fn data_cluster_offset(&self, id: u32) -> Result<u64> {
        let sb = self.sb()?;
        Ok(u64::from(sb.data_region_start) + u64::from(id - 1) * u64::from(CLUSTER_SIZE))
    }

    /// Reads up to `buf.len()` bytes from a data cluster, starting `offset`
    /// bytes into it. Id 0 reads nothing and leaves the buffer untouched.
    pub(crate) fn read_cluster(&mut self, id: u32, buf: &mut [u8], offset: u32) -> Result<usize> {
        if id == FREE_CLUSTER {
            return Ok(0);
        }
        debug_assert!(offset < CLUSTER_SIZE);
        let n = buf.len().min((CLUSTER_SIZE - offset) as usize);
        let base = self.data_cluster_offset(id)?;
        self.file.seek(SeekFrom::Start(base + u64::from(offset)))?;
        self.file.read_exact(&mut buf[..n])?;
        Ok(n)
    }

    /// Writes `data` into a cluster and returns the effective cluster id.
    ///
    /// With `as_data`, id 0 allocates a fresh data cluster: its bitmap bit is
    /// set, the free count drops, and the cluster is zero-filled around the
    /// payload. Without `as_data` the id addresses an absolute cluster (the
    /// superblock lives in absolute cluster 0).
    ///
    /// `overwrite` replaces the content from offset 0; otherwise the first
    /// `offset` bytes are preserved and `data` lands right after them.
    pub(crate) fn write_cluster(
        &mut self,
        id: u32,
        data: &[u8],
        offset: u32,
        as_data: bool,
        overwrite: bool,
    ) -> Result<u32> {
        let sb = *self.sb()?;
        let mut id = id;
        let mut fresh = false;
        if as_data && id == FREE_CLUSTER {
            let index = bitmap::find_first_zero(
                &mut self.file,
                u64::from(sb.data_bitmap_start),
                sb.data_cluster_capacity(),
            )?
            .ok_or(FsError::OutOfSpace)?;
            id = index + 1;
            fresh = true;
        }
        let base = if as_data {
            self.data_cluster_offset(id)?
        } else {
            u64::from(id) * u64::from(CLUSTER_SIZE)
        };
        if fresh {
            // fresh clusters carry no history: write the payload inside a
            // zeroed cluster regardless of the requested offset
            let mut cluster = vec![0u8; CLUSTER_SIZE as usize];
            cluster[..data.len()].copy_from_slice(data);
            self.file.seek(SeekFrom::Start(base))?;
            self.file.write_all(&cluster)?;
        } else {
            let at = if overwrite { 0 } else { offset };
            debug_assert!(at as usize + data.len() <= CLUSTER_SIZE as usize);
            self.file.seek(SeekFrom::Start(base + u64::from(at)))?;
            self.file.write_all(data)?;
        }
        if as_data && bitmap::set(&mut self.file, u64::from(sb.data_bitmap_start), id - 1, true)? {
            self.sb_mut()?.free_cluster_count -= 1;
        }
        Ok(id)
    }

    /// Releases a data cluster back to the bitmap. A no-op for id 0.
    pub(crate) fn free_cluster(&mut self, id: u32) -> Result<()> {
        if id == FREE_CLUSTER {
            return Ok(());
        }
        let start = u64::from(self.sb()?.data_bitmap_start);
        if bitmap::set(&mut self.file, start, id - 1, false)? {
            self.sb_mut()?.free_cluster_count += 1;
        }
        Ok(())
    }

    /// Overwrites the byte range `[start, end)` of the backing file with
    /// zeros. Used by `format` to reset the bitmap regions.
    pub(crate) fn zero_region(&mut self, start: u64, end: u64) -> Result<()> {
        let zeros = vec![0u8; (end - start) as usize];
        self.file.seek(SeekFrom::Start(start))?;
        self.file.write_all(&zeros)?;
        Ok(())
    }
}
