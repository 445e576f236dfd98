//! The file-data engine: maps logical byte ranges to cluster chains.
//!
//! An inode addresses its content through three tiers: five direct cluster
//! pointers, one single-indirect pointer and one double-indirect pointer.
//! An index cluster is an array of little-endian u32 cluster ids. The same
//! recursion walks all tiers, parameterised by rank: rank 0 is a data
//! cluster, rank k is an index cluster of rank k-1 subtrees.

use crate::fs::CLUSTER_SIZE;
use crate::fs::FREE_CLUSTER;
use crate::fs::FileSystem;
use crate::fs::error::FsError;
use crate::fs::error::Result;
use crate::fs::inode::DIRECT_COUNT;
use crate::fs::inode::INDIRECT_COUNT;
use crate::fs::inode::Inode;
use std::io;

/// Number of cluster pointers an index cluster holds.
const POINTERS_PER_CLUSTER: usize = (CLUSTER_SIZE / 4) as usize;

/// Bytes addressable by one subtree of the given rank.
fn tier_capacity(rank: u32) -> u64 {
    u64::from(CLUSTER_SIZE) * (POINTERS_PER_CLUSTER as u64).pow(rank)
}

/// Largest content size an inode can address, capped by its 32-bit size
/// field.
pub fn max_file_size() -> u64 {
    let full = DIRECT_COUNT as u64 * tier_capacity(0) + tier_capacity(1) + tier_capacity(2);
    full.min(u64::from(u32::MAX))
}

/// Bytes left to place and the logical offset where they go.
struct WriteCursor<'a> {
    data: &'a [u8],
    offset: u64,
}

fn load_pointer(table: &[u8], slot: usize) -> u32 {
    u32::from_le_bytes(table[slot * 4..slot * 4 + 4].try_into().unwrap())
}

fn store_pointer(table: &mut [u8], slot: usize, id: u32) {
    table[slot * 4..slot * 4 + 4].copy_from_slice(&id.to_le_bytes());
}

impl FileSystem {
    /// Writes `buf` into the inode's content, either appending after the
    /// current size or replacing the content entirely.
    ///
    /// The inode record (pointers and size) is committed only once every
    /// byte is placed, so a failed allocation mid-write leaves the previous
    /// size intact and at worst leaks cluster bits.
    pub(crate) fn write_data(&mut self, inode: &mut Inode, buf: &[u8], append: bool) -> Result<()> {
        let prev_size = if append { u64::from(inode.file_size) } else { 0 };
        if prev_size + buf.len() as u64 > max_file_size() {
            return Err(FsError::TooLarge);
        }
        if !append {
            self.release_clusters(inode)?;
            // commit the cleared record before the freed clusters can be
            // reclaimed, so the slot never points at foreign data
            self.inode_write(inode)?;
        }
        let mut cursor = WriteCursor {
            data: buf,
            offset: prev_size,
        };
        let mut tier_start = 0u64;
        for i in 0..DIRECT_COUNT {
            inode.direct[i] = self.write_tier(inode.direct[i], 0, tier_start, &mut cursor)?;
            tier_start += tier_capacity(0);
        }
        for i in 0..INDIRECT_COUNT {
            let rank = i as u32 + 1;
            inode.indirect[i] = self.write_tier(inode.indirect[i], rank, tier_start, &mut cursor)?;
            tier_start += tier_capacity(rank);
        }
        debug_assert!(cursor.data.is_empty());
        inode.file_size = (prev_size + buf.len() as u64) as u32;
        self.inode_write(inode)
    }

    /// Writes the cursor's bytes into the subtree rooted at `slot`, which
    /// covers logical offsets starting at `tier_start`.
    ///
    /// Subtrees that end before the cursor are skipped untouched; the walk
    /// stops as soon as the buffer is consumed. Returns the effective root
    /// of the subtree, allocating data and index clusters on demand.
    fn write_tier(
        &mut self,
        slot: u32,
        rank: u32,
        tier_start: u64,
        cursor: &mut WriteCursor<'_>,
    ) -> Result<u32> {
        if cursor.data.is_empty() || tier_start + tier_capacity(rank) <= cursor.offset {
            return Ok(slot);
        }
        if rank == 0 {
            let offset = (cursor.offset - tier_start) as u32;
            // content is hole-free: an unallocated cluster is only ever
            // written from its start
            debug_assert!(slot != FREE_CLUSTER || offset == 0);
            let n = ((CLUSTER_SIZE - offset) as usize).min(cursor.data.len());
            let (chunk, rest) = cursor.data.split_at(n);
            let id = self.write_cluster(slot, chunk, offset, true, offset == 0)?;
            cursor.data = rest;
            cursor.offset += n as u64;
            return Ok(id);
        }
        let mut table = vec![0u8; CLUSTER_SIZE as usize];
        let id = if slot == FREE_CLUSTER {
            self.write_cluster(FREE_CLUSTER, &table, 0, true, true)?
        } else {
            self.read_cluster(slot, &mut table, 0)?;
            slot
        };
        let child_capacity = tier_capacity(rank - 1);
        let mut child_start = tier_start;
        for i in 0..POINTERS_PER_CLUSTER {
            if cursor.data.is_empty() {
                break;
            }
            let child = self.write_tier(load_pointer(&table, i), rank - 1, child_start, cursor)?;
            store_pointer(&mut table, i, child);
            child_start += child_capacity;
        }
        self.write_cluster(id, &table, 0, true, true)?;
        Ok(id)
    }

    /// Reads the inode's whole content.
    pub(crate) fn read_data(&mut self, inode: &Inode) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(inode.file_size as usize);
        let mut remaining = u64::from(inode.file_size);
        for &slot in &inode.direct {
            self.read_tier(slot, 0, &mut out, &mut remaining)?;
        }
        for (i, &slot) in inode.indirect.iter().enumerate() {
            self.read_tier(slot, i as u32 + 1, &mut out, &mut remaining)?;
        }
        if remaining != 0 {
            return Err(FsError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("inode {}: {remaining} bytes unreachable", inode.id),
            )));
        }
        Ok(out)
    }

    /// Reads the subtree at `slot` into `out`. A zero pointer at any rank
    /// ends the allocated range and stops the descent.
    fn read_tier(
        &mut self,
        slot: u32,
        rank: u32,
        out: &mut Vec<u8>,
        remaining: &mut u64,
    ) -> Result<()> {
        if *remaining == 0 || slot == FREE_CLUSTER {
            return Ok(());
        }
        if rank == 0 {
            let n = (*remaining).min(u64::from(CLUSTER_SIZE)) as usize;
            let mut buf = vec![0u8; n];
            self.read_cluster(slot, &mut buf, 0)?;
            out.extend_from_slice(&buf);
            *remaining -= n as u64;
            return Ok(());
        }
        let mut table = vec![0u8; CLUSTER_SIZE as usize];
        self.read_cluster(slot, &mut table, 0)?;
        for i in 0..POINTERS_PER_CLUSTER {
            if *remaining == 0 {
                break;
            }
            let child = load_pointer(&table, i);
            if child == FREE_CLUSTER {
                break;
            }
            self.read_tier(child, rank - 1, out, remaining)?;
        }
        Ok(())
    }

    /// Releases every data and index cluster reachable from the inode and
    /// resets it to an empty file. The record is not persisted here.
    pub(crate) fn release_clusters(&mut self, inode: &mut Inode) -> Result<()> {
        for slot in inode.direct {
            self.free_tier(slot, 0)?;
        }
        for (i, slot) in inode.indirect.into_iter().enumerate() {
            self.free_tier(slot, i as u32 + 1)?;
        }
        inode.direct = [FREE_CLUSTER; DIRECT_COUNT];
        inode.indirect = [FREE_CLUSTER; INDIRECT_COUNT];
        inode.file_size = 0;
        Ok(())
    }

    fn free_tier(&mut self, slot: u32, rank: u32) -> Result<()> {
        if slot == FREE_CLUSTER {
            return Ok(());
        }
        if rank > 0 {
            let mut table = vec![0u8; CLUSTER_SIZE as usize];
            self.read_cluster(slot, &mut table, 0)?;
            for i in 0..POINTERS_PER_CLUSTER {
                let child = load_pointer(&table, i);
                if child == FREE_CLUSTER {
                    break;
                }
                self.free_tier(child, rank - 1)?;
            }
        }
        self.free_cluster(slot)
    }
}
