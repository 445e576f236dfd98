//! The superblock: image geometry persisted in cluster 0.

use crate::fs::CLUSTER_SIZE;
use crate::fs::INODE_SIZE;
use crate::util::align_down;
use crate::util::align_up;
use std::fs::File;
use std::io;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;

/// Signature identifying a formatted image.
const SIGNATURE: &[u8] = b"blockfs1";

/// Packed size of the superblock record in bytes.
const RECORD_SIZE: usize = 56;

/// Geometry of one image.
///
/// The record is packed little-endian at the start of cluster 0; the rest of
/// the cluster is zero padding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Superblock {
    /// NUL-padded author signature.
    pub signature: [u8; 16],
    /// Total number of inode slots.
    pub inode_count: u32,
    /// Total number of clusters in the image.
    pub cluster_count: u32,
    /// Number of unallocated inode slots.
    pub free_inode_count: u32,
    /// Number of unallocated data clusters.
    pub free_cluster_count: u32,
    /// Image size in bytes, a multiple of the cluster size.
    pub disk_size: u32,
    /// Size of one cluster in bytes.
    pub cluster_size: u16,
    /// Absolute byte offset of the inode bitmap.
    pub inode_bitmap_start: u32,
    /// Absolute byte offset of the data-cluster bitmap.
    pub data_bitmap_start: u32,
    /// Absolute byte offset of the inode table.
    pub inode_table_start: u32,
    /// Absolute byte offset of the data region.
    pub data_region_start: u32,
    /// Size of one inode record in bytes.
    pub inode_size: u16,
}

impl Superblock {
    /// Plans the region layout for an image of `size` bytes.
    ///
    /// The layout is `[superblock | data bitmap | inode bitmap | inode table
    /// | data region]`, every region filling whole clusters. One inode slot
    /// is provisioned per four clusters. Returns `None` when fewer than 5
    /// clusters fit or the metadata leaves no data cluster.
    pub fn with_geometry(size: u64) -> Option<Self> {
        let cs = u64::from(CLUSTER_SIZE);
        let disk_size = align_down(size.min(u64::from(u32::MAX)), cs);
        let cluster_count = disk_size / cs;
        if cluster_count < 5 {
            return None;
        }
        let inode_count = align_up(cluster_count / 4, cs / u64::from(INODE_SIZE));
        let data_bm_bytes = align_up(cluster_count.div_ceil(8), cs);
        let inode_bm_bytes = align_up(inode_count.div_ceil(8), cs);
        let data_bitmap_start = cs;
        let inode_bitmap_start = data_bitmap_start + data_bm_bytes;
        let inode_table_start = inode_bitmap_start + inode_bm_bytes;
        let data_region_start = inode_table_start + inode_count * u64::from(INODE_SIZE);
        let metadata_clusters = data_region_start / cs;
        if metadata_clusters >= cluster_count {
            return None;
        }
        let mut signature = [0u8; 16];
        signature[..SIGNATURE.len()].copy_from_slice(SIGNATURE);
        Some(Self {
            signature,
            inode_count: inode_count as u32,
            cluster_count: cluster_count as u32,
            free_inode_count: inode_count as u32,
            free_cluster_count: (cluster_count - metadata_clusters) as u32,
            disk_size: disk_size as u32,
            cluster_size: CLUSTER_SIZE as u16,
            inode_bitmap_start: inode_bitmap_start as u32,
            data_bitmap_start: data_bitmap_start as u32,
            inode_table_start: inode_table_start as u32,
            data_region_start: data_region_start as u32,
            inode_size: INODE_SIZE as u16,
        })
    }

    /// Number of data clusters the data region can hold.
    pub fn data_cluster_capacity(&self) -> u32 {
        self.cluster_count - self.data_region_start / u32::from(self.cluster_size)
    }

    fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut raw = [0u8; RECORD_SIZE];
        raw[0..16].copy_from_slice(&self.signature);
        raw[16..20].copy_from_slice(&self.inode_count.to_le_bytes());
        raw[20..24].copy_from_slice(&self.cluster_count.to_le_bytes());
        raw[24..28].copy_from_slice(&self.free_inode_count.to_le_bytes());
        raw[28..32].copy_from_slice(&self.free_cluster_count.to_le_bytes());
        raw[32..36].copy_from_slice(&self.disk_size.to_le_bytes());
        raw[36..38].copy_from_slice(&self.cluster_size.to_le_bytes());
        raw[38..42].copy_from_slice(&self.inode_bitmap_start.to_le_bytes());
        raw[42..46].copy_from_slice(&self.data_bitmap_start.to_le_bytes());
        raw[46..50].copy_from_slice(&self.inode_table_start.to_le_bytes());
        raw[50..54].copy_from_slice(&self.data_region_start.to_le_bytes());
        raw[54..56].copy_from_slice(&self.inode_size.to_le_bytes());
        raw
    }

    fn decode(raw: &[u8; RECORD_SIZE]) -> Self {
        let load_u16 = |i: usize| u16::from_le_bytes(raw[i..i + 2].try_into().unwrap());
        let load_u32 = |i: usize| u32::from_le_bytes(raw[i..i + 4].try_into().unwrap());
        Self {
            signature: raw[0..16].try_into().unwrap(),
            inode_count: load_u32(16),
            cluster_count: load_u32(20),
            free_inode_count: load_u32(24),
            free_cluster_count: load_u32(28),
            disk_size: load_u32(32),
            cluster_size: load_u16(36),
            inode_bitmap_start: load_u32(38),
            data_bitmap_start: load_u32(42),
            inode_table_start: load_u32(46),
            data_region_start: load_u32(50),
            inode_size: load_u16(54),
        }
    }

    /// Reads cluster 0, returning `None` when no valid image is present.
    pub fn load(file: &mut File) -> io::Result<Option<Self>> {
        let mut raw = [0u8; RECORD_SIZE];
        file.seek(SeekFrom::Start(0))?;
        if file.read_exact(&mut raw).is_err() {
            return Ok(None);
        }
        let sb = Self::decode(&raw);
        if &sb.signature[..SIGNATURE.len()] != SIGNATURE
            || u32::from(sb.cluster_size) != CLUSTER_SIZE
            || u32::from(sb.inode_size) != INODE_SIZE
        {
            return Ok(None);
        }
        Ok(Some(sb))
    }

    /// The record inside a full zero-padded cluster image.
    pub(crate) fn to_cluster(&self) -> Vec<u8> {
        let mut cluster = vec![0u8; CLUSTER_SIZE as usize];
        cluster[..RECORD_SIZE].copy_from_slice(&self.encode());
        cluster
    }

    /// Writes the record into cluster 0, zero-padding the remainder.
    pub fn store(&self, file: &mut File) -> io::Result<()> {
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&self.to_cluster())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn geometry_600kb() {
        let sb = Superblock::with_geometry(600 * 1024).unwrap();
        assert_eq!(sb.disk_size, 600 * 1024);
        assert_eq!(sb.cluster_count, 150);
        // 150 / 4 = 37, rounded up to a full table cluster of 64 slots
        assert_eq!(sb.inode_count, 64);
        assert_eq!(sb.free_inode_count, sb.inode_count);
        assert_eq!(sb.data_bitmap_start, 4096);
        assert_eq!(sb.inode_bitmap_start, 2 * 4096);
        assert_eq!(sb.inode_table_start, 3 * 4096);
        assert_eq!(
            sb.data_region_start,
            sb.inode_table_start + sb.inode_count * u32::from(sb.inode_size)
        );
        // superblock + data bitmap + inode bitmap + inode table
        assert_eq!(sb.free_cluster_count, 150 - 4);
        assert_eq!(sb.data_cluster_capacity(), 150 - 4);
    }

    #[test]
    fn geometry_rounds_odd_sizes_down() {
        let sb = Superblock::with_geometry(600 * 1024 + 123).unwrap();
        assert_eq!(sb.disk_size, 600 * 1024);
    }

    #[test]
    fn geometry_minimum_is_five_clusters() {
        assert!(Superblock::with_geometry(5 * 4096 - 1).is_none());
        let sb = Superblock::with_geometry(5 * 4096).unwrap();
        assert_eq!(sb.cluster_count, 5);
        assert_eq!(sb.free_cluster_count, 1);
    }

    #[test]
    fn record_round_trips_through_cluster_zero() {
        let img = tempfile::NamedTempFile::new().unwrap();
        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(img.path())
            .unwrap();
        let sb = Superblock::with_geometry(600 * 1024).unwrap();
        sb.store(&mut file).unwrap();
        assert_eq!(Superblock::load(&mut file).unwrap(), Some(sb));
    }

    #[test]
    fn load_rejects_foreign_bytes() {
        let img = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(img.path(), vec![0xabu8; 8192]).unwrap();
        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(img.path())
            .unwrap();
        assert_eq!(Superblock::load(&mut file).unwrap(), None);
    }

    #[test]
    fn fields_sit_at_fixed_offsets() {
        let sb = Superblock::with_geometry(600 * 1024).unwrap();
        let raw = sb.encode();
        assert_eq!(&raw[0..8], b"blockfs1");
        assert_eq!(u32::from_le_bytes(raw[20..24].try_into().unwrap()), 150);
        assert_eq!(u16::from_le_bytes(raw[36..38].try_into().unwrap()), 4096);
        assert_eq!(u16::from_le_bytes(raw[54..56].try_into().unwrap()), 64);
    }
}
