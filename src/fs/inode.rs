//! Inode records and the inode table.
//!
//! Inodes live in fixed 64-byte slots; slot `id - 1` holds the inode with
//! the 1-based `id`. The inode bitmap, not the record itself, decides
//! whether a slot is allocated.

use crate::fs::FREE_CLUSTER;
use crate::fs::FREE_INODE;
use crate::fs::FileSystem;
use crate::fs::INODE_SIZE;
use crate::fs::bitmap;
use crate::fs::error::FsError;
use crate::fs::error::Result;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;

/// Number of direct cluster pointers per inode.
pub const DIRECT_COUNT: usize = 5;
/// Number of indirect pointers per inode: single, then double.
pub const INDIRECT_COUNT: usize = 2;

/// What an inode describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileType {
    Unknown,
    Regular,
    Directory,
}

impl FileType {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Regular,
            2 => Self::Directory,
            _ => Self::Unknown,
        }
    }

    fn to_raw(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Regular => 1,
            Self::Directory => 2,
        }
    }
}

/// One inode record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Inode {
    /// 1-based slot id; 0 never appears in an allocated record.
    pub id: u32,
    pub file_type: FileType,
    /// Number of directory entries binding this inode.
    pub hard_links: u8,
    /// Content size in bytes.
    pub file_size: u32,
    /// Direct data cluster pointers; 0 marks an unused slot.
    pub direct: [u32; DIRECT_COUNT],
    /// Single- and double-indirect index cluster pointers.
    pub indirect: [u32; INDIRECT_COUNT],
}

impl Inode {
    fn encode(&self) -> [u8; INODE_SIZE as usize] {
        let mut raw = [0u8; INODE_SIZE as usize];
        raw[0..4].copy_from_slice(&self.id.to_le_bytes());
        raw[4] = self.file_type.to_raw();
        raw[5] = self.hard_links;
        raw[6..10].copy_from_slice(&self.file_size.to_le_bytes());
        for (i, ptr) in self.direct.iter().enumerate() {
            raw[10 + i * 4..14 + i * 4].copy_from_slice(&ptr.to_le_bytes());
        }
        for (i, ptr) in self.indirect.iter().enumerate() {
            raw[30 + i * 4..34 + i * 4].copy_from_slice(&ptr.to_le_bytes());
        }
        raw
    }

    fn decode(raw: &[u8; INODE_SIZE as usize]) -> Self {
        let load_u32 = |i: usize| u32::from_le_bytes(raw[i..i + 4].try_into().unwrap());
        let mut direct = [FREE_CLUSTER; DIRECT_COUNT];
        for (i, ptr) in direct.iter_mut().enumerate() {
            *ptr = load_u32(10 + i * 4);
        }
        let mut indirect = [FREE_CLUSTER; INDIRECT_COUNT];
        for (i, ptr) in indirect.iter_mut().enumerate() {
            *ptr = load_u32(30 + i * 4);
        }
        Self {
            id: load_u32(0),
            file_type: FileType::from_raw(raw[4]),
            hard_links: raw[5],
            file_size: load_u32(6),
            direct,
            indirect,
        }
    }
}

impl FileSystem {
    /// Absolute byte offset of the inode slot for `id`.
    fn inode_offset(&self, id: u32) -> Result<u64> {
        let sb = self.sb()?;
        Ok(u64::from(sb.inode_table_start) + u64::from(id - 1) * u64::from(sb.inode_size))
    }

    /// Allocates the lowest free inode slot and persists the superblock.
    pub(crate) fn inode_create(&mut self) -> Result<Inode> {
        let sb = *self.sb()?;
        let index = bitmap::find_first_zero(
            &mut self.file,
            u64::from(sb.inode_bitmap_start),
            sb.inode_count,
        )?
        .ok_or(FsError::OutOfSpace)?;
        let inode = Inode {
            id: index + 1,
            file_type: FileType::Unknown,
            hard_links: 0,
            file_size: 0,
            direct: [FREE_CLUSTER; DIRECT_COUNT],
            indirect: [FREE_CLUSTER; INDIRECT_COUNT],
        };
        if bitmap::set(&mut self.file, u64::from(sb.inode_bitmap_start), index, true)? {
            self.sb_mut()?.free_inode_count -= 1;
        }
        self.inode_write(&inode)?;
        self.sync_super()?;
        Ok(inode)
    }

    /// Reads the inode `id`, rejecting the sentinel and unallocated slots.
    pub(crate) fn inode_read(&mut self, id: u32) -> Result<Inode> {
        let sb = *self.sb()?;
        if id == FREE_INODE
            || id > sb.inode_count
            || !bitmap::is_set(&mut self.file, u64::from(sb.inode_bitmap_start), id - 1)?
        {
            return Err(FsError::FileNotFound);
        }
        let offset = self.inode_offset(id)?;
        let mut raw = [0u8; INODE_SIZE as usize];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut raw)?;
        Ok(Inode::decode(&raw))
    }

    /// Rewrites the inode's slot in place.
    pub(crate) fn inode_write(&mut self, inode: &Inode) -> Result<()> {
        let offset = self.inode_offset(inode.id)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&inode.encode())?;
        Ok(())
    }

    /// Frees the inode `id` along with every cluster reachable from it.
    pub(crate) fn inode_free(&mut self, id: u32) -> Result<()> {
        let mut inode = self.inode_read(id)?;
        self.release_clusters(&mut inode)?;
        let sb = *self.sb()?;
        if bitmap::set(&mut self.file, u64::from(sb.inode_bitmap_start), id - 1, false)? {
            self.sb_mut()?.free_inode_count += 1;
        }
        Ok(())
    }
}
