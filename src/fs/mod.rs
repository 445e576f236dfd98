//! The filesystem engine.
//!
//! One image lives inside a single regular host file, laid out as
//! `[superblock | data bitmap | inode bitmap | inode table | data region]`
//! in whole clusters. All multi-byte on-disk integers are little-endian and
//! bitmap bits are MSB-first; both are part of the format.

pub mod bitmap;
pub mod data;
pub mod dir;
pub mod error;
pub mod inode;
pub mod io;
pub mod ops;
pub mod path;
pub mod superblock;

use crate::fs::error::FsError;
use crate::fs::error::Result;
use crate::fs::superblock::Superblock;
use std::fs::OpenOptions;
use std::path::Path;

/// The on-disk allocation unit in bytes.
pub const CLUSTER_SIZE: u32 = 4096;
/// Size of one inode record slot in bytes.
pub const INODE_SIZE: u32 = 64;
/// The inode id of the root directory, always the first one allocated.
pub const ROOT_INODE: u32 = 1;
/// Sentinel inode id meaning "no inode".
pub const FREE_INODE: u32 = 0;
/// Sentinel data cluster id meaning "not allocated".
pub const FREE_CLUSTER: u32 = 0;

/// Runtime state of one mounted image.
pub struct FileSystem {
    /// The backing image file, owned for the whole session.
    file: std::fs::File,
    /// The parsed superblock; `None` until `format` has succeeded.
    sb: Option<Superblock>,
    /// The inode id of the root directory.
    root: u32,
    /// The inode id of the current working directory.
    cwd: u32,
}

impl FileSystem {
    /// Opens the image at `path`, loading the superblock when one is present.
    ///
    /// A missing file or an unrecognized image is not an error: the instance
    /// starts unformatted and rejects everything except `format`.
    pub fn init(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let sb = Superblock::load(&mut file)?;
        Ok(Self {
            file,
            sb,
            root: ROOT_INODE,
            cwd: ROOT_INODE,
        })
    }

    /// Tells whether `format` has produced a valid image.
    pub fn is_formatted(&self) -> bool {
        self.sb.is_some()
    }

    /// The inode id of the current working directory.
    pub fn cwd(&self) -> u32 {
        self.cwd
    }

    /// Returns the superblock, rejecting work on an unformatted image.
    pub(crate) fn sb(&self) -> Result<&Superblock> {
        self.sb.as_ref().ok_or(FsError::NotFormatted)
    }

    pub(crate) fn sb_mut(&mut self) -> Result<&mut Superblock> {
        self.sb.as_mut().ok_or(FsError::NotFormatted)
    }

    /// Rewrites the superblock record in absolute cluster 0.
    ///
    /// Counters mutate in memory as clusters and inodes come and go; every
    /// engine operation commits them last, after data and inode records.
    pub(crate) fn sync_super(&mut self) -> Result<()> {
        let cluster = self.sb()?.to_cluster();
        self.write_cluster(0, &cluster, 0, false, true)?;
        Ok(())
    }
}
