//! The command-facing operations of the engine.
//!
//! One function per shell command. Each mutating operation commits the
//! superblock counters last, after data clusters, bitmap bits and inode
//! records, so an interrupted operation leaks at worst a few bits.

use crate::fs::FREE_INODE;
use crate::fs::FileSystem;
use crate::fs::ROOT_INODE;
use crate::fs::dir;
use crate::fs::dir::Entry;
use crate::fs::error::FsError;
use crate::fs::error::Result;
use crate::fs::inode::DIRECT_COUNT;
use crate::fs::inode::FileType;
use crate::fs::inode::INDIRECT_COUNT;
use crate::fs::inode::Inode;
use crate::fs::superblock::Superblock;
use std::path::Path;

/// Files larger than this are cut down by `short`.
pub const SHORT_LIMIT: usize = 5000;

/// Everything `info` reports about one file or directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub inode: u32,
    pub file_type: FileType,
    pub file_size: u32,
    pub direct: [u32; DIRECT_COUNT],
    pub indirect: [u32; INDIRECT_COUNT],
}

impl FileSystem {
    /// Formats the image to `size` bytes, discarding any previous content.
    ///
    /// A geometry failure leaves a previously loaded image untouched; a
    /// failure once the backing file has been rewritten leaves the instance
    /// unformatted.
    pub fn format(&mut self, size: u64) -> Result<()> {
        let sb = Superblock::with_geometry(size).ok_or(FsError::CannotCreateFile)?;
        match self.format_inner(sb) {
            Ok(()) => Ok(()),
            Err(_) => {
                self.sb = None;
                Err(FsError::CannotCreateFile)
            }
        }
    }

    fn format_inner(&mut self, sb: Superblock) -> Result<()> {
        self.file.set_len(u64::from(sb.disk_size))?;
        self.sb = Some(sb);
        // both bitmaps start zeroed; stale inodes become unreachable
        self.zero_region(
            u64::from(sb.data_bitmap_start),
            u64::from(sb.inode_table_start),
        )?;
        self.sync_super()?;
        let root = self.create_empty_dir(FREE_INODE, "/", true)?;
        debug_assert_eq!(root.id, ROOT_INODE);
        self.root = root.id;
        self.cwd = root.id;
        self.sync_super()
    }

    /// Creates the directory at `path`.
    pub fn mkdir(&mut self, path: &str) -> Result<()> {
        let r = self.parse_path(path)?;
        if r.parent.inode_id == FREE_INODE {
            return Err(FsError::PathNotFound);
        }
        if r.leaf.inode_id != FREE_INODE {
            return Err(FsError::Exists);
        }
        self.create_empty_dir(r.parent.inode_id, &r.leaf.name, false)?;
        self.sync_super()
    }

    /// Removes the empty directory at `path`.
    pub fn rmdir(&mut self, path: &str) -> Result<()> {
        let r = self.parse_path(path)?;
        if r.parent.inode_id == FREE_INODE {
            return Err(FsError::PathNotFound);
        }
        if r.leaf.inode_id == FREE_INODE || r.leaf.inode_id == self.root {
            return Err(FsError::FileNotFound);
        }
        self.remove_dir(r.parent.inode_id, &r.leaf.name)?;
        if self.cwd == r.leaf.inode_id {
            self.cwd = self.root;
        }
        self.sync_super()
    }

    /// Lists the directory at `path` in display order.
    pub fn ls(&mut self, path: &str) -> Result<Vec<(FileType, String)>> {
        let r = self.parse_path(path)?;
        if r.leaf.inode_id == FREE_INODE {
            return Err(FsError::PathNotFound);
        }
        let entries = self.dir_entries(r.leaf.inode_id)?;
        let mut listing = Vec::with_capacity(entries.len());
        for entry in entries {
            let file_type = self.inode_read(entry.inode_id)?.file_type;
            listing.push((file_type, entry.name));
        }
        dir::sort_entries(&mut listing);
        Ok(listing)
    }

    /// Returns the raw content of the regular file at `path`.
    pub fn cat(&mut self, path: &str) -> Result<Vec<u8>> {
        let (_, inode, _) = self.regular_file_at(path)?;
        self.read_data(&inode)
    }

    /// Changes the working directory to `path`.
    pub fn cd(&mut self, path: &str) -> Result<()> {
        let r = self.parse_path(path)?;
        if r.leaf.inode_id == FREE_INODE {
            return Err(FsError::PathNotFound);
        }
        if self.inode_read(r.leaf.inode_id)?.file_type != FileType::Directory {
            return Err(FsError::PathNotFound);
        }
        self.cwd = r.leaf.inode_id;
        Ok(())
    }

    /// Builds the absolute path of the working directory by walking `..`
    /// upward and matching inode ids against the parents' entries.
    pub fn pwd(&mut self) -> Result<String> {
        let mut names = Vec::new();
        let mut current = self.cwd;
        while current != self.root {
            let up = self
                .dir_lookup(current, "..")?
                .ok_or(FsError::PathNotFound)?
                .inode_id;
            let name = self
                .dir_lookup_id(up, current)?
                .ok_or(FsError::PathNotFound)?
                .name;
            names.push(name);
            current = up;
        }
        names.reverse();
        Ok(format!("/{}", names.join("/")))
    }

    /// Reports the inode behind `path` and its cluster pointers.
    pub fn info(&mut self, path: &str) -> Result<FileInfo> {
        let r = self.parse_path(path)?;
        if r.parent.inode_id == FREE_INODE {
            return Err(FsError::PathNotFound);
        }
        if r.leaf.inode_id == FREE_INODE {
            return Err(FsError::FileNotFound);
        }
        let inode = self.inode_read(r.leaf.inode_id)?;
        Ok(FileInfo {
            name: r.leaf.name,
            inode: inode.id,
            file_type: inode.file_type,
            file_size: inode.file_size,
            direct: inode.direct,
            indirect: inode.indirect,
        })
    }

    /// Copies the regular file at `src` to `dst`.
    pub fn cp(&mut self, src: &str, dst: &str) -> Result<()> {
        let (_, src_inode, src_name) = self.regular_file_at(src)?;
        let data = self.read_data(&src_inode)?;
        let (dir_id, name) = self.resolve_dest(dst, &src_name)?;
        let mut inode = self.create_empty_file(dir_id, &name)?;
        self.write_data(&mut inode, &data, true)?;
        self.sync_super()
    }

    /// Moves or renames the regular file at `src` to `dst`.
    ///
    /// The inode is re-bound, never copied: the new entry is added first and
    /// the old one detached after, so a destination collision changes
    /// nothing.
    pub fn mv(&mut self, src: &str, dst: &str) -> Result<()> {
        let (src_parent, src_inode, src_name) = self.regular_file_at(src)?;
        let (dst_dir, dst_name) = self.resolve_dest(dst, &src_name)?;
        self.add_entry(
            dst_dir,
            &Entry {
                inode_id: src_inode.id,
                name: dst_name,
            },
        )?;
        self.detach_entry(src_parent, &src_name)?;
        self.sync_super()
    }

    /// Removes the regular file at `path`.
    pub fn rm(&mut self, path: &str) -> Result<()> {
        let (parent, _, name) = self.regular_file_at(path)?;
        self.remove_entry(parent, &name)?;
        self.sync_super()
    }

    /// Copies the host file at `host` into the image at `dst`.
    pub fn incp(&mut self, host: &Path, dst: &str) -> Result<()> {
        let data = std::fs::read(host).map_err(|_| FsError::FileNotFound)?;
        let fallback = host
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or(FsError::FileNotFound)?;
        let (dir_id, name) = self.resolve_dest(dst, fallback)?;
        let mut inode = self.create_empty_file(dir_id, &name)?;
        self.write_data(&mut inode, &data, true)?;
        self.sync_super()
    }

    /// Copies the image file at `src` out to the host path `host`.
    pub fn outcp(&mut self, src: &str, host: &Path) -> Result<()> {
        let (_, inode, _) = self.regular_file_at(src)?;
        let data = self.read_data(&inode)?;
        std::fs::write(host, data).map_err(|_| FsError::PathNotFound)
    }

    /// Creates `dst` as the concatenation of the files at `src1` and `src2`.
    pub fn xcp(&mut self, src1: &str, src2: &str, dst: &str) -> Result<()> {
        let (_, first, first_name) = self.regular_file_at(src1)?;
        let (_, second, _) = self.regular_file_at(src2)?;
        let mut data = self.read_data(&first)?;
        data.extend(self.read_data(&second)?);
        let (dir_id, name) = self.resolve_dest(dst, &first_name)?;
        let mut inode = self.create_empty_file(dir_id, &name)?;
        self.write_data(&mut inode, &data, true)?;
        self.sync_super()
    }

    /// Truncates the file at `path` to its first [`SHORT_LIMIT`] bytes when
    /// it is larger; smaller files are left alone.
    pub fn short(&mut self, path: &str) -> Result<()> {
        let (_, mut inode, _) = self.regular_file_at(path)?;
        if inode.file_size as usize <= SHORT_LIMIT {
            return Ok(());
        }
        let data = self.read_data(&inode)?;
        self.write_data(&mut inode, &data[..SHORT_LIMIT], false)?;
        self.sync_super()
    }

    /// Resolves `path` to an existing regular file, yielding its parent
    /// directory, inode and leaf name.
    fn regular_file_at(&mut self, path: &str) -> Result<(u32, Inode, String)> {
        let r = self.parse_path(path)?;
        if r.parent.inode_id == FREE_INODE {
            return Err(FsError::PathNotFound);
        }
        if r.leaf.inode_id == FREE_INODE {
            return Err(FsError::FileNotFound);
        }
        let inode = self.inode_read(r.leaf.inode_id)?;
        if inode.file_type != FileType::Regular {
            return Err(FsError::FileNotFound);
        }
        Ok((r.parent.inode_id, inode, r.leaf.name))
    }

    /// Applies the destination rules shared by `cp`, `mv`, `incp` and
    /// `xcp`: an existing directory keeps `fallback` as the name, a missing
    /// leaf under a directory takes the leaf name, an existing file
    /// collides.
    fn resolve_dest(&mut self, dst: &str, fallback: &str) -> Result<(u32, String)> {
        let r = self.parse_path(dst)?;
        if r.parent.inode_id == FREE_INODE {
            return Err(FsError::PathNotFound);
        }
        if r.leaf.inode_id != FREE_INODE {
            return match self.inode_read(r.leaf.inode_id)?.file_type {
                FileType::Directory => Ok((r.leaf.inode_id, fallback.to_owned())),
                _ => Err(FsError::Exists),
            };
        }
        Ok((r.parent.inode_id, r.leaf.name))
    }
}
