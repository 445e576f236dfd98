//! The directory service.
//!
//! A directory is an ordinary inode whose content is a dense array of
//! 16-byte entries; it gets the full direct + indirect address range by
//! construction. The first two slots of every directory are the reserved
//! `.` and `..` bindings.

use crate::fs::FileSystem;
use crate::fs::error::FsError;
use crate::fs::error::Result;
use crate::fs::inode::FileType;
use crate::fs::inode::Inode;

/// Size of one directory entry on disk.
pub const ENTRY_SIZE: usize = 16;
/// Longest entry name in bytes; shorter names are NUL-padded.
pub const MAX_NAME_LEN: usize = 12;

/// One directory record binding a name to an inode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    /// The bound inode; 0 means "does not exist" in resolver results.
    pub inode_id: u32,
    pub name: String,
}

impl Entry {
    pub(crate) fn encode(&self) -> [u8; ENTRY_SIZE] {
        let mut raw = [0u8; ENTRY_SIZE];
        raw[0..4].copy_from_slice(&self.inode_id.to_le_bytes());
        raw[4..4 + self.name.len()].copy_from_slice(self.name.as_bytes());
        raw
    }

    pub(crate) fn decode(raw: &[u8]) -> Self {
        let name_end = raw[4..ENTRY_SIZE]
            .iter()
            .position(|b| *b == 0)
            .map(|i| 4 + i)
            .unwrap_or(ENTRY_SIZE);
        Self {
            inode_id: u32::from_le_bytes(raw[0..4].try_into().unwrap()),
            name: String::from_utf8_lossy(&raw[4..name_end]).into_owned(),
        }
    }
}

/// Checks a candidate entry name against the fixed-record constraints.
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN || name.contains('/') {
        return Err(FsError::CannotCreateFile);
    }
    Ok(())
}

/// Orders listings: `.` first, then `..`, directories before regular files,
/// then lexicographic by name.
pub fn sort_entries(entries: &mut [(FileType, String)]) {
    fn class(entry: &(FileType, String)) -> u8 {
        match (entry.1.as_str(), entry.0) {
            (".", _) => 0,
            ("..", _) => 1,
            (_, FileType::Directory) => 2,
            _ => 3,
        }
    }
    entries.sort_by(|a, b| class(a).cmp(&class(b)).then_with(|| a.1.cmp(&b.1)));
}

impl FileSystem {
    /// Returns the full entry array of the directory `dir_id`.
    pub(crate) fn dir_entries(&mut self, dir_id: u32) -> Result<Vec<Entry>> {
        let dir = self.inode_read(dir_id)?;
        if dir.file_type != FileType::Directory {
            return Err(FsError::PathNotFound);
        }
        let raw = self.read_data(&dir)?;
        Ok(raw.chunks_exact(ENTRY_SIZE).map(Entry::decode).collect())
    }

    /// Finds the entry bound to `name`, if any.
    pub(crate) fn dir_lookup(&mut self, dir_id: u32, name: &str) -> Result<Option<Entry>> {
        Ok(self
            .dir_entries(dir_id)?
            .into_iter()
            .find(|e| e.name == name))
    }

    /// Finds the entry binding the inode `id`, skipping the reserved
    /// entries. This is how a directory's own name is recovered from its
    /// parent.
    pub(crate) fn dir_lookup_id(&mut self, dir_id: u32, id: u32) -> Result<Option<Entry>> {
        Ok(self
            .dir_entries(dir_id)?
            .into_iter()
            .find(|e| e.inode_id == id && e.name != "." && e.name != ".."))
    }

    /// Appends `entry` to the directory, bumping the directory's link
    /// counter when the entry names a subdirectory.
    pub(crate) fn add_entry(&mut self, dir_id: u32, entry: &Entry) -> Result<()> {
        validate_name(&entry.name)?;
        let mut dir = self.inode_read(dir_id)?;
        if dir.file_type != FileType::Directory {
            return Err(FsError::PathNotFound);
        }
        if self.dir_lookup(dir_id, &entry.name)?.is_some() {
            return Err(FsError::Exists);
        }
        if self.inode_read(entry.inode_id)?.file_type == FileType::Directory {
            dir.hard_links = dir.hard_links.saturating_add(1);
        }
        self.write_data(&mut dir, &entry.encode(), true)
    }

    /// Removes the slot bound to `name`, compacting the array with its tail
    /// entry. Link counters are left untouched; `mv` re-binds the same
    /// inode elsewhere.
    pub(crate) fn detach_entry(&mut self, dir_id: u32, name: &str) -> Result<Entry> {
        let mut entries = self.dir_entries(dir_id)?;
        let index = entries
            .iter()
            .position(|e| e.name == name)
            .ok_or(FsError::FileNotFound)?;
        let removed = entries.swap_remove(index);
        let mut raw = Vec::with_capacity(entries.len() * ENTRY_SIZE);
        for entry in &entries {
            raw.extend_from_slice(&entry.encode());
        }
        let mut dir = self.inode_read(dir_id)?;
        self.write_data(&mut dir, &raw, false)?;
        Ok(removed)
    }

    /// Unbinds `name` from the directory, freeing a regular inode that
    /// loses its last link. The reserved entries cannot be removed.
    pub(crate) fn remove_entry(&mut self, dir_id: u32, name: &str) -> Result<()> {
        if matches!(name, "." | ".." | "/") {
            return Err(FsError::FileNotFound);
        }
        let entry = self.detach_entry(dir_id, name)?;
        let mut target = self.inode_read(entry.inode_id)?;
        target.hard_links = target.hard_links.saturating_sub(1);
        if target.hard_links == 0 && target.file_type == FileType::Regular {
            self.inode_free(target.id)
        } else {
            self.inode_write(&target)
        }
    }

    /// Removes the subdirectory `name`, which must hold nothing besides its
    /// reserved entries.
    pub(crate) fn remove_dir(&mut self, parent_id: u32, name: &str) -> Result<()> {
        if matches!(name, "." | ".." | "/") {
            return Err(FsError::FileNotFound);
        }
        let entry = self
            .dir_lookup(parent_id, name)?
            .ok_or(FsError::FileNotFound)?;
        let child = self.inode_read(entry.inode_id)?;
        if child.file_type != FileType::Directory {
            return Err(FsError::FileNotFound);
        }
        if child.file_size as usize != 2 * ENTRY_SIZE {
            return Err(FsError::NotEmpty);
        }
        self.detach_entry(parent_id, name)?;
        self.inode_free(child.id)?;
        let mut parent = self.inode_read(parent_id)?;
        parent.hard_links = parent.hard_links.saturating_sub(1);
        self.inode_write(&parent)
    }

    /// Creates an empty directory named `name` under `parent_id`.
    ///
    /// The root passes `is_root` and becomes its own parent; no entry is
    /// added anywhere else for it.
    pub(crate) fn create_empty_dir(
        &mut self,
        parent_id: u32,
        name: &str,
        is_root: bool,
    ) -> Result<Inode> {
        if !is_root {
            validate_name(name)?;
            let parent = self.inode_read(parent_id)?;
            if parent.file_type != FileType::Directory {
                return Err(FsError::PathNotFound);
            }
            if self.dir_lookup(parent_id, name)?.is_some() {
                return Err(FsError::Exists);
            }
        }
        let mut dir = self.inode_create()?;
        dir.file_type = FileType::Directory;
        self.inode_write(&dir)?;
        let parent_ref = if is_root { dir.id } else { parent_id };
        self.add_entry(
            dir.id,
            &Entry {
                inode_id: dir.id,
                name: ".".to_owned(),
            },
        )?;
        self.add_entry(
            dir.id,
            &Entry {
                inode_id: parent_ref,
                name: "..".to_owned(),
            },
        )?;
        if !is_root {
            self.add_entry(
                parent_id,
                &Entry {
                    inode_id: dir.id,
                    name: name.to_owned(),
                },
            )?;
        }
        self.inode_read(dir.id)
    }

    /// Creates an empty regular file named `name` under `parent_id`.
    pub(crate) fn create_empty_file(&mut self, parent_id: u32, name: &str) -> Result<Inode> {
        validate_name(name)?;
        let parent = self.inode_read(parent_id)?;
        if parent.file_type != FileType::Directory {
            return Err(FsError::PathNotFound);
        }
        if self.dir_lookup(parent_id, name)?.is_some() {
            return Err(FsError::Exists);
        }
        let mut inode = self.inode_create()?;
        inode.file_type = FileType::Regular;
        inode.hard_links = 1;
        self.inode_write(&inode)?;
        self.add_entry(
            parent_id,
            &Entry {
                inode_id: inode.id,
                name: name.to_owned(),
            },
        )?;
        Ok(inode)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fs::ROOT_INODE;
    use crate::fs::testutil::temp_fs;

    #[test]
    fn entry_record_round_trip() {
        let entry = Entry {
            inode_id: 42,
            name: "notes.txt".to_owned(),
        };
        let raw = entry.encode();
        assert_eq!(u32::from_le_bytes(raw[0..4].try_into().unwrap()), 42);
        assert_eq!(&raw[4..13], b"notes.txt");
        assert_eq!(&raw[13..], b"\0\0\0");
        assert_eq!(Entry::decode(&raw), entry);
    }

    #[test]
    fn entry_name_may_fill_all_twelve_bytes() {
        let entry = Entry {
            inode_id: 7,
            name: "abcdefghijkl".to_owned(),
        };
        assert_eq!(Entry::decode(&entry.encode()), entry);
    }

    #[test]
    fn fresh_directory_has_reserved_entries() {
        let (mut fs, _img) = temp_fs(600 * 1024);
        let dir = fs.create_empty_dir(ROOT_INODE, "sub", false).unwrap();
        let entries = fs.dir_entries(dir.id).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], Entry { inode_id: dir.id, name: ".".to_owned() });
        assert_eq!(entries[1], Entry { inode_id: ROOT_INODE, name: "..".to_owned() });
        // `.` and `..` both bind a directory
        assert_eq!(dir.hard_links, 2);
    }

    #[test]
    fn subdirectory_bumps_the_parent_link_count() {
        let (mut fs, _img) = temp_fs(600 * 1024);
        let before = fs.inode_read(ROOT_INODE).unwrap().hard_links;
        fs.create_empty_dir(ROOT_INODE, "sub", false).unwrap();
        let after = fs.inode_read(ROOT_INODE).unwrap().hard_links;
        assert_eq!(after, before + 1);
        fs.remove_dir(ROOT_INODE, "sub").unwrap();
        assert_eq!(fs.inode_read(ROOT_INODE).unwrap().hard_links, before);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let (mut fs, _img) = temp_fs(600 * 1024);
        fs.create_empty_file(ROOT_INODE, "twice").unwrap();
        assert!(matches!(
            fs.create_empty_file(ROOT_INODE, "twice"),
            Err(FsError::Exists)
        ));
        assert!(matches!(
            fs.create_empty_dir(ROOT_INODE, "twice", false),
            Err(FsError::Exists)
        ));
    }

    #[test]
    fn invalid_names_are_rejected() {
        let (mut fs, _img) = temp_fs(600 * 1024);
        for name in ["", "a/b", "longerthan12char"] {
            assert!(
                matches!(
                    fs.create_empty_file(ROOT_INODE, name),
                    Err(FsError::CannotCreateFile)
                ),
                "name {name:?} should be rejected"
            );
        }
    }

    #[test]
    fn files_under_a_file_are_rejected() {
        let (mut fs, _img) = temp_fs(600 * 1024);
        let file = fs.create_empty_file(ROOT_INODE, "f").unwrap();
        assert!(matches!(
            fs.create_empty_file(file.id, "child"),
            Err(FsError::PathNotFound)
        ));
    }

    #[test]
    fn remove_entry_compacts_with_the_tail() {
        let (mut fs, _img) = temp_fs(600 * 1024);
        for name in ["a", "b", "c"] {
            fs.create_empty_file(ROOT_INODE, name).unwrap();
        }
        fs.remove_entry(ROOT_INODE, "a").unwrap();
        let entries = fs.dir_entries(ROOT_INODE).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        // the tail entry `c` took the freed slot
        assert_eq!(names, [".", "..", "c", "b"]);
        assert_eq!(
            fs.inode_read(ROOT_INODE).unwrap().file_size as usize,
            4 * ENTRY_SIZE
        );
    }

    #[test]
    fn removing_the_last_link_frees_the_inode() {
        let (mut fs, _img) = temp_fs(600 * 1024);
        let inode = fs.create_empty_file(ROOT_INODE, "gone").unwrap();
        let free = fs.sb().unwrap().free_inode_count;
        fs.remove_entry(ROOT_INODE, "gone").unwrap();
        assert_eq!(fs.sb().unwrap().free_inode_count, free + 1);
        assert!(matches!(fs.inode_read(inode.id), Err(FsError::FileNotFound)));
    }

    #[test]
    fn reserved_entries_cannot_be_removed() {
        let (mut fs, _img) = temp_fs(600 * 1024);
        assert!(matches!(
            fs.remove_entry(ROOT_INODE, "."),
            Err(FsError::FileNotFound)
        ));
        assert!(matches!(
            fs.remove_entry(ROOT_INODE, ".."),
            Err(FsError::FileNotFound)
        ));
    }

    #[test]
    fn remove_dir_requires_an_empty_directory() {
        let (mut fs, _img) = temp_fs(600 * 1024);
        let sub = fs.create_empty_dir(ROOT_INODE, "sub", false).unwrap();
        fs.create_empty_file(sub.id, "f").unwrap();
        assert!(matches!(
            fs.remove_dir(ROOT_INODE, "sub"),
            Err(FsError::NotEmpty)
        ));
        fs.remove_entry(sub.id, "f").unwrap();
        fs.remove_dir(ROOT_INODE, "sub").unwrap();
        assert!(fs.dir_lookup(ROOT_INODE, "sub").unwrap().is_none());
    }

    #[test]
    fn detach_keeps_the_inode_alive() {
        let (mut fs, _img) = temp_fs(600 * 1024);
        let inode = fs.create_empty_file(ROOT_INODE, "kept").unwrap();
        let removed = fs.detach_entry(ROOT_INODE, "kept").unwrap();
        assert_eq!(removed.inode_id, inode.id);
        assert!(fs.inode_read(inode.id).is_ok());
        assert!(fs.dir_lookup(ROOT_INODE, "kept").unwrap().is_none());
    }

    #[test]
    fn listing_order() {
        let mut entries = vec![
            (FileType::Regular, "zeta".to_owned()),
            (FileType::Directory, "..".to_owned()),
            (FileType::Regular, "alpha".to_owned()),
            (FileType::Directory, "mid".to_owned()),
            (FileType::Directory, ".".to_owned()),
            (FileType::Directory, "abc".to_owned()),
        ];
        sort_entries(&mut entries);
        let names: Vec<&str> = entries.iter().map(|e| e.1.as_str()).collect();
        assert_eq!(names, [".", "..", "abc", "mid", "alpha", "zeta"]);
    }
}
