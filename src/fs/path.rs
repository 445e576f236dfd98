//! Path resolution: slash-separated paths to (parent, leaf) entries.

use crate::fs::FREE_INODE;
use crate::fs::FileSystem;
use crate::fs::dir::Entry;
use crate::fs::error::Result;
use crate::fs::inode::FileType;

/// Outcome of resolving a path.
///
/// Both sides are entry-shaped; an `inode_id` of 0 means "does not exist".
/// A missing intermediate component empties both sides, while a missing
/// final component keeps a valid parent, which is the signal `mkdir` and
/// copy destinations rely on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolved {
    pub parent: Entry,
    pub leaf: Entry,
}

impl Resolved {
    fn missing() -> Self {
        let empty = Entry {
            inode_id: FREE_INODE,
            name: String::new(),
        };
        Self {
            parent: empty.clone(),
            leaf: empty,
        }
    }
}

impl FileSystem {
    /// Resolves `path` from the root (absolute) or the working directory.
    ///
    /// `.` and `..` are ordinary lookups through the directory entries, not
    /// resolver specials.
    pub(crate) fn parse_path(&mut self, path: &str) -> Result<Resolved> {
        let seed = if path.starts_with('/') {
            Entry {
                inode_id: self.root,
                name: "/".to_owned(),
            }
        } else {
            Entry {
                inode_id: self.cwd,
                name: ".".to_owned(),
            }
        };
        let mut parent = seed.clone();
        let mut current = seed;
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        for (i, segment) in segments.iter().enumerate() {
            // only a directory can be descended into
            let inode = self.inode_read(current.inode_id)?;
            if inode.file_type != FileType::Directory {
                return Ok(Resolved::missing());
            }
            let found = self.dir_lookup(current.inode_id, segment)?;
            parent = current;
            current = found.unwrap_or(Entry {
                inode_id: FREE_INODE,
                name: (*segment).to_owned(),
            });
            if current.inode_id == FREE_INODE && i + 1 < segments.len() {
                return Ok(Resolved::missing());
            }
        }
        Ok(Resolved {
            parent,
            leaf: current,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fs::ROOT_INODE;
    use crate::fs::testutil::temp_fs;

    #[test]
    fn bare_slash_is_the_root_twice() {
        let (mut fs, _img) = temp_fs(600 * 1024);
        let r = fs.parse_path("/").unwrap();
        assert_eq!(r.parent.inode_id, ROOT_INODE);
        assert_eq!(r.leaf.inode_id, ROOT_INODE);
        assert_eq!(r.leaf.name, "/");
    }

    #[test]
    fn absolute_walk() {
        let (mut fs, _img) = temp_fs(600 * 1024);
        fs.mkdir("/a").unwrap();
        fs.mkdir("/a/b").unwrap();
        let r = fs.parse_path("/a/b").unwrap();
        assert_ne!(r.leaf.inode_id, FREE_INODE);
        assert_eq!(r.leaf.name, "b");
        assert_eq!(r.parent.name, "a");
    }

    #[test]
    fn relative_walk_uses_the_working_directory() {
        let (mut fs, _img) = temp_fs(600 * 1024);
        fs.mkdir("/a").unwrap();
        fs.mkdir("/a/b").unwrap();
        fs.cd("/a").unwrap();
        let relative = fs.parse_path("b").unwrap();
        let absolute = fs.parse_path("/a/b").unwrap();
        assert_eq!(relative.leaf.inode_id, absolute.leaf.inode_id);
    }

    #[test]
    fn missing_leaf_keeps_the_parent() {
        let (mut fs, _img) = temp_fs(600 * 1024);
        fs.mkdir("/a").unwrap();
        let r = fs.parse_path("/a/new").unwrap();
        assert_ne!(r.parent.inode_id, FREE_INODE);
        assert_eq!(r.parent.name, "a");
        assert_eq!(r.leaf.inode_id, FREE_INODE);
        assert_eq!(r.leaf.name, "new");
    }

    #[test]
    fn missing_intermediate_empties_both_sides() {
        let (mut fs, _img) = temp_fs(600 * 1024);
        let r = fs.parse_path("/a/b/c").unwrap();
        assert_eq!(r, Resolved::missing());
    }

    #[test]
    fn a_file_cannot_be_descended_into() {
        let (mut fs, _img) = temp_fs(600 * 1024);
        fs.create_empty_file(ROOT_INODE, "f").unwrap();
        let r = fs.parse_path("/f/x").unwrap();
        assert_eq!(r, Resolved::missing());
    }

    #[test]
    fn dot_entries_resolve_through_the_directory() {
        let (mut fs, _img) = temp_fs(600 * 1024);
        fs.mkdir("/a").unwrap();
        let up = fs.parse_path("/a/..").unwrap();
        assert_eq!(up.leaf.inode_id, ROOT_INODE);
        let root_up = fs.parse_path("/..").unwrap();
        assert_eq!(root_up.leaf.inode_id, ROOT_INODE);
        fs.cd("/a").unwrap();
        let here = fs.parse_path(".").unwrap();
        assert_eq!(here.leaf.inode_id, fs.cwd());
    }

    #[test]
    fn repeated_separators_collapse() {
        let (mut fs, _img) = temp_fs(600 * 1024);
        fs.mkdir("/a").unwrap();
        let r = fs.parse_path("//a/").unwrap();
        assert_eq!(r.leaf.name, "a");
        assert_ne!(r.leaf.inode_id, FREE_INODE);
    }
}
