//! The recursive entry tree embedded in a kxr container's header region.

use std::collections::HashMap;

use bitflags::bitflags;

use crate::buffer::ByteBuffer;
use crate::error::{Error, Result};

bitflags! {
    /// The single flags byte that precedes every entry's type-specific tail.
    ///
    /// Computed as the straightforward bitwise OR of the three bits (spec
    /// §9, REDESIGN FLAG: the reference implementation's expression parses
    /// by operator precedence into something other than this OR, which we
    /// do not reproduce). The read path accepts any byte; only ROOT forces
    /// `LOCKED`/`ZIPPED` back to unset regardless of what was stored.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EntryFlags: u8 {
        const DIR = 1 << 0;
        const LOCKED = 1 << 1;
        const ZIPPED = 1 << 2;
    }
}

/// An ordered `name -> EntryNode` mapping: iteration order is insertion
/// order, and inserting an existing name overwrites its value in place
/// without moving it (spec §3: "insertions overwrite").
#[derive(Debug, Clone, Default)]
pub struct Children {
    order: Vec<String>,
    map: HashMap<String, EntryNode>,
}

impl Children {
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn insert(&mut self, node: EntryNode) {
        let name = node.name.clone();
        if !self.map.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.map.insert(name, node);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&EntryNode> {
        self.map.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut EntryNode> {
        self.map.get_mut(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntryNode> {
        self.order.iter().map(move |name| &self.map[name])
    }
}

/// The three entry variants from spec §3. `Root`/`Directory` carry an
/// ordered child map; `File` carries its payload region coordinates.
#[derive(Debug, Clone)]
pub enum EntryKind {
    Root(Children),
    Directory(Children),
    File { offset: u32, size: u32 },
}

/// One node of the recursive entry tree.
///
/// Setter-once fields from spec §9 (`locked`, `zipped`, `is_dir`, `size`)
/// are fixed at construction time; there is no in-place mutation once a node
/// exists. `parent` is deliberately not stored — tree walks thread an
/// accumulated path string instead (see [`crate::resource`]).
#[derive(Debug, Clone)]
pub struct EntryNode {
    pub name: String,
    pub created: i32,
    pub updated: i32,
    locked: bool,
    zipped: bool,
    pub kind: EntryKind,
}

/// Folder/file/zipped-file counts over a subtree, used for the CLI's
/// pre-flight and post-flight summary blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeSummary {
    pub folders: usize,
    pub files: usize,
    pub zipped_files: usize,
}

impl EntryNode {
    #[must_use]
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created: 0,
            updated: 0,
            locked: false,
            zipped: false,
            kind: EntryKind::Root(Children::default()),
        }
    }

    #[must_use]
    pub fn directory(name: impl Into<String>, created: i32, updated: i32) -> Self {
        Self {
            name: name.into(),
            created,
            updated,
            locked: false,
            zipped: false,
            kind: EntryKind::Directory(Children::default()),
        }
    }

    #[must_use]
    pub fn file(
        name: impl Into<String>,
        created: i32,
        updated: i32,
        locked: bool,
        offset: u32,
        size: u32,
        zipped: bool,
    ) -> Self {
        Self {
            name: name.into(),
            created,
            updated,
            locked,
            zipped,
            kind: EntryKind::File { offset, size },
        }
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, EntryKind::Root(_) | EntryKind::Directory(_))
    }

    #[must_use]
    pub fn locked(&self) -> bool {
        self.locked
    }

    #[must_use]
    pub fn zipped(&self) -> bool {
        self.zipped
    }

    #[must_use]
    pub fn offset(&self) -> Option<u32> {
        match self.kind {
            EntryKind::File { offset, .. } => Some(offset),
            _ => None,
        }
    }

    #[must_use]
    pub fn size(&self) -> Option<u32> {
        match self.kind {
            EntryKind::File { size, .. } => Some(size),
            _ => None,
        }
    }

    #[must_use]
    pub fn children(&self) -> Option<&Children> {
        match &self.kind {
            EntryKind::Root(children) | EntryKind::Directory(children) => Some(children),
            EntryKind::File { .. } => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Children> {
        match &mut self.kind {
            EntryKind::Root(children) | EntryKind::Directory(children) => Some(children),
            EntryKind::File { .. } => None,
        }
    }

    pub fn insert(&mut self, child: EntryNode) {
        if let Some(children) = self.children_mut() {
            children.insert(child);
        }
    }

    fn flags(&self) -> EntryFlags {
        let mut flags = EntryFlags::empty();
        if self.is_dir() {
            flags |= EntryFlags::DIR;
        }
        if self.locked {
            flags |= EntryFlags::LOCKED;
        }
        if self.zipped {
            flags |= EntryFlags::ZIPPED;
        }
        flags
    }

    /// Recursively encode this node into `buf` (spec §4.2). Children are
    /// written in their insertion order.
    pub fn encode(&self, buf: &mut ByteBuffer) -> Result<()> {
        buf.put_string(&self.name)?;
        buf.put_i32(self.created)?;
        buf.put_i32(self.updated)?;
        buf.put_u8(self.flags().bits())?;

        match &self.kind {
            EntryKind::Root(children) | EntryKind::Directory(children) => {
                let count: i16 = children
                    .len()
                    .try_into()
                    .map_err(|_| Error::NameTooLong(i16::MAX as usize))?;
                buf.put_i16(count)?;
                for child in children.iter() {
                    child.encode(buf)?;
                }
            }
            EntryKind::File { offset, size } => {
                buf.put_i32(*offset as i32)?;
                buf.put_i32(*size as i32)?;
            }
        }

        Ok(())
    }

    /// Recursively decode one node from `buf`. `is_root` marks the
    /// outermost call; `matched_name` is substituted for an empty stored
    /// root name (spec §4.2, read rule for the root).
    pub fn decode(buf: &mut ByteBuffer, is_root: bool, matched_name: &str) -> Result<Self> {
        let stored_name = buf.get_string()?;
        let name = if is_root && stored_name.is_empty() {
            matched_name.to_string()
        } else {
            stored_name
        };
        let created = buf.get_i32()?;
        let updated = buf.get_i32()?;
        let flags = EntryFlags::from_bits_truncate(buf.get_u8()?);

        let is_dir = is_root || flags.contains(EntryFlags::DIR);
        let locked = !is_root && flags.contains(EntryFlags::LOCKED);
        let zipped = !is_root && flags.contains(EntryFlags::ZIPPED);

        let kind = if is_dir {
            let num_children = buf.get_i16()? as u16 as usize;
            let mut children = Children::default();
            for _ in 0..num_children {
                children.insert(Self::decode(buf, false, matched_name)?);
            }
            if is_root {
                EntryKind::Root(children)
            } else {
                EntryKind::Directory(children)
            }
        } else {
            let offset = buf.get_i32()? as u32;
            let size = buf.get_i32()? as u32;
            EntryKind::File { offset, size }
        };

        Ok(Self {
            name,
            created,
            updated,
            locked,
            zipped,
            kind,
        })
    }

    /// Folder/file/zipped-file counts for this subtree.
    #[must_use]
    pub fn summary(&self) -> TreeSummary {
        let mut summary = TreeSummary::default();
        self.accumulate_summary(&mut summary);
        summary
    }

    fn accumulate_summary(&self, summary: &mut TreeSummary) {
        if let Some(children) = self.children() {
            for child in children.iter() {
                if child.is_dir() {
                    summary.folders += 1;
                    child.accumulate_summary(summary);
                } else {
                    summary.files += 1;
                    if child.zipped {
                        summary.zipped_files += 1;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_empty_root() {
        let root = EntryNode::root("demo");
        let mut buf = ByteBuffer::new();
        root.encode(&mut buf).unwrap();
        // 2 (u16 name_length) + 4 ("demo") + 4 (created) + 4 (updated)
        // + 1 (flags) + 2 (i16 num_children) = 17 bytes.
        assert_eq!(buf.size(), 17);

        buf.set_pos(0);
        let decoded = EntryNode::decode(&mut buf, true, "demo").unwrap();
        assert_eq!(decoded.name, "demo");
        assert!(decoded.is_dir());
        assert!(!decoded.locked());
        assert!(!decoded.zipped());
        assert_eq!(decoded.children().unwrap().len(), 0);
    }

    #[test]
    fn insertion_order_is_preserved_and_overwrite_keeps_position() {
        let mut root = EntryNode::root("demo");
        root.insert(EntryNode::file("a.txt", 0, 0, false, 48, 10, true));
        root.insert(EntryNode::file("b.txt", 0, 0, false, 58, 20, true));
        root.insert(EntryNode::file("a.txt", 0, 0, false, 99, 1, false));

        let names: Vec<&str> = root
            .children()
            .unwrap()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, ["a.txt", "b.txt"]);
        assert_eq!(root.children().unwrap().get("a.txt").unwrap().offset(), Some(99));
    }

    #[test]
    fn empty_stored_root_name_falls_back_to_matched_name() {
        let mut buf = ByteBuffer::new();
        buf.put_string("").unwrap();
        buf.put_i32(0).unwrap();
        buf.put_i32(0).unwrap();
        buf.put_u8(EntryFlags::DIR.bits()).unwrap();
        buf.put_i16(0).unwrap();

        buf.set_pos(0);
        let decoded = EntryNode::decode(&mut buf, true, "fallback").unwrap();
        assert_eq!(decoded.name, "fallback");
    }

    #[test]
    fn root_ignores_locked_and_zipped_bits() {
        let mut buf = ByteBuffer::new();
        buf.put_string("demo").unwrap();
        buf.put_i32(0).unwrap();
        buf.put_i32(0).unwrap();
        buf.put_u8((EntryFlags::DIR | EntryFlags::LOCKED | EntryFlags::ZIPPED).bits())
            .unwrap();
        buf.put_i16(0).unwrap();

        buf.set_pos(0);
        let decoded = EntryNode::decode(&mut buf, true, "demo").unwrap();
        assert!(!decoded.locked());
        assert!(!decoded.zipped());
    }
}
