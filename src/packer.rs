//! `Packer`: walks a [`ResourceTree`], populates a container's entry tree,
//! and appends file payloads (spec §4.4).

use std::path::Path;

use tracing::debug;

use crate::buffer::ByteBuffer;
use crate::container::KxrContainer;
use crate::entry::EntryNode;
use crate::error::{Error, Result};
use crate::resource::{ResourceNode, ResourceTree};

const ZLIB_LEVEL: u32 = 5;

/// One file-packed notification, handed to an optional progress callback.
#[derive(Debug, Clone)]
pub struct PackProgress {
    pub current: usize,
    pub total: usize,
    pub name: String,
    pub bytes_written: u64,
}

/// Packs a source directory into a new `.kxr` container.
///
/// Refuses to overwrite an existing output file (spec §4.4); the caller
/// (the CLI) is responsible for the interactive confirm-and-delete flow.
#[derive(Default)]
pub struct Packer {
    progress: Option<Box<dyn FnMut(PackProgress)>>,
}

impl Packer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback invoked once per file as it's packed.
    #[must_use]
    pub fn with_progress(mut self, callback: impl FnMut(PackProgress) + 'static) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Packs `source_dir` into `output`, returning the resulting container.
    pub fn pack(&mut self, source_dir: &Path, output: &Path) -> Result<KxrContainer> {
        if output.exists() {
            return Err(Error::AlreadyExists(output.to_path_buf()));
        }

        let tree = ResourceTree::from_dir(source_dir)?;
        let mut container = KxrContainer::open(output)?;

        let total = count_files(&tree.children);
        let mut current = 0usize;
        let mut noop = |_: PackProgress| {};
        let progress: &mut dyn FnMut(PackProgress) =
            self.progress.as_deref_mut().unwrap_or(&mut noop);

        for child in &tree.children {
            let entry = pack_node(&mut container, child, &tree.root_name, progress, &mut current, total)?;
            container.root_mut().insert(entry);
        }

        container.save()?;
        Ok(container)
    }
}

fn count_files(nodes: &[ResourceNode]) -> usize {
    nodes
        .iter()
        .map(|node| match node {
            ResourceNode::File(_) => 1,
            ResourceNode::Dir(dir) => count_files(&dir.children),
        })
        .sum()
}

fn pack_node(
    container: &mut KxrContainer,
    node: &ResourceNode,
    parent_path: &str,
    progress: &mut dyn FnMut(PackProgress),
    current: &mut usize,
    total: usize,
) -> Result<EntryNode> {
    match node {
        ResourceNode::Dir(dir) => {
            let path = format!("{parent_path}/{}", dir.name);
            debug!(path, "packing directory");
            let mut entry = EntryNode::directory(dir.name.clone(), 0, 0);
            for child in &dir.children {
                let child_entry = pack_node(container, child, &path, progress, current, total)?;
                entry.insert(child_entry);
            }
            Ok(entry)
        }
        ResourceNode::File(file) => {
            let path = format!("{parent_path}/{}", file.name);
            let bytes = std::fs::read(&file.path)?;
            let mut buf = ByteBuffer::from_bytes(bytes);
            let offset = container.datasize();

            let zipped = file.compress;
            if zipped {
                buf.compress(ZLIB_LEVEL)?;
            } else {
                buf.crypt(container.passhash() ^ offset);
            }

            let size = buf.size() as u32;
            let written_at = container.allocate(size);
            debug_assert_eq!(written_at, offset);
            container.write_to_kxr(written_at, buf.buffer())?;
            debug!(path, offset = written_at, size, zipped, "packed file");

            *current += 1;
            progress(PackProgress {
                current: *current,
                total,
                name: file.name.clone(),
                bytes_written: u64::from(size),
            });

            Ok(EntryNode::file(file.name.clone(), 0, 0, false, written_at, size, zipped))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn refuses_to_overwrite_existing_output() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("demo");
        fs::create_dir(&source).unwrap();
        let output = dir.path().join("demo.kxr");
        fs::write(&output, b"existing").unwrap();

        let err = Packer::new().pack(&source, &output).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[test]
    fn packs_empty_directory() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("demo");
        fs::create_dir(&source).unwrap();
        let output = dir.path().join("demo.kxr");

        let container = Packer::new().pack(&source, &output).unwrap();
        assert_eq!(container.datasize(), 48);
        assert_eq!(container.root().name, "demo");
        assert_eq!(container.root().children().unwrap().len(), 0);
    }

    #[test]
    fn packs_nested_tree_with_mixed_compression() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("demo");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("hello.txt"), b"Hello, world!\n").unwrap();
        fs::create_dir(source.join("sub")).unwrap();
        fs::write(source.join("sub").join("img.png"), [0xABu8; 256]).unwrap();

        let output = dir.path().join("demo.kxr");
        let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let seen_handle = seen.clone();
        let container = Packer::new()
            .with_progress(move |p| seen_handle.borrow_mut().push(p.name))
            .pack(&source, &output)
            .unwrap();

        assert_eq!(*seen.borrow(), vec!["hello.txt", "img.png"]);

        let root = container.root();
        let txt = root.children().unwrap().get("hello.txt").unwrap();
        assert!(txt.zipped());
        assert_eq!(txt.offset(), Some(48));

        let sub = root.children().unwrap().get("sub").unwrap();
        assert!(sub.is_dir());
        let img = sub.children().unwrap().get("img.png").unwrap();
        assert!(!img.zipped());
        assert_eq!(img.size(), Some(256));
    }
}
