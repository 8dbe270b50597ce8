//! `ResourceTree`: an in-memory mirror of an on-disk source directory,
//! ready to be handed to [`crate::packer::Packer`].

use std::fs;
use std::path::{Path, PathBuf};

use crate::entry::TreeSummary;
use crate::error::{Error, Result};
use crate::file_type::{extension_of, needs_compress};

/// A single file discovered under a source directory.
#[derive(Debug, Clone)]
pub struct ResourceFile {
    pub name: String,
    pub path: PathBuf,
    pub compress: bool,
}

/// A directory discovered under a source directory, with its children in
/// the order `std::fs::read_dir` yielded them.
#[derive(Debug, Clone)]
pub struct ResourceDir {
    pub name: String,
    pub children: Vec<ResourceNode>,
}

/// One node of the source-directory mirror: either a file or a subdirectory.
#[derive(Debug, Clone)]
pub enum ResourceNode {
    File(ResourceFile),
    Dir(ResourceDir),
}

impl ResourceNode {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::File(f) => &f.name,
            Self::Dir(d) => &d.name,
        }
    }
}

/// Walks `source_dir` on disk and builds an in-memory tree mirroring its
/// structure. Each file's `compress` flag is derived from its extension via
/// [`crate::file_type`].
#[derive(Debug, Clone)]
pub struct ResourceTree {
    pub root_name: String,
    pub children: Vec<ResourceNode>,
}

impl ResourceTree {
    /// Builds a `ResourceTree` from an existing directory on disk.
    pub fn from_dir(source_dir: &Path) -> Result<Self> {
        if !source_dir.exists() {
            return Err(Error::SourceNotFound(source_dir.to_path_buf()));
        }
        if !source_dir.is_dir() {
            return Err(Error::NotADirectory(source_dir.to_path_buf()));
        }

        let root_name = source_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let children = read_children(source_dir)?;

        Ok(Self { root_name, children })
    }

    /// Folder/file/will-be-zipped counts, computed up front from each
    /// file's extension so the CLI can print a pre-flight summary before
    /// any bytes are read or written (mirrors `kxrlib`'s
    /// `resource_summary`/`generate_resource_summary_block`).
    #[must_use]
    pub fn summary(&self) -> TreeSummary {
        let mut summary = TreeSummary::default();
        accumulate_summary(&self.children, &mut summary);
        summary
    }
}

fn accumulate_summary(nodes: &[ResourceNode], summary: &mut TreeSummary) {
    for node in nodes {
        match node {
            ResourceNode::Dir(dir) => {
                summary.folders += 1;
                accumulate_summary(&dir.children, summary);
            }
            ResourceNode::File(file) => {
                summary.files += 1;
                if file.compress {
                    summary.zipped_files += 1;
                }
            }
        }
    }
}

fn read_children(dir: &Path) -> Result<Vec<ResourceNode>> {
    let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<std::io::Result<_>>()?;
    entries.sort_by_key(std::fs::DirEntry::file_name);

    let mut nodes = Vec::with_capacity(entries.len());
    for entry in entries {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            let children = read_children(&path)?;
            nodes.push(ResourceNode::Dir(ResourceDir { name, children }));
        } else if file_type.is_file() {
            let extension = extension_of(&name);
            let compress = needs_compress(&extension);
            nodes.push(ResourceNode::File(ResourceFile {
                name,
                path,
                compress,
            }));
        }
        // symlinks and other special files are skipped; the reference format
        // has no representation for them.
    }

    Ok(nodes)
}
