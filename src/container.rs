//! `KxrContainer`: owns a `.kxr` file on disk (spec §4.3).

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::OnceLock;

use regex::Regex;

use crate::buffer::ByteBuffer;
use crate::cc::make_four;
use crate::entry::EntryNode;
use crate::error::{Error, Result};

const KXRF_MAGIC: u32 = make_four(b"kxrf");
const PROLOG_SIZE: u64 = 16;
const STAMPDATA_SIZE: u64 = 32;
const INITIAL_DATASIZE: u32 = (PROLOG_SIZE + STAMPDATA_SIZE) as u32;

fn kxr_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([a-zA-Z0-9_]+?)(?:-\w{4})?\.kxr$").unwrap())
}

/// Extracts the "matched name" (capture group 1) from a `.kxr` file's
/// basename, per spec §6. Returns an error if the basename does not satisfy
/// the KXR filename regex.
pub fn matched_name(path: &Path) -> Result<String> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| Error::InvalidFilename(path.display().to_string()))?;
    kxr_name_pattern()
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| Error::InvalidFilename(file_name.to_string()))
}

/// Owns the on-disk `.kxr` container: the fixed prolog, the payload region,
/// and the obfuscated entry tree.
///
/// The backing file handle is wrapped in a [`Mutex`] so that
/// [`read_from_kxr`]/[`write_to_kxr`] serialize seek-plus-I/O against each
/// other without requiring the whole pack/unpack operation to hold a lock
/// (spec §5).
///
/// [`read_from_kxr`]: KxrContainer::read_from_kxr
/// [`write_to_kxr`]: KxrContainer::write_to_kxr
#[derive(Debug)]
pub struct KxrContainer {
    file: Mutex<File>,
    passhash: u32,
    datasize: u32,
    headersize: u32,
    root: EntryNode,
    changed: bool,
}

impl KxrContainer {
    /// Opens an existing `.kxr` file and parses its prolog and entry tree, or
    /// creates a fresh, empty one if `path` does not exist.
    pub fn open(path: &Path) -> Result<Self> {
        let name = matched_name(path)?;
        if path.exists() {
            Self::parse(path, &name)
        } else {
            Self::create(path, &name)
        }
    }

    fn parse(path: &Path, matched: &str) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        let mut prolog = [0u8; PROLOG_SIZE as usize];
        file.read_exact(&mut prolog).map_err(|_| Error::CorruptHeader)?;

        let magic = u32::from_le_bytes(prolog[0..4].try_into().unwrap());
        if magic != KXRF_MAGIC {
            return Err(Error::InvalidMagic(prolog[0..4].try_into().unwrap()));
        }

        let passhash = i32::from_be_bytes(prolog[4..8].try_into().unwrap()) as u32;
        let datasize = i32::from_be_bytes(prolog[8..12].try_into().unwrap()) as u32;
        let headersize = i32::from_be_bytes(prolog[12..16].try_into().unwrap()) as u32;

        file.seek(SeekFrom::Start(u64::from(datasize)))
            .map_err(|_| Error::CorruptHeader)?;
        let mut raw = vec![0u8; headersize as usize];
        file.read_exact(&mut raw).map_err(|_| Error::CorruptHeader)?;

        let mut buf = ByteBuffer::from_bytes(raw);
        buf.crypt(passhash ^ datasize);

        let root = EntryNode::decode(&mut buf, true, matched)?;

        Ok(Self {
            file: Mutex::new(file),
            passhash,
            datasize,
            headersize,
            root,
            changed: false,
        })
    }

    fn create(path: &Path, matched: &str) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let mut container = Self {
            file: Mutex::new(file),
            passhash: 0,
            datasize: INITIAL_DATASIZE,
            headersize: 0,
            root: EntryNode::root(matched),
            changed: true,
        };
        container.save()?;
        Ok(container)
    }

    #[must_use]
    pub fn passhash(&self) -> u32 {
        self.passhash
    }

    #[must_use]
    pub fn datasize(&self) -> u32 {
        self.datasize
    }

    #[must_use]
    pub fn headersize(&self) -> u32 {
        self.headersize
    }

    #[must_use]
    pub fn root(&self) -> &EntryNode {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut EntryNode {
        self.changed = true;
        &mut self.root
    }

    /// Grows `datasize` by `amount`, returning the offset the caller should
    /// write its payload at. Used by the packer to hand out offsets as it
    /// streams file payloads into the container.
    pub fn allocate(&mut self, amount: u32) -> u32 {
        let offset = self.datasize;
        self.datasize += amount;
        self.changed = true;
        offset
    }

    /// Reads `size` bytes at `offset` from the backing file, serialized
    /// against other in-flight `read_from_kxr`/`write_to_kxr` calls.
    pub fn read_from_kxr(&self, offset: u32, size: u32) -> Result<ByteBuffer> {
        let mut file = self.file.lock().unwrap_or_else(|poison| poison.into_inner());
        file.seek(SeekFrom::Start(u64::from(offset)))?;
        let mut raw = vec![0u8; size as usize];
        file.read_exact(&mut raw)?;
        Ok(ByteBuffer::from_bytes(raw))
    }

    /// Writes `data` at `offset` in the backing file, serialized against
    /// other in-flight `read_from_kxr`/`write_to_kxr` calls.
    pub fn write_to_kxr(&self, offset: u32, data: &[u8]) -> Result<()> {
        let mut file = self.file.lock().unwrap_or_else(|poison| poison.into_inner());
        file.seek(SeekFrom::Start(u64::from(offset)))?;
        file.write_all(data)?;
        Ok(())
    }

    /// Rewrites the 16-byte prolog and the obfuscated entry tree at the
    /// current `datasize` (spec §4.3, Save).
    pub fn save(&mut self) -> Result<()> {
        let mut tree_buf = ByteBuffer::new();
        self.root.encode(&mut tree_buf)?;
        tree_buf.crypt(self.passhash ^ self.datasize);
        self.headersize = tree_buf.size() as u32;

        let mut prolog = ByteBuffer::new();
        prolog.put_bytes(b"kxrf")?;
        prolog.put_i32(self.passhash as i32)?;
        prolog.put_i32(self.datasize as i32)?;
        prolog.put_i32(self.headersize as i32)?;

        self.write_to_kxr(0, prolog.buffer())?;
        self.write_to_kxr(self.datasize, tree_buf.buffer())?;
        self.changed = false;
        Ok(())
    }
}

impl Drop for KxrContainer {
    fn drop(&mut self) {
        if self.changed {
            let _ = self.save();
        }
    }
}

/// Default `pack` output path: `<parent-of-source_dir>/<source_dir_name>.kxr`.
#[must_use]
pub fn default_pack_output(source_dir: &Path) -> PathBuf {
    let name = source_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    source_dir
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("{name}.kxr"))
}

/// Default `unpack` output path: `<parent-of-source_kxr>/<matched_name>`.
pub fn default_unpack_output(source_kxr: &Path) -> Result<PathBuf> {
    let name = matched_name(source_kxr)?;
    Ok(source_kxr.parent().unwrap_or_else(|| Path::new(".")).join(name))
}
