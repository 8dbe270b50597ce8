#![warn(clippy::pedantic, clippy::std_instead_of_core)]
#![allow(clippy::enum_glob_use, clippy::missing_errors_doc, clippy::module_name_repetitions)]

//! `kxr` packs a directory tree into a single obfuscated, optionally
//! zlib-compressed `.kxr` container and unpacks it back.
//!
//! The format itself is covered by [`buffer`] (the `crypt` obfuscation and
//! the typed byte cursor), [`entry`] (the recursive header codec), and
//! [`container`] (the on-disk prolog/payload/header layout). [`packer`] and
//! [`unpacker`] are the two driver algorithms; [`resource`] mirrors a source
//! directory in memory before packing.

mod cc;

pub mod buffer;
pub mod container;
pub mod entry;
pub mod error;
pub mod file_type;
pub mod packer;
pub mod resource;
pub mod unpacker;

pub use buffer::{ByteBuffer, DataFormat, Value};
pub use container::{default_pack_output, default_unpack_output, matched_name, KxrContainer};
pub use entry::{EntryFlags, EntryKind, EntryNode, TreeSummary};
pub use error::{Error, Result};
pub use packer::{PackProgress, Packer};
pub use resource::ResourceTree;
pub use unpacker::{UnpackProgress, Unpacker};
