//! # SegFile Storage
//!
//! File channels, memory-mapped windows and positioned inputs for SegFile.
//!
//! This crate provides the lowest-level read path for immutable data files.
//! It does not interpret the bytes it serves; row and cell formats live in
//! `segfile_core`.
//!
//! ## Design Principles
//!
//! - Files are read-only once written
//! - One descriptor per file, shared by every reader ([`ChannelProxy`])
//! - Mapped windows are at most [`MAX_MAPPED_SIZE`] bytes ([`MappedRegion`])
//! - Every read goes through a positioned [`FileDataInput`]
//! - Shared resources are torn down exactly once ([`SharedCloseable`])
//!
//! ## Inputs
//!
//! - [`MappedInput`] - Zero-copy reads from a mapped window
//! - [`RandomAccessReader`] - Buffered positional reads from the channel
//!
//! ## Example
//!
//! ```no_run
//! use segfile_storage::{ChannelProxy, DataInputExt, FileDataInput, RandomAccessReader};
//! use std::path::Path;
//!
//! let channel = ChannelProxy::open(Path::new("data.db")).unwrap();
//! let mut reader = RandomAccessReader::open(&channel, 4096).unwrap();
//! reader.seek(128).unwrap();
//! let marker = reader.read_u64().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod channel;
mod codec;
mod error;
mod input;
mod mapped;
mod reader;
mod shared;

pub use channel::ChannelProxy;
pub use codec::{DataInputExt, DataOutputExt, MAX_SHORT_LENGTH};
pub use error::{StorageError, StorageResult};
pub use input::FileDataInput;
pub use mapped::{MappedInput, MappedRegion, MAX_MAPPED_SIZE};
pub use reader::{RandomAccessReader, DEFAULT_BUFFER_SIZE};
pub use shared::{SharedCloseable, Tidy};
