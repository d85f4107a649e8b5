//! Browse a tagged photo library as a read-only file system.
//!
//! The library catalogue (currently only Shotwell) is read once at mount time and turned into a
//! directory tree with three roots:
//!
//! - the tags, with hierarchical tags as nested directories
//! - the capture dates, bucketed according to a configurable format
//! - the events
//!
//! Every photo and video appears as a file in each directory it belongs to.  Within one tag
//! hierarchy an image is only listed in the most specific tag that holds it.
//!
//! [`filesystem::PhotoFs`] implements the operations over absolute paths; [`fuse`] serves it to
//! the kernel.

#![forbid(unsafe_code)]

pub mod builder;
pub mod config;
pub mod error;
pub mod filesystem;
pub mod fuse;
pub mod handles;
pub mod image;
pub mod namespace;
pub mod source;
pub mod tree;

mod util;

pub use config::Config;
pub use error::FsError;
pub use filesystem::PhotoFs;
