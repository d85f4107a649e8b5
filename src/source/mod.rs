//! Image sources: the catalogues that the namespace is populated from.
//!
//! A source reads its database exactly once, before the file system is mounted, and feeds every
//! record it finds into a [`NamespaceBuilder`].  Problems with individual records are collected
//! in the [`IngestReport`]; only a database that cannot be read at all is an error.

pub mod shotwell;

use std::{
    env,
    ffi::OsString,
    fmt,
    path::{Path, PathBuf},
};

use log::trace;
use rustix::fs::{access, Access};
use thiserror::Error;

use crate::builder::NamespaceBuilder;

/// Used when `$XDG_DATA_DIRS` is unset or empty.
const DEFAULT_DATA_DIRS: &str = "/usr/local/share:/usr/share";

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Unknown image source {0:?}")]
    UnknownSource(String),
    #[error("No database found for image source {0:?}")]
    NoDatabase(&'static str),
    #[error("Failed to open database {path:?}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// A record that was skipped during ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anomaly {
    /// Identifies the offending record, e.g. `phototable:12`.
    pub record: String,
    pub reason: String,
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.record, self.reason)
    }
}

/// The outcome of a successful ingestion.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// The number of media records that made it into the namespace.
    pub images: usize,
    pub anomalies: Vec<Anomaly>,
}

impl IngestReport {
    /// Records that `record` was skipped.
    pub fn skip(&mut self, record: impl Into<String>, reason: impl fmt::Display) {
        self.anomalies.push(Anomaly {
            record: record.into(),
            reason: reason.to_string(),
        });
    }
}

pub trait ImageSource: Sync {
    /// The name used to select this source on the command line.
    fn name(&self) -> &'static str;

    /// Where the database usually lives, if it can be found.
    fn default_location(&self) -> Option<PathBuf>;

    /// Reads the database at `database` and adds every image, event, date and tag to
    /// `builder`.
    fn load_tags(
        &self,
        database: &Path,
        builder: &mut NamespaceBuilder,
    ) -> Result<IngestReport, SourceError>;
}

/// Every known image source.
pub static SOURCES: &[&dyn ImageSource] = &[&shotwell::Shotwell];

/// Looks up a source by name.
pub fn get(name: &str) -> Result<&'static dyn ImageSource, SourceError> {
    SOURCES
        .iter()
        .copied()
        .find(|source| source.name() == name)
        .ok_or_else(|| SourceError::UnknownSource(name.to_string()))
}

/// The names of all known sources.
pub fn names() -> impl Iterator<Item = &'static str> {
    SOURCES.iter().map(|source| source.name())
}

/// The XDG data directories in order of preference: the user's data directory, followed by
/// `$XDG_DATA_DIRS`.
fn data_dirs(data_home: Option<PathBuf>, data_dirs: Option<OsString>) -> Vec<PathBuf> {
    let data_dirs = data_dirs
        .filter(|dirs| !dirs.is_empty())
        .unwrap_or_else(|| DEFAULT_DATA_DIRS.into());

    data_home
        .into_iter()
        .chain(env::split_paths(&data_dirs).filter(|dir| dir.is_absolute()))
        .collect()
}

/// Finds the first readable file called `relative` in the XDG data directories.
pub fn find_data_file(relative: impl AsRef<Path>) -> Option<PathBuf> {
    find_readable(
        data_dirs(dirs::data_dir(), env::var_os("XDG_DATA_DIRS")),
        relative.as_ref(),
    )
}

fn find_readable(dirs: impl IntoIterator<Item = PathBuf>, relative: &Path) -> Option<PathBuf> {
    dirs.into_iter()
        .map(|dir| dir.join(relative))
        .inspect(|candidate| trace!("Looking for {candidate:?}"))
        .find(|candidate| access(candidate, Access::READ_OK).is_ok())
}
