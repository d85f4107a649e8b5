//! Media items: the leaves of the namespace.

use std::{
    fs::File,
    path::{Path, PathBuf},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use chrono::{DateTime, Local};
use once_cell::sync::OnceCell;
use rustix::{
    fs::{stat, FileType},
    io::Errno,
};

use crate::{config::TimeFormat, tree::sanitize_segment};

/// The write permission bits for user, group and other.
pub const WRITE_BITS: u32 = 0o222;

/// File metadata similar to `struct stat` from POSIX.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    /// File type and permission bits.
    pub st_mode: u32,
    pub st_uid: u32,
    pub st_gid: u32,
    pub st_nlink: u32,
    pub st_size: u64,
    pub st_atime: SystemTime,
    pub st_mtime: SystemTime,
    pub st_ctime: SystemTime,
}

fn system_time(sec: i64, nsec: i64) -> SystemTime {
    let nsec = Duration::from_nanos(nsec.clamp(0, 999_999_999) as u64);
    if sec >= 0 {
        UNIX_EPOCH + Duration::from_secs(sec as u64) + nsec
    } else {
        UNIX_EPOCH - Duration::from_secs(sec.unsigned_abs()) + nsec
    }
}

impl Stat {
    /// Converts the result of a `stat()` call.
    #[allow(clippy::unnecessary_cast)]
    pub fn from_raw(buf: &rustix::fs::Stat) -> Self {
        Self {
            st_mode: buf.st_mode as u32,
            st_uid: buf.st_uid,
            st_gid: buf.st_gid,
            st_nlink: buf.st_nlink as u32,
            st_size: buf.st_size as u64,
            st_atime: system_time(buf.st_atime as i64, buf.st_atime_nsec as i64),
            st_mtime: system_time(buf.st_mtime as i64, buf.st_mtime_nsec as i64),
            st_ctime: system_time(buf.st_ctime as i64, buf.st_ctime_nsec as i64),
        }
    }

    /// Returns a copy with every write permission bit cleared.
    pub fn read_only(&self) -> Self {
        Self {
            st_mode: self.st_mode & !WRITE_BITS,
            ..self.clone()
        }
    }

    pub fn file_type(&self) -> FileType {
        FileType::from_raw_mode(self.st_mode)
    }

    pub fn is_dir(&self) -> bool {
        self.file_type() == FileType::Directory
    }
}

/// One photo or video.
///
/// Images are immutable once created and are shared (via `Arc`) by every tag that lists them.
/// Two images are the same logical item if and only if they refer to the same file.
#[derive(Debug)]
pub struct Image {
    name: String,
    title: Option<String>,
    location: PathBuf,
    timestamp: DateTime<Local>,
    is_video: bool,
    stat: OnceCell<Stat>,
}

impl PartialEq for Image {
    fn eq(&self, other: &Self) -> bool {
        self.location == other.location
    }
}

impl Eq for Image {}

impl Image {
    /// Creates a new image.
    ///
    /// The file name shown in the namespace is derived from the capture time (formatted with
    /// `name_format`), the title if there is one, and the extension of `location`.  For example
    /// `20140309-123000 (Beach).jpg`.
    pub fn new(
        title: Option<String>,
        location: impl Into<PathBuf>,
        timestamp: DateTime<Local>,
        is_video: bool,
        name_format: &TimeFormat,
    ) -> Self {
        let location = location.into();
        let title = title.filter(|t| !t.is_empty());
        let name = display_name(&location, &timestamp, title.as_deref(), name_format);

        Self {
            name,
            title,
            location,
            timestamp,
            is_video,
            stat: OnceCell::new(),
        }
    }

    /// The file name of this image in the namespace.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// The underlying file.
    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn timestamp(&self) -> &DateTime<Local> {
        &self.timestamp
    }

    pub fn is_video(&self) -> bool {
        self.is_video
    }

    /// Metadata of the underlying file, following symlinks.
    ///
    /// The first successful `stat()` is cached for the lifetime of the image; failures are not,
    /// so a file that appears later is picked up on the next call.
    pub fn stat(&self) -> Result<&Stat, Errno> {
        self.stat
            .get_or_try_init(|| stat(&self.location).map(|buf| Stat::from_raw(&buf)))
    }

    /// Opens the underlying file for reading.
    pub fn open(&self) -> std::io::Result<File> {
        File::open(&self.location)
    }
}

fn display_name(
    location: &Path,
    timestamp: &DateTime<Local>,
    title: Option<&str>,
    name_format: &TimeFormat,
) -> String {
    let mut name = name_format.format(timestamp);
    if let Some(title) = title {
        if name.is_empty() {
            name.push_str(title);
        } else {
            name.push_str(&format!(" ({title})"));
        }
    }

    if name.is_empty() {
        if let Some(stem) = location.file_stem() {
            name = stem.to_string_lossy().into_owned();
        }
    }

    if let Some(extension) = location.extension() {
        name.push('.');
        name.push_str(&extension.to_string_lossy());
    }

    sanitize_segment(&name)
}
