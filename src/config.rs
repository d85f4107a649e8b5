//! Mount-time configuration: which root directories exist, what they are called, and how
//! timestamps turn into directory and file names.

use std::fmt::Write;

use chrono::{
    format::{Item, StrftimeItems},
    DateTime, Local,
};
use thiserror::Error;

/// Default name of the directory holding the tag hierarchy.
pub const DEFAULT_TAG_ROOT: &str = "Tags";
/// Default name of the directory holding the date buckets.
pub const DEFAULT_DATE_ROOT: &str = "Date";
/// Default name of the directory holding the events.
pub const DEFAULT_EVENT_ROOT: &str = "Event";

/// Default layout of the date buckets: one directory level per year, month and day.
pub const DEFAULT_DATE_FORMAT: &str = "%Y/%m/%d";
/// Default format used to name image files after their capture time.
pub const DEFAULT_NAME_FORMAT: &str = "%Y%m%d-%H%M%S";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid root directory name {0:?}")]
    InvalidRootName(String),
    #[error("Root directory name {0:?} is used more than once")]
    DuplicateRootName(String),
    #[error("Invalid time format {0:?}")]
    InvalidTimeFormat(String),
}

/// The names of the three root categories.  `None` disables a category entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootNames {
    pub tags: Option<String>,
    pub dates: Option<String>,
    pub events: Option<String>,
}

impl Default for RootNames {
    fn default() -> Self {
        Self {
            tags: Some(DEFAULT_TAG_ROOT.to_string()),
            dates: Some(DEFAULT_DATE_ROOT.to_string()),
            events: Some(DEFAULT_EVENT_ROOT.to_string()),
        }
    }
}

impl RootNames {
    /// Iterates over the enabled root names in their fixed order: tags, dates, events.
    pub fn enabled(&self) -> impl Iterator<Item = &str> {
        [&self.tags, &self.dates, &self.events]
            .into_iter()
            .filter_map(|name| name.as_deref())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen: Vec<&str> = vec![];
        for name in self.enabled() {
            if name.is_empty() || name == "." || name == ".." || name.contains('/') {
                return Err(ConfigError::InvalidRootName(name.to_string()));
            }
            if seen.contains(&name) {
                return Err(ConfigError::DuplicateRootName(name.to_string()));
            }
            seen.push(name);
        }
        Ok(())
    }
}

/// A strftime-style format string that is known to be valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeFormat(String);

impl TimeFormat {
    pub fn new(format: impl Into<String>) -> Result<Self, ConfigError> {
        let format = format.into();
        if StrftimeItems::new(&format).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::InvalidTimeFormat(format));
        }
        Ok(Self(format))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Formats `timestamp`.  This never fails: the format string was checked in `new()`.
    pub fn format(&self, timestamp: &DateTime<Local>) -> String {
        let mut result = String::new();
        // Only an invalid format string makes this fail.
        let _ = write!(result, "{}", timestamp.format(&self.0));
        result
    }
}

/// Everything the namespace needs to know before ingestion starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    roots: RootNames,
    date_format: TimeFormat,
    name_format: TimeFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            roots: RootNames::default(),
            date_format: TimeFormat(DEFAULT_DATE_FORMAT.to_string()),
            name_format: TimeFormat(DEFAULT_NAME_FORMAT.to_string()),
        }
    }
}

impl Config {
    pub fn new(
        roots: RootNames,
        date_format: impl Into<String>,
        name_format: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        roots.validate()?;
        Ok(Self {
            roots,
            date_format: TimeFormat::new(date_format)?,
            name_format: TimeFormat::new(name_format)?,
        })
    }

    pub fn roots(&self) -> &RootNames {
        &self.roots
    }

    /// The format deriving date bucket paths below the date root.
    pub fn date_format(&self) -> &TimeFormat {
        &self.date_format
    }

    /// The format deriving image file names.
    pub fn name_format(&self) -> &TimeFormat {
        &self.name_format
    }
}
